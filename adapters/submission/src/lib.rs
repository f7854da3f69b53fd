#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Reports final scores to the rewards service.
//!
//! Submission is attempted once and never retried. Every failure degrades
//! to "score not recorded remotely"; the caller always receives a
//! [`SubmissionReport`] and can end the session regardless of the outcome.

use std::{fmt, future::Future, time::Duration};

use pool_tap_core::{FinalScore, SubmissionStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Username the score is attributed to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Accepts a username, rejecting empty or whitespace-only input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// Username as provided by the identity source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload accepted by the score endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Player the score belongs to.
    pub username: String,
    /// Final score of the session.
    pub score: i64,
}

/// Errors produced by a remote score write.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The request could not be built, sent, or completed.
    #[error("score request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("score service answered {status}: {body}")]
    Rejected {
        /// HTTP status code returned by the service.
        status: u16,
        /// Response body, useful for diagnostics.
        body: String,
    },
}

/// Destination capable of persisting a single score record.
pub trait ScoreSink {
    /// Performs one remote write of `record`.
    fn save_score(
        &self,
        record: &ScoreRecord,
    ) -> impl Future<Output = Result<(), SubmitError>> + Send;
}

/// Connection settings for the score endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Absolute URL of the `save_score` endpoint; submission is skipped when unset.
    pub endpoint: Option<String>,
    /// Upper bound on the duration of the request.
    pub timeout_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Score sink that posts JSON to the rewards service over HTTP.
#[derive(Clone, Debug)]
pub struct HttpScoreSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpScoreSink {
    /// Creates a sink for `endpoint` whose requests give up after `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Creates a sink that reuses an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Builds a sink from configuration, or `None` when no endpoint is configured.
    pub fn from_config(config: &SubmissionConfig) -> Result<Option<Self>, SubmitError> {
        config
            .endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, Duration::from_millis(config.timeout_ms)))
            .transpose()
    }

    /// URL the sink posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ScoreSink for HttpScoreSink {
    async fn save_score(&self, record: &ScoreRecord) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SubmitError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Outcome of a submission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionReport {
    /// Classification of the outcome.
    pub status: SubmissionStatus,
    /// Error description when the remote write failed.
    pub detail: Option<String>,
}

impl SubmissionReport {
    fn new(status: SubmissionStatus) -> Self {
        Self {
            status,
            detail: None,
        }
    }
}

/// Converts a finished session's score into a single remote write.
#[derive(Clone, Debug)]
pub struct ScoreSubmitter<S> {
    sink: S,
}

impl<S: ScoreSink> ScoreSubmitter<S> {
    /// Creates a submitter writing through `sink`.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Sink the submitter writes through.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Attempts to record `score` for `identity` exactly once.
    ///
    /// A missing identity skips the write. Neither outcome is retried.
    pub async fn submit(&self, identity: Option<&Identity>, score: FinalScore) -> SubmissionReport {
        let Some(identity) = identity else {
            tracing::warn!(%score, "username not available; score not saved");
            return SubmissionReport::new(SubmissionStatus::IdentityUnavailable);
        };

        let record = ScoreRecord {
            username: identity.as_str().to_owned(),
            score: score.get(),
        };
        match self.sink.save_score(&record).await {
            Ok(()) => {
                tracing::info!(username = %identity, %score, "score saved");
                SubmissionReport::new(SubmissionStatus::Recorded)
            }
            Err(error) => {
                tracing::error!(username = %identity, %score, %error, "error saving score");
                SubmissionReport {
                    status: SubmissionStatus::RemoteFailed,
                    detail: Some(error.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSink {
        records: Mutex<Vec<ScoreRecord>>,
    }

    impl ScoreSink for RecordingSink {
        async fn save_score(&self, record: &ScoreRecord) -> Result<(), SubmitError> {
            self.records.lock().expect("lock").push(record.clone());
            Ok(())
        }
    }

    struct RejectingSink;

    impl ScoreSink for RejectingSink {
        async fn save_score(&self, _record: &ScoreRecord) -> Result<(), SubmitError> {
            Err(SubmitError::Rejected {
                status: 500,
                body: "{\"error\": \"Internal server error\"}".to_owned(),
            })
        }
    }

    #[test]
    fn identity_rejects_blank_usernames() {
        assert_eq!(Identity::parse(""), None);
        assert_eq!(Identity::parse("   "), None);
        assert_eq!(
            Identity::parse("  degen  ").map(|identity| identity.to_string()),
            Some("degen".to_owned())
        );
    }

    #[tokio::test]
    async fn missing_identity_skips_the_write() {
        let submitter = ScoreSubmitter::new(RecordingSink::default());
        let report = submitter.submit(None, FinalScore::new(4)).await;

        assert_eq!(report.status, SubmissionStatus::IdentityUnavailable);
        assert!(submitter.sink().records.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn present_identity_writes_once() {
        let submitter = ScoreSubmitter::new(RecordingSink::default());
        let identity = Identity::parse("pooler").expect("identity");
        let report = submitter.submit(Some(&identity), FinalScore::new(-1)).await;

        assert_eq!(report, SubmissionReport::new(SubmissionStatus::Recorded));
        assert_eq!(
            *submitter.sink().records.lock().expect("lock"),
            vec![ScoreRecord {
                username: "pooler".to_owned(),
                score: -1,
            }]
        );
    }

    #[tokio::test]
    async fn remote_failure_is_reported_not_raised() {
        let submitter = ScoreSubmitter::new(RejectingSink);
        let identity = Identity::parse("pooler").expect("identity");
        let report = submitter.submit(Some(&identity), FinalScore::new(2)).await;

        assert_eq!(report.status, SubmissionStatus::RemoteFailed);
        assert!(report
            .detail
            .as_deref()
            .is_some_and(|detail| detail.contains("500")));
    }

    #[test]
    fn sink_is_skipped_without_endpoint() {
        let sink = HttpScoreSink::from_config(&SubmissionConfig::default()).expect("client");
        assert!(sink.is_none());

        let configured = SubmissionConfig {
            endpoint: Some("http://127.0.0.1:8080/api/save_score".to_owned()),
            ..SubmissionConfig::default()
        };
        let sink = HttpScoreSink::from_config(&configured)
            .expect("client")
            .expect("sink");
        assert_eq!(sink.endpoint(), "http://127.0.0.1:8080/api/save_score");
    }
}
