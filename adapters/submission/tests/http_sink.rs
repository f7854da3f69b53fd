use std::time::Duration;

use pool_tap_core::{FinalScore, SubmissionStatus};
use pool_tap_submission::{
    HttpScoreSink, Identity, ScoreRecord, ScoreSink, ScoreSubmitter, SubmitError,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

#[tokio::test]
async fn posts_username_and_score_as_json() {
    let (endpoint, server) = serve_once("200 OK", "{\"success\": true}").await;
    let sink = HttpScoreSink::new(endpoint, Duration::from_secs(5)).expect("client");
    let submitter = ScoreSubmitter::new(sink);
    let identity = Identity::parse("pooler").expect("identity");

    let report = submitter.submit(Some(&identity), FinalScore::new(7)).await;
    assert_eq!(report.status, SubmissionStatus::Recorded);

    let request = server.await.expect("server task");
    assert!(request.starts_with("POST /api/save_score "), "{request}");
    let body = request
        .split("\r\n\r\n")
        .nth(1)
        .expect("request body");
    let record: ScoreRecord = serde_json::from_str(body).expect("json body");
    assert_eq!(
        record,
        ScoreRecord {
            username: "pooler".to_owned(),
            score: 7,
        }
    );
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let (endpoint, server) = serve_once(
        "400 Bad Request",
        "{\"error\": \"Invalid username or score\"}",
    )
    .await;
    let sink = HttpScoreSink::new(endpoint, Duration::from_secs(5)).expect("client");

    let record = ScoreRecord {
        username: "pooler".to_owned(),
        score: 3,
    };
    let error = sink.save_score(&record).await.expect_err("rejected");
    match error {
        SubmitError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Invalid username"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let _ = server.await.expect("server task");
}

#[tokio::test]
async fn server_error_degrades_to_remote_failed() {
    let (endpoint, server) =
        serve_once("500 Internal Server Error", "{\"error\": \"boom\"}").await;
    let sink = HttpScoreSink::new(endpoint, Duration::from_secs(5)).expect("client");
    let submitter = ScoreSubmitter::new(sink);
    let identity = Identity::parse("pooler").expect("identity");

    let report = submitter.submit(Some(&identity), FinalScore::new(1)).await;
    assert_eq!(report.status, SubmissionStatus::RemoteFailed);
    let _ = server.await.expect("server task");
}

/// Accepts a single connection, answers with `status`, and returns the raw request.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("address");

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        socket.shutdown().await.expect("shutdown");
        request
    });

    (format!("http://{address}/api/save_score"), server)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let read = socket.read(&mut chunk).await.expect("read request");
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if request_complete(&buffer) {
            break;
        }
    }
    String::from_utf8(buffer).expect("utf-8 request")
}

fn request_complete(buffer: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buffer);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    body.len() >= length
}
