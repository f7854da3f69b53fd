//! Loading of the optional TOML settings file.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use pool_tap_core::SessionConfig;
use pool_tap_submission::SubmissionConfig;
use pool_tap_system_spawning::Config as SpawnerConfig;
use serde::Deserialize;

use crate::autoplay::AutoplayConfig;

/// Settings for one headless run; every table is optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    pub(crate) session: SessionConfig,
    pub(crate) spawner: SpawnerConfig,
    pub(crate) submission: SubmissionConfig,
    pub(crate) autoplay: AutoplayConfig,
}

/// Reads settings from `path`, falling back to defaults when no file is given.
pub(crate) fn load(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid settings in {}", path.display()))
}

fn parse(contents: &str) -> Result<Settings> {
    toml::from_str(contents).context("failed to parse settings toml contents")
}
