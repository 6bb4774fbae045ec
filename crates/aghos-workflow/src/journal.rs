//! JSON progress journal written after every stage.

use crate::stage_runner::Artifact;
use aghos_core::fs_util::write_atomic;
use aghos_core::Warning;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: String,
    pub error: String,
}

/// What an operator (or a support script) needs to see after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub pipeline: String,
    pub dry_run: bool,
    pub current: Option<String>,
    pub completed: Vec<String>,
    pub artifacts: Vec<Artifact>,
    pub failed: Option<StageFailure>,
    pub warnings: Vec<Warning>,
}

impl ProgressRecord {
    pub fn new(pipeline: &str, dry_run: bool) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn is_completed(&self, stage: &str) -> bool {
        self.completed.iter().any(|s| s == stage)
    }

    pub fn mark_completed(&mut self, stage: &str) {
        if !self.is_completed(stage) {
            self.completed.push(stage.to_string());
        }
        self.current = None;
    }

    pub fn record_artifact(&mut self, artifact: Artifact) {
        if !self.artifacts.contains(&artifact) {
            self.artifacts.push(artifact);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, record: &ProgressRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record).context("failed to encode progress")?;
        write_atomic(&self.path, &json, Some(0o644))
            .with_context(|| format!("failed to write journal {}", self.path.display()))
    }

    pub fn read(&self) -> Result<Option<ProgressRecord>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read journal {}", self.path.display()))
            }
        };
        let record = serde_json::from_slice(&bytes)
            .with_context(|| format!("invalid journal {}", self.path.display()))?;
        Ok(Some(record))
    }
}
