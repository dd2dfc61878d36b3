// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Run results and the profile artifact
//!
//! Step results are append-only: once a result is in the run result it
//! is never mutated. The profile is the full run result serialized for
//! post-mortem analysis.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Outcome of one pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub task: String,
    pub success: bool,
    pub cached: bool,
    pub message: String,
    pub duration_ms: i64,
}

/// Outcome of a whole pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub steps: Vec<StepResult>,
    pub step_count: usize,
    pub success: bool,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<PathBuf>,
}

impl PipelineResult {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            step_count: 0,
            success: true,
            duration_ms: 0,
            cache_path: None,
            profile_path: None,
        }
    }
}

impl Default for PipelineResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Persist the run result as the profile artifact
///
/// The profile is diagnostics, not output: write failures are warnings.
pub fn write_profile(path: &Path, result: &PipelineResult) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "failed to create profile directory");
            return;
        }
    }

    let json = match serde_json::to_string_pretty(result) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize profile");
            return;
        }
    };

    if let Err(e) = std::fs::write(path, json) {
        warn!(path = %path.display(), error = %e, "failed to write profile");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_profile_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".powerforge/pipeline-profile.json");

        let result = PipelineResult {
            steps: vec![StepResult {
                task: "build".into(),
                success: true,
                cached: false,
                message: "Built 3 files (120ms)".into(),
                duration_ms: 120,
            }],
            step_count: 1,
            success: true,
            duration_ms: 120,
            cache_path: None,
            profile_path: Some(path.clone()),
        };

        write_profile(&path, &result);

        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: PipelineResult = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(loaded.steps[0].task, "build");
        assert!(text.contains("durationMs"));
        assert!(text.contains("stepCount"));
    }
}
