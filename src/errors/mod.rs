// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Error types for the pipeline orchestrator
//!
//! Configuration errors are fatal and reported before any step runs.
//! Task errors abort the run. Cache and profile I/O problems are always
//! downgraded to warnings: the artifact tree is the pipeline's output,
//! the cache is only an optimization.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for powerforge operations
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Main error type for powerforge
#[derive(Error, Debug, Diagnostic)]
pub enum ForgeError {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline configuration not found: {path}")]
    #[diagnostic(
        code(powerforge::config_missing),
        help("Create a pipeline with 'powerforge init' or create powerforge.json manually")
    )]
    ConfigMissing { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(powerforge::config_invalid))]
    ConfigInvalid {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Pipeline 'extends' chain revisits {path}")]
    #[diagnostic(
        code(powerforge::extends_cycle),
        help("Remove the circular 'extends' reference between the pipeline documents")
    )]
    ExtendsCycle { path: PathBuf },

    #[error("Duplicate step id '{id}'")]
    #[diagnostic(
        code(powerforge::duplicate_step_id),
        help("Step ids must be unique within a pipeline; rename one of the steps")
    )]
    DuplicateStepId { id: String },

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    #[diagnostic(
        code(powerforge::unknown_dependency),
        help("Check that '{dependency}' matches a step id, '<task>#<index>', or a task name")
    )]
    UnknownDependency { step: String, dependency: String },

    #[error("Step '{step}' depends on step #{target}, which does not precede it")]
    #[diagnostic(
        code(powerforge::forward_or_self_dependency),
        help("Dependencies may only point at earlier steps; reorder the pipeline")
    )]
    ForwardOrSelfDependency { step: String, target: usize },

    #[error("Unknown task kind '{task}'")]
    #[diagnostic(
        code(powerforge::unknown_task),
        help("See 'powerforge run --help' for the list of recognized task kinds")
    )]
    UnknownTask { task: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Dependency / Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Step '{step}' dependency #{index} failed or was not executed.")]
    #[diagnostic(code(powerforge::dependency_failed))]
    DependencyFailed { step: String, index: usize },

    #[error("Step '{step}' failed: {message}")]
    #[diagnostic(code(powerforge::task_failed))]
    TaskFailed {
        step: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(powerforge::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("Tool '{tool}' execution failed: {error}")]
    #[diagnostic(code(powerforge::tool_execution_failed))]
    ToolExecutionFailed {
        tool: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Gate Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("{summary}")]
    #[diagnostic(
        code(powerforge::audit_gate),
        help("Inspect the audit summary and SARIF artifacts for the full issue list")
    )]
    AuditGateTripped { summary: String },

    #[error("{summary}")]
    #[diagnostic(code(powerforge::verify_policy))]
    VerifyPolicyTripped { summary: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Resource Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Path '{path}' escapes the pipeline root '{root}'")]
    #[diagnostic(
        code(powerforge::path_escape),
        help("Cache and profile paths must resolve inside the directory of the pipeline config")
    )]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("State file '{path}' exceeds the {limit} byte limit")]
    #[diagnostic(code(powerforge::state_too_large))]
    StateTooLarge { path: PathBuf, limit: u64 },

    // ─────────────────────────────────────────────────────────────────────────
    // File / IO Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("File not found: {path}")]
    #[diagnostic(code(powerforge::file_not_found))]
    FileNotFound {
        path: PathBuf,
        #[help]
        help: Option<String>,
    },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(powerforge::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(powerforge::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(powerforge::io_error))]
    Io { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(powerforge::json_error))]
    Json { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(powerforge::glob_error))]
    GlobPattern { message: String },

    #[error("HTTP error: {message}")]
    #[diagnostic(code(powerforge::http_error))]
    Http { message: String },
}

impl From<std::io::Error> for ForgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<glob::PatternError> for ForgeError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl From<regex::Error> for ForgeError {
    fn from(e: regex::Error) -> Self {
        Self::ConfigInvalid {
            reason: format!("invalid pattern: {e}"),
            help: None,
        }
    }
}

impl From<reqwest::Error> for ForgeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http { message: e.to_string() }
    }
}

impl ForgeError {
    /// Create a tool not found error with an installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "dotnet" => "Install the .NET SDK: https://dotnet.microsoft.com/download".to_string(),
            "git" => "Install git and ensure it's in your PATH".to_string(),
            _ => format!("Install {} and ensure it's in your PATH", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }

    /// Create a file not found error that names the requiring step
    pub fn file_not_found_in_step(path: PathBuf, step: &str) -> Self {
        Self::FileNotFound {
            path,
            help: Some(format!(
                "Required by step '{}'. Check that the file exists.",
                step
            )),
        }
    }

    /// True for errors produced by an audit/verify/doctor policy gate
    pub fn is_gate(&self) -> bool {
        matches!(
            self,
            Self::AuditGateTripped { .. } | Self::VerifyPolicyTripped { .. }
        )
    }
}
