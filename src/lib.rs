// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! # powerforge - Static-Website Production Pipeline
//!
//! `powerforge` plans, builds, audits, optimizes, and publishes a static
//! site from a declarative pipeline configuration.
//!
//! ## Features
//!
//! - **Pipeline orchestration** - Chain tasks with dependency management
//! - **Content-addressed caching** - Only re-run steps whose inputs changed
//! - **Audit gates** - Broken-link, route, and baseline policies that
//!   abort the pipeline
//! - **Publishing surfaces** - Sitemaps, hosting configs, LLM manifests
//!
//! ## Quick Start
//!
//! ```bash
//! # Initialize a new project
//! powerforge init my-site
//!
//! # Validate the pipeline
//! powerforge validate
//!
//! # Run it
//! powerforge run
//!
//! # Re-run on changes
//! powerforge watch
//! ```

pub mod cache;
pub mod cli;
pub mod errors;
pub mod fingerprint;
pub mod pipeline;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use errors::{ForgeError, ForgeResult};
pub use pipeline::{PipelineDocument, PipelineExecutor, PipelineResult, StepDefinition};
pub use tasks::{TaskKind, TaskOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
