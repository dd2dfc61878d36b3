// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Pipeline orchestration
//!
//! Loader, step-definition builder, executor, and run results.

pub mod dag;
pub mod document;
pub mod executor;
pub mod result;

pub use dag::{build_step_definitions, DependencyGraph, StepDefinition};
pub use document::{PipelineDocument, RawStep, DEFAULT_CACHE_PATH, DEFAULT_PROFILE_PATH};
pub use executor::{PipelineExecutor, RunOptions};
pub use result::{PipelineResult, StepResult};
