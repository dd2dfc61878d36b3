// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Validate command - check the pipeline without executing

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{build_step_definitions, DependencyGraph, PipelineDocument};

/// Validate the pipeline configuration
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    let document = PipelineDocument::load(&pipeline_path)?;
    let definitions = build_step_definitions(&document)?;
    let graph = DependencyGraph::build(&definitions);

    // Forward-reference validation already guarantees this; a failure
    // here would be a builder bug, not a user error.
    if !graph.is_acyclic() {
        return Err(miette::miette!("Pipeline dependency graph contains a cycle"));
    }

    println!(
        "{} {} ({} steps)",
        "✓".green(),
        pipeline_path.display(),
        definitions.len()
    );

    if verbose {
        println!();
        print!("{}", graph.to_text(&definitions));
        println!();
        println!("cache: {} ({})", document.cache, document.cache_path.display());
        println!(
            "profile: {} / on-fail {} ({})",
            document.profile,
            document.profile_on_fail,
            document.profile_path.display()
        );
    }

    Ok(())
}
