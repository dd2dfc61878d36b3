// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Graph command - render the pipeline dependency graph

use miette::Result;
use std::path::PathBuf;

use super::GraphFormat;
use crate::pipeline::{build_step_definitions, DependencyGraph, PipelineDocument};

/// Render the pipeline as text, DOT, or Mermaid
pub async fn run(pipeline_path: PathBuf, format: GraphFormat, _verbose: bool) -> Result<()> {
    let document = PipelineDocument::load(&pipeline_path)?;
    let definitions = build_step_definitions(&document)?;
    let graph = DependencyGraph::build(&definitions);

    let output = match format {
        GraphFormat::Text => graph.to_text(&definitions),
        GraphFormat::Dot => graph.to_dot(&definitions),
        GraphFormat::Mermaid => graph.to_mermaid(&definitions),
    };

    print!("{output}");
    Ok(())
}
