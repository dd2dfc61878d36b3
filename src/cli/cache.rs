// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Cache command - inspect and clear the persistent pipeline cache

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::CacheAction;
use crate::cache::load_state;
use crate::pipeline::PipelineDocument;

/// Run a cache management action
pub async fn run(action: CacheAction, _verbose: bool) -> Result<()> {
    match action {
        CacheAction::Stats { pipeline } => stats(pipeline),
        CacheAction::Clear { pipeline, yes } => clear(pipeline, yes),
    }
}

fn stats(pipeline_path: PathBuf) -> Result<()> {
    let document = PipelineDocument::load(&pipeline_path)?;
    let cache_path = &document.cache_path;

    if !cache_path.exists() {
        println!("Cache is empty ({})", cache_path.display());
        return Ok(());
    }

    let state = load_state(cache_path);
    let size = std::fs::metadata(cache_path).map(|m| m.len()).unwrap_or(0);

    println!("{}: {}", "Cache".bold(), cache_path.display());
    println!("  entries: {}", state.entries.len());
    println!("  size: {size} bytes");
    for (key, entry) in &state.entries {
        println!(
            "  {key} -> {}{}",
            &entry.fingerprint[..entry.fingerprint.len().min(12)],
            entry
                .message
                .as_deref()
                .map(|m| format!(" ({m})"))
                .unwrap_or_default()
        );
    }

    Ok(())
}

fn clear(pipeline_path: PathBuf, yes: bool) -> Result<()> {
    let document = PipelineDocument::load(&pipeline_path)?;
    let cache_path = &document.cache_path;

    if !cache_path.exists() {
        println!("Cache is already empty");
        return Ok(());
    }

    if !yes {
        return Err(miette::miette!(
            "Refusing to clear {} without --yes",
            cache_path.display()
        ));
    }

    std::fs::remove_file(cache_path)
        .map_err(|e| miette::miette!("Failed to remove cache: {e}"))?;
    println!("{} Cache cleared", "✓".green());

    Ok(())
}
