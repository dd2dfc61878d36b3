// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Watch command - re-run the pipeline on file changes

use colored::Colorize;
use miette::Result;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::time::Duration;

use crate::pipeline::{
    build_step_definitions, PipelineDocument, PipelineExecutor, RunOptions,
};
use crate::tasks::default_registry;

/// Run the watch command
pub async fn run(pipeline_path: PathBuf, debounce_ms: u64, verbose: bool) -> Result<()> {
    if !pipeline_path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}\n\n\
             Run 'powerforge init' to create a new project.",
            pipeline_path.display()
        ));
    }

    println!("{}", "Starting watch mode...".bold());
    println!("Watching for changes (debounce: {}ms)", debounce_ms);
    println!("Press {} to exit.", "Ctrl+C".cyan());
    println!();

    let (tx, rx) = channel();

    let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms), tx)
        .map_err(|e| miette::miette!("Failed to create file watcher: {}", e))?;

    let watch_root = pipeline_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    debouncer
        .watcher()
        .watch(&watch_root, RecursiveMode::Recursive)
        .map_err(|e| miette::miette!("Failed to start watching: {}", e))?;

    // Initial run.
    run_pipeline(&pipeline_path, verbose).await;

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                // Ignore the orchestrator's own state and output churn.
                let relevant: Vec<_> = events
                    .iter()
                    .filter(|e| {
                        let path = e.path.to_string_lossy();
                        !path.contains(".powerforge") && !path.contains("_site")
                    })
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .collect();

                if !relevant.is_empty() {
                    println!();
                    println!("{}", "─".repeat(50).dimmed());
                    println!(
                        "{}: {} file(s) changed",
                        "Change detected".yellow(),
                        relevant.len()
                    );

                    if verbose {
                        for event in &relevant {
                            println!("  {}", event.path.display());
                        }
                    }

                    println!();
                    run_pipeline(&pipeline_path, verbose).await;
                }
            }
            Ok(Err(e)) => {
                eprintln!("{}: {:?}", "Watch error".red(), e);
            }
            Err(e) => {
                // Channel closed
                eprintln!("{}: {}", "Channel error".red(), e);
                break;
            }
        }
    }

    Ok(())
}

async fn run_pipeline(pipeline_path: &PathBuf, verbose: bool) {
    let document = match PipelineDocument::load(pipeline_path) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("{}: {}", "Failed to load pipeline".red(), e);
            return;
        }
    };

    let definitions = match build_step_definitions(&document) {
        Ok(definitions) => definitions,
        Err(e) => {
            eprintln!("{}: {}", "Invalid pipeline".red(), e);
            return;
        }
    };

    if verbose {
        eprintln!("{} {} steps", "Running".bold(), definitions.len());
    }

    let executor = PipelineExecutor::new(default_registry());
    let options = RunOptions::default();

    if let Err(e) = executor.execute(&document, &definitions, &options).await {
        eprintln!("{}: {}", "Pipeline execution error".red(), e);
    }
}
