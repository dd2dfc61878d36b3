// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Run command - execute the pipeline

use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use crate::errors::ForgeError;
use crate::pipeline::{
    build_step_definitions, PipelineDocument, PipelineExecutor, PipelineResult, RunOptions,
};
use crate::tasks::default_registry;

/// Options collected from the `run` subcommand flags
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub pipeline: PathBuf,
    pub mode: Option<String>,
    pub only: Vec<String>,
    pub skip: Vec<String>,
    pub fast: bool,
    pub no_cache: bool,
    pub dry_run: bool,
    pub profile: bool,
    pub json: bool,
}

/// Run the pipeline
///
/// Exit codes: 0 on success, 1 on any step failure or tripped gate.
/// Usage errors exit 2 via clap before this function is reached.
pub async fn run(args: RunArgs, verbose: bool) -> miette::Result<()> {
    match execute(&args, verbose).await {
        Ok(result) if result.success => {
            if args.json {
                println!("{}", success_envelope(&result));
            }
            Ok(())
        }
        Ok(result) => {
            let failed = result
                .steps
                .iter()
                .find(|s| !s.success)
                .map(|s| s.message.clone())
                .unwrap_or_else(|| "pipeline failed".into());
            fail(args.json, &failed);
        }
        Err(error) => fail(args.json, &error.to_string()),
    }
}

async fn execute(args: &RunArgs, verbose: bool) -> Result<PipelineResult, ForgeError> {
    let document = PipelineDocument::load(&args.pipeline)?;
    let definitions = build_step_definitions(&document)?;

    if verbose {
        eprintln!(
            "{} {} ({} steps)",
            "Loaded".bold(),
            document.path.display(),
            definitions.len()
        );
    }

    let executor = PipelineExecutor::new(default_registry());

    // Ctrl-C lets the running step finish surfacing its own failure,
    // then the run aborts through the normal failure path.
    let cancelled = executor.cancellation_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancelled.store(true, Ordering::SeqCst);
        }
    });

    let options = RunOptions {
        mode: args.mode.clone(),
        only_tasks: args.only.clone(),
        skip_tasks: args.skip.clone(),
        fast: args.fast,
        no_cache: args.no_cache,
        dry_run: args.dry_run,
        force_profile: args.profile,
    };

    executor.execute(&document, &definitions, &options).await
}

fn success_envelope(result: &PipelineResult) -> String {
    serde_json::json!({
        "command": "run",
        "success": true,
        "exitCode": 0,
        "result": result,
    })
    .to_string()
}

/// Print the failure envelope and exit 1
fn fail(json: bool, message: &str) -> ! {
    if json {
        let envelope = serde_json::json!({
            "command": "run",
            "success": false,
            "exitCode": 1,
            "error": message,
        });
        println!("{envelope}");
    } else {
        eprintln!("{} {}", "[ERROR]".red().bold(), message);
        eprintln!("See 'powerforge run --help' for usage.");
    }
    std::process::exit(1);
}
