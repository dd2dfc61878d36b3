// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! powerforge - Static-Website Production Pipeline
//!
//! Plan, build, audit, optimize, and publish a site from a declarative
//! configuration.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use powerforge::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "powerforge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Init { name, force } => powerforge::cli::init::run(name, force, cli.verbose).await,
        Commands::Run {
            pipeline,
            mode,
            only,
            skip,
            fast,
            no_cache,
            dry_run,
            profile,
            json,
        } => {
            let args = powerforge::cli::run::RunArgs {
                pipeline,
                mode,
                only,
                skip,
                fast,
                no_cache,
                dry_run,
                profile,
                json,
            };
            powerforge::cli::run::run(args, cli.verbose).await
        }
        Commands::Validate { pipeline } => {
            powerforge::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Graph { pipeline, format } => {
            powerforge::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Cache { action } => powerforge::cli::cache::run(action, cli.verbose).await,
        Commands::Watch { pipeline, debounce } => {
            powerforge::cli::watch::run(pipeline, debounce, cli.verbose).await
        }
    }
}
