// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for powerforge.

pub mod cache;
pub mod graph;
pub mod init;
pub mod run;
pub mod validate;
pub mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Static-website production pipeline
///
/// Plan, build, audit, optimize, and publish a site from a declarative
/// configuration.
#[derive(Parser, Debug)]
#[clap(
    name = "powerforge",
    version,
    about = "Static-website production pipeline: plan, build, audit, optimize, publish",
    long_about = None,
    after_help = "Examples:\n\
        powerforge init                 Initialize a new project\n\
        powerforge run                  Execute the pipeline\n\
        powerforge run --fast           Re-run against updated files only\n\
        powerforge validate             Check the pipeline without executing\n\
        powerforge graph --format dot   Render the dependency graph\n\
        powerforge watch                Re-run on file changes\n\n\
        See 'powerforge <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new powerforge project
    Init {
        /// Project name (defaults to current directory name)
        name: Option<String>,

        /// Overwrite existing files
        #[clap(short, long)]
        force: bool,
    },

    /// Run the pipeline
    Run {
        /// Pipeline file
        #[clap(short, long, default_value = "powerforge.json")]
        pipeline: PathBuf,

        /// Run only steps whose mode tag matches
        #[clap(short, long)]
        mode: Option<String>,

        /// Run only these task kinds
        #[clap(long, value_name = "TASK")]
        only: Vec<String>,

        /// Skip these task kinds
        #[clap(long, value_name = "TASK")]
        skip: Vec<String>,

        /// Reduced-input mode (caches separately from full runs)
        #[clap(long)]
        fast: bool,

        /// Skip cache lookups (force re-execution)
        #[clap(long)]
        no_cache: bool,

        /// Show the plan without executing
        #[clap(long)]
        dry_run: bool,

        /// Write the profile artifact even on success
        #[clap(long)]
        profile: bool,

        /// Emit a JSON result envelope
        #[clap(long)]
        json: bool,
    },

    /// Validate the pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = "powerforge.json")]
        pipeline: PathBuf,
    },

    /// Show the pipeline as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = "powerforge.json")]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: GraphFormat,
    },

    /// Cache management
    Cache {
        #[clap(subcommand)]
        action: CacheAction,
    },

    /// Watch mode - re-run the pipeline on file changes
    Watch {
        /// Pipeline file
        #[clap(short, long, default_value = "powerforge.json")]
        pipeline: PathBuf,

        /// Debounce delay in milliseconds
        #[clap(long, default_value = "500")]
        debounce: u64,
    },
}

/// Cache management actions
#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Show cache statistics
    Stats {
        /// Pipeline file
        #[clap(short, long, default_value = "powerforge.json")]
        pipeline: PathBuf,
    },

    /// Clear the cache
    Clear {
        /// Pipeline file
        #[clap(short, long, default_value = "powerforge.json")]
        pipeline: PathBuf,

        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}
