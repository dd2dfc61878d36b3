// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Shell tasks
//!
//! `exec` and `hook` run arbitrary commands. Both are side-effecting and
//! therefore never cached.

use async_trait::async_trait;
use tokio::process::Command;

use super::options::ExecOptions;
use super::{Collaborator, TaskContext, TaskOutcome};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::StepDefinition;

/// `exec` collaborator
pub struct ExecTask;

#[async_trait]
impl Collaborator for ExecTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        run_command(step, "exec").await
    }
}

/// `hook` collaborator: a named lifecycle command
pub struct HookTask;

#[async_trait]
impl Collaborator for HookTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        run_command(step, "hook").await
    }
}

async fn run_command(step: &StepDefinition, label: &str) -> ForgeResult<TaskOutcome> {
    let opts = ExecOptions::from_step(step)?;

    let command = opts
        .command
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ForgeError::ConfigInvalid {
            reason: format!("step '{}': {label} requires 'command'", step.id),
            help: None,
        })?;

    let working_dir = opts
        .working_dir
        .as_deref()
        .map(|d| step.resolve(d))
        .unwrap_or_else(|| step.base_dir.clone());

    let output = Command::new(&opts.shell)
        .arg("-c")
        .arg(command)
        .current_dir(&working_dir)
        .output()
        .await
        .map_err(|e| ForgeError::ToolExecutionFailed {
            tool: opts.shell.clone(),
            error: e.to_string(),
            help: Some(format!("Shell '{}' may not be available", opts.shell)),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        let detail = stdout
            .lines()
            .next()
            .map(|l| format!(": {l}"))
            .unwrap_or_default();
        Ok(TaskOutcome::ok(format!("{label} '{command}' ok{detail}")))
    } else {
        let code = output.status.code().unwrap_or(-1);
        let detail = stderr
            .lines()
            .chain(stdout.lines())
            .next()
            .unwrap_or("no output");
        Ok(TaskOutcome {
            success: false,
            message: format!("{label} '{command}' exited {code}: {detail}"),
            ..Default::default()
        })
    }
}
