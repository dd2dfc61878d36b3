// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! .NET toolchain tasks
//!
//! `dotnet-build` and `dotnet-publish` shell out to the dotnet CLI and
//! block until it exits. `dotnet-publish` applies the Blazor base-href
//! fix to the published index.html unless disabled.

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::options::{DotnetBuildOptions, DotnetPublishOptions};
use super::{Collaborator, TaskContext, TaskOutcome};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::StepDefinition;

/// `dotnet-build` collaborator
pub struct DotnetBuildTask;

#[async_trait]
impl Collaborator for DotnetBuildTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = DotnetBuildOptions::from_step(step)?;

        let project = opts
            .project
            .as_deref()
            .map(|p| step.resolve(p))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': dotnet-build requires 'project'", step.id),
                help: None,
            })?;

        let mut args: Vec<String> = vec!["build".into(), project.display().to_string(), "--nologo".into()];
        if let Some(configuration) = &opts.configuration {
            args.push("-c".into());
            args.push(configuration.clone());
        }
        if let Some(framework) = &opts.framework {
            args.push("-f".into());
            args.push(framework.clone());
        }
        if let Some(runtime) = &opts.runtime {
            args.push("-r".into());
            args.push(runtime.clone());
        }
        if opts.no_restore {
            args.push("--no-restore".into());
        }

        let outcome = run_dotnet(&args, &step.base_dir).await?;
        if outcome.success {
            Ok(TaskOutcome::ok(format!("dotnet build {}", project.display())))
        } else {
            Ok(outcome)
        }
    }
}

/// `dotnet-publish` collaborator
pub struct DotnetPublishTask;

#[async_trait]
impl Collaborator for DotnetPublishTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = DotnetPublishOptions::from_step(step)?;

        let project = opts
            .project
            .as_deref()
            .map(|p| step.resolve(p))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': dotnet-publish requires 'project'", step.id),
                help: None,
            })?;
        let out = opts
            .out
            .as_deref()
            .map(|o| step.resolve(o))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': dotnet-publish requires 'out'", step.id),
                help: None,
            })?;

        if opts.clean && out.exists() {
            std::fs::remove_dir_all(&out)?;
        }

        let mut args: Vec<String> = vec![
            "publish".into(),
            project.display().to_string(),
            "--nologo".into(),
            "-o".into(),
            out.display().to_string(),
        ];
        if opts.self_contained {
            args.push("--self-contained".into());
        }
        if opts.no_build {
            args.push("--no-build".into());
        }
        if opts.no_restore {
            args.push("--no-restore".into());
        }

        let outcome = run_dotnet(&args, &step.base_dir).await?;
        if !outcome.success {
            return Ok(outcome);
        }

        let mut fixed = false;
        if !opts.no_blazor_fixes {
            if let Some(href) = &opts.base_href {
                fixed = apply_base_href(&out, href)?;
            }
        }

        let message = if fixed {
            format!("dotnet publish to {} (base href fixed)", out.display())
        } else {
            format!("dotnet publish to {}", out.display())
        };
        Ok(TaskOutcome::ok(message))
    }
}

async fn run_dotnet(args: &[String], working_dir: &Path) -> ForgeResult<TaskOutcome> {
    let dotnet = which::which("dotnet").map_err(|_| ForgeError::tool_not_found("dotnet"))?;

    debug!(?args, "invoking dotnet");
    let output = Command::new(dotnet)
        .args(args)
        .current_dir(working_dir)
        .output()
        .await
        .map_err(|e| ForgeError::ToolExecutionFailed {
            tool: "dotnet".into(),
            error: e.to_string(),
            help: None,
        })?;

    if output.status.success() {
        Ok(TaskOutcome::ok("dotnet ok"))
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = stderr
            .lines()
            .chain(stdout.lines())
            .find(|l| l.contains("error"))
            .or_else(|| stderr.lines().next())
            .unwrap_or("no output")
            .to_string();
        Ok(TaskOutcome {
            success: false,
            message: format!(
                "dotnet {} exited {}: {detail}",
                args.first().map(String::as_str).unwrap_or(""),
                output.status.code().unwrap_or(-1)
            ),
            ..Default::default()
        })
    }
}

/// Rewrite `<base href>` in the published index.html
///
/// Blazor publishes assume the app is served from `/`; hosting under a
/// sub-path needs the tag rewritten.
fn apply_base_href(out: &Path, href: &str) -> ForgeResult<bool> {
    let candidates = [out.join("wwwroot/index.html"), out.join("index.html")];
    let Some(index) = candidates.iter().find(|p| p.is_file()) else {
        return Ok(false);
    };

    let html = std::fs::read_to_string(index).map_err(|e| ForgeError::FileReadError {
        path: index.clone(),
        error: e.to_string(),
    })?;

    let base = Regex::new(r#"<base\s+href\s*=\s*["'][^"']*["']\s*/?>"#)?;
    let replacement = format!(r#"<base href="{href}" />"#);
    let rewritten = base.replace(&html, replacement.as_str());

    if rewritten != html {
        std::fs::write(index, rewritten.as_bytes()).map_err(|e| ForgeError::FileWriteError {
            path: index.clone(),
            error: e.to_string(),
        })?;
        return Ok(true);
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn step(dir: &Path, task: TaskKind, element: serde_json::Value) -> StepDefinition {
        StepDefinition {
            index: 1,
            task,
            id: format!("{}-1", task),
            depends_on: vec![],
            dependency_indexes: vec![],
            element,
            base_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_build_requires_project() {
        let dir = TempDir::new().unwrap();
        let s = step(dir.path(), TaskKind::DotnetBuild, json!({"task": "dotnet-build"}));
        let result = DotnetBuildTask.run(&s, &TaskContext::default()).await;
        assert!(matches!(result, Err(ForgeError::ConfigInvalid { .. })));
    }

    #[tokio::test]
    async fn test_publish_requires_out() {
        let dir = TempDir::new().unwrap();
        let s = step(
            dir.path(),
            TaskKind::DotnetPublish,
            json!({"task": "dotnet-publish", "project": "App.csproj"}),
        );
        let result = DotnetPublishTask.run(&s, &TaskContext::default()).await;
        assert!(matches!(result, Err(ForgeError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_apply_base_href_rewrites_tag() {
        let dir = TempDir::new().unwrap();
        let wwwroot = dir.path().join("wwwroot");
        std::fs::create_dir_all(&wwwroot).unwrap();
        std::fs::write(
            wwwroot.join("index.html"),
            r#"<html><head><base href="/" /></head></html>"#,
        )
        .unwrap();

        let fixed = apply_base_href(dir.path(), "/app/").unwrap();
        assert!(fixed);

        let html = std::fs::read_to_string(wwwroot.join("index.html")).unwrap();
        assert!(html.contains(r#"<base href="/app/" />"#));
    }

    #[test]
    fn test_apply_base_href_noop_without_index() {
        let dir = TempDir::new().unwrap();
        assert!(!apply_base_href(dir.path(), "/app/").unwrap());
    }
}
