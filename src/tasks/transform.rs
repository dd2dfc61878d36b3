// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Side-effecting tasks
//!
//! Every task in this module mutates state outside the pipeline's
//! declared outputs (in-place rewrites, git pushes, CDN purges, search
//! pings). All of them are on the cache blocklist.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use super::audit::collect_html_files;
use super::options::{
    CloudflareOptions, DataTransformOptions, GitSyncOptions, HtmlTransformOptions,
    IndexNowOptions,
};
use super::{Collaborator, TaskContext, TaskOutcome};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::StepDefinition;

// ─────────────────────────────────────────────────────────────────────────
// html-transform
// ─────────────────────────────────────────────────────────────────────────

/// `html-transform` collaborator: regex rewrite across the site
pub struct HtmlTransformTask;

#[async_trait]
impl Collaborator for HtmlTransformTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = HtmlTransformOptions::from_step(step)?;

        let site_root = opts
            .site_root
            .as_deref()
            .map(|s| step.resolve(s))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': html-transform requires 'siteRoot'", step.id),
                help: None,
            })?;
        let find = opts.find.as_deref().ok_or_else(|| ForgeError::ConfigInvalid {
            reason: format!("step '{}': html-transform requires 'find'", step.id),
            help: None,
        })?;
        let replace = opts.replace.as_deref().unwrap_or("");

        if !site_root.is_dir() {
            return Err(ForgeError::file_not_found_in_step(site_root, &step.id));
        }

        let pattern = Regex::new(find)?;
        let includes: Vec<glob::Pattern> = opts
            .include
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<Result<_, _>>()?;

        let mut changed = 0usize;
        for page in collect_html_files(&site_root) {
            if !includes.is_empty() {
                let relative = page.strip_prefix(&site_root).unwrap_or(&page);
                if !includes.iter().any(|p| p.matches_path(relative)) {
                    continue;
                }
            }

            let Ok(html) = std::fs::read_to_string(&page) else {
                continue;
            };
            let rewritten = pattern.replace_all(&html, replace);
            if rewritten != html {
                std::fs::write(&page, rewritten.as_bytes()).map_err(|e| {
                    ForgeError::FileWriteError {
                        path: page.clone(),
                        error: e.to_string(),
                    }
                })?;
                changed += 1;
            }
        }

        Ok(TaskOutcome::ok(format!("HTML transform: {changed} page(s) rewritten"))
            .with_count("changedCount", changed as i64))
    }
}

// ─────────────────────────────────────────────────────────────────────────
// data-transform
// ─────────────────────────────────────────────────────────────────────────

/// `data-transform` collaborator: JSON normalization in place
pub struct DataTransformTask;

#[async_trait]
impl Collaborator for DataTransformTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = DataTransformOptions::from_step(step)?;

        let target = opts
            .path
            .as_deref()
            .map(|p| step.resolve(p))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': data-transform requires 'path'", step.id),
                help: None,
            })?;

        let files: Vec<PathBuf> = if target.is_dir() {
            collect_json_files(&target)
        } else if target.is_file() {
            vec![target.clone()]
        } else {
            return Err(ForgeError::file_not_found_in_step(target, &step.id));
        };

        let mut changed = 0usize;
        for file in &files {
            let text = std::fs::read_to_string(file).map_err(|e| ForgeError::FileReadError {
                path: file.clone(),
                error: e.to_string(),
            })?;
            let value: Value = serde_json::from_str(&text).map_err(|e| ForgeError::ConfigInvalid {
                reason: format!("'{}' is not valid JSON: {e}", file.display()),
                help: None,
            })?;

            // serde_json maps iterate in key order, so re-serializing
            // both normalizes formatting and sorts object keys.
            let mut normalized = if opts.pretty {
                serde_json::to_string_pretty(&value)?
            } else {
                serde_json::to_string(&value)?
            };
            normalized.push('\n');

            if normalized != text {
                std::fs::write(file, &normalized).map_err(|e| ForgeError::FileWriteError {
                    path: file.clone(),
                    error: e.to_string(),
                })?;
                changed += 1;
            }
        }

        Ok(TaskOutcome::ok(format!(
            "Data transform: {changed} of {} file(s) normalized",
            files.len()
        ))
        .with_count("fileCount", files.len() as i64)
        .with_count("changedCount", changed as i64))
    }
}

fn collect_json_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

// ─────────────────────────────────────────────────────────────────────────
// git-sync
// ─────────────────────────────────────────────────────────────────────────

/// `git-sync` collaborator: commit and push the generated tree
pub struct GitSyncTask;

#[async_trait]
impl Collaborator for GitSyncTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = GitSyncOptions::from_step(step)?;

        let source = opts
            .source
            .as_deref()
            .map(|s| step.resolve(s))
            .unwrap_or_else(|| step.base_dir.clone());
        if !source.is_dir() {
            return Err(ForgeError::file_not_found_in_step(source, &step.id));
        }

        let git = which::which("git").map_err(|_| ForgeError::tool_not_found("git"))?;
        let message = opts.message.as_deref().unwrap_or("powerforge sync");

        run_git(&git, &source, &["add", "-A"]).await?;

        // Empty commits are not an error: an unchanged tree is synced.
        let commit = Command::new(&git)
            .args(["commit", "-m", message])
            .current_dir(&source)
            .output()
            .await
            .map_err(|e| ForgeError::ToolExecutionFailed {
                tool: "git".into(),
                error: e.to_string(),
                help: None,
            })?;
        let committed = commit.status.success();

        let mut pushed = false;
        if let Some(remote) = &opts.remote {
            let mut args = vec!["push", remote.as_str()];
            if let Some(branch) = &opts.branch {
                args.push(branch.as_str());
            }
            run_git(&git, &source, &args).await?;
            pushed = true;
        }

        let message = match (committed, pushed) {
            (true, true) => "Git sync: committed and pushed".to_string(),
            (true, false) => "Git sync: committed".to_string(),
            (false, true) => "Git sync: nothing to commit, pushed".to_string(),
            (false, false) => "Git sync: nothing to commit".to_string(),
        };
        Ok(TaskOutcome::ok(message))
    }
}

async fn run_git(git: &Path, dir: &Path, args: &[&str]) -> ForgeResult<()> {
    debug!(?args, "invoking git");
    let output = Command::new(git)
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| ForgeError::ToolExecutionFailed {
            tool: "git".into(),
            error: e.to_string(),
            help: None,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ForgeError::ToolExecutionFailed {
            tool: "git".into(),
            error: String::from_utf8_lossy(&output.stderr).to_string(),
            help: None,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────
// cloudflare
// ─────────────────────────────────────────────────────────────────────────

/// `cloudflare` collaborator: purge the zone cache after a deploy
pub struct CloudflareTask;

#[async_trait]
impl Collaborator for CloudflareTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = CloudflareOptions::from_step(step)?;

        let zone = opts.zone_id.as_deref().ok_or_else(|| ForgeError::ConfigInvalid {
            reason: format!("step '{}': cloudflare requires 'zoneId'", step.id),
            help: None,
        })?;
        let token = opts.token.as_deref().ok_or_else(|| ForgeError::ConfigInvalid {
            reason: format!("step '{}': cloudflare requires 'token'", step.id),
            help: Some("Use an API token scoped to cache purge".into()),
        })?;

        let body = if opts.purge_everything || opts.files.is_empty() {
            serde_json::json!({"purge_everything": true})
        } else {
            serde_json::json!({"files": opts.files})
        };

        let url = format!("https://api.cloudflare.com/client/v4/zones/{zone}/purge_cache");
        let response = reqwest::Client::new()
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        let ok = status.is_success()
            && payload
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(false);

        if !ok {
            return Err(ForgeError::Http {
                message: format!("Cloudflare purge failed ({status}): {payload}"),
            });
        }

        let scope = if opts.purge_everything || opts.files.is_empty() {
            "everything".to_string()
        } else {
            format!("{} file(s)", opts.files.len())
        };
        Ok(TaskOutcome::ok(format!("Cloudflare: purged {scope}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────
// indexnow
// ─────────────────────────────────────────────────────────────────────────

/// `indexnow` collaborator: submit changed URLs to search engines
pub struct IndexNowTask;

#[async_trait]
impl Collaborator for IndexNowTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = IndexNowOptions::from_step(step)?;

        let key = opts.key.as_deref().ok_or_else(|| ForgeError::ConfigInvalid {
            reason: format!("step '{}': indexnow requires 'key'", step.id),
            help: None,
        })?;
        let base_url = opts
            .base_url
            .as_deref()
            .map(|b| b.trim_end_matches('/').to_string())
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': indexnow requires 'baseUrl'", step.id),
                help: None,
            })?;

        let host = base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or(&base_url)
            .to_string();

        // Explicit URL list, or every page under the site root.
        let urls: Vec<String> = if !opts.urls.is_empty() {
            opts.urls
                .iter()
                .map(|u| {
                    if u.starts_with("http") {
                        u.clone()
                    } else {
                        format!("{base_url}/{}", u.trim_start_matches('/'))
                    }
                })
                .collect()
        } else if let Some(site_root) = opts.site_root.as_deref().map(|s| step.resolve(s)) {
            collect_html_files(&site_root)
                .iter()
                .map(|page| {
                    let rel = page
                        .strip_prefix(&site_root)
                        .unwrap_or(page)
                        .display()
                        .to_string()
                        .replace('\\', "/");
                    format!("{base_url}/{rel}")
                })
                .collect()
        } else {
            return Err(ForgeError::ConfigInvalid {
                reason: format!("step '{}': indexnow requires 'urls' or 'siteRoot'", step.id),
                help: None,
            });
        };

        let body = serde_json::json!({
            "host": host,
            "key": key,
            "urlList": urls,
        });

        let response = reqwest::Client::new()
            .post(&opts.endpoint)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ForgeError::Http {
                message: format!("IndexNow submission failed: {}", response.status()),
            });
        }

        Ok(TaskOutcome::ok(format!("IndexNow: {} URL(s) submitted", urls.len()))
            .with_count("urlCount", urls.len() as i64))
    }
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
    async fn test_html_transform_rewrites_matching_pages() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("_site");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.html"), "<html>v1.0.0</html>").unwrap();
        std::fs::write(root.join("b.html"), "<html>no version</html>").unwrap();

        let s = step(
            dir.path(),
            TaskKind::HtmlTransform,
            json!({
                "task": "html-transform",
                "siteRoot": "_site",
                "find": r"v1\.0\.0",
                "replace": "v1.1.0",
            }),
        );
        let outcome = HtmlTransformTask.run(&s, &TaskContext::default()).await.unwrap();

        assert_eq!(outcome.counts["changedCount"], 1);
        assert!(std::fs::read_to_string(root.join("a.html"))
            .unwrap()
            .contains("v1.1.0"));
    }

    #[tokio::test]
    async fn test_data_transform_normalizes_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"b":1,"a":2}"#).unwrap();

        let s = step(
            dir.path(),
            TaskKind::DataTransform,
            json!({"task": "data-transform", "path": "data.json"}),
        );
        let outcome = DataTransformTask.run(&s, &TaskContext::default()).await.unwrap();

        assert_eq!(outcome.counts["changedCount"], 1);
        let text = std::fs::read_to_string(dir.path().join("data.json")).unwrap();
        // Keys sorted, pretty-printed, trailing newline.
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
        assert!(text.ends_with('\n'));

        // Normalizing again is a no-op.
        let outcome = DataTransformTask.run(&s, &TaskContext::default()).await.unwrap();
        assert_eq!(outcome.counts["changedCount"], 0);
    }

    #[tokio::test]
    async fn test_data_transform_invalid_json_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{nope").unwrap();

        let s = step(
            dir.path(),
            TaskKind::DataTransform,
            json!({"task": "data-transform", "path": "bad.json"}),
        );
        let result = DataTransformTask.run(&s, &TaskContext::default()).await;
        assert!(matches!(result, Err(ForgeError::ConfigInvalid { .. })));
    }

    #[tokio::test]
    async fn test_cloudflare_requires_credentials() {
        let dir = TempDir::new().unwrap();
        let s = step(
            dir.path(),
            TaskKind::Cloudflare,
            json!({"task": "cloudflare", "zoneId": "abc"}),
        );
        let result = CloudflareTask.run(&s, &TaskContext::default()).await;
        assert!(matches!(result, Err(ForgeError::ConfigInvalid { .. })));
    }

    #[tokio::test]
    async fn test_indexnow_requires_key_and_base() {
        let dir = TempDir::new().unwrap();
        let s = step(
            dir.path(),
            TaskKind::IndexNow,
            json!({"task": "indexnow", "baseUrl": "https://x.example"}),
        );
        let result = IndexNowTask.run(&s, &TaskContext::default()).await;
        assert!(matches!(result, Err(ForgeError::ConfigInvalid { .. })));
    }

    #[tokio::test]
    async fn test_git_sync_requires_source_dir() {
        let dir = TempDir::new().unwrap();
        let s = step(
            dir.path(),
            TaskKind::GitSync,
            json!({"task": "git-sync", "source": "missing"}),
        );
        let result = GitSyncTask.run(&s, &TaskContext::default()).await;
        assert!(matches!(result, Err(ForgeError::FileNotFound { .. })));
    }
}
