// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Site assembly and verification tasks
//!
//! `build` assembles the site content tree into the output directory and
//! reports which files it touched (fast mode feeds those to downstream
//! tasks). `verify` checks the site configuration for consistency and
//! enforces its policy gates.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::options::{BuildOptions, VerifyOptions};
use super::{Collaborator, TaskContext, TaskOutcome};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::document::strip_jsonc;
use crate::pipeline::StepDefinition;

/// Site configuration consumed by `build` and `verify`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    pub title: Option<String>,
    pub base_url: Option<String>,
    /// Content directory, relative to the config file
    pub source: Option<String>,
    /// Theme directory, relative to the config file
    pub theme: Option<String>,
    pub nav: Vec<NavEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavEntry {
    pub title: Option<String>,
    pub path: Option<String>,
}

impl SiteConfig {
    /// Load a site config (same lenient JSON as the pipeline document)
    pub fn load(path: &Path) -> ForgeResult<Self> {
        if !path.exists() {
            return Err(ForgeError::ConfigMissing {
                path: path.to_path_buf(),
            });
        }

        let text = std::fs::read_to_string(path).map_err(|e| ForgeError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        serde_json::from_str(&strip_jsonc(&text)).map_err(|e| ForgeError::ConfigInvalid {
            reason: format!("'{}' is not a valid site config: {}", path.display(), e),
            help: None,
        })
    }

    /// Content directory resolved against the config file's directory
    pub fn source_dir(&self, config_path: &Path) -> PathBuf {
        let base = config_path.parent().unwrap_or(Path::new("."));
        base.join(self.source.as_deref().unwrap_or("content"))
    }
}

/// `build` collaborator
pub struct BuildTask;

#[async_trait]
impl Collaborator for BuildTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = BuildOptions::from_step(step)?;

        let config_path = opts
            .config
            .as_deref()
            .map(|c| step.resolve(c))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': build requires 'config'", step.id),
                help: None,
            })?;
        let out = opts
            .out
            .as_deref()
            .map(|o| step.resolve(o))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': build requires 'out'", step.id),
                help: None,
            })?;

        let config = SiteConfig::load(&config_path)?;
        let source = config.source_dir(&config_path);
        if !source.is_dir() {
            return Err(ForgeError::file_not_found_in_step(source, &step.id));
        }

        if opts.clean && out.exists() {
            std::fs::remove_dir_all(&out)?;
        }
        std::fs::create_dir_all(&out)?;

        let mut copied = 0usize;
        let mut updated = Vec::new();
        copy_tree(&source, &out, &mut copied, &mut updated)?;

        debug!(source = %source.display(), out = %out.display(), copied, "site assembled");

        let message = format!(
            "Built {} files to {} ({} updated)",
            copied,
            out.display(),
            updated.len()
        );
        let mut outcome = TaskOutcome::ok(message)
            .with_count("fileCount", copied as i64)
            .with_count("updatedCount", updated.len() as i64);
        outcome.updated_files = updated;
        Ok(outcome)
    }
}

/// Copy `source` into `out`, recording files that actually changed
fn copy_tree(
    source: &Path,
    out: &Path,
    copied: &mut usize,
    updated: &mut Vec<PathBuf>,
) -> ForgeResult<()> {
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = out.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            std::fs::create_dir_all(&to)?;
            copy_tree(&from, &to, copied, updated)?;
            continue;
        }

        let stale = match (std::fs::metadata(&from), std::fs::metadata(&to)) {
            (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                (Ok(a), Ok(b)) => a > b || src.len() != dst.len(),
                _ => true,
            },
            _ => true,
        };

        if stale {
            std::fs::copy(&from, &to).map_err(|e| ForgeError::FileWriteError {
                path: to.clone(),
                error: e.to_string(),
            })?;
            updated.push(to.clone());
        }
        *copied += 1;
    }

    Ok(())
}

/// `verify` collaborator
pub struct VerifyTask;

#[async_trait]
impl Collaborator for VerifyTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = VerifyOptions::from_step(step)?;

        let config_path = opts
            .config
            .as_deref()
            .map(|c| step.resolve(c))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': verify requires 'config'", step.id),
                help: None,
            })?;

        let config = SiteConfig::load(&config_path)?;
        let source = config.source_dir(&config_path);

        let mut warnings = Vec::new();
        let mut nav_warnings = 0usize;
        let mut theme_warnings = 0usize;

        if config.title.as_deref().unwrap_or("").is_empty() {
            warnings.push("site config has no 'title'".to_string());
        }
        if config.base_url.as_deref().unwrap_or("").is_empty() {
            warnings.push("site config has no 'baseUrl'".to_string());
        }
        if !source.is_dir() {
            warnings.push(format!("content directory missing: {}", source.display()));
        }

        for entry in &config.nav {
            let Some(path) = entry.path.as_deref().filter(|p| !p.is_empty()) else {
                nav_warnings += 1;
                warnings.push(format!(
                    "nav entry '{}' has no path",
                    entry.title.as_deref().unwrap_or("?")
                ));
                continue;
            };
            let target = source.join(path.trim_start_matches('/'));
            if !target.exists() {
                nav_warnings += 1;
                warnings.push(format!("nav entry points at missing file: {path}"));
            }
        }

        if let Some(theme) = config.theme.as_deref().filter(|t| !t.is_empty()) {
            let theme_dir = config_path.parent().unwrap_or(Path::new(".")).join(theme);
            if !theme_dir.is_dir() {
                theme_warnings += 1;
                warnings.push(format!("theme directory missing: {}", theme_dir.display()));
            }
        }

        if opts.fail_on_nav_lint && nav_warnings > 0 {
            return Err(ForgeError::VerifyPolicyTripped {
                summary: verify_summary("nav lint", nav_warnings, &warnings),
            });
        }
        if opts.fail_on_theme_contract && theme_warnings > 0 {
            return Err(ForgeError::VerifyPolicyTripped {
                summary: verify_summary("theme contract", theme_warnings, &warnings),
            });
        }
        if opts.fail_on_warnings && !warnings.is_empty() {
            return Err(ForgeError::VerifyPolicyTripped {
                summary: verify_summary("warnings", warnings.len(), &warnings),
            });
        }

        let message = if warnings.is_empty() {
            format!("Verified {}", config_path.display())
        } else {
            format!(
                "Verified {} with {} warning(s)",
                config_path.display(),
                warnings.len()
            )
        };

        Ok(TaskOutcome::ok(message)
            .with_count("warningCount", warnings.len() as i64)
            .with_warnings(warnings))
    }
}

fn verify_summary(gate: &str, count: usize, warnings: &[String]) -> String {
    const SAMPLE: usize = 5;
    let sample: Vec<&str> = warnings.iter().take(SAMPLE).map(String::as_str).collect();
    format!(
        "Verify failed ({gate}: {count}), sample: {}",
        sample.join("; ")
    )
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

    fn site_fixture(dir: &Path) {
        std::fs::write(
            dir.join("site.json"),
            r#"{"title": "Docs", "baseUrl": "https://docs.example", "source": "content"}"#,
        )
        .unwrap();
        std::fs::create_dir_all(dir.join("content/guides")).unwrap();
        std::fs::write(dir.join("content/index.html"), "<html></html>").unwrap();
        std::fs::write(dir.join("content/guides/start.html"), "<html></html>").unwrap();
    }

    #[tokio::test]
    async fn test_build_copies_tree_and_reports_updates() {
        let dir = TempDir::new().unwrap();
        site_fixture(dir.path());

        let s = step(
            dir.path(),
            TaskKind::Build,
            json!({"task": "build", "config": "site.json", "out": "_site"}),
        );
        let outcome = BuildTask.run(&s, &TaskContext::default()).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.counts["fileCount"], 2);
        assert_eq!(outcome.counts["updatedCount"], 2);
        assert!(dir.path().join("_site/guides/start.html").exists());

        // Second build with unchanged content updates nothing.
        let outcome = BuildTask.run(&s, &TaskContext::default()).await.unwrap();
        assert_eq!(outcome.counts["updatedCount"], 0);
        assert!(outcome.updated_files.is_empty());
    }

    #[tokio::test]
    async fn test_build_missing_config_fails() {
        let dir = TempDir::new().unwrap();
        let s = step(
            dir.path(),
            TaskKind::Build,
            json!({"task": "build", "config": "missing.json", "out": "_site"}),
        );

        let result = BuildTask.run(&s, &TaskContext::default()).await;
        assert!(matches!(result, Err(ForgeError::ConfigMissing { .. })));
    }

    #[tokio::test]
    async fn test_build_clean_removes_stale_output() {
        let dir = TempDir::new().unwrap();
        site_fixture(dir.path());
        std::fs::create_dir_all(dir.path().join("_site")).unwrap();
        std::fs::write(dir.path().join("_site/stale.html"), "old").unwrap();

        let s = step(
            dir.path(),
            TaskKind::Build,
            json!({"task": "build", "config": "site.json", "out": "_site", "clean": true}),
        );
        BuildTask.run(&s, &TaskContext::default()).await.unwrap();

        assert!(!dir.path().join("_site/stale.html").exists());
        assert!(dir.path().join("_site/index.html").exists());
    }

    #[tokio::test]
    async fn test_verify_clean_config_passes() {
        let dir = TempDir::new().unwrap();
        site_fixture(dir.path());

        let s = step(
            dir.path(),
            TaskKind::Verify,
            json!({"task": "verify", "config": "site.json"}),
        );
        let outcome = VerifyTask.run(&s, &TaskContext::default()).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.counts["warningCount"], 0);
    }

    #[tokio::test]
    async fn test_verify_warns_without_failing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("site.json"), r#"{"source": "content"}"#).unwrap();
        std::fs::create_dir(dir.path().join("content")).unwrap();

        let s = step(
            dir.path(),
            TaskKind::Verify,
            json!({"task": "verify", "config": "site.json"}),
        );
        let outcome = VerifyTask.run(&s, &TaskContext::default()).await.unwrap();

        assert!(outcome.success);
        // Missing title and baseUrl.
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_verify_fail_on_warnings_gate() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("site.json"), r#"{"source": "content"}"#).unwrap();
        std::fs::create_dir(dir.path().join("content")).unwrap();

        let s = step(
            dir.path(),
            TaskKind::Verify,
            json!({"task": "verify", "config": "site.json", "failOnWarnings": true}),
        );
        let result = VerifyTask.run(&s, &TaskContext::default()).await;

        match result {
            Err(ForgeError::VerifyPolicyTripped { summary }) => {
                assert!(summary.starts_with("Verify failed"));
            }
            other => panic!("expected gate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_verify_nav_lint_gate() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("site.json"),
            r#"{
                "title": "Docs",
                "baseUrl": "https://docs.example",
                "nav": [{"title": "Missing", "path": "nope.html"}]
            }"#,
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("content")).unwrap();

        let s = step(
            dir.path(),
            TaskKind::Verify,
            json!({"task": "verify", "config": "site.json", "failOnNavLint": true}),
        );
        let result = VerifyTask.run(&s, &TaskContext::default()).await;
        assert!(matches!(
            result,
            Err(ForgeError::VerifyPolicyTripped { .. })
        ));
    }
}
