// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Pipeline executor
//!
//! Walks the validated step definitions strictly in order, consulting
//! the persistent cache before dispatching to collaborators. Execution
//! is sequential by design: the task surface mutates shared output
//! trees and spawns CLI subprocesses, and sequential order keeps cache
//! fingerprinting and failure reporting deterministic.

use colored::Colorize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{ensure_contained, load_state, save_state, CacheState};
use crate::errors::{ForgeError, ForgeResult};
use crate::fingerprint::{fingerprint_step, tool_salt};
use crate::pipeline::document::PipelineDocument;
use crate::pipeline::result::{write_profile, PipelineResult, StepResult};
use crate::pipeline::StepDefinition;
use crate::tasks::{expected_outputs, TaskContext, TaskKind, TaskRegistry};
use crate::utils::fmt_duration;
use crate::utils::spinner::create_spinner;

/// Pipeline run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run only steps whose mode tag matches (case-insensitive)
    pub mode: Option<String>,
    /// When non-empty, only these task kinds run
    pub only_tasks: Vec<String>,
    /// Task kinds to skip
    pub skip_tasks: Vec<String>,
    /// Reduced-input mode; caches under a distinct salt
    pub fast: bool,
    /// Skip cache lookups and updates
    pub no_cache: bool,
    /// Print the plan without executing
    pub dry_run: bool,
    /// Force the profile artifact even on success
    pub force_profile: bool,
}

/// Pipeline executor
pub struct PipelineExecutor {
    registry: TaskRegistry,
    cancelled: Arc<AtomicBool>,
}

impl PipelineExecutor {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            registry,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag observed between steps; setting it makes the run abort the
    /// way a task failure would
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Execute a pipeline
    ///
    /// Returns `Err` only for configuration-level problems detected
    /// before any step runs. Task failures abort the remaining steps and
    /// surface as a `PipelineResult` with `success = false`.
    pub async fn execute(
        &self,
        document: &PipelineDocument,
        definitions: &[StepDefinition],
        options: &RunOptions,
    ) -> ForgeResult<PipelineResult> {
        let start = Instant::now();

        let cache_enabled = document.cache && !options.no_cache;

        // Both state files must live under the pipeline root.
        ensure_contained(&document.cache_path, &document.root)?;
        ensure_contained(&document.profile_path, &document.root)?;

        self.print_plan(definitions);

        if options.dry_run {
            let mut result = PipelineResult::new();
            result.duration_ms = start.elapsed().as_millis() as i64;
            return Ok(result);
        }

        let salt = tool_salt(options.fast);
        let mut state = if cache_enabled {
            load_state(&document.cache_path)
        } else {
            CacheState::new()
        };

        let mut result = PipelineResult::new();
        if cache_enabled {
            result.cache_path = Some(document.cache_path.clone());
        }

        // Step index -> success, for dependency enforcement.
        let mut success_by_index: HashMap<usize, bool> = HashMap::new();
        // Steps served from cache in this run; a non-cached dependency
        // invalidates every downstream cache hit.
        let mut cached_this_run: HashSet<usize> = HashSet::new();
        // Executed cacheable steps awaiting a fingerprint. Fingerprints
        // are recomputed at save time: later steps may write into an
        // earlier step's output tree (sitemap into the build out), and
        // the stored stamp must reflect end-of-run disk state or the
        // next run could never be fully cached.
        let mut pending_entries: Vec<(&StepDefinition, String)> = Vec::new();

        let mut ctx = TaskContext {
            root: document.root.clone(),
            fast: options.fast,
            last_build_out: None,
            last_build_updated: Vec::new(),
        };

        let mut failed = false;

        for step in definitions {
            if self.cancelled.load(Ordering::SeqCst) {
                let message = format!("Step '{}' cancelled before execution", step.id);
                println!("  {} {} {}", "✗".red(), step.id.bold(), "(cancelled)".dimmed());
                result.steps.push(StepResult {
                    task: step.task.to_string(),
                    success: false,
                    cached: false,
                    message,
                    duration_ms: 0,
                });
                failed = true;
                break;
            }

            // Mode / only / skip filtering.
            if let Some(reason) = skip_reason(step, options) {
                println!("  {} {} {}", "○".dimmed(), step.id.dimmed(), format!("({reason})").dimmed());
                result.steps.push(StepResult {
                    task: step.task.to_string(),
                    success: true,
                    cached: false,
                    message: format!("skipped ({reason})"),
                    duration_ms: 0,
                });
                success_by_index.insert(step.index, true);
                continue;
            }

            // Every dependency must have succeeded in this run.
            if let Some(&dep) = step
                .dependency_indexes
                .iter()
                .find(|dep| !success_by_index.get(*dep).copied().unwrap_or(false))
            {
                let error = ForgeError::DependencyFailed {
                    step: step.id.clone(),
                    index: dep,
                };
                println!("  {} {} {}", "✗".red(), step.id.bold(), "(dependency)".dimmed());
                result.steps.push(StepResult {
                    task: step.task.to_string(),
                    success: false,
                    cached: false,
                    message: error.to_string(),
                    duration_ms: 0,
                });
                failed = true;
                break;
            }

            let lookup = Instant::now();
            let fingerprint = if cache_enabled {
                Some(fingerprint_step(step, &salt))
            } else {
                None
            };

            // Cache eligibility: enabled, cacheable kind, byte-identical
            // fingerprint, fully cached dependency chain, and expected
            // outputs still on disk.
            if let Some(fingerprint) = &fingerprint {
                if step.task.cacheable() {
                    if let Some(entry) = state.get(&step.cache_key()) {
                        let deps_cached = step
                            .dependency_indexes
                            .iter()
                            .all(|dep| cached_this_run.contains(dep));
                        let outputs_present = expected_outputs(step)
                            .iter()
                            .all(|path| path.exists());

                        if &entry.fingerprint == fingerprint && deps_cached && outputs_present {
                            let duration = lookup.elapsed();
                            let previous = entry.message.clone().unwrap_or_else(|| "ok".into());
                            let message = format!("{} ({})", previous, fmt_duration(duration));
                            info!(step = %step.id, "cache hit");
                            println!(
                                "  {} {} {}",
                                "✓".green(),
                                step.id.bold(),
                                "(cached)".dimmed()
                            );
                            result.steps.push(StepResult {
                                task: step.task.to_string(),
                                success: true,
                                cached: true,
                                message,
                                duration_ms: duration.as_millis() as i64,
                            });
                            cached_this_run.insert(step.index);
                            success_by_index.insert(step.index, true);
                            continue;
                        }
                        debug!(step = %step.id, "cache entry stale");
                    }
                }
            }

            // Dispatch to the collaborator.
            let collaborator =
                self.registry
                    .get(step.task)
                    .ok_or_else(|| ForgeError::UnknownTask {
                        task: step.task.to_string(),
                    })?;

            let spinner = create_spinner(&format!("{}...", step.id));
            let started = Instant::now();
            let outcome = collaborator.run(step, &ctx).await;
            let duration = started.elapsed();
            spinner.finish_and_clear();

            match outcome {
                Ok(outcome) if outcome.success => {
                    surface_warnings(&step.id, &outcome.warnings);

                    let mut message = outcome.message.clone();
                    if !outcome.warnings.is_empty() {
                        message.push_str(&format!("; {} warning(s)", outcome.warnings.len()));
                    }

                    println!(
                        "  {} {} ({})",
                        "✓".green(),
                        step.id.bold(),
                        fmt_duration(duration)
                    );

                    if step.task == TaskKind::Build {
                        ctx.last_build_out = step.opt_path("out");
                        ctx.last_build_updated = outcome.updated_files.clone();
                    }

                    if fingerprint.is_some() && step.task.cacheable() {
                        pending_entries.push((step, message.clone()));
                    }

                    result.steps.push(StepResult {
                        task: step.task.to_string(),
                        success: true,
                        cached: false,
                        message: format!("{} ({})", message, fmt_duration(duration)),
                        duration_ms: duration.as_millis() as i64,
                    });
                    success_by_index.insert(step.index, true);
                }
                Ok(outcome) => {
                    println!("  {} {} failed", "✗".red(), step.id.bold());
                    result.steps.push(StepResult {
                        task: step.task.to_string(),
                        success: false,
                        cached: false,
                        message: format!("{} ({})", outcome.message, fmt_duration(duration)),
                        duration_ms: duration.as_millis() as i64,
                    });
                    failed = true;
                    break;
                }
                Err(error) => {
                    println!("  {} {} failed", "✗".red(), step.id.bold());
                    result.steps.push(StepResult {
                        task: step.task.to_string(),
                        success: false,
                        cached: false,
                        message: format!("{} ({})", error, fmt_duration(duration)),
                        duration_ms: duration.as_millis() as i64,
                    });
                    failed = true;
                    break;
                }
            }
        }

        result.success = !failed;
        result.step_count = result.steps.len();
        result.duration_ms = start.elapsed().as_millis() as i64;

        // Cache state written exactly once, including on fatal error.
        if cache_enabled {
            for (step, message) in pending_entries {
                let fingerprint = fingerprint_step(step, &salt);
                state.insert(step.cache_key(), fingerprint, Some(message));
            }
            save_state(&document.cache_path, &state);
        }

        let profile_requested = document.profile || options.force_profile;
        let write = if result.success {
            profile_requested
        } else {
            profile_requested || document.profile_on_fail
        };
        if write {
            result.profile_path = Some(document.profile_path.clone());
            write_profile(&document.profile_path, &result);
        }

        self.print_summary(&result);

        Ok(result)
    }

    fn print_plan(&self, definitions: &[StepDefinition]) {
        println!();
        println!(
            "{} ({} step{}):",
            "Pipeline".bold(),
            definitions.len(),
            if definitions.len() == 1 { "" } else { "s" }
        );
        for step in definitions {
            print!("  {}. {} ({})", step.index, step.id.bold(), step.task);
            if !step.dependency_indexes.is_empty() {
                let deps: Vec<String> = step
                    .dependency_indexes
                    .iter()
                    .map(|d| format!("#{d}"))
                    .collect();
                print!(" {}", format!("[depends: {}]", deps.join(", ")).dimmed());
            }
            println!();
        }
        println!();
    }

    fn print_summary(&self, result: &PipelineResult) {
        println!();
        let elapsed = result.duration_ms as f64 / 1000.0;
        if result.success {
            let cached = result.steps.iter().filter(|s| s.cached).count();
            println!(
                "{}",
                format!(
                    "Pipeline completed successfully in {elapsed:.2}s ({cached} cached)"
                )
                .green()
            );
        } else {
            println!("{}", format!("Pipeline failed after {elapsed:.2}s").red());
        }
    }
}

/// Why a step is excluded from this run, if it is
fn skip_reason(step: &StepDefinition, options: &RunOptions) -> Option<String> {
    let task = step.task.as_str();

    if !options.only_tasks.is_empty()
        && !options
            .only_tasks
            .iter()
            .any(|t| t.eq_ignore_ascii_case(task))
    {
        return Some(format!("task '{task}' not selected"));
    }

    if options
        .skip_tasks
        .iter()
        .any(|t| t.eq_ignore_ascii_case(task))
    {
        return Some(format!("task '{task}' skipped"));
    }

    // Empty step mode matches any run mode.
    let step_mode = step.mode();
    if !step_mode.is_empty() {
        let requested = options
            .mode
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        if step_mode != requested {
            return Some(format!("mode '{step_mode}' not requested"));
        }
    }

    None
}

/// Log collaborator warnings, bounded like the summary previews
fn surface_warnings(step_id: &str, warnings: &[String]) {
    const MAX_WARNINGS: usize = 50;
    const MAX_LINE: usize = 220;

    for warning in warnings.iter().take(MAX_WARNINGS) {
        let line: String = warning.chars().take(MAX_LINE).collect();
        warn!(step = %step_id, "{line}");
    }
    if warnings.len() > MAX_WARNINGS {
        warn!(step = %step_id, "...and {} more warnings", warnings.len() - MAX_WARNINGS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dag::build_step_definitions;
    use crate::pipeline::document::RawStep;
    use crate::tasks::{Collaborator, TaskOutcome};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    /// Collaborator that counts invocations and follows a script
    struct Scripted {
        calls: Arc<AtomicUsize>,
        error: Option<fn() -> ForgeError>,
    }

    #[async_trait]
    impl Collaborator for Scripted {
        async fn run(
            &self,
            _step: &StepDefinition,
            _ctx: &TaskContext,
        ) -> ForgeResult<TaskOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.error {
                Some(make) => Err(make()),
                None => Ok(TaskOutcome::ok("done")),
            }
        }
    }

    struct Fixture {
        dir: TempDir,
        calls: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn document(&self, steps: serde_json::Value) -> PipelineDocument {
            let raw: Vec<RawStep> = steps
                .as_array()
                .unwrap()
                .iter()
                .map(|element| RawStep {
                    element: element.clone(),
                    base_dir: self.root().to_path_buf(),
                })
                .collect();

            PipelineDocument {
                path: self.root().join("powerforge.json"),
                root: self.root().to_path_buf(),
                steps: raw,
                profile: false,
                profile_on_fail: true,
                profile_path: self.root().join(".powerforge/pipeline-profile.json"),
                cache: true,
                cache_path: self.root().join(".powerforge/pipeline-cache.json"),
            }
        }

        fn executor(&self, kinds: &[TaskKind]) -> PipelineExecutor {
            let mut registry = TaskRegistry::new();
            for kind in kinds {
                registry.register(
                    *kind,
                    Box::new(Scripted {
                        calls: Arc::clone(&self.calls),
                        error: None,
                    }),
                );
            }
            PipelineExecutor::new(registry)
        }

        fn failing_executor(&self, kind: TaskKind, make: fn() -> ForgeError) -> PipelineExecutor {
            let mut registry = TaskRegistry::new();
            registry.register(
                kind,
                Box::new(Scripted {
                    calls: Arc::clone(&self.calls),
                    error: Some(make),
                }),
            );
            PipelineExecutor::new(registry)
        }
    }

    async fn run(
        executor: &PipelineExecutor,
        document: &PipelineDocument,
        options: &RunOptions,
    ) -> PipelineResult {
        let definitions = build_step_definitions(document).unwrap();
        executor
            .execute(document, &definitions, options)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_linear_run_then_fully_cached() {
        let fx = Fixture::new();
        std::fs::write(fx.root().join("site.json"), "{}").unwrap();
        std::fs::create_dir(fx.root().join("_site")).unwrap();
        // Expected output of the sitemap step; a cache hit requires it.
        std::fs::write(fx.root().join("_site/sitemap.xml"), "<urlset/>").unwrap();

        let doc = fx.document(serde_json::json!([
            {"task": "build", "config": "site.json", "out": "_site"},
            {"task": "verify", "config": "site.json", "dependsOn": "build"},
            {"task": "sitemap", "siteRoot": "_site", "baseUrl": "https://x", "dependsOn": "verify"},
        ]));
        let executor = fx.executor(&[TaskKind::Build, TaskKind::Verify, TaskKind::Sitemap]);
        let options = RunOptions::default();

        let first = run(&executor, &doc, &options).await;
        assert!(first.success);
        assert_eq!(first.step_count, 3);
        assert!(first.steps.iter().all(|s| !s.cached));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 3);

        let second = run(&executor, &doc, &options).await;
        assert!(second.success);
        assert!(second.steps.iter().all(|s| s.cached));
        // No collaborator ran the second time.
        assert_eq!(fx.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fingerprint_change_invalidates_dependents() {
        let fx = Fixture::new();
        let config = fx.root().join("site.json");
        std::fs::write(&config, "{}").unwrap();
        std::fs::create_dir(fx.root().join("_site")).unwrap();

        let doc = fx.document(serde_json::json!([
            {"task": "build", "config": "site.json", "out": "_site"},
            {"task": "verify", "dependsOn": "build"},
        ]));
        let executor = fx.executor(&[TaskKind::Build, TaskKind::Verify]);
        let options = RunOptions::default();

        run(&executor, &doc, &options).await;
        run(&executor, &doc, &options).await;
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);

        // Change the referenced config; build must re-run, and verify
        // must follow even though its own inputs are unchanged.
        std::fs::write(&config, r#"{"title": "edited"}"#).unwrap();
        let third = run(&executor, &doc, &options).await;
        assert!(third.steps.iter().all(|s| !s.cached));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_blocklisted_task_never_cached() {
        let fx = Fixture::new();
        let doc = fx.document(serde_json::json!([
            {"task": "exec", "command": "true"},
        ]));
        let executor = fx.executor(&[TaskKind::Exec]);
        let options = RunOptions::default();

        run(&executor, &doc, &options).await;
        let second = run(&executor, &doc, &options).await;
        assert!(!second.steps[0].cached);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_expected_output_forces_rerun() {
        let fx = Fixture::new();
        let out = fx.root().join("_site");
        std::fs::create_dir(&out).unwrap();

        let doc = fx.document(serde_json::json!([
            {"task": "build", "out": "_site"},
        ]));
        let executor = fx.executor(&[TaskKind::Build]);
        let options = RunOptions::default();

        run(&executor, &doc, &options).await;
        std::fs::remove_dir(&out).unwrap();

        let second = run(&executor, &doc, &options).await;
        assert!(!second.steps[0].cached);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_steps() {
        let fx = Fixture::new();
        let doc = fx.document(serde_json::json!([
            {"task": "build", "config": "missing.json", "out": "_site"},
            {"task": "audit", "siteRoot": "_site", "dependsOn": "build"},
        ]));
        let executor = fx.failing_executor(TaskKind::Build, || ForgeError::ConfigMissing {
            path: PathBuf::from("missing.json"),
        });
        let options = RunOptions::default();

        let result = run(&executor, &doc, &options).await;
        assert!(!result.success);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].task, "build");
        assert!(!result.steps[0].success);
        // Profile written on failure by default.
        assert!(doc.profile_path.exists());
    }

    #[tokio::test]
    async fn test_gate_failure_not_cached() {
        let fx = Fixture::new();
        let doc = fx.document(serde_json::json!([
            {"task": "audit", "siteRoot": "_site", "failOnWarnings": true},
        ]));
        let executor = fx.failing_executor(TaskKind::Audit, || ForgeError::AuditGateTripped {
            summary: "Audit failed (0 errors), warnings 1".into(),
        });
        let options = RunOptions::default();

        let result = run(&executor, &doc, &options).await;
        assert!(!result.success);
        assert!(result.steps[0].message.starts_with("Audit failed (0 errors)"));
        assert!(result.steps[0].message.contains("warnings 1"));

        let state = load_state(&doc.cache_path);
        assert!(state.get("1:audit").is_none());
    }

    #[tokio::test]
    async fn test_only_skip_and_mode_filtering() {
        let fx = Fixture::new();
        let doc = fx.document(serde_json::json!([
            {"task": "build", "out": "_site"},
            {"task": "verify"},
            {"task": "sitemap", "siteRoot": "_site", "mode": "publish"},
        ]));
        let executor = fx.executor(&[TaskKind::Build, TaskKind::Verify, TaskKind::Sitemap]);

        let options = RunOptions {
            only_tasks: vec!["build".into(), "sitemap".into()],
            ..Default::default()
        };
        let result = run(&executor, &doc, &options).await;

        assert!(result.success);
        // verify not selected; sitemap's mode tag not requested.
        assert!(result.steps[1].message.starts_with("skipped"));
        assert_eq!(result.steps[1].duration_ms, 0);
        assert!(result.steps[2].message.starts_with("skipped"));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

        let options = RunOptions {
            only_tasks: vec!["build".into(), "sitemap".into()],
            mode: Some("publish".into()),
            ..Default::default()
        };
        let result = run(&executor, &doc, &options).await;
        assert!(result.success);
        assert!(!result.steps[2].message.starts_with("skipped"));
    }

    #[tokio::test]
    async fn test_skipped_dependency_does_not_propagate_cache() {
        let fx = Fixture::new();
        std::fs::create_dir(fx.root().join("_site")).unwrap();
        let doc = fx.document(serde_json::json!([
            {"task": "build", "out": "_site"},
            {"task": "verify", "dependsOn": "build"},
        ]));
        let executor = fx.executor(&[TaskKind::Build, TaskKind::Verify]);

        run(&executor, &doc, &RunOptions::default()).await;

        // Second run skips build; verify's dependency chain is then not
        // cache-served, so verify must execute.
        let options = RunOptions {
            skip_tasks: vec!["build".into()],
            ..Default::default()
        };
        let result = run(&executor, &doc, &options).await;
        assert!(result.success);
        assert!(!result.steps[1].cached);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fast_mode_uses_distinct_cache() {
        let fx = Fixture::new();
        std::fs::create_dir(fx.root().join("_site")).unwrap();
        let doc = fx.document(serde_json::json!([
            {"task": "build", "out": "_site"},
        ]));
        let executor = fx.executor(&[TaskKind::Build]);

        run(&executor, &doc, &RunOptions::default()).await;

        // A fast run must not reuse the full-mode entry.
        let fast = RunOptions {
            fast: true,
            ..Default::default()
        };
        let result = run(&executor, &doc, &fast).await;
        assert!(!result.steps[0].cached);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_never_caches() {
        let fx = Fixture::new();
        std::fs::create_dir(fx.root().join("_site")).unwrap();
        let mut doc = fx.document(serde_json::json!([
            {"task": "build", "out": "_site"},
        ]));
        doc.cache = false;
        let executor = fx.executor(&[TaskKind::Build]);

        run(&executor, &doc, &RunOptions::default()).await;
        let second = run(&executor, &doc, &RunOptions::default()).await;
        assert!(!second.steps[0].cached);
        assert!(!doc.cache_path.exists());
    }

    #[tokio::test]
    async fn test_cache_path_escape_is_fatal() {
        let fx = Fixture::new();
        let mut doc = fx.document(serde_json::json!([
            {"task": "build", "out": "_site"},
        ]));
        doc.cache_path = PathBuf::from("/tmp/elsewhere/cache.json");
        let executor = fx.executor(&[TaskKind::Build]);

        let definitions = build_step_definitions(&doc).unwrap();
        let result = executor
            .execute(&doc, &definitions, &RunOptions::default())
            .await;
        assert!(matches!(result, Err(ForgeError::PathEscape { .. })));
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let fx = Fixture::new();
        let doc = fx.document(serde_json::json!([
            {"task": "build", "out": "_site"},
        ]));
        let executor = fx.executor(&[TaskKind::Build]);

        let options = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = run(&executor, &doc, &options).await;
        assert!(result.success);
        assert!(result.steps.is_empty());
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }
}
