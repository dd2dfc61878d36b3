// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Site auditing and the doctor composite
//!
//! The audit walks the rendered site, collects issues (broken links,
//! missing assets, absent routes), persists the summary and SARIF
//! artifacts, maintains the baseline of known issue keys, and enforces
//! the gate policy. A tripped gate aborts the pipeline with a composed
//! failure summary that points at the artifacts.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::options::{AuditOptions, DoctorOptions};
use super::site::{BuildTask, VerifyTask};
use super::{Collaborator, TaskContext, TaskKind, TaskOutcome};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::StepDefinition;

/// Issue previews in failure summaries stop after this many entries
const PREVIEW_ISSUES: usize = 50;

/// Log and preview lines are clipped to this length
const PREVIEW_LINE: usize = 220;

/// One audit finding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditIssue {
    /// `error` or `warning`
    pub severity: String,
    /// `link`, `asset`, `route`, `nav`, or `gate`
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl AuditIssue {
    pub fn error(category: &str, message: String, path: Option<String>) -> Self {
        Self {
            severity: "error".into(),
            category: category.into(),
            message,
            path,
        }
    }

    pub fn warning(category: &str, message: String, path: Option<String>) -> Self {
        Self {
            severity: "warning".into(),
            category: category.into(),
            message,
            path,
        }
    }

    /// Stable identity used by the baseline
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.category,
            self.path.as_deref().unwrap_or(""),
            self.message
        )
    }

    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }

    /// Gate issues record a tripped policy, not a site defect
    pub fn is_gate(&self) -> bool {
        self.category == "gate" || self.message.starts_with("Audit gate failed")
    }
}

/// Persisted set of known issue keys
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditBaseline {
    pub version: u32,
    pub generated_at_utc: String,
    pub issue_count: usize,
    pub issue_keys: Vec<String>,
    pub issues: Vec<AuditIssue>,
}

impl AuditBaseline {
    pub fn from_issues(issues: &[AuditIssue]) -> Self {
        Self {
            version: 1,
            generated_at_utc: Utc::now().to_rfc3339(),
            issue_count: issues.len(),
            issue_keys: issues.iter().map(AuditIssue::key).collect(),
            issues: issues.to_vec(),
        }
    }

    pub fn load(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }

    pub fn save(&self, path: &Path) -> ForgeResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?).map_err(|e| {
            ForgeError::FileWriteError {
                path: path.to_path_buf(),
                error: e.to_string(),
            }
        })
    }
}

/// Where an audit step writes its summary and SARIF artifacts
pub fn artifact_paths(step: &StepDefinition, opts: &AuditOptions) -> Vec<PathBuf> {
    let site_root = opts.site_root.as_ref().map(|s| step.resolve(s));

    let summary = match (&opts.summary_path, &site_root) {
        (Some(p), _) => Some(step.resolve(p)),
        (None, Some(root)) => Some(root.join("audit-summary.json")),
        (None, None) => None,
    };
    let sarif = match (&opts.sarif_path, &site_root) {
        (Some(p), _) => Some(step.resolve(p)),
        (None, Some(root)) => Some(root.join("audit.sarif.json")),
        (None, None) => None,
    };

    summary.into_iter().chain(sarif).collect()
}

/// `audit` collaborator
pub struct AuditTask;

#[async_trait]
impl Collaborator for AuditTask {
    async fn run(&self, step: &StepDefinition, ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = AuditOptions::from_step(step)?;
        run_audit(step, ctx, &opts).await
    }
}

async fn run_audit(
    step: &StepDefinition,
    ctx: &TaskContext,
    opts: &AuditOptions,
) -> ForgeResult<TaskOutcome> {
    let site_root = opts
        .site_root
        .as_deref()
        .map(|s| step.resolve(s))
        .ok_or_else(|| ForgeError::ConfigInvalid {
            reason: format!("step '{}': audit requires 'siteRoot'", step.id),
            help: None,
        })?;

    if !site_root.is_dir() {
        return Err(ForgeError::file_not_found_in_step(site_root, &step.id));
    }

    let mut issues = Vec::new();
    let mut pages = collect_html_files(&site_root);

    // Fast mode narrows the audit to pages the last build touched.
    if ctx.fast && !ctx.last_build_updated.is_empty() {
        let updated: HashSet<&PathBuf> = ctx.last_build_updated.iter().collect();
        pages.retain(|p| updated.contains(p));
        debug!(pages = pages.len(), "fast mode: auditing updated pages only");
    }

    if opts.rendered {
        issues.push(AuditIssue::warning(
            "rendered",
            "rendered audits require a browser runtime; skipped".into(),
            None,
        ));
    }

    if opts.check_links || opts.check_assets {
        scan_pages(&site_root, &pages, opts, &mut issues)?;
    }

    for route in &opts.required_routes {
        if !route_exists(&site_root, route) {
            issues.push(AuditIssue::error(
                "route",
                format!("required route missing: {route}"),
                Some(route.clone()),
            ));
        }
    }

    if opts.check_nav {
        check_nav_profiles(step, opts, &site_root, &mut issues);
    }

    // Baseline: compare before updating so this run's report reflects
    // what was new relative to the previous state.
    let baseline_path = opts
        .baseline_path
        .as_deref()
        .map(|p| step.resolve(p))
        .unwrap_or_else(|| site_root.join("audit-baseline.json"));
    let previous = AuditBaseline::load(&baseline_path);
    let new_issue_count = match &previous {
        Some(baseline) => {
            let known: HashSet<&str> = baseline.issue_keys.iter().map(String::as_str).collect();
            issues
                .iter()
                .filter(|i| !i.is_gate() && !known.contains(i.key().as_str()))
                .count()
        }
        None => 0,
    };

    if opts.baseline_update || (opts.baseline_generate && previous.is_none()) {
        let site_issues: Vec<AuditIssue> =
            issues.iter().filter(|i| !i.is_gate()).cloned().collect();
        AuditBaseline::from_issues(&site_issues).save(&baseline_path)?;
    }

    // Gate policy.
    let errors = issues.iter().filter(|i| i.is_error()).count();
    let warnings = issues.iter().filter(|i| !i.is_error()).count();

    let mut gates = Vec::new();
    let allowed_errors = opts.max_errors.unwrap_or(0);
    if errors > allowed_errors {
        gates.push(format!("{errors} error(s) exceed the limit of {allowed_errors}"));
    }
    if let Some(max) = opts.max_warnings {
        if warnings > max {
            gates.push(format!("{warnings} warning(s) exceed the limit of {max}"));
        }
    }
    if opts.fail_on_warnings && warnings > 0 {
        gates.push(format!("{warnings} warning(s) with failOnWarnings set"));
    }
    if opts.fail_on_new_issues && new_issue_count > 0 {
        gates.push(format!("{new_issue_count} new issue(s) not in the baseline"));
    }
    if !opts.fail_on_categories.is_empty() {
        for category in &opts.fail_on_categories {
            let hits = issues
                .iter()
                .filter(|i| !i.is_gate() && i.category.eq_ignore_ascii_case(category))
                .count();
            if hits > 0 {
                gates.push(format!("{hits} issue(s) in gated category '{category}'"));
            }
        }
    }

    for gate in &gates {
        issues.push(AuditIssue::error(
            "gate",
            format!("Audit gate failed: {gate}"),
            None,
        ));
    }

    // Artifacts are written whether or not a gate tripped.
    let artifacts = artifact_paths(step, opts);
    let summary_path = artifacts.first().cloned();
    let sarif_path = artifacts.get(1).cloned();
    if let Some(path) = &summary_path {
        write_summary(path, &issues, errors, warnings, new_issue_count)?;
    }
    if let Some(path) = &sarif_path {
        write_sarif(path, &issues)?;
    }

    if !gates.is_empty() {
        return Err(ForgeError::AuditGateTripped {
            summary: build_audit_failure_summary(
                errors,
                warnings,
                summary_path.as_deref(),
                sarif_path.as_deref(),
                &issues,
            ),
        });
    }

    let message = format!(
        "Audited {} page(s): {errors} errors, {warnings} warnings",
        pages.len()
    );
    Ok(TaskOutcome::ok(message)
        .with_count("pageCount", pages.len() as i64)
        .with_count("errorCount", errors as i64)
        .with_count("warningCount", warnings as i64)
        .with_count("newIssueCount", new_issue_count as i64)
        .with_warnings(
            issues
                .iter()
                .filter(|i| !i.is_error())
                .map(|i| i.message.clone())
                .collect(),
        ))
}

/// Compose the failure summary embedded in a tripped audit gate
///
/// Gate issues are filtered out of the issues preview so the root cause
/// (the actual site defects) stays visible.
pub fn build_audit_failure_summary(
    errors: usize,
    warnings: usize,
    summary_path: Option<&Path>,
    sarif_path: Option<&Path>,
    issues: &[AuditIssue],
) -> String {
    let mut out = format!("Audit failed ({errors} errors), warnings {warnings}");

    if let Some(path) = summary_path {
        out.push_str(&format!(", summary {}", path.display()));
    }
    if let Some(path) = sarif_path {
        out.push_str(&format!(", sarif {}", path.display()));
    }

    let sample: Vec<String> = issues
        .iter()
        .filter(|i| i.is_error() && !i.is_gate())
        .take(PREVIEW_ISSUES)
        .map(|i| clip(&i.message))
        .collect();
    if !sample.is_empty() {
        out.push_str(&format!(", sample: {}", sample.join("; ")));
    }

    let preview: Vec<String> = issues
        .iter()
        .filter(|i| !i.is_gate())
        .take(PREVIEW_ISSUES)
        .map(|i| clip(&i.message))
        .collect();
    if !preview.is_empty() {
        out.push_str(&format!(", issues: {}", preview.join("; ")));
    }

    out
}

fn clip(line: &str) -> String {
    line.chars().take(PREVIEW_LINE).collect()
}

fn write_summary(
    path: &Path,
    issues: &[AuditIssue],
    errors: usize,
    warnings: usize,
    new_issue_count: usize,
) -> ForgeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let summary = serde_json::json!({
        "errors": errors,
        "warnings": warnings,
        "issueCount": issues.len(),
        "newIssueCount": new_issue_count,
        "issues": issues,
    });
    std::fs::write(path, serde_json::to_string_pretty(&summary)?).map_err(|e| {
        ForgeError::FileWriteError {
            path: path.to_path_buf(),
            error: e.to_string(),
        }
    })
}

fn write_sarif(path: &Path, issues: &[AuditIssue]) -> ForgeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let results: Vec<serde_json::Value> = issues
        .iter()
        .map(|issue| {
            serde_json::json!({
                "ruleId": issue.category,
                "level": issue.severity,
                "message": {"text": issue.message},
            })
        })
        .collect();
    let sarif = serde_json::json!({
        "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {"driver": {"name": "powerforge-audit", "version": crate::VERSION}},
            "results": results,
        }],
    });
    std::fs::write(path, serde_json::to_string_pretty(&sarif)?).map_err(|e| {
        ForgeError::FileWriteError {
            path: path.to_path_buf(),
            error: e.to_string(),
        }
    })
}

/// All .html files under the site root
pub fn collect_html_files(site_root: &Path) -> Vec<PathBuf> {
    let mut pages = Vec::new();
    let mut pending = vec![site_root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("html") {
                pages.push(path);
            }
        }
    }

    pages.sort();
    pages
}

fn scan_pages(
    site_root: &Path,
    pages: &[PathBuf],
    opts: &AuditOptions,
    issues: &mut Vec<AuditIssue>,
) -> ForgeResult<()> {
    let href = Regex::new(r#"href\s*=\s*["']([^"']+)["']"#)?;
    let src = Regex::new(r#"src\s*=\s*["']([^"']+)["']"#)?;

    for page in pages {
        let Ok(html) = std::fs::read_to_string(page) else {
            continue;
        };
        let page_rel = page
            .strip_prefix(site_root)
            .unwrap_or(page)
            .display()
            .to_string();

        if opts.check_links {
            for capture in href.captures_iter(&html) {
                check_reference(site_root, page, &capture[1], "link", &page_rel, issues);
            }
        }
        if opts.check_assets {
            for capture in src.captures_iter(&html) {
                check_reference(site_root, page, &capture[1], "asset", &page_rel, issues);
            }
        }
    }

    Ok(())
}

fn check_reference(
    site_root: &Path,
    page: &Path,
    target: &str,
    category: &str,
    page_rel: &str,
    issues: &mut Vec<AuditIssue>,
) {
    // External and pseudo references are out of audit scope.
    let lower = target.to_lowercase();
    if lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
        || lower.starts_with("//")
        || target.starts_with('#')
    {
        return;
    }

    let clean = target
        .split(['#', '?'])
        .next()
        .unwrap_or(target)
        .trim();
    if clean.is_empty() {
        return;
    }

    let resolved = if let Some(rooted) = clean.strip_prefix('/') {
        site_root.join(rooted)
    } else {
        page.parent().unwrap_or(site_root).join(clean)
    };

    if !route_file_exists(&resolved) {
        issues.push(AuditIssue::error(
            category,
            format!("broken {category}: {clean} (in {page_rel})"),
            Some(page_rel.to_string()),
        ));
    }
}

fn route_exists(site_root: &Path, route: &str) -> bool {
    let clean = route.trim().trim_start_matches('/');
    route_file_exists(&site_root.join(clean))
}

/// A reference resolves if the path exists, or is a directory with an
/// index.html, or matches with an .html extension appended
fn route_file_exists(path: &Path) -> bool {
    if path.is_file() {
        return true;
    }
    if path.is_dir() {
        return path.join("index.html").is_file();
    }
    path.with_extension("html").is_file()
}

fn check_nav_profiles(
    step: &StepDefinition,
    opts: &AuditOptions,
    site_root: &Path,
    issues: &mut Vec<AuditIssue>,
) {
    let Some(profiles_path) = opts.nav_profiles.as_deref().map(|p| step.resolve(p)) else {
        return;
    };

    #[derive(Default, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    struct NavProfile {
        name: String,
        routes: Vec<String>,
    }

    let profiles: Vec<NavProfile> = match std::fs::read_to_string(&profiles_path)
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
    {
        Some(profiles) => profiles,
        None => {
            issues.push(AuditIssue::warning(
                "nav",
                format!("nav profiles unreadable: {}", profiles_path.display()),
                None,
            ));
            return;
        }
    };

    for profile in &profiles {
        for route in &profile.routes {
            if !route_exists(site_root, route) {
                issues.push(AuditIssue::error(
                    "nav",
                    format!("nav profile '{}' route missing: {route}", profile.name),
                    Some(route.clone()),
                ));
            }
        }
    }
}

/// `doctor` collaborator: build + verify + audit in one step
pub struct DoctorTask;

#[async_trait]
impl Collaborator for DoctorTask {
    async fn run(&self, step: &StepDefinition, ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = DoctorOptions::from_step(step)?;
        let mut parts = Vec::new();
        let mut warnings = Vec::new();
        let mut counts = std::collections::BTreeMap::new();

        if opts.runs_build() {
            let sub = sub_step(step, TaskKind::Build, serde_json::json!({
                "task": "build",
                "config": opts.config.clone(),
                "out": opts.out.clone(),
            }));
            let outcome = BuildTask.run(&sub, ctx).await?;
            parts.push(format!("build: {}", outcome.message));
            warnings.extend(outcome.warnings);
            counts.extend(outcome.counts);
        }

        if opts.runs_verify() {
            let sub = sub_step(step, TaskKind::Verify, serde_json::json!({
                "task": "verify",
                "config": opts.config.clone(),
            }));
            let outcome = VerifyTask.run(&sub, ctx).await?;
            parts.push(format!("verify: {}", outcome.message));
            warnings.extend(outcome.warnings);
        }

        if opts.runs_audit() {
            let site_root = opts.site_root.clone().or_else(|| opts.out.clone());
            let sub = sub_step(step, TaskKind::Audit, serde_json::json!({
                "task": "audit",
                "siteRoot": site_root.clone(),
            }));
            let audit_opts = AuditOptions {
                site_root,
                ..AuditOptions::default()
            };
            let outcome = run_audit(&sub, ctx, &audit_opts).await?;
            parts.push(format!("audit: {}", outcome.message));
            warnings.extend(outcome.warnings);
            counts.extend(outcome.counts);
        }

        if parts.is_empty() {
            parts.push("nothing to do".into());
        }

        let mut outcome = TaskOutcome::ok(format!("Doctor: {}", parts.join("; ")));
        outcome.warnings = warnings;
        outcome.counts = counts;
        Ok(outcome)
    }
}

fn sub_step(step: &StepDefinition, task: TaskKind, element: serde_json::Value) -> StepDefinition {
    StepDefinition {
        index: step.index,
        task,
        id: format!("{}:{}", step.id, task),
        depends_on: Vec::new(),
        dependency_indexes: Vec::new(),
        element,
        base_dir: step.base_dir.clone(),
    }
}
