// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Task dispatch layer
//!
//! Tasks are a closed tagged union: a [`TaskKind`], a per-kind options
//! record (see [`options`]), and a [`Collaborator`] that turns options
//! into a [`TaskOutcome`]. The dispatcher registry, the side-effect
//! blocklist, and the expected-outputs table live together here so that
//! adding a new task kind touches one module.

pub mod audit;
pub mod docs;
pub mod dotnet;
pub mod options;
pub mod publish;
pub mod shell;
pub mod site;
pub mod transform;

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::ForgeResult;
use crate::pipeline::StepDefinition;
use options::{
    ApiDocsOptions, AuditOptions, DoctorOptions, HostingOptions, LlmsOptions, OptimizeOptions,
    SitemapOptions,
};

/// The closed set of task kinds the executor dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    Build,
    Verify,
    MarkdownFix,
    ApiDocs,
    Changelog,
    Llms,
    Sitemap,
    Optimize,
    Audit,
    Doctor,
    DotnetBuild,
    DotnetPublish,
    Overlay,
    Hosting,
    Cloudflare,
    IndexNow,
    Exec,
    Hook,
    HtmlTransform,
    DataTransform,
    GitSync,
}

impl TaskKind {
    /// Every recognized kind, in dispatch-table order
    pub const ALL: &'static [TaskKind] = &[
        Self::Build,
        Self::Verify,
        Self::MarkdownFix,
        Self::ApiDocs,
        Self::Changelog,
        Self::Llms,
        Self::Sitemap,
        Self::Optimize,
        Self::Audit,
        Self::Doctor,
        Self::DotnetBuild,
        Self::DotnetPublish,
        Self::Overlay,
        Self::Hosting,
        Self::Cloudflare,
        Self::IndexNow,
        Self::Exec,
        Self::Hook,
        Self::HtmlTransform,
        Self::DataTransform,
        Self::GitSync,
    ];

    /// Whether a previous successful outcome may be reused
    ///
    /// Side-effecting tasks are blocklisted: their observable effect is
    /// not a pure function of their declared inputs.
    pub fn cacheable(&self) -> bool {
        !matches!(
            self,
            Self::Cloudflare
                | Self::IndexNow
                | Self::Exec
                | Self::Hook
                | Self::HtmlTransform
                | Self::DataTransform
                | Self::GitSync
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Verify => "verify",
            Self::MarkdownFix => "markdown-fix",
            Self::ApiDocs => "apidocs",
            Self::Changelog => "changelog",
            Self::Llms => "llms",
            Self::Sitemap => "sitemap",
            Self::Optimize => "optimize",
            Self::Audit => "audit",
            Self::Doctor => "doctor",
            Self::DotnetBuild => "dotnet-build",
            Self::DotnetPublish => "dotnet-publish",
            Self::Overlay => "overlay",
            Self::Hosting => "hosting",
            Self::Cloudflare => "cloudflare",
            Self::IndexNow => "indexnow",
            Self::Exec => "exec",
            Self::Hook => "hook",
            Self::HtmlTransform => "html-transform",
            Self::DataTransform => "data-transform",
            Self::GitSync => "git-sync",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or(())
    }
}

/// Result a collaborator hands back to the executor
///
/// The orchestrator consumes only `success`, `warnings`, the counts, and
/// the message; it never interprets a collaborator's internal data.
#[derive(Debug, Clone, Default)]
pub struct TaskOutcome {
    pub success: bool,
    pub message: String,
    pub warnings: Vec<String>,
    pub counts: BTreeMap<String, i64>,
    /// Files the task touched; `build` reports these for fast mode
    pub updated_files: Vec<PathBuf>,
}

impl TaskOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_count(mut self, key: &str, value: i64) -> Self {
        self.counts.insert(key.to_string(), value);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Run-level state the executor threads into every dispatch
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    /// Directory of the pipeline config
    pub root: PathBuf,
    /// Reduced-input mode; caches under a distinct salt
    pub fast: bool,
    /// Output directory of the most recent `build` step in this run
    pub last_build_out: Option<PathBuf>,
    /// Files the most recent `build` step reported as updated
    pub last_build_updated: Vec<PathBuf>,
}

/// An external collaborator: options in, outcome out
#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn run(&self, step: &StepDefinition, ctx: &TaskContext) -> ForgeResult<TaskOutcome>;
}

/// Dispatch table from task kind to collaborator
pub struct TaskRegistry {
    collaborators: HashMap<TaskKind, Box<dyn Collaborator>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            collaborators: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: TaskKind, collaborator: Box<dyn Collaborator>) {
        self.collaborators.insert(kind, collaborator);
    }

    pub fn get(&self, kind: TaskKind) -> Option<&dyn Collaborator> {
        self.collaborators.get(&kind).map(|c| c.as_ref())
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry wired with every built-in collaborator
pub fn default_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();

    registry.register(TaskKind::Build, Box::new(site::BuildTask));
    registry.register(TaskKind::Verify, Box::new(site::VerifyTask));
    registry.register(TaskKind::MarkdownFix, Box::new(docs::MarkdownFixTask));
    registry.register(TaskKind::ApiDocs, Box::new(docs::ApiDocsTask));
    registry.register(TaskKind::Changelog, Box::new(docs::ChangelogTask));
    registry.register(TaskKind::Llms, Box::new(docs::LlmsTask));
    registry.register(TaskKind::Sitemap, Box::new(publish::SitemapTask));
    registry.register(TaskKind::Optimize, Box::new(publish::OptimizeTask));
    registry.register(TaskKind::Audit, Box::new(audit::AuditTask));
    registry.register(TaskKind::Doctor, Box::new(audit::DoctorTask));
    registry.register(TaskKind::DotnetBuild, Box::new(dotnet::DotnetBuildTask));
    registry.register(TaskKind::DotnetPublish, Box::new(dotnet::DotnetPublishTask));
    registry.register(TaskKind::Overlay, Box::new(publish::OverlayTask));
    registry.register(TaskKind::Hosting, Box::new(publish::HostingTask));
    registry.register(TaskKind::Cloudflare, Box::new(transform::CloudflareTask));
    registry.register(TaskKind::IndexNow, Box::new(transform::IndexNowTask));
    registry.register(TaskKind::Exec, Box::new(shell::ExecTask));
    registry.register(TaskKind::Hook, Box::new(shell::HookTask));
    registry.register(
        TaskKind::HtmlTransform,
        Box::new(transform::HtmlTransformTask),
    );
    registry.register(
        TaskKind::DataTransform,
        Box::new(transform::DataTransformTask),
    );
    registry.register(TaskKind::GitSync, Box::new(transform::GitSyncTask));

    registry
}

/// Expected outputs per task kind
///
/// A cache hit is honored only while every path listed here still exists
/// on disk (file or directory). Kinds without an entry return the empty
/// set, which is treated as "present".
pub fn expected_outputs(step: &StepDefinition) -> Vec<PathBuf> {
    match step.task {
        TaskKind::Build | TaskKind::DotnetPublish => {
            step.opt_path("out").into_iter().collect()
        }
        TaskKind::ApiDocs => {
            let mut outputs: Vec<PathBuf> = step.opt_path("out").into_iter().collect();
            if let Ok(opts) = ApiDocsOptions::from_step(step) {
                for batch in &opts.inputs {
                    if let Some(out) = &batch.out {
                        outputs.push(step.resolve(out));
                    }
                }
            }
            outputs
        }
        TaskKind::Overlay => step.opt_path("destination").into_iter().collect(),
        TaskKind::Changelog => step.opt_path("out").into_iter().collect(),
        TaskKind::Llms => {
            let Ok(opts) = LlmsOptions::from_step(step) else {
                return Vec::new();
            };
            let Some(site_root) = opts.site_root.map(|s| step.resolve(&s)) else {
                return Vec::new();
            };
            vec![
                site_root.join("llms.txt"),
                site_root.join("llms.json"),
                site_root.join("llms-full.txt"),
            ]
        }
        TaskKind::Sitemap => {
            let Ok(opts) = SitemapOptions::from_step(step) else {
                return Vec::new();
            };
            let site_root = opts.site_root.as_ref().map(|s| step.resolve(s));
            let mut outputs = Vec::new();
            match (&opts.out, &site_root) {
                (Some(out), _) => outputs.push(step.resolve(out)),
                (None, Some(root)) => outputs.push(root.join("sitemap.xml")),
                (None, None) => {}
            }
            if let Some(root) = &site_root {
                if opts.html {
                    outputs.push(root.join("sitemap.html"));
                }
                if opts.sitemap_index {
                    outputs.push(root.join("sitemap-index.xml"));
                }
            }
            for extra in [&opts.news_output, &opts.image_output, &opts.video_output]
                .into_iter()
                .flatten()
            {
                outputs.push(step.resolve(extra));
            }
            outputs
        }
        TaskKind::Optimize => {
            let Ok(opts) = OptimizeOptions::from_step(step) else {
                return Vec::new();
            };
            let site_root = opts.site_root.as_ref().map(|s| step.resolve(s));
            let mut outputs = Vec::new();
            if let Some(report) = &opts.report_path {
                outputs.push(step.resolve(report));
            }
            if let Some(manifest) = &opts.hash_manifest {
                outputs.push(step.resolve(manifest));
            }
            if opts.cache_headers {
                match (&opts.cache_headers_out, &site_root) {
                    (Some(out), _) => outputs.push(step.resolve(out)),
                    (None, Some(root)) => outputs.push(root.join("_headers")),
                    (None, None) => {}
                }
            }
            outputs
        }
        TaskKind::Audit => {
            let Ok(opts) = AuditOptions::from_step(step) else {
                return Vec::new();
            };
            audit::artifact_paths(step, &opts)
        }
        TaskKind::Doctor => {
            let Ok(opts) = DoctorOptions::from_step(step) else {
                return Vec::new();
            };
            let mut outputs = Vec::new();
            if opts.runs_build() {
                if let Some(out) = &opts.out {
                    outputs.push(step.resolve(out));
                }
            }
            if opts.runs_audit() {
                let audit_opts = AuditOptions {
                    site_root: opts.site_root.clone().or_else(|| opts.out.clone()),
                    ..AuditOptions::default()
                };
                outputs.extend(audit::artifact_paths(step, &audit_opts));
            }
            outputs
        }
        TaskKind::Hosting => {
            let Ok(opts) = HostingOptions::from_step(step) else {
                return Vec::new();
            };
            let Some(site_root) = opts.site_root.as_ref().map(|s| step.resolve(s)) else {
                return Vec::new();
            };
            let (targets, _) = opts.selected_targets();
            targets
                .iter()
                .map(|t| site_root.join(t.file_name()))
                .collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(task: TaskKind, element: serde_json::Value) -> StepDefinition {
        StepDefinition {
            index: 1,
            task,
            id: format!("{}-1", task),
            depends_on: vec![],
            dependency_indexes: vec![],
            element,
            base_dir: PathBuf::from("/root"),
        }
    }

    #[test]
    fn test_task_kind_round_trip() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.as_str().parse::<TaskKind>().unwrap(), *kind);
        }
        assert!("no-such-task".parse::<TaskKind>().is_err());
    }

    #[test]
    fn test_blocklist_not_cacheable() {
        for kind in [
            TaskKind::Cloudflare,
            TaskKind::IndexNow,
            TaskKind::Exec,
            TaskKind::Hook,
            TaskKind::HtmlTransform,
            TaskKind::DataTransform,
            TaskKind::GitSync,
        ] {
            assert!(!kind.cacheable(), "{kind} must not be cacheable");
        }
        assert!(TaskKind::Build.cacheable());
        assert!(TaskKind::Audit.cacheable());
    }

    #[test]
    fn test_default_registry_covers_every_kind() {
        let registry = default_registry();
        for kind in TaskKind::ALL {
            assert!(registry.get(*kind).is_some(), "{kind} has no collaborator");
        }
    }

    #[test]
    fn test_expected_outputs_build() {
        let s = step(TaskKind::Build, json!({"task": "build", "out": "_site"}));
        assert_eq!(expected_outputs(&s), vec![PathBuf::from("/root/_site")]);
    }

    #[test]
    fn test_expected_outputs_llms() {
        let s = step(TaskKind::Llms, json!({"task": "llms", "siteRoot": "_site"}));
        let outputs = expected_outputs(&s);
        assert!(outputs.contains(&PathBuf::from("/root/_site/llms.txt")));
        assert!(outputs.contains(&PathBuf::from("/root/_site/llms.json")));
        assert!(outputs.contains(&PathBuf::from("/root/_site/llms-full.txt")));
    }

    #[test]
    fn test_expected_outputs_sitemap_defaults_to_site_root() {
        let s = step(
            TaskKind::Sitemap,
            json!({"task": "sitemap", "siteRoot": "_site", "html": true}),
        );
        let outputs = expected_outputs(&s);
        assert!(outputs.contains(&PathBuf::from("/root/_site/sitemap.xml")));
        assert!(outputs.contains(&PathBuf::from("/root/_site/sitemap.html")));
    }

    #[test]
    fn test_expected_outputs_missing_keys_empty() {
        let s = step(TaskKind::Build, json!({"task": "build"}));
        assert!(expected_outputs(&s).is_empty());

        let s = step(TaskKind::Exec, json!({"task": "exec", "command": "true"}));
        assert!(expected_outputs(&s).is_empty());
    }

    #[test]
    fn test_expected_outputs_hosting_targets() {
        let s = step(
            TaskKind::Hosting,
            json!({"task": "hosting", "siteRoot": "_site", "targets": "netlify,nginx"}),
        );
        let outputs = expected_outputs(&s);
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("/root/_site/netlify.toml"),
                PathBuf::from("/root/_site/nginx.conf"),
            ]
        );
    }

    #[test]
    fn test_expected_outputs_apidocs_batches() {
        let s = step(
            TaskKind::ApiDocs,
            json!({
                "task": "apidocs",
                "out": "api",
                "inputs": [{"xml": "a.xml", "out": "api/a"}],
            }),
        );
        let outputs = expected_outputs(&s);
        assert_eq!(
            outputs,
            vec![PathBuf::from("/root/api"), PathBuf::from("/root/api/a")]
        );
    }
}
