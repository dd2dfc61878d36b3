// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Per-task option records
//!
//! Each task kind deserializes its options from the raw step JSON.
//! Unknown keys are ignored so pipelines stay forwards-compatible with
//! newer option sets.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::StepDefinition;

/// Step keys whose string values are filesystem paths for fingerprinting
///
/// Arrays of strings map element-wise; arrays of objects recurse one
/// level over the same key set (`inputs: [{xml, out}]`, `repos: [{path}]`).
/// http/https URLs are never treated as paths.
pub const FINGERPRINT_PATH_KEYS: &[&str] = &[
    "apiIndex",
    "baselinePath",
    "cacheHeadersOut",
    "config",
    "destination",
    "entries",
    "helpPath",
    "hashManifest",
    "navProfiles",
    "out",
    "path",
    "project",
    "reportPath",
    "sarifPath",
    "siteRoot",
    "source",
    "summaryPath",
    "xml",
];

fn parse<T: for<'de> Deserialize<'de>>(step: &StepDefinition) -> ForgeResult<T> {
    serde_json::from_value(step.element.clone()).map_err(|e| ForgeError::ConfigInvalid {
        reason: format!("step '{}': {}", step.id, e),
        help: None,
    })
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    pub config: Option<String>,
    pub out: Option<String>,
    pub clean: bool,
}

impl BuildOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyOptions {
    pub config: Option<String>,
    pub fail_on_warnings: bool,
    pub fail_on_nav_lint: bool,
    pub fail_on_theme_contract: bool,
}

impl VerifyOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkdownFixOptions {
    pub config: Option<String>,
    pub path: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub apply: bool,
}

impl MarkdownFixOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiDocsBatch {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub xml: Option<String>,
    pub help_path: Option<String>,
    pub out: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiDocsOptions {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub xml: Option<String>,
    pub help_path: Option<String>,
    pub out: Option<String>,
    pub inputs: Vec<ApiDocsBatch>,
}

impl ApiDocsOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangelogOptions {
    pub out: Option<String>,
    pub source: String,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub max: usize,
}

impl Default for ChangelogOptions {
    fn default() -> Self {
        Self {
            out: None,
            source: "auto".into(),
            repo: None,
            token: None,
            max: 50,
        }
    }
}

impl ChangelogOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmsOptions {
    pub site_root: Option<String>,
    pub project: Option<String>,
    pub api_index: Option<String>,
    pub api_base: Option<String>,
    pub api_level: Option<String>,
    pub api_max_types: Option<usize>,
    pub api_max_members: Option<usize>,
}

impl LlmsOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SitemapOptions {
    pub site_root: Option<String>,
    pub base_url: Option<String>,
    pub out: Option<String>,
    pub entries: Option<String>,
    pub html: bool,
    pub news_output: Option<String>,
    pub image_output: Option<String>,
    pub video_output: Option<String>,
    pub sitemap_index: bool,
}

impl SitemapOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizeOptions {
    pub site_root: Option<String>,
    pub minify_html: bool,
    pub minify_css: bool,
    pub minify_js: bool,
    pub optimize_images: bool,
    pub hash_assets: bool,
    pub cache_headers: bool,
    pub cache_headers_out: Option<String>,
    pub hash_manifest: Option<String>,
    pub report_path: Option<String>,
    pub image_fail_on_budget: bool,
}

impl OptimizeOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditOptions {
    pub site_root: Option<String>,
    #[serde(default = "default_true")]
    pub check_links: bool,
    #[serde(default = "default_true")]
    pub check_assets: bool,
    pub check_nav: bool,
    pub nav_profiles: Option<String>,
    pub required_routes: Vec<String>,
    pub rendered: bool,
    pub baseline_generate: bool,
    pub baseline_update: bool,
    pub baseline_path: Option<String>,
    pub summary_path: Option<String>,
    pub sarif_path: Option<String>,
    pub fail_on_warnings: bool,
    pub fail_on_new_issues: bool,
    pub max_errors: Option<usize>,
    pub max_warnings: Option<usize>,
    pub fail_on_categories: Vec<String>,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            site_root: None,
            check_links: true,
            check_assets: true,
            check_nav: false,
            nav_profiles: None,
            required_routes: Vec::new(),
            rendered: false,
            baseline_generate: false,
            baseline_update: false,
            baseline_path: None,
            summary_path: None,
            sarif_path: None,
            fail_on_warnings: false,
            fail_on_new_issues: false,
            max_errors: None,
            max_warnings: None,
            fail_on_categories: Vec::new(),
        }
    }
}

impl AuditOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DoctorOptions {
    pub config: Option<String>,
    pub site_root: Option<String>,
    pub out: Option<String>,
    #[serde(default = "default_true")]
    pub build: bool,
    #[serde(default = "default_true")]
    pub verify: bool,
    #[serde(default = "default_true")]
    pub audit: bool,
    pub no_build: bool,
    pub no_verify: bool,
    pub no_audit: bool,
}

impl Default for DoctorOptions {
    fn default() -> Self {
        Self {
            config: None,
            site_root: None,
            out: None,
            build: true,
            verify: true,
            audit: true,
            no_build: false,
            no_verify: false,
            no_audit: false,
        }
    }
}

impl DoctorOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }

    /// The `no*` switches override the positive flags
    pub fn runs_build(&self) -> bool {
        self.build && !self.no_build
    }

    pub fn runs_verify(&self) -> bool {
        self.verify && !self.no_verify
    }

    pub fn runs_audit(&self) -> bool {
        self.audit && !self.no_audit
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DotnetBuildOptions {
    pub project: Option<String>,
    pub configuration: Option<String>,
    pub framework: Option<String>,
    pub runtime: Option<String>,
    pub no_restore: bool,
}

impl DotnetBuildOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DotnetPublishOptions {
    pub project: Option<String>,
    pub out: Option<String>,
    pub clean: bool,
    pub self_contained: bool,
    pub no_build: bool,
    pub no_restore: bool,
    pub base_href: Option<String>,
    pub no_blazor_fixes: bool,
}

impl DotnetPublishOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayOptions {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub clean: bool,
}

impl OverlayOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

/// Hosting configuration targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostingTarget {
    Netlify,
    Azure,
    Vercel,
    Apache,
    Nginx,
    Iis,
}

impl HostingTarget {
    pub const ALL: &'static [HostingTarget] = &[
        Self::Netlify,
        Self::Azure,
        Self::Vercel,
        Self::Apache,
        Self::Nginx,
        Self::Iis,
    ];

    /// The config file this target expects at the site root
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Netlify => "netlify.toml",
            Self::Azure => "staticwebapp.config.json",
            Self::Vercel => "vercel.json",
            Self::Apache => ".htaccess",
            Self::Nginx => "nginx.conf",
            Self::Iis => "web.config",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Netlify => "netlify",
            Self::Azure => "azure",
            Self::Vercel => "vercel",
            Self::Apache => "apache",
            Self::Nginx => "nginx",
            Self::Iis => "iis",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "netlify" => Some(Self::Netlify),
            "azure" => Some(Self::Azure),
            "vercel" => Some(Self::Vercel),
            "apache" => Some(Self::Apache),
            "nginx" => Some(Self::Nginx),
            "iis" => Some(Self::Iis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostingOptions {
    pub site_root: Option<String>,
    /// `"all"`, a CSV string, or an array of target names
    pub targets: Option<Value>,
    pub remove_unselected: bool,
    pub strict: bool,
    pub dry_run: bool,
}

impl HostingOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }

    /// Resolve the selected targets, preserving declaration order
    ///
    /// Unknown target names are returned separately so `strict` mode can
    /// reject them while the default mode only warns.
    pub fn selected_targets(&self) -> (Vec<HostingTarget>, Vec<String>) {
        let mut names: Vec<String> = Vec::new();
        match &self.targets {
            Some(Value::String(s)) => {
                names.extend(s.split(',').map(|p| p.trim().to_string()));
            }
            Some(Value::Array(items)) => {
                names.extend(items.iter().filter_map(Value::as_str).map(String::from));
            }
            _ => {}
        }

        if names.iter().any(|n| n.eq_ignore_ascii_case("all")) {
            return (HostingTarget::ALL.to_vec(), Vec::new());
        }

        let mut selected = Vec::new();
        let mut unknown = Vec::new();
        for name in names.iter().filter(|n| !n.is_empty()) {
            match HostingTarget::parse(name) {
                Some(target) if !selected.contains(&target) => selected.push(target),
                Some(_) => {}
                None => unknown.push(name.clone()),
            }
        }
        (selected, unknown)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecOptions {
    pub command: Option<String>,
    pub shell: String,
    pub working_dir: Option<String>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            command: None,
            shell: "bash".into(),
            working_dir: None,
        }
    }
}

impl ExecOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HtmlTransformOptions {
    pub site_root: Option<String>,
    pub find: Option<String>,
    pub replace: Option<String>,
    pub include: Vec<String>,
}

impl HtmlTransformOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataTransformOptions {
    pub path: Option<String>,
    #[serde(default = "default_true")]
    pub pretty: bool,
    pub sort_keys: bool,
}

impl Default for DataTransformOptions {
    fn default() -> Self {
        Self {
            path: None,
            pretty: true,
            sort_keys: false,
        }
    }
}

impl DataTransformOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitSyncOptions {
    pub source: Option<String>,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub message: Option<String>,
}

impl GitSyncOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudflareOptions {
    pub zone_id: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_true")]
    pub purge_everything: bool,
    pub files: Vec<String>,
}

impl Default for CloudflareOptions {
    fn default() -> Self {
        Self {
            zone_id: None,
            token: None,
            purge_everything: true,
            files: Vec::new(),
        }
    }
}

impl CloudflareOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexNowOptions {
    pub site_root: Option<String>,
    pub base_url: Option<String>,
    pub key: Option<String>,
    pub urls: Vec<String>,
    pub endpoint: String,
}

impl Default for IndexNowOptions {
    fn default() -> Self {
        Self {
            site_root: None,
            base_url: None,
            key: None,
            urls: Vec::new(),
            endpoint: "https://api.indexnow.org/indexnow".into(),
        }
    }
}

impl IndexNowOptions {
    pub fn from_step(step: &StepDefinition) -> ForgeResult<Self> {
        parse(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn step(element: serde_json::Value) -> StepDefinition {
        StepDefinition {
            index: 1,
            task: crate::tasks::TaskKind::Build,
            id: "build-1".into(),
            depends_on: vec![],
            dependency_indexes: vec![],
            element,
            base_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let s = step(serde_json::json!({
            "task": "build",
            "config": "site.json",
            "out": "_site",
            "futureOption": 42,
        }));
        let opts = BuildOptions::from_step(&s).unwrap();
        assert_eq!(opts.config.as_deref(), Some("site.json"));
        assert!(!opts.clean);
    }

    #[test]
    fn test_audit_defaults() {
        let s = step(serde_json::json!({"task": "audit", "siteRoot": "_site"}));
        let opts = AuditOptions::from_step(&s).unwrap();
        assert!(opts.check_links);
        assert!(opts.check_assets);
        assert!(!opts.check_nav);
        assert!(opts.max_errors.is_none());
    }

    #[test]
    fn test_doctor_no_flags_override() {
        let s = step(serde_json::json!({"task": "doctor", "noAudit": true}));
        let opts = DoctorOptions::from_step(&s).unwrap();
        assert!(opts.runs_build());
        assert!(opts.runs_verify());
        assert!(!opts.runs_audit());
    }

    #[test]
    fn test_hosting_targets_csv_and_all() {
        let s = step(serde_json::json!({"task": "hosting", "targets": "netlify, vercel"}));
        let (targets, unknown) = HostingOptions::from_step(&s).unwrap().selected_targets();
        assert_eq!(targets, vec![HostingTarget::Netlify, HostingTarget::Vercel]);
        assert!(unknown.is_empty());

        let s = step(serde_json::json!({"task": "hosting", "targets": "all"}));
        let (targets, _) = HostingOptions::from_step(&s).unwrap().selected_targets();
        assert_eq!(targets.len(), HostingTarget::ALL.len());
    }

    #[test]
    fn test_hosting_unknown_target_reported() {
        let s = step(serde_json::json!({"task": "hosting", "targets": ["netlify", "gopher"]}));
        let (targets, unknown) = HostingOptions::from_step(&s).unwrap().selected_targets();
        assert_eq!(targets, vec![HostingTarget::Netlify]);
        assert_eq!(unknown, vec!["gopher".to_string()]);
    }

    #[test]
    fn test_changelog_defaults() {
        let s = step(serde_json::json!({"task": "changelog", "out": "CHANGELOG.md"}));
        let opts = ChangelogOptions::from_step(&s).unwrap();
        assert_eq!(opts.source, "auto");
        assert_eq!(opts.max, 50);
    }

    #[test]
    fn test_apidocs_batches() {
        let s = step(serde_json::json!({
            "task": "apidocs",
            "inputs": [
                {"type": "csharp", "xml": "a.xml", "out": "api/a"},
                {"type": "powershell", "helpPath": "help", "out": "api/b"},
            ],
        }));
        let opts = ApiDocsOptions::from_step(&s).unwrap();
        assert_eq!(opts.inputs.len(), 2);
        assert_eq!(opts.inputs[0].kind.as_deref(), Some("csharp"));
        assert_eq!(opts.inputs[1].out.as_deref(), Some("api/b"));
    }
}
