// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Publishing-surface tasks
//!
//! `sitemap` emits the sitemap family, `optimize` owns the asset-hash
//! manifest, cache-header emission, and the optimization report,
//! `hosting` writes per-provider configuration files, and `overlay`
//! copies a filtered tree into the site.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::audit::collect_html_files;
use super::options::{HostingOptions, HostingTarget, OptimizeOptions, OverlayOptions, SitemapOptions};
use super::{Collaborator, TaskContext, TaskOutcome};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::StepDefinition;

// ─────────────────────────────────────────────────────────────────────────
// sitemap
// ─────────────────────────────────────────────────────────────────────────

/// `sitemap` collaborator
pub struct SitemapTask;

#[async_trait]
impl Collaborator for SitemapTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = SitemapOptions::from_step(step)?;

        let site_root = opts
            .site_root
            .as_deref()
            .map(|s| step.resolve(s))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': sitemap requires 'siteRoot'", step.id),
                help: None,
            })?;
        let base_url = opts
            .base_url
            .as_deref()
            .map(|b| b.trim_end_matches('/').to_string())
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': sitemap requires 'baseUrl'", step.id),
                help: None,
            })?;

        if !site_root.is_dir() {
            return Err(ForgeError::file_not_found_in_step(site_root, &step.id));
        }

        let mut urls: Vec<String> = collect_html_files(&site_root)
            .iter()
            .map(|page| {
                let rel = page
                    .strip_prefix(&site_root)
                    .unwrap_or(page)
                    .display()
                    .to_string()
                    .replace('\\', "/");
                if rel == "index.html" {
                    format!("{base_url}/")
                } else if let Some(dir) = rel.strip_suffix("/index.html") {
                    format!("{base_url}/{dir}/")
                } else {
                    format!("{base_url}/{rel}")
                }
            })
            .collect();

        // Extra entries come from a JSON array of URLs or paths.
        if let Some(entries) = opts.entries.as_deref().map(|e| step.resolve(e)) {
            if let Some(extra) = std::fs::read_to_string(&entries)
                .ok()
                .and_then(|text| serde_json::from_str::<Vec<String>>(&text).ok())
            {
                for entry in extra {
                    if entry.starts_with("http://") || entry.starts_with("https://") {
                        urls.push(entry);
                    } else {
                        urls.push(format!("{base_url}/{}", entry.trim_start_matches('/')));
                    }
                }
            }
        }

        urls.sort();
        urls.dedup();

        let out = opts
            .out
            .as_deref()
            .map(|o| step.resolve(o))
            .unwrap_or_else(|| site_root.join("sitemap.xml"));
        write_urlset(&out, &urls)?;

        if opts.html {
            let mut html = String::from("<html><body><h1>Sitemap</h1><ul>\n");
            for url in &urls {
                html.push_str(&format!("<li><a href=\"{url}\">{url}</a></li>\n"));
            }
            html.push_str("</ul></body></html>\n");
            std::fs::write(site_root.join("sitemap.html"), html)?;
        }

        for (output, tag) in [
            (&opts.news_output, "news"),
            (&opts.image_output, "image"),
            (&opts.video_output, "video"),
        ] {
            if let Some(output) = output.as_deref().map(|o| step.resolve(o)) {
                write_extension_sitemap(&output, &urls, tag)?;
            }
        }

        if opts.sitemap_index {
            let index = site_root.join("sitemap-index.xml");
            let body = format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n\
                 <sitemap><loc>{base_url}/sitemap.xml</loc></sitemap>\n\
                 </sitemapindex>\n"
            );
            std::fs::write(index, body)?;
        }

        Ok(TaskOutcome::ok(format!(
            "Sitemap: {} URLs to {}",
            urls.len(),
            out.display()
        ))
        .with_count("urlCount", urls.len() as i64))
    }
}

fn write_urlset(out: &Path, urls: &[String]) -> ForgeResult<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for url in urls {
        xml.push_str(&format!("  <url><loc>{url}</loc></url>\n"));
    }
    xml.push_str("</urlset>\n");
    std::fs::write(out, xml).map_err(|e| ForgeError::FileWriteError {
        path: out.to_path_buf(),
        error: e.to_string(),
    })
}

fn write_extension_sitemap(out: &Path, urls: &[String], tag: &str) -> ForgeResult<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\" \
         xmlns:{tag}=\"http://www.google.com/schemas/sitemap-{tag}/1.1\">\n"
    );
    for url in urls {
        xml.push_str(&format!("  <url><loc>{url}</loc></url>\n"));
    }
    xml.push_str("</urlset>\n");
    std::fs::write(out, xml).map_err(|e| ForgeError::FileWriteError {
        path: out.to_path_buf(),
        error: e.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────
// optimize
// ─────────────────────────────────────────────────────────────────────────

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico"];

/// Per-image size budget when `imageFailOnBudget` is set
const DEFAULT_IMAGE_BUDGET_BYTES: u64 = 512 * 1024;

/// `optimize` collaborator
///
/// The minification algorithms themselves live outside the orchestrator;
/// this adapter owns the asset-hash manifest, cache-header emission, and
/// the optimization report.
pub struct OptimizeTask;

#[async_trait]
impl Collaborator for OptimizeTask {
    async fn run(&self, step: &StepDefinition, ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = OptimizeOptions::from_step(step)?;

        let site_root = opts
            .site_root
            .as_deref()
            .map(|s| step.resolve(s))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': optimize requires 'siteRoot'", step.id),
                help: None,
            })?;

        if !site_root.is_dir() {
            return Err(ForgeError::file_not_found_in_step(site_root, &step.id));
        }

        let mut files = collect_files(&site_root);

        // Fast mode: restrict to what the last build actually touched.
        if ctx.fast && !ctx.last_build_updated.is_empty() {
            let updated: std::collections::HashSet<&PathBuf> =
                ctx.last_build_updated.iter().collect();
            files.retain(|f| updated.contains(f));
            debug!(files = files.len(), "fast mode: optimizing updated files only");
        }

        let mut census: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut hashed: BTreeMap<String, String> = BTreeMap::new();
        let mut oversized = Vec::new();
        let mut total_bytes = 0u64;

        for file in &files {
            let ext = file
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            let size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
            total_bytes += size;

            let class = if ext == "html" {
                "html"
            } else if ext == "css" {
                "css"
            } else if ext == "js" {
                "js"
            } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                "image"
            } else {
                "other"
            };
            *census.entry(class).or_default() += 1;

            if opts.optimize_images
                && opts.image_fail_on_budget
                && class == "image"
                && size > DEFAULT_IMAGE_BUDGET_BYTES
            {
                oversized.push(format!(
                    "{} ({size} bytes)",
                    file.strip_prefix(&site_root).unwrap_or(file).display()
                ));
            }

            // Hash the cacheable asset classes for the manifest.
            if opts.hash_assets && matches!(class, "css" | "js" | "image") {
                if let Ok(bytes) = std::fs::read(file) {
                    let rel = file
                        .strip_prefix(&site_root)
                        .unwrap_or(file)
                        .display()
                        .to_string()
                        .replace('\\', "/");
                    hashed.insert(rel, blake3::hash(&bytes).to_hex().to_string());
                }
            }
        }

        if !oversized.is_empty() {
            return Err(ForgeError::TaskFailed {
                step: step.id.clone(),
                message: format!(
                    "{} image(s) over the {DEFAULT_IMAGE_BUDGET_BYTES} byte budget: {}",
                    oversized.len(),
                    oversized.join(", ")
                ),
                help: Some("Re-encode the offending images or raise the budget".into()),
            });
        }

        if opts.hash_assets {
            let manifest_path = opts
                .hash_manifest
                .as_deref()
                .map(|m| step.resolve(m))
                .unwrap_or_else(|| site_root.join("asset-manifest.json"));
            if let Some(parent) = manifest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&manifest_path, serde_json::to_string_pretty(&hashed)?)?;
        }

        if opts.cache_headers {
            let headers_path = opts
                .cache_headers_out
                .as_deref()
                .map(|o| step.resolve(o))
                .unwrap_or_else(|| site_root.join("_headers"));
            write_cache_headers(&headers_path)?;
        }

        if let Some(report) = opts.report_path.as_deref().map(|r| step.resolve(r)) {
            if let Some(parent) = report.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let body = serde_json::json!({
                "fileCount": files.len(),
                "totalBytes": total_bytes,
                "census": census,
                "hashedCount": hashed.len(),
                "minifyHtml": opts.minify_html,
                "minifyCss": opts.minify_css,
                "minifyJs": opts.minify_js,
            });
            std::fs::write(&report, serde_json::to_string_pretty(&body)?)?;
        }

        Ok(TaskOutcome::ok(format!(
            "Optimized {}: {} files, {} hashed",
            site_root.display(),
            files.len(),
            hashed.len()
        ))
        .with_count("fileCount", files.len() as i64)
        .with_count("hashedCount", hashed.len() as i64))
    }
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
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
            } else {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

fn write_cache_headers(path: &Path) -> ForgeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = "/*\n  Cache-Control: public, max-age=0, must-revalidate\n\n\
                /assets/*\n  Cache-Control: public, max-age=31536000, immutable\n\n\
                /*.css\n  Cache-Control: public, max-age=31536000, immutable\n\n\
                /*.js\n  Cache-Control: public, max-age=31536000, immutable\n";
    std::fs::write(path, body).map_err(|e| ForgeError::FileWriteError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────
// hosting
// ─────────────────────────────────────────────────────────────────────────

/// `hosting` collaborator: per-provider config emission
pub struct HostingTask;

#[async_trait]
impl Collaborator for HostingTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = HostingOptions::from_step(step)?;

        let site_root = opts
            .site_root
            .as_deref()
            .map(|s| step.resolve(s))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': hosting requires 'siteRoot'", step.id),
                help: None,
            })?;

        if !site_root.is_dir() {
            return Err(ForgeError::file_not_found_in_step(site_root, &step.id));
        }

        let (targets, unknown) = opts.selected_targets();
        if targets.is_empty() && unknown.is_empty() {
            return Err(ForgeError::ConfigInvalid {
                reason: format!("step '{}': hosting requires 'targets'", step.id),
                help: Some("Use \"all\" or a list of: netlify, azure, vercel, apache, nginx, iis".into()),
            });
        }
        if !unknown.is_empty() && opts.strict {
            return Err(ForgeError::ConfigInvalid {
                reason: format!(
                    "step '{}': unknown hosting target(s): {}",
                    step.id,
                    unknown.join(", ")
                ),
                help: None,
            });
        }

        let mut warnings: Vec<String> = unknown
            .iter()
            .map(|t| format!("unknown hosting target '{t}' ignored"))
            .collect();

        let mut written = 0usize;
        let mut removed = 0usize;

        for target in &targets {
            let path = site_root.join(target.file_name());
            if opts.dry_run {
                warnings.push(format!("dry run: would write {}", path.display()));
                continue;
            }
            std::fs::write(&path, hosting_config_body(*target)).map_err(|e| {
                ForgeError::FileWriteError {
                    path: path.clone(),
                    error: e.to_string(),
                }
            })?;
            written += 1;
        }

        if opts.remove_unselected {
            for target in HostingTarget::ALL {
                if targets.contains(target) {
                    continue;
                }
                let path = site_root.join(target.file_name());
                if path.is_file() {
                    if opts.dry_run {
                        warnings.push(format!("dry run: would remove {}", path.display()));
                    } else {
                        std::fs::remove_file(&path)?;
                        removed += 1;
                    }
                }
            }
        }

        let message = if opts.dry_run {
            format!("Hosting (dry run): {} target(s) selected", targets.len())
        } else if removed > 0 {
            format!("Hosting: {written} config(s) written, {removed} removed")
        } else {
            format!("Hosting: {written} config(s) written")
        };

        Ok(TaskOutcome::ok(message)
            .with_count("targetCount", targets.len() as i64)
            .with_warnings(warnings))
    }
}

/// Minimal provider configuration for a static site
fn hosting_config_body(target: HostingTarget) -> String {
    match target {
        HostingTarget::Netlify => "[[headers]]\n  for = \"/*\"\n  [headers.values]\n    \
             X-Content-Type-Options = \"nosniff\"\n\n[[redirects]]\n  from = \"/*\"\n  \
             to = \"/404.html\"\n  status = 404\n"
            .to_string(),
        HostingTarget::Azure => serde_json::to_string_pretty(&serde_json::json!({
            "navigationFallback": {"rewrite": "/404.html"},
            "globalHeaders": {"X-Content-Type-Options": "nosniff"},
        }))
        .unwrap_or_default(),
        HostingTarget::Vercel => serde_json::to_string_pretty(&serde_json::json!({
            "cleanUrls": true,
            "trailingSlash": true,
        }))
        .unwrap_or_default(),
        HostingTarget::Apache => "Options -Indexes\nErrorDocument 404 /404.html\n\
             <IfModule mod_headers.c>\n  Header set X-Content-Type-Options \"nosniff\"\n\
             </IfModule>\n"
            .to_string(),
        HostingTarget::Nginx => "server {\n    listen 80;\n    root /usr/share/nginx/html;\n    \
             index index.html;\n    error_page 404 /404.html;\n    \
             add_header X-Content-Type-Options nosniff;\n}\n"
            .to_string(),
        HostingTarget::Iis => "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<configuration>\n  \
             <system.webServer>\n    <httpErrors errorMode=\"Custom\">\n      \
             <error statusCode=\"404\" path=\"/404.html\" responseMode=\"ExecuteURL\" />\n    \
             </httpErrors>\n  </system.webServer>\n</configuration>\n"
            .to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────
// overlay
// ─────────────────────────────────────────────────────────────────────────

/// `overlay` collaborator: filtered tree copy into the site
pub struct OverlayTask;

#[async_trait]
impl Collaborator for OverlayTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = OverlayOptions::from_step(step)?;

        let source = opts
            .source
            .as_deref()
            .map(|s| step.resolve(s))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': overlay requires 'source'", step.id),
                help: None,
            })?;
        let destination = opts
            .destination
            .as_deref()
            .map(|d| step.resolve(d))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': overlay requires 'destination'", step.id),
                help: None,
            })?;

        if !source.is_dir() {
            return Err(ForgeError::file_not_found_in_step(source, &step.id));
        }

        if opts.clean && destination.exists() {
            std::fs::remove_dir_all(&destination)?;
        }
        std::fs::create_dir_all(&destination)?;

        let includes: Vec<glob::Pattern> = if opts.include.is_empty() {
            vec![glob::Pattern::new("**/*")?]
        } else {
            opts.include
                .iter()
                .map(|p| glob::Pattern::new(p))
                .collect::<Result<_, _>>()?
        };
        let excludes: Vec<glob::Pattern> = opts
            .exclude
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<Result<_, _>>()?;

        let mut copied = 0usize;
        for file in collect_files(&source) {
            let relative = file.strip_prefix(&source).unwrap_or(&file);
            if !includes.iter().any(|p| p.matches_path(relative)) {
                continue;
            }
            if excludes.iter().any(|p| p.matches_path(relative)) {
                continue;
            }

            let to = destination.join(relative);
            if let Some(parent) = to.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&file, &to).map_err(|e| ForgeError::FileWriteError {
                path: to.clone(),
                error: e.to_string(),
            })?;
            copied += 1;
        }

        Ok(TaskOutcome::ok(format!(
            "Overlay: {copied} file(s) to {}",
            destination.display()
        ))
        .with_count("copiedCount", copied as i64))
    }
}
