// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Documentation-oriented tasks
//!
//! `markdown-fix` runs hygiene checks over Markdown sources, `apidocs`
//! renders API reference indexes from .NET XML docs or PowerShell help,
//! `changelog` composes a changelog from git history, an existing file,
//! or GitHub releases, and `llms` emits the LLM manifest triple under
//! the site root.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use super::options::{ApiDocsOptions, ChangelogOptions, LlmsOptions, MarkdownFixOptions};
use super::{Collaborator, TaskContext, TaskOutcome};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::StepDefinition;

// ─────────────────────────────────────────────────────────────────────────
// markdown-fix
// ─────────────────────────────────────────────────────────────────────────

/// `markdown-fix` collaborator
pub struct MarkdownFixTask;

#[async_trait]
impl Collaborator for MarkdownFixTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = MarkdownFixOptions::from_step(step)?;

        let root = opts
            .path
            .as_deref()
            .or(opts.config.as_deref())
            .map(|p| step.resolve(p))
            .unwrap_or_else(|| step.base_dir.clone());

        let include: Vec<String> = if opts.include.is_empty() {
            vec!["**/*.md".to_string()]
        } else {
            opts.include.clone()
        };

        let files = resolve_globs(&root, &include, &opts.exclude)?;

        let mut with_issues = 0usize;
        let mut applied = 0usize;

        for file in &files {
            let text = match std::fs::read_to_string(file) {
                Ok(text) => text,
                Err(_) => continue,
            };

            let fixed = fix_markdown(&text);
            if fixed != text {
                with_issues += 1;
                if opts.apply {
                    std::fs::write(file, &fixed).map_err(|e| ForgeError::FileWriteError {
                        path: file.clone(),
                        error: e.to_string(),
                    })?;
                    applied += 1;
                }
            }
        }

        let message = if opts.apply {
            format!(
                "Markdown hygiene: {} file(s), {} fixed",
                files.len(),
                applied
            )
        } else {
            format!(
                "Markdown hygiene: {} file(s), {} with issues",
                files.len(),
                with_issues
            )
        };

        Ok(TaskOutcome::ok(message)
            .with_count("fileCount", files.len() as i64)
            .with_count("issueFileCount", with_issues as i64))
    }
}

/// Hygiene pass: strip trailing whitespace, collapse runs of blank
/// lines, guarantee a final newline
pub fn fix_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blanks = 0usize;

    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            blanks += 1;
            if blanks > 1 {
                continue;
            }
        } else {
            blanks = 0;
        }
        out.push_str(trimmed);
        out.push('\n');
    }

    // Drop a trailing blank line left by the collapse.
    while out.ends_with("\n\n") {
        out.pop();
    }

    out
}

/// Resolve include globs under `root`, minus excludes
fn resolve_globs(
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> ForgeResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    let excludes: Vec<glob::Pattern> = exclude
        .iter()
        .map(|p| glob::Pattern::new(p))
        .collect::<Result<_, _>>()?;

    for pattern in include {
        let full = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            root.join(pattern).to_string_lossy().to_string()
        };

        for entry in glob::glob(&full)?.flatten() {
            if !entry.is_file() {
                continue;
            }
            let relative = entry.strip_prefix(root).unwrap_or(&entry);
            if excludes.iter().any(|p| p.matches_path(relative)) {
                continue;
            }
            files.push(entry);
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

// ─────────────────────────────────────────────────────────────────────────
// apidocs
// ─────────────────────────────────────────────────────────────────────────

/// `apidocs` collaborator
pub struct ApiDocsTask;

#[async_trait]
impl Collaborator for ApiDocsTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = ApiDocsOptions::from_step(step)?;

        // Single-batch steps are just a one-element batch list.
        let batches: Vec<super::options::ApiDocsBatch> = if opts.inputs.is_empty() {
            vec![super::options::ApiDocsBatch {
                kind: opts.kind.clone(),
                xml: opts.xml.clone(),
                help_path: opts.help_path.clone(),
                out: opts.out.clone(),
            }]
        } else {
            opts.inputs.clone()
        };

        let mut types = 0usize;
        let mut members = 0usize;

        for batch in &batches {
            let out = batch
                .out
                .as_deref()
                .or(opts.out.as_deref())
                .map(|o| step.resolve(o))
                .ok_or_else(|| ForgeError::ConfigInvalid {
                    reason: format!("step '{}': apidocs batch requires 'out'", step.id),
                    help: None,
                })?;

            let kind = batch.kind.as_deref().unwrap_or("csharp");
            match kind {
                "csharp" => {
                    let xml = batch
                        .xml
                        .as_deref()
                        .map(|x| step.resolve(x))
                        .ok_or_else(|| ForgeError::ConfigInvalid {
                            reason: format!("step '{}': csharp apidocs require 'xml'", step.id),
                            help: None,
                        })?;
                    let (t, m) = render_csharp_docs(&xml, &out)?;
                    types += t;
                    members += m;
                }
                "powershell" => {
                    let help = batch
                        .help_path
                        .as_deref()
                        .map(|h| step.resolve(h))
                        .ok_or_else(|| ForgeError::ConfigInvalid {
                            reason: format!(
                                "step '{}': powershell apidocs require 'helpPath'",
                                step.id
                            ),
                            help: None,
                        })?;
                    let count = render_powershell_docs(&help, &out)?;
                    members += count;
                }
                other => {
                    return Err(ForgeError::ConfigInvalid {
                        reason: format!("step '{}': unknown apidocs type '{other}'", step.id),
                        help: Some("Supported types: csharp, powershell".into()),
                    });
                }
            }
        }

        let message = format!(
            "API docs: {} batch(es), {types} types, {members} members",
            batches.len()
        );
        Ok(TaskOutcome::ok(message)
            .with_count("typeCount", types as i64)
            .with_count("memberCount", members as i64))
    }
}

/// Render an index from a .NET XML documentation file
fn render_csharp_docs(xml: &Path, out: &Path) -> ForgeResult<(usize, usize)> {
    if !xml.is_file() {
        return Err(ForgeError::FileNotFound {
            path: xml.to_path_buf(),
            help: Some("Enable <GenerateDocumentationFile> in the project".into()),
        });
    }

    let text = std::fs::read_to_string(xml).map_err(|e| ForgeError::FileReadError {
        path: xml.to_path_buf(),
        error: e.to_string(),
    })?;

    let member = Regex::new(r#"<member\s+name\s*=\s*"([A-Z]):([^"]+)""#)?;
    let mut types = Vec::new();
    let mut members = 0usize;

    for capture in member.captures_iter(&text) {
        members += 1;
        if &capture[1] == "T" {
            types.push(capture[2].to_string());
        }
    }
    types.sort();

    std::fs::create_dir_all(out)?;
    let index = serde_json::json!({
        "source": xml.display().to_string(),
        "typeCount": types.len(),
        "memberCount": members,
        "types": types,
    });
    std::fs::write(out.join("index.json"), serde_json::to_string_pretty(&index)?)?;

    let mut html = String::from("<html><body><h1>API Reference</h1><ul>\n");
    for name in &types {
        html.push_str(&format!("<li><code>{name}</code></li>\n"));
    }
    html.push_str("</ul></body></html>\n");
    std::fs::write(out.join("index.html"), html)?;

    debug!(types = types.len(), members, out = %out.display(), "csharp docs rendered");
    Ok((types.len(), members))
}

/// Render an index from a PowerShell help directory
fn render_powershell_docs(help: &Path, out: &Path) -> ForgeResult<usize> {
    if !help.is_dir() {
        return Err(ForgeError::FileNotFound {
            path: help.to_path_buf(),
            help: None,
        });
    }

    let mut topics: Vec<String> = std::fs::read_dir(help)?
        .flatten()
        .filter(|e| {
            matches!(
                e.path().extension().and_then(|x| x.to_str()),
                Some("md") | Some("xml")
            )
        })
        .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().to_string()))
        .collect();
    topics.sort();
    topics.dedup();

    std::fs::create_dir_all(out)?;
    let index = serde_json::json!({
        "source": help.display().to_string(),
        "topicCount": topics.len(),
        "topics": topics,
    });
    std::fs::write(out.join("index.json"), serde_json::to_string_pretty(&index)?)?;

    Ok(topics.len())
}

// ─────────────────────────────────────────────────────────────────────────
// changelog
// ─────────────────────────────────────────────────────────────────────────

/// `changelog` collaborator
pub struct ChangelogTask;

#[async_trait]
impl Collaborator for ChangelogTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = ChangelogOptions::from_step(step)?;

        let out = opts
            .out
            .as_deref()
            .map(|o| step.resolve(o))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': changelog requires 'out'", step.id),
                help: None,
            })?;

        let (markdown, entries, source) = match opts.source.as_str() {
            "file" => changelog_from_file(&step.base_dir)?,
            "github" => changelog_from_github(&opts).await?,
            "auto" => match changelog_from_git(&step.base_dir, opts.max).await {
                Ok(found) => found,
                Err(_) => changelog_from_file(&step.base_dir)?,
            },
            "git" => changelog_from_git(&step.base_dir, opts.max).await?,
            other => {
                return Err(ForgeError::ConfigInvalid {
                    reason: format!("step '{}': unknown changelog source '{other}'", step.id),
                    help: Some("Supported sources: auto, file, github".into()),
                });
            }
        };

        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out, markdown).map_err(|e| ForgeError::FileWriteError {
            path: out.clone(),
            error: e.to_string(),
        })?;

        Ok(TaskOutcome::ok(format!(
            "Changelog: {entries} entries from {source} to {}",
            out.display()
        ))
        .with_count("entryCount", entries as i64))
    }
}

async fn changelog_from_git(dir: &Path, max: usize) -> ForgeResult<(String, usize, &'static str)> {
    let git = which::which("git").map_err(|_| ForgeError::tool_not_found("git"))?;

    let output = Command::new(git)
        .args(["log", "--pretty=format:%h %ad %s", "--date=short"])
        .arg(format!("-n{max}"))
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| ForgeError::ToolExecutionFailed {
            tool: "git".into(),
            error: e.to_string(),
            help: None,
        })?;

    if !output.status.success() {
        return Err(ForgeError::ToolExecutionFailed {
            tool: "git".into(),
            error: String::from_utf8_lossy(&output.stderr).to_string(),
            help: Some("Is this directory a git repository?".into()),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut markdown = String::from("# Changelog\n\n");
    let mut entries = 0usize;
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        markdown.push_str(&format!("- {line}\n"));
        entries += 1;
    }

    Ok((markdown, entries, "git"))
}

fn changelog_from_file(dir: &Path) -> ForgeResult<(String, usize, &'static str)> {
    let source = dir.join("CHANGELOG.md");
    if !source.is_file() {
        return Err(ForgeError::FileNotFound {
            path: source,
            help: Some("Set 'source: github' or run inside a git repository".into()),
        });
    }

    let text = std::fs::read_to_string(&source).map_err(|e| ForgeError::FileReadError {
        path: source,
        error: e.to_string(),
    })?;
    let entries = text.lines().filter(|l| l.starts_with("- ")).count();

    Ok((text, entries, "file"))
}

async fn changelog_from_github(
    opts: &ChangelogOptions,
) -> ForgeResult<(String, usize, &'static str)> {
    let repo = opts.repo.as_deref().ok_or_else(|| ForgeError::ConfigInvalid {
        reason: "changelog source 'github' requires 'repo' (owner/name)".into(),
        help: None,
    })?;

    #[derive(serde::Deserialize)]
    struct Release {
        name: Option<String>,
        tag_name: String,
        published_at: Option<String>,
        body: Option<String>,
    }

    let url = format!(
        "https://api.github.com/repos/{repo}/releases?per_page={}",
        opts.max
    );
    let client = reqwest::Client::new();
    let mut request = client
        .get(&url)
        .header("User-Agent", format!("powerforge/{}", crate::VERSION))
        .header("Accept", "application/vnd.github+json");
    if let Some(token) = &opts.token {
        request = request.header("Authorization", format!("Bearer {token}"));
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(ForgeError::Http {
            message: format!("GitHub releases request failed: {}", response.status()),
        });
    }
    let releases: Vec<Release> = response.json().await?;

    let mut markdown = String::from("# Changelog\n");
    for release in &releases {
        let title = release.name.as_deref().unwrap_or(&release.tag_name);
        let date = release.published_at.as_deref().unwrap_or("");
        markdown.push_str(&format!("\n## {title} ({date})\n\n"));
        if let Some(body) = &release.body {
            markdown.push_str(body.trim());
            markdown.push('\n');
        }
    }

    Ok((markdown, releases.len(), "github"))
}

// ─────────────────────────────────────────────────────────────────────────
// llms
// ─────────────────────────────────────────────────────────────────────────

/// `llms` collaborator: emit llms.txt, llms.json, llms-full.txt
pub struct LlmsTask;

#[async_trait]
impl Collaborator for LlmsTask {
    async fn run(&self, step: &StepDefinition, _ctx: &TaskContext) -> ForgeResult<TaskOutcome> {
        let opts = LlmsOptions::from_step(step)?;

        let site_root = opts
            .site_root
            .as_deref()
            .map(|s| step.resolve(s))
            .ok_or_else(|| ForgeError::ConfigInvalid {
                reason: format!("step '{}': llms requires 'siteRoot'", step.id),
                help: None,
            })?;

        if !site_root.is_dir() {
            return Err(ForgeError::file_not_found_in_step(site_root, &step.id));
        }

        let project = opts.project.as_deref().unwrap_or("site");
        let title_re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>")?;
        let tag_re = Regex::new(r"(?s)<[^>]+>")?;

        let pages = super::audit::collect_html_files(&site_root);
        let mut listing = Vec::new();
        for page in &pages {
            let Ok(html) = std::fs::read_to_string(page) else {
                continue;
            };
            let rel = page
                .strip_prefix(&site_root)
                .unwrap_or(page)
                .display()
                .to_string();
            let title = title_re
                .captures(&html)
                .map(|c| c[1].trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| rel.clone());
            let text: String = tag_re.replace_all(&html, " ").to_string();
            let excerpt: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
            listing.push((rel, title, excerpt));
        }

        // llms.txt: compact index.
        let mut txt = format!("# {project}\n\n");
        for (rel, title, _) in &listing {
            txt.push_str(&format!("- /{rel}: {title}\n"));
        }

        // llms-full.txt: index plus page text.
        let mut full = format!("# {project}\n");
        for (rel, title, excerpt) in &listing {
            let clipped: String = excerpt.chars().take(2000).collect();
            full.push_str(&format!("\n## /{rel}: {title}\n{clipped}\n"));
        }

        let mut json = serde_json::json!({
            "project": project,
            "pageCount": listing.len(),
            "pages": listing
                .iter()
                .map(|(rel, title, _)| serde_json::json!({"path": rel, "title": title}))
                .collect::<Vec<_>>(),
        });

        // Optional API section sourced from an apidocs index.
        if let Some(api_index) = opts.api_index.as_deref().map(|p| step.resolve(p)) {
            if let Some(index) = std::fs::read_to_string(&api_index)
                .ok()
                .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
            {
                let types: Vec<String> = index
                    .get("types")
                    .and_then(|t| t.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .take(opts.api_max_types.unwrap_or(100))
                            .collect()
                    })
                    .unwrap_or_default();

                if !types.is_empty() {
                    txt.push_str("\n## API\n");
                    for name in &types {
                        txt.push_str(&format!("- {name}\n"));
                    }
                    json["api"] = serde_json::json!({
                        "base": opts.api_base,
                        "typeCount": types.len(),
                        "types": types,
                    });
                }
            }
        }

        std::fs::write(site_root.join("llms.txt"), &txt)?;
        std::fs::write(
            site_root.join("llms.json"),
            serde_json::to_string_pretty(&json)?,
        )?;
        std::fs::write(site_root.join("llms-full.txt"), &full)?;

        Ok(TaskOutcome::ok(format!("LLM manifest: {} page(s)", listing.len()))
            .with_count("pageCount", listing.len() as i64))
    }
}
