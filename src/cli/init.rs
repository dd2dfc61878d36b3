// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Init command - scaffold a new powerforge project

use colored::Colorize;
use miette::Result;

/// Initialize a new project in the current directory
pub async fn run(name: Option<String>, force: bool, _verbose: bool) -> Result<()> {
    let cwd = std::env::current_dir().map_err(|e| miette::miette!("{e}"))?;
    let name = name.unwrap_or_else(|| {
        cwd.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "site".into())
    });

    let files = [
        ("powerforge.json", pipeline_template()),
        ("site.json", site_template(&name)),
        ("content/index.html", index_template(&name)),
    ];

    for (relative, content) in files {
        let path = cwd.join(relative);
        if path.exists() && !force {
            println!("  {} {} (exists, use --force)", "○".dimmed(), relative);
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| miette::miette!("{e}"))?;
        }
        std::fs::write(&path, content)
            .map_err(|e| miette::miette!("Failed to write {relative}: {e}"))?;
        println!("  {} {relative}", "✓".green());
    }

    println!();
    println!("Project '{name}' initialized. Next:");
    println!("  powerforge validate");
    println!("  powerforge run");

    Ok(())
}

fn pipeline_template() -> String {
    r#"{
  // Pipeline for building, auditing, and publishing the site.
  "cache": true,
  "steps": [
    { "task": "build", "id": "build", "config": "site.json", "out": "_site" },
    { "task": "verify", "config": "site.json", "dependsOn": "build" },
    { "task": "sitemap", "siteRoot": "_site", "baseUrl": "https://example.com", "dependsOn": "build" },
    { "task": "audit", "siteRoot": "_site", "dependsOn": "build" },
  ],
}
"#
    .to_string()
}

fn site_template(name: &str) -> String {
    format!(
        r#"{{
  "title": "{name}",
  "baseUrl": "https://example.com",
  "source": "content"
}}
"#
    )
}

fn index_template(name: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head><title>{name}</title></head>\n\
         <body>\n<h1>{name}</h1>\n<p>Built with powerforge.</p>\n</body>\n</html>\n"
    )
}
