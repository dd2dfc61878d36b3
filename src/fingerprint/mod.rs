// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Step fingerprinting
//!
//! A fingerprint is the content address of a step: a SHA-256 over the
//! tool salt, the raw step JSON, and sorted stamps for every path the
//! step references through a fingerprint-path key. Identical input,
//! identical filesystem state, and an identical salt always produce the
//! same hex digest.

mod stamp;

pub use stamp::{stamp_path, MAX_DIR_STAMP_FILES};

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::pipeline::StepDefinition;
use crate::tasks::options::FINGERPRINT_PATH_KEYS;
use crate::utils::paths::normalize_path;

/// Identity token mixed into every salt; distinguishes the pipeline
/// module from other fingerprint producers sharing the cache format.
const MODULE_TOKEN: &str = "pipeline";

/// Tool-fingerprint salt
///
/// Carries the orchestrator and engine versions so upgrading the binary
/// invalidates every cached step. Fast mode salts separately: a partial
/// build must never poison the full-mode cache.
pub fn tool_salt(fast: bool) -> String {
    let prefix = if fast { "fast|" } else { "" };
    format!(
        "{prefix}powerforge/{version}|engine/{version}|{MODULE_TOKEN}",
        version = crate::VERSION
    )
}

/// Compute the fingerprint for a step
pub fn fingerprint_step(step: &StepDefinition, salt: &str) -> String {
    let raw = serde_json::to_string(&step.element).unwrap_or_default();

    let mut stamps: Vec<String> = collect_paths(&step.element, &step.base_dir)
        .iter()
        .map(|p| stamp_path(p))
        .collect();
    stamps.sort();

    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"\n");
    hasher.update(raw.as_bytes());
    for stamp in &stamps {
        hasher.update(b"\n");
        hasher.update(stamp.as_bytes());
    }

    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Collect every path the step references through a fingerprint-path key
///
/// String values map directly, arrays of strings element-wise, and
/// arrays of objects recurse one level over the same key set (covers
/// `inputs: [{xml, out}]` and `repos: [{path}]` shapes). Values that
/// parse as http/https URLs are not paths.
pub fn collect_paths(element: &Value, base_dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    collect_from_object(element, base_dir, &mut paths, true);
    paths.sort();
    paths.dedup();
    paths
}

fn collect_from_object(element: &Value, base_dir: &Path, paths: &mut Vec<PathBuf>, nest: bool) {
    let Some(obj) = element.as_object() else {
        return;
    };

    for key in FINGERPRINT_PATH_KEYS {
        match obj.get(*key) {
            Some(Value::String(s)) => push_path(s, base_dir, paths),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::String(s) = item {
                        push_path(s, base_dir, paths);
                    }
                }
            }
            _ => {}
        }
    }

    if nest {
        // One level of nested objects (batch inputs, repo lists).
        for value in obj.values() {
            if let Value::Array(items) = value {
                for item in items {
                    if item.is_object() {
                        collect_from_object(item, base_dir, paths, false);
                    }
                }
            }
        }
    }
}

fn push_path(value: &str, base_dir: &Path, paths: &mut Vec<PathBuf>) {
    let trimmed = value.trim();
    if trimmed.is_empty() || is_url(trimmed) {
        return;
    }

    let candidate = PathBuf::from(trimmed);
    let absolute = if candidate.is_absolute() {
        candidate
    } else {
        base_dir.join(candidate)
    };
    paths.push(normalize_path(&absolute));
}

fn is_url(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn step(element: Value, base_dir: &Path) -> StepDefinition {
        StepDefinition {
            index: 1,
            task: TaskKind::Build,
            id: "build-1".into(),
            depends_on: vec![],
            dependency_indexes: vec![],
            element,
            base_dir: base_dir.to_path_buf(),
        }
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("site.json"), "{}").unwrap();

        let element = json!({"task": "build", "config": "site.json", "out": "_site"});
        let a = fingerprint_step(&step(element.clone(), dir.path()), &tool_salt(false));
        let b = fingerprint_step(&step(element, dir.path()), &tool_salt(false));

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_changes_with_referenced_file() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("site.json");
        std::fs::write(&config, "{}").unwrap();

        let element = json!({"task": "build", "config": "site.json", "out": "_site"});
        let before = fingerprint_step(&step(element.clone(), dir.path()), &tool_salt(false));

        std::fs::write(&config, r#"{"title": "changed"}"#).unwrap();
        let after = fingerprint_step(&step(element, dir.path()), &tool_salt(false));

        assert_ne!(before, after);
    }

    #[test]
    fn test_fingerprint_ignores_unrelated_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("site.json"), "{}").unwrap();

        let element = json!({"task": "build", "config": "site.json"});
        let before = fingerprint_step(&step(element.clone(), dir.path()), &tool_salt(false));

        std::fs::write(dir.path().join("unrelated.txt"), "noise").unwrap();
        let after = fingerprint_step(&step(element, dir.path()), &tool_salt(false));

        assert_eq!(before, after);
    }

    #[test]
    fn test_fast_salt_differs() {
        let dir = TempDir::new().unwrap();
        let element = json!({"task": "build", "out": "_site"});

        let full = fingerprint_step(&step(element.clone(), dir.path()), &tool_salt(false));
        let fast = fingerprint_step(&step(element, dir.path()), &tool_salt(true));

        assert_ne!(full, fast);
    }

    #[test]
    fn test_collect_paths_skips_urls() {
        let element = json!({
            "task": "sitemap",
            "siteRoot": "_site",
            "entries": "https://example.com/extra.json",
        });
        let paths = collect_paths(&element, Path::new("/root"));
        assert_eq!(paths, vec![PathBuf::from("/root/_site")]);
    }

    #[test]
    fn test_collect_paths_nested_batches() {
        let element = json!({
            "task": "apidocs",
            "out": "api",
            "inputs": [
                {"xml": "docs/a.xml", "out": "api/a"},
                {"xml": "docs/b.xml", "out": "api/b"},
            ],
        });
        let paths = collect_paths(&element, Path::new("/root"));
        assert!(paths.contains(&PathBuf::from("/root/docs/a.xml")));
        assert!(paths.contains(&PathBuf::from("/root/docs/b.xml")));
        assert!(paths.contains(&PathBuf::from("/root/api/a")));
        assert!(paths.contains(&PathBuf::from("/root/api")));
    }

    #[test]
    fn test_collect_paths_array_of_strings() {
        let element = json!({"task": "overlay", "source": ["a", "b"]});
        let paths = collect_paths(&element, Path::new("/root"));
        assert_eq!(
            paths,
            vec![PathBuf::from("/root/a"), PathBuf::from("/root/b")]
        );
    }
}
