// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Pipeline document loader
//!
//! Reads the pipeline configuration (JSON with `//` line comments and
//! trailing commas), resolves `extends` inheritance, and annotates every
//! step with the directory of the document that declared it so that
//! relative paths keep their meaning across inheritance.

use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::ForgeError;

/// Default cache state location, relative to the pipeline root
pub const DEFAULT_CACHE_PATH: &str = ".powerforge/pipeline-cache.json";

/// Default profile location, relative to the pipeline root
pub const DEFAULT_PROFILE_PATH: &str = ".powerforge/pipeline-profile.json";

/// A raw pipeline step plus the base directory of the declaring document
#[derive(Debug, Clone)]
pub struct RawStep {
    /// The step's JSON object, task name already lowercased
    pub element: Value,
    /// Directory of the document that declared this step
    pub base_dir: PathBuf,
}

impl RawStep {
    /// The step's task kind string (empty when absent)
    pub fn task(&self) -> &str {
        self.element.get("task").and_then(Value::as_str).unwrap_or("")
    }
}

/// A fully loaded pipeline document
///
/// Immutable after load. Scalar settings from a child document override
/// its parent; `steps` replace the parent's unless the child sets
/// `append: true`, in which case parent steps precede child steps.
#[derive(Debug, Clone)]
pub struct PipelineDocument {
    /// Path of the top-level config file
    pub path: PathBuf,
    /// Directory of the top-level config file (the pipeline root)
    pub root: PathBuf,
    /// Steps in declaration order
    pub steps: Vec<RawStep>,
    /// Write the profile on success
    pub profile: bool,
    /// Write the profile on failure (defaults to true)
    pub profile_on_fail: bool,
    /// Profile artifact location
    pub profile_path: PathBuf,
    /// Whether the persistent cache is consulted
    pub cache: bool,
    /// Cache state location
    pub cache_path: PathBuf,
}

/// Partially merged document state during `extends` resolution
#[derive(Debug, Default)]
struct DocNode {
    steps: Vec<RawStep>,
    profile: Option<bool>,
    profile_on_fail: Option<bool>,
    profile_path: Option<PathBuf>,
    cache: Option<bool>,
    cache_path: Option<PathBuf>,
}

impl PipelineDocument {
    /// Load a pipeline document, following `extends` chains
    pub fn load(path: &Path) -> Result<Self, ForgeError> {
        let mut visited = HashSet::new();
        let node = load_node(path, &mut visited)?;

        if node.steps.is_empty() {
            return Err(ForgeError::ConfigInvalid {
                reason: format!("'{}' declares no steps", path.display()),
                help: Some("Add a non-empty 'steps' array to the pipeline".into()),
            });
        }

        let root = parent_dir(path);

        Ok(Self {
            path: path.to_path_buf(),
            root: root.clone(),
            steps: node.steps,
            profile: node.profile.unwrap_or(false),
            profile_on_fail: node.profile_on_fail.unwrap_or(true),
            profile_path: node
                .profile_path
                .unwrap_or_else(|| root.join(DEFAULT_PROFILE_PATH)),
            cache: node.cache.unwrap_or(true),
            cache_path: node
                .cache_path
                .unwrap_or_else(|| root.join(DEFAULT_CACHE_PATH)),
        })
    }
}

/// Load one document and merge its parent chain into it
fn load_node(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<DocNode, ForgeError> {
    if !path.exists() {
        return Err(ForgeError::ConfigMissing {
            path: path.to_path_buf(),
        });
    }

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(ForgeError::ExtendsCycle {
            path: path.to_path_buf(),
        });
    }

    let text = std::fs::read_to_string(path).map_err(|e| ForgeError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let value: Value =
        serde_json::from_str(&strip_jsonc(&text)).map_err(|e| ForgeError::ConfigInvalid {
            reason: format!("'{}' is not valid JSON: {}", path.display(), e),
            help: Some("powerforge accepts // line comments and trailing commas".into()),
        })?;

    let obj = value.as_object().ok_or_else(|| ForgeError::ConfigInvalid {
        reason: format!("'{}' must contain a JSON object", path.display()),
        help: None,
    })?;

    let base_dir = parent_dir(path);

    // Resolve the parent chain first so the child can override it.
    let mut node = if let Some(extends) = obj.get("extends").and_then(Value::as_str) {
        let parent_path = base_dir.join(extends);
        load_node(&parent_path, visited)?
    } else {
        DocNode::default()
    };

    if let Some(steps) = obj.get("steps") {
        let steps = steps.as_array().ok_or_else(|| ForgeError::ConfigInvalid {
            reason: format!("'steps' in '{}' must be an array", path.display()),
            help: None,
        })?;

        let own: Vec<RawStep> = steps
            .iter()
            .map(|element| RawStep {
                element: lowercase_task(element.clone()),
                base_dir: base_dir.clone(),
            })
            .collect();

        let append = obj.get("append").and_then(Value::as_bool).unwrap_or(false);
        if append {
            node.steps.extend(own);
        } else {
            node.steps = own;
        }
    }

    // Scalar overrides; paths resolve against the declaring document.
    if let Some(v) = obj.get("profile").and_then(Value::as_bool) {
        node.profile = Some(v);
    }
    if let Some(v) = obj.get("profileOnFail").and_then(Value::as_bool) {
        node.profile_on_fail = Some(v);
    }
    if let Some(v) = obj.get("profilePath").and_then(Value::as_str) {
        node.profile_path = Some(base_dir.join(v));
    }
    if let Some(v) = obj.get("cache").and_then(Value::as_bool) {
        node.cache = Some(v);
    }
    if let Some(v) = obj.get("cachePath").and_then(Value::as_str) {
        node.cache_path = Some(base_dir.join(v));
    }

    Ok(node)
}

/// Lowercase the step's task name in place
fn lowercase_task(mut element: Value) -> Value {
    if let Some(obj) = element.as_object_mut() {
        if let Some(task) = obj.get("task").and_then(Value::as_str) {
            let lowered = task.trim().to_lowercase();
            obj.insert("task".into(), Value::String(lowered));
        }
    }
    element
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Strip `//` line comments and trailing commas so serde_json can parse
///
/// String literals (including escapes) are honored; comment markers and
/// commas inside strings pass through untouched.
pub fn strip_jsonc(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                // Drop everything up to (not including) the newline
                for rest in chars.by_ref() {
                    if rest == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ',' => {
                // Trailing comma: look ahead past whitespace/comments for a closer
                let mut lookahead = chars.clone();
                let mut is_trailing = false;
                while let Some(&n) = lookahead.peek() {
                    if n.is_whitespace() {
                        lookahead.next();
                    } else if n == '/' {
                        lookahead.next();
                        if lookahead.peek() == Some(&'/') {
                            for rest in lookahead.by_ref() {
                                if rest == '\n' {
                                    break;
                                }
                            }
                        } else {
                            break;
                        }
                    } else {
                        is_trailing = n == '}' || n == ']';
                        break;
                    }
                }
                if !is_trailing {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_strip_comments_and_trailing_commas() {
        let text = r#"{
            // a comment
            "steps": [
                {"task": "build", "out": "_site",}, // trailing comma above too
            ],
        }"#;
        let value: Value = serde_json::from_str(&strip_jsonc(text)).unwrap();
        assert_eq!(value["steps"][0]["task"], "build");
    }

    #[test]
    fn test_slashes_inside_strings_survive() {
        let text = r#"{"steps": [{"task": "build", "config": "a//b.json"}]}"#;
        let value: Value = serde_json::from_str(&strip_jsonc(text)).unwrap();
        assert_eq!(value["steps"][0]["config"], "a//b.json");
    }

    #[test]
    fn test_load_simple_document() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "powerforge.json",
            r#"{"steps": [{"task": "Build", "out": "_site"}]}"#,
        );

        let doc = PipelineDocument::load(&path).unwrap();
        assert_eq!(doc.steps.len(), 1);
        // Task names are normalized to lowercase
        assert_eq!(doc.steps[0].task(), "build");
        assert!(doc.cache);
        assert!(doc.profile_on_fail);
        assert!(!doc.profile);
        assert_eq!(doc.cache_path, dir.path().join(DEFAULT_CACHE_PATH));
    }

    #[test]
    fn test_missing_file() {
        let result = PipelineDocument::load(Path::new("/nonexistent/powerforge.json"));
        assert!(matches!(result, Err(ForgeError::ConfigMissing { .. })));
    }

    #[test]
    fn test_missing_steps_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "p.json", r#"{"cache": true}"#);
        let result = PipelineDocument::load(&path);
        assert!(matches!(result, Err(ForgeError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_steps_not_array_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "p.json", r#"{"steps": "build"}"#);
        let result = PipelineDocument::load(&path);
        assert!(matches!(result, Err(ForgeError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_extends_child_replaces_steps() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "base.json",
            r#"{"steps": [{"task": "build"}], "profile": true}"#,
        );
        let child = write(
            dir.path(),
            "child.json",
            r#"{"extends": "base.json", "steps": [{"task": "verify"}]}"#,
        );

        let doc = PipelineDocument::load(&child).unwrap();
        assert_eq!(doc.steps.len(), 1);
        assert_eq!(doc.steps[0].task(), "verify");
        // Scalars inherited from the parent
        assert!(doc.profile);
    }

    #[test]
    fn test_extends_append_keeps_parent_steps_first() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "base.json", r#"{"steps": [{"task": "build"}]}"#);
        let child = write(
            dir.path(),
            "child.json",
            r#"{"extends": "base.json", "append": true, "steps": [{"task": "sitemap"}]}"#,
        );

        let doc = PipelineDocument::load(&child).unwrap();
        let tasks: Vec<_> = doc.steps.iter().map(RawStep::task).collect();
        assert_eq!(tasks, vec!["build", "sitemap"]);
    }

    #[test]
    fn test_extends_cycle_detected() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"{"extends": "b.json", "steps": [{"task": "build"}]}"#,
        );
        let a = dir.path().join("a.json");
        write(dir.path(), "b.json", r#"{"extends": "a.json"}"#);

        let result = PipelineDocument::load(&a);
        assert!(matches!(result, Err(ForgeError::ExtendsCycle { .. })));
    }

    #[test]
    fn test_steps_remember_declaring_dir() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("shared");
        std::fs::create_dir(&sub).unwrap();
        write(&sub, "base.json", r#"{"steps": [{"task": "build"}]}"#);
        let child = write(
            dir.path(),
            "child.json",
            r#"{"extends": "shared/base.json", "append": true, "steps": [{"task": "verify"}]}"#,
        );

        let doc = PipelineDocument::load(&child).unwrap();
        assert_eq!(doc.steps[0].base_dir, sub);
        assert_eq!(doc.steps[1].base_dir, dir.path());
    }

    #[test]
    fn test_child_cache_path_overrides() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "base.json", r#"{"steps": [{"task": "build"}]}"#);
        let child = write(
            dir.path(),
            "child.json",
            r#"{"extends": "base.json", "cachePath": "state/cache.json"}"#,
        );

        let doc = PipelineDocument::load(&child).unwrap();
        assert_eq!(doc.cache_path, dir.path().join("state/cache.json"));
    }
}
