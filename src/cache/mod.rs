// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Persistent pipeline cache
//!
//! JSON state mapping `<stepIndex>:<task>` to the fingerprint and
//! last-success message of each step. The cache is an optimization, not
//! a correctness input: loads are tolerant (corrupt or oversized state
//! degrades to empty) and save failures are warnings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::errors::{ForgeError, ForgeResult};
use crate::utils::paths::is_contained_in;

/// State files beyond this size are ignored on load
pub const MAX_STATE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Current cache schema version
pub const CACHE_VERSION: u32 = 1;

/// One cached step outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Lowercase hex SHA-256 fingerprint of the step at last success
    pub fingerprint: String,
    /// Message of the last successful run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Persistent cache state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheState {
    pub version: u32,
    #[serde(default)]
    pub entries: BTreeMap<String, CacheEntry>,
}

impl Default for CacheState {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, fingerprint: String, message: Option<String>) {
        self.entries.insert(key, CacheEntry { fingerprint, message });
    }
}

/// Require that a state path resolves under the pipeline root
pub fn ensure_contained(path: &Path, root: &Path) -> ForgeResult<()> {
    if is_contained_in(path, root) {
        Ok(())
    } else {
        Err(ForgeError::PathEscape {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })
    }
}

/// Load cache state, degrading to empty on any problem
pub fn load_state(path: &Path) -> CacheState {
    let Ok(metadata) = std::fs::metadata(path) else {
        return CacheState::new();
    };

    if metadata.len() > MAX_STATE_FILE_SIZE {
        warn!(
            path = %path.display(),
            size = metadata.len(),
            limit = MAX_STATE_FILE_SIZE,
            "cache state exceeds size limit; starting empty"
        );
        return CacheState::new();
    }

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cache state; starting empty");
            return CacheState::new();
        }
    };

    match serde_json::from_str(&text) {
        Ok(state) => state,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cache state is corrupt; starting empty");
            CacheState::new()
        }
    }
}

/// Persist cache state; failures are warnings, never fatal
pub fn save_state(path: &Path, state: &CacheState) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "failed to create cache directory");
            return;
        }
    }

    let json = match serde_json::to_string_pretty(state) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize cache state");
            return;
        }
    };

    if let Err(e) = std::fs::write(path, json) {
        warn!(path = %path.display(), error = %e, "failed to write cache state");
    }
}
