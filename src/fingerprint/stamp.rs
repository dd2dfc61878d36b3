// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Path stamps
//!
//! A stamp is a compact, deterministic representation of a filesystem
//! entry used inside a step fingerprint. Files stamp as length + mtime,
//! directories as a bounded recursive census, so fingerprinting never
//! reads file contents.

use std::path::Path;
use std::time::UNIX_EPOCH;

/// Directory stamps stop counting after this many files
///
/// Beyond the cap the stamp carries a `truncated` marker and relies on
/// the file count and newest mtime; changes past the cap may not
/// invalidate the fingerprint.
pub const MAX_DIR_STAMP_FILES: usize = 1000;

/// Stamp a single path
///
/// Formats:
/// - `f|<path>|<len>|<mtime>` for files
/// - `d|<path>|<count>|<maxMtime>[|truncated]` for directories
/// - `m|<path>` when the path does not exist
/// - `d|<path>|unreadable` when a directory cannot be scanned
pub fn stamp_path(path: &Path) -> String {
    let display = path.display();

    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return format!("m|{display}");
    };

    if metadata.is_dir() {
        match scan_directory(path) {
            Ok(scan) => {
                let mut stamp = format!("d|{display}|{}|{}", scan.count, scan.max_mtime);
                if scan.truncated {
                    stamp.push_str("|truncated");
                }
                stamp
            }
            Err(_) => format!("d|{display}|unreadable"),
        }
    } else {
        format!("f|{display}|{}|{}", metadata.len(), mtime_of(&metadata))
    }
}

struct DirScan {
    count: usize,
    max_mtime: u128,
    truncated: bool,
}

/// Recursive census of a directory, bounded by [`MAX_DIR_STAMP_FILES`]
fn scan_directory(path: &Path) -> std::io::Result<DirScan> {
    let mut scan = DirScan {
        count: 0,
        max_mtime: 0,
        truncated: false,
    };
    let mut pending = vec![path.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;

            if metadata.is_dir() {
                pending.push(entry.path());
                continue;
            }

            scan.count += 1;
            scan.max_mtime = scan.max_mtime.max(mtime_of(&metadata));

            if scan.count >= MAX_DIR_STAMP_FILES {
                scan.truncated = true;
                return Ok(scan);
            }
        }
    }

    Ok(scan)
}

/// Modification time in nanoseconds since the Unix epoch
fn mtime_of(metadata: &std::fs::Metadata) -> u128 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_path_stamp() {
        let stamp = stamp_path(Path::new("/nonexistent/file.txt"));
        assert_eq!(stamp, "m|/nonexistent/file.txt");
    }

    #[test]
    fn test_file_stamp_carries_length() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("page.html");
        std::fs::write(&file, "<html></html>").unwrap();

        let stamp = stamp_path(&file);
        assert!(stamp.starts_with(&format!("f|{}|13|", file.display())));
    }

    #[test]
    fn test_directory_stamp_counts_recursively() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "b").unwrap();

        let stamp = stamp_path(dir.path());
        let parts: Vec<&str> = stamp.split('|').collect();
        assert_eq!(parts[0], "d");
        assert_eq!(parts[2], "2");
        assert!(!stamp.ends_with("truncated"));
    }

    #[test]
    fn test_directory_stamp_changes_with_content() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let before = stamp_path(dir.path());

        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        let after = stamp_path(dir.path());

        assert_ne!(before, after);
    }
}
