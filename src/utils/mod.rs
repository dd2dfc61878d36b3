// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Shared utilities

pub mod paths;
pub mod spinner;

use std::time::Duration;

/// Format a duration the way step messages expect it: `1.24s` / `87ms`
pub fn fmt_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_duration() {
        assert_eq!(fmt_duration(Duration::from_millis(87)), "87ms");
        assert_eq!(fmt_duration(Duration::from_millis(1240)), "1.24s");
    }
}
