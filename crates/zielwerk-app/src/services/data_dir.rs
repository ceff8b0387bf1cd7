// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::PathBuf;

/// Return the application data directory, creating it if needed.
///
/// `ZIELWERK_DATA_DIR` overrides the conventional location.
pub fn data_dir() -> PathBuf {
    let dir = match std::env::var("ZIELWERK_DATA_DIR") {
        Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => dirs_fallback().join("zielwerk"),
    };
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn dirs_fallback() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    PathBuf::from("/tmp")
}
