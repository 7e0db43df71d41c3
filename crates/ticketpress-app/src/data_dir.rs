// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Where the databases and the config file live.

use std::path::{Path, PathBuf};

use ticketpress_core::error::Result;

pub const CONFIG_FILE: &str = "config.json";

/// The data directory, created if missing.
///
/// `TICKETPRESS_DATA_DIR` wins, then `$XDG_DATA_HOME/ticketpress`, then
/// `~/.local/share/ticketpress`.
pub fn data_dir() -> Result<PathBuf> {
    let dir = resolve(|key| std::env::var_os(key).map(PathBuf::from));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `TICKETPRESS_CONFIG`, or `config.json` inside `data_dir`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    std::env::var_os("TICKETPRESS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE))
}

fn resolve(lookup: impl Fn(&str) -> Option<PathBuf>) -> PathBuf {
    if let Some(dir) = lookup("TICKETPRESS_DATA_DIR") {
        return dir;
    }
    let base = lookup("XDG_DATA_HOME")
        .or_else(|| lookup("HOME").map(|home| home.join(".local").join("share")))
        // Last resort
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    base.join("ticketpress")
}
