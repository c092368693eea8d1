//! Stateless selection of the newest matching log file in a directory.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use snapwatch_core::paths::is_observed_log_name;

/// Return the `upwork.*.log` file in `dir` with the greatest modification
/// time, or `None` when the directory has no matching regular file. Ties are
/// broken arbitrarily. Re-evaluated on demand; never cached.
pub fn find_latest_log(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    let mut latest: Option<(PathBuf, SystemTime)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !is_observed_log_name(&path) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        let newer = match &latest {
            Some((_, best)) => modified > *best,
            None => true,
        };
        if newer {
            latest = Some((path, modified));
        }
    }
    latest.map(|(path, _)| path)
}
