//! Path conventions: the observed application's log naming scheme, the
//! per-platform directories it logs into, and where our own config lives.

use std::path::{Path, PathBuf};

/// Base-name prefix shared by all of the observed application's log files.
pub const LOG_NAME_PREFIX: &str = "upwork.";
/// Base-name suffix of the rotating log files.
pub const LOG_NAME_SUFFIX: &str = ".log";

pub const CONFIG_FILE: &str = "config.json";
pub const CONFIG_DIR: &str = "snapwatch";

/// True for names matching the rotation scheme `upwork.*.log` (the middle
/// segment may be empty, but prefix and suffix must not overlap).
pub fn is_observed_log_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            name.len() >= LOG_NAME_PREFIX.len() + LOG_NAME_SUFFIX.len()
                && name.starts_with(LOG_NAME_PREFIX)
                && name.ends_with(LOG_NAME_SUFFIX)
        })
}

/// True for any base name beginning with the observed prefix; rotation events
/// are matched on this looser test.
pub fn has_observed_prefix(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(LOG_NAME_PREFIX))
}

/// Platform-default directory the observed application logs into.
pub fn default_observed_logs_dir() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let dir = if cfg!(target_os = "macos") {
        home.join("Library")
            .join("Application Support")
            .join("Upwork")
            .join("Upwork")
            .join("Logs")
    } else if cfg!(target_os = "windows") {
        home.join("AppData").join("Roaming").join("Upwork").join("Logs")
    } else {
        home.join(".config").join("Upwork").join("Logs")
    };
    Some(dir)
}

/// Candidate directories checked, in order, when discovering where the
/// observed application actually logs.
pub fn candidate_observed_logs_dirs() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") || cfg!(target_os = "windows") {
        return default_observed_logs_dir().into_iter().collect();
    }
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    vec![
        home.join(".config").join("Upwork").join("Logs"),
        home.join(".Upwork").join("Upwork").join("Logs"),
    ]
}

/// Our own config file location: an explicit `./config.json` wins (developer
/// runs), then the `SNAPWATCH_CONFIG` environment variable, then the platform
/// config directory.
pub fn config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    if let Ok(path) = std::env::var(crate::config::ENV_CONFIG_PATH) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
        .unwrap_or(local)
}

/// Replace a leading `~` with the user's home directory. Paths without one
/// (or when no home is known) come back unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            let stripped = stripped.trim_start_matches(['/', '\\']);
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_log_names_match_the_rotation_scheme() {
        assert!(is_observed_log_name(Path::new("upwork.20250512.log")));
        assert!(is_observed_log_name(Path::new("/var/x/upwork..20250523.log")));
        assert!(!is_observed_log_name(Path::new("upwork.log")), "prefix and suffix must not overlap");
        assert!(!is_observed_log_name(Path::new("other.20250512.log")));
        assert!(!is_observed_log_name(Path::new("upwork.20250512.txt")));
    }

    #[test]
    fn prefix_test_is_looser_than_full_name_test() {
        assert!(has_observed_prefix(Path::new("upwork.tmp")));
        assert!(!has_observed_prefix(Path::new("work.log")));
    }

    #[test]
    fn tilde_expansion_leaves_plain_paths_alone() {
        assert_eq!(expand_tilde("/var/log/x"), PathBuf::from("/var/log/x"));
        assert_eq!(expand_tilde(""), PathBuf::from(""));
    }

    #[test]
    fn tilde_expansion_prepends_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/logs"), home.join("logs"));
            assert_eq!(expand_tilde("~"), home.join(""));
        }
    }
}
