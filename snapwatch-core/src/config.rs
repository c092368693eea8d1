//! JSON configuration: loading with invalid-file backup, best-effort saving,
//! validation, and discovery of the observed application's log directory.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::paths;

/// Environment override for the watched directory; supersedes the config file.
pub const ENV_LOGS_DIR: &str = "UPWORK_LOGS_DIR";
/// Environment override for the config file location.
pub const ENV_CONFIG_PATH: &str = "SNAPWATCH_CONFIG";

/// On-disk configuration shape. Field names are camelCase in the file;
/// missing fields fall back to defaults so partial configs keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Enables the `/test/broadcast` endpoint and verbose CLI behaviour.
    pub debug_mode: bool,
    /// Our own log file; empty means stdout only.
    pub log_path: String,
    /// Directory holding the observed application's rotating logs.
    pub upwork_logs_dir: String,
    /// Informational only: the front end always scans the candidate list.
    pub web_socket_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let log_path = dirs::home_dir()
            .map(|home| home.join("snapwatch.log").display().to_string())
            .unwrap_or_else(|| "snapwatch.log".to_string());
        Self {
            debug_mode: false,
            log_path,
            upwork_logs_dir: String::new(),
            web_socket_port: 8887,
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Loaded from the user's config file.
    User(PathBuf),
    /// No file existed; built from defaults (and written back best-effort).
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::User(path) => write!(f, "user config: {}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults (no config file found)"),
        }
    }
}

/// Load the configuration at `path`.
///
/// A readable, valid file is used as-is, except that an empty
/// `upworkLogsDir` is filled in by discovery and the improved file is
/// persisted best-effort. A file with invalid JSON is renamed to
/// `<name>.bak-<timestamp>` before the parse error is returned. A missing
/// file falls back to defaults plus discovery.
pub fn load(path: &Path) -> Result<(Config, ConfigSource), ConfigError> {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
            Ok(mut config) => {
                if ensure_observed_logs_dir(&mut config) {
                    if let Err(err) = save(&config, path) {
                        tracing::warn!(error = %err, "could not persist discovered logs dir");
                    }
                }
                Ok((config, ConfigSource::User(path.to_path_buf())))
            }
            Err(err) => {
                let backup = backup_invalid(path)?;
                tracing::warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    "backed up config file with invalid JSON",
                );
                Err(ConfigError::InvalidJson {
                    path: path.to_path_buf(),
                    backup,
                    source: err,
                })
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let mut config = Config::default();
            ensure_observed_logs_dir(&mut config);
            if let Err(err) = save(&config, path) {
                tracing::warn!(error = %err, "could not write default config");
            }
            Ok((config, ConfigSource::Defaults))
        }
        Err(err) => Err(io_err(path, err)),
    }
}

/// Write `config` to `path` as pretty-printed JSON, creating parent
/// directories as needed.
pub fn save(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    let rendered = serde_json::to_string_pretty(config)?;
    fs::write(path, rendered).map_err(|e| io_err(path, e))
}

/// Reject configurations the daemon cannot run with.
///
/// Beyond the field checks, the expanded `logPath` must be writable in
/// principle: a missing parent directory is created here, and a parent that
/// cannot be created fails validation before the daemon starts.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.log_path.is_empty() {
        return Err(ConfigError::Invalid(
            "logPath cannot be empty in config".to_string(),
        ));
    }
    if config.upwork_logs_dir.is_empty() {
        return Err(ConfigError::Invalid(
            "upworkLogsDir cannot be empty in config".to_string(),
        ));
    }
    if config.web_socket_port == 0 {
        return Err(ConfigError::Invalid(
            "webSocketPort must be non-zero".to_string(),
        ));
    }

    let log_path = paths::expand_tilde(&config.log_path);
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            fs::create_dir_all(parent).map_err(|err| {
                ConfigError::Invalid(format!(
                    "cannot create log directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}

/// Directory the tailer should watch: the environment override wins over the
/// config file, and a leading `~` is expanded. `None` when neither names one.
pub fn effective_logs_dir(config: &Config) -> Option<PathBuf> {
    let env = std::env::var(ENV_LOGS_DIR).ok();
    logs_dir_with_override(config, env.as_deref())
}

fn logs_dir_with_override(config: &Config, env_override: Option<&str>) -> Option<PathBuf> {
    let raw = match env_override {
        Some(dir) if !dir.is_empty() => dir,
        _ => config.upwork_logs_dir.as_str(),
    };
    if raw.is_empty() {
        return None;
    }
    Some(paths::expand_tilde(raw))
}

/// Fill in an empty `upworkLogsDir` by probing the platform candidates and
/// falling back to the platform default. Returns true when the field changed.
fn ensure_observed_logs_dir(config: &mut Config) -> bool {
    if !config.upwork_logs_dir.is_empty() {
        return false;
    }
    let discovered = discover_observed_logs_dir().or_else(paths::default_observed_logs_dir);
    match discovered {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "discovered observed log directory");
            config.upwork_logs_dir = dir.display().to_string();
            true
        }
        None => false,
    }
}

/// First candidate directory that exists and already contains a matching log
/// file; `None` when nothing qualifies.
pub fn discover_observed_logs_dir() -> Option<PathBuf> {
    paths::candidate_observed_logs_dirs()
        .into_iter()
        .find(|dir| dir_has_observed_logs(dir))
}

fn dir_has_observed_logs(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .flatten()
        .any(|entry| paths::is_observed_log_name(&entry.path()))
}

/// Rename a file with invalid contents to `<name>.bak-<timestamp>`. The
/// stamp is UTC and contains no colons so the name is valid on Windows.
fn backup_invalid(path: &Path) -> Result<PathBuf, ConfigError> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.9f");
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(paths::CONFIG_FILE);
    let backup = path.with_file_name(format!("{name}.bak-{stamp}"));
    fs::rename(path, &backup).map_err(|source| ConfigError::BackupFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(backup)
}
