use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

use crate::blob::Backend;
use crate::logging;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "contacthub";
const SQLITE_FILE_NAME: &str = "contacts.db";

#[derive(Debug, Clone)]
pub struct Config {
    /// File the configuration was read from, if any.
    pub config_path: Option<PathBuf>,
    /// SQLite database file, or a directory for the file backend.
    pub store_path: PathBuf,
    pub backend: Backend,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    /// Stderr when unset.
    pub dir: Option<PathBuf>,
}

// =============================================================================
// File Deserialization
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    store_path: Option<String>,
    backend: Option<String>,
    log: LogFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct LogFile {
    level: Option<String>,
    dir: Option<String>,
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

fn data_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine data directories")?;
    Ok(base.data_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Where contacts live when nothing is configured.
pub fn default_store_path(backend: Backend) -> Result<PathBuf> {
    let root = data_root()?;
    Ok(match backend {
        Backend::Sqlite => root.join(SQLITE_FILE_NAME),
        Backend::File => root,
    })
}

/// Read the configuration. An explicit path must exist; the default path is
/// optional and falls back to built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("configuration file not found at {}", path.display());
            }
            path.to_path_buf()
        }
        None => {
            let path = config_path()?;
            if !path.exists() {
                return from_file(ConfigFile::default(), None);
            }
            path
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    parse(&raw, &path)
}

fn parse(raw: &str, path: &Path) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    from_file(cfg_file, Some(path.to_path_buf()))
}

fn from_file(file: ConfigFile, config_path: Option<PathBuf>) -> Result<Config> {
    let backend = match file.backend.as_deref() {
        None => Backend::Sqlite,
        Some(raw) => raw.parse::<Backend>()?,
    };

    let store_path = match non_empty(file.store_path) {
        Some(raw) => expand_tilde(Path::new(&raw)),
        None => default_store_path(backend)?,
    };

    let log = LogConfig {
        level: non_empty(file.log.level).unwrap_or_else(|| logging::DEFAULT_LEVEL.to_string()),
        dir: non_empty(file.log.dir).map(|raw| expand_tilde(Path::new(&raw))),
    };

    Ok(Config {
        config_path,
        store_path,
        backend,
        log,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    warn_unknown_in_context(value, "", &["store_path", "backend", "log"]);

    if let Some(log_val) = table.get("log") {
        warn_unknown_in_context(log_val, "log.", &["level", "dir"]);
    }
}

fn warn_unknown_in_context(value: &toml::Value, context: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            // Runs before the logger exists.
            eprintln!("warning: unknown configuration key `{}{}`", context, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            store_path = "/tmp/contacts/store.db"
            backend = "sqlite"

            [log]
            level = "debug"
            dir = "/tmp/contacts/logs"
        "#;
        let config = parse(raw, Path::new("/etc/contacthub.toml")).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/contacts/store.db"));
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.dir, Some(PathBuf::from("/tmp/contacts/logs")));
        assert_eq!(
            config.config_path,
            Some(PathBuf::from("/etc/contacthub.toml"))
        );
    }

    #[test]
    fn test_parse_file_backend_and_default_log() {
        let raw = r#"
            store_path = "/srv/contacts"
            backend = "File"
        "#;
        let config = parse(raw, Path::new("config.toml")).unwrap();
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.log.level, logging::DEFAULT_LEVEL);
        assert_eq!(config.log.dir, None);
    }

    #[test]
    fn test_invalid_backend_is_rejected() {
        let err = parse(r#"backend = "redis""#, Path::new("config.toml")).unwrap_err();
        assert!(err.to_string().contains("invalid backend"));
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let err = parse("store_path = ", Path::new("config.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_unknown_keys_do_not_fail() {
        let raw = r#"
            store_path = "/tmp/c.db"
            colour = "blue"
            [log]
            verbosity = 3
        "#;
        assert!(parse(raw, Path::new("config.toml")).is_ok());
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/contacts.db"));
        if let Some(home) = home::home_dir() {
            assert_eq!(expanded, home.join("contacts.db"));
        }
        assert_eq!(
            expand_tilde(Path::new("/abs/contacts.db")),
            PathBuf::from("/abs/contacts.db")
        );
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "store_path = \"/tmp/x.db\"\n").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.config_path, Some(path));
    }
}
