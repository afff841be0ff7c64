//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/winnote/config.toml)
//! 3. Environment variables (WINNOTE_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::manager::{StorageConfig, DEFAULT_PREFIX};
use crate::models::DEFAULT_DATA_VERSION;
use crate::storage::StorageAdapter;

/// Environment variable prefix
const ENV_PREFIX: &str = "WINNOTE";

/// Default SQLite database name
pub const DEFAULT_DATABASE_NAME: &str = "WinNoteDB";

/// Default autosave interval on the SQLite backend
const SQLITE_SAVE_INTERVAL_MS: u64 = 3000;

/// Default autosave interval on the key-value backends
const KEY_VALUE_SAVE_INTERVAL_MS: u64 = 5000;

/// Which storage backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// SQLite when it can be opened, file-backed key-value store otherwise
    #[default]
    Auto,
    Sqlite,
    /// Key-value store persisted to a JSON file
    KeyValue,
    /// Key-value store held in memory only
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Backend::Auto => "auto",
            Backend::Sqlite => "sqlite",
            Backend::KeyValue => "key-value",
            Backend::Memory => "memory",
        };
        f.write_str(label)
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "sqlite" => Ok(Backend::Sqlite),
            "key-value" | "keyvalue" | "kv" => Ok(Backend::KeyValue),
            "memory" => Ok(Backend::Memory),
            other => bail!(
                "Unknown backend '{}'. Use auto, sqlite, key-value or memory.",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite database, key-value file)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub backend: Backend,

    /// Key namespace for the key-value backends
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// SQLite schema version
    #[serde(default = "default_database_version")]
    pub database_version: u32,

    /// Version stamped on new documents
    #[serde(default = "default_data_version")]
    pub data_version: String,

    #[serde(default)]
    pub auto_save: bool,

    /// Autosave interval; defaults depend on the backend when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_interval_ms: Option<u64>,

    #[serde(default = "default_true")]
    pub periodic_save: bool,

    /// Log file path (optional, logs to stderr if not set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: Backend::default(),
            prefix: default_prefix(),
            database_name: default_database_name(),
            database_version: default_database_version(),
            data_version: default_data_version(),
            auto_save: false,
            save_interval_ms: None,
            periodic_save: true,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (WINNOTE_DATA_DIR, WINNOTE_BACKEND, ...)
    /// 2. Config file (~/.config/winnote/config.toml or WINNOTE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_var("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }

        if let Some(val) = env_var("BACKEND") {
            self.backend = val
                .parse::<Backend>()
                .with_context(|| format!("Invalid {}_BACKEND", ENV_PREFIX))?;
        }

        if let Some(val) = env_var("PREFIX") {
            if !val.is_empty() {
                self.prefix = val;
            }
        }

        if let Some(val) = env_var("AUTO_SAVE") {
            self.auto_save = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Some(val) = env_var("SAVE_INTERVAL_MS") {
            self.save_interval_ms = if val.is_empty() {
                None
            } else {
                Some(val.parse::<u64>().with_context(|| {
                    format!("Invalid {}_SAVE_INTERVAL_MS: {:?}", ENV_PREFIX, val)
                })?)
            };
        }

        if let Some(val) = env_var("LOG_FILE") {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Set one field from its string form
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = |value: &str| (!value.is_empty() && value != "none").then(|| value.to_string());

        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "backend" => self.backend = value.parse()?,
            "prefix" => {
                if value.is_empty() {
                    bail!("prefix cannot be empty");
                }
                self.prefix = value.to_string();
            }
            "database_name" => self.database_name = value.to_string(),
            "database_version" => {
                self.database_version = value
                    .parse()
                    .context("Invalid value for database_version. Use a positive integer.")?;
            }
            "data_version" => self.data_version = value.to_string(),
            "auto_save" => {
                self.auto_save = value
                    .parse()
                    .context("Invalid value for auto_save. Use 'true' or 'false'.")?;
            }
            "save_interval_ms" => {
                self.save_interval_ms = optional(value)
                    .map(|v| v.parse::<u64>())
                    .transpose()
                    .context("Invalid value for save_interval_ms. Use milliseconds.")?;
            }
            "periodic_save" => {
                self.periodic_save = value
                    .parse()
                    .context("Invalid value for periodic_save. Use 'true' or 'false'.")?;
            }
            "log_file" => self.log_file = optional(value).map(PathBuf::from),
            _ => bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: {}",
                key,
                Self::KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Keys accepted by `set_value`
    pub const KEYS: &'static [&'static str] = &[
        "data_dir",
        "backend",
        "prefix",
        "database_name",
        "database_version",
        "data_version",
        "auto_save",
        "save_interval_ms",
        "periodic_save",
        "log_file",
    ];

    /// Get the config file path
    ///
    /// Can be overridden with WINNOTE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("winnote")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.sqlite3", self.database_name))
    }

    /// Get the path to the key-value store file
    pub fn key_value_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.prefix))
    }

    /// Autosave interval for the given adapter name
    pub fn save_interval(&self, adapter_name: &str) -> Duration {
        let default = if adapter_name == "sqlite" {
            SQLITE_SAVE_INTERVAL_MS
        } else {
            KEY_VALUE_SAVE_INTERVAL_MS
        };
        Duration::from_millis(self.save_interval_ms.unwrap_or(default))
    }

    /// Build the manager configuration around an opened adapter
    pub fn storage_config(&self, adapter: Arc<dyn StorageAdapter>) -> StorageConfig {
        let save_interval = self.save_interval(adapter.name());
        StorageConfig {
            adapter,
            prefix: self.prefix.clone(),
            version: self.data_version.clone(),
            auto_save: self.auto_save,
            save_interval,
            periodic_save: self.periodic_save,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("winnote")
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_database_name() -> String {
    DEFAULT_DATABASE_NAME.to_string()
}

fn default_database_version() -> u32 {
    1
}

fn default_data_version() -> String {
    DEFAULT_DATA_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueAdapter, MemoryStore, SqliteAdapter};
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "WINNOTE_DATA_DIR",
        "WINNOTE_BACKEND",
        "WINNOTE_PREFIX",
        "WINNOTE_AUTO_SAVE",
        "WINNOTE_SAVE_INTERVAL_MS",
        "WINNOTE_LOG_FILE",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Auto);
        assert_eq!(config.prefix, "win-note");
        assert_eq!(config.database_name, "WinNoteDB");
        assert_eq!(config.database_version, 1);
        assert_eq!(config.data_version, "1.0.0");
        assert!(!config.auto_save);
        assert!(config.periodic_save);
        assert!(config.data_dir.ends_with("winnote"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();

        assert!(config.sqlite_path().ends_with("WinNoteDB.sqlite3"));
        assert!(config.key_value_path().ends_with("win-note.json"));
    }

    #[test]
    fn test_save_interval_defaults_by_backend() {
        let mut config = Config::default();

        assert_eq!(config.save_interval("sqlite"), Duration::from_millis(3000));
        assert_eq!(config.save_interval("key-value"), Duration::from_millis(5000));

        config.save_interval_ms = Some(250);
        assert_eq!(config.save_interval("sqlite"), Duration::from_millis(250));
    }

    #[test]
    fn test_storage_config() {
        let mut config = Config::default();
        config.auto_save = true;

        let sqlite = config.storage_config(Arc::new(SqliteAdapter::in_memory(1)));
        assert!(sqlite.auto_save);
        assert_eq!(sqlite.save_interval, Duration::from_millis(3000));
        assert_eq!(sqlite.version, "1.0.0");

        let kv = config.storage_config(Arc::new(KeyValueAdapter::new(
            Arc::new(MemoryStore::new()),
            "win-note",
        )));
        assert_eq!(kv.save_interval, Duration::from_millis(5000));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("WINNOTE_DATA_DIR", "/tmp/winnote-test");
        config.apply_env_overrides().unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/winnote-test"));
    }

    #[test]
    fn test_env_override_backend() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("WINNOTE_BACKEND", "key-value");
        config.apply_env_overrides().unwrap();
        assert_eq!(config.backend, Backend::KeyValue);

        env::set_var("WINNOTE_BACKEND", "floppy");
        assert!(config.apply_env_overrides().is_err());
    }

    #[test]
    fn test_env_override_auto_save() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("WINNOTE_AUTO_SAVE", "true");
        config.apply_env_overrides().unwrap();
        assert!(config.auto_save);

        env::set_var("WINNOTE_AUTO_SAVE", "0");
        config.apply_env_overrides().unwrap();
        assert!(!config.auto_save);
    }

    #[test]
    fn test_env_override_save_interval() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("WINNOTE_SAVE_INTERVAL_MS", "1500");
        config.apply_env_overrides().unwrap();
        assert_eq!(config.save_interval_ms, Some(1500));

        // Empty string clears it
        env::set_var("WINNOTE_SAVE_INTERVAL_MS", "");
        config.apply_env_overrides().unwrap();
        assert!(config.save_interval_ms.is_none());

        env::set_var("WINNOTE_SAVE_INTERVAL_MS", "soon");
        assert!(config.apply_env_overrides().is_err());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/winnote"),
            backend: Backend::Sqlite,
            save_interval_ms: Some(1000),
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("backend = \"sqlite\""));
        assert!(toml_str.contains("save_interval_ms"));
        assert!(!toml_str.contains("log_file"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.backend, Backend::Sqlite);
        assert_eq!(parsed.save_interval_ms, Some(1000));
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            backend = "key-value"
            prefix = "notes"
            auto_save = true
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.backend, Backend::KeyValue);
        assert!(config.key_value_path().ends_with("notes.json"));
        assert!(config.auto_save);
        // Unset fields keep their defaults
        assert!(config.periodic_save);
        assert_eq!(config.database_name, "WinNoteDB");
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp = tempfile::TempDir::new().unwrap();
        env::set_var("WINNOTE_DATA_DIR", temp.path().join("data"));

        let config = Config::load_from_path(&temp.path().join("missing.toml")).unwrap();

        assert_eq!(config.backend, Backend::Auto);
        assert!(temp.path().join("data").exists());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config {
            data_dir: temp.path().to_path_buf(),
            ..Config::default()
        };
        config.set_value("backend", "memory").unwrap();
        config.set_value("auto_save", "true").unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.backend, Backend::Memory);
        assert!(loaded.auto_save);
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let mut config = Config::default();

        assert!(config.set_value("colour", "blue").is_err());
        assert!(config.set_value("auto_save", "maybe").is_err());
        assert!(config.set_value("prefix", "").is_err());

        config.set_value("save_interval_ms", "750").unwrap();
        assert_eq!(config.save_interval_ms, Some(750));
        config.set_value("save_interval_ms", "none").unwrap();
        assert!(config.save_interval_ms.is_none());
    }
}
