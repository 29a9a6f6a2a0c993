//! Configuration management for shelfstore.
//!
//! Sources are layered, later ones winning:
//!
//! 1. built-in defaults
//! 2. `config/default.{toml,yaml,json,...}` (optional)
//! 3. `config/{RUN_MODE}.*` (optional, `RUN_MODE` defaults to `development`)
//! 4. `SHELFSTORE_*` environment variables, with `__` between nested keys
//!    (`SHELFSTORE_STORAGE__SQLITE__PATH`)
//! 5. the short-hand variables `STORAGE_TYPE` and `DB_PATH`

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;

/// Which backend serves the store.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file, or `:memory:` for a private in-memory database.
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

impl SqliteConfig {
    pub const MEMORY_PATH: &'static str = ":memory:";

    pub fn is_memory(&self) -> bool {
        self.path == Self::MEMORY_PATH
    }

    /// Connection URL understood by the SQLite backend.
    pub fn url(&self) -> String {
        match self.is_memory() {
            true => "sqlite::memory:".to_string(),
            false => format!("sqlite://{}", self.path),
        }
    }

    /// Directory that has to exist before the database file can be created.
    pub fn parent_dir(&self) -> Option<PathBuf> {
        if self.is_memory() {
            return None;
        }

        Path::new(&self.path)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "./data/library.db".to_string(),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub sqlite: SqliteConfig,
    /// Serve from memory when the configured database cannot be opened.
    pub fallback_to_memory: bool,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            sqlite: SqliteConfig::default(),
            fallback_to_memory: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SeedConfig {
    /// Insert the sample catalogue into an empty store.
    pub enabled: bool,
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub seed: SeedConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from `./config` and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::from_layers(Path::new("config"), &run_mode, None)
    }

    /// Load configuration from the files in `dir`.
    ///
    /// `vars` replaces the process environment when given, which keeps the variable
    /// layers testable.
    pub fn from_layers(
        dir: &Path,
        run_mode: &str,
        vars: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| match &vars {
            Some(vars) => vars.get(key).cloned(),
            None => env::var(key).ok(),
        };
        let db_path = lookup("DB_PATH");
        let storage_type = lookup("STORAGE_TYPE").map(|kind| kind.to_lowercase());

        Config::builder()
            .add_source(File::from(dir.join("default")).required(false))
            .add_source(File::from(dir.join(run_mode)).required(false))
            .add_source(
                Environment::with_prefix("SHELFSTORE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars.clone()),
            )
            .set_override_option("storage.backend", storage_type)?
            .set_override_option("storage.sqlite.path", db_path)?
            .build()?
            .try_deserialize()
    }
}
