use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;

/// Environment variable overriding the database location.
pub const DB_ENV_VAR: &str = "LIBRARY_CATALOG_DB";
/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".library-catalog";
const DB_FILE_NAME: &str = "library.sqlite";
/// Written next to the database; the terminal UI owns stdout.
const LOG_FILE_NAME: &str = "library-catalog.log";

/// Paths resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_path: PathBuf,
}

impl Config {
    /// Precedence: explicit `--db` flag, then `LIBRARY_CATALOG_DB`, then the
    /// home directory default.
    pub fn resolve(db_override: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_override {
            Some(path) => path,
            None => match env::var_os(DB_ENV_VAR) {
                Some(value) if !value.is_empty() => PathBuf::from(value),
                _ => default_db_path()?,
            },
        };
        Ok(Self::for_database(db_path))
    }

    pub fn for_database(db_path: PathBuf) -> Self {
        let log_path = db_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .join(LOG_FILE_NAME);
        Self { db_path, log_path }
    }

    /// Make sure the directory holding the database and log exists.
    pub fn prepare_data_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create data directory {}", parent.display())
                })?;
            }
        }
        Ok(())
    }
}

/// Resolve the absolute path to the SQLite database inside the user's home.
fn default_db_path() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME).join(DB_FILE_NAME))
}
