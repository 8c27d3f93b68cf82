use crate::error::VaultError;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Process-wide configuration, resolved once from defaults and environment.
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| panic!("FATAL: failed to load configuration: {e}"))
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// SQLite file holding the `accounts` table. Parent dir is created on demand.
    pub database_path: PathBuf,
    /// Legacy flat-file credential store, imported once then renamed to `.bak`.
    pub legacy_path: PathBuf,
    pub loglevel: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/emails.db"),
            legacy_path: PathBuf::from("accounts.json"),
            loglevel: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by `DATABASE_PATH`, `LEGACY_PATH` and `LOGLEVEL`.
    pub fn load() -> Result<Self, VaultError> {
        Self::figment().extract().map_err(VaultError::from)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(&["database_path", "legacy_path", "loglevel"]))
    }
}
