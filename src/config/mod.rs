mod basic;
mod database;

pub use basic::BasicConfig;
pub use database::DatabaseConfig;
pub(crate) use database::redact;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Database server and schema settings (see `database` table in config.toml).
    #[serde(default)]
    pub database: DatabaseConfig,
}

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Prefix for environment overrides, e.g. `DRYFRUITS_DATABASE__PASSWORD`.
pub const ENV_PREFIX: &str = "DRYFRUITS_";

impl Config {
    /// Builds a Figment that merges defaults, an optional TOML file and the environment.
    pub fn figment(path: &Path) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if path.is_file() {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads configuration from `path` (if it exists) layered over defaults and env.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        let cfg: Self = Self::figment(&path).extract()?;
        if cfg.database.name.trim().is_empty() && cfg.database.url.is_none() {
            return Err(figment::Error::from(
                "database.name must be set and non-empty".to_string(),
            ));
        }
        Ok(cfg)
    }
}
