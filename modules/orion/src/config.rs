use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use orion_db::DbConfig;
use orion_query::EntityDef;
use orion_security::AccessMode;
use serde::{Deserialize, Serialize};

use crate::domain::ServiceConfig;

/// Environment variable prefix; nested keys are separated by `__`, e.g.
/// `ORION__DATABASE__DSN`.
pub const ENV_PREFIX: &str = "ORION__";

/// Configuration for the Orion module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrionConfig {
    #[serde(default)]
    pub database: DbConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Caller entities, merged over the built-in `user` and `asset`.
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    /// Mode given to request contexts that do not pick one explicitly.
    pub default_mode: AccessMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaginationConfig {
    #[serde(default = "default_take")]
    pub default_take: i64,
    #[serde(default = "default_max_take")]
    pub max_take: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_take: default_take(),
            max_take: default_max_take(),
        }
    }
}

impl From<PaginationConfig> for ServiceConfig {
    fn from(cfg: PaginationConfig) -> Self {
        Self {
            default_take: cfg.default_take,
            max_take: cfg.max_take,
        }
    }
}

fn default_take() -> i64 {
    50
}

fn default_max_take() -> i64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory uploaded assets are written to.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/assets")
}

impl OrionConfig {
    /// Defaults, then the optional YAML file, then `ORION__*` variables.
    ///
    /// # Errors
    /// Returns the figment error for an unreadable file or a value that does
    /// not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(OrionConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }

    /// Range checks serde cannot express.
    ///
    /// # Errors
    /// A message naming the offending key.
    pub fn validate(&self) -> Result<(), String> {
        let p = &self.pagination;
        if p.default_take <= 0 || p.max_take <= 0 {
            return Err("pagination.default_take and pagination.max_take must be positive".to_owned());
        }
        if p.default_take > p.max_take {
            return Err(format!(
                "pagination.default_take ({}) exceeds pagination.max_take ({})",
                p.default_take, p.max_take
            ));
        }
        Ok(())
    }
}
