//! Application configuration loaded from environment variables.

use serde::{Deserialize, Deserializer};
use strum::{Display, EnumString};

use crate::error::ServiceError;

/// Which [`BudgetStore`](crate::store::BudgetStore) implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoreBackend {
    /// MongoDB reached through `MONGO_URI`.
    #[default]
    Mongo,
    /// Process-local store; contents are lost on shutdown.
    Memory,
}

// Goes through `FromStr` so env and CLI accept the same spellings.
impl<'de> Deserialize<'de> for StoreBackend {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown store backend: {raw}")))
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Persistence ===
    /// MongoDB connection string.
    #[serde(default)]
    pub mongo_uri: Option<String>,

    /// Database name override. Falls back to the URI's default database.
    #[serde(default)]
    pub mongo_database: Option<String>,

    /// Store implementation.
    #[serde(default)]
    pub store_backend: StoreBackend,

    // === Server Configuration ===
    /// HTTP listening port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: None,
            mongo_database: None,
            store_backend: StoreBackend::default(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, ServiceError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Check if the configuration is usable.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.store_backend == StoreBackend::Mongo && self.mongo_uri().is_none() {
            return Err(ServiceError::MissingMongoUri);
        }

        if let Some(database) = &self.mongo_database {
            if database.trim().is_empty() {
                return Err(ServiceError::InvalidConfig(
                    "MONGO_DATABASE must not be blank".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Connection string, treating a blank value as unset.
    pub fn mongo_uri(&self) -> Option<&str> {
        self.mongo_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }
}
