use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Tenant schema used when a request carries no X-Tenant-Schema header.
    pub default_schema: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let default_schema = env_map
            .get("DEFAULT_SCHEMA")
            .cloned()
            .unwrap_or_else(|| "public".to_string());
        if default_schema.is_empty() {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_SCHEMA".to_string(),
                "must not be empty".to_string(),
            ));
        }

        Ok(Config {
            port,
            database_path,
            default_schema,
        })
    }
}
