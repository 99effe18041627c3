use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub rust_log: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("unknown STORE_BACKEND '{}', expected 'postgres' or 'memory'", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = lookup("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .context("PORT must be a valid port number")?;
        let rust_log = lookup("RUST_LOG")
            .unwrap_or_else(|| "blendberry_backend=info,actix_web=info".to_string());

        let backend: StoreBackend = lookup("STORE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;

        let database = match backend {
            StoreBackend::Postgres => {
                let url = lookup("DATABASE_URL")
                    .context("DATABASE_URL is required when STORE_BACKEND=postgres")?;
                let max_connections: u32 = lookup("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|| "5".to_string())
                    .parse()
                    .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
                let acquire_timeout_secs: u64 = lookup("DATABASE_ACQUIRE_TIMEOUT_SECS")
                    .unwrap_or_else(|| "5".to_string())
                    .parse()
                    .context("DATABASE_ACQUIRE_TIMEOUT_SECS must be a positive integer")?;
                Some(DatabaseConfig {
                    url,
                    max_connections,
                    acquire_timeout_secs,
                })
            }
            StoreBackend::Memory => None,
        };

        Ok(Config {
            server: ServerConfig { port, host, rust_log },
            store: StoreConfig { backend, database },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_memory_backend_defaults() {
        let config = Config::from_lookup(lookup_from(&[("STORE_BACKEND", "memory")])).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.rust_log, "blendberry_backend=info,actix_web=info");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.store.database.is_none());
    }

    #[test]
    fn test_postgres_backend_requires_database_url() {
        assert!(Config::from_lookup(lookup_from(&[])).is_err());

        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/blendberry"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("PORT", "9000"),
        ]))
        .unwrap();
        let database = config.store.database.unwrap();
        assert_eq!(database.url, "postgres://localhost/blendberry");
        assert_eq!(database.max_connections, 12);
        assert_eq!(database.acquire_timeout_secs, 5);
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(Config::from_lookup(lookup_from(&[("STORE_BACKEND", "mongo")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "memory"),
            ("PORT", "not-a-port"),
        ]))
        .is_err());
    }
}
