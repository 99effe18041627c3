use crate::models::remote_config::{
    now, payload_contains_nul, ConfigMap, ConfigStatus, Environment, RemoteConfig, VersionToken, LATEST_VERSION,
};
use crate::store::{ConfigStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Remote config service errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration found for appId={app_id}, env={env}, version={version}")]
    NotFound {
        app_id: String,
        env: String,
        version: String,
    },

    #[error("Configuration already exists for appId={app_id}, env={env}, version={version}")]
    DuplicateIdentity {
        app_id: String,
        env: String,
        version: String,
    },

    #[error("Invalid timestamp '{0}', expected an ISO-8601 instant")]
    TimestampParse(String),

    #[error("'latest' is reserved and cannot be used as a version")]
    ReservedVersion,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ConfigError {
    fn not_found(app_id: &str, env: &str, version: &str) -> Self {
        ConfigError::NotFound {
            app_id: app_id.to_string(),
            env: env.to_string(),
            version: version.to_string(),
        }
    }
}

/// Parse a client-supplied timestamp (RFC 3339 / ISO-8601) into a UTC instant
pub fn parse_client_timestamp(raw: &str) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ConfigError::TimestampParse(raw.to_string()))
}

/// Staleness verdict for a resolved record.
///
/// Exact equality only: a client timestamp that is older *or newer* than the
/// stored `last_mod_date` means the cached copy must be refreshed.
pub fn staleness_of(record: &RemoteConfig, client_last_mod: &str) -> Result<ConfigStatus, ConfigError> {
    let client_ts = parse_client_timestamp(client_last_mod)?;
    if client_ts == record.last_mod_date {
        Ok(ConfigStatus::UpToDate)
    } else {
        Ok(ConfigStatus::NeedsUpdate)
    }
}

/// Resolution, staleness checks and mutations for remote configurations.
///
/// Holds no mutable state of its own; every call goes straight to the store.
#[derive(Clone)]
pub struct RemoteConfigService {
    store: Arc<dyn ConfigStore>,
}

impl RemoteConfigService {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    // =============================================================================
    // READS
    // =============================================================================

    /// Resolve a version token to a stored record.
    /// `Ok(None)` means nothing matched; it is up to the caller to treat that as an error.
    pub async fn resolve_for_read(
        &self,
        app_id: &str,
        env: &str,
        version_token: &str,
    ) -> Result<Option<RemoteConfig>, ConfigError> {
        let found = match VersionToken::parse(version_token) {
            VersionToken::Latest => self.store.find_latest(app_id, env).await?,
            VersionToken::Exact(version) => self.store.find_exact(app_id, env, &version).await?,
        };

        debug!(
            app_id = %app_id,
            env = %env,
            version = %version_token,
            found = found.is_some(),
            "Resolved config"
        );

        Ok(found)
    }

    /// Tell a client whether its cached copy of an exact version is current.
    /// Never resolves "latest"; the record must exist before the timestamp is looked at.
    pub async fn check_staleness(
        &self,
        app_id: &str,
        env: &str,
        version: &str,
        client_last_mod: &str,
    ) -> Result<ConfigStatus, ConfigError> {
        let record = self.find_existing(app_id, env, version).await?;
        let status = staleness_of(&record, client_last_mod)?;

        debug!(
            app_id = %app_id,
            env = %env,
            version = %version,
            status = ?status,
            "Checked config staleness"
        );

        Ok(status)
    }

    // =============================================================================
    // MUTATIONS
    // =============================================================================

    /// Persist a new record. Both timestamps are stamped here, whatever the caller sent.
    pub async fn create(&self, mut record: RemoteConfig) -> Result<RemoteConfig, ConfigError> {
        validate_identity(&record)?;

        if record.environment().is_none() {
            warn!(
                env = %record.env,
                known = ?Environment::ALL,
                "Creating config for an environment outside the known vocabulary"
            );
        }

        let created = now();
        record.creation_date = created;
        record.last_mod_date = created;

        // Uniqueness is left to the store so racing creates have a single winner
        match self.store.insert_unique(record.clone()).await {
            Ok(saved) => {
                info!(
                    app_id = %saved.app_id,
                    env = %saved.env,
                    version = %saved.version,
                    "Config created"
                );
                Ok(saved)
            }
            Err(StoreError::Duplicate) => {
                warn!(
                    app_id = %record.app_id,
                    env = %record.env,
                    version = %record.version,
                    "Rejected duplicate config"
                );
                Err(ConfigError::DuplicateIdentity {
                    app_id: record.app_id,
                    env: record.env,
                    version: record.version,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the payload of an existing record wholesale and bump `last_mod_date`.
    /// Concurrent replaces of the same triple are last-write-wins.
    pub async fn replace_payload(
        &self,
        app_id: &str,
        env: &str,
        version: &str,
        new_configs: ConfigMap,
    ) -> Result<RemoteConfig, ConfigError> {
        validate_payload(&new_configs)?;
        let mut record = self.find_existing(app_id, env, version).await?;
        record.replace_configs(new_configs, now());

        let saved = self.store.replace(record).await.map_err(|e| match e {
            StoreError::Missing => ConfigError::not_found(app_id, env, version),
            other => other.into(),
        })?;

        info!(
            app_id = %app_id,
            env = %env,
            version = %version,
            last_mod_date = %saved.last_mod_date,
            "Config payload replaced"
        );

        Ok(saved)
    }

    /// Remove a record and hand back what it looked like before deletion
    pub async fn delete(
        &self,
        app_id: &str,
        env: &str,
        version: &str,
    ) -> Result<RemoteConfig, ConfigError> {
        let record = self.find_existing(app_id, env, version).await?;

        self.store.delete(&record).await.map_err(|e| match e {
            StoreError::Missing => ConfigError::not_found(app_id, env, version),
            other => other.into(),
        })?;

        info!(app_id = %app_id, env = %env, version = %version, "Config deleted");

        Ok(record)
    }

    // =============================================================================
    // HELPER METHODS
    // =============================================================================

    async fn find_existing(
        &self,
        app_id: &str,
        env: &str,
        version: &str,
    ) -> Result<RemoteConfig, ConfigError> {
        self.store
            .find_exact(app_id, env, version)
            .await?
            .ok_or_else(|| ConfigError::not_found(app_id, env, version))
    }
}

fn validate_identity(record: &RemoteConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("appId", &record.app_id),
        ("env", &record.env),
        ("version", &record.version),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} must not be empty", field)));
        }
        if value.contains('\0') {
            return Err(ConfigError::Validation(format!("{} must not contain NUL characters", field)));
        }
    }
    if record.version == LATEST_VERSION {
        return Err(ConfigError::ReservedVersion);
    }
    validate_payload(&record.configs)
}

/// Every backing store must accept the payload, so reject what Postgres cannot hold
fn validate_payload(configs: &ConfigMap) -> Result<(), ConfigError> {
    if payload_contains_nul(configs) {
        return Err(ConfigError::Validation(
            "configs must not contain NUL characters".to_string(),
        ));
    }
    Ok(())
}
