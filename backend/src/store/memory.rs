use super::{ConfigStore, StoreError, StoreResult};
use crate::models::remote_config::RemoteConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

type Triple = (String, String, String);

fn triple(app_id: &str, env: &str, version: &str) -> Triple {
    (app_id.to_string(), env.to_string(), version.to_string())
}

/// Process-local store keyed by the identifying triple.
/// Thread-safe for concurrent access; contents are lost on restart.
#[derive(Default)]
pub struct InMemoryConfigStore {
    records: RwLock<HashMap<Triple, RemoteConfig>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> StoreResult<usize> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("Failed to read configs".to_string()))?;
        Ok(records.len())
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn insert_unique(&self, record: RemoteConfig) -> StoreResult<RemoteConfig> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("Failed to write config".to_string()))?;

        let key = triple(&record.app_id, &record.env, &record.version);
        if records.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn find_exact(
        &self,
        app_id: &str,
        env: &str,
        version: &str,
    ) -> StoreResult<Option<RemoteConfig>> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("Failed to read configs".to_string()))?;
        Ok(records.get(&triple(app_id, env, version)).cloned())
    }

    async fn find_latest(&self, app_id: &str, env: &str) -> StoreResult<Option<RemoteConfig>> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("Failed to read configs".to_string()))?;

        let latest = records
            .values()
            .filter(|r| r.app_id == app_id && r.env == env)
            .max_by(|a, b| {
                a.creation_date
                    .cmp(&b.creation_date)
                    .then_with(|| a.version.as_bytes().cmp(b.version.as_bytes()))
            });
        Ok(latest.cloned())
    }

    async fn replace(&self, record: RemoteConfig) -> StoreResult<RemoteConfig> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("Failed to write config".to_string()))?;

        let stored = records
            .get_mut(&triple(&record.app_id, &record.env, &record.version))
            .ok_or(StoreError::Missing)?;
        // creation_date and id are owned by the store
        stored.configs = record.configs;
        stored.last_mod_date = record.last_mod_date;
        Ok(stored.clone())
    }

    async fn delete(&self, record: &RemoteConfig) -> StoreResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("Failed to write config".to_string()))?;
        records
            .remove(&triple(&record.app_id, &record.env, &record.version))
            .map(|_| ())
            .ok_or(StoreError::Missing)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.len().map(|_| ())
    }
}
