// Persistence layer for remote configuration records
pub mod memory;
pub mod postgres;

pub use memory::InMemoryConfigStore;
pub use postgres::PgConfigStore;

use crate::models::remote_config::RemoteConfig;
use async_trait::async_trait;
use thiserror::Error;

/// Store-level errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A record with the same (appId, env, version) already exists")]
    Duplicate,

    #[error("Record no longer exists")]
    Missing,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Narrow persistence contract the configuration service depends on.
///
/// Implementations must enforce uniqueness of the (`app_id`, `env`, `version`) triple
/// atomically in `insert_unique`: of two racing inserts for the same triple, exactly
/// one succeeds and the other gets [`StoreError::Duplicate`].
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn insert_unique(&self, record: RemoteConfig) -> StoreResult<RemoteConfig>;

    async fn find_exact(
        &self,
        app_id: &str,
        env: &str,
        version: &str,
    ) -> StoreResult<Option<RemoteConfig>>;

    /// Record with the greatest `creation_date` for the pair; ties go to the
    /// byte-wise greatest `version`.
    async fn find_latest(&self, app_id: &str, env: &str) -> StoreResult<Option<RemoteConfig>>;

    /// Overwrite payload and `last_mod_date` of the record with the same triple.
    /// Returns [`StoreError::Missing`] if it was deleted in the meantime.
    async fn replace(&self, record: RemoteConfig) -> StoreResult<RemoteConfig>;

    async fn delete(&self, record: &RemoteConfig) -> StoreResult<()>;

    /// Cheap liveness probe used by the health endpoint
    async fn ping(&self) -> StoreResult<()>;
}
