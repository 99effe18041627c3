use super::{ConfigStore, StoreError, StoreResult};
use crate::db::DbPool;
use crate::models::remote_config::{ConfigMap, RemoteConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Row shape of the `remote_configs` table
#[derive(Debug, FromRow)]
struct RemoteConfigRow {
    id: Uuid,
    app_id: String,
    env: String,
    version: String,
    configs: Json<ConfigMap>,
    creation_date: DateTime<Utc>,
    last_mod_date: DateTime<Utc>,
}

impl From<RemoteConfigRow> for RemoteConfig {
    fn from(row: RemoteConfigRow) -> Self {
        Self {
            id: row.id,
            app_id: row.app_id,
            env: row.env,
            version: row.version,
            configs: row.configs.0,
            creation_date: row.creation_date,
            last_mod_date: row.last_mod_date,
        }
    }
}

/// Postgres-backed config store.
///
/// Triple uniqueness is enforced by the `remote_configs_app_env_version_key`
/// constraint, so concurrent creates race inside Postgres rather than here.
#[derive(Clone)]
pub struct PgConfigStore {
    pool: DbPool,
}

impl PgConfigStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn insert_unique(&self, record: RemoteConfig) -> StoreResult<RemoteConfig> {
        let row = sqlx::query_as::<_, RemoteConfigRow>(
            r#"
            INSERT INTO remote_configs (
                id, app_id, env, version, configs, creation_date, last_mod_date
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7
            )
            RETURNING id, app_id, env, version, configs, creation_date, last_mod_date
            "#,
        )
        .bind(record.id)
        .bind(&record.app_id)
        .bind(&record.env)
        .bind(&record.version)
        .bind(Json(&record.configs))
        .bind(record.creation_date)
        .bind(record.last_mod_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(row.into())
    }

    async fn find_exact(
        &self,
        app_id: &str,
        env: &str,
        version: &str,
    ) -> StoreResult<Option<RemoteConfig>> {
        let row = sqlx::query_as::<_, RemoteConfigRow>(
            r#"
            SELECT id, app_id, env, version, configs, creation_date, last_mod_date
            FROM remote_configs
            WHERE app_id = $1 AND env = $2 AND version = $3
            "#,
        )
        .bind(app_id)
        .bind(env)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_latest(&self, app_id: &str, env: &str) -> StoreResult<Option<RemoteConfig>> {
        let row = sqlx::query_as::<_, RemoteConfigRow>(
            r#"
            SELECT id, app_id, env, version, configs, creation_date, last_mod_date
            FROM remote_configs
            WHERE app_id = $1 AND env = $2
            ORDER BY creation_date DESC, version COLLATE "C" DESC
            LIMIT 1
            "#,
        )
        .bind(app_id)
        .bind(env)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn replace(&self, record: RemoteConfig) -> StoreResult<RemoteConfig> {
        let row = sqlx::query_as::<_, RemoteConfigRow>(
            r#"
            UPDATE remote_configs
            SET configs = $1,
                last_mod_date = $2
            WHERE app_id = $3 AND env = $4 AND version = $5
            RETURNING id, app_id, env, version, configs, creation_date, last_mod_date
            "#,
        )
        .bind(Json(&record.configs))
        .bind(record.last_mod_date)
        .bind(&record.app_id)
        .bind(&record.env)
        .bind(&record.version)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(StoreError::Missing)
    }

    async fn delete(&self, record: &RemoteConfig) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM remote_configs
            WHERE app_id = $1 AND env = $2 AND version = $3
            "#,
        )
        .bind(&record.app_id)
        .bind(&record.env)
        .bind(&record.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::db::health_check(&self.pool).await?;
        Ok(())
    }
}

/// Postgres SQLSTATE 23505 (unique_violation)
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::remote_config::now;
    use chrono::Duration;
    use serde_json::json;
    use sqlx::PgPool;

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn test_row_to_record() {
        let now = Utc::now();
        let mut configs = ConfigMap::new();
        configs.insert("featureX".to_string(), json!(true));
        configs.insert("limits".to_string(), json!({"max": 3}));

        let row = RemoteConfigRow {
            id: Uuid::new_v4(),
            app_id: "app1".to_string(),
            env: "prod".to_string(),
            version: "1.0.0".to_string(),
            configs: Json(configs.clone()),
            creation_date: now,
            last_mod_date: now,
        };
        let id = row.id;

        let record: RemoteConfig = row.into();
        assert_eq!(record.id, id);
        assert_eq!(
            (record.app_id.as_str(), record.env.as_str(), record.version.as_str()),
            ("app1", "prod", "1.0.0")
        );
        assert_eq!(record.configs, configs);
        assert_eq!(record.creation_date, record.last_mod_date);
    }

    // The tests below run against a real database: sqlx creates a scratch
    // database per test from DATABASE_URL and applies ./migrations.

    fn record_at(app_id: &str, env: &str, version: &str, created: DateTime<Utc>) -> RemoteConfig {
        RemoteConfig {
            id: Uuid::new_v4(),
            app_id: app_id.to_string(),
            env: env.to_string(),
            version: version.to_string(),
            configs: ConfigMap::new(),
            creation_date: created,
            last_mod_date: created,
        }
    }

    async fn row_count(pool: &PgPool) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM remote_configs")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_pg_insert_round_trips_exactly(pool: PgPool) {
        let store = PgConfigStore::new(pool);
        let mut record = record_at("app1", "prod", "1.0.0", now());
        record.configs.insert("featureX".to_string(), json!(true));
        record.configs.insert("nested".to_string(), json!({"list": [1, "two", null]}));

        let inserted = store.insert_unique(record.clone()).await.unwrap();
        assert_eq!(inserted, record);

        let found = store.find_exact("app1", "prod", "1.0.0").await.unwrap();
        assert_eq!(found, Some(record));
        assert!(store.find_exact("app1", "dev", "1.0.0").await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_pg_duplicate_triple_is_rejected(pool: PgPool) {
        let store = PgConfigStore::new(pool.clone());
        store
            .insert_unique(record_at("app1", "prod", "1.0.0", now()))
            .await
            .unwrap();

        let second = store
            .insert_unique(record_at("app1", "prod", "1.0.0", now()))
            .await;
        assert!(matches!(second, Err(StoreError::Duplicate)));
        assert_eq!(row_count(&pool).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_pg_concurrent_inserts_have_single_winner(pool: PgPool) {
        let store = PgConfigStore::new(pool.clone());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_unique(record_at("app1", "prod", "2.0.0", now()))
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(StoreError::Duplicate) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(row_count(&pool).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_pg_find_latest_ordering(pool: PgPool) {
        let store = PgConfigStore::new(pool);
        let created = now() - Duration::minutes(5);

        // Same creation date: byte-wise greatest version wins
        for version in ["1.10.0", "1.9.0", "1.2.0"] {
            store
                .insert_unique(record_at("app1", "prod", version, created))
                .await
                .unwrap();
        }
        let latest = store.find_latest("app1", "prod").await.unwrap().unwrap();
        assert_eq!(latest.version, "1.9.0");

        store
            .insert_unique(record_at("app1", "prod", "0.1.0", created + Duration::seconds(1)))
            .await
            .unwrap();
        let latest = store.find_latest("app1", "prod").await.unwrap().unwrap();
        assert_eq!(latest.version, "0.1.0");

        assert!(store.find_latest("app1", "staging").await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_pg_replace_and_delete(pool: PgPool) {
        let store = PgConfigStore::new(pool);
        let missing = record_at("app1", "prod", "1.0.0", now());
        assert!(matches!(store.replace(missing.clone()).await, Err(StoreError::Missing)));
        assert!(matches!(store.delete(&missing).await, Err(StoreError::Missing)));

        let original = store.insert_unique(missing).await.unwrap();
        let mut update = original.clone();
        update.id = Uuid::new_v4();
        update.creation_date = original.creation_date - Duration::days(1);
        update.configs.insert("k".to_string(), json!("v"));
        update.last_mod_date = original.last_mod_date + Duration::seconds(1);

        let stored = store.replace(update.clone()).await.unwrap();
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.creation_date, original.creation_date);
        assert_eq!(stored.last_mod_date, update.last_mod_date);
        assert_eq!(stored.configs, update.configs);

        store.delete(&stored).await.unwrap();
        assert!(store.find_exact("app1", "prod", "1.0.0").await.unwrap().is_none());
        assert!(matches!(store.delete(&stored).await, Err(StoreError::Missing)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_pg_schema_checks(pool: PgPool) {
        let store = PgConfigStore::new(pool.clone());

        let reserved = store.insert_unique(record_at("app1", "prod", "latest", now())).await;
        assert!(matches!(reserved, Err(StoreError::Database(_))));

        let empty = store.insert_unique(record_at("", "prod", "1.0.0", now())).await;
        assert!(matches!(empty, Err(StoreError::Database(_))));

        let mut backwards = record_at("app1", "prod", "1.0.0", now());
        backwards.last_mod_date = backwards.creation_date - Duration::seconds(1);
        assert!(matches!(
            store.insert_unique(backwards).await,
            Err(StoreError::Database(_))
        ));

        assert_eq!(row_count(&pool).await, 0);
    }
}
