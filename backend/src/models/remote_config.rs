use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Reserved version token that resolves to the most recently created record.
/// Never stored as a real version.
pub const LATEST_VERSION: &str = "latest";

/// Opaque configuration payload. Never interpreted by the service.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Intended environment vocabulary. The `env` field of a record stays free-form;
/// this enum only names the well-known labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// A single developer's or team's machine
    Local,
    /// Shared internal development
    Dev,
    /// Automated testing / QA
    Test,
    /// Pre-production, mirrors prod as closely as possible
    Staging,
    /// What end users talk to
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 5] = [
        Environment::Local,
        Environment::Dev,
        Environment::Test,
        Environment::Staging,
        Environment::Prod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    /// Look up a well-known environment by its exact label
    pub fn from_label(label: &str) -> Option<Environment> {
        Self::ALL.into_iter().find(|env| env.as_str() == label)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staleness verdict for a client's cached copy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigStatus {
    UpToDate,
    NeedsUpdate,
}

impl ConfigStatus {
    /// Numeric code exposed to clients (0 = up to date, 1 = needs update)
    pub fn code(&self) -> u8 {
        match self {
            ConfigStatus::UpToDate => 0,
            ConfigStatus::NeedsUpdate => 1,
        }
    }
}

/// How a requested version token should be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionToken {
    /// Most recently created record for the (app, env) pair
    Latest,
    /// Exact version match
    Exact(String),
}

impl VersionToken {
    pub fn parse(token: &str) -> Self {
        if token == LATEST_VERSION {
            VersionToken::Latest
        } else {
            VersionToken::Exact(token.to_string())
        }
    }
}

/// Current time, truncated to the microsecond precision of the backing store.
pub fn now() -> DateTime<Utc> {
    truncate_micros(Utc::now())
}

pub fn truncate_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = ts.nanosecond() - ts.nanosecond() % 1_000;
    ts.with_nanosecond(nanos).unwrap_or(ts)
}

/// True if any key or string value in the payload, at any depth, holds a NUL character.
/// Postgres text and JSONB cannot store those.
pub fn payload_contains_nul(configs: &ConfigMap) -> bool {
    fn value_has_nul(value: &serde_json::Value) -> bool {
        match value {
            serde_json::Value::String(s) => s.contains('\0'),
            serde_json::Value::Array(items) => items.iter().any(value_has_nul),
            serde_json::Value::Object(map) => payload_contains_nul(map),
            _ => false,
        }
    }

    configs
        .iter()
        .any(|(key, value)| key.contains('\0') || value_has_nul(value))
}

/// A versioned, environment-scoped configuration document.
///
/// Identified by the (`app_id`, `env`, `version`) triple, which is unique across the store.
/// `last_mod_date >= creation_date` holds for every record produced by this module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub id: Uuid,
    pub app_id: String,
    pub env: String,
    pub version: String,
    #[serde(default)]
    pub configs: ConfigMap,
    pub creation_date: DateTime<Utc>,
    pub last_mod_date: DateTime<Utc>,
}

impl RemoteConfig {
    /// Build a fresh record; both timestamps are set to the same instant
    pub fn new(app_id: String, env: String, version: String, configs: ConfigMap) -> Self {
        let created = now();
        Self {
            id: Uuid::new_v4(),
            app_id,
            env,
            version,
            configs,
            creation_date: created,
            last_mod_date: created,
        }
    }

    /// Swap the payload wholesale and bump `last_mod_date`.
    ///
    /// The new timestamp is at least one microsecond past the previous one, so it
    /// strictly increases even when the clock has not advanced.
    pub fn replace_configs(&mut self, configs: ConfigMap, at: DateTime<Utc>) {
        let floor = self.last_mod_date + Duration::microseconds(1);
        self.configs = configs;
        self.last_mod_date = truncate_micros(at).max(floor);
    }

    pub fn environment(&self) -> Option<Environment> {
        Environment::from_label(&self.env)
    }
}

// ===== API DTOs =====

/// Create Config Request DTO
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConfigDTO {
    #[validate(length(min = 1))]
    pub app_id: String,
    #[validate(length(min = 1))]
    pub env: String,
    #[validate(length(min = 1))]
    pub version: String,
    #[serde(default)]
    pub configs: ConfigMap,
}

impl From<CreateConfigDTO> for RemoteConfig {
    fn from(dto: CreateConfigDTO) -> Self {
        RemoteConfig::new(dto.app_id, dto.env, dto.version, dto.configs)
    }
}

/// Replace Configs Request DTO
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReplaceConfigsDTO {
    pub configs: ConfigMap,
}

/// Staleness check response
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigStatusResponse {
    pub status: ConfigStatus,
    pub code: u8,
}

impl From<ConfigStatus> for ConfigStatusResponse {
    fn from(status: ConfigStatus) -> Self {
        Self {
            status,
            code: status.code(),
        }
    }
}
