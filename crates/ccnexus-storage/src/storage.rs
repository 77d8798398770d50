use async_trait::async_trait;
use serde_json::Value as JsonValue;
use time::{Date, OffsetDateTime};

use crate::snapshot::StorageSnapshot;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("db error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("serde json error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct EndpointInput {
    pub client_type: String,
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    pub enabled: bool,
    pub transformer: String,
    pub model: Option<String>,
    pub sort_order: i32,
    pub tags: Option<JsonValue>,
    pub model_patterns: Option<JsonValue>,
    pub priority: Option<i32>,
    pub cost_per_input_token: Option<f64>,
    pub cost_per_output_token: Option<f64>,
    pub quota_limit: Option<i64>,
    pub quota_reset_cycle: Option<String>,
}

/// One terminated request's token contribution, added atomically into the
/// matching `(clientType, endpointName, date, deviceId)` row.
#[derive(Debug, Clone)]
pub struct DailyStatDelta {
    pub client_type: String,
    pub endpoint_name: String,
    pub date: Date,
    pub device_id: String,
    pub requests: i64,
    pub errors: i64,
    pub input_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
    pub output_tokens: i64,
}

#[derive(Debug, Clone)]
pub struct RequestStatInput {
    pub endpoint_name: String,
    pub client_type: String,
    pub client_ip: Option<String>,
    pub request_id: String,
    pub timestamp: OffsetDateTime,
    pub model: Option<String>,
    pub is_streaming: bool,
    pub success: bool,
    pub duration_ms: i64,
    pub input_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
    pub output_tokens: i64,
    /// Truncated to 500 chars before insert.
    pub error_message: Option<String>,
}

/// Config keys safe to carry across a device backup/export. Explicit
/// allowlist, not a denylist: an unrecognized key is stripped, not kept.
pub fn config_export_allowlist() -> &'static [&'static str] {
    &[
        "port",
        "log_level",
        "language",
        "theme",
        "webdav_url",
        "webdav_username",
        "webdav_password",
        "s3_endpoint",
        "s3_bucket",
        "s3_access_key",
        "s3_secret_key",
        "update_channel",
        "auto_update",
    ]
}

/// Storage is used for:
/// - bootstrap (load_snapshot)
/// - endpoint CRUD
/// - stats writes (DailyStat upsert-add, RequestStat append)
///
/// Runtime reads must NOT hit DB; the dispatcher reads from the in-memory
/// snapshot it loaded at bootstrap and keeps current via its own writes.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Entity-first schema sync (SeaORM 2.0). Idempotent, run at startup.
    async fn sync(&self) -> StorageResult<()>;

    async fn load_snapshot(&self) -> StorageResult<StorageSnapshot>;

    async fn save_endpoint(&self, input: EndpointInput) -> StorageResult<i64>;
    async fn update_endpoint(&self, input: EndpointInput) -> StorageResult<()>;
    async fn delete_endpoint(&self, client_type: &str, name: &str) -> StorageResult<()>;
    async fn get_endpoints_by_client(
        &self,
        client_type: &str,
    ) -> StorageResult<Vec<crate::snapshot::EndpointRow>>;

    async fn record_daily_stat(&self, delta: DailyStatDelta) -> StorageResult<()>;
    async fn record_request_stat(&self, input: RequestStatInput) -> StorageResult<()>;
    async fn cleanup_old_request_stats(&self, retention_days: u32) -> StorageResult<u64>;

    async fn get_config(&self, key: &str) -> StorageResult<Option<String>>;
    async fn set_config(&self, key: &str, value: &str) -> StorageResult<()>;
    async fn export_config_safe(&self) -> StorageResult<Vec<(String, String)>>;
}
