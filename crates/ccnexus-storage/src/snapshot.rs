use serde_json::Value as JsonValue;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct EndpointRow {
    pub id: i64,
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
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct AppConfigRow {
    pub key: String,
    pub value: String,
}

/// Loaded once at bootstrap and held in an `ArcSwap` by the dispatcher.
/// Runtime reads must never hit the DB again after this.
#[derive(Debug, Clone, Default)]
pub struct StorageSnapshot {
    pub endpoints: Vec<EndpointRow>,
    pub config: Vec<AppConfigRow>,
}
