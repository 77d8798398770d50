use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "request_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
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

impl ActiveModelBehavior for ActiveModel {}
