use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "endpoints")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "endpoint_identity")]
    pub client_type: String,
    #[sea_orm(unique_key = "endpoint_identity")]
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    pub enabled: bool,
    /// `claude|openai|openai2|gemini|deepseek`.
    pub transformer: String,
    pub model: Option<String>,
    pub sort_order: i32,
    pub tags: Option<Json>,
    pub model_patterns: Option<Json>,
    pub priority: Option<i32>,
    pub cost_per_input_token: Option<f64>,
    pub cost_per_output_token: Option<f64>,
    pub quota_limit: Option<i64>,
    pub quota_reset_cycle: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
