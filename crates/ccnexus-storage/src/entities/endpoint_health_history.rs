use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "endpoint_health_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub client_type: String,
    /// Not a foreign key: history survives endpoint deletion, keyed by name.
    pub endpoint_name: String,
    pub recorded_at: OffsetDateTime,
    /// `available|cooldown|disabled`.
    pub status: String,
    pub consecutive_errors: i32,
    pub reason: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
