use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "endpoint_quotas")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "endpoint_quota_identity")]
    pub client_type: String,
    #[sea_orm(unique_key = "endpoint_quota_identity")]
    pub endpoint_name: String,
    pub period_start: OffsetDateTime,
    pub reset_cycle: String,
    pub quota_limit: Option<i64>,
    pub used: i64,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
