use sea_orm::entity::prelude::*;
use time::Date;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "daily_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "daily_stat_identity")]
    pub client_type: String,
    #[sea_orm(unique_key = "daily_stat_identity")]
    pub endpoint_name: String,
    #[sea_orm(unique_key = "daily_stat_identity")]
    pub date: Date,
    #[sea_orm(unique_key = "daily_stat_identity")]
    pub device_id: String,
    pub requests: i64,
    pub errors: i64,
    pub input_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
    pub output_tokens: i64,
}

impl ActiveModelBehavior for ActiveModel {}
