use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Schema,
    TransactionTrait,
};
use time::OffsetDateTime;

use crate::db::connect_shared;
use crate::entities;
use crate::snapshot::{AppConfigRow, EndpointRow, StorageSnapshot};
use crate::storage::{
    DailyStatDelta, EndpointInput, RequestStatInput, Storage, StorageError, StorageResult,
    config_export_allowlist,
};

#[derive(Clone)]
pub struct SqlStorage {
    db: DatabaseConnection,
}

impl SqlStorage {
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        let db = connect_shared(dsn).await?;
        Ok(Self { db })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn truncate_error(message: Option<String>) -> Option<String> {
    message.map(|msg| {
        if msg.chars().count() > 500 {
            msg.chars().take(500).collect()
        } else {
            msg
        }
    })
}

#[async_trait]
impl Storage for SqlStorage {
    async fn sync(&self) -> StorageResult<()> {
        Schema::new(self.db.get_database_backend())
            .builder()
            .register(entities::Endpoints)
            .register(entities::DailyStats)
            .register(entities::RequestStats)
            .register(entities::AppConfig)
            .register(entities::EndpointHealthHistory)
            .register(entities::EndpointQuotas)
            .sync(&self.db)
            .await?;
        Ok(())
    }

    async fn load_snapshot(&self) -> StorageResult<StorageSnapshot> {
        let endpoints = entities::Endpoints::find()
            .order_by_asc(entities::endpoints::Column::SortOrder)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| EndpointRow {
                id: m.id,
                client_type: m.client_type,
                name: m.name,
                api_url: m.api_url,
                api_key: m.api_key,
                enabled: m.enabled,
                transformer: m.transformer,
                model: m.model,
                sort_order: m.sort_order,
                tags: m.tags,
                model_patterns: m.model_patterns,
                priority: m.priority,
                cost_per_input_token: m.cost_per_input_token,
                cost_per_output_token: m.cost_per_output_token,
                quota_limit: m.quota_limit,
                quota_reset_cycle: m.quota_reset_cycle,
                created_at: m.created_at,
                updated_at: m.updated_at,
            })
            .collect();

        let config = entities::AppConfig::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| AppConfigRow {
                key: m.key,
                value: m.value,
            })
            .collect();

        Ok(StorageSnapshot { endpoints, config })
    }

    async fn save_endpoint(&self, input: EndpointInput) -> StorageResult<i64> {
        use entities::endpoints::Column;
        let now = OffsetDateTime::now_utc();

        let active = entities::endpoints::ActiveModel {
            id: ActiveValue::NotSet,
            client_type: ActiveValue::Set(input.client_type),
            name: ActiveValue::Set(input.name),
            api_url: ActiveValue::Set(input.api_url),
            api_key: ActiveValue::Set(input.api_key),
            enabled: ActiveValue::Set(input.enabled),
            transformer: ActiveValue::Set(input.transformer),
            model: ActiveValue::Set(input.model),
            sort_order: ActiveValue::Set(input.sort_order),
            tags: ActiveValue::Set(input.tags),
            model_patterns: ActiveValue::Set(input.model_patterns),
            priority: ActiveValue::Set(input.priority),
            cost_per_input_token: ActiveValue::Set(input.cost_per_input_token),
            cost_per_output_token: ActiveValue::Set(input.cost_per_output_token),
            quota_limit: ActiveValue::Set(input.quota_limit),
            quota_reset_cycle: ActiveValue::Set(input.quota_reset_cycle),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let result = entities::Endpoints::insert(active)
            .on_conflict(
                OnConflict::columns([Column::ClientType, Column::Name])
                    .update_columns([
                        Column::ApiUrl,
                        Column::ApiKey,
                        Column::Enabled,
                        Column::Transformer,
                        Column::Model,
                        Column::SortOrder,
                        Column::Tags,
                        Column::ModelPatterns,
                        Column::Priority,
                        Column::CostPerInputToken,
                        Column::CostPerOutputToken,
                        Column::QuotaLimit,
                        Column::QuotaResetCycle,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(result.last_insert_id)
    }

    async fn update_endpoint(&self, input: EndpointInput) -> StorageResult<()> {
        self.save_endpoint(input).await.map(|_| ())
    }

    async fn delete_endpoint(&self, client_type: &str, name: &str) -> StorageResult<()> {
        use entities::endpoints::Column;
        entities::Endpoints::delete_many()
            .filter(Column::ClientType.eq(client_type))
            .filter(Column::Name.eq(name))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn get_endpoints_by_client(&self, client_type: &str) -> StorageResult<Vec<EndpointRow>> {
        use entities::endpoints::Column;
        let rows = entities::Endpoints::find()
            .filter(Column::ClientType.eq(client_type))
            .order_by_asc(Column::SortOrder)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| EndpointRow {
                id: m.id,
                client_type: m.client_type,
                name: m.name,
                api_url: m.api_url,
                api_key: m.api_key,
                enabled: m.enabled,
                transformer: m.transformer,
                model: m.model,
                sort_order: m.sort_order,
                tags: m.tags,
                model_patterns: m.model_patterns,
                priority: m.priority,
                cost_per_input_token: m.cost_per_input_token,
                cost_per_output_token: m.cost_per_output_token,
                quota_limit: m.quota_limit,
                quota_reset_cycle: m.quota_reset_cycle,
                created_at: m.created_at,
                updated_at: m.updated_at,
            })
            .collect();
        Ok(rows)
    }

    async fn record_daily_stat(&self, delta: DailyStatDelta) -> StorageResult<()> {
        use entities::daily_stats::Column;

        let db = self.db.clone();
        let result = db
            .transaction::<_, (), sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    let existing = entities::DailyStats::find()
                        .filter(Column::ClientType.eq(delta.client_type.clone()))
                        .filter(Column::EndpointName.eq(delta.endpoint_name.clone()))
                        .filter(Column::Date.eq(delta.date))
                        .filter(Column::DeviceId.eq(delta.device_id.clone()))
                        .one(txn)
                        .await?;

                    match existing {
                        Some(row) => {
                            let active = entities::daily_stats::ActiveModel {
                                id: ActiveValue::Set(row.id),
                                requests: ActiveValue::Set(row.requests + delta.requests),
                                errors: ActiveValue::Set(row.errors + delta.errors),
                                input_tokens: ActiveValue::Set(
                                    row.input_tokens + delta.input_tokens,
                                ),
                                cache_creation_tokens: ActiveValue::Set(
                                    row.cache_creation_tokens + delta.cache_creation_tokens,
                                ),
                                cache_read_tokens: ActiveValue::Set(
                                    row.cache_read_tokens + delta.cache_read_tokens,
                                ),
                                output_tokens: ActiveValue::Set(
                                    row.output_tokens + delta.output_tokens,
                                ),
                                ..Default::default()
                            };
                            entities::DailyStats::update(active).exec(txn).await?;
                        }
                        None => {
                            let active = entities::daily_stats::ActiveModel {
                                id: ActiveValue::NotSet,
                                client_type: ActiveValue::Set(delta.client_type),
                                endpoint_name: ActiveValue::Set(delta.endpoint_name),
                                date: ActiveValue::Set(delta.date),
                                device_id: ActiveValue::Set(delta.device_id),
                                requests: ActiveValue::Set(delta.requests),
                                errors: ActiveValue::Set(delta.errors),
                                input_tokens: ActiveValue::Set(delta.input_tokens),
                                cache_creation_tokens: ActiveValue::Set(
                                    delta.cache_creation_tokens,
                                ),
                                cache_read_tokens: ActiveValue::Set(delta.cache_read_tokens),
                                output_tokens: ActiveValue::Set(delta.output_tokens),
                            };
                            entities::DailyStats::insert(active).exec(txn).await?;
                        }
                    }

                    Ok(())
                })
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(sea_orm::TransactionError::Connection(err)) => Err(StorageError::Db(err)),
            Err(sea_orm::TransactionError::Transaction(err)) => Err(StorageError::Db(err)),
        }
    }

    async fn record_request_stat(&self, input: RequestStatInput) -> StorageResult<()> {
        let active = entities::request_stats::ActiveModel {
            id: ActiveValue::NotSet,
            endpoint_name: ActiveValue::Set(input.endpoint_name),
            client_type: ActiveValue::Set(input.client_type),
            client_ip: ActiveValue::Set(input.client_ip),
            request_id: ActiveValue::Set(input.request_id),
            timestamp: ActiveValue::Set(input.timestamp),
            model: ActiveValue::Set(input.model),
            is_streaming: ActiveValue::Set(input.is_streaming),
            success: ActiveValue::Set(input.success),
            duration_ms: ActiveValue::Set(input.duration_ms),
            input_tokens: ActiveValue::Set(input.input_tokens),
            cache_creation_tokens: ActiveValue::Set(input.cache_creation_tokens),
            cache_read_tokens: ActiveValue::Set(input.cache_read_tokens),
            output_tokens: ActiveValue::Set(input.output_tokens),
            error_message: ActiveValue::Set(truncate_error(input.error_message)),
        };
        entities::RequestStats::insert(active).exec(&self.db).await?;
        Ok(())
    }

    async fn cleanup_old_request_stats(&self, retention_days: u32) -> StorageResult<u64> {
        use entities::request_stats::Column;
        let cutoff = OffsetDateTime::now_utc() - time::Duration::days(retention_days as i64);
        let result = entities::RequestStats::delete_many()
            .filter(Column::Timestamp.lt(cutoff))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn get_config(&self, key: &str) -> StorageResult<Option<String>> {
        use entities::app_config::Column;
        let row = entities::AppConfig::find()
            .filter(Column::Key.eq(key))
            .one(&self.db)
            .await?;
        Ok(row.map(|m| m.value))
    }

    async fn set_config(&self, key: &str, value: &str) -> StorageResult<()> {
        use entities::app_config::Column;
        let active = entities::app_config::ActiveModel {
            key: ActiveValue::Set(key.to_string()),
            value: ActiveValue::Set(value.to_string()),
        };
        entities::AppConfig::insert(active)
            .on_conflict(
                OnConflict::column(Column::Key)
                    .update_column(Column::Value)
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn export_config_safe(&self) -> StorageResult<Vec<(String, String)>> {
        let allowlist = config_export_allowlist();
        let rows = entities::AppConfig::find().all(&self.db).await?;
        Ok(rows
            .into_iter()
            .filter(|row| allowlist.contains(&row.key.as_str()))
            .map(|row| (row.key, row.value))
            .collect())
    }
}
