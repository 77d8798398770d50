use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use ccnexus_common::GlobalConfig;
use ccnexus_storage::{EndpointRow, StatsBus, Storage, StorageSnapshot};

use crate::dispatch::{EndpointState, RotationTable};

/// Endpoints partitioned by `clientType`, refreshed wholesale on any admin
/// mutation. Runtime request handling reads this and never touches storage
/// directly (teacher's "AppState/ProviderRuntime" ArcSwap split).
pub struct AppState {
    pub global: ArcSwap<GlobalConfig>,
    pub endpoints: ArcSwap<HashMap<String, Vec<EndpointRow>>>,
    pub live: Arc<Mutex<HashMap<(String, String), EndpointState>>>,
    pub rotation: RotationTable,
    pub storage: Arc<dyn Storage>,
    pub stats: Arc<StatsBus>,
}

impl AppState {
    pub fn from_snapshot(
        global: GlobalConfig,
        snapshot: StorageSnapshot,
        storage: Arc<dyn Storage>,
        stats: Arc<StatsBus>,
    ) -> Self {
        let mut by_client: HashMap<String, Vec<EndpointRow>> = HashMap::new();
        for row in snapshot.endpoints {
            by_client.entry(row.client_type.clone()).or_default().push(row);
        }
        for rows in by_client.values_mut() {
            rows.sort_by_key(|r| r.sort_order);
        }

        Self {
            global: ArcSwap::from_pointee(global),
            endpoints: ArcSwap::from_pointee(by_client),
            live: Arc::new(Mutex::new(HashMap::new())),
            rotation: RotationTable::new(),
            storage,
            stats,
        }
    }

    pub async fn refresh_endpoints(&self) -> Result<(), ccnexus_storage::StorageError> {
        let snapshot = self.storage.load_snapshot().await?;
        let mut by_client: HashMap<String, Vec<EndpointRow>> = HashMap::new();
        for row in snapshot.endpoints {
            by_client.entry(row.client_type.clone()).or_default().push(row);
        }
        for rows in by_client.values_mut() {
            rows.sort_by_key(|r| r.sort_order);
        }
        self.endpoints.store(Arc::new(by_client));
        Ok(())
    }

    pub fn endpoints_for(&self, client_type: &str) -> Vec<EndpointRow> {
        self.endpoints
            .load()
            .get(client_type)
            .cloned()
            .unwrap_or_default()
    }
}
