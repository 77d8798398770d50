use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self as tokio_time, MissedTickBehavior};

use crate::storage::{DailyStatDelta, RequestStatInput, Storage};

#[derive(Debug, Clone)]
pub struct StatsBusConfig {
    pub daily_stat_capacity: usize,
    pub request_stat_capacity: usize,
    pub request_stat_batch_size: usize,
    pub flush_interval: Duration,
    pub retry_delay: Duration,
}

impl Default for StatsBusConfig {
    fn default() -> Self {
        Self {
            daily_stat_capacity: 4096,
            request_stat_capacity: 4096,
            request_stat_batch_size: 100,
            flush_interval: Duration::from_millis(500),
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// Bounded channels decoupling request-termination from the stats writes it
/// triggers, so a slow DB never backs up the proxy hot path.
pub struct StatsBus {
    pub daily_stat_tx: mpsc::Sender<DailyStatDelta>,
    pub request_stat_tx: mpsc::Sender<RequestStatInput>,
    _handles: Vec<JoinHandle<()>>,
}

impl StatsBus {
    pub fn spawn<S: Storage + 'static>(storage: Arc<S>, config: StatsBusConfig) -> Self {
        let (daily_stat_tx, daily_stat_rx) = mpsc::channel(config.daily_stat_capacity);
        let (request_stat_tx, request_stat_rx) = mpsc::channel(config.request_stat_capacity);

        let mut handles = Vec::new();
        handles.push(tokio::spawn(daily_stat_writer(
            storage.clone(),
            daily_stat_rx,
            config.flush_interval,
            config.retry_delay,
        )));
        handles.push(tokio::spawn(request_stat_writer(
            storage,
            request_stat_rx,
            config.request_stat_batch_size,
            config.flush_interval,
            config.retry_delay,
        )));

        Self {
            daily_stat_tx,
            request_stat_tx,
            _handles: handles,
        }
    }
}

type DailyStatKey = (String, String, time::Date, String);

fn daily_stat_key(delta: &DailyStatDelta) -> DailyStatKey {
    (
        delta.client_type.clone(),
        delta.endpoint_name.clone(),
        delta.date,
        delta.device_id.clone(),
    )
}

fn merge_daily_stat(acc: &mut DailyStatDelta, delta: DailyStatDelta) {
    acc.requests += delta.requests;
    acc.errors += delta.errors;
    acc.input_tokens += delta.input_tokens;
    acc.cache_creation_tokens += delta.cache_creation_tokens;
    acc.cache_read_tokens += delta.cache_read_tokens;
    acc.output_tokens += delta.output_tokens;
}

async fn daily_stat_writer<S: Storage>(
    storage: Arc<S>,
    mut rx: mpsc::Receiver<DailyStatDelta>,
    flush_interval: Duration,
    retry_delay: Duration,
) {
    let mut pending: HashMap<DailyStatKey, DailyStatDelta> = HashMap::new();
    let mut ticker = tokio_time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(delta) = rx.recv() => {
                pending
                    .entry(daily_stat_key(&delta))
                    .and_modify(|acc| merge_daily_stat(acc, delta.clone()))
                    .or_insert(delta);
            }
            _ = ticker.tick() => {
                flush_daily_stats(&storage, &mut pending, retry_delay).await;
            }
            else => {
                flush_daily_stats(&storage, &mut pending, retry_delay).await;
                break;
            }
        }
    }
}

async fn flush_daily_stats<S: Storage>(
    storage: &Arc<S>,
    pending: &mut HashMap<DailyStatKey, DailyStatDelta>,
    retry_delay: Duration,
) {
    if pending.is_empty() {
        return;
    }
    let batch: Vec<DailyStatDelta> = pending.drain().map(|(_, v)| v).collect();
    for delta in batch {
        loop {
            match storage.record_daily_stat(delta.clone()).await {
                Ok(()) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "daily stat write failed, retrying");
                    tokio_time::sleep(retry_delay).await;
                }
            }
        }
    }
}

async fn request_stat_writer<S: Storage>(
    storage: Arc<S>,
    mut rx: mpsc::Receiver<RequestStatInput>,
    batch_size: usize,
    flush_interval: Duration,
    retry_delay: Duration,
) {
    let mut buffer = Vec::with_capacity(batch_size);
    let mut ticker = tokio_time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(input) = rx.recv() => {
                buffer.push(input);
                if buffer.len() >= batch_size {
                    flush_request_stats(&storage, &mut buffer, retry_delay).await;
                }
            }
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush_request_stats(&storage, &mut buffer, retry_delay).await;
                }
            }
            else => {
                if !buffer.is_empty() {
                    flush_request_stats(&storage, &mut buffer, retry_delay).await;
                }
                break;
            }
        }
    }
}

async fn flush_request_stats<S: Storage>(
    storage: &Arc<S>,
    buffer: &mut Vec<RequestStatInput>,
    retry_delay: Duration,
) {
    let mut batch = Vec::new();
    std::mem::swap(buffer, &mut batch);

    for input in batch {
        loop {
            match storage.record_request_stat(input.clone()).await {
                Ok(()) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "request stat write failed, retrying");
                    tokio_time::sleep(retry_delay).await;
                }
            }
        }
    }
}
