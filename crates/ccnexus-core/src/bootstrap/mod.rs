use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use ccnexus_common::{GlobalConfig, GlobalConfigPatch};
use ccnexus_storage::{SqlStorage, StatsBus, StatsBusConfig, Storage};

use crate::state::AppState;

#[derive(Debug, Clone, Parser)]
#[command(name = "ccnexus", version, about = "Local reverse proxy fronting multiple upstream LLM APIs")]
pub struct CliArgs {
    /// Bind port.
    #[arg(long, env = "CCNEXUS_PORT")]
    pub port: Option<String>,

    /// Directory holding the sqlite database and other local state.
    #[arg(long, env = "CCNEXUS_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Explicit sqlite file path, overriding the `data_dir`-derived default.
    #[arg(long, env = "CCNEXUS_DB_PATH")]
    pub db_path: Option<String>,

    /// 0=debug..3=error.
    #[arg(long, env = "CCNEXUS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Use a separate dev data directory.
    #[arg(long, env = "CCNEXUS_DEV_MODE")]
    pub dev: Option<String>,

    /// Disable the proxy server (UI-only mode).
    #[arg(long, env = "CCNEXUS_NO_PROXY")]
    pub no_proxy: Option<String>,
}

pub struct Bootstrap {
    pub storage: Arc<SqlStorage>,
    pub state: Arc<AppState>,
}

pub async fn bootstrap_from_env() -> anyhow::Result<Bootstrap> {
    let args = CliArgs::parse();
    bootstrap(args).await
}

pub async fn bootstrap(args: CliArgs) -> anyhow::Result<Bootstrap> {
    let data_dir = sanitize_optional_env_value(args.data_dir.clone()).unwrap_or_else(default_data_dir);
    let dev_mode = parse_bool_env_value(args.dev.clone(), "CCNEXUS_DEV_MODE")?.unwrap_or(false);
    let data_dir = if dev_mode {
        format!("{}/dev", data_dir.trim_end_matches('/'))
    } else {
        data_dir
    };

    let db_path = sanitize_optional_env_value(args.db_path.clone())
        .unwrap_or_else(|| format!("{}/ccnexus.db", data_dir.trim_end_matches('/')));
    let dsn = format!("sqlite://{db_path}?mode=rwc");

    ensure_sqlite_parent_dir(&dsn)?;

    // 1) connect DB from the derived DSN.
    let storage = Arc::new(SqlStorage::connect(&dsn).await.context("connect storage")?);
    storage.sync().await.context("schema sync")?;

    // 2) merge CLI > ENV > DB-stored config for the keys the config allowlist
    // tracks (port, log_level); everything else is CLI/ENV-only or DB-only.
    let mut patch = GlobalConfigPatch {
        data_dir: Some(data_dir.clone()),
        db_path: Some(db_path),
        dev_mode: Some(dev_mode),
        dsn: Some(dsn),
        ..Default::default()
    };

    patch.port = match parse_u16_env_value(args.port.clone(), "CCNEXUS_PORT")? {
        Some(port) => Some(port),
        None => storage
            .get_config("port")
            .await
            .context("load db config port")?
            .and_then(|raw| raw.parse::<u16>().ok()),
    };
    patch.log_level = match parse_u8_env_value(args.log_level.clone(), "CCNEXUS_LOG_LEVEL")? {
        Some(level) => Some(level),
        None => storage
            .get_config("log_level")
            .await
            .context("load db config log_level")?
            .and_then(|raw| raw.parse::<u8>().ok()),
    };
    patch.no_proxy = parse_bool_env_value(args.no_proxy.clone(), "CCNEXUS_NO_PROXY")?;
    patch.forward_proxy = storage
        .get_config("forward_proxy")
        .await
        .context("load db config forward_proxy")?;

    let global: GlobalConfig = patch.into_config().context("finalize merged global config")?;

    // 3) persist the resolved, allowlisted config keys back to DB.
    storage
        .set_config("port", &global.port.to_string())
        .await
        .context("persist config port")?;
    storage
        .set_config("log_level", &global.log_level.to_string())
        .await
        .context("persist config log_level")?;

    // 4) load endpoints once (runtime reads never hit storage again).
    let snapshot = storage.load_snapshot().await.context("load snapshot")?;

    // 5) build the stats pipeline against the concrete storage type (StatsBus
    // requires a `Storage + 'static`, not a `dyn Storage`), then build the
    // shared in-memory state runtime request handling reads from.
    let stats = Arc::new(StatsBus::spawn(storage.clone(), StatsBusConfig::default()));
    let dyn_storage: Arc<dyn Storage> = storage.clone();
    let state = Arc::new(AppState::from_snapshot(global, snapshot, dyn_storage, stats));

    spawn_request_stat_cleanup(storage.clone());

    Ok(Bootstrap { storage, state })
}

/// Daily background sweep trimming `request_stats` rows past the retention
/// window, the same "background task outlives any single request" shape as
/// the dispatcher's cooldown recovery.
fn spawn_request_stat_cleanup(storage: Arc<SqlStorage>) {
    const RETENTION_DAYS: u32 = 30;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            match storage.cleanup_old_request_stats(RETENTION_DAYS).await {
                Ok(deleted) => tracing::info!(deleted, "cleaned up old request stats"),
                Err(err) => tracing::warn!(error = %err, "request stat cleanup failed"),
            }
        }
    });
}

fn sanitize_optional_env_value(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        return None;
    }
    Some(trimmed)
}

fn default_data_dir() -> String {
    if let Some(home) = sanitize_optional_env_value(std::env::var("HOME").ok()) {
        return format!("{}/.ccnexus", home.trim_end_matches('/'));
    }
    "./data".to_string()
}

fn ensure_sqlite_parent_dir(dsn: &str) -> anyhow::Result<()> {
    let Some(db_path) = sqlite_file_path_from_dsn(dsn) else {
        return Ok(());
    };
    let Some(parent) = db_path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    std::fs::create_dir_all(parent)
        .with_context(|| format!("create sqlite parent dir {}", parent.display()))?;
    Ok(())
}

fn sqlite_file_path_from_dsn(dsn: &str) -> Option<PathBuf> {
    let rest = dsn.strip_prefix("sqlite:")?;
    let path_part = rest.split(['?', '#']).next()?.trim();
    if path_part.is_empty() {
        return None;
    }

    let mut normalized = path_part;
    if let Some(stripped) = normalized.strip_prefix("//") {
        normalized = stripped;
    }

    let memory = normalized.to_ascii_lowercase();
    if memory == ":memory:" {
        return None;
    }

    Some(PathBuf::from(normalized))
}

fn parse_u16_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<u16>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u16>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_u8_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<u8>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u8>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_bool_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<bool>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => return Err(anyhow::anyhow!("invalid {env_name} value: {raw}")),
    };
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::sqlite_file_path_from_dsn;

    #[test]
    fn sqlite_dsn_resolves_relative_path() {
        let path = sqlite_file_path_from_dsn("sqlite://ccnexus.db?mode=rwc").unwrap();
        assert_eq!(path.to_string_lossy(), "ccnexus.db");
    }

    #[test]
    fn sqlite_dsn_resolves_absolute_path() {
        let path = sqlite_file_path_from_dsn("sqlite://app/data/ccnexus.db?mode=rwc").unwrap();
        assert_eq!(path.to_string_lossy(), "/app/data/ccnexus.db");
    }

    #[test]
    fn sqlite_memory_dsn_is_ignored() {
        assert!(sqlite_file_path_from_dsn("sqlite::memory:").is_none());
        assert!(sqlite_file_path_from_dsn("sqlite://:memory:").is_none());
    }
}
