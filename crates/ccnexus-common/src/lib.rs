use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
}

/// Final, merged global configuration used by the running process.
///
/// Merge order: CLI > ENV > DB-stored `app_config`, then persisted back to DB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub port: u16,
    pub data_dir: String,
    pub db_path: String,
    /// 0=debug..3=error.
    pub log_level: u8,
    pub dev_mode: bool,
    /// Disables the proxy server; UI-only (unused by the headless core but
    /// still threaded through bootstrap per the external contract).
    pub no_proxy: bool,
    /// Forward proxy used for upstream egress (HTTP/HTTPS/SOCKS5 URL).
    pub forward_proxy: Option<String>,
    /// Database DSN derived from `data_dir`/`db_path`.
    pub dsn: String,
}

/// Optional layer used for merging global config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfigPatch {
    pub port: Option<u16>,
    pub data_dir: Option<String>,
    pub db_path: Option<String>,
    pub log_level: Option<u8>,
    pub dev_mode: Option<bool>,
    pub no_proxy: Option<bool>,
    pub forward_proxy: Option<String>,
    pub dsn: Option<String>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.db_path.is_some() {
            self.db_path = other.db_path;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.dev_mode.is_some() {
            self.dev_mode = other.dev_mode;
        }
        if other.no_proxy.is_some() {
            self.no_proxy = other.no_proxy;
        }
        if other.forward_proxy.is_some() {
            self.forward_proxy = other.forward_proxy;
        }
        if other.dsn.is_some() {
            self.dsn = other.dsn;
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        Ok(GlobalConfig {
            port: self.port.unwrap_or(3003),
            data_dir: self
                .data_dir
                .ok_or(GlobalConfigError::MissingField("data_dir"))?,
            db_path: self
                .db_path
                .ok_or(GlobalConfigError::MissingField("db_path"))?,
            log_level: self.log_level.unwrap_or(1),
            dev_mode: self.dev_mode.unwrap_or(false),
            no_proxy: self.no_proxy.unwrap_or(false),
            forward_proxy: self.forward_proxy,
            dsn: self.dsn.ok_or(GlobalConfigError::MissingField("dsn"))?,
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(value: GlobalConfig) -> Self {
        Self {
            port: Some(value.port),
            data_dir: Some(value.data_dir),
            db_path: Some(value.db_path),
            log_level: Some(value.log_level),
            dev_mode: Some(value.dev_mode),
            no_proxy: Some(value.no_proxy),
            forward_proxy: value.forward_proxy,
            dsn: Some(value.dsn),
        }
    }
}
