pub mod bootstrap;
pub mod classify;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod state;
pub mod transport;
pub mod upstream_client;

pub use bootstrap::{bootstrap, bootstrap_from_env, Bootstrap, CliArgs};
pub use classify::{classify_request, ProxyClassified};
pub use engine::{EngineBody, EngineRequest, EngineResponse, ProxyEngine};
pub use error::ProxyError;
pub use state::AppState;
