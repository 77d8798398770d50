use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::Method;

use ccnexus_common::GlobalConfigPatch;
use ccnexus_core::classify::classify_request;
use ccnexus_core::engine::{EngineRequest, ProxyEngine};
use ccnexus_core::state::AppState;
use ccnexus_core::transport::{
    UpstreamBody, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamTransportErrorKind,
};
use ccnexus_core::upstream_client::UpstreamClient;
use ccnexus_storage::{EndpointRow, StatsBus, StatsBusConfig, SqlStorage, Storage, StorageSnapshot};

fn endpoint(name: &str, sort_order: i32) -> EndpointRow {
    let now = time::OffsetDateTime::now_utc();
    EndpointRow {
        id: sort_order as i64,
        client_type: "codex".to_string(),
        name: name.to_string(),
        api_url: format!("local://{name}"),
        api_key: "test-key".to_string(),
        enabled: true,
        transformer: "openai".to_string(),
        model: None,
        sort_order,
        tags: None,
        model_patterns: None,
        priority: None,
        cost_per_input_token: None,
        cost_per_output_token: None,
        quota_limit: None,
        quota_reset_cycle: None,
        created_at: now,
        updated_at: now,
    }
}

async fn build_state(endpoints: Vec<EndpointRow>) -> Arc<AppState> {
    let storage = Arc::new(SqlStorage::connect("sqlite::memory:").await.unwrap());
    storage.sync().await.unwrap();
    let stats = Arc::new(StatsBus::spawn(storage.clone(), StatsBusConfig::default()));
    let global = GlobalConfigPatch {
        data_dir: Some("./data".to_string()),
        db_path: Some(":memory:".to_string()),
        dsn: Some("sqlite::memory:".to_string()),
        ..Default::default()
    }
    .into_config()
    .unwrap();
    let snapshot = StorageSnapshot {
        endpoints,
        config: vec![],
    };
    let dyn_storage: Arc<dyn Storage> = storage;
    Arc::new(AppState::from_snapshot(global, snapshot, dyn_storage, stats))
}

fn chat_completion_request(model: &str) -> EngineRequest {
    let headers = http::HeaderMap::new();
    let body = Bytes::from(format!(
        r#"{{"model":"{model}","messages":[{{"role":"user","content":"hi"}}]}}"#
    ));
    let classified =
        classify_request(&Method::POST, "/v1/chat/completions", &headers, body).unwrap();
    EngineRequest {
        client_type: classified.client_type,
        proto: classified.proto,
        op: classified.op,
        request: classified.request,
        is_stream: classified.is_stream,
        model: classified.model,
        client_ip: None,
        request_id: "test-request".to_string(),
    }
}

/// Fails every call against `fail_url` and succeeds (echoing a minimal
/// OpenAI chat completion body) against everything else. Records which URLs
/// were attempted so rotation order can be asserted.
struct ScriptedUpstream {
    fail_url: String,
    calls: Mutex<Vec<String>>,
}

impl ScriptedUpstream {
    fn new(fail_url: &str) -> Self {
        Self {
            fail_url: fail_url.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

const SUCCESS_BODY: &str = r#"{"id":"chatcmpl-1","object":"chat.completion","created":0,"model":"gpt-4","choices":[{"index":0,"message":{"role":"assistant","content":"hi"},"finish_reason":"stop"}]}"#;

impl UpstreamClient for ScriptedUpstream {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>
    {
        self.calls.lock().unwrap().push(req.url.clone());
        let failing = req.url == self.fail_url;
        Box::pin(async move {
            if failing {
                Err(UpstreamFailure::Transport {
                    kind: UpstreamTransportErrorKind::Connect,
                    message: "connection refused".to_string(),
                })
            } else {
                Ok(UpstreamHttpResponse {
                    status: 200,
                    headers: vec![],
                    body: UpstreamBody::Bytes(Bytes::from_static(SUCCESS_BODY.as_bytes())),
                })
            }
        })
    }
}

#[tokio::test]
async fn succeeding_endpoint_is_used_without_retry() {
    let state = build_state(vec![endpoint("only", 0)]).await;
    let upstream = Arc::new(ScriptedUpstream::new("local://nonexistent/v1/chat/completions"));
    let engine = ProxyEngine::new(state, upstream.clone());

    let resp = engine
        .dispatch(chat_completion_request("gpt-4"))
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(upstream.calls().len(), 1);
}

#[tokio::test]
async fn failing_candidate_is_retried_then_rotated_past() {
    let state = build_state(vec![endpoint("primary", 0), endpoint("secondary", 1)]).await;
    let fail_url = "local://primary/v1/chat/completions".to_string();
    let upstream = Arc::new(ScriptedUpstream::new(&fail_url));
    let engine = ProxyEngine::new(state, upstream.clone());

    let resp = engine
        .dispatch(chat_completion_request("gpt-4"))
        .await
        .unwrap();
    assert_eq!(resp.status, 200);

    let calls = upstream.calls();
    // RETRY_BUDGET=2 attempts against `primary` before rotating to `secondary`.
    assert_eq!(calls.len(), 3);
    assert!(calls[0].starts_with("local://primary"));
    assert!(calls[1].starts_with("local://primary"));
    assert!(calls[2].starts_with("local://secondary"));
}

#[tokio::test]
async fn all_endpoints_failing_surfaces_upstream_transient_error() {
    let state = build_state(vec![endpoint("only", 0)]).await;
    let upstream = Arc::new(ScriptedUpstream::new("local://only/v1/chat/completions"));
    let engine = ProxyEngine::new(state, upstream.clone());

    let err = engine
        .dispatch(chat_completion_request("gpt-4"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ccnexus_core::dispatch::DispatchErrorKind::UpstreamTransient(_)
    ));
    assert_eq!(upstream.calls().len(), 2);
}

#[tokio::test]
async fn disabled_endpoint_is_skipped() {
    let mut disabled = endpoint("disabled", 0);
    disabled.enabled = false;
    let state = build_state(vec![disabled, endpoint("enabled", 1)]).await;
    let upstream = Arc::new(ScriptedUpstream::new("local://nonexistent/v1/chat/completions"));
    let engine = ProxyEngine::new(state, upstream.clone());

    let resp = engine
        .dispatch(chat_completion_request("gpt-4"))
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(upstream.calls(), vec!["local://enabled/v1/chat/completions"]);
}

#[tokio::test]
async fn unknown_client_type_surfaces_no_endpoint_available() {
    let state = build_state(vec![]).await;
    let upstream = Arc::new(ScriptedUpstream::new("unused"));
    let engine = ProxyEngine::new(state, upstream);

    let err = engine
        .dispatch(chat_completion_request("gpt-4"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ccnexus_core::dispatch::DispatchErrorKind::NoEndpointAvailable(
            ccnexus_core::dispatch::NoEndpointReason::NoEndpoints
        )
    ));
}
