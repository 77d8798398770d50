use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use ccnexus_core::classify::classify_request;
use ccnexus_core::dispatch::DispatchErrorKind;
use ccnexus_core::engine::{EngineBody, EngineRequest, EngineResponse, ProxyEngine};
use ccnexus_core::error::ProxyError;
use ccnexus_core::upstream_client::UpstreamClient;

const SSE_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const SSE_HEARTBEAT_FRAME: &[u8] = b": keep-alive\n\n";

#[derive(Clone)]
pub struct ProxyState<U> {
    pub engine: Arc<ProxyEngine<U>>,
}

/// Builds the five routes this proxy serves: the three client-protocol
/// generate routes, the Gemini streaming route, and `/health`. No auth layer
/// (trust-on-loopback).
pub fn proxy_router<U: UpstreamClient + 'static>(engine: Arc<ProxyEngine<U>>) -> Router {
    let state = ProxyState { engine };

    Router::new()
        .route("/v1/messages", post(handle::<U>))
        .route("/v1/chat/completions", post(handle::<U>))
        .route("/v1/responses", post(handle::<U>))
        .route("/v1beta/models/{*model}", post(handle::<U>))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn handle<U: UpstreamClient + 'static>(
    State(state): State<ProxyState<U>>,
    connect_info: Option<ConnectInfo<std::net::SocketAddr>>,
    method: Method,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = uuid::Uuid::now_v7().to_string();
    let client_ip = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());

    let classified = match classify_request(&method, uri.path(), &headers, body) {
        Ok(c) => c,
        Err(err) => return proxy_error_response(err),
    };

    let engine_req = EngineRequest {
        client_type: classified.client_type,
        proto: classified.proto,
        op: classified.op,
        request: classified.request,
        is_stream: classified.is_stream,
        model: classified.model,
        client_ip,
        request_id,
    };

    match state.engine.dispatch(engine_req).await {
        Ok(resp) => engine_response_to_axum(resp),
        Err(err) => dispatch_error_response(err),
    }
}

fn proxy_error_response(err: ProxyError) -> Response {
    Response::builder()
        .status(err.status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(err.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn dispatch_error_response(err: DispatchErrorKind) -> Response {
    let mut retry_after = None;
    let (status, message) = match err {
        DispatchErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        DispatchErrorKind::UpstreamTransient(msg) => (StatusCode::BAD_GATEWAY, msg),
        DispatchErrorKind::UpstreamPermanent(status, msg) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            msg,
        ),
        DispatchErrorKind::UpstreamRateLimited { retry_after: ra } => {
            retry_after = ra;
            (StatusCode::TOO_MANY_REQUESTS, "upstream rate limited".to_string())
        }
        DispatchErrorKind::TranslatorError(msg) => (StatusCode::BAD_GATEWAY, msg),
        DispatchErrorKind::NoEndpointAvailable(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            reason.code().to_string(),
        ),
        DispatchErrorKind::ClientDisconnect => {
            (StatusCode::BAD_GATEWAY, "client disconnected".to_string())
        }
    };
    let body = serde_json::json!({ "error": message }).to_string();
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(retry_after) = retry_after
        && let Some(headers) = builder.headers_mut()
    {
        headers.insert(
            header::RETRY_AFTER,
            HeaderValue::from_str(&retry_after.as_secs().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("30")),
        );
    }
    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn engine_response_to_axum(resp: EngineResponse) -> Response {
    let is_stream = matches!(resp.body, EngineBody::Stream(_));
    let mut builder = Response::builder()
        .status(resp.status)
        .header(header::CONTENT_TYPE, resp.content_type);
    if is_stream && let Some(headers) = builder.headers_mut() {
        headers
            .entry(header::CACHE_CONTROL)
            .or_insert(HeaderValue::from_static("no-cache"));
        headers
            .entry(HeaderName::from_static("x-accel-buffering"))
            .or_insert(HeaderValue::from_static("no"));
    }

    let body = match resp.body {
        EngineBody::Bytes(b) => Body::from(b),
        EngineBody::Stream(rx) => {
            let rx = wrap_sse_stream_with_heartbeat(rx);
            let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
            Body::from_stream(stream)
        }
    };

    builder
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Keeps intermediate proxies/load balancers from timing out an idle SSE
/// stream between upstream chunks.
fn wrap_sse_stream_with_heartbeat(
    mut upstream_rx: tokio::sync::mpsc::Receiver<Bytes>,
) -> tokio::sync::mpsc::Receiver<Bytes> {
    let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(32);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SSE_HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                maybe_chunk = upstream_rx.recv() => {
                    let Some(chunk) = maybe_chunk else {
                        break;
                    };
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if tx.send(Bytes::from_static(SSE_HEARTBEAT_FRAME)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnexus_core::dispatch::NoEndpointReason;

    async fn status_of(err: DispatchErrorKind) -> StatusCode {
        dispatch_error_response(err).status()
    }

    #[tokio::test]
    async fn bad_request_maps_to_400() {
        assert_eq!(
            status_of(DispatchErrorKind::BadRequest("bad".to_string())).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn upstream_transient_maps_to_502() {
        assert_eq!(
            status_of(DispatchErrorKind::UpstreamTransient("timeout".to_string())).await,
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn upstream_permanent_preserves_status() {
        assert_eq!(
            status_of(DispatchErrorKind::UpstreamPermanent(404, "missing".to_string())).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn rate_limited_maps_to_429() {
        assert_eq!(
            status_of(DispatchErrorKind::UpstreamRateLimited { retry_after: None }).await,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after_header() {
        let resp = dispatch_error_response(DispatchErrorKind::UpstreamRateLimited {
            retry_after: Some(Duration::from_secs(7)),
        });
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            resp.headers().get(header::RETRY_AFTER).unwrap(),
            "7"
        );
    }

    #[tokio::test]
    async fn translator_error_maps_to_502() {
        assert_eq!(
            status_of(DispatchErrorKind::TranslatorError("bad translation".to_string())).await,
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn no_endpoint_available_maps_to_503() {
        assert_eq!(
            status_of(DispatchErrorKind::NoEndpointAvailable(
                NoEndpointReason::AllInCooldown
            ))
            .await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn health_route_returns_ok_body() {
        assert_eq!(health().await, "ok");
    }
}
