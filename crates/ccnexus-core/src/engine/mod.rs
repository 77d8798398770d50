pub mod dialect;
pub mod wire;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::Instant;

use ccnexus_storage::{DailyStatDelta, EndpointRow, RequestStatInput, StatsBus};
use ccnexus_transform::middleware::{
    self, estimate_tokens, output_for_counting, usage_from_response, GenerateContentRequest,
    GenerateContentResponse, Op, Proto, Request, Response, StreamEvent, StreamTransformer,
    TransformContext, UsageAccumulator, UsageSummary,
};

use crate::dispatch::{
    ActiveRequestGuard, DispatchErrorKind, NoEndpointReason, RETRY_BACKOFF, RETRY_BUDGET,
};
use crate::state::AppState;
use crate::transport::{HttpMethod, UpstreamBody, UpstreamFailure, UpstreamHttpRequest};
use crate::upstream_client::UpstreamClient;
use dialect::{append_gemini_key, transformer_to_proto, upstream_headers, upstream_url};
use wire::{content_type_for_stream, encode_openai_chat_done, encode_stream_event, StreamDecoder};

/// What `/v1/messages`, `/v1/chat/completions`, `/v1/responses` and
/// `/v1beta/models/{model}:streamGenerateContent` hand the dispatcher after
/// body-parsing (`classify::classify_request`).
pub struct EngineRequest {
    pub client_type: &'static str,
    pub proto: Proto,
    pub op: Op,
    pub request: Request,
    pub is_stream: bool,
    pub model: Option<String>,
    pub client_ip: Option<String>,
    pub request_id: String,
}

pub enum EngineBody {
    Bytes(Bytes),
    Stream(mpsc::Receiver<Bytes>),
}

pub struct EngineResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: EngineBody,
}

/// Metadata needed to write `RequestStat`/`DailyStat` rows once a request
/// terminates, cloned into the streaming task since that side finishes long
/// after `dispatch` has already returned headers to the caller.
#[derive(Clone)]
struct StatContext {
    endpoint_name: String,
    client_type: String,
    client_ip: Option<String>,
    request_id: String,
    model: Option<String>,
    is_stream: bool,
    stats: Arc<StatsBus>,
    started: Instant,
}

/// Ties endpoint selection (`dispatch`), protocol translation
/// (`ccnexus_transform`), upstream transport (`upstream_client`) and stats
/// recording (`ccnexus_storage`) into the single request-dispatch operation.
pub struct ProxyEngine<U> {
    state: Arc<AppState>,
    upstream: Arc<U>,
}

impl<U: UpstreamClient> ProxyEngine<U> {
    pub fn new(state: Arc<AppState>, upstream: Arc<U>) -> Self {
        Self { state, upstream }
    }

    pub async fn dispatch(&self, req: EngineRequest) -> Result<EngineResponse, DispatchErrorKind> {
        let candidates = self.state.endpoints_for(req.client_type);
        if candidates.is_empty() {
            return Err(DispatchErrorKind::NoEndpointAvailable(
                NoEndpointReason::NoEndpoints,
            ));
        }

        let start = self.state.rotation.current(req.client_type).await;
        let n = candidates.len();
        let mut saw_enabled = false;
        let mut saw_cooldown = false;
        let mut last_err: Option<DispatchErrorKind> = None;

        for offset in 0..n {
            let endpoint = &candidates[(start + offset) % n];
            if !endpoint.enabled {
                continue;
            }
            saw_enabled = true;

            let selectable = {
                let mut live = self.state.live.lock().await;
                let state = live
                    .entry((req.client_type.to_string(), endpoint.name.clone()))
                    .or_insert_with(crate::dispatch::EndpointState::new);
                state.refresh(Instant::now());
                state.is_selectable(Instant::now())
            };
            if !selectable {
                saw_cooldown = true;
                continue;
            }

            self.state.rotation.advance(req.client_type, n).await;
            match self.try_endpoint(endpoint, &req).await {
                Ok(resp) => return Ok(resp),
                Err(err) => last_err = Some(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            DispatchErrorKind::NoEndpointAvailable(if !saw_enabled {
                NoEndpointReason::AllDisabled
            } else if saw_cooldown {
                NoEndpointReason::AllInCooldown
            } else {
                NoEndpointReason::NoEndpoints
            })
        }))
    }

    async fn touch_endpoint<F: FnOnce(&mut crate::dispatch::EndpointState)>(
        &self,
        client_type: &str,
        endpoint_name: &str,
        f: F,
    ) {
        let mut live = self.state.live.lock().await;
        let state = live
            .entry((client_type.to_string(), endpoint_name.to_string()))
            .or_insert_with(crate::dispatch::EndpointState::new);
        f(state);
    }

    /// Up to `RETRY_BUDGET` attempts against one candidate, with exponential
    /// backoff between attempts. Cooldown bookkeeping is applied per attempt
    /// so a trip mid-budget still counts.
    async fn try_endpoint(
        &self,
        endpoint: &EndpointRow,
        req: &EngineRequest,
    ) -> Result<EngineResponse, DispatchErrorKind> {
        let guard =
            ActiveRequestGuard::acquire(self.state.live.clone(), req.client_type, &endpoint.name)
                .await;
        let started = Instant::now();

        let mut attempt = 0u32;
        let (outcome, usage) = loop {
            let result = self.attempt_once(endpoint, req).await;
            match result {
                Ok((resp, usage)) => break (Ok(resp), usage),
                Err(err) => {
                    if err.counts_as_endpoint_failure() {
                        self.touch_endpoint(req.client_type, &endpoint.name, |s| {
                            s.on_failure(Instant::now())
                        })
                        .await;
                    }
                    if err.retries_same_endpoint() && attempt + 1 < RETRY_BUDGET {
                        if let Some(delay) = RETRY_BACKOFF.get(attempt as usize) {
                            tokio::time::sleep(*delay).await;
                        }
                        attempt += 1;
                        continue;
                    }
                    break (Err(err), UsageSummary::default());
                }
            }
        };
        drop(guard);

        if outcome.is_ok() {
            self.touch_endpoint(req.client_type, &endpoint.name, |s| {
                s.on_success(Instant::now())
            })
            .await;
        }

        let stat_ctx = StatContext {
            endpoint_name: endpoint.name.clone(),
            client_type: req.client_type.to_string(),
            client_ip: req.client_ip.clone(),
            request_id: req.request_id.clone(),
            model: req.model.clone(),
            is_stream: req.is_stream,
            stats: self.state.stats.clone(),
            started,
        };

        match outcome {
            Ok(EngineResponse {
                status,
                content_type,
                body: EngineBody::Stream(rx),
            }) if req.is_stream => {
                // Usage is only known once the stream drains; the spawned
                // decode task (see `stream_translated`) records stats itself.
                Ok(EngineResponse {
                    status,
                    content_type,
                    body: EngineBody::Stream(rx),
                })
            }
            Ok(resp) => {
                record_stats(stat_ctx, true, usage, None).await;
                Ok(resp)
            }
            Err(err) => {
                record_stats(stat_ctx, false, usage, Some(format!("{err:?}"))).await;
                Err(err)
            }
        }
    }

    async fn attempt_once(
        &self,
        endpoint: &EndpointRow,
        req: &EngineRequest,
    ) -> Result<(EngineResponse, UsageSummary), DispatchErrorKind> {
        let dst_proto = transformer_to_proto(&endpoint.transformer).ok_or_else(|| {
            DispatchErrorKind::TranslatorError(format!(
                "unknown transformer tag {}",
                endpoint.transformer
            ))
        })?;

        let ctx = TransformContext {
            src: req.proto,
            dst: dst_proto,
            src_op: req.op,
            dst_op: req.op,
        };

        let translated = middleware::transform_request(&ctx, req.request.clone())
            .map_err(|err| DispatchErrorKind::TranslatorError(format!("{err:?}")))?;

        let model = endpoint.model.clone().or_else(|| req.model.clone());
        // Gemini carries its model in the URL path, not the JSON body.
        let body_model_override = if dst_proto == Proto::Gemini {
            None
        } else {
            model.as_deref()
        };
        let body_bytes = serialize_request(&translated, body_model_override)
            .map_err(DispatchErrorKind::TranslatorError)?;

        let mut url = upstream_url(
            &endpoint.transformer,
            &endpoint.api_url,
            model.as_deref(),
            req.is_stream,
        );
        if endpoint.transformer == "gemini" {
            url = append_gemini_key(&url, &endpoint.api_key);
        }
        let headers = upstream_headers(&endpoint.transformer, &endpoint.api_key);

        let upstream_req = UpstreamHttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(Bytes::from(body_bytes)),
            is_stream: req.is_stream,
        };

        let upstream_resp = self
            .upstream
            .send(upstream_req)
            .await
            .map_err(transport_to_dispatch_error)?;

        if !(200..300).contains(&upstream_resp.status) {
            let retry_after = retry_after_from_headers(&upstream_resp.headers);
            let body = match upstream_resp.body {
                UpstreamBody::Bytes(b) => b,
                UpstreamBody::Stream(mut rx) => rx.recv().await.unwrap_or_default(),
            };
            return Err(status_to_dispatch_error(
                upstream_resp.status,
                body,
                retry_after,
            ));
        }

        let reverse_ctx = TransformContext {
            src: dst_proto,
            dst: req.proto,
            src_op: req.op,
            dst_op: req.op,
        };

        if req.is_stream {
            let stat_ctx = StatContext {
                endpoint_name: endpoint.name.clone(),
                client_type: req.client_type.to_string(),
                client_ip: req.client_ip.clone(),
                request_id: req.request_id.clone(),
                model: req.model.clone(),
                is_stream: true,
                stats: self.state.stats.clone(),
                started: Instant::now(),
            };
            let resp = self.stream_translated(dst_proto, req.proto, reverse_ctx, upstream_resp.body, stat_ctx);
            Ok((resp, UsageSummary::default()))
        } else {
            self.nonstream_translated(dst_proto, reverse_ctx, upstream_resp.body)
                .await
        }
    }

    async fn nonstream_translated(
        &self,
        upstream_proto: Proto,
        reverse_ctx: TransformContext,
        body: UpstreamBody,
    ) -> Result<(EngineResponse, UsageSummary), DispatchErrorKind> {
        let bytes = match body {
            UpstreamBody::Bytes(b) => b,
            UpstreamBody::Stream(mut rx) => {
                let mut buf = Vec::new();
                while let Some(chunk) = rx.recv().await {
                    buf.extend_from_slice(&chunk);
                }
                Bytes::from(buf)
            }
        };

        let parsed =
            parse_response(upstream_proto, &bytes).map_err(DispatchErrorKind::TranslatorError)?;

        let usage = usage_from_response(upstream_proto, &parsed).unwrap_or_else(|| UsageSummary {
            output_tokens: Some(estimate_tokens(&output_for_counting(upstream_proto, &parsed))),
            ..Default::default()
        });

        let translated = middleware::transform_response(&reverse_ctx, Response::GenerateContent(parsed))
            .map_err(|err| DispatchErrorKind::TranslatorError(format!("{err:?}")))?;

        let Response::GenerateContent(resp) = translated;
        let out_bytes = serialize_response(&resp).map_err(DispatchErrorKind::TranslatorError)?;

        Ok((
            EngineResponse {
                status: 200,
                content_type: "application/json",
                body: EngineBody::Bytes(Bytes::from(out_bytes)),
            },
            usage,
        ))
    }

    fn stream_translated(
        &self,
        upstream_proto: Proto,
        client_proto: Proto,
        reverse_ctx: TransformContext,
        body: UpstreamBody,
        stat_ctx: StatContext,
    ) -> EngineResponse {
        let (tx, out_rx) = mpsc::channel::<Bytes>(32);
        tokio::spawn(async move {
            let mut decoder =
                StreamDecoder::new(upstream_proto, middleware::stream_format(upstream_proto));
            let mut transformer = match StreamTransformer::new(&reverse_ctx) {
                Ok(t) => t,
                Err(_) => return,
            };
            let mut usage = UsageAccumulator::new(client_proto);
            let mut success = true;

            match body {
                UpstreamBody::Bytes(bytes) => {
                    for event in decoder.push_bytes(&bytes) {
                        if forward_event(&mut transformer, &mut usage, &tx, client_proto, event)
                            .await
                            .is_err()
                        {
                            success = false;
                            break;
                        }
                    }
                }
                UpstreamBody::Stream(mut rx) => {
                    while success {
                        let Some(chunk) = rx.recv().await else {
                            break;
                        };
                        for event in decoder.push_bytes(&chunk) {
                            if forward_event(&mut transformer, &mut usage, &tx, client_proto, event)
                                .await
                                .is_err()
                            {
                                success = false;
                                break;
                            }
                        }
                    }
                }
            }

            finish_stream(
                success,
                decoder,
                transformer,
                usage,
                tx,
                client_proto,
                stat_ctx,
            )
            .await;
        });

        EngineResponse {
            status: 200,
            content_type: content_type_for_stream(client_proto),
            body: EngineBody::Stream(out_rx),
        }
    }
}

async fn finish_stream(
    mut success: bool,
    mut decoder: StreamDecoder,
    mut transformer: StreamTransformer,
    mut usage: UsageAccumulator,
    tx: mpsc::Sender<Bytes>,
    client_proto: Proto,
    stat_ctx: StatContext,
) {
    for event in decoder.finish() {
        if forward_event(&mut transformer, &mut usage, &tx, client_proto, event)
            .await
            .is_err()
        {
            success = false;
            break;
        }
    }
    if client_proto == Proto::OpenAIChat {
        let _ = tx.send(encode_openai_chat_done()).await;
    }
    let final_usage = usage.finalize().unwrap_or_default();
    record_stats(stat_ctx, success, final_usage, None).await;
}

async fn forward_event(
    transformer: &mut StreamTransformer,
    usage: &mut UsageAccumulator,
    tx: &mpsc::Sender<Bytes>,
    client_proto: Proto,
    event: StreamEvent,
) -> Result<(), ()> {
    let translated = transformer.push(event).map_err(|_| ())?;
    for out_event in translated {
        usage.push(&out_event);
        if let Some(bytes) = encode_stream_event(client_proto, &out_event)
            && tx.send(bytes).await.is_err()
        {
            return Err(());
        }
    }
    Ok(())
}

async fn record_stats(
    ctx: StatContext,
    success: bool,
    usage: UsageSummary,
    error_message: Option<String>,
) {
    let now = OffsetDateTime::now_utc();
    let duration_ms = ctx.started.elapsed().as_millis() as i64;

    let request_stat = RequestStatInput {
        endpoint_name: ctx.endpoint_name.clone(),
        client_type: ctx.client_type.clone(),
        client_ip: ctx.client_ip,
        request_id: ctx.request_id,
        timestamp: now,
        model: ctx.model,
        is_streaming: ctx.is_stream,
        success,
        duration_ms,
        input_tokens: usage.input_tokens.unwrap_or(0) as i64,
        cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0) as i64,
        cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0) as i64,
        output_tokens: usage.output_tokens.unwrap_or(0) as i64,
        error_message: error_message.map(|m| truncate(&m, 500)),
    };
    let _ = ctx.stats.request_stat_tx.send(request_stat).await;

    let daily = DailyStatDelta {
        client_type: ctx.client_type,
        endpoint_name: ctx.endpoint_name,
        date: now.date(),
        device_id: "local".to_string(),
        requests: 1,
        errors: if success { 0 } else { 1 },
        input_tokens: usage.input_tokens.unwrap_or(0) as i64,
        cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0) as i64,
        cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0) as i64,
        output_tokens: usage.output_tokens.unwrap_or(0) as i64,
    };
    let _ = ctx.stats.daily_stat_tx.send(daily).await;
}

/// Upstream wire bodies carry only the request's `body` field; `headers`
/// and `path` are HTTP-level, not part of the JSON payload.
fn serialize_request(req: &Request, model_override: Option<&str>) -> Result<Vec<u8>, String> {
    let Request::GenerateContent(inner) = req;
    let mut value = match inner {
        GenerateContentRequest::Claude(r) => serde_json::to_value(&r.body),
        GenerateContentRequest::OpenAIChat(r) => serde_json::to_value(&r.body),
        GenerateContentRequest::OpenAIResponse(r) => serde_json::to_value(&r.body),
        GenerateContentRequest::Gemini(r) => serde_json::to_value(&r.body),
        GenerateContentRequest::GeminiStream(r) => serde_json::to_value(&r.body),
    }
    .map_err(|err| format!("serialize request: {err}"))?;

    if let Some(model) = model_override
        && let Some(obj) = value.as_object_mut()
    {
        obj.insert(
            "model".to_string(),
            serde_json::Value::String(model.to_string()),
        );
    }

    serde_json::to_vec(&value).map_err(|err| format!("serialize request: {err}"))
}

fn parse_response(proto: Proto, bytes: &[u8]) -> Result<GenerateContentResponse, String> {
    match proto {
        Proto::Claude => serde_json::from_slice(bytes)
            .map(GenerateContentResponse::Claude)
            .map_err(|err| format!("parse claude response: {err}")),
        Proto::OpenAIChat => serde_json::from_slice(bytes)
            .map(GenerateContentResponse::OpenAIChat)
            .map_err(|err| format!("parse openai chat response: {err}")),
        Proto::OpenAIResponse => serde_json::from_slice(bytes)
            .map(GenerateContentResponse::OpenAIResponse)
            .map_err(|err| format!("parse openai response response: {err}")),
        Proto::Gemini => serde_json::from_slice(bytes)
            .map(GenerateContentResponse::Gemini)
            .map_err(|err| format!("parse gemini response: {err}")),
    }
}

fn serialize_response(resp: &GenerateContentResponse) -> Result<Vec<u8>, String> {
    let result = match resp {
        GenerateContentResponse::Claude(r) => serde_json::to_vec(r),
        GenerateContentResponse::OpenAIChat(r) => serde_json::to_vec(r),
        GenerateContentResponse::OpenAIResponse(r) => serde_json::to_vec(r),
        GenerateContentResponse::Gemini(r) => serde_json::to_vec(r),
    };
    result.map_err(|err| format!("serialize response: {err}"))
}

fn transport_to_dispatch_error(err: UpstreamFailure) -> DispatchErrorKind {
    let UpstreamFailure::Transport { message, .. } = err;
    DispatchErrorKind::UpstreamTransient(message)
}

const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Parses the upstream `Retry-After` header (seconds form, as sent by every
/// LLM provider we front) and caps it so a misbehaving upstream can't stall
/// a client indefinitely.
fn retry_after_from_headers(headers: &crate::transport::Headers) -> Option<Duration> {
    let raw = crate::transport::header_get(headers, "retry-after")?;
    let secs: u64 = raw.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

fn status_to_dispatch_error(status: u16, body: Bytes, retry_after: Option<Duration>) -> DispatchErrorKind {
    let message = String::from_utf8_lossy(&body).to_string();
    match status {
        429 => DispatchErrorKind::UpstreamRateLimited { retry_after },
        500..=599 => DispatchErrorKind::UpstreamTransient(message),
        _ => DispatchErrorKind::UpstreamPermanent(status, message),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_header_is_parsed() {
        let headers = vec![("Retry-After".to_string(), "5".to_string())];
        assert_eq!(retry_after_from_headers(&headers), Some(Duration::from_secs(5)));
    }

    #[test]
    fn retry_after_header_is_capped_at_30s() {
        let headers = vec![("retry-after".to_string(), "120".to_string())];
        assert_eq!(retry_after_from_headers(&headers), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn missing_retry_after_header_yields_none() {
        assert_eq!(retry_after_from_headers(&[]), None);
    }

    #[test]
    fn non_numeric_retry_after_header_yields_none() {
        let headers = vec![("Retry-After".to_string(), "Wed, 21 Oct 2026 07:28:00 GMT".to_string())];
        assert_eq!(retry_after_from_headers(&headers), None);
    }

    #[test]
    fn status_429_carries_parsed_retry_after() {
        let err = status_to_dispatch_error(429, Bytes::new(), Some(Duration::from_secs(3)));
        assert!(matches!(
            err,
            DispatchErrorKind::UpstreamRateLimited {
                retry_after: Some(d)
            } if d == Duration::from_secs(3)
        ));
    }
}
