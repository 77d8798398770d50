use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;

use ccnexus_protocol::claude;
use ccnexus_protocol::gemini;
use ccnexus_protocol::openai;
use ccnexus_transform::middleware::{GenerateContentRequest, Op, Proto, Request};

use crate::error::ProxyError;

/// Result of routing + body-parsing one inbound request. `clientType` is
/// derived from the path, not re-derived later.
#[derive(Debug)]
pub struct ProxyClassified {
    pub client_type: &'static str,
    pub proto: Proto,
    pub op: Op,
    pub request: Request,
    pub is_stream: bool,
    pub model: Option<String>,
}

pub fn classify_request(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ProxyClassified, ProxyError> {
    let trimmed = path.trim_start_matches('/');
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        ["v1", "messages"] => classify_claude_messages(method, headers, body),
        ["v1", "chat", "completions"] => classify_openai_chat(method, body),
        ["v1", "responses"] => classify_openai_responses(method, body),
        ["v1beta", "models", segment] => classify_gemini_stream(method, segment, body),
        _ => Err(ProxyError::not_found("unknown path")),
    }
}

fn classify_claude_messages(
    method: &Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ProxyClassified, ProxyError> {
    ensure_method(method, Method::POST, "claude messages")?;
    let parsed = parse_json::<claude::create_message::request::CreateMessageRequestBody>(
        &body,
        "claude messages",
    )?;
    let is_stream = parsed.stream.unwrap_or(false);
    let model = Some(parsed.model.clone());
    let req_headers = parse_anthropic_headers(headers)?;
    let inner = claude::create_message::request::CreateMessageRequest {
        headers: req_headers,
        body: parsed,
    };
    Ok(ProxyClassified {
        client_type: "claude",
        proto: Proto::Claude,
        op: if is_stream {
            Op::StreamGenerateContent
        } else {
            Op::GenerateContent
        },
        request: Request::GenerateContent(GenerateContentRequest::Claude(inner)),
        is_stream,
        model,
    })
}

fn classify_openai_chat(method: &Method, body: Bytes) -> Result<ProxyClassified, ProxyError> {
    ensure_method(method, Method::POST, "openai chat completions")?;
    let parsed = parse_json::<
        openai::create_chat_completions::request::CreateChatCompletionRequestBody,
    >(&body, "openai chat")?;
    let is_stream = parsed.stream.unwrap_or(false);
    let model = Some(parsed.model.clone());
    let inner = openai::create_chat_completions::request::CreateChatCompletionRequest {
        body: parsed,
    };
    Ok(ProxyClassified {
        client_type: "codex",
        proto: Proto::OpenAIChat,
        op: if is_stream {
            Op::StreamGenerateContent
        } else {
            Op::GenerateContent
        },
        request: Request::GenerateContent(GenerateContentRequest::OpenAIChat(inner)),
        is_stream,
        model,
    })
}

fn classify_openai_responses(method: &Method, body: Bytes) -> Result<ProxyClassified, ProxyError> {
    ensure_method(method, Method::POST, "openai responses")?;
    let parsed = parse_json::<openai::create_response::request::CreateResponseRequestBody>(
        &body,
        "openai responses",
    )?;
    let is_stream = parsed.stream.unwrap_or(false);
    let model = Some(parsed.model.clone());
    let inner = openai::create_response::request::CreateResponseRequest { body: parsed };
    Ok(ProxyClassified {
        client_type: "codex",
        proto: Proto::OpenAIResponse,
        op: if is_stream {
            Op::StreamGenerateContent
        } else {
            Op::GenerateContent
        },
        request: Request::GenerateContent(GenerateContentRequest::OpenAIResponse(inner)),
        is_stream,
        model,
    })
}

/// `/v1beta/models/{model}:streamGenerateContent` is the only Gemini client
/// route in scope; the colon-suffixed action is mandatory.
fn classify_gemini_stream(
    method: &Method,
    segment: &str,
    body: Bytes,
) -> Result<ProxyClassified, ProxyError> {
    ensure_method(method, Method::POST, "gemini stream generate")?;
    let (model, action) = split_model_action(segment);
    if action != Some("streamGenerateContent") {
        return Err(ProxyError::not_found("unknown gemini action"));
    }
    let parsed = parse_json::<gemini::generate_content::request::GenerateContentRequestBody>(
        &body,
        "gemini stream generate",
    )?;
    let path = gemini::generate_content::request::GenerateContentPath {
        model: model.to_string(),
    };
    let inner = gemini::stream_content::request::StreamGenerateContentRequest {
        path,
        body: parsed,
    };
    Ok(ProxyClassified {
        client_type: "gemini",
        proto: Proto::Gemini,
        op: Op::StreamGenerateContent,
        request: Request::GenerateContent(GenerateContentRequest::GeminiStream(inner)),
        is_stream: true,
        model: Some(model.to_string()),
    })
}

fn split_model_action(segment: &str) -> (&str, Option<&str>) {
    match segment.split_once(':') {
        Some((model, action)) => (model, Some(action)),
        None => (segment, None),
    }
}

fn parse_json<T>(body: &[u8], label: &str) -> Result<T, ProxyError>
where
    T: DeserializeOwned,
{
    if body.is_empty() {
        return Err(ProxyError::bad_request(format!("missing body for {label}")));
    }
    serde_json::from_slice(body).map_err(|err| ProxyError::bad_request(format!("invalid json: {err}")))
}

fn ensure_method(method: &Method, expected: Method, label: &str) -> Result<(), ProxyError> {
    if *method == expected {
        Ok(())
    } else {
        Err(ProxyError::method_not_allowed(format!(
            "invalid method for {label}",
        )))
    }
}

fn parse_anthropic_headers(
    headers: &HeaderMap,
) -> Result<claude::types::AnthropicHeaders, ProxyError> {
    let mut output = claude::types::AnthropicHeaders::default();
    if let Some(value) = header_value(headers, "anthropic-version") {
        output.anthropic_version = parse_anthropic_version(&value)?;
    }
    if let Some(value) = header_value(headers, "anthropic-beta") {
        output.anthropic_beta = Some(value);
    }
    Ok(output)
}

fn parse_anthropic_version(value: &str) -> Result<claude::types::AnthropicVersion, ProxyError> {
    let json = serde_json::to_string(value)
        .map_err(|err| ProxyError::bad_request(format!("invalid anthropic version: {err}")))?;
    serde_json::from_str(&json)
        .map_err(|err| ProxyError::bad_request(format!("invalid anthropic version: {err}")))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_claude_messages_to_claude_client_type() {
        let headers = HeaderMap::new();
        let body = Bytes::from(
            r#"{"model":"claude-3-5-sonnet-20241022","max_tokens":16,"messages":[{"role":"user","content":"hi"}]}"#,
        );
        let classified = classify_request(&Method::POST, "/v1/messages", &headers, body).unwrap();
        assert_eq!(classified.client_type, "claude");
        assert!(!classified.is_stream);
    }

    #[test]
    fn routes_openai_chat_to_codex_client_type() {
        let headers = HeaderMap::new();
        let body = Bytes::from(r#"{"model":"gpt-4","messages":[],"stream":true}"#);
        let classified =
            classify_request(&Method::POST, "/v1/chat/completions", &headers, body).unwrap();
        assert_eq!(classified.client_type, "codex");
        assert!(classified.is_stream);
    }

    #[test]
    fn rejects_gemini_non_stream_action() {
        let headers = HeaderMap::new();
        let body = Bytes::from(r#"{"contents":[]}"#);
        let err = classify_request(
            &Method::POST,
            "/v1beta/models/gemini-1.5-flash:generateContent",
            &headers,
            body,
        )
        .unwrap_err();
        assert_eq!(err.status, http::StatusCode::NOT_FOUND);
    }
}
