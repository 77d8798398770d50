use ccnexus_transform::middleware::Proto;

use crate::transport::Headers;

/// Maps an `Endpoint.transformer` tag onto the upstream wire dialect
/// understood by the transformer registry. `deepseek` is an
/// OpenAI-Chat-compatible dialect, so it shares the Chat converter pair.
pub fn transformer_to_proto(transformer: &str) -> Option<Proto> {
    match transformer {
        "claude" => Some(Proto::Claude),
        "openai" | "deepseek" => Some(Proto::OpenAIChat),
        "openai2" => Some(Proto::OpenAIResponse),
        "gemini" => Some(Proto::Gemini),
        _ => None,
    }
}

pub fn upstream_url(transformer: &str, base: &str, model: Option<&str>, want_stream: bool) -> String {
    let base = base.trim_end_matches('/');
    match transformer {
        "claude" => format!("{base}/v1/messages"),
        "openai" | "deepseek" => format!("{base}/v1/chat/completions"),
        "openai2" => format!("{base}/v1/responses"),
        "gemini" => {
            let model = model.unwrap_or("gemini-1.5-flash");
            let action = if want_stream {
                "streamGenerateContent"
            } else {
                "generateContent"
            };
            format!("{base}/v1beta/models/{model}:{action}")
        }
        _ => base.to_string(),
    }
}

pub fn upstream_headers(transformer: &str, api_key: &str) -> Headers {
    match transformer {
        "claude" => vec![
            ("x-api-key".to_string(), api_key.to_string()),
            ("anthropic-version".to_string(), "2023-06-01".to_string()),
            ("content-type".to_string(), "application/json".to_string()),
        ],
        "gemini" => vec![("content-type".to_string(), "application/json".to_string())],
        _ => vec![
            ("authorization".to_string(), format!("Bearer {api_key}")),
            ("content-type".to_string(), "application/json".to_string()),
        ],
    }
}

/// Gemini authenticates via `?key=` query parameter rather than a header.
pub fn append_gemini_key(url: &str, api_key: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}key={api_key}")
}
