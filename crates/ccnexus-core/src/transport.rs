use bytes::Bytes;
use tokio::sync::mpsc;

/// Ordered header list rather than a map: upstream dialects care about casing
/// and duplicate headers (e.g. multiple `Set-Cookie`) more than lookup speed.
pub type Headers = Vec<(String, String)>;

pub fn header_get<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub fn header_set(headers: &mut Headers, name: &str, value: String) {
    if let Some(entry) = headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        entry.1 = value;
    } else {
        headers.push((name.to_string(), value));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(mpsc::Receiver<Bytes>),
}

pub struct UpstreamHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub is_stream: bool,
}

pub struct UpstreamHttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: UpstreamBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamTransportErrorKind {
    Connect,
    Dns,
    Tls,
    Timeout,
    ReadTimeout,
    Other,
}

#[derive(Debug, Clone)]
pub enum UpstreamFailure {
    Transport {
        kind: UpstreamTransportErrorKind,
        message: String,
    },
}

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamFailure::Transport { kind, message } => {
                write!(f, "upstream transport error ({kind:?}): {message}")
            }
        }
    }
}

impl std::error::Error for UpstreamFailure {}
