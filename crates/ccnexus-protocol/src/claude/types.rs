use serde::{Deserialize, Serialize};

/// Anthropic model identifiers are opaque strings; an endpoint's optional
/// `model` override means the proxy never validates against a fixed list.
pub type Model = String;
pub type RequestId = String;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnthropicHeaders {
    #[serde(rename = "anthropic-version")]
    pub anthropic_version: AnthropicVersion,
    #[serde(rename = "anthropic-beta", skip_serializing_if = "Option::is_none")]
    pub anthropic_beta: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AnthropicVersion {
    #[default]
    #[serde(rename = "2023-06-01")]
    V20230601,
    #[serde(rename = "2023-01-01")]
    V20230101,
}

pub use crate::claude::create_message::stream::{
    BetaStreamContentBlock, BetaStreamContentBlockDelta, BetaStreamEvent, BetaStreamEventKnown,
    BetaStreamMessage, BetaStreamMessageDelta, BetaStreamUsage,
};
pub use crate::claude::create_message::types::BetaMessage;
pub use crate::claude::create_message::{
    CreateMessageHeaders, CreateMessageRequest, CreateMessageRequestBody, CreateMessageResponse,
};
pub use crate::claude::error::{ErrorDetail, ErrorResponse, ErrorType};
