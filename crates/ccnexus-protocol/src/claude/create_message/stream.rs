use serde::{Deserialize, Serialize};

use crate::claude::create_message::types::{
    BetaMessageRole, BetaMessageType, BetaStopReason, BetaTextBlock, BetaThinkingBlockType,
    BetaToolUseBlock, JsonValue,
};
use crate::claude::error::ErrorDetail;
use crate::claude::types::{Model, RequestId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BetaStreamUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaStreamMessage {
    pub id: String,
    /// Message start events include an empty content array.
    pub content: Vec<BetaStreamContentBlock>,
    pub model: Model,
    pub role: BetaMessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<BetaStopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    #[serde(rename = "type")]
    pub r#type: BetaMessageType,
    pub usage: BetaStreamUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaStreamMessageDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<BetaStopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaThinkingBlockStream {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub thinking: String,
    #[serde(rename = "type")]
    pub r#type: BetaThinkingBlockType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BetaStreamContentBlock {
    Text(BetaTextBlock),
    Thinking(BetaThinkingBlockStream),
    ToolUse(BetaToolUseBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BetaStreamContentBlockDelta {
    TextDelta {
        text: String,
    },
    /// Partial JSON string; accumulate and parse after content_block_stop.
    InputJsonDelta {
        partial_json: String,
    },
    ThinkingDelta {
        thinking: String,
    },
    SignatureDelta {
        signature: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BetaStreamEventKnown {
    MessageStart {
        message: BetaStreamMessage,
    },
    ContentBlockStart {
        index: u32,
        content_block: BetaStreamContentBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: BetaStreamContentBlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: BetaStreamMessageDelta,
        /// Token counts are cumulative for the stream so far.
        usage: BetaStreamUsage,
    },
    MessageStop,
    Ping,
    Error {
        error: ErrorDetail,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[allow(clippy::large_enum_variant)]
pub enum BetaStreamEvent {
    Known(BetaStreamEventKnown),
    Unknown(JsonValue),
}
