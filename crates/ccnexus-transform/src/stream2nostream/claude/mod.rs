use std::collections::BTreeMap;

use ccnexus_protocol::claude::create_message::response::CreateMessageResponse;
use ccnexus_protocol::claude::create_message::stream::{
    BetaStreamContentBlock, BetaStreamContentBlockDelta, BetaStreamEvent, BetaStreamEventKnown,
    BetaStreamMessage, BetaStreamMessageDelta, BetaStreamUsage,
};
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock, BetaMessage, BetaStopReason, BetaThinkingBlock, BetaUsage, JsonObject,
};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone)]
pub struct ClaudeStreamToMessageState {
    message: Option<BetaMessage>,
    stream_blocks: BTreeMap<u32, BetaStreamContentBlock>,
    content_blocks: BTreeMap<u32, BetaContentBlock>,
    pending_json: BTreeMap<u32, String>,
}

impl ClaudeStreamToMessageState {
    pub fn new() -> Self {
        Self {
            message: None,
            stream_blocks: BTreeMap::new(),
            content_blocks: BTreeMap::new(),
            pending_json: BTreeMap::new(),
        }
    }

    pub fn push_event(&mut self, event: BetaStreamEvent) -> Option<CreateMessageResponse> {
        match event {
            BetaStreamEvent::Known(known) => self.push_known_event(known),
            BetaStreamEvent::Unknown(_) => None,
        }
    }

    pub fn finalize(&mut self) -> Option<CreateMessageResponse> {
        let mut message = self.message.take()?;
        message.content = self.ordered_content();
        Some(message)
    }

    pub fn finalize_on_eof(&mut self) -> Option<CreateMessageResponse> {
        let mut message = self.message.take()?;
        if message.stop_reason.is_none() {
            message.stop_reason = Some(BetaStopReason::EndTurn);
        }
        message.content = self.ordered_content();
        Some(message)
    }

    fn push_known_event(&mut self, event: BetaStreamEventKnown) -> Option<CreateMessageResponse> {
        match event {
            BetaStreamEventKnown::MessageStart { message } => {
                self.message = Some(map_message_start(message));
                None
            }
            BetaStreamEventKnown::ContentBlockStart { index, content_block } => {
                self.stream_blocks.insert(index, content_block);
                None
            }
            BetaStreamEventKnown::ContentBlockDelta { index, delta } => {
                self.handle_content_block_delta(index, delta);
                None
            }
            BetaStreamEventKnown::ContentBlockStop { index } => {
                self.finish_content_block(index);
                None
            }
            BetaStreamEventKnown::MessageDelta { delta, usage } => {
                self.handle_message_delta(delta, usage);
                None
            }
            BetaStreamEventKnown::MessageStop => self.finalize(),
            BetaStreamEventKnown::Ping => None,
            BetaStreamEventKnown::Error { .. } => None,
        }
    }

    fn handle_content_block_delta(&mut self, index: u32, delta: BetaStreamContentBlockDelta) {
        match delta {
            BetaStreamContentBlockDelta::TextDelta { text } => {
                if let Some(BetaStreamContentBlock::Text(block)) = self.stream_blocks.get_mut(&index)
                {
                    block.text.push_str(&text);
                }
            }
            BetaStreamContentBlockDelta::ThinkingDelta { thinking } => {
                if let Some(BetaStreamContentBlock::Thinking(block)) =
                    self.stream_blocks.get_mut(&index)
                {
                    block.thinking.push_str(&thinking);
                }
            }
            BetaStreamContentBlockDelta::SignatureDelta { signature } => {
                if let Some(BetaStreamContentBlock::Thinking(block)) =
                    self.stream_blocks.get_mut(&index)
                {
                    if let Some(existing) = &mut block.signature {
                        existing.push_str(&signature);
                    } else {
                        block.signature = Some(signature);
                    }
                }
            }
            BetaStreamContentBlockDelta::InputJsonDelta { partial_json } => {
                self.pending_json
                    .entry(index)
                    .and_modify(|value| value.push_str(&partial_json))
                    .or_insert(partial_json);
            }
        }
    }

    fn finish_content_block(&mut self, index: u32) {
        let mut block = match self.stream_blocks.remove(&index) {
            Some(block) => block,
            None => return,
        };

        if let Some(json) = self.pending_json.remove(&index)
            && let Ok(value) = serde_json::from_str::<JsonValue>(&json)
                && let Some(object) = value.as_object()
                    && let BetaStreamContentBlock::ToolUse(tool) = &mut block
                {
                    tool.input = object.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<JsonObject>();
                }

        let content = map_stream_block(block);
        self.content_blocks.insert(index, content);
    }

    fn handle_message_delta(&mut self, delta: BetaStreamMessageDelta, usage: BetaStreamUsage) {
        if let Some(message) = self.message.as_mut() {
            if delta.stop_reason.is_some() {
                message.stop_reason = delta.stop_reason;
            }
            if delta.stop_sequence.is_some() {
                message.stop_sequence = delta.stop_sequence;
            }
            message.usage = map_usage(&usage);
        }
    }

    fn ordered_content(&self) -> Vec<BetaContentBlock> {
        self.content_blocks.values().cloned().collect()
    }
}

impl Default for ClaudeStreamToMessageState {
    fn default() -> Self {
        Self::new()
    }
}

fn map_message_start(message: BetaStreamMessage) -> BetaMessage {
    BetaMessage {
        id: message.id,
        content: message.content.into_iter().map(map_stream_block).collect(),
        model: message.model,
        role: message.role,
        stop_reason: message.stop_reason,
        stop_sequence: message.stop_sequence,
        r#type: message.r#type,
        usage: map_usage(&message.usage),
    }
}

fn map_stream_block(block: BetaStreamContentBlock) -> BetaContentBlock {
    match block {
        BetaStreamContentBlock::Text(text) => BetaContentBlock::Text(text),
        BetaStreamContentBlock::Thinking(block) => BetaContentBlock::Thinking(BetaThinkingBlock {
            signature: block.signature,
            thinking: block.thinking,
            r#type: block.r#type,
        }),
        BetaStreamContentBlock::ToolUse(block) => BetaContentBlock::ToolUse(block),
    }
}

fn map_usage(usage: &BetaStreamUsage) -> BetaUsage {
    BetaUsage {
        input_tokens: usage.input_tokens.unwrap_or(0),
        output_tokens: usage.output_tokens.unwrap_or(0),
        cache_creation_input_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
        cache_read_input_tokens: usage.cache_read_input_tokens.unwrap_or(0),
    }
}
