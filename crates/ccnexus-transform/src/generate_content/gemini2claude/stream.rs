use std::collections::BTreeMap;

use ccnexus_protocol::claude::create_message::stream::{
    BetaStreamContentBlock, BetaStreamContentBlockDelta, BetaStreamEvent, BetaStreamEventKnown,
    BetaStreamMessage, BetaStreamUsage, BetaThinkingBlockStream,
};
use ccnexus_protocol::claude::create_message::types::{BetaStopReason, JsonObject, JsonValue};
use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::{Candidate, FinishReason, UsageMetadata};
use ccnexus_protocol::gemini::types::{Content as GeminiContent, FunctionCall as GeminiFunctionCall, Part as GeminiPart, Role as GeminiRole};

#[derive(Debug, Clone)]
struct ToolInfo {
    id: String,
    name: String,
    arguments: String,
    emitted: bool,
}

#[derive(Debug, Clone)]
pub struct ClaudeToGeminiStreamState {
    response_id: String,
    model_version: String,
    stop_reason: Option<BetaStopReason>,
    usage: Option<BetaStreamUsage>,
    tool_blocks: BTreeMap<u32, ToolInfo>,
    finished: bool,
}

impl ClaudeToGeminiStreamState {
    pub fn new() -> Self {
        Self {
            response_id: "response".to_string(),
            model_version: "models/unknown".to_string(),
            stop_reason: None,
            usage: None,
            tool_blocks: BTreeMap::new(),
            finished: false,
        }
    }

    pub fn transform_event(&mut self, event: BetaStreamEvent) -> Vec<GenerateContentResponse> {
        let event = match event {
            BetaStreamEvent::Known(event) => event,
            BetaStreamEvent::Unknown(_) => return Vec::new(),
        };

        match event {
            BetaStreamEventKnown::MessageStart { message } => {
                self.update_from_message(&message);
                Vec::new()
            }
            BetaStreamEventKnown::ContentBlockStart {
                index,
                content_block,
            } => self.handle_block_start(index, content_block),
            BetaStreamEventKnown::ContentBlockDelta { index, delta } => {
                self.handle_block_delta(index, delta)
            }
            BetaStreamEventKnown::ContentBlockStop { index } => self.handle_block_stop(index),
            BetaStreamEventKnown::MessageDelta { delta, usage } => {
                self.stop_reason = delta.stop_reason;
                if usage.input_tokens.is_some() || usage.output_tokens.is_some() {
                    self.usage = Some(usage);
                }
                Vec::new()
            }
            BetaStreamEventKnown::MessageStop => self.finish_response(),
            BetaStreamEventKnown::Ping => Vec::new(),
            BetaStreamEventKnown::Error { .. } => Vec::new(),
        }
    }

    fn handle_block_start(
        &mut self,
        index: u32,
        content_block: BetaStreamContentBlock,
    ) -> Vec<GenerateContentResponse> {
        match content_block {
            BetaStreamContentBlock::Text(text) => self.emit_parts(vec![text_part(text.text)]),
            BetaStreamContentBlock::Thinking(thinking) => {
                self.emit_parts(vec![thinking_part(thinking)])
            }
            BetaStreamContentBlock::ToolUse(tool) => {
                self.start_tool(index, tool.id, tool.name, tool.input)
            }
        }
    }

    fn handle_block_delta(
        &mut self,
        index: u32,
        delta: BetaStreamContentBlockDelta,
    ) -> Vec<GenerateContentResponse> {
        match delta {
            BetaStreamContentBlockDelta::TextDelta { text } => {
                self.emit_parts(vec![text_part(text)])
            }
            BetaStreamContentBlockDelta::ThinkingDelta { thinking } => {
                self.emit_parts(vec![thinking_delta_part(thinking)])
            }
            BetaStreamContentBlockDelta::InputJsonDelta { partial_json } => {
                self.append_tool_arguments(index, partial_json)
            }
            BetaStreamContentBlockDelta::SignatureDelta { signature } => {
                if signature.is_empty() {
                    Vec::new()
                } else {
                    self.emit_parts(vec![signature_part(signature)])
                }
            }
        }
    }

    fn handle_block_stop(&mut self, index: u32) -> Vec<GenerateContentResponse> {
        let info = match self.tool_blocks.get_mut(&index) {
            Some(info) => info,
            None => return Vec::new(),
        };

        if info.emitted {
            return Vec::new();
        }

        let args_value = if info.arguments.is_empty() {
            JsonValue::Object(serde_json::Map::new())
        } else {
            parse_json_value(&info.arguments)
        };

        info.emitted = true;
        let part = build_tool_part(info, args_value);
        self.emit_parts(vec![part])
    }

    fn start_tool(
        &mut self,
        index: u32,
        id: String,
        name: String,
        input: JsonObject,
    ) -> Vec<GenerateContentResponse> {
        let args_value = json_object_to_value(&input);
        let arguments = serde_json::to_string(&args_value).unwrap_or_default();
        let emitted = !arguments.is_empty() && !input.is_empty();

        self.tool_blocks.insert(
            index,
            ToolInfo {
                id,
                name,
                arguments,
                emitted,
            },
        );

        if emitted {
            let info = self.tool_blocks.get(&index).expect("tool info");
            let part = build_tool_part(info, args_value);
            self.emit_parts(vec![part])
        } else {
            Vec::new()
        }
    }

    fn append_tool_arguments(&mut self, index: u32, delta: String) -> Vec<GenerateContentResponse> {
        let info = match self.tool_blocks.get_mut(&index) {
            Some(info) => info,
            None => return Vec::new(),
        };

        info.arguments.push_str(&delta);
        info.emitted = true;
        let args_value = parse_json_value(&info.arguments);
        let part = build_tool_part(info, args_value);
        self.emit_parts(vec![part])
    }

    fn emit_parts(&self, parts: Vec<GeminiPart>) -> Vec<GenerateContentResponse> {
        let parts: Vec<GeminiPart> = parts.into_iter().filter(part_has_payload).collect();
        if parts.is_empty() {
            return Vec::new();
        }

        let candidate = Candidate {
            content: GeminiContent {
                parts,
                role: Some(GeminiRole::Model),
            },
            finish_reason: None,
            index: Some(0),
        };

        vec![GenerateContentResponse {
            candidates: vec![candidate],
            prompt_feedback: None,
            usage_metadata: None,
            model_version: Some(self.model_version.clone()),
            response_id: Some(self.response_id.clone()),
        }]
    }

    fn update_from_message(&mut self, message: &BetaStreamMessage) {
        self.response_id = message.id.clone();
        self.model_version = map_model_version(&message.model);
    }

    fn finish_response(&mut self) -> Vec<GenerateContentResponse> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let finish_reason = self
            .stop_reason
            .map(map_stop_reason)
            .unwrap_or(FinishReason::Stop);

        let candidate = Candidate {
            content: GeminiContent {
                parts: Vec::new(),
                role: Some(GeminiRole::Model),
            },
            finish_reason: Some(finish_reason),
            index: Some(0),
        };

        vec![GenerateContentResponse {
            candidates: vec![candidate],
            prompt_feedback: None,
            usage_metadata: self.usage.as_ref().map(map_usage),
            model_version: Some(self.model_version.clone()),
            response_id: Some(self.response_id.clone()),
        }]
    }
}

impl Default for ClaudeToGeminiStreamState {
    fn default() -> Self {
        Self::new()
    }
}

fn text_part(text: String) -> GeminiPart {
    GeminiPart {
        text: Some(text),
        ..Default::default()
    }
}

fn thinking_part(block: BetaThinkingBlockStream) -> GeminiPart {
    GeminiPart {
        text: Some(block.thinking),
        thought: Some(true),
        thought_signature: block.signature,
        ..Default::default()
    }
}

fn thinking_delta_part(thinking: String) -> GeminiPart {
    GeminiPart {
        text: Some(thinking),
        thought: Some(true),
        ..Default::default()
    }
}

fn signature_part(signature: String) -> GeminiPart {
    GeminiPart {
        thought: Some(true),
        thought_signature: Some(signature),
        ..Default::default()
    }
}

fn build_tool_part(tool: &ToolInfo, args_value: JsonValue) -> GeminiPart {
    let args = match args_value {
        JsonValue::Object(map) => map.into_iter().collect(),
        _ => Default::default(),
    };

    GeminiPart {
        function_call: Some(GeminiFunctionCall {
            id: Some(tool.id.clone()),
            name: tool.name.clone(),
            args,
        }),
        ..Default::default()
    }
}

fn part_has_payload(part: &GeminiPart) -> bool {
    part.text.as_ref().map(|text| !text.is_empty()).unwrap_or(false)
        || part.function_call.is_some()
        || part.function_response.is_some()
        || part.inline_data.is_some()
        || part.thought.is_some()
        || part.thought_signature.is_some()
}

fn json_object_to_value(value: &JsonObject) -> JsonValue {
    JsonValue::Object(value.clone().into_iter().collect())
}

fn parse_json_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

fn map_stop_reason(reason: BetaStopReason) -> FinishReason {
    match reason {
        BetaStopReason::EndTurn | BetaStopReason::StopSequence => FinishReason::Stop,
        BetaStopReason::MaxTokens => FinishReason::MaxTokens,
        BetaStopReason::ToolUse => FinishReason::Stop,
        BetaStopReason::Refusal => FinishReason::Safety,
    }
}

fn map_usage(usage: &BetaStreamUsage) -> UsageMetadata {
    let input_tokens = usage.input_tokens;
    let output_tokens = usage.output_tokens;
    let total = match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input.saturating_add(output)),
        _ => None,
    };

    UsageMetadata {
        prompt_token_count: input_tokens,
        candidates_token_count: output_tokens,
        thoughts_token_count: None,
        total_token_count: total,
    }
}

fn map_model_version(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}
