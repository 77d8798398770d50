use ccnexus_protocol::claude::create_message::response::CreateMessageResponse as ClaudeCreateMessageResponse;
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock, BetaStopReason, BetaThinkingBlock, BetaUsage,
};
use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse as GeminiGenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::{Candidate, FinishReason, UsageMetadata};
use ccnexus_protocol::gemini::types::{
    Content as GeminiContent, FunctionCall as GeminiFunctionCall, Part as GeminiPart, Role as GeminiRole,
};
use serde_json::Value as JsonValue;

pub fn transform_response(response: ClaudeCreateMessageResponse) -> GeminiGenerateContentResponse {
    let parts = map_blocks_to_parts(&response.content);
    let content = GeminiContent {
        parts,
        role: Some(GeminiRole::Model),
    };

    let candidate = Candidate {
        content,
        finish_reason: map_stop_reason(response.stop_reason),
        index: Some(0),
    };

    GeminiGenerateContentResponse {
        candidates: vec![candidate],
        prompt_feedback: None,
        usage_metadata: Some(map_usage(&response.usage)),
        model_version: Some(map_model_version(&response.model)),
        response_id: Some(response.id),
    }
}

fn map_blocks_to_parts(blocks: &[BetaContentBlock]) -> Vec<GeminiPart> {
    let mut parts = Vec::new();
    for block in blocks {
        parts.extend(map_block_to_parts(block));
    }
    parts
}

fn map_block_to_parts(block: &BetaContentBlock) -> Vec<GeminiPart> {
    match block {
        BetaContentBlock::Text(text_block) => vec![text_part(text_block.text.clone())],
        BetaContentBlock::Thinking(thinking_block) => vec![thinking_part(thinking_block)],
        BetaContentBlock::ToolUse(tool_use) => vec![function_call_part(
            tool_use.id.clone(),
            tool_use.name.clone(),
            json_object_to_value(&tool_use.input),
        )],
        BetaContentBlock::Image(_) | BetaContentBlock::ToolResult(_) => Vec::new(),
    }
}

fn thinking_part(block: &BetaThinkingBlock) -> GeminiPart {
    let mut part = text_part(block.thinking.clone());
    part.thought = Some(true);
    part.thought_signature = block.signature.clone();
    part
}

fn text_part(text: String) -> GeminiPart {
    GeminiPart {
        text: Some(text),
        ..Default::default()
    }
}

fn function_call_part(id: String, name: String, args: JsonValue) -> GeminiPart {
    let args = match args {
        JsonValue::Object(map) => map.into_iter().collect(),
        _ => Default::default(),
    };
    GeminiPart {
        function_call: Some(GeminiFunctionCall {
            id: Some(id),
            name,
            args,
        }),
        ..Default::default()
    }
}

fn json_object_to_value(value: &ccnexus_protocol::claude::create_message::types::JsonObject) -> JsonValue {
    JsonValue::Object(value.clone().into_iter().collect())
}

fn map_stop_reason(reason: Option<BetaStopReason>) -> Option<FinishReason> {
    let reason = reason?;
    Some(match reason {
        BetaStopReason::EndTurn | BetaStopReason::StopSequence => FinishReason::Stop,
        BetaStopReason::MaxTokens => FinishReason::MaxTokens,
        BetaStopReason::ToolUse => FinishReason::Stop,
        BetaStopReason::Refusal => FinishReason::Safety,
    })
}

fn map_usage(usage: &BetaUsage) -> UsageMetadata {
    let total = usage.input_tokens.saturating_add(usage.output_tokens);
    UsageMetadata {
        prompt_token_count: Some(usage.input_tokens),
        candidates_token_count: Some(usage.output_tokens),
        thoughts_token_count: None,
        total_token_count: Some(total),
    }
}

fn map_model_version(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}
