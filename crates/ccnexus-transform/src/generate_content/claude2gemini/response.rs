use ccnexus_protocol::claude::create_message::response::CreateMessageResponse as ClaudeCreateMessageResponse;
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock, BetaMessage, BetaMessageRole, BetaMessageType, BetaStopReason, BetaTextBlock,
    BetaTextBlockType, BetaToolUseBlock, BetaToolUseBlockType, BetaUsage,
};
use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse as GeminiGenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::{FinishReason, UsageMetadata};
use ccnexus_protocol::gemini::types::{Content as GeminiContent, Part as GeminiPart};

pub fn transform_response(response: GeminiGenerateContentResponse) -> ClaudeCreateMessageResponse {
    let candidate = response.candidates.first();

    let content = candidate
        .map(|candidate| map_content_to_blocks(&candidate.content))
        .unwrap_or_default();

    let stop_reason = candidate.and_then(|candidate| map_finish_reason(candidate.finish_reason));

    let usage = map_usage(response.usage_metadata);

    let model = response
        .model_version
        .map(|version| version.trim_start_matches("models/").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    BetaMessage {
        id: response.response_id.unwrap_or_else(|| "response".to_string()),
        content,
        model,
        role: BetaMessageRole::Assistant,
        stop_reason,
        stop_sequence: None,
        r#type: BetaMessageType::Message,
        usage,
    }
}

fn map_content_to_blocks(content: &GeminiContent) -> Vec<BetaContentBlock> {
    content.parts.iter().filter_map(map_part_to_block).collect()
}

fn map_part_to_block(part: &GeminiPart) -> Option<BetaContentBlock> {
    if let Some(function_call) = &part.function_call {
        return Some(BetaContentBlock::ToolUse(BetaToolUseBlock {
            id: function_call
                .id
                .clone()
                .unwrap_or_else(|| function_call.name.clone()),
            input: function_call.args.clone(),
            name: function_call.name.clone(),
            r#type: BetaToolUseBlockType::ToolUse,
        }));
    }

    if let Some(text) = &part.text
        && !text.is_empty()
    {
        return Some(BetaContentBlock::Text(BetaTextBlock {
            text: text.clone(),
            r#type: BetaTextBlockType::Text,
        }));
    }

    None
}

fn map_finish_reason(reason: Option<FinishReason>) -> Option<BetaStopReason> {
    let reason = reason?;
    Some(match reason {
        FinishReason::Stop => BetaStopReason::EndTurn,
        FinishReason::MaxTokens => BetaStopReason::MaxTokens,
        FinishReason::MalformedFunctionCall => BetaStopReason::ToolUse,
        FinishReason::Safety | FinishReason::Recitation => BetaStopReason::Refusal,
        FinishReason::Other | FinishReason::FinishReasonUnspecified => BetaStopReason::EndTurn,
    })
}

fn map_usage(usage: Option<UsageMetadata>) -> BetaUsage {
    let usage = usage.unwrap_or_default();
    BetaUsage {
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
        cache_creation_input_tokens: 0,
        cache_read_input_tokens: 0,
    }
}
