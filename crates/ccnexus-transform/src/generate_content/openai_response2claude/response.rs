use ccnexus_protocol::claude::create_message::response::CreateMessageResponse as ClaudeCreateMessageResponse;
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock, BetaMessage, BetaMessageRole, BetaMessageType, BetaStopReason, BetaTextBlock,
    BetaTextBlockType, BetaToolUseBlock, BetaToolUseBlockType, BetaUsage,
};
use ccnexus_protocol::openai::create_response::response::Response as OpenAIResponse;
use ccnexus_protocol::openai::create_response::types::{
    FunctionToolCall, OutputItem, OutputMessageContent, ResponseIncompleteDetails,
    ResponseIncompleteReason, ResponseStatus,
};

/// Convert an OpenAI responses response into a Claude create-message response.
pub fn transform_response(response: OpenAIResponse) -> ClaudeCreateMessageResponse {
    let content = build_content(&response);
    let usage = build_usage(&response);
    let stop_reason = map_status(response.status, response.incomplete_details.as_ref(), &content);

    BetaMessage {
        id: response.id,
        content,
        model: response.model,
        role: BetaMessageRole::Assistant,
        stop_reason,
        stop_sequence: None,
        r#type: BetaMessageType::Message,
        usage,
    }
}

fn build_content(response: &OpenAIResponse) -> Vec<BetaContentBlock> {
    let mut blocks = Vec::new();

    for item in &response.output {
        match item {
            OutputItem::Message(message) => {
                let mut combined = String::new();
                for part in &message.content {
                    match part {
                        OutputMessageContent::OutputText(text) => combined.push_str(&text.text),
                        OutputMessageContent::Refusal(refusal) => {
                            combined.push_str(&refusal.refusal)
                        }
                    }
                }
                if !combined.is_empty() {
                    blocks.push(BetaContentBlock::Text(BetaTextBlock {
                        text: combined,
                        r#type: BetaTextBlockType::Text,
                    }));
                }
            }
            OutputItem::Function(call) => {
                blocks.push(BetaContentBlock::ToolUse(map_function_call(call)));
            }
            OutputItem::Reasoning(_) => {}
        }
    }

    if blocks.is_empty()
        && let Some(text) = response.output_text.as_ref()
        && !text.is_empty()
    {
        blocks.push(BetaContentBlock::Text(BetaTextBlock {
            text: text.clone(),
            r#type: BetaTextBlockType::Text,
        }));
    }

    blocks
}

fn map_function_call(call: &FunctionToolCall) -> BetaToolUseBlock {
    let input = match serde_json::from_str::<serde_json::Value>(&call.arguments) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Default::default(),
    };

    BetaToolUseBlock {
        id: call.call_id.clone(),
        input,
        name: call.name.clone(),
        r#type: BetaToolUseBlockType::ToolUse,
    }
}

fn build_usage(response: &OpenAIResponse) -> BetaUsage {
    let (input_tokens, output_tokens) = response
        .usage
        .as_ref()
        .map(|usage| (usage.input_tokens.max(0) as u32, usage.output_tokens.max(0) as u32))
        .unwrap_or((0, 0));
    BetaUsage {
        input_tokens,
        output_tokens,
        cache_creation_input_tokens: 0,
        cache_read_input_tokens: 0,
    }
}

fn map_status(
    status: Option<ResponseStatus>,
    details: Option<&ResponseIncompleteDetails>,
    content: &[BetaContentBlock],
) -> Option<BetaStopReason> {
    if content.iter().any(|block| matches!(block, BetaContentBlock::ToolUse(_))) {
        return Some(BetaStopReason::ToolUse);
    }

    match status {
        Some(ResponseStatus::Completed) => Some(BetaStopReason::EndTurn),
        Some(ResponseStatus::Incomplete) => match details.map(|d| d.reason) {
            Some(ResponseIncompleteReason::MaxOutputTokens) => Some(BetaStopReason::MaxTokens),
            Some(ResponseIncompleteReason::ContentFilter) => Some(BetaStopReason::Refusal),
            None => Some(BetaStopReason::EndTurn),
        },
        Some(ResponseStatus::Failed) | Some(ResponseStatus::Cancelled) => {
            Some(BetaStopReason::EndTurn)
        }
        Some(ResponseStatus::InProgress) | None => None,
    }
}
