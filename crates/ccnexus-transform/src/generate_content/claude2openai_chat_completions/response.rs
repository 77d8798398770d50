use ccnexus_protocol::claude::create_message::response::CreateMessageResponse as ClaudeCreateMessageResponse;
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock, BetaMessage, BetaMessageRole, BetaMessageType, BetaStopReason, BetaTextBlock,
    BetaTextBlockType, BetaToolUseBlock, BetaToolUseBlockType, BetaUsage, JsonObject, JsonValue,
};
use ccnexus_protocol::openai::create_chat_completions::response::CreateChatCompletionResponse;
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionFinishReason, ChatCompletionMessageToolCall, ChatCompletionResponseMessage,
    CompletionUsage,
};

pub fn transform_response(response: CreateChatCompletionResponse) -> ClaudeCreateMessageResponse {
    let choice = response.choices.first();

    let (content, stop_reason) = match choice {
        Some(choice) => {
            let blocks = map_response_message(&choice.message);
            (blocks, map_finish_reason(choice.finish_reason))
        }
        None => (Vec::new(), None),
    };

    let usage = map_usage(response.usage);

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

fn map_response_message(message: &ChatCompletionResponseMessage) -> Vec<BetaContentBlock> {
    let mut blocks = Vec::new();

    if let Some(content) = &message.content
        && !content.is_empty()
    {
        blocks.push(BetaContentBlock::Text(BetaTextBlock {
            text: content.clone(),
            r#type: BetaTextBlockType::Text,
        }));
    }

    if let Some(refusal) = &message.refusal
        && !refusal.is_empty()
    {
        blocks.push(BetaContentBlock::Text(BetaTextBlock {
            text: refusal.clone(),
            r#type: BetaTextBlockType::Text,
        }));
    }

    if let Some(tool_calls) = &message.tool_calls {
        for tool_call in tool_calls {
            blocks.push(BetaContentBlock::ToolUse(map_tool_call(tool_call)));
        }
    }

    blocks
}

fn map_tool_call(tool_call: &ChatCompletionMessageToolCall) -> BetaToolUseBlock {
    let input = parse_tool_arguments(&tool_call.function.arguments);
    BetaToolUseBlock {
        id: tool_call.id.clone(),
        input,
        name: tool_call.function.name.clone(),
        r#type: BetaToolUseBlockType::ToolUse,
    }
}

fn parse_tool_arguments(arguments: &str) -> JsonObject {
    match serde_json::from_str::<JsonValue>(arguments) {
        Ok(JsonValue::Object(map)) => map.into_iter().collect(),
        Ok(other) => {
            let mut map = JsonObject::new();
            map.insert("arguments".to_string(), other);
            map
        }
        Err(_) => {
            let mut map = JsonObject::new();
            map.insert(
                "arguments".to_string(),
                JsonValue::String(arguments.to_string()),
            );
            map
        }
    }
}

fn map_finish_reason(reason: ChatCompletionFinishReason) -> Option<BetaStopReason> {
    Some(match reason {
        ChatCompletionFinishReason::Stop => BetaStopReason::EndTurn,
        ChatCompletionFinishReason::Length => BetaStopReason::MaxTokens,
        ChatCompletionFinishReason::ToolCalls => BetaStopReason::ToolUse,
        ChatCompletionFinishReason::ContentFilter => BetaStopReason::Refusal,
    })
}

fn map_usage(usage: Option<CompletionUsage>) -> BetaUsage {
    let (input_tokens, output_tokens) = match usage {
        Some(usage) => (
            usage.prompt_tokens.max(0) as u32,
            usage.completion_tokens.max(0) as u32,
        ),
        None => (0, 0),
    };

    BetaUsage {
        input_tokens,
        output_tokens,
        cache_creation_input_tokens: 0,
        cache_read_input_tokens: 0,
    }
}
