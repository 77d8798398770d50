use ccnexus_protocol::claude::create_message::response::CreateMessageResponse as ClaudeCreateMessageResponse;
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock, BetaMessage, BetaStopReason, BetaToolUseBlock,
};
use ccnexus_protocol::openai::create_chat_completions::response::{
    ChatCompletionChoice, ChatCompletionObjectType, CreateChatCompletionResponse,
};
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionFinishReason, ChatCompletionMessageToolCall, ChatCompletionMessageToolCallFunction,
    ChatCompletionResponseMessage, ChatCompletionResponseRole, ChatCompletionToolCallType,
    CompletionUsage,
};

/// Convert a Claude message response into an OpenAI chat-completions response.
pub fn transform_response(response: ClaudeCreateMessageResponse) -> CreateChatCompletionResponse {
    let (content, tool_calls, refusal) = map_content(&response.content, response.stop_reason);

    let message = ChatCompletionResponseMessage {
        role: ChatCompletionResponseRole::Assistant,
        content,
        refusal,
        tool_calls,
    };

    let choice = ChatCompletionChoice {
        index: 0,
        message,
        finish_reason: map_finish_reason(response.stop_reason),
    };

    let usage = map_usage(&response);

    CreateChatCompletionResponse {
        id: response.id,
        object: ChatCompletionObjectType::ChatCompletion,
        created: 0,
        model: response.model.clone(),
        choices: vec![choice],
        usage,
        system_fingerprint: None,
    }
}

fn map_content(
    blocks: &[BetaContentBlock],
    stop_reason: Option<BetaStopReason>,
) -> (
    Option<String>,
    Option<Vec<ChatCompletionMessageToolCall>>,
    Option<String>,
) {
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            BetaContentBlock::Text(text) => texts.push(text.text.clone()),
            BetaContentBlock::Thinking(thinking) => {
                texts.push(thinking.thinking.clone());
            }
            BetaContentBlock::ToolUse(tool) => {
                tool_calls.push(map_tool_use(tool));
            }
            BetaContentBlock::Image(_) | BetaContentBlock::ToolResult(_) => {}
        }
    }

    let text = if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    };

    let tool_calls = if tool_calls.is_empty() {
        None
    } else {
        Some(tool_calls)
    };

    let refusal = if matches!(stop_reason, Some(BetaStopReason::Refusal)) {
        text.clone()
    } else {
        None
    };

    let content = if refusal.is_some() { None } else { text };

    (content, tool_calls, refusal)
}

fn map_tool_use(tool: &BetaToolUseBlock) -> ChatCompletionMessageToolCall {
    let arguments = serde_json::to_string(&tool.input).unwrap_or_else(|_| "{}".to_string());
    ChatCompletionMessageToolCall {
        id: tool.id.clone(),
        r#type: ChatCompletionToolCallType::Function,
        function: ChatCompletionMessageToolCallFunction {
            name: tool.name.clone(),
            arguments,
        },
    }
}

fn map_finish_reason(reason: Option<BetaStopReason>) -> ChatCompletionFinishReason {
    match reason {
        Some(BetaStopReason::MaxTokens) => ChatCompletionFinishReason::Length,
        Some(BetaStopReason::ToolUse) => ChatCompletionFinishReason::ToolCalls,
        Some(BetaStopReason::Refusal) => ChatCompletionFinishReason::ContentFilter,
        Some(BetaStopReason::StopSequence) | Some(BetaStopReason::EndTurn) | None => {
            ChatCompletionFinishReason::Stop
        }
    }
}

fn map_usage(response: &BetaMessage) -> Option<CompletionUsage> {
    Some(CompletionUsage {
        prompt_tokens: response.usage.input_tokens as i64,
        completion_tokens: response.usage.output_tokens as i64,
        total_tokens: (response.usage.input_tokens + response.usage.output_tokens) as i64,
        completion_tokens_details: None,
        prompt_tokens_details: None,
    })
}
