use ccnexus_protocol::claude::create_message::response::CreateMessageResponse as ClaudeCreateMessageResponse;
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock, BetaMessage, BetaStopReason, BetaToolUseBlock,
};
use ccnexus_protocol::openai::create_response::response::{Response, ResponseObjectType};
use ccnexus_protocol::openai::create_response::types::{
    FunctionToolCall, FunctionToolCallType, MessageStatus, OutputItem, OutputMessage,
    OutputMessageContent, OutputMessageRole, OutputMessageType, OutputTextContent, RefusalContent,
    ResponseIncompleteDetails, ResponseIncompleteReason, ResponseStatus, ResponseUsage,
};

pub fn transform_response(response: ClaudeCreateMessageResponse) -> Response {
    let (output, output_text) = map_output(&response);

    let (status, incomplete_details) = map_status(response.stop_reason);
    let usage = map_usage(&response);

    Response {
        id: response.id,
        object: ResponseObjectType::Response,
        created_at: 0,
        status: Some(status),
        completed_at: None,
        error: None,
        incomplete_details,
        instructions: None,
        model: response.model,
        output,
        output_text,
        usage: Some(usage),
        parallel_tool_calls: None,
        max_output_tokens: None,
        text: None,
        tools: None,
        tool_choice: None,
        metadata: None,
        temperature: None,
        top_p: None,
        user: None,
    }
}

fn map_output(response: &BetaMessage) -> (Vec<OutputItem>, Option<String>) {
    let mut output = Vec::new();
    let mut texts = Vec::new();

    for block in &response.content {
        match block {
            BetaContentBlock::Text(text) => texts.push(text.text.clone()),
            BetaContentBlock::Thinking(thinking) => texts.push(thinking.thinking.clone()),
            BetaContentBlock::ToolUse(tool) => output.push(OutputItem::Function(map_tool_use(tool))),
            BetaContentBlock::Image(_) | BetaContentBlock::ToolResult(_) => {}
        }
    }

    let content = map_message_content(&texts, response.stop_reason);
    if let Some(message) = content {
        output.insert(0, OutputItem::Message(message));
    }

    let output_text = if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    };

    (output, output_text)
}

fn map_message_content(texts: &[String], stop_reason: Option<BetaStopReason>) -> Option<OutputMessage> {
    if texts.is_empty() && !matches!(stop_reason, Some(BetaStopReason::Refusal)) {
        return None;
    }

    let mut content = Vec::new();
    if matches!(stop_reason, Some(BetaStopReason::Refusal)) {
        let refusal = texts.join("\n");
        content.push(OutputMessageContent::Refusal(RefusalContent { refusal }));
    } else {
        let text = texts.join("\n");
        if !text.is_empty() {
            content.push(OutputMessageContent::OutputText(OutputTextContent { text }));
        }
    }

    if content.is_empty() {
        None
    } else {
        Some(OutputMessage {
            id: "message".to_string(),
            r#type: OutputMessageType::Message,
            role: OutputMessageRole::Assistant,
            content,
            status: MessageStatus::Completed,
        })
    }
}

fn map_tool_use(tool: &BetaToolUseBlock) -> FunctionToolCall {
    let arguments = serde_json::to_string(&tool.input).unwrap_or_else(|_| "{}".to_string());
    FunctionToolCall {
        id: tool.id.clone(),
        r#type: FunctionToolCallType::FunctionCall,
        call_id: tool.id.clone(),
        name: tool.name.clone(),
        arguments,
        status: Some(MessageStatus::Completed),
    }
}

fn map_status(stop_reason: Option<BetaStopReason>) -> (ResponseStatus, Option<ResponseIncompleteDetails>) {
    match stop_reason {
        Some(BetaStopReason::MaxTokens) => (
            ResponseStatus::Incomplete,
            Some(ResponseIncompleteDetails {
                reason: ResponseIncompleteReason::MaxOutputTokens,
            }),
        ),
        _ => (ResponseStatus::Completed, None),
    }
}

fn map_usage(response: &BetaMessage) -> ResponseUsage {
    let input_tokens = response.usage.input_tokens as i64;
    let output_tokens = response.usage.output_tokens as i64;
    ResponseUsage {
        input_tokens,
        output_tokens,
        total_tokens: input_tokens + output_tokens,
    }
}
