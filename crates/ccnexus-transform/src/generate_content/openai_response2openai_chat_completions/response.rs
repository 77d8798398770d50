use ccnexus_protocol::openai::create_chat_completions::response::{
    ChatCompletionChoice, CreateChatCompletionResponse,
};
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionMessageToolCall, ChatCompletionResponseMessage, CompletionUsage,
};
use ccnexus_protocol::openai::create_response::response::{Response, ResponseObjectType};
use ccnexus_protocol::openai::create_response::types::{
    FunctionToolCall, FunctionToolCallType, MessageStatus, OutputItem, OutputMessage,
    OutputMessageContent, OutputMessageRole, OutputMessageType, OutputTextContent, RefusalContent,
    ResponseStatus, ResponseUsage,
};

pub fn transform_response(response: CreateChatCompletionResponse) -> Response {
    let mut output = Vec::new();

    for choice in &response.choices {
        append_choice_output(choice, &mut output);
    }

    let usage = response.usage.as_ref().map(map_usage);
    let output_text = extract_output_text(&output);

    Response {
        id: response.id.clone(),
        object: ResponseObjectType::Response,
        created_at: response.created,
        status: Some(ResponseStatus::Completed),
        completed_at: None,
        error: None,
        incomplete_details: None,
        instructions: None,
        model: response.model,
        output,
        output_text,
        usage,
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

fn append_choice_output(choice: &ChatCompletionChoice, output: &mut Vec<OutputItem>) {
    let message = &choice.message;

    if let Some(item) = map_message_to_output(message, choice.index) {
        output.push(OutputItem::Message(item));
    }

    if let Some(tool_calls) = &message.tool_calls {
        for call in tool_calls {
            output.push(map_tool_call_to_output(call));
        }
    }
}

fn map_message_to_output(
    message: &ChatCompletionResponseMessage,
    index: i64,
) -> Option<OutputMessage> {
    let mut contents = Vec::new();

    if let Some(content) = &message.content
        && !content.is_empty()
    {
        contents.push(OutputMessageContent::OutputText(OutputTextContent {
            text: content.clone(),
        }));
    }

    if let Some(refusal) = &message.refusal
        && !refusal.is_empty()
    {
        contents.push(OutputMessageContent::Refusal(RefusalContent {
            refusal: refusal.clone(),
        }));
    }

    if contents.is_empty() {
        return None;
    }

    Some(OutputMessage {
        id: format!("message_{index}"),
        r#type: OutputMessageType::Message,
        role: OutputMessageRole::Assistant,
        content: contents,
        status: MessageStatus::Completed,
    })
}

fn map_tool_call_to_output(call: &ChatCompletionMessageToolCall) -> OutputItem {
    OutputItem::Function(FunctionToolCall {
        id: call.id.clone(),
        r#type: FunctionToolCallType::FunctionCall,
        call_id: call.id.clone(),
        name: call.function.name.clone(),
        arguments: call.function.arguments.clone(),
        status: Some(MessageStatus::Completed),
    })
}

fn map_usage(usage: &CompletionUsage) -> ResponseUsage {
    ResponseUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}

fn extract_output_text(output: &[OutputItem]) -> Option<String> {
    for item in output {
        if let OutputItem::Message(message) = item {
            for content in &message.content {
                if let OutputMessageContent::OutputText(text) = content
                    && !text.text.is_empty()
                {
                    return Some(text.text.clone());
                }
            }
        }
    }
    None
}
