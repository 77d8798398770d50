use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse as GeminiGenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::{Candidate, FinishReason, UsageMetadata};
use ccnexus_protocol::openai::create_response::response::{Response, ResponseObjectType};
use ccnexus_protocol::openai::create_response::types::{
    FunctionToolCall, FunctionToolCallType, MessageStatus, OutputItem, OutputMessage,
    OutputMessageContent, OutputMessageRole, OutputMessageType, OutputTextContent,
    ResponseIncompleteDetails, ResponseIncompleteReason, ResponseStatus, ResponseUsage,
};

pub fn transform_response(response: GeminiGenerateContentResponse) -> Response {
    let mut output = Vec::new();

    for (index, candidate) in response.candidates.iter().enumerate() {
        output.extend(map_candidate_to_output(candidate, index));
    }

    let usage = response.usage_metadata.as_ref().map(map_usage);
    let output_text = extract_output_text(&output);
    let (status, incomplete_details) = map_status(&response);

    let model = response
        .model_version
        .unwrap_or_else(|| "unknown".to_string());
    let model = model.strip_prefix("models/").unwrap_or(&model).to_string();

    Response {
        id: response
            .response_id
            .unwrap_or_else(|| "response".to_string()),
        object: ResponseObjectType::Response,
        created_at: 0,
        status: Some(status),
        completed_at: None,
        error: None,
        incomplete_details,
        instructions: None,
        model,
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

fn map_candidate_to_output(candidate: &Candidate, index: usize) -> Vec<OutputItem> {
    let mut items = Vec::new();
    let (message, tool_calls) = map_candidate_message(candidate, index);

    if let Some(message) = message {
        items.push(OutputItem::Message(message));
    }

    for tool_call in tool_calls {
        items.push(OutputItem::Function(tool_call));
    }

    items
}

fn map_candidate_message(
    candidate: &Candidate,
    index: usize,
) -> (Option<OutputMessage>, Vec<FunctionToolCall>) {
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_call_counter = 0usize;

    for part in &candidate.content.parts {
        if let Some(text) = part.text.clone()
            && !text.is_empty()
        {
            texts.push(text);
        }

        if let Some(function_call) = &part.function_call {
            let call_id = function_call
                .id
                .clone()
                .unwrap_or_else(|| format!("tool_call_{index}_{tool_call_counter}"));
            tool_call_counter += 1;
            let args = serde_json::to_string(&function_call.args).unwrap_or_else(|_| "{}".to_string());
            tool_calls.push(FunctionToolCall {
                id: call_id.clone(),
                r#type: FunctionToolCallType::FunctionCall,
                call_id,
                name: function_call.name.clone(),
                arguments: args,
                status: Some(MessageStatus::Completed),
            });
        }

        if let Some(function_response) = &part.function_response
            && let Ok(text) = serde_json::to_string(function_response)
            && !text.is_empty()
        {
            texts.push(text);
        }

        if part.inline_data.is_some() {
            texts.push("[inline_data]".to_string());
        }
    }

    let message = if texts.is_empty() {
        None
    } else {
        Some(OutputMessage {
            id: format!("message_{index}"),
            r#type: OutputMessageType::Message,
            role: OutputMessageRole::Assistant,
            content: vec![OutputMessageContent::OutputText(OutputTextContent {
                text: texts.join("\n"),
            })],
            status: MessageStatus::Completed,
        })
    };

    (message, tool_calls)
}

fn map_usage(usage: &UsageMetadata) -> ResponseUsage {
    let input_tokens = usage.prompt_token_count.unwrap_or(0) as i64;
    let output_tokens = usage.candidates_token_count.unwrap_or(0) as i64;
    let total_tokens = usage
        .total_token_count
        .map(|value| value as i64)
        .unwrap_or_else(|| input_tokens + output_tokens);

    ResponseUsage {
        input_tokens,
        output_tokens,
        total_tokens,
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

fn map_status(
    response: &GeminiGenerateContentResponse,
) -> (ResponseStatus, Option<ResponseIncompleteDetails>) {
    let finish_reason = response
        .candidates
        .first()
        .and_then(|candidate| candidate.finish_reason);

    match finish_reason {
        Some(FinishReason::MaxTokens) => (
            ResponseStatus::Incomplete,
            Some(ResponseIncompleteDetails {
                reason: ResponseIncompleteReason::MaxOutputTokens,
            }),
        ),
        Some(FinishReason::Safety | FinishReason::Recitation) => (
            ResponseStatus::Incomplete,
            Some(ResponseIncompleteDetails {
                reason: ResponseIncompleteReason::ContentFilter,
            }),
        ),
        _ => (ResponseStatus::Completed, None),
    }
}
