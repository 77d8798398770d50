use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse as GeminiGenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::{Candidate, FinishReason, UsageMetadata};
use ccnexus_protocol::gemini::types::{Content as GeminiContent, FunctionCall as GeminiFunctionCall, Part as GeminiPart, Role as GeminiRole};
use ccnexus_protocol::openai::create_chat_completions::response::{
    ChatCompletionChoice, CreateChatCompletionResponse,
};
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionFinishReason, ChatCompletionMessageToolCall, ChatCompletionResponseMessage,
    CompletionUsage,
};
use serde_json::Value as JsonValue;

pub fn transform_response(response: CreateChatCompletionResponse) -> GeminiGenerateContentResponse {
    let candidates = response
        .choices
        .iter()
        .map(map_choice_to_candidate)
        .collect::<Vec<Candidate>>();

    GeminiGenerateContentResponse {
        candidates,
        prompt_feedback: None,
        usage_metadata: response.usage.as_ref().map(map_usage),
        model_version: Some(map_model_version(&response.model)),
        response_id: Some(response.id),
    }
}

fn map_choice_to_candidate(choice: &ChatCompletionChoice) -> Candidate {
    Candidate {
        content: map_message_to_content(&choice.message),
        finish_reason: Some(map_finish_reason(choice.finish_reason)),
        index: if choice.index >= 0 {
            Some(choice.index as u32)
        } else {
            None
        },
    }
}

fn map_message_to_content(message: &ChatCompletionResponseMessage) -> GeminiContent {
    let mut parts = Vec::new();

    if let Some(text) = &message.content
        && !text.is_empty()
    {
        parts.push(text_part(text.clone()));
    }

    if let Some(refusal) = &message.refusal
        && !refusal.is_empty()
    {
        parts.push(text_part(refusal.clone()));
    }

    if let Some(tool_calls) = &message.tool_calls {
        for call in tool_calls {
            parts.push(map_tool_call(call));
        }
    }

    GeminiContent {
        parts,
        role: Some(GeminiRole::Model),
    }
}

fn map_tool_call(call: &ChatCompletionMessageToolCall) -> GeminiPart {
    let args_value = serde_json::from_str(&call.function.arguments)
        .unwrap_or_else(|_| JsonValue::String(call.function.arguments.clone()));
    let args = match args_value {
        JsonValue::Object(map) => map.into_iter().collect(),
        _ => Default::default(),
    };

    GeminiPart {
        function_call: Some(GeminiFunctionCall {
            id: Some(call.id.clone()),
            name: call.function.name.clone(),
            args,
        }),
        ..Default::default()
    }
}

fn text_part(text: String) -> GeminiPart {
    GeminiPart {
        text: Some(text),
        ..Default::default()
    }
}

fn map_finish_reason(reason: ChatCompletionFinishReason) -> FinishReason {
    match reason {
        ChatCompletionFinishReason::Stop => FinishReason::Stop,
        ChatCompletionFinishReason::Length => FinishReason::MaxTokens,
        ChatCompletionFinishReason::ToolCalls => FinishReason::Stop,
        ChatCompletionFinishReason::ContentFilter => FinishReason::Safety,
    }
}

fn map_usage(usage: &CompletionUsage) -> UsageMetadata {
    UsageMetadata {
        prompt_token_count: Some(usage.prompt_tokens as u32),
        candidates_token_count: Some(usage.completion_tokens as u32),
        thoughts_token_count: usage
            .completion_tokens_details
            .as_ref()
            .and_then(|details| details.reasoning_tokens.map(|value| value as u32)),
        total_token_count: Some(usage.total_tokens as u32),
    }
}

fn map_model_version(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}
