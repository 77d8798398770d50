use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse as GeminiGenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::{Candidate, FinishReason, UsageMetadata};
use ccnexus_protocol::gemini::types::{Content as GeminiContent, FunctionCall as GeminiFunctionCall, Part as GeminiPart, Role as GeminiRole};
use ccnexus_protocol::openai::create_response::response::Response;
use ccnexus_protocol::openai::create_response::types::{
    FunctionToolCall, OutputItem, OutputMessageContent, ResponseIncompleteReason, ResponseStatus,
    ResponseUsage,
};
use serde_json::Value as JsonValue;

pub fn transform_response(response: Response) -> GeminiGenerateContentResponse {
    let mut parts = Vec::new();

    for item in &response.output {
        parts.extend(map_output_item(item));
    }

    if parts.is_empty()
        && let Some(output_text) = &response.output_text
        && !output_text.is_empty()
    {
        parts.push(text_part(output_text.clone()));
    }

    let finish_reason = map_finish_reason(&response);

    let candidate = Candidate {
        content: GeminiContent {
            parts,
            role: Some(GeminiRole::Model),
        },
        finish_reason,
        index: Some(0),
    };

    GeminiGenerateContentResponse {
        candidates: vec![candidate],
        prompt_feedback: None,
        usage_metadata: response.usage.as_ref().map(map_usage),
        model_version: Some(map_model_version(&response.model)),
        response_id: Some(response.id),
    }
}

fn map_output_item(item: &OutputItem) -> Vec<GeminiPart> {
    match item {
        OutputItem::Message(message) => map_message_parts(message.content.as_slice()),
        OutputItem::Function(function) => vec![map_function_call(function)],
        OutputItem::Reasoning(_) => Vec::new(),
    }
}

fn map_message_parts(contents: &[OutputMessageContent]) -> Vec<GeminiPart> {
    let mut parts = Vec::new();
    for content in contents {
        match content {
            OutputMessageContent::OutputText(text) => {
                if !text.text.is_empty() {
                    parts.push(text_part(text.text.clone()));
                }
            }
            OutputMessageContent::Refusal(refusal) => {
                if !refusal.refusal.is_empty() {
                    parts.push(text_part(refusal.refusal.clone()));
                }
            }
        }
    }
    parts
}

fn map_function_call(call: &FunctionToolCall) -> GeminiPart {
    let args_value = serde_json::from_str(&call.arguments)
        .unwrap_or_else(|_| JsonValue::String(call.arguments.clone()));
    let args = match args_value {
        JsonValue::Object(map) => map.into_iter().collect(),
        _ => Default::default(),
    };

    GeminiPart {
        function_call: Some(GeminiFunctionCall {
            id: Some(call.id.clone()),
            name: call.name.clone(),
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

fn map_finish_reason(response: &Response) -> Option<FinishReason> {
    if let Some(details) = &response.incomplete_details {
        return Some(match details.reason {
            ResponseIncompleteReason::MaxOutputTokens => FinishReason::MaxTokens,
            ResponseIncompleteReason::ContentFilter => FinishReason::Safety,
        });
    }

    match response.status {
        Some(ResponseStatus::Failed) => Some(FinishReason::Other),
        _ => Some(FinishReason::Stop),
    }
}

fn map_usage(usage: &ResponseUsage) -> UsageMetadata {
    UsageMetadata {
        prompt_token_count: Some(usage.input_tokens as u32),
        candidates_token_count: Some(usage.output_tokens as u32),
        thoughts_token_count: None,
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
