use ccnexus_protocol::gemini::generate_content::request::GenerateContentRequest as GeminiGenerateContentRequest;
use ccnexus_protocol::gemini::generate_content::types::{
    FunctionCallingMode, FunctionDeclaration, GenerationConfig, Tool as GeminiTool, ToolConfig,
};
use ccnexus_protocol::gemini::types::{
    Blob as GeminiBlob, Content as GeminiContent, FunctionResponse as GeminiFunctionResponse,
    Part as GeminiPart, Role as GeminiRole,
};
use ccnexus_protocol::openai::create_chat_completions::request::{
    CreateChatCompletionRequest, CreateChatCompletionRequestBody, StopConfiguration,
};
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionImageUrl, ChatCompletionMessageToolCall, ChatCompletionMessageToolCallFunction,
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestToolMessage,
    ChatCompletionRequestUserMessage, ChatCompletionResponseFormat, ChatCompletionToolCallType,
    ChatCompletionToolChoiceMode, ChatCompletionToolChoiceOption, ChatCompletionToolDefinition,
    ChatCompletionUserContent, ChatCompletionUserContentPart, FunctionObject,
};
use serde::Serialize;

pub fn transform_request(request: GeminiGenerateContentRequest) -> CreateChatCompletionRequest {
    let model = request
        .path
        .model
        .strip_prefix("models/")
        .unwrap_or(&request.path.model)
        .to_string();

    let mut messages = Vec::new();
    let mut tool_call_index = 0usize;

    if let Some(system_instruction) = request.body.system_instruction
        && let Some(message) = map_system_instruction(system_instruction)
    {
        messages.push(message);
    }

    for content in request.body.contents {
        messages.extend(map_content_to_messages(content, &mut tool_call_index));
    }

    let tools = map_tools(request.body.tools);
    let tool_choice = map_tool_choice(request.body.tool_config.as_ref());

    let generation_config = request.body.generation_config.as_ref();
    let response_format = map_response_format(generation_config);
    let stop = map_stop_sequences(generation_config);

    CreateChatCompletionRequest {
        body: CreateChatCompletionRequestBody {
            messages,
            model,
            max_completion_tokens: generation_config
                .and_then(|config| config.max_output_tokens.map(|v| v as i64)),
            response_format,
            stream: None,
            stop,
            max_tokens: None,
            seed: None,
            tools,
            tool_choice,
            parallel_tool_calls: None,
            metadata: None,
            temperature: generation_config.and_then(|config| config.temperature),
            top_p: generation_config.and_then(|config| config.top_p),
            user: None,
        },
    }
}

fn map_system_instruction(system: GeminiContent) -> Option<ChatCompletionRequestMessage> {
    let texts: Vec<String> = system
        .parts
        .iter()
        .filter_map(|part| part.text.clone())
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage {
                content: texts.join("\n"),
                name: None,
            },
        ))
    }
}

fn map_content_to_messages(
    content: GeminiContent,
    tool_call_index: &mut usize,
) -> Vec<ChatCompletionRequestMessage> {
    match content.role {
        Some(GeminiRole::Model) => map_model_content_to_messages(content, tool_call_index),
        _ => map_user_content_to_messages(content, tool_call_index),
    }
}

fn map_user_content_to_messages(
    content: GeminiContent,
    tool_call_index: &mut usize,
) -> Vec<ChatCompletionRequestMessage> {
    let mut messages = Vec::new();
    let (user_content, tool_responses) = map_parts_for_user(&content.parts, tool_call_index);

    if let Some(user_content) = user_content {
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: user_content,
                name: None,
            },
        ));
    }

    for tool_response in tool_responses {
        messages.push(ChatCompletionRequestMessage::Tool(tool_response));
    }

    messages
}

fn map_model_content_to_messages(
    content: GeminiContent,
    tool_call_index: &mut usize,
) -> Vec<ChatCompletionRequestMessage> {
    let mut messages = Vec::new();
    let (text, tool_calls) = map_parts_for_assistant(&content.parts, tool_call_index);

    if text.is_some() || !tool_calls.is_empty() {
        messages.push(ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessage {
                content: text,
                name: None,
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
            },
        ));
    }

    messages
}

fn map_parts_for_user(
    parts: &[GeminiPart],
    tool_call_index: &mut usize,
) -> (
    Option<ChatCompletionUserContent>,
    Vec<ChatCompletionRequestToolMessage>,
) {
    let mut user_parts = Vec::new();
    let mut tool_responses = Vec::new();

    for part in parts {
        if let Some(text) = part.text.clone()
            && !text.is_empty()
        {
            user_parts.push(ChatCompletionUserContentPart::Text { text });
        }

        if let Some(blob) = &part.inline_data {
            user_parts.push(map_inline_blob_to_user_part(blob));
        }

        if let Some(response) = &part.function_response
            && let Some(tool_message) =
                map_function_response_to_tool_message(response, tool_call_index)
        {
            tool_responses.push(tool_message);
        }

        if let Some(function_call) = &part.function_call {
            // Gemini function calls in user content have no direct Chat Completions input equivalent.
            push_user_json_text(&mut user_parts, "function_call", function_call);
        }
    }

    let user_content = if user_parts.is_empty() {
        None
    } else if let [ChatCompletionUserContentPart::Text { text }] = user_parts.as_slice() {
        Some(ChatCompletionUserContent::Text(text.clone()))
    } else {
        Some(ChatCompletionUserContent::Parts(user_parts))
    };

    (user_content, tool_responses)
}

fn map_parts_for_assistant(
    parts: &[GeminiPart],
    tool_call_index: &mut usize,
) -> (Option<String>, Vec<ChatCompletionMessageToolCall>) {
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for part in parts {
        if let Some(text) = part.text.clone()
            && !text.is_empty()
        {
            texts.push(text);
        }

        if let Some(function_call) = &part.function_call {
            let id = function_call
                .id
                .clone()
                .unwrap_or_else(|| next_tool_call_id(tool_call_index));
            let arguments =
                serde_json::to_string(&function_call.args).unwrap_or_else(|_| "{}".to_string());
            tool_calls.push(ChatCompletionMessageToolCall {
                id,
                r#type: ChatCompletionToolCallType::Function,
                function: ChatCompletionMessageToolCallFunction {
                    name: function_call.name.clone(),
                    arguments,
                },
            });
        }

        if let Some(function_response) = &part.function_response {
            // Assistant-side tool responses are not representable; serialize to text.
            push_assistant_json_text(&mut texts, "function_response", function_response);
        }

        if part.inline_data.is_some() {
            texts.push("[inline_data]".to_string());
        }
    }

    let content = if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    };

    (content, tool_calls)
}

fn map_inline_blob_to_user_part(blob: &GeminiBlob) -> ChatCompletionUserContentPart {
    let url = format!("data:{};base64,{}", blob.mime_type, blob.data);
    ChatCompletionUserContentPart::ImageUrl {
        image_url: ChatCompletionImageUrl { url, detail: None },
    }
}

fn map_function_response_to_tool_message(
    response: &GeminiFunctionResponse,
    tool_call_index: &mut usize,
) -> Option<ChatCompletionRequestToolMessage> {
    let tool_call_id = response
        .id
        .clone()
        .unwrap_or_else(|| next_tool_call_id(tool_call_index));
    let response_text = serde_json::to_string(response).unwrap_or_default();
    if response_text.is_empty() {
        return None;
    }

    Some(ChatCompletionRequestToolMessage {
        content: response_text,
        tool_call_id,
    })
}

fn push_user_json_text<T: Serialize>(parts: &mut Vec<ChatCompletionUserContentPart>, label: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        parts.push(ChatCompletionUserContentPart::Text {
            text: format!("[{}] {}", label, json),
        });
    }
}

fn push_assistant_json_text<T: Serialize>(texts: &mut Vec<String>, label: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        texts.push(format!("[{}] {}", label, json));
    }
}

fn next_tool_call_id(counter: &mut usize) -> String {
    let id = format!("tool_call_{}", counter);
    *counter += 1;
    id
}

fn map_tools(tools: Option<Vec<GeminiTool>>) -> Option<Vec<ChatCompletionToolDefinition>> {
    let tools = tools?;

    let output: Vec<ChatCompletionToolDefinition> = tools
        .into_iter()
        .filter_map(|tool| tool.function_declarations)
        .flatten()
        .map(|function| ChatCompletionToolDefinition::Function {
            function: map_function_tool(function),
        })
        .collect();

    if output.is_empty() { None } else { Some(output) }
}

fn map_function_tool(function: FunctionDeclaration) -> FunctionObject {
    let parameters = function
        .parameters
        .map(|schema| serde_json::to_value(schema).unwrap_or_default());

    FunctionObject {
        name: function.name,
        description: Some(function.description),
        parameters,
        strict: None,
    }
}

fn map_tool_choice(tool_config: Option<&ToolConfig>) -> Option<ChatCompletionToolChoiceOption> {
    let config = tool_config.and_then(|config| config.function_calling_config.as_ref())?;
    let mode = config.mode.unwrap_or(FunctionCallingMode::ModeUnspecified);

    match mode {
        FunctionCallingMode::None => Some(ChatCompletionToolChoiceOption::Mode(
            ChatCompletionToolChoiceMode::None,
        )),
        FunctionCallingMode::Auto | FunctionCallingMode::ModeUnspecified => Some(
            ChatCompletionToolChoiceOption::Mode(ChatCompletionToolChoiceMode::Auto),
        ),
        FunctionCallingMode::Any => Some(ChatCompletionToolChoiceOption::Mode(
            ChatCompletionToolChoiceMode::Required,
        )),
    }
}

fn map_response_format(config: Option<&GenerationConfig>) -> Option<ChatCompletionResponseFormat> {
    let _ = config;
    None
}

fn map_stop_sequences(config: Option<&GenerationConfig>) -> Option<StopConfiguration> {
    let sequences = config.and_then(|config| config.stop_sequences.clone())?;
    if sequences.is_empty() {
        None
    } else if sequences.len() == 1 {
        Some(StopConfiguration::Single(sequences[0].clone()))
    } else {
        Some(StopConfiguration::Many(sequences))
    }
}
