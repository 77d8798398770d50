use ccnexus_protocol::gemini::generate_content::request::{
    GenerateContentPath as GeminiGenerateContentPath,
    GenerateContentRequest as GeminiGenerateContentRequest,
    GenerateContentRequestBody as GeminiGenerateContentRequestBody,
};
use ccnexus_protocol::gemini::generate_content::types::{
    FunctionCallingConfig, FunctionCallingMode, FunctionDeclaration, GenerationConfig,
    Tool as GeminiTool, ToolConfig,
};
use ccnexus_protocol::gemini::types::{
    Blob as GeminiBlob, Content as GeminiContent, FunctionCall as GeminiFunctionCall,
    FunctionResponse as GeminiFunctionResponse, Part as GeminiPart, Role as GeminiRole,
};
use ccnexus_protocol::openai::create_chat_completions::request::{
    CreateChatCompletionRequest, StopConfiguration,
};
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionImageUrl, ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestMessage, ChatCompletionRequestToolMessage,
    ChatCompletionRequestUserMessage, ChatCompletionToolChoiceMode, ChatCompletionToolChoiceOption,
    ChatCompletionToolDefinition, ChatCompletionUserContent, ChatCompletionUserContentPart,
    FunctionObject,
};
use serde_json::Value as JsonValue;

/// Convert an OpenAI chat-completions request into a Gemini generate-content request.
pub fn transform_request(request: CreateChatCompletionRequest) -> GeminiGenerateContentRequest {
    let model = request.body.model.clone();

    let mut system_texts = Vec::new();
    let mut contents = Vec::new();

    for message in request.body.messages {
        match message {
            ChatCompletionRequestMessage::System(system) => {
                if !system.content.is_empty() {
                    system_texts.push(system.content);
                }
            }
            ChatCompletionRequestMessage::User(user) => {
                if let Some(content) = map_user_message(user) {
                    contents.push(content);
                }
            }
            ChatCompletionRequestMessage::Assistant(assistant) => {
                if let Some(content) = map_assistant_message(assistant) {
                    contents.push(content);
                }
            }
            ChatCompletionRequestMessage::Tool(tool) => {
                contents.push(map_tool_message(tool));
            }
        }
    }

    let system_instruction = if system_texts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            parts: vec![GeminiPart::text(system_texts.join("\n"))],
            role: None,
        })
    };

    let tools = map_tools(request.body.tools);
    let tool_config = map_tool_config(request.body.tool_choice);

    let generation_config = map_generation_config(
        request.body.max_completion_tokens,
        request.body.max_tokens,
        request.body.temperature,
        request.body.top_p,
        request.body.stop,
    );

    GeminiGenerateContentRequest {
        path: GeminiGenerateContentPath { model },
        body: GeminiGenerateContentRequestBody {
            contents,
            tools,
            tool_config,
            system_instruction,
            generation_config,
        },
    }
}

fn map_user_message(message: ChatCompletionRequestUserMessage) -> Option<GeminiContent> {
    let parts = map_user_content_to_parts(message.content);
    if parts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            parts,
            role: Some(GeminiRole::User),
        })
    }
}

fn map_assistant_message(message: ChatCompletionRequestAssistantMessage) -> Option<GeminiContent> {
    let mut parts = Vec::new();

    if let Some(content) = message.content
        && !content.is_empty()
    {
        parts.push(GeminiPart::text(content));
    }

    if let Some(tool_calls) = message.tool_calls {
        for call in tool_calls {
            parts.push(map_tool_call_to_part(call));
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            parts,
            role: Some(GeminiRole::Model),
        })
    }
}

fn map_tool_message(message: ChatCompletionRequestToolMessage) -> GeminiContent {
    let part = GeminiPart {
        function_response: Some(GeminiFunctionResponse {
            id: Some(message.tool_call_id.clone()),
            name: message.tool_call_id,
            response: JsonValue::String(message.content),
        }),
        ..Default::default()
    };
    GeminiContent {
        parts: vec![part],
        role: Some(GeminiRole::User),
    }
}

fn map_user_content_to_parts(content: ChatCompletionUserContent) -> Vec<GeminiPart> {
    let mut parts = Vec::new();
    match content {
        ChatCompletionUserContent::Text(text) => {
            if !text.is_empty() {
                parts.push(GeminiPart::text(text));
            }
        }
        ChatCompletionUserContent::Parts(items) => {
            for item in items {
                match item {
                    ChatCompletionUserContentPart::Text { text } => {
                        if !text.is_empty() {
                            parts.push(GeminiPart::text(text));
                        }
                    }
                    ChatCompletionUserContentPart::ImageUrl { image_url } => {
                        parts.push(map_image_url(image_url));
                    }
                }
            }
        }
    }
    parts
}

fn map_tool_call_to_part(call: ChatCompletionMessageToolCall) -> GeminiPart {
    let args_value = serde_json::from_str(&call.function.arguments)
        .unwrap_or_else(|_| JsonValue::String(call.function.arguments.clone()));
    let args = match args_value {
        JsonValue::Object(map) => map.into_iter().collect(),
        _ => Default::default(),
    };

    GeminiPart {
        function_call: Some(GeminiFunctionCall {
            id: Some(call.id),
            name: call.function.name,
            args,
        }),
        ..Default::default()
    }
}

fn map_image_url(image: ChatCompletionImageUrl) -> GeminiPart {
    if let Some((mime_type, data)) = parse_data_url(&image.url) {
        return GeminiPart {
            inline_data: Some(GeminiBlob { mime_type, data }),
            ..Default::default()
        };
    }

    GeminiPart::text(image.url)
}

fn map_tools(tools: Option<Vec<ChatCompletionToolDefinition>>) -> Option<Vec<GeminiTool>> {
    let tools = tools?;
    let function_declarations: Vec<FunctionDeclaration> = tools
        .into_iter()
        .map(|tool| match tool {
            ChatCompletionToolDefinition::Function { function } => {
                map_function_declaration(function)
            }
        })
        .collect();

    if function_declarations.is_empty() {
        None
    } else {
        Some(vec![GeminiTool {
            function_declarations: Some(function_declarations),
        }])
    }
}

fn map_function_declaration(function: FunctionObject) -> FunctionDeclaration {
    let parameters = function
        .parameters
        .and_then(|schema| serde_json::from_value(schema).ok());

    FunctionDeclaration {
        name: function.name,
        description: function.description.unwrap_or_default(),
        parameters,
    }
}

fn map_tool_config(tool_choice: Option<ChatCompletionToolChoiceOption>) -> Option<ToolConfig> {
    let config = map_tool_choice(tool_choice?)?;
    Some(ToolConfig {
        function_calling_config: Some(config),
    })
}

fn map_tool_choice(choice: ChatCompletionToolChoiceOption) -> Option<FunctionCallingConfig> {
    match choice {
        ChatCompletionToolChoiceOption::Mode(mode) => Some(FunctionCallingConfig {
            mode: Some(match mode {
                ChatCompletionToolChoiceMode::None => FunctionCallingMode::None,
                ChatCompletionToolChoiceMode::Auto => FunctionCallingMode::Auto,
                ChatCompletionToolChoiceMode::Required => FunctionCallingMode::Any,
            }),
            allowed_function_names: None,
        }),
        ChatCompletionToolChoiceOption::NamedTool(named) => Some(FunctionCallingConfig {
            mode: Some(FunctionCallingMode::Any),
            allowed_function_names: Some(vec![named.function.name]),
        }),
    }
}

fn map_generation_config(
    max_completion_tokens: Option<i64>,
    max_tokens: Option<i64>,
    temperature: Option<f64>,
    top_p: Option<f64>,
    stop: Option<StopConfiguration>,
) -> Option<GenerationConfig> {
    let max_output_tokens = max_completion_tokens
        .or(max_tokens)
        .map(|value| value.max(0) as u32);

    let stop_sequences = match stop {
        Some(StopConfiguration::Single(value)) => Some(vec![value]),
        Some(StopConfiguration::Many(values)) => Some(values),
        None => None,
    };

    if max_output_tokens.is_none()
        && temperature.is_none()
        && top_p.is_none()
        && stop_sequences.is_none()
    {
        return None;
    }

    Some(GenerationConfig {
        stop_sequences,
        candidate_count: None,
        max_output_tokens,
        temperature,
        top_p,
        top_k: None,
        thinking_config: None,
    })
}

fn parse_data_url(url: &str) -> Option<(String, String)> {
    let url = url.strip_prefix("data:")?;
    let (meta, data) = url.split_once(",")?;
    let (mime, encoding) = meta.split_once(";")?;
    if encoding != "base64" {
        return None;
    }
    Some((mime.to_string(), data.to_string()))
}
