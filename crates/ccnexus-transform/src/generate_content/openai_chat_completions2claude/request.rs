use ccnexus_protocol::claude::create_message::request::{
    BetaMessageParamContent as ClaudeMessageContent, BetaSystemParam as ClaudeSystemParam,
    BetaThinkingConfigParam as ClaudeThinkingConfigParam,
    BetaThinkingConfigType as ClaudeThinkingConfigType, BetaTool as ClaudeTool,
    BetaToolChoice as ClaudeToolChoice, BetaToolChoiceType as ClaudeToolChoiceType,
    CreateMessageHeaders as ClaudeCreateMessageHeaders,
    CreateMessageRequest as ClaudeCreateMessageRequest,
    CreateMessageRequestBody as ClaudeCreateMessageRequestBody,
};
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock as ClaudeContentBlock, BetaImageBlock as ClaudeImageBlock,
    BetaImageBlockType as ClaudeImageBlockType, BetaImageMediaType as ClaudeImageMediaType,
    BetaImageSource as ClaudeImageSource, BetaMessageParam as ClaudeMessageParam,
    BetaMessageParamRole as ClaudeMessageRole, BetaTextBlock as ClaudeTextBlock,
    BetaTextBlockType as ClaudeTextBlockType, BetaToolResultBlock as ClaudeToolResultBlock,
    BetaToolResultBlockType as ClaudeToolResultBlockType,
    BetaToolResultContent as ClaudeToolResultContent, BetaToolUseBlock as ClaudeToolUseBlock,
    BetaToolUseBlockType as ClaudeToolUseBlockType, JsonValue,
};
use ccnexus_protocol::openai::create_chat_completions::request::{
    CreateChatCompletionRequest as OpenAIChatCompletionRequest, StopConfiguration,
};
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionImageUrl, ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestMessage, ChatCompletionRequestToolMessage,
    ChatCompletionRequestUserMessage, ChatCompletionToolCallType, ChatCompletionToolChoiceMode,
    ChatCompletionToolChoiceOption, ChatCompletionToolDefinition, ChatCompletionUserContent,
    ChatCompletionUserContentPart, FunctionObject,
};

/// Convert an OpenAI chat-completions request into a Claude create-message request.
pub fn transform_request(request: OpenAIChatCompletionRequest) -> ClaudeCreateMessageRequest {
    let mut system_texts = Vec::new();
    let mut messages = Vec::new();

    for message in &request.body.messages {
        match message {
            ChatCompletionRequestMessage::System(system) => {
                if !system.content.is_empty() {
                    system_texts.push(system.content.clone());
                }
            }
            _ => {
                messages.extend(map_request_message(message));
            }
        }
    }

    let system = if system_texts.is_empty() {
        None
    } else {
        Some(ClaudeSystemParam::Text(system_texts.join("\n")))
    };

    let max_tokens = map_max_tokens(
        request.body.max_completion_tokens,
        request.body.max_tokens,
    );

    let tools = map_tools(request.body.tools);
    let tool_choice = map_tool_choice(request.body.tool_choice);
    let thinking = None;
    let stop_sequences = map_stop_sequences(request.body.stop.clone());

    ClaudeCreateMessageRequest {
        headers: ClaudeCreateMessageHeaders::default(),
        body: ClaudeCreateMessageRequestBody {
            max_tokens,
            messages,
            model: request.body.model.clone(),
            metadata: None,
            stop_sequences,
            stream: request.body.stream,
            system,
            temperature: map_temperature(request.body.temperature),
            thinking,
            tool_choice,
            tools,
            top_k: None,
            top_p: request.body.top_p,
        },
    }
}

fn map_request_message(message: &ChatCompletionRequestMessage) -> Vec<ClaudeMessageParam> {
    match message {
        ChatCompletionRequestMessage::User(user) => map_user_message(user),
        ChatCompletionRequestMessage::Assistant(assistant) => map_assistant_message(assistant),
        ChatCompletionRequestMessage::Tool(tool) => map_tool_message(tool),
        ChatCompletionRequestMessage::System(_) => Vec::new(),
    }
}

fn map_user_message(message: &ChatCompletionRequestUserMessage) -> Vec<ClaudeMessageParam> {
    let mut blocks = Vec::new();
    match &message.content {
        ChatCompletionUserContent::Text(text) => {
            push_text_block(&mut blocks, text.clone());
        }
        ChatCompletionUserContent::Parts(parts) => {
            for part in parts {
                match part {
                    ChatCompletionUserContentPart::Text { text } => {
                        push_text_block(&mut blocks, text.clone());
                    }
                    ChatCompletionUserContentPart::ImageUrl { image_url } => {
                        blocks.push(map_image_url(image_url));
                    }
                }
            }
        }
    }

    vec![ClaudeMessageParam {
        role: ClaudeMessageRole::User,
        content: collapse_blocks(blocks),
    }]
}

fn map_assistant_message(
    message: &ChatCompletionRequestAssistantMessage,
) -> Vec<ClaudeMessageParam> {
    let mut blocks = Vec::new();

    if let Some(content) = &message.content {
        push_text_block(&mut blocks, content.clone());
    }

    if let Some(tool_calls) = &message.tool_calls {
        for tool_call in tool_calls {
            blocks.push(map_tool_call(tool_call));
        }
    }

    vec![ClaudeMessageParam {
        role: ClaudeMessageRole::Assistant,
        content: collapse_blocks(blocks),
    }]
}

fn map_tool_message(message: &ChatCompletionRequestToolMessage) -> Vec<ClaudeMessageParam> {
    let block = ClaudeToolResultBlock {
        tool_use_id: message.tool_call_id.clone(),
        r#type: ClaudeToolResultBlockType::ToolResult,
        content: Some(ClaudeToolResultContent::Text(message.content.clone())),
        is_error: None,
    };

    vec![ClaudeMessageParam {
        role: ClaudeMessageRole::User,
        content: ClaudeMessageContent::Blocks(vec![ClaudeContentBlock::ToolResult(block)]),
    }]
}

fn collapse_blocks(blocks: Vec<ClaudeContentBlock>) -> ClaudeMessageContent {
    if let [ClaudeContentBlock::Text(text)] = blocks.as_slice() {
        ClaudeMessageContent::Text(text.text.clone())
    } else {
        ClaudeMessageContent::Blocks(blocks)
    }
}

fn map_image_url(image: &ChatCompletionImageUrl) -> ClaudeContentBlock {
    if let Some((mime, data)) = parse_data_url(&image.url)
        && let Some(media_type) = map_image_media_type(&mime)
    {
        return ClaudeContentBlock::Image(ClaudeImageBlock {
            source: ClaudeImageSource::Base64 { data, media_type },
            r#type: ClaudeImageBlockType::Image,
        });
    }
    // Unknown MIME type: fall back to URL source.

    ClaudeContentBlock::Image(ClaudeImageBlock {
        source: ClaudeImageSource::Url {
            url: image.url.clone(),
        },
        r#type: ClaudeImageBlockType::Image,
    })
}

fn map_tool_call(tool_call: &ChatCompletionMessageToolCall) -> ClaudeContentBlock {
    let input = parse_tool_arguments(&tool_call.function.arguments);

    ClaudeContentBlock::ToolUse(ClaudeToolUseBlock {
        id: tool_call.id.clone(),
        input,
        name: tool_call.function.name.clone(),
        r#type: ClaudeToolUseBlockType::ToolUse,
    })
}

fn parse_tool_arguments(arguments: &str) -> std::collections::BTreeMap<String, JsonValue> {
    match serde_json::from_str::<JsonValue>(arguments) {
        Ok(JsonValue::Object(map)) => map.into_iter().collect(),
        Ok(other) => {
            let mut map = std::collections::BTreeMap::new();
            map.insert("arguments".to_string(), other);
            map
        }
        Err(_) => {
            let mut map = std::collections::BTreeMap::new();
            map.insert(
                "arguments".to_string(),
                JsonValue::String(arguments.to_string()),
            );
            map
        }
    }
}

fn map_tools(tools: Option<Vec<ChatCompletionToolDefinition>>) -> Option<Vec<ClaudeTool>> {
    let tools = tools?;
    let output: Vec<ClaudeTool> = tools
        .into_iter()
        .map(|tool| match tool {
            ChatCompletionToolDefinition::Function { function } => map_function_tool(function),
        })
        .collect();

    if output.is_empty() { None } else { Some(output) }
}

fn map_function_tool(function: FunctionObject) -> ClaudeTool {
    ClaudeTool {
        name: function.name,
        description: function.description,
        input_schema: function
            .parameters
            .unwrap_or_else(|| serde_json::json!({"type": "object"})),
    }
}

fn map_tool_choice(choice: Option<ChatCompletionToolChoiceOption>) -> Option<ClaudeToolChoice> {
    match choice? {
        ChatCompletionToolChoiceOption::Mode(mode) => Some(match mode {
            ChatCompletionToolChoiceMode::None => ClaudeToolChoice {
                r#type: ClaudeToolChoiceType::None,
                name: None,
            },
            ChatCompletionToolChoiceMode::Auto => ClaudeToolChoice {
                r#type: ClaudeToolChoiceType::Auto,
                name: None,
            },
            ChatCompletionToolChoiceMode::Required => ClaudeToolChoice {
                r#type: ClaudeToolChoiceType::Any,
                name: None,
            },
        }),
        ChatCompletionToolChoiceOption::NamedTool(named) => Some(ClaudeToolChoice {
            r#type: ClaudeToolChoiceType::Tool,
            name: Some(named.function.name),
        }),
    }
}

fn map_stop_sequences(stop: Option<StopConfiguration>) -> Option<Vec<String>> {
    match stop {
        Some(StopConfiguration::Single(value)) => {
            let value = value.trim();
            if value.is_empty() {
                None
            } else {
                Some(vec![value.to_string()])
            }
        }
        Some(StopConfiguration::Many(values)) => {
            let values: Vec<String> = values
                .into_iter()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .collect();
            if values.is_empty() { None } else { Some(values) }
        }
        None => None,
    }
}

fn map_temperature(temperature: Option<f64>) -> Option<f64> {
    temperature.map(|value| value.clamp(0.0, 1.0))
}

fn map_max_tokens(max_completion_tokens: Option<i64>, max_tokens: Option<i64>) -> u32 {
    let value = max_completion_tokens.or(max_tokens).unwrap_or(0);
    if value <= 0 {
        0
    } else if value > u32::MAX as i64 {
        u32::MAX
    } else {
        value as u32
    }
}

fn push_text_block(blocks: &mut Vec<ClaudeContentBlock>, text: String) {
    if !text.is_empty() {
        blocks.push(ClaudeContentBlock::Text(ClaudeTextBlock {
            text,
            r#type: ClaudeTextBlockType::Text,
        }));
    }
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

fn map_image_media_type(mime: &str) -> Option<ClaudeImageMediaType> {
    match mime {
        "image/jpeg" => Some(ClaudeImageMediaType::Jpeg),
        "image/png" => Some(ClaudeImageMediaType::Png),
        "image/gif" => Some(ClaudeImageMediaType::Gif),
        "image/webp" => Some(ClaudeImageMediaType::Webp),
        _ => None,
    }
}
