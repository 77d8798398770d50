use ccnexus_protocol::claude::create_message::request::CreateMessageRequest as ClaudeCreateMessageRequest;
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock as ClaudeContentBlock, BetaImageMediaType as ClaudeImageMediaType,
    BetaImageSource as ClaudeImageSource, BetaToolResultContent as ClaudeToolResultContent,
};
use ccnexus_protocol::claude::create_message::{
    BetaMessageParam as ClaudeMessageParam, BetaMessageParamContent as ClaudeMessageContent,
    BetaMessageParamRole as ClaudeMessageRole, BetaMetadata, BetaSystemParam as ClaudeSystemParam,
    BetaTool as ClaudeTool, BetaToolChoice as ClaudeToolChoice, BetaToolChoiceType,
};
use ccnexus_protocol::openai::create_chat_completions::request::{
    CreateChatCompletionRequest as OpenAIChatCompletionRequest,
    CreateChatCompletionRequestBody as OpenAIChatCompletionRequestBody, StopConfiguration,
};
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionImageUrl, ChatCompletionMessageToolCall, ChatCompletionMessageToolCallFunction,
    ChatCompletionNamedToolChoice, ChatCompletionNamedToolChoiceFunction,
    ChatCompletionNamedToolChoiceType, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestToolMessage, ChatCompletionRequestUserMessage,
    ChatCompletionToolChoiceMode, ChatCompletionToolChoiceOption, ChatCompletionToolDefinition,
    ChatCompletionUserContent, ChatCompletionUserContentPart, FunctionObject, Metadata,
};

pub fn transform_request(request: ClaudeCreateMessageRequest) -> OpenAIChatCompletionRequest {
    let model = request.body.model.clone();

    let mut messages = Vec::new();
    if let Some(system) = map_system_message(request.body.system) {
        messages.push(system);
    }

    for message in &request.body.messages {
        messages.extend(map_message(message));
    }

    let tools = map_tools(request.body.tools);
    let (tool_choice, parallel_tool_calls) = map_tool_choice(request.body.tool_choice);
    let stop = map_stop_sequences(request.body.stop_sequences);

    OpenAIChatCompletionRequest {
        body: OpenAIChatCompletionRequestBody {
            messages,
            model,
            max_completion_tokens: Some(request.body.max_tokens as i64),
            response_format: None,
            stream: request.body.stream,
            stop,
            max_tokens: None,
            seed: None,
            tools,
            tool_choice,
            parallel_tool_calls,
            metadata: request.body.metadata.and_then(map_metadata),
            temperature: request.body.temperature,
            top_p: request.body.top_p,
            user: None,
        },
    }
}

fn map_system_message(system: Option<ClaudeSystemParam>) -> Option<ChatCompletionRequestMessage> {
    let text = match system {
        Some(ClaudeSystemParam::Text(text)) => Some(text),
        Some(ClaudeSystemParam::Blocks(blocks)) => {
            let texts: Vec<String> = blocks
                .into_iter()
                .filter_map(|block| match block {
                    ClaudeContentBlock::Text(text_block) => Some(text_block.text),
                    _ => None,
                })
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        None => None,
    }?;

    Some(ChatCompletionRequestMessage::System(
        ChatCompletionRequestSystemMessage {
            content: text,
            name: None,
        },
    ))
}

fn map_message(message: &ClaudeMessageParam) -> Vec<ChatCompletionRequestMessage> {
    match message.role {
        ClaudeMessageRole::User => map_user_message(&message.content),
        ClaudeMessageRole::Assistant => map_assistant_message(&message.content),
    }
}

fn map_user_message(content: &ClaudeMessageContent) -> Vec<ChatCompletionRequestMessage> {
    let mut output = Vec::new();
    let mut user_parts: Vec<ChatCompletionUserContentPart> = Vec::new();

    match content {
        ClaudeMessageContent::Text(text) => {
            push_user_text(&mut user_parts, text.clone());
        }
        ClaudeMessageContent::Blocks(blocks) => {
            for block in blocks {
                match block {
                    ClaudeContentBlock::ToolResult(result) => {
                        flush_user_parts(&mut output, &mut user_parts);
                        if let Some(tool_message) = map_tool_result_message(result) {
                            output.push(tool_message);
                        }
                    }
                    ClaudeContentBlock::Text(text) => {
                        push_user_text(&mut user_parts, text.text.clone());
                    }
                    ClaudeContentBlock::Image(image) => {
                        if let Some(part) = map_image_part(&image.source) {
                            user_parts.push(part);
                        }
                    }
                    ClaudeContentBlock::Thinking(_) | ClaudeContentBlock::ToolUse(_) => {}
                }
            }
        }
    }

    flush_user_parts(&mut output, &mut user_parts);
    output
}

fn map_assistant_message(content: &ClaudeMessageContent) -> Vec<ChatCompletionRequestMessage> {
    let mut tool_calls = Vec::new();
    let mut text_parts = Vec::new();

    match content {
        ClaudeMessageContent::Text(text) => {
            if !text.is_empty() {
                text_parts.push(text.clone());
            }
        }
        ClaudeMessageContent::Blocks(blocks) => {
            for block in blocks {
                match block {
                    ClaudeContentBlock::Text(text) => {
                        if !text.text.is_empty() {
                            text_parts.push(text.text.clone());
                        }
                    }
                    ClaudeContentBlock::ToolUse(tool) => {
                        tool_calls.push(map_tool_use(tool));
                    }
                    ClaudeContentBlock::Thinking(_)
                    | ClaudeContentBlock::Image(_)
                    | ClaudeContentBlock::ToolResult(_) => {}
                }
            }
        }
    }

    let content = if text_parts.is_empty() {
        None
    } else {
        Some(text_parts.join("\n"))
    };

    let tool_calls = if tool_calls.is_empty() {
        None
    } else {
        Some(tool_calls)
    };

    vec![ChatCompletionRequestMessage::Assistant(
        ChatCompletionRequestAssistantMessage {
            content,
            name: None,
            tool_calls,
        },
    )]
}

fn push_user_text(parts: &mut Vec<ChatCompletionUserContentPart>, text: String) {
    if !text.is_empty() {
        parts.push(ChatCompletionUserContentPart::Text { text });
    }
}

fn flush_user_parts(
    output: &mut Vec<ChatCompletionRequestMessage>,
    parts: &mut Vec<ChatCompletionUserContentPart>,
) {
    if parts.is_empty() {
        return;
    }

    let content = if parts.len() == 1 {
        match &parts[0] {
            ChatCompletionUserContentPart::Text { text } => {
                ChatCompletionUserContent::Text(text.clone())
            }
            _ => ChatCompletionUserContent::Parts(parts.clone()),
        }
    } else {
        ChatCompletionUserContent::Parts(parts.clone())
    };

    output.push(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessage {
            content,
            name: None,
        },
    ));
    parts.clear();
}

fn map_image_part(source: &ClaudeImageSource) -> Option<ChatCompletionUserContentPart> {
    let url = match source {
        ClaudeImageSource::Url { url } => url.clone(),
        ClaudeImageSource::Base64 { data, media_type } => {
            let mime = map_image_media_type(media_type);
            format!("data:{};base64,{}", mime, data)
        }
    };

    Some(ChatCompletionUserContentPart::ImageUrl {
        image_url: ChatCompletionImageUrl { url, detail: None },
    })
}

fn map_image_media_type(media_type: &ClaudeImageMediaType) -> &'static str {
    match media_type {
        ClaudeImageMediaType::Jpeg => "image/jpeg",
        ClaudeImageMediaType::Png => "image/png",
        ClaudeImageMediaType::Gif => "image/gif",
        ClaudeImageMediaType::Webp => "image/webp",
    }
}

fn map_tool_result_message(result: &ccnexus_protocol::claude::create_message::types::BetaToolResultBlock) -> Option<ChatCompletionRequestMessage> {
    let content = map_tool_result_content(result.content.as_ref())?;
    Some(ChatCompletionRequestMessage::Tool(
        ChatCompletionRequestToolMessage {
            content,
            tool_call_id: result.tool_use_id.clone(),
        },
    ))
}

fn map_tool_result_content(content: Option<&ClaudeToolResultContent>) -> Option<String> {
    let text = match content {
        Some(ClaudeToolResultContent::Text(text)) => text.clone(),
        Some(ClaudeToolResultContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|block| match block {
                ClaudeContentBlock::Text(text_block) => Some(text_block.text.clone()),
                _ => None,
            })
            .collect::<Vec<String>>()
            .join("\n"),
        None => String::new(),
    };

    if text.is_empty() { None } else { Some(text) }
}

fn map_tool_use(tool: &ccnexus_protocol::claude::create_message::types::BetaToolUseBlock) -> ChatCompletionMessageToolCall {
    let arguments = serde_json::to_string(&tool.input).unwrap_or_else(|_| "{}".to_string());
    ChatCompletionMessageToolCall {
        id: tool.id.clone(),
        r#type: ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionToolCallType::Function,
        function: ChatCompletionMessageToolCallFunction {
            name: tool.name.clone(),
            arguments,
        },
    }
}

fn map_tools(tools: Option<Vec<ClaudeTool>>) -> Option<Vec<ChatCompletionToolDefinition>> {
    let tools = tools?;
    if tools.is_empty() {
        return None;
    }

    Some(
        tools
            .into_iter()
            .map(|tool| ChatCompletionToolDefinition::Function {
                function: FunctionObject {
                    name: tool.name,
                    description: tool.description,
                    parameters: Some(tool.input_schema),
                    strict: None,
                },
            })
            .collect(),
    )
}

fn map_tool_choice(choice: Option<ClaudeToolChoice>) -> (Option<ChatCompletionToolChoiceOption>, Option<bool>) {
    let choice = match choice {
        Some(choice) => choice,
        None => return (None, None),
    };

    match choice.r#type {
        BetaToolChoiceType::Auto => (
            Some(ChatCompletionToolChoiceOption::Mode(ChatCompletionToolChoiceMode::Auto)),
            None,
        ),
        BetaToolChoiceType::Any => (
            Some(ChatCompletionToolChoiceOption::Mode(ChatCompletionToolChoiceMode::Required)),
            None,
        ),
        BetaToolChoiceType::Tool => (
            choice.name.map(|name| {
                ChatCompletionToolChoiceOption::NamedTool(ChatCompletionNamedToolChoice {
                    r#type: ChatCompletionNamedToolChoiceType::Function,
                    function: ChatCompletionNamedToolChoiceFunction { name },
                })
            }),
            None,
        ),
        BetaToolChoiceType::None => (
            Some(ChatCompletionToolChoiceOption::Mode(ChatCompletionToolChoiceMode::None)),
            None,
        ),
    }
}

fn map_stop_sequences(stop_sequences: Option<Vec<String>>) -> Option<StopConfiguration> {
    let sequences = stop_sequences?;
    if sequences.is_empty() {
        None
    } else if sequences.len() == 1 {
        Some(StopConfiguration::Single(sequences[0].clone()))
    } else {
        Some(StopConfiguration::Many(sequences))
    }
}

fn map_metadata(metadata: BetaMetadata) -> Option<Metadata> {
    let mut map = Metadata::new();
    if let Some(user_id) = metadata.user_id {
        map.insert("user_id".to_string(), user_id);
    }
    if map.is_empty() { None } else { Some(map) }
}
