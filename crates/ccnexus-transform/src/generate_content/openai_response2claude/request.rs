use ccnexus_protocol::claude::create_message::request::{
    BetaMessageParam as ClaudeMessageParam, BetaMessageParamContent as ClaudeMessageContent,
    BetaMessageParamRole as ClaudeMessageRole, BetaMetadata as ClaudeMetadata,
    BetaSystemParam as ClaudeSystemParam, BetaThinkingConfigParam as ClaudeThinkingConfigParam,
    BetaTool as ClaudeTool, BetaToolChoice as ClaudeToolChoice,
    BetaToolChoiceType as ClaudeToolChoiceType,
    CreateMessageHeaders as ClaudeCreateMessageHeaders,
    CreateMessageRequest as ClaudeCreateMessageRequest,
    CreateMessageRequestBody as ClaudeCreateMessageRequestBody,
};
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock as ClaudeContentBlock, BetaImageBlock as ClaudeImageBlock,
    BetaImageBlockType as ClaudeImageBlockType, BetaImageSource as ClaudeImageSource,
    BetaTextBlock as ClaudeTextBlock, BetaTextBlockType as ClaudeTextBlockType,
    BetaToolResultBlock as ClaudeToolResultBlock,
    BetaToolResultBlockType as ClaudeToolResultBlockType,
    BetaToolResultContent as ClaudeToolResultContent, BetaToolUseBlock as ClaudeToolUseBlock,
    BetaToolUseBlockType as ClaudeToolUseBlockType,
};
use ccnexus_protocol::openai::create_response::request::CreateResponseRequest as OpenAIResponseRequest;
use ccnexus_protocol::openai::create_response::types::{
    EasyInputMessage, EasyInputMessageContent, EasyInputMessageRole, FunctionCallOutputItemParam,
    FunctionTool, InputContent, InputItem, InputMessage, InputMessageRole, InputParam, Item,
    OutputMessage, OutputMessageContent, Tool, ToolChoiceOptions, ToolChoiceParam,
};

const DEFAULT_CLAUDE_MAX_TOKENS: u32 = 8192;

/// Convert an OpenAI responses request into a Claude create-message request.
pub fn transform_request(request: OpenAIResponseRequest) -> ClaudeCreateMessageRequest {
    let mut messages = Vec::new();
    let mut system_texts = Vec::new();

    if let Some(instructions) = request.body.instructions {
        push_system_text(&mut system_texts, instructions);
    }

    if let Some(input) = request.body.input {
        append_input_param(input, &mut messages, &mut system_texts);
    }

    let system = if system_texts.is_empty() {
        None
    } else {
        Some(ClaudeSystemParam::Text(system_texts.join("\n")))
    };

    let tools = request
        .body
        .tools
        .map(map_tools)
        .and_then(|tools| if tools.is_empty() { None } else { Some(tools) });

    let tool_choice = request.body.tool_choice.and_then(map_tool_choice);

    ClaudeCreateMessageRequest {
        headers: ClaudeCreateMessageHeaders::default(),
        body: ClaudeCreateMessageRequestBody {
            max_tokens: map_max_tokens(request.body.max_output_tokens),
            messages,
            model: request.body.model,
            metadata: map_metadata(request.body.metadata, request.body.user),
            stop_sequences: None,
            stream: request.body.stream,
            system,
            temperature: request.body.temperature,
            thinking: thinking_unsupported(),
            tool_choice,
            tools,
            top_k: None,
            top_p: request.body.top_p,
        },
    }
}

fn thinking_unsupported() -> Option<ClaudeThinkingConfigParam> {
    None
}

fn map_max_tokens(max_output_tokens: Option<i64>) -> u32 {
    let value = max_output_tokens.unwrap_or(0);
    if value <= 0 {
        DEFAULT_CLAUDE_MAX_TOKENS
    } else if value > u32::MAX as i64 {
        u32::MAX
    } else {
        value as u32
    }
}

fn map_metadata(
    metadata: Option<ccnexus_protocol::openai::create_response::types::Metadata>,
    user: Option<String>,
) -> Option<ClaudeMetadata> {
    let user_id = user.or_else(|| metadata.and_then(|meta| meta.get("user_id").cloned()));
    user_id.map(|user_id| ClaudeMetadata {
        user_id: Some(user_id),
    })
}

fn append_input_param(
    input: InputParam,
    messages: &mut Vec<ClaudeMessageParam>,
    system_texts: &mut Vec<String>,
) {
    match input {
        InputParam::Text(text) => {
            messages.push(ClaudeMessageParam {
                role: ClaudeMessageRole::User,
                content: ClaudeMessageContent::Text(text),
            });
        }
        InputParam::Items(items) => {
            for item in items {
                append_input_item(item, messages, system_texts);
            }
        }
    }
}

fn append_input_item(
    item: InputItem,
    messages: &mut Vec<ClaudeMessageParam>,
    system_texts: &mut Vec<String>,
) {
    match item {
        InputItem::EasyMessage(message) => {
            append_easy_message(message, messages, system_texts);
        }
        InputItem::Item(item) => match item {
            Item::InputMessage(message) => {
                append_input_message(message, messages, system_texts);
            }
            Item::OutputMessage(message) => {
                append_output_message(message, messages);
            }
            Item::Function(call) => {
                messages.push(ClaudeMessageParam {
                    role: ClaudeMessageRole::Assistant,
                    content: ClaudeMessageContent::Blocks(vec![ClaudeContentBlock::ToolUse(
                        ClaudeToolUseBlock {
                            id: call.call_id,
                            input: parse_tool_arguments(&call.arguments),
                            name: call.name,
                            r#type: ClaudeToolUseBlockType::ToolUse,
                        },
                    )]),
                });
            }
            Item::FunctionOutput(output) => {
                messages.push(ClaudeMessageParam {
                    role: ClaudeMessageRole::User,
                    content: ClaudeMessageContent::Blocks(vec![ClaudeContentBlock::ToolResult(
                        map_function_output(output),
                    )]),
                });
            }
            Item::Reasoning(_) => {}
        },
    }
}

fn map_function_output(output: FunctionCallOutputItemParam) -> ClaudeToolResultBlock {
    ClaudeToolResultBlock {
        tool_use_id: output.call_id,
        content: Some(ClaudeToolResultContent::Text(output.output)),
        is_error: None,
        r#type: ClaudeToolResultBlockType::ToolResult,
    }
}

fn parse_tool_arguments(arguments: &str) -> ccnexus_protocol::claude::create_message::types::JsonObject {
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Default::default(),
    }
}

fn append_easy_message(
    message: EasyInputMessage,
    messages: &mut Vec<ClaudeMessageParam>,
    system_texts: &mut Vec<String>,
) {
    match message.role {
        EasyInputMessageRole::User => {
            if let Some(content) = easy_message_content_to_message_content(message.content) {
                messages.push(ClaudeMessageParam {
                    role: ClaudeMessageRole::User,
                    content,
                });
            }
        }
        EasyInputMessageRole::Assistant => {
            if let Some(content) = easy_message_content_to_message_content(message.content) {
                messages.push(ClaudeMessageParam {
                    role: ClaudeMessageRole::Assistant,
                    content,
                });
            }
        }
        EasyInputMessageRole::System | EasyInputMessageRole::Developer => {
            if let Some(text) = easy_message_content_to_text(message.content) {
                push_system_text(system_texts, text);
            }
        }
    }
}

fn append_input_message(
    message: InputMessage,
    messages: &mut Vec<ClaudeMessageParam>,
    system_texts: &mut Vec<String>,
) {
    match message.role {
        InputMessageRole::User => {
            if let Some(content) = input_contents_to_message_content(&message.content) {
                messages.push(ClaudeMessageParam {
                    role: ClaudeMessageRole::User,
                    content,
                });
            }
        }
        InputMessageRole::System | InputMessageRole::Developer => {
            if let Some(text) = input_contents_to_text(&message.content) {
                push_system_text(system_texts, text);
            }
        }
    }
}

fn append_output_message(message: OutputMessage, messages: &mut Vec<ClaudeMessageParam>) {
    if let Some(content) = output_contents_to_message_content(&message.content) {
        messages.push(ClaudeMessageParam {
            role: ClaudeMessageRole::Assistant,
            content,
        });
    }
}

fn easy_message_content_to_message_content(
    content: EasyInputMessageContent,
) -> Option<ClaudeMessageContent> {
    match content {
        EasyInputMessageContent::Text(text) => Some(ClaudeMessageContent::Text(text)),
        EasyInputMessageContent::Parts(parts) => input_contents_to_message_content(&parts),
    }
}

fn easy_message_content_to_text(content: EasyInputMessageContent) -> Option<String> {
    match content {
        EasyInputMessageContent::Text(text) => Some(text),
        EasyInputMessageContent::Parts(parts) => input_contents_to_text(&parts),
    }
}

fn input_contents_to_text(contents: &[InputContent]) -> Option<String> {
    let texts: Vec<String> = contents
        .iter()
        .filter_map(|content| match content {
            InputContent::InputText(text) => Some(text.text.clone()),
            _ => None,
        })
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

fn input_contents_to_message_content(contents: &[InputContent]) -> Option<ClaudeMessageContent> {
    let mut blocks = Vec::new();
    for content in contents {
        if let Some(block) = map_input_content_to_block(content) {
            blocks.push(block);
        }
    }
    collapse_blocks(blocks)
}

fn output_contents_to_message_content(
    contents: &[OutputMessageContent],
) -> Option<ClaudeMessageContent> {
    let mut blocks = Vec::new();
    for content in contents {
        match content {
            OutputMessageContent::OutputText(text) => {
                push_text_block(&mut blocks, text.text.clone());
            }
            OutputMessageContent::Refusal(refusal) => {
                push_text_block(&mut blocks, refusal.refusal.clone());
            }
        }
    }
    collapse_blocks(blocks)
}

fn collapse_blocks(blocks: Vec<ClaudeContentBlock>) -> Option<ClaudeMessageContent> {
    if blocks.is_empty() {
        None
    } else if blocks.len() == 1 {
        if let ClaudeContentBlock::Text(text) = &blocks[0] {
            Some(ClaudeMessageContent::Text(text.text.clone()))
        } else {
            Some(ClaudeMessageContent::Blocks(blocks))
        }
    } else {
        Some(ClaudeMessageContent::Blocks(blocks))
    }
}

fn map_input_content_to_block(content: &InputContent) -> Option<ClaudeContentBlock> {
    match content {
        InputContent::InputText(text) => Some(ClaudeContentBlock::Text(ClaudeTextBlock {
            text: text.text.clone(),
            r#type: ClaudeTextBlockType::Text,
        })),
        InputContent::InputImage(image) => {
            let url = image.image_url.clone()?;
            Some(ClaudeContentBlock::Image(ClaudeImageBlock {
                source: ClaudeImageSource::Url { url },
                r#type: ClaudeImageBlockType::Image,
            }))
        }
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

fn push_system_text(system_texts: &mut Vec<String>, text: String) {
    if !text.is_empty() {
        system_texts.push(text);
    }
}

fn map_tools(tools: Vec<Tool>) -> Vec<ClaudeTool> {
    tools
        .into_iter()
        .map(|tool| match tool {
            Tool::Function(function) => map_function_tool(function),
        })
        .collect()
}

fn map_function_tool(function: FunctionTool) -> ClaudeTool {
    ClaudeTool {
        name: function.name,
        description: function.description,
        input_schema: function
            .parameters
            .unwrap_or_else(|| serde_json::json!({ "type": "object" })),
    }
}

fn map_tool_choice(choice: ToolChoiceParam) -> Option<ClaudeToolChoice> {
    match choice {
        ToolChoiceParam::Mode(mode) => Some(ClaudeToolChoice {
            r#type: match mode {
                ToolChoiceOptions::None => ClaudeToolChoiceType::None,
                ToolChoiceOptions::Auto => ClaudeToolChoiceType::Auto,
                ToolChoiceOptions::Required => ClaudeToolChoiceType::Any,
            },
            name: None,
        }),
        ToolChoiceParam::Function(function) => Some(ClaudeToolChoice {
            r#type: ClaudeToolChoiceType::Tool,
            name: Some(function.name),
        }),
    }
}
