use ccnexus_protocol::claude::create_message::request::CreateMessageRequest as ClaudeCreateMessageRequest;
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock as ClaudeContentBlock, BetaImageSource as ClaudeImageSource,
};
use ccnexus_protocol::claude::create_message::{
    BetaMessageParam as ClaudeMessageParam, BetaMessageParamContent as ClaudeMessageContent,
    BetaMessageParamRole as ClaudeMessageRole, BetaMetadata, BetaSystemParam as ClaudeSystemParam,
    BetaTool as ClaudeTool, BetaToolChoice as ClaudeToolChoice, BetaToolChoiceType,
};
use ccnexus_protocol::openai::create_response::request::{
    CreateResponseRequest as OpenAIResponseRequest,
    CreateResponseRequestBody as OpenAIResponseRequestBody,
};
use ccnexus_protocol::openai::create_response::types::{
    EasyInputMessage, EasyInputMessageContent, EasyInputMessageRole, EasyInputMessageType,
    FunctionTool, InputContent, InputImageContent, InputItem, InputMessage, InputMessageRole,
    InputParam, InputTextContent, Instructions, Item, Metadata, Tool, ToolChoiceFunction,
    ToolChoiceFunctionType, ToolChoiceOptions, ToolChoiceParam,
};

pub fn transform_request(request: ClaudeCreateMessageRequest) -> OpenAIResponseRequest {
    let model = request.body.model.clone();

    let input = map_messages_to_input(&request.body.messages);
    let instructions = map_system_to_instructions(request.body.system);

    let tools = map_tools(request.body.tools);
    let (tool_choice, parallel_tool_calls) = map_tool_choice(request.body.tool_choice);

    OpenAIResponseRequest {
        body: OpenAIResponseRequestBody {
            model,
            input,
            parallel_tool_calls,
            instructions,
            stream: request.body.stream,
            max_output_tokens: Some(request.body.max_tokens as i64),
            text: None,
            tools,
            tool_choice,
            metadata: map_metadata(request.body.metadata),
            temperature: request.body.temperature,
            top_p: request.body.top_p,
            user: None,
        },
    }
}

fn map_system_to_instructions(system: Option<ClaudeSystemParam>) -> Option<Instructions> {
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

    Some(Instructions::Text(text))
}

fn map_messages_to_input(messages: &[ClaudeMessageParam]) -> Option<InputParam> {
    let items: Vec<InputItem> = messages.iter().filter_map(map_message_to_item).collect();
    if items.is_empty() {
        None
    } else {
        Some(InputParam::Items(items))
    }
}

fn map_message_to_item(message: &ClaudeMessageParam) -> Option<InputItem> {
    match message.role {
        ClaudeMessageRole::User => map_message_as_input(message, InputMessageRole::User)
            .map(|msg| InputItem::Item(Item::InputMessage(msg))),
        ClaudeMessageRole::Assistant => {
            let content = map_message_content_to_easy_content(&message.content)?;
            Some(InputItem::EasyMessage(EasyInputMessage {
                r#type: EasyInputMessageType::Message,
                role: EasyInputMessageRole::Assistant,
                content,
            }))
        }
    }
}

fn map_message_as_input(message: &ClaudeMessageParam, role: InputMessageRole) -> Option<InputMessage> {
    let content = map_message_content_to_input_contents(&message.content);
    if content.is_empty() {
        None
    } else {
        Some(InputMessage {
            r#type: None,
            role,
            content,
        })
    }
}

fn map_message_content_to_easy_content(content: &ClaudeMessageContent) -> Option<EasyInputMessageContent> {
    match content {
        ClaudeMessageContent::Text(text) => Some(EasyInputMessageContent::Text(text.clone())),
        ClaudeMessageContent::Blocks(blocks) => {
            let parts: Vec<InputContent> = blocks.iter().filter_map(map_block_to_input_content).collect();
            if parts.is_empty() {
                None
            } else {
                Some(EasyInputMessageContent::Parts(parts))
            }
        }
    }
}

fn map_message_content_to_input_contents(content: &ClaudeMessageContent) -> Vec<InputContent> {
    match content {
        ClaudeMessageContent::Text(text) => vec![InputContent::InputText(InputTextContent {
            text: text.clone(),
        })],
        ClaudeMessageContent::Blocks(blocks) => {
            blocks.iter().filter_map(map_block_to_input_content).collect()
        }
    }
}

fn map_block_to_input_content(block: &ClaudeContentBlock) -> Option<InputContent> {
    match block {
        ClaudeContentBlock::Text(text_block) => Some(InputContent::InputText(InputTextContent {
            text: text_block.text.clone(),
        })),
        ClaudeContentBlock::Image(image_block) => match &image_block.source {
            ClaudeImageSource::Url { url } => Some(InputContent::InputImage(InputImageContent {
                image_url: Some(url.clone()),
            })),
            ClaudeImageSource::Base64 { data, media_type } => {
                Some(InputContent::InputImage(InputImageContent {
                    image_url: Some(format!("data:{};base64,{}", map_image_media_type(media_type), data)),
                }))
            }
        },
        ClaudeContentBlock::Thinking(_) | ClaudeContentBlock::ToolUse(_) | ClaudeContentBlock::ToolResult(_) => None,
    }
}

fn map_image_media_type(media_type: &ccnexus_protocol::claude::create_message::types::BetaImageMediaType) -> &'static str {
    use ccnexus_protocol::claude::create_message::types::BetaImageMediaType;
    match media_type {
        BetaImageMediaType::Jpeg => "image/jpeg",
        BetaImageMediaType::Png => "image/png",
        BetaImageMediaType::Gif => "image/gif",
        BetaImageMediaType::Webp => "image/webp",
    }
}

fn map_tools(tools: Option<Vec<ClaudeTool>>) -> Option<Vec<Tool>> {
    let tools = tools?;
    if tools.is_empty() {
        return None;
    }

    Some(
        tools
            .into_iter()
            .map(|tool| {
                Tool::Function(FunctionTool {
                    name: tool.name,
                    description: tool.description,
                    parameters: Some(tool.input_schema),
                    strict: None,
                })
            })
            .collect(),
    )
}

fn map_tool_choice(choice: Option<ClaudeToolChoice>) -> (Option<ToolChoiceParam>, Option<bool>) {
    let choice = match choice {
        Some(choice) => choice,
        None => return (None, None),
    };

    match choice.r#type {
        BetaToolChoiceType::Auto => (Some(ToolChoiceParam::Mode(ToolChoiceOptions::Auto)), None),
        BetaToolChoiceType::Any => (Some(ToolChoiceParam::Mode(ToolChoiceOptions::Required)), None),
        BetaToolChoiceType::Tool => (
            choice.name.map(|name| {
                ToolChoiceParam::Function(ToolChoiceFunction {
                    r#type: ToolChoiceFunctionType::Function,
                    name,
                })
            }),
            None,
        ),
        BetaToolChoiceType::None => (Some(ToolChoiceParam::Mode(ToolChoiceOptions::None)), None),
    }
}

fn map_metadata(metadata: Option<BetaMetadata>) -> Option<Metadata> {
    let metadata = metadata?;
    let mut map = Metadata::new();
    if let Some(user_id) = metadata.user_id {
        map.insert("user_id".to_string(), user_id);
    }
    if map.is_empty() { None } else { Some(map) }
}
