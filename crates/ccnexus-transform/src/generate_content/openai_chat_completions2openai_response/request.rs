use ccnexus_protocol::openai::create_chat_completions::request::CreateChatCompletionRequest;
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionImageUrl, ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestMessage, ChatCompletionRequestToolMessage,
    ChatCompletionRequestUserMessage, ChatCompletionToolChoiceMode, ChatCompletionToolChoiceOption,
    ChatCompletionToolDefinition, ChatCompletionUserContent, ChatCompletionUserContentPart,
    FunctionObject,
};
use ccnexus_protocol::openai::create_response::request::{
    CreateResponseRequest, CreateResponseRequestBody,
};
use ccnexus_protocol::openai::create_response::types::{
    EasyInputMessage, EasyInputMessageContent, EasyInputMessageRole, EasyInputMessageType,
    FunctionCallOutputItemParam, FunctionCallOutputType, FunctionTool, FunctionToolCall,
    FunctionToolCallType, InputContent, InputImageContent, InputItem, InputParam,
    InputTextContent, Item, MessageStatus, ResponseTextParam, TextResponseFormatConfiguration,
    Tool, ToolChoiceFunction, ToolChoiceFunctionType, ToolChoiceOptions, ToolChoiceParam,
};

/// Convert an OpenAI chat-completions request into an OpenAI responses request.
pub fn transform_request(request: CreateChatCompletionRequest) -> CreateResponseRequest {
    let mut instruction_texts = Vec::new();
    let mut input_items = Vec::new();

    for message in request.body.messages {
        match message {
            ChatCompletionRequestMessage::System(system) => {
                if !system.content.is_empty() {
                    instruction_texts.push(system.content);
                }
            }
            ChatCompletionRequestMessage::User(user) => {
                input_items.push(map_user_message(user));
            }
            ChatCompletionRequestMessage::Assistant(assistant) => {
                input_items.extend(map_assistant_message(assistant));
            }
            ChatCompletionRequestMessage::Tool(tool) => {
                input_items.push(map_tool_message(tool));
            }
        }
    }

    let instructions = if instruction_texts.is_empty() {
        None
    } else {
        Some(instruction_texts.join("\n"))
    };

    let tools = map_tools(request.body.tools);
    let tool_choice = request.body.tool_choice.and_then(map_tool_choice);
    let text = map_response_text(request.body.response_format);
    let max_output_tokens = request.body.max_completion_tokens.or(request.body.max_tokens);

    CreateResponseRequest {
        body: CreateResponseRequestBody {
            model: request.body.model,
            input: Some(InputParam::Items(input_items)),
            parallel_tool_calls: request.body.parallel_tool_calls,
            instructions,
            stream: request.body.stream,
            max_output_tokens,
            text,
            tools,
            tool_choice,
            metadata: request.body.metadata,
            temperature: request.body.temperature,
            top_p: request.body.top_p,
            user: request.body.user,
        },
    }
}

fn map_user_message(message: ChatCompletionRequestUserMessage) -> InputItem {
    InputItem::EasyMessage(EasyInputMessage {
        r#type: EasyInputMessageType::Message,
        role: EasyInputMessageRole::User,
        content: map_user_content(message.content),
    })
}

fn map_user_content(content: ChatCompletionUserContent) -> EasyInputMessageContent {
    match content {
        ChatCompletionUserContent::Text(text) => EasyInputMessageContent::Text(text),
        ChatCompletionUserContent::Parts(parts) => {
            EasyInputMessageContent::Parts(parts.into_iter().map(map_user_content_part).collect())
        }
    }
}

fn map_user_content_part(part: ChatCompletionUserContentPart) -> InputContent {
    match part {
        ChatCompletionUserContentPart::Text { text } => {
            InputContent::InputText(InputTextContent { text })
        }
        ChatCompletionUserContentPart::ImageUrl { image_url } => {
            InputContent::InputImage(map_image_url(image_url))
        }
    }
}

fn map_image_url(image_url: ChatCompletionImageUrl) -> InputImageContent {
    InputImageContent {
        image_url: Some(image_url.url),
    }
}

fn map_assistant_message(message: ChatCompletionRequestAssistantMessage) -> Vec<InputItem> {
    let mut items = Vec::new();

    if let Some(content) = message.content
        && !content.is_empty()
    {
        items.push(InputItem::EasyMessage(EasyInputMessage {
            r#type: EasyInputMessageType::Message,
            role: EasyInputMessageRole::Assistant,
            content: EasyInputMessageContent::Text(content),
        }));
    }

    if let Some(tool_calls) = message.tool_calls {
        for call in tool_calls {
            items.push(map_tool_call(call));
        }
    }

    items
}

fn map_tool_call(call: ChatCompletionMessageToolCall) -> InputItem {
    InputItem::Item(Item::Function(FunctionToolCall {
        id: call.id.clone(),
        r#type: FunctionToolCallType::FunctionCall,
        call_id: call.id,
        name: call.function.name,
        arguments: call.function.arguments,
        status: Some(MessageStatus::Completed),
    }))
}

fn map_tool_message(message: ChatCompletionRequestToolMessage) -> InputItem {
    InputItem::Item(Item::FunctionOutput(FunctionCallOutputItemParam {
        r#type: FunctionCallOutputType::FunctionCallOutput,
        call_id: message.tool_call_id,
        output: message.content,
    }))
}

fn map_tools(tools: Option<Vec<ChatCompletionToolDefinition>>) -> Option<Vec<Tool>> {
    let tools = tools?;
    let mapped: Vec<Tool> = tools
        .into_iter()
        .map(|tool| match tool {
            ChatCompletionToolDefinition::Function { function } => {
                Tool::Function(map_function_tool(function))
            }
        })
        .collect();

    if mapped.is_empty() {
        None
    } else {
        Some(mapped)
    }
}

fn map_function_tool(function: FunctionObject) -> FunctionTool {
    FunctionTool {
        name: function.name,
        description: function.description,
        parameters: function.parameters,
        strict: function.strict,
    }
}

fn map_tool_choice(choice: ChatCompletionToolChoiceOption) -> Option<ToolChoiceParam> {
    match choice {
        ChatCompletionToolChoiceOption::Mode(mode) => Some(ToolChoiceParam::Mode(match mode {
            ChatCompletionToolChoiceMode::None => ToolChoiceOptions::None,
            ChatCompletionToolChoiceMode::Auto => ToolChoiceOptions::Auto,
            ChatCompletionToolChoiceMode::Required => ToolChoiceOptions::Required,
        })),
        ChatCompletionToolChoiceOption::NamedTool(named) => {
            Some(ToolChoiceParam::Function(ToolChoiceFunction {
                r#type: ToolChoiceFunctionType::Function,
                name: named.function.name,
            }))
        }
    }
}

fn map_response_text(
    response_format: Option<
        ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionResponseFormat,
    >,
) -> Option<ResponseTextParam> {
    let format = map_response_format(response_format?);
    Some(ResponseTextParam {
        format: Some(format),
    })
}

fn map_response_format(
    format: ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionResponseFormat,
) -> TextResponseFormatConfiguration {
    use ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionResponseFormat as Fmt;
    match format {
        Fmt::Text => TextResponseFormatConfiguration::Text,
        Fmt::JsonObject => TextResponseFormatConfiguration::JsonObject,
        Fmt::JsonSchema {
            json_schema,
        } => TextResponseFormatConfiguration::JsonSchema {
            name: json_schema.name,
            description: json_schema.description,
            schema: json_schema.schema,
            strict: json_schema.strict,
        },
    }
}

