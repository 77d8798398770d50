use ccnexus_protocol::openai::create_chat_completions::request::{
    CreateChatCompletionRequest, CreateChatCompletionRequestBody,
};
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCallFunction,
    ChatCompletionNamedToolChoice, ChatCompletionNamedToolChoiceType, ChatCompletionRequestMessage,
    ChatCompletionResponseFormat, ChatCompletionToolCallType, ChatCompletionToolChoiceMode,
    ChatCompletionToolChoiceOption, ChatCompletionToolDefinition, ChatCompletionUserContent,
    ChatCompletionUserContentPart, FunctionObject, ResponseFormatJsonSchema,
};
use ccnexus_protocol::openai::create_response::request::CreateResponseRequest;
use ccnexus_protocol::openai::create_response::types::{
    EasyInputMessage, EasyInputMessageContent, EasyInputMessageRole, FunctionCallOutputItemParam,
    InputContent, InputItem, InputMessage, InputMessageRole, InputParam, Instructions, Item,
    OutputMessage, OutputMessageContent, ResponseTextParam, TextResponseFormatConfiguration, Tool,
    ToolChoiceOptions, ToolChoiceParam,
};

pub fn transform_request(request: CreateResponseRequest) -> CreateChatCompletionRequest {
    let mut messages = Vec::new();

    if let Some(instructions) = request.body.instructions {
        messages.push(ChatCompletionRequestMessage::System(
            ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestSystemMessage {
                content: instructions,
                name: None,
            },
        ));
    }

    if let Some(input) = request.body.input {
        append_input_param(input, &mut messages);
    }

    let response_format = request.body.text.as_ref().and_then(map_response_format);

    let tools = request
        .body
        .tools
        .map(map_tools)
        .and_then(|tools| if tools.is_empty() { None } else { Some(tools) });

    let tool_choice = request.body.tool_choice.and_then(map_tool_choice);

    CreateChatCompletionRequest {
        body: CreateChatCompletionRequestBody {
            messages,
            model: request.body.model,
            max_completion_tokens: request.body.max_output_tokens,
            response_format,
            stream: request.body.stream,
            stop: None,
            max_tokens: None,
            seed: None,
            tools,
            tool_choice,
            parallel_tool_calls: request.body.parallel_tool_calls,
            metadata: request.body.metadata,
            temperature: request.body.temperature,
            top_p: request.body.top_p,
            user: request.body.user,
        },
    }
}

fn append_input_param(input: InputParam, messages: &mut Vec<ChatCompletionRequestMessage>) {
    match input {
        InputParam::Text(text) => {
            messages.push(ChatCompletionRequestMessage::User(
                ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestUserMessage {
                    content: ChatCompletionUserContent::Text(text),
                    name: None,
                },
            ));
        }
        InputParam::Items(items) => {
            for item in items {
                append_input_item(item, messages);
            }
        }
    }
}

fn append_input_item(item: InputItem, messages: &mut Vec<ChatCompletionRequestMessage>) {
    match item {
        InputItem::EasyMessage(message) => append_easy_message(message, messages),
        InputItem::Item(item) => match item {
            Item::InputMessage(message) => append_input_message(message, messages),
            Item::OutputMessage(message) => append_output_message(message, messages),
            Item::Function(call) => messages.push(ChatCompletionRequestMessage::Assistant(
                ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestAssistantMessage {
                    content: None,
                    name: None,
                    tool_calls: Some(vec![ChatCompletionMessageToolCall {
                        id: call.call_id,
                        r#type: ChatCompletionToolCallType::Function,
                        function: ChatCompletionMessageToolCallFunction {
                            name: call.name,
                            arguments: call.arguments,
                        },
                    }]),
                },
            )),
            Item::FunctionOutput(output) => append_function_output(output, messages),
            Item::Reasoning(_) => {}
        },
    }
}

fn append_function_output(
    output: FunctionCallOutputItemParam,
    messages: &mut Vec<ChatCompletionRequestMessage>,
) {
    messages.push(ChatCompletionRequestMessage::Tool(
        ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestToolMessage {
            content: output.output,
            tool_call_id: output.call_id,
        },
    ));
}

fn append_easy_message(
    message: EasyInputMessage,
    messages: &mut Vec<ChatCompletionRequestMessage>,
) {
    match message.role {
        EasyInputMessageRole::User => {
            messages.push(ChatCompletionRequestMessage::User(
                ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestUserMessage {
                    content: map_easy_content_to_user_content(message.content),
                    name: None,
                },
            ));
        }
        EasyInputMessageRole::Assistant => {
            let content = map_easy_content_to_text(message.content);
            if let Some(content) = content {
                messages.push(ChatCompletionRequestMessage::Assistant(
                    ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestAssistantMessage {
                        content: Some(content),
                        name: None,
                        tool_calls: None,
                    },
                ));
            }
        }
        EasyInputMessageRole::System | EasyInputMessageRole::Developer => {
            if let Some(content) = map_easy_content_to_text(message.content) {
                messages.push(ChatCompletionRequestMessage::System(
                    ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestSystemMessage {
                        content,
                        name: None,
                    },
                ));
            }
        }
    }
}

fn append_input_message(message: InputMessage, messages: &mut Vec<ChatCompletionRequestMessage>) {
    match message.role {
        InputMessageRole::User => {
            messages.push(ChatCompletionRequestMessage::User(
                ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestUserMessage {
                    content: input_contents_to_user_content(&message.content),
                    name: None,
                },
            ));
        }
        InputMessageRole::System | InputMessageRole::Developer => {
            let text = input_contents_to_text(&message.content);
            if !text.is_empty() {
                messages.push(ChatCompletionRequestMessage::System(
                    ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestSystemMessage {
                        content: text,
                        name: None,
                    },
                ));
            }
        }
    }
}

fn append_output_message(message: OutputMessage, messages: &mut Vec<ChatCompletionRequestMessage>) {
    let mut text = String::new();
    for part in &message.content {
        match part {
            OutputMessageContent::OutputText(output) => text.push_str(&output.text),
            OutputMessageContent::Refusal(refusal) => text.push_str(&refusal.refusal),
        }
    }

    if !text.is_empty() {
        messages.push(ChatCompletionRequestMessage::Assistant(
            ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionRequestAssistantMessage {
                content: Some(text),
                name: None,
                tool_calls: None,
            },
        ));
    }
}

fn map_easy_content_to_user_content(content: EasyInputMessageContent) -> ChatCompletionUserContent {
    match content {
        EasyInputMessageContent::Text(text) => ChatCompletionUserContent::Text(text),
        EasyInputMessageContent::Parts(parts) => input_contents_to_user_content(&parts),
    }
}

fn map_easy_content_to_text(content: EasyInputMessageContent) -> Option<String> {
    match content {
        EasyInputMessageContent::Text(text) => {
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
        EasyInputMessageContent::Parts(parts) => {
            let text = input_contents_to_text(&parts);
            if text.is_empty() { None } else { Some(text) }
        }
    }
}

fn input_contents_to_text(contents: &[InputContent]) -> String {
    let mut text = String::new();
    for content in contents {
        if let InputContent::InputText(part) = content {
            text.push_str(&part.text);
        }
    }
    text
}

fn input_contents_to_user_content(contents: &[InputContent]) -> ChatCompletionUserContent {
    if contents.len() == 1
        && let InputContent::InputText(text) = &contents[0]
    {
        return ChatCompletionUserContent::Text(text.text.clone());
    }

    let mut parts = Vec::new();
    for content in contents {
        match content {
            InputContent::InputText(text) => {
                parts.push(ChatCompletionUserContentPart::Text {
                    text: text.text.clone(),
                });
            }
            InputContent::InputImage(image) => {
                if let Some(url) = &image.image_url {
                    parts.push(ChatCompletionUserContentPart::ImageUrl {
                        image_url:
                            ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionImageUrl {
                                url: url.clone(),
                                detail: None,
                            },
                    });
                }
            }
        }
    }

    ChatCompletionUserContent::Parts(parts)
}

fn map_response_format(text: &ResponseTextParam) -> Option<ChatCompletionResponseFormat> {
    let format = text.format.as_ref()?;
    Some(match format {
        TextResponseFormatConfiguration::Text => ChatCompletionResponseFormat::Text,
        TextResponseFormatConfiguration::JsonObject => ChatCompletionResponseFormat::JsonObject,
        TextResponseFormatConfiguration::JsonSchema {
            name,
            description,
            schema,
            strict,
        } => ChatCompletionResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                name: name.clone(),
                description: description.clone(),
                schema: schema.clone(),
                strict: *strict,
            },
        },
    })
}

fn map_tools(tools: Vec<Tool>) -> Vec<ChatCompletionToolDefinition> {
    tools
        .into_iter()
        .map(|tool| match tool {
            Tool::Function(function) => ChatCompletionToolDefinition::Function {
                function: FunctionObject {
                    name: function.name,
                    description: function.description,
                    parameters: function.parameters,
                    strict: function.strict,
                },
            },
        })
        .collect()
}

fn map_tool_choice(choice: ToolChoiceParam) -> Option<ChatCompletionToolChoiceOption> {
    match choice {
        ToolChoiceParam::Mode(mode) => Some(ChatCompletionToolChoiceOption::Mode(match mode {
            ToolChoiceOptions::None => ChatCompletionToolChoiceMode::None,
            ToolChoiceOptions::Auto => ChatCompletionToolChoiceMode::Auto,
            ToolChoiceOptions::Required => ChatCompletionToolChoiceMode::Required,
        })),
        ToolChoiceParam::Function(function) => Some(ChatCompletionToolChoiceOption::NamedTool(
            ChatCompletionNamedToolChoice {
                r#type: ChatCompletionNamedToolChoiceType::Function,
                function:
                    ccnexus_protocol::openai::create_chat_completions::types::ChatCompletionNamedToolChoiceFunction {
                        name: function.name,
                    },
            },
        )),
    }
}
