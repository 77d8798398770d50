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
    Blob as GeminiBlob, Content as GeminiContent, Part as GeminiPart, Role as GeminiRole,
};
use ccnexus_protocol::openai::create_response::request::CreateResponseRequest as OpenAIResponseRequest;
use ccnexus_protocol::openai::create_response::types::{
    EasyInputMessage, EasyInputMessageContent, EasyInputMessageRole, FunctionTool, InputContent,
    InputImageContent, InputItem, InputMessage, InputMessageRole, InputParam, Instructions, Item,
    OutputMessage, OutputMessageContent, Tool, ToolChoiceOptions, ToolChoiceParam,
};

pub fn transform_request(request: OpenAIResponseRequest) -> GeminiGenerateContentRequest {
    let model = request.body.model.clone();

    let mut system_texts = Vec::new();
    let mut contents = Vec::new();

    if let Some(instructions) = request.body.instructions {
        push_system_texts_from_instructions(instructions, &mut contents, &mut system_texts);
    }

    if let Some(input) = request.body.input {
        append_input_param(input, &mut contents, &mut system_texts);
    }

    let system_instruction = if system_texts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            parts: vec![GeminiPart::text(system_texts.join("\n"))],
            role: None,
        })
    };

    let tools = request.body.tools.and_then(map_tools);
    let tool_config = map_tool_choice(request.body.tool_choice);
    let generation_config = map_generation_config(
        request.body.max_output_tokens,
        request.body.temperature,
        request.body.top_p,
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

fn push_system_texts_from_instructions(
    instructions: Instructions,
    contents: &mut Vec<GeminiContent>,
    system_texts: &mut Vec<String>,
) {
    match instructions {
        Instructions::Text(text) => push_system_text(system_texts, text),
        Instructions::Items(items) => {
            for item in items {
                append_input_item(item, contents, system_texts);
            }
        }
    }
}

fn append_input_param(
    input: InputParam,
    contents: &mut Vec<GeminiContent>,
    system_texts: &mut Vec<String>,
) {
    match input {
        InputParam::Text(text) => {
            if !text.is_empty() {
                contents.push(GeminiContent {
                    parts: vec![GeminiPart::text(text)],
                    role: Some(GeminiRole::User),
                });
            }
        }
        InputParam::Items(items) => {
            for item in items {
                append_input_item(item, contents, system_texts);
            }
        }
    }
}

fn append_input_item(
    item: InputItem,
    contents: &mut Vec<GeminiContent>,
    system_texts: &mut Vec<String>,
) {
    match item {
        InputItem::EasyMessage(message) => append_easy_message(message, contents, system_texts),
        InputItem::Item(item) => match item {
            Item::InputMessage(message) => append_input_message(message, contents, system_texts),
            Item::OutputMessage(message) => append_output_message(message, contents),
            Item::Function(call) => {
                let part = GeminiPart {
                    function_call: Some(ccnexus_protocol::gemini::types::FunctionCall {
                        id: Some(call.call_id),
                        name: call.name,
                        args: parse_arguments(&call.arguments),
                    }),
                    ..Default::default()
                };
                contents.push(GeminiContent {
                    parts: vec![part],
                    role: Some(GeminiRole::Model),
                });
            }
            Item::FunctionOutput(output) => {
                let part = GeminiPart {
                    function_response: Some(ccnexus_protocol::gemini::types::FunctionResponse {
                        id: Some(output.call_id.clone()),
                        name: output.call_id,
                        response: serde_json::Value::String(output.output),
                    }),
                    ..Default::default()
                };
                contents.push(GeminiContent {
                    parts: vec![part],
                    role: Some(GeminiRole::User),
                });
            }
            Item::Reasoning(_) => {}
        },
    }
}

fn append_easy_message(
    message: EasyInputMessage,
    contents: &mut Vec<GeminiContent>,
    system_texts: &mut Vec<String>,
) {
    match message.role {
        EasyInputMessageRole::User => {
            let parts = easy_content_to_parts(message.content);
            if !parts.is_empty() {
                contents.push(GeminiContent {
                    parts,
                    role: Some(GeminiRole::User),
                });
            }
        }
        EasyInputMessageRole::Assistant => {
            let parts = easy_content_to_parts(message.content);
            if !parts.is_empty() {
                contents.push(GeminiContent {
                    parts,
                    role: Some(GeminiRole::Model),
                });
            }
        }
        EasyInputMessageRole::System | EasyInputMessageRole::Developer => {
            if let Some(text) = easy_content_to_text(message.content) {
                push_system_text(system_texts, text);
            }
        }
    }
}

fn append_input_message(
    message: InputMessage,
    contents: &mut Vec<GeminiContent>,
    system_texts: &mut Vec<String>,
) {
    match message.role {
        InputMessageRole::User => {
            let parts = input_contents_to_parts(&message.content);
            if !parts.is_empty() {
                contents.push(GeminiContent {
                    parts,
                    role: Some(GeminiRole::User),
                });
            }
        }
        InputMessageRole::System | InputMessageRole::Developer => {
            let text = input_contents_to_text(&message.content);
            if !text.is_empty() {
                push_system_text(system_texts, text);
            }
        }
    }
}

fn append_output_message(message: OutputMessage, contents: &mut Vec<GeminiContent>) {
    let mut parts = Vec::new();
    for content in &message.content {
        let text = match content {
            OutputMessageContent::OutputText(value) => value.text.clone(),
            OutputMessageContent::Refusal(value) => value.refusal.clone(),
        };
        if !text.is_empty() {
            parts.push(GeminiPart::text(text));
        }
    }
    if !parts.is_empty() {
        contents.push(GeminiContent {
            parts,
            role: Some(GeminiRole::Model),
        });
    }
}

fn easy_content_to_parts(content: EasyInputMessageContent) -> Vec<GeminiPart> {
    match content {
        EasyInputMessageContent::Text(text) => {
            if text.is_empty() {
                Vec::new()
            } else {
                vec![GeminiPart::text(text)]
            }
        }
        EasyInputMessageContent::Parts(parts) => input_contents_to_parts(&parts),
    }
}

fn easy_content_to_text(content: EasyInputMessageContent) -> Option<String> {
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

fn input_contents_to_parts(contents: &[InputContent]) -> Vec<GeminiPart> {
    let mut parts = Vec::new();
    for content in contents {
        match content {
            InputContent::InputText(text) => {
                if !text.text.is_empty() {
                    parts.push(GeminiPart::text(text.text.clone()));
                }
            }
            InputContent::InputImage(image) => {
                if let Some(part) = map_image_content(image) {
                    parts.push(part);
                }
            }
        }
    }
    parts
}

fn map_image_content(content: &InputImageContent) -> Option<GeminiPart> {
    let url = content.image_url.as_ref()?;
    if let Some((mime_type, data)) = parse_data_url(url) {
        return Some(GeminiPart {
            inline_data: Some(GeminiBlob { mime_type, data }),
            ..Default::default()
        });
    }
    Some(GeminiPart::text(url.clone()))
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

fn parse_arguments(arguments: &str) -> ccnexus_protocol::gemini::types::JsonObject {
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Default::default(),
    }
}

fn map_tools(tools: Vec<Tool>) -> Option<Vec<GeminiTool>> {
    let function_declarations: Vec<FunctionDeclaration> = tools
        .into_iter()
        .map(|tool| match tool {
            Tool::Function(function) => map_function_tool(function),
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

fn map_function_tool(function: FunctionTool) -> FunctionDeclaration {
    let parameters = function
        .parameters
        .and_then(|schema| serde_json::from_value(schema).ok());

    FunctionDeclaration {
        name: function.name,
        description: function.description.unwrap_or_default(),
        parameters,
    }
}

fn map_tool_choice(choice: Option<ToolChoiceParam>) -> Option<ToolConfig> {
    let config = map_function_calling_config(choice?)?;
    Some(ToolConfig {
        function_calling_config: Some(config),
    })
}

fn map_function_calling_config(choice: ToolChoiceParam) -> Option<FunctionCallingConfig> {
    match choice {
        ToolChoiceParam::Mode(mode) => Some(FunctionCallingConfig {
            mode: Some(match mode {
                ToolChoiceOptions::None => FunctionCallingMode::None,
                ToolChoiceOptions::Auto => FunctionCallingMode::Auto,
                ToolChoiceOptions::Required => FunctionCallingMode::Any,
            }),
            allowed_function_names: None,
        }),
        ToolChoiceParam::Function(function) => Some(FunctionCallingConfig {
            mode: Some(FunctionCallingMode::Any),
            allowed_function_names: Some(vec![function.name]),
        }),
    }
}

fn map_generation_config(
    max_output_tokens: Option<i64>,
    temperature: Option<f64>,
    top_p: Option<f64>,
) -> Option<GenerationConfig> {
    let max_output_tokens = max_output_tokens.map(|value| value.max(0) as u32);

    if max_output_tokens.is_none() && temperature.is_none() && top_p.is_none() {
        return None;
    }

    Some(GenerationConfig {
        stop_sequences: None,
        candidate_count: None,
        max_output_tokens,
        temperature,
        top_p,
        top_k: None,
        thinking_config: None,
    })
}

fn push_system_text(system_texts: &mut Vec<String>, text: String) {
    if !text.is_empty() {
        system_texts.push(text);
    }
}
