use ccnexus_protocol::gemini::generate_content::request::GenerateContentRequest as GeminiGenerateContentRequest;
use ccnexus_protocol::gemini::generate_content::types::{
    FunctionCallingMode, FunctionDeclaration, GenerationConfig, Tool as GeminiTool, ToolConfig,
};
use ccnexus_protocol::gemini::types::{
    Blob as GeminiBlob, Content as GeminiContent, Part as GeminiPart, Role as GeminiRole,
};
use ccnexus_protocol::openai::create_response::request::{
    CreateResponseRequest as OpenAIResponseRequest,
    CreateResponseRequestBody as OpenAIResponseRequestBody,
};
use ccnexus_protocol::openai::create_response::types::{
    EasyInputMessage, EasyInputMessageContent, EasyInputMessageRole, EasyInputMessageType,
    FunctionTool, InputContent, InputImageContent, InputItem, InputParam, InputTextContent,
    ResponseTextParam, Tool, ToolChoiceFunction, ToolChoiceFunctionType, ToolChoiceOptions,
    ToolChoiceParam,
};
use serde::Serialize;

pub fn transform_request(request: GeminiGenerateContentRequest) -> OpenAIResponseRequest {
    let model = request
        .path
        .model
        .strip_prefix("models/")
        .unwrap_or(&request.path.model)
        .to_string();

    let input = map_contents_to_input(&request.body.contents);
    let instructions = request
        .body
        .system_instruction
        .and_then(map_system_instruction);

    let tools = request
        .body
        .tools
        .map(map_tools)
        .and_then(|tools| if tools.is_empty() { None } else { Some(tools) });
    let tool_choice = map_tool_choice(request.body.tool_config.as_ref());
    let text = map_response_format(request.body.generation_config.as_ref());

    OpenAIResponseRequest {
        body: OpenAIResponseRequestBody {
            model,
            input,
            parallel_tool_calls: None,
            instructions,
            stream: None,
            max_output_tokens: request
                .body
                .generation_config
                .as_ref()
                .and_then(|config| config.max_output_tokens.map(|value| value as i64)),
            text,
            tools,
            tool_choice,
            metadata: None,
            temperature: request
                .body
                .generation_config
                .as_ref()
                .and_then(|config| config.temperature),
            top_p: request
                .body
                .generation_config
                .as_ref()
                .and_then(|config| config.top_p),
            user: None,
        },
    }
}

fn map_contents_to_input(contents: &[GeminiContent]) -> Option<InputParam> {
    let mut items = Vec::new();
    for content in contents {
        if let Some(message) = map_content_to_easy_message(content) {
            items.push(InputItem::EasyMessage(message));
        }
    }

    if items.is_empty() {
        None
    } else {
        Some(InputParam::Items(items))
    }
}

fn map_content_to_easy_message(content: &GeminiContent) -> Option<EasyInputMessage> {
    let role = match content.role {
        Some(GeminiRole::Model) => EasyInputMessageRole::Assistant,
        _ => EasyInputMessageRole::User,
    };

    let parts = map_parts_to_input_contents(&content.parts);
    if parts.is_empty() {
        return None;
    }

    let content = if let [InputContent::InputText(text)] = parts.as_slice() {
        EasyInputMessageContent::Text(text.text.clone())
    } else {
        EasyInputMessageContent::Parts(parts)
    };

    Some(EasyInputMessage {
        r#type: EasyInputMessageType::Message,
        role,
        content,
    })
}

fn map_parts_to_input_contents(parts: &[GeminiPart]) -> Vec<InputContent> {
    let mut contents = Vec::new();
    for part in parts {
        if let Some(text) = part.text.clone() {
            push_text_content(&mut contents, text);
        }

        if let Some(blob) = &part.inline_data {
            push_inline_blob(&mut contents, blob);
        }

        if let Some(function_call) = &part.function_call {
            push_json_text(&mut contents, "function_call", function_call);
        }

        if let Some(function_response) = &part.function_response {
            push_json_text(&mut contents, "function_response", function_response);
        }
    }
    contents
}

fn push_text_content(contents: &mut Vec<InputContent>, text: String) {
    if !text.is_empty() {
        contents.push(InputContent::InputText(InputTextContent { text }));
    }
}

fn push_inline_blob(contents: &mut Vec<InputContent>, blob: &GeminiBlob) {
    let url = format!("data:{};base64,{}", blob.mime_type, blob.data);
    contents.push(InputContent::InputImage(InputImageContent {
        image_url: Some(url),
    }));
}

fn push_json_text<T: Serialize>(contents: &mut Vec<InputContent>, label: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        let text = format!("[{}] {}", label, json);
        contents.push(InputContent::InputText(InputTextContent { text }));
    }
}

fn map_system_instruction(system: GeminiContent) -> Option<String> {
    let texts: Vec<String> = system
        .parts
        .iter()
        .filter_map(|part| part.text.clone())
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

fn map_tools(tools: Vec<GeminiTool>) -> Vec<Tool> {
    tools
        .into_iter()
        .filter_map(|tool| tool.function_declarations)
        .flatten()
        .map(|function| Tool::Function(map_function_tool(function)))
        .collect()
}

fn map_function_tool(function: FunctionDeclaration) -> FunctionTool {
    let parameters = function
        .parameters
        .and_then(|schema| serde_json::to_value(schema).ok());

    FunctionTool {
        name: function.name,
        description: Some(function.description),
        parameters,
        strict: None,
    }
}

fn map_tool_choice(tool_config: Option<&ToolConfig>) -> Option<ToolChoiceParam> {
    let config = tool_config.and_then(|config| config.function_calling_config.as_ref())?;
    let mode = config.mode.unwrap_or(FunctionCallingMode::ModeUnspecified);
    let allowed = config.allowed_function_names.clone().unwrap_or_default();

    match mode {
        FunctionCallingMode::None => Some(ToolChoiceParam::Mode(ToolChoiceOptions::None)),
        FunctionCallingMode::Auto | FunctionCallingMode::ModeUnspecified => {
            Some(ToolChoiceParam::Mode(ToolChoiceOptions::Auto))
        }
        FunctionCallingMode::Any => {
            if allowed.len() == 1 {
                Some(ToolChoiceParam::Function(ToolChoiceFunction {
                    r#type: ToolChoiceFunctionType::Function,
                    name: allowed[0].clone(),
                }))
            } else {
                Some(ToolChoiceParam::Mode(ToolChoiceOptions::Required))
            }
        }
    }
}

fn map_response_format(config: Option<&GenerationConfig>) -> Option<ResponseTextParam> {
    let _ = config;
    None
}
