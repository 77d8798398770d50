use ccnexus_protocol::claude::create_message::request::{
    BetaMessageParam as ClaudeMessageParam, BetaMessageParamContent as ClaudeMessageContent,
    BetaMessageParamRole as ClaudeMessageRole, BetaSystemParam as ClaudeSystemParam,
    BetaThinkingConfigParam as ClaudeThinkingConfigParam,
    BetaThinkingConfigType as ClaudeThinkingConfigType, BetaTool as ClaudeTool,
    BetaToolChoice as ClaudeToolChoice, BetaToolChoiceType, CreateMessageHeaders,
    CreateMessageRequest as ClaudeCreateMessageRequest,
    CreateMessageRequestBody as ClaudeCreateMessageRequestBody,
};
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock as ClaudeContentBlock, BetaImageBlock as ClaudeImageBlock,
    BetaImageBlockType as ClaudeImageBlockType, BetaImageMediaType as ClaudeImageMediaType,
    BetaImageSource as ClaudeImageSource, BetaTextBlock as ClaudeTextBlock,
    BetaTextBlockType as ClaudeTextBlockType,
};
use ccnexus_protocol::gemini::generate_content::request::GenerateContentRequest as GeminiGenerateContentRequest;
use ccnexus_protocol::gemini::generate_content::types::{
    FunctionCallingMode, FunctionDeclaration, GenerationConfig, Tool as GeminiTool, ToolConfig,
};
use ccnexus_protocol::gemini::types::{Blob as GeminiBlob, Content as GeminiContent, Part as GeminiPart, Role as GeminiRole};
use serde_json::Value as JsonValue;

const DEFAULT_MAX_TOKENS: u32 = 32_000;

pub fn transform_request(request: GeminiGenerateContentRequest) -> ClaudeCreateMessageRequest {
    let model = request
        .path
        .model
        .strip_prefix("models/")
        .unwrap_or(&request.path.model)
        .to_string();

    let messages = map_contents_to_messages(&request.body.contents);
    let system = map_system_instruction(request.body.system_instruction);
    let tools = request
        .body
        .tools
        .map(map_tools)
        .and_then(|tools| if tools.is_empty() { None } else { Some(tools) });
    let tool_choice = map_tool_choice(request.body.tool_config);
    let (max_tokens, temperature, top_p, top_k, stop_sequences, thinking) =
        map_generation_config(request.body.generation_config);

    ClaudeCreateMessageRequest {
        headers: CreateMessageHeaders::default(),
        body: ClaudeCreateMessageRequestBody {
            max_tokens,
            messages,
            model,
            metadata: None,
            stop_sequences,
            stream: None,
            system,
            temperature,
            thinking,
            tool_choice,
            tools,
            top_k,
            top_p,
        },
    }
}

fn map_contents_to_messages(contents: &[GeminiContent]) -> Vec<ClaudeMessageParam> {
    contents.iter().filter_map(map_content_to_message).collect()
}

fn map_content_to_message(content: &GeminiContent) -> Option<ClaudeMessageParam> {
    let role = match content.role {
        Some(GeminiRole::Model) => ClaudeMessageRole::Assistant,
        _ => ClaudeMessageRole::User,
    };

    let blocks = map_parts_to_blocks(&content.parts);
    if blocks.is_empty() {
        return None;
    }

    let message_content = if let [ClaudeContentBlock::Text(text_block)] = blocks.as_slice() {
        ClaudeMessageContent::Text(text_block.text.clone())
    } else {
        ClaudeMessageContent::Blocks(blocks)
    };

    Some(ClaudeMessageParam {
        role,
        content: message_content,
    })
}

fn map_parts_to_blocks(parts: &[GeminiPart]) -> Vec<ClaudeContentBlock> {
    let mut blocks = Vec::new();
    for part in parts {
        blocks.extend(map_part_to_blocks(part));
    }
    blocks
}

fn map_part_to_blocks(part: &GeminiPart) -> Vec<ClaudeContentBlock> {
    let mut blocks = Vec::new();

    if let Some(text) = part.text.clone() {
        push_text_block(&mut blocks, text);
    }

    if let Some(blob) = &part.inline_data
        && let Some(block) = map_inline_blob(blob)
    {
        blocks.push(block);
    }

    if let Some(function_call) = &part.function_call {
        push_json_block(&mut blocks, "function_call", function_call);
    }

    if let Some(function_response) = &part.function_response {
        push_json_block(&mut blocks, "function_response", function_response);
    }

    blocks
}

fn map_inline_blob(blob: &GeminiBlob) -> Option<ClaudeContentBlock> {
    let media_type = match blob.mime_type.as_str() {
        "image/jpeg" => ClaudeImageMediaType::Jpeg,
        "image/png" => ClaudeImageMediaType::Png,
        "image/gif" => ClaudeImageMediaType::Gif,
        "image/webp" => ClaudeImageMediaType::Webp,
        _ => return None,
    };

    Some(ClaudeContentBlock::Image(ClaudeImageBlock {
        source: ClaudeImageSource::Base64 {
            data: blob.data.clone(),
            media_type,
        },
        r#type: ClaudeImageBlockType::Image,
    }))
}

fn map_system_instruction(system: Option<GeminiContent>) -> Option<ClaudeSystemParam> {
    let system = system?;
    let texts: Vec<String> = system
        .parts
        .iter()
        .filter_map(|part| part.text.clone())
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(ClaudeSystemParam::Text(texts.join("\n")))
    }
}

fn push_text_block(blocks: &mut Vec<ClaudeContentBlock>, text: String) {
    if text.is_empty() {
        return;
    }
    blocks.push(ClaudeContentBlock::Text(ClaudeTextBlock {
        text,
        r#type: ClaudeTextBlockType::Text,
    }));
}

fn push_json_block<T: serde::Serialize>(blocks: &mut Vec<ClaudeContentBlock>, label: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        push_text_block(blocks, format!("{label}: {json}"));
    }
}

fn map_tools(tools: Vec<GeminiTool>) -> Vec<ClaudeTool> {
    tools
        .into_iter()
        .filter_map(|tool| tool.function_declarations)
        .flatten()
        .map(map_function_declaration)
        .collect()
}

fn map_function_declaration(function: FunctionDeclaration) -> ClaudeTool {
    let input_schema = function
        .parameters
        .map(schema_to_json)
        .unwrap_or_else(minimal_object_schema);

    ClaudeTool {
        name: function.name,
        description: Some(function.description),
        input_schema,
    }
}

fn schema_to_json(schema: ccnexus_protocol::gemini::generate_content::types::Schema) -> JsonValue {
    use ccnexus_protocol::gemini::generate_content::types::Type as GeminiType;

    let mut map = serde_json::Map::new();
    let schema_type = match schema.r#type {
        GeminiType::String => "string",
        GeminiType::Number => "number",
        GeminiType::Integer => "integer",
        GeminiType::Boolean => "boolean",
        GeminiType::Array => "array",
        GeminiType::Object => "object",
        GeminiType::Null => "null",
        GeminiType::TypeUnspecified => "object",
    };
    map.insert("type".to_string(), JsonValue::String(schema_type.to_string()));

    if let Some(description) = schema.description {
        map.insert("description".to_string(), JsonValue::String(description));
    }

    if let Some(properties) = schema.properties {
        let mut props = serde_json::Map::new();
        for (key, value) in properties {
            props.insert(key, schema_to_json(value));
        }
        map.insert("properties".to_string(), JsonValue::Object(props));
    }

    if let Some(required) = schema.required {
        map.insert(
            "required".to_string(),
            JsonValue::Array(required.into_iter().map(JsonValue::String).collect()),
        );
    }

    if let Some(items) = schema.items {
        map.insert("items".to_string(), schema_to_json(*items));
    }

    if let Some(enum_values) = schema.enum_values {
        map.insert(
            "enum".to_string(),
            JsonValue::Array(enum_values.into_iter().map(JsonValue::String).collect()),
        );
    }

    JsonValue::Object(map)
}

fn minimal_object_schema() -> JsonValue {
    let mut map = serde_json::Map::new();
    map.insert("type".to_string(), JsonValue::String("object".to_string()));
    JsonValue::Object(map)
}

fn map_tool_choice(tool_config: Option<ToolConfig>) -> Option<ClaudeToolChoice> {
    let config = tool_config?.function_calling_config?;

    let mode = config.mode.unwrap_or(FunctionCallingMode::ModeUnspecified);
    match mode {
        FunctionCallingMode::None => Some(ClaudeToolChoice {
            r#type: BetaToolChoiceType::None,
            name: None,
        }),
        FunctionCallingMode::Auto | FunctionCallingMode::ModeUnspecified => Some(ClaudeToolChoice {
            r#type: BetaToolChoiceType::Auto,
            name: None,
        }),
        FunctionCallingMode::Any => {
            if let Some(names) = config.allowed_function_names
                && names.len() == 1
            {
                return Some(ClaudeToolChoice {
                    r#type: BetaToolChoiceType::Tool,
                    name: Some(names[0].clone()),
                });
            }
            Some(ClaudeToolChoice {
                r#type: BetaToolChoiceType::Any,
                name: None,
            })
        }
    }
}

#[allow(clippy::type_complexity)]
fn map_generation_config(
    generation_config: Option<GenerationConfig>,
) -> (
    u32,
    Option<f64>,
    Option<f64>,
    Option<u32>,
    Option<Vec<String>>,
    Option<ClaudeThinkingConfigParam>,
) {
    let config = match generation_config {
        Some(config) => config,
        None => return (DEFAULT_MAX_TOKENS, None, None, None, None, None),
    };

    let max_tokens = map_max_tokens(config.max_output_tokens);
    let temperature = config.temperature;
    let top_p = config.top_p;
    let top_k = config.top_k;
    let stop_sequences = config.stop_sequences;

    let thinking = config.thinking_config.as_ref().map(|thinking| {
        if thinking.include_thoughts.unwrap_or(false) {
            ClaudeThinkingConfigParam {
                r#type: ClaudeThinkingConfigType::Enabled,
                budget_tokens: thinking.thinking_budget,
            }
        } else {
            ClaudeThinkingConfigParam {
                r#type: ClaudeThinkingConfigType::Disabled,
                budget_tokens: None,
            }
        }
    });

    (max_tokens, temperature, top_p, top_k, stop_sequences, thinking)
}

fn map_max_tokens(max_output_tokens: Option<u32>) -> u32 {
    match max_output_tokens {
        Some(value) if value > 0 => value,
        _ => DEFAULT_MAX_TOKENS,
    }
}
