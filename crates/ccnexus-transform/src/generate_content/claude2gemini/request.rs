use ccnexus_protocol::claude::create_message::request::CreateMessageRequest as ClaudeCreateMessageRequest;
use ccnexus_protocol::claude::create_message::types::{
    BetaContentBlock as ClaudeContentBlock, BetaImageSource as ClaudeImageSource,
    BetaToolResultContent as ClaudeToolResultContent,
};
use ccnexus_protocol::claude::create_message::types::JsonObject;
use ccnexus_protocol::claude::create_message::{
    BetaMessageParam as ClaudeMessageParam, BetaMessageParamContent as ClaudeMessageParamContent,
    BetaMessageParamRole as ClaudeMessageRole, BetaSystemParam as ClaudeSystemParam,
    BetaThinkingConfigParam as ClaudeThinkingConfigParam, BetaThinkingConfigType,
    BetaTool as ClaudeTool, BetaToolChoice as ClaudeToolChoice, BetaToolChoiceType,
};
use ccnexus_protocol::gemini::generate_content::request::{
    GenerateContentPath as GeminiGenerateContentPath,
    GenerateContentRequest as GeminiGenerateContentRequest,
    GenerateContentRequestBody as GeminiGenerateContentRequestBody,
};
use ccnexus_protocol::gemini::generate_content::types::{
    FunctionCallingConfig, FunctionCallingMode, FunctionDeclaration, GenerationConfig,
    ThinkingConfig, Tool as GeminiTool, ToolConfig,
};
use ccnexus_protocol::gemini::types::{Blob as GeminiBlob, Content as GeminiContent, Part as GeminiPart, Role as GeminiRole};
use serde_json::Value as JsonValue;

/// Convert a Claude create-message request into a Gemini generate-content request.
pub fn transform_request(request: ClaudeCreateMessageRequest) -> GeminiGenerateContentRequest {
    let model = request.body.model.clone();

    let contents = map_messages_to_contents(&request.body.messages);
    let system_instruction = map_system_to_content(request.body.system);
    let tools = map_tools(request.body.tools);
    let tool_config = map_tool_choice(request.body.tool_choice);
    let generation_config = map_generation_config(
        request.body.max_tokens,
        request.body.temperature,
        request.body.top_p,
        request.body.top_k,
        request.body.stop_sequences,
        request.body.thinking,
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

fn map_system_to_content(system: Option<ClaudeSystemParam>) -> Option<GeminiContent> {
    match system {
        Some(ClaudeSystemParam::Text(text)) => text_to_content(text, None),
        Some(ClaudeSystemParam::Blocks(blocks)) => {
            let text = blocks
                .into_iter()
                .filter_map(|block| match block {
                    ClaudeContentBlock::Text(text_block) => Some(text_block.text),
                    _ => None,
                })
                .collect::<Vec<String>>()
                .join("\n");
            text_to_content(text, None)
        }
        None => None,
    }
}

fn map_messages_to_contents(messages: &[ClaudeMessageParam]) -> Vec<GeminiContent> {
    messages.iter().filter_map(map_message_to_content).collect()
}

fn map_message_to_content(message: &ClaudeMessageParam) -> Option<GeminiContent> {
    let role = match message.role {
        ClaudeMessageRole::User => Some(GeminiRole::User),
        ClaudeMessageRole::Assistant => Some(GeminiRole::Model),
    };

    let parts = map_message_content_to_parts(&message.content);
    if parts.is_empty() {
        None
    } else {
        Some(GeminiContent { parts, role })
    }
}

fn map_message_content_to_parts(content: &ClaudeMessageParamContent) -> Vec<GeminiPart> {
    match content {
        ClaudeMessageParamContent::Text(text) => text_to_parts(text),
        ClaudeMessageParamContent::Blocks(blocks) => {
            blocks.iter().filter_map(map_block_to_part).collect()
        }
    }
}

fn text_to_content(text: String, role: Option<GeminiRole>) -> Option<GeminiContent> {
    if text.is_empty() {
        None
    } else {
        Some(GeminiContent { parts: text_to_parts(&text), role })
    }
}

fn text_to_parts(text: &str) -> Vec<GeminiPart> {
    vec![GeminiPart::text(text)]
}

fn map_block_to_part(block: &ClaudeContentBlock) -> Option<GeminiPart> {
    match block {
        ClaudeContentBlock::Text(text_block) => Some(GeminiPart::text(text_block.text.as_str())),
        ClaudeContentBlock::Thinking(thinking_block) => Some(GeminiPart {
            text: Some(thinking_block.thinking.clone()),
            thought: Some(true),
            thought_signature: thinking_block.signature.clone(),
            ..Default::default()
        }),
        ClaudeContentBlock::Image(image_block) => match &image_block.source {
            ClaudeImageSource::Url { .. } => None,
            ClaudeImageSource::Base64 { data, media_type } => Some(GeminiPart {
                inline_data: Some(GeminiBlob {
                    mime_type: map_image_media_type(media_type),
                    data: data.clone(),
                }),
                ..Default::default()
            }),
        },
        ClaudeContentBlock::ToolUse(tool_use) => Some(GeminiPart {
            function_call: Some(ccnexus_protocol::gemini::types::FunctionCall {
                id: Some(tool_use.id.clone()),
                name: tool_use.name.clone(),
                args: tool_use.input.clone(),
            }),
            ..Default::default()
        }),
        ClaudeContentBlock::ToolResult(tool_result) => Some(GeminiPart {
            function_response: Some(ccnexus_protocol::gemini::types::FunctionResponse {
                id: Some(tool_result.tool_use_id.clone()),
                name: tool_result.tool_use_id.clone(),
                response: tool_result_response_value(tool_result.content.as_ref()),
            }),
            ..Default::default()
        }),
    }
}

fn tool_result_response_value(content: Option<&ClaudeToolResultContent>) -> JsonValue {
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

    let mut map = JsonObject::new();
    map.insert("output".to_string(), JsonValue::String(text));
    JsonValue::Object(map.into_iter().collect())
}

fn map_image_media_type(media_type: &ccnexus_protocol::claude::create_message::types::BetaImageMediaType) -> String {
    use ccnexus_protocol::claude::create_message::types::BetaImageMediaType;
    match media_type {
        BetaImageMediaType::Jpeg => "image/jpeg",
        BetaImageMediaType::Png => "image/png",
        BetaImageMediaType::Gif => "image/gif",
        BetaImageMediaType::Webp => "image/webp",
    }
    .to_string()
}

fn map_tools(tools: Option<Vec<ClaudeTool>>) -> Option<Vec<GeminiTool>> {
    let tools = tools?;
    if tools.is_empty() {
        return None;
    }

    let functions = tools
        .into_iter()
        .map(|tool| FunctionDeclaration {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            parameters: serde_json::from_value(tool.input_schema).ok(),
        })
        .collect();

    Some(vec![GeminiTool { function_declarations: Some(functions) }])
}

fn map_tool_choice(choice: Option<ClaudeToolChoice>) -> Option<ToolConfig> {
    let choice = choice?;

    let function_calling_config = match choice.r#type {
        BetaToolChoiceType::None => FunctionCallingConfig {
            mode: Some(FunctionCallingMode::None),
            allowed_function_names: None,
        },
        BetaToolChoiceType::Auto => FunctionCallingConfig {
            mode: Some(FunctionCallingMode::Auto),
            allowed_function_names: None,
        },
        BetaToolChoiceType::Any => FunctionCallingConfig {
            mode: Some(FunctionCallingMode::Any),
            allowed_function_names: None,
        },
        BetaToolChoiceType::Tool => FunctionCallingConfig {
            mode: Some(FunctionCallingMode::Any),
            allowed_function_names: choice.name.map(|name| vec![name]),
        },
    };

    Some(ToolConfig { function_calling_config: Some(function_calling_config) })
}

fn map_generation_config(
    max_tokens: u32,
    temperature: Option<f64>,
    top_p: Option<f64>,
    top_k: Option<u32>,
    stop_sequences: Option<Vec<String>>,
    thinking: Option<ClaudeThinkingConfigParam>,
) -> Option<GenerationConfig> {
    let thinking_config = map_thinking_config(thinking);

    Some(GenerationConfig {
        stop_sequences,
        candidate_count: None,
        max_output_tokens: if max_tokens > 0 { Some(max_tokens) } else { None },
        temperature,
        top_p,
        top_k,
        thinking_config,
    })
}

fn map_thinking_config(thinking: Option<ClaudeThinkingConfigParam>) -> Option<ThinkingConfig> {
    let thinking = thinking?;
    Some(ThinkingConfig {
        include_thoughts: Some(matches!(thinking.r#type, BetaThinkingConfigType::Enabled)),
        thinking_budget: thinking.budget_tokens,
    })
}
