use serde::{Deserialize, Serialize};

use ccnexus_protocol::claude::create_message::response::CreateMessageResponse as ClaudeCreateMessageResponse;
use ccnexus_protocol::claude::create_message::stream::{
    BetaStreamContentBlockDelta, BetaStreamEvent, BetaStreamEventKnown, BetaStreamUsage,
};
use ccnexus_protocol::claude::create_message::types::BetaContentBlock;

use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse as GeminiGenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::UsageMetadata as GeminiUsageMetadata;
use ccnexus_protocol::gemini::stream_content::response::StreamGenerateContentResponse;
use ccnexus_protocol::gemini::types::Part as GeminiPart;

use ccnexus_protocol::openai::create_chat_completions::response::CreateChatCompletionResponse as OpenAIChatCompletionResponse;
use ccnexus_protocol::openai::create_chat_completions::types::CompletionUsage;
use ccnexus_protocol::openai::create_response::response::Response as OpenAIResponse;
use ccnexus_protocol::openai::create_response::stream::{
    ResponseCompletedEvent, ResponseCreatedEvent, ResponseFailedEvent,
    ResponseFunctionCallArgumentsDeltaEvent, ResponseInProgressEvent, ResponseIncompleteEvent,
    ResponseRefusalDeltaEvent, ResponseStreamEvent, ResponseTextDeltaEvent,
};
use ccnexus_protocol::openai::create_response::types::{
    OutputItem, OutputMessage, OutputMessageContent, ResponseUsage,
};

use super::types::{GenerateContentResponse, Proto, StreamEvent};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub cache_read_input_tokens: Option<u32>,
    pub cache_creation_input_tokens: Option<u32>,
}

/// `len_chars / 4` heuristic, used only when upstream never reported usage.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

#[derive(Debug, Clone)]
pub struct UsageAccumulator {
    proto: Proto,
    latest: UsageSummary,
    seen: bool,
}

impl UsageAccumulator {
    pub fn new(proto: Proto) -> Self {
        Self {
            proto,
            latest: UsageSummary::default(),
            seen: false,
        }
    }

    pub fn push(&mut self, event: &StreamEvent) -> Option<UsageSummary> {
        let incoming = match (self.proto, event) {
            (Proto::Claude, StreamEvent::Claude(event)) => usage_from_claude_stream(event),
            (Proto::OpenAIChat, StreamEvent::OpenAIChat(event)) => {
                event.usage.as_ref().map(usage_from_openai_chat_usage)
            }
            (Proto::OpenAIResponse, StreamEvent::OpenAIResponse(event)) => {
                usage_from_openai_response_stream(event)
            }
            (Proto::Gemini, StreamEvent::Gemini(event)) => {
                event.usage_metadata.as_ref().map(usage_from_gemini_usage)
            }
            _ => None,
        };

        if let Some(incoming) = incoming {
            merge_usage(&mut self.latest, incoming);
            self.seen = true;
            return Some(self.latest.clone());
        }
        None
    }

    pub fn finalize(&self) -> Option<UsageSummary> {
        if self.seen {
            Some(self.latest.clone())
        } else {
            None
        }
    }

    /// Fills in the token counts upstream never reported, using the character heuristic.
    pub fn finalize_with_fallback(&self, input_text: &str, output_text: &str) -> UsageSummary {
        let mut summary = self.latest.clone();
        if summary.input_tokens.is_none() {
            summary.input_tokens = Some(estimate_tokens(input_text));
        }
        if summary.output_tokens.is_none() {
            summary.output_tokens = Some(estimate_tokens(output_text));
        }
        summary
    }
}

#[derive(Debug, Clone)]
pub struct OutputAccumulator {
    proto: Proto,
    buffer: String,
}

impl OutputAccumulator {
    pub fn new(proto: Proto) -> Self {
        Self {
            proto,
            buffer: String::new(),
        }
    }

    pub fn push(&mut self, event: &StreamEvent) {
        match (self.proto, event) {
            (
                Proto::Claude,
                StreamEvent::Claude(BetaStreamEvent::Known(
                    BetaStreamEventKnown::ContentBlockDelta { delta, .. },
                )),
            ) => match delta {
                BetaStreamContentBlockDelta::TextDelta { text } => {
                    self.buffer.push_str(text);
                }
                BetaStreamContentBlockDelta::ThinkingDelta { .. }
                | BetaStreamContentBlockDelta::SignatureDelta { .. } => {}
                BetaStreamContentBlockDelta::InputJsonDelta { partial_json } => {
                    self.buffer.push_str(partial_json);
                }
            },
            (Proto::Claude, _) => {}
            (Proto::OpenAIChat, StreamEvent::OpenAIChat(event)) => {
                for choice in &event.choices {
                    if let Some(content) = &choice.delta.content {
                        self.buffer.push_str(content);
                    }
                    if let Some(refusal) = &choice.delta.refusal {
                        self.buffer.push_str(refusal);
                    }
                    if let Some(tool_calls) = &choice.delta.tool_calls
                        && let Ok(json) = serde_json::to_string(tool_calls)
                    {
                        self.buffer.push_str(&json);
                    }
                }
            }
            (Proto::OpenAIResponse, StreamEvent::OpenAIResponse(event)) => match event {
                ResponseStreamEvent::OutputTextDelta(ResponseTextDeltaEvent { delta, .. }) => {
                    self.buffer.push_str(delta);
                }
                ResponseStreamEvent::RefusalDelta(ResponseRefusalDeltaEvent { delta, .. }) => {
                    self.buffer.push_str(delta);
                }
                ResponseStreamEvent::FunctionCallArgumentsDelta(
                    ResponseFunctionCallArgumentsDeltaEvent { delta, .. },
                ) => {
                    self.buffer.push_str(delta);
                }
                _ => {}
            },
            (Proto::Gemini, StreamEvent::Gemini(event)) => {
                append_gemini_response_text(&mut self.buffer, event);
            }
            _ => {}
        }
    }

    pub fn extend_from_response(&mut self, resp: &GenerateContentResponse) {
        self.buffer.push_str(&output_for_counting(self.proto, resp));
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

pub fn usage_from_response(proto: Proto, resp: &GenerateContentResponse) -> Option<UsageSummary> {
    match (proto, resp) {
        (Proto::Claude, GenerateContentResponse::Claude(resp)) => {
            Some(usage_from_claude_response(resp))
        }
        (Proto::OpenAIChat, GenerateContentResponse::OpenAIChat(resp)) => {
            resp.usage.as_ref().map(usage_from_openai_chat_usage)
        }
        (Proto::OpenAIResponse, GenerateContentResponse::OpenAIResponse(resp)) => {
            resp.usage.as_ref().map(usage_from_openai_response_usage)
        }
        (Proto::Gemini, GenerateContentResponse::Gemini(resp)) => {
            resp.usage_metadata.as_ref().map(usage_from_gemini_usage)
        }
        _ => None,
    }
}

pub fn output_for_counting(proto: Proto, resp: &GenerateContentResponse) -> String {
    match (proto, resp) {
        (Proto::Claude, GenerateContentResponse::Claude(resp)) => render_claude_output(resp),
        (Proto::OpenAIChat, GenerateContentResponse::OpenAIChat(resp)) => {
            render_openai_chat_output(resp)
        }
        (Proto::OpenAIResponse, GenerateContentResponse::OpenAIResponse(resp)) => {
            render_openai_response_output(resp)
        }
        (Proto::Gemini, GenerateContentResponse::Gemini(resp)) => render_gemini_output(resp),
        _ => String::new(),
    }
}

fn usage_from_claude_response(resp: &ClaudeCreateMessageResponse) -> UsageSummary {
    UsageSummary {
        input_tokens: Some(resp.usage.input_tokens),
        output_tokens: Some(resp.usage.output_tokens),
        cache_read_input_tokens: Some(resp.usage.cache_read_input_tokens),
        cache_creation_input_tokens: Some(resp.usage.cache_creation_input_tokens),
    }
}

fn usage_from_claude_stream(event: &BetaStreamEvent) -> Option<UsageSummary> {
    match event {
        BetaStreamEvent::Known(BetaStreamEventKnown::MessageStart { message }) => {
            Some(usage_from_claude_stream_usage(&message.usage))
        }
        BetaStreamEvent::Known(BetaStreamEventKnown::MessageDelta { usage, .. }) => {
            Some(usage_from_claude_stream_usage(usage))
        }
        _ => None,
    }
}

fn usage_from_claude_stream_usage(usage: &BetaStreamUsage) -> UsageSummary {
    UsageSummary {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        cache_read_input_tokens: usage.cache_read_input_tokens,
        cache_creation_input_tokens: usage.cache_creation_input_tokens,
    }
}

fn usage_from_openai_chat_usage(usage: &CompletionUsage) -> UsageSummary {
    UsageSummary {
        input_tokens: Some(clamp_i64_to_u32(usage.prompt_tokens)),
        output_tokens: Some(clamp_i64_to_u32(usage.completion_tokens)),
        cache_read_input_tokens: usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|details| details.cached_tokens)
            .map(clamp_i64_to_u32),
        cache_creation_input_tokens: None,
    }
}

fn usage_from_openai_response_usage(usage: &ResponseUsage) -> UsageSummary {
    UsageSummary {
        input_tokens: Some(clamp_i64_to_u32(usage.input_tokens)),
        output_tokens: Some(clamp_i64_to_u32(usage.output_tokens)),
        cache_read_input_tokens: None,
        cache_creation_input_tokens: None,
    }
}

fn usage_from_openai_response_stream(event: &ResponseStreamEvent) -> Option<UsageSummary> {
    let response = match event {
        ResponseStreamEvent::Created(ResponseCreatedEvent { response, .. }) => Some(response),
        ResponseStreamEvent::InProgress(ResponseInProgressEvent { response, .. }) => Some(response),
        ResponseStreamEvent::Completed(ResponseCompletedEvent { response, .. }) => Some(response),
        ResponseStreamEvent::Failed(ResponseFailedEvent { response, .. }) => Some(response),
        ResponseStreamEvent::Incomplete(ResponseIncompleteEvent { response, .. }) => Some(response),
        _ => None,
    };

    response
        .and_then(|resp| resp.usage.as_ref())
        .map(usage_from_openai_response_usage)
}

fn usage_from_gemini_usage(usage: &GeminiUsageMetadata) -> UsageSummary {
    UsageSummary {
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
        cache_read_input_tokens: None,
        cache_creation_input_tokens: None,
    }
}

fn clamp_i64_to_u32(value: i64) -> u32 {
    if value <= 0 {
        0
    } else if value > i64::from(u32::MAX) {
        u32::MAX
    } else {
        value as u32
    }
}

fn render_claude_output(resp: &ClaudeCreateMessageResponse) -> String {
    let mut out = String::new();
    for block in &resp.content {
        match block {
            BetaContentBlock::Text(text) => {
                out.push_str(&text.text);
            }
            _ => {
                if let Ok(json) = serde_json::to_string(block) {
                    out.push_str(&json);
                }
            }
        }
    }
    out
}

fn render_openai_chat_output(resp: &OpenAIChatCompletionResponse) -> String {
    let mut out = String::new();
    for choice in &resp.choices {
        let message = &choice.message;
        if let Some(content) = &message.content {
            out.push_str(content);
        }
        if let Some(refusal) = &message.refusal {
            out.push_str(refusal);
        }
        if let Some(tool_calls) = &message.tool_calls
            && let Ok(json) = serde_json::to_string(tool_calls)
        {
            out.push_str(&json);
        }
    }
    out
}

fn render_openai_response_output(resp: &OpenAIResponse) -> String {
    let mut out = String::new();
    if resp.output.is_empty() {
        if let Some(output_text) = &resp.output_text {
            out.push_str(output_text);
        }
        return out;
    }
    for item in &resp.output {
        match item {
            OutputItem::Message(message) => {
                append_openai_message_output(&mut out, message);
            }
            _ => {
                if let Ok(json) = serde_json::to_string(item) {
                    out.push_str(&json);
                }
            }
        }
    }
    out
}

fn append_openai_message_output(out: &mut String, message: &OutputMessage) {
    for content in &message.content {
        match content {
            OutputMessageContent::OutputText(text) => {
                out.push_str(&text.text);
            }
            OutputMessageContent::Refusal(refusal) => {
                out.push_str(&refusal.refusal);
            }
        }
    }
}

fn render_gemini_output(resp: &GeminiGenerateContentResponse) -> String {
    let mut out = String::new();
    for candidate in &resp.candidates {
        for part in &candidate.content.parts {
            append_gemini_part(&mut out, part);
        }
    }
    out
}

fn append_gemini_response_text(out: &mut String, resp: &StreamGenerateContentResponse) {
    for candidate in &resp.candidates {
        for part in &candidate.content.parts {
            append_gemini_part(out, part);
        }
    }
}

fn append_gemini_part(out: &mut String, part: &GeminiPart) {
    if let Some(text) = &part.text {
        out.push_str(text);
        return;
    }
    if let Some(value) = &part.function_call
        && let Ok(json) = serde_json::to_string(value)
    {
        out.push_str(&json);
        return;
    }
    if let Some(value) = &part.function_response
        && let Ok(json) = serde_json::to_string(value)
    {
        out.push_str(&json);
    }
}

fn merge_usage(base: &mut UsageSummary, incoming: UsageSummary) {
    if incoming.input_tokens.is_some() {
        base.input_tokens = incoming.input_tokens;
    }
    if incoming.output_tokens.is_some() {
        base.output_tokens = incoming.output_tokens;
    }
    if incoming.cache_read_input_tokens.is_some() {
        base.cache_read_input_tokens = incoming.cache_read_input_tokens;
    }
    if incoming.cache_creation_input_tokens.is_some() {
        base.cache_creation_input_tokens = incoming.cache_creation_input_tokens;
    }
}
