use serde::{Deserialize, Serialize};

use ccnexus_protocol::claude::create_message::request::CreateMessageRequest as ClaudeCreateMessageRequest;
use ccnexus_protocol::claude::create_message::response::CreateMessageResponse as ClaudeCreateMessageResponse;
use ccnexus_protocol::claude::create_message::stream::BetaStreamEvent;
use ccnexus_protocol::gemini::generate_content::request::GenerateContentRequest as GeminiGenerateContentRequest;
use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse as GeminiGenerateContentResponse;
use ccnexus_protocol::gemini::stream_content::request::StreamGenerateContentRequest as GeminiStreamGenerateContentRequest;
use ccnexus_protocol::gemini::stream_content::response::StreamGenerateContentResponse;
use ccnexus_protocol::openai::create_chat_completions::request::CreateChatCompletionRequest as OpenAIChatCompletionRequest;
use ccnexus_protocol::openai::create_chat_completions::response::CreateChatCompletionResponse as OpenAIChatCompletionResponse;
use ccnexus_protocol::openai::create_chat_completions::stream::CreateChatCompletionStreamResponse;
use ccnexus_protocol::openai::create_response::request::CreateResponseRequest as OpenAIResponseRequest;
use ccnexus_protocol::openai::create_response::response::Response as OpenAIResponse;
use ccnexus_protocol::openai::create_response::stream::ResponseStreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Proto {
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "openai_chat")]
    OpenAIChat,
    #[serde(rename = "openai_response")]
    OpenAIResponse,
    #[serde(rename = "gemini")]
    Gemini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    GenerateContent,
    StreamGenerateContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformContext {
    pub src: Proto,
    pub dst: Proto,
    pub src_op: Op,
    pub dst_op: Op,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFormat {
    SseNamedEvent,
    SseDataOnly,
    JsonStream,
}

pub fn stream_format(proto: Proto) -> StreamFormat {
    match proto {
        Proto::Claude => StreamFormat::SseNamedEvent,
        Proto::OpenAIChat => StreamFormat::SseDataOnly,
        Proto::OpenAIResponse => StreamFormat::SseNamedEvent,
        Proto::Gemini => StreamFormat::JsonStream,
    }
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone)]
pub enum Request {
    GenerateContent(GenerateContentRequest),
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone)]
pub enum Response {
    GenerateContent(GenerateContentResponse),
}

#[derive(Debug, Clone)]
pub enum GenerateContentRequest {
    Claude(ClaudeCreateMessageRequest),
    OpenAIChat(OpenAIChatCompletionRequest),
    OpenAIResponse(OpenAIResponseRequest),
    Gemini(GeminiGenerateContentRequest),
    GeminiStream(GeminiStreamGenerateContentRequest),
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone)]
pub enum GenerateContentResponse {
    Claude(ClaudeCreateMessageResponse),
    OpenAIChat(OpenAIChatCompletionResponse),
    OpenAIResponse(OpenAIResponse),
    Gemini(GeminiGenerateContentResponse),
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Claude(BetaStreamEvent),
    OpenAIChat(CreateChatCompletionStreamResponse),
    OpenAIResponse(ResponseStreamEvent),
    Gemini(StreamGenerateContentResponse),
}

#[derive(Debug, Clone)]
pub enum TransformError {
    OpMismatch,
    ProtoMismatch,
    StreamMismatch,
    UnsupportedPair {
        src: Proto,
        dst: Proto,
        src_op: Op,
        dst_op: Op,
    },
}
