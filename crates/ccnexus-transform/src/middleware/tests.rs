use super::*;

use ccnexus_protocol::claude::create_message::types::{
    BetaMessage, BetaMessageRole, BetaMessageType, BetaUsage, Model as ClaudeModel,
};
use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse as GeminiGenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::UsageMetadata;
use ccnexus_protocol::openai::create_chat_completions::request::{
    CreateChatCompletionRequest, CreateChatCompletionRequestBody,
};
use ccnexus_protocol::openai::create_chat_completions::response::{
    ChatCompletionChoice, ChatCompletionObjectType, CreateChatCompletionResponse,
};
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionFinishReason, ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    ChatCompletionResponseMessage, ChatCompletionResponseRole, ChatCompletionUserContent,
    CompletionUsage, PromptTokensDetails,
};
use ccnexus_protocol::openai::create_response::response::{
    Response as OpenAIResponse, ResponseObjectType,
};
use ccnexus_protocol::openai::create_response::types::ResponseUsage;

#[test]
fn stream_format_basic() {
    assert_eq!(stream_format(Proto::Claude), StreamFormat::SseNamedEvent);
    assert_eq!(stream_format(Proto::OpenAIChat), StreamFormat::SseDataOnly);
    assert_eq!(
        stream_format(Proto::OpenAIResponse),
        StreamFormat::SseNamedEvent
    );
    assert_eq!(stream_format(Proto::Gemini), StreamFormat::JsonStream);
}

fn make_openai_chat_request(stream: Option<bool>) -> CreateChatCompletionRequest {
    let message = ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
        content: ChatCompletionUserContent::Text("hi".to_string()),
        name: None,
    });

    CreateChatCompletionRequest {
        body: CreateChatCompletionRequestBody {
            messages: vec![message],
            model: "gpt-test".to_string(),
            max_completion_tokens: None,
            response_format: None,
            stream,
            stop: None,
            max_tokens: None,
            seed: None,
            tools: None,
            tool_choice: None,
            parallel_tool_calls: None,
            metadata: None,
            temperature: None,
            top_p: None,
            user: None,
        },
    }
}

fn make_openai_chat_response_with_usage(usage: CompletionUsage) -> CreateChatCompletionResponse {
    let message = ChatCompletionResponseMessage {
        role: ChatCompletionResponseRole::Assistant,
        content: Some("ok".to_string()),
        refusal: None,
        tool_calls: None,
    };
    let choice = ChatCompletionChoice {
        index: 0,
        message,
        finish_reason: ChatCompletionFinishReason::Stop,
    };

    CreateChatCompletionResponse {
        id: "chatcmpl-test".to_string(),
        object: ChatCompletionObjectType::ChatCompletion,
        created: 0,
        model: "gpt-test".to_string(),
        choices: vec![choice],
        usage: Some(usage),
        system_fingerprint: None,
    }
}

fn make_openai_response_with_usage(usage: ResponseUsage) -> OpenAIResponse {
    OpenAIResponse {
        id: "resp-test".to_string(),
        object: ResponseObjectType::Response,
        created_at: 0,
        status: None,
        completed_at: None,
        error: None,
        incomplete_details: None,
        instructions: None,
        model: "gpt-test".to_string(),
        output: Vec::new(),
        output_text: None,
        usage: Some(usage),
        parallel_tool_calls: None,
        max_output_tokens: None,
        text: None,
        tools: None,
        tool_choice: None,
        metadata: None,
        temperature: None,
        top_p: None,
        user: None,
    }
}

fn make_claude_response_with_usage(
    usage: BetaUsage,
) -> ccnexus_protocol::claude::create_message::response::CreateMessageResponse {
    BetaMessage {
        id: "claude-test".to_string(),
        content: Vec::new(),
        model: ClaudeModel::Custom("claude-test".to_string()),
        role: BetaMessageRole::Assistant,
        stop_reason: None,
        stop_sequence: None,
        r#type: BetaMessageType::Message,
        usage,
    }
}

fn make_gemini_response_with_usage(usage: UsageMetadata) -> GeminiGenerateContentResponse {
    GeminiGenerateContentResponse {
        candidates: Vec::new(),
        prompt_feedback: None,
        usage_metadata: Some(usage),
    }
}

#[test]
fn openai_chat_stream_flag_set_on_transform() {
    let ctx = TransformContext {
        src: Proto::OpenAIChat,
        dst: Proto::OpenAIChat,
        src_op: Op::StreamGenerateContent,
        dst_op: Op::StreamGenerateContent,
    };
    let req = make_openai_chat_request(Some(true));
    let out = transform_request(
        &ctx,
        Request::GenerateContent(GenerateContentRequest::OpenAIChat(req)),
    )
    .unwrap();
    let out_req = match out {
        Request::GenerateContent(GenerateContentRequest::OpenAIChat(req)) => req,
    };
    assert_eq!(out_req.body.stream, Some(true));
}

#[test]
fn non_stream_request_rejected_for_stream_op() {
    let ctx = TransformContext {
        src: Proto::OpenAIChat,
        dst: Proto::OpenAIChat,
        src_op: Op::StreamGenerateContent,
        dst_op: Op::StreamGenerateContent,
    };
    let req = make_openai_chat_request(Some(false));
    let out = transform_request(
        &ctx,
        Request::GenerateContent(GenerateContentRequest::OpenAIChat(req)),
    );
    assert!(matches!(out, Err(TransformError::StreamMismatch)));
}

#[test]
fn usage_mapping_claude() {
    let usage = BetaUsage {
        input_tokens: 1,
        output_tokens: 2,
        cache_creation_input_tokens: 4,
        cache_read_input_tokens: 3,
    };
    let resp = make_claude_response_with_usage(usage);
    let summary =
        usage_from_response(Proto::Claude, &GenerateContentResponse::Claude(resp)).unwrap();
    assert_eq!(summary.input_tokens, Some(1));
    assert_eq!(summary.output_tokens, Some(2));
    assert_eq!(summary.cache_read_input_tokens, Some(3));
    assert_eq!(summary.cache_creation_input_tokens, Some(4));
}

#[test]
fn usage_mapping_openai_chat() {
    let usage = CompletionUsage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
        completion_tokens_details: None,
        prompt_tokens_details: Some(PromptTokensDetails {
            cached_tokens: Some(7),
        }),
    };
    let resp = make_openai_chat_response_with_usage(usage);
    let summary = usage_from_response(
        Proto::OpenAIChat,
        &GenerateContentResponse::OpenAIChat(resp),
    )
    .unwrap();
    assert_eq!(summary.input_tokens, Some(10));
    assert_eq!(summary.output_tokens, Some(5));
    assert_eq!(summary.cache_read_input_tokens, Some(7));
    assert_eq!(summary.cache_creation_input_tokens, None);
}

#[test]
fn usage_mapping_openai_response() {
    let usage = ResponseUsage {
        input_tokens: 11,
        output_tokens: 22,
        total_tokens: 33,
    };
    let resp = make_openai_response_with_usage(usage);
    let summary = usage_from_response(
        Proto::OpenAIResponse,
        &GenerateContentResponse::OpenAIResponse(resp),
    )
    .unwrap();
    assert_eq!(summary.input_tokens, Some(11));
    assert_eq!(summary.output_tokens, Some(22));
    assert_eq!(summary.cache_read_input_tokens, None);
    assert_eq!(summary.cache_creation_input_tokens, None);
}

#[test]
fn usage_mapping_gemini() {
    let usage = UsageMetadata {
        prompt_token_count: Some(1),
        candidates_token_count: Some(3),
        thoughts_token_count: None,
        total_token_count: None,
    };
    let resp = make_gemini_response_with_usage(usage);
    let summary =
        usage_from_response(Proto::Gemini, &GenerateContentResponse::Gemini(resp)).unwrap();
    assert_eq!(summary.input_tokens, Some(1));
    assert_eq!(summary.output_tokens, Some(3));
    assert_eq!(summary.cache_read_input_tokens, None);
    assert_eq!(summary.cache_creation_input_tokens, None);
}

#[test]
fn fallback_usage_uses_character_heuristic() {
    let accumulator = UsageAccumulator::new(Proto::OpenAIChat);
    let summary = accumulator.finalize_with_fallback("hello world", "hi there");
    assert_eq!(summary.input_tokens, Some(estimate_tokens("hello world")));
    assert_eq!(summary.output_tokens, Some(estimate_tokens("hi there")));
    assert_eq!(summary.cache_read_input_tokens, None);
    assert_eq!(summary.cache_creation_input_tokens, None);
}

#[test]
fn estimate_tokens_rounds_up() {
    assert_eq!(estimate_tokens(""), 0);
    assert_eq!(estimate_tokens("abcd"), 1);
    assert_eq!(estimate_tokens("abcde"), 2);
}

#[test]
fn passthrough_transformer_rejects_proto_mismatch() {
    use ccnexus_protocol::openai::create_chat_completions::stream::{
        ChatCompletionChunkObjectType, CreateChatCompletionStreamResponse,
    };

    let ctx = TransformContext {
        src: Proto::Claude,
        dst: Proto::Claude,
        src_op: Op::StreamGenerateContent,
        dst_op: Op::StreamGenerateContent,
    };
    let mut transformer = StreamTransformer::new(&ctx).unwrap();
    let event = StreamEvent::OpenAIChat(CreateChatCompletionStreamResponse {
        id: "chatcmpl-test".to_string(),
        object: ChatCompletionChunkObjectType::ChatCompletionChunk,
        created: 0,
        model: "gpt-test".to_string(),
        choices: Vec::new(),
        usage: None,
        system_fingerprint: None,
    });
    assert!(matches!(
        transformer.push(event),
        Err(TransformError::ProtoMismatch)
    ));
}
