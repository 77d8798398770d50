pub mod create_chat_completions;
pub mod create_response;
pub mod types;

pub use create_chat_completions::{
    CreateChatCompletionRequest, CreateChatCompletionRequestBody, CreateChatCompletionResponse,
    CreateChatCompletionStreamResponse, StopConfiguration,
};
pub use create_response::{
    CreateResponseRequest, CreateResponseRequestBody, Response, ResponseStreamEvent,
};
