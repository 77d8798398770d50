pub mod claude;
pub mod gemini;
pub mod openai_chat_completions;
pub mod openai_response;

pub use claude::ClaudeStreamToMessageState;
pub use gemini::GeminiStreamToResponseState;
pub use openai_chat_completions::OpenAIChatCompletionStreamToResponseState;
pub use openai_response::OpenAIResponseStreamToResponseState;
