pub use crate::openai::create_chat_completions::types::*;
pub use crate::openai::create_response::types::*;
