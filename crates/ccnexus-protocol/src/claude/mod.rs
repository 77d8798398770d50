pub mod create_message;
pub mod error;
pub mod types;

pub use error::{ErrorDetail, ErrorResponse, ErrorType};
pub use types::{AnthropicHeaders, AnthropicVersion, Model};
