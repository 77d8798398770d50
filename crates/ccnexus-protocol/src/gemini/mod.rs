pub mod generate_content;
pub mod stream_content;
pub mod types;

pub use generate_content::{
    GenerateContentPath, GenerateContentRequest, GenerateContentRequestBody,
    GenerateContentResponse,
};
pub use stream_content::{StreamGenerateContentRequest, StreamGenerateContentResponse};
pub use types::*;
