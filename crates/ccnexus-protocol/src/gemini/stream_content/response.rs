use crate::gemini::generate_content::GenerateContentResponse;

/// Each SSE chunk of a `streamGenerateContent` response has the same shape
/// as the non-streaming response, carrying the incremental candidates.
pub type StreamGenerateContentResponse = GenerateContentResponse;
