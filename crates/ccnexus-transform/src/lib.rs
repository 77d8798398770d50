pub mod generate_content;
pub mod middleware;
pub mod stream2nostream;

pub use middleware::{
    GenerateContentRequest, GenerateContentResponse, NostreamToStream, Op, OutputAccumulator,
    Proto, Request, Response, StreamEvent, StreamFormat, StreamToNostream, StreamTransformer,
    TransformContext, TransformError, UsageAccumulator, UsageSummary, estimate_tokens,
    output_for_counting, stream_format, transform_request, transform_response, usage_from_response,
};
