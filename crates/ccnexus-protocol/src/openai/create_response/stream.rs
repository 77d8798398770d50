use serde::{Deserialize, Serialize};

use crate::openai::create_response::response::Response;
use crate::openai::create_response::types::{OutputItem, OutputMessageContent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseStreamEvent {
    #[serde(rename = "response.created")]
    Created(ResponseCreatedEvent),
    #[serde(rename = "response.in_progress")]
    InProgress(ResponseInProgressEvent),
    #[serde(rename = "response.completed")]
    Completed(ResponseCompletedEvent),
    #[serde(rename = "response.failed")]
    Failed(ResponseFailedEvent),
    #[serde(rename = "response.incomplete")]
    Incomplete(ResponseIncompleteEvent),
    #[serde(rename = "error")]
    Error(ResponseErrorEvent),
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded(ResponseOutputItemAddedEvent),
    #[serde(rename = "response.output_item.done")]
    OutputItemDone(ResponseOutputItemDoneEvent),
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded(ResponseContentPartAddedEvent),
    #[serde(rename = "response.content_part.done")]
    ContentPartDone(ResponseContentPartDoneEvent),
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta(ResponseTextDeltaEvent),
    #[serde(rename = "response.output_text.done")]
    OutputTextDone(ResponseTextDoneEvent),
    #[serde(rename = "response.refusal.delta")]
    RefusalDelta(ResponseRefusalDeltaEvent),
    #[serde(rename = "response.refusal.done")]
    RefusalDone(ResponseRefusalDoneEvent),
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta(ResponseFunctionCallArgumentsDeltaEvent),
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone(ResponseFunctionCallArgumentsDoneEvent),
    #[serde(rename = "response.reasoning_text.delta")]
    ReasoningTextDelta(ResponseReasoningTextDeltaEvent),
    #[serde(rename = "response.reasoning_text.done")]
    ReasoningTextDone(ResponseReasoningTextDoneEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseCreatedEvent {
    pub response: Response,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseInProgressEvent {
    pub response: Response,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseCompletedEvent {
    pub response: Response,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseFailedEvent {
    pub response: Response,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseIncompleteEvent {
    pub response: Response,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseErrorEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseOutputItemAddedEvent {
    pub output_index: i64,
    pub item: OutputItem,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseOutputItemDoneEvent {
    pub output_index: i64,
    pub item: OutputItem,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseContentPartAddedEvent {
    pub item_id: String,
    pub output_index: i64,
    pub content_index: i64,
    pub part: OutputMessageContent,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseContentPartDoneEvent {
    pub item_id: String,
    pub output_index: i64,
    pub content_index: i64,
    pub part: OutputMessageContent,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseTextDeltaEvent {
    pub item_id: String,
    pub output_index: i64,
    pub content_index: i64,
    pub delta: String,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseTextDoneEvent {
    pub item_id: String,
    pub output_index: i64,
    pub content_index: i64,
    pub text: String,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseRefusalDeltaEvent {
    pub item_id: String,
    pub output_index: i64,
    pub content_index: i64,
    pub delta: String,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseRefusalDoneEvent {
    pub item_id: String,
    pub output_index: i64,
    pub content_index: i64,
    pub refusal: String,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseFunctionCallArgumentsDeltaEvent {
    pub item_id: String,
    pub output_index: i64,
    pub delta: String,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseFunctionCallArgumentsDoneEvent {
    pub item_id: String,
    pub name: String,
    pub output_index: i64,
    pub arguments: String,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseReasoningTextDeltaEvent {
    pub item_id: String,
    pub output_index: i64,
    pub content_index: i64,
    pub delta: String,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseReasoningTextDoneEvent {
    pub item_id: String,
    pub output_index: i64,
    pub content_index: i64,
    pub text: String,
    pub sequence_number: i64,
}
