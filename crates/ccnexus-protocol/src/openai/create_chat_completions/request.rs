use serde::{Deserialize, Serialize};

use crate::openai::create_chat_completions::types::{
    ChatCompletionRequestMessage, ChatCompletionResponseFormat, ChatCompletionToolChoiceOption,
    ChatCompletionToolDefinition, Metadata,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreateChatCompletionRequestBody {
    /// A list of messages comprising the conversation so far.
    /// Must contain at least 1 message (not enforced here).
    pub messages: Vec<ChatCompletionRequestMessage>,
    /// Model ID used to generate the response.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Total prompt tokens plus `max_completion_tokens` must fit the model context (not enforced here).
    pub max_completion_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ChatCompletionResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Deprecated; total prompt tokens plus `max_tokens` must fit the model context (not enforced here).
    pub max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatCompletionToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ChatCompletionToolChoiceOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Range is 0..=2.0; generally avoid setting both temperature and top_p (not enforced here).
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Range is 0.0..=1.0; generally avoid setting both top_p and temperature (not enforced here).
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateChatCompletionRequest {
    pub body: CreateChatCompletionRequestBody,
}

/// Up to 4 stop sequences are allowed, but this limit is not enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopConfiguration {
    Single(String),
    Many(Vec<String>),
}
