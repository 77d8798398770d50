use std::collections::BTreeMap;

use ccnexus_protocol::openai::create_chat_completions::response::{
    ChatCompletionChoice, ChatCompletionObjectType, CreateChatCompletionResponse,
};
use ccnexus_protocol::openai::create_chat_completions::stream::CreateChatCompletionStreamResponse;
use ccnexus_protocol::openai::create_chat_completions::types::{
    ChatCompletionFinishReason, ChatCompletionMessageToolCall, ChatCompletionMessageToolCallChunk,
    ChatCompletionMessageToolCallFunction, ChatCompletionResponseMessage, ChatCompletionResponseRole,
    ChatCompletionToolCallType, CompletionUsage,
};

#[derive(Debug, Clone)]
struct ToolCallState {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

#[derive(Debug, Clone)]
struct ChoiceState {
    role: ChatCompletionResponseRole,
    content: String,
    refusal: String,
    tool_calls: BTreeMap<i64, ToolCallState>,
    finish_reason: Option<ChatCompletionFinishReason>,
}

#[derive(Debug, Clone)]
pub struct OpenAIChatCompletionStreamToResponseState {
    id: String,
    model: String,
    created: i64,
    usage: Option<CompletionUsage>,
    system_fingerprint: Option<String>,
    choices: BTreeMap<i64, ChoiceState>,
}

impl OpenAIChatCompletionStreamToResponseState {
    pub fn new() -> Self {
        Self {
            id: "chatcmpl".to_string(),
            model: "unknown".to_string(),
            created: 0,
            usage: None,
            system_fingerprint: None,
            choices: BTreeMap::new(),
        }
    }

    pub fn push_chunk(
        &mut self,
        chunk: CreateChatCompletionStreamResponse,
    ) -> Option<CreateChatCompletionResponse> {
        self.update_from_chunk(&chunk);

        for choice in chunk.choices {
            let state = self.ensure_choice(choice.index);
            let delta = choice.delta;

            if let Some(role) = delta.role {
                state.role = role;
            }

            if let Some(content) = delta.content {
                state.content.push_str(&content);
            }

            if let Some(refusal) = delta.refusal {
                state.refusal.push_str(&refusal);
            }

            if let Some(tool_calls) = delta.tool_calls {
                for tool_call in tool_calls {
                    merge_tool_call(state, tool_call);
                }
            }

            if let Some(reason) = choice.finish_reason {
                state.finish_reason = Some(reason);
            }
        }

        if self.is_finished() {
            Some(self.build_response())
        } else {
            None
        }
    }

    pub fn finalize(&self) -> CreateChatCompletionResponse {
        self.build_response()
    }

    pub fn finalize_on_eof(&self) -> CreateChatCompletionResponse {
        self.build_response_with_finish_fallback(ChatCompletionFinishReason::Length)
    }

    fn update_from_chunk(&mut self, chunk: &CreateChatCompletionStreamResponse) {
        self.id = chunk.id.clone();
        self.model = chunk.model.clone();
        self.created = chunk.created;
        if chunk.usage.is_some() {
            self.usage = chunk.usage.clone();
        }
        if chunk.system_fingerprint.is_some() {
            self.system_fingerprint = chunk.system_fingerprint.clone();
        }
    }

    fn ensure_choice(&mut self, index: i64) -> &mut ChoiceState {
        self.choices.entry(index).or_insert_with(|| ChoiceState {
            role: ChatCompletionResponseRole::Assistant,
            content: String::new(),
            refusal: String::new(),
            tool_calls: BTreeMap::new(),
            finish_reason: None,
        })
    }

    fn build_response(&self) -> CreateChatCompletionResponse {
        self.build_response_with_fallback(None)
    }

    fn build_response_with_finish_fallback(
        &self,
        fallback: ChatCompletionFinishReason,
    ) -> CreateChatCompletionResponse {
        self.build_response_with_fallback(Some(fallback))
    }

    fn build_response_with_fallback(
        &self,
        fallback: Option<ChatCompletionFinishReason>,
    ) -> CreateChatCompletionResponse {
        let mut choices: Vec<ChatCompletionChoice> = self
            .choices
            .iter()
            .map(|(index, state)| ChatCompletionChoice {
                index: *index,
                message: build_message(*index, state),
                finish_reason: state
                    .finish_reason
                    .or(fallback)
                    .unwrap_or(ChatCompletionFinishReason::Stop),
            })
            .collect();

        choices.sort_by_key(|choice| choice.index);

        CreateChatCompletionResponse {
            id: self.id.clone(),
            object: ChatCompletionObjectType::ChatCompletion,
            created: self.created,
            model: self.model.clone(),
            choices,
            usage: self.usage.clone(),
            system_fingerprint: self.system_fingerprint.clone(),
        }
    }

    fn is_finished(&self) -> bool {
        if self.choices.is_empty() {
            return false;
        }
        self.choices
            .values()
            .all(|choice| choice.finish_reason.is_some())
    }
}

impl Default for OpenAIChatCompletionStreamToResponseState {
    fn default() -> Self {
        Self::new()
    }
}

fn build_message(index: i64, state: &ChoiceState) -> ChatCompletionResponseMessage {
    let content = if state.content.is_empty() {
        None
    } else {
        Some(state.content.clone())
    };
    let refusal = if state.refusal.is_empty() {
        None
    } else {
        Some(state.refusal.clone())
    };
    let tool_calls = if state.tool_calls.is_empty() {
        None
    } else {
        Some(
            state
                .tool_calls
                .iter()
                .map(|(idx, tool)| ChatCompletionMessageToolCall {
                    id: tool
                        .id
                        .clone()
                        .unwrap_or_else(|| format!("tool_call_{index}_{idx}")),
                    r#type: ChatCompletionToolCallType::Function,
                    function: ChatCompletionMessageToolCallFunction {
                        name: tool.name.clone().unwrap_or_else(|| "tool".to_string()),
                        arguments: tool.arguments.clone(),
                    },
                })
                .collect(),
        )
    };

    ChatCompletionResponseMessage {
        role: state.role,
        content,
        refusal,
        tool_calls,
    }
}

fn merge_tool_call(state: &mut ChoiceState, tool_call: ChatCompletionMessageToolCallChunk) {
    let index = tool_call.index;
    let entry = state
        .tool_calls
        .entry(index)
        .or_insert_with(|| ToolCallState {
            id: tool_call.id.clone(),
            name: None,
            arguments: String::new(),
        });

    if tool_call.id.is_some() {
        entry.id = tool_call.id.clone();
    }

    if let Some(function) = tool_call.function {
        if let Some(name) = function.name {
            entry.name = Some(name);
        }
        if let Some(arguments) = function.arguments {
            entry.arguments.push_str(&arguments);
        }
    }
}
