use std::collections::BTreeMap;

use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::{Candidate, FinishReason, UsageMetadata};
use ccnexus_protocol::gemini::types::{
    Content as GeminiContent, FunctionCall as GeminiFunctionCall, Part as GeminiPart,
    Role as GeminiRole,
};
use ccnexus_protocol::openai::create_response::response::Response;
use ccnexus_protocol::openai::create_response::stream::{
    ResponseCompletedEvent, ResponseFunctionCallArgumentsDeltaEvent,
    ResponseFunctionCallArgumentsDoneEvent, ResponseOutputItemAddedEvent,
    ResponseOutputItemDoneEvent, ResponseRefusalDeltaEvent, ResponseRefusalDoneEvent,
    ResponseStreamEvent, ResponseTextDeltaEvent, ResponseTextDoneEvent,
};
use ccnexus_protocol::openai::create_response::types::{
    FunctionToolCall, OutputItem, ResponseIncompleteDetails, ResponseIncompleteReason,
    ResponseStatus, ResponseUsage,
};

#[derive(Debug, Clone)]
struct ToolState {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Clone)]
pub struct OpenAIResponseToGeminiStreamState {
    response_id: String,
    model_version: String,
    text_buffers: BTreeMap<(i64, i64), String>,
    refusal_buffers: BTreeMap<(i64, i64), String>,
    tool_states: BTreeMap<i64, ToolState>,
    usage: Option<ResponseUsage>,
    saw_refusal: bool,
    finished: bool,
}

impl OpenAIResponseToGeminiStreamState {
    pub fn new() -> Self {
        Self {
            response_id: "response".to_string(),
            model_version: "models/unknown".to_string(),
            text_buffers: BTreeMap::new(),
            refusal_buffers: BTreeMap::new(),
            tool_states: BTreeMap::new(),
            usage: None,
            saw_refusal: false,
            finished: false,
        }
    }

    pub fn transform_event(&mut self, event: ResponseStreamEvent) -> Vec<GenerateContentResponse> {
        if self.finished {
            return Vec::new();
        }

        match event {
            ResponseStreamEvent::Created(event) => {
                self.update_from_response(&event.response);
                Vec::new()
            }
            ResponseStreamEvent::InProgress(event) => {
                self.update_from_response(&event.response);
                Vec::new()
            }
            ResponseStreamEvent::Completed(event) => self.finish_from_response(event),
            ResponseStreamEvent::Failed(event) => {
                self.finish_from_response(ResponseCompletedEvent {
                    response: event.response,
                    sequence_number: event.sequence_number,
                })
            }
            ResponseStreamEvent::Incomplete(event) => {
                self.finish_from_response(ResponseCompletedEvent {
                    response: event.response,
                    sequence_number: event.sequence_number,
                })
            }
            ResponseStreamEvent::OutputItemAdded(event) => self.handle_output_item_added(event),
            ResponseStreamEvent::OutputItemDone(event) => self.handle_output_item_done(event),
            ResponseStreamEvent::OutputTextDelta(event) => self.handle_text_delta(event),
            ResponseStreamEvent::OutputTextDone(event) => self.handle_text_done(event),
            ResponseStreamEvent::RefusalDelta(event) => self.handle_refusal_delta(event),
            ResponseStreamEvent::RefusalDone(event) => self.handle_refusal_done(event),
            ResponseStreamEvent::FunctionCallArgumentsDelta(event) => {
                self.handle_function_call_delta(event)
            }
            ResponseStreamEvent::FunctionCallArgumentsDone(event) => {
                self.handle_function_call_done(event)
            }
            _ => Vec::new(),
        }
    }

    fn handle_output_item_added(
        &mut self,
        event: ResponseOutputItemAddedEvent,
    ) -> Vec<GenerateContentResponse> {
        match event.item {
            OutputItem::Function(function) => self.emit_function_call(event.output_index, function),
            _ => Vec::new(),
        }
    }

    fn handle_output_item_done(
        &mut self,
        event: ResponseOutputItemDoneEvent,
    ) -> Vec<GenerateContentResponse> {
        if let Some(state) = self.tool_states.get(&event.output_index) {
            return self.emit_tool_state(state);
        }
        Vec::new()
    }

    fn handle_text_delta(&mut self, event: ResponseTextDeltaEvent) -> Vec<GenerateContentResponse> {
        if event.delta.is_empty() {
            return Vec::new();
        }
        self.text_buffers
            .entry((event.output_index, event.content_index))
            .and_modify(|value| value.push_str(&event.delta))
            .or_insert_with(|| event.delta.clone());
        self.emit_parts(vec![GeminiPart::text(event.delta)])
    }

    fn handle_text_done(&mut self, event: ResponseTextDoneEvent) -> Vec<GenerateContentResponse> {
        let key = (event.output_index, event.content_index);
        let delta = compute_delta(self.text_buffers.get(&key), &event.text);
        self.text_buffers.insert(key, event.text);
        if delta.is_empty() {
            Vec::new()
        } else {
            self.emit_parts(vec![GeminiPart::text(delta)])
        }
    }

    fn handle_refusal_delta(
        &mut self,
        event: ResponseRefusalDeltaEvent,
    ) -> Vec<GenerateContentResponse> {
        if event.delta.is_empty() {
            return Vec::new();
        }
        self.saw_refusal = true;
        self.refusal_buffers
            .entry((event.output_index, event.content_index))
            .and_modify(|value| value.push_str(&event.delta))
            .or_insert_with(|| event.delta.clone());
        self.emit_parts(vec![GeminiPart::text(event.delta)])
    }

    fn handle_refusal_done(
        &mut self,
        event: ResponseRefusalDoneEvent,
    ) -> Vec<GenerateContentResponse> {
        self.saw_refusal = true;
        let key = (event.output_index, event.content_index);
        let delta = compute_delta(self.refusal_buffers.get(&key), &event.refusal);
        self.refusal_buffers.insert(key, event.refusal);
        if delta.is_empty() {
            Vec::new()
        } else {
            self.emit_parts(vec![GeminiPart::text(delta)])
        }
    }

    fn handle_function_call_delta(
        &mut self,
        event: ResponseFunctionCallArgumentsDeltaEvent,
    ) -> Vec<GenerateContentResponse> {
        let state = self.ensure_tool_state(event.output_index, event.item_id, "function".to_string());
        state.arguments.push_str(&event.delta);
        let snapshot = state.clone();
        self.emit_tool_state(&snapshot)
    }

    fn handle_function_call_done(
        &mut self,
        event: ResponseFunctionCallArgumentsDoneEvent,
    ) -> Vec<GenerateContentResponse> {
        let state = self.ensure_tool_state(event.output_index, event.item_id, event.name);
        state.arguments = event.arguments;
        let snapshot = state.clone();
        self.emit_tool_state(&snapshot)
    }

    fn emit_function_call(
        &mut self,
        output_index: i64,
        call: FunctionToolCall,
    ) -> Vec<GenerateContentResponse> {
        let state = self.ensure_tool_state(output_index, call.id.clone(), call.name.clone());
        state.arguments = call.arguments;
        let snapshot = state.clone();
        self.emit_tool_state(&snapshot)
    }

    fn ensure_tool_state(
        &mut self,
        output_index: i64,
        id: String,
        name: String,
    ) -> &mut ToolState {
        let state = self
            .tool_states
            .entry(output_index)
            .or_insert_with(|| ToolState {
                id,
                name: name.clone(),
                arguments: String::new(),
            });
        if state.name.is_empty() {
            state.name = name;
        }
        state
    }

    fn emit_tool_state(&self, state: &ToolState) -> Vec<GenerateContentResponse> {
        let args = parse_arguments(&state.arguments);

        let part = GeminiPart {
            function_call: Some(GeminiFunctionCall {
                id: Some(state.id.clone()),
                name: state.name.clone(),
                args,
            }),
            ..Default::default()
        };

        self.emit_parts(vec![part])
    }

    fn emit_parts(&self, parts: Vec<GeminiPart>) -> Vec<GenerateContentResponse> {
        let parts: Vec<GeminiPart> = parts.into_iter().filter(part_has_payload).collect();
        if parts.is_empty() {
            return Vec::new();
        }

        let candidate = Candidate {
            content: GeminiContent {
                parts,
                role: Some(GeminiRole::Model),
            },
            finish_reason: None,
            index: Some(0),
        };

        vec![GenerateContentResponse {
            candidates: vec![candidate],
            prompt_feedback: None,
            usage_metadata: None,
            model_version: Some(self.model_version.clone()),
            response_id: Some(self.response_id.clone()),
        }]
    }

    fn finish_from_response(
        &mut self,
        event: ResponseCompletedEvent,
    ) -> Vec<GenerateContentResponse> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        self.update_from_response(&event.response);
        let finish_reason = if self.saw_refusal {
            FinishReason::Safety
        } else {
            map_finish_reason(
                event.response.status,
                event.response.incomplete_details.as_ref(),
            )
        };

        let candidate = Candidate {
            content: GeminiContent {
                parts: Vec::new(),
                role: Some(GeminiRole::Model),
            },
            finish_reason: Some(finish_reason),
            index: Some(0),
        };

        vec![GenerateContentResponse {
            candidates: vec![candidate],
            prompt_feedback: None,
            usage_metadata: self.usage.as_ref().map(map_usage),
            model_version: Some(self.model_version.clone()),
            response_id: Some(self.response_id.clone()),
        }]
    }

    fn update_from_response(&mut self, response: &Response) {
        self.response_id = response.id.clone();
        self.model_version = map_model_version(&response.model);
        if let Some(usage) = &response.usage {
            self.usage = Some(usage.clone());
        }
    }
}

impl Default for OpenAIResponseToGeminiStreamState {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_delta(previous: Option<&String>, full: &str) -> String {
    match previous {
        Some(prev) if full.starts_with(prev) => full[prev.len()..].to_string(),
        _ => full.to_string(),
    }
}

fn parse_arguments(raw: &str) -> ccnexus_protocol::gemini::types::JsonObject {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Default::default(),
    }
}

fn part_has_payload(part: &GeminiPart) -> bool {
    part.text
        .as_ref()
        .map(|text| !text.is_empty())
        .unwrap_or(false)
        || part.function_call.is_some()
        || part.function_response.is_some()
        || part.inline_data.is_some()
        || part.thought.is_some()
        || part.thought_signature.is_some()
}

fn map_finish_reason(
    status: Option<ResponseStatus>,
    details: Option<&ResponseIncompleteDetails>,
) -> FinishReason {
    match status {
        Some(ResponseStatus::Incomplete) => match details.map(|d| d.reason) {
            Some(ResponseIncompleteReason::MaxOutputTokens) => FinishReason::MaxTokens,
            Some(ResponseIncompleteReason::ContentFilter) => FinishReason::Safety,
            None => FinishReason::Other,
        },
        Some(ResponseStatus::Failed) | Some(ResponseStatus::Cancelled) => FinishReason::Other,
        Some(ResponseStatus::Completed) => FinishReason::Stop,
        _ => FinishReason::Stop,
    }
}

fn map_usage(usage: &ResponseUsage) -> UsageMetadata {
    UsageMetadata {
        prompt_token_count: Some(usage.input_tokens.max(0) as u32),
        candidates_token_count: Some(usage.output_tokens.max(0) as u32),
        thoughts_token_count: None,
        total_token_count: Some(usage.total_tokens.max(0) as u32),
    }
}

fn map_model_version(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
