use std::collections::BTreeMap;

use ccnexus_protocol::openai::create_response::response::Response;
use ccnexus_protocol::openai::create_response::stream::{
    ResponseContentPartAddedEvent, ResponseContentPartDoneEvent,
    ResponseFunctionCallArgumentsDeltaEvent, ResponseFunctionCallArgumentsDoneEvent,
    ResponseOutputItemAddedEvent, ResponseOutputItemDoneEvent, ResponseRefusalDeltaEvent,
    ResponseRefusalDoneEvent, ResponseStreamEvent, ResponseTextDeltaEvent, ResponseTextDoneEvent,
};
use ccnexus_protocol::openai::create_response::types::{
    FunctionToolCall, FunctionToolCallType, MessageStatus, OutputItem, OutputMessage,
    OutputMessageContent, OutputMessageRole, OutputMessageType, OutputTextContent,
    ReasoningItemStatus, RefusalContent, ResponseStatus,
};

#[derive(Debug, Clone)]
enum MessagePartState {
    Text(OutputTextContent),
    Refusal(RefusalContent),
}

#[derive(Debug, Clone)]
pub struct OpenAIResponseStreamToResponseState {
    response: Option<Response>,
    output_items: BTreeMap<i64, OutputItem>,
    message_parts: BTreeMap<(i64, i64), MessagePartState>,
}

impl OpenAIResponseStreamToResponseState {
    pub fn new() -> Self {
        Self {
            response: None,
            output_items: BTreeMap::new(),
            message_parts: BTreeMap::new(),
        }
    }

    pub fn push_event(&mut self, event: ResponseStreamEvent) -> Option<Response> {
        match event {
            ResponseStreamEvent::Created(event) => {
                self.response = Some(event.response);
                None
            }
            ResponseStreamEvent::InProgress(event) => {
                self.response = Some(event.response);
                None
            }
            ResponseStreamEvent::Completed(event) => Some(self.finish_from_response(event.response)),
            ResponseStreamEvent::Failed(event) => Some(self.finish_from_response(event.response)),
            ResponseStreamEvent::Incomplete(event) => {
                Some(self.finish_from_response(event.response))
            }
            ResponseStreamEvent::Error(_) => None,
            ResponseStreamEvent::OutputItemAdded(event) => {
                self.handle_output_item_added(event);
                None
            }
            ResponseStreamEvent::OutputItemDone(event) => {
                self.handle_output_item_done(event);
                None
            }
            ResponseStreamEvent::ContentPartAdded(event) => {
                self.handle_content_part_added(event);
                None
            }
            ResponseStreamEvent::ContentPartDone(event) => {
                self.handle_content_part_done(event);
                None
            }
            ResponseStreamEvent::OutputTextDelta(event) => {
                self.handle_text_delta(event);
                None
            }
            ResponseStreamEvent::OutputTextDone(event) => {
                self.handle_text_done(event);
                None
            }
            ResponseStreamEvent::RefusalDelta(event) => {
                self.handle_refusal_delta(event);
                None
            }
            ResponseStreamEvent::RefusalDone(event) => {
                self.handle_refusal_done(event);
                None
            }
            ResponseStreamEvent::FunctionCallArgumentsDelta(event) => {
                self.handle_function_call_delta(event);
                None
            }
            ResponseStreamEvent::FunctionCallArgumentsDone(event) => {
                self.handle_function_call_done(event);
                None
            }
            ResponseStreamEvent::ReasoningTextDelta(_) | ResponseStreamEvent::ReasoningTextDone(_) => {
                None
            }
        }
    }

    pub fn finalize(&mut self) -> Option<Response> {
        let mut response = self.response.take()?;
        self.apply_output_items(&mut response);
        Some(response)
    }

    pub fn finalize_on_eof(&mut self) -> Option<Response> {
        let mut response = self.response.take()?;
        let current = response.status.unwrap_or(ResponseStatus::InProgress);
        let status = match current {
            ResponseStatus::Completed
            | ResponseStatus::Failed
            | ResponseStatus::Cancelled
            | ResponseStatus::Incomplete => current,
            ResponseStatus::InProgress => ResponseStatus::Incomplete,
        };
        response.status = Some(status);
        self.apply_output_items(&mut response);
        Some(response)
    }

    fn finish_from_response(&mut self, response: Response) -> Response {
        self.response = Some(response.clone());
        let mut response = response;
        self.apply_output_items(&mut response);
        response
    }

    fn handle_output_item_added(&mut self, event: ResponseOutputItemAddedEvent) {
        self.merge_output_item(event.output_index, event.item);
        self.sync_message_content(event.output_index);
    }

    fn handle_output_item_done(&mut self, event: ResponseOutputItemDoneEvent) {
        self.merge_output_item(event.output_index, event.item);
        self.sync_message_content(event.output_index);
    }

    fn handle_content_part_added(&mut self, event: ResponseContentPartAddedEvent) {
        self.apply_output_content(event.output_index, event.content_index, event.part);
    }

    fn handle_content_part_done(&mut self, event: ResponseContentPartDoneEvent) {
        self.apply_output_content(event.output_index, event.content_index, event.part);
    }

    fn apply_output_content(&mut self, output_index: i64, content_index: i64, part: OutputMessageContent) {
        let state = match part {
            OutputMessageContent::OutputText(text) => MessagePartState::Text(text),
            OutputMessageContent::Refusal(refusal) => MessagePartState::Refusal(refusal),
        };
        self.message_parts.insert((output_index, content_index), state);
        self.sync_message_content(output_index);
    }

    fn handle_text_delta(&mut self, event: ResponseTextDeltaEvent) {
        self.ensure_message(event.output_index, &event.item_id);
        let key = (event.output_index, event.content_index);
        let entry = self
            .message_parts
            .entry(key)
            .or_insert_with(|| MessagePartState::Text(OutputTextContent { text: String::new() }));

        if let MessagePartState::Text(text) = entry {
            text.text.push_str(&event.delta);
        }
        self.sync_message_content(event.output_index);
    }

    fn handle_text_done(&mut self, event: ResponseTextDoneEvent) {
        self.ensure_message(event.output_index, &event.item_id);
        let key = (event.output_index, event.content_index);
        self.message_parts
            .insert(key, MessagePartState::Text(OutputTextContent { text: event.text }));
        self.sync_message_content(event.output_index);
    }

    fn handle_refusal_delta(&mut self, event: ResponseRefusalDeltaEvent) {
        self.ensure_message(event.output_index, &event.item_id);
        let key = (event.output_index, event.content_index);
        let entry = self
            .message_parts
            .entry(key)
            .or_insert_with(|| MessagePartState::Refusal(RefusalContent { refusal: String::new() }));

        if let MessagePartState::Refusal(refusal) = entry {
            refusal.refusal.push_str(&event.delta);
        }
        self.sync_message_content(event.output_index);
    }

    fn handle_refusal_done(&mut self, event: ResponseRefusalDoneEvent) {
        self.ensure_message(event.output_index, &event.item_id);
        let key = (event.output_index, event.content_index);
        self.message_parts.insert(
            key,
            MessagePartState::Refusal(RefusalContent { refusal: event.refusal }),
        );
        self.sync_message_content(event.output_index);
    }

    fn handle_function_call_delta(&mut self, event: ResponseFunctionCallArgumentsDeltaEvent) {
        self.with_function_tool_call_mut(event.output_index, &event.item_id, None, |function| {
            function.arguments.push_str(&event.delta);
            if function.status.is_none() {
                function.status = Some(MessageStatus::InProgress);
            }
        });
    }

    fn handle_function_call_done(&mut self, event: ResponseFunctionCallArgumentsDoneEvent) {
        self.with_function_tool_call_mut(
            event.output_index,
            &event.item_id,
            Some(event.name),
            |function| {
                function.arguments = event.arguments;
                function.status = Some(MessageStatus::Completed);
            },
        );
    }

    fn with_function_tool_call_mut<F>(
        &mut self,
        output_index: i64,
        item_id: &str,
        name: Option<String>,
        mutator: F,
    ) where
        F: FnOnce(&mut FunctionToolCall),
    {
        let entry = self.output_items.entry(output_index).or_insert_with(|| {
            OutputItem::Function(FunctionToolCall {
                r#type: FunctionToolCallType::FunctionCall,
                id: item_id.to_string(),
                call_id: item_id.to_string(),
                name: name.clone().unwrap_or_else(|| "function".to_string()),
                arguments: String::new(),
                status: Some(MessageStatus::InProgress),
            })
        });

        if let OutputItem::Function(function) = entry {
            if function.id.is_empty() {
                function.id = item_id.to_string();
            }
            if let Some(name) = name {
                function.name = name;
            }
            mutator(function);
        }
    }

    fn ensure_message(&mut self, output_index: i64, item_id: &str) {
        let entry = self.output_items.entry(output_index).or_insert_with(|| {
            OutputItem::Message(OutputMessage {
                id: item_id.to_string(),
                r#type: OutputMessageType::Message,
                role: OutputMessageRole::Assistant,
                content: Vec::new(),
                status: MessageStatus::InProgress,
            })
        });

        if let OutputItem::Message(message) = entry
            && message.id.is_empty()
        {
            message.id = item_id.to_string();
        }
    }

    fn merge_output_item(&mut self, output_index: i64, incoming: OutputItem) {
        let merged = match self.output_items.remove(&output_index) {
            Some(existing) => merge_output_item(existing, incoming),
            None => incoming,
        };
        self.output_items.insert(output_index, merged);
    }

    fn has_message_parts(&self, output_index: i64) -> bool {
        self.message_parts
            .range((output_index, i64::MIN)..=(output_index, i64::MAX))
            .next()
            .is_some()
    }

    fn build_message_content(&self, output_index: i64) -> Vec<OutputMessageContent> {
        self.message_parts
            .range((output_index, i64::MIN)..=(output_index, i64::MAX))
            .map(|(_, part)| match part {
                MessagePartState::Text(text) => OutputMessageContent::OutputText(text.clone()),
                MessagePartState::Refusal(refusal) => OutputMessageContent::Refusal(refusal.clone()),
            })
            .collect()
    }

    fn sync_message_content(&mut self, output_index: i64) {
        if !self.has_message_parts(output_index) {
            return;
        }
        let content = self.build_message_content(output_index);
        if let Some(OutputItem::Message(message)) = self.output_items.get_mut(&output_index) {
            message.content = content;
        }
    }

    fn apply_output_items(&self, response: &mut Response) {
        if !self.output_items.is_empty() {
            let mut ordered: Vec<(i64, OutputItem)> = self
                .output_items
                .iter()
                .map(|(index, item)| (*index, item.clone()))
                .collect();
            ordered.sort_by_key(|(index, _)| *index);

            let mut output = Vec::with_capacity(ordered.len());
            for (index, mut item) in ordered {
                if let OutputItem::Message(message) = &mut item
                    && self.has_message_parts(index)
                {
                    message.content = self.build_message_content(index);
                }
                output.push(item);
            }
            response.output = output;
        }

        if let Some(status) = response.status {
            for item in &mut response.output {
                if let OutputItem::Reasoning(reasoning) = item {
                    reasoning.status = Some(infer_reasoning_status(reasoning.status, status));
                }
            }
        }

        if response.output_text.is_none() {
            response.output_text = extract_output_text(&response.output);
        }
    }
}

impl Default for OpenAIResponseStreamToResponseState {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_output_text(output: &[OutputItem]) -> Option<String> {
    for item in output {
        if let OutputItem::Message(message) = item {
            for content in &message.content {
                if let OutputMessageContent::OutputText(text) = content
                    && !text.text.is_empty()
                {
                    return Some(text.text.clone());
                }
            }
        }
    }
    None
}

fn merge_output_item(existing: OutputItem, incoming: OutputItem) -> OutputItem {
    match (existing, incoming) {
        (OutputItem::Message(mut old), OutputItem::Message(new)) => {
            if !new.id.is_empty() {
                old.id = new.id;
            }
            old.status = prefer_message_status(old.status, new.status);
            if !new.content.is_empty() {
                old.content = new.content;
            }
            OutputItem::Message(old)
        }
        (OutputItem::Function(mut old), OutputItem::Function(new)) => {
            if !new.id.is_empty() {
                old.id = new.id;
            }
            if !new.call_id.is_empty() {
                old.call_id = new.call_id;
            }
            if !new.name.is_empty() {
                old.name = new.name;
            }
            if !new.arguments.is_empty() {
                old.arguments = new.arguments;
            }
            old.status = prefer_function_status(old.status, new.status);
            OutputItem::Function(old)
        }
        (OutputItem::Reasoning(mut old), OutputItem::Reasoning(new)) => {
            if !new.id.is_empty() {
                old.id = new.id;
            }
            if new.encrypted_content.is_some() {
                old.encrypted_content = new.encrypted_content;
            }
            old.status = prefer_reasoning_status(old.status, new.status);
            OutputItem::Reasoning(old)
        }
        (_, incoming) => incoming,
    }
}

fn infer_reasoning_status(
    current: Option<ReasoningItemStatus>,
    response_status: ResponseStatus,
) -> ReasoningItemStatus {
    match response_status {
        ResponseStatus::Completed => current.unwrap_or(ReasoningItemStatus::Completed),
        ResponseStatus::Incomplete | ResponseStatus::Failed | ResponseStatus::Cancelled => {
            ReasoningItemStatus::Incomplete
        }
        ResponseStatus::InProgress => current.unwrap_or(ReasoningItemStatus::InProgress),
    }
}

fn prefer_message_status(current: MessageStatus, incoming: MessageStatus) -> MessageStatus {
    prefer_status(current, incoming, message_status_rank)
}

fn prefer_function_status(
    current: Option<MessageStatus>,
    incoming: Option<MessageStatus>,
) -> Option<MessageStatus> {
    match (current, incoming) {
        (Some(current), Some(incoming)) => Some(prefer_status(current, incoming, message_status_rank)),
        (None, Some(incoming)) => Some(incoming),
        (Some(current), None) => Some(current),
        (None, None) => None,
    }
}

fn prefer_reasoning_status(
    current: Option<ReasoningItemStatus>,
    incoming: Option<ReasoningItemStatus>,
) -> Option<ReasoningItemStatus> {
    match (current, incoming) {
        (Some(current), Some(incoming)) => Some(prefer_status(current, incoming, reasoning_status_rank)),
        (None, Some(incoming)) => Some(incoming),
        (Some(current), None) => Some(current),
        (None, None) => None,
    }
}

fn prefer_status<T: Copy>(current: T, incoming: T, rank: fn(T) -> u8) -> T {
    if rank(incoming) >= rank(current) {
        incoming
    } else {
        current
    }
}

fn message_status_rank(status: MessageStatus) -> u8 {
    match status {
        MessageStatus::InProgress => 0,
        MessageStatus::Incomplete => 1,
        MessageStatus::Completed => 2,
    }
}

fn reasoning_status_rank(status: ReasoningItemStatus) -> u8 {
    match status {
        ReasoningItemStatus::InProgress => 0,
        ReasoningItemStatus::Incomplete => 1,
        ReasoningItemStatus::Completed => 2,
    }
}
