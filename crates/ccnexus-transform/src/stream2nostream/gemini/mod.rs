use std::collections::BTreeMap;

use ccnexus_protocol::gemini::generate_content::response::GenerateContentResponse;
use ccnexus_protocol::gemini::generate_content::types::{Candidate, FinishReason, UsageMetadata};
use ccnexus_protocol::gemini::types::{Content, FunctionCall, FunctionResponse, Part};

#[derive(Debug, Clone)]
pub struct GeminiStreamToResponseState {
    candidates: BTreeMap<u32, Candidate>,
    prompt_feedback: Option<ccnexus_protocol::gemini::generate_content::types::PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
    response_id: Option<String>,
}

impl GeminiStreamToResponseState {
    pub fn new() -> Self {
        Self {
            candidates: BTreeMap::new(),
            prompt_feedback: None,
            usage_metadata: None,
            model_version: None,
            response_id: None,
        }
    }

    pub fn push_chunk(&mut self, chunk: GenerateContentResponse) -> Option<GenerateContentResponse> {
        self.merge_metadata(&chunk);
        for (idx, candidate) in chunk.candidates.into_iter().enumerate() {
            let index = candidate.index.unwrap_or(idx as u32);
            self.merge_candidate(index, candidate);
        }

        if self.is_finished() {
            Some(self.build_response())
        } else {
            None
        }
    }

    pub fn finalize(&self) -> GenerateContentResponse {
        self.build_response_with_finish_fallback(FinishReason::Stop)
    }

    pub fn finalize_on_eof(&self) -> GenerateContentResponse {
        self.build_response_with_finish_fallback(FinishReason::Other)
    }

    fn merge_metadata(&mut self, chunk: &GenerateContentResponse) {
        if chunk.prompt_feedback.is_some() {
            self.prompt_feedback = chunk.prompt_feedback.clone();
        }
        if chunk.usage_metadata.is_some() {
            self.usage_metadata = chunk.usage_metadata;
        }
        if chunk.model_version.is_some() {
            self.model_version = chunk.model_version.clone();
        }
        if chunk.response_id.is_some() {
            self.response_id = chunk.response_id.clone();
        }
    }

    fn merge_candidate(&mut self, index: u32, incoming: Candidate) {
        let entry = self.candidates.entry(index).or_insert_with(|| {
            let mut candidate = incoming.clone();
            candidate.index = Some(index);
            candidate
        });

        merge_content(&mut entry.content, incoming.content);
        if incoming.finish_reason.is_some() {
            entry.finish_reason = incoming.finish_reason;
        }
    }

    fn build_response(&self) -> GenerateContentResponse {
        let candidates = self
            .candidates
            .iter()
            .map(|(index, candidate)| {
                let mut candidate = candidate.clone();
                if candidate.index.is_none() {
                    candidate.index = Some(*index);
                }
                candidate
            })
            .collect();

        GenerateContentResponse {
            candidates,
            prompt_feedback: self.prompt_feedback.clone(),
            usage_metadata: self.usage_metadata,
            model_version: self.model_version.clone(),
            response_id: self.response_id.clone(),
        }
    }

    fn build_response_with_finish_fallback(&self, fallback: FinishReason) -> GenerateContentResponse {
        let candidates = self
            .candidates
            .iter()
            .map(|(index, candidate)| {
                let mut candidate = candidate.clone();
                if candidate.index.is_none() {
                    candidate.index = Some(*index);
                }
                if candidate.finish_reason.is_none() {
                    candidate.finish_reason = Some(fallback);
                }
                candidate
            })
            .collect();

        GenerateContentResponse {
            candidates,
            prompt_feedback: self.prompt_feedback.clone(),
            usage_metadata: self.usage_metadata,
            model_version: self.model_version.clone(),
            response_id: self.response_id.clone(),
        }
    }

    fn is_finished(&self) -> bool {
        if self.candidates.is_empty() {
            return false;
        }
        self.candidates
            .values()
            .all(|candidate| candidate.finish_reason.is_some())
    }
}

impl Default for GeminiStreamToResponseState {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_content(existing: &mut Content, incoming: Content) {
    if incoming.role.is_some() {
        existing.role = incoming.role;
    }
    for part in incoming.parts {
        merge_part(&mut existing.parts, part);
    }
}

fn merge_part(parts: &mut Vec<Part>, mut incoming: Part) {
    if let Some(text) = incoming.text.take() {
        if let Some(last) = parts.last_mut()
            && last.text.is_some()
            && last.inline_data.is_none()
            && last.function_call.is_none()
            && last.function_response.is_none()
        {
            if let Some(last_text) = last.text.as_mut() {
                last_text.push_str(&text);
            }
            merge_part_metadata(last, &incoming);
            return;
        }

        incoming.text = Some(text);
        parts.push(incoming);
        return;
    }

    if let Some(function_call) = incoming.function_call.take() {
        if let Some(last) = parts.last_mut()
            && let Some(last_call) = last.function_call.as_mut()
            && last_call.name == function_call.name
        {
            merge_function_call(last_call, function_call);
            merge_part_metadata(last, &incoming);
            return;
        }
        incoming.function_call = Some(function_call);
        parts.push(incoming);
        return;
    }

    if let Some(function_response) = incoming.function_response.take() {
        if let Some(last) = parts.last_mut()
            && let Some(last_response) = last.function_response.as_mut()
            && last_response.name == function_response.name
        {
            merge_function_response(last_response, function_response);
            merge_part_metadata(last, &incoming);
            return;
        }
        incoming.function_response = Some(function_response);
        parts.push(incoming);
        return;
    }

    parts.push(incoming);
}

fn merge_part_metadata(target: &mut Part, incoming: &Part) {
    if target.thought.is_none() {
        target.thought = incoming.thought;
    }
    if target.thought_signature.is_none() {
        target.thought_signature = incoming.thought_signature.clone();
    }
}

fn merge_function_call(target: &mut FunctionCall, incoming: FunctionCall) {
    if incoming.id.is_some() {
        target.id = incoming.id;
    }
    if target.name.is_empty() {
        target.name = incoming.name;
    }
    for (key, value) in incoming.args {
        target.args.insert(key, value);
    }
}

fn merge_function_response(target: &mut FunctionResponse, incoming: FunctionResponse) {
    if incoming.id.is_some() {
        target.id = incoming.id;
    }
    if target.name.is_empty() {
        target.name = incoming.name;
    }
    target.response = incoming.response;
}
