use arbor_types::{
    truncate_search_content, ChatError, ErrorInfo, Message, ReasoningDetail, Segment, StreamEvent,
    ToolCallState,
};

/// Folds a model client's event stream into one assistant [`Message`].
///
/// The reducer is a pure fold over events plus a handful of in-flight
/// flags; applying the same event sequence always yields the same segment
/// structure. Adjacency matters: consecutive text deltas merge into one
/// segment, a step boundary or a reasoning/text transition starts a new
/// one.
pub struct StreamReducer {
    message: Message,
    /// Set on `step-start`; the next appendable segment must not merge
    /// into one from the previous step.
    new_step: bool,
    is_reasoning: bool,
    is_calling_tool: bool,
}

impl StreamReducer {
    pub fn new(model_name: Option<String>) -> Self {
        Self {
            message: Message::assistant(model_name),
            new_step: false,
            is_reasoning: false,
            is_calling_tool: false,
        }
    }

    /// Folds one event into the message under construction.
    ///
    /// Returns `Err` only for a fatal `error` event, after recording it as
    /// an error segment; every other event reduces infallibly.
    pub fn apply(&mut self, event: &StreamEvent) -> Result<(), ChatError> {
        match event {
            StreamEvent::StepStart { message_id } => {
                self.message.id = message_id.clone();
                self.new_step = true;
            }
            StreamEvent::ReasoningDelta { text } => {
                self.is_reasoning = true;
                self.push_reasoning(text);
            }
            StreamEvent::ReasoningSignature { signature } => {
                self.attach_signature(signature);
            }
            StreamEvent::RedactedReasoning { data } => {
                self.attach_redacted(data);
            }
            StreamEvent::TextDelta { text } => {
                // Answer text closes the reasoning block for this step.
                self.is_reasoning = false;
                self.push_text(text);
            }
            StreamEvent::ToolCall {
                tool_name,
                tool_call_id,
                args,
            } => {
                self.is_calling_tool = true;
                self.new_step = false;
                self.message.parts.push(Segment::ToolInvocation {
                    tool_name: tool_name.clone(),
                    tool_call_id: tool_call_id.clone(),
                    args: args.clone(),
                    state: ToolCallState::PartialCall,
                    result: None,
                });
            }
            StreamEvent::ToolResult {
                tool_call_id,
                result,
            } => {
                self.is_calling_tool = false;
                self.settle_tool_call(tool_call_id, result);
            }
            StreamEvent::StepFinish { usage, timestamp } => {
                let now = chrono::Utc::now().timestamp_millis();
                self.message.parts.push(Segment::Flag {
                    token_usage: *usage,
                    created_at: *timestamp,
                    ended_at: now,
                });
                self.message.token_usage.add(usage);
                if self.message.created_at.is_none() {
                    self.message.created_at = Some(*timestamp);
                }
                self.message.ended_at = Some(now);
                self.is_reasoning = false;
                self.is_calling_tool = false;
            }
            StreamEvent::Error { error } => {
                self.record_failure(error.clone());
                return Err(error.clone().into());
            }
            StreamEvent::Finish { .. } => {}
        }

        Ok(())
    }

    /// Appends an error segment for a failure observed outside the event
    /// vocabulary (transport drop, malformed chunk).
    pub fn record_failure(&mut self, error: ErrorInfo) {
        let now = chrono::Utc::now().timestamp_millis();
        self.message.parts.push(Segment::Error {
            created_at: now,
            error,
        });
        if self.message.ended_at.is_none() {
            self.message.ended_at = Some(now);
        }
    }

    fn push_text(&mut self, text: &str) {
        self.message.content.push_str(text);

        let merge = !self.new_step && matches!(self.message.parts.last(), Some(Segment::Text { .. }));
        if merge {
            if let Some(Segment::Text { text: existing }) = self.message.parts.last_mut() {
                existing.push_str(text);
            }
        } else {
            self.message.parts.push(Segment::text(text));
            self.new_step = false;
        }
    }

    fn push_reasoning(&mut self, text: &str) {
        let merge =
            !self.new_step && matches!(self.message.parts.last(), Some(Segment::Reasoning { .. }));
        if merge {
            if let Some(Segment::Reasoning { reasoning, details }) = self.message.parts.last_mut() {
                reasoning.push_str(text);
                // The segment may hold only redacted details (opened by a
                // redacted blob); give the plaintext its own detail then.
                match details
                    .iter_mut()
                    .rev()
                    .find(|d| matches!(d, ReasoningDetail::Text { .. }))
                {
                    Some(ReasoningDetail::Text { text: detail, .. }) => detail.push_str(text),
                    _ => details.push(ReasoningDetail::Text {
                        text: text.to_string(),
                        signature: None,
                    }),
                }
            }
        } else {
            self.message.parts.push(Segment::reasoning(text));
            self.new_step = false;
        }
    }

    /// Signs the most recent reasoning detail. No-op when the last segment
    /// is not a reasoning block (provider quirk, not an error).
    fn attach_signature(&mut self, signature: &str) {
        if let Some(Segment::Reasoning { details, .. }) = self.message.parts.last_mut() {
            if let Some(ReasoningDetail::Text { signature: slot, .. }) = details
                .iter_mut()
                .rev()
                .find(|d| matches!(d, ReasoningDetail::Text { .. }))
            {
                *slot = Some(signature.to_string());
            }
        }
    }

    fn attach_redacted(&mut self, data: &str) {
        match self.message.parts.last_mut() {
            Some(Segment::Reasoning { details, .. }) if !self.new_step => {
                details.push(ReasoningDetail::Redacted {
                    data: data.to_string(),
                });
            }
            _ => {
                self.message.parts.push(Segment::Reasoning {
                    reasoning: String::new(),
                    details: vec![ReasoningDetail::Redacted {
                        data: data.to_string(),
                    }],
                });
                self.new_step = false;
            }
        }
    }

    fn settle_tool_call(&mut self, tool_call_id: &str, result: &serde_json::Value) {
        let invocation = self.message.parts.iter_mut().find(|part| {
            matches!(part, Segment::ToolInvocation { tool_call_id: id, .. } if id == tool_call_id)
        });

        let Some(Segment::ToolInvocation { state, result: slot, .. }) = invocation else {
            tracing::warn!(tool_call_id, "tool result for unknown call, dropping");
            return;
        };

        *state = ToolCallState::Result;
        // Search payloads are recognized structurally and trimmed so the
        // stored tree stays small; everything else passes through as-is.
        *slot = Some(truncate_search_content(result).unwrap_or_else(|| result.clone()));
    }

    /// The message as reduced so far.
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }

    /// A reasoning block is open and answer text has not begun.
    pub fn is_reasoning(&self) -> bool {
        self.is_reasoning
    }

    /// A tool call was requested and its result has not arrived.
    pub fn is_calling_tool(&self) -> bool {
        self.is_calling_tool
    }

    pub fn has_content(&self) -> bool {
        self.message.has_content()
    }
}
