use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use arbor_types::{StreamEvent, TokenUsage};

use crate::traits::{ChatRequest, EventStream, ModelClient};

/// Script entry replayed by [`ScriptedClient`].
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Yield one event.
    Emit(StreamEvent),
    /// Sleep before the next entry (interacts with paused-time tests).
    Wait(Duration),
    /// Suspend forever; the stream only ends when dropped. For timeout and
    /// cancellation tests.
    Hang,
    /// Yield a stream-level error.
    Fail(String),
}

/// Deterministic model client replaying a fixed event script.
///
/// Test double for the session controller and chat session, in the same
/// spirit as a mock tool executor: no network, fully scripted.
pub struct ScriptedClient {
    model: String,
    script: Vec<ScriptStep>,
    generate_response: Option<String>,
}

impl ScriptedClient {
    pub fn new(model: impl Into<String>, script: Vec<ScriptStep>) -> Self {
        Self {
            model: model.into(),
            script,
            generate_response: None,
        }
    }

    pub fn with_generate_response(mut self, response: impl Into<String>) -> Self {
        self.generate_response = Some(response.into());
        self
    }

    /// A client that streams one step completing with `text`.
    pub fn completing(model: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(
            model,
            vec![
                ScriptStep::Emit(StreamEvent::StepStart {
                    message_id: "msg_scripted_1".to_string(),
                }),
                ScriptStep::Emit(StreamEvent::TextDelta { text }),
                ScriptStep::Emit(StreamEvent::StepFinish {
                    usage: TokenUsage::new(8, 4),
                    timestamp: chrono::Utc::now().timestamp_millis(),
                }),
                ScriptStep::Emit(StreamEvent::Finish {
                    finish_reason: Some("stop".to_string()),
                }),
            ],
        )
    }

    /// A client whose stream never produces anything.
    pub fn silent(model: impl Into<String>) -> Self {
        Self::new(model, vec![ScriptStep::Hang])
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, _request: ChatRequest) -> Result<EventStream> {
        let script = self.script.clone();

        Ok(Box::pin(async_stream::stream! {
            for step in script {
                match step {
                    ScriptStep::Emit(event) => yield Ok(event),
                    ScriptStep::Wait(delay) => tokio::time::sleep(delay).await,
                    ScriptStep::Hang => futures::future::pending::<()>().await,
                    ScriptStep::Fail(message) => {
                        yield Err(anyhow!(message));
                        return;
                    }
                }
            }
        }))
    }

    async fn generate(&self, _request: ChatRequest) -> Result<String> {
        self.generate_response
            .clone()
            .ok_or_else(|| anyhow!("Scripted client has no generate response"))
    }
}
