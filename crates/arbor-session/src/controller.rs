use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use arbor_llm::{ChatRequest, ModelClient};
use arbor_types::{ChatError, ErrorInfo, Message, StreamEvent};

use crate::reducer::StreamReducer;

/// Turn deadline. Counts from stream open and is disarmed permanently by
/// the first step boundary; once the model is producing steps, only the
/// user stops the turn.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TurnOptions {
    pub timeout: Duration,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TURN_TIMEOUT,
        }
    }
}

/// How a turn ended. Every variant still carries whatever partial message
/// was reduced before the end.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnStatus {
    Completed,
    Cancelled,
    TimedOut,
    Failed(ErrorInfo),
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: Message,
    pub status: TurnStatus,
}

impl TurnOutcome {
    pub fn error(&self) -> Option<&ErrorInfo> {
        match &self.status {
            TurnStatus::Failed(info) => Some(info),
            _ => None,
        }
    }
}

/// Cloneable remote stop button for the turn in flight. Safe to trigger
/// at any time; between turns it is a no-op because each turn rearms the
/// flag.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }
}

/// Drives one streaming turn at a time: opens the model stream, folds
/// events through a [`StreamReducer`] and races that against cancellation
/// and the turn deadline.
///
/// `&mut self` on [`start_turn`](Self::start_turn) makes overlapping turns
/// on one session a compile error rather than a runtime race.
pub struct SessionController {
    model: Option<Arc<dyn ModelClient>>,
    options: TurnOptions,
    cancel: Arc<watch::Sender<bool>>,
    streaming: bool,
}

impl SessionController {
    pub fn new(options: TurnOptions) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            model: None,
            options,
            cancel: Arc::new(cancel),
            streaming: false,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn set_model(&mut self, model: Option<Arc<dyn ModelClient>>) {
        self.model = model;
    }

    pub fn set_options(&mut self, options: TurnOptions) {
        self.options = options;
    }

    pub fn model(&self) -> Option<&Arc<dyn ModelClient>> {
        self.model.as_ref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancel),
        }
    }

    /// Stops the turn in flight, if any.
    pub fn cancel_turn(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Runs one full streaming turn and always hands back the reduced
    /// message, partial or complete, with how the turn ended.
    ///
    /// Fails fast with [`ChatError::ModelRequired`] when no model is bound;
    /// every in-stream failure is folded into the outcome instead.
    pub async fn start_turn(&mut self, request: ChatRequest) -> Result<TurnOutcome, ChatError> {
        let model = self.model.clone().ok_or(ChatError::ModelRequired)?;

        // Rearm: a cancel left over from a previous turn must not kill
        // this one.
        self.cancel.send_replace(false);
        self.streaming = true;

        let mut reducer = StreamReducer::new(Some(model.model_name().to_string()));
        let result = self.drive_stream(model.as_ref(), request, &mut reducer).await;
        self.streaming = false;

        let status = match result {
            Ok(()) => TurnStatus::Completed,
            Err(ChatError::Abort) => TurnStatus::Cancelled,
            Err(ChatError::Timeout) => TurnStatus::TimedOut,
            Err(e) => TurnStatus::Failed(e.info()),
        };

        match &status {
            TurnStatus::Completed => tracing::debug!(model = model.model_name(), "turn completed"),
            TurnStatus::Cancelled => tracing::info!("turn cancelled by user"),
            TurnStatus::TimedOut => tracing::warn!(timeout = ?self.options.timeout, "turn timed out"),
            TurnStatus::Failed(info) => {
                tracing::error!(name = %info.name, message = %info.message, "turn failed")
            }
        }

        Ok(TurnOutcome {
            message: reducer.into_message(),
            status,
        })
    }

    async fn drive_stream(
        &self,
        model: &dyn ModelClient,
        request: ChatRequest,
        reducer: &mut StreamReducer,
    ) -> Result<(), ChatError> {
        let mut stream = match model.stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                let err = ChatError::stream(e.to_string());
                reducer.record_failure(err.info());
                return Err(err);
            }
        };

        let mut cancel = self.cancel.subscribe();
        let deadline = tokio::time::sleep(self.options.timeout);
        tokio::pin!(deadline);
        let mut step_started = false;

        loop {
            tokio::select! {
                biased;

                changed = cancel.changed() => {
                    if changed.is_ok() && *cancel.borrow_and_update() {
                        return Err(ChatError::Abort);
                    }
                }

                _ = &mut deadline, if !step_started => {
                    return Err(ChatError::Timeout);
                }

                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        if matches!(event, StreamEvent::StepStart { .. }) {
                            step_started = true;
                        }
                        reducer.apply(&event)?;
                    }
                    Some(Err(e)) => {
                        let err = ChatError::stream(e.to_string());
                        reducer.record_failure(err.info());
                        return Err(err);
                    }
                    None => return Ok(()),
                },
            }
        }
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(TurnOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_llm::{ScriptStep, ScriptedClient};
    use arbor_types::{Segment, TokenUsage};

    fn controller(client: ScriptedClient) -> SessionController {
        SessionController::default().with_model(Arc::new(client))
    }

    #[tokio::test]
    async fn completed_turn_reduces_the_scripted_text() {
        let mut controller = controller(ScriptedClient::completing("gpt-4o", "hello"));

        let outcome = controller
            .start_turn(ChatRequest::from_prompt("hi"))
            .await
            .unwrap();

        assert_eq!(outcome.status, TurnStatus::Completed);
        assert_eq!(outcome.message.content, "hello");
        assert_eq!(outcome.message.model_name.as_deref(), Some("gpt-4o"));
        assert!(!controller.is_streaming());
    }

    #[tokio::test]
    async fn missing_model_fails_before_streaming() {
        let mut controller = SessionController::default();
        let err = controller
            .start_turn(ChatRequest::from_prompt("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ModelRequired));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_times_out_with_empty_message() {
        let mut controller = controller(ScriptedClient::silent("gpt-4o"));

        let outcome = controller
            .start_turn(ChatRequest::from_prompt("hi"))
            .await
            .unwrap();

        assert_eq!(outcome.status, TurnStatus::TimedOut);
        assert!(outcome.message.parts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_disarms_after_first_step() {
        // A step boundary arrives, then the stream stalls far past the
        // deadline before finishing. The turn must still complete.
        let client = ScriptedClient::new(
            "gpt-4o",
            vec![
                ScriptStep::Emit(StreamEvent::StepStart {
                    message_id: "m1".to_string(),
                }),
                ScriptStep::Emit(StreamEvent::TextDelta {
                    text: "slow".to_string(),
                }),
                ScriptStep::Wait(Duration::from_secs(300)),
                ScriptStep::Emit(StreamEvent::TextDelta {
                    text: " answer".to_string(),
                }),
                ScriptStep::Emit(StreamEvent::StepFinish {
                    usage: TokenUsage::new(2, 2),
                    timestamp: 1,
                }),
                ScriptStep::Emit(StreamEvent::Finish {
                    finish_reason: Some("stop".to_string()),
                }),
            ],
        );
        let mut controller = controller(client);

        let outcome = controller
            .start_turn(ChatRequest::from_prompt("hi"))
            .await
            .unwrap();

        assert_eq!(outcome.status, TurnStatus::Completed);
        assert_eq!(outcome.message.content, "slow answer");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_keeps_partial_content() {
        let client = ScriptedClient::new(
            "gpt-4o",
            vec![
                ScriptStep::Emit(StreamEvent::StepStart {
                    message_id: "m1".to_string(),
                }),
                ScriptStep::Emit(StreamEvent::TextDelta {
                    text: "partial".to_string(),
                }),
                ScriptStep::Hang,
            ],
        );
        let mut controller = controller(client);
        let handle = controller.cancel_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });

        let outcome = controller
            .start_turn(ChatRequest::from_prompt("hi"))
            .await
            .unwrap();

        assert_eq!(outcome.status, TurnStatus::Cancelled);
        assert_eq!(outcome.message.content, "partial");
    }

    #[tokio::test]
    async fn stale_cancel_does_not_kill_the_next_turn() {
        let mut controller = controller(ScriptedClient::completing("gpt-4o", "ok"));
        // Cancel while idle, then start a turn: the flag must be rearmed.
        controller.cancel_turn();

        let outcome = controller
            .start_turn(ChatRequest::from_prompt("hi"))
            .await
            .unwrap();
        assert_eq!(outcome.status, TurnStatus::Completed);
    }

    #[tokio::test]
    async fn stream_error_event_fails_the_turn_with_partial() {
        let client = ScriptedClient::new(
            "gpt-4o",
            vec![
                ScriptStep::Emit(StreamEvent::StepStart {
                    message_id: "m1".to_string(),
                }),
                ScriptStep::Emit(StreamEvent::TextDelta {
                    text: "before the crash".to_string(),
                }),
                ScriptStep::Emit(StreamEvent::Error {
                    error: ErrorInfo::new("Error", "provider 500"),
                }),
            ],
        );
        let mut controller = controller(client);

        let outcome = controller
            .start_turn(ChatRequest::from_prompt("hi"))
            .await
            .unwrap();

        let info = outcome.error().expect("failed status");
        assert_eq!(info.message, "provider 500");
        assert_eq!(outcome.message.content, "before the crash");
        assert!(matches!(
            outcome.message.parts.last(),
            Some(Segment::Error { .. })
        ));
    }

    #[tokio::test]
    async fn transport_error_is_recorded_as_error_segment() {
        let client = ScriptedClient::new(
            "gpt-4o",
            vec![
                ScriptStep::Emit(StreamEvent::StepStart {
                    message_id: "m1".to_string(),
                }),
                ScriptStep::Fail("connection reset".to_string()),
            ],
        );
        let mut controller = controller(client);

        let outcome = controller
            .start_turn(ChatRequest::from_prompt("hi"))
            .await
            .unwrap();

        assert!(matches!(outcome.status, TurnStatus::Failed(_)));
        assert!(matches!(
            outcome.message.parts.last(),
            Some(Segment::Error { error, .. }) if error.message == "connection reset"
        ));
    }
}
