use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use arbor_tools::ToolRegistry;
use arbor_types::{CoreMessage, StreamEvent};

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A callable text-generation client bound to one model.
///
/// `stream` runs a whole turn: it may span several generation steps when
/// the model calls tools mid-stream, and yields the unified event
/// vocabulary the stream reducer folds. Dropping the returned stream
/// aborts the underlying request.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier of the model this client generates with.
    fn model_name(&self) -> &str;

    /// Streaming turn.
    async fn stream(&self, request: ChatRequest) -> Result<EventStream>;

    /// Non-streaming completion; used for side-channel generations such as
    /// conversation summaries.
    async fn generate(&self, request: ChatRequest) -> Result<String>;
}

/// One turn's input.
///
/// `system` only applies when `messages` is empty (prompt mode); callers
/// sending a full transcript carry the system prompt as the first message.
#[derive(Clone, Default)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: Option<String>,
    pub messages: Vec<CoreMessage>,
    pub options: ChatOptions,
}

impl ChatRequest {
    pub fn from_messages(messages: Vec<CoreMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Clone)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_steps: u32,
    pub tools: Option<Arc<ToolRegistry>>,
}

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_STEPS: u32 = 5;

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_steps: DEFAULT_MAX_STEPS,
            tools: None,
        }
    }
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }
}
