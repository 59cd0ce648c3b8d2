pub mod client;
pub mod factory;
pub mod scripted;
pub mod sse;
pub mod traits;

pub use client::OpenAiCompatibleClient;
pub use factory::{ModelFactory, ProviderConfig};
pub use scripted::{ScriptStep, ScriptedClient};
pub use traits::{
    ChatOptions, ChatRequest, EventStream, ModelClient, DEFAULT_MAX_STEPS, DEFAULT_TEMPERATURE,
};
