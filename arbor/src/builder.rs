//! High-level builder for wiring a chat session together.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::llm::{ChatOptions, ModelFactory, ProviderConfig};
use crate::persist::JsonFileStore;
use crate::session::{ChatSession, SessionStores, TurnOptions};
use crate::tools::{CalculatorTool, CurrentTimeTool, JinaSearchTool, ToolRegistry};

/// Assembles a [`ChatSession`] from a provider credential, a model name
/// and a storage location.
///
/// # Example
///
/// ```rust,no_run
/// use arbor::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let session = SessionBuilder::new()
///     .provider(ProviderConfig::new("OpenAI", "sk-..."))
///     .model("gpt-4o")
///     .data_dir("~/.local/share/arbor")
///     .with_builtin_tools()
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    provider: Option<ProviderConfig>,
    model: String,
    summarize_model: Option<String>,
    data_dir: Option<PathBuf>,
    system_prompt: Option<String>,
    chat_options: ChatOptions,
    turn_options: TurnOptions,
    builtin_tools: bool,
    search_api_key: Option<String>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            model: "gpt-4o".to_string(),
            summarize_model: None,
            data_dir: None,
            system_prompt: None,
            chat_options: ChatOptions::default(),
            turn_options: TurnOptions::default(),
            builtin_tools: false,
            search_api_key: None,
        }
    }

    /// Set the provider credential (required).
    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the chat model (default: gpt-4o).
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use a separate (typically cheaper) model for conversation
    /// summaries. Defaults to the chat model.
    pub fn summarize_model(mut self, model: impl Into<String>) -> Self {
        self.summarize_model = Some(model.into());
        self
    }

    /// Persist conversations as JSON files under this directory. Without
    /// it the session is in-memory only.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn chat_options(mut self, options: ChatOptions) -> Self {
        self.chat_options = options;
        self
    }

    pub fn turn_options(mut self, options: TurnOptions) -> Self {
        self.turn_options = options;
        self
    }

    /// Register the built-in calculator and current-time tools.
    pub fn with_builtin_tools(mut self) -> Self {
        self.builtin_tools = true;
        self
    }

    /// Register the Jina online-search tool with this API key (implies
    /// the built-in tools).
    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.search_api_key = Some(key.into());
        self.builtin_tools = true;
        self
    }

    /// Build the session.
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured, the provider needs
    /// a base URL it does not have, or the storage directory cannot be
    /// opened.
    pub async fn build(self) -> Result<ChatSession> {
        let provider = self
            .provider
            .context("Provider is required. Call .provider(ProviderConfig::new(name, key))")?;

        let model = ModelFactory::create(&provider, &self.model)?;
        let summarize_model = match &self.summarize_model {
            Some(name) => ModelFactory::create(&provider, name)?,
            None => Arc::clone(&model),
        };

        let stores = match &self.data_dir {
            Some(dir) => SessionStores::new(
                Arc::new(JsonFileStore::open(dir.join("chats.json")).await?),
                Arc::new(JsonFileStore::open(dir.join("summaries.json")).await?),
                Arc::new(JsonFileStore::open(dir.join("paths.json")).await?),
            ),
            None => SessionStores::in_memory(),
        };

        let mut chat_options = self.chat_options;
        if self.builtin_tools {
            let mut registry = ToolRegistry::new()
                .with_tool(Arc::new(CalculatorTool))
                .with_tool(Arc::new(CurrentTimeTool));
            if let Some(key) = &self.search_api_key {
                registry.register(Arc::new(JinaSearchTool::new(key.clone())?));
            }
            chat_options.tools = Some(Arc::new(registry));
        }

        let mut session = ChatSession::new(stores)
            .with_model(model)
            .with_summarize_model(summarize_model)
            .with_chat_options(chat_options)
            .with_turn_options(self.turn_options);
        if let Some(prompt) = self.system_prompt {
            session = session.with_system_prompt(prompt);
        }

        Ok(session)
    }
}
