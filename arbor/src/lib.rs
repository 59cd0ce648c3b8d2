//! # Arbor - streaming chat sessions with branching history
//!
//! Arbor is an engine for LLM chat clients:
//! - **Real-time streaming** (token-by-token, with reasoning and tool
//!   calls as typed segments)
//! - **Branching history** (edits and regenerations become siblings in a
//!   conversation tree, nothing is ever lost)
//! - **Tool calling** (multi-step turns with a pluggable tool registry)
//! - **Pluggable persistence** (key-value stores for trees, summaries and
//!   branch bookmarks)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arbor::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut session = SessionBuilder::new()
//!         .provider(ProviderConfig::new("OpenAI", "sk-..."))
//!         .model("gpt-4o")
//!         .data_dir("./data")
//!         .with_builtin_tools()
//!         .build()
//!         .await?;
//!
//!     let outcome = session.send_message("What is 6 times 7?").await?;
//!     println!("{}", outcome.message.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Arbor consists of several composable crates:
//!
//! - **arbor-types**: Core data model (messages, segments, stream events,
//!   the conversation tree)
//! - **arbor-llm**: OpenAI-compatible streaming client, provider factory
//!   and a scripted test client
//! - **arbor-tools**: Tool registry plus built-in calculator, clock and
//!   online-search tools
//! - **arbor-persist**: Key-value persistence (in-memory and JSON file)
//!   with chat, summary and path stores
//! - **arbor-session**: The engine itself: stream reducer, turn
//!   controller, conversation tree and session orchestration
//!
//! ## Branching
//!
//! Editing a message or regenerating a reply never rewrites history; the
//! new version is appended as a sibling and the session's rendered path
//! moves over to it:
//!
//! ```rust,no_run
//! # use arbor::prelude::*;
//! # async fn example(mut session: ChatSession) -> anyhow::Result<()> {
//! session.send_message("what color is the sky").await?;
//! // A second take, side by side with the first.
//! session.regenerate_reply(&[0, 0, 0]).await?;
//! // Back to the first take.
//! session.switch_branch(&[0, 0, 0]).await;
//! # Ok(())
//! # }
//! ```

pub use arbor_llm as llm;
pub use arbor_persist as persist;
pub use arbor_session as session;
pub use arbor_tools as tools;
pub use arbor_types as types;

// Commonly used types at the crate root
pub use arbor_llm::{ChatOptions, ChatRequest, ModelClient, ModelFactory, ProviderConfig};
pub use arbor_session::{
    CancelHandle, ChatSession, SessionStores, StreamReducer, TurnOptions, TurnOutcome, TurnStatus,
};
pub use arbor_tools::{Tool, ToolRegistry};
pub use arbor_types::{ChatError, ChatNode, ChatPath, Message, Segment, StreamEvent};

/// High-level builder for wiring a session together
pub mod builder;

/// Convenient prelude with commonly used types
pub mod prelude {
    pub use crate::builder::SessionBuilder;
    pub use crate::llm::{ChatOptions, ProviderConfig};
    pub use crate::session::{ChatSession, TurnOutcome, TurnStatus};
    pub use crate::types::{Message, Segment, StreamEvent};
    pub use anyhow::Result;
}
