pub mod error;
pub mod events;
pub mod message;
pub mod search;
pub mod segment;
pub mod tree;
pub mod usage;

pub use error::{ChatError, ErrorInfo};
pub use events::StreamEvent;
pub use message::{CoreMessage, Message, Role};
pub use search::{truncate_search_content, SearchItem, SearchResults, KEPT_SEARCH_CONTENT_CHARS};
pub use segment::{ReasoningDetail, Segment, ToolCallState};
pub use tree::{ChatNode, ChatPath};
pub use usage::TokenUsage;
