pub mod controller;
pub mod reducer;
pub mod session;
pub mod summary;
pub mod tree;

pub use controller::{
    CancelHandle, SessionController, TurnOptions, TurnOutcome, TurnStatus, DEFAULT_TURN_TIMEOUT,
};
pub use reducer::StreamReducer;
pub use session::{ChatSession, SessionStores, DEFAULT_SYSTEM_PROMPT};
pub use summary::{Summarizer, SUMMARY_TIMEOUT};
pub use tree::{
    append_child, messages_along_path, node_at, resolve_path, truncate_to, PathEntry, TreeError,
};
