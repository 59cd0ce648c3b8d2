use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Ordered child-index path from the root of a conversation tree; denotes
/// one linear thread. Index `i` at depth `d` selects the `i`-th sibling
/// among the alternatives at that point (edits and regenerations).
pub type ChatPath = Vec<usize>;

/// One node of the branching conversation history. Append-only by
/// convention: edits and regenerations add siblings, never mutate or
/// remove existing nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatNode {
    pub message: Message,
    #[serde(default)]
    pub children: Vec<ChatNode>,
}

impl ChatNode {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            children: Vec::new(),
        }
    }
}
