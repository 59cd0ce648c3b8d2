use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorInfo;
use crate::usage::TokenUsage;

/// Unified incremental event stream produced by a model client.
///
/// One turn may span several generation steps: the model can call tools
/// mid-stream, receive their results and continue. Events arrive strictly
/// in order; the stream reducer depends on adjacency for segment merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// A new generation step begins. Carries the logical message id.
    StepStart { message_id: String },

    /// Incremental hidden-reasoning content.
    ReasoningDelta { text: String },

    /// Provider signature for the current reasoning block.
    ReasoningSignature { signature: String },

    /// Opaque redacted reasoning blob.
    RedactedReasoning { data: String },

    /// Incremental answer text. May be empty.
    TextDelta { text: String },

    /// The model requested a tool invocation (arguments complete).
    ToolCall {
        tool_name: String,
        tool_call_id: String,
        args: Value,
    },

    /// A tool finished; result payload is opaque to the engine except for
    /// the structurally-recognized search shape.
    ToolResult { tool_call_id: String, result: Value },

    /// A generation step completed, with its usage and wall timestamp.
    StepFinish { usage: TokenUsage, timestamp: i64 },

    /// Fatal stream error; aborts the turn.
    Error { error: ErrorInfo },

    /// Stream termination marker.
    Finish {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}
