use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorInfo;
use crate::usage::TokenUsage;

/// One typed chunk of an in-progress or completed assistant message.
///
/// Segment order reflects arrival order within the turn. Consecutive
/// segments of the same appendable kind (text, reasoning) are merged by
/// concatenation; a new step always begins a new segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Segment {
    /// Plain/markdown answer content.
    Text { text: String },

    /// Hidden "thinking" trace, rendered separately from answer text.
    /// Closed for the step as soon as answer text begins.
    Reasoning {
        reasoning: String,
        details: Vec<ReasoningDetail>,
    },

    /// A tool call opened mid-stream, mutated in place when the matching
    /// result arrives.
    ToolInvocation {
        tool_name: String,
        tool_call_id: String,
        args: Value,
        state: ToolCallState,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },

    /// Step-boundary marker: per-step usage and wall timestamps, used to
    /// reconcile message totals.
    Flag {
        token_usage: TokenUsage,
        created_at: i64,
        ended_at: i64,
    },

    /// Fatal stream error; terminates the turn.
    Error { created_at: i64, error: ErrorInfo },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::Reasoning {
            reasoning: text.clone(),
            details: vec![ReasoningDetail::Text {
                text,
                signature: None,
            }],
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, Self::Flag { .. })
    }

    /// Whether this segment carries user-visible turn content. Flags and
    /// error markers do not count as "content received".
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            Self::Text { .. } | Self::Reasoning { .. } | Self::ToolInvocation { .. }
        )
    }
}

/// Reasoning metadata attached by the provider: signed plaintext blocks or
/// opaque redacted blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReasoningDetail {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    Redacted {
        data: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCallState {
    PartialCall,
    Result,
}
