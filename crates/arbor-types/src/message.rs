use serde::{Deserialize, Serialize};

use crate::segment::Segment;
use crate::usage::TokenUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn's content.
///
/// `content` is the flattened convenience view and always equals the
/// concatenation of the text segments in `parts`. Timestamps are epoch
/// milliseconds: `created_at` comes from the first step boundary,
/// `ended_at` is refreshed on every one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub parts: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub token_usage: TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: String::new(),
            role: Role::System,
            parts: vec![Segment::text(content.clone())],
            content,
            created_at: None,
            ended_at: None,
            token_usage: TokenUsage::default(),
            model_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            parts: vec![Segment::text(content.clone())],
            content,
            created_at: Some(chrono::Utc::now().timestamp_millis()),
            ended_at: None,
            token_usage: TokenUsage::default(),
            model_name: None,
        }
    }

    /// Empty assistant shell the stream reducer fills in.
    pub fn assistant(model_name: Option<String>) -> Self {
        Self {
            id: String::new(),
            role: Role::Assistant,
            content: String::new(),
            parts: Vec::new(),
            created_at: None,
            ended_at: None,
            token_usage: TokenUsage::default(),
            model_name,
        }
    }

    /// Whether any user-visible content arrived (text, reasoning or a tool
    /// call — step flags and error markers alone do not count).
    pub fn has_content(&self) -> bool {
        self.parts.iter().any(Segment::is_content)
    }

    /// Flat `{role, content}` projection used as model input.
    pub fn to_core(&self) -> CoreMessage {
        CoreMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Flat model-input message: what actually goes over the wire. Reasoning
/// traces, tool transcripts and step flags are render-side only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreMessage {
    pub role: Role,
    pub content: String,
}

impl CoreMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}
