use serde::{Deserialize, Serialize};
use std::sync::Arc;

use arbor_types::{ChatNode, ChatPath};

use crate::error::{PersistError, Result};
use crate::store::KvStore;

/// A persisted conversation: the full branching tree plus its list-display
/// summary, keyed by session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub nodes: Vec<ChatNode>,
    pub summary: String,
    pub edit_time: i64,
}

/// Summary entry for the history list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: String,
    pub summary: String,
    pub created_at: i64,
    pub modified_at: i64,
}

/// Conversation trees by session id.
#[derive(Clone)]
pub struct ChatStore {
    store: Arc<dyn KvStore>,
}

impl ChatStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn create_or_update(&self, record: &ChatRecord) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.store.set(&record.id, value).await
    }

    pub async fn get(&self, id: &str) -> Result<ChatRecord> {
        match self.store.get(id).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(PersistError::ChatNotFound(id.to_string())),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.store.delete(id).await? {
            Ok(())
        } else {
            Err(PersistError::ChatNotFound(id.to_string()))
        }
    }
}

/// Generated summaries by session id.
#[derive(Clone)]
pub struct SummaryStore {
    store: Arc<dyn KvStore>,
}

impl SummaryStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn create_or_update(&self, id: &str, summary: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let record = match self.get(id).await {
            Ok(existing) => SummaryRecord {
                summary: summary.to_string(),
                modified_at: now,
                ..existing
            },
            Err(PersistError::SummaryNotFound(_)) => SummaryRecord {
                id: id.to_string(),
                summary: summary.to_string(),
                created_at: now,
                modified_at: now,
            },
            Err(e) => return Err(e),
        };

        self.store.set(id, serde_json::to_value(&record)?).await
    }

    pub async fn get(&self, id: &str) -> Result<SummaryRecord> {
        match self.store.get(id).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(PersistError::SummaryNotFound(id.to_string())),
        }
    }

    pub async fn all(&self) -> Result<Vec<SummaryRecord>> {
        let mut records = Vec::new();
        for value in self.store.values().await? {
            match serde_json::from_value(value) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "skipping malformed summary record"),
            }
        }
        Ok(records)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.store.delete(id).await? {
            Ok(())
        } else {
            Err(PersistError::SummaryNotFound(id.to_string()))
        }
    }
}

/// Path bookmarks: the branch the UI was on when the conversation was last
/// open, recalled on reload.
#[derive(Clone)]
pub struct PathStore {
    store: Arc<dyn KvStore>,
}

impl PathStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<ChatPath> {
        match self.store.get(id).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(PersistError::PathNotFound(id.to_string())),
        }
    }

    pub async fn set(&self, id: &str, path: &ChatPath) -> Result<()> {
        self.store.set(id, serde_json::to_value(path)?).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await.map(drop)
    }
}
