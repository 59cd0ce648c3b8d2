use std::sync::Arc;
use std::time::Duration;

use arbor_llm::{ChatRequest, ModelClient};
use arbor_persist::SummaryStore;
use arbor_types::Role;

use crate::tree::PathEntry;

/// Summary generation gets a short leash; a slow side-channel model must
/// never hold up the turn path.
pub const SUMMARY_TIMEOUT: Duration = Duration::from_secs(10);

const SUMMARY_SYSTEM_PROMPT: &str = "You're good at summarizing, summarize the content provided \
     by user in 10 words directly, don't add extra words";

const SUMMARY_FALLBACK: &str = "Failed to summarize";

/// Best-effort conversation summarizer for the history list.
///
/// Failure never propagates: on a generation error or timeout the
/// previously stored summary is kept, and a fixed fallback is used when
/// there is none.
pub struct Summarizer {
    model: Option<Arc<dyn ModelClient>>,
    summaries: SummaryStore,
}

impl Summarizer {
    pub fn new(model: Option<Arc<dyn ModelClient>>, summaries: SummaryStore) -> Self {
        Self { model, summaries }
    }

    pub fn set_model(&mut self, model: Option<Arc<dyn ModelClient>>) {
        self.model = model;
    }

    /// Regenerates and stores the summary for `chat_id` from the rendered
    /// thread, returning whatever summary ends up stored.
    pub async fn refresh(&self, chat_id: &str, thread: &[PathEntry]) -> String {
        let transcript = transcript(thread);

        let summary = match self.generate(&transcript).await {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => self.previous_or_fallback(chat_id).await,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "summary generation failed, keeping previous");
                self.previous_or_fallback(chat_id).await
            }
        };

        if let Err(e) = self.summaries.create_or_update(chat_id, &summary).await {
            tracing::warn!(chat_id, error = %e, "failed to store summary");
        }

        summary
    }

    async fn generate(&self, transcript: &str) -> anyhow::Result<String> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no summarize model bound"))?;

        let request = ChatRequest::from_prompt(transcript).with_system(SUMMARY_SYSTEM_PROMPT);
        tokio::time::timeout(SUMMARY_TIMEOUT, model.generate(request))
            .await
            .map_err(|_| anyhow::anyhow!("summary generation timed out"))?
    }

    async fn previous_or_fallback(&self, chat_id: &str) -> String {
        match self.summaries.get(chat_id).await {
            Ok(record) => record.summary,
            Err(_) => SUMMARY_FALLBACK.to_string(),
        }
    }
}

/// Flattens the rendered thread into `role: content` lines, skipping the
/// system prompt (it is the same for every conversation and would drown
/// the signal).
fn transcript(thread: &[PathEntry]) -> String {
    thread
        .iter()
        .filter(|entry| entry.message.role != Role::System)
        .map(|entry| {
            format!(
                "{}: {}",
                entry.message.role.as_str(),
                entry.message.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_llm::ScriptedClient;
    use arbor_persist::MemoryStore;
    use arbor_types::Message;

    fn entry(message: Message) -> PathEntry {
        PathEntry {
            message,
            index: 0,
            sibling_count: 1,
        }
    }

    fn thread() -> Vec<PathEntry> {
        vec![
            entry(Message::system("sys")),
            entry(Message::user("what is rust")),
        ]
    }

    fn store() -> SummaryStore {
        SummaryStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn generated_summary_is_stored() {
        let summaries = store();
        let model = ScriptedClient::new("gpt-4o-mini", vec![])
            .with_generate_response("Rust language basics");
        let summarizer = Summarizer::new(Some(Arc::new(model)), summaries.clone());

        let summary = summarizer.refresh("c1", &thread()).await;

        assert_eq!(summary, "Rust language basics");
        assert_eq!(summaries.get("c1").await.unwrap().summary, "Rust language basics");
    }

    #[tokio::test]
    async fn failure_keeps_the_previous_summary() {
        let summaries = store();
        summaries.create_or_update("c1", "older summary").await.unwrap();

        // No generate response configured, so generation errors.
        let model = ScriptedClient::new("gpt-4o-mini", vec![]);
        let summarizer = Summarizer::new(Some(Arc::new(model)), summaries.clone());

        let summary = summarizer.refresh("c1", &thread()).await;

        assert_eq!(summary, "older summary");
        assert_eq!(summaries.get("c1").await.unwrap().summary, "older summary");
    }

    #[tokio::test]
    async fn failure_with_no_previous_uses_the_fallback() {
        let summaries = store();
        let summarizer = Summarizer::new(None, summaries.clone());

        let summary = summarizer.refresh("c1", &thread()).await;

        assert_eq!(summary, SUMMARY_FALLBACK);
        assert_eq!(summaries.get("c1").await.unwrap().summary, SUMMARY_FALLBACK);
    }

    #[test]
    fn transcript_skips_the_system_prompt() {
        let text = transcript(&thread());
        assert_eq!(text, "user: what is rust");
    }
}
