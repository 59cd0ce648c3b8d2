use std::sync::Arc;

use arbor_llm::{ChatOptions, ChatRequest, ModelClient};
use arbor_persist::{ChatRecord, ChatStore, KvStore, MemoryStore, PathStore, PersistError, SummaryStore};
use arbor_tools::ToolRegistry;
use arbor_types::{ChatError, ChatNode, ChatPath, CoreMessage, Message};

use crate::controller::{CancelHandle, SessionController, TurnOptions, TurnOutcome, TurnStatus};
use crate::summary::Summarizer;
use crate::tree::{self, PathEntry};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const NEW_CHAT_SUMMARY: &str = "New chat";

/// The three persistence concerns a session writes to, one store each.
#[derive(Clone)]
pub struct SessionStores {
    pub chats: ChatStore,
    pub summaries: SummaryStore,
    pub paths: PathStore,
}

impl SessionStores {
    pub fn new(chats: Arc<dyn KvStore>, summaries: Arc<dyn KvStore>, paths: Arc<dyn KvStore>) -> Self {
        Self {
            chats: ChatStore::new(chats),
            summaries: SummaryStore::new(summaries),
            paths: PathStore::new(paths),
        }
    }

    /// Ephemeral stores for tests and throwaway sessions.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }
}

/// One branching conversation and its turn loop.
///
/// The session owns the tree, two paths into it and the controller. The
/// rendered path is what the user is looking at; the committed path is
/// captured when a turn starts, so a reply always attaches where its
/// request was made even if the user navigates away mid-stream. Edits and
/// regenerations append siblings; nothing in the tree is ever mutated or
/// removed.
pub struct ChatSession {
    id: String,
    nodes: Vec<ChatNode>,
    rendered_path: ChatPath,
    committed_path: ChatPath,
    summary: String,
    system_prompt: String,
    options: ChatOptions,
    controller: SessionController,
    summarizer: Summarizer,
    stores: SessionStores,
}

impl ChatSession {
    pub fn new(stores: SessionStores) -> Self {
        let system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
        let nodes = vec![ChatNode::new(Message::system(&system_prompt))];
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rendered_path: vec![0],
            committed_path: vec![0],
            summary: NEW_CHAT_SUMMARY.to_string(),
            system_prompt,
            options: ChatOptions::default(),
            controller: SessionController::default(),
            summarizer: Summarizer::new(None, stores.summaries.clone()),
            nodes,
            stores,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.controller.set_model(Some(model));
        self
    }

    /// Side-channel model for summaries; often smaller than the chat model.
    pub fn with_summarize_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.summarizer.set_model(Some(model));
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.options.tools = Some(tools);
        self
    }

    pub fn with_chat_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_turn_options(mut self, options: TurnOptions) -> Self {
        self.controller.set_options(options);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self.nodes = vec![ChatNode::new(Message::system(&self.system_prompt))];
        self
    }

    pub fn set_model(&mut self, model: Option<Arc<dyn ModelClient>>) {
        self.controller.set_model(model);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn nodes(&self) -> &[ChatNode] {
        &self.nodes
    }

    pub fn rendered_path(&self) -> &ChatPath {
        &self.rendered_path
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn is_streaming(&self) -> bool {
        self.controller.is_streaming()
    }

    /// The linear thread currently rendered, with sibling counts for
    /// branch pickers.
    pub fn messages(&self) -> Vec<PathEntry> {
        tree::messages_along_path(&self.nodes, &self.rendered_path)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.controller.cancel_handle()
    }

    pub fn cancel(&self) {
        self.controller.cancel_turn();
    }

    /// Appends a user message at the end of the rendered thread and runs
    /// one turn against the extended thread.
    pub async fn send_message(
        &mut self,
        text: impl Into<String>,
    ) -> Result<TurnOutcome, ChatError> {
        let parent = self.rendered_path.clone();
        let target = self.attach_user_message(&parent, Message::user(text))?;
        self.run_turn(target).await
    }

    /// Replaces the user message at `path` by appending an edited sibling
    /// and regenerating from there. The original message and everything
    /// under it stay reachable on their own branch.
    pub async fn edit_message(
        &mut self,
        path: &[usize],
        text: impl Into<String>,
    ) -> Result<TurnOutcome, ChatError> {
        // The root level is a singleton system node; only messages below
        // it (parent path non-empty) are editable.
        let parent = match path.split_last() {
            Some((_, parent)) if !parent.is_empty() => parent.to_vec(),
            _ => return Err(ChatError::stream("Cannot edit the root system prompt")),
        };

        let target = self.attach_user_message(&parent, Message::user(text))?;
        self.run_turn(target).await
    }

    /// Requests a fresh reply to the message above the assistant reply at
    /// `path`. The new reply lands as a sibling of the old one.
    pub async fn regenerate_reply(&mut self, path: &[usize]) -> Result<TurnOutcome, ChatError> {
        let parent = match path.split_last() {
            Some((_, parent)) if !parent.is_empty() => parent.to_vec(),
            _ => {
                return Err(ChatError::stream(
                    "Cannot regenerate the root system prompt",
                ))
            }
        };

        self.rendered_path = parent.clone();
        self.run_turn(parent).await
    }

    /// Re-resolves the rendered path from a branch-picker bookmark and
    /// remembers it.
    pub async fn switch_branch(&mut self, bookmark: &[usize]) -> ChatPath {
        self.rendered_path = tree::resolve_path(&self.nodes, Some(bookmark));
        if let Err(e) = self.stores.paths.set(&self.id, &self.rendered_path).await {
            tracing::warn!(chat_id = %self.id, error = %e, "failed to store path bookmark");
        }
        self.rendered_path.clone()
    }

    /// Loads a persisted conversation and lands on its bookmarked branch.
    pub async fn load(&mut self, id: &str) -> Result<(), PersistError> {
        let record = self.stores.chats.get(id).await?;
        let bookmark = self.stores.paths.get(id).await.ok();

        self.id = record.id;
        self.nodes = record.nodes;
        self.summary = record.summary;
        self.rendered_path = tree::resolve_path(&self.nodes, bookmark.as_deref());
        self.committed_path = self.rendered_path.clone();
        Ok(())
    }

    /// Resets to a fresh, unpersisted conversation under a new id.
    pub fn start_new(&mut self) {
        self.id = uuid::Uuid::new_v4().to_string();
        self.nodes = vec![ChatNode::new(Message::system(&self.system_prompt))];
        self.rendered_path = vec![0];
        self.committed_path = vec![0];
        self.summary = NEW_CHAT_SUMMARY.to_string();
    }

    /// Deletes the conversation from every store and resets. Records that
    /// were never persisted are not an error.
    pub async fn delete(&mut self) -> Result<(), PersistError> {
        match self.stores.chats.delete(&self.id).await {
            Ok(()) | Err(PersistError::ChatNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        match self.stores.summaries.delete(&self.id).await {
            Ok(()) | Err(PersistError::SummaryNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.stores.paths.delete(&self.id).await?;

        self.start_new();
        Ok(())
    }

    fn attach_user_message(
        &mut self,
        parent: &ChatPath,
        message: Message,
    ) -> Result<ChatPath, ChatError> {
        let index = tree::append_child(&mut self.nodes, parent, message)
            .map_err(|e| ChatError::stream(e.to_string()))?;

        let mut target = parent.clone();
        target.push(index);
        self.rendered_path = target.clone();
        Ok(target)
    }

    /// Runs one streaming turn against the thread at `target` and commits
    /// the reply under it.
    ///
    /// The target is captured before streaming starts; navigating the
    /// rendered path elsewhere mid-stream neither moves the reply nor
    /// yanks the user to the old branch when it lands.
    async fn run_turn(&mut self, target: ChatPath) -> Result<TurnOutcome, ChatError> {
        let thread: Vec<CoreMessage> = tree::messages_along_path(&self.nodes, &target)
            .iter()
            .map(|entry| entry.message.to_core())
            .collect();
        let request = ChatRequest::from_messages(thread).with_options(self.options.clone());

        self.committed_path = target.clone();
        let outcome = self.controller.start_turn(request).await?;

        // A turn the user stopped (or that timed out) before any content
        // arrived leaves no trace in the tree.
        let commit = match &outcome.status {
            TurnStatus::Completed | TurnStatus::Failed(_) => true,
            TurnStatus::Cancelled | TurnStatus::TimedOut => outcome.message.has_content(),
        };

        if commit {
            match tree::append_child(&mut self.nodes, &target, outcome.message.clone()) {
                Ok(index) => {
                    let mut reply_path = target.clone();
                    reply_path.push(index);
                    self.committed_path = reply_path.clone();
                    if self.rendered_path == target {
                        self.rendered_path = reply_path;
                    }
                    self.persist().await;
                }
                Err(e) => {
                    tracing::error!(chat_id = %self.id, error = %e, "could not attach reply");
                }
            }
        } else {
            tracing::info!(chat_id = %self.id, "turn produced no content, nothing to commit");
        }

        Ok(outcome)
    }

    /// Writes the tree, the path bookmark and a refreshed summary. Storage
    /// failures are logged, never surfaced into the turn result.
    async fn persist(&mut self) {
        let thread = tree::messages_along_path(&self.nodes, &self.rendered_path);
        self.summary = self.summarizer.refresh(&self.id, &thread).await;

        let record = ChatRecord {
            id: self.id.clone(),
            nodes: self.nodes.clone(),
            summary: self.summary.clone(),
            edit_time: chrono::Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.stores.chats.create_or_update(&record).await {
            tracing::warn!(chat_id = %self.id, error = %e, "failed to store conversation");
        }
        if let Err(e) = self.stores.paths.set(&self.id, &self.rendered_path).await {
            tracing::warn!(chat_id = %self.id, error = %e, "failed to store path bookmark");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_llm::{ScriptStep, ScriptedClient};
    use arbor_types::{Role, StreamEvent};
    use std::time::Duration;

    fn session_with(client: ScriptedClient) -> ChatSession {
        ChatSession::new(SessionStores::in_memory()).with_model(Arc::new(client))
    }

    #[tokio::test]
    async fn send_message_extends_tree_and_rendered_path() {
        let mut session = session_with(ScriptedClient::completing("gpt-4o", "hi there"));

        let outcome = session.send_message("hello").await.unwrap();

        assert_eq!(outcome.status, TurnStatus::Completed);
        assert_eq!(session.rendered_path(), &vec![0, 0, 0]);

        let thread = session.messages();
        assert_eq!(thread.len(), 3);
        assert_eq!(thread[0].message.role, Role::System);
        assert_eq!(thread[1].message.content, "hello");
        assert_eq!(thread[2].message.content, "hi there");
    }

    #[tokio::test]
    async fn completed_turn_is_persisted_with_bookmark() {
        let stores = SessionStores::in_memory();
        let mut session = ChatSession::new(stores.clone())
            .with_model(Arc::new(ScriptedClient::completing("gpt-4o", "answer")))
            .with_summarize_model(Arc::new(
                ScriptedClient::new("gpt-4o-mini", vec![]).with_generate_response("Short greeting"),
            ));

        session.send_message("hello").await.unwrap();

        let record = stores.chats.get(session.id()).await.unwrap();
        assert_eq!(record.nodes, session.nodes().to_vec());
        assert_eq!(record.summary, "Short greeting");
        assert_eq!(session.summary(), "Short greeting");
        assert_eq!(
            stores.paths.get(session.id()).await.unwrap(),
            vec![0, 0, 0]
        );
    }

    #[tokio::test]
    async fn edit_appends_a_sibling_and_keeps_the_old_branch() {
        let mut session = session_with(ScriptedClient::completing("gpt-4o", "reply"));
        session.send_message("first wording").await.unwrap();

        session
            .edit_message(&[0, 0], "second wording")
            .await
            .unwrap();

        assert_eq!(session.rendered_path(), &vec![0, 1, 0]);
        // Both wordings live side by side under the root.
        let root = &session.nodes()[0];
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].message.content, "first wording");
        assert_eq!(root.children[1].message.content, "second wording");
        assert_eq!(session.messages()[1].sibling_count, 2);
    }

    #[tokio::test]
    async fn system_root_cannot_be_edited_or_regenerated() {
        let mut session = session_with(ScriptedClient::completing("gpt-4o", "reply"));
        session.send_message("question").await.unwrap();

        for path in [&[][..], &[0][..]] {
            assert!(session.edit_message(path, "sneaky edit").await.is_err());
            assert!(session.regenerate_reply(path).await.is_err());
        }

        // The root level stays a singleton system node.
        assert_eq!(session.nodes().len(), 1);
        assert_eq!(session.nodes()[0].message.role, Role::System);
    }

    #[tokio::test]
    async fn regenerate_appends_a_sibling_reply() {
        let mut session = session_with(ScriptedClient::completing("gpt-4o", "take one"));
        session.send_message("question").await.unwrap();

        session.set_model(Some(Arc::new(ScriptedClient::completing(
            "gpt-4o",
            "take two",
        ))));
        session.regenerate_reply(&[0, 0, 0]).await.unwrap();

        assert_eq!(session.rendered_path(), &vec![0, 0, 1]);
        let replies = &session.nodes()[0].children[0].children;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].message.content, "take one");
        assert_eq!(replies[1].message.content, "take two");
    }

    #[tokio::test]
    async fn switch_branch_resolves_and_bookmarks() {
        let stores = SessionStores::in_memory();
        let mut session = ChatSession::new(stores.clone())
            .with_model(Arc::new(ScriptedClient::completing("gpt-4o", "take one")));
        session.send_message("question").await.unwrap();
        session.set_model(Some(Arc::new(ScriptedClient::completing(
            "gpt-4o",
            "take two",
        ))));
        session.regenerate_reply(&[0, 0, 0]).await.unwrap();

        let path = session.switch_branch(&[0, 0, 0]).await;

        assert_eq!(path, vec![0, 0, 0]);
        assert_eq!(session.messages()[2].message.content, "take one");
        assert_eq!(stores.paths.get(session.id()).await.unwrap(), vec![0, 0, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_empty_turn_leaves_no_reply_and_no_record() {
        let stores = SessionStores::in_memory();
        let mut session = ChatSession::new(stores.clone())
            .with_model(Arc::new(ScriptedClient::silent("gpt-4o")));
        let handle = session.cancel_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let outcome = session.send_message("hello").await.unwrap();

        assert_eq!(outcome.status, TurnStatus::Cancelled);
        // The user message is in the tree, but no assistant reply and no
        // persisted record.
        assert_eq!(session.rendered_path(), &vec![0, 0]);
        assert!(session.nodes()[0].children[0].children.is_empty());
        assert!(stores.chats.get(session.id()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_turn_with_partial_content_is_committed() {
        let client = ScriptedClient::new(
            "gpt-4o",
            vec![
                ScriptStep::Emit(StreamEvent::StepStart {
                    message_id: "m1".to_string(),
                }),
                ScriptStep::Emit(StreamEvent::TextDelta {
                    text: "partial thought".to_string(),
                }),
                ScriptStep::Hang,
            ],
        );
        let mut session = session_with(client);
        let handle = session.cancel_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let outcome = session.send_message("hello").await.unwrap();

        assert_eq!(outcome.status, TurnStatus::Cancelled);
        assert_eq!(session.rendered_path(), &vec![0, 0, 0]);
        assert_eq!(session.messages()[2].message.content, "partial thought");
    }

    #[tokio::test]
    async fn failed_turn_commits_the_error_reply() {
        let client = ScriptedClient::new(
            "gpt-4o",
            vec![
                ScriptStep::Emit(StreamEvent::StepStart {
                    message_id: "m1".to_string(),
                }),
                ScriptStep::Fail("boom".to_string()),
            ],
        );
        let mut session = session_with(client);

        let outcome = session.send_message("hello").await.unwrap();

        assert!(matches!(outcome.status, TurnStatus::Failed(_)));
        // The reply node holds the error segment so the failure survives
        // a reload.
        assert_eq!(session.rendered_path(), &vec![0, 0, 0]);
        assert!(!session.messages()[2].message.has_content());
    }

    #[tokio::test]
    async fn load_restores_tree_and_bookmarked_branch() {
        let stores = SessionStores::in_memory();
        let mut session = ChatSession::new(stores.clone())
            .with_model(Arc::new(ScriptedClient::completing("gpt-4o", "take one")));
        session.send_message("question").await.unwrap();
        session.set_model(Some(Arc::new(ScriptedClient::completing(
            "gpt-4o",
            "take two",
        ))));
        session.regenerate_reply(&[0, 0, 0]).await.unwrap();
        let id = session.id().to_string();

        let mut reloaded = ChatSession::new(stores.clone());
        reloaded.load(&id).await.unwrap();

        assert_eq!(reloaded.id(), id);
        // The second take was bookmarked at persist time.
        assert_eq!(reloaded.rendered_path(), &vec![0, 0, 1]);
        assert_eq!(reloaded.messages()[2].message.content, "take two");
    }

    #[tokio::test]
    async fn delete_clears_stores_and_resets() {
        let stores = SessionStores::in_memory();
        let mut session = ChatSession::new(stores.clone())
            .with_model(Arc::new(ScriptedClient::completing("gpt-4o", "answer")));
        session.send_message("hello").await.unwrap();
        let old_id = session.id().to_string();

        session.delete().await.unwrap();

        assert!(stores.chats.get(&old_id).await.is_err());
        assert_ne!(session.id(), old_id);
        assert_eq!(session.rendered_path(), &vec![0]);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn delete_of_unpersisted_session_is_fine() {
        let mut session = ChatSession::new(SessionStores::in_memory());
        session.delete().await.unwrap();
    }
}
