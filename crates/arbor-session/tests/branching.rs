//! End-to-end session scenarios: multi-branch editing, regeneration,
//! tool-call turns and reload from disk-backed stores.

use std::sync::Arc;

use arbor_llm::{ScriptStep, ScriptedClient};
use arbor_persist::JsonFileStore;
use arbor_session::{ChatSession, SessionStores, TurnStatus};
use arbor_types::{Segment, StreamEvent, TokenUsage, ToolCallState};
use serde_json::json;

fn completing(text: &str) -> Arc<ScriptedClient> {
    Arc::new(ScriptedClient::completing("gpt-4o", text))
}

#[tokio::test]
async fn conversation_grows_branches_without_losing_any() {
    let mut session =
        ChatSession::new(SessionStores::in_memory()).with_model(completing("blue, mostly"));

    // sys -> user -> assistant
    session.send_message("what color is the sky").await.unwrap();
    assert_eq!(session.rendered_path(), &vec![0, 0, 0]);

    // Regenerating the reply adds a sibling under the same question.
    session.set_model(Some(completing("depends on the weather")));
    session.regenerate_reply(&[0, 0, 0]).await.unwrap();
    assert_eq!(session.rendered_path(), &vec![0, 0, 1]);

    // Editing the question branches at the root.
    session.set_model(Some(completing("about 384,400 km")));
    session
        .edit_message(&[0, 0], "how far is the moon")
        .await
        .unwrap();
    assert_eq!(session.rendered_path(), &vec![0, 1, 0]);

    // Every branch is still reachable.
    let root = &session.nodes()[0];
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].children.len(), 2);
    assert_eq!(root.children[0].children[0].message.content, "blue, mostly");
    assert_eq!(
        root.children[0].children[1].message.content,
        "depends on the weather"
    );
    assert_eq!(
        root.children[1].children[0].message.content,
        "about 384,400 km"
    );

    // Branch picker: back to the first question's second take.
    let path = session.switch_branch(&[0, 0, 1]).await;
    assert_eq!(path, vec![0, 0, 1]);
    let thread = session.messages();
    assert_eq!(thread[1].message.content, "what color is the sky");
    assert_eq!(thread[2].message.content, "depends on the weather");
    assert_eq!(thread[2].sibling_count, 2);
}

#[tokio::test]
async fn tool_call_turn_settles_into_one_reply() {
    let script = vec![
        ScriptStep::Emit(StreamEvent::StepStart {
            message_id: "m1".to_string(),
        }),
        ScriptStep::Emit(StreamEvent::ToolCall {
            tool_name: "Calculator".to_string(),
            tool_call_id: "call_1".to_string(),
            args: json!({ "expression": "6*7" }),
        }),
        ScriptStep::Emit(StreamEvent::ToolResult {
            tool_call_id: "call_1".to_string(),
            result: json!(42.0),
        }),
        ScriptStep::Emit(StreamEvent::StepFinish {
            usage: TokenUsage::new(20, 5),
            timestamp: 1_000,
        }),
        ScriptStep::Emit(StreamEvent::StepStart {
            message_id: "m1".to_string(),
        }),
        ScriptStep::Emit(StreamEvent::TextDelta {
            text: "The answer is 42.".to_string(),
        }),
        ScriptStep::Emit(StreamEvent::StepFinish {
            usage: TokenUsage::new(30, 8),
            timestamp: 2_000,
        }),
        ScriptStep::Emit(StreamEvent::Finish {
            finish_reason: Some("stop".to_string()),
        }),
    ];
    let mut session = ChatSession::new(SessionStores::in_memory())
        .with_model(Arc::new(ScriptedClient::new("gpt-4o", script)));

    let outcome = session.send_message("what is 6 times 7").await.unwrap();

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.message.content, "The answer is 42.");
    assert_eq!(outcome.message.token_usage, TokenUsage::new(50, 13));

    let parts = &outcome.message.parts;
    assert!(matches!(
        &parts[0],
        Segment::ToolInvocation { state: ToolCallState::Result, result: Some(r), .. }
            if *r == json!(42.0)
    ));
    assert!(parts[1].is_flag());
    assert_eq!(parts[2], Segment::text("The answer is 42."));
    assert!(parts[3].is_flag());
}

#[tokio::test]
async fn session_survives_a_disk_roundtrip() {
    let dir = std::env::temp_dir().join(format!("arbor-it-{}", uuid::Uuid::new_v4()));
    let stores = SessionStores::new(
        Arc::new(JsonFileStore::open(dir.join("chats.json")).await.unwrap()),
        Arc::new(JsonFileStore::open(dir.join("summaries.json")).await.unwrap()),
        Arc::new(JsonFileStore::open(dir.join("paths.json")).await.unwrap()),
    );

    let mut session = ChatSession::new(stores)
        .with_model(completing("it rains a lot"))
        .with_summarize_model(Arc::new(
            ScriptedClient::new("gpt-4o-mini", vec![]).with_generate_response("Weather talk"),
        ));
    session.send_message("weather in bergen?").await.unwrap();
    let id = session.id().to_string();
    let nodes = session.nodes().to_vec();

    // Fresh stores over the same files, fresh session.
    let stores = SessionStores::new(
        Arc::new(JsonFileStore::open(dir.join("chats.json")).await.unwrap()),
        Arc::new(JsonFileStore::open(dir.join("summaries.json")).await.unwrap()),
        Arc::new(JsonFileStore::open(dir.join("paths.json")).await.unwrap()),
    );
    let mut reloaded = ChatSession::new(stores);
    reloaded.load(&id).await.unwrap();

    assert_eq!(reloaded.nodes(), &nodes[..]);
    assert_eq!(reloaded.summary(), "Weather talk");
    assert_eq!(reloaded.rendered_path(), &vec![0, 0, 0]);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
