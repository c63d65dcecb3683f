use std::sync::{Arc, Mutex};
use std::time::Duration;

use grounded_chat_model::{ChatMessage, ErrorKind};
use grounded_chat_test_model::{
    PresetFailure, PresetMatch, TestChatModel, TestEmbedder, TestVectorBackend,
};
use serde_json::json;

use super::TurnStage;
use crate::conversation::Role;
use crate::{FilterPolicy, OrchestratorBuilder};

struct Fixture {
    embedder: TestEmbedder,
    backend: TestVectorBackend,
    model: TestChatModel,
}

impl Fixture {
    fn new() -> Self {
        let mut model = TestChatModel::default();
        model.set_reply("Here is what the documents say.");
        Self {
            embedder: TestEmbedder::default(),
            backend: TestVectorBackend::default(),
            model,
        }
    }

    fn builder(&self) -> OrchestratorBuilder {
        OrchestratorBuilder::with_providers(
            self.embedder.clone(),
            self.backend.clone(),
            self.model.clone(),
        )
        .with_probe(3, Duration::from_millis(10))
    }
}

fn titled(id: &str, title: &str, score: f32) -> PresetMatch {
    PresetMatch::new(id, score).with_metadata(json!({
        "title": title,
        "content": format!("Content of {title}"),
    }))
}

#[tokio::test]
async fn test_grounded_turn() {
    let mut fixture = Fixture::new();
    fixture.backend.set_matches([
        titled("vec-1", "Vector Databases", 0.92),
        titled("pc-1", "Pinecone", 0.88),
    ]);
    let orchestrator = fixture.builder().build();

    let resp = orchestrator
        .send_message("What is a vector database?")
        .await
        .unwrap();
    assert_eq!(resp.answer, "Here is what the documents say.");
    assert_eq!(resp.confidence, 0.92);
    let ids: Vec<_> = resp.sources.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["vec-1", "pc-1"]);
    assert!(resp.retrieval_failure.is_none());
    assert_eq!(resp.conversation_id, orchestrator.conversation_id());

    let history = orchestrator.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role(), Role::User);
    assert_eq!(history[0].content(), "What is a vector database?");
    assert_eq!(history[1].id(), resp.message_id);
    assert_eq!(history[1].sources().len(), 2);
    assert_eq!(history[1].confidence(), Some(0.92));
    assert_eq!(orchestrator.stage(), TurnStage::Completed);

    let (_, query) = &fixture.backend.queries()[0];
    assert_eq!(query.top_k, 5);
}

#[tokio::test]
async fn test_no_matches() {
    let fixture = Fixture::new();
    let orchestrator = fixture.builder().build();

    let resp = orchestrator.send_message("asdkjalksd").await.unwrap();
    assert!(resp.sources.is_empty());
    assert_eq!(resp.confidence, 0.5);
    assert!(resp.answer.contains("couldn't find any relevant information"));
    assert!(resp.retrieval_failure.is_none());
    assert!(fixture.model.requests().is_empty());
    assert_eq!(orchestrator.history().len(), 2);
}

#[tokio::test]
async fn test_low_similarity_still_returns_best_match() {
    let mut fixture = Fixture::new();
    fixture.backend.set_matches([
        titled("a", "Alpha", 0.1),
        titled("b", "Beta", 0.1),
    ]);
    let orchestrator = fixture
        .builder()
        .with_similarity_threshold(0.7)
        .with_filter_policy(FilterPolicy::BestMatchFallback)
        .build();

    let resp = orchestrator.send_message("something vague").await.unwrap();
    assert_eq!(resp.sources.len(), 1);
    assert_eq!(resp.sources[0].id, "a");
    assert!((resp.confidence - 0.1).abs() < f32::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_index_degrades() {
    let mut fixture = Fixture::new();
    fixture.backend.set_describe_failure(PresetFailure::always(
        ErrorKind::Connection,
        "connection refused",
    ));
    let stages = Arc::new(Mutex::new(vec![]));
    let orchestrator = fixture
        .builder()
        .on_stage({
            let stages = Arc::clone(&stages);
            move |stage| stages.lock().unwrap().push(stage)
        })
        .build();

    let resp = orchestrator.send_message("What is HNSW?").await.unwrap();
    assert_eq!(resp.answer, "Here is what the documents say.");
    assert_eq!(resp.confidence, 0.0);
    assert!(resp.sources.is_empty());
    let failure = resp.retrieval_failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::Connection);
    assert_eq!(failure.message, "connection refused");

    let history = orchestrator.history();
    assert!(history[1].retrieval_failure().is_some());
    assert!(fixture.embedder.inputs().is_empty());
    assert_eq!(
        *stages.lock().unwrap(),
        [
            TurnStage::Retrieving,
            TurnStage::DegradedRetrieval,
            TurnStage::Generating,
            TurnStage::Completed,
        ]
    );
}

#[tokio::test]
async fn test_generation_failure() {
    let mut fixture = Fixture::new();
    fixture.backend.set_matches([titled("a", "Alpha", 0.8)]);
    fixture.model.set_failure(PresetFailure::always(
        ErrorKind::Upstream,
        "OpenAI API error (503): overloaded",
    ));
    let orchestrator = fixture.builder().build();

    let err = orchestrator.send_message("Hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    let history = orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role(), Role::User);
    assert_eq!(orchestrator.stage(), TurnStage::Failed);
}

#[tokio::test]
async fn test_blank_message() {
    let fixture = Fixture::new();
    let orchestrator = fixture.builder().build();

    let err = orchestrator.send_message("  \n").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(orchestrator.history().is_empty());
    assert_eq!(fixture.backend.describe_calls(), 0);
    assert_eq!(orchestrator.stage(), TurnStage::Idle);
}

#[tokio::test]
async fn test_history_excludes_current_turn() {
    let mut fixture = Fixture::new();
    fixture.backend.set_matches([titled("a", "Alpha", 0.8)]);
    fixture.model = TestChatModel::default();
    let orchestrator = fixture.builder().build();

    orchestrator.send_message("first question").await.unwrap();
    let resp = orchestrator.send_message("second question").await.unwrap();
    assert_eq!(resp.answer, "You said second question");

    let requests = fixture.model.requests();
    let second = &requests[1].messages;
    let users: Vec<_> = second
        .iter()
        .filter_map(|msg| match msg {
            ChatMessage::User(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(users, ["first question", "second question"]);
    assert_eq!(
        second[3],
        ChatMessage::Assistant("You said first question".to_owned())
    );
}

#[tokio::test]
async fn test_reset() {
    let fixture = Fixture::new();
    let orchestrator = fixture.builder().build();
    orchestrator.send_message("Hello").await.unwrap();
    let old_id = orchestrator.conversation_id();

    let new_id = orchestrator.reset();
    assert_ne!(new_id, old_id);
    assert_eq!(orchestrator.conversation_id(), new_id);
    assert!(orchestrator.history().is_empty());
    assert_eq!(orchestrator.stage(), TurnStage::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_reset_during_turn_drops_answer() {
    let mut fixture = Fixture::new();
    fixture.backend.set_matches([titled("a", "Alpha", 0.8)]);
    fixture.model.set_delay(Duration::from_millis(500));
    let orchestrator = fixture.builder().build();

    let turn = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.send_message("slow question").await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let new_id = orchestrator.reset();

    let resp = turn.await.unwrap().unwrap();
    assert_ne!(resp.conversation_id, new_id);
    assert!(orchestrator.history().is_empty());
}

#[tokio::test]
async fn test_probe() {
    let fixture = Fixture::new();
    let orchestrator = fixture.builder().build();

    let report = orchestrator.probe().await;
    assert!(report.success);
    assert_eq!(report.details.unwrap().name, "test-index");
}
