use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use healthmesh::{
    ChunkStream, ClientFactory, ClientWrapper, HistoryStore, KeyPool, KnowledgeBase,
    MemoryHistoryStore, Message, MessageChunk, Orchestrator, ProviderError, Role, StreamEvent,
};
use tokio_stream::StreamExt;

const SYNTH_CHUNKS: [&str; 3] = ["## Wellness Plan\n", "Rest, hydrate, ", "and sleep well."];

/// Stream-capable scripted client: echoes tasks for the role agents and serves the
/// synthesizer as a fixed chunk sequence.
struct StreamingMockClient {
    agent_reply: String,
}

#[async_trait]
impl ClientWrapper for StreamingMockClient {
    async fn send_message(&self, messages: &[Message]) -> Result<Message, ProviderError> {
        let task = &messages.last().unwrap().content;
        Ok(Message {
            role: Role::Assistant,
            content: format!("{} :: {}", self.agent_reply, task),
        })
    }

    async fn send_message_stream(
        &self,
        _messages: &[Message],
    ) -> Result<ChunkStream, ProviderError> {
        let last = SYNTH_CHUNKS.len() - 1;
        let chunks: Vec<Result<MessageChunk, ProviderError>> = SYNTH_CHUNKS
            .iter()
            .enumerate()
            .map(|(i, text)| {
                Ok(MessageChunk {
                    content: text.to_string(),
                    is_final: i == last,
                })
            })
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "streaming-mock"
    }
}

struct StreamingMockFactory;

impl ClientFactory for StreamingMockFactory {
    fn client_for_key(&self, _api_key: &str) -> Arc<dyn ClientWrapper> {
        Arc::new(StreamingMockClient {
            agent_reply: "agent output".to_string(),
        })
    }
}

/// Client that fails every call, batch and streaming alike.
struct DeadClient;

#[async_trait]
impl ClientWrapper for DeadClient {
    async fn send_message(&self, _messages: &[Message]) -> Result<Message, ProviderError> {
        Err(ProviderError::Api("503 service unavailable".to_string()))
    }

    async fn send_message_stream(
        &self,
        _messages: &[Message],
    ) -> Result<ChunkStream, ProviderError> {
        Err(ProviderError::Api("503 service unavailable".to_string()))
    }

    fn model_name(&self) -> &str {
        "dead-mock"
    }
}

struct DeadFactory;

impl ClientFactory for DeadFactory {
    fn client_for_key(&self, _api_key: &str) -> Arc<dyn ClientWrapper> {
        Arc::new(DeadClient)
    }
}

fn orchestrator(factory: Arc<dyn ClientFactory>) -> Orchestrator {
    Orchestrator::new(
        factory,
        Arc::new(KeyPool::new(vec!["k1".to_string(), "k2".to_string()])),
        Arc::new(KnowledgeBase::from_snippets(vec![])),
        Arc::new(MemoryHistoryStore::new()),
    )
}

async fn collect_events(orchestrator: &Orchestrator, symptoms: &str) -> Vec<StreamEvent> {
    let mut stream = orchestrator.stream_events(symptoms.to_string(), String::new());
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn stream_narrates_the_pipeline_and_delivers_the_answer() {
    let orchestrator = orchestrator(Arc::new(StreamingMockFactory));
    let events = collect_events(&orchestrator, "mild chest congestion").await;

    assert_eq!(
        events.first(),
        Some(&StreamEvent::Thought(
            "User → Orchestrator: new wellness query received.".to_string()
        ))
    );
    assert_eq!(
        events.last(),
        Some(&StreamEvent::Thought(
            "OutputSynthesizer → Orchestrator → User: final wellness plan delivered."
                .to_string()
        ))
    );

    // The synthesizer chunks arrive verbatim, in order, as answer events.
    let answers: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Answer(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(answers, SYNTH_CHUNKS);

    // No answer is emitted before the synthesizer hand-off thought.
    let synth_pos = events
        .iter()
        .position(|e| {
            matches!(e, StreamEvent::Thought(t) if t.contains("Orchestrator → OutputSynthesizer"))
        })
        .unwrap();
    let first_answer_pos = events
        .iter()
        .position(|e| matches!(e, StreamEvent::Answer(_)))
        .unwrap();
    assert!(first_answer_pos > synth_pos);
}

#[tokio::test]
async fn stream_covers_every_agent_including_the_second_lifestyle_pass() {
    let orchestrator = orchestrator(Arc::new(StreamingMockFactory));
    let events = collect_events(&orchestrator, "lower back stiffness").await;

    let thoughts: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Thought(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();

    let completion_markers = [
        "SymptomAgent → Orchestrator: symptom profile ready",
        "LifestyleAgent → Orchestrator: first-pass lifestyle guidance ready",
        "DietAgent → Orchestrator: diet & hydration plan ready",
        "FitnessAgent → Orchestrator: movement plan ready",
        "LifestyleAgent → Orchestrator: refined lifestyle guidance ready",
    ];

    let mut last_index = 0;
    for marker in completion_markers {
        let index = thoughts
            .iter()
            .position(|t| t.starts_with(marker))
            .unwrap_or_else(|| panic!("missing completion thought: {}", marker));
        assert!(index >= last_index, "out-of-order thought: {}", marker);
        last_index = index;
    }
}

#[tokio::test]
async fn handoff_previews_are_capped() {
    // The echoed task text grows well past the preview window.
    let orchestrator = orchestrator(Arc::new(StreamingMockFactory));
    let symptoms = "persistent fatigue ".repeat(40);
    let events = collect_events(&orchestrator, &symptoms).await;

    for event in &events {
        if let StreamEvent::Thought(text) = event {
            if let Some((_, tail)) = text.split_once("Example: ") {
                let preview = tail.trim_end_matches("...").trim_end_matches(".)");
                assert!(
                    preview.chars().count() <= 160,
                    "preview exceeds cap: {}",
                    text
                );
            }
        }
    }
}

#[tokio::test]
async fn provider_outage_ends_the_stream_with_a_terminal_thought() {
    let orchestrator = orchestrator(Arc::new(DeadFactory));
    let events = collect_events(&orchestrator, "sore throat").await;

    // The narration starts normally, then stops at the first failing step.
    assert_eq!(
        events.first(),
        Some(&StreamEvent::Thought(
            "User → Orchestrator: new wellness query received.".to_string()
        ))
    );
    match events.last() {
        Some(StreamEvent::Thought(text)) => {
            assert!(
                text.starts_with("Orchestrator → User: pipeline stopped early"),
                "unexpected terminal event: {}",
                text
            );
        }
        other => panic!("expected terminal thought, got {:?}", other),
    }
    assert!(events
        .iter()
        .all(|e| matches!(e, StreamEvent::Thought(_))));
}

#[tokio::test]
async fn streaming_runs_are_not_persisted() {
    let history = Arc::new(MemoryHistoryStore::new());
    let orchestrator = Orchestrator::new(
        Arc::new(StreamingMockFactory),
        Arc::new(KeyPool::new(vec!["k1".to_string()])),
        Arc::new(KnowledgeBase::from_snippets(vec![])),
        history.clone(),
    );

    let _ = collect_events(&orchestrator, "itchy eyes").await;
    assert!(history.list("guest").await.unwrap().is_empty());
}
