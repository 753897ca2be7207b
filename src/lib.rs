//! # HealthMesh
//!
//! HealthMesh is a multi-agent wellness-advice backend. A user submits symptoms (and
//! optionally free-form medical report text), and four role-specialized LLM agents —
//! symptom triage, lifestyle, diet, and fitness — run as a sequential, context-sharing
//! pipeline whose outputs a synthesizer model call merges into one structured wellness
//! plan.
//!
//! The crate provides carefully layered abstractions for:
//!
//! * **Key Pool**: [`KeyPool`] rotates round-robin over a set of provider API keys and
//!   benches a key for a cooldown window after a quota failure, converting hard provider
//!   quota errors into soft, retryable degradation
//! * **Session Memory**: [`SessionMemory`] is the append-only transcript shared by every
//!   agent within one orchestration run — each run owns its own instance, so concurrent
//!   requests can never observe each other's exchanges
//! * **Role Agents**: [`RoleAgent`] encapsulates one persona (system prompt plus safety
//!   constraints), reads the shared transcript, calls the model with key rotation and a
//!   single retry, and appends its output back to the transcript
//! * **Knowledge Retrieval**: [`KnowledgeBase`] performs a deliberately naive keyword
//!   lookup over a local snippet corpus that feeds the diet agent
//! * **Orchestration**: [`Orchestrator`] drives the fixed pipeline (symptom → lifestyle →
//!   diet → fitness → refined lifestyle → synthesis) in batch mode, returning a
//!   [`WellnessPlan`], or in streaming mode, producing incremental [`StreamEvent`]s for
//!   a live UI
//! * **Provider Flexibility**: the [`ClientWrapper`] trait abstracts the chat-completion
//!   service; [`clients::groq::GroqClient`] targets Groq's OpenAI-compatible endpoint,
//!   and any OpenAI-compatible deployment can be swapped in via [`ClientFactory`]
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use healthmesh::clients::groq::GroqClientFactory;
//! use healthmesh::{JsonHistoryStore, KeyPool, KnowledgeBase, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     healthmesh::init_logger();
//!
//!     let orchestrator = Orchestrator::new(
//!         Arc::new(GroqClientFactory::default()),
//!         Arc::new(KeyPool::from_env()),
//!         Arc::new(KnowledgeBase::load("data/knowledge.json")),
//!         Arc::new(JsonHistoryStore::new("storage/history.json")),
//!     );
//!
//!     let plan = orchestrator
//!         .orchestrate("persistent headache and fatigue", "", "demo-user")
//!         .await?;
//!     println!("{}", plan.synthesized_guidance);
//!     Ok(())
//! }
//! ```
//!
//! For the streaming variant, [`Orchestrator::stream_events`] returns a channel-backed
//! stream of `thought` and `answer` events suitable for a Server-Sent-Events endpoint;
//! the optional `server` feature exposes exactly that over HTTP.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// The helper is intentionally lightweight so that applications embedding HealthMesh can
/// opt-in to simple `RUST_LOG` driven diagnostics without having to choose a specific
/// logging backend upfront.
///
/// ```rust
/// healthmesh::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `healthmesh` module.
pub mod healthmesh;

// Re-exporting key items for easier external access.
pub use crate::healthmesh::agents::{send_with_rotation, RoleAgent};
pub use crate::healthmesh::client_wrapper;
pub use crate::healthmesh::client_wrapper::{
    ChunkStream, ClientFactory, ClientWrapper, Message, MessageChunk, Role,
};
pub use crate::healthmesh::clients;
pub use crate::healthmesh::config::HealthMeshConfig;
pub use crate::healthmesh::error::{HealthMeshError, ProviderError};
pub use crate::healthmesh::history_store::{HistoryStore, JsonHistoryStore, MemoryHistoryStore};
pub use crate::healthmesh::intent;
pub use crate::healthmesh::key_pool::KeyPool;
pub use crate::healthmesh::knowledge::{KnowledgeBase, KnowledgeSnippet};
pub use crate::healthmesh::memory::{Exchange, SessionMemory};
pub use crate::healthmesh::orchestrator::{AgentStep, Orchestrator, Synthesis, WellnessPlan};
pub use crate::healthmesh::streaming::StreamEvent;

#[cfg(feature = "server")]
pub use crate::healthmesh::server;
