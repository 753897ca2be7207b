//! HealthMesh HTTP server: environment-driven configuration, Groq transport,
//! flat-file history, and the full batch + streaming endpoint surface.

use std::sync::Arc;

use healthmesh::clients::groq::GroqClientFactory;
use healthmesh::server::{serve, AppState};
use healthmesh::{HealthMeshConfig, JsonHistoryStore, KeyPool, KnowledgeBase, Orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    healthmesh::init_logger();

    let config = HealthMeshConfig::from_env();
    if config.api_keys.is_empty() {
        log::warn!("no GROQ_API_KEY configured; every request will fail with 503");
    }

    let orchestrator = Orchestrator::new(
        Arc::new(GroqClientFactory::new_with_base_url(
            &config.model,
            &config.base_url,
        )),
        Arc::new(KeyPool::new(config.api_keys.clone())),
        Arc::new(KnowledgeBase::load(&config.knowledge_path)),
        Arc::new(JsonHistoryStore::new(&config.history_path)),
    );

    let addr = std::env::var("HEALTHMESH_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
    serve(AppState { orchestrator }, &addr).await
}
