//! Configuration for HealthMesh.
//!
//! A plain struct users construct however they want — no config-file parsing
//! dependencies are introduced. [`HealthMeshConfig::from_env`] covers the common
//! deployment case of environment-driven settings.
//!
//! # Example
//!
//! ```rust
//! use healthmesh::HealthMeshConfig;
//!
//! // Defaults: Groq's production model, local data/storage paths, no keys.
//! let config = HealthMeshConfig::default();
//! assert_eq!(config.model, "llama-3.3-70b-versatile");
//!
//! // Or read GROQ_API_KEY / GROQ_MODEL_NAME / HEALTHMESH_* from the environment.
//! let config = HealthMeshConfig::from_env();
//! ```

use std::path::PathBuf;

use crate::healthmesh::clients::groq::GROQ_BASE_URL;

/// Global configuration for a HealthMesh deployment.
#[derive(Clone, Debug)]
pub struct HealthMeshConfig {
    /// Provider API keys, in initial rotation order.
    pub api_keys: Vec<String>,
    /// Model identifier injected into every request.
    pub model: String,
    /// OpenAI-compatible endpoint base URL.
    pub base_url: String,
    /// Path of the JSON knowledge-base corpus.
    pub knowledge_path: PathBuf,
    /// Path of the flat JSON history file.
    pub history_path: PathBuf,
}

impl Default for HealthMeshConfig {
    fn default() -> Self {
        HealthMeshConfig {
            api_keys: Vec::new(),
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: GROQ_BASE_URL.to_string(),
            knowledge_path: PathBuf::from("data/knowledge.json"),
            history_path: PathBuf::from("storage/history.json"),
        }
    }
}

impl HealthMeshConfig {
    /// Build a configuration from environment variables, falling back to defaults:
    ///
    /// - `GROQ_API_KEY` — comma-separated API keys
    /// - `GROQ_MODEL_NAME` — model identifier
    /// - `HEALTHMESH_KNOWLEDGE` — knowledge-base JSON path
    /// - `HEALTHMESH_HISTORY` — history JSON path
    pub fn from_env() -> Self {
        let defaults = HealthMeshConfig::default();
        HealthMeshConfig {
            api_keys: std::env::var("GROQ_API_KEY")
                .unwrap_or_default()
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            model: std::env::var("GROQ_MODEL_NAME").unwrap_or(defaults.model),
            base_url: defaults.base_url,
            knowledge_path: std::env::var("HEALTHMESH_KNOWLEDGE")
                .map(PathBuf::from)
                .unwrap_or(defaults.knowledge_path),
            history_path: std::env::var("HEALTHMESH_HISTORY")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_path),
        }
    }
}
