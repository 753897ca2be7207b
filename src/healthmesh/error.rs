//! Error taxonomy for the orchestration core.
//!
//! Failures fall into a small, deliberate set of buckets:
//!
//! - [`HealthMeshError::PoolExhausted`] — no usable API key; fatal for the run and
//!   surfaced to the caller as a service-unavailable condition.
//! - [`HealthMeshError::Provider`] — a model invocation failed *after* the one local
//!   recovery attempt (key rotation + retry); fatal for the run.
//! - [`HealthMeshError::Input`] — the request is missing required fields; surfaced
//!   immediately, never retried.
//! - [`HealthMeshError::Storage`] — history-store I/O failed; not retried, fatal for
//!   the request.
//!
//! Malformed JSON from the synthesizer is *not* represented here: it is recovered
//! locally by falling back to raw-text guidance (see
//! [`Orchestrator`](crate::Orchestrator)) and never reaches a caller.

use thiserror::Error;

/// A failure reported by the chat-completion service.
///
/// Auth, quota, and network errors are deliberately collapsed into a single variant:
/// the pipeline treats every provider failure uniformly as a transient error that is
/// worth exactly one retry on a freshly rotated key.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Any failure returned by (or while reaching) the provider.
    #[error("provider call failed: {0}")]
    Api(String),

    /// The client implementation does not support streaming responses.
    #[error("streaming not supported by this client")]
    StreamingUnsupported,
}

/// Top-level error type for orchestration runs.
#[derive(Debug, Error)]
pub enum HealthMeshError {
    /// No API key is configured, or every configured key is in cooldown.
    #[error("API key pool exhausted: {0}")]
    PoolExhausted(String),

    /// A model call failed twice in a row (initial attempt plus the rotated retry).
    #[error("agent model call failed: {0}")]
    Provider(#[from] ProviderError),

    /// The caller omitted or blanked a required field.
    #[error("invalid input: {0}")]
    Input(String),

    /// Reading or writing the history store failed.
    #[error("history store I/O failed: {0}")]
    Storage(#[from] std::io::Error),
}
