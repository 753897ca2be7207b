//! Client wrapper implementations for concrete chat-completion providers.

pub mod common;
pub mod groq;
