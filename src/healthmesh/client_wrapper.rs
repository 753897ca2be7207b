//! A ClientWrapper is a wrapper around a chat-completion service.
//! It provides a common interface to invoke the model with an ordered list of
//! role-tagged messages, either as a single response or as a stream of chunks.
//! It does not keep track of the conversation — that is [`SessionMemory`]'s job,
//! which is owned by the orchestration run and fed into each call.
//!
//! [`SessionMemory`]: crate::SessionMemory

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;

use crate::healthmesh::error::ProviderError;

/// Represents the possible roles for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Set by the orchestrator to steer the model's responses.
    System,
    /// A message sent by the user (or composed on the user's behalf).
    User,
    /// Content the model generated in response to a user message.
    Assistant,
}

/// Represents a generic message to be sent to the model.
#[derive(Clone, Debug)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: String,
}

impl Message {
    /// Convenience constructor for a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Convenience constructor for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Convenience constructor for an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Represents a chunk of a streaming model response.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    /// The incremental content in this chunk.
    pub content: String,
    /// Whether this is the final chunk in the stream.
    pub is_final: bool,
}

/// Type alias for a boxed stream of message chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<MessageChunk, ProviderError>> + Send>>;

/// Trait defining the interface to the external chat-completion service.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send the ordered message list to the model and get a single response.
    async fn send_message(&self, messages: &[Message]) -> Result<Message, ProviderError>;

    /// Send the ordered message list and get a streaming response.
    ///
    /// Returns a stream of [`MessageChunk`] items so tokens can be processed as
    /// they arrive. The default implementation reports streaming as unsupported,
    /// so non-streaming clients don't break.
    async fn send_message_stream(
        &self,
        _messages: &[Message],
    ) -> Result<ChunkStream, ProviderError> {
        Err(ProviderError::StreamingUnsupported)
    }

    /// The model identifier this client sends requests to.
    fn model_name(&self) -> &str;
}

/// Builds a [`ClientWrapper`] bound to one API key.
///
/// The pipeline constructs a fresh client per model call with whatever key the
/// [`KeyPool`](crate::KeyPool) hands out, so key rotation stays invisible to the
/// agents themselves. Tests substitute factories that produce scripted clients.
pub trait ClientFactory: Send + Sync {
    /// Create a client that authenticates with `api_key`.
    fn client_for_key(&self, api_key: &str) -> Arc<dyn ClientWrapper>;
}
