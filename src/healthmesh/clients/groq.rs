//! Groq client wrapper built on the OpenAI-compatible transport.
//!
//! The backend's provider is Groq's hosted chat-completion service, reached through
//! the same wire format as OpenAI's Chat API. The wrapper delegates HTTP concerns to
//! the shared pooled client in [`common`](crate::clients::common), so each API key
//! gets a cheap per-call client while the underlying connections are reused.
//!
//! # Example
//!
//! ```rust,no_run
//! use healthmesh::client_wrapper::{ClientWrapper, Message};
//! use healthmesh::clients::groq::{GroqClient, Model};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = std::env::var("GROQ_API_KEY")?;
//!     let client = GroqClient::new_with_model_enum(&key, Model::Llama33_70bVersatile);
//!     let reply = client
//!         .send_message(&[Message::user("Say hello in five words.")])
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use openai_rust2 as openai_rust;

use crate::healthmesh::client_wrapper::{
    ChunkStream, ClientFactory, ClientWrapper, Message, Role,
};
use crate::healthmesh::clients::common::{
    format_messages, get_http_client, send_chat, send_chat_stream,
};
use crate::healthmesh::error::ProviderError;

/// Default OpenAI-compatible endpoint for Groq.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat path relative to the endpoint host.
const GROQ_CHAT_PATH: &str = "/openai/v1/chat/completions";

/// Model identifiers served by Groq's chat API.
pub enum Model {
    /// `llama-3.3-70b-versatile` – the default production model.
    Llama33_70bVersatile,
    /// `llama-3.1-8b-instant` – low-latency tier.
    Llama31_8bInstant,
    /// `openai/gpt-oss-120b` – large open-weight reasoning model.
    GptOss120b,
    /// `openai/gpt-oss-20b` – smaller open-weight tier.
    GptOss20b,
}

/// Convert a [`Model`] variant into the string identifier expected by the REST API.
pub fn model_to_string(model: Model) -> String {
    match model {
        Model::Llama33_70bVersatile => "llama-3.3-70b-versatile".to_string(),
        Model::Llama31_8bInstant => "llama-3.1-8b-instant".to_string(),
        Model::GptOss120b => "openai/gpt-oss-120b".to_string(),
        Model::GptOss20b => "openai/gpt-oss-20b".to_string(),
    }
}

/// Client wrapper for Groq's OpenAI-compatible Chat Completions API.
///
/// Batch calls go through the `openai_rust` SDK; streaming calls speak SSE directly
/// over the pooled HTTP client (see
/// [`common::send_chat_stream`](crate::clients::common::send_chat_stream)), so the
/// key and base URL are kept alongside the SDK client.
pub struct GroqClient {
    /// Underlying SDK client pointing at the REST endpoint.
    client: openai_rust::Client,
    /// Pooled HTTP client used by the streaming path.
    http: reqwest::Client,
    /// API key, re-sent as a bearer token on streaming requests.
    api_key: String,
    /// OpenAI-compatible endpoint base URL.
    base_url: String,
    /// Model name that will be injected into each request.
    model: String,
}

impl GroqClient {
    /// Construct a new client using the provided API key and explicit model name.
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Self {
        Self::new_with_base_url(secret_key, model_name, GROQ_BASE_URL)
    }

    /// Construct a new client using the provided API key and [`Model`] variant.
    pub fn new_with_model_enum(secret_key: &str, model: Model) -> Self {
        Self::new_with_model_string(secret_key, &model_to_string(model))
    }

    /// Construct a client targeting a custom OpenAI-compatible base URL.
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        let http = get_http_client(base_url);
        GroqClient {
            client: openai_rust::Client::new_with_client_and_base_url(
                secret_key,
                http.clone(),
                base_url,
            ),
            http,
            api_key: secret_key.to_string(),
            base_url: base_url.to_string(),
            model: model_name.to_string(),
        }
    }
}

#[async_trait]
impl ClientWrapper for GroqClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(&self, messages: &[Message]) -> Result<Message, ProviderError> {
        let formatted_messages = format_messages(messages);
        let url_path = Some(GROQ_CHAT_PATH.to_string());

        let content = send_chat(&self.client, &self.model, formatted_messages, url_path).await?;

        Ok(Message {
            role: Role::Assistant,
            content,
        })
    }

    async fn send_message_stream(&self, messages: &[Message]) -> Result<ChunkStream, ProviderError> {
        send_chat_stream(
            self.http.clone(),
            &self.base_url,
            &self.api_key,
            &self.model,
            messages,
        )
        .await
    }
}

/// Factory producing one [`GroqClient`] per API key handed out by the key pool.
pub struct GroqClientFactory {
    /// Model name injected into every client.
    pub model: String,
    /// Base URL, overridable for OpenAI-compatible self-hosted deployments.
    pub base_url: String,
}

impl GroqClientFactory {
    /// Build a factory for an explicit model name against the default Groq endpoint.
    pub fn new(model_name: &str) -> Self {
        GroqClientFactory {
            model: model_name.to_string(),
            base_url: GROQ_BASE_URL.to_string(),
        }
    }

    /// Build a factory against a custom OpenAI-compatible base URL.
    pub fn new_with_base_url(model_name: &str, base_url: &str) -> Self {
        GroqClientFactory {
            model: model_name.to_string(),
            base_url: base_url.to_string(),
        }
    }
}

impl Default for GroqClientFactory {
    /// Factory for `llama-3.3-70b-versatile` against the default Groq endpoint.
    fn default() -> Self {
        Self::new(&model_to_string(Model::Llama33_70bVersatile))
    }
}

impl ClientFactory for GroqClientFactory {
    fn client_for_key(&self, api_key: &str) -> Arc<dyn ClientWrapper> {
        Arc::new(GroqClient::new_with_base_url(
            api_key,
            &self.model,
            &self.base_url,
        ))
    }
}
