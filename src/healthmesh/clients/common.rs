//! Shared plumbing for OpenAI-compatible clients.
//!
//! Provides the request helpers used by [`GroqClient`](crate::clients::groq::GroqClient)
//! plus a singleton pool of `reqwest::Client` instances, one per base URL, so that
//! HTTP connections, DNS lookups, and TLS handshakes are reused across requests.
//!
//! Batch requests go through the `openai_rust` SDK. Streaming requests speak the
//! Chat Completions SSE wire format directly over the pooled client: the resulting
//! [`ChunkStream`] must be `Send` (pipelines consume it from a spawned task), which
//! the SDK's chunk stream is not.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::StreamExt;
use once_cell::sync::Lazy;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::healthmesh::client_wrapper::{ChunkStream, Message, MessageChunk, Role};
use crate::healthmesh::error::ProviderError;

/// Global HTTP client pool, lazily initialized on first access.
static HTTP_CLIENT_POOL: Lazy<Mutex<HashMap<String, reqwest::Client>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Get or create a shared HTTP client for the given base URL.
///
/// Each base URL gets its own client so connection pooling works per host. The
/// clients keep idle connections alive and send TCP keepalives to avoid paying
/// reconnection overhead on every model call.
pub fn get_http_client(base_url: &str) -> reqwest::Client {
    let mut pool = HTTP_CLIENT_POOL.lock().unwrap();

    if let Some(client) = pool.get(base_url) {
        return client.clone();
    }

    let client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .build()
        .expect("Failed to build HTTP client");

    pool.insert(base_url.to_string(), client.clone());
    client
}

/// Convert our role-tagged messages into the wire format expected by `openai_rust`.
pub fn format_messages(messages: &[Message]) -> Vec<chat::Message> {
    let mut formatted = Vec::with_capacity(messages.len());
    for msg in messages {
        formatted.push(chat::Message {
            role: match msg.role {
                Role::System => "system".to_owned(),
                Role::User => "user".to_owned(),
                Role::Assistant => "assistant".to_owned(),
            },
            content: msg.content.clone(),
        });
    }
    formatted
}

/// Send a chat request and return the assistant's content.
pub async fn send_chat(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
) -> Result<String, ProviderError> {
    let chat_arguments = chat::ChatArguments::new(model, formatted_msgs);

    let response = api.create_chat(chat_arguments, url_path).await;

    match response {
        Ok(response) => Ok(response.choices[0].message.content.clone()),
        Err(err) => {
            log::error!(
                "healthmesh::clients::common::send_chat(...): provider API error: {}",
                err
            );
            Err(ProviderError::Api(err.to_string()))
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct StreamRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

fn wire_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
    messages
        .iter()
        .map(|msg| WireMessage {
            role: match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &msg.content,
        })
        .collect()
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// One decoded line of a chat-completion SSE body.
enum StreamLine {
    /// A delta chunk (possibly empty, e.g. the role-only opener).
    Chunk(MessageChunk),
    /// The `data: [DONE]` terminator.
    Done,
}

/// Decode one SSE line. Non-data lines (blank separators, comments) and
/// malformed payloads yield `None`.
fn decode_stream_line(line: &str) -> Option<StreamLine> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(StreamLine::Done);
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => {
            let content = chunk
                .choices
                .first()
                .and_then(|choice| choice.delta.content.clone())
                .unwrap_or_default();
            let is_final = chunk
                .choices
                .first()
                .map(|choice| choice.finish_reason.is_some())
                .unwrap_or(false);
            Some(StreamLine::Chunk(MessageChunk { content, is_final }))
        }
        Err(err) => {
            log::warn!("skipping malformed stream line ({}): {}", err, payload);
            None
        }
    }
}

/// Send a streaming chat request and return a stream of message chunks.
///
/// Establishment errors (connect failure, non-2xx status) are returned from this
/// function so callers can rotate keys and retry; once the stream is open, errors
/// arrive as items. The response body is drained on a spawned task and forwarded
/// through a channel, which keeps the returned stream `Send`.
pub async fn send_chat_stream(
    http: reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    messages: &[Message],
) -> Result<ChunkStream, ProviderError> {
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    let body = StreamRequest {
        model,
        messages: wire_messages(messages),
        stream: true,
    };

    let response = http
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            log::error!(
                "healthmesh::clients::common::send_chat_stream(...): request failed: {}",
                err
            );
            ProviderError::Api(err.to_string())
        })?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        log::error!(
            "healthmesh::clients::common::send_chat_stream(...): HTTP {}: {}",
            status,
            detail
        );
        return Err(ProviderError::Api(format!("HTTP {}: {}", status, detail)));
    }

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut bytes = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(part) = bytes.next().await {
            let part = match part {
                Ok(part) => part,
                Err(err) => {
                    let _ = tx
                        .send(Err(ProviderError::Api(format!("stream error: {}", err))))
                        .await;
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&part));

            // SSE events are newline-delimited; a network read may split one.
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);

                match decode_stream_line(&line) {
                    Some(StreamLine::Chunk(chunk)) => {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                    Some(StreamLine::Done) => return,
                    None => {}
                }
            }
        }
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_lines_decode_to_delta_chunks() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        match decode_stream_line(line) {
            Some(StreamLine::Chunk(chunk)) => {
                assert_eq!(chunk.content, "Hel");
                assert!(!chunk.is_final);
            }
            _ => panic!("expected a chunk"),
        }
    }

    #[test]
    fn finish_reason_marks_the_final_chunk() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        match decode_stream_line(line) {
            Some(StreamLine::Chunk(chunk)) => {
                assert_eq!(chunk.content, "");
                assert!(chunk.is_final);
            }
            _ => panic!("expected a final chunk"),
        }
    }

    #[test]
    fn done_terminator_ends_the_stream() {
        assert!(matches!(
            decode_stream_line("data: [DONE]"),
            Some(StreamLine::Done)
        ));
    }

    #[test]
    fn separators_comments_and_garbage_are_skipped() {
        assert!(decode_stream_line("").is_none());
        assert!(decode_stream_line(": keep-alive").is_none());
        assert!(decode_stream_line("event: ping").is_none());
        assert!(decode_stream_line("data: {not json").is_none());
    }

    #[test]
    fn chunk_streams_can_cross_task_boundaries() {
        fn assert_send<T: Send>() {}
        assert_send::<ChunkStream>();
    }
}
