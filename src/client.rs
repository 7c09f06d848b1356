//! Completion service client.
//!
//! The [`CompletionClient`] trait is the only seam between the batch pipeline
//! and the remote text-generation service. [`HttpCompletionClient`] talks to an
//! OpenAI-compatible chat completions endpoint; [`MockCompletionClient`]
//! serves scripted answers for tests.

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument, trace};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation
    System,
    /// The request itself
    User,
    /// A model reply
    Assistant,
}

/// A single `{role, content}` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Trait for sending one chat request and receiving the reply text.
///
/// Implementations must be shareable across the tasks of a batch group.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends `messages` and returns the assistant reply text.
    ///
    /// The reply is requested in JSON-object mode; decoding it is left to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request fails or times out
    /// - The service answers with a non-success status
    /// - The response body lacks a reply message
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[async_trait]
impl<C: CompletionClient + ?Sized> CompletionClient for Arc<C> {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        (**self).complete(messages).await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extracts `choices[0].message.content` from a chat completion body.
fn reply_text(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::decode(format!("response is not a chat completion: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::decode("response has no message content"))
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Chat completions client backed by reqwest.
#[derive(Clone)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpCompletionClient {
    /// Creates a client for the given service with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(service: &ServiceConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: service.api_url.clone(),
            api_key: service.api_key.clone(),
            model: service.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    #[instrument(skip(self, messages), fields(model = %self.model, url = %self.api_url))]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(messages = messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        trace!(status = status.as_u16(), response_len = body.len(), "Completion request finished");

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        reply_text(&body)
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Scripted completion client.
///
/// Each rule matches on a substring of the last user message; the first
/// matching rule answers. Unmatched requests fall back to the default reply,
/// or fail if none is set.
///
/// # Example
/// ```
/// use llm_batch::MockCompletionClient;
///
/// let mock = MockCompletionClient::new()
///     .respond_when("a.txt", Ok(r#"{"processedContents": "A"}"#.to_string()))
///     .with_default(Ok(r#"{"processedContents": "other"}"#.to_string()));
/// assert_eq!(mock.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockCompletionClient {
    rules: Arc<Vec<(String, Result<String>)>>,
    default: Option<Result<String>>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    count: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MockCompletionClient {
    /// Creates a mock with no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reply for requests whose user message contains `needle`.
    #[must_use]
    pub fn respond_when(mut self, needle: impl Into<String>, reply: Result<String>) -> Self {
        Arc::make_mut(&mut self.rules).push((needle.into(), reply));
        self
    }

    /// Sets the reply for requests no rule matches.
    #[must_use]
    pub fn with_default(mut self, reply: Result<String>) -> Self {
        self.default = Some(reply);
        self
    }

    /// Delays every reply, to make concurrency observable.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// All requests received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map_or("", |m| m.content.as_str());

        self.rules
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.default.clone())
            .unwrap_or_else(|| Err(Error::http("no mock reply configured")))
    }
}
