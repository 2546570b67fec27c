//! HTTP client for OpenAI-compatible model APIs.
//!
//! The trait keeps the run/chat collaborators testable with deterministic
//! mock clients; the production path is [`HttpModelClient`].

use crate::config::ApiConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One message in a model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Completion request handed to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Minimal model API interface used by the run and chat collaborators.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One completion call; returns the assistant message text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ApiError>;

    /// Available model identifiers, optionally filtered by provider prefixes.
    async fn list_models(&self, providers: &[String]) -> Result<Vec<String>, ApiError>;
}

/// Production client for OpenAI-compatible endpoints.
pub struct HttpModelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpModelClient {
    pub fn new(api: &ApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_key: api.api_key.clone(),
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_key)
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .authorized(self.http.post(&url))
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status.as_u16(), body));
        }
        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ApiError::InvalidResponse("response carries no choices".to_string()))
    }

    async fn list_models(&self, providers: &[String]) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/models", self.base_url);
        let response = self.authorized(self.http.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status.as_u16(), body));
        }
        let parsed: ModelsResponse = response.json().await?;
        let mut models: Vec<String> = parsed
            .data
            .into_iter()
            .map(|entry| entry.id)
            .filter(|id| {
                providers.is_empty() || providers.iter().any(|prefix| id.starts_with(prefix))
            })
            .collect();
        models.sort();
        Ok(models)
    }
}
