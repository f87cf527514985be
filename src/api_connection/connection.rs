use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use super::endpoints::{
    ChatMessage, ChatOptions, ChatRequest, ChatResponse, CHAT_PATH, DEFAULT_MODEL,
    DEFAULT_OLLAMA_URL,
};
use super::ModelClient;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not connect to model server at {0}")]
    ConnectionRefused(String),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("model server error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("model returned an empty reply")]
    EmptyReply,
}

impl ModelError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Timeout(_) => "timeout",
            ModelError::ConnectionRefused(_) => "connection_refused",
            ModelError::Network(_) => "network",
            ModelError::ApiError { .. } => "api_error",
            ModelError::Serialization(_) => "serialization",
            ModelError::EmptyReply => "empty_reply",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
            temperature: None,
        }
    }
}

/// Chat client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: ModelConfig,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .build()
            .map_err(ModelError::Network)?;
        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), CHAT_PATH)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ModelError {
        if err.is_timeout() {
            ModelError::Timeout(self.config.timeout)
        } else if err.is_connect() {
            ModelError::ConnectionRefused(self.config.base_url.clone())
        } else {
            ModelError::Network(err)
        }
    }

    pub async fn call_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
        let url = self.chat_url();
        debug!(%url, model = %request.model, "sending chat request");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %error_body, "model server returned an error");
            return Err(ModelError::ApiError { status, error_body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        Ok(serde_json::from_str::<ChatResponse>(&body)?)
    }
}

impl ModelClient for OllamaClient {
    async fn generate(&self, prompt: String) -> Result<String, ModelError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            stream: false,
            options: self.config.temperature.map(|temperature| ChatOptions {
                temperature: Some(temperature),
            }),
        };

        let response = self.call_chat(&request).await?;
        if response.message.content.trim().is_empty() {
            return Err(ModelError::EmptyReply);
        }
        debug!(
            reply_len = response.message.content.len(),
            eval_count = ?response.eval_count,
            "model reply received"
        );
        Ok(response.message.content)
    }
}
