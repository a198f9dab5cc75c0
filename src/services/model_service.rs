use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{ModelConfig, RetryPolicy};
use crate::error::AppError;
use crate::logging::truncate_for_log;

const LOG_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub purpose: &'static str,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// Ask the server for a JSON object response.
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn json(purpose: &'static str, messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self {
            purpose,
            messages,
            temperature,
            json_response: true,
        }
    }

    pub fn text(purpose: &'static str, messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self {
            purpose,
            messages,
            temperature,
            json_response: false,
        }
    }

    pub fn user_content(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Failures reported by a model backend, before classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Authentication error: {0}")]
    Authentication(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Connection error: {0}")]
    Connection(String),
}

impl ModelError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout(_) | Self::ServiceUnavailable(_)
        )
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        AppError::Connection(err.to_string())
    }
}

/// Maps an HTTP error status onto the model error taxonomy.
pub fn classify_status(status: u16, body: &str) -> ModelError {
    let detail = format!("HTTP status {status}: {}", truncate_for_log(body.trim(), 300));
    match status {
        401 | 403 => ModelError::Authentication(detail),
        408 | 504 => ModelError::Timeout(detail),
        429 => ModelError::RateLimited(detail),
        409 | 500 | 502 | 503 | 529 => ModelError::ServiceUnavailable(detail),
        400..=499 => ModelError::BadRequest(detail),
        _ => ModelError::Api(detail),
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ModelError::Timeout(err.to_string());
        }
        if err.is_connect() {
            return ModelError::Connection(err.to_string());
        }
        if let Some(status) = err.status() {
            return classify_status(status.as_u16(), &err.to_string());
        }
        if err.is_decode() || err.is_body() {
            return ModelError::Api(err.to_string());
        }
        ModelError::Connection(err.to_string())
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any server speaking the OpenAI `/chat/completions` protocol,
/// hosted or local.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    config: ModelConfig,
}

impl OpenAiCompatibleClient {
    pub fn new(config: ModelConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::General(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if request.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let mut builder = self
            .http
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&self.request_body(request));
        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Api("response contained no message content".to_string()))
    }
}

/// Sends one request, retrying transient failures with a fixed delay.
/// Exhausted retries escalate to [`AppError::Connection`].
pub async fn send_with_retry(
    client: &dyn ModelClient,
    request: &CompletionRequest,
    policy: RetryPolicy,
) -> Result<String, AppError> {
    debug!(
        purpose = request.purpose,
        model = client.model(),
        prompt = %truncate_for_log(&request.user_content(), LOG_PREVIEW_CHARS),
        "Model request"
    );

    let mut retries = 0;
    loop {
        match client.complete(request).await {
            Ok(text) => {
                debug!(
                    purpose = request.purpose,
                    chars = text.len(),
                    response = %truncate_for_log(&text, LOG_PREVIEW_CHARS),
                    "Model response"
                );
                return Ok(text);
            }
            Err(err) if err.is_transient() && retries < policy.max_retries => {
                retries += 1;
                warn!(
                    purpose = request.purpose,
                    attempt = retries,
                    max_retries = policy.max_retries,
                    error = %err,
                    "Transient model error, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) if err.is_transient() => {
                return Err(AppError::Connection(format!(
                    "{err} (after {} retries)",
                    policy.max_retries
                )));
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays queued responses in order and records every request.
    pub struct ScriptedClient {
        responses: Mutex<VecDeque<Result<String, ModelError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        pub fn new(responses: Vec<Result<String, ModelError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn ok(responses: &[&str]) -> Self {
            Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Api("no scripted response left".to_string())))
        }
    }
}
