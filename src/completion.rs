use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 120; // 120 second timeout for API requests
pub(crate) const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Text-completion capability the orchestrator and repair unit depend on
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Send one prompt, get back the raw model output
    async fn complete(&self, prompt: &str, max_tokens: Option<u32>) -> Result<String, ServiceError>;
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub(crate) fn build_http_client() -> Result<Client, ServiceError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()?)
}

/// Chat-completion client speaking the OpenAI-compatible wire format
pub struct CompletionClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl CompletionClient {
    pub fn new(client: Client, endpoint: &str, model: &str, api_key: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: Option<u32>,
    ) -> Result<String, ServiceError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
            max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Transport { status, body });
        }

        let body = response.text().await?;
        let completion: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Shape(format!("completion body is not JSON: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| ServiceError::Shape("missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl TextCompletion for CompletionClient {
    async fn complete(&self, prompt: &str, max_tokens: Option<u32>) -> Result<String, ServiceError> {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.chat_completion(messages, max_tokens).await
    }
}
