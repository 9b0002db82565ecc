use crate::error::ServiceError;
use crate::logging;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const IMAGE_SIZE: &str = "1024x1024";
const IMAGE_COUNT: u32 = 1;

/// Best-effort image generation. Failures are reported as `None`.
#[async_trait]
pub trait ImageGeneration: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Option<String>;
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

pub struct ImageClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ImageClient {
    pub fn new(client: Client, endpoint: &str, model: &str, api_key: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Request a single 1024x1024 image and return its URL
    pub async fn request_image(&self, prompt: &str) -> Result<String, ServiceError> {
        let request = ImageRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            n: IMAGE_COUNT,
            size: IMAGE_SIZE.to_string(),
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
        let parsed: ImageResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Shape(format!("image body is not JSON: {}", e)))?;

        parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| ServiceError::Shape("missing data[0].url".to_string()))
    }
}

#[async_trait]
impl ImageGeneration for ImageClient {
    async fn generate_image(&self, prompt: &str) -> Option<String> {
        match self.request_image(prompt).await {
            Ok(url) => Some(url),
            Err(e) => {
                logging::log_image(None, &format!("Error generating image: {}", e));
                None
            }
        }
    }
}
