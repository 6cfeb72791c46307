//! HTTP-backed `Generator` implementation. Supports OpenAI/Anthropic/
//! OpenAI-compatible chat-completion endpoints (grounded on the teacher's
//! original multi-provider `ExternalProvider`, trimmed to the one call the
//! retrieval core actually needs: §4.7 Step 4, §4.8's two judge calls).

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{GenerationConfig, Generator};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiProvider {
    OpenAI,
    Anthropic,
    OpenRouter,
    Custom { endpoint: String },
}

pub struct HttpGenerator {
    provider: ApiProvider,
    api_key: String,
    model: String,
    client: Client,
}

impl HttpGenerator {
    pub fn new(provider: ApiProvider, api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { provider, api_key, model, client })
    }

    fn endpoint(&self) -> String {
        match &self.provider {
            ApiProvider::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
            ApiProvider::Anthropic => "https://api.anthropic.com/v1/messages".to_string(),
            ApiProvider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions".to_string(),
            ApiProvider::Custom { endpoint } => endpoint.clone(),
        }
    }

    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read response body from {}: {}", endpoint, e))?;
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "endpoint {} returned non-JSON (HTTP {}): {}",
                endpoint, status, preview
            ));
        }
        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!("failed to parse JSON from {} (HTTP {}): {}. body: {}", endpoint, status, e, preview)
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String> {
        let endpoint = self.endpoint();

        match &self.provider {
            ApiProvider::Anthropic => {
                let body = json!({
                    "model": self.model,
                    "max_tokens": config.max_tokens,
                    "temperature": config.temperature,
                    "system": system_prompt,
                    "messages": [{"role": "user", "content": user_prompt}],
                });
                let response = self
                    .client
                    .post(&endpoint)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| anyhow!("request to {} failed: {}", endpoint, e))?;
                #[derive(Deserialize)]
                struct ContentBlock {
                    text: Option<String>,
                }
                #[derive(Deserialize)]
                struct AnthropicResponse {
                    content: Vec<ContentBlock>,
                }
                let parsed: AnthropicResponse = Self::parse_json_response(response, &endpoint).await?;
                Ok(parsed
                    .content
                    .into_iter()
                    .filter_map(|b| b.text)
                    .collect::<Vec<_>>()
                    .join(""))
            }
            _ => {
                let body = json!({
                    "model": self.model,
                    "max_tokens": config.max_tokens,
                    "temperature": config.temperature,
                    "top_p": config.top_p,
                    "messages": [
                        {"role": "system", "content": system_prompt},
                        {"role": "user", "content": user_prompt},
                    ],
                });
                let response = self
                    .client
                    .post(&endpoint)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| anyhow!("request to {} failed: {}", endpoint, e))?;
                #[derive(Deserialize)]
                struct Message {
                    content: String,
                }
                #[derive(Deserialize)]
                struct Choice {
                    message: Message,
                }
                #[derive(Deserialize)]
                struct ChatCompletion {
                    choices: Vec<Choice>,
                }
                let parsed: ChatCompletion = Self::parse_json_response(response, &endpoint).await?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| anyhow!("empty choices array from {}", endpoint))
            }
        }
    }

    fn label(&self) -> String {
        self.model.clone()
    }
}
