//! Ollama API client for embeddings and generation with retry logic

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{LabConfig, LlmConfig};
use crate::error::{Error, Result};
use crate::providers::retry::RetryPolicy;

const SERVICE: &str = "ollama";

/// Ollama API client with automatic retry
#[derive(Clone)]
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL
    base_url: String,
    /// Temperature for generation
    temperature: f32,
    /// Retry policy for transient failures
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, timeout: Duration, temperature: f32, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            temperature,
            retry,
        })
    }

    /// Client for generation calls
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
            config.temperature,
            RetryPolicy::new(config.max_retries, Duration::from_millis(config.retry_base_delay_ms)),
        )
    }

    /// Client for embedding calls, honouring the embedding-specific URL and timeout
    pub fn for_embeddings(config: &LabConfig) -> Result<Self> {
        let base_url = config
            .embeddings
            .base_url
            .clone()
            .unwrap_or_else(|| config.llm.base_url.clone());
        Self::new(
            base_url,
            Duration::from_secs(config.embeddings.timeout_secs),
            config.llm.temperature,
            config.retry_policy(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed a batch of texts in one request
    pub async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let url = url.as_str();

        self.retry
            .run("ollama embed", move || async move {
                let request = EmbedRequest { model, input: texts };

                let response = self
                    .client
                    .post(url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| transport_error(e, |m| Error::embedding(m)))?;
                let response = check_status(response, |m| Error::embedding(m)).await?;

                let embed_response: EmbedResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

                Ok(embed_response.embeddings)
            })
            .await
    }

    /// Generate a completion for an assembled prompt
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let url = url.as_str();

        tracing::debug!("Generating with model: {}", model);

        self.retry
            .run("ollama generate", move || async move {
                let request = GenerateRequest {
                    model,
                    prompt,
                    stream: false,
                    options: GenerateOptions {
                        temperature: self.temperature,
                    },
                };

                let response = self
                    .client
                    .post(url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| transport_error(e, |m| Error::generation(m)))?;
                let response = check_status(response, |m| Error::generation(m)).await?;

                let generate_response: GenerateResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::generation(format!("Failed to parse generation response: {}", e)))?;

                Ok(generate_response.response)
            })
            .await
    }
}

/// Timeouts and refused connections are transient; anything else is not
fn transport_error(e: reqwest::Error, wrap: fn(String) -> Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::unavailable(SERVICE, e.to_string())
    } else {
        wrap(format!("Request failed: {}", e))
    }
}

async fn check_status(response: Response, wrap: fn(String) -> Error) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body, wrap))
}

fn status_error(status: StatusCode, body: &str, wrap: fn(String) -> Error) -> Error {
    let message = format!("HTTP {} - {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::unavailable(SERVICE, message)
    } else {
        wrap(message)
    }
}
