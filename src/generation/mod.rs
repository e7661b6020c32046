//! Abstractions for generating grounded answers via local providers.
//!
//! Answer generation is optional; when no provider is configured the ask
//! pipeline falls back to a deterministic extractive answer built from the
//! retrieved context. The Ollama-backed client mirrors the embedding adapter
//! by issuing HTTP requests directly to the runtime.

use crate::config::{Config, GenerationProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced while attempting answer generation.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was explicitly disabled or unreachable.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the generation provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fully qualified model identifier understood by the provider.
    pub model: String,
    /// Prompt assembled by the ask pipeline.
    pub prompt: String,
}

/// Interface implemented by answer-generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate an answer using the configured model.
    async fn generate(&self, request: GenerationRequest)
    -> Result<String, GenerationClientError>;
}

/// Build a generation client based on configuration.
pub fn generation_client_for(config: &Config) -> Option<Box<dyn GenerationClient>> {
    match config.generation_provider {
        GenerationProvider::None => None,
        GenerationProvider::Ollama => Some(Box::new(OllamaGenerationClient::new(
            config.ollama_url.clone(),
        ))),
    }
}

/// Answer-generation client backed by a local Ollama runtime.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
}

impl OllamaGenerationClient {
    /// Construct a client targeting the given Ollama base URL.
    pub fn new(base_url: String) -> Self {
        let http = Client::builder()
            .user_agent("jsonrag/0.1")
            .build()
            .expect("Failed to construct reqwest::Client for generation");
        Self { http, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                // Low temperature keeps answers anchored to the context.
                "temperature": 0.4,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaGenerateResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let client = OllamaGenerationClient::new(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "Acme sells anvils.",
                    "done": true
                }));
            })
            .await;

        let answer = client
            .generate(GenerationRequest {
                model: "llama3.2".into(),
                prompt: "Answer the question".into(),
            })
            .await
            .expect("answer");

        mock.assert();
        assert_eq!(answer, "Acme sells anvils.");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        let client = OllamaGenerationClient::new(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let error = client
            .generate(GenerationRequest {
                model: "llama3.2".into(),
                prompt: "Answer the question".into(),
            })
            .await
            .expect_err("error response");

        assert!(
            matches!(error, GenerationClientError::GenerationFailed(message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn ollama_client_rejects_incomplete_response() {
        let server = MockServer::start_async().await;
        let client = OllamaGenerationClient::new(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "partial",
                    "done": false
                }));
            })
            .await;

        let error = client
            .generate(GenerationRequest {
                model: "llama3.2".into(),
                prompt: "Answer the question".into(),
            })
            .await
            .expect_err("incomplete response");

        assert!(matches!(error, GenerationClientError::InvalidResponse(_)));
    }
}
