// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama Gateway Adapter
//
// Completions via POST /api/generate (non-streaming) and embeddings via
// POST /api/embeddings. Works fully air-gapped against a local server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use booner_cortex::{ContextError, Embedder};

use crate::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

pub struct OllamaAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    embed_model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaAdapter {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, embed_model: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, model, embed_model)
    }

    /// Adapter whose requests are bounded by `timeout`.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        embed_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LLMError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LLMError::InvalidInput(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, endpoint, model, embed_model))
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        embed_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            embed_model: embed_model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        model: &str,
        body: &B,
    ) -> Result<R, LLMError> {
        let url = format!("{}{}", self.endpoint, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                404 => LLMError::ModelNotFound(model.to_string()),
                401 | 403 => LLMError::Authentication(format!("HTTP {}", status)),
                429 => LLMError::RateLimit,
                500..=599 => LLMError::Network(format!("HTTP {}: {}", status, error_text)),
                _ => LLMError::Provider(format!("HTTP {}: {}", status, error_text)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))
    }

    pub async fn embedding(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        let request = EmbeddingRequest {
            model: &self.embed_model,
            prompt: text,
        };
        let response: EmbeddingResponse = self.post("/api/embeddings", &self.embed_model, &request).await?;
        if response.embedding.is_empty() {
            return Err(LLMError::Provider("empty embedding".to_string()));
        }
        Ok(response.embedding)
    }
}

#[async_trait]
impl LLMProvider for OllamaAdapter {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: options.json_mode.then_some("json"),
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens.map(|t| t as i32),
            },
        };

        let response: GenerateResponse = self.post("/api/generate", &self.model, &request).await?;

        Ok(GenerationResponse {
            text: response.response,
            model: self.model.clone(),
            provider: "ollama".to_string(),
            usage: TokenUsage {
                prompt_tokens: response.prompt_eval_count.unwrap_or(0),
                completion_tokens: response.eval_count.unwrap_or(0),
            },
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let url = format!("{}/api/tags", self.endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[async_trait]
impl Embedder for OllamaAdapter {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ContextError> {
        self.embedding(text)
            .await
            .map_err(|e| ContextError::Embedding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate_sends_non_streaming_json_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(json!({
                "model": "mixtral:latest",
                "stream": false,
                "format": "json",
            })))
            .with_status(200)
            .with_body(r#"{"response":"{\"action\":\"query\"}","done":true,"eval_count":7,"prompt_eval_count":40}"#)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "mixtral:latest", "mxbai-embed-large");
        let options = GenerationOptions {
            json_mode: true,
            ..Default::default()
        };
        let response = adapter.generate("what vlans exist?", &options).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, r#"{"action":"query"}"#);
        assert_eq!(response.usage.total(), 47);
        assert_eq!(response.provider, "ollama");
    }

    #[tokio::test]
    async fn test_missing_model_is_model_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model not found"}"#)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "nope", "mxbai-embed-large");
        let err = adapter.generate("hi", &GenerationOptions::default()).await.unwrap_err();
        assert_eq!(err, LLMError::ModelNotFound("nope".to_string()));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(503)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "mixtral:latest", "mxbai-embed-large");
        let err = adapter.generate("hi", &GenerationOptions::default()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_embed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embeddings")
            .match_body(Matcher::PartialJson(json!({"model": "mxbai-embed-large"})))
            .with_status(200)
            .with_body(r#"{"embedding":[0.1,0.2,0.3]}"#)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "mixtral:latest", "mxbai-embed-large");
        let vector = adapter.embed("deploy minecraft").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_health_check_lists_tags() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[]}"#)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(format!("{}/", server.url()), "mixtral:latest", "mxbai-embed-large");
        adapter.health_check().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let adapter = OllamaAdapter::new("http://127.0.0.1:9", "mixtral:latest", "mxbai-embed-large");
        let err = adapter.health_check().await.unwrap_err();
        assert!(matches!(err, LLMError::Network(_)));
    }
}
