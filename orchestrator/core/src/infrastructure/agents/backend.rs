// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Backend HTTP Client
//
// Thin JSON client used by every HTTP action agent. Maps transport and status
// failures onto the retryable/fatal split the executor works with.

use reqwest::{Method, StatusCode, Url};
use serde_json::Value;

use crate::domain::action::ExecutionError;

/// How requests to a backend are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendAuth {
    None,
    /// OPNsense-style key/secret pair.
    Basic { key: String, secret: String },
    Bearer(String),
}

#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
    auth: BackendAuth,
}

impl BackendClient {
    pub fn new(base_url: &str, auth: BackendAuth) -> Result<Self, ExecutionError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ExecutionError::fatal(format!("invalid backend URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ExecutionError::fatal(format!("backend URL cannot be a base: {}", base_url)));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            auth,
        })
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or("localhost")
    }

    pub async fn get(&self, segments: &[&str]) -> Result<Value, ExecutionError> {
        self.request(Method::GET, segments, None).await
    }

    pub async fn post(&self, segments: &[&str], body: &Value) -> Result<Value, ExecutionError> {
        self.request(Method::POST, segments, Some(body)).await
    }

    pub async fn delete(&self, segments: &[&str]) -> Result<Value, ExecutionError> {
        self.request(Method::DELETE, segments, None).await
    }

    /// One call. An empty response body decodes to `Value::Null`.
    pub async fn request(&self, method: Method, segments: &[&str], body: Option<&Value>) -> Result<Value, ExecutionError> {
        let url = self.url(segments)?;
        let mut request = self.client.request(method.clone(), url.clone());
        request = match &self.auth {
            BackendAuth::None => request,
            BackendAuth::Basic { key, secret } => request.basic_auth(key, Some(secret)),
            BackendAuth::Bearer(token) => request.bearer_auth(token),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            ExecutionError::retryable(format!("{} {} failed: {}", method, url.path(), e))
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExecutionError::retryable(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = format!("{} {} returned HTTP {}: {}", method, url.path(), status, text.trim());
            return Err(if is_retryable_status(status) {
                ExecutionError::retryable(message)
            } else {
                ExecutionError::fatal(message)
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ExecutionError::fatal(format!("undecodable response from {}: {}", url.path(), e)))
    }

    /// Reachability check: any answer below 500 means the backend is up.
    pub async fn probe(&self, segments: &[&str]) -> bool {
        let Ok(url) = self.url(segments) else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(_) => false,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ExecutionError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ExecutionError::fatal("backend URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// 408, 425, 429 and 5xx are worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status.as_u16() == 425
        || status == StatusCode::TOO_MANY_REQUESTS
}
