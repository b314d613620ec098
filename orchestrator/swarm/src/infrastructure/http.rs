// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// HTTP Coordination Transport
//
// Anti-Corruption Layer for the remote coordination server (MCP).
// Lock and session routes are keyed by resource key / session id; every
// request carries a bearer API key when one is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::application::{CoordinationTransport, StoreOutcome};
use crate::domain::{AgentSession, HolderId, Notification, ResourceKey, SessionId, TransportError};

pub struct HttpCoordinationTransport {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct LockRequest<'a> {
    holder: &'a str,
    ttl_ms: u64,
}

#[derive(Serialize)]
struct ReleaseRequest<'a> {
    holder: &'a str,
}

#[derive(Deserialize)]
struct LockResponse {
    granted: bool,
}

#[derive(Serialize)]
struct StoreSessionRequest<'a> {
    expected_epoch: u64,
    session: &'a AgentSession,
}

#[derive(Deserialize)]
struct ConflictResponse {
    epoch: u64,
}

impl HttpCoordinationTransport {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, TransportError> {
        let base_url =
            Url::parse(base_url).map_err(|e| TransportError::Rejected(format!("invalid coordination URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Rejected(format!(
                "coordination URL cannot be a base: {}",
                base_url
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Override the underlying client (connect timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Rejected("coordination URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        self.authorize(request).send().await.map_err(network_error)
    }

    async fn lock_call(
        &self,
        key: &ResourceKey,
        holder: &HolderId,
        ttl: Duration,
        action: &str,
    ) -> Result<bool, TransportError> {
        let url = self.url(&["locks", key.as_str(), action])?;
        let body = LockRequest {
            holder: holder.as_str(),
            ttl_ms: ttl.as_millis() as u64,
        };
        let response = checked(self.send(self.client.post(url).json(&body)).await?).await?;
        let parsed: LockResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Rejected(format!("Failed to parse lock response: {}", e)))?;
        Ok(parsed.granted)
    }
}

fn network_error(e: reqwest::Error) -> TransportError {
    TransportError::Transient(e.to_string())
}

/// 5xx and 408/429 are worth retrying; any other non-success status is final.
async fn checked(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    let message = format!("HTTP {}: {}", status, error_text);
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS {
        Err(TransportError::Transient(message))
    } else {
        Err(TransportError::Rejected(message))
    }
}

#[async_trait]
impl CoordinationTransport for HttpCoordinationTransport {
    async fn acquire(&self, key: &ResourceKey, holder: &HolderId, ttl: Duration) -> Result<bool, TransportError> {
        self.lock_call(key, holder, ttl, "acquire").await
    }

    async fn renew(&self, key: &ResourceKey, holder: &HolderId, ttl: Duration) -> Result<bool, TransportError> {
        self.lock_call(key, holder, ttl, "renew").await
    }

    async fn release(&self, key: &ResourceKey, holder: &HolderId) -> Result<(), TransportError> {
        let url = self.url(&["locks", key.as_str(), "release"])?;
        let body = ReleaseRequest { holder: holder.as_str() };
        checked(self.send(self.client.post(url).json(&body)).await?).await?;
        Ok(())
    }

    async fn fetch_session(&self, session_id: &SessionId) -> Result<Option<AgentSession>, TransportError> {
        let url = self.url(&["sessions", session_id.as_str()])?;
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let session = checked(response)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::Rejected(format!("Failed to parse session: {}", e)))?;
        Ok(Some(session))
    }

    async fn store_session(&self, session: &AgentSession, expected_epoch: u64) -> Result<StoreOutcome, TransportError> {
        let url = self.url(&["sessions", session.session_id.as_str()])?;
        let body = StoreSessionRequest {
            expected_epoch,
            session,
        };
        let response = self.send(self.client.put(url).json(&body)).await?;
        if response.status() == StatusCode::CONFLICT {
            let conflict: ConflictResponse = response
                .json()
                .await
                .map_err(|e| TransportError::Rejected(format!("Failed to parse conflict body: {}", e)))?;
            return Ok(StoreOutcome::Conflict {
                remote_epoch: conflict.epoch,
            });
        }
        checked(response).await?;
        Ok(StoreOutcome::Stored)
    }

    async fn notify(&self, notification: &Notification) -> Result<(), TransportError> {
        let url = self.url(&["api", "notifications"])?;
        checked(self.send(self.client.post(url).json(notification)).await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_acquire_posts_holder_and_ttl() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/locks/vlan-10/acquire")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(serde_json::json!({"holder": "n/1", "ttl_ms": 30000})))
            .with_status(200)
            .with_body(r#"{"granted": true}"#)
            .create_async()
            .await;

        let transport = HttpCoordinationTransport::new(&server.url(), Some("secret".into())).unwrap();
        let granted = transport
            .acquire(&"vlan-10".into(), &HolderId::new("n/1"), Duration::from_secs(30))
            .await
            .unwrap();

        assert!(granted);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_resource_key_is_path_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/locks/game%2Fmc-instance-7/release")
            .with_status(204)
            .create_async()
            .await;

        let transport = HttpCoordinationTransport::new(&server.url(), None).unwrap();
        transport
            .release(&"game/mc-instance-7".into(), &HolderId::new("n/1"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_session_is_none() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/sessions/s1").with_status(404).create_async().await;

        let transport = HttpCoordinationTransport::new(&server.url(), None).unwrap();
        assert!(transport.fetch_session(&SessionId::new("s1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_conflict_reports_remote_epoch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/sessions/s1")
            .with_status(409)
            .with_body(r#"{"epoch": 9}"#)
            .create_async()
            .await;

        let transport = HttpCoordinationTransport::new(&server.url(), None).unwrap();
        let session = AgentSession::empty(SessionId::new("s1")).next(serde_json::json!({}));
        let outcome = transport.store_session(&session, 0).await.unwrap();
        assert_eq!(outcome, StoreOutcome::Conflict { remote_epoch: 9 });
    }

    #[tokio::test]
    async fn test_status_classification() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/api/notifications").with_status(503).create_async().await;
        server.mock("POST", "/locks/k/renew").with_status(401).create_async().await;

        let transport = HttpCoordinationTransport::new(&server.url(), None).unwrap();
        let notification = Notification::new("action_result", "booner", serde_json::json!({}));

        let err = transport.notify(&notification).await.unwrap_err();
        assert!(matches!(err, TransportError::Transient(_)));

        let err = transport
            .renew(&"k".into(), &HolderId::new("h"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let transport = HttpCoordinationTransport::new("http://127.0.0.1:1", None).unwrap();
        let err = transport.fetch_session(&SessionId::new("s")).await.unwrap_err();
        assert!(matches!(err, TransportError::Transient(_)));
    }
}
