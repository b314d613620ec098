// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordination Client
//!
//! Wraps a [`CoordinationTransport`] with the client-side guarantees the
//! orchestrator relies on.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Leased locks, session sync with epoch checks, notifications
//!
//! Every call is bounded by `request_timeout` and retried on transient failures
//! with [`RetryPolicy`]. When retries are exhausted the client flips to
//! *disconnected*; releases that could not be delivered are queued and flushed
//! once any later call reaches the server again.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::lease::LeaseGuard;
use super::retry::RetryPolicy;
use super::{CoordinationTransport, StoreOutcome};
use crate::domain::{
    merge_sessions, AgentSession, HolderId, LockLease, Notification, ResourceKey, SessionId, SessionMerge,
    SyncError, TransportError,
};

/// Tunables for [`CoordinationClient`].
#[derive(Debug, Clone)]
pub struct CoordinationSettings {
    pub retry: RetryPolicy,
    /// Upper bound on a single round trip.
    pub request_timeout: Duration,
    /// `source` field stamped on outgoing notifications.
    pub source: String,
}

impl Default for CoordinationSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
            source: "booner".to_string(),
        }
    }
}

pub struct CoordinationClient {
    transport: Arc<dyn CoordinationTransport>,
    settings: CoordinationSettings,
    sessions: DashMap<SessionId, AgentSession>,
    connected: AtomicBool,
    pending_releases: Mutex<Vec<(ResourceKey, HolderId)>>,
}

impl CoordinationClient {
    pub fn new(transport: Arc<dyn CoordinationTransport>, settings: CoordinationSettings) -> Self {
        Self {
            transport,
            settings,
            sessions: DashMap::new(),
            connected: AtomicBool::new(true),
            pending_releases: Mutex::new(Vec::new()),
        }
    }

    /// Whether the last call reached the coordination server.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> &CoordinationSettings {
        &self.settings
    }

    /// Try once (with transport retries) to take the lease on `key`.
    ///
    /// `Ok(false)` means another holder owns a live lease. `Err(Unreachable)`
    /// must be treated by callers as "unavailable".
    pub async fn acquire_lock(&self, key: &ResourceKey, holder: &HolderId, ttl: Duration) -> Result<bool, SyncError> {
        let granted = self
            .call("acquire_lock", || self.transport.acquire(key, holder, ttl))
            .await?;

        if granted {
            debug!(resource_key = %key, holder = %holder, ttl_ms = ttl.as_millis() as u64, "Lock acquired");
        } else {
            metrics::counter!("booner_lock_contention_total").increment(1);
            debug!(resource_key = %key, holder = %holder, "Lock held by another holder");
        }
        Ok(granted)
    }

    /// Acquire `key` and start renewing it in the background.
    ///
    /// Returns `Ok(None)` when the key is held by someone else.
    pub async fn acquire_lease(
        self: &Arc<Self>,
        key: &ResourceKey,
        holder: &HolderId,
        ttl: Duration,
    ) -> Result<Option<LeaseGuard>, SyncError> {
        if !self.acquire_lock(key, holder, ttl).await? {
            return Ok(None);
        }
        let lease = LockLease::new(key.clone(), holder.clone(), ttl);
        Ok(Some(LeaseGuard::start(Arc::clone(self), lease)))
    }

    pub async fn renew_lock(&self, key: &ResourceKey, holder: &HolderId, ttl: Duration) -> Result<bool, SyncError> {
        self.call("renew_lock", || self.transport.renew(key, holder, ttl)).await
    }

    /// Release the lease on `key`.
    ///
    /// If the server cannot be reached the release is queued and retried on
    /// reconnect; the lease lapses on its own after its TTL regardless.
    pub async fn release_lock(&self, key: &ResourceKey, holder: &HolderId) -> Result<(), SyncError> {
        match self.call("release_lock", || self.transport.release(key, holder)).await {
            Ok(()) => {
                debug!(resource_key = %key, holder = %holder, "Lock released");
                Ok(())
            }
            Err(e @ SyncError::Unreachable { .. }) => {
                warn!(resource_key = %key, holder = %holder, "Queueing lock release until coordination server is reachable");
                self.pending_releases.lock().push((key.clone(), holder.clone()));
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Bring the local copy of `session_id` up to date with the server.
    pub async fn sync_session(&self, session_id: &SessionId) -> Result<AgentSession, SyncError> {
        let remote = self
            .call("sync_session", || self.transport.fetch_session(session_id))
            .await?;
        let local = self.sessions.get(session_id).map(|s| s.value().clone());

        let merged = merge_sessions(session_id, local.as_ref(), remote).inspect_err(|e| {
            warn!(session_id = %session_id, error = %e, "Session sync refused");
        })?;

        if let SessionMerge::Overwritten(ref session) = merged {
            info!(session_id = %session_id, epoch = session.epoch, "Local session replaced by newer remote version");
        }

        let session = merged.into_session();
        self.sessions.insert(session_id.clone(), session.clone());
        Ok(session)
    }

    /// Store a new version of the session carrying `state`.
    ///
    /// The write is conditional on the server still holding the locally cached
    /// epoch; a stale local copy yields [`SyncError::EpochConflict`].
    pub async fn commit_session(&self, session_id: &SessionId, state: serde_json::Value) -> Result<AgentSession, SyncError> {
        let base = self
            .sessions
            .get(session_id)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| AgentSession::empty(session_id.clone()));
        let next = base.next(state);

        let outcome = self
            .call("commit_session", || self.transport.store_session(&next, base.epoch))
            .await?;

        match outcome {
            StoreOutcome::Stored => {
                self.sessions.insert(session_id.clone(), next.clone());
                debug!(session_id = %session_id, epoch = next.epoch, "Session committed");
                Ok(next)
            }
            StoreOutcome::Conflict { remote_epoch } => Err(SyncError::EpochConflict {
                session_id: session_id.to_string(),
                local_epoch: base.epoch,
                remote_epoch,
            }),
        }
    }

    pub fn cached_session(&self, session_id: &SessionId) -> Option<AgentSession> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    /// Push an event to the coordination server for other agents to observe.
    pub async fn publish(&self, event_type: &str, data: serde_json::Value) -> Result<(), SyncError> {
        let notification = Notification::new(event_type, self.settings.source.clone(), data);
        self.call("publish", || self.transport.notify(&notification)).await
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let policy = self.settings.retry;
        let attempts = policy.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.settings.request_timeout, op()).await {
                Ok(Ok(value)) => {
                    self.mark_connected().await;
                    return Ok(value);
                }
                Ok(Err(TransportError::Rejected(message))) => {
                    self.mark_connected().await;
                    return Err(SyncError::Protocol(message));
                }
                Ok(Err(TransportError::Transient(message))) => last_error = message,
                Err(_) => {
                    last_error = format!("{} timed out after {:?}", operation, self.settings.request_timeout)
                }
            }

            if attempt < attempts {
                let delay = policy.delay_after(attempt);
                debug!(operation, attempt, delay_ms = delay.as_millis() as u64, error = %last_error, "Retrying coordination call");
                tokio::time::sleep(delay).await;
            }
        }

        if self.connected.swap(false, Ordering::SeqCst) {
            warn!(operation, attempts, error = %last_error, "Coordination server unreachable; failing closed");
        }
        Err(SyncError::Unreachable { attempts, last_error })
    }

    async fn mark_connected(&self) {
        if self.connected.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Coordination server reachable again");

        let pending: Vec<_> = std::mem::take(&mut *self.pending_releases.lock());
        for (key, holder) in pending {
            let delivered = tokio::time::timeout(self.settings.request_timeout, self.transport.release(&key, &holder)).await;
            match delivered {
                Ok(Ok(())) => debug!(resource_key = %key, holder = %holder, "Flushed queued lock release"),
                _ => {
                    warn!(resource_key = %key, holder = %holder, "Queued lock release still undeliverable");
                    self.pending_releases.lock().push((key, holder));
                }
            }
        }
    }
}
