// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::application::{CoordinationTransport, StoreOutcome};
use crate::domain::{AgentSession, HolderId, Notification, ResourceKey, SessionId, TransportError};

/// Notifications kept by default; older ones are dropped first.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

struct HeldLease {
    holder: HolderId,
    expires_at: Instant,
}

/// Process-local coordination server.
///
/// Lease expiry follows `tokio::time`, so tests can drive it with
/// `tokio::time::pause()` / `advance()`. [`set_reachable`](Self::set_reachable)
/// simulates a network partition. The notification log is a ring that keeps
/// the most recent entries.
pub struct InMemoryCoordinationServer {
    leases: Mutex<HashMap<ResourceKey, HeldLease>>,
    sessions: Mutex<HashMap<SessionId, AgentSession>>,
    notifications: Mutex<VecDeque<Notification>>,
    notification_capacity: usize,
    reachable: AtomicBool,
}

impl InMemoryCoordinationServer {
    pub fn new() -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            notifications: Mutex::new(VecDeque::new()),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            reachable: AtomicBool::new(true),
        }
    }

    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity.max(1);
        self
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Current live holder of `key`, if any.
    pub fn holder_of(&self, key: &ResourceKey) -> Option<HolderId> {
        let leases = self.leases.lock();
        leases
            .get(key)
            .filter(|l| l.expires_at > Instant::now())
            .map(|l| l.holder.clone())
    }

    /// Retained notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().iter().cloned().collect()
    }

    pub fn session(&self, session_id: &SessionId) -> Option<AgentSession> {
        self.sessions.lock().get(session_id).cloned()
    }

    /// Overwrite the stored session, bypassing the epoch check.
    pub fn put_session(&self, session: AgentSession) {
        self.sessions.lock().insert(session.session_id.clone(), session);
    }

    fn check_reachable(&self) -> Result<(), TransportError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Transient("connection refused".to_string()))
        }
    }
}

impl Default for InMemoryCoordinationServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationTransport for InMemoryCoordinationServer {
    async fn acquire(&self, key: &ResourceKey, holder: &HolderId, ttl: Duration) -> Result<bool, TransportError> {
        self.check_reachable()?;
        let now = Instant::now();
        let mut leases = self.leases.lock();
        leases.retain(|_, lease| lease.expires_at > now);

        let free = match leases.get(key) {
            None => true,
            Some(current) => current.expires_at <= now || &current.holder == holder,
        };
        if free {
            leases.insert(
                key.clone(),
                HeldLease {
                    holder: holder.clone(),
                    expires_at: now + ttl,
                },
            );
        }
        Ok(free)
    }

    async fn renew(&self, key: &ResourceKey, holder: &HolderId, ttl: Duration) -> Result<bool, TransportError> {
        self.check_reachable()?;
        let now = Instant::now();
        let mut leases = self.leases.lock();

        match leases.get_mut(key) {
            Some(current) if &current.holder == holder && current.expires_at > now => {
                current.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, key: &ResourceKey, holder: &HolderId) -> Result<(), TransportError> {
        self.check_reachable()?;
        let mut leases = self.leases.lock();
        if leases.get(key).is_some_and(|l| &l.holder == holder) {
            leases.remove(key);
        }
        Ok(())
    }

    async fn fetch_session(&self, session_id: &SessionId) -> Result<Option<AgentSession>, TransportError> {
        self.check_reachable()?;
        Ok(self.sessions.lock().get(session_id).cloned())
    }

    async fn store_session(&self, session: &AgentSession, expected_epoch: u64) -> Result<StoreOutcome, TransportError> {
        self.check_reachable()?;
        let mut sessions = self.sessions.lock();
        let current_epoch = sessions.get(&session.session_id).map(|s| s.epoch).unwrap_or(0);

        if current_epoch != expected_epoch {
            return Ok(StoreOutcome::Conflict {
                remote_epoch: current_epoch,
            });
        }
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(StoreOutcome::Stored)
    }

    async fn notify(&self, notification: &Notification) -> Result<(), TransportError> {
        self.check_reachable()?;
        let mut notifications = self.notifications.lock();
        if notifications.len() >= self.notification_capacity {
            notifications.pop_front();
        }
        notifications.push_back(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_can_be_taken_over() {
        let server = InMemoryCoordinationServer::new();
        let key: ResourceKey = "vlan-10".into();
        let a = HolderId::new("a");
        let b = HolderId::new("b");

        assert!(server.acquire(&key, &a, Duration::from_secs(3)).await.unwrap());
        assert!(!server.acquire(&key, &b, Duration::from_secs(3)).await.unwrap());

        tokio::time::advance(Duration::from_secs(4)).await;

        assert!(server.acquire(&key, &b, Duration::from_secs(3)).await.unwrap());
        assert!(!server.renew(&key, &a, Duration::from_secs(3)).await.unwrap());
        assert_eq!(server.holder_of(&key), Some(b));
    }

    #[test]
    fn test_release_by_non_holder_is_ignored() {
        let server = InMemoryCoordinationServer::new();
        let key: ResourceKey = "fw-rules".into();
        let a = HolderId::new("a");

        tokio_test::block_on(server.acquire(&key, &a, Duration::from_secs(30))).unwrap();
        tokio_test::block_on(server.release(&key, &HolderId::new("b"))).unwrap();
        assert_eq!(server.holder_of(&key), Some(a));
    }

    #[tokio::test]
    async fn test_store_session_checks_epoch() {
        let server = InMemoryCoordinationServer::new();
        let first = AgentSession::empty(SessionId::new("s")).next(serde_json::json!({"n": 1}));

        assert_eq!(server.store_session(&first, 0).await.unwrap(), StoreOutcome::Stored);
        assert_eq!(
            server.store_session(&first, 0).await.unwrap(),
            StoreOutcome::Conflict { remote_epoch: 1 }
        );
    }

    #[tokio::test]
    async fn test_notification_log_keeps_most_recent() {
        let server = InMemoryCoordinationServer::new().with_notification_capacity(3);

        for n in 0..5 {
            let notification = Notification::new("action_result", "test", serde_json::json!({ "n": n }));
            server.notify(&notification).await.unwrap();
        }

        let kept: Vec<i64> = server
            .notifications()
            .iter()
            .filter_map(|n| n.data["n"].as_i64())
            .collect();
        assert_eq!(kept, vec![2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_leases_are_dropped_on_acquire() {
        let server = InMemoryCoordinationServer::new();
        let a = HolderId::new("a");
        server.acquire(&ResourceKey::new("vlan-10"), &a, Duration::from_secs(3)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        server.acquire(&ResourceKey::new("vlan-20"), &a, Duration::from_secs(3)).await.unwrap();

        assert_eq!(server.leases.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let server = InMemoryCoordinationServer::new();
        server.set_reachable(false);
        let err = server.fetch_session(&SessionId::default()).await.unwrap_err();
        assert!(matches!(err, TransportError::Transient(_)));
    }
}
