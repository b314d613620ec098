// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::client::CoordinationClient;
use crate::domain::{LockLease, SyncError};

/// A held lease that is renewed in the background every `ttl / 3`.
///
/// Call [`LeaseGuard::release`] when the protected work is finished. Dropping
/// the guard stops renewal; the server then lets the lease lapse after its TTL.
pub struct LeaseGuard {
    client: Arc<CoordinationClient>,
    lease: LockLease,
    lost: CancellationToken,
    cancel: CancellationToken,
    renewer: Option<JoinHandle<()>>,
}

impl LeaseGuard {
    pub(crate) fn start(client: Arc<CoordinationClient>, lease: LockLease) -> Self {
        let lost = CancellationToken::new();
        let cancel = CancellationToken::new();

        let renewer = tokio::spawn(renew_loop(
            Arc::clone(&client),
            lease.clone(),
            lost.clone(),
            cancel.clone(),
        ));

        Self {
            client,
            lease,
            lost,
            cancel,
            renewer: Some(renewer),
        }
    }

    pub fn lease(&self) -> &LockLease {
        &self.lease
    }

    /// True once a renewal was refused or could not reach the server.
    ///
    /// Work guarded by a lost lease is no longer mutually exclusive.
    pub fn is_lost(&self) -> bool {
        self.lost.is_cancelled()
    }

    /// Token cancelled the moment the lease is found to be lost.
    ///
    /// Long-running work holds a clone and stops before its next mutation.
    pub fn lost_signal(&self) -> CancellationToken {
        self.lost.clone()
    }

    /// Stop renewing and give the lease back.
    pub async fn release(mut self) -> Result<(), SyncError> {
        self.stop_renewal().await;
        self.client
            .release_lock(&self.lease.resource_key, &self.lease.holder)
            .await
    }

    async fn stop_renewal(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.renewer.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if self.renewer.is_some() {
            self.cancel.cancel();
            warn!(
                resource_key = %self.lease.resource_key,
                holder = %self.lease.holder,
                "Lease guard dropped without release; lease will lapse after its TTL"
            );
        }
    }
}

async fn renew_loop(
    client: Arc<CoordinationClient>,
    lease: LockLease,
    lost: CancellationToken,
    cancel: CancellationToken,
) {
    let period = lease.renewal_interval();
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                match client.renew_lock(&lease.resource_key, &lease.holder, lease.ttl).await {
                    Ok(true) => {
                        debug!(resource_key = %lease.resource_key, "Lease renewed");
                    }
                    Ok(false) => {
                        error!(resource_key = %lease.resource_key, holder = %lease.holder, "Lease lost to another holder");
                        lost.cancel();
                        break;
                    }
                    Err(e) => {
                        error!(resource_key = %lease.resource_key, error = %e, "Lease renewal failed");
                        lost.cancel();
                        break;
                    }
                }
            }
        }
    }
}
