// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Context Pruner - background eviction for the context store
//!
//! Periodically enforces the record cap and, optionally, a maximum record age.
//! Records of intents still awaiting their terminal result are pinned and
//! survive every cycle.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Keeps the context store bounded between inserts

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ContextStore;

#[derive(Debug, Clone)]
pub struct ContextPrunerConfig {
    pub max_records: usize,

    /// Records older than this are evicted regardless of the cap.
    pub max_age: Option<Duration>,

    pub interval: Duration,

    pub enabled: bool,
}

impl Default for ContextPrunerConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            max_age: None,
            interval: Duration::from_secs(300),
            enabled: true,
        }
    }
}

pub struct ContextPruner {
    store: Arc<ContextStore>,
    config: ContextPrunerConfig,
    shutdown_token: CancellationToken,
}

impl ContextPruner {
    pub fn new(store: Arc<ContextStore>, config: ContextPrunerConfig) -> Self {
        Self {
            store,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Share an existing shutdown token (e.g. the server's).
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("Context pruner is disabled");
            return;
        }

        info!(
            interval_secs = self.config.interval.as_secs(),
            max_records = self.config.max_records,
            "Starting context pruner background task"
        );

        let mut tick = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let pruned = self.prune_cycle();
                    if pruned > 0 {
                        info!(pruned, remaining = self.store.len(), "Context pruner cycle completed");
                    } else {
                        debug!("Context pruner cycle found nothing to evict");
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping context pruner");
                    break;
                }
            }
        }

        info!("Context pruner background task stopped");
    }

    /// One pruning pass. Returns the number of evicted records.
    pub fn prune_cycle(&self) -> usize {
        let mut pruned = 0;

        if let Some(max_age) = self.config.max_age {
            match chrono::Duration::from_std(max_age) {
                Ok(age) => pruned += self.store.prune_older_than(Utc::now() - age),
                Err(e) => warn!("Context pruner max_age out of range: {}", e),
            }
        }

        pruned + self.store.prune(self.config.max_records)
    }
}
