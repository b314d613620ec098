// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatcher::AgentRegistry;

/// Periodically probes every registered agent and ages Degraded capabilities
/// into Unhealthy.
pub struct HealthMonitor {
    registry: Arc<AgentRegistry>,
    interval: Duration,
    probe_timeout: Duration,
    shutdown_token: CancellationToken,
}

impl HealthMonitor {
    pub fn new(registry: Arc<AgentRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            probe_timeout: interval.min(Duration::from_secs(10)),
            shutdown_token: CancellationToken::new(),
        }
    }

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
        info!(interval = ?self.interval, "Health monitor started");
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_cycle().await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Health monitor stopped");
                    return;
                }
            }
        }
    }

    /// Probe every agent once, then age stale capabilities.
    ///
    /// Probes run concurrently; each is bounded by the probe timeout.
    pub async fn probe_cycle(&self) {
        let probes = self.registry.agents().into_iter().map(|(capability_id, agent)| async move {
            let healthy = match tokio::time::timeout(self.probe_timeout, agent.probe()).await {
                Ok(healthy) => healthy,
                Err(_) => {
                    warn!(capability_id = %capability_id, "Health probe timed out");
                    false
                }
            };
            (capability_id, healthy)
        });

        for (capability_id, healthy) in join_all(probes).await {
            debug!(capability_id = %capability_id, healthy, "Health probe");
            self.registry.record_probe(&capability_id, healthy);
        }

        let promoted = self.registry.promote_stale();
        if promoted > 0 {
            warn!(promoted, "Capabilities marked unhealthy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::RegistrySettings;
    use crate::domain::action::{ActionRequest, ExecutionError};
    use crate::domain::agent::{Agent, AgentOutput};
    use crate::domain::capability::{AgentCapability, CapabilityId, HealthStatus, TargetHost};
    use crate::domain::intent::{ActionKind, Intent};
    use crate::infrastructure::event_bus::EventBus;
    use async_trait::async_trait;
    use booner_swarm::ResourceKey;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Probed {
        up: AtomicBool,
    }

    #[async_trait]
    impl Agent for Probed {
        fn capability(&self) -> AgentCapability {
            AgentCapability::new("probed", [ActionKind::AppDeploy], TargetHost::new("alpha"))
        }
        fn resource_key(&self, _: &Intent) -> Option<ResourceKey> {
            None
        }
        fn build_payload(&self, _: &Intent) -> Result<serde_json::Value, ExecutionError> {
            Ok(serde_json::Value::Null)
        }
        async fn execute(&self, _: &ActionRequest) -> Result<AgentOutput, ExecutionError> {
            Ok(AgentOutput::default())
        }
        async fn rollback(&self, _: &ActionRequest, _: &str) -> Result<(), ExecutionError> {
            Ok(())
        }
        async fn probe(&self) -> bool {
            self.up.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probes_degrade_then_unhealthy_then_recover() {
        let registry = Arc::new(AgentRegistry::new(
            RegistrySettings {
                failure_threshold: 2,
                unhealthy_after: Duration::from_secs(60),
                ..Default::default()
            },
            EventBus::new(16),
        ));
        let agent = Arc::new(Probed {
            up: AtomicBool::new(false),
        });
        registry.register(agent.clone()).unwrap();
        let id = CapabilityId::new("probed");
        let monitor = HealthMonitor::new(registry.clone(), Duration::from_secs(30));

        monitor.probe_cycle().await;
        assert_eq!(registry.capability(&id).unwrap().health, HealthStatus::Healthy);
        monitor.probe_cycle().await;
        assert_eq!(registry.capability(&id).unwrap().health, HealthStatus::Degraded);

        tokio::time::advance(Duration::from_secs(61)).await;
        monitor.probe_cycle().await;
        assert_eq!(registry.capability(&id).unwrap().health, HealthStatus::Unhealthy);

        agent.up.store(true, Ordering::SeqCst);
        monitor.probe_cycle().await;
        assert_eq!(registry.capability(&id).unwrap().health, HealthStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_stops_on_cancel() {
        let registry = Arc::new(AgentRegistry::new(RegistrySettings::default(), EventBus::new(16)));
        let monitor = Arc::new(HealthMonitor::new(registry, Duration::from_secs(5)));
        let token = monitor.shutdown_token();

        let handle = monitor.start();
        tokio::time::sleep(Duration::from_secs(12)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
