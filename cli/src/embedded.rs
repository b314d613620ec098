// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process node assembly
//!
//! Builds the whole request pipeline from an [`OrchestratorConfigManifest`]:
//! gateway adapter, context store, coordination client, agent registry,
//! dispatcher and orchestrator. Every command runs against one of these.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use booner_core::{
    application::{
        ActionExecutor, AgentRegistry, DispatchSettings, Dispatcher, ExecutorSettings, HealthMonitor,
        IntentInterpreter, InterpreterSettings, OrchestratorSettings, RegistrySettings, RequestOrchestrator,
    },
    domain::{
        config::{resolve_secret, CoordinationMode, OrchestratorConfigManifest, OrchestratorSpec},
        GenerationOptions, LLMProvider,
    },
    infrastructure::{agents::build_agents, event_bus::EventBus, llm::OllamaAdapter},
};
use booner_cortex::{ContextPruner, ContextPrunerConfig, ContextStore, ContextStoreConfig, HashEmbedder};
use booner_swarm::{
    CoordinationClient, CoordinationSettings, CoordinationTransport, HttpCoordinationTransport,
    InMemoryCoordinationServer, RetryPolicy, SessionId,
};

pub struct EmbeddedNode {
    pub config: OrchestratorConfigManifest,
    pub events: EventBus,
    pub context: Arc<ContextStore>,
    pub registry: Arc<AgentRegistry>,
    pub orchestrator: Arc<RequestOrchestrator>,
}

impl EmbeddedNode {
    /// Load, validate and assemble.
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = OrchestratorConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
        config.validate().context("Configuration validation failed")?;
        Self::build(config)
    }

    pub fn build(config: OrchestratorConfigManifest) -> Result<Self> {
        let spec = &config.spec;
        let events = EventBus::with_default_capacity();

        let gateway = Arc::new(
            OllamaAdapter::with_timeout(
                spec.gateway.endpoint.clone(),
                spec.gateway.llm_model.clone(),
                spec.gateway.embed_model.clone(),
                spec.gateway.timeout,
            )
            .context("Failed to initialize gateway adapter")?,
        );
        let llm: Arc<dyn LLMProvider> = gateway.clone();

        let store = ContextStore::new(ContextStoreConfig {
            max_records: spec.context.max_records,
            dimensions: spec.context.dimensions,
        });
        let context = Arc::new(if spec.context.offline_embeddings {
            let embedder = spec.context.dimensions.map(HashEmbedder::new).unwrap_or_default();
            store.with_embedder(Arc::new(embedder))
        } else {
            store.with_embedder(gateway)
        });

        let coordination = Arc::new(CoordinationClient::new(
            coordination_transport(spec)?,
            CoordinationSettings {
                retry: RetryPolicy::new(spec.coordination.retries, spec.coordination.retry_delay),
                request_timeout: spec.coordination.request_timeout,
                source: spec.node.id.clone(),
            },
        ));

        let registry = Arc::new(AgentRegistry::new(
            RegistrySettings {
                tie_break: spec.dispatch.tie_break,
                failure_threshold: spec.dispatch.failure_threshold,
                unhealthy_after: spec.dispatch.unhealthy_after,
            },
            events.clone(),
        ));
        for agent in build_agents(&spec.backends, llm.clone(), context.clone(), spec.interpreter.top_k)? {
            registry
                .register(agent)
                .context("Failed to register agent")?;
        }

        let executor = Arc::new(ActionExecutor::new(
            coordination.clone(),
            events.clone(),
            ExecutorSettings {
                retry: RetryPolicy::new(spec.executor.max_attempts, spec.executor.retry_delay)
                    .with_max_delay(spec.executor.max_retry_delay),
                attempt_timeout: spec.executor.attempt_timeout,
                ledger_retention: spec.executor.ledger_retention,
            },
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            executor,
            coordination.clone(),
            events.clone(),
            DispatchSettings {
                node_id: spec.node.id.clone(),
                lock_ttl: spec.coordination.lock_ttl,
                lock_wait: spec.coordination.lock_wait,
                lock_poll_interval: spec.coordination.lock_poll_interval,
            },
        ));

        let interpreter = Arc::new(IntentInterpreter::new(
            llm,
            context.clone(),
            InterpreterSettings {
                top_k: spec.interpreter.top_k,
                generation: GenerationOptions {
                    max_tokens: Some(spec.gateway.max_tokens),
                    temperature: Some(spec.gateway.temperature),
                    json_mode: true,
                },
                call_timeout: spec.gateway.timeout,
                retry: RetryPolicy::new(spec.gateway.max_retries, spec.gateway.retry_delay),
            },
        ));

        let orchestrator = Arc::new(RequestOrchestrator::new(
            interpreter,
            dispatcher,
            context.clone(),
            coordination,
            events.clone(),
            OrchestratorSettings {
                min_confidence: spec.interpreter.min_confidence,
                session_id: SessionId::new(spec.coordination.session_id.clone()),
            },
        ));

        info!(
            node_id = %spec.node.id,
            agents = registry.capabilities().len(),
            coordination = ?spec.coordination.mode,
            "Node assembled"
        );

        Ok(Self {
            config,
            events,
            context,
            registry,
            orchestrator,
        })
    }

    /// Start context pruning and health probing until `shutdown` fires.
    pub fn start_background(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let spec = &self.config.spec;

        let pruner = Arc::new(
            ContextPruner::new(
                self.context.clone(),
                ContextPrunerConfig {
                    max_records: spec.context.max_records,
                    max_age: spec.context.max_age,
                    interval: spec.context.prune_interval,
                    enabled: true,
                },
            )
            .with_shutdown_token(shutdown.clone()),
        );
        let monitor = Arc::new(
            HealthMonitor::new(self.registry.clone(), spec.dispatch.probe_interval).with_shutdown_token(shutdown),
        );

        vec![pruner.start(), monitor.start()]
    }
}

fn coordination_transport(spec: &OrchestratorSpec) -> Result<Arc<dyn CoordinationTransport>> {
    match spec.coordination.mode {
        CoordinationMode::InMemory => {
            warn!("Using in-memory coordination; locks only exclude within this process");
            Ok(Arc::new(InMemoryCoordinationServer::new()))
        }
        CoordinationMode::Http => {
            let url = spec
                .coordination
                .url
                .as_deref()
                .context("spec.coordination.url is required in http mode")?;
            let api_key = spec
                .coordination
                .api_key
                .as_deref()
                .map(resolve_secret)
                .transpose()
                .context("Failed to resolve coordination API key")?;
            let transport = HttpCoordinationTransport::new(url, api_key).context("Invalid coordination URL")?;
            Ok(Arc::new(transport))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booner_core::domain::config::{DeploymentBackend, OrchestratorConfigManifest};

    #[tokio::test]
    async fn test_default_config_assembles_with_query_agent_only() {
        let node = EmbeddedNode::build(OrchestratorConfigManifest::default()).unwrap();
        let ids: Vec<String> = node
            .registry
            .capabilities()
            .iter()
            .map(|c| c.capability_id.to_string())
            .collect();
        assert_eq!(ids, vec!["query"]);
    }

    #[tokio::test]
    async fn test_deployment_backend_registers_deploy_agents() {
        let mut config = OrchestratorConfigManifest::default();
        config.spec.context.offline_embeddings = true;
        config.spec.backends.deployment = Some(DeploymentBackend {
            url: "http://deploy.lab:8080".into(),
            api_key: None,
            host: Some("alpha".into()),
        });

        let node = EmbeddedNode::build(config).unwrap();
        assert_eq!(node.registry.capabilities().len(), 3);

        // Offline embeddings work without a gateway.
        node.context.remember("open port 25565", None, &["request"]).await.unwrap();
        assert_eq!(node.context.len(), 1);
    }

    #[test]
    fn test_http_mode_rejects_malformed_url() {
        let mut config = OrchestratorConfigManifest::default();
        config.spec.coordination.mode = CoordinationMode::Http;
        config.spec.coordination.url = Some("not a url".into());
        assert!(coordination_transport(&config.spec).is_err());
    }
}
