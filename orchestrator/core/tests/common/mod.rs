// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use booner_core::application::{
    ActionExecutor, AgentRegistry, DispatchSettings, Dispatcher, ExecutorSettings, IntentInterpreter,
    InterpreterSettings, OrchestratorSettings, RegistrySettings, RequestOrchestrator,
};
use booner_core::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage};
use booner_core::infrastructure::event_bus::EventBus;
use booner_cortex::{ContextStore, ContextStoreConfig, HashEmbedder};
use booner_swarm::{
    CoordinationClient, CoordinationSettings, InMemoryCoordinationServer, RetryPolicy, SessionId,
};

/// Answers with the reply of the first route whose keyword appears in the
/// user request; "unknown" otherwise.
pub struct RoutedLlm {
    routes: Vec<(&'static str, String)>,
}

impl RoutedLlm {
    pub fn new(routes: &[(&'static str, serde_json::Value)]) -> Arc<Self> {
        Arc::new(Self {
            routes: routes.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        })
    }
}

#[async_trait]
impl LLMProvider for RoutedLlm {
    async fn generate(&self, prompt: &str, _: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
        let request = prompt
            .lines()
            .rev()
            .find_map(|l| l.strip_prefix("User request: "))
            .unwrap_or_default()
            .to_lowercase();
        let text = self
            .routes
            .iter()
            .find(|(keyword, _)| request.contains(keyword))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| r#"{"action":"unknown","confidence":0.2}"#.to_string());
        Ok(GenerationResponse {
            text,
            model: "routed".into(),
            provider: "test".into(),
            usage: TokenUsage::default(),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

pub struct Pipeline {
    pub orchestrator: Arc<RequestOrchestrator>,
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<AgentRegistry>,
    pub context: Arc<ContextStore>,
    pub server: Arc<InMemoryCoordinationServer>,
    pub events: EventBus,
}

pub fn pipeline(llm: Arc<dyn LLMProvider>) -> Pipeline {
    pipeline_with(llm, DispatchSettings::default())
}

pub fn pipeline_with(llm: Arc<dyn LLMProvider>, dispatch: DispatchSettings) -> Pipeline {
    let events = EventBus::new(256);
    let context = Arc::new(
        ContextStore::new(ContextStoreConfig::default()).with_embedder(Arc::new(HashEmbedder::default())),
    );
    let server = Arc::new(InMemoryCoordinationServer::new());
    let coordination = Arc::new(CoordinationClient::new(
        server.clone(),
        CoordinationSettings {
            retry: RetryPolicy::new(2, Duration::from_millis(10)),
            ..Default::default()
        },
    ));
    let registry = Arc::new(AgentRegistry::new(RegistrySettings::default(), events.clone()));
    let executor = Arc::new(ActionExecutor::new(
        coordination.clone(),
        events.clone(),
        ExecutorSettings {
            retry: RetryPolicy::new(2, Duration::from_millis(10)),
            attempt_timeout: Duration::from_secs(5),
            ..Default::default()
        },
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        executor,
        coordination.clone(),
        events.clone(),
        dispatch,
    ));
    let interpreter = Arc::new(IntentInterpreter::new(llm, context.clone(), InterpreterSettings::default()));
    let orchestrator = Arc::new(RequestOrchestrator::new(
        interpreter,
        dispatcher.clone(),
        context.clone(),
        coordination,
        events.clone(),
        OrchestratorSettings {
            min_confidence: 0.3,
            session_id: SessionId::new("homelab"),
        },
    ));

    Pipeline {
        orchestrator,
        dispatcher,
        registry,
        context,
        server,
        events,
    }
}
