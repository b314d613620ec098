// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Request Orchestrator
//!
//! One natural-language request end to end: sync session, interpret,
//! dispatch, record the result.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Pipeline composition, clarification handling, cancellation
//!   boundary, and write-back to the context store and shared session
//!
//! Structured callers that already know the action skip interpretation with
//! [`RequestOrchestrator::handle_intent`]; everything after interpretation is
//! shared.
//!
//! Cancellation is honoured up to the moment an intent is handed to the
//! dispatcher. From then on the dispatch runs on its own task and finishes
//! (or times out) even if the caller goes away.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use booner_cortex::ContextStore;
use booner_swarm::{AgentSession, CoordinationClient, SessionId, SyncError};

use crate::domain::action::{ActionResult, DispatchError};
use crate::domain::events::OrchestrationEvent;
use crate::domain::intent::{ActionKind, Intent, InterpretationError};
use crate::infrastructure::event_bus::EventBus;

use super::dispatcher::Dispatcher;
use super::interpreter::IntentInterpreter;

/// Tag on context records that hold action results.
pub const RESULT_TAG: &str = "result";

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub min_confidence: f32,
    pub session_id: SessionId,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            session_id: SessionId::new("booner"),
        }
    }
}

/// What the caller gets back for a request that did not error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequestOutcome {
    /// The intent was dispatched and reached a terminal result, which may be
    /// a fatal failure.
    Completed { intent: Intent, result: ActionResult },
    /// The request could not be mapped to an action; nothing was dispatched.
    ClarificationNeeded { intent: Intent, message: String },
}

impl RequestOutcome {
    pub fn intent(&self) -> &Intent {
        match self {
            RequestOutcome::Completed { intent, .. } | RequestOutcome::ClarificationNeeded { intent, .. } => intent,
        }
    }

    pub fn result(&self) -> Option<&ActionResult> {
        match self {
            RequestOutcome::Completed { result, .. } => Some(result),
            RequestOutcome::ClarificationNeeded { .. } => None,
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self {
            RequestOutcome::ClarificationNeeded { message, .. } => message.clone(),
            RequestOutcome::Completed { intent, result } if result.is_success() => format!(
                "{} succeeded{}",
                intent.resolved_action_kind,
                result
                    .external_reference
                    .as_deref()
                    .map(|r| format!(" ({})", r))
                    .unwrap_or_default()
            ),
            RequestOutcome::Completed { intent, result } => format!(
                "{} failed: {}{}",
                intent.resolved_action_kind,
                result.message().unwrap_or("unknown error"),
                result
                    .rollback
                    .as_ref()
                    .map(|r| format!(" [rollback: {}]", serde_json::to_string(r).unwrap_or_default()))
                    .unwrap_or_default()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("could not determine action: {0}")]
    Interpretation(#[from] InterpretationError),

    #[error("could not execute action: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("session sync failed: {0}")]
    Session(#[from] SyncError),

    #[error("request cancelled before dispatch")]
    Cancelled,

    #[error("dispatch task failed: {0}")]
    Internal(String),
}

pub struct RequestOrchestrator {
    interpreter: Arc<IntentInterpreter>,
    dispatcher: Arc<Dispatcher>,
    context: Arc<ContextStore>,
    coordination: Arc<CoordinationClient>,
    events: EventBus,
    settings: OrchestratorSettings,
}

impl RequestOrchestrator {
    pub fn new(
        interpreter: Arc<IntentInterpreter>,
        dispatcher: Arc<Dispatcher>,
        context: Arc<ContextStore>,
        coordination: Arc<CoordinationClient>,
        events: EventBus,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            interpreter,
            dispatcher,
            context,
            coordination,
            events,
            settings,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn interpreter(&self) -> &Arc<IntentInterpreter> {
        &self.interpreter
    }

    pub fn context(&self) -> &Arc<ContextStore> {
        &self.context
    }

    pub fn coordination(&self) -> &Arc<CoordinationClient> {
        &self.coordination
    }

    pub async fn handle_request(&self, raw_text: &str) -> Result<RequestOutcome, OrchestratorError> {
        self.handle_request_with_cancel(raw_text, CancellationToken::new()).await
    }

    pub async fn handle_request_with_cancel(
        &self,
        raw_text: &str,
        cancel: CancellationToken,
    ) -> Result<RequestOutcome, OrchestratorError> {
        let outcome = self.run(raw_text, &cancel).await;
        metrics::counter!("booner_requests_total", "outcome" => outcome_label(&outcome)).increment(1);
        outcome
    }

    /// Run an intent built by the caller, skipping interpretation.
    ///
    /// Dispatch, locking, execution and write-back are the same as for a
    /// natural-language request.
    pub async fn handle_intent(&self, intent: Intent) -> Result<RequestOutcome, OrchestratorError> {
        let outcome = match self.sync_session().await {
            Ok(session) => self.resolve(intent, session, &CancellationToken::new()).await,
            Err(e) => Err(e),
        };
        metrics::counter!("booner_requests_total", "outcome" => outcome_label(&outcome)).increment(1);
        outcome
    }

    async fn run(&self, raw_text: &str, cancel: &CancellationToken) -> Result<RequestOutcome, OrchestratorError> {
        let session = self.sync_session().await?;

        let intent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            intent = self.interpreter.interpret(raw_text, session.as_ref()) => intent?,
        };

        self.events.publish(OrchestrationEvent::IntentInterpreted {
            intent_id: intent.id,
            action_kind: intent.resolved_action_kind,
            confidence: intent.confidence,
            interpreted_at: Utc::now(),
        });

        self.resolve(intent, session, cancel).await
    }

    /// Clarify or dispatch `intent`, then record its result.
    async fn resolve(
        &self,
        intent: Intent,
        session: Option<AgentSession>,
        cancel: &CancellationToken,
    ) -> Result<RequestOutcome, OrchestratorError> {
        if !intent.is_actionable(self.settings.min_confidence) {
            let message = clarification_message(&intent, self.settings.min_confidence);
            info!(intent_id = %intent.id, "Asking for clarification");
            self.events.publish(OrchestrationEvent::ClarificationRequested {
                intent_id: intent.id,
                raw_text: intent.raw_text.clone(),
                reason: message.clone(),
                requested_at: Utc::now(),
            });
            return Ok(RequestOutcome::ClarificationNeeded { intent, message });
        }

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        // Past this point the dispatch owns the intent.
        self.context.pin_intent(intent.id.0);
        let dispatch = {
            let dispatcher = Arc::clone(&self.dispatcher);
            let context = Arc::clone(&self.context);
            let intent = intent.clone();
            tokio::spawn(async move {
                let outcome = dispatcher.dispatch(&intent).await;
                context.unpin_intent(intent.id.0);
                outcome
            })
        };

        let result = dispatch
            .await
            .map_err(|e| OrchestratorError::Internal(e.to_string()))??;

        self.remember_result(&intent, &result).await;
        self.commit_session(session, &intent, &result).await;

        Ok(RequestOutcome::Completed { intent, result })
    }

    /// Latest shared session. Falls back to the cached copy when the server
    /// is unreachable; an epoch conflict is surfaced.
    async fn sync_session(&self) -> Result<Option<AgentSession>, OrchestratorError> {
        match self.coordination.sync_session(&self.settings.session_id).await {
            Ok(session) => Ok(Some(session)),
            Err(e @ SyncError::Unreachable { .. }) => {
                warn!(error = %e, "Coordination unreachable; using cached session");
                Ok(self.coordination.cached_session(&self.settings.session_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remember_result(&self, intent: &Intent, result: &ActionResult) {
        let text = format!(
            "{} -> {} {}{}",
            intent.raw_text,
            intent.resolved_action_kind,
            result.outcome,
            result
                .external_reference
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );
        if let Err(e) = self.context.remember(&text, Some(intent.id.0), &[RESULT_TAG]).await {
            warn!(intent_id = %intent.id, error = %e, "Failed to record result in context store");
        }
    }

    async fn commit_session(&self, session: Option<AgentSession>, intent: &Intent, result: &ActionResult) {
        let mut state = match session.map(|s| s.state) {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        state.insert(
            "last_action".to_string(),
            json!({
                "intent_id": intent.id,
                "action_kind": intent.resolved_action_kind,
                "outcome": result.outcome,
                "external_reference": result.external_reference,
                "completed_at": result.completed_at,
            }),
        );

        if let Err(e) = self
            .coordination
            .commit_session(&self.settings.session_id, serde_json::Value::Object(state))
            .await
        {
            warn!(intent_id = %intent.id, error = %e, "Failed to commit session state");
        }
    }
}

fn outcome_label(outcome: &Result<RequestOutcome, OrchestratorError>) -> &'static str {
    match outcome {
        Ok(RequestOutcome::Completed { result, .. }) => result.outcome.as_str(),
        Ok(RequestOutcome::ClarificationNeeded { .. }) => "clarification",
        Err(OrchestratorError::Interpretation(_)) => "interpretation_error",
        Err(OrchestratorError::Dispatch(DispatchError::NoCapableAgent { .. })) => "no_capable_agent",
        Err(OrchestratorError::Dispatch(DispatchError::ResourceBusy { .. })) => "resource_busy",
        Err(OrchestratorError::Cancelled) => "cancelled",
        Err(_) => "error",
    }
}

fn clarification_message(intent: &Intent, min_confidence: f32) -> String {
    if intent.resolved_action_kind == ActionKind::Unknown {
        format!(
            "Could not determine an action for \"{}\". Please rephrase, e.g. \"deploy a minecraft server on host alpha\".",
            intent.raw_text
        )
    } else {
        format!(
            "Not confident enough ({:.2} < {:.2}) that \"{}\" means {}. Please clarify.",
            intent.confidence, min_confidence, intent.raw_text, intent.resolved_action_kind
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::{AgentRegistry, DispatchSettings, RegistrySettings};
    use crate::application::executor::{ActionExecutor, ExecutorSettings};
    use crate::application::interpreter::InterpreterSettings;
    use crate::domain::action::{ActionRequest, ExecutionError};
    use crate::domain::agent::{Agent, AgentOutput};
    use crate::domain::capability::{AgentCapability, TargetHost};
    use crate::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage};
    use async_trait::async_trait;
    use booner_cortex::{ContextStoreConfig, HashEmbedder};
    use booner_swarm::{CoordinationSettings, InMemoryCoordinationServer, ResourceKey, RetryPolicy};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedLlm(&'static str);

    #[async_trait]
    impl LLMProvider for FixedLlm {
        async fn generate(&self, _: &str, _: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
            Ok(GenerationResponse {
                text: self.0.to_string(),
                model: "fixed".into(),
                provider: "test".into(),
                usage: TokenUsage::default(),
            })
        }
        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    struct CountingAgent {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Agent for CountingAgent {
        fn capability(&self) -> AgentCapability {
            AgentCapability::new("counting", ActionKind::ACTIONABLE, TargetHost::new("alpha"))
        }
        fn resource_key(&self, _: &Intent) -> Option<ResourceKey> {
            None
        }
        fn build_payload(&self, _: &Intent) -> Result<serde_json::Value, ExecutionError> {
            Ok(serde_json::Value::Null)
        }
        async fn execute(&self, _: &ActionRequest) -> Result<AgentOutput, ExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AgentOutput::default().with_reference("ref-1"))
        }
        async fn rollback(&self, _: &ActionRequest, _: &str) -> Result<(), ExecutionError> {
            Ok(())
        }
    }

    struct Fixture {
        orchestrator: RequestOrchestrator,
        agent: Arc<CountingAgent>,
        context: Arc<ContextStore>,
        server: Arc<InMemoryCoordinationServer>,
    }

    fn fixture(reply: &'static str) -> Fixture {
        let events = EventBus::new(64);
        let context = Arc::new(
            ContextStore::new(ContextStoreConfig::default()).with_embedder(Arc::new(HashEmbedder::default())),
        );
        let server = Arc::new(InMemoryCoordinationServer::new());
        let coordination = Arc::new(CoordinationClient::new(
            server.clone(),
            CoordinationSettings {
                retry: RetryPolicy::new(2, Duration::from_millis(5)),
                ..Default::default()
            },
        ));
        let interpreter = Arc::new(IntentInterpreter::new(
            Arc::new(FixedLlm(reply)),
            context.clone(),
            InterpreterSettings::default(),
        ));
        let executor = Arc::new(ActionExecutor::new(
            coordination.clone(),
            events.clone(),
            ExecutorSettings::default(),
        ));
        let registry = Arc::new(AgentRegistry::new(RegistrySettings::default(), events.clone()));
        let agent = Arc::new(CountingAgent {
            calls: AtomicUsize::new(0),
        });
        registry.register(agent.clone()).unwrap();
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            executor,
            coordination.clone(),
            events.clone(),
            DispatchSettings::default(),
        ));

        Fixture {
            orchestrator: RequestOrchestrator::new(
                interpreter,
                dispatcher,
                context.clone(),
                coordination,
                events,
                OrchestratorSettings {
                    min_confidence: 0.3,
                    session_id: SessionId::new("lab"),
                },
            ),
            agent,
            context,
            server,
        }
    }

    #[tokio::test]
    async fn test_unknown_intent_asks_for_clarification_without_dispatch() {
        let f = fixture(r#"{"action":"make_coffee","confidence":0.9}"#);
        let mut events = f.orchestrator.events().subscribe();

        let outcome = f.orchestrator.handle_request("make me a coffee").await.unwrap();

        assert!(matches!(outcome, RequestOutcome::ClarificationNeeded { .. }));
        assert!(outcome.summary().starts_with("Could not determine an action"));
        assert_eq!(f.agent.calls.load(Ordering::SeqCst), 0);

        assert!(matches!(events.recv().await.unwrap(), OrchestrationEvent::IntentInterpreted { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            OrchestrationEvent::ClarificationRequested { .. }
        ));
    }

    #[tokio::test]
    async fn test_low_confidence_asks_for_clarification() {
        let f = fixture(r#"{"action":"query","confidence":0.1}"#);

        let outcome = f.orchestrator.handle_request("hmm vlans?").await.unwrap();

        assert!(matches!(outcome, RequestOutcome::ClarificationNeeded { .. }));
        assert_eq!(f.agent.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_completed_request_updates_context_and_session() {
        let f = fixture(r#"{"action":"app_deploy","parameters":{"host":"alpha"},"confidence":0.9}"#);

        let outcome = f.orchestrator.handle_request("deploy nginx on alpha").await.unwrap();

        let result = outcome.result().unwrap();
        assert!(result.is_success());
        assert_eq!(result.external_reference.as_deref(), Some("ref-1"));
        assert_eq!(outcome.summary(), "app_deploy succeeded (ref-1)");

        let intent_id = outcome.intent().id.0;
        assert!(!f.context.is_pinned(&intent_id));
        let tagged: Vec<_> = f
            .context
            .snapshot()
            .iter()
            .filter(|r| r.associated_intent_id == Some(intent_id))
            .map(|r| r.tags.clone())
            .collect();
        assert_eq!(tagged.len(), 2);

        let session = f.server.session(&SessionId::new("lab")).unwrap();
        assert_eq!(session.epoch, 1);
        assert_eq!(session.state["last_action"]["external_reference"], "ref-1");
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch_has_no_side_effects() {
        let f = fixture(r#"{"action":"app_deploy","confidence":0.9}"#);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = f
            .orchestrator
            .handle_request_with_cancel("deploy nginx", cancel)
            .await
            .unwrap_err();

        assert_eq!(err, OrchestratorError::Cancelled);
        assert_eq!(f.agent.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_coordination_uses_cached_session() {
        let f = fixture(r#"{"action":"query","confidence":0.9}"#);
        f.server.set_reachable(false);

        let outcome = f.orchestrator.handle_request("list vlans").await.unwrap();
        assert!(outcome.result().unwrap().is_success());
    }

    #[tokio::test]
    async fn test_epoch_conflict_is_surfaced() {
        let f = fixture(r#"{"action":"query","confidence":0.9}"#);
        let lab = SessionId::new("lab");

        // Local cache gets ahead of the server.
        f.orchestrator.handle_request("list vlans").await.unwrap();
        f.server.put_session(AgentSession::empty(lab.clone()));

        let err = f.orchestrator.handle_request("list vlans").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Session(SyncError::EpochConflict { .. })));
    }
}
