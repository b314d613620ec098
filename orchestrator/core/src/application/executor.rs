// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Action Executor
//!
//! Performs the side-effecting call for a matched agent with retry and
//! rollback policy.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Outcome classification, bounded retries, compensating
//!   rollback, and the per-intent ledger that makes execution idempotent
//!
//! Each intent gets one ledger entry. Attempts for the same intent are
//! serialized on the entry's mutex, and once a terminal result is recorded it
//! is returned as-is to anyone who asks again: a re-submission never creates a
//! second external resource. Entries are swept once they have been idle for
//! the ledger retention.
//!
//! Every attempt result and every terminal result is published to the
//! coordination server.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use booner_swarm::{CoordinationClient, RetryPolicy};

use crate::domain::action::{ActionOutcome, ActionRequest, ActionResult, RollbackStatus};
use crate::domain::agent::Agent;
use crate::domain::events::OrchestrationEvent;
use crate::domain::intent::IntentId;
use crate::infrastructure::event_bus::EventBus;

/// Notification type used when publishing results to the coordination server.
pub const ACTION_RESULT_EVENT: &str = "action_result";

/// Minimum spacing between ledger sweeps triggered by new work.
const LEDGER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Attempts per intent, including the first.
    pub retry: RetryPolicy,
    /// Bound on a single agent call, rollback included.
    pub attempt_timeout: Duration,
    /// How long an idle ledger entry is kept. Re-submitting an intent after
    /// this window executes it again.
    pub ledger_retention: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(3, Duration::from_millis(500)).with_max_delay(Duration::from_secs(10)),
            attempt_timeout: Duration::from_secs(60),
            ledger_retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Outcome of [`ActionExecutor::execute_guarded`].
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub result: ActionResult,
    /// True when the result was recorded by an earlier run and nothing was
    /// attempted this time.
    pub replayed: bool,
}

#[derive(Debug)]
struct LedgerEntry {
    attempts: u32,
    /// Latest known external resource touched for this intent.
    external_reference: Option<String>,
    terminal: Option<ActionResult>,
    touched_at: Instant,
}

impl LedgerEntry {
    fn new() -> Self {
        Self {
            attempts: 0,
            external_reference: None,
            terminal: None,
            touched_at: Instant::now(),
        }
    }
}

type Ledger = DashMap<IntentId, Arc<tokio::sync::Mutex<LedgerEntry>>>;

pub struct ActionExecutor {
    coordination: Arc<CoordinationClient>,
    events: EventBus,
    ledger: Ledger,
    last_sweep: parking_lot::Mutex<Instant>,
    settings: ExecutorSettings,
}

impl ActionExecutor {
    pub fn new(coordination: Arc<CoordinationClient>, events: EventBus, settings: ExecutorSettings) -> Self {
        Self {
            coordination,
            events,
            ledger: DashMap::new(),
            last_sweep: parking_lot::Mutex::new(Instant::now()),
            settings,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Number of intents currently tracked in the ledger.
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    /// Terminal result already recorded for `intent_id`, if any.
    pub async fn terminal_result(&self, intent_id: &IntentId) -> Option<ActionResult> {
        let entry = self.ledger.get(intent_id).map(|e| Arc::clone(e.value()))?;
        let entry = entry.lock().await;
        entry.terminal.clone()
    }

    /// Drop ledger entries idle for longer than the retention.
    ///
    /// Entries in use by a running execution are kept. Returns how many were
    /// removed.
    pub fn sweep_ledger(&self) -> usize {
        let retention = self.settings.ledger_retention;
        let now = Instant::now();
        let mut removed = 0;

        self.ledger.retain(|_, entry| match entry.try_lock() {
            Ok(entry) if now.duration_since(entry.touched_at) >= retention => {
                removed += 1;
                false
            }
            _ => true,
        });
        *self.last_sweep.lock() = now;

        if removed > 0 {
            debug!(removed, remaining = self.ledger.len(), "Swept idle ledger entries");
        }
        removed
    }

    fn sweep_if_due(&self) {
        let due = self.last_sweep.lock().elapsed() >= LEDGER_SWEEP_INTERVAL;
        if due {
            self.sweep_ledger();
        }
    }

    fn entry(&self, intent_id: IntentId) -> Arc<tokio::sync::Mutex<LedgerEntry>> {
        self.sweep_if_due();
        let entry = self
            .ledger
            .entry(intent_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(LedgerEntry::new())));
        Arc::clone(entry.value())
    }

    /// Run `request` against `agent` until it succeeds or fails terminally.
    ///
    /// Always returns a terminal result (`Success` or `FatalFailure`).
    pub async fn execute(&self, agent: &dyn Agent, request: &ActionRequest) -> ActionResult {
        self.execute_guarded(agent, request, &CancellationToken::new()).await.result
    }

    /// Like [`execute`](Self::execute), but stops retrying once `lease_lost`
    /// is cancelled.
    ///
    /// A lost lease means another holder may already own the resource, so no
    /// further attempt is made. The intent ends as `FatalFailure` and the
    /// usual rollback runs for whatever the earlier attempts touched.
    pub async fn execute_guarded(
        &self,
        agent: &dyn Agent,
        request: &ActionRequest,
        lease_lost: &CancellationToken,
    ) -> Execution {
        let entry = self.entry(request.intent_id);
        let mut entry = entry.lock().await;

        if let Some(terminal) = &entry.terminal {
            info!(
                intent_id = %request.intent_id,
                outcome = %terminal.outcome,
                "Intent already resolved, returning recorded result"
            );
            return Execution {
                result: terminal.clone(),
                replayed: true,
            };
        }

        let max_attempts = self.settings.retry.attempts();
        let mut attempts_this_run = 0;

        let (last_request, fatal) = loop {
            attempts_this_run += 1;
            entry.attempts += 1;
            entry.touched_at = Instant::now();
            let attempt = request.for_attempt(entry.attempts, entry.external_reference.clone());

            let result = self.attempt(agent, &attempt).await;
            if let Some(reference) = &result.external_reference {
                entry.external_reference = Some(reference.clone());
            }
            self.report_attempt(&result).await;

            match result.outcome {
                ActionOutcome::Success => {
                    entry.terminal = Some(result.clone());
                    entry.touched_at = Instant::now();
                    self.report_completed(&result);
                    return Execution {
                        result,
                        replayed: false,
                    };
                }
                ActionOutcome::RetryableFailure if attempts_this_run < max_attempts => {
                    let delay = self.settings.retry.delay_after(attempts_this_run);
                    debug!(intent_id = %request.intent_id, ?delay, "Retrying action");
                    let lost = tokio::select! {
                        _ = tokio::time::sleep(delay) => lease_lost.is_cancelled(),
                        _ = lease_lost.cancelled() => true,
                    };
                    if lost {
                        warn!(intent_id = %request.intent_id, "Resource lock lost; abandoning retries");
                        let message = format!(
                            "resource lock lost after attempt {}: {}",
                            entry.attempts,
                            result.message().unwrap_or("retryable failure")
                        );
                        let fatal = ActionResult::fatal(&attempt, result.external_reference.clone(), message);
                        break (attempt, fatal);
                    }
                }
                ActionOutcome::RetryableFailure => {
                    let message = format!(
                        "retry cap of {} attempts exceeded: {}",
                        max_attempts,
                        result.message().unwrap_or("retryable failure")
                    );
                    let fatal = ActionResult::fatal(&attempt, result.external_reference.clone(), message);
                    break (attempt, fatal);
                }
                ActionOutcome::FatalFailure => break (attempt, result),
            }
        };

        let rollback = self.rollback(agent, &last_request, entry.external_reference.as_deref()).await;
        let result = ActionResult {
            external_reference: entry.external_reference.clone(),
            completed_at: Utc::now(),
            ..fatal
        }
        .with_rollback(rollback);

        entry.terminal = Some(result.clone());
        entry.touched_at = Instant::now();
        self.publish_result(&result).await;
        self.report_completed(&result);
        Execution {
            result,
            replayed: false,
        }
    }

    async fn attempt(&self, agent: &dyn Agent, request: &ActionRequest) -> ActionResult {
        let timeout = self.settings.attempt_timeout;
        match tokio::time::timeout(timeout, agent.execute(request)).await {
            Ok(Ok(output)) => {
                let reference = output.external_reference.or_else(|| request.prior_reference.clone());
                ActionResult::success(request, reference, output.data)
            }
            Ok(Err(err)) => {
                let reference = err
                    .external_reference()
                    .map(str::to_string)
                    .or_else(|| request.prior_reference.clone());
                if err.is_retryable() {
                    ActionResult::retryable(request, reference, err.message())
                } else {
                    ActionResult::fatal(request, reference, err.message())
                }
            }
            Err(_) => ActionResult::retryable(
                request,
                request.prior_reference.clone(),
                format!("attempt timed out after {:?}", timeout),
            ),
        }
    }

    /// Best-effort compensation. Never changes the fatal outcome.
    async fn rollback(&self, agent: &dyn Agent, request: &ActionRequest, reference: Option<&str>) -> RollbackStatus {
        let Some(reference) = reference else {
            return RollbackStatus::NotNeeded;
        };

        warn!(intent_id = %request.intent_id, external_reference = reference, "Rolling back partial mutation");
        let status = match tokio::time::timeout(self.settings.attempt_timeout, agent.rollback(request, reference)).await {
            Ok(Ok(())) => RollbackStatus::Succeeded,
            Ok(Err(e)) => RollbackStatus::Failed(e.message().to_string()),
            Err(_) => RollbackStatus::Failed(format!("rollback timed out after {:?}", self.settings.attempt_timeout)),
        };

        match &status {
            RollbackStatus::Failed(message) => {
                error!(intent_id = %request.intent_id, external_reference = reference, error = %message, "Rollback failed");
                metrics::counter!("booner_rollbacks_total", "outcome" => "failed").increment(1);
            }
            _ => {
                info!(intent_id = %request.intent_id, external_reference = reference, "Rollback succeeded");
                metrics::counter!("booner_rollbacks_total", "outcome" => "succeeded").increment(1);
            }
        }
        status
    }

    async fn report_attempt(&self, result: &ActionResult) {
        metrics::counter!("booner_action_attempts_total", "outcome" => result.outcome.as_str()).increment(1);
        debug!(
            intent_id = %result.intent_id,
            attempt = result.attempt_count,
            outcome = %result.outcome,
            "Action attempt finished"
        );

        self.events.publish(OrchestrationEvent::ActionAttempted {
            intent_id: result.intent_id,
            capability_id: result.capability_id.clone(),
            attempt: result.attempt_count,
            outcome: result.outcome,
            attempted_at: result.completed_at,
        });

        self.publish_result(result).await;
    }

    async fn publish_result(&self, result: &ActionResult) {
        let data = match serde_json::to_value(result) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Failed to serialize action result");
                return;
            }
        };
        if let Err(e) = self.coordination.publish(ACTION_RESULT_EVENT, data).await {
            warn!(intent_id = %result.intent_id, error = %e, "Failed to publish action result");
        }
    }

    fn report_completed(&self, result: &ActionResult) {
        match result.outcome {
            ActionOutcome::Success => info!(
                intent_id = %result.intent_id,
                capability_id = %result.capability_id,
                external_reference = ?result.external_reference,
                attempts = result.attempt_count,
                "Action succeeded"
            ),
            _ => error!(
                intent_id = %result.intent_id,
                capability_id = %result.capability_id,
                error = ?result.message(),
                rollback = ?result.rollback,
                "Action failed"
            ),
        }

        self.events.publish(OrchestrationEvent::ActionCompleted {
            intent_id: result.intent_id,
            capability_id: result.capability_id.clone(),
            outcome: result.outcome,
            external_reference: result.external_reference.clone(),
            rollback: result.rollback.clone(),
            completed_at: result.completed_at,
        });
    }

    /// Record a terminal failure for a request that could not be attempted.
    ///
    /// The rejection is published once, already carrying its rollback status.
    pub async fn reject(&self, request: &ActionRequest, message: impl Into<String>) -> ActionResult {
        let entry = self.entry(request.intent_id);
        let mut entry = entry.lock().await;
        if let Some(terminal) = &entry.terminal {
            return terminal.clone();
        }

        let result = ActionResult::fatal(request, None, message).with_rollback(RollbackStatus::NotNeeded);
        entry.terminal = Some(result.clone());
        entry.touched_at = Instant::now();
        self.report_attempt(&result).await;
        self.report_completed(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::ExecutionError;
    use crate::domain::agent::AgentOutput;
    use crate::domain::capability::{AgentCapability, CapabilityId, TargetHost};
    use crate::domain::intent::{ActionKind, Intent};
    use async_trait::async_trait;
    use booner_swarm::{CoordinationSettings, InMemoryCoordinationServer, ResourceKey};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedAgent {
        replies: Mutex<VecDeque<Result<AgentOutput, ExecutionError>>>,
        rollback_reply: Result<(), ExecutionError>,
        seen: Mutex<Vec<ActionRequest>>,
        rollbacks: Mutex<Vec<String>>,
    }

    impl ScriptedAgent {
        fn new(replies: Vec<Result<AgentOutput, ExecutionError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                rollback_reply: Ok(()),
                seen: Mutex::new(Vec::new()),
                rollbacks: Mutex::new(Vec::new()),
            }
        }

        fn failing_rollback(mut self) -> Self {
            self.rollback_reply = Err(ExecutionError::RollbackFailure {
                external_reference: "x".into(),
                message: "backend refused delete".into(),
            });
            self
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn capability(&self) -> AgentCapability {
            AgentCapability::new("scripted", [ActionKind::GameServerDeploy], TargetHost::new("alpha"))
        }

        fn resource_key(&self, _: &Intent) -> Option<ResourceKey> {
            None
        }

        fn build_payload(&self, _: &Intent) -> Result<serde_json::Value, ExecutionError> {
            Ok(serde_json::Value::Null)
        }

        async fn execute(&self, request: &ActionRequest) -> Result<AgentOutput, ExecutionError> {
            self.seen.lock().push(request.clone());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ExecutionError::fatal("script exhausted")))
        }

        async fn rollback(&self, _: &ActionRequest, external_reference: &str) -> Result<(), ExecutionError> {
            self.rollbacks.lock().push(external_reference.to_string());
            self.rollback_reply.clone()
        }
    }

    fn executor() -> (ActionExecutor, Arc<InMemoryCoordinationServer>) {
        let server = Arc::new(InMemoryCoordinationServer::new());
        let client = Arc::new(CoordinationClient::new(server.clone(), CoordinationSettings::default()));
        let settings = ExecutorSettings {
            retry: RetryPolicy::new(3, Duration::from_millis(10)),
            attempt_timeout: Duration::from_secs(5),
            ledger_retention: Duration::from_secs(3600),
        };
        (ActionExecutor::new(client, EventBus::new(64), settings), server)
    }

    fn request() -> ActionRequest {
        ActionRequest::new(
            IntentId::new(),
            ActionKind::GameServerDeploy,
            CapabilityId::new("scripted"),
            None,
            serde_json::json!({}),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_then_success() {
        let (executor, server) = executor();
        let agent = ScriptedAgent::new(vec![
            Err(ExecutionError::retryable("HTTP 503")),
            Ok(AgentOutput::new(serde_json::json!({"ok": true})).with_reference("mc-instance-7")),
        ]);

        let result = executor.execute(&agent, &request()).await;

        assert_eq!(result.outcome, ActionOutcome::Success);
        assert_eq!(result.attempt_count, 2);
        assert_eq!(result.external_reference.as_deref(), Some("mc-instance-7"));
        assert_eq!(server.notifications().len(), 2);
        assert!(server.notifications().iter().all(|n| n.event_type == ACTION_RESULT_EVENT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cap_becomes_fatal() {
        let (executor, _) = executor();
        let agent = ScriptedAgent::new(vec![
            Err(ExecutionError::retryable("HTTP 502")),
            Err(ExecutionError::retryable("HTTP 502")),
            Err(ExecutionError::retryable("HTTP 502")),
        ]);

        let result = executor.execute(&agent, &request()).await;

        assert_eq!(result.outcome, ActionOutcome::FatalFailure);
        assert_eq!(result.attempt_count, 3);
        assert!(result.message().unwrap().contains("retry cap"));
        assert_eq!(result.rollback, Some(RollbackStatus::NotNeeded));
        assert_eq!(agent.seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let (executor, _) = executor();
        let agent = ScriptedAgent::new(vec![Err(ExecutionError::fatal("invalid credentials"))]);

        let result = executor.execute(&agent, &request()).await;

        assert_eq!(result.outcome, ActionOutcome::FatalFailure);
        assert_eq!(result.message(), Some("invalid credentials"));
        assert_eq!(agent.seen.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prior_reference_is_passed_to_retries() {
        let (executor, _) = executor();
        let agent = ScriptedAgent::new(vec![
            Err(ExecutionError::retryable("firewall timeout").with_reference("mc-instance-7")),
            Ok(AgentOutput::new(serde_json::Value::Null)),
        ]);

        let result = executor.execute(&agent, &request()).await;

        let seen = agent.seen.lock();
        assert_eq!(seen[0].prior_reference, None);
        assert_eq!(seen[1].prior_reference.as_deref(), Some("mc-instance-7"));
        assert_eq!(result.external_reference.as_deref(), Some("mc-instance-7"));
    }

    #[tokio::test]
    async fn test_failed_rollback_keeps_original_failure() {
        let (executor, _) = executor();
        let agent = ScriptedAgent::new(vec![Err(
            ExecutionError::fatal("firewall rejected rule").with_reference("mc-instance-7"),
        )])
        .failing_rollback();

        let result = executor.execute(&agent, &request()).await;

        assert_eq!(result.outcome, ActionOutcome::FatalFailure);
        assert_eq!(result.message(), Some("firewall rejected rule"));
        assert_eq!(
            result.rollback,
            Some(RollbackStatus::Failed("backend refused delete".to_string()))
        );
        assert_eq!(*agent.rollbacks.lock(), vec!["mc-instance-7".to_string()]);
    }

    #[tokio::test]
    async fn test_resubmission_returns_recorded_result() {
        let (executor, _) = executor();
        let agent = ScriptedAgent::new(vec![
            Err(ExecutionError::fatal("firewall rejected rule").with_reference("mc-instance-7")),
            Ok(AgentOutput::new(serde_json::Value::Null).with_reference("mc-instance-8")),
        ])
        .failing_rollback();
        let request = request();

        let first = executor.execute(&agent, &request).await;
        let second = executor.execute(&agent, &request).await;

        assert_eq!(first, second);
        assert_eq!(agent.seen.lock().len(), 1);
        assert_eq!(executor.terminal_result(&request.intent_id).await, Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_times_out_as_retryable() {
        struct Hanging;

        #[async_trait]
        impl Agent for Hanging {
            fn capability(&self) -> AgentCapability {
                AgentCapability::new("hanging", [ActionKind::AppDeploy], TargetHost::new("alpha"))
            }
            fn resource_key(&self, _: &Intent) -> Option<ResourceKey> {
                None
            }
            fn build_payload(&self, _: &Intent) -> Result<serde_json::Value, ExecutionError> {
                Ok(serde_json::Value::Null)
            }
            async fn execute(&self, _: &ActionRequest) -> Result<AgentOutput, ExecutionError> {
                std::future::pending().await
            }
            async fn rollback(&self, _: &ActionRequest, _: &str) -> Result<(), ExecutionError> {
                Ok(())
            }
        }

        let (executor, _) = executor();
        let result = executor.execute(&Hanging, &request()).await;

        assert_eq!(result.outcome, ActionOutcome::FatalFailure);
        assert!(result.message().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_is_published_with_rollback_status() {
        let (executor, server) = executor();
        let agent = ScriptedAgent::new(vec![
            Err(ExecutionError::retryable("HTTP 503").with_reference("app-1")),
            Err(ExecutionError::retryable("HTTP 503").with_reference("app-1")),
            Err(ExecutionError::retryable("HTTP 503").with_reference("app-1")),
        ])
        .failing_rollback();

        let result = executor.execute(&agent, &request()).await;

        let published: Vec<ActionResult> = server
            .notifications()
            .into_iter()
            .map(|n| serde_json::from_value(n.data).unwrap())
            .collect();
        assert_eq!(published.len(), 4);
        assert!(published[..3].iter().all(|r| r.outcome == ActionOutcome::RetryableFailure));

        let terminal = published.last().unwrap();
        assert_eq!(terminal.intent_id, result.intent_id);
        assert_eq!(terminal.outcome, ActionOutcome::FatalFailure);
        assert_eq!(
            terminal.rollback,
            Some(RollbackStatus::Failed("backend refused delete".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_lease_stops_retries_and_rolls_back() {
        let (executor, _) = executor();
        let agent = ScriptedAgent::new(vec![
            Err(ExecutionError::retryable("HTTP 503").with_reference("vlan-10")),
            Ok(AgentOutput::new(serde_json::Value::Null)),
        ]);
        let lease_lost = CancellationToken::new();
        lease_lost.cancel();

        let execution = executor.execute_guarded(&agent, &request(), &lease_lost).await;

        assert!(!execution.replayed);
        assert_eq!(execution.result.outcome, ActionOutcome::FatalFailure);
        assert!(execution.result.message().unwrap().contains("resource lock lost"));
        assert_eq!(execution.result.rollback, Some(RollbackStatus::Succeeded));
        assert_eq!(agent.seen.lock().len(), 1);
        assert_eq!(*agent.rollbacks.lock(), vec!["vlan-10".to_string()]);
    }

    #[tokio::test]
    async fn test_recorded_result_is_flagged_as_replay() {
        let (executor, _) = executor();
        let agent = ScriptedAgent::new(vec![Err(ExecutionError::fatal("invalid credentials"))]);
        let request = request();
        let token = CancellationToken::new();

        let first = executor.execute_guarded(&agent, &request, &token).await;
        let second = executor.execute_guarded(&agent, &request, &token).await;

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.result, second.result);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_ledger_entries_are_swept() {
        let (executor, _) = executor();
        let agent = ScriptedAgent::new(vec![Ok(AgentOutput::new(serde_json::Value::Null))]);
        let request = request();

        executor.execute(&agent, &request).await;
        assert_eq!(executor.ledger_len(), 1);

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert_eq!(executor.sweep_ledger(), 0);

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert_eq!(executor.sweep_ledger(), 1);
        assert_eq!(executor.ledger_len(), 0);
        assert_eq!(executor.terminal_result(&request.intent_id).await, None);
    }

    #[tokio::test]
    async fn test_reject_records_terminal_failure() {
        let (executor, server) = executor();
        let request = request();

        let result = executor.reject(&request, "game type not specified").await;

        assert_eq!(result.outcome, ActionOutcome::FatalFailure);
        assert_eq!(result.rollback, Some(RollbackStatus::NotNeeded));
        assert_eq!(executor.terminal_result(&request.intent_id).await, Some(result));
        assert_eq!(server.notifications().len(), 1);
    }
}
