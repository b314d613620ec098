// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Task Board
//!
//! Background request tracking for the HTTP API. A request submitted over
//! HTTP is queued, run through the [`RequestOrchestrator`] on its own task,
//! and its outcome kept here for polling.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::intent::Intent;

use super::orchestrator::{OrchestratorError, RequestOrchestrator, RequestOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub request: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct TaskBoard {
    orchestrator: Arc<RequestOrchestrator>,
    tasks: Arc<DashMap<TaskId, TaskRecord>>,
}

impl TaskBoard {
    pub fn new(orchestrator: Arc<RequestOrchestrator>) -> Self {
        Self {
            orchestrator,
            tasks: Arc::new(DashMap::new()),
        }
    }

    pub fn orchestrator(&self) -> &Arc<RequestOrchestrator> {
        &self.orchestrator
    }

    /// Queue `request` and start processing it in the background.
    pub fn submit(&self, request: impl Into<String>) -> TaskId {
        let request = request.into();
        let orchestrator = Arc::clone(&self.orchestrator);
        let text = request.clone();
        self.spawn(request, async move { orchestrator.handle_request(&text).await })
    }

    /// Queue an intent whose action is already known. It skips
    /// interpretation but is dispatched like any other request.
    pub fn submit_intent(&self, intent: Intent) -> TaskId {
        let orchestrator = Arc::clone(&self.orchestrator);
        self.spawn(intent.raw_text.clone(), async move { orchestrator.handle_intent(intent).await })
    }

    fn spawn<F>(&self, request: String, work: F) -> TaskId
    where
        F: Future<Output = Result<RequestOutcome, OrchestratorError>> + Send + 'static,
    {
        let task_id = TaskId::new();
        let now = Utc::now();
        self.tasks.insert(
            task_id,
            TaskRecord {
                task_id,
                request,
                status: TaskStatus::Queued,
                created_at: now,
                updated_at: now,
                outcome: None,
                error: None,
            },
        );
        info!(task_id = %task_id, "Task queued");

        let board = self.clone();
        tokio::spawn(async move {
            board.set_status(&task_id, TaskStatus::Running);
            match work.await {
                Ok(outcome) => board.complete(&task_id, &outcome),
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Task failed");
                    board.finish(&task_id, TaskStatus::Failed, None, Some(e.to_string()));
                }
            }
        });

        task_id
    }

    pub fn get(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.tasks.get(task_id).map(|t| t.value().clone())
    }

    /// All tasks, newest first.
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = self.tasks.iter().map(|t| t.value().clone()).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    fn complete(&self, task_id: &TaskId, outcome: &RequestOutcome) {
        let status = match outcome.result() {
            Some(result) if !result.is_success() => TaskStatus::Failed,
            _ => TaskStatus::Completed,
        };
        let error = match status {
            TaskStatus::Failed => Some(outcome.summary()),
            _ => None,
        };
        info!(task_id = %task_id, status = ?status, "Task finished");
        self.finish(task_id, status, serde_json::to_value(outcome).ok(), error);
    }

    fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        if let Some(mut task) = self.tasks.get_mut(task_id) {
            task.status = status;
            task.updated_at = Utc::now();
        }
    }

    fn finish(&self, task_id: &TaskId, status: TaskStatus, outcome: Option<serde_json::Value>, error: Option<String>) {
        if let Some(mut task) = self.tasks.get_mut(task_id) {
            task.status = status;
            task.outcome = outcome;
            task.error = error;
            task.updated_at = Utc::now();
        }
    }
}
