// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod dispatcher;
pub mod executor;
pub mod health_monitor;
pub mod interpreter;
pub mod orchestrator;
pub mod task_board;

// Re-export the pipeline stages for convenience
pub use dispatcher::{AgentRegistry, DispatchSettings, Dispatcher, RegistrySettings};
pub use executor::{ActionExecutor, ExecutorSettings};
pub use health_monitor::HealthMonitor;
pub use interpreter::{IntentInterpreter, InterpreterSettings};
pub use orchestrator::{OrchestratorError, OrchestratorSettings, RequestOrchestrator, RequestOutcome};
pub use task_board::{TaskBoard, TaskId, TaskRecord, TaskStatus};
