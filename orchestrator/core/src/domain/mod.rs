// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value types and ports for the request pipeline. No I/O.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Intents, capabilities, actions, the agent and gateway ports,
//!   orchestration events and configuration

pub mod action;
pub mod agent;
pub mod capability;
pub mod config;
pub mod events;
pub mod intent;
pub mod llm;

pub use action::{ActionOutcome, ActionRequest, ActionResult, DispatchError, ExecutionError, RollbackStatus};
pub use agent::{Agent, AgentOutput};
pub use capability::{AgentCapability, CapabilityId, HealthStatus, RegistryError, TargetHost};
pub use events::OrchestrationEvent;
pub use intent::{ActionKind, Intent, IntentId, InterpretationError, Parameters};
pub use llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage};
