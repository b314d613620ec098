// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Booner Core
//!
//! Turns natural-language infrastructure requests into executed actions.
//!
//! # Architecture
//!
//! - **domain:** intents, capabilities, actions, configuration manifest
//! - **application:** interpreter, registry and dispatcher, executor,
//!   request orchestrator, health monitor, task board
//! - **infrastructure:** Ollama gateway adapter, HTTP action agents, event bus
//! - **presentation:** HTTP API

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
