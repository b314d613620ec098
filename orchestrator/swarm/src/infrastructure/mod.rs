// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordination transports.
//!
//! - [`http::HttpCoordinationTransport`] talks to a remote coordination server.
//! - [`in_memory::InMemoryCoordinationServer`] is a process-local server used
//!   for single-node deployments and tests.

pub mod http;
pub mod in_memory;

pub use http::HttpCoordinationTransport;
pub use in_memory::InMemoryCoordinationServer;
