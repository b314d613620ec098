// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `booner-cortex`: Context Store
//!
//! Long-lived memory of the orchestrator. Every request is embedded and kept as
//! a [`ContextRecord`]; later requests retrieve the nearest records to ground
//! their interpretation.
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Purpose:** Append-only vector memory with snapshot reads and capacity pruning
//!
//! Similarity is cosine similarity over the stored embedding vectors; ties are
//! broken newest-first.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::{ContextPruner, ContextPrunerConfig, ContextStore, ContextStoreConfig};
pub use infrastructure::HashEmbedder;
