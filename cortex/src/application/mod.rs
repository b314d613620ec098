// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod context_store;
pub mod context_pruner;

pub use context_store::{ContextStore, ContextStoreConfig};
pub use context_pruner::{ContextPruner, ContextPrunerConfig};
