// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContextError {
    /// A text query or `remember` call was made on a store without an embedder.
    #[error("context store has no embedder configured")]
    NoEmbedder,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
