// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;

use super::errors::ContextError;

/// Turns text into an embedding vector.
///
/// Implemented by the LLM gateway adapter in production and by
/// [`crate::infrastructure::HashEmbedder`] for offline use.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ContextError>;
}
