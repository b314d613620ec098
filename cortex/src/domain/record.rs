// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One remembered piece of history.
///
/// Records are immutable once inserted; they leave the store only through
/// pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub id: RecordId,
    pub embedding: Vec<f32>,
    pub source_text: String,
    pub timestamp: DateTime<Utc>,
    /// Intent this record was created for. Pinned intents keep their records
    /// alive across pruning.
    pub associated_intent_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ContextRecord {
    pub fn new(embedding: Vec<f32>, source_text: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            embedding,
            source_text: source_text.into(),
            timestamp: Utc::now(),
            associated_intent_id: None,
            tags: Vec::new(),
        }
    }

    pub fn with_intent(mut self, intent_id: Uuid) -> Self {
        self.associated_intent_id = Some(intent_id);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// What to search for.
#[derive(Debug, Clone)]
pub enum ContextQuery {
    /// Embedded through the store's [`crate::Embedder`] before ranking.
    Text(String),
    Vector(Vec<f32>),
}

impl From<&str> for ContextQuery {
    fn from(text: &str) -> Self {
        ContextQuery::Text(text.to_string())
    }
}

impl From<Vec<f32>> for ContextQuery {
    fn from(vector: Vec<f32>) -> Self {
        ContextQuery::Vector(vector)
    }
}

/// A query hit.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: Arc<ContextRecord>,
    pub similarity: f32,
}

/// Cosine similarity in `[-1, 1]`.
///
/// Vectors of different length, or with zero magnitude, score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let magnitude_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot / (magnitude_a * magnitude_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_degenerate() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_record_builders() {
        let intent = Uuid::new_v4();
        let record = ContextRecord::new(vec![1.0], "open port 25565")
            .with_intent(intent)
            .with_tags(["request", "network_config"]);

        assert_eq!(record.associated_intent_id, Some(intent));
        assert!(record.has_tag("request"));
        assert!(!record.has_tag("response"));
    }
}
