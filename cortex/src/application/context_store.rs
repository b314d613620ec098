// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Context Store
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Insert, rank and evict context records
//!
//! Records live in a timestamp-ordered `Arc<Vec<_>>` snapshot behind a short
//! write lock. Readers clone the `Arc` and rank outside the lock, so a query
//! never waits for a writer longer than one pointer copy; writers copy the
//! vector only while a reader still holds the previous snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{cosine_similarity, ContextError, ContextQuery, ContextRecord, Embedder, RecordId, ScoredRecord};

#[derive(Debug, Clone)]
pub struct ContextStoreConfig {
    /// Capacity above which the oldest unpinned records are evicted on insert.
    pub max_records: usize,
    /// Expected embedding length. `None` accepts any length.
    pub dimensions: Option<usize>,
}

impl Default for ContextStoreConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            dimensions: None,
        }
    }
}

type Snapshot = Arc<Vec<Arc<ContextRecord>>>;

pub struct ContextStore {
    records: RwLock<Snapshot>,
    /// Intent id → number of outstanding pins.
    pinned: DashMap<Uuid, usize>,
    embedder: Option<Arc<dyn Embedder>>,
    config: ContextStoreConfig,
}

impl ContextStore {
    pub fn new(config: ContextStoreConfig) -> Self {
        Self {
            records: RwLock::new(Arc::new(Vec::new())),
            pinned: DashMap::new(),
            embedder: None,
            config,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &ContextStoreConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent view of every record, oldest first.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.records.read())
    }

    /// Append a record, keeping timestamp order.
    ///
    /// Evicts the oldest unpinned records if the store grows past capacity.
    pub fn insert(&self, record: ContextRecord) -> Result<RecordId, ContextError> {
        if let Some(expected) = self.config.dimensions {
            if record.embedding.len() != expected {
                return Err(ContextError::DimensionMismatch {
                    expected,
                    actual: record.embedding.len(),
                });
            }
        }

        let id = record.id;
        let len = {
            let mut guard = self.records.write();
            let records = Arc::make_mut(&mut guard);
            let position = records.partition_point(|r| r.timestamp <= record.timestamp);
            records.insert(position, Arc::new(record));
            records.len()
        };

        if len > self.config.max_records {
            self.prune(self.config.max_records);
        }
        metrics::gauge!("booner_context_records").set(self.len() as f64);
        Ok(id)
    }

    /// Embed `text` and insert it.
    pub async fn remember(
        &self,
        text: &str,
        intent_id: Option<Uuid>,
        tags: &[&str],
    ) -> Result<RecordId, ContextError> {
        let embedding = self.embed(text).await?;
        let mut record = ContextRecord::new(embedding, text).with_tags(tags.iter().copied());
        record.associated_intent_id = intent_id;
        self.insert(record)
    }

    /// The `k` records nearest to `query`, nearest first.
    ///
    /// Equal similarities are ordered newest first. Returns fewer than `k`
    /// only when the store holds fewer records.
    pub async fn query(&self, query: impl Into<ContextQuery>, k: usize) -> Result<Vec<ScoredRecord>, ContextError> {
        let vector = match query.into() {
            ContextQuery::Vector(vector) => vector,
            ContextQuery::Text(text) => self.embed(&text).await?,
        };
        Ok(self.nearest(&vector, k))
    }

    /// Ranking over the current snapshot.
    pub fn nearest(&self, vector: &[f32], k: usize) -> Vec<ScoredRecord> {
        if k == 0 {
            return Vec::new();
        }
        let snapshot = self.snapshot();

        let mut scored: Vec<ScoredRecord> = snapshot
            .iter()
            .map(|record| ScoredRecord {
                similarity: cosine_similarity(vector, &record.embedding),
                record: Arc::clone(record),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| b.record.timestamp.cmp(&a.record.timestamp))
        });
        scored.truncate(k);
        scored
    }

    /// Evict the oldest unpinned records until at most `max_records` remain.
    ///
    /// Returns how many records were removed. If pinned records alone exceed
    /// the cap, the store stays above it until they are unpinned.
    pub fn prune(&self, max_records: usize) -> usize {
        let removed = {
            let mut guard = self.records.write();
            let excess = guard.len().saturating_sub(max_records);
            if excess == 0 {
                return 0;
            }

            let victims: HashSet<RecordId> = guard
                .iter()
                .filter(|r| !self.is_record_pinned(r))
                .take(excess)
                .map(|r| r.id)
                .collect();

            if victims.is_empty() {
                0
            } else {
                Arc::make_mut(&mut guard).retain(|r| !victims.contains(&r.id));
                victims.len()
            }
        };

        if removed > 0 {
            debug!(removed, max_records, "Pruned context records");
            metrics::gauge!("booner_context_records").set(self.len() as f64);
        }
        removed
    }

    /// Evict unpinned records older than `cutoff`.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let removed = {
            let mut guard = self.records.write();
            let before = guard.len();
            if !guard.iter().any(|r| r.timestamp < cutoff && !self.is_record_pinned(r)) {
                return 0;
            }
            Arc::make_mut(&mut guard).retain(|r| r.timestamp >= cutoff || self.is_record_pinned(r));
            before - guard.len()
        };

        debug!(removed, cutoff = %cutoff, "Pruned expired context records");
        metrics::gauge!("booner_context_records").set(self.len() as f64);
        removed
    }

    /// Protect every record of `intent_id` from eviction until a matching
    /// [`unpin_intent`](Self::unpin_intent).
    pub fn pin_intent(&self, intent_id: Uuid) {
        *self.pinned.entry(intent_id).or_insert(0) += 1;
    }

    pub fn unpin_intent(&self, intent_id: Uuid) {
        if let dashmap::mapref::entry::Entry::Occupied(mut entry) = self.pinned.entry(intent_id) {
            *entry.get_mut() -= 1;
            if *entry.get() == 0 {
                entry.remove();
            }
        }
    }

    pub fn is_pinned(&self, intent_id: &Uuid) -> bool {
        self.pinned.contains_key(intent_id)
    }

    fn is_record_pinned(&self, record: &ContextRecord) -> bool {
        record
            .associated_intent_id
            .is_some_and(|intent_id| self.pinned.contains_key(&intent_id))
    }

    /// Embed `text` with the configured embedder, checking its width.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ContextError> {
        let embedder = self.embedder.as_ref().ok_or(ContextError::NoEmbedder)?;
        let vector = embedder.embed(text).await?;
        match self.config.dimensions {
            Some(expected) if vector.len() != expected => Err(ContextError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(vector),
        }
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(ContextStoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(seconds: i64, embedding: Vec<f32>, text: &str) -> ContextRecord {
        let base = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        ContextRecord::new(embedding, text).with_timestamp(base + Duration::seconds(seconds))
    }

    #[test]
    fn test_query_orders_by_similarity() {
        let store = ContextStore::default();
        store.insert(at(0, vec![1.0, 0.0], "east")).unwrap();
        store.insert(at(1, vec![0.0, 1.0], "north")).unwrap();
        store.insert(at(2, vec![0.7, 0.7], "north-east")).unwrap();

        let hits = store.nearest(&[1.0, 0.1], 3);
        let texts: Vec<_> = hits.iter().map(|h| h.record.source_text.as_str()).collect();
        assert_eq!(texts, vec!["east", "north-east", "north"]);
        assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_ties_break_newest_first() {
        let store = ContextStore::default();
        store.insert(at(10, vec![1.0, 0.0], "old")).unwrap();
        store.insert(at(30, vec![2.0, 0.0], "newest")).unwrap();
        store.insert(at(20, vec![3.0, 0.0], "middle")).unwrap();

        let hits = store.nearest(&[1.0, 0.0], 3);
        let texts: Vec<_> = hits.iter().map(|h| h.record.source_text.as_str()).collect();
        assert_eq!(texts, vec!["newest", "middle", "old"]);
    }

    #[test]
    fn test_query_returns_exactly_k() {
        let store = ContextStore::default();
        for i in 0..10 {
            store.insert(at(i, vec![i as f32, 1.0], "r")).unwrap();
        }
        assert_eq!(store.nearest(&[1.0, 1.0], 4).len(), 4);
        assert_eq!(store.nearest(&[1.0, 1.0], 0).len(), 0);
        assert_eq!(store.nearest(&[1.0, 1.0], 50).len(), 10);
    }

    #[test]
    fn test_insert_keeps_timestamp_order() {
        let store = ContextStore::default();
        store.insert(at(5, vec![1.0], "b")).unwrap();
        store.insert(at(1, vec![1.0], "a")).unwrap();
        store.insert(at(9, vec![1.0], "c")).unwrap();

        let texts: Vec<_> = store.snapshot().iter().map(|r| r.source_text.clone()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_prune_removes_oldest() {
        let store = ContextStore::default();
        for i in 0..5 {
            store.insert(at(i, vec![1.0], &format!("r{}", i))).unwrap();
        }

        assert_eq!(store.prune(3), 2);
        let texts: Vec<_> = store.snapshot().iter().map(|r| r.source_text.clone()).collect();
        assert_eq!(texts, vec!["r2", "r3", "r4"]);
        assert_eq!(store.prune(3), 0);
    }

    #[test]
    fn test_prune_skips_pinned_intents() {
        let store = ContextStore::default();
        let in_flight = Uuid::new_v4();
        store.insert(at(0, vec![1.0], "pinned").with_intent(in_flight)).unwrap();
        store.insert(at(1, vec![1.0], "old")).unwrap();
        store.insert(at(2, vec![1.0], "new")).unwrap();

        store.pin_intent(in_flight);
        assert_eq!(store.prune(1), 1);
        let texts: Vec<_> = store.snapshot().iter().map(|r| r.source_text.clone()).collect();
        assert_eq!(texts, vec!["pinned", "new"]);

        store.unpin_intent(in_flight);
        assert_eq!(store.prune(1), 1);
        assert_eq!(store.snapshot()[0].source_text, "new");
    }

    #[test]
    fn test_pins_are_counted() {
        let store = ContextStore::default();
        let id = Uuid::new_v4();
        store.pin_intent(id);
        store.pin_intent(id);
        store.unpin_intent(id);
        assert!(store.is_pinned(&id));
        store.unpin_intent(id);
        assert!(!store.is_pinned(&id));
    }

    #[test]
    fn test_insert_enforces_capacity() {
        let store = ContextStore::new(ContextStoreConfig {
            max_records: 2,
            dimensions: Some(1),
        });
        for i in 0..4 {
            store.insert(at(i, vec![1.0], "r")).unwrap();
        }
        assert_eq!(store.len(), 2);

        let err = store.insert(at(9, vec![1.0, 2.0], "wide")).unwrap_err();
        assert_eq!(err, ContextError::DimensionMismatch { expected: 1, actual: 2 });
    }

    #[test]
    fn test_prune_older_than() {
        let store = ContextStore::default();
        store.insert(at(0, vec![1.0], "old")).unwrap();
        store.insert(at(100, vec![1.0], "fresh")).unwrap();

        let cutoff = store.snapshot()[1].timestamp;
        assert_eq!(store.prune_older_than(cutoff), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_writes() {
        let store = ContextStore::default();
        store.insert(at(0, vec![1.0], "a")).unwrap();
        let before = store.snapshot();
        store.insert(at(1, vec![1.0], "b")).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_text_query_without_embedder_fails() {
        let store = ContextStore::default();
        let err = store.query("open port 25565", 3).await.unwrap_err();
        assert_eq!(err, ContextError::NoEmbedder);
    }
}
