//! In-process context store for development and tests.

use crate::error::Result;
use crate::scorer::{keywords, overlap_score};
use crate::store::ContextStore;
use crate::types::{ContextRecord, ContextSnippet, Exchange};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::RwLock;
use tracing::debug;

/// Default number of records kept before the oldest is dropped
pub const DEFAULT_CAPACITY: usize = 1_000;

/// Bounded, keyword-overlap scored context store held in memory.
pub struct InMemoryContextStore {
    records: RwLock<VecDeque<ContextRecord>>,
    capacity: usize,
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InMemoryContextStore {
    /// Create a store that keeps at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<ContextRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl ContextStore for InMemoryContextStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ContextSnippet>> {
        let query = keywords(text);
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        // Iterate newest first so the stable sort prefers recent records on ties.
        let mut scored: Vec<(f32, &ContextRecord)> = records
            .iter()
            .rev()
            .filter_map(|record| {
                let candidate = keywords(&record.snippet_text());
                let score = overlap_score(&query, &candidate);
                (score > 0.0).then_some((score, record))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let snippets: Vec<ContextSnippet> = scored
            .into_iter()
            .take(top_k)
            .map(|(score, record)| ContextSnippet {
                id: record.id.clone(),
                text: record.snippet_text(),
                score,
            })
            .collect();
        debug!(results = snippets.len(), "in-memory context query");
        Ok(snippets)
    }

    async fn store(&self, exchange: Exchange) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.push_back(ContextRecord {
            id: id.clone(),
            exchange,
            stored_at: Utc::now(),
        });
        while records.len() > self.capacity {
            records.pop_front();
        }
        Ok(id)
    }
}
