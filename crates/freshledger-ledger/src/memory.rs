use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use freshledger_types::Result;

use crate::selector::Selector;
use crate::traits::{LedgerRecord, LedgerStore, QueryResults};

/// In-memory ledger store (default). Queries snapshot the matching records and
/// yield them in ascending key order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    records: Arc<DashMap<String, Vec<u8>>>,
    open_cursors: Arc<AtomicUsize>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of query cursors handed out and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.records.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.records.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }

    async fn query(&self, selector: &Selector) -> Result<QueryResults> {
        let mut matched: Vec<LedgerRecord> = self
            .records
            .iter()
            .filter(|entry| selector.matches_bytes(entry.value()))
            .map(|entry| LedgerRecord {
                key: entry.key().clone(),
                value: entry.value().clone(),
            })
            .collect();
        matched.sort_by(|a, b| a.key.cmp(&b.key));
        tracing::debug!(matches = matched.len(), "ledger query");

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        let cursors = self.open_cursors.clone();
        Ok(QueryResults::new(matched.into_iter().map(Ok)).on_release(move || {
            cursors.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}
