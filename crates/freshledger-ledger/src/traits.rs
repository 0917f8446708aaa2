use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use freshledger_types::{FreshLedgerError, Result};

use crate::selector::Selector;

/// A key/value pair returned by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub key: String,
    pub value: Vec<u8>,
}

impl LedgerRecord {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.value).map_err(|e| {
            FreshLedgerError::Serialization(format!("record {}: {e}", self.key))
        })
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Cursor over query results. The underlying store cursor is released when
/// this value is dropped, so every exit path (including `?`) closes it.
pub struct QueryResults {
    inner: Box<dyn Iterator<Item = Result<LedgerRecord>> + Send>,
    release: Option<ReleaseFn>,
}

impl QueryResults {
    pub fn new<I>(records: I) -> Self
    where
        I: Iterator<Item = Result<LedgerRecord>> + Send + 'static,
    {
        Self {
            inner: Box::new(records),
            release: None,
        }
    }

    /// Attach a callback run exactly once when the cursor is closed.
    pub fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub fn close(self) {}
}

impl Iterator for QueryResults {
    type Item = Result<LedgerRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl Drop for QueryResults {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for QueryResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResults")
            .field("open", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

/// Durable key/value store with selector queries. This is the only
/// persistence authority; implementations provide replication, durability
/// and any cross-transaction isolation.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Records whose JSON value satisfies `selector`.
    async fn query(&self, selector: &Selector) -> Result<QueryResults>;
}

/// JSON helpers available on every store.
#[async_trait]
pub trait LedgerStoreExt: LedgerStore {
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_json<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, bytes).await
    }

    /// Run `selector` and decode every match, closing the cursor on all paths.
    async fn query_json<T>(&self, selector: &Selector) -> Result<Vec<(String, T)>>
    where
        T: DeserializeOwned + Send,
    {
        let results = self.query(selector).await?;
        let mut out = Vec::new();
        for record in results {
            let record = record?;
            let value = record.decode()?;
            out.push((record.key, value));
        }
        Ok(out)
    }
}

impl<S: LedgerStore + ?Sized> LedgerStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_release_runs_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let results = QueryResults::new(std::iter::empty()).on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        results.close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_on_partial_iteration() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let records = (0..3).map(|i| {
            Ok(LedgerRecord {
                key: format!("k{i}"),
                value: b"{}".to_vec(),
            })
        });
        {
            let mut results = QueryResults::new(records).on_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert!(results.next().is_some());
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_error_names_key() {
        let record = LedgerRecord {
            key: "P1".into(),
            value: b"{oops".to_vec(),
        };
        let err = record.decode::<serde_json::Value>().unwrap_err();
        assert!(err.to_string().contains("P1"));
    }
}
