use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use freshledger_ledger::{LedgerStore, LedgerStoreExt, queries};
use freshledger_types::{FreshLedgerError, ProvenanceRecord, Result, keys};

/// Append-only snapshots of invoice bytes taken before every overwrite or delete.
///
/// Snapshot keys carry a nanosecond timestamp and a per-manager sequence. If a
/// key is already taken the sequence advances, so no snapshot is ever replaced.
pub struct ProvenanceManager {
    store: Arc<dyn LedgerStore>,
    sequence: AtomicU64,
}

impl ProvenanceManager {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            sequence: AtomicU64::new(0),
        }
    }

    /// Snapshot the pre-update bytes of `invoice_id`. Returns the provenance key.
    pub async fn snapshot_update(&self, existing: &[u8], invoice_id: &str) -> Result<String> {
        self.snapshot(existing, invoice_id, &keys::update_provenance_prefix(invoice_id))
            .await
    }

    /// Snapshot the pre-delete bytes of `invoice_id`. Returns the provenance key.
    pub async fn snapshot_delete(
        &self,
        existing: &[u8],
        store_id: &str,
        invoice_id: &str,
    ) -> Result<String> {
        self.snapshot(
            existing,
            invoice_id,
            &keys::delete_provenance_prefix(store_id, invoice_id),
        )
        .await
    }

    /// Write `existing` unmodified under a fresh key derived from `record_id`.
    /// The live record is never touched.
    pub async fn snapshot(
        &self,
        existing: &[u8],
        invoice_id: &str,
        record_id: &str,
    ) -> Result<String> {
        let previous_state = String::from_utf8(existing.to_vec()).map_err(|e| {
            FreshLedgerError::Serialization(format!("invoice {invoice_id} is not UTF-8: {e}"))
        })?;
        let timestamp = Utc::now();
        let nanos = timestamp.timestamp_nanos_opt().unwrap_or(0);

        let key = loop {
            let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
            let candidate = keys::stamped(record_id, &format!("{nanos:020}-{seq:06}"));
            if self.store.get(&candidate).await?.is_none() {
                break candidate;
            }
        };

        let record = ProvenanceRecord {
            invoice_id: invoice_id.to_string(),
            previous_state,
            timestamp,
        };
        self.store.put_json(&key, &record).await?;
        tracing::debug!(invoice_id, key = %key, "provenance snapshot written");
        Ok(key)
    }

    /// Every snapshot taken for `invoice_id`, oldest first.
    pub async fn history(&self, invoice_id: &str) -> Result<Vec<ProvenanceRecord>> {
        let mut records: Vec<(String, ProvenanceRecord)> = self
            .store
            .query_json(&queries::invoice_provenance(invoice_id))
            .await?;
        records.sort_by(|a, b| {
            a.1.timestamp
                .cmp(&b.1.timestamp)
                .then_with(|| stamp_of(&a.0).cmp(stamp_of(&b.0)))
        });
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }
}

fn stamp_of(key: &str) -> &str {
    key.rsplit('_').next().unwrap_or(key)
}
