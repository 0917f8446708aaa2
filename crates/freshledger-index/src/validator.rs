use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use freshledger_ledger::{LedgerStore, LedgerStoreExt, queries};
use freshledger_types::{
    FreshLedgerError, InvalidTransactionRecord, InvalidationReason, Invoice, ItemKey, Result,
    TransactionValidity, keys,
};

use crate::engine::{IndexEngine, WindowScan};

/// Flags and removes inconsistent transactions.
///
/// Every removal is log-then-delete: the invoice bytes are written under an
/// `INVALID_` key and the key's invalid counter is bumped before the live
/// record goes away.
pub struct TransactionValidator {
    store: Arc<dyn LedgerStore>,
    engine: IndexEngine,
    sequence: AtomicU64,
}

impl TransactionValidator {
    pub fn new(store: Arc<dyn LedgerStore>, engine: IndexEngine) -> Self {
        Self {
            store,
            engine,
            sequence: AtomicU64::new(0),
        }
    }

    pub async fn get_transaction_validity(
        &self,
        store_id: &str,
        key: &ItemKey,
    ) -> Result<TransactionValidity> {
        self.engine.get_transaction_validity(store_id, key).await
    }

    /// Read-or-initialise the counters for `key`, bump one, write back.
    ///
    /// Two concurrent calls on the same key can lose an increment unless the
    /// store serialises the read and the write.
    pub async fn update_transaction_validity(
        &self,
        store_id: &str,
        key: &ItemKey,
        is_valid: bool,
    ) -> Result<TransactionValidity> {
        let mut validity = self.engine.get_transaction_validity(store_id, key).await?;
        validity.record(is_valid);
        self.store
            .put_json(&keys::transaction_validity_key(store_id, key), &validity)
            .await?;
        Ok(validity)
    }

    /// Log `invoice` under an `INVALID_` key, count it as invalid, then delete
    /// the live record. Returns the log key.
    pub async fn mark_transaction_invalid(
        &self,
        store_id: &str,
        key: &ItemKey,
        invoice: &Invoice,
        reason: InvalidationReason,
    ) -> Result<String> {
        let live_key = keys::invoice_key(&invoice.invoice_id);
        let Some(bytes) = self.store.get(&live_key).await? else {
            return Err(FreshLedgerError::InvoiceNotFound(invoice.invoice_id.clone()));
        };
        let logged = String::from_utf8(bytes).map_err(|e| {
            FreshLedgerError::Serialization(format!(
                "invoice {} is not UTF-8: {e}",
                invoice.invoice_id
            ))
        })?;

        let flagged_at = Utc::now();
        let prefix = keys::invalid_log_prefix(store_id, key, &invoice.invoice_id);
        let log_key = loop {
            let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
            let nanos = flagged_at.timestamp_nanos_opt().unwrap_or(0);
            let candidate = keys::stamped(&prefix, &format!("{nanos:020}-{seq:06}"));
            if self.store.get(&candidate).await?.is_none() {
                break candidate;
            }
        };

        let record = InvalidTransactionRecord {
            invoice_id: invoice.invoice_id.clone(),
            store_id: store_id.to_string(),
            item_key: key.clone(),
            reason,
            invoice: logged,
            flagged_at,
        };
        self.store.put_json(&log_key, &record).await?;
        self.update_transaction_validity(store_id, key, false).await?;
        self.store.delete(&live_key).await?;

        tracing::warn!(
            store_id,
            item_key = %key,
            invoice_id = %invoice.invoice_id,
            ?reason,
            "transaction invalidated"
        );
        Ok(log_key)
    }

    /// Invalidate every live invoice of the store holding `key`. Returns how
    /// many were removed.
    pub async fn invalidate_transactions(
        &self,
        store_id: &str,
        key: &ItemKey,
        reason: InvalidationReason,
    ) -> Result<usize> {
        let invoices: Vec<(String, Invoice)> = self
            .store
            .query_json(&queries::item_invoices(store_id, key, None))
            .await?;
        for (_, invoice) in &invoices {
            self.mark_transaction_invalid(store_id, key, invoice, reason)
                .await?;
        }
        Ok(invoices.len())
    }

    /// Apply the corrective actions a rolling-window scan calls for.
    ///
    /// Invoices dated after expiry are invalidated first. If sales still
    /// exceed purchases every invoice of the key is invalidated and the call
    /// fails with `SalesExceedPurchases`. Otherwise the post-cleanup scan is
    /// returned.
    pub async fn enforce_rolling_window(&self, store_id: &str, key: &ItemKey) -> Result<WindowScan> {
        let scan = self.engine.scan_rolling_window(store_id, key).await?;
        for invoice in &scan.expired {
            self.mark_transaction_invalid(store_id, key, invoice, InvalidationReason::Expired)
                .await?;
        }

        if scan.oversold() {
            let removed = self
                .invalidate_transactions(store_id, key, InvalidationReason::SalesExceedPurchases)
                .await?;
            tracing::warn!(
                store_id,
                item_key = %key,
                purchases = scan.live_purchases,
                sales = scan.live_sales,
                removed,
                "sales exceed purchases"
            );
            return Err(FreshLedgerError::SalesExceedPurchases {
                item_id: key.item_id.clone(),
                expiry_date: key.expiry_date.clone(),
                total_purchases: scan.live_purchases,
                total_sales: scan.live_sales,
            });
        }

        Ok(WindowScan {
            expired: Vec::new(),
            ..scan
        })
    }
}
