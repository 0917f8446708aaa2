use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use freshledger_ledger::{LedgerStore, LedgerStoreExt, queries};
use freshledger_types::{
    FreshLedgerError, Invoice, InvoiceSubmission, Item, LedgerConfig, ProvenanceRecord, Result,
    keys, validate_date, validate_invoice_type, validate_item,
};

use crate::provenance::ProvenanceManager;

/// Live invoice records plus their provenance trail.
pub struct InvoiceRepository {
    store: Arc<dyn LedgerStore>,
    provenance: ProvenanceManager,
    config: LedgerConfig,
}

impl InvoiceRepository {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self {
            provenance: ProvenanceManager::new(store.clone()),
            store,
            config,
        }
    }

    pub fn provenance(&self) -> &ProvenanceManager {
        &self.provenance
    }

    /// Validate a submission and build the invoice it describes, without
    /// touching the store.
    ///
    /// Every item is checked before anything is accepted: a single non-food
    /// item, malformed date or item that expired before the invoice date
    /// rejects the whole invoice.
    pub fn prepare(&self, submission: InvoiceSubmission) -> Result<Invoice> {
        let invoice_type = validate_invoice_type(&submission.invoice_type)?;
        let invoice_date = validate_date(&submission.date, &self.config.date_layout)?;

        let mut items = Vec::with_capacity(submission.items.len());
        for item in submission.items {
            validate_item(&item)?;
            let expiry = validate_date(&item.expiry_date, &self.config.date_layout)?;
            if invoice_date > expiry {
                return Err(FreshLedgerError::ExpiredItem {
                    item_id: item.item_id,
                    expiry_date: item.expiry_date,
                    invoice_date: submission.date,
                });
            }
            items.push(Item {
                item_id: item.item_id,
                item_name: item.item_name,
                quantity: item.quantity,
                price_per_unit: item.price_per_unit,
                total_price: item.total_price,
                expiry_date: item.expiry_date,
                invoice_type,
                is_food_item: item.is_food_item,
            });
        }

        Ok(Invoice {
            invoice_id: submission.invoice_id,
            store_id: submission.store_id,
            date: submission.date,
            items,
            total_amount: submission.total_amount,
            transaction_hash: String::new(),
            prev_block_hash: None,
            timestamp: String::new(),
            invoice_type,
        })
    }

    /// Strict creation: fails with `DuplicateInvoice` if the id is already live.
    pub async fn create_invoice(&self, submission: InvoiceSubmission) -> Result<Invoice> {
        let mut invoice = self.prepare(submission)?;
        let key = keys::invoice_key(&invoice.invoice_id);
        if self.store.get(&key).await?.is_some() {
            return Err(FreshLedgerError::DuplicateInvoice(invoice.invoice_id));
        }

        invoice.stamp(now());
        self.store.put_json(&key, &invoice).await?;
        tracing::info!(
            invoice_id = %invoice.invoice_id,
            store_id = %invoice.store_id,
            invoice_type = %invoice.invoice_type,
            "invoice created"
        );
        Ok(invoice)
    }

    /// Validate and write, replacing a live record of the same id if present.
    /// A replaced record is snapshotted first and the new hash links to it.
    pub async fn upsert_invoice(&self, submission: InvoiceSubmission) -> Result<Invoice> {
        let invoice = self.prepare(submission)?;
        let key = keys::invoice_key(&invoice.invoice_id);
        match self.store.get(&key).await? {
            Some(existing) => self.replace(&key, &existing, invoice).await,
            None => {
                let mut invoice = invoice;
                invoice.stamp(now());
                self.store.put_json(&key, &invoice).await?;
                tracing::info!(invoice_id = %invoice.invoice_id, "invoice created");
                Ok(invoice)
            }
        }
    }

    /// Replace a live invoice. Business rules are not re-validated.
    pub async fn update_invoice(&self, invoice_id: &str, invoice: Invoice) -> Result<Invoice> {
        if invoice.invoice_id != invoice_id {
            return Err(FreshLedgerError::InvoiceIdMismatch {
                expected: invoice_id.to_string(),
                actual: invoice.invoice_id,
            });
        }
        let key = keys::invoice_key(invoice_id);
        let existing = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| FreshLedgerError::InvoiceNotFound(invoice_id.to_string()))?;
        self.replace(&key, &existing, invoice).await
    }

    /// Invoice ids are global; a store may only replace invoices it owns.
    async fn replace(&self, key: &str, existing: &[u8], mut invoice: Invoice) -> Result<Invoice> {
        let previous: Invoice = serde_json::from_slice(existing)?;
        if previous.store_id != invoice.store_id {
            tracing::warn!(
                invoice_id = %invoice.invoice_id,
                owner = %previous.store_id,
                requested = %invoice.store_id,
                "invoice id owned by another store"
            );
            return Err(FreshLedgerError::InvoiceOwnedByOtherStore {
                invoice_id: invoice.invoice_id,
                owner: previous.store_id,
                requested: invoice.store_id,
            });
        }
        self.provenance
            .snapshot_update(existing, &invoice.invoice_id)
            .await?;

        invoice.prev_block_hash = Some(previous.transaction_hash);
        invoice.stamp(now());
        self.store.put_json(key, &invoice).await?;
        tracing::info!(invoice_id = %invoice.invoice_id, "invoice updated");
        Ok(invoice)
    }

    /// Snapshot then remove a live invoice. Returns the removed record.
    pub async fn delete_invoice(&self, invoice_id: &str) -> Result<Invoice> {
        let key = keys::invoice_key(invoice_id);
        let existing = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| FreshLedgerError::InvoiceNotFound(invoice_id.to_string()))?;
        let invoice: Invoice = serde_json::from_slice(&existing)?;

        self.provenance
            .snapshot_delete(&existing, &invoice.store_id, invoice_id)
            .await?;
        self.store.delete(&key).await?;
        tracing::info!(invoice_id, store_id = %invoice.store_id, "invoice deleted");
        Ok(invoice)
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>> {
        self.store.get_json(&keys::invoice_key(invoice_id)).await
    }

    /// Every live invoice of a store, in key order.
    pub async fn list_invoices(&self, store_id: &str) -> Result<Vec<Invoice>> {
        let invoices: Vec<(String, Invoice)> = self
            .store
            .query_json(&queries::store_invoices(store_id))
            .await?;
        Ok(invoices.into_iter().map(|(_, invoice)| invoice).collect())
    }

    pub async fn history(&self, invoice_id: &str) -> Result<Vec<ProvenanceRecord>> {
        self.provenance.history(invoice_id).await
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
