use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use freshledger_ledger::{LedgerStore, LedgerStoreExt, queries};
use freshledger_types::{
    FreshLedgerError, Invoice, InvoiceType, ItemKey, KeyIndices, LedgerConfig, Result,
    StoreQuality, TransactionValidity, WastageIndex, keys, validate_date,
};

/// Result of one pass over an item key's transaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowScan {
    pub store_id: String,
    pub item_key: ItemKey,
    /// Earliest purchase date not past expiry; `None` when there is no such purchase.
    pub window_start: Option<NaiveDate>,
    pub window_end: NaiveDate,
    /// Quantities dated on or before both expiry and today.
    pub total_purchases: f64,
    pub total_sales: f64,
    /// Quantities of every invoice not past expiry, whatever its date.
    pub live_purchases: f64,
    pub live_sales: f64,
    /// Invoices dated strictly after the item's expiry. Excluded from the totals.
    pub expired: Vec<Invoice>,
}

impl WindowScan {
    pub fn oversold(&self) -> bool {
        self.live_sales > self.live_purchases
    }

    pub fn wastage(&self) -> f64 {
        self.total_purchases - self.total_sales
    }
}

/// Read-only computation of wastage, ethics and quality indices.
///
/// Every value is recomputed from the full live transaction history on each
/// call, so repeated calls over an unchanged ledger agree. Nothing here
/// writes to the store; corrective actions live in `TransactionValidator`.
#[derive(Clone)]
pub struct IndexEngine {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl IndexEngine {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn bound_index(&self, value: f64) -> f64 {
        self.config.bound_index(value)
    }

    async fn item_invoices(
        &self,
        store_id: &str,
        key: &ItemKey,
        invoice_type: Option<InvoiceType>,
    ) -> Result<Vec<Invoice>> {
        let found: Vec<(String, Invoice)> = self
            .store
            .query_json(&queries::item_invoices(store_id, key, invoice_type))
            .await?;
        Ok(found.into_iter().map(|(_, invoice)| invoice).collect())
    }

    async fn total_for(
        &self,
        store_id: &str,
        key: &ItemKey,
        invoice_type: InvoiceType,
    ) -> Result<f64> {
        let invoices = self.item_invoices(store_id, key, Some(invoice_type)).await?;
        Ok(invoices
            .iter()
            .map(|invoice| invoice.quantity_for(key))
            .fold(0.0, |acc, quantity| acc + quantity))
    }

    /// Sum of purchased quantity for `key` across all live purchase invoices.
    pub async fn get_total_purchases(&self, store_id: &str, key: &ItemKey) -> Result<f64> {
        self.total_for(store_id, key, InvoiceType::Purchase).await
    }

    /// Sum of sold quantity for `key` across all live sales invoices.
    pub async fn get_total_sales(&self, store_id: &str, key: &ItemKey) -> Result<f64> {
        self.total_for(store_id, key, InvoiceType::Sales).await
    }

    pub async fn get_transaction_validity(
        &self,
        store_id: &str,
        key: &ItemKey,
    ) -> Result<TransactionValidity> {
        let stored: Option<TransactionValidity> = self
            .store
            .get_json(&keys::transaction_validity_key(store_id, key))
            .await?;
        Ok(stored.unwrap_or_else(|| TransactionValidity::new(store_id, key.clone())))
    }

    /// Accumulate purchases and sales for `key` over its rolling window.
    ///
    /// The window runs from the earliest purchase (ignoring purchases dated
    /// past expiry) through today. Sales recorded out of order, dated before
    /// that purchase, still count: the oversold check compares every live
    /// quantity not past expiry.
    pub async fn scan_rolling_window(&self, store_id: &str, key: &ItemKey) -> Result<WindowScan> {
        let layout = &self.config.date_layout;
        let expiry = validate_date(&key.expiry_date, layout)?;
        let today = Utc::now().date_naive();

        let mut dated = Vec::new();
        for invoice in self.item_invoices(store_id, key, None).await? {
            let date = validate_date(&invoice.date, layout)?;
            dated.push((date, invoice));
        }

        let window_start = dated
            .iter()
            .filter(|(date, invoice)| {
                invoice.invoice_type == InvoiceType::Purchase && *date <= expiry
            })
            .map(|(date, _)| *date)
            .min();

        let mut scan = WindowScan {
            store_id: store_id.to_string(),
            item_key: key.clone(),
            window_start,
            window_end: today,
            total_purchases: 0.0,
            total_sales: 0.0,
            live_purchases: 0.0,
            live_sales: 0.0,
            expired: Vec::new(),
        };

        for (date, invoice) in dated {
            if date > expiry {
                scan.expired.push(invoice);
                continue;
            }
            let quantity = invoice.quantity_for(key);
            match invoice.invoice_type {
                InvoiceType::Purchase => scan.live_purchases += quantity,
                InvoiceType::Sales => scan.live_sales += quantity,
            }
            if date > today {
                continue;
            }
            match invoice.invoice_type {
                InvoiceType::Purchase => scan.total_purchases += quantity,
                InvoiceType::Sales => scan.total_sales += quantity,
            }
        }

        tracing::debug!(
            store_id,
            item_key = %key,
            purchases = scan.total_purchases,
            sales = scan.total_sales,
            expired = scan.expired.len(),
            "rolling window scanned"
        );
        Ok(scan)
    }

    /// Wastage (`purchases - sales`) over the rolling window, without
    /// applying any corrective action.
    pub async fn wastage_in_rolling_window(&self, store_id: &str, key: &ItemKey) -> Result<f64> {
        let scan = self.scan_rolling_window(store_id, key).await?;
        check_scan(&scan)?;
        Ok(scan.wastage())
    }

    /// Wastage for `key` with its percentage of total purchases.
    pub async fn calculate_wastage_index(
        &self,
        store_id: &str,
        key: &ItemKey,
    ) -> Result<WastageIndex> {
        let scan = self.scan_rolling_window(store_id, key).await?;
        check_scan(&scan)?;
        let wastage = scan.wastage();
        Ok(WastageIndex {
            store_id: store_id.to_string(),
            item_key: key.clone(),
            wastage,
            wastage_percent: wastage / scan.total_purchases * 100.0,
            total_purchase: scan.total_purchases,
            total_sales: scan.total_sales,
        })
    }

    /// Share of transactions for `key` that were dated on or before expiry.
    ///
    /// Invalid transactions are the live ones dated after expiry plus those
    /// already invalidated and counted in the key's validity record. With no
    /// invalid transactions the score is 100.
    pub async fn calculate_ethics_index(&self, store_id: &str, key: &ItemKey) -> Result<f64> {
        let layout = &self.config.date_layout;
        let expiry = validate_date(&key.expiry_date, layout)?;

        let mut valid = 0u64;
        let mut invalid = 0u64;
        for invoice in self.item_invoices(store_id, key, None).await? {
            if validate_date(&invoice.date, layout)? > expiry {
                invalid += 1;
            } else {
                valid += 1;
            }
        }
        invalid += self
            .get_transaction_validity(store_id, key)
            .await?
            .invalid_transactions;

        if invalid == 0 {
            return Ok(self.bound_index(100.0));
        }
        let ratio = valid as f64 / (valid + invalid) as f64;
        Ok(self.bound_index(ratio * 100.0))
    }

    /// `bound(1 / wastage% + ethics)` for one key.
    ///
    /// Zero wastage makes the reciprocal term infinite, which bounds to the
    /// ceiling.
    pub async fn calculate_key_indices(&self, store_id: &str, key: &ItemKey) -> Result<KeyIndices> {
        let wastage = self.calculate_wastage_index(store_id, key).await?;
        let ethics_index = self.calculate_ethics_index(store_id, key).await?;
        let quality_index = self.bound_index(1.0 / wastage.wastage_percent + ethics_index);
        Ok(KeyIndices {
            item_key: key.clone(),
            wastage,
            ethics_index,
            quality_index,
        })
    }

    /// Every item-key occurrence across the store's live invoices, in
    /// encounter order. A key appearing on three invoices appears three times.
    pub async fn item_key_occurrences(&self, store_id: &str) -> Result<Vec<ItemKey>> {
        let invoices: Vec<(String, Invoice)> = self
            .store
            .query_json(&queries::store_invoices(store_id))
            .await?;
        Ok(invoices
            .iter()
            .flat_map(|(_, invoice)| invoice.items.iter().map(|item| item.key()))
            .collect())
    }

    /// Average quality over every item-key occurrence of the store.
    ///
    /// Keys with no purchase inside their window are left out of the
    /// average; if that leaves nothing the store has no items to score.
    pub async fn calculate_quality_index(&self, store_id: &str) -> Result<StoreQuality> {
        let occurrences = self.item_key_occurrences(store_id).await?;
        if occurrences.is_empty() {
            return Err(FreshLedgerError::NoItems(store_id.to_string()));
        }

        let mut per_key: BTreeMap<ItemKey, Option<KeyIndices>> = BTreeMap::new();
        let mut total = 0.0;
        let mut counted = 0usize;
        for key in occurrences {
            if !per_key.contains_key(&key) {
                let indices = match self.calculate_key_indices(store_id, &key).await {
                    Ok(indices) => Some(indices),
                    Err(FreshLedgerError::NoPurchaseData { .. }) => {
                        tracing::debug!(store_id, item_key = %key, "no purchases in window");
                        None
                    }
                    Err(e) => return Err(e),
                };
                per_key.insert(key.clone(), indices);
            }
            if let Some(Some(indices)) = per_key.get(&key) {
                total += indices.quality_index;
                counted += 1;
            }
        }

        if counted == 0 {
            return Err(FreshLedgerError::NoItems(store_id.to_string()));
        }
        Ok(StoreQuality {
            store_id: store_id.to_string(),
            total_quality_index: self.bound_index(total / counted as f64),
            num_item_keys: counted,
            per_key: per_key.into_values().flatten().collect(),
        })
    }
}

fn check_scan(scan: &WindowScan) -> Result<()> {
    if scan.oversold() {
        return Err(FreshLedgerError::SalesExceedPurchases {
            item_id: scan.item_key.item_id.clone(),
            expiry_date: scan.item_key.expiry_date.clone(),
            total_purchases: scan.live_purchases,
            total_sales: scan.live_sales,
        });
    }
    if scan.total_purchases <= 0.0 {
        return Err(FreshLedgerError::NoPurchaseData {
            item_id: scan.item_key.item_id.clone(),
            expiry_date: scan.item_key.expiry_date.clone(),
        });
    }
    Ok(())
}
