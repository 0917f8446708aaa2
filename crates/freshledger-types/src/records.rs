use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::invoice::ItemKey;

/// Purchase/sale balance for one item key within its rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WastageIndex {
    pub store_id: String,
    pub item_key: ItemKey,
    /// `total_purchase - total_sales`.
    pub wastage: f64,
    /// `wastage` as a percentage of `total_purchase`.
    pub wastage_percent: f64,
    pub total_purchase: f64,
    pub total_sales: f64,
}

/// Monotonic validity counters for one `(store, item key)`; never reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionValidity {
    pub store_id: String,
    pub item_key: ItemKey,
    pub valid_transactions: u64,
    pub invalid_transactions: u64,
}

impl TransactionValidity {
    pub fn new(store_id: impl Into<String>, item_key: ItemKey) -> Self {
        Self {
            store_id: store_id.into(),
            item_key,
            valid_transactions: 0,
            invalid_transactions: 0,
        }
    }

    pub fn record(&mut self, is_valid: bool) {
        if is_valid {
            self.valid_transactions += 1;
        } else {
            self.invalid_transactions += 1;
        }
    }
}

/// Published quality index for one `(store, item key)`, bounded to `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIndex {
    pub store_id: String,
    pub item_key: ItemKey,
    pub quality_index: f64,
}

/// Per-key breakdown returned alongside a store's average quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyIndices {
    pub item_key: ItemKey,
    pub wastage: WastageIndex,
    pub ethics_index: f64,
    pub quality_index: f64,
}

/// Store-wide quality, averaged over every item-key occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreQuality {
    pub store_id: String,
    pub total_quality_index: f64,
    pub num_item_keys: usize,
    pub per_key: Vec<KeyIndices>,
}

/// Immutable snapshot of an invoice's bytes taken before it was overwritten or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub invoice_id: String,
    /// The pre-mutation record, byte for byte.
    pub previous_state: String,
    pub timestamp: DateTime<Utc>,
}

impl ProvenanceRecord {
    pub fn previous_bytes(&self) -> &[u8] {
        self.previous_state.as_bytes()
    }
}

/// Audit entry written before an invalidated invoice is removed from the live set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidTransactionRecord {
    pub invoice_id: String,
    pub store_id: String,
    pub item_key: ItemKey,
    pub reason: InvalidationReason,
    pub invoice: String,
    pub flagged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    /// Transaction dated after the item's expiry.
    Expired,
    /// Cumulative sales for the key exceeded cumulative purchases.
    SalesExceedPurchases,
    /// Requested explicitly by an operator.
    Manual,
}
