use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FreshLedgerError;

/// Direction of an invoice relative to the store that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceType {
    Purchase,
    Sales,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Purchase => "purchase",
            InvoiceType::Sales => "sales",
        }
    }
}

impl fmt::Display for InvoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceType {
    type Err = FreshLedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(InvoiceType::Purchase),
            "sales" => Ok(InvoiceType::Sales),
            other => Err(FreshLedgerError::InvalidInvoiceType(other.to_string())),
        }
    }
}

/// Composite grouping key for all index and validity state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub item_id: String,
    pub expiry_date: String,
}

impl ItemKey {
    pub fn new(item_id: impl Into<String>, expiry_date: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            expiry_date: expiry_date.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.item_id, self.expiry_date)
    }
}

/// A line item embedded in an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub item_name: String,
    pub quantity: f64,
    pub price_per_unit: f64,
    /// `quantity × price_per_unit` by caller convention; not enforced.
    pub total_price: f64,
    pub expiry_date: String,
    pub invoice_type: InvoiceType,
    pub is_food_item: bool,
}

impl Item {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.item_id.clone(), self.expiry_date.clone())
    }

    pub fn matches(&self, key: &ItemKey) -> bool {
        self.item_id == key.item_id && self.expiry_date == key.expiry_date
    }
}

/// The live invoice record as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,
    pub store_id: String,
    pub date: String,
    pub items: Vec<Item>,
    pub total_amount: f64,
    pub transaction_hash: String,
    /// Hash of the record this one replaced under the same invoice id.
    pub prev_block_hash: Option<String>,
    pub timestamp: String,
    pub invoice_type: InvoiceType,
}

impl Invoice {
    /// SHA-256 over `invoice_id ‖ store_id ‖ date ‖ timestamp`, hex-encoded.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.invoice_id.as_bytes());
        hasher.update(self.store_id.as_bytes());
        hasher.update(self.date.as_bytes());
        hasher.update(self.timestamp.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Set the write timestamp and recompute the transaction hash.
    pub fn stamp(&mut self, timestamp: impl Into<String>) {
        self.timestamp = timestamp.into();
        self.transaction_hash = self.compute_hash();
    }

    /// Total quantity across every item that belongs to `key`.
    pub fn quantity_for(&self, key: &ItemKey) -> f64 {
        self.items
            .iter()
            .filter(|item| item.matches(key))
            .map(|item| item.quantity)
            .sum()
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.items.iter().any(|item| item.matches(key))
    }
}
