//! Closed inbound schemas. Unknown or missing fields are rejected at decode time;
//! the only contractual default is `quantity = 1`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceSubmission {
    pub invoice_id: String,
    pub store_id: String,
    pub date: String,
    pub invoice_type: String,
    pub items: Vec<ItemSubmission>,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemSubmission {
    pub item_id: String,
    pub item_name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    pub price_per_unit: f64,
    pub total_price: f64,
    pub expiry_date: String,
    pub is_food_item: bool,
}

fn default_quantity() -> f64 {
    1.0
}

/// Event emitted by the shelf/RFID capture adapter for a single item movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemEvent {
    pub item_id: String,
    pub item_name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    pub price_per_unit: f64,
    pub total_price: f64,
    pub expiry_date: String,
    pub store_id: String,
    pub is_food_item: bool,
    pub event_type: String,
    /// RFC 3339 capture time; its date part becomes the invoice date.
    pub timestamp: String,
}

/// Checkout batch emitted by the point-of-sale adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PosBatch {
    pub transaction_id: String,
    pub store_id: String,
    pub date: String,
    pub items: Vec<ItemSubmission>,
    pub total_amount: f64,
}
