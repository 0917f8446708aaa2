//! Typed selectors for the record shapes this system stores.

use freshledger_types::{InvoiceType, ItemKey};

use crate::selector::Selector;

/// Live invoices of a store. Provenance snapshots and invalidation logs
/// nest the invoice in a string field and never match.
pub fn store_invoices(store_id: &str) -> Selector {
    Selector::new()
        .eq("store_id", store_id)
        .exists("items")
        .exists("transaction_hash")
}

/// Live invoices of a store holding at least one item of `key`, optionally
/// restricted to one direction.
pub fn item_invoices(store_id: &str, key: &ItemKey, invoice_type: Option<InvoiceType>) -> Selector {
    let selector = Selector::new().eq("store_id", store_id).elem_match(
        "items",
        Selector::new()
            .eq("item_id", key.item_id.as_str())
            .eq("expiry_date", key.expiry_date.as_str()),
    );
    match invoice_type {
        Some(invoice_type) => selector.eq("invoice_type", invoice_type.as_str()),
        None => selector.exists("invoice_type"),
    }
}

/// Provenance snapshots taken for one invoice.
pub fn invoice_provenance(invoice_id: &str) -> Selector {
    Selector::new()
        .eq("invoice_id", invoice_id)
        .exists("previous_state")
}

pub fn quality_at_most(bound: f64) -> Selector {
    Selector::new().lte("quality_index", bound)
}

pub fn quality_at_least(bound: f64) -> Selector {
    Selector::new().gte("quality_index", bound)
}
