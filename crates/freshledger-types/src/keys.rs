//! Ledger key derivation. Every key except the live invoice key is scoped by store.

use crate::invoice::ItemKey;

pub fn invoice_key(invoice_id: &str) -> String {
    invoice_id.to_string()
}

pub fn update_provenance_prefix(invoice_id: &str) -> String {
    format!("{invoice_id}_provenance")
}

pub fn delete_provenance_prefix(store_id: &str, invoice_id: &str) -> String {
    format!("DELETED_{store_id}_{invoice_id}")
}

pub fn invalid_log_prefix(store_id: &str, key: &ItemKey, invoice_id: &str) -> String {
    format!(
        "INVALID_{store_id}_{}_{}_{invoice_id}",
        key.item_id, key.expiry_date
    )
}

pub fn transaction_validity_key(store_id: &str, key: &ItemKey) -> String {
    format!(
        "TRANSACTION_VALIDITY_{store_id}_{}_{}",
        key.item_id, key.expiry_date
    )
}

pub fn wastage_index_key(store_id: &str, key: &ItemKey) -> String {
    format!("WASTAGE_INDEX_{store_id}_{}_{}", key.item_id, key.expiry_date)
}

pub fn quality_index_key(store_id: &str, key: &ItemKey) -> String {
    format!("QUALITY_INDEX_{store_id}_{}_{}", key.item_id, key.expiry_date)
}

/// Append a stamp to a prefix: `{prefix}_{stamp}`.
pub fn stamped(prefix: &str, stamp: &str) -> String {
    format!("{prefix}_{stamp}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        let key = ItemKey::new("A", "2025-06-01");
        assert_eq!(
            transaction_validity_key("S1", &key),
            "TRANSACTION_VALIDITY_S1_A_2025-06-01"
        );
        assert_eq!(quality_index_key("S1", &key), "QUALITY_INDEX_S1_A_2025-06-01");
        assert_eq!(
            stamped(&update_provenance_prefix("P1"), "0001-000000"),
            "P1_provenance_0001-000000"
        );
        assert_eq!(delete_provenance_prefix("S1", "P1"), "DELETED_S1_P1");
        assert_eq!(invalid_log_prefix("S1", &key, "P1"), "INVALID_S1_A_2025-06-01_P1");
    }
}
