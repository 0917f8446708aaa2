//! Pure validators. Callers run these before touching the store so that a
//! failure never leaves a partial write behind.

use chrono::NaiveDate;

use crate::error::{FreshLedgerError, Result};
use crate::invoice::InvoiceType;
use crate::submission::ItemSubmission;

/// Accept only `purchase` or `sales`.
pub fn validate_invoice_type(invoice_type: &str) -> Result<InvoiceType> {
    invoice_type.parse()
}

/// Reject items that are not flagged as food items or carry no positive quantity.
pub fn validate_item(item: &ItemSubmission) -> Result<()> {
    if !item.is_food_item {
        return Err(FreshLedgerError::NotFoodItem(item.item_id.clone()));
    }
    if !(item.quantity.is_finite() && item.quantity > 0.0) {
        return Err(FreshLedgerError::InvalidQuantity {
            item_id: item.item_id.clone(),
            quantity: item.quantity,
        });
    }
    Ok(())
}

/// Strictly parse `value` against `layout`.
///
/// chrono accepts unpadded fields and signed years, so the parsed date is
/// re-rendered and must reproduce the input exactly.
pub fn validate_date(value: &str, layout: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(value, layout).map_err(|e| {
        FreshLedgerError::InvalidDate {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    if date.format(layout).to_string() != value {
        return Err(FreshLedgerError::InvalidDate {
            value: value.to_string(),
            reason: format!("not in canonical {layout} form"),
        });
    }
    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LAYOUT: &str = "%Y-%m-%d";

    fn item(is_food_item: bool) -> ItemSubmission {
        ItemSubmission {
            item_id: "A".into(),
            item_name: "Apples".into(),
            quantity: 1.0,
            price_per_unit: 1.0,
            total_price: 1.0,
            expiry_date: "2025-06-01".into(),
            is_food_item,
        }
    }

    #[test]
    fn test_invoice_type() {
        assert_eq!(validate_invoice_type("purchase").unwrap(), InvoiceType::Purchase);
        assert_eq!(validate_invoice_type("sales").unwrap(), InvoiceType::Sales);
        assert!(validate_invoice_type("Sales").is_err());
        assert!(validate_invoice_type("").is_err());
    }

    #[test]
    fn test_non_food_item_rejected() {
        assert!(validate_item(&item(true)).is_ok());
        assert!(matches!(
            validate_item(&item(false)),
            Err(FreshLedgerError::NotFoodItem(id)) if id == "A"
        ));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        for quantity in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let mut bad = item(true);
            bad.quantity = quantity;
            assert!(matches!(
                validate_item(&bad),
                Err(FreshLedgerError::InvalidQuantity { .. })
            ));
        }
    }

    #[test]
    fn test_valid_date() {
        let date = validate_date("2025-02-01", LAYOUT).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
    }

    #[test]
    fn test_partial_and_malformed_dates_rejected() {
        for bad in [
            "2025-2-1",
            "2025-02",
            "2025-02-01T00:00:00",
            "2025-02-30",
            "01-02-2025",
            " 2025-02-01",
            "",
        ] {
            assert!(
                matches!(validate_date(bad, LAYOUT), Err(FreshLedgerError::InvalidDate { .. })),
                "{bad} should be rejected"
            );
        }
    }

    proptest! {
        #[test]
        fn canonical_dates_round_trip(y in 1900i32..2200, m in 1u32..=12, d in 1u32..=28) {
            let text = format!("{y:04}-{m:02}-{d:02}");
            let date = validate_date(&text, LAYOUT).unwrap();
            prop_assert_eq!(date.format(LAYOUT).to_string(), text);
        }
    }
}
