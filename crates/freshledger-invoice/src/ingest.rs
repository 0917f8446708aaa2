//! Translation of upstream capture/POS payloads into invoice submissions.

use chrono::DateTime;

use freshledger_types::{
    FreshLedgerError, InvoiceSubmission, InvoiceType, ItemEvent, ItemSubmission, PosBatch, Result,
};

/// Map a capture adapter event type onto an invoice direction.
pub fn event_invoice_type(event_type: &str) -> Result<InvoiceType> {
    match event_type.to_ascii_lowercase().as_str() {
        "purchase" | "received" => Ok(InvoiceType::Purchase),
        "sales" | "sale" | "sold" => Ok(InvoiceType::Sales),
        _ => Err(FreshLedgerError::InvalidInvoiceType(event_type.to_string())),
    }
}

/// A single captured item movement becomes a one-line invoice dated on the
/// capture day.
pub fn submission_from_item_event(event: ItemEvent) -> Result<InvoiceSubmission> {
    let invoice_type = event_invoice_type(&event.event_type)?;
    let captured_at =
        DateTime::parse_from_rfc3339(&event.timestamp).map_err(|e| FreshLedgerError::InvalidDate {
            value: event.timestamp.clone(),
            reason: e.to_string(),
        })?;
    let date = captured_at.date_naive().format("%Y-%m-%d").to_string();

    Ok(InvoiceSubmission {
        invoice_id: format!(
            "EVT_{}_{}_{}",
            event.store_id,
            event.item_id,
            captured_at.timestamp_millis()
        ),
        store_id: event.store_id,
        date,
        invoice_type: invoice_type.to_string(),
        total_amount: event.total_price,
        items: vec![ItemSubmission {
            item_id: event.item_id,
            item_name: event.item_name,
            quantity: event.quantity,
            price_per_unit: event.price_per_unit,
            total_price: event.total_price,
            expiry_date: event.expiry_date,
            is_food_item: event.is_food_item,
        }],
    })
}

/// A checkout batch is a sales invoice keyed by the POS transaction id.
pub fn submission_from_pos_batch(batch: PosBatch) -> InvoiceSubmission {
    InvoiceSubmission {
        invoice_id: batch.transaction_id,
        store_id: batch.store_id,
        date: batch.date,
        invoice_type: InvoiceType::Sales.to_string(),
        items: batch.items,
        total_amount: batch.total_amount,
    }
}
