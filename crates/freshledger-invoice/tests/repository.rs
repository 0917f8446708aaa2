use std::sync::Arc;

use async_trait::async_trait;
use freshledger_invoice::InvoiceRepository;
use freshledger_ledger::{InMemoryLedgerStore, LedgerStore, QueryResults, Selector};
use freshledger_types::*;

fn item(item_id: &str, expiry: &str, quantity: f64) -> ItemSubmission {
    ItemSubmission {
        item_id: item_id.into(),
        item_name: format!("item {item_id}"),
        quantity,
        price_per_unit: 1.0,
        total_price: quantity,
        expiry_date: expiry.into(),
        is_food_item: true,
    }
}

fn submission(id: &str, invoice_type: &str, date: &str, items: Vec<ItemSubmission>) -> InvoiceSubmission {
    InvoiceSubmission {
        invoice_id: id.into(),
        store_id: "S1".into(),
        date: date.into(),
        invoice_type: invoice_type.into(),
        total_amount: items.iter().map(|i| i.total_price).sum(),
        items,
    }
}

fn repository() -> (InMemoryLedgerStore, InvoiceRepository) {
    let store = InMemoryLedgerStore::new();
    let repo = InvoiceRepository::new(Arc::new(store.clone()), LedgerConfig::default());
    (store, repo)
}

#[tokio::test]
async fn test_create_stamps_hash_and_item_types() {
    let (_store, repo) = repository();
    let invoice = repo
        .create_invoice(submission("P1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 10.0)]))
        .await
        .unwrap();

    assert_eq!(invoice.transaction_hash, invoice.compute_hash());
    assert!(invoice.prev_block_hash.is_none());
    assert!(!invoice.timestamp.is_empty());
    assert_eq!(invoice.items[0].invoice_type, InvoiceType::Purchase);

    let stored = repo.get_invoice("P1").await.unwrap().unwrap();
    assert_eq!(stored, invoice);
}

/// Creation is strict; upsert is a separate operation.
#[tokio::test]
async fn test_create_is_strict() {
    let (_store, repo) = repository();
    let sub = submission("P1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 10.0)]);
    repo.create_invoice(sub.clone()).await.unwrap();

    let err = repo.create_invoice(sub).await.unwrap_err();
    assert!(matches!(err, FreshLedgerError::DuplicateInvoice(id) if id == "P1"));
}

#[tokio::test]
async fn test_invoice_dated_after_expiry_writes_nothing() {
    let (store, repo) = repository();
    let err = repo
        .create_invoice(submission(
            "P1",
            "purchase",
            "2025-02-01",
            vec![item("A", "2025-06-01", 1.0), item("B", "2025-01-01", 1.0)],
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FreshLedgerError::ExpiredItem { ref item_id, .. } if item_id == "B"
    ));
    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_sold_on_expiry_day_is_accepted() {
    let (_store, repo) = repository();
    repo.create_invoice(submission("S1", "sales", "2025-06-01", vec![item("A", "2025-06-01", 1.0)]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_validation_failures_write_nothing() {
    let (store, repo) = repository();

    let err = repo
        .create_invoice(submission("X1", "refund", "2025-01-01", vec![item("A", "2025-06-01", 1.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, FreshLedgerError::InvalidInvoiceType(_)));

    let mut non_food = item("SOAP", "2026-01-01", 1.0);
    non_food.is_food_item = false;
    let err = repo
        .create_invoice(submission("X2", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 1.0), non_food]))
        .await
        .unwrap_err();
    assert!(matches!(err, FreshLedgerError::NotFoodItem(id) if id == "SOAP"));

    let err = repo
        .create_invoice(submission("X3", "purchase", "2025/01/01", vec![item("A", "2025-06-01", 1.0)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = repo
        .create_invoice(submission("X4", "purchase", "2025-01-01", vec![item("A", "2025-6-1", 1.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, FreshLedgerError::InvalidDate { .. }));

    assert!(store.is_empty());
}

#[tokio::test]
async fn test_non_positive_quantity_writes_nothing() {
    let (store, repo) = repository();
    for quantity in [0.0, -5.0] {
        let err = repo
            .upsert_invoice(submission(
                "X5",
                "purchase",
                "2025-01-01",
                vec![item("A", "2025-06-01", 1.0), item("B", "2025-06-01", quantity)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FreshLedgerError::InvalidQuantity { ref item_id, .. } if item_id == "B"
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_update_snapshots_previous_bytes_once() {
    let (store, repo) = repository();
    let original = repo
        .create_invoice(submission("P1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 10.0)]))
        .await
        .unwrap();
    let before = store.get("P1").await.unwrap().unwrap();

    let mut changed = original.clone();
    changed.items[0].quantity = 8.0;
    let updated = repo.update_invoice("P1", changed).await.unwrap();

    assert_eq!(updated.prev_block_hash.as_deref(), Some(original.transaction_hash.as_str()));
    assert_eq!(updated.items[0].quantity, 8.0);

    let snapshots = store.keys_with_prefix("P1_provenance_");
    assert_eq!(snapshots.len(), 1);
    let history = repo.history("P1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_bytes(), before.as_slice());
}

#[tokio::test]
async fn test_update_missing_or_mismatched() {
    let (store, repo) = repository();
    let invoice = repo
        .prepare(submission("P1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 1.0)]))
        .unwrap();

    let err = repo.update_invoice("P1", invoice.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = repo.update_invoice("P2", invoice).await.unwrap_err();
    assert!(matches!(err, FreshLedgerError::InvoiceIdMismatch { .. }));
    assert!(store.is_empty());
}

/// A bare update is a replace: dates are not re-checked against expiry.
#[tokio::test]
async fn test_update_does_not_revalidate() {
    let (_store, repo) = repository();
    let mut invoice = repo
        .create_invoice(submission("S2", "sales", "2024-06-01", vec![item("B", "2025-01-01", 3.0)]))
        .await
        .unwrap();
    invoice.date = "2025-02-01".into();
    let updated = repo.update_invoice("S2", invoice).await.unwrap();
    assert_eq!(updated.date, "2025-02-01");
}

#[tokio::test]
async fn test_delete_keeps_provenance() {
    let (store, repo) = repository();
    repo.create_invoice(submission("P1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 10.0)]))
        .await
        .unwrap();
    let before = store.get("P1").await.unwrap().unwrap();

    let removed = repo.delete_invoice("P1").await.unwrap();
    assert_eq!(removed.invoice_id, "P1");
    assert!(store.get("P1").await.unwrap().is_none());
    assert!(repo.get_invoice("P1").await.unwrap().is_none());

    let deleted = store.keys_with_prefix("DELETED_S1_P1_");
    assert_eq!(deleted.len(), 1);
    let history = repo.history("P1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_bytes(), before.as_slice());

    let err = repo.delete_invoice("P1").await.unwrap_err();
    assert!(matches!(err, FreshLedgerError::InvoiceNotFound(_)));
}

#[tokio::test]
async fn test_recreate_and_delete_twice_keeps_both_snapshots() {
    let (store, repo) = repository();
    let sub = submission("P1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 1.0)]);
    repo.create_invoice(sub.clone()).await.unwrap();
    repo.delete_invoice("P1").await.unwrap();
    repo.create_invoice(sub).await.unwrap();
    repo.delete_invoice("P1").await.unwrap();

    assert_eq!(store.keys_with_prefix("DELETED_S1_P1_").len(), 2);
}

#[tokio::test]
async fn test_upsert_links_to_previous_hash() {
    let (store, repo) = repository();
    let first = repo
        .upsert_invoice(submission("P1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 1.0)]))
        .await
        .unwrap();
    assert!(first.prev_block_hash.is_none());

    let second = repo
        .upsert_invoice(submission("P1", "purchase", "2025-01-02", vec![item("A", "2025-06-01", 2.0)]))
        .await
        .unwrap();
    assert_eq!(second.prev_block_hash, Some(first.transaction_hash));
    assert_eq!(store.keys_with_prefix("P1_provenance_").len(), 1);
}

#[tokio::test]
async fn test_other_store_cannot_replace_invoice() {
    let (store, repo) = repository();
    let original = repo
        .create_invoice(submission("INV-1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 10.0)]))
        .await
        .unwrap();

    let mut foreign = submission("INV-1", "purchase", "2025-01-02", vec![item("A", "2025-06-01", 3.0)]);
    foreign.store_id = "S2".into();
    let err = repo.upsert_invoice(foreign.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        FreshLedgerError::InvoiceOwnedByOtherStore { ref owner, ref requested, .. }
            if owner == "S1" && requested == "S2"
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let mut moved = original.clone();
    moved.store_id = "S2".into();
    let err = repo.update_invoice("INV-1", moved).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(repo.get_invoice("INV-1").await.unwrap(), Some(original));
    assert!(store.keys_with_prefix("INV-1_provenance_").is_empty());
    assert!(repo.list_invoices("S2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_invoices_only_live_records_of_store() {
    let (_store, repo) = repository();
    repo.create_invoice(submission("P1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 1.0)]))
        .await
        .unwrap();
    repo.create_invoice(submission("P2", "purchase", "2025-01-01", vec![item("B", "2025-06-01", 1.0)]))
        .await
        .unwrap();
    let mut other = submission("Q1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 1.0)]);
    other.store_id = "S2".into();
    repo.create_invoice(other).await.unwrap();
    repo.delete_invoice("P2").await.unwrap();

    let invoices = repo.list_invoices("S1").await.unwrap();
    let ids: Vec<&str> = invoices.iter().map(|i| i.invoice_id.as_str()).collect();
    assert_eq!(ids, vec!["P1"]);
}

struct UnavailableStore;

#[async_trait]
impl LedgerStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(FreshLedgerError::Store("peer unavailable".into()))
    }

    async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
        Err(FreshLedgerError::Store("peer unavailable".into()))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(FreshLedgerError::Store("peer unavailable".into()))
    }

    async fn query(&self, _selector: &Selector) -> Result<QueryResults> {
        Err(FreshLedgerError::Store("peer unavailable".into()))
    }
}

#[tokio::test]
async fn test_store_errors_propagate() {
    let repo = InvoiceRepository::new(Arc::new(UnavailableStore), LedgerConfig::default());
    let err = repo
        .create_invoice(submission("P1", "purchase", "2025-01-01", vec![item("A", "2025-06-01", 1.0)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);

    let err = repo.delete_invoice("P1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
}
