use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use freshledger_index::{InvoiceReceipt, StoreReward};
use freshledger_invoice::{submission_from_item_event, submission_from_pos_batch};
use freshledger_types::{
    ErrorKind, FreshLedgerError, Invoice, InvoiceSubmission, ItemEvent, ItemKey, PosBatch,
    ProvenanceRecord, StoreQuality,
};

use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/invoice", post(create_invoice))
        .route("/api/invoices", get(list_invoices))
        .route(
            "/api/invoices/{invoice_id}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/api/invoices/{invoice_id}/history", get(invoice_history))
        .route("/api/events", post(ingest_item_event))
        .route("/api/pos", post(ingest_pos_batch))
        .route("/api/purchases/{item_id}", get(total_purchases))
        .route("/api/sales/{item_id}", get(total_sales))
        .route("/api/indices/{store_id}", get(store_indices))
        .route("/api/invalidate/{item_id}", post(invalidate_item))
        .route("/api/rewards/{store_id}", get(store_reward))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(err: FreshLedgerError) -> (StatusCode, String) {
    let status = match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound | ErrorKind::NoData => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}

async fn health() -> &'static str {
    "ok"
}

async fn create_invoice(
    State(state): State<AppState>,
    Json(submission): Json<InvoiceSubmission>,
) -> Result<(StatusCode, Json<InvoiceReceipt>), (StatusCode, String)> {
    let receipt = state
        .service
        .create_or_update_invoice(submission)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn ingest_item_event(
    State(state): State<AppState>,
    Json(event): Json<ItemEvent>,
) -> Result<(StatusCode, Json<InvoiceReceipt>), (StatusCode, String)> {
    let submission = submission_from_item_event(event).map_err(error_response)?;
    create_invoice(State(state), Json(submission)).await
}

async fn ingest_pos_batch(
    State(state): State<AppState>,
    Json(batch): Json<PosBatch>,
) -> Result<(StatusCode, Json<InvoiceReceipt>), (StatusCode, String)> {
    create_invoice(State(state), Json(submission_from_pos_batch(batch))).await
}

#[derive(Deserialize)]
struct StoreQuery {
    store_id: String,
}

async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<StoreQuery>,
) -> ApiResult<Vec<Invoice>> {
    state
        .service
        .repository()
        .list_invoices(&query.store_id)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> ApiResult<Invoice> {
    state
        .service
        .repository()
        .get_invoice(&invoice_id)
        .await
        .map_err(error_response)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Invoice not found".to_string()))
}

async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(invoice): Json<Invoice>,
) -> ApiResult<Invoice> {
    state
        .service
        .repository()
        .update_invoice(&invoice_id, invoice)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> ApiResult<Invoice> {
    state
        .service
        .repository()
        .delete_invoice(&invoice_id)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn invoice_history(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> ApiResult<Vec<ProvenanceRecord>> {
    state
        .service
        .repository()
        .history(&invoice_id)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
struct ItemKeyQuery {
    store_id: String,
    expiry_date: String,
}

#[derive(Serialize)]
struct TotalResponse {
    store_id: String,
    item_id: String,
    expiry_date: String,
    total: f64,
}

async fn total_purchases(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(query): Query<ItemKeyQuery>,
) -> ApiResult<TotalResponse> {
    let key = ItemKey::new(item_id, query.expiry_date);
    let total = state
        .service
        .get_total_purchases(&query.store_id, &key)
        .await
        .map_err(error_response)?;
    Ok(Json(TotalResponse {
        store_id: query.store_id,
        item_id: key.item_id,
        expiry_date: key.expiry_date,
        total,
    }))
}

async fn total_sales(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(query): Query<ItemKeyQuery>,
) -> ApiResult<TotalResponse> {
    let key = ItemKey::new(item_id, query.expiry_date);
    let total = state
        .service
        .get_total_sales(&query.store_id, &key)
        .await
        .map_err(error_response)?;
    Ok(Json(TotalResponse {
        store_id: query.store_id,
        item_id: key.item_id,
        expiry_date: key.expiry_date,
        total,
    }))
}

async fn store_indices(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> ApiResult<StoreQuality> {
    state
        .service
        .recompute_store_indices(&store_id)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct InvalidateRequest {
    store_id: String,
    expiry_date: String,
}

#[derive(Serialize)]
struct InvalidateResponse {
    store_id: String,
    item_id: String,
    expiry_date: String,
    removed: usize,
}

async fn invalidate_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(req): Json<InvalidateRequest>,
) -> ApiResult<InvalidateResponse> {
    let key = ItemKey::new(item_id, req.expiry_date);
    let removed = state
        .service
        .invalidate_transactions(&req.store_id, &key)
        .await
        .map_err(error_response)?;
    Ok(Json(InvalidateResponse {
        store_id: req.store_id,
        item_id: key.item_id,
        expiry_date: key.expiry_date,
        removed,
    }))
}

async fn store_reward(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> ApiResult<StoreReward> {
    state
        .service
        .reward_for_store(&store_id)
        .await
        .map(Json)
        .map_err(error_response)
}
