use crate::db::models::{Payment, PaymentListing, Reminder};
use crate::db::patch::PaymentPatch;
use crate::db::payments::PaymentFilter;
use crate::error::AppResult;
use crate::server::guards::Executive;
use crate::server::router::AppState;
use crate::service::payments::{
    self, BulkReminderForm, BulkReminderOutcome, PaymentForm, PaymentHistory, PaymentList,
    PaymentRecorded, PendingFilter, PendingList, ReminderForm,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};

/// Open invoices awaiting payment.
async fn pending(
    State(state): State<AppState>,
    _exec: Executive,
    Query(filter): Query<PendingFilter>,
) -> AppResult<Json<PendingList>> {
    Ok(Json(payments::pending_invoices(&state.db, &filter).await?))
}

async fn all_payments(
    State(state): State<AppState>,
    _exec: Executive,
    Query(filter): Query<PaymentFilter>,
) -> AppResult<Json<PaymentList>> {
    Ok(Json(payments::list_payments(&state.db, &filter).await?))
}

async fn record_payment(
    State(state): State<AppState>,
    exec: Executive,
    Path(invoice_id): Path<i64>,
    Json(form): Json<PaymentForm>,
) -> AppResult<(StatusCode, Json<PaymentRecorded>)> {
    let recorded = payments::record_payment(&state.db, invoice_id, exec.id(), &form).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

async fn send_reminder(
    State(state): State<AppState>,
    exec: Executive,
    Path(invoice_id): Path<i64>,
    Json(form): Json<ReminderForm>,
) -> AppResult<(StatusCode, Json<Reminder>)> {
    let reminder = payments::create_reminder(&state.db, invoice_id, exec.id(), &form).await?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

async fn payment_detail(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<PaymentListing>> {
    Ok(Json(payments::payment_detail(&state.db, id).await?))
}

async fn update_payment(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
    Json(patch): Json<PaymentPatch>,
) -> AppResult<Json<Payment>> {
    Ok(Json(payments::update_payment(&state.db, id, &patch).await?))
}

async fn complete_payment(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<PaymentRecorded>> {
    Ok(Json(payments::complete_payment(&state.db, id).await?))
}

async fn cancel_payment(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<Payment>> {
    Ok(Json(payments::cancel_payment(&state.db, id).await?))
}

async fn customer_history(
    State(state): State<AppState>,
    _exec: Executive,
    Path(customer_id): Path<i64>,
) -> AppResult<Json<PaymentHistory>> {
    Ok(Json(
        payments::customer_history(&state.db, customer_id).await?,
    ))
}

async fn bulk_reminder(
    State(state): State<AppState>,
    exec: Executive,
    Json(form): Json<BulkReminderForm>,
) -> AppResult<(StatusCode, Json<BulkReminderOutcome>)> {
    let outcome = payments::bulk_reminder(&state.db, exec.id(), &form).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/", get(pending))
        .route("/payments/all", get(all_payments))
        .route("/payments/invoice/{id}/payment", post(record_payment))
        .route("/payments/invoice/{id}/reminder", post(send_reminder))
        .route(
            "/payments/payment/{id}",
            get(payment_detail).put(update_payment),
        )
        .route("/payments/payment/{id}/complete", post(complete_payment))
        .route("/payments/payment/{id}/cancel", post(cancel_payment))
        .route("/payments/customer/{id}/history", get(customer_history))
        .route("/payments/bulk-reminder", post(bulk_reminder))
}
