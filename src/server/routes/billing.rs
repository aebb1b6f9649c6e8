use crate::db::customers::CustomerForm;
use crate::db::invoices::InvoiceFilter;
use crate::db::models::{Invoice, InvoiceItem};
use crate::db::patch::InvoicePatch;
use crate::domain::{PriceTier, Quantity};
use crate::error::AppResult;
use crate::server::guards::Executive;
use crate::server::routes::{SearchQuery, TEXT_CONTENT_TYPE, attachment, customers};
use crate::server::router::AppState;
use crate::service::billing::{
    self, AddToCart, CartAdded, CartView, CheckoutOutcome, CheckoutRequest, DraftInvoice,
    InvoiceDetail, InvoiceList, ItemForm,
};
use crate::service::catalog::{self, BILLING_MIN_QUERY, ProductWithQualities, TierPrice};
use crate::service::customers::{self as customer_service, QuickCreate};
use crate::service::invoice_print;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// Cart ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CartCount {
    message: &'static str,
    cart_count: usize,
}

#[derive(Debug, Deserialize)]
struct QuantityUpdate {
    index: usize,
    quantity: Quantity,
}

#[derive(Debug, Deserialize)]
struct QualityUpdate {
    index: usize,
    quality_id: i64,
}

#[derive(Debug, Deserialize)]
struct LineIndex {
    index: usize,
}

async fn view_cart(State(state): State<AppState>, exec: Executive) -> AppResult<Json<CartView>> {
    Ok(Json(
        billing::view_cart(&state.db, &state.sessions, &exec.session).await?,
    ))
}

async fn add_to_cart(
    State(state): State<AppState>,
    exec: Executive,
    Json(req): Json<AddToCart>,
) -> AppResult<Json<CartAdded>> {
    Ok(Json(
        billing::add_to_cart(&state.db, &state.sessions, &exec.session, &req).await?,
    ))
}

async fn update_quantity(
    State(state): State<AppState>,
    exec: Executive,
    Json(req): Json<QuantityUpdate>,
) -> AppResult<Json<CartCount>> {
    let cart_count =
        billing::update_cart_quantity(&state.sessions, &exec.session, req.index, req.quantity)?;
    Ok(Json(CartCount {
        message: "Cart updated.",
        cart_count,
    }))
}

async fn update_quality(
    State(state): State<AppState>,
    exec: Executive,
    Json(req): Json<QualityUpdate>,
) -> AppResult<Json<CartCount>> {
    let cart_count = billing::update_cart_quality(
        &state.db,
        &state.sessions,
        &exec.session,
        req.index,
        req.quality_id,
    )
    .await?;
    Ok(Json(CartCount {
        message: "Cart updated.",
        cart_count,
    }))
}

async fn remove_line(
    State(state): State<AppState>,
    exec: Executive,
    Json(req): Json<LineIndex>,
) -> AppResult<Json<CartCount>> {
    let cart_count = billing::remove_from_cart(&state.sessions, &exec.session, req.index)?;
    Ok(Json(CartCount {
        message: "Item removed from cart.",
        cart_count,
    }))
}

async fn clear_cart(State(state): State<AppState>, exec: Executive) -> AppResult<Json<CartCount>> {
    billing::clear_cart(&state.sessions, &exec.session)?;
    Ok(Json(CartCount {
        message: "Cart cleared.",
        cart_count: 0,
    }))
}

async fn checkout(
    State(state): State<AppState>,
    exec: Executive,
    Json(req): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<CheckoutOutcome>)> {
    let outcome =
        billing::checkout(&state.db, &state.sessions, &exec.session, exec.id(), &req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// Invoices -----------------------------------------------------------------

async fn list_invoices(
    State(state): State<AppState>,
    _exec: Executive,
    Query(filter): Query<InvoiceFilter>,
) -> AppResult<Json<InvoiceList>> {
    Ok(Json(billing::list_invoices(&state.db, &filter).await?))
}

async fn create_invoice(
    State(state): State<AppState>,
    exec: Executive,
    Json(req): Json<DraftInvoice>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    let invoice = billing::create_draft(&state.db, exec.id(), &req).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn invoice_detail(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<InvoiceDetail>> {
    Ok(Json(billing::invoice_detail(&state.db, id).await?))
}

async fn update_invoice(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
    Json(patch): Json<InvoicePatch>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(billing::update_draft(&state.db, id, &patch).await?))
}

async fn delete_invoice(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    billing::delete_invoice(&state.db, id).await?;
    Ok(Json(json!({ "message": "Invoice deleted successfully." })))
}

async fn issue(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(billing::issue(&state.db, id).await?))
}

async fn cancel(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(billing::cancel(&state.db, id).await?))
}

async fn mark_paid(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(billing::mark_paid(&state.db, id).await?))
}

#[derive(Debug, Deserialize)]
struct DueDate {
    due_date: NaiveDate,
}

async fn set_due_date(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
    Json(req): Json<DueDate>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(billing::set_due_date(&state.db, id, req.due_date).await?))
}

async fn print_invoice(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let (file_name, text) = invoice_print::print(&state.db, id).await?;
    Ok(attachment(TEXT_CONTENT_TYPE, &file_name, text.into_bytes()))
}

async fn add_item(
    State(state): State<AppState>,
    _exec: Executive,
    Path(invoice_id): Path<i64>,
    Json(form): Json<ItemForm>,
) -> AppResult<(StatusCode, Json<InvoiceItem>)> {
    let item = billing::add_item(&state.db, invoice_id, &form).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<AppState>,
    _exec: Executive,
    Path(item_id): Path<i64>,
    Json(form): Json<ItemForm>,
) -> AppResult<Json<InvoiceItem>> {
    Ok(Json(billing::update_item(&state.db, item_id, &form).await?))
}

async fn delete_item(
    State(state): State<AppState>,
    _exec: Executive,
    Path(item_id): Path<i64>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(billing::delete_item(&state.db, item_id).await?))
}

// Billing screen APIs ------------------------------------------------------

async fn quick_create_customer(
    State(state): State<AppState>,
    _exec: Executive,
    Json(form): Json<CustomerForm>,
) -> AppResult<Response> {
    let outcome = customer_service::quick_create(&state.db, form).await?;
    let status = match outcome {
        QuickCreate::Created(_) => StatusCode::CREATED,
        QuickCreate::Duplicate { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)).into_response())
}

async fn search_products(
    State(state): State<AppState>,
    _exec: Executive,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<ProductWithQualities>>> {
    Ok(Json(
        catalog::search(&state.db, &query.q, BILLING_MIN_QUERY).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct PriceQuery {
    quality_id: i64,
    #[serde(default)]
    customer_type: String,
}

async fn quality_price(
    State(state): State<AppState>,
    _exec: Executive,
    Query(query): Query<PriceQuery>,
) -> AppResult<Json<TierPrice>> {
    let tier = PriceTier::parse_lenient(&query.customer_type);
    Ok(Json(catalog::price_for(&state.db, query.quality_id, tier).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/billing/cart", get(view_cart).delete(clear_cart))
        .route("/billing/cart/add", post(add_to_cart))
        .route("/billing/cart/update", post(update_quantity))
        .route("/billing/cart/update-quality", post(update_quality))
        .route("/billing/cart/remove", post(remove_line))
        .route("/billing/checkout", post(checkout))
        .route("/billing/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/billing/invoices/{id}",
            get(invoice_detail).put(update_invoice).delete(delete_invoice),
        )
        .route("/billing/invoices/{id}/issue", post(issue))
        .route("/billing/invoices/{id}/cancel", post(cancel))
        .route("/billing/invoices/{id}/mark-paid", post(mark_paid))
        .route("/billing/invoices/{id}/due-date", post(set_due_date))
        .route("/billing/invoices/{id}/print", get(print_invoice))
        .route("/billing/invoices/{id}/items", post(add_item))
        .route(
            "/billing/invoice-items/{id}",
            put(update_item).delete(delete_item),
        )
        .route("/billing/api/customers/search", get(customers::search))
        .route("/billing/api/customers", post(quick_create_customer))
        .route("/billing/api/products/search", get(search_products))
        .route("/billing/api/product-quality/price", get(quality_price))
}
