use crate::db::models::{Page, Product, ProductQuality, QualityListing};
use crate::db::patch::{ProductPatch, QualityPatch};
use crate::db::products::{NewProduct, NewQuality, ProductFilter};
use crate::error::AppResult;
use crate::server::guards::{AdminUser, Executive};
use crate::server::routes::{CSV_CONTENT_TYPE, SearchQuery, attachment};
use crate::server::router::AppState;
use crate::service::catalog::{self, ProductWithQualities};
use crate::service::price_list::{self, EXPORT_FILE_NAME, ImportOutcome};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use tower_http::limit::RequestBodyLimitLayer;

async fn list(
    State(state): State<AppState>,
    _exec: Executive,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Page<QualityListing>>> {
    Ok(Json(catalog::list(&state.db, &filter).await?))
}

async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(form): Json<NewProduct>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = catalog::create_product(&state.db, &form).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn detail(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<ProductWithQualities>> {
    Ok(Json(catalog::detail(&state.db, id).await?))
}

async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(patch): Json<ProductPatch>,
) -> AppResult<Json<Product>> {
    Ok(Json(catalog::update_product(&state.db, id, &patch).await?))
}

async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    catalog::delete_product(&state.db, id).await?;
    Ok(Json(json!({ "message": "Product deleted successfully." })))
}

async fn add_quality(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(product_id): Path<i64>,
    Json(form): Json<NewQuality>,
) -> AppResult<(StatusCode, Json<ProductQuality>)> {
    let quality = catalog::add_quality(&state.db, product_id, &form).await?;
    Ok((StatusCode::CREATED, Json(quality)))
}

async fn update_quality(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(patch): Json<QualityPatch>,
) -> AppResult<Json<ProductQuality>> {
    Ok(Json(catalog::update_quality(&state.db, id, &patch).await?))
}

async fn delete_quality(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    catalog::delete_quality(&state.db, id).await?;
    Ok(Json(json!({ "message": "Quality variant deleted successfully." })))
}

async fn search(
    State(state): State<AppState>,
    _exec: Executive,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<ProductWithQualities>>> {
    Ok(Json(catalog::search(&state.db, &query.q, 1).await?))
}

#[derive(Debug, Default, Deserialize)]
struct UploadQuery {
    #[serde(default)]
    file_name: String,
}

/// Raw CSV body; the original file name travels in `?file_name=`.
async fn upload_price_list(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<ImportOutcome>)> {
    let outcome =
        price_list::import(&state.db, &query.file_name, Some(admin.id()), &body).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn price_list_template(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Response> {
    let body = price_list::export(&state.db).await?;
    Ok(attachment(CSV_CONTENT_TYPE, EXPORT_FILE_NAME, body))
}

pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/products/", get(list).post(create))
        .route("/products/search", get(search))
        .route("/products/{id}", get(detail).put(update).delete(delete))
        .route("/products/{id}/qualities", post(add_quality))
        .route(
            "/products/qualities/{id}",
            put(update_quality).delete(delete_quality),
        )
        .route(
            "/products/price-list/upload",
            post(upload_price_list)
                .layer::<_, Infallible>(DefaultBodyLimit::disable())
                .layer::<_, Infallible>(RequestBodyLimitLayer::new(upload_limit)),
        )
        .route("/products/price-list/template", get(price_list_template))
}
