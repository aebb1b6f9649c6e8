use crate::db::customers::CustomerForm;
use crate::db::models::Customer;
use crate::error::AppResult;
use crate::server::guards::Executive;
use crate::server::routes::SearchQuery;
use crate::server::router::AppState;
use crate::service::customers::{self, CustomerDetail, CustomerHit, CustomerRow};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

async fn list(State(state): State<AppState>, _exec: Executive) -> AppResult<Json<Vec<CustomerRow>>> {
    Ok(Json(customers::list(&state.db).await?))
}

async fn create(
    State(state): State<AppState>,
    _exec: Executive,
    Json(form): Json<CustomerForm>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    let customer = customers::create(&state.db, form).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn detail(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
) -> AppResult<Json<CustomerDetail>> {
    Ok(Json(customers::detail(&state.db, id).await?))
}

async fn update(
    State(state): State<AppState>,
    _exec: Executive,
    Path(id): Path<i64>,
    Json(form): Json<CustomerForm>,
) -> AppResult<Json<Customer>> {
    Ok(Json(customers::update(&state.db, id, form).await?))
}

pub(crate) async fn search(
    State(state): State<AppState>,
    _exec: Executive,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<CustomerHit>>> {
    Ok(Json(customers::search(&state.db, &query.q).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers/", get(list).post(create))
        .route("/customers/search", get(search))
        .route("/customers/{id}", get(detail).put(update))
}
