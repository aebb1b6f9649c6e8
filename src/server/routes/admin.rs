//! Read and delete access to every registered table, for staff accounts.

use crate::db::admin::{self, AdminModel, REGISTRY};
use crate::db::models::Page;
use crate::error::{AppError, AppResult};
use crate::server::guards::Staff;
use crate::server::router::AppState;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

const PER_PAGE: i64 = 25;

#[derive(Debug, Serialize)]
struct ModelSummary {
    #[serde(flatten)]
    model: &'static AdminModel,
    count: i64,
}

#[derive(Debug, Serialize)]
struct AdminIndex {
    user: String,
    models: Vec<ModelSummary>,
}

fn model(name: &str) -> AppResult<&'static AdminModel> {
    admin::lookup(name).ok_or(AppError::NotFound("Model"))
}

async fn index(State(state): State<AppState>, staff: Staff) -> AppResult<Json<AdminIndex>> {
    let mut conn = state.db.acquire().await?;
    let mut models = Vec::with_capacity(REGISTRY.len());
    for model in REGISTRY {
        models.push(ModelSummary {
            model,
            count: model.count(&mut conn).await?,
        });
    }
    Ok(Json(AdminIndex {
        user: staff.user.email.clone(),
        models,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    _staff: Staff,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<Value>>> {
    let model = model(&name)?;
    let mut conn = state.db.acquire().await?;
    let total = model.count(&mut conn).await?;
    let (page, offset) = Page::<Value>::bounds(query.page, PER_PAGE, total);
    let items = model.list(&mut conn, PER_PAGE, offset).await?;
    Ok(Json(Page::new(items, page, PER_PAGE, total)))
}

async fn detail(
    State(state): State<AppState>,
    _staff: Staff,
    Path((name, id)): Path<(String, i64)>,
) -> AppResult<Json<Value>> {
    let model = model(&name)?;
    let mut conn = state.db.acquire().await?;
    model
        .get(&mut conn, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Record"))
}

async fn delete(
    State(state): State<AppState>,
    staff: Staff,
    Path((name, id)): Path<(String, i64)>,
) -> AppResult<Json<Value>> {
    let model = model(&name)?;
    let mut conn = state.db.acquire().await?;
    if !model.delete(&mut conn, id).await? {
        return Err(AppError::NotFound("Record"));
    }
    info!(model = model.name, id, by = staff.id(), "admin deleted record");
    Ok(Json(json!({
        "message": format!("The {} record {id} was deleted successfully.", model.label)
    })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/", get(index))
        .route("/admin/{model}/", get(list))
        .route("/admin/{model}/{id}", get(detail).delete(delete))
}
