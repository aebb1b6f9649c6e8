use crate::db::models::User;
use crate::db::patch::UserPatch;
use crate::error::AppResult;
use crate::server::guards::AdminUser;
use crate::server::router::AppState;
use crate::service::users::{self, ActiveToggled, PasswordReset, UserForm};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};

async fn list(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Vec<User>>> {
    Ok(Json(users::list(&state.db).await?))
}

async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(form): Json<UserForm>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = users::create(&state.db, &form).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(patch): Json<UserPatch>,
) -> AppResult<Json<User>> {
    Ok(Json(users::update(&state.db, &state.sessions, id, &patch).await?))
}

async fn reset_password(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<PasswordReset>> {
    Ok(Json(
        users::reset_password(&state.db, &state.sessions, id).await?,
    ))
}

async fn toggle_active(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ActiveToggled>> {
    Ok(Json(
        users::toggle_active(&state.db, &state.sessions, id).await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/", get(list).post(create))
        .route("/users/{id}", put(update))
        .route("/users/{id}/reset-password", post(reset_password))
        .route("/users/{id}/toggle-active", post(toggle_active))
}
