use crate::error::AppResult;
use crate::server::guards::CurrentUser;
use crate::server::router::AppState;
use crate::service::reports::{self, Dashboard};
use axum::{Json, Router, extract::State, routing::get};

async fn dashboard(State(state): State<AppState>, _user: CurrentUser) -> AppResult<Json<Dashboard>> {
    Ok(Json(reports::dashboard(&state.db).await?))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}
