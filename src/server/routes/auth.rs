use crate::auth::SESSION_COOKIE;
use crate::db::{models::User, users};
use crate::error::{AppError, AppResult};
use crate::server::guards::CurrentUser;
use crate::server::guards::auth::check_credentials;
use crate::server::router::AppState;
use axum::{Json, Router, extract::State, routing::post};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: User,
}

fn session_cookie(token: String, state: &AppState) -> Cookie<'static> {
    let max_age = i64::try_from(state.session_ttl.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(!state.insecure_cookie)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(max_age))
        .build()
}

async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(form): Json<LoginForm>,
) -> AppResult<(PrivateCookieJar, Json<LoginResponse>)> {
    let email = form.email.trim().to_lowercase();
    if state.login_limiter.check_key(&email).is_err() {
        warn!(email = %email, "login rate limit hit");
        return Err(AppError::TooManyRequests);
    }

    let user = check_credentials(&state.db, &email, &form.password)
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    {
        let mut conn = state.db.acquire().await?;
        users::touch_last_login(&mut conn, user.id).await?;
    }
    let token = state.sessions.create(user.id);
    info!(user_id = user.id, "user logged in");

    let jar = jar.add(session_cookie(token, &state));
    Ok((
        jar,
        Json(LoginResponse {
            message: format!("Welcome back, {}!", user.full_name()),
            user,
        }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Json<Value>) {
    state.sessions.remove(&current.session);
    info!(user_id = current.id(), "user logged out");
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (
        jar,
        Json(json!({ "message": "You have been logged out successfully." })),
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/", post(login))
        .route("/logout/", post(logout))
}
