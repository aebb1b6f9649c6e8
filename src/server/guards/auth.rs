use crate::auth::{SESSION_COOKIE, verify_password};
use crate::db::{Db, models::User, users};
use crate::error::{AppError, AppResult};
use crate::server::router::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Key, PrivateCookieJar};
use headers::{Authorization, HeaderMapExt, authorization::Basic};
use std::ops::Deref;
use tracing::{debug, warn};

/// Session key for clients that authenticate with HTTP Basic on every request.
fn basic_session_key(user_id: i64) -> String {
    format!("basic:{user_id}")
}

/// Looks up an active user by email and checks the password off the async runtime.
///
/// Unknown email, wrong password and inactive account are indistinguishable to the caller.
pub async fn check_credentials(db: &Db, email: &str, password: &str) -> AppResult<Option<User>> {
    let user = {
        let mut conn = db.acquire().await?;
        users::find_by_email(&mut conn, email).await?
    };
    let Some(user) = user else {
        return Ok(None);
    };
    let password = password.to_string();
    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("password check aborted: {e}")))?;
    Ok((valid && user.is_active.get()).then_some(user))
}

/// An authenticated, active user and the session holding their cart.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: String,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

async fn from_cookie(parts: &mut Parts, state: &AppState) -> AppResult<Option<CurrentUser>> {
    let Ok(jar) = PrivateCookieJar::<Key>::from_request_parts(parts, state).await;
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return Ok(None);
    };
    let Some(session) = state.sessions.get(&token) else {
        debug!("session cookie without live session");
        return Ok(None);
    };
    let mut conn = state.db.acquire().await?;
    match users::find_by_id(&mut conn, session.user_id).await? {
        Some(user) if user.is_active.get() => Ok(Some(CurrentUser {
            user,
            session: token,
        })),
        _ => {
            state.sessions.remove(&token);
            Ok(None)
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(current) = from_cookie(parts, state).await? {
            return Ok(current);
        }

        let basic = parts
            .headers
            .typed_get::<Authorization<Basic>>()
            .ok_or(AppError::Unauthorized)?;
        let user = from_basic(state, basic.username(), basic.password())
            .await?
            .ok_or(AppError::Unauthorized)?;
        let session = basic_session_key(user.id);
        state.sessions.attach(&session, user.id);
        Ok(CurrentUser { user, session })
    }
}

/// Resolves Basic credentials. Only full password checks count against the login limiter.
async fn from_basic(state: &AppState, email: &str, password: &str) -> AppResult<Option<User>> {
    let email = email.trim().to_lowercase();
    if let Some(user_id) = state.sessions.verified_basic(&email, password) {
        let mut conn = state.db.acquire().await?;
        if let Some(user) = users::find_by_id(&mut conn, user_id).await? {
            if user.is_active.get() && user.email.eq_ignore_ascii_case(&email) {
                return Ok(Some(user));
            }
        }
    }

    if state.login_limiter.check_key(&email).is_err() {
        warn!(email = %email, "basic auth rate limit hit");
        return Err(AppError::TooManyRequests);
    }
    let user = check_credentials(&state.db, &email, password).await?;
    if let Some(user) = &user {
        state.sessions.remember_basic(&email, password, user.id);
    }
    Ok(user)
}

macro_rules! role_guard {
    ($(#[$meta:meta])* $name:ident, $allowed:expr, $message:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(pub CurrentUser);

        impl Deref for $name {
            type Target = CurrentUser;

            fn deref(&self) -> &CurrentUser {
                &self.0
            }
        }

        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                let current = CurrentUser::from_request_parts(parts, state).await?;
                let allowed: fn(&User) -> bool = $allowed;
                if allowed(&current.user) {
                    Ok($name(current))
                } else {
                    Err(AppError::Forbidden($message))
                }
            }
        }
    };
}

role_guard!(
    /// Executives and admins: billing, customers, catalogue and payments.
    Executive,
    |u| u.is_executive() || u.is_admin(),
    "You do not have permission to access this page."
);

role_guard!(
    /// Admins only: user management and catalogue changes.
    AdminUser,
    User::is_admin,
    "Only administrators can access this page."
);

role_guard!(
    /// Staff accounts: the administrative panel.
    Staff,
    User::can_access_admin,
    "Staff access required."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_keys_cannot_collide_with_cookie_tokens() {
        // Cookie tokens are base64url and never contain ':'.
        assert_eq!(basic_session_key(4), "basic:4");
    }
}
