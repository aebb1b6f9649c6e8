use crate::auth::{self, SessionStore, hash_password};
use crate::db::Db;
use crate::db::models::User;
use crate::db::patch::UserPatch;
use crate::db::users::{self, NewUser};
use crate::domain::Role;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const RESET_PASSWORD_LEN: usize = 12;

pub async fn list(db: &Db) -> AppResult<Vec<User>> {
    let mut conn = db.acquire().await?;
    Ok(users::list(&mut conn).await?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserForm {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
    pub password1: String,
    pub password2: String,
}

/// Creates an active account. Admins also get staff access to the admin panel.
pub async fn create(db: &Db, form: &UserForm) -> AppResult<User> {
    let email = form.email.trim();
    if !auth::looks_like_email(email) {
        return Err(AppError::validation("Enter a valid email address."));
    }
    auth::validate_new_password(&form.password1, &form.password2).map_err(AppError::Validation)?;

    let mut conn = db.acquire().await?;
    if users::email_taken(&mut conn, email, None).await? {
        return Err(AppError::conflict("User with this Email already exists."));
    }
    let password_hash =
        hash_password(&form.password1).map_err(|e| AppError::Internal(e.to_string()))?;
    let admin = form.role == Role::Admin;
    let id = users::insert(
        &mut conn,
        &NewUser {
            email,
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            role: form.role,
            is_staff: admin,
            is_superuser: false,
            password_hash: &password_hash,
        },
    )
    .await?;
    info!(user_id = id, role = %form.role, "user created");
    users::find_by_id(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Applies an edit. Deactivation also ends the user's sessions.
pub async fn update(db: &Db, sessions: &SessionStore, id: i64, patch: &UserPatch) -> AppResult<User> {
    let mut conn = db.acquire().await?;
    if let Some(email) = &patch.email {
        if !auth::looks_like_email(email) {
            return Err(AppError::validation("Enter a valid email address."));
        }
        if users::email_taken(&mut conn, email, Some(id)).await? {
            return Err(AppError::conflict("User with this Email already exists."));
        }
    }
    if !patch.apply(&mut conn, id).await? {
        return Err(AppError::NotFound("User"));
    }
    if patch.is_active == Some(false) {
        sessions.remove_user(id);
    }
    users::find_by_id(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordReset {
    pub message: String,
    pub new_password: String,
}

/// Replaces the password with a random one and signs the user out everywhere.
pub async fn reset_password(db: &Db, sessions: &SessionStore, id: i64) -> AppResult<PasswordReset> {
    let mut conn = db.acquire().await?;
    let user = users::find_by_id(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let new_password = auth::generate_password(RESET_PASSWORD_LEN);
    let hash = hash_password(&new_password).map_err(|e| AppError::Internal(e.to_string()))?;
    users::set_password(&mut conn, id, &hash).await?;
    sessions.remove_user(id);
    info!(user_id = id, "password reset");
    Ok(PasswordReset {
        message: format!(
            "Password for {} has been reset. New password: {new_password}",
            user.email
        ),
        new_password,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveToggled {
    pub message: String,
    pub user: User,
}

pub async fn toggle_active(db: &Db, sessions: &SessionStore, id: i64) -> AppResult<ActiveToggled> {
    let mut conn = db.acquire().await?;
    let user = users::find_by_id(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let active = !user.is_active.get();
    users::set_active(&mut conn, id, active).await?;
    if !active {
        sessions.remove_user(id);
    }
    let user = users::find_by_id(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let status = if active { "activated" } else { "deactivated" };
    Ok(ActiveToggled {
        message: format!("User {} has been {status}.", user.email),
        user,
    })
}
