use super::inserted_id;
use super::models::User;
use crate::domain::{Role, now_text};
use sqlx::AnyConnection;

const USER_COLUMNS: &str = "id, email, first_name, last_name, role, is_active, is_staff, \
     is_superuser, password_hash, date_joined, last_login";

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub password_hash: &'a str,
}

pub async fn insert(conn: &mut AnyConnection, user: &NewUser<'_>) -> Result<i64, sqlx::Error> {
    let res = sqlx::query(
        r"
        INSERT INTO users
            (email, first_name, last_name, role, is_active, is_staff, is_superuser,
             password_hash, date_joined)
        VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)
        ",
    )
    .bind(user.email.trim())
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.role.as_str())
    .bind(i64::from(user.is_staff))
    .bind(i64::from(user.is_superuser))
    .bind(user.password_hash)
    .bind(now_text())
    .execute(&mut *conn)
    .await?;
    inserted_id(conn, &res).await
}

pub async fn find_by_id(conn: &mut AnyConnection, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Case-insensitive lookup by login email.
pub async fn find_by_email(
    conn: &mut AnyConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = ?"
    ))
    .bind(email.trim().to_lowercase())
    .fetch_optional(&mut *conn)
    .await
}

pub async fn email_taken(
    conn: &mut AnyConnection,
    email: &str,
    except_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE LOWER(email) = ?")
        .bind(email.trim().to_lowercase())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some_and(|(id,)| Some(id) != except_id))
}

/// All users, newest first.
pub async fn list(conn: &mut AnyConnection) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY date_joined DESC, id DESC"
    ))
    .fetch_all(&mut *conn)
    .await
}

pub async fn set_password(
    conn: &mut AnyConnection,
    id: i64,
    password_hash: &str,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn set_active(
    conn: &mut AnyConnection,
    id: i64,
    active: bool,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(i64::from(active))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn touch_last_login(conn: &mut AnyConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now_text())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
