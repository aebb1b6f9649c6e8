//! Database module: connection handling, migrations, models and queries.
//!
//! Layout:
//! - `schema.rs`: SQL DDL, one entry per migration
//! - `migrate.rs`: migration ledger and runner
//! - `models.rs`: Rust structs mirroring DB rows
//! - `patch.rs`: partial-update payloads applied with `COALESCE`
//! - one module per table family with the queries used by services and routes
//!
//! All access goes through the sqlx `Any` driver so the same queries run on
//! MySQL in production and on SQLite files in tests.

pub mod admin;
pub mod customers;
pub mod invoices;
pub mod migrate;
pub mod models;
pub mod patch;
pub mod payments;
pub mod products;
pub mod schema;
pub mod users;

pub use migrate::{MigrationState, migrate, migration_status, pending_migrations};

use crate::config::redact;
use crate::error::BootstrapError;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions, AnyQueryResult};
use sqlx::migrate::MigrateDatabase;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// SQL flavor behind a connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, BootstrapError> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(BootstrapError::Config(format!(
                "unsupported database scheme {other:?} (expected mysql or sqlite)"
            ))),
        }
    }
}

/// Shared handle to the connection pool.
#[derive(Debug, Clone)]
pub struct Db {
    pool: AnyPool,
    dialect: Dialect,
}

impl Db {
    /// Opens a pool to an existing database; the database is never created here.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, BootstrapError> {
        sqlx::any::install_default_drivers();
        let dialect = Dialect::from_url(url)?;
        let connectivity = |source| BootstrapError::Connectivity {
            url: redact(url),
            source,
        };

        let options = AnyConnectOptions::from_str(url).map_err(connectivity)?;
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(connectivity)?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(connectivity)?;
        debug!(dialect = ?dialect, "database pool ready");
        Ok(Self { pool, dialect })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Any>, sqlx::Error> {
        self.pool.acquire().await
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Any>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Whether the database named by `url` exists on its server.
pub async fn database_exists(url: &str) -> Result<bool, BootstrapError> {
    sqlx::any::install_default_drivers();
    Dialect::from_url(url)?;
    Any::database_exists(url)
        .await
        .map_err(|source| BootstrapError::Connectivity {
            url: redact(url),
            source,
        })
}

/// Creates the database named by `url`. Fails if it already exists.
pub async fn create_database(url: &str) -> Result<(), BootstrapError> {
    if database_exists(url).await? {
        return Err(BootstrapError::DatabaseExists(redact(url)));
    }
    Any::create_database(url)
        .await
        .map_err(|source| BootstrapError::Connectivity {
            url: redact(url),
            source,
        })
}

/// `LOWER(col) LIKE ?` pattern for a case-insensitive substring match.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .trim()
        .to_lowercase()
        .replace('\\', "")
        .replace('%', "")
        .replace('_', "");
    format!("%{escaped}%")
}

/// Row id of the insert that produced `result`, read on the same connection.
///
/// MySQL reports it in the result. The SQLite `Any` driver does not, so it is
/// fetched with `last_insert_rowid()`.
pub(crate) async fn inserted_id(
    conn: &mut AnyConnection,
    result: &AnyQueryResult,
) -> Result<i64, sqlx::Error> {
    if let Some(id) = result.last_insert_id() {
        return Ok(id);
    }
    if conn.backend_name().eq_ignore_ascii_case("sqlite") {
        let (id,): (i64,) = sqlx::query_as("SELECT last_insert_rowid()")
            .fetch_one(&mut *conn)
            .await?;
        return Ok(id);
    }
    Err(sqlx::Error::Protocol(
        "driver did not report an insert id".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_from_scheme() {
        assert_eq!(
            Dialect::from_url("mysql://root@localhost/db").unwrap(),
            Dialect::MySql
        );
        assert_eq!(Dialect::from_url("sqlite:/tmp/a.db").unwrap(), Dialect::Sqlite);
        assert!(Dialect::from_url("postgres://x").is_err());
    }

    #[test]
    fn contains_pattern_strips_wildcards() {
        assert_eq!(contains_pattern(" Al%mond_ "), "%almond%");
    }
}
