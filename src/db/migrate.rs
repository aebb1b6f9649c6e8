use super::schema::{LEDGER_DDL, MIGRATIONS, created_index};
use super::{Db, Dialect};
use crate::domain::now_text;
use crate::error::BootstrapError;
use serde::Serialize;
use sqlx::error::DatabaseError;
use sqlx::{AnyConnection, Row};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MigrationState {
    pub version: i64,
    pub name: &'static str,
    pub applied_at: Option<String>,
}

impl MigrationState {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

async fn ensure_ledger(db: &Db) -> Result<(), sqlx::Error> {
    sqlx::query(LEDGER_DDL).execute(db.pool()).await?;
    Ok(())
}

async fn applied(db: &Db) -> Result<Vec<(i64, String)>, sqlx::Error> {
    let rows = sqlx::query("SELECT version, applied_at FROM schema_migrations ORDER BY version")
        .fetch_all(db.pool())
        .await?;
    rows.iter()
        .map(|row| -> Result<(i64, String), sqlx::Error> {
            Ok((row.try_get("version")?, row.try_get("applied_at")?))
        })
        .collect()
}

/// Whether a MySQL statement would create an index that is already there.
async fn index_exists(conn: &mut AnyConnection, stmt: &str) -> Result<bool, sqlx::Error> {
    let Some((index, table)) = created_index(stmt) else {
        return Ok(false);
    };
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM information_schema.statistics \
         WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ?",
    )
    .bind(table)
    .bind(index)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

/// Reading a ledger table that was never created.
fn is_missing_table(err: &dyn DatabaseError) -> bool {
    // MySQL reports SQLSTATE 42S02; SQLite only has the message.
    err.code().as_deref() == Some("42S02") || err.message().contains("no such table")
}

/// Applies every migration not yet recorded in the ledger, in version order.
///
/// Returns the versions applied by this call; an up-to-date schema yields an empty list.
pub async fn migrate(db: &Db) -> Result<Vec<i64>, BootstrapError> {
    ensure_ledger(db).await?;
    let done: Vec<i64> = applied(db).await?.into_iter().map(|(v, _)| v).collect();

    let mut newly_applied = Vec::new();
    for migration in MIGRATIONS {
        if done.contains(&migration.version) {
            continue;
        }
        let failed = |source| BootstrapError::Migration {
            version: migration.version,
            name: migration.name,
            source,
        };

        let mut tx = db.begin().await?;
        for stmt in migration.statements(db.dialect()) {
            if db.dialect() == Dialect::MySql
                && index_exists(&mut tx, &stmt).await.map_err(failed)?
            {
                debug!(version = migration.version, "index already present");
                continue;
            }
            sqlx::query(&stmt)
                .execute(&mut *tx)
                .await
                .map_err(failed)?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(now_text())
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)?;

        info!(
            version = migration.version,
            name = migration.name,
            "migration applied"
        );
        newly_applied.push(migration.version);
    }
    Ok(newly_applied)
}

/// Known migrations with their applied timestamps; does not modify the schema.
pub async fn migration_status(db: &Db) -> Result<Vec<MigrationState>, BootstrapError> {
    let done = match applied(db).await {
        Ok(rows) => rows,
        // No ledger yet: nothing applied.
        Err(sqlx::Error::Database(e)) if is_missing_table(e.as_ref()) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    Ok(MIGRATIONS
        .iter()
        .map(|m| MigrationState {
            version: m.version,
            name: m.name,
            applied_at: done
                .iter()
                .find(|(v, _)| *v == m.version)
                .map(|(_, at)| at.clone()),
        })
        .collect())
}

pub async fn pending_migrations(db: &Db) -> Result<Vec<i64>, BootstrapError> {
    Ok(migration_status(db)
        .await?
        .into_iter()
        .filter(|m| !m.is_applied())
        .map(|m| m.version)
        .collect())
}
