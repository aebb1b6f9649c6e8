//! Operator steps that take an empty database server to a running application:
//! create the schema, migrate it, provision the first administrator, serve.
//!
//! Each step halts on its first failure and reports it; nothing is retried.

use crate::auth::{self, hash_password};
use crate::config::{BasicConfig, Config};
use crate::db::models::User;
use crate::db::users::{self, NewUser};
use crate::db::{self, Db, MigrationState};
use crate::domain::Role;
use crate::error::BootstrapError;
use crate::server::{AppState, app_router};
use crate::service::overdue_sweeper::OverdueSweeperHandle;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

fn database_url(cfg: &Config) -> Result<String, BootstrapError> {
    Ok(cfg.database.connection_url()?)
}

/// Creates the configured database. An existing database is an error, not a no-op.
pub async fn create_database(cfg: &Config) -> Result<(), BootstrapError> {
    let url = database_url(cfg)?;
    db::create_database(&url).await?;
    info!(database = %cfg.database.redacted_url(), "database created");
    Ok(())
}

/// Opens a pool to the configured database without ever creating it.
pub async fn connect(cfg: &Config) -> Result<Db, BootstrapError> {
    let url = database_url(cfg)?;
    Db::connect(&url, cfg.database.max_connections).await
}

/// Applies pending migrations and returns the versions applied by this run.
pub async fn migrate(cfg: &Config) -> Result<Vec<i64>, BootstrapError> {
    let db = connect(cfg).await?;
    let applied = db::migrate(&db).await;
    db.close().await;
    let applied = applied?;
    if applied.is_empty() {
        info!("no migrations to apply");
    } else {
        info!(count = applied.len(), versions = ?applied, "migrations applied");
    }
    Ok(applied)
}

pub async fn ensure_migrated(db: &Db) -> Result<(), BootstrapError> {
    let pending = db::pending_migrations(db).await?;
    if pending.is_empty() {
        Ok(())
    } else {
        Err(BootstrapError::SchemaNotMigrated { pending })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuperuserInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
}

/// Provisions an active admin with staff and superuser rights.
pub async fn create_superuser(db: &Db, input: &SuperuserInput) -> Result<User, BootstrapError> {
    ensure_migrated(db).await?;

    let email = input.email.trim();
    if !auth::looks_like_email(email) {
        return Err(BootstrapError::InvalidInput(format!(
            "{email:?} is not a valid email address"
        )));
    }
    auth::validate_new_password(&input.password, &input.password_confirm)
        .map_err(BootstrapError::InvalidInput)?;

    let password_hash = hash_password(&input.password)?;
    let mut tx = db.begin().await?;
    if users::find_by_email(&mut tx, email).await?.is_some() {
        return Err(BootstrapError::UserExists(email.to_string()));
    }
    let id = users::insert(
        &mut tx,
        &NewUser {
            email,
            first_name: input.first_name.trim(),
            last_name: input.last_name.trim(),
            role: Role::Admin,
            is_staff: true,
            is_superuser: true,
            password_hash: &password_hash,
        },
    )
    .await?;
    let user = users::find_by_id(&mut tx, id)
        .await?
        .ok_or(BootstrapError::Database(sqlx::Error::RowNotFound))?;
    tx.commit().await?;
    info!(user_id = id, email, "superuser created");
    Ok(user)
}

/// Connectivity and migration state of the configured database.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub database: String,
    pub migrations: Vec<MigrationState>,
}

impl CheckReport {
    pub fn pending(&self) -> Vec<i64> {
        self.migrations
            .iter()
            .filter(|m| !m.is_applied())
            .map(|m| m.version)
            .collect()
    }
}

pub async fn check(cfg: &Config) -> Result<CheckReport, BootstrapError> {
    let db = connect(cfg).await?;
    let migrations = db::migration_status(&db).await;
    db.close().await;
    Ok(CheckReport {
        database: cfg.database.redacted_url(),
        migrations: migrations?,
    })
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, BootstrapError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| BootstrapError::PortInUse { addr, source })
}

/// Refuses to start on an unreachable or unmigrated database, then serves until `shutdown`.
pub async fn serve<F>(cfg: &Config, shutdown: F) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let db = connect(cfg).await?;
    if let Err(e) = ensure_migrated(&db).await {
        db.close().await;
        return Err(e);
    }
    let addr = SocketAddr::from((cfg.basic.listen_addr, cfg.basic.listen_port));
    let listener = match bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            db.close().await;
            return Err(e);
        }
    };
    run_server(listener, db, &cfg.basic, shutdown).await
}

/// Serves the application on an already bound listener with the overdue sweeper running.
pub async fn run_server<F>(
    listener: TcpListener,
    db: Db,
    basic: &BasicConfig,
    shutdown: F,
) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sweeper =
        OverdueSweeperHandle::spawn(db.clone(), Duration::from_secs(basic.sweep_interval_secs))
            .await?;
    let app = app_router(AppState::new(db.clone(), basic));

    info!("HTTP server listening on {}", listener.local_addr()?);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    sweeper.stop();
    db.close().await;
    served?;
    info!("Server has shut down gracefully.");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
