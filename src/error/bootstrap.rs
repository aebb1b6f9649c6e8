use crate::auth::PasswordError;
use std::net::SocketAddr;
use thiserror::Error as ThisError;

/// Failures of the operator-facing bootstrap steps.
///
/// Every variant is fatal to the running command; nothing here is retried.
#[derive(Debug, ThisError)]
pub enum BootstrapError {
    #[error("cannot reach database at {url}: {source}")]
    Connectivity {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("database already exists at {0}")]
    DatabaseExists(String),

    #[error("schema is not migrated; pending migrations: {pending:?} (run `dryfruits migrate`)")]
    SchemaNotMigrated { pending: Vec<i64> },

    #[error("migration {version} ({name}) failed: {source}")]
    Migration {
        version: i64,
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("a user with email {0} already exists")]
    UserExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot listen on {addr}: {source}")]
    PortInUse {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("password hashing failed: {0}")]
    Password(#[from] PasswordError),

    #[error("prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ractor error: {0}")]
    Ractor(String),
}

impl From<figment::Error> for BootstrapError {
    fn from(e: figment::Error) -> Self {
        BootstrapError::Config(e.to_string())
    }
}

impl From<url::ParseError> for BootstrapError {
    fn from(e: url::ParseError) -> Self {
        BootstrapError::Config(format!("invalid database url: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_failures_keep_their_own_variant() {
        let err = BootstrapError::from(PasswordError::Salt);
        assert!(matches!(err, BootstrapError::Password(PasswordError::Salt)));
        assert_eq!(
            err.to_string(),
            "password hashing failed: failed to generate salt for password hash"
        );
    }
}
