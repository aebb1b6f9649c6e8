pub mod auth;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;

pub use config::Config;
pub use db::Db;
pub use error::{AppError, BootstrapError};
