pub mod auth;

pub use auth::{AdminUser, CurrentUser, Executive, Staff};
