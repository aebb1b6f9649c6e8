mod app;
mod bootstrap;

pub use app::{AUTH_CHALLENGE, ApiErrorBody, ApiErrorObject, AppError};
pub use bootstrap::BootstrapError;

pub type AppResult<T> = Result<T, AppError>;
