//! # App Error Types

use ember_core::EcsError;
use thiserror::Error;

/// Errors that stop an [`App`](crate::App).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// A World operation failed.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A system reported a failure.
    #[error("system `{system}` failed: {message}")]
    System {
        /// Name of the failing system.
        system: &'static str,
        /// What went wrong.
        message: String,
    },

    /// Configuration text could not be parsed.
    #[error("invalid app configuration: {0}")]
    Config(String),
}

/// Result type for systems and the App.
pub type AppResult<T> = Result<T, AppError>;
