use thiserror::Error;

use crate::hal::HalError;

/// Errors that can occur in the router
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HAL error: {0}")]
    Hal(#[from] HalError),
}

pub type Result<T> = std::result::Result<T, RouterError>;
