//! Registry error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("description is required")]
    MissingDescription,

    #[error("valid mountpoint id is required")]
    InvalidId,

    #[error("mountpoint {0} not found")]
    NotFound(u64),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry rejected request: {status} {message}")]
    Rejected { status: u16, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry error: {0}")]
    Other(String),
}
