use catalog_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Catalog is not initialized")]
    NotInitialized,

    #[error("Invalid producer input: {0}")]
    Validation(String),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error(transparent)]
    Library(#[from] LibraryError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
