use crate::codec::CodecError;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Array codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}
