use thiserror::Error;

/// Errors raised by the storage manager
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported hash algorithm: {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("Identity resolution failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while turning a token into a client identity
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Missing token")]
    MissingToken,

    #[error("Unknown token")]
    UnknownToken,

    #[error("Invalid identity: {0:?}")]
    InvalidIdentity(String),

    #[error("Failed to load token table: {0}")]
    Load(String),
}
