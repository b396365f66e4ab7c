use filestore_core::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StampError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to open PDF: {0}")]
    PdfOpen(String),

    #[error("Failed to enumerate pages: {0}")]
    PageCount(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    #[error("Failed to write PDF: {0}")]
    Write(String),
}

/// A stamping request field that was missing or malformed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Params {0} error")]
pub struct JobError(pub &'static str);

impl JobError {
    pub fn field(&self) -> &'static str {
        self.0
    }
}
