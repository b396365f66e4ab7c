//! Response bodies

use serde::Serialize;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

/// Response to a successful upload; `file` is the name to use in later requests
#[derive(Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub file: String,
}

#[derive(Serialize)]
pub struct HashResponse {
    pub status: &'static str,
    /// Algorithm as the client spelled it
    pub hashtype: String,
    pub hash: String,
}

#[derive(Serialize)]
pub struct StampResponse {
    pub status: &'static str,
    pub resultfile: String,
}

/// One-shot stamp response carrying the stamped PDF inline
#[derive(Serialize)]
pub struct StampOnceResponse {
    pub status: &'static str,
    pub resultfile: String,
    /// Base64-encoded PDF
    pub file: String,
}
