//! HTTP handlers for the file store API
//!
//! Filesystem and PDF work is blocking, so each handler hands it to
//! `spawn_blocking` and only does request parsing on the async side.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderName,
    },
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use filestore_core::{sniff, ContentKind, HashAlgorithm};
use pdfstamp_core::{JobError, PageSelection, Placement, StampJob};
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::form::{read_multipart, FormFields};
use crate::models::*;
use crate::state::AppState;

/// Multipart field holding the uploaded file
pub const UPLOAD_FIELD: &str = "uploadfile";

/// Request header naming the digest algorithm
pub const HASHTYPE_HEADER: &str = "hashtype";

/// Handler: GET /test
pub async fn hello() -> &'static str {
    "Hello World"
}

/// Handler: GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "filestore-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handler: POST /files/upload
pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::FormParse(e.body_text()))?;
    let mut form = read_multipart(multipart, state.store.max_upload_size()).await?;
    let content = form.take_file(UPLOAD_FIELD).ok_or(ApiError::MissingFile)?;
    let identity = state.identity(&headers)?;

    let store = state.store.clone();
    let stored =
        tokio::task::spawn_blocking(move || store.upload(&content, identity.as_ref())).await??;

    Ok(Json(UploadResponse {
        status: "ok",
        file: stored.name.to_string(),
    }))
}

/// Handler: GET /files/download/:filename
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = state.identity(&headers)?;

    let store = state.store.clone();
    let retrieved =
        tokio::task::spawn_blocking(move || store.retrieve(&filename, identity.as_ref()))
            .await??;

    let body = Body::from_stream(ReaderStream::new(tokio::fs::File::from_std(retrieved.file)));
    let headers = [
        (CONTENT_TYPE, retrieved.mime.to_string()),
        (CONTENT_LENGTH, retrieved.len.to_string()),
        (HeaderName::from_static("status"), "ok".to_string()),
    ];
    Ok((headers, body).into_response())
}

/// Handler: GET /files/hash/:filename
pub async fn hash(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Json<HashResponse>, ApiError> {
    let identity = state.identity(&headers)?;
    let hashtype = headers
        .get(HASHTYPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let algorithm: HashAlgorithm = hashtype.parse()?;

    let store = state.store.clone();
    let hash = tokio::task::spawn_blocking(move || {
        store.digest(&filename, identity.as_ref(), algorithm)
    })
    .await??;

    Ok(Json(HashResponse {
        status: "ok",
        hashtype,
        hash,
    }))
}

/// Handler: POST /files/imgsignpdf
///
/// Stamps a stored image onto a stored PDF. All fields are validated before
/// any file is touched.
pub async fn stamp(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    FormFields(fields): FormFields,
) -> Result<Json<StampResponse>, ApiError> {
    let job = StampJob::from_fields(|key| fields.get(key).map(String::as_str))?;
    let identity = state.identity(&headers)?;

    let stamper = state.stamper.clone();
    let outcome =
        tokio::task::spawn_blocking(move || stamper.stamp(&job, identity.as_ref())).await??;

    Ok(Json(StampResponse {
        status: "ok",
        resultfile: outcome.logical_name.to_string(),
    }))
}

/// Handler: POST /files/imgsignpdfonce
///
/// Uploads a PDF and an image, stamps them and returns the result inline.
pub async fn stamp_once(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<StampOnceResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::FormParse(e.body_text()))?;
    let mut form = read_multipart(multipart, state.store.max_upload_size()).await?;

    let pdf = form.take_file("pdf").ok_or(JobError("pdf"))?;
    let image = form.take_file("image").ok_or(JobError("image"))?;
    let page = PageSelection::from_fields(|key| form.field(key))?;
    let placement = Placement::from_fields(|key| form.field(key))?;

    if sniff(&pdf).kind() != Some(ContentKind::Pdf) {
        return Err(ApiError::UnsupportedType(sniff(&pdf).mime().to_string()));
    }
    if !sniff(&image).kind().is_some_and(ContentKind::is_image) {
        return Err(ApiError::UnsupportedType(sniff(&image).mime().to_string()));
    }

    let identity = state.identity(&headers)?;
    let stamper = state.stamper.clone();
    let (resultfile, stamped) = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let store = stamper.store();
        let pdf = store.upload(&pdf, identity.as_ref())?;
        let image = store.upload(&image, identity.as_ref())?;

        let job = StampJob {
            source_pdf_name: pdf.name.to_string(),
            image_name: image.name.to_string(),
            page,
            placement,
        };
        let outcome = stamper.stamp(&job, identity.as_ref())?;
        let stamped = store.read(outcome.logical_name.as_str(), None)?;
        Ok((outcome.logical_name.to_string(), stamped))
    })
    .await??;

    Ok(Json(StampOnceResponse {
        status: "ok",
        resultfile,
        file: BASE64.encode(stamped),
    }))
}
