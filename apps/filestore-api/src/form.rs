//! Form body extraction
//!
//! File parts are read chunk by chunk so an oversized upload is rejected as
//! soon as it crosses the limit instead of after it has been buffered.

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    Form,
};

use crate::error::ApiError;

/// Text fields and file parts of a multipart body; the first occurrence of a name wins
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
}

impl FormData {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<Vec<u8>> {
        self.files.remove(name)
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError, limit: u64) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::FileTooLarge { limit }
    } else {
        ApiError::FormParse(err.body_text())
    }
}

/// Read every part of `multipart`, failing once any file part exceeds `max_file_size`
pub async fn read_multipart(mut multipart: Multipart, max_file_size: u64) -> Result<FormData, ApiError> {
    let mut form = FormData::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_some() {
            let mut data = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| multipart_error(e, max_file_size))?
            {
                if (data.len() + chunk.len()) as u64 > max_file_size {
                    return Err(ApiError::FileTooLarge {
                        limit: max_file_size,
                    });
                }
                data.extend_from_slice(&chunk);
            }
            tracing::debug!(field = %name, size = data.len(), "Received file part");
            form.files.entry(name).or_insert(data);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, max_file_size))?;
            form.fields.entry(name).or_insert(value);
        }
    }

    Ok(form)
}

/// Text fields from either a multipart or a URL-encoded body
#[derive(Debug)]
pub struct FormFields(pub HashMap<String, String>);

#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::FormParse(e.body_text()))?;
            let form = read_multipart(multipart, u64::MAX).await?;
            Ok(FormFields(form.fields))
        } else {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::FormParse(e.body_text()))?;
            Ok(FormFields(fields))
        }
    }
}
