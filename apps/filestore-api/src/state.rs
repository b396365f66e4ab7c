//! Application state for the file store API

use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderMap;
use filestore_core::{ClientIdentity, FileStore, IdentityResolver, StoreConfig};
use pdfstamp_core::Stamper;

use crate::error::ApiError;

/// Request header carrying the client token
pub const TOKEN_HEADER: &str = "token";

pub struct AppState {
    pub store: FileStore,
    pub stamper: Stamper,
    /// When absent, requests carry no identity and names are not namespaced
    pub resolver: Option<Arc<dyn IdentityResolver>>,
}

impl AppState {
    pub fn new(config: StoreConfig, resolver: Option<Arc<dyn IdentityResolver>>) -> Result<Self> {
        let store = FileStore::new(config)?;
        tracing::info!(
            "Serving files from {} (token auth {})",
            store.root().display(),
            if resolver.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            stamper: Stamper::new(store.clone()),
            store,
            resolver,
        })
    }

    /// Resolve the caller's identity from the `token` header
    pub fn identity(&self, headers: &HeaderMap) -> Result<Option<ClientIdentity>, ApiError> {
        let Some(resolver) = &self.resolver else {
            return Ok(None);
        };

        let token = headers
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        Ok(Some(resolver.resolve(token)?))
    }
}
