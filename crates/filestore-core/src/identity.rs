//! Token to identity resolution
//!
//! The store itself trusts whatever identity it is handed. Turning a request
//! token into that identity is the job of an [`IdentityResolver`].

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::IdentityError;
use crate::name::ClientIdentity;

/// Resolves an opaque request token into a client identity
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Result<ClientIdentity, IdentityError>;
}

/// On-disk shape of a token table
#[derive(Debug, Deserialize)]
struct TokenFile {
    tokens: HashMap<String, String>,
}

/// Resolver backed by a fixed token -> identity map
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, ClientIdentity>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token, replacing any previous mapping
    pub fn insert(
        &mut self,
        token: impl Into<String>,
        identity: impl Into<String>,
    ) -> Result<(), IdentityError> {
        let identity = ClientIdentity::new(identity)?;
        self.tokens.insert(token.into(), identity);
        Ok(())
    }

    /// Parse a table from JSON of the form `{"tokens": {"<token>": "<identity>"}}`
    pub fn from_json(json: &str) -> Result<Self, IdentityError> {
        let file: TokenFile =
            serde_json::from_str(json).map_err(|e| IdentityError::Load(e.to_string()))?;

        let mut table = Self::new();
        for (token, identity) in file.tokens {
            table.insert(token, identity)?;
        }
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| IdentityError::Load(format!("{}: {}", path.display(), e)))?;
        let table = Self::from_json(&json)?;
        tracing::info!(
            "Loaded {} token(s) from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityResolver for TokenTable {
    fn resolve(&self, token: &str) -> Result<ClientIdentity, IdentityError> {
        if token.is_empty() {
            return Err(IdentityError::MissingToken);
        }
        self.tokens
            .get(token)
            .cloned()
            .ok_or(IdentityError::UnknownToken)
    }
}
