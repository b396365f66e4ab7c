//! Logical file names and identity prefixes

use std::fmt;

use crate::digest::{hex_digest, HashAlgorithm};
use crate::error::{IdentityError, StoreError};
use crate::sniff::ContentKind;

/// Separator between an identity prefix and the content-derived name
pub const IDENTITY_SEPARATOR: char = '-';

/// Content-derived name: lowercase hex SHA-256 of `content` plus the kind's extension
pub fn content_name(content: &[u8], kind: ContentKind) -> String {
    format!(
        "{}{}",
        hex_digest(HashAlgorithm::Sha256, content),
        kind.extension()
    )
}

/// Returns true when `name` is usable as a single flat path component
fn is_flat_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// A validated, externally visible file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalName(String);

impl LogicalName {
    pub fn parse(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        if is_flat_component(&name) {
            Ok(Self(name))
        } else {
            Err(StoreError::InvalidName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name as stored on disk, prefixed with the identity when present
    pub fn namespaced(&self, identity: Option<&ClientIdentity>) -> String {
        match identity {
            Some(identity) => format!("{}{}{}", identity.as_str(), IDENTITY_SEPARATOR, self.0),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque client identity used only to namespace stored names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(identity: impl Into<String>) -> Result<Self, IdentityError> {
        let identity = identity.into();
        if is_flat_component(&identity) {
            Ok(Self(identity))
        } else {
            Err(IdentityError::InvalidIdentity(identity))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
