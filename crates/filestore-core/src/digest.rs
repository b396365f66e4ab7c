//! Digest algorithms for stored content

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use sm3::Sm3;

use crate::error::StoreError;

/// Supported content digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sm3,
}

impl HashAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sm3 => "sm3",
        }
    }

    /// Digest length in bytes
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => <Sha256 as Digest>::output_size(),
            HashAlgorithm::Sm3 => <Sm3 as Digest>::output_size(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = StoreError;

    /// Case-insensitive: "SHA256", "sha256" and "Sha256" are all accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("sha256") {
            Ok(HashAlgorithm::Sha256)
        } else if s.eq_ignore_ascii_case("sm3") {
            Ok(HashAlgorithm::Sm3)
        } else {
            Err(StoreError::UnsupportedAlgorithm(s.to_string()))
        }
    }
}

fn hex_of<D: Digest>(data: &[u8]) -> String {
    hex::encode(D::digest(data))
}

/// Lowercase hex digest of `data`
pub fn hex_digest(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => hex_of::<Sha256>(data),
        HashAlgorithm::Sm3 => hex_of::<Sm3>(data),
    }
}
