//! Content-addressed file storage
//!
//! This crate names uploaded files by the SHA-256 digest of their bytes,
//! validates them against a small whitelist of sniffed content types and
//! keeps them in a flat directory. Names can be namespaced per client
//! identity so two clients never collide on the same physical path.
//!
//! There is no index: the filename is the only metadata, so every lookup is
//! a deterministic name composition.

pub mod config;
pub mod digest;
pub mod error;
pub mod identity;
pub mod name;
pub mod sniff;
pub mod store;

pub use config::{StoreConfig, DEFAULT_MAX_UPLOAD_SIZE};
pub use digest::{hex_digest, HashAlgorithm};
pub use error::{IdentityError, StoreError};
pub use identity::{IdentityResolver, TokenTable};
pub use name::{content_name, ClientIdentity, LogicalName};
pub use sniff::{sniff, ContentKind, SniffedType, SNIFF_LEN};
pub use store::{FileStore, Retrieved, StoredFile};
