//! The storage manager
//!
//! Files live flat under the storage root as `[identity-]<sha256 hex><ext>`.
//! Content addressing makes uploads idempotent: the same bytes always land on
//! the same path, so a repeated upload rewrites identical content.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::config::StoreConfig;
use crate::digest::{hex_digest, HashAlgorithm};
use crate::error::StoreError;
use crate::name::{content_name, ClientIdentity, LogicalName};
use crate::sniff::{sniff, ContentKind, SniffedType, SNIFF_LEN};

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A successfully persisted upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Name handed back to the client (digest + extension)
    pub name: LogicalName,
    /// Name on disk, including the identity prefix when one was given
    pub stored_as: String,
    pub content_type: ContentKind,
    pub size_bytes: u64,
}

/// An opened stored file, ready to be streamed
#[derive(Debug)]
pub struct Retrieved {
    pub file: File,
    pub len: u64,
    /// MIME type sniffed from the stored bytes
    pub mime: &'static str,
}

/// Content-addressed file store
#[derive(Debug, Clone)]
pub struct FileStore {
    config: StoreConfig,
}

impl FileStore {
    /// Create a store, creating the storage root if needed
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.storage_root)?;
        tracing::debug!(
            "File store ready at {} (max upload {} bytes)",
            config.storage_root.display(),
            config.max_upload_size
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.storage_root
    }

    pub fn max_upload_size(&self) -> u64 {
        self.config.max_upload_size
    }

    /// Validate and persist `content` under its content-derived name
    ///
    /// Nothing is written unless the size and sniffed type checks pass.
    pub fn upload(
        &self,
        content: &[u8],
        identity: Option<&ClientIdentity>,
    ) -> StoreResult<StoredFile> {
        let size = content.len() as u64;
        if size > self.config.max_upload_size {
            return Err(StoreError::FileTooLarge {
                size,
                limit: self.config.max_upload_size,
            });
        }

        let kind = match sniff(content) {
            SniffedType::Accepted(kind) => kind,
            SniffedType::Rejected(mime) => {
                return Err(StoreError::UnsupportedType(mime.to_string()));
            }
        };

        let name = LogicalName::parse(content_name(content, kind))?;
        let stored_as = name.namespaced(identity);
        let path = self.root().join(&stored_as);

        fs::write(&path, content)?;

        tracing::info!(
            "Stored {} ({}, {} bytes)",
            stored_as,
            kind,
            size
        );

        Ok(StoredFile {
            name,
            stored_as,
            content_type: kind,
            size_bytes: size,
        })
    }

    /// Physical path for a requested name; performs no existence check
    pub fn resolve(&self, name: &str, identity: Option<&ClientIdentity>) -> StoreResult<PathBuf> {
        let name = LogicalName::parse(name)?;
        Ok(self.path_for(&name, identity))
    }

    pub fn path_for(&self, name: &LogicalName, identity: Option<&ClientIdentity>) -> PathBuf {
        self.root().join(name.namespaced(identity))
    }

    /// Open a stored file for streaming
    pub fn retrieve(&self, name: &str, identity: Option<&ClientIdentity>) -> StoreResult<Retrieved> {
        let path = self.resolve(name, identity)?;
        let mut file = File::open(&path).map_err(|e| not_found_or_io(e, name))?;
        let len = file.metadata()?.len();

        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head)?;
        file.seek(SeekFrom::Start(0))?;

        Ok(Retrieved {
            file,
            len,
            mime: sniff(&head).mime(),
        })
    }

    /// Read a stored file fully into memory
    pub fn read(&self, name: &str, identity: Option<&ClientIdentity>) -> StoreResult<Vec<u8>> {
        let path = self.resolve(name, identity)?;
        fs::read(&path).map_err(|e| not_found_or_io(e, name))
    }

    pub fn exists(&self, name: &str, identity: Option<&ClientIdentity>) -> StoreResult<bool> {
        Ok(self.resolve(name, identity)?.is_file())
    }

    /// Hex digest of a stored file's content
    pub fn digest(
        &self,
        name: &str,
        identity: Option<&ClientIdentity>,
        algorithm: HashAlgorithm,
    ) -> StoreResult<String> {
        let content = self.read(name, identity)?;
        Ok(hex_digest(algorithm, &content))
    }
}

fn not_found_or_io(err: io::Error, name: &str) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::Io(err)
    }
}
