//! Stamping against files in a [`FileStore`]

use filestore_core::{hex_digest, ClientIdentity, FileStore, HashAlgorithm, LogicalName};

use crate::error::StampError;
use crate::job::StampJob;
use crate::stamp::{stamp_file, StampReport};

/// Result of a stored stamping run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampOutcome {
    /// Name of the stamped PDF in the store; never namespaced
    pub logical_name: LogicalName,
    pub report: StampReport,
}

/// Stamps stored images onto stored PDFs
#[derive(Debug, Clone)]
pub struct Stamper {
    store: FileStore,
}

impl Stamper {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Output name for a pair of stored names: the SHA-256 of their
    /// concatenation, so re-stamping the same pair overwrites the same file
    pub fn output_name(stored_pdf: &str, stored_image: &str) -> String {
        let mut joined = String::with_capacity(stored_pdf.len() + stored_image.len());
        joined.push_str(stored_pdf);
        joined.push_str(stored_image);
        format!("{}.pdf", hex_digest(HashAlgorithm::Sha256, joined.as_bytes()))
    }

    pub fn stamp(
        &self,
        job: &StampJob,
        identity: Option<&ClientIdentity>,
    ) -> Result<StampOutcome, StampError> {
        let pdf = LogicalName::parse(job.source_pdf_name.as_str())?;
        let image = LogicalName::parse(job.image_name.as_str())?;

        let output = LogicalName::parse(Self::output_name(
            &pdf.namespaced(identity),
            &image.namespaced(identity),
        ))?;

        tracing::info!(
            "Stamping {} onto {} ({:?}) as {}",
            image,
            pdf,
            job.page,
            output
        );

        let report = stamp_file(
            &self.store.path_for(&pdf, identity),
            &self.store.path_for(&image, identity),
            &self.store.path_for(&output, None),
            &job.placement,
            job.page,
        )?;

        Ok(StampOutcome {
            logical_name: output,
            report,
        })
    }
}
