//! PDF image stamping
//!
//! This crate draws a PNG or JPEG image onto one page, or every page, of a
//! PDF using lopdf. The stamped document is written to a new file next to
//! its inputs; inputs are never modified.
//!
//! - [`StampJob`]: request parameters, validated field by field
//! - [`stamp_document`] / [`stamp_file`]: the stamping itself
//! - [`Stamper`]: runs jobs against names in a [`filestore_core::FileStore`]

pub mod error;
pub mod image;
pub mod job;
pub mod output;
pub mod stamp;
pub mod stamper;

pub use error::{JobError, StampError};
pub use image::EmbeddedImage;
pub use job::{PageSelection, Placement, StampJob, ALL_PAGES};
pub use output::write_atomic;
pub use stamp::{page_count, stamp_document, stamp_file, StampReport};
pub use stamper::{StampOutcome, Stamper};
