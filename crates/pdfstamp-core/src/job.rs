//! Stamping request parameters
//!
//! Fields are validated one at a time in a fixed order and the first bad
//! field short-circuits, so a request with several bad fields only ever
//! reports the first one.

use crate::error::JobError;

/// Sentinel page value selecting every page
pub const ALL_PAGES: i64 = -1;

/// Which pages receive the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelection {
    All,
    /// 1-indexed page number
    Page(u32),
}

impl PageSelection {
    /// Parse a page field: `-1` for every page, otherwise a 1-based page number
    pub fn parse(value: &str) -> Option<Self> {
        let page: i64 = value.parse().ok()?;
        if page == ALL_PAGES {
            return Some(PageSelection::All);
        }
        match u32::try_from(page) {
            Ok(0) | Err(_) => None,
            Ok(page) => Some(PageSelection::Page(page)),
        }
    }

    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Page(selected) => *selected == page,
        }
    }

    pub fn from_fields<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Result<Self, JobError> {
        lookup("page")
            .and_then(PageSelection::parse)
            .ok_or(JobError("page"))
    }
}

/// Where the image goes and how wide it is, in PDF user space units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Top-left corner of the image, measured from the page's top-left
    /// corner with y growing downward
    pub x: f64,
    pub y: f64,
    /// Drawn width; height follows the image's aspect ratio
    pub width: f64,
}

impl Placement {
    /// Parse `xpos`, `ypos` and `width`, in that order
    pub fn from_fields<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Result<Self, JobError> {
        let x = parse_coordinate(&lookup, "xpos")?;
        let y = parse_coordinate(&lookup, "ypos")?;
        let width = parse_coordinate(&lookup, "width")?;
        if width <= 0.0 {
            return Err(JobError("width"));
        }
        Ok(Placement { x, y, width })
    }

    /// Height of the drawn image for a source of `pixel_width` x `pixel_height`
    pub fn height_for(&self, pixel_width: u32, pixel_height: u32) -> f64 {
        self.width * pixel_height as f64 / pixel_width as f64
    }
}

fn parse_coordinate<'a>(
    lookup: &impl Fn(&str) -> Option<&'a str>,
    field: &'static str,
) -> Result<f64, JobError> {
    lookup(field)
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .ok_or(JobError(field))
}

/// One stamping request against two stored files
#[derive(Debug, Clone, PartialEq)]
pub struct StampJob {
    pub source_pdf_name: String,
    pub image_name: String,
    pub page: PageSelection,
    pub placement: Placement,
}

impl StampJob {
    /// Build a job from request fields, checked in the order
    /// `pdf`, `page`, `image`, `xpos`, `ypos`, `width`
    pub fn from_fields<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Result<Self, JobError> {
        let source_pdf_name = lookup("pdf").ok_or(JobError("pdf"))?.to_string();
        let page = PageSelection::from_fields(&lookup)?;
        let image_name = lookup("image").ok_or(JobError("image"))?.to_string();
        let placement = Placement::from_fields(&lookup)?;

        Ok(StampJob {
            source_pdf_name,
            image_name,
            page,
            placement,
        })
    }
}
