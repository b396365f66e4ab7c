//! Content-type sniffing
//!
//! Types are decided from the leading bytes of a payload, never from what the
//! client declares. Only the first [`SNIFF_LEN`] bytes are consulted.

use std::fmt;

/// Number of leading bytes inspected when sniffing
pub const SNIFF_LEN: usize = 512;

/// Content types accepted for storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Jpeg,
    Gif,
    Png,
    Pdf,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Jpeg,
        ContentKind::Gif,
        ContentKind::Png,
        ContentKind::Pdf,
    ];

    pub fn mime(self) -> &'static str {
        match self {
            ContentKind::Jpeg => "image/jpeg",
            ContentKind::Gif => "image/gif",
            ContentKind::Png => "image/png",
            ContentKind::Pdf => "application/pdf",
        }
    }

    /// First registered extension for the MIME type, dot included.
    ///
    /// Stored names depend on this table, so it must never be reordered.
    pub fn extension(self) -> &'static str {
        match self {
            ContentKind::Jpeg => ".jpeg",
            ContentKind::Gif => ".gif",
            ContentKind::Png => ".png",
            ContentKind::Pdf => ".pdf",
        }
    }

    pub fn is_image(self) -> bool {
        !matches!(self, ContentKind::Pdf)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Outcome of sniffing a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SniffedType {
    /// One of the whitelisted kinds
    Accepted(ContentKind),
    /// Anything else, carrying the detected MIME type
    Rejected(&'static str),
}

impl SniffedType {
    pub fn mime(&self) -> &'static str {
        match self {
            SniffedType::Accepted(kind) => kind.mime(),
            SniffedType::Rejected(mime) => mime,
        }
    }

    pub fn kind(&self) -> Option<ContentKind> {
        match self {
            SniffedType::Accepted(kind) => Some(*kind),
            SniffedType::Rejected(_) => None,
        }
    }
}

enum Signature {
    Exact(&'static [u8]),
    /// (mask, pattern) pairs of equal length
    Masked(&'static [u8], &'static [u8]),
}

impl Signature {
    fn matches(&self, data: &[u8]) -> bool {
        match self {
            Signature::Exact(prefix) => data.starts_with(prefix),
            Signature::Masked(mask, pattern) => {
                data.len() >= pattern.len()
                    && mask
                        .iter()
                        .zip(pattern.iter())
                        .zip(data.iter())
                        .all(|((m, p), d)| d & m == *p)
            }
        }
    }
}

enum Detected {
    Kind(ContentKind),
    Other(&'static str),
}

const SIGNATURES: &[(Signature, Detected)] = &[
    (Signature::Exact(b"%PDF-"), Detected::Kind(ContentKind::Pdf)),
    (Signature::Exact(b"GIF87a"), Detected::Kind(ContentKind::Gif)),
    (Signature::Exact(b"GIF89a"), Detected::Kind(ContentKind::Gif)),
    (
        Signature::Exact(b"\x89PNG\x0D\x0A\x1A\x0A"),
        Detected::Kind(ContentKind::Png),
    ),
    (
        Signature::Exact(b"\xFF\xD8\xFF"),
        Detected::Kind(ContentKind::Jpeg),
    ),
    (Signature::Exact(b"BM"), Detected::Other("image/bmp")),
    (
        Signature::Exact(b"\x00\x00\x01\x00"),
        Detected::Other("image/x-icon"),
    ),
    (
        Signature::Masked(
            b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
            b"RIFF\x00\x00\x00\x00WEBPVP",
        ),
        Detected::Other("image/webp"),
    ),
    (
        Signature::Exact(b"PK\x03\x04"),
        Detected::Other("application/zip"),
    ),
    (
        Signature::Exact(b"\x1F\x8B\x08"),
        Detected::Other("application/x-gzip"),
    ),
];

/// Sniff the content type of `data` from its first [`SNIFF_LEN`] bytes
pub fn sniff(data: &[u8]) -> SniffedType {
    let head = &data[..data.len().min(SNIFF_LEN)];

    for (signature, detected) in SIGNATURES {
        if signature.matches(head) {
            return match detected {
                Detected::Kind(kind) => SniffedType::Accepted(*kind),
                Detected::Other(mime) => SniffedType::Rejected(mime),
            };
        }
    }

    if head.iter().any(|&b| is_binary_byte(b)) {
        SniffedType::Rejected("application/octet-stream")
    } else {
        SniffedType::Rejected("text/plain; charset=utf-8")
    }
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
