//! Image decoding into PDF image XObjects
//!
//! PNG images are decoded to 8-bit samples and re-compressed with Flate; an
//! alpha channel becomes a separate `/SMask` image. JPEG images are embedded
//! as-is with `/DCTDecode` once their dimensions are read from the frame
//! header.

use std::io::Write;
use std::path::Path;

use filestore_core::{sniff, ContentKind};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::StampError;

/// Largest decoded PNG accepted, in bytes of 8-bit samples
pub const MAX_DECODED_BYTES: usize = 64 * 1024 * 1024;

/// A decoded image ready to be added to a document
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    image: Stream,
    soft_mask: Option<Stream>,
}

impl EmbeddedImage {
    pub fn load(path: &Path) -> Result<Self, StampError> {
        let bytes = std::fs::read(path)
            .map_err(|e| StampError::ImageLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StampError> {
        match sniff(bytes).kind() {
            Some(ContentKind::Png) => decode_png(bytes),
            Some(ContentKind::Jpeg) => embed_jpeg(bytes),
            Some(ContentKind::Gif) => Err(StampError::ImageLoad(
                "GIF images cannot be stamped".into(),
            )),
            _ => Err(StampError::ImageLoad("unsupported image format".into())),
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.soft_mask.is_some()
    }

    /// Add the image (and its soft mask) to `doc`, returning the image's object id
    pub fn add_to(&self, doc: &mut Document) -> ObjectId {
        let mut image = self.image.clone();
        if let Some(mask) = &self.soft_mask {
            let mask_id = doc.add_object(mask.clone());
            image.dict.set("SMask", Object::Reference(mask_id));
        }
        doc.add_object(image)
    }
}

fn image_dict(width: u32, height: u32, color_space: &str, filter: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    dict
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, StampError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| StampError::ImageLoad(format!("compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| StampError::ImageLoad(format!("compression failed: {}", e)))
}

/// Split interleaved samples into color and alpha planes
fn split_alpha(data: &[u8], color_channels: usize) -> (Vec<u8>, Vec<u8>) {
    let stride = color_channels + 1;
    let pixels = data.len() / stride;
    let mut color = Vec::with_capacity(pixels * color_channels);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in data.chunks_exact(stride) {
        color.extend_from_slice(&pixel[..color_channels]);
        alpha.push(pixel[color_channels]);
    }
    (color, alpha)
}

fn decode_png(bytes: &[u8]) -> Result<EmbeddedImage, StampError> {
    let mut decoder = png::Decoder::new_with_limits(
        bytes,
        png::Limits {
            bytes: MAX_DECODED_BYTES,
        },
    );
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| StampError::ImageLoad(format!("invalid PNG: {}", e)))?;

    // The header alone decides the buffer size, so check it before allocating
    let (width, height) = reader.info().size();
    let buffer_size = reader.output_buffer_size();
    if buffer_size > MAX_DECODED_BYTES {
        return Err(StampError::ImageLoad(format!(
            "image too large: {}x{} needs {} bytes, limit is {}",
            width, height, buffer_size, MAX_DECODED_BYTES
        )));
    }

    let mut buffer = vec![0; buffer_size];
    let frame = reader
        .next_frame(&mut buffer)
        .map_err(|e| StampError::ImageLoad(format!("invalid PNG: {}", e)))?;
    let data = &buffer[..frame.buffer_size()];

    if frame.width == 0 || frame.height == 0 {
        return Err(StampError::ImageLoad("image has no pixels".into()));
    }

    let (color_space, color, alpha) = match frame.color_type {
        png::ColorType::Grayscale => ("DeviceGray", data.to_vec(), None),
        png::ColorType::Rgb => ("DeviceRGB", data.to_vec(), None),
        png::ColorType::GrayscaleAlpha => {
            let (color, alpha) = split_alpha(data, 1);
            ("DeviceGray", color, Some(alpha))
        }
        png::ColorType::Rgba => {
            let (color, alpha) = split_alpha(data, 3);
            ("DeviceRGB", color, Some(alpha))
        }
        png::ColorType::Indexed => {
            return Err(StampError::ImageLoad(
                "indexed PNG was not expanded".into(),
            ));
        }
    };

    let image = Stream::new(
        image_dict(frame.width, frame.height, color_space, "FlateDecode"),
        deflate(&color)?,
    );
    let soft_mask = match alpha {
        Some(alpha) => Some(Stream::new(
            image_dict(frame.width, frame.height, "DeviceGray", "FlateDecode"),
            deflate(&alpha)?,
        )),
        None => None,
    };

    Ok(EmbeddedImage {
        width: frame.width,
        height: frame.height,
        image,
        soft_mask,
    })
}

/// Frame header fields of a JPEG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    width: u32,
    height: u32,
    components: u8,
}

/// Walk the marker segments up to the first start-of-frame
fn read_jpeg_frame(bytes: &[u8]) -> Option<JpegFrame> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut pos = 2;
    while pos + 1 < bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        match marker {
            // fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            // standalone markers
            0x01 | 0xD0..=0xD8 => {
                pos += 2;
                continue;
            }
            // end of image or start of scan before any frame
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let segment = bytes.get(pos + 2..)?;
        let length = u16::from_be_bytes([*segment.first()?, *segment.get(1)?]) as usize;
        if length < 2 {
            return None;
        }

        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // length(2) precision(1) height(2) width(2) components(1)
            let header = segment.get(..8)?;
            return Some(JpegFrame {
                height: u16::from_be_bytes([header[3], header[4]]) as u32,
                width: u16::from_be_bytes([header[5], header[6]]) as u32,
                components: header[7],
            });
        }

        pos += 2 + length;
    }
    None
}

fn embed_jpeg(bytes: &[u8]) -> Result<EmbeddedImage, StampError> {
    let frame = read_jpeg_frame(bytes)
        .ok_or_else(|| StampError::ImageLoad("invalid JPEG: no frame header".into()))?;

    if frame.width == 0 || frame.height == 0 {
        return Err(StampError::ImageLoad("image has no pixels".into()));
    }

    let color_space = match frame.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(StampError::ImageLoad(format!(
                "unsupported JPEG component count: {}",
                n
            )));
        }
    };

    Ok(EmbeddedImage {
        width: frame.width,
        height: frame.height,
        image: Stream::new(
            image_dict(frame.width, frame.height, color_space, "DCTDecode"),
            bytes.to_vec(),
        ),
        soft_mask: None,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Encode a solid-colour PNG for tests
    pub(crate) fn create_test_png(width: u32, height: u32, color: png::ColorType) -> Vec<u8> {
        let channels = match color {
            png::ColorType::Grayscale => 1,
            png::ColorType::GrayscaleAlpha => 2,
            png::ColorType::Rgb => 3,
            png::ColorType::Rgba => 4,
            png::ColorType::Indexed => 1,
        };
        let data = vec![0x80u8; (width * height) as usize * channels];

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);
            if color == png::ColorType::Indexed {
                encoder.set_palette(vec![0u8; 256 * 3]);
            }
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&data).unwrap();
        }
        out
    }

    /// Minimal JPEG header: SOI, APP0 and a baseline SOF0 segment
    pub(crate) fn create_test_jpeg(width: u16, height: u16, components: u8) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(b"JFIF\0\x01\x01\x00\x00\x01\x00\x01\x00\x00");
        let sof_len = 8 + 3 * components as u16;
        bytes.extend_from_slice(&[0xFF, 0xC0]);
        bytes.extend_from_slice(&sof_len.to_be_bytes());
        bytes.push(8);
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.push(components);
        for id in 0..components {
            bytes.extend_from_slice(&[id + 1, 0x11, 0x00]);
        }
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    /// PNG chunk with its CRC
    fn png_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut crc = flate2::Crc::new();
        crc.update(kind);
        crc.update(data);

        let mut chunk = (data.len() as u32).to_be_bytes().to_vec();
        chunk.extend_from_slice(kind);
        chunk.extend_from_slice(data);
        chunk.extend_from_slice(&crc.sum().to_be_bytes());
        chunk
    }

    /// A few dozen bytes claiming to be a `width` x `height` RGBA image
    fn create_oversized_png_header(width: u32, height: u32) -> Vec<u8> {
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        // bit depth 8, colour type 6 (RGBA), compression, filter, interlace
        ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);

        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend(png_chunk(b"IHDR", &ihdr));
        png.extend(png_chunk(b"IDAT", &deflate(&[0u8; 8]).unwrap()));
        png.extend(png_chunk(b"IEND", &[]));
        png
    }

    fn dict_name(dict: &Dictionary, key: &[u8]) -> Vec<u8> {
        dict.get(key).unwrap().as_name().unwrap().to_vec()
    }

    #[test]
    fn test_decode_rgb_png() {
        let image = EmbeddedImage::from_bytes(&create_test_png(4, 2, png::ColorType::Rgb)).unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert!(!image.has_alpha());
        assert_eq!(dict_name(&image.image.dict, b"ColorSpace"), b"DeviceRGB");
        assert_eq!(dict_name(&image.image.dict, b"Filter"), b"FlateDecode");
    }

    #[test]
    fn test_decode_rgba_png_has_soft_mask() {
        let image = EmbeddedImage::from_bytes(&create_test_png(3, 3, png::ColorType::Rgba)).unwrap();
        assert!(image.has_alpha());

        let mut doc = Document::with_version("1.5");
        let id = image.add_to(&mut doc);
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert!(stream.dict.get(b"SMask").unwrap().as_reference().is_ok());
    }

    #[test]
    fn test_decode_gray_and_indexed_png() {
        let gray = EmbeddedImage::from_bytes(&create_test_png(2, 2, png::ColorType::Grayscale)).unwrap();
        assert_eq!(dict_name(&gray.image.dict, b"ColorSpace"), b"DeviceGray");

        let indexed = EmbeddedImage::from_bytes(&create_test_png(2, 2, png::ColorType::Indexed)).unwrap();
        assert_eq!(dict_name(&indexed.image.dict, b"ColorSpace"), b"DeviceRGB");
    }

    #[test]
    fn test_jpeg_frame_header() {
        let image = EmbeddedImage::from_bytes(&create_test_jpeg(128, 64, 3)).unwrap();
        assert_eq!((image.width, image.height), (128, 64));
        assert_eq!(dict_name(&image.image.dict, b"Filter"), b"DCTDecode");
        assert_eq!(dict_name(&image.image.dict, b"ColorSpace"), b"DeviceRGB");

        let cmyk = EmbeddedImage::from_bytes(&create_test_jpeg(1, 1, 4)).unwrap();
        assert_eq!(dict_name(&cmyk.image.dict, b"ColorSpace"), b"DeviceCMYK");
    }

    #[test]
    fn test_jpeg_without_frame_fails() {
        let err = EmbeddedImage::from_bytes(&[0xFF, 0xD8, 0xFF, 0xD9]).unwrap_err();
        assert!(matches!(err, StampError::ImageLoad(_)));
    }

    #[test]
    fn test_rejects_gif_and_garbage() {
        assert!(matches!(
            EmbeddedImage::from_bytes(b"GIF89a\x01\x00\x01\x00"),
            Err(StampError::ImageLoad(_))
        ));
        assert!(matches!(
            EmbeddedImage::from_bytes(b"not an image"),
            Err(StampError::ImageLoad(_))
        ));
        assert!(matches!(
            EmbeddedImage::from_bytes(b"\x89PNG\r\n\x1a\ntruncated"),
            Err(StampError::ImageLoad(_))
        ));
    }

    #[test]
    fn test_huge_declared_dimensions_are_rejected() {
        let png = create_oversized_png_header(60_000, 60_000);
        assert!(png.len() < 128);
        assert_eq!(sniff(&png).kind(), Some(ContentKind::Png));

        let err = EmbeddedImage::from_bytes(&png).unwrap_err();
        assert!(matches!(err, StampError::ImageLoad(_)), "{:?}", err);
    }

    #[test]
    fn test_large_image_under_limit_decodes() {
        // 1024 x 1024 RGBA is 4 MiB decoded, well under the limit
        let png = create_test_png(1024, 1024, png::ColorType::Rgba);
        let image = EmbeddedImage::from_bytes(&png).unwrap();
        assert_eq!((image.width, image.height), (1024, 1024));
    }

    #[test]
    fn test_split_alpha() {
        let (color, alpha) = split_alpha(&[1, 2, 3, 4, 5, 6, 7, 8], 3);
        assert_eq!(color, vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(alpha, vec![4, 8]);
    }

    proptest! {
        #[test]
        fn jpeg_reader_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut bytes = vec![0xFF, 0xD8];
            bytes.extend(data);
            let _ = read_jpeg_frame(&bytes);
        }

        #[test]
        fn jpeg_dimensions_are_read(width in 1u16..4096, height in 1u16..4096) {
            let frame = read_jpeg_frame(&create_test_jpeg(width, height, 3)).unwrap();
            prop_assert_eq!(frame, JpegFrame { width: width as u32, height: height as u32, components: 3 });
        }
    }
}
