//! Image stamping onto PDF pages
//!
//! The image is added to the document once and drawn on every selected page
//! by appending a content stream. Existing page content is wrapped in a
//! `q`/`Q` pair so any graphics state it leaves behind cannot move the stamp.
//! Pages that are not selected keep their objects untouched.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::StampError;
use crate::image::EmbeddedImage;
use crate::job::{PageSelection, Placement};
use crate::output::write_atomic;

/// Guards against cyclic `/Parent` chains in malformed page trees
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when no `/MediaBox` is found on the page or its ancestors
const DEFAULT_MEDIA_BOX: MediaBox = MediaBox {
    left: 0.0,
    bottom: 0.0,
    top: 792.0,
};

/// Page origin and top edge in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
struct MediaBox {
    left: f64,
    bottom: f64,
    top: f64,
}

/// What a stamping run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampReport {
    pub page_count: u32,
    /// 1-based numbers of the pages that received the image
    pub stamped_pages: Vec<u32>,
}

/// Stamp `image` onto the PDF at `source` and atomically write the result to `output`
pub fn stamp_file(
    source: &Path,
    image: &Path,
    output: &Path,
    placement: &Placement,
    page: PageSelection,
) -> Result<StampReport, StampError> {
    let pdf = std::fs::read(source)
        .map_err(|e| StampError::PdfOpen(format!("{}: {}", source.display(), e)))?;
    let mut doc = load_document(&pdf)?;
    let image = EmbeddedImage::load(image)?;

    let report = stamp_pages(&mut doc, &image, placement, page)?;
    write_atomic(output, &save_document(&mut doc)?)?;

    tracing::info!(
        "Stamped {} of {} page(s) into {}",
        report.stamped_pages.len(),
        report.page_count,
        output.display()
    );
    Ok(report)
}

/// In-memory variant of [`stamp_file`]
pub fn stamp_document(
    pdf: &[u8],
    image: &EmbeddedImage,
    placement: &Placement,
    page: PageSelection,
) -> Result<(Vec<u8>, StampReport), StampError> {
    let mut doc = load_document(pdf)?;
    let report = stamp_pages(&mut doc, image, placement, page)?;
    Ok((save_document(&mut doc)?, report))
}

/// Number of pages in a PDF
pub fn page_count(pdf: &[u8]) -> Result<u32, StampError> {
    Ok(load_document(pdf)?.get_pages().len() as u32)
}

fn load_document(pdf: &[u8]) -> Result<Document, StampError> {
    let doc = Document::load_mem(pdf).map_err(|e| StampError::PdfOpen(e.to_string()))?;
    if doc.get_pages().is_empty() {
        return Err(StampError::PageCount("document has no pages".into()));
    }
    Ok(doc)
}

fn save_document(doc: &mut Document) -> Result<Vec<u8>, StampError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| StampError::Write(e.to_string()))?;
    Ok(buffer)
}

fn stamp_pages(
    doc: &mut Document,
    image: &EmbeddedImage,
    placement: &Placement,
    selection: PageSelection,
) -> Result<StampReport, StampError> {
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let targets: Vec<(u32, ObjectId)> = pages
        .into_iter()
        .filter(|(number, _)| selection.includes(*number))
        .collect();

    if targets.is_empty() {
        tracing::warn!(
            "Page selection {:?} matches none of {} page(s)",
            selection,
            page_count
        );
        return Ok(StampReport {
            page_count,
            stamped_pages: Vec::new(),
        });
    }

    let image_id = image.add_to(doc);
    let height = placement.height_for(image.width, image.height);
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

    let mut stamped_pages = Vec::with_capacity(targets.len());
    for (number, page_id) in targets {
        let name = register_xobject(doc, page_id, image_id)?;

        // Placement is measured from the top-left of the page, y downward
        let media_box = effective_media_box(doc, page_id)?;
        let left = media_box.left + placement.x;
        let bottom = media_box.top - placement.y - height;
        let content = format!(
            "\nq\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
            placement.width, height, left, bottom, name
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        wrap_page_contents(doc, page_id, save_id, restore_id, content_id)?;

        tracing::debug!("Stamped page {} as /{}", number, name);
        stamped_pages.push(number);
    }

    Ok(StampReport {
        page_count,
        stamped_pages,
    })
}

fn page_dictionary(doc: &Document, page_id: ObjectId) -> Result<&Dictionary, StampError> {
    doc.get_dictionary(page_id)
        .map_err(|e| StampError::PageCount(format!("page {:?}: {}", page_id, e)))
}

fn resolve_dictionary(doc: &Document, object: &Object) -> Dictionary {
    match object {
        Object::Dictionary(dict) => dict.clone(),
        Object::Reference(id) => doc
            .get_dictionary(*id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    }
}

/// Look up an inheritable page attribute on the page or its nearest ancestor
fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, StampError> {
    let mut node = page_dictionary(doc, page_id)?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Ok(Some(value));
        }
        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => node = page_dictionary(doc, parent)?,
            Err(_) => break,
        }
    }
    Ok(None)
}

/// Resources in effect for a page, following inheritance up the page tree
fn effective_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, StampError> {
    Ok(inherited_attribute(doc, page_id, b"Resources")?
        .map(|resources| resolve_dictionary(doc, resources))
        .unwrap_or_else(Dictionary::new))
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(*value as f64),
        _ => None,
    }
}

/// Media box in effect for a page, normalized to its lower-left and upper edges
fn effective_media_box(doc: &Document, page_id: ObjectId) -> Result<MediaBox, StampError> {
    let Some(object) = inherited_attribute(doc, page_id, b"MediaBox")? else {
        return Ok(DEFAULT_MEDIA_BOX);
    };
    let object = match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    };

    let corners: Option<Vec<f64>> = match object {
        Object::Array(items) if items.len() == 4 => items.iter().map(number).collect(),
        _ => None,
    };
    let Some(corners) = corners else {
        tracing::warn!("Page {:?} has a malformed /MediaBox, assuming Letter", page_id);
        return Ok(DEFAULT_MEDIA_BOX);
    };

    Ok(MediaBox {
        left: corners[0].min(corners[2]),
        bottom: corners[1].min(corners[3]),
        top: corners[1].max(corners[3]),
    })
}

/// Give the page its own resource dictionary naming the image, returning the name used
///
/// Shared resource objects are copied rather than edited so other pages are
/// unaffected.
fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    image_id: ObjectId,
) -> Result<String, StampError> {
    let mut resources = effective_resources(doc, page_id)?;
    let mut xobjects = match resources.get(b"XObject") {
        Ok(object) => resolve_dictionary(doc, object),
        Err(_) => Dictionary::new(),
    };

    let mut index = 0;
    let name = loop {
        let candidate = format!("Stamp{}", index);
        if !xobjects.has(candidate.as_bytes()) {
            break candidate;
        }
        index += 1;
    };

    xobjects.set(name.clone(), Object::Reference(image_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_dictionary_mut(page_id)
        .map_err(|e| StampError::PageCount(format!("page {:?}: {}", page_id, e)))?
        .set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// Replace the page's contents with `save, <existing...>, restore, stamp`
fn wrap_page_contents(
    doc: &mut Document,
    page_id: ObjectId,
    save_id: ObjectId,
    restore_id: ObjectId,
    content_id: ObjectId,
) -> Result<(), StampError> {
    let existing = match page_dictionary(doc, page_id)?.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(restore_id));
    contents.push(Object::Reference(content_id));

    doc.get_dictionary_mut(page_id)
        .map_err(|e| StampError::PageCount(format!("page {:?}: {}", page_id, e)))?
        .set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::image::tests::{create_test_jpeg, create_test_png};
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    /// Build a PDF with `num_pages` pages sharing a font resource on the page tree root
    pub(crate) fn create_test_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut page_ids: Vec<Object> = Vec::new();
        for i in 1..=num_pages {
            let content = format!("BT /F1 24 Tf 100 700 Td (Page {}) Tj ET", i);
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            page_ids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids,
                "Count" => num_pages as i64,
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn placement() -> Placement {
        Placement {
            x: 100.0,
            y: 50.0,
            width: 120.0,
        }
    }

    fn test_image() -> EmbeddedImage {
        EmbeddedImage::from_bytes(&create_test_png(4, 2, png::ColorType::Rgba)).unwrap()
    }

    /// Whether the page's own resources name an image XObject
    fn page_has_stamp(doc: &Document, page_id: ObjectId) -> bool {
        let page = doc.get_dictionary(page_id).unwrap();
        let Ok(resources) = page.get(b"Resources") else {
            return false;
        };
        let resources = resolve_dictionary(doc, resources);
        let Ok(xobjects) = resources.get(b"XObject") else {
            return false;
        };
        resolve_dictionary(doc, xobjects).iter().any(|(_, object)| {
            object
                .as_reference()
                .and_then(|id| doc.get_object(id))
                .and_then(Object::as_stream)
                .map(|stream| {
                    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
                })
                .unwrap_or(false)
        })
    }

    fn page_snapshot(doc: &Document, page_id: ObjectId) -> (String, Vec<u8>) {
        (
            format!("{:?}", doc.get_dictionary(page_id).unwrap()),
            doc.get_page_content(page_id).unwrap(),
        )
    }

    #[test]
    fn test_stamp_all_pages() {
        let pdf = create_test_pdf(3);
        let (out, report) =
            stamp_document(&pdf, &test_image(), &placement(), PageSelection::All).unwrap();

        assert_eq!(
            report,
            StampReport {
                page_count: 3,
                stamped_pages: vec![1, 2, 3],
            }
        );

        let doc = Document::load_mem(&out).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);
        for page_id in pages.values() {
            assert!(page_has_stamp(&doc, *page_id));
        }
    }

    #[test]
    fn test_stamp_single_page_leaves_others_unchanged() {
        let pdf = create_test_pdf(3);
        let source = Document::load_mem(&pdf).unwrap();
        let (out, report) =
            stamp_document(&pdf, &test_image(), &placement(), PageSelection::Page(2)).unwrap();
        assert_eq!(report.stamped_pages, vec![2]);

        let doc = Document::load_mem(&out).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);
        assert!(page_has_stamp(&doc, pages[&2]));
        assert!(!page_has_stamp(&doc, pages[&1]));
        assert!(!page_has_stamp(&doc, pages[&3]));

        let source_pages = source.get_pages();
        for number in [1, 3] {
            assert_eq!(
                page_snapshot(&doc, pages[&number]),
                page_snapshot(&source, source_pages[&number])
            );
        }
    }

    #[test]
    fn test_stamp_content_draws_image_at_placement() {
        let pdf = create_test_pdf(1);
        let (out, _) =
            stamp_document(&pdf, &test_image(), &placement(), PageSelection::Page(1)).unwrap();

        let doc = Document::load_mem(&out).unwrap();
        let page_id = doc.get_pages()[&1];
        let content = String::from_utf8(doc.get_page_content(page_id).unwrap()).unwrap();

        // 4x2 image drawn 120 wide keeps its 2:1 ratio; its top edge sits
        // 50 below the top of the 792 high page
        assert!(content.contains("120 0 0 60 100 682 cm"), "{}", content);
        assert!(content.contains("/Stamp0 Do"));
        assert!(content.trim_start().starts_with('q'));
        assert!(content.contains("Page 1"));
    }

    #[test]
    fn test_placement_uses_inherited_offset_media_box() {
        let mut doc = Document::load_mem(&create_test_pdf(1)).unwrap();
        let page_id = doc.get_pages()[&1];
        let pages_id = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Parent")
            .unwrap()
            .as_reference()
            .unwrap();
        doc.get_dictionary_mut(page_id).unwrap().remove(b"MediaBox");
        doc.get_dictionary_mut(pages_id).unwrap().set(
            "MediaBox",
            vec![10.into(), 20.into(), 310.into(), 420.into()],
        );
        let mut pdf = Vec::new();
        doc.save_to(&mut pdf).unwrap();

        let (out, _) =
            stamp_document(&pdf, &test_image(), &placement(), PageSelection::All).unwrap();
        let doc = Document::load_mem(&out).unwrap();
        let content = doc.get_page_content(doc.get_pages()[&1]).unwrap();

        // left = 10 + 100, bottom = 420 - 50 - 60
        assert!(
            String::from_utf8_lossy(&content).contains("120 0 0 60 110 310 cm"),
            "{}",
            String::from_utf8_lossy(&content)
        );
    }

    #[test]
    fn test_media_box_defaults_and_normalizes() {
        let mut doc = Document::load_mem(&create_test_pdf(1)).unwrap();
        let page_id = doc.get_pages()[&1];

        doc.get_dictionary_mut(page_id).unwrap().set(
            "MediaBox",
            vec![200.into(), 300.into(), 0.into(), 0.into()],
        );
        assert_eq!(
            effective_media_box(&doc, page_id).unwrap(),
            MediaBox {
                left: 0.0,
                bottom: 0.0,
                top: 300.0,
            }
        );

        doc.get_dictionary_mut(page_id).unwrap().remove(b"MediaBox");
        assert_eq!(effective_media_box(&doc, page_id).unwrap(), DEFAULT_MEDIA_BOX);
    }

    #[test]
    fn test_inherited_resources_are_kept() {
        let pdf = create_test_pdf(2);
        let (out, _) =
            stamp_document(&pdf, &test_image(), &placement(), PageSelection::Page(1)).unwrap();

        let doc = Document::load_mem(&out).unwrap();
        let page = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
        let resources = resolve_dictionary(&doc, page.get(b"Resources").unwrap());
        let fonts = resolve_dictionary(&doc, resources.get(b"Font").unwrap());
        assert!(fonts.has(b"F1"));
    }

    #[test]
    fn test_image_added_once_for_all_pages() {
        let pdf = create_test_pdf(4);
        let (out, _) =
            stamp_document(&pdf, &test_image(), &placement(), PageSelection::All).unwrap();

        let doc = Document::load_mem(&out).unwrap();
        let images = doc
            .objects
            .values()
            .filter_map(|object| object.as_stream().ok())
            .filter(|stream| {
                matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
                    && stream.dict.has(b"SMask")
            })
            .count();
        assert_eq!(images, 1);
    }

    #[test]
    fn test_page_past_end_stamps_nothing() {
        let pdf = create_test_pdf(3);
        let (out, report) =
            stamp_document(&pdf, &test_image(), &placement(), PageSelection::Page(7)).unwrap();
        assert_eq!(report.page_count, 3);
        assert!(report.stamped_pages.is_empty());

        let doc = Document::load_mem(&out).unwrap();
        assert!(doc.get_pages().values().all(|id| !page_has_stamp(&doc, *id)));
    }

    #[test]
    fn test_jpeg_stamp() {
        let image = EmbeddedImage::from_bytes(&create_test_jpeg(200, 100, 3)).unwrap();
        let (out, report) =
            stamp_document(&create_test_pdf(1), &image, &placement(), PageSelection::All).unwrap();
        assert_eq!(report.stamped_pages, vec![1]);

        let doc = Document::load_mem(&out).unwrap();
        let content = doc.get_page_content(doc.get_pages()[&1]).unwrap();
        assert!(String::from_utf8_lossy(&content).contains("120 0 0 60 100 682 cm"));
    }

    #[test]
    fn test_invalid_pdf() {
        let err = stamp_document(b"not a pdf", &test_image(), &placement(), PageSelection::All)
            .unwrap_err();
        assert!(matches!(err, StampError::PdfOpen(_)));
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(&create_test_pdf(5)).unwrap(), 5);
    }

    #[test]
    fn test_stamp_file_writes_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("in.pdf");
        let image = dir.path().join("sig.png");
        let output = dir.path().join("out.pdf");
        std::fs::write(&source, create_test_pdf(2)).unwrap();
        std::fs::write(&image, create_test_png(8, 8, png::ColorType::Rgb)).unwrap();

        let report = stamp_file(&source, &image, &output, &placement(), PageSelection::All).unwrap();
        assert_eq!(report.stamped_pages, vec![1, 2]);
        assert_eq!(page_count(&std::fs::read(&output).unwrap()).unwrap(), 2);
    }

    #[test]
    fn test_stamp_file_failure_leaves_no_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("in.pdf");
        let image = dir.path().join("sig.gif");
        let output = dir.path().join("out.pdf");
        std::fs::write(&source, create_test_pdf(1)).unwrap();
        std::fs::write(&image, b"GIF89a\x01\x00\x01\x00\x00\x00\x00;").unwrap();

        let err = stamp_file(&source, &image, &output, &placement(), PageSelection::All).unwrap_err();
        assert!(matches!(err, StampError::ImageLoad(_)));
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
