//! PDF page merging and image wrapping with lopdf.

use std::path::Path;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::ReportError;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"Resources", b"CropBox", b"Rotate"];

/// A4 in PDF points.
const A4_WIDTH: i64 = 595;
const A4_HEIGHT: i64 = 842;
const IMAGE_MARGIN: f32 = 20.0;

/// Concatenate PDFs in order, preserving each document's page order.
pub fn merge_pdfs(sources: &[Vec<u8>]) -> Result<Vec<u8>, ReportError> {
    let mut merged = Document::with_version("1.5");
    let pages_id = merged.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for (index, bytes) in sources.iter().enumerate() {
        let mut doc = Document::load_mem(bytes)
            .map_err(|e| ReportError::Pdf(format!("document {}: {}", index + 1, e)))?;
        doc.renumber_objects_with(merged.max_id + 1);

        // get_pages() is keyed by page number, so values come out in page order.
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(ReportError::Pdf(format!("document {} has no pages", index + 1)));
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for page_id in page_ids {
            let mut page = flatten_page(&doc, page_id)?;
            page.set("Parent", pages_id);
            pages.push((page_id, page));
        }

        let max_id = doc.max_id;
        for (id, object) in doc.objects {
            if matches!(type_name(&object), Some(b"Catalog") | Some(b"Pages")) {
                continue;
            }
            merged.objects.insert(id, object);
        }
        for (id, page) in pages {
            merged.objects.insert(id, Object::Dictionary(page));
            kids.push(Object::Reference(id));
        }
        merged.max_id = merged.max_id.max(max_id);
    }

    let count = kids.len() as i64;
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.compress();

    save(&mut merged)
}

/// Number of pages in a PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize, ReportError> {
    let doc = Document::load_mem(bytes).map_err(|e| ReportError::Pdf(e.to_string()))?;
    Ok(doc.get_pages().len())
}

/// Wrap a raster image into a one-page A4 PDF, scaled to fit.
pub fn image_to_pdf(path: &Path) -> Result<Vec<u8>, ReportError> {
    let image = image::open(path)
        .map_err(|e| ReportError::Image(format!("{}: {}", path.display(), e)))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ReportError::Image(format!("{}: empty image", path.display())));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        image.into_raw(),
    ));

    let (page_w, page_h) = (A4_WIDTH as f32, A4_HEIGHT as f32);
    let usable_w = page_w - 2.0 * IMAGE_MARGIN;
    let usable_h = page_h - 2.0 * IMAGE_MARGIN;
    let scale = (usable_w / width as f32).min(usable_h / height as f32);
    let draw_w = width as f32 * scale;
    let draw_h = height as f32 * scale;
    let x = (page_w - draw_w) / 2.0;
    let y = (page_h - draw_h) / 2.0;

    let content = format!(
        "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /Im0 Do Q",
        draw_w, draw_h, x, y
    );
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), A4_WIDTH.into(), A4_HEIGHT.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    save(&mut doc)
}

/// Copy inherited attributes onto the page so it survives re-parenting.
fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, ReportError> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| ReportError::Pdf(format!("page {:?}: {}", page_id, e)))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        // Guard against cyclic Parent links in broken files.
        if depth > 64 {
            break;
        }
        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    if !page.has(b"MediaBox") {
        page.set(
            "MediaBox",
            vec![0.into(), 0.into(), A4_WIDTH.into(), A4_HEIGHT.into()],
        );
    }
    Ok(page)
}

fn type_name(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

fn save(doc: &mut Document) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| ReportError::Pdf(format!("save failed: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a PDF with one text page per label.
    pub(crate) fn text_pdf(labels: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for label in labels {
            let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", label);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        // MediaBox and Resources live on the tree node and must be inherited.
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => labels.len() as i64,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn page_texts(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let content = doc.get_page_content(id).unwrap();
                String::from_utf8_lossy(&content).into_owned()
            })
            .collect()
    }

    #[test]
    fn test_merge_preserves_order_and_count() {
        let first = text_pdf(&["summary"]);
        let second = text_pdf(&["page-one", "page-two", "page-three"]);

        let merged = merge_pdfs(&[first, second]).unwrap();
        assert_eq!(page_count(&merged).unwrap(), 4);

        let texts = page_texts(&merged);
        assert!(texts[0].contains("summary"));
        assert!(texts[1].contains("page-one"));
        assert!(texts[2].contains("page-two"));
        assert!(texts[3].contains("page-three"));
    }

    #[test]
    fn test_merge_flattens_inherited_attributes() {
        let merged = merge_pdfs(&[text_pdf(&["a", "b"])]).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        for page_id in doc.get_pages().into_values() {
            let page = doc.get_dictionary(page_id).unwrap();
            assert!(page.has(b"MediaBox"));
            assert!(page.has(b"Resources"));
        }
    }

    #[test]
    fn test_merge_rejects_garbage() {
        let err = merge_pdfs(&[text_pdf(&["ok"]), b"not a pdf".to_vec()]).unwrap_err();
        assert!(err.to_string().contains("document 2"));
    }

    #[test]
    fn test_image_becomes_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beleg.png");
        image::RgbImage::from_pixel(40, 60, image::Rgb([200, 10, 10]))
            .save(&path)
            .unwrap();

        let pdf = image_to_pdf(&path).unwrap();
        assert_eq!(page_count(&pdf).unwrap(), 1);
    }

    #[test]
    fn test_undecodable_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(matches!(image_to_pdf(&path), Err(ReportError::Image(_))));
    }
}
