//! Page-preserving concatenation of whole PDFs.
//!
//! Each input is renumbered into its own object-id range, its pages are
//! re-parented under one new Pages node in input order, and every other
//! object is carried over untouched. Attributes a page inherits from its
//! original Pages ancestors are copied onto the page first, since those
//! ancestors are not carried over.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::util::{ensure_distinct_output, write_atomically};
use super::objects::{self, INHERITABLE_KEYS};

/// Merge the PDFs at `inputs`, in order, into `output`.
///
/// Every input is loaded before anything is written; on any failure no file
/// appears at `output`. Returns the page count of the merged document.
pub fn merge_files<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<usize> {
    if inputs.is_empty() {
        return Err(Error::EmptyInput);
    }
    ensure_distinct_output(inputs, output)?;

    let mut documents = Vec::with_capacity(inputs.len());
    for path in inputs {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::document_access(path, e.to_string()))?;
        let doc = Document::load_mem(&bytes).map_err(|e| Error::document_access(path, e.to_string()))?;
        debug!("Loaded {} ({} pages)", path.display(), doc.get_pages().len());
        documents.push(doc);
    }

    let (bytes, page_count) = combine_documents(documents)?;
    write_atomically(output, &bytes)?;

    info!(
        "Merged {} document(s), {} page(s) -> {}",
        inputs.len(),
        page_count,
        output.display()
    );
    Ok(page_count)
}

/// Combine in-memory PDFs into one document, in order.
pub fn combine_pdfs(inputs: &[Vec<u8>]) -> Result<Vec<u8>> {
    if inputs.is_empty() {
        return Err(Error::EmptyInput);
    }

    let documents = inputs
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            Document::load_mem(bytes)
                .map_err(|e| Error::Lopdf(format!("Failed to load document {}: {e}", i + 1)))
        })
        .collect::<Result<Vec<_>>>()?;

    combine_documents(documents).map(|(bytes, _)| bytes)
}

/// Copy inherited attributes onto every page so the page is self-contained.
fn flatten_inherited(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        let missing: Vec<(&[u8], Object)> = INHERITABLE_KEYS
            .iter()
            .filter(|key| {
                doc.get_object(page_id)
                    .and_then(Object::as_dict)
                    .is_ok_and(|dict| !dict.has(key))
            })
            .filter_map(|key| objects::inherited(doc, page_id, key).map(|value| (*key, value)))
            .collect();

        if let Ok(dict) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in missing {
                dict.set(key.to_vec(), value);
            }
        }
    }
}

fn combine_documents(documents: Vec<Document>) -> Result<(Vec<u8>, usize)> {
    let mut max_id: u32 = 1;
    let mut version = String::from("1.5");
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut carried: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        flatten_inherited(&mut doc);
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;
        if doc.version > version {
            version.clone_from(&doc.version);
        }

        // get_pages is keyed by page number, so this is page order
        for page_id in doc.get_pages().into_values() {
            if let Ok(dict) = doc.get_object(page_id).and_then(Object::as_dict) {
                pages.push((page_id, dict.clone()));
            }
        }

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    carried.insert(object_id, object);
                }
            }
        }
    }

    let mut document = Document::with_version(version);
    document.objects = carried;
    document.max_id = max_id;

    let pages_id = document.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());
    for (page_id, mut dict) in pages {
        dict.set("Parent", Object::Reference(pages_id));
        document.objects.insert(page_id, Object::Dictionary(dict));
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len();
    let count = i64::try_from(page_count)
        .map_err(|_| Error::Lopdf("Too many pages to merge".to_string()))?;
    document.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );

    let catalog_id = document.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    document.trailer.set("Root", Object::Reference(catalog_id));

    document.compress();

    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|e| Error::PdfSave(format!("Failed to save merged PDF: {e}")))?;

    Ok((output, page_count))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pdf::test_support::{pdf_with_pages, run, single_page_pdf};

    fn page_texts(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        let pages = doc.get_pages();
        let numbers: Vec<u32> = pages.keys().copied().collect();
        numbers
            .iter()
            .map(|n| doc.extract_text(&[*n]).unwrap().trim().to_string())
            .collect()
    }

    #[test]
    fn test_combine_empty_is_rejected() {
        assert!(matches!(combine_pdfs(&[]), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_combine_keeps_input_and_page_order() {
        let first = pdf_with_pages(&[&[run("A1", 72, 700)], &[run("A2", 72, 700)]]);
        let second = single_page_pdf("B1");
        let third = pdf_with_pages(&[&[run("C1", 72, 700)], &[run("C2", 72, 700)], &[run("C3", 72, 700)]]);

        let merged = combine_pdfs(&[first, second, third]).unwrap();
        assert_eq!(page_texts(&merged), vec!["A1", "A2", "B1", "C1", "C2", "C3"]);
    }

    #[test]
    fn test_combine_copies_inherited_attributes() {
        let mut doc = Document::load_mem(&single_page_pdf("X")).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let parent_id = {
            let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
            page.remove(b"MediaBox");
            page.get(b"Parent").unwrap().as_reference().unwrap()
        };
        doc.get_object_mut(parent_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("MediaBox", Object::Array(vec![0.into(), 0.into(), 300.into(), 400.into()]));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let merged = combine_pdfs(&[bytes, single_page_pdf("Y")]).unwrap();
        let merged = Document::load_mem(&merged).unwrap();
        let first_page = merged.get_pages()[&1];
        assert_eq!(objects::media_box(&merged, first_page), [0.0, 0.0, 300.0, 400.0]);
    }

    #[test]
    fn test_merge_files_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, single_page_pdf("first")).unwrap();
        std::fs::write(&b, pdf_with_pages(&[&[run("second", 72, 700)], &[run("third", 72, 700)]])).unwrap();

        let out = dir.path().join("merged.pdf");
        let pages = merge_files(&[&a, &b], &out).unwrap();
        assert_eq!(pages, 3);
        assert_eq!(page_texts(&std::fs::read(&out).unwrap()), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_merge_files_missing_input_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        std::fs::write(&a, single_page_pdf("first")).unwrap();
        let missing = dir.path().join("missing.pdf");
        let out = dir.path().join("merged.pdf");

        let err = merge_files(&[a.clone(), a, missing.clone()], &out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DocumentAccess);
        assert!(err.to_string().contains(&missing.display().to_string()));
        assert!(!out.exists());
    }

    #[test]
    fn test_merge_files_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("merged.pdf");
        let inputs: [&Path; 0] = [];
        assert!(matches!(merge_files(&inputs, &out), Err(Error::EmptyInput)));
        assert!(!out.exists());
    }
}
