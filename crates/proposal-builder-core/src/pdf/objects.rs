//! Page-tree lookups shared by the filler and the merger.
//!
//! Several page attributes (Resources, MediaBox, CropBox, Rotate) may be set
//! on an ancestor Pages node instead of the page itself. These helpers walk
//! the Parent chain with a depth limit so a cyclic tree cannot loop forever.

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Attributes a page may inherit from its Pages ancestors.
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Fallback page size (US Letter) when no MediaBox is found anywhere.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

const MAX_TREE_DEPTH: usize = 32;

/// Look up `key` on a page, falling back to its Pages ancestors.
pub fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_object(current).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Resolve an object that should be a dictionary, following one reference.
pub fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Dictionary(d)) => Some(d.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Resources of a page, own or inherited; empty when none exist.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve_dict(doc, &obj))
        .unwrap_or_default()
}

/// MediaBox of a page as `[x0, y0, x1, y1]`, own or inherited.
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    rectangle(doc, page_id, b"MediaBox").unwrap_or(DEFAULT_MEDIA_BOX)
}

/// The box a viewer shows: CropBox when present, MediaBox otherwise.
///
/// MuPDF page coordinates are relative to this box's top-left corner.
pub fn visible_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    rectangle(doc, page_id, b"CropBox").unwrap_or_else(|| media_box(doc, page_id))
}

fn rectangle(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let arr = match inherited(doc, page_id, key)? {
        Object::Array(arr) => arr,
        Object::Reference(id) => doc.get_object(id).and_then(Object::as_array).ok()?.clone(),
        _ => return None,
    };

    let values: Vec<f32> = arr.iter().filter_map(number).collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Some([x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)]),
        _ => None,
    }
}

/// Numeric value of an Integer or Real object.
#[allow(clippy::cast_precision_loss)]
pub fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
