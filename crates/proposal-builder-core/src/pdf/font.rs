//! Standard Helvetica font for filled text.
//!
//! Filled values use the base-14 Helvetica font with `WinAnsiEncoding`, which
//! every PDF viewer provides without embedding. Characters outside the
//! encoding are drawn as `?`.

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::{Error, Result};
use super::objects;

/// Resource name preferred for the filler font.
const FONT_RESOURCE_NAME: &str = "FFill";

/// Helvetica advance widths (1/1000 em) for codes 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Width used for Latin-1 codes above the ASCII table.
const LATIN1_DEFAULT_WIDTH: u16 = 556;

/// Helvetica with `WinAnsiEncoding`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFont;

impl StandardFont {
    /// Map a character to its single-byte code, substituting `?`.
    pub fn encode_char(c: char) -> u8 {
        match u32::from(c) {
            code @ 0x20..=0x7E => u8::try_from(code).unwrap_or(b'?'),
            code @ 0xA0..=0xFF => u8::try_from(code).unwrap_or(b'?'),
            0x2018 => 0x91,
            0x2019 => 0x92,
            0x201C => 0x93,
            0x201D => 0x94,
            0x2013 => 0x96,
            0x2014 => 0x97,
            0x20AC => 0x80,
            _ if c.is_whitespace() => b' ',
            _ => b'?',
        }
    }

    /// Encode text as `WinAnsiEncoding` bytes.
    pub fn encode(text: &str) -> Vec<u8> {
        text.chars().map(Self::encode_char).collect()
    }

    /// Text as a literal string operand for `Tj`.
    pub fn text_operand(text: &str) -> Object {
        Object::String(Self::encode(text), StringFormat::Literal)
    }

    fn code_width(code: u8) -> u16 {
        match code {
            32..=126 => HELVETICA_WIDTHS[usize::from(code - 32)],
            _ => LATIN1_DEFAULT_WIDTH,
        }
    }

    /// Width of `text` in points at `font_size`.
    pub fn string_width(text: &str, font_size: f32) -> f32 {
        let units: u32 = Self::encode(text)
            .into_iter()
            .map(|code| u32::from(Self::code_width(code)))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let units = units as f32;
        units * font_size / 1000.0
    }

    /// Register the font on a page and return the resource name to use with `Tf`.
    ///
    /// Resources may be inline, indirect or inherited; the merged dictionary
    /// is written back inline on the page so siblings are not affected.
    pub fn add_to_page(doc: &mut Document, page_id: ObjectId) -> Result<String> {
        let font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));

        let mut resources = objects::page_resources(doc, page_id);
        let mut fonts = resources
            .get(b"Font")
            .ok()
            .and_then(|obj| objects::resolve_dict(doc, obj))
            .unwrap_or_default();

        let name = unused_name(&fonts);
        fonts.set(name.as_bytes().to_vec(), Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;
        page.set("Resources", Object::Dictionary(resources));

        Ok(name)
    }
}

/// First of `FFill`, `FFill1`, `FFill2`... not already used by the page.
fn unused_name(fonts: &Dictionary) -> String {
    if !fonts.has(FONT_RESOURCE_NAME.as_bytes()) {
        return FONT_RESOURCE_NAME.to_string();
    }
    (1..)
        .map(|n| format!("{FONT_RESOURCE_NAME}{n}"))
        .find(|candidate| !fonts.has(candidate.as_bytes()))
        .unwrap_or_else(|| FONT_RESOURCE_NAME.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_latin1_and_fallback() {
        assert_eq!(StandardFont::encode("Ab1"), b"Ab1");
        assert_eq!(StandardFont::encode("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(StandardFont::encode("日本"), b"??");
        assert_eq!(StandardFont::encode("a\tb"), b"a b");
    }

    #[test]
    fn test_string_width() {
        // "Hi" = H(722) + i(222)
        let width = StandardFont::string_width("Hi", 10.0);
        assert!((width - 9.44).abs() < 1e-4);
        assert!(StandardFont::string_width("", 12.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_width_table_lines_up() {
        assert_eq!(StandardFont::code_width(b' '), 278);
        assert_eq!(StandardFont::code_width(b'@'), 1015);
        assert_eq!(StandardFont::code_width(b'W'), 944);
        assert_eq!(StandardFont::code_width(b'~'), 584);
    }

    #[test]
    fn test_add_to_page_keeps_existing_fonts() {
        let mut doc = Document::with_version("1.5");
        let existing = Dictionary::from_iter([("FFill", Object::Integer(0)), ("F1", Object::Integer(0))]);
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Resources", Object::Dictionary(Dictionary::from_iter([("Font", Object::Dictionary(existing))]))),
        ]));

        let name = StandardFont::add_to_page(&mut doc, page_id).unwrap();
        assert_eq!(name, "FFill1");

        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let fonts = page.get(b"Resources").unwrap().as_dict().unwrap().get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"FFill1"));
    }
}
