use mupdf::TextPageOptions;

use crate::error::{Error, Result};
use super::document::PdfDocument;
use super::page_index::PageIndex;

/// Bounding box in MuPDF page coordinates (top-left origin, y down)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest box containing both.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Create from mupdf Quad (4 points defining a quadrilateral)
    pub const fn from_quad(quad: &mupdf::Quad) -> Self {
        let x0 = quad.ul.x.min(quad.ur.x).min(quad.ll.x).min(quad.lr.x);
        let y0 = quad.ul.y.min(quad.ur.y).min(quad.ll.y).min(quad.lr.y);
        let x1 = quad.ul.x.max(quad.ur.x).max(quad.ll.x).max(quad.lr.x);
        let y1 = quad.ul.y.max(quad.ur.y).max(quad.ll.y).max(quad.lr.y);
        Self { x0, y0, x1, y1 }
    }
}

/// One line of positioned characters, in text-drawing order.
#[derive(Debug, Clone, Default)]
pub struct TextLine {
    pub chars: Vec<(char, BoundingBox)>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.chars.iter().map(|(c, _)| *c).collect()
    }

    /// Every non-overlapping occurrence of `needle` in this line, left to right.
    ///
    /// Returns the union of the matched glyph boxes for each hit. An empty
    /// needle matches nothing.
    pub fn find(&self, needle: &str) -> Vec<BoundingBox> {
        let needle: Vec<char> = needle.chars().collect();
        let mut hits = Vec::new();
        if needle.is_empty() || needle.len() > self.chars.len() {
            return hits;
        }

        let mut start = 0;
        while start + needle.len() <= self.chars.len() {
            let window = &self.chars[start..start + needle.len()];
            if window.iter().map(|(c, _)| *c).eq(needle.iter().copied()) {
                let bbox = window
                    .iter()
                    .map(|(_, b)| *b)
                    .reduce(BoundingBox::union)
                    .unwrap_or(window[0].1);
                hits.push(bbox);
                start += needle.len();
            } else {
                start += 1;
            }
        }

        hits
    }
}

/// Text location on PDF pages
pub struct TextExtractor<'a> {
    /// The PDF document to extract text from
    pub doc: &'a PdfDocument,
}

impl<'a> TextExtractor<'a> {
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self { doc }
    }

    /// Positioned lines of a page in mupdf's structured-text order.
    pub fn page_lines(&self, page_num: usize) -> Result<Vec<TextLine>> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;

        let doc = self.doc.open_document()?;
        let page = doc.load_page(page_index.into()).map_err(|e| {
            Error::PdfTextExtraction {
                page: page_num,
                reason: format!("Failed to load page: {e}"),
            }
        })?;

        let text_page = page.to_text_page(TextPageOptions::empty()).map_err(|e| {
            Error::PdfTextExtraction {
                page: page_num,
                reason: format!("Failed to get text page: {e}"),
            }
        })?;

        let mut lines = Vec::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                let chars: Vec<(char, BoundingBox)> = line
                    .chars()
                    .filter_map(|tc| tc.char().map(|c| (c, BoundingBox::from_quad(&tc.quad()))))
                    .collect();
                if !chars.is_empty() {
                    lines.push(TextLine { chars });
                }
            }
        }

        Ok(lines)
    }

    /// All occurrences of `needle` on a page, in text-drawing order.
    pub fn find_text(&self, page_num: usize, needle: &str) -> Result<Vec<BoundingBox>> {
        Ok(self
            .page_lines(page_num)?
            .iter()
            .flat_map(|line| line.find(needle))
            .collect())
    }

    /// Plain text of a page, one line per structured-text line.
    pub fn get_page_text(&self, page_num: usize) -> Result<String> {
        let mut all_text = String::new();
        for line in self.page_lines(page_num)? {
            all_text.push_str(&line.text());
            all_text.push('\n');
        }
        Ok(all_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out `text` as 10pt-wide glyphs starting at `x`.
    #[allow(clippy::cast_precision_loss)]
    fn line(text: &str, x: f32, y: f32) -> TextLine {
        TextLine {
            chars: text
                .chars()
                .enumerate()
                .map(|(i, c)| {
                    let x0 = x + i as f32 * 10.0;
                    (c, BoundingBox::new(x0, y, x0 + 10.0, y + 12.0))
                })
                .collect(),
        }
    }

    #[test]
    fn test_find_single_occurrence() {
        let hits = line("Name: ____", 100.0, 50.0).find("Name:");
        assert_eq!(hits, vec![BoundingBox::new(100.0, 50.0, 150.0, 62.0)]);
    }

    #[test]
    fn test_find_multiple_non_overlapping() {
        let hits = line("aaaa", 0.0, 0.0).find("aa");
        assert_eq!(hits.len(), 2);
        assert!((hits[1].x0 - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_find_absent_and_empty() {
        let l = line("Phone", 0.0, 0.0);
        assert!(l.find("Email").is_empty());
        assert!(l.find("").is_empty());
        assert!(l.find("Phone number").is_empty());
    }

    #[test]
    fn test_union() {
        let a = BoundingBox::new(0.0, 5.0, 10.0, 15.0);
        let b = BoundingBox::new(5.0, 0.0, 20.0, 10.0);
        assert_eq!(a.union(b), BoundingBox::new(0.0, 0.0, 20.0, 15.0));
        assert!((a.width() - 10.0).abs() < f32::EPSILON);
        assert!((a.height() - 10.0).abs() < f32::EPSILON);
    }
}
