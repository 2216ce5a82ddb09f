//! Anchor-based text filling.
//!
//! # Coordinate System
//!
//! Anchors are located with MuPDF, whose page space has a **top-left origin**
//! relative to the page's visible box (CropBox, else MediaBox). PDF content
//! streams use a **bottom-left origin**. For a visible box `[bx0, by0, bx1, by1]`:
//! ```text
//! pdf_x = bx0 + mupdf_x
//! pdf_y = by1 - mupdf_y
//! ```
//!
//! # Overlay Strategy
//!
//! The page's existing content is wrapped in `q`/`Q` so any transformation it
//! leaves behind is discarded, then one extra content stream draws:
//! 1. White rectangles over anchors with [`Placement::Replace`]
//! 2. The replacement text for every matched anchor occurrence

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{FillConfig, TextColor};
use crate::error::{Error, Result};
use crate::util::{ensure_distinct_output, write_atomically};
use super::document::PdfDocument;
use super::font::StandardFont;
use super::objects;
use super::page_index::PageIndex;
use super::text::{BoundingBox, TextExtractor};

// =============================================================================
// Layout Constants
// =============================================================================

/// Font size as a fraction of the anchor's glyph-box height.
const SIZE_PER_GLYPH_HEIGHT: f32 = 0.85;

/// Bounds for estimated font sizes (in points).
const MIN_FONT_SIZE: f32 = 6.0;
const MAX_FONT_SIZE: f32 = 36.0;

/// Portion of the glyph box below the baseline.
const DESCENT_RATIO: f32 = 0.2;

/// Space between an anchor and inline text (in points).
const INLINE_GAP: f32 = 1.0;

/// Baseline distance for [`Placement::Below`], as a multiple of font size.
const LINE_HEIGHT_FACTOR: f32 = 1.25;

/// Padding around cover rectangles (in points).
const COVER_PADDING: f32 = 1.0;

/// Clearance kept between filled text and the right edge of the page (in points).
const EDGE_MARGIN: f32 = 2.0;

// =============================================================================
// Public Types
// =============================================================================

/// Where replacement text goes relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// After the anchor, on the same baseline
    #[default]
    Inline,
    /// On the next line, left-aligned with the anchor
    Below,
    /// Over the anchor, which is hidden under a white box
    Replace,
}

/// Which occurrences of an anchor are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every occurrence on the page
    #[default]
    All,
    /// Only the first occurrence in text-drawing order
    First,
}

/// A known string on the page and the text to draw next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAnchor {
    pub search_text: String,
    pub replacement_text: String,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl FieldAnchor {
    pub fn new(search_text: impl Into<String>, replacement_text: impl Into<String>) -> Self {
        Self {
            search_text: search_text.into(),
            replacement_text: replacement_text.into(),
            placement: Placement::default(),
            match_mode: MatchMode::default(),
        }
    }

    #[must_use]
    pub const fn placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub const fn match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }
}

/// How many times one anchor was filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcome {
    pub search_text: String,
    pub drawn: usize,
}

/// Summary of a fill operation
#[derive(Debug, Clone)]
pub struct FillReport {
    /// Page that was filled (0-indexed)
    pub page: usize,
    /// Page count of the output, equal to the source's
    pub page_count: usize,
    /// One entry per requested anchor, in request order
    pub fields: Vec<FieldOutcome>,
}

impl FillReport {
    /// Anchors that were not found on the page.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.drawn == 0)
            .map(|f| f.search_text.as_str())
    }

    /// Total number of text insertions.
    pub fn total_drawn(&self) -> usize {
        self.fields.iter().map(|f| f.drawn).sum()
    }
}

// =============================================================================
// Layout
// =============================================================================

/// One piece of text positioned in PDF space.
#[derive(Debug, Clone, PartialEq)]
struct Placed {
    text: String,
    x: f32,
    baseline: f32,
    font_size: f32,
    /// `[x, y, width, height]` of a white cover rectangle
    cover: Option<[f32; 4]>,
}

fn estimate_font_size(bbox: &BoundingBox) -> f32 {
    (bbox.height() * SIZE_PER_GLYPH_HEIGHT).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Shrink `font_size` so `text` ends within `available` points, down to the minimum size.
fn fit_to_width(text: &str, font_size: f32, available: f32) -> f32 {
    let width = StandardFont::string_width(text, font_size);
    if width <= available || width <= 0.0 || available <= 0.0 {
        return font_size;
    }
    (font_size * available / width).max(MIN_FONT_SIZE.min(font_size))
}

/// Position `text` relative to an anchor hit found in MuPDF space.
fn layout(
    text: &str,
    hit: &BoundingBox,
    placement: Placement,
    visible_box: &[f32; 4],
    font_size: f32,
) -> Placed {
    let to_pdf_x = |x: f32| visible_box[0] + x;
    let to_pdf_y = |y: f32| visible_box[3] - y;

    let anchor_baseline = hit.y1 - hit.height() * DESCENT_RATIO;

    let (x, baseline, cover) = match placement {
        Placement::Inline => (hit.x1 + INLINE_GAP, anchor_baseline, None),
        Placement::Below => (hit.x0, anchor_baseline + font_size * LINE_HEIGHT_FACTOR, None),
        Placement::Replace => {
            let cover = [
                to_pdf_x(hit.x0) - COVER_PADDING,
                to_pdf_y(hit.y1) - COVER_PADDING,
                hit.width() + 2.0 * COVER_PADDING,
                hit.height() + 2.0 * COVER_PADDING,
            ];
            (hit.x0, anchor_baseline, Some(cover))
        }
    };

    let page_width = visible_box[2] - visible_box[0];
    let font_size = fit_to_width(text, font_size, page_width - x - EDGE_MARGIN);

    Placed {
        text: text.to_string(),
        x: to_pdf_x(x),
        baseline: to_pdf_y(baseline),
        font_size,
        cover,
    }
}

fn overlay_operations(placed: &[Placed], font_name: &str, color: TextColor) -> Vec<Operation> {
    let mut ops = Vec::new();

    let covers: Vec<[f32; 4]> = placed.iter().filter_map(|p| p.cover).collect();
    if !covers.is_empty() {
        ops.push(Operation::new("rg", vec![1.0_f32.into(), 1.0_f32.into(), 1.0_f32.into()]));
        for [x, y, w, h] in covers {
            ops.push(Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]));
            ops.push(Operation::new("f", vec![]));
        }
    }

    ops.push(Operation::new("rg", vec![color.r.into(), color.g.into(), color.b.into()]));
    for p in placed {
        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font_name.as_bytes().to_vec()), p.font_size.into()]),
            // OCR layers leave invisible mode (3) behind
            Operation::new("Tr", vec![0.into()]),
            Operation::new("Td", vec![p.x.into(), p.baseline.into()]),
            Operation::new("Tj", vec![StandardFont::text_operand(&p.text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    ops
}

// =============================================================================
// Filler
// =============================================================================

/// Draws replacement text next to anchors on one page of a PDF.
#[derive(Debug, Clone, Default)]
pub struct FieldFiller {
    pub options: FillConfig,
}

impl FieldFiller {
    pub const fn new(options: FillConfig) -> Self {
        Self { options }
    }

    /// Fill `page_num` of the PDF at `source` and write the result to `output`.
    ///
    /// The output appears only if the whole operation succeeds, and `output`
    /// may not be `source` itself. Every failure reading `source` or
    /// addressing the page is a `DocumentAccess` error naming `source`.
    pub fn fill_file(
        &self,
        source: &Path,
        page_num: usize,
        anchors: &[FieldAnchor],
        output: &Path,
    ) -> Result<FillReport> {
        ensure_distinct_output(&[source], output)?;
        let doc = PdfDocument::from_file(source)?;
        let (bytes, report) = self
            .fill_document(&doc, page_num, anchors)
            .map_err(|e| e.at_path(source))?;
        write_atomically(output, &bytes)?;

        info!(
            "Filled {} field(s) on page {} of {} -> {}",
            report.total_drawn(),
            page_num,
            source.display(),
            output.display()
        );
        Ok(report)
    }

    /// Fill a page of an in-memory document, returning the new PDF bytes.
    pub fn fill_document(
        &self,
        doc: &PdfDocument,
        page_num: usize,
        anchors: &[FieldAnchor],
    ) -> Result<(Vec<u8>, FillReport)> {
        let lines = TextExtractor::new(doc).page_lines(page_num)?;

        let mut hits: Vec<(&FieldAnchor, BoundingBox)> = Vec::new();
        let mut fields = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            let mut found: Vec<BoundingBox> = lines
                .iter()
                .flat_map(|line| line.find(&anchor.search_text))
                .collect();
            if anchor.match_mode == MatchMode::First {
                found.truncate(1);
            }
            if found.is_empty() {
                debug!("Anchor {:?} not found on page {}", anchor.search_text, page_num);
            }
            fields.push(FieldOutcome {
                search_text: anchor.search_text.clone(),
                drawn: found.len(),
            });
            hits.extend(found.into_iter().map(|bbox| (anchor, bbox)));
        }

        let report = FillReport {
            page: page_num,
            page_count: doc.page_count(),
            fields,
        };

        if hits.is_empty() {
            return Ok((doc.bytes().to_vec(), report));
        }

        let mut pdf = Document::load_mem(doc.bytes())
            .map_err(|e| Error::Lopdf(format!("Failed to load PDF: {e}")))?;
        let page_id = page_object_id(&pdf, page_num)?;
        let visible_box = objects::visible_box(&pdf, page_id);

        let placed: Vec<Placed> = hits
            .iter()
            .map(|(anchor, bbox)| {
                let size = self.options.font_size.unwrap_or_else(|| estimate_font_size(bbox));
                layout(&anchor.replacement_text, bbox, anchor.placement, &visible_box, size)
            })
            .collect();

        let font_name = StandardFont::add_to_page(&mut pdf, page_id)?;
        let overlay = overlay_operations(&placed, &font_name, self.options.text_color);
        wrap_and_append(&mut pdf, page_id, overlay)?;

        let mut output = Vec::new();
        pdf.save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save PDF: {e}")))?;

        Ok((output, report))
    }
}

fn page_object_id(pdf: &Document, page_num: usize) -> Result<ObjectId> {
    let pages = pdf.get_pages();
    let page_index = PageIndex::try_from_page_num(page_num, pages.len())?;
    pages
        .get(&page_index.as_lopdf_page_number())
        .copied()
        .ok_or(Error::PdfInvalidPage {
            page: page_num,
            total: pages.len(),
        })
}

fn add_stream(pdf: &mut Document, operations: Vec<Operation>) -> Result<ObjectId> {
    let bytes = Content { operations }
        .encode()
        .map_err(|e| Error::Lopdf(format!("Failed to encode content: {e}")))?;
    Ok(pdf.add_object(Stream::new(Dictionary::new(), bytes)))
}

/// Set the page's contents to `[q, existing..., Q + overlay]`.
fn wrap_and_append(pdf: &mut Document, page_id: ObjectId, overlay: Vec<Operation>) -> Result<()> {
    let existing = {
        let page = pdf
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match pdf.get_object(*id) {
                // An indirect array of streams is flattened into the page
                Ok(Object::Array(arr)) => arr.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(arr)) => arr.clone(),
            _ => Vec::new(),
        }
    };

    let open_id = add_stream(pdf, vec![Operation::new("q", vec![])])?;
    let mut closing = vec![Operation::new("Q", vec![])];
    closing.extend(overlay);
    let close_id = add_stream(pdf, closing)?;

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));

    let page = pdf
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;
    page.set("Contents", Object::Array(contents));

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
