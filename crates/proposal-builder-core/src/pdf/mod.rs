mod document;
mod font;
mod objects;
mod page_index;
mod text;
mod render;
pub mod fill;
pub mod merge;

#[cfg(test)]
pub(crate) mod test_support;

pub use document::{DocumentMetadata, PdfDocument};
pub use font::StandardFont;
pub use page_index::PageIndex;
pub use text::{BoundingBox, TextExtractor, TextLine};
pub use render::{ImageFormat, PageRenderer, encode_png, rasterize_file, render_png_from_bytes};
pub use fill::{FieldAnchor, FieldFiller, FieldOutcome, FillReport, MatchMode, Placement};
pub use merge::{combine_pdfs, merge_files};
