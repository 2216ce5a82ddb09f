use std::path::Path;

use image::{ImageEncoder, RgbaImage};
use mupdf::{Colorspace, Matrix};
use webp::Encoder as WebpEncoder;

use crate::error::{Error, Result};
use super::document::PdfDocument;
use super::page_index::PageIndex;

/// PDF user space is 72 units per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Encoded image formats for page previews
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Webp,
}

impl ImageFormat {
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// Pick WebP when an `Accept` header allows it.
    pub fn from_accept(accept: &str) -> Self {
        if accept.contains("image/webp") {
            Self::Webp
        } else {
            Self::Png
        }
    }
}

/// Page renderer for PDF documents
pub struct PageRenderer<'a> {
    /// The PDF document to render
    pub doc: &'a PdfDocument,
    /// Scale factor for rendering (1.0 = 72 DPI)
    pub scale: f32,
}

impl<'a> PageRenderer<'a> {
    /// Create a renderer with a scale factor
    pub const fn with_scale(doc: &'a PdfDocument, scale: f32) -> Self {
        Self { doc, scale }
    }

    /// Create a renderer for a target resolution
    pub fn with_dpi(doc: &'a PdfDocument, dpi: f32) -> Self {
        Self::with_scale(doc, dpi / POINTS_PER_INCH)
    }

    /// Render a page to an RGBA image buffer
    pub fn render_page(&self, page_num: usize) -> Result<RgbaImage> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;
        let render_err = |reason: String| Error::PdfRender { page: page_num, reason };

        let doc = self.doc.open_document()?;
        let page = doc
            .load_page(page_index.into())
            .map_err(|e| render_err(format!("Failed to load page: {e}")))?;

        let matrix = Matrix::new_scale(self.scale, self.scale);
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 1.0, true)
            .map_err(|e| render_err(format!("Failed to render: {e}")))?;

        let pixels = pixmap.samples();
        let img_width = pixmap.width();
        let img_height = pixmap.height();

        // components per pixel
        let n = pixmap.n() as usize;
        let mut rgba_pixels = Vec::with_capacity(pixels.len() / n.max(1) * 4);

        for chunk in pixels.chunks(n) {
            match n {
                3 => {
                    rgba_pixels.extend_from_slice(chunk);
                    rgba_pixels.push(255);
                }
                4 => rgba_pixels.extend_from_slice(chunk),
                1 => rgba_pixels.extend_from_slice(&[chunk[0], chunk[0], chunk[0], 255]),
                _ => {
                    return Err(render_err(format!("Unexpected pixel format with {n} components")));
                }
            }
        }

        RgbaImage::from_raw(img_width, img_height, rgba_pixels)
            .ok_or_else(|| render_err("Failed to create image buffer".to_string()))
    }

    /// Render a page to PNG bytes
    pub fn render_page_png(&self, page_num: usize) -> Result<Vec<u8>> {
        let img = self.render_page(page_num)?;
        encode_png(&img).map_err(|reason| Error::PdfRender { page: page_num, reason })
    }

    /// Render a page to WebP bytes (lossy, quality 85)
    pub fn render_page_webp(&self, page_num: usize) -> Result<Vec<u8>> {
        let img = self.render_page(page_num)?;
        let encoder = WebpEncoder::from_rgba(img.as_raw(), img.width(), img.height());
        Ok(encoder.encode(85.0).to_vec())
    }

    pub fn render_page_as(&self, page_num: usize, format: ImageFormat) -> Result<Vec<u8>> {
        match format {
            ImageFormat::Png => self.render_page_png(page_num),
            ImageFormat::Webp => self.render_page_webp(page_num),
        }
    }
}

/// PNG with fast compression (still lossless)
pub fn encode_png(img: &RgbaImage) -> std::result::Result<Vec<u8>, String> {
    let mut png_data = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new_with_quality(
        &mut png_data,
        image::codecs::png::CompressionType::Fast,
        image::codecs::png::FilterType::Adaptive,
    );
    encoder
        .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgba8)
        .map_err(|e| format!("Failed to encode PNG: {e}"))?;
    Ok(png_data)
}

/// Rasterize one page of the PDF at `path`.
///
/// Failures opening the file or addressing the page are `DocumentAccess`
/// errors naming `path`.
pub fn rasterize_file(path: &Path, page_num: usize, dpi: f32) -> Result<RgbaImage> {
    let doc = PdfDocument::from_file(path)?;
    PageRenderer::with_dpi(&doc, dpi)
        .render_page(page_num)
        .map_err(|e| e.at_path(path))
}

/// Render one page of an in-memory PDF as PNG
pub fn render_png_from_bytes(pdf_bytes: &[u8], page_num: usize, dpi: f32) -> Result<Vec<u8>> {
    let doc = PdfDocument::from_bytes(pdf_bytes.to_vec())?;
    PageRenderer::with_dpi(&doc, dpi).render_page_png(page_num)
}
