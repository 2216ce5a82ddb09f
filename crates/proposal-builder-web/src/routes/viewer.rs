//! Viewer routes - index page thumbnails and merged page previews.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use proposal_builder_core::{PageRenderer, PdfDocument, util::run_blocking};
use std::sync::Arc;

use crate::helpers::{
    OptionExt, ResultExt, RouteResult, etag_matches, image_format, image_response, not_modified,
    validate_page,
};
use crate::state::AppState;

/// First page of an index template, for the step 2 picker.
///
/// Index files never change within a session, so the image is immutable.
pub async fn index_preview(
    State(state): State<Arc<AppState>>,
    Path((session_id, index)): Path<(String, usize)>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let path = session
        .with_session(|s| s.index_templates.get(index).map(|c| c.path.clone()))
        .await
        .or_not_found("Session not found")?
        .or_not_found("Index page not found")?;

    let format = image_format(&headers);
    let etag = format!("\"{session_id}-index-{index}-{}\"", format.mime_type());
    if etag_matches(&headers, &etag) {
        return not_modified();
    }

    let dpi = state.config.render.admin_preview_dpi;
    let image = run_blocking(move || {
        let doc = PdfDocument::from_file(&path)?;
        PageRenderer::with_dpi(&doc, dpi).render_page_as(0, format)
    })
    .await
    .or_internal_error()?;

    image_response(image, format, &etag, "private, max-age=3600, immutable")
}

/// One page (0-based) of the merged proposal.
///
/// The ETag carries the merge version, so a re-merge invalidates cached pages.
pub async fn page_image(
    State(state): State<Arc<AppState>>,
    Path((session_id, page)): Path<(String, usize)>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    // Metadata inside lock (fast)
    let (merged, path) = session
        .with_session(|s| (s.merged, s.workspace.merged_path()))
        .await
        .or_not_found("Session not found")?;
    let merged = merged.or_not_found("Proposal not merged yet")?;
    validate_page(page, merged.page_count)?;

    let format = image_format(&headers);
    let etag = format!(
        "\"{session_id}-{page}-{}-{}\"",
        merged.version,
        format.mime_type()
    );
    if etag_matches(&headers, &etag) {
        return not_modified();
    }

    // Render outside lock
    let dpi = state.config.render.preview_dpi;
    let image = run_blocking(move || {
        let doc = PdfDocument::from_file(&path)?;
        PageRenderer::with_dpi(&doc, dpi).render_page_as(page, format)
    })
    .await
    .or_internal_error()?;

    image_response(image, format, &etag, "private, max-age=3600, must-revalidate")
}
