//! Download routes - the merged proposal as PDF or Word.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use proposal_builder_core::{DOCX_MIME, PDF_MIME};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::helpers::{OptionExt, ResultExt, RouteResult, attachment, redirect};
use crate::state::AppState;

/// Merged PDF path and workspace directory of a session.
async fn merged_paths(state: &AppState, session_id: &str) -> RouteResult<(PathBuf, PathBuf)> {
    let session = state
        .get_session(session_id)
        .await
        .or_not_found("Session not found")?;

    let (has_merged, pdf, dir) = session
        .with_session(|s| {
            (
                s.merged.is_some(),
                s.workspace.merged_path(),
                s.workspace.path().to_path_buf(),
            )
        })
        .await
        .or_not_found("Session not found")?;

    has_merged
        .then_some((pdf, dir))
        .or_not_found("Proposal not merged yet")
}

/// Download the merged proposal.
pub async fn download_pdf(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    let (pdf, _) = merged_paths(&state, &session_id).await?;
    let data = tokio::fs::read(&pdf).await.or_internal_error()?;
    attachment(data, PDF_MIME, "proposal.pdf")
}

/// Convert the merged proposal to Word and download it.
///
/// A failed conversion goes back to the wizard with a notice.
pub async fn download_docx(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    let (pdf, dir) = merged_paths(&state, &session_id).await?;

    match state.converter.convert(&pdf, &dir).await {
        Ok(docx) => {
            let data = tokio::fs::read(&docx).await.or_internal_error()?;
            info!("Session {}: Word download ({} bytes)", session_id, data.len());
            attachment(data, DOCX_MIME, "proposal.docx")
        }
        Err(e) => {
            if let Some(session) = state.get_session(&session_id).await {
                session.set_notice(format!("Error converting to Word: {e}")).await;
            }
            redirect(&headers, &format!("/wizard/{session_id}"))
        }
    }
}
