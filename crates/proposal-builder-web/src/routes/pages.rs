//! Page routes - full HTML page renders.

use axum::extract::{Path, State};
use std::sync::Arc;

use crate::helpers::{OptionExt, RouteResult};
use crate::state::AppState;
use crate::templates::{IndexTemplate, WizardTemplate};

/// Landing page with the document type picker.
pub async fn index(State(state): State<Arc<AppState>>) -> IndexTemplate {
    let first = state.config.document_types.first().map_or("", String::as_str);
    IndexTemplate::new(&state.config, first, None)
}

/// The wizard at its current step.
///
/// A pending notice is shown once and then cleared.
pub async fn wizard_page(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<WizardTemplate> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    session
        .with_session_mut(|s| {
            let notice = s.notice.take();
            WizardTemplate::from_session(session_id.clone(), s, notice)
        })
        .await
        .or_not_found("Session not found")
}
