//! Wizard routes - step transitions.
//!
//! Every step posts a form and redirects back to `/wizard/{id}`. Failures
//! keep the current step and leave an inline notice.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use chrono::NaiveDate;
use proposal_builder_core::{CoverDetails, WizardStep, util::run_blocking, wizard};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{CoverForm, IndexForm, StartForm};
use crate::helpers::{OptionExt, RouteResult, redirect};
use crate::state::{AppState, MergedProposal, SessionRef};
use crate::templates::IndexTemplate;

fn wizard_url(session_id: &str) -> String {
    format!("/wizard/{session_id}")
}

impl CoverForm {
    /// Validate the step 1 fields.
    pub fn into_details(self) -> Result<CoverDetails, String> {
        let fields = [&self.name, &self.email, &self.phone, &self.country];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err("Please fill in all fields".to_string());
        }

        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(format!("Invalid email address: {email}"));
        }

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| format!("Invalid date: {}", self.date))?;

        Ok(CoverDetails {
            name: self.name.trim().to_string(),
            email: email.to_string(),
            phone: self.phone.trim().to_string(),
            country: self.country.trim().to_string(),
            date,
        })
    }
}

/// Fail with a notice unless the session is at `expected`.
async fn require_step(session: &SessionRef<'_>, expected: WizardStep) -> RouteResult<bool> {
    let step = session
        .with_session(|s| s.step)
        .await
        .or_not_found("Session not found")?;
    if step == expected {
        Ok(true)
    } else {
        session
            .set_notice(format!("This action belongs to step {}", expected.number()))
            .await;
        Ok(false)
    }
}

/// Start a wizard session and fetch its templates (POST-Redirect-GET).
pub async fn start_wizard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<StartForm>,
) -> RouteResult<Response> {
    if !state.config.is_document_type(&form.document_type) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown document type: {}", form.document_type),
        ));
    }

    match state.create_session(&form.document_type).await {
        Ok(session_id) => redirect(&headers, &wizard_url(&session_id)),
        Err(e) => {
            warn!("Cannot start wizard for {}: {e:#}", form.document_type);
            let page = IndexTemplate::new(&state.config, &form.document_type, Some(format!("{e:#}")));
            Ok((StatusCode::SERVICE_UNAVAILABLE, page).into_response())
        }
    }
}

/// Step 1: fill the cover with the submitted details.
pub async fn submit_cover(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<CoverForm>,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;
    let back = wizard_url(&session_id);

    if !require_step(&session, WizardStep::CollectInfo).await? {
        return redirect(&headers, &back);
    }

    let details = match form.into_details() {
        Ok(details) => details,
        Err(message) => {
            session.set_notice(message).await;
            return redirect(&headers, &back);
        }
    };

    // Paths inside lock, PDF work outside
    let (template, output) = session
        .with_session(|s| {
            (
                s.content_templates.first().cloned(),
                s.workspace.unique_path("cover_filled"),
            )
        })
        .await
        .or_not_found("Session not found")?;
    let template = template.or_not_found("Session has no cover template")?;

    let filler = state.filler.clone();
    let page = state.config.wizard.cover_page;
    let fill_details = details.clone();
    let filled = run_blocking(move || {
        wizard::fill_cover(&filler, &template, page, &fill_details, &output).map(|report| (report, output))
    })
    .await;

    match filled {
        Ok((report, output)) => {
            for missing in report.missing() {
                debug!("Cover template has no {missing:?} field");
            }
            session
                .with_session_mut(|s| {
                    s.cover = Some(details);
                    s.filled_cover = Some(output);
                    s.merged = None;
                    s.notice = None;
                    s.step = s.step.next();
                })
                .await;
            info!("Session {}: cover filled", session.id());
        }
        Err(e) => session.set_notice(format!("Error filling the cover: {e}")).await,
    }

    redirect(&headers, &back)
}

/// Step 2: merge the proposal with the chosen index page.
pub async fn choose_index(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<IndexForm>,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;
    let back = wizard_url(&session_id);

    if !require_step(&session, WizardStep::ChooseIndex).await? {
        return redirect(&headers, &back);
    }

    let (cover, index_paths, content, output) = session
        .with_session(|s| {
            (
                s.filled_cover.clone(),
                s.index_templates.iter().map(|c| c.path.clone()).collect::<Vec<_>>(),
                s.content_templates.clone(),
                s.workspace.merged_path(),
            )
        })
        .await
        .or_not_found("Session not found")?;

    let Some(cover) = cover else {
        session.set_notice("Please fill in your details first").await;
        return redirect(&headers, &back);
    };

    // Without index templates the proposal is merged without one
    let index = if index_paths.is_empty() {
        None
    } else {
        match form.index.and_then(|i| index_paths.get(i).cloned().map(|p| (i, p))) {
            Some(choice) => Some(choice),
            None => {
                session.set_notice("Please select an index page").await;
                return redirect(&headers, &back);
            }
        }
    };

    let index_path = index.as_ref().map(|(_, path)| path.clone());
    let merged = run_blocking(move || {
        wizard::assemble(&cover, index_path.as_deref(), &content, &output)
    })
    .await;

    match merged {
        Ok(page_count) => {
            session
                .with_session_mut(|s| {
                    s.chosen_index = index.map(|(i, _)| i);
                    s.merged = Some(MergedProposal {
                        page_count,
                        version: s.workspace.mark_merged(),
                    });
                    s.notice = None;
                    s.step = s.step.next();
                })
                .await;
            info!("Session {}: merged proposal with {} pages", session.id(), page_count);
        }
        Err(e) => session.set_notice(format!("Error merging PDFs: {e}")).await,
    }

    redirect(&headers, &back)
}

/// Go back one step.
pub async fn go_back(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    session
        .with_session_mut(|s| {
            s.step = s.step.previous();
            s.notice = None;
        })
        .await
        .or_not_found("Session not found")?;

    redirect(&headers, &wizard_url(&session_id))
}

/// End the session and delete its workspace.
pub async fn finish(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    if state.remove_session(&session_id).await {
        info!("Session {} finished", session_id);
    }
    redirect(&headers, "/")
}
