//! Admin routes - login and template management.
//!
//! Every action redirects back to the dashboard; failing store calls are
//! reported there as a one-time notice.

use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    Form as MultiForm, Multipart,
    cookie::{Cookie, CookieJar, SameSite},
};
use proposal_builder_core::{NewTemplate, TemplateKind};
use std::sync::Arc;
use tracing::{info, warn};

use super::{DashboardQuery, DeleteForm, DocTypeForm, LoginForm, ReorderForm, VisibilityQuery};
use crate::helpers::{
    OptionExt, ResultExt, RouteResult, etag_matches, image_response, not_modified, redirect,
};
use crate::state::{ADMIN_COOKIE, AppState};
use crate::templates::{DashboardTemplate, LoginTemplate};

const LOGIN_URL: &str = "/admin/login";

/// The logged-in admin of a request.
struct Admin {
    token: String,
    email: String,
}

async fn current_admin(state: &AppState, jar: &CookieJar) -> Option<Admin> {
    let token = jar.get(ADMIN_COOKIE)?.value().to_string();
    let email = state.admin_email(&token).await?;
    Some(Admin { token, email })
}

fn parse_kind(kind: &str) -> RouteResult<TemplateKind> {
    TemplateKind::parse(kind).or_not_found("Unknown template kind")
}

/// Dashboard URL for a kind and document type.
fn dashboard_url(kind: TemplateKind, doc_type: &str) -> String {
    format!(
        "/admin?kind={}&doc_type={}",
        kind.as_str(),
        urlencoding::encode(doc_type)
    )
}

/// Configured document type, or the first one.
fn document_type(state: &AppState, requested: Option<&str>) -> String {
    requested
        .filter(|t| state.config.is_document_type(t))
        .or_else(|| state.config.document_types.first().map(String::as_str))
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Login
// =============================================================================

pub async fn login_page() -> LoginTemplate {
    LoginTemplate {
        email: String::new(),
        error: None,
    }
}

/// Check the credentials and set the session cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> RouteResult<Response> {
    if !state.config.admin.authorize(&form.email, &form.password) {
        warn!("Rejected admin login for {}", form.email.trim());
        let page = LoginTemplate {
            email: form.email,
            error: Some("Access denied: invalid email or password".to_string()),
        };
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    }

    let token = state.create_admin_session(&form.email).await;
    let cookie = Cookie::build((ADMIN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    let response = redirect(&headers, "/admin")?;
    Ok((jar.add(cookie), response).into_response())
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> RouteResult<Response> {
    if let Some(cookie) = jar.get(ADMIN_COOKIE) {
        state.remove_admin_session(cookie.value()).await;
    }
    let response = redirect(&headers, LOGIN_URL)?;
    Ok((jar.remove(Cookie::build(ADMIN_COOKIE).path("/")), response).into_response())
}

// =============================================================================
// Dashboard
// =============================================================================

/// Template list of one kind and document type, with upload and edit forms.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> RouteResult<Response> {
    let Some(admin) = current_admin(&state, &jar).await else {
        return redirect(&headers, LOGIN_URL);
    };

    let kind = query
        .kind
        .as_deref()
        .and_then(TemplateKind::parse)
        .unwrap_or(TemplateKind::Content);
    let doc_type = document_type(&state, query.doc_type.as_deref());

    let mut notice = state.take_admin_notice(&admin.token).await;
    let templates = match state.catalog.list(kind, &doc_type).await {
        Ok(templates) => templates,
        Err(e) => {
            notice = Some(format!("Failed to list templates: {e}"));
            Vec::new()
        }
    };

    Ok(DashboardTemplate::new(&state.config, admin.email, kind, &doc_type, templates, notice).into_response())
}

/// Upload a template PDF (multipart: document_type, display_name, order, file).
pub async fn upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> RouteResult<Response> {
    let Some(admin) = current_admin(&state, &jar).await else {
        return redirect(&headers, LOGIN_URL);
    };
    let kind = parse_kind(&kind)?;

    let mut doc_type = None;
    let mut display_name = String::new();
    let mut order = String::new();
    let mut file = None;
    while let Some(field) = multipart.next_field().await.or_bad_request()? {
        match field.name().unwrap_or("") {
            "document_type" => doc_type = Some(field.text().await.or_bad_request()?),
            "display_name" => display_name = field.text().await.or_bad_request()?,
            "order" => order = field.text().await.or_bad_request()?,
            "file" => file = Some(field.bytes().await.or_bad_request()?),
            _ => {}
        }
    }

    let doc_type = document_type(&state, doc_type.as_deref());
    let back = dashboard_url(kind, &doc_type);

    let notice = match (file.filter(|f| !f.is_empty()), order.trim().parse::<u32>()) {
        (None, _) => "Please choose a PDF file".to_string(),
        (_, Err(_)) => format!("Invalid order: {order}"),
        (Some(bytes), Ok(order)) => {
            let new = NewTemplate {
                kind,
                document_type: doc_type.clone(),
                display_name,
                order,
                uploaded_by: admin.email.clone(),
            };
            match state.catalog.upload(new, bytes.to_vec()).await {
                Ok(template) => format!(
                    "Uploaded {} to {}",
                    template.display_name, template.storage_path
                ),
                Err(e) => format!("Upload failed: {e}"),
            }
        }
    };

    state.set_admin_notice(&admin.token, notice).await;
    redirect(&headers, &back)
}

/// Show or hide a template in the wizard.
pub async fn set_visibility(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<VisibilityQuery>,
    MultiForm(form): MultiForm<DocTypeForm>,
) -> RouteResult<Response> {
    let Some(admin) = current_admin(&state, &jar).await else {
        return redirect(&headers, LOGIN_URL);
    };
    let kind = parse_kind(&kind)?;

    if let Err(e) = state.catalog.set_visibility(kind, &id, query.visible).await {
        state
            .set_admin_notice(&admin.token, format!("Failed to update visibility: {e}"))
            .await;
    }

    redirect(&headers, &dashboard_url(kind, &document_type(&state, Some(&form.doc_type))))
}

/// Delete the selected template records.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(kind): Path<String>,
    MultiForm(form): MultiForm<DeleteForm>,
) -> RouteResult<Response> {
    let Some(admin) = current_admin(&state, &jar).await else {
        return redirect(&headers, LOGIN_URL);
    };
    let kind = parse_kind(&kind)?;

    let notice = if form.ids.is_empty() {
        "No templates selected".to_string()
    } else {
        let outcome = state.catalog.delete(kind, &form.ids).await;
        if outcome.is_complete() {
            format!("Deleted {} template(s)", outcome.succeeded)
        } else {
            let failed: Vec<_> = outcome
                .failures
                .iter()
                .map(|(id, e)| format!("{id}: {e}"))
                .collect();
            format!(
                "Deleted {} template(s); failed: {}",
                outcome.succeeded,
                failed.join("; ")
            )
        }
    };
    info!("Admin {}: {}", admin.email, notice);

    state.set_admin_notice(&admin.token, notice).await;
    redirect(&headers, &dashboard_url(kind, &document_type(&state, Some(&form.doc_type))))
}

/// Order of template ids after sorting by the submitted positions.
///
/// Rows keep their relative order on equal positions.
fn ordered_ids(form: &ReorderForm) -> Result<Vec<String>, String> {
    if form.id.len() != form.position.len() {
        return Err("Each template needs a position".to_string());
    }
    let mut rows = Vec::with_capacity(form.id.len());
    for (id, position) in form.id.iter().zip(&form.position) {
        let position: u32 = position
            .trim()
            .parse()
            .map_err(|_| format!("Invalid position: {position}"))?;
        rows.push((position, id.clone()));
    }
    rows.sort_by_key(|(position, _)| *position);
    Ok(rows.into_iter().map(|(_, id)| id).collect())
}

/// Assign orders 1..N following the submitted positions.
pub async fn reorder(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(kind): Path<String>,
    MultiForm(form): MultiForm<ReorderForm>,
) -> RouteResult<Response> {
    let Some(admin) = current_admin(&state, &jar).await else {
        return redirect(&headers, LOGIN_URL);
    };
    let kind = parse_kind(&kind)?;

    let notice = match ordered_ids(&form) {
        Ok(ids) => {
            let outcome = state.catalog.reorder(kind, &ids).await;
            if outcome.is_complete() {
                "Order updated".to_string()
            } else {
                format!(
                    "Order updated for {} template(s), {} failed",
                    outcome.succeeded,
                    outcome.failures.len()
                )
            }
        }
        Err(message) => message,
    };

    state.set_admin_notice(&admin.token, notice).await;
    redirect(&headers, &dashboard_url(kind, &document_type(&state, Some(&form.doc_type))))
}

/// First-page thumbnail of a stored template.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, String)>,
) -> RouteResult<Response> {
    if current_admin(&state, &jar).await.is_none() {
        return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string()));
    }
    let kind = parse_kind(&kind)?;

    let template = state
        .catalog
        .get(kind, &id)
        .await
        .or_internal_error()?
        .or_not_found("Template not found")?;

    let etag = format!("\"{}-{}\"", template.id, template.uploaded_at.timestamp_micros());
    if etag_matches(&headers, &etag) {
        return not_modified();
    }

    let png = state
        .catalog
        .preview(&template, state.config.render.admin_preview_dpi)
        .await
        .or_internal_error()?;

    image_response(
        png,
        proposal_builder_core::ImageFormat::Png,
        &etag,
        "private, max-age=300, must-revalidate",
    )
}
