//! HTTP route handlers for the proposal builder.
//!
//! All routes return either HTML (Askama templates from the `templates`
//! module), redirects after form posts, or binary data (images, documents).

mod admin;
mod download;
mod pages;
mod viewer;
mod wizard;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::state::AppState;

/// Form data for starting the wizard.
#[derive(Deserialize)]
pub struct StartForm {
    pub document_type: String,
}

/// Step 1 form data.
#[derive(Deserialize)]
pub struct CoverForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    /// `YYYY-MM-DD` from the date input
    pub date: String,
}

/// Step 2 form data; `index` is absent when no index page exists.
#[derive(Deserialize, Default)]
pub struct IndexForm {
    #[serde(default)]
    pub index: Option<usize>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Dashboard filter.
#[derive(Deserialize, Default)]
pub struct DashboardQuery {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
}

#[derive(Deserialize)]
pub struct VisibilityQuery {
    pub visible: bool,
}

/// Document type the admin was looking at, for the redirect back.
#[derive(Deserialize, Default)]
pub struct DocTypeForm {
    #[serde(default)]
    pub doc_type: String,
}

/// Bulk delete selection.
#[derive(Deserialize, Default)]
pub struct DeleteForm {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub doc_type: String,
}

/// Position inputs, one `id`/`position` pair per row.
#[derive(Deserialize, Default)]
pub struct ReorderForm {
    #[serde(default)]
    pub id: Vec<String>,
    #[serde(default)]
    pub position: Vec<String>,
    #[serde(default)]
    pub doc_type: String,
}

/// Build the application router with its middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Wizard
        .route("/", get(pages::index))
        .route("/wizard", post(wizard::start_wizard))
        .route("/wizard/{session_id}", get(pages::wizard_page))
        .route("/wizard/{session_id}/cover", post(wizard::submit_cover))
        .route("/wizard/{session_id}/index", post(wizard::choose_index))
        .route("/wizard/{session_id}/back", post(wizard::go_back))
        .route("/wizard/{session_id}/finish", post(wizard::finish))
        .route(
            "/wizard/{session_id}/index-preview/{index}",
            get(viewer::index_preview),
        )
        .route("/wizard/{session_id}/page/{page}", get(viewer::page_image))
        .route("/wizard/{session_id}/download/pdf", get(download::download_pdf))
        .route("/wizard/{session_id}/download/docx", get(download::download_docx))
        // Admin panel
        .route("/admin/login", get(admin::login_page).post(admin::login))
        .route("/admin/logout", post(admin::logout))
        .route("/admin", get(admin::dashboard))
        .route("/admin/templates/{kind}/upload", post(admin::upload))
        .route(
            "/admin/templates/{kind}/{id}/visibility",
            post(admin::set_visibility),
        )
        .route("/admin/templates/{kind}/{id}/preview", get(admin::preview))
        .route("/admin/templates/{kind}/delete", post(admin::delete))
        .route("/admin/templates/{kind}/reorder", post(admin::reorder))
        // Middleware
        // HTML must not be reused from the back/forward cache
        // (images and downloads set their own headers)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        ))
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024)) // 50MB limit for template uploads
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests;
