//! Router tests: requests go through the full middleware stack with `oneshot`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use proposal_builder_core::{
    AppConfig, LocalBlobStore, NewTemplate, SledTemplateRepository, TemplateCatalog, TemplateKind,
    store::PreviewCache,
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::state::AppState;

// =============================================================================
// Fixtures
// =============================================================================

/// Letter-sized PDF, one `(text, x, y)` run list per page, 12pt Helvetica.
fn build_pdf(pages: &[&[(&str, i64, i64)]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));

    let mut kids = Vec::new();
    for runs in pages {
        let mut operations = Vec::new();
        for (text, x, y) in *runs {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![(*x).into(), (*y).into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]);
        }
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            Content { operations }.encode().unwrap(),
        ));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            (
                "Resources",
                Object::Dictionary(Dictionary::from_iter([(
                    "Font",
                    Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
                )])),
            ),
            ("MediaBox", Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()])),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

struct TestApp {
    state: Arc<AppState>,
    router: Router,
    store: TempDir,
}

fn test_app() -> TestApp {
    let store = tempfile::tempdir().unwrap();
    let catalog = TemplateCatalog::new(
        Arc::new(LocalBlobStore::new(store.path().join("blobs")).unwrap()),
        Arc::new(SledTemplateRepository::temporary().unwrap()),
        PreviewCache::new(16),
    );

    let mut config = AppConfig::default();
    config.admin.emails = vec!["admin@example.com".to_string()];
    config.admin.password = Some("letmein".to_string());
    config.render.preview_dpi = 36.0;
    config.render.admin_preview_dpi = 36.0;

    let state = Arc::new(AppState::with_catalog(config, catalog));
    TestApp {
        router: super::router(Arc::clone(&state)),
        state,
        store,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str) -> Response {
        self.send(form_request(uri, body, None)).await
    }

    async fn upload(&self, kind: TemplateKind, name: &str, order: u32, pdf: Vec<u8>) -> String {
        let new = NewTemplate {
            kind,
            document_type: "Proposal".to_string(),
            display_name: name.to_string(),
            order,
            uploaded_by: "admin@example.com".to_string(),
        };
        self.state.catalog.upload(new, pdf).await.unwrap().id
    }

    /// Upload a three-template proposal plus two index pages.
    async fn seed_proposal(&self) {
        let cover = build_pdf(&[&[("Name:", 72, 700), ("Email:", 72, 680), ("14 April 2025", 400, 700)]]);
        self.upload(TemplateKind::Content, "Cover", 1, cover).await;
        self.upload(TemplateKind::Content, "Index slot", 2, build_pdf(&[&[("Slot", 72, 700)]])).await;
        self.upload(
            TemplateKind::Content,
            "Scope",
            3,
            build_pdf(&[&[("Scope", 72, 700)], &[("Pricing", 72, 700)]]),
        )
        .await;
        self.upload(TemplateKind::Index, "Classic", 1, build_pdf(&[&[("Classic", 72, 700)]])).await;
        self.upload(TemplateKind::Index, "Modern", 2, build_pdf(&[&[("Modern", 72, 700)]])).await;
    }

    /// Replace a stored blob with a directory, so reading it fails.
    async fn break_blob(&self, kind: TemplateKind, order: u32) {
        let template = self
            .state
            .catalog
            .list(kind, "Proposal")
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.order == order)
            .unwrap();
        let path = self.store.path().join("blobs").join(&template.storage_path);
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
    }

    /// Start a wizard session and return its URL.
    async fn start(&self) -> String {
        let response = self.post_form("/wizard", "document_type=Proposal").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        location(&response)
    }

    async fn login(&self) -> String {
        let response = self
            .post_form("/admin/login", "email=admin%40example.com&password=letmein")
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }
}

fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION].to_str().unwrap().to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

const COVER_FORM: &str =
    "name=Ada+Lovelace&email=ada%40example.com&phone=555+0100&country=Portugal&date=2026-03-03";

// =============================================================================
// Wizard
// =============================================================================

#[tokio::test]
async fn test_index_lists_document_types() {
    let app = test_app();
    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Maintenance Agreement"));
    assert!(html.contains("action=\"/wizard\""));
}

#[tokio::test]
async fn test_start_without_templates_is_blocking() {
    let app = test_app();
    let response = app.post_form("/wizard", "document_type=Proposal").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_text(response).await.contains("No templates found for Proposal"));
    assert_eq!(app.state.session_count().await, 0);
}

#[tokio::test]
async fn test_start_rejects_unknown_document_type() {
    let app = test_app();
    let response = app.post_form("/wizard", "document_type=Poem").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_wizard_flow() {
    let app = test_app();
    app.seed_proposal().await;
    let wizard = app.start().await;

    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("Your details"));

    // Step 1 -> 2
    let response = app.post_form(&format!("{wizard}/cover"), COVER_FORM).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("Select index page style"), "{html}");
    assert!(html.contains("Classic"));
    assert!(html.contains("Modern"));

    let thumb = app.get(&format!("{wizard}/index-preview/1")).await;
    assert_eq!(thumb.status(), StatusCode::OK);
    assert_eq!(thumb.headers()[header::CONTENT_TYPE], "image/png");

    // Step 2 -> 3: cover + Modern + the two pages of template 3
    app.post_form(&format!("{wizard}/index"), "index=1").await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("Full proposal preview"), "{html}");
    assert!(html.contains("page/3?v=1"));
    assert!(!html.contains("page/4?v=1"));

    let page = app.get(&format!("{wizard}/page/0")).await;
    assert_eq!(page.status(), StatusCode::OK);
    let etag = page.headers()[header::ETAG].clone();
    let cached = app
        .send(
            Request::get(format!("{wizard}/page/0"))
                .header(header::IF_NONE_MATCH, etag)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(app.get(&format!("{wizard}/page/4")).await.status(), StatusCode::BAD_REQUEST);

    let download = app.get(&format!("{wizard}/download/pdf")).await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        download.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"proposal.pdf\""
    );
    assert!(body_bytes(download).await.starts_with(b"%PDF"));

    // Finish drops the session
    let response = app.post_form(&format!("{wizard}/finish"), "").await;
    assert_eq!(location(&response), "/");
    assert_eq!(app.get(&wizard).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_cover_keeps_step_with_notice() {
    let app = test_app();
    app.seed_proposal().await;
    let wizard = app.start().await;

    app.post_form(&format!("{wizard}/cover"), "name=&email=&phone=&country=&date=2026-03-03")
        .await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("Please fill in all fields"));
    assert!(html.contains("Your details"));

    // The notice is shown once
    let html = body_text(app.get(&wizard).await).await;
    assert!(!html.contains("Please fill in all fields"));
}

#[tokio::test]
async fn test_steps_cannot_be_skipped_and_back_works() {
    let app = test_app();
    app.seed_proposal().await;
    let wizard = app.start().await;

    app.post_form(&format!("{wizard}/index"), "index=0").await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("This action belongs to step 2"));
    assert_eq!(app.get(&format!("{wizard}/download/pdf")).await.status(), StatusCode::NOT_FOUND);

    app.post_form(&format!("{wizard}/cover"), COVER_FORM).await;
    app.post_form(&format!("{wizard}/index"), "").await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("Please select an index page"));

    app.post_form(&format!("{wizard}/back"), "").await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("Ada Lovelace"), "cover details are kept");
    assert!(html.contains("action=\"/wizard/"));
}

#[tokio::test]
async fn test_unreadable_templates_are_skipped_with_notice() {
    let app = test_app();
    app.seed_proposal().await;
    app.break_blob(TemplateKind::Content, 3).await;
    app.break_blob(TemplateKind::Index, 1).await;

    let wizard = app.start().await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("Your details"));
    assert!(html.contains("Skipped template Scope"), "{html}");
    assert!(html.contains("Skipped index page Classic"), "{html}");

    // The remaining index page is still offered
    app.post_form(&format!("{wizard}/cover"), COVER_FORM).await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("Modern"));
    assert!(!html.contains("Classic"));

    // cover + Modern, without the unreadable content template
    app.post_form(&format!("{wizard}/index"), "index=0").await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("page/1?v=1"), "{html}");
    assert!(!html.contains("page/2?v=1"));
}

#[tokio::test]
async fn test_unreadable_cover_blocks_start() {
    let app = test_app();
    app.seed_proposal().await;
    app.break_blob(TemplateKind::Content, 1).await;

    let response = app.post_form("/wizard", "document_type=Proposal").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_text(response).await.contains("Failed to fetch cover template Cover"));
    assert_eq!(app.state.session_count().await, 0);
}

#[tokio::test]
async fn test_merge_without_index_templates() {
    let app = test_app();
    app.upload(TemplateKind::Content, "Cover", 1, build_pdf(&[&[("Name:", 72, 700)]])).await;
    let wizard = app.start().await;

    app.post_form(&format!("{wizard}/cover"), COVER_FORM).await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("without one"));

    app.post_form(&format!("{wizard}/index"), "").await;
    let html = body_text(app.get(&wizard).await).await;
    assert!(html.contains("Full proposal preview"));
    assert!(html.contains("page/0?v=1"));
    assert!(!html.contains("page/1?v=1"));
}

#[tokio::test]
async fn test_cleanup_drops_expired_sessions() {
    let app = test_app();
    app.seed_proposal().await;
    let wizard = app.start().await;
    assert_eq!(app.state.session_count().await, 1);

    app.state.cleanup_old_sessions().await;
    assert_eq!(app.state.session_count().await, 1);

    app.state.age_sessions(std::time::Duration::from_secs(2 * 3600)).await;
    app.state.cleanup_old_sessions().await;
    assert_eq!(app.state.session_count().await, 0);
    assert_eq!(app.get(&wizard).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_session() {
    let app = test_app();
    assert_eq!(app.get("/wizard/not-a-uuid").await.status(), StatusCode::NOT_FOUND);
    let missing = format!("/wizard/{}", uuid::Uuid::new_v4());
    assert_eq!(app.get(&missing).await.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Admin panel
// =============================================================================

#[tokio::test]
async fn test_admin_requires_login() {
    let app = test_app();
    let response = app.get("/admin").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/login");

    let response = app
        .post_form("/admin/login", "email=admin%40example.com&password=wrong")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("Access denied"));

    let response = app
        .post_form("/admin/login", "email=intruder%40example.com&password=letmein")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_login_and_logout() {
    let app = test_app();
    let cookie = app.login().await;

    let response = app
        .send(Request::get("/admin").header(header::COOKIE, &cookie).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("admin@example.com"));

    let response = app.send(form_request("/admin/logout", "", Some(&cookie))).await;
    assert_eq!(location(&response), "/admin/login");

    let response = app
        .send(Request::get("/admin").header(header::COOKIE, &cookie).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

fn multipart_upload(fields: &[(&str, &str)], pdf: &[u8]) -> (String, Vec<u8>) {
    let boundary = "proposal-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"t.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(pdf);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

#[tokio::test]
async fn test_admin_upload_visibility_preview_delete() {
    let app = test_app();
    let cookie = app.login().await;

    let (content_type, body) = multipart_upload(
        &[("document_type", "Pricing List"), ("display_name", "Rates"), ("order", "1")],
        &build_pdf(&[&[("Rates", 72, 700)]]),
    );
    let response = app
        .send(
            Request::post("/admin/templates/index/upload")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin?kind=index&doc_type=Pricing%20List");

    let listed = app.state.catalog.list(TemplateKind::Index, "Pricing List").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].storage_path, "index_templates/Pricing List/template_1.pdf");
    assert_eq!(listed[0].uploaded_by, "admin@example.com");
    let id = listed[0].id.clone();

    let response = app
        .send(
            Request::get("/admin?kind=index&doc_type=Pricing%20List")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let html = body_text(response).await;
    assert!(html.contains("Uploaded Rates to index_templates/Pricing List/template_1.pdf"));
    assert!(html.contains(&id));

    let preview = app
        .send(
            Request::get(format!("/admin/templates/index/{id}/preview"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(preview.status(), StatusCode::OK);
    assert!(body_bytes(preview).await.starts_with(&[0x89, b'P', b'N', b'G']));

    let response = app
        .send(form_request(
            &format!("/admin/templates/index/{id}/visibility?visible=false"),
            "doc_type=Pricing+List",
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let template = app.state.catalog.get(TemplateKind::Index, &id).await.unwrap().unwrap();
    assert!(!template.visible);

    let response = app
        .send(form_request(
            "/admin/templates/index/delete",
            &format!("ids={id}&doc_type=Pricing+List"),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.state.catalog.list(TemplateKind::Index, "Pricing List").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_upload_rejects_invalid_pdf() {
    let app = test_app();
    let cookie = app.login().await;

    let (content_type, body) = multipart_upload(
        &[("document_type", "Proposal"), ("display_name", "Broken"), ("order", "1")],
        b"not a pdf",
    );
    app.send(
        Request::post("/admin/templates/content/upload")
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap(),
    )
    .await;

    assert!(app.state.catalog.list(TemplateKind::Content, "Proposal").await.unwrap().is_empty());
    let html = body_text(
        app.send(Request::get("/admin").header(header::COOKIE, &cookie).body(Body::empty()).unwrap())
            .await,
    )
    .await;
    assert!(html.contains("Upload failed"));
}

#[tokio::test]
async fn test_admin_reorder() {
    let app = test_app();
    let cookie = app.login().await;
    let first = app.upload(TemplateKind::Content, "First", 1, build_pdf(&[&[("A", 72, 700)]])).await;
    let second = app.upload(TemplateKind::Content, "Second", 2, build_pdf(&[&[("B", 72, 700)]])).await;

    let body = format!("doc_type=Proposal&id={first}&position=2&id={second}&position=1");
    let response = app
        .send(form_request("/admin/templates/content/reorder", &body, Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let listed = app.state.catalog.list(TemplateKind::Content, "Proposal").await.unwrap();
    let names: Vec<_> = listed.iter().map(|t| (t.display_name.as_str(), t.order)).collect();
    assert_eq!(names, vec![("Second", 1), ("First", 2)]);
}

#[tokio::test]
async fn test_admin_preview_requires_login() {
    let app = test_app();
    let id = app.upload(TemplateKind::Content, "Cover", 1, build_pdf(&[&[("A", 72, 700)]])).await;
    let response = app.get(&format!("/admin/templates/content/{id}/preview")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
