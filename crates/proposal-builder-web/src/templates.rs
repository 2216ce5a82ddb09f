//! Askama templates for the wizard and the admin panel.
//!
//! ## Template Structure
//!
//! - `base.html` - Common layout with CSS
//! - `index.html` - Landing page with the document type picker
//! - `wizard.html` - The three wizard steps
//! - `login.html`, `admin.html` - Admin panel

use askama::Template;
use askama_web::WebTemplate;
use proposal_builder_core::{AppConfig, CoverDetails, Template as StoredTemplate, TemplateKind, WizardStep};

use crate::state::Session;

/// Option in a document type `<select>`.
pub struct DocTypeOption {
    pub name: String,
    pub selected: bool,
}

fn doc_type_options(config: &AppConfig, selected: &str) -> Vec<DocTypeOption> {
    config
        .document_types
        .iter()
        .map(|name| DocTypeOption {
            name: name.clone(),
            selected: name == selected,
        })
        .collect()
}

// =============================================================================
// Wizard
// =============================================================================

/// Landing page: pick a document type and start the wizard.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub document_types: Vec<DocTypeOption>,
    pub error: Option<String>,
}

impl IndexTemplate {
    pub fn new(config: &AppConfig, selected: &str, error: Option<String>) -> Self {
        Self {
            document_types: doc_type_options(config, selected),
            error,
        }
    }
}

pub struct StepBadge {
    pub number: u8,
    pub title: &'static str,
    pub active: bool,
    pub done: bool,
}

pub struct IndexOption {
    pub number: usize,
    pub display_name: String,
    pub selected: bool,
}

/// Values shown in the step 1 form.
#[derive(Default)]
pub struct CoverFields {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub date: String,
}

impl CoverFields {
    fn from_details(details: Option<&CoverDetails>, today: chrono::NaiveDate) -> Self {
        details.map_or_else(
            || Self {
                date: today.format("%Y-%m-%d").to_string(),
                ..Self::default()
            },
            |d| Self {
                name: d.name.clone(),
                email: d.email.clone(),
                phone: d.phone.clone(),
                country: d.country.clone(),
                date: d.date.format("%Y-%m-%d").to_string(),
            },
        )
    }
}

/// The wizard page for the session's current step.
#[derive(Template, WebTemplate)]
#[template(path = "wizard.html")]
pub struct WizardTemplate {
    pub session_id: String,
    pub document_type: String,
    pub step: u8,
    pub title: &'static str,
    pub steps: Vec<StepBadge>,
    pub notice: Option<String>,
    pub cover: CoverFields,
    pub index_options: Vec<IndexOption>,
    /// 0-based pages of the merged proposal
    pub pages: Vec<usize>,
    pub merged_version: u64,
}

impl WizardTemplate {
    pub fn from_session(session_id: String, session: &Session, notice: Option<String>) -> Self {
        let current = session.step;
        let steps = [
            WizardStep::CollectInfo,
            WizardStep::ChooseIndex,
            WizardStep::PreviewAndDownload,
        ]
        .into_iter()
        .map(|step| StepBadge {
            number: step.number(),
            title: step.title(),
            active: step == current,
            done: step.number() < current.number(),
        })
        .collect();

        let index_options = session
            .index_templates
            .iter()
            .enumerate()
            .map(|(number, choice)| IndexOption {
                number,
                display_name: choice.display_name.clone(),
                selected: session.chosen_index == Some(number),
            })
            .collect();

        let (pages, merged_version) = session
            .merged
            .map_or((Vec::new(), 0), |m| ((0..m.page_count).collect(), m.version));

        Self {
            session_id,
            document_type: session.document_type.clone(),
            step: current.number(),
            title: current.title(),
            steps,
            notice,
            cover: CoverFields::from_details(session.cover.as_ref(), chrono::Local::now().date_naive()),
            index_options,
            pages,
            merged_version,
        }
    }

    pub const fn has_index_options(&self) -> bool {
        !self.index_options.is_empty()
    }
}

// =============================================================================
// Admin panel
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

pub struct KindTab {
    pub kind: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/// One row of the template table.
pub struct TemplateRow {
    pub id: String,
    pub display_name: String,
    pub storage_path: String,
    pub order: u32,
    pub visible: bool,
    pub uploaded_at: String,
    pub uploaded_by: String,
}

impl From<StoredTemplate> for TemplateRow {
    fn from(t: StoredTemplate) -> Self {
        Self {
            id: t.id,
            display_name: t.display_name,
            storage_path: t.storage_path,
            order: t.order,
            visible: t.visible,
            uploaded_at: t.uploaded_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            uploaded_by: t.uploaded_by,
        }
    }
}

/// Admin dashboard for one template kind and document type.
#[derive(Template, WebTemplate)]
#[template(path = "admin.html")]
pub struct DashboardTemplate {
    pub email: String,
    pub kind: &'static str,
    pub kind_label: &'static str,
    pub tabs: Vec<KindTab>,
    pub doc_type: String,
    /// `doc_type`, percent-encoded for links
    pub doc_type_query: String,
    pub document_types: Vec<DocTypeOption>,
    pub rows: Vec<TemplateRow>,
    pub next_order: u32,
    pub notice: Option<String>,
}

impl DashboardTemplate {
    pub fn new(
        config: &AppConfig,
        email: String,
        kind: TemplateKind,
        doc_type: &str,
        templates: Vec<StoredTemplate>,
        notice: Option<String>,
    ) -> Self {
        let next_order = templates.iter().map(|t| t.order).max().unwrap_or(0) + 1;
        Self {
            email,
            kind: kind.as_str(),
            kind_label: kind.label(),
            tabs: TemplateKind::ALL
                .iter()
                .map(|k| KindTab {
                    kind: k.as_str(),
                    label: k.label(),
                    active: *k == kind,
                })
                .collect(),
            doc_type: doc_type.to_string(),
            doc_type_query: urlencoding::encode(doc_type).into_owned(),
            document_types: doc_type_options(config, doc_type),
            rows: templates.into_iter().map(TemplateRow::from).collect(),
            next_order,
            notice,
        }
    }
}
