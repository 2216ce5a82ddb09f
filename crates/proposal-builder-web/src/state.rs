use anyhow::{Context, Result, bail};
use proposal_builder_core::{
    AppConfig, CoverDetails, DocxConverter, FieldFiller, TemplateCatalog, TemplateKind,
    WizardStep,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::workspace::Workspace;

/// Name of the admin session cookie
pub const ADMIN_COOKIE: &str = "admin_session";

/// An index page the user can pick in step 2.
#[derive(Debug, Clone)]
pub struct IndexChoice {
    pub path: PathBuf,
    pub display_name: String,
}

/// The merged proposal of a session.
#[derive(Debug, Clone, Copy)]
pub struct MergedProposal {
    pub page_count: usize,
    pub version: u64,
}

/// Wizard state for one user
pub struct Session {
    pub document_type: String,
    pub step: WizardStep,
    /// Fetched templates and generated PDFs; removed with the session
    pub workspace: Workspace,
    /// Visible content templates, by order
    pub content_templates: Vec<PathBuf>,
    pub index_templates: Vec<IndexChoice>,
    pub cover: Option<CoverDetails>,
    pub filled_cover: Option<PathBuf>,
    pub chosen_index: Option<usize>,
    pub merged: Option<MergedProposal>,
    /// Last error, shown inline on the next render
    pub notice: Option<String>,
    pub created_at: Instant,
}

/// Logged-in admin
pub struct AdminSession {
    pub email: String,
    /// Result of the last dashboard action, shown once
    pub notice: Option<String>,
    pub created_at: Instant,
}

/// Global application state
pub struct AppState {
    /// Active wizard sessions indexed by UUID
    sessions: RwLock<HashMap<Uuid, Session>>,
    /// Admin sessions indexed by cookie token
    admin_sessions: RwLock<HashMap<Uuid, AdminSession>>,
    pub catalog: TemplateCatalog,
    pub filler: FieldFiller,
    pub converter: DocxConverter,
    pub config: AppConfig,
}

impl AppState {
    /// Open the template store named by `config`.
    pub fn new(config: AppConfig) -> Result<Self> {
        let catalog = TemplateCatalog::open(&config).context("Failed to open template store")?;
        Ok(Self::with_catalog(config, catalog))
    }

    pub fn with_catalog(config: AppConfig, catalog: TemplateCatalog) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            admin_sessions: RwLock::new(HashMap::new()),
            catalog,
            filler: FieldFiller::new(config.fill.clone()),
            converter: DocxConverter::from_config(&config.convert),
            config,
        }
    }

    /// Start a wizard session for `document_type`.
    ///
    /// Fetches the visible templates into a fresh workspace. Fails when there
    /// is no content template to take the cover from; any other template that
    /// cannot be fetched is skipped and reported in the session notice.
    pub async fn create_session(&self, document_type: &str) -> Result<String> {
        let workspace = Workspace::new().context("Failed to create session workspace")?;

        let content = self
            .catalog
            .fetch_ordered(TemplateKind::Content, document_type, workspace.path())
            .await
            .context("Failed to fetch templates")?;
        if let Some((cover, e)) = content.leading_failure() {
            bail!("Failed to fetch cover template {}: {e}", cover.display_name);
        }
        if content.fetched.is_empty() {
            bail!("No templates found for {document_type}");
        }

        let mut problems: Vec<String> = content
            .failures
            .iter()
            .map(|(t, e)| format!("Skipped template {}: {e}", t.display_name))
            .collect();

        let index_templates = match self
            .catalog
            .fetch_ordered(TemplateKind::Index, document_type, workspace.path())
            .await
        {
            Ok(outcome) => {
                problems.extend(
                    outcome
                        .failures
                        .iter()
                        .map(|(t, e)| format!("Skipped index page {}: {e}", t.display_name)),
                );
                outcome
                    .fetched
                    .into_iter()
                    .map(|f| IndexChoice {
                        path: f.path,
                        display_name: f.template.display_name,
                    })
                    .collect()
            }
            Err(e) => {
                warn!("Failed to fetch index templates: {e}");
                problems.push(format!("Failed to fetch index templates: {e}"));
                Vec::new()
            }
        };
        let notice = (!problems.is_empty()).then(|| problems.join("; "));

        let id = Uuid::new_v4();
        let session = Session {
            document_type: document_type.to_string(),
            step: WizardStep::default(),
            workspace,
            content_templates: content.fetched.into_iter().map(|f| f.path).collect(),
            index_templates,
            cover: None,
            filled_cover: None,
            chosen_index: None,
            merged: None,
            notice,
            created_at: Instant::now(),
        };

        info!(
            "Created session {} for {} ({} templates, {} index pages)",
            id,
            document_type,
            session.content_templates.len(),
            session.index_templates.len()
        );
        self.sessions.write().await.insert(id, session);
        Ok(id.to_string())
    }

    /// Get a session by ID string.
    ///
    /// Returns `None` if the ID is not a valid UUID or session doesn't exist.
    pub async fn get_session(&self, id: &str) -> Option<SessionRef<'_>> {
        let uuid = Uuid::parse_str(id).ok()?;
        let sessions = self.sessions.read().await;
        if sessions.contains_key(&uuid) {
            Some(SessionRef {
                id: uuid,
                state: self,
            })
        } else {
            None
        }
    }

    /// Drop a session and its workspace.
    pub async fn remove_session(&self, id: &str) -> bool {
        let Ok(uuid) = Uuid::parse_str(id) else {
            return false;
        };
        self.sessions.write().await.remove(&uuid).is_some()
    }

    /// Drop sessions older than the configured maximum age.
    pub async fn cleanup_old_sessions(&self) {
        let max_age = self.config.wizard.session_max_age();
        let now = Instant::now();
        let expired = |created_at: Instant| now.duration_since(created_at) >= max_age;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !expired(session.created_at));
        let dropped = before - sessions.len();
        drop(sessions);

        self.admin_sessions
            .write()
            .await
            .retain(|_, admin| !expired(admin.created_at));

        if dropped > 0 {
            info!("Dropped {} expired session(s)", dropped);
        }
    }

    // =========================================================================
    // Admin sessions
    // =========================================================================

    /// Log an admin in and return the cookie token.
    pub async fn create_admin_session(&self, email: &str) -> String {
        let token = Uuid::new_v4();
        self.admin_sessions.write().await.insert(
            token,
            AdminSession {
                email: email.trim().to_string(),
                notice: None,
                created_at: Instant::now(),
            },
        );
        info!("Admin {} logged in", email.trim());
        token.to_string()
    }

    /// E-mail of the admin owning `token`.
    pub async fn admin_email(&self, token: &str) -> Option<String> {
        let token = Uuid::parse_str(token).ok()?;
        self.admin_sessions
            .read()
            .await
            .get(&token)
            .map(|admin| admin.email.clone())
    }

    pub async fn remove_admin_session(&self, token: &str) {
        if let Ok(token) = Uuid::parse_str(token) {
            self.admin_sessions.write().await.remove(&token);
        }
    }

    pub async fn set_admin_notice(&self, token: &str, notice: String) {
        if let Ok(token) = Uuid::parse_str(token)
            && let Some(admin) = self.admin_sessions.write().await.get_mut(&token)
        {
            admin.notice = Some(notice);
        }
    }

    /// Take the pending dashboard notice, if any.
    pub async fn take_admin_notice(&self, token: &str) -> Option<String> {
        let token = Uuid::parse_str(token).ok()?;
        self.admin_sessions
            .write()
            .await
            .get_mut(&token)
            .and_then(|admin| admin.notice.take())
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[cfg(test)]
    pub async fn age_sessions(&self, by: std::time::Duration) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values_mut() {
            session.created_at = session.created_at.checked_sub(by).unwrap_or(session.created_at);
        }
    }
}

/// A borrowed reference to a session.
///
/// Locks are taken only inside the synchronous closures passed to
/// `with_session`/`with_session_mut` and released before they return, so a
/// session lock is never held across an `.await`.
///
/// ```ignore
/// let (cover, out) = session.with_session(|s| (s.content_templates[0].clone(), s.workspace.unique_path("cover"))).await?;
/// run_blocking(move || fill(&cover, &out)).await;
/// ```
pub struct SessionRef<'a> {
    id: Uuid,
    state: &'a AppState,
}

impl SessionRef<'_> {
    pub fn id(&self) -> String {
        self.id.to_string()
    }

    /// Access session data immutably within a closure.
    pub async fn with_session<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&Session) -> R,
    {
        let sessions = self.state.sessions.read().await;
        sessions.get(&self.id).map(f)
    }

    /// Access session data mutably within a closure.
    pub async fn with_session_mut<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.state.sessions.write().await;
        sessions.get_mut(&self.id).map(f)
    }

    /// Record an inline error for the next render.
    pub async fn set_notice(&self, notice: impl Into<String>) {
        let notice = notice.into();
        warn!("Session {}: {}", self.id, notice);
        self.with_session_mut(|s| s.notice = Some(notice)).await;
    }
}
