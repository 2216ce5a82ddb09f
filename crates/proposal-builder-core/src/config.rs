use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable prefix for configuration overrides
/// (e.g. `PROPOSAL_ADMIN__PASSWORD`).
pub const ENV_PREFIX: &str = "PROPOSAL";

/// Text color for filled fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl TextColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn dark_blue() -> Self {
        Self::new(0.0, 0.0, 0.5)
    }

    pub const fn dark_gray() -> Self {
        Self::new(0.25, 0.25, 0.25)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "black" => Some(Self::black()),
            "darkblue" | "dark_blue" | "dark-blue" => Some(Self::dark_blue()),
            "darkgray" | "dark_gray" | "dark-gray" | "darkgrey" => Some(Self::dark_gray()),
            _ => None,
        }
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::black()
    }
}

/// Where template blobs and metadata records live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the blob store (defaults to the user data dir)
    pub blob_root: Option<PathBuf>,
    /// Path of the sled metadata database (defaults to the user data dir)
    pub metadata_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn blob_root(&self) -> PathBuf {
        self.blob_root
            .clone()
            .unwrap_or_else(|| crate::util::data_path().join("blobs"))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.metadata_path
            .clone()
            .unwrap_or_else(|| crate::util::data_path().join("metadata"))
    }
}

/// Preview rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Resolution for wizard page previews
    pub preview_dpi: f32,
    /// Resolution for admin template thumbnails
    pub admin_preview_dpi: f32,
    /// Maximum cached admin previews
    pub preview_cache_entries: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            preview_dpi: 150.0,
            admin_preview_dpi: 100.0,
            preview_cache_entries: 256,
        }
    }
}

/// Text-field filler settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Fixed font size in points; estimated from the anchor when unset
    pub font_size: Option<f32>,
    /// Colour of filled text
    pub text_color: TextColor,
}

/// Word conversion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// LibreOffice executable
    pub soffice_path: PathBuf,
    /// Kill the converter after this many seconds
    pub timeout_seconds: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            soffice_path: PathBuf::from("soffice"),
            timeout_seconds: 120,
        }
    }
}

impl ConvertConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Admin panel access
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// E-mail addresses allowed into the admin panel
    pub emails: Vec<String>,
    /// Shared admin password; the panel is disabled when unset
    pub password: Option<String>,
}

impl AdminConfig {
    /// Check a login attempt against the allow-list and password.
    pub fn authorize(&self, email: &str, password: &str) -> bool {
        let Some(expected) = self.password.as_deref() else {
            return false;
        };
        let email = email.trim();
        let password_ok: bool = expected.as_bytes().ct_eq(password.as_bytes()).into();
        !expected.is_empty()
            && password_ok
            && self.emails.iter().any(|e| e.trim().eq_ignore_ascii_case(email))
    }
}

/// Proposal wizard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// Page of the first content template that carries the cover anchors
    pub cover_page: usize,
    /// Sessions older than this are dropped by the cleanup task
    pub session_max_age_seconds: u64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            cover_page: 0,
            session_max_age_seconds: 3600,
        }
    }
}

impl WizardConfig {
    pub const fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_seconds)
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub render: RenderConfig,
    pub fill: FillConfig,
    pub convert: ConvertConfig,
    pub admin: AdminConfig,
    pub wizard: WizardConfig,
    /// Document types offered in the admin panel and wizard
    pub document_types: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            render: RenderConfig::default(),
            fill: FillConfig::default(),
            convert: ConvertConfig::default(),
            admin: AdminConfig::default(),
            wizard: WizardConfig::default(),
            document_types: default_document_types(),
        }
    }
}

/// Document type used when none is chosen
pub const DEFAULT_DOCUMENT_TYPE: &str = "Proposal";

fn default_document_types() -> Vec<String> {
    [
        "Proposal",
        "NDA",
        "Contract",
        "Invoice",
        "Pricing List",
        "Hiring Contract",
        "Receipt Generator",
        "Retainer Agreement",
        "API Access Agreement",
        "Maintenance Agreement",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl AppConfig {
    /// Load configuration from a file, with environment overrides on top.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(Some(path.as_ref()))
    }

    /// Load from default locations (~/.config/proposal-builder/config.toml,
    /// ./config.toml), with environment overrides on top.
    pub fn load() -> Result<Self> {
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("proposal-builder").join("config.toml");
            if user_config.exists() {
                tracing::debug!("Loading config from {}", user_config.display());
                return Self::build(Some(&user_config));
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./config.toml");
            return Self::build(Some(&local_config));
        }

        tracing::debug!("No config file found, using defaults and environment");
        Self::build(None)
    }

    fn build(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("admin.emails")
                .with_list_parse_key("document_types")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| Error::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the application cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.document_types.is_empty() {
            return Err(Error::ConfigInvalid {
                field: "document_types".to_string(),
                reason: "at least one document type is required".to_string(),
            });
        }
        for (field, dpi) in [
            ("render.preview_dpi", self.render.preview_dpi),
            ("render.admin_preview_dpi", self.render.admin_preview_dpi),
        ] {
            if !(dpi.is_finite() && dpi > 0.0) {
                return Err(Error::ConfigInvalid {
                    field: field.to_string(),
                    reason: format!("must be a positive number, got {dpi}"),
                });
            }
        }
        if let Some(size) = self.fill.font_size
            && !(size.is_finite() && size > 0.0)
        {
            return Err(Error::ConfigInvalid {
                field: "fill.font_size".to_string(),
                reason: format!("must be a positive number, got {size}"),
            });
        }
        Ok(())
    }

    /// Whether a document type is one this deployment offers.
    pub fn is_document_type(&self, name: &str) -> bool {
        self.document_types.iter().any(|t| t == name)
    }
}
