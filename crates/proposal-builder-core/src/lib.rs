//! Proposal Builder Core Library
//!
//! This library provides the building blocks for assembling proposal PDFs
//! from stored templates:
//! - Anchor-based text filling and page-preserving merging of PDFs
//! - Page rendering for previews
//! - Template storage (blobs plus metadata) and the catalog on top of it
//! - Word conversion and the proposal wizard's step logic

pub mod catalog;
pub mod config;
pub mod convert;
pub mod error;
pub mod pdf;
pub mod store;
pub mod util;
pub mod wizard;

pub use catalog::{BatchOutcome, FetchOutcome, FetchedTemplate, TemplateCatalog};
pub use config::{AppConfig, DEFAULT_DOCUMENT_TYPE, TextColor};
pub use convert::{DOCX_MIME, DocxConverter, PDF_MIME};
pub use error::{Error, ErrorKind, Result};
pub use pdf::{
    BoundingBox, FieldAnchor, FieldFiller, FillReport, ImageFormat, MatchMode, PageRenderer,
    PdfDocument, Placement, combine_pdfs, merge_files,
};
pub use store::{
    BlobStore, LocalBlobStore, NewTemplate, SledTemplateRepository, Template, TemplateKind,
    TemplateRepository,
};
pub use wizard::{CoverDetails, WizardStep};

