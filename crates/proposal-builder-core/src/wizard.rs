//! Proposal wizard: step machine, cover fields and page assembly.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pdf::{FieldAnchor, FieldFiller, FillReport, Placement, merge_files};
use crate::error::Result;

/// Date printed on the cover in place of the template's sample date.
pub const COVER_DATE_ANCHOR: &str = "14 April 2025";

/// Format of the cover date, e.g. `03 March 2026`.
pub const COVER_DATE_FORMAT: &str = "%d %B %Y";

/// The three wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WizardStep {
    #[default]
    CollectInfo,
    ChooseIndex,
    PreviewAndDownload,
}

impl WizardStep {
    pub const fn next(self) -> Self {
        match self {
            Self::CollectInfo => Self::ChooseIndex,
            Self::ChooseIndex | Self::PreviewAndDownload => Self::PreviewAndDownload,
        }
    }

    pub const fn previous(self) -> Self {
        match self {
            Self::CollectInfo | Self::ChooseIndex => Self::CollectInfo,
            Self::PreviewAndDownload => Self::ChooseIndex,
        }
    }

    /// 1-based step number for display.
    pub const fn number(self) -> u8 {
        match self {
            Self::CollectInfo => 1,
            Self::ChooseIndex => 2,
            Self::PreviewAndDownload => 3,
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::CollectInfo => "Your details",
            Self::ChooseIndex => "Select index page style",
            Self::PreviewAndDownload => "Full proposal preview",
        }
    }
}

/// Details printed on the proposal cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub date: NaiveDate,
}

impl CoverDetails {
    pub fn formatted_date(&self) -> String {
        self.date.format(COVER_DATE_FORMAT).to_string()
    }

    /// Anchors understood by cover templates.
    pub fn anchors(&self) -> Vec<FieldAnchor> {
        vec![
            FieldAnchor::new("Name:", format!(" {}", self.name.trim())),
            FieldAnchor::new("Email:", format!(" {}", self.email.trim())),
            FieldAnchor::new("Phone", format!(": {}", self.phone.trim())),
            FieldAnchor::new("Country", format!(": {}", self.country.trim())),
            FieldAnchor::new(COVER_DATE_ANCHOR, self.formatted_date()).placement(Placement::Replace),
        ]
    }
}

/// Fill the cover page of `cover_template` into `output`.
pub fn fill_cover(
    filler: &FieldFiller,
    cover_template: &Path,
    page: usize,
    details: &CoverDetails,
    output: &Path,
) -> Result<FillReport> {
    filler.fill_file(cover_template, page, &details.anchors(), output)
}

/// Merge order of the final proposal: filled cover, chosen index page (if
/// any), then the content templates from the third onwards.
///
/// The first content template is the cover source and the second is the
/// slot taken by the index page.
pub fn assembly_order(filled_cover: &Path, index: Option<&Path>, content: &[PathBuf]) -> Vec<PathBuf> {
    let mut order = Vec::with_capacity(content.len() + 1);
    order.push(filled_cover.to_path_buf());
    if let Some(index) = index {
        order.push(index.to_path_buf());
    }
    order.extend(content.iter().skip(2).cloned());
    order
}

/// Merge the final proposal into `output`, returning its page count.
pub fn assemble(
    filled_cover: &Path,
    index: Option<&Path>,
    content: &[PathBuf],
    output: &Path,
) -> Result<usize> {
    merge_files(&assembly_order(filled_cover, index, content), output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> CoverDetails {
        CoverDetails {
            name: " Ada Lovelace ".to_string(),
            email: "ada@example.com".to_string(),
            phone: "+44 20 7946 0000".to_string(),
            country: "United Kingdom".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap_or_default(),
        }
    }

    #[test]
    fn test_steps_are_linear() {
        let mut step = WizardStep::default();
        assert_eq!(step, WizardStep::CollectInfo);
        step = step.next();
        assert_eq!(step, WizardStep::ChooseIndex);
        step = step.next();
        assert_eq!(step, WizardStep::PreviewAndDownload);
        assert_eq!(step.next(), WizardStep::PreviewAndDownload);
        assert_eq!(step.previous(), WizardStep::ChooseIndex);
        assert_eq!(step.previous().previous(), WizardStep::CollectInfo);
        assert_eq!(WizardStep::CollectInfo.previous(), WizardStep::CollectInfo);
        assert_eq!(step.number(), 3);
    }

    #[test]
    fn test_cover_anchors() {
        let anchors = details().anchors();
        assert_eq!(anchors.len(), 5);
        assert_eq!(anchors[0].search_text, "Name:");
        assert_eq!(anchors[0].replacement_text, " Ada Lovelace");
        assert_eq!(anchors[2].replacement_text, ": +44 20 7946 0000");
        assert_eq!(anchors[4].search_text, COVER_DATE_ANCHOR);
        assert_eq!(anchors[4].replacement_text, "03 March 2026");
        assert_eq!(anchors[4].placement, Placement::Replace);
    }

    #[test]
    fn test_assembly_order_skips_first_two_content_templates() {
        let content: Vec<PathBuf> = (1..=5).map(|i| PathBuf::from(format!("t{i}.pdf"))).collect();
        let order = assembly_order(Path::new("cover.pdf"), Some(Path::new("index.pdf")), &content);
        let names: Vec<_> = order.iter().map(|p| p.to_string_lossy().to_string()).collect();
        assert_eq!(names, vec!["cover.pdf", "index.pdf", "t3.pdf", "t4.pdf", "t5.pdf"]);
    }

    #[test]
    fn test_assembly_order_without_index() {
        let content = vec![PathBuf::from("t1.pdf")];
        let order = assembly_order(Path::new("cover.pdf"), None, &content);
        assert_eq!(order, vec![PathBuf::from("cover.pdf")]);
    }
}
