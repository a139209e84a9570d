//! The fixed set of artifacts one conversion job can produce.
//!
//! The backend's multi-agent pipeline emits up to seven outputs per input
//! document. Announcement order is fixed: whenever several outputs become
//! available in the same discovery pass, they are surfaced in the order of
//! [`OutputKind::ALL`], regardless of the order the backend produced them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How an announced output is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Fetch the artifact body and surface it inline (plain text).
    InlineText,
    /// Surface a stable download URL instead of the content.
    ReferenceLink,
}

/// One of the seven artifact categories a job may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Raw text extracted from the uploaded document.
    ExtractedText,
    /// LLM summary of the document.
    Summary,
    /// Structured process template (JSON).
    DiagramTemplate,
    /// Template after the refinement pass (JSON).
    RefinedDiagramTemplate,
    /// First BPMN XML rendition.
    DiagramXmlRaw,
    /// BPMN XML after the refinement pass.
    DiagramXmlFinal,
    /// The final `.bpmn` file offered for download.
    DownloadableResult,
}

impl OutputKind {
    /// All kinds in canonical announcement order.
    pub const ALL: [OutputKind; 7] = [
        OutputKind::ExtractedText,
        OutputKind::Summary,
        OutputKind::DiagramTemplate,
        OutputKind::RefinedDiagramTemplate,
        OutputKind::DiagramXmlRaw,
        OutputKind::DiagramXmlFinal,
        OutputKind::DownloadableResult,
    ];

    /// The key the backend uses for this output in its job-output maps.
    pub fn backend_key(self) -> &'static str {
        match self {
            OutputKind::ExtractedText => "extracted_text",
            OutputKind::Summary => "summary",
            OutputKind::DiagramTemplate => "bpmn_template",
            OutputKind::RefinedDiagramTemplate => "refined_bpmn_template",
            OutputKind::DiagramXmlRaw => "bpmn_xml",
            OutputKind::DiagramXmlFinal => "final_bpmn_xml",
            OutputKind::DownloadableResult => "result",
        }
    }

    /// The artifact file name the backend stores for this kind.
    pub fn artifact_filename(self) -> &'static str {
        match self {
            OutputKind::ExtractedText => "extracted_text.txt",
            OutputKind::Summary => "summary.txt",
            OutputKind::DiagramTemplate => "bpmn_template.json",
            OutputKind::RefinedDiagramTemplate => "refined_bpmn_template.json",
            OutputKind::DiagramXmlRaw => "bpmn_xml.xml",
            OutputKind::DiagramXmlFinal => "final_bpmn_xml.bpmn",
            OutputKind::DownloadableResult => "result.bpmn.xml",
        }
    }

    /// Human-readable label, as shown in the results table.
    pub fn label(self) -> &'static str {
        match self {
            OutputKind::ExtractedText => "Extracted Text",
            OutputKind::Summary => "Summary",
            OutputKind::DiagramTemplate => "BPMN Template (JSON)",
            OutputKind::RefinedDiagramTemplate => "Refined BPMN Template (JSON)",
            OutputKind::DiagramXmlRaw => "BPMN XML (raw)",
            OutputKind::DiagramXmlFinal => "Final BPMN XML (.bpmn)",
            OutputKind::DownloadableResult => "Download Final BPMN",
        }
    }

    /// How announcements for this kind are rendered.
    pub fn render_strategy(self) -> RenderStrategy {
        match self {
            OutputKind::ExtractedText | OutputKind::Summary => RenderStrategy::InlineText,
            _ => RenderStrategy::ReferenceLink,
        }
    }

    /// Whether this artifact can be opened in the diagram viewer.
    ///
    /// Decided by the artifact's file extension: only diagram-format files
    /// (`.bpmn`, `.xml`) are importable.
    pub fn is_diagram(self) -> bool {
        let name = self.artifact_filename();
        name.ends_with(".bpmn") || name.ends_with(".xml")
    }

    /// Parse a backend output key, tolerating the `_path` suffix the
    /// legacy job-output map uses (`extracted_text_path` etc.).
    pub fn from_backend_key(key: &str) -> Result<Self, CoreError> {
        let key = key.strip_suffix("_path").unwrap_or(key);
        OutputKind::ALL
            .into_iter()
            .find(|k| k.backend_key() == key)
            .ok_or_else(|| CoreError::UnknownOutputKind(key.to_string()))
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.backend_key())
    }
}
