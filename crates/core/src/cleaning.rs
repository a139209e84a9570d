//! Diagram-markup extraction from LLM-flavoured artifact text.
//!
//! The pipeline's XML-producing agents occasionally wrap their output in
//! conversational preamble ("Certainly! Here is the refined...") despite
//! being told not to. Before such an artifact is imported into the viewer
//! or offered for download, the clean XML span is carved out of the text.
//!
//! If no clean span can be found the text is passed through unmodified and
//! the rendering engine's own error reporting takes over.

const XML_DECL: &str = "<?xml";
const ROOT_OPEN: &str = "<bpmn:definitions";
const ROOT_CLOSE: &str = "</bpmn:definitions>";
const ROOT_NAME: &str = "bpmn:definitions";

/// Narrative markers that indicate an artifact needs cleaning before use.
const NARRATIVE_MARKERS: &[&str] = &[
    "Certainly!",
    "**refined, deployment-ready BPMN 2.0 XML**",
];

/// Whether the text carries narrative preamble mixed with the markup.
pub fn needs_cleaning(text: &str) -> bool {
    NARRATIVE_MARKERS.iter().any(|m| text.contains(m))
}

/// Extract the BPMN XML span from `text`, dropping any explanatory text
/// around it.
///
/// The span starts at the first `<?xml` declaration (or, failing that, the
/// root `<bpmn:definitions` opening tag) and ends at the matching
/// `</bpmn:definitions>` closing tag. When the proper closing tag is
/// missing, the `>` after the last `bpmn:definitions` occurrence is used
/// as a best-effort end. Returns the input unchanged when no clean span
/// exists.
pub fn extract_diagram_xml(text: &str) -> &str {
    if text.is_empty() {
        return text;
    }

    let start = match text.find(XML_DECL).or_else(|| text.find(ROOT_OPEN)) {
        Some(pos) => pos,
        None => return text,
    };

    let end = match text.find(ROOT_CLOSE) {
        Some(pos) => pos + ROOT_CLOSE.len(),
        None => {
            // Best effort: close after the last root-element occurrence.
            let Some(last) = text.rfind(ROOT_NAME) else {
                return text;
            };
            match text[last..].find('>') {
                Some(gt) => last + gt + 1,
                None => return text,
            }
        }
    };

    if end <= start {
        return text;
    }

    let span = text[start..end].trim();

    // Sanity check the carve-out before trusting it.
    if span.starts_with(XML_DECL) || span.starts_with(ROOT_OPEN) {
        span
    } else {
        text
    }
}
