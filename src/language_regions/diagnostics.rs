//! Structural diagnostics for embedded markup regions

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, DiagnosticTag, NumberOrString};

use super::catalog::MarkupCatalog;
use super::mapping::PositionMapping;
use super::markers::{Marker, MarkerKind};
use super::EmbeddedRegion;
use crate::positions::line_index::LineIndex;
use crate::symbols::markup::build_outline;

pub const DIAGNOSTIC_SOURCE: &str = "pike-markup";

fn diagnostic(
    index: &LineIndex,
    mapping: &PositionMapping,
    marker: &Marker,
    code: &str,
    message: String,
) -> Diagnostic {
    let start = mapping.to_document(marker.offset.min(mapping.content_length));
    let end = mapping.to_document(marker.end().min(mapping.content_length));
    Diagnostic {
        range: index.range(start, end),
        severity: Some(DiagnosticSeverity::WARNING),
        code: Some(NumberOrString::String(code.to_string())),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message,
        ..Default::default()
    }
}

/// Reports deprecated tags, unmatched closers and unclosed elements of one
/// region in document coordinates.
pub fn region_diagnostics(region: &EmbeddedRegion, catalog: &MarkupCatalog, index: &LineIndex) -> Vec<Diagnostic> {
    let mapping = PositionMapping::for_region(region);
    let mut diagnostics = Vec::new();

    for marker in &region.markers {
        if !matches!(marker.kind, MarkerKind::OpenTag | MarkerKind::SelfClosingTag) {
            continue;
        }
        if let Some(replacement) = catalog.deprecation(&marker.name) {
            let mut diag = diagnostic(
                index,
                &mapping,
                marker,
                "deprecated-tag",
                format!("<{}> is deprecated, use {} instead", marker.name, replacement),
            );
            diag.tags = Some(vec![DiagnosticTag::DEPRECATED]);
            diagnostics.push(diag);
        }
    }

    let outline = build_outline(&region.markers, region.content_len(), catalog);
    for marker in &outline.stray_closers {
        diagnostics.push(diagnostic(
            index,
            &mapping,
            marker,
            "unmatched-close",
            format!("</{}> has no matching opening tag", marker.name),
        ));
    }
    for marker in &outline.unclosed {
        diagnostics.push(diagnostic(
            index,
            &mapping,
            marker,
            "unclosed-tag",
            format!("<{}> is never closed", marker.name),
        ));
    }

    diagnostics.sort_by_key(|d| (d.range.start.line, d.range.start.character));
    diagnostics
}

/// Diagnostics for every region of a document.
pub fn markup_diagnostics(regions: &[EmbeddedRegion], catalog: &MarkupCatalog, source: &str) -> Vec<Diagnostic> {
    let index = LineIndex::new(source);
    regions
        .iter()
        .flat_map(|region| region_diagnostics(region, catalog, &index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::language_regions::{MarkupDetector, RegionDetector};
    use std::sync::Arc;
    use tower_lsp::lsp_types::Position;

    fn diagnose(source: &str) -> Vec<Diagnostic> {
        let catalog = Arc::new(MarkupCatalog::default());
        let detector = MarkupDetector::new(catalog.clone(), DetectionConfig::default());
        let regions = detector.detect(source).regions;
        markup_diagnostics(&regions, &catalog, source)
    }

    #[test]
    fn test_deprecated_tag_in_document_coordinates() {
        let source = "void f() {\n  write(\"<center>hi</center>\");\n}\n";
        let diagnostics = diagnose(source);

        assert_eq!(diagnostics.len(), 1);
        let diag = &diagnostics[0];
        assert_eq!(diag.range.start, Position::new(1, 9));
        assert_eq!(diag.range.end, Position::new(1, 17));
        assert_eq!(diag.source.as_deref(), Some(DIAGNOSTIC_SOURCE));
        assert!(diag.message.contains("CSS text-align"));
    }

    #[test]
    fn test_unbalanced_tags() {
        let source = r#"string s = "<div><span>x</div></em>";"#;
        let diagnostics = diagnose(source);
        let codes: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| match &d.code {
                Some(NumberOrString::String(code)) => Some(code.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec!["unclosed-tag", "unmatched-close"]);
    }

    #[test]
    fn test_well_formed_markup_is_clean() {
        assert!(diagnose(r#"string s = "<ul><li>a<li>b</ul>";"#).is_empty());
    }
}
