//! Embedded HTML detection, position mapping and diagnostics

mod common;

use indoc::indoc;
use tower_lsp::lsp_types::{DiagnosticSeverity, DiagnosticTag, NumberOrString, Position};

use pike_language_server::analysis::RawDiagnostic;
use pike_language_server::engine::SourceDocument;
use pike_language_server::errors::{ErrorKind, LspError};
use pike_language_server::language_regions::RegionMapper;
use pike_language_server::positions::LineIndex;

use common::{FakeProvider, engine_with};

const TEMPLATE: &str = indoc! {r#"
    // "<b>not a literal</b>"
    string page = #"<div>
      <p>Hi</p>
    </div>";
    int limit = a < b;
"#};

#[test]
fn test_multiline_literal_is_one_region() {
    let engine = engine_with(FakeProvider::new());
    let regions = engine.detect_embedded_regions(TEMPLATE);

    assert_eq!(regions.len(), 1);
    let region = &regions[0];
    assert_eq!(region.language, "html");
    assert_eq!(region.content, "<div>\n  <p>Hi</p>\n</div>");
    assert!(region.confidence >= 0.3 && region.confidence <= 1.0);

    let index = LineIndex::new(TEMPLATE);
    assert_eq!(index.position(region.literal_start), Position::new(1, 14));
    assert_eq!(index.position(region.start), Position::new(1, 16));
}

#[test]
fn test_region_positions_map_both_ways() {
    let engine = engine_with(FakeProvider::new());
    let regions = engine.detect_embedded_regions(TEMPLATE);
    let index = LineIndex::new(TEMPLATE);
    let mapper = RegionMapper::new(&regions[0], &index);

    assert_eq!(mapper.to_document(Position::new(0, 0)), Some(Position::new(1, 16)));
    assert_eq!(mapper.to_document(Position::new(1, 2)), Some(Position::new(2, 2)));
    assert_eq!(mapper.to_content(Position::new(2, 2)), Some(Position::new(1, 2)));
    assert_eq!(mapper.to_content(Position::new(3, 0)), Some(Position::new(2, 0)));

    // the delimiters and surrounding host code are outside the region
    assert_eq!(mapper.to_content(Position::new(1, 15)), None);
    assert_eq!(mapper.to_content(Position::new(4, 0)), None);
}

#[test]
fn test_detection_is_repeatable() {
    let engine = engine_with(FakeProvider::new());
    assert_eq!(
        engine.detect_embedded_regions(TEMPLATE),
        engine.detect_embedded_regions(TEMPLATE)
    );
}

#[tokio::test]
async fn test_interpreter_and_markup_diagnostics_are_combined() {
    let source = indoc! {r#"
        void banner() {
          write("<center>Welcome</center>");
          undefined_call();
        }
    "#};
    let engine = engine_with(FakeProvider::new().with_diagnostics(vec![RawDiagnostic {
        message: "Undefined identifier undefined_call.".into(),
        line: Some(3),
        location: None,
        severity: None,
    }]));

    let diagnostics = engine
        .diagnostics(SourceDocument::new("/src/banner.pike", source))
        .await;

    assert_eq!(diagnostics.len(), 2);
    let compiler = &diagnostics[0];
    assert_eq!(compiler.source.as_deref(), Some("pike"));
    assert_eq!(compiler.severity, Some(DiagnosticSeverity::ERROR));
    assert_eq!(compiler.range.start.line, 2);

    let markup = &diagnostics[1];
    assert_eq!(markup.source.as_deref(), Some("pike-markup"));
    assert_eq!(markup.code, Some(NumberOrString::String("deprecated-tag".into())));
    assert_eq!(markup.tags, Some(vec![DiagnosticTag::DEPRECATED]));
    assert_eq!(markup.range.start, Position::new(1, 9));
    assert_eq!(markup.range.end, Position::new(1, 17));
}

#[tokio::test]
async fn test_markup_diagnostics_survive_interpreter_failure() {
    let source = "string s = \"<div><span>x</div>\";\n";
    let engine = engine_with(
        FakeProvider::new().failing_diagnostics(LspError::bridge(ErrorKind::ProcessExited, "Interpreter exited unexpectedly")),
    );

    let diagnostics = engine
        .diagnostics(SourceDocument::new("/src/s.pike", source))
        .await;

    let codes: Vec<_> = diagnostics.iter().filter_map(|d| d.code.clone()).collect();
    assert_eq!(codes, vec![NumberOrString::String("unclosed-tag".into())]);
    assert_eq!(diagnostics[0].range.start, Position::new(0, 17));
}

#[tokio::test]
async fn test_stray_closer_is_reported() {
    let source = "write(\"<p>one</p></li>\");";
    let engine = engine_with(FakeProvider::new());

    let diagnostics = engine
        .diagnostics(SourceDocument::new("/src/s.pike", source))
        .await;

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, Some(NumberOrString::String("unmatched-close".into())));
    assert!(diagnostics[0].message.contains("</li>"));
}
