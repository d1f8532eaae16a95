//! Element outline of an embedded markup region
//!
//! The outline is rebuilt from the region's tag markers with a stack of open
//! elements, the way a forgiving HTML parser would: void and self-closing
//! tags are leaves, a closer pops back to its matching opener and anything
//! left open at the end of the content is closed there.

use tower_lsp::lsp_types::SymbolKind;

use super::node::{SymbolNode, SymbolOrigin};
use crate::language_regions::{Marker, MarkerKind, MarkupCatalog};

/// Element tree of one region plus the structural problems found building it.
#[derive(Debug, Clone, Default)]
pub struct MarkupOutline {
    /// Top-level elements in content coordinates
    pub roots: Vec<SymbolNode>,
    /// Openers never closed, excluding tags whose end tag is optional
    pub unclosed: Vec<Marker>,
    /// Closers with no matching opener
    pub stray_closers: Vec<Marker>,
}

struct OpenElement<'m> {
    marker: &'m Marker,
    children: Vec<SymbolNode>,
}

fn element_name(marker: &Marker) -> String {
    match &marker.element_id {
        Some(id) => format!("{}#{}", marker.name, id),
        None => marker.name.clone(),
    }
}

fn leaf(marker: &Marker) -> SymbolNode {
    SymbolNode::new(
        element_name(marker),
        SymbolKind::FIELD,
        marker.offset,
        marker.end(),
        SymbolOrigin::Embedded,
    )
}

fn close(open: OpenElement<'_>, end: usize) -> SymbolNode {
    SymbolNode::new(
        element_name(open.marker),
        SymbolKind::FIELD,
        open.marker.offset,
        end,
        SymbolOrigin::Embedded,
    )
    .with_children(open.children)
}

fn attach(stack: &mut [OpenElement<'_>], roots: &mut Vec<SymbolNode>, node: SymbolNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Builds the element outline from markers ordered by offset.
pub fn build_outline(markers: &[Marker], content_len: usize, catalog: &MarkupCatalog) -> MarkupOutline {
    let mut outline = MarkupOutline::default();
    let mut stack: Vec<OpenElement<'_>> = Vec::new();

    for marker in markers {
        match marker.kind {
            MarkerKind::OpenTag if catalog.is_void(&marker.name) => {
                attach(&mut stack, &mut outline.roots, leaf(marker));
            }
            MarkerKind::OpenTag => stack.push(OpenElement {
                marker,
                children: Vec::new(),
            }),
            MarkerKind::SelfClosingTag => {
                attach(&mut stack, &mut outline.roots, leaf(marker));
            }
            MarkerKind::CloseTag => {
                let Some(depth) = stack.iter().rposition(|open| open.marker.name == marker.name) else {
                    outline.stray_closers.push(marker.clone());
                    continue;
                };
                while stack.len() > depth + 1 {
                    if let Some(inner) = stack.pop() {
                        if !catalog.has_optional_end(&inner.marker.name) {
                            outline.unclosed.push(inner.marker.clone());
                        }
                        let node = close(inner, marker.offset);
                        attach(&mut stack, &mut outline.roots, node);
                    }
                }
                if let Some(open) = stack.pop() {
                    let node = close(open, marker.end());
                    attach(&mut stack, &mut outline.roots, node);
                }
            }
            MarkerKind::Attribute | MarkerKind::Entity => {}
        }
    }

    while let Some(open) = stack.pop() {
        if !catalog.has_optional_end(&open.marker.name) {
            outline.unclosed.push(open.marker.clone());
        }
        let node = close(open, content_len);
        attach(&mut stack, &mut outline.roots, node);
    }

    outline.unclosed.sort_by_key(|m| m.offset);
    outline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language_regions::markers::scan_markers;

    fn outline(content: &str) -> MarkupOutline {
        let catalog = MarkupCatalog::default();
        let markers = scan_markers(content, &catalog);
        build_outline(&markers, content.chars().count(), &catalog)
    }

    #[test]
    fn test_nested_elements() {
        let content = r#"<ul id="nav"><li>a</li><li>b<br></li></ul>"#;
        let outline = outline(content);

        assert_eq!(outline.roots.len(), 1);
        let list = &outline.roots[0];
        assert_eq!(list.name, "ul#nav");
        assert_eq!((list.start, list.end), (0, content.chars().count()));
        assert_eq!(list.children.len(), 2);
        assert_eq!(list.children[1].children[0].name, "br");
        assert!(outline.unclosed.is_empty());
        assert!(outline.stray_closers.is_empty());
    }

    #[test]
    fn test_unclosed_and_stray() {
        let outline = outline("<div><span>x</div></b>");

        assert_eq!(outline.roots.len(), 1);
        let div = &outline.roots[0];
        assert_eq!(div.children[0].name, "span");
        // `span` is closed where its parent's closer starts
        assert_eq!(div.children[0].end, 12);
        assert_eq!(outline.unclosed.len(), 1);
        assert_eq!(outline.unclosed[0].name, "span");
        assert_eq!(outline.stray_closers.len(), 1);
        assert_eq!(outline.stray_closers[0].name, "b");
    }

    #[test]
    fn test_optional_end_tags_are_not_reported() {
        let content = "<ul><li>one<li>two</ul>";
        let outline = outline(content);
        assert!(outline.unclosed.is_empty());
        // the first `li` stays open until the list closes
        assert_eq!(outline.roots[0].children.len(), 1);
    }

    #[test]
    fn test_fragment_closed_at_content_end() {
        let paragraph = outline("<p>unterminated");
        assert_eq!(paragraph.roots[0].end, 15);
        assert!(paragraph.unclosed.is_empty());

        let division = outline("<div>unterminated");
        assert_eq!(division.unclosed.len(), 1);
    }
}
