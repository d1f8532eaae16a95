use tower_lsp::lsp_types::{DocumentSymbol, SymbolKind};

use crate::language_regions::PositionMapping;
use crate::positions::line_index::LineIndex;

/// Which language a symbol came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolOrigin {
    Host,
    Embedded,
}

/// One entry of a symbol tree.
///
/// `start`/`end` are char offsets, in content coordinates for embedded trees
/// before merging and in document coordinates afterwards. A node exclusively
/// owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolNode {
    pub name: String,
    pub detail: Option<String>,
    pub kind: SymbolKind,
    pub start: usize,
    pub end: usize,
    pub origin: SymbolOrigin,
    pub children: Vec<SymbolNode>,
}

impl SymbolNode {
    pub fn new(name: impl Into<String>, kind: SymbolKind, start: usize, end: usize, origin: SymbolOrigin) -> Self {
        Self {
            name: name.into(),
            detail: None,
            kind,
            start,
            end: end.max(start),
            origin,
            children: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_children(mut self, children: Vec<SymbolNode>) -> Self {
        self.children = children;
        self
    }

    pub fn contains(&self, other: &SymbolNode) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &SymbolNode) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Same symbol ignoring children.
    pub fn same_entry(&self, other: &SymbolNode) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.start == other.start
            && self.end == other.end
            && self.origin == other.origin
    }

    /// Translates this subtree from content to document coordinates.
    pub fn translated(mut self, mapping: &PositionMapping) -> Self {
        self.start = mapping.to_document(self.start.min(mapping.content_length));
        self.end = mapping.to_document(self.end.min(mapping.content_length));
        self.children = self
            .children
            .into_iter()
            .map(|child| child.translated(mapping))
            .collect();
        self
    }

    /// Number of nodes in this subtree.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SymbolNode::count).sum::<usize>()
    }

    #[allow(deprecated)]
    pub fn to_document_symbol(&self, index: &LineIndex) -> DocumentSymbol {
        let range = index.range(self.start, self.end);
        DocumentSymbol {
            name: self.name.clone(),
            detail: self.detail.clone(),
            kind: self.kind,
            tags: None,
            deprecated: None,
            range,
            selection_range: range,
            children: if self.children.is_empty() {
                None
            } else {
                Some(self.children.iter().map(|c| c.to_document_symbol(index)).collect())
            },
        }
    }
}
