//! Content <-> document position mapping for embedded regions
//!
//! Mapping is a pure additive translation anchored at the region's document
//! start offset. Line/character positions are converted through line-start
//! indexes of the region content and of the enclosing document.

use tower_lsp::lsp_types::{Position as LspPosition, Range};
use tracing::trace;

use super::EmbeddedRegion;
use crate::positions::line_index::LineIndex;

/// Anchor pair for content <-> document offset translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionMapping {
    /// Document char offset of the region's first content char
    pub document_start: usize,
    /// Content length in chars
    pub content_length: usize,
}

impl PositionMapping {
    pub fn new(document_start: usize, content_length: usize) -> Self {
        Self {
            document_start,
            content_length,
        }
    }

    pub fn for_region(region: &EmbeddedRegion) -> Self {
        Self::new(region.start, region.end - region.start)
    }

    pub fn document_end(&self) -> usize {
        self.document_start + self.content_length
    }

    /// Maps a content offset to a document offset.
    ///
    /// Offsets up to and including `content_length` are valid, the latter
    /// being the exclusive end of the region.
    pub fn to_document(&self, content_offset: usize) -> usize {
        debug_assert!(
            content_offset <= self.content_length,
            "content offset {} outside region of length {}",
            content_offset,
            self.content_length
        );
        self.document_start + content_offset
    }

    /// Maps a document offset into the region, or `None` outside `[start, end)`.
    pub fn to_content(&self, document_offset: usize) -> Option<usize> {
        if document_offset < self.document_start || document_offset >= self.document_end() {
            return None;
        }
        Some(document_offset - self.document_start)
    }
}

/// Line/character mapper for one region within one document.
#[derive(Debug, Clone)]
pub struct RegionMapper<'a> {
    mapping: PositionMapping,
    content_index: LineIndex,
    document_index: &'a LineIndex,
}

impl<'a> RegionMapper<'a> {
    pub fn new(region: &EmbeddedRegion, document_index: &'a LineIndex) -> Self {
        Self {
            mapping: PositionMapping::for_region(region),
            content_index: LineIndex::new(&region.content),
            document_index,
        }
    }

    pub fn mapping(&self) -> PositionMapping {
        self.mapping
    }

    /// Maps a content position to a document position.
    pub fn to_document(&self, content_pos: LspPosition) -> Option<LspPosition> {
        let content_offset = self.content_index.offset(content_pos)?;
        let document_offset = self.mapping.to_document(content_offset);
        let mapped = self.document_index.position(document_offset);
        trace!(
            "Mapped content L{}:C{} -> document L{}:C{}",
            content_pos.line, content_pos.character, mapped.line, mapped.character
        );
        Some(mapped)
    }

    /// Maps a document position into the region, or `None` if outside it.
    pub fn to_content(&self, document_pos: LspPosition) -> Option<LspPosition> {
        let document_offset = self.document_index.offset(document_pos)?;
        let content_offset = self.mapping.to_content(document_offset)?;
        Some(self.content_index.position(content_offset))
    }

    pub fn range_to_document(&self, content_range: Range) -> Option<Range> {
        Some(Range {
            start: self.to_document(content_range.start)?,
            end: self.to_document(content_range.end)?,
        })
    }
}
