pub mod catalog;
pub mod detector;
pub mod diagnostics;
pub mod literals;
pub mod mapping;
pub mod markers;

pub use catalog::MarkupCatalog;
pub use detector::{DetectionResult, MarkupDetector, RegionDetector};
pub use literals::{StringLiteral, scan_string_literals};
pub use mapping::{PositionMapping, RegionMapper};
pub use markers::{Marker, MarkerKind};

/// A candidate embedded-language fragment inside a host string literal.
///
/// All offsets are document char offsets. `start..end` covers the literal's
/// content (quotes excluded) and is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedRegion {
    pub language: String,
    /// Offset of the literal's opening delimiter
    pub literal_start: usize,
    /// Offset one past the literal's closing quote
    pub literal_end: usize,
    pub start: usize,
    pub end: usize,
    pub content: String,
    /// Heuristic score in `[0, 1]`
    pub confidence: f64,
    /// Markers in content-local offsets
    pub markers: Vec<Marker>,
}

impl EmbeddedRegion {
    pub fn content_len(&self) -> usize {
        self.end - self.start
    }

    pub fn contains(&self, document_offset: usize) -> bool {
        self.start <= document_offset && document_offset < self.end
    }
}
