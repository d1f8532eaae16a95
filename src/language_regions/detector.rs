//! Detection of embedded markup inside host string literals
//!
//! Every string literal is scored by how much of its content is covered by
//! markup markers. Literals scoring below the configured confidence floor are
//! discarded; the rest become [`EmbeddedRegion`]s.

use std::sync::Arc;

use tracing::{debug, trace};

use super::catalog::MarkupCatalog;
use super::literals::scan_string_literals;
use super::markers::{confidence, scan_markers};
use super::EmbeddedRegion;
use crate::config::DetectionConfig;

/// Outcome of one detection pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    /// Retained regions in document order
    pub regions: Vec<EmbeddedRegion>,
    /// Literals that had markers but scored below the floor
    pub discarded: usize,
    pub literals_scanned: usize,
}

/// Detects embedded language regions in host source.
///
/// Implementations must be pure: the same source always yields the same
/// regions and scores, and detection may run concurrently on blocking threads.
pub trait RegionDetector: Send + Sync {
    /// Unique name, used for logging
    fn name(&self) -> &str;

    /// Language of the regions this detector produces
    fn language(&self) -> &str;

    fn detect(&self, source: &str) -> DetectionResult;
}

/// Detector for HTML embedded in Pike string literals.
#[derive(Debug, Clone)]
pub struct MarkupDetector {
    catalog: Arc<MarkupCatalog>,
    config: DetectionConfig,
}

impl MarkupDetector {
    pub fn new(catalog: Arc<MarkupCatalog>, config: DetectionConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &MarkupCatalog {
        &self.catalog
    }
}

impl RegionDetector for MarkupDetector {
    fn name(&self) -> &str {
        "pike-html-literals"
    }

    fn language(&self) -> &str {
        "html"
    }

    fn detect(&self, source: &str) -> DetectionResult {
        let literals = scan_string_literals(source);
        let mut result = DetectionResult {
            literals_scanned: literals.len(),
            ..Default::default()
        };

        for literal in literals {
            let len = literal.content_len();
            if len == 0 || len < self.config.min_literal_length {
                continue;
            }

            let markers = scan_markers(&literal.content, &self.catalog);
            if markers.is_empty() {
                continue;
            }

            let score = confidence(&markers, len);
            if score < self.config.confidence_floor {
                trace!(
                    "Discarding literal at {} with confidence {:.3} (floor {:.3})",
                    literal.start, score, self.config.confidence_floor
                );
                result.discarded += 1;
                continue;
            }

            result.regions.push(EmbeddedRegion {
                language: self.language().to_string(),
                literal_start: literal.start,
                literal_end: literal.end,
                start: literal.content_start,
                end: literal.content_end,
                content: literal.content,
                confidence: score,
                markers,
            });
        }

        debug!(
            "{} found {} regions in {} literals ({} below floor)",
            self.name(),
            result.regions.len(),
            result.literals_scanned,
            result.discarded
        );
        result
    }
}
