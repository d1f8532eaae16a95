//! Structural markers of the embedded markup language
//!
//! Markers are tags, attributes and character entities found in literal
//! content. Offsets are content-local char offsets.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::catalog::MarkupCatalog;
use crate::positions::line_index::byte_to_char;

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/)?([A-Za-z][A-Za-z0-9:-]*)(\s[^<>]*?)?\s*(/)?>").expect("tag pattern is valid")
});

static ATTRIBUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_:][A-Za-z0-9_.:-]*)\s*=").expect("attribute pattern is valid")
});

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#[xX][0-9A-Fa-f]+);").expect("entity pattern is valid")
});

static ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)id\s*=\s*\\?["']?([A-Za-z0-9_:.-]+)"#).expect("id pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerKind {
    OpenTag,
    CloseTag,
    SelfClosingTag,
    Attribute,
    Entity,
}

impl MarkerKind {
    pub fn is_tag(self) -> bool {
        matches!(self, MarkerKind::OpenTag | MarkerKind::CloseTag | MarkerKind::SelfClosingTag)
    }
}

/// One matched marker with its content-local position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub kind: MarkerKind,
    /// Tag, attribute or entity name, lowercased for tags and attributes
    pub name: String,
    /// Content char offset of the first char
    pub offset: usize,
    /// Length in chars
    pub len: usize,
    /// Value of an `id` attribute on a tag, if present
    pub element_id: Option<String>,
    /// Whether the name is in the catalog
    pub known: bool,
}

impl Marker {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Weight of this marker in the confidence score.
    pub fn weight(&self) -> f64 {
        match (self.kind, self.known) {
            (kind, true) if kind.is_tag() => 1.0,
            (kind, false) if kind.is_tag() => 0.4,
            (MarkerKind::Attribute, true) => 0.5,
            (MarkerKind::Attribute, false) => 0.2,
            _ => 0.5,
        }
    }
}

/// Finds every marker in `content`, ordered by offset.
pub fn scan_markers(content: &str, catalog: &MarkupCatalog) -> Vec<Marker> {
    let mut markers = Vec::new();

    for captures in TAG_RE.captures_iter(content) {
        let Some(whole) = captures.get(0) else { continue };
        let Some(name) = captures.get(2) else { continue };
        let name = name.as_str().to_ascii_lowercase();
        let kind = if captures.get(1).is_some() {
            MarkerKind::CloseTag
        } else if captures.get(4).is_some() {
            MarkerKind::SelfClosingTag
        } else {
            MarkerKind::OpenTag
        };
        let attributes = captures.get(3);
        let element_id = attributes
            .and_then(|attrs| ID_RE.captures(attrs.as_str()))
            .and_then(|id| id.get(1))
            .map(|id| id.as_str().to_string());

        markers.push(Marker {
            kind,
            known: catalog.is_known_tag(&name),
            name,
            offset: byte_to_char(content, whole.start()),
            len: whole.as_str().chars().count(),
            element_id,
        });

        if let Some(attrs) = attributes {
            for attr in ATTRIBUTE_RE.captures_iter(attrs.as_str()) {
                let (Some(attr_match), Some(attr_name)) = (attr.get(0), attr.get(1)) else { continue };
                let attr_name = attr_name.as_str().to_ascii_lowercase();
                markers.push(Marker {
                    kind: MarkerKind::Attribute,
                    known: catalog.is_known_attribute(&attr_name),
                    name: attr_name,
                    offset: byte_to_char(content, attrs.start() + attr_match.start()),
                    len: attr_match.as_str().chars().count(),
                    element_id: None,
                });
            }
        }
    }

    for entity in ENTITY_RE.find_iter(content) {
        markers.push(Marker {
            kind: MarkerKind::Entity,
            name: entity.as_str().to_string(),
            offset: byte_to_char(content, entity.start()),
            len: entity.as_str().chars().count(),
            element_id: None,
            known: true,
        });
    }

    markers.sort_by_key(|marker| (marker.offset, !marker.kind.is_tag()));
    markers
}

/// Weighted marker coverage of `content_len` chars, clamped to `[0, 1]`.
pub fn confidence(markers: &[Marker], content_len: usize) -> f64 {
    if content_len == 0 {
        return 0.0;
    }
    let weighted: f64 = markers.iter().map(|m| m.weight() * m.len as f64).sum();
    (weighted / content_len as f64).clamp(0.0, 1.0)
}
