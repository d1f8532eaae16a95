//! Lookup tables for the embedded markup language
//!
//! Tag names, void elements, attributes and deprecated tags are static data.
//! A default HTML table ships with the server; configuration may replace it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Read-only tag/attribute/deprecation tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarkupCatalog {
    pub tags: HashSet<String>,
    /// Elements that never take a closing tag
    pub void_tags: HashSet<String>,
    /// Elements whose closing tag may be omitted
    pub optional_end_tags: HashSet<String>,
    pub attributes: HashSet<String>,
    /// Deprecated tag -> suggested replacement
    pub deprecated_tags: HashMap<String, String>,
}

const HTML_TAGS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base",
    "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code",
    "col", "colgroup", "data", "dd", "del", "details", "dfn", "dialog", "div",
    "dl", "dt", "em", "embed", "fieldset", "figcaption", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hr", "html",
    "i", "iframe", "img", "input", "ins", "kbd", "label", "legend", "li",
    "link", "main", "map", "mark", "meta", "nav", "noscript", "object", "ol",
    "optgroup", "option", "output", "p", "param", "picture", "pre", "progress",
    "q", "s", "samp", "script", "section", "select", "small", "source", "span",
    "strong", "style", "sub", "summary", "sup", "table", "tbody", "td",
    "template", "textarea", "tfoot", "th", "thead", "time", "title", "tr",
    "track", "u", "ul", "var", "video", "wbr",
    // deprecated, still recognised
    "acronym", "applet", "basefont", "big", "blink", "center", "dir", "font",
    "frame", "frameset", "marquee", "strike", "tt",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr", "basefont", "frame",
];

const OPTIONAL_END_TAGS: &[&str] = &[
    "li", "dt", "dd", "p", "tr", "td", "th", "option", "optgroup", "thead",
    "tbody", "tfoot", "colgroup",
];

const HTML_ATTRIBUTES: &[&str] = &[
    "accept", "action", "align", "alt", "autocomplete", "bgcolor", "border",
    "checked", "class", "cols", "colspan", "content", "data", "disabled",
    "enctype", "for", "height", "href", "id", "lang", "method", "multiple",
    "name", "placeholder", "readonly", "rel", "required", "rows", "rowspan",
    "selected", "size", "src", "style", "tabindex", "target", "title", "type",
    "value", "width",
];

const DEPRECATED_TAGS: &[(&str, &str)] = &[
    ("acronym", "abbr"),
    ("applet", "object"),
    ("basefont", "CSS font properties"),
    ("big", "CSS font-size"),
    ("blink", "CSS animations"),
    ("center", "CSS text-align"),
    ("dir", "ul"),
    ("font", "CSS font properties"),
    ("frame", "iframe"),
    ("frameset", "CSS layout"),
    ("marquee", "CSS animations"),
    ("strike", "del or s"),
    ("tt", "code or kbd"),
];

impl Default for MarkupCatalog {
    fn default() -> Self {
        let set = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            tags: set(HTML_TAGS),
            void_tags: set(VOID_TAGS),
            optional_end_tags: set(OPTIONAL_END_TAGS),
            attributes: set(HTML_ATTRIBUTES),
            deprecated_tags: DEPRECATED_TAGS
                .iter()
                .map(|(tag, replacement)| (tag.to_string(), replacement.to_string()))
                .collect(),
        }
    }
}

impl MarkupCatalog {
    pub fn is_known_tag(&self, name: &str) -> bool {
        self.tags.contains(&name.to_ascii_lowercase())
    }

    pub fn is_void(&self, name: &str) -> bool {
        self.void_tags.contains(&name.to_ascii_lowercase())
    }

    pub fn has_optional_end(&self, name: &str) -> bool {
        self.optional_end_tags.contains(&name.to_ascii_lowercase())
    }

    pub fn is_known_attribute(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.attributes.contains(&name) || name.starts_with("data-") || name.starts_with("aria-")
    }

    /// Suggested replacement if `name` is deprecated.
    pub fn deprecation(&self, name: &str) -> Option<&str> {
        self.deprecated_tags
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups_are_case_insensitive() {
        let catalog = MarkupCatalog::default();
        assert!(catalog.is_known_tag("DIV"));
        assert!(catalog.is_void("Br"));
        assert!(catalog.is_known_attribute("HREF"));
        assert!(catalog.is_known_attribute("data-user"));
        assert_eq!(catalog.deprecation("CENTER"), Some("CSS text-align"));
        assert_eq!(catalog.deprecation("div"), None);
    }

    #[test]
    fn test_partial_config_keeps_defaults_for_missing_tables() {
        let catalog: MarkupCatalog =
            serde_json::from_value(serde_json::json!({ "tags": ["x-widget"] })).unwrap();
        assert!(catalog.is_known_tag("x-widget"));
        assert!(!catalog.is_known_tag("div"));
        assert!(catalog.is_void("br"));
    }
}
