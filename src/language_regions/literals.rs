//! Pike string literal extraction
//!
//! Literal boundaries follow the host language's rules, never the embedded
//! language's: `"..."` with backslash escapes and no raw newline, `#"..."` which
//! may span lines, `'c'` character literals, and `//` / `/* */` comments whose
//! quotes must not open a literal. Escape sequences are kept verbatim in the
//! extracted content so content offsets map 1:1 onto document offsets.

use tracing::trace;

/// A string literal found in host source. Offsets are char offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    /// Offset of the opening delimiter (`"` or `#`)
    pub start: usize,
    /// Offset one past the closing `"`
    pub end: usize,
    /// Offset of the first content char
    pub content_start: usize,
    /// Offset one past the last content char
    pub content_end: usize,
    /// Raw content between the quotes
    pub content: String,
    pub multiline: bool,
}

impl StringLiteral {
    pub fn content_len(&self) -> usize {
        self.content_end - self.content_start
    }
}

/// Scans `source` for string literals, skipping comments and char literals.
/// Unterminated literals are dropped.
pub fn scan_string_literals(source: &str) -> Vec<StringLiteral> {
    let chars: Vec<char> = source.chars().collect();
    let mut literals = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            '\'' => {
                i += 1;
                while i < chars.len() && chars[i] != '\'' && chars[i] != '\n' {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            '#' if chars.get(i + 1) == Some(&'"') => {
                let (literal, next) = read_literal(&chars, i, i + 2, true);
                literals.extend(literal);
                i = next;
            }
            '"' => {
                let (literal, next) = read_literal(&chars, i, i + 1, false);
                literals.extend(literal);
                i = next;
            }
            _ => i += 1,
        }
    }

    trace!("Scanned {} string literals", literals.len());
    literals
}

/// Reads a literal whose content begins at `content_start`. Returns the literal
/// (if terminated) and the index to resume scanning from.
fn read_literal(
    chars: &[char],
    start: usize,
    content_start: usize,
    multiline: bool,
) -> (Option<StringLiteral>, usize) {
    let mut i = content_start;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => {
                let literal = StringLiteral {
                    start,
                    end: i + 1,
                    content_start,
                    content_end: i,
                    content: chars[content_start..i].iter().collect(),
                    multiline,
                };
                return (Some(literal), i + 1);
            }
            '\n' if !multiline => return (None, i),
            _ => i += 1,
        }
    }
    (None, chars.len())
}
