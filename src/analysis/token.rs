//! Tokens produced by the interpreter's tokenizer
//!
//! The interpreter reports each token's literal text and its 1-based source
//! line. Classification is best effort: the interpreter may supply a kind, and
//! otherwise one is derived locally from the configured keyword set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Coarse token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Identifier,
    Keyword,
    Other,
}

/// One lexical unit from the host tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// 1-based source line (host convention)
    pub line: u32,
    pub kind: TokenKind,
}

impl Token {
    /// Creates a token, clamping the line to the host convention minimum of 1.
    pub fn new(text: impl Into<String>, line: u32, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            line: line.max(1),
            kind,
        }
    }

    /// 0-based line index of this token.
    pub fn line_index(&self) -> u32 {
        self.line.saturating_sub(1)
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }
}

/// Token as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct RawToken {
    pub text: String,
    pub line: u32,
    #[serde(default)]
    pub kind: Option<TokenKind>,
}

/// Keywords of the host language, used to classify tokens the interpreter
/// left unclassified.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    words: HashSet<String>,
}

const PIKE_KEYWORDS: &[&str] = &[
    "array", "auto", "break", "case", "catch", "class", "constant", "continue",
    "default", "do", "else", "enum", "extern", "final", "float", "for",
    "foreach", "function", "gauge", "global", "if", "import", "inherit",
    "inline", "int", "lambda", "local", "mapping", "mixed", "multiset",
    "object", "optional", "predef", "private", "program", "protected",
    "public", "return", "sscanf", "static", "string", "switch", "typedef",
    "typeof", "variant", "void", "while", "zero",
];

impl Default for KeywordSet {
    fn default() -> Self {
        Self::new(PIKE_KEYWORDS.iter().copied())
    }
}

impl KeywordSet {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Classifies a token's text.
    pub fn classify(&self, text: &str) -> TokenKind {
        if self.contains(text) {
            TokenKind::Keyword
        } else if is_identifier_text(text) {
            TokenKind::Identifier
        } else {
            TokenKind::Other
        }
    }

    /// Converts wire tokens, keeping any kind the interpreter supplied.
    pub fn tokens_from_raw(&self, raw: Vec<RawToken>) -> Vec<Token> {
        raw.into_iter()
            .map(|token| {
                let kind = token.kind.unwrap_or_else(|| self.classify(&token.text));
                Token::new(token.text, token.line, kind)
            })
            .collect()
    }
}

fn is_identifier_text(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
