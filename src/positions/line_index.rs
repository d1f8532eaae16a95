//! Line-start index for flat offset <-> line/character conversion
//!
//! Backed by a `ropey::Rope`, so offsets and characters are counted in Unicode
//! scalar values exactly like the document store. Lines break on `\n` (and
//! `\r\n`) only, matching the interpreter's line numbering.

use ropey::{Rope, RopeSlice};
use tower_lsp::lsp_types::{Position, Range};

/// Chars of `line` before its trailing line break.
pub fn line_content_chars(line: RopeSlice) -> usize {
    let trailing = line
        .chars_at(line.len_chars())
        .reversed()
        .take_while(|c| *c == '\n' || *c == '\r')
        .count();
    line.len_chars() - trailing
}

/// Line-start lookups over an immutable copy of a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    text: Rope,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        Self {
            text: Rope::from_str(text),
        }
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    pub fn len_lines(&self) -> usize {
        self.text.len_lines()
    }

    /// Char offset at which `line` starts.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        (line < self.text.len_lines()).then(|| self.text.line_to_char(line))
    }

    /// Char offset one past the last character of `line`, excluding the line break.
    pub fn line_end(&self, line: usize) -> Option<usize> {
        let start = self.line_start(line)?;
        Some(start + line_content_chars(self.text.line(line)))
    }

    /// Converts a char offset to a position. Offsets past the end clamp to the end.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len_chars());
        let line = self.text.char_to_line(offset);
        Position {
            line: line as u32,
            character: (offset - self.text.line_to_char(line)) as u32,
        }
    }

    pub fn range(&self, start: usize, end: usize) -> Range {
        Range {
            start: self.position(start),
            end: self.position(end),
        }
    }

    /// Converts a position to a char offset.
    ///
    /// Returns `None` when the line does not exist; a character past the end of
    /// the line clamps to the line end.
    pub fn offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let start = self.line_start(line)?;
        let end = self.line_end(line)?;
        Some((start + position.character as usize).min(end))
    }
}

/// Byte offset of the `char_offset`-th char in `text`, or `text.len()` past the end.
pub fn char_to_byte(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

/// Number of chars in `text[..byte_offset]`.
pub fn byte_to_char(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset.min(text.len())].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_round_trip() {
        let text = "int x;\nstring s = \"é\";\n\nreturn;";
        let index = LineIndex::new(text);
        assert_eq!(index.len_lines(), 4);

        for offset in 0..=index.len_chars() {
            let pos = index.position(offset);
            assert_eq!(index.offset(pos), Some(offset), "offset {} -> {:?}", offset, pos);
        }
    }

    #[test]
    fn test_line_bounds() {
        let index = LineIndex::new("ab\ncde\n");
        assert_eq!(index.line_start(1), Some(3));
        assert_eq!(index.line_end(1), Some(6));
        assert_eq!(index.line_start(2), Some(7));
        assert_eq!(index.line_end(2), Some(7));
        assert_eq!(index.line_start(3), None);
    }

    #[test]
    fn test_offset_clamps_character_and_rejects_missing_line() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.offset(Position::new(0, 10)), Some(2));
        assert_eq!(index.offset(Position::new(5, 0)), None);
    }

    #[test]
    fn test_crlf_and_lone_cr() {
        let index = LineIndex::new("ab\r\ncd\re");
        assert_eq!(index.len_lines(), 2);
        assert_eq!(index.line_end(0), Some(2));
        assert_eq!(index.line_start(1), Some(4));
        // a lone carriage return does not end a line
        assert_eq!(index.position(7), Position::new(1, 3));
        assert_eq!(index.offset(Position::new(0, 9)), Some(2));
    }

    #[test]
    fn test_char_byte_conversion() {
        let text = "aé<b>";
        assert_eq!(char_to_byte(text, 2), 3);
        assert_eq!(byte_to_char(text, 3), 2);
        assert_eq!(char_to_byte(text, 99), text.len());
    }
}
