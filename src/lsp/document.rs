use ropey::Rope;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent, Url};

pub use crate::lsp::models::{LspDocument, LspDocumentState};
use crate::errors::{LspError, LspResult};
use crate::positions::line_index::line_content_chars;

/// Converts an LSP position to a char index in the Rope, clamping to the
/// line end and to the end of the text.
fn position_to_char(position: &Position, text: &Rope) -> usize {
    let line = position.line as usize;
    if line >= text.len_lines() {
        return text.len_chars();
    }
    let start = text.line_to_char(line);
    let content_len = line_content_chars(text.line(line));
    start + (position.character as usize).min(content_len)
}

impl LspDocumentState {
    pub fn new(uri: Url, text: &str, version: i32) -> Self {
        Self {
            uri,
            text: Rope::from_str(text),
            version,
        }
    }

    /// Applies content changes in order. Changes for a version not newer
    /// than the current one are rejected and leave the text untouched.
    pub fn apply(&mut self, changes: Vec<TextDocumentContentChangeEvent>, version: i32) -> LspResult<String> {
        if version <= self.version {
            return Err(LspError::invalid_input(format!(
                "Version {} not newer than {}",
                version, self.version
            )));
        }
        for change in &changes {
            match change.range {
                Some(range) => {
                    let start = position_to_char(&range.start, &self.text);
                    let end = position_to_char(&range.end, &self.text).max(start);
                    self.text.remove(start..end);
                    self.text.insert(start, &change.text);
                }
                None => self.text = Rope::from_str(&change.text),
            }
        }
        self.version = version;
        Ok(self.text.to_string())
    }
}

impl LspDocument {
    pub fn new(id: u32, uri: Url, text: &str, version: i32) -> Self {
        Self {
            id,
            state: tokio::sync::RwLock::new(LspDocumentState::new(uri, text, version)),
        }
    }

    /// Returns the URI of the document.
    pub async fn uri(&self) -> Url {
        self.state.read().await.uri.clone()
    }

    /// Returns the current text of the document as a string.
    pub async fn text(&self) -> String {
        self.state.read().await.text.to_string()
    }

    /// Returns the current version of the document.
    pub async fn version(&self) -> i32 {
        self.state.read().await.version
    }

    /// Current text and version, read under one lock.
    pub async fn snapshot(&self) -> (String, i32) {
        let state = self.state.read().await;
        (state.text.to_string(), state.version)
    }

    /// Applies changes to the document, returning the new text.
    pub async fn apply(&self, changes: Vec<TextDocumentContentChangeEvent>, version: i32) -> LspResult<String> {
        let mut state = self.state.write().await;
        state.apply(changes, version)
    }
}
