//! Host-language analysis capability
//!
//! Everything the server needs from the Pike interpreter goes through
//! [`AnalysisProvider`]. The production implementation talks to the
//! interpreter over the process bridge; tests substitute in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity};

use super::token::RawToken;
use crate::errors::{LspError, LspResult};
use crate::positions::line_index::LineIndex;
use crate::positions::location::parse_location;
use crate::symbols::host::RawSymbol;

/// Operations an interpreter offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub tokenize: bool,
    pub resolve: bool,
    pub symbols: bool,
    pub diagnostics: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            tokenize: true,
            resolve: true,
            symbols: true,
            diagnostics: true,
        }
    }

    pub fn none() -> Self {
        Self {
            tokenize: false,
            resolve: false,
            symbols: false,
            diagnostics: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::none()
    }
}

/// Compiler diagnostic as reported by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawDiagnostic {
    pub message: String,
    /// 1-based line
    #[serde(default)]
    pub line: Option<u32>,
    /// `path:line` string, used when `line` is absent
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

impl RawDiagnostic {
    /// 0-based line this diagnostic refers to.
    pub fn line_index(&self) -> u32 {
        match (self.line, &self.location) {
            (Some(line), _) => line.max(1) - 1,
            (None, Some(location)) => parse_location(location).line,
            (None, None) => 0,
        }
    }

    /// Converts to an LSP diagnostic covering the whole reported line.
    pub fn to_lsp(&self, index: &LineIndex) -> Diagnostic {
        let line = (self.line_index() as usize).min(index.len_lines().saturating_sub(1));
        let start = index.line_start(line).unwrap_or(0);
        let end = index.line_end(line).unwrap_or(start);
        let severity = match self.severity.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("warning") | Some("warn") => DiagnosticSeverity::WARNING,
            Some("info") | Some("information") => DiagnosticSeverity::INFORMATION,
            Some("hint") => DiagnosticSeverity::HINT,
            _ => DiagnosticSeverity::ERROR,
        };
        Diagnostic {
            range: index.range(start, end),
            severity: Some(severity),
            source: Some("pike".to_string()),
            message: self.message.clone(),
            ..Default::default()
        }
    }
}

/// Interface to the host-language analyzer
///
/// Every method has a default that reports the capability as unavailable, so
/// providers only implement what they support.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Operations this provider supports
    async fn capabilities(&self) -> LspResult<Capabilities>;

    /// Tokenizes `source`, returning tokens with their 1-based lines.
    async fn tokenize(&self, _source: &str) -> LspResult<Vec<RawToken>> {
        Err(LspError::pike_unavailable("tokenize"))
    }

    /// Resolves the declaration of `symbol` referenced on 1-based `line`,
    /// returning the interpreter's `path[:line]` string.
    async fn resolve(
        &self,
        _source: &str,
        _path: &str,
        _symbol: &str,
        _line: u32,
    ) -> LspResult<Option<String>> {
        Err(LspError::pike_unavailable("resolve"))
    }

    async fn symbols(&self, _source: &str) -> LspResult<Vec<RawSymbol>> {
        Err(LspError::pike_unavailable("symbols"))
    }

    async fn diagnostics(&self, _source: &str, _path: &str) -> LspResult<Vec<RawDiagnostic>> {
        Err(LspError::pike_unavailable("diagnostics"))
    }

    /// Get the name of this provider (for logging)
    fn backend_name(&self) -> &'static str;

    async fn shutdown(&self) {}
}
