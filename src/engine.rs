//! Feature operations over one document
//!
//! [`AnalysisEngine`] ties the interpreter capability to the position
//! resolver and the embedded-content pipeline. Navigation operations
//! (definition, occurrences, rename) propagate transport failures;
//! diagnostics and outlines degrade to whatever could be computed.

use std::collections::HashMap;
use std::sync::Arc;

use tower_lsp::lsp_types::{Diagnostic, Position, TextEdit, Url, WorkspaceEdit};
use tracing::{debug, warn};

use crate::analysis::{AnalysisProvider, BridgeProvider, KeywordSet, Token, TokenKind};
use crate::bridge::ProcessBridge;
use crate::config::ServerConfig;
use crate::errors::{ErrorKind, ErrorLayer, LspError, LspResult};
use crate::language_regions::diagnostics::markup_diagnostics;
use crate::language_regions::{EmbeddedRegion, MarkupCatalog, MarkupDetector, PositionMapping, RegionDetector};
use crate::positions::line_index::LineIndex;
use crate::positions::location::{LocationRef, parse_location};
use crate::positions::resolver::{self, Occurrence, PrepareRename};
use crate::symbols::{SymbolNode, build_outline, convert_symbols, literal_nodes, merge};

/// A document as seen by the engine.
#[derive(Debug, Clone, Copy)]
pub struct SourceDocument<'a> {
    /// File system path handed to the interpreter for resolution
    pub path: &'a str,
    pub text: &'a str,
}

impl<'a> SourceDocument<'a> {
    pub fn new(path: &'a str, text: &'a str) -> Self {
        Self { path, text }
    }
}

pub struct AnalysisEngine {
    provider: Arc<dyn AnalysisProvider>,
    detector: Arc<dyn RegionDetector>,
    keywords: KeywordSet,
    catalog: Arc<MarkupCatalog>,
}

/// An interpreter-side analysis failure (as opposed to a missing capability
/// or a transport failure) means "nothing to offer here".
fn is_degradable(err: &LspError) -> bool {
    err.layer() == ErrorLayer::Pike && err.kind() == ErrorKind::Analysis
}

impl AnalysisEngine {
    pub fn new(
        provider: Arc<dyn AnalysisProvider>,
        detector: Arc<dyn RegionDetector>,
        keywords: KeywordSet,
        catalog: Arc<MarkupCatalog>,
    ) -> Self {
        Self {
            provider,
            detector,
            keywords,
            catalog,
        }
    }

    /// Engine talking to a real interpreter as described by `config`.
    pub fn from_config(config: &ServerConfig) -> Self {
        let catalog = Arc::new(config.markup_catalog());
        let bridge = ProcessBridge::from_config(&config.interpreter);
        Self::new(
            Arc::new(BridgeProvider::new(bridge)),
            Arc::new(MarkupDetector::new(catalog.clone(), config.detection.clone())),
            config.keyword_set(),
            catalog,
        )
    }

    pub fn backend_name(&self) -> &'static str {
        self.provider.backend_name()
    }

    pub fn catalog(&self) -> &MarkupCatalog {
        &self.catalog
    }

    pub async fn tokenize(&self, source: &str) -> LspResult<Vec<Token>> {
        let raw = self.provider.tokenize(source).await?;
        Ok(self.keywords.tokens_from_raw(raw))
    }

    /// Tokens for occurrence-style queries, where a failed tokenization
    /// yields no tokens.
    async fn tokens_or_empty(&self, source: &str) -> LspResult<Vec<Token>> {
        match self.tokenize(source).await {
            Ok(tokens) => Ok(tokens),
            Err(e) if is_degradable(&e) => {
                warn!("Tokenization failed, returning no results: {}", e.chain());
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Every occurrence of `name` in the document.
    pub async fn find_occurrences(&self, doc: SourceDocument<'_>, name: &str) -> LspResult<Vec<Occurrence>> {
        let tokens = self.tokens_or_empty(doc.text).await?;
        Ok(resolver::find_occurrences(doc.text, &tokens, name))
    }

    /// Occurrences of the identifier under `position`.
    pub async fn find_occurrences_at(&self, doc: SourceDocument<'_>, position: Position) -> LspResult<Vec<Occurrence>> {
        let tokens = self.tokens_or_empty(doc.text).await?;
        match resolver::token_at(doc.text, &tokens, position) {
            Some((token, _)) if token.is_identifier() => {
                Ok(resolver::find_occurrences(doc.text, &tokens, &token.text))
            }
            _ => Ok(Vec::new()),
        }
    }

    pub async fn prepare_rename(&self, doc: SourceDocument<'_>, position: Position) -> LspResult<Option<PrepareRename>> {
        let tokens = self.tokens_or_empty(doc.text).await?;
        Ok(resolver::prepare_rename(&tokens, position.line))
    }

    /// Workspace edit renaming the identifier under `position`.
    pub async fn rename(
        &self,
        doc: SourceDocument<'_>,
        uri: &Url,
        position: Position,
        new_name: &str,
    ) -> LspResult<Option<WorkspaceEdit>> {
        if self.keywords.classify(new_name) != TokenKind::Identifier {
            return Err(LspError::invalid_input(format!(
                "'{}' is not a valid identifier",
                new_name
            )));
        }

        let occurrences = self.find_occurrences_at(doc, position).await?;
        if occurrences.is_empty() {
            return Ok(None);
        }

        let edits = occurrences
            .into_iter()
            .map(|occurrence| TextEdit {
                range: occurrence.range,
                new_text: new_name.to_string(),
            })
            .collect();
        let mut changes = HashMap::new();
        changes.insert(uri.clone(), edits);
        Ok(Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }))
    }

    /// Declaration of the identifier under `position`.
    pub async fn resolve_symbol_at(&self, doc: SourceDocument<'_>, position: Position) -> LspResult<Option<LocationRef>> {
        let tokens = self.tokenize(doc.text).await?;
        let Some((token, _)) = resolver::token_at(doc.text, &tokens, position) else {
            return Ok(None);
        };
        if !token.is_identifier() {
            return Ok(None);
        }

        let resolved = self
            .provider
            .resolve(doc.text, doc.path, &token.text, token.line)
            .await
            .map_err(|e| {
                e.context(
                    ErrorLayer::Server,
                    ErrorKind::Internal,
                    format!("Failed to resolve '{}'", token.text),
                )
            })?;

        debug!("'{}' resolved to {:?}", token.text, resolved);
        Ok(resolved.filter(|raw| !raw.is_empty()).map(|raw| parse_location(&raw)))
    }

    pub fn detect_embedded_regions(&self, source: &str) -> Vec<EmbeddedRegion> {
        self.detector.detect(source).regions
    }

    /// Host symbols merged with the element outline of every embedded region.
    pub async fn get_symbol_tree(&self, doc: SourceDocument<'_>) -> LspResult<Vec<SymbolNode>> {
        let detector = self.detector.clone();
        let text = doc.text.to_string();
        let detection = tokio::task::spawn_blocking(move || detector.detect(&text));

        let host = async {
            let symbols = match self.provider.symbols(doc.text).await {
                Ok(symbols) => symbols,
                Err(e) if e.layer() == ErrorLayer::Pike => {
                    debug!("No host symbols: {}", e);
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            let tokens = if symbols.is_empty() {
                Vec::new()
            } else {
                match self.tokenize(doc.text).await {
                    Ok(tokens) => tokens,
                    Err(e) if e.layer() == ErrorLayer::Pike => Vec::new(),
                    Err(e) => return Err(e),
                }
            };
            Ok(convert_symbols(doc.text, &tokens, &symbols))
        };

        let (host, detection) = tokio::join!(host, detection);
        let mut host = host?;
        let regions = detection
            .map_err(|e| LspError::server(format!("Region detection task failed: {}", e)))?
            .regions;

        host.extend(literal_nodes(&regions));
        let embedded: Vec<(PositionMapping, Vec<SymbolNode>)> = regions
            .iter()
            .map(|region| {
                let outline = build_outline(&region.markers, region.content_len(), &self.catalog);
                (PositionMapping::for_region(region), outline.roots)
            })
            .collect();

        Ok(merge(host, &embedded))
    }

    /// Interpreter diagnostics plus markup diagnostics. Never fails: a
    /// source that cannot be analyzed yields what the other source reports.
    pub async fn diagnostics(&self, doc: SourceDocument<'_>) -> Vec<Diagnostic> {
        let index = LineIndex::new(doc.text);
        let mut diagnostics = match self.provider.diagnostics(doc.text, doc.path).await {
            Ok(raw) => raw.iter().map(|d| d.to_lsp(&index)).collect(),
            Err(e) => {
                warn!("Interpreter diagnostics unavailable for {}: {}", doc.path, e.chain());
                Vec::new()
            }
        };

        let regions = self.detect_embedded_regions(doc.text);
        diagnostics.extend(markup_diagnostics(&regions, &self.catalog, doc.text));
        diagnostics
    }

    pub async fn shutdown(&self) {
        self.provider.shutdown().await;
    }
}
