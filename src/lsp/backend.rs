use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams,
    GotoDefinitionResponse, InitializeParams, InitializeResult, InitializedParams, Location,
    MessageType, OneOf, Position, PositionEncodingKind, PrepareRenameResponse, Range, ReferenceParams, RenameOptions,
    RenameParams, ServerCapabilities, ServerInfo, TextDocumentPositionParams,
    TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions,
    TextDocumentSyncSaveOptions, Url, WorkDoneProgressOptions, WorkspaceEdit,
};
use tower_lsp::{Client, LanguageServer, jsonrpc};
use tracing::{debug, error, info, warn};

use crate::config::{CliOverrides, ServerConfig};
use crate::engine::{AnalysisEngine, SourceDocument};
use crate::errors::LspError;
use crate::lsp::document::LspDocument;
use crate::positions::line_index::LineIndex;
use crate::positions::location::LocationRef;

/// Pike language server.
///
/// The analysis engine is built during `initialize`, once the client's
/// initialization options are known, unless one was supplied up front.
pub struct PikeBackend {
    client: Client,
    cli: CliOverrides,
    engine: RwLock<Option<Arc<AnalysisEngine>>>,
    documents_by_uri: DashMap<Url, Arc<LspDocument>>,
    serial_document_id: AtomicU32,
}

/// File system path for a document URI, falling back to the URI text.
fn document_path(uri: &Url) -> String {
    match uri.to_file_path() {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(()) => uri.to_string(),
    }
}

/// Converts a resolved location to an LSP location. Relative paths are taken
/// relative to the requesting document; an empty path means that document.
pub fn location_to_lsp(location: &LocationRef, origin: &Url) -> Option<Location> {
    let uri = if location.file_path.is_empty() {
        origin.clone()
    } else if let Ok(uri) = Url::parse(&location.file_path)
        && uri.scheme().len() > 1
    {
        uri
    } else {
        let path = Path::new(&location.file_path);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            origin.to_file_path().ok()?.parent()?.join(path)
        };
        Url::from_file_path(absolute).ok()?
    };

    let start = Position::new(location.line, 0);
    Some(Location {
        uri,
        range: Range { start, end: start },
    })
}

/// Characters are counted in Unicode scalar values, which is `utf-32`. A
/// client that does not offer it keeps the `utf-16` default, and characters
/// after a non-BMP character on the same line come out shifted.
fn negotiate_position_encoding(params: &InitializeParams) -> Option<PositionEncodingKind> {
    let offered = params
        .capabilities
        .general
        .as_ref()
        .and_then(|general| general.position_encodings.as_ref());
    if offered.is_some_and(|kinds| kinds.contains(&PositionEncodingKind::UTF32)) {
        Some(PositionEncodingKind::UTF32)
    } else {
        warn!("Client does not accept utf-32 positions; lines with non-BMP characters may be misaligned");
        None
    }
}

impl PikeBackend {
    pub fn new(client: Client, cli: CliOverrides) -> Self {
        Self {
            client,
            cli,
            engine: RwLock::new(None),
            documents_by_uri: DashMap::new(),
            serial_document_id: AtomicU32::new(0),
        }
    }

    /// Backend with a prebuilt engine; initialization options are ignored.
    pub fn with_engine(client: Client, engine: Arc<AnalysisEngine>) -> Self {
        Self {
            engine: RwLock::new(Some(engine)),
            ..Self::new(client, CliOverrides::default())
        }
    }

    fn next_document_id(&self) -> u32 {
        self.serial_document_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn engine(&self) -> jsonrpc::Result<Arc<AnalysisEngine>> {
        self.engine
            .read()
            .await
            .clone()
            .ok_or_else(|| LspError::server("Server has not been initialized").into())
    }

    fn build_config(&self, options: Option<&serde_json::Value>) -> crate::errors::LspResult<ServerConfig> {
        let mut config = ServerConfig::default();
        config.merge_initialization_options(options)?;
        config.apply_env()?;
        config.apply_cli(&self.cli);
        config.validate()?;
        Ok(config)
    }

    async fn document_text(&self, uri: &Url) -> Option<String> {
        let document = self.documents_by_uri.get(uri).map(|entry| entry.value().clone())?;
        Some(document.text().await)
    }

    fn is_current(&self, uri: &Url, document_id: u32) -> bool {
        self.documents_by_uri
            .get(uri)
            .is_some_and(|entry| entry.value().id == document_id)
    }

    /// Validates `text` and publishes diagnostics if the document was not
    /// replaced or edited in the meantime.
    async fn validate(&self, uri: Url, document: Arc<LspDocument>, text: String, version: i32) {
        let Ok(engine) = self.engine().await else {
            warn!("Skipping diagnostics for {}: server not initialized", uri);
            return;
        };
        let path = document_path(&uri);
        let diagnostics = engine.diagnostics(SourceDocument::new(&path, &text)).await;

        if self.is_current(&uri, document.id) && document.version().await == version {
            debug!("Publishing {} diagnostic(s) for {} v{}", diagnostics.len(), uri, version);
            self.client.publish_diagnostics(uri, diagnostics, Some(version)).await;
        } else {
            debug!("Dropping stale diagnostics for {} v{}", uri, version);
        }
    }

    async fn with_document<T, F, Fut>(&self, uri: &Url, f: F) -> LspResult<Option<T>>
    where
        F: FnOnce(Arc<AnalysisEngine>, String, String) -> Fut,
        Fut: std::future::Future<Output = crate::errors::LspResult<Option<T>>>,
    {
        let engine = self.engine().await?;
        let Some(text) = self.document_text(uri).await else {
            warn!("Request for unknown document {}", uri);
            return Ok(None);
        };
        f(engine, document_path(uri), text).await.map_err(|e| {
            error!("Request for {} failed: {}", uri, e.chain());
            jsonrpc::Error::from(e)
        })
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for PikeBackend {
    async fn initialize(&self, params: InitializeParams) -> LspResult<InitializeResult> {
        info!("Received initialize from {:?}", params.client_info.as_ref().map(|c| &c.name));

        let mut engine = self.engine.write().await;
        if engine.is_none() {
            let config = self.build_config(params.initialization_options.as_ref())?;
            info!(
                "Using interpreter '{}' with {} ms timeout",
                config.interpreter.program, config.interpreter.timeout_ms
            );
            *engine = Some(Arc::new(AnalysisEngine::from_config(&config)));
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                position_encoding: negotiate_position_encoding(&params),
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                    ..Default::default()
                })),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                rename_provider: Some(OneOf::Right(RenameOptions {
                    prepare_provider: Some(true),
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                })),
                document_symbol_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let backend = match self.engine().await {
            Ok(engine) => engine.backend_name(),
            Err(_) => "none",
        };
        self.client
            .log_message(MessageType::INFO, format!("Pike language server initialized ({})", backend))
            .await;
    }

    async fn shutdown(&self) -> LspResult<()> {
        info!("Received shutdown request");
        if let Some(engine) = self.engine.read().await.clone() {
            engine.shutdown().await;
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        let id = self.next_document_id();
        info!("Opening document: URI={}, id={}, version={}", uri, id, version);

        let document = Arc::new(LspDocument::new(id, uri.clone(), &params.text_document.text, version));
        self.documents_by_uri.insert(uri.clone(), document.clone());
        self.validate(uri, document, params.text_document.text, version).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        let Some(document) = self.documents_by_uri.get(&uri).map(|entry| entry.value().clone()) else {
            warn!("Change for unopened document {}", uri);
            return;
        };

        match document.apply(params.content_changes, version).await {
            Ok(text) => {
                debug!("Updated document: URI={}, version={}", uri, version);
                self.validate(uri, document, text, version).await;
            }
            Err(e) => warn!("Ignoring change for {}: {}", uri, e),
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(document) = self.documents_by_uri.get(&uri).map(|entry| entry.value().clone()) else {
            return;
        };
        let (text, version) = document.snapshot().await;
        self.validate(uri, document, text, version).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        match self.documents_by_uri.remove(&uri) {
            Some((_, document)) => info!("Closed document: {}, id: {}", uri, document.id),
            None => warn!("Closed document not found: {}", uri),
        }
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> LspResult<Option<GotoDefinitionResponse>> {
        let TextDocumentPositionParams { text_document, position } = params.text_document_position_params;
        let uri = text_document.uri;
        debug!("goto_definition request for {} at {:?}", uri, position);
        let origin = uri.clone();

        self.with_document(&uri, |engine, path, text| async move {
            let resolved = engine
                .resolve_symbol_at(SourceDocument::new(&path, &text), position)
                .await?;
            Ok(resolved
                .and_then(|location| location_to_lsp(&location, &origin))
                .map(GotoDefinitionResponse::Scalar))
        })
        .await
    }

    async fn references(&self, params: ReferenceParams) -> LspResult<Option<Vec<Location>>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        debug!("references request for {} at {:?}", uri, position);
        let origin = uri.clone();
        let include_declaration = params.context.include_declaration;

        self.with_document(&uri, |engine, path, text| async move {
            let doc = SourceDocument::new(&path, &text);
            let mut occurrences = engine.find_occurrences_at(doc, position).await?;

            if !include_declaration && !occurrences.is_empty() {
                match engine.resolve_symbol_at(doc, position).await {
                    Ok(declaration) => {
                        if let Some(declared) = declaration.and_then(|location| location_to_lsp(&location, &origin))
                            && declared.uri == origin
                            && let Some(at) = occurrences
                                .iter()
                                .position(|o| o.range.start.line == declared.range.start.line)
                        {
                            occurrences.remove(at);
                        }
                    }
                    Err(e) => warn!("Keeping declaration among references: {}", e.chain()),
                }
            }

            Ok(Some(
                occurrences
                    .into_iter()
                    .map(|occurrence| Location {
                        uri: origin.clone(),
                        range: occurrence.range,
                    })
                    .collect(),
            ))
        })
        .await
    }

    async fn prepare_rename(&self, params: TextDocumentPositionParams) -> LspResult<Option<PrepareRenameResponse>> {
        let uri = params.text_document.uri;
        let position = params.position;

        self.with_document(&uri, |engine, path, text| async move {
            let prepared = engine
                .prepare_rename(SourceDocument::new(&path, &text), position)
                .await?;
            Ok(prepared.map(|prepared| PrepareRenameResponse::RangeWithPlaceholder {
                range: prepared.range,
                placeholder: prepared.placeholder,
            }))
        })
        .await
    }

    async fn rename(&self, params: RenameParams) -> LspResult<Option<WorkspaceEdit>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let new_name = params.new_name;
        debug!("Starting rename for {} at {:?} to '{}'", uri, position, new_name);
        let target = uri.clone();

        self.with_document(&uri, |engine, path, text| async move {
            engine
                .rename(SourceDocument::new(&path, &text), &target, position, &new_name)
                .await
        })
        .await
    }

    async fn document_symbol(&self, params: DocumentSymbolParams) -> LspResult<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;

        self.with_document(&uri, |engine, path, text| async move {
            let tree = engine.get_symbol_tree(SourceDocument::new(&path, &text)).await?;
            let index = LineIndex::new(&text);
            Ok(Some(DocumentSymbolResponse::Nested(
                tree.iter().map(|node| node.to_document_symbol(&index)).collect(),
            )))
        })
        .await
    }
}
