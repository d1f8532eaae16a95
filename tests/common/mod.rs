//! In-memory stand-ins for the Pike interpreter shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, WriteHalf};
use tokio::sync::Mutex;

use pike_language_server::analysis::{AnalysisProvider, Capabilities, KeywordSet, RawDiagnostic, RawToken};
use pike_language_server::bridge::{InterpreterChannel, InterpreterSpawner, ProcessBridge};
use pike_language_server::config::DetectionConfig;
use pike_language_server::engine::AnalysisEngine;
use pike_language_server::errors::{LspError, LspResult};
use pike_language_server::language_regions::{MarkupCatalog, MarkupDetector};
use pike_language_server::symbols::RawSymbol;

/// Splits Pike-like source into identifier, number, string and punctuation
/// tokens with 1-based lines, the way the interpreter tokenizer reports them.
pub fn lex(source: &str) -> Vec<RawToken> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let start_line = line;
        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
        } else if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
        } else if c == '"' {
            i += 1;
            while i < chars.len() && chars[i] != '"' {
                if chars[i] == '\\' {
                    i += 1;
                } else if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
        } else {
            i += 1;
        }
        tokens.push(RawToken {
            text: chars[start..i].iter().collect(),
            line: start_line,
            kind: None,
        });
    }

    tokens
}

/// Scripted analysis provider.
///
/// Tokenization uses [`lex`] unless `tokenize_error` is set; resolution looks
/// the symbol up in `resolutions`.
#[derive(Default)]
pub struct FakeProvider {
    pub tokenize_error: Option<LspError>,
    pub resolve_error: Option<LspError>,
    pub symbols_error: Option<LspError>,
    pub diagnostics_error: Option<LspError>,
    pub resolutions: HashMap<String, String>,
    pub symbols: Vec<RawSymbol>,
    pub diagnostics: Vec<RawDiagnostic>,
    pub resolve_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolving(mut self, symbol: &str, location: &str) -> Self {
        self.resolutions.insert(symbol.to_string(), location.to_string());
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<RawSymbol>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<RawDiagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn failing_tokenize(mut self, error: LspError) -> Self {
        self.tokenize_error = Some(error);
        self
    }

    pub fn failing_resolve(mut self, error: LspError) -> Self {
        self.resolve_error = Some(error);
        self
    }

    pub fn failing_symbols(mut self, error: LspError) -> Self {
        self.symbols_error = Some(error);
        self
    }

    pub fn failing_diagnostics(mut self, error: LspError) -> Self {
        self.diagnostics_error = Some(error);
        self
    }
}

#[async_trait]
impl AnalysisProvider for FakeProvider {
    async fn capabilities(&self) -> LspResult<Capabilities> {
        Ok(Capabilities::all())
    }

    async fn tokenize(&self, source: &str) -> LspResult<Vec<RawToken>> {
        match &self.tokenize_error {
            Some(e) => Err(e.clone()),
            None => Ok(lex(source)),
        }
    }

    async fn resolve(&self, _source: &str, _path: &str, symbol: &str, _line: u32) -> LspResult<Option<String>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        match &self.resolve_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.resolutions.get(symbol).cloned()),
        }
    }

    async fn symbols(&self, _source: &str) -> LspResult<Vec<RawSymbol>> {
        match &self.symbols_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.symbols.clone()),
        }
    }

    async fn diagnostics(&self, _source: &str, _path: &str) -> LspResult<Vec<RawDiagnostic>> {
        match &self.diagnostics_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.diagnostics.clone()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "fake"
    }
}

/// Engine over `provider` with the default keyword set, catalog and
/// detection settings.
pub fn engine_with(provider: FakeProvider) -> AnalysisEngine {
    engine_over(Arc::new(provider))
}

/// Like [`engine_with`], keeping a handle on the provider.
pub fn engine_over(provider: Arc<FakeProvider>) -> AnalysisEngine {
    let catalog = Arc::new(MarkupCatalog::default());
    AnalysisEngine::new(
        provider,
        Arc::new(MarkupDetector::new(catalog.clone(), DetectionConfig::default())),
        KeywordSet::default(),
        catalog,
    )
}

pub fn raw_symbol(name: &str, kind: &str, line: u32, end_line: Option<u32>, children: Vec<RawSymbol>) -> RawSymbol {
    RawSymbol {
        name: name.to_string(),
        kind: kind.to_string(),
        line,
        end_line,
        children,
    }
}

/// How the scripted interpreter answers one request.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(Value),
    Fail(String),
    /// Written verbatim (a newline is appended)
    Raw(String),
    Delayed(Duration, Box<Script>),
    /// Never answers
    Silent,
    /// Closes the interpreter output, as a crashed process would
    Crash,
}

type Handler = dyn Fn(&str, &Value, u64) -> Script + Send + Sync;

/// Spawns in-memory interpreters over `tokio::io::duplex` pipes, answering
/// each request according to a handler of `(method, params, id)`.
pub struct ScriptedSpawner {
    handler: Arc<Handler>,
    spawns: AtomicUsize,
}

impl ScriptedSpawner {
    pub fn new(handler: impl Fn(&str, &Value, u64) -> Script + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Arc::new(handler),
            spawns: AtomicUsize::new(0),
        })
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

type Output = Arc<Mutex<Option<WriteHalf<tokio::io::DuplexStream>>>>;

async fn write_line(output: &Output, line: String) {
    if let Some(writer) = output.lock().await.as_mut() {
        let _ = writer.write_all(format!("{}\n", line).as_bytes()).await;
        let _ = writer.flush().await;
    }
}

async fn perform(output: Output, id: u64, mut script: Script) {
    loop {
        match script {
            Script::Reply(result) => {
                write_line(&output, json!({ "id": id, "result": result }).to_string()).await;
            }
            Script::Fail(message) => {
                write_line(&output, json!({ "id": id, "error": { "message": message } }).to_string()).await;
            }
            Script::Raw(line) => write_line(&output, line).await,
            Script::Delayed(delay, next) => {
                tokio::time::sleep(delay).await;
                script = *next;
                continue;
            }
            Script::Silent => {}
            Script::Crash => {
                output.lock().await.take();
            }
        }
        return;
    }
}

#[async_trait]
impl InterpreterSpawner for ScriptedSpawner {
    async fn spawn(&self) -> io::Result<InterpreterChannel> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let (bridge_side, interpreter_side) = tokio::io::duplex(64 * 1024);
        let (bridge_reader, bridge_writer) = tokio::io::split(bridge_side);
        let (requests, replies) = tokio::io::split(interpreter_side);
        let output: Output = Arc::new(Mutex::new(Some(replies)));
        let handler = self.handler.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(requests).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(request) = serde_json::from_str::<Value>(&line) else { continue };
                let id = request["id"].as_u64().unwrap_or_default();
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let script = handler(&method, &request["params"], id);
                let crash = matches!(script, Script::Crash);
                let output = output.clone();
                if crash {
                    perform(output, id, script).await;
                    return;
                }
                tokio::spawn(perform(output, id, script));
            }
        });

        Ok(InterpreterChannel {
            reader: Box::new(bridge_reader),
            writer: Box::new(bridge_writer),
            child: None,
        })
    }

    fn describe(&self) -> String {
        "scripted interpreter".to_string()
    }
}

pub fn bridge_with(spawner: Arc<ScriptedSpawner>, timeout: Duration) -> ProcessBridge {
    ProcessBridge::new(spawner, timeout)
}
