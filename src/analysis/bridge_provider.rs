//! [`AnalysisProvider`] backed by the interpreter process bridge

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::provider::{AnalysisProvider, Capabilities, RawDiagnostic};
use super::token::RawToken;
use crate::bridge::ProcessBridge;
use crate::errors::{ErrorKind, ErrorLayer, LspError, LspResult};
use crate::symbols::host::RawSymbol;

pub struct BridgeProvider {
    bridge: ProcessBridge,
    capabilities: OnceCell<Capabilities>,
}

impl BridgeProvider {
    pub fn new(bridge: ProcessBridge) -> Self {
        Self {
            bridge,
            capabilities: OnceCell::new(),
        }
    }

    pub fn bridge(&self) -> &ProcessBridge {
        &self.bridge
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> LspResult<T> {
        let reply = self.bridge.send(method, params).await?;
        serde_json::from_value(reply).map_err(|e| {
            LspError::bridge(ErrorKind::Protocol, format!("Unexpected reply shape for '{}'", method))
                .with_cause(e.into())
        })
    }

    async fn require(&self, capability: &str, offered: impl Fn(&Capabilities) -> bool) -> LspResult<()> {
        let capabilities = self.capabilities().await?;
        if offered(&capabilities) {
            Ok(())
        } else {
            Err(LspError::pike_unavailable(capability))
        }
    }
}

#[async_trait]
impl AnalysisProvider for BridgeProvider {
    /// Queried once per bridge; an interpreter that rejects the query is
    /// assumed to support every operation.
    async fn capabilities(&self) -> LspResult<Capabilities> {
        self.capabilities
            .get_or_try_init(|| async {
                match self.call::<Capabilities>("capabilities", json!({})).await {
                    Ok(capabilities) => {
                        info!("Interpreter capabilities: {:?}", capabilities);
                        Ok(capabilities)
                    }
                    Err(e) if e.layer() == ErrorLayer::Pike => {
                        debug!("Capability query rejected ({}), assuming full support", e);
                        Ok(Capabilities::all())
                    }
                    Err(e) => Err(e),
                }
            })
            .await
            .copied()
    }

    async fn tokenize(&self, source: &str) -> LspResult<Vec<RawToken>> {
        self.require("tokenize", |c| c.tokenize).await?;
        self.call("tokenize", json!({ "source": source })).await
    }

    async fn resolve(&self, source: &str, path: &str, symbol: &str, line: u32) -> LspResult<Option<String>> {
        self.require("resolve", |c| c.resolve).await?;
        self.call(
            "resolve",
            json!({ "source": source, "path": path, "symbol": symbol, "line": line }),
        )
        .await
    }

    async fn symbols(&self, source: &str) -> LspResult<Vec<RawSymbol>> {
        self.require("symbols", |c| c.symbols).await?;
        self.call("symbols", json!({ "source": source })).await
    }

    async fn diagnostics(&self, source: &str, path: &str) -> LspResult<Vec<RawDiagnostic>> {
        self.require("diagnostics", |c| c.diagnostics).await?;
        self.call("diagnostics", json!({ "source": source, "path": path })).await
    }

    fn backend_name(&self) -> &'static str {
        "pike-interpreter"
    }

    async fn shutdown(&self) {
        self.bridge.shutdown().await;
    }
}
