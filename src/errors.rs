//! Layered error type for the Pike bridge
//!
//! Every failure is tagged with the layer it originated in:
//! - `server`: caller misuse or an internal invariant violation
//! - `bridge`: transport, framing, timeout or interpreter lifecycle failures
//! - `pike`: the interpreter itself reported an analysis failure
//!
//! Errors own an optional cause, forming a singly linked chain that can be
//! rendered with [`LspError::chain`] or walked with [`LspError::chain_errors`].

use std::fmt;

use thiserror::Error;
use tower_lsp::jsonrpc;

/// Result alias used across the crate.
pub type LspResult<T> = Result<T, LspError>;

/// The layer an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorLayer {
    Server,
    Bridge,
    Pike,
}

impl ErrorLayer {
    /// Name used when rendering errors of this layer.
    pub fn error_name(self) -> &'static str {
        match self {
            ErrorLayer::Server => "ServerError",
            ErrorLayer::Bridge => "BridgeError",
            ErrorLayer::Pike => "PikeError",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorLayer::Server => "server",
            ErrorLayer::Bridge => "bridge",
            ErrorLayer::Pike => "pike",
        }
    }
}

impl fmt::Display for ErrorLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finer classification inside a layer, used for programmatic inspection of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid argument or configuration supplied by the caller
    InvalidInput,
    /// Internal invariant violated
    Internal,
    /// Reading from or writing to the interpreter failed
    Transport,
    /// A reply could not be decoded or violated the wire protocol
    Protocol,
    /// No reply arrived within the configured timeout
    Timeout,
    /// The interpreter process exited or could not be started
    ProcessExited,
    /// The interpreter does not offer a required capability
    Unavailable,
    /// The interpreter reported an analysis failure
    Analysis,
}

/// An error tagged with its originating layer and an optional cause.
#[derive(Debug, Clone, Error)]
#[error("{} [{}]: {}", .layer.error_name(), .layer, .message)]
pub struct LspError {
    layer: ErrorLayer,
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Box<LspError>>,
}

impl LspError {
    pub fn new(layer: ErrorLayer, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            layer,
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorLayer::Server, ErrorKind::Internal, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorLayer::Server, ErrorKind::InvalidInput, message)
    }

    pub fn bridge(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorLayer::Bridge, kind, message)
    }

    pub fn pike(message: impl Into<String>) -> Self {
        Self::new(ErrorLayer::Pike, ErrorKind::Analysis, message)
    }

    pub fn pike_unavailable(capability: &str) -> Self {
        Self::new(
            ErrorLayer::Pike,
            ErrorKind::Unavailable,
            format!("interpreter does not provide '{}'", capability),
        )
    }

    /// Attaches `cause` as the direct cause of this error.
    ///
    /// Any cause previously attached is replaced.
    pub fn with_cause(mut self, cause: LspError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Wraps this error in a new outer error of the given layer.
    pub fn context(self, layer: ErrorLayer, kind: ErrorKind, message: impl Into<String>) -> Self {
        LspError::new(layer, kind, message).with_cause(self)
    }

    pub fn layer(&self) -> ErrorLayer {
        self.layer
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&LspError> {
        self.cause.as_deref()
    }

    /// Lists this error followed by each of its causes, outermost first.
    pub fn chain_errors(&self) -> Vec<&LspError> {
        let mut errors = vec![self];
        let mut current = self.cause();
        while let Some(err) = current {
            errors.push(err);
            current = err.cause();
        }
        errors
    }

    /// Renders every error in the chain, outermost first.
    pub fn chain(&self) -> String {
        self.chain_errors()
            .iter()
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join(": caused by: ")
    }

    /// True if this error or any of its causes has the given kind.
    pub fn caused_by(&self, kind: ErrorKind) -> bool {
        self.chain_errors().iter().any(|err| err.kind == kind)
    }

    pub fn is_timeout(&self) -> bool {
        self.caused_by(ErrorKind::Timeout)
    }
}

impl From<std::io::Error> for LspError {
    fn from(err: std::io::Error) -> Self {
        LspError::bridge(ErrorKind::Transport, err.to_string())
    }
}

impl From<serde_json::Error> for LspError {
    fn from(err: serde_json::Error) -> Self {
        LspError::bridge(ErrorKind::Protocol, err.to_string())
    }
}

impl From<LspError> for jsonrpc::Error {
    fn from(err: LspError) -> Self {
        let code = match err.kind {
            ErrorKind::InvalidInput => jsonrpc::ErrorCode::InvalidParams,
            _ => jsonrpc::ErrorCode::InternalError,
        };
        jsonrpc::Error {
            code,
            message: err.chain().into(),
            data: None,
        }
    }
}
