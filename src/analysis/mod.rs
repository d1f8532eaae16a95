//! Host-language analysis: the provider capability and its token model

pub mod bridge_provider;
pub mod provider;
pub mod token;

pub use bridge_provider::BridgeProvider;
pub use provider::{AnalysisProvider, Capabilities, RawDiagnostic};
pub use token::{KeywordSet, RawToken, Token, TokenKind};
