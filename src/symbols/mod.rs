//! Symbol trees for host and embedded code, and their merge

pub mod host;
pub mod markup;
pub mod merger;
pub mod node;

pub use host::{RawSymbol, convert_symbols, literal_nodes};
pub use markup::{MarkupOutline, build_outline};
pub use merger::merge;
pub use node::{SymbolNode, SymbolOrigin};
