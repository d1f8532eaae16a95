pub mod analysis;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod errors;
pub mod language_regions;
pub mod logging;
pub mod lsp;
pub mod positions;
pub mod symbols;
