//! Host (Pike) symbols from the interpreter
//!
//! The interpreter reports each symbol's name and 1-based declaration line,
//! optionally with the 1-based line its body ends on. Exact start characters
//! come from the token stream when one is available, otherwise from a search
//! of the declaration line.

use serde::Deserialize;
use tower_lsp::lsp_types::SymbolKind;
use tracing::trace;

use super::node::{SymbolNode, SymbolOrigin};
use crate::analysis::token::Token;
use crate::language_regions::EmbeddedRegion;
use crate::positions::line_index::{LineIndex, byte_to_char, char_to_byte};
use crate::positions::resolver::token_positions;

/// Symbol as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawSymbol {
    pub name: String,
    #[serde(default)]
    pub kind: String,
    pub line: u32,
    #[serde(default)]
    pub end_line: Option<u32>,
    #[serde(default)]
    pub children: Vec<RawSymbol>,
}

/// Maps an interpreter symbol kind to the LSP kind.
pub fn symbol_kind(kind: &str) -> SymbolKind {
    match kind.to_ascii_lowercase().as_str() {
        "class" | "program" => SymbolKind::CLASS,
        "function" | "method" | "lambda" => SymbolKind::FUNCTION,
        "variable" => SymbolKind::VARIABLE,
        "constant" => SymbolKind::CONSTANT,
        "enum" => SymbolKind::ENUM,
        "typedef" => SymbolKind::TYPE_PARAMETER,
        "inherit" | "import" | "module" => SymbolKind::MODULE,
        _ => SymbolKind::OBJECT,
    }
}

/// Converts interpreter symbols to document-coordinate nodes.
pub fn convert_symbols(source: &str, tokens: &[Token], symbols: &[RawSymbol]) -> Vec<SymbolNode> {
    let index = LineIndex::new(source);
    let positions = token_positions(source, tokens);
    symbols
        .iter()
        .map(|symbol| convert(source, &index, &positions, symbol))
        .collect()
}

fn convert(
    source: &str,
    index: &LineIndex,
    positions: &[(&Token, tower_lsp::lsp_types::Position)],
    symbol: &RawSymbol,
) -> SymbolNode {
    let line = symbol.line.max(1) - 1;
    let start = declaration_offset(source, index, positions, line, &symbol.name);
    let name_end = start + symbol.name.chars().count();
    let end = match symbol.end_line {
        Some(end_line) if end_line.max(1) - 1 >= line => index
            .line_end((end_line.max(1) - 1) as usize)
            .unwrap_or(index.len_chars()),
        _ => name_end,
    }
    .max(name_end)
    .min(index.len_chars().max(start));

    trace!("Host symbol '{}' at {}..{}", symbol.name, start, end);
    SymbolNode::new(&symbol.name, symbol_kind(&symbol.kind), start, end, SymbolOrigin::Host)
        .with_detail(symbol.kind.clone())
        .with_children(
            symbol
                .children
                .iter()
                .map(|child| convert(source, index, positions, child))
                .collect(),
        )
}

fn declaration_offset(
    source: &str,
    index: &LineIndex,
    positions: &[(&Token, tower_lsp::lsp_types::Position)],
    line: u32,
    name: &str,
) -> usize {
    let Some(line_start) = index.line_start(line as usize) else {
        return index.len_chars();
    };

    if let Some((_, position)) = positions
        .iter()
        .find(|(token, position)| position.line == line && token.text == name)
    {
        return line_start + position.character as usize;
    }

    let line_end = index.line_end(line as usize).unwrap_or(index.len_chars());
    let begin = char_to_byte(source, line_start);
    let text = &source[begin..char_to_byte(source, line_end)];
    match text.find(name) {
        Some(byte) => line_start + byte_to_char(text, byte),
        None => line_start,
    }
}

/// One host node per retained region, spanning the whole literal so that
/// markup symbols nest under it.
pub fn literal_nodes(regions: &[EmbeddedRegion]) -> Vec<SymbolNode> {
    regions
        .iter()
        .map(|region| {
            SymbolNode::new(
                format!("{} literal", region.language),
                SymbolKind::STRING,
                region.literal_start,
                region.literal_end,
                SymbolOrigin::Host,
            )
            .with_detail(format!("confidence {:.2}", region.confidence))
        })
        .collect()
}
