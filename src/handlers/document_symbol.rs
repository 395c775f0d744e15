//! `textDocument/documentSymbol`: one `Property` symbol per `.conf` entry in
//! the requested file.

#![allow(deprecated)] // `DocumentSymbol::deprecated` has no replacement yet in lsp_types 0.9x.

use tower_lsp::lsp_types::{DocumentSymbol, DocumentSymbolResponse, SymbolKind as LspSymbolKind};

use crate::kconfig::context::KconfigContext;
use crate::uri::Uri;

pub fn document_symbols(ctx: &KconfigContext, uri: &Uri) -> Option<DocumentSymbolResponse> {
    let file = ctx.conf_files().iter().find(|f| &f.uri == uri)?;
    let table = ctx.table();

    let symbols: Vec<DocumentSymbol> = file
        .entries
        .iter()
        .map(|entry| {
            let detail = table.and_then(|t| t.get(&entry.name)).and_then(|s| {
                s.prompts
                    .iter()
                    .find(|p| p.condition.is_none())
                    .map(|p| p.text.clone())
            });
            DocumentSymbol {
                name: format!("CONFIG_{}", entry.name),
                detail,
                kind: LspSymbolKind::PROPERTY,
                tags: None,
                deprecated: None,
                range: entry.line_range.into(),
                selection_range: entry.name_range.into(),
                children: None,
            }
        })
        .collect();

    Some(DocumentSymbolResponse::Nested(symbols))
}
