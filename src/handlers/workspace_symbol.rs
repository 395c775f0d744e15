//! `workspace/symbol`: every defined symbol whose name starts with `query`,
//! each reported at its first definition site.

#![allow(deprecated)]

use tower_lsp::lsp_types::{SymbolInformation, SymbolKind as LspSymbolKind};

use crate::kconfig::context::KconfigContext;

pub fn workspace_symbols(ctx: &KconfigContext, query: &str) -> Vec<SymbolInformation> {
    let Some(table) = ctx.table() else {
        return Vec::new();
    };
    table
        .symbols
        .values()
        .filter(|s| s.is_defined() && s.name.starts_with(query))
        .filter_map(|s| {
            let loc = s.locations.first()?.clone();
            Some(SymbolInformation {
                name: format!("CONFIG_{}", s.name),
                kind: LspSymbolKind::PROPERTY,
                tags: None,
                deprecated: None,
                location: loc.into(),
                container_name: None,
            })
        })
        .collect()
}
