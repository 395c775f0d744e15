//! `textDocument/definition`: every definition site of the symbol under the
//! cursor, across every Kconfig file in the context's tree.

use tower_lsp::lsp_types::GotoDefinitionResponse;

use crate::kconfig::context::KconfigContext;
use crate::uri::{Position, Uri};

pub fn definition(ctx: &KconfigContext, uri: &Uri, pos: Position) -> Option<GotoDefinitionResponse> {
    let name = ctx.symbol_at(uri, pos)?;
    let table = ctx.table()?;
    let sym = table.get(&name)?;
    if sym.locations.is_empty() {
        return None;
    }
    let locations = sym.locations.iter().cloned().map(Into::into).collect();
    Some(GotoDefinitionResponse::Array(locations))
}
