//! `textDocument/codeAction`: the union of quick-fixes attached to
//! diagnostics whose range overlaps the requested range.

use tower_lsp::lsp_types::CodeActionOrCommand;

use crate::kconfig::context::KconfigContext;
use crate::uri::{Range, Uri};

pub fn code_actions(ctx: &KconfigContext, uri: &Uri, range: Range) -> Vec<CodeActionOrCommand> {
    ctx.code_actions_overlapping(uri, range)
        .into_iter()
        .map(CodeActionOrCommand::CodeAction)
        .collect()
}
