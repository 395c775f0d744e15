//! `textDocument/hover`: a markdown summary of the symbol under the cursor.

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind};

use crate::kconfig::context::KconfigContext;
use crate::uri::{Position, Uri};

pub fn hover(ctx: &KconfigContext, uri: &Uri, pos: Position) -> Option<Hover> {
    let name = ctx.symbol_at(uri, pos)?;
    let table = ctx.table()?;
    let sym = table.get(&name)?;

    let mut body = String::new();
    if let Some(prompt) = sym.prompts.first() {
        body.push_str(&format!("**{}**\n\n", prompt.text));
    }
    body.push_str(&format!("Type: `{}`\n\n", sym.kind.as_str()));

    let value = table.value_of(&name).as_string();
    if !value.is_empty() {
        body.push_str(&format!("Current value: `{value}`\n\n"));
    }

    if let Some(help) = &sym.help {
        body.push_str(help);
        body.push('\n');
    }

    // Advisory cross-link back to where this symbol could actually be set,
    // only meaningful from a Kconfig-definition file with a known build.
    if uri.basename().starts_with("Kconfig") {
        if let Some(conf) = ctx.conf_files().first() {
            body.push_str(&format!("\n\n[{}]({})", conf.uri.basename(), conf.uri));
        }
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: body,
        }),
        range: None,
    })
}
