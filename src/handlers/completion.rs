//! `textDocument/completion`: symbol-name completion over a build's symbol
//! table, with a type-dependent snippet `insertText`.

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionList, CompletionResponse, Documentation,
    InsertTextFormat,
};

use crate::document::DOCUMENTS;
use crate::kconfig::context::KconfigContext;
use crate::kconfig::symbols::SymbolKind;
use crate::snippet::Snippet;
use crate::uri::{Position, Uri};

const CONFIG_PREFIX: &str = "CONFIG_";

pub fn complete(ctx: &KconfigContext, uri: &Uri, pos: Position) -> Option<CompletionResponse> {
    let table = ctx.table()?;
    let doc = DOCUMENTS.get(uri, true)?;
    let line = doc.line(pos.line as usize).unwrap_or_default();
    let char_idx = (pos.character as usize).min(line.chars().count());
    let before: String = line.chars().take(char_idx).collect();
    let word = before.trim_start().to_string();

    // Rewrite a partial `CONFIG_` prefix (or none at all) into one, using
    // longest-common-prefix so a user mid-way through typing `CONF` still
    // matches; a word that's already past `CONFIG_` is a real symbol filter.
    let common_len = word
        .bytes()
        .zip(CONFIG_PREFIX.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    let show_non_visible = common_len >= CONFIG_PREFIX.len();
    let name_filter = if show_non_visible {
        word[common_len..].to_string()
    } else {
        word.clone()
    };

    let items: Vec<CompletionItem> = table
        .symbols
        .values()
        .filter(|s| s.is_defined() && s.name.starts_with(&name_filter))
        .filter(|s| show_non_visible || table.visible(&s.name))
        .map(|s| {
            let mut snippet = Snippet::new(CONFIG_PREFIX);
            snippet.add_text(&s.name);
            snippet.add_text("=");
            match s.kind {
                SymbolKind::Bool => {
                    snippet.add_choice(&["y", "n"]);
                }
                SymbolKind::Tristate => {
                    snippet.add_choice(&["y", "m", "n"]);
                }
                SymbolKind::String => {
                    snippet.add_text("\"");
                    snippet.add_tabstop();
                    snippet.add_text("\"");
                }
                SymbolKind::Hex => {
                    snippet.add_text("0x");
                    snippet.add_tabstop();
                }
                SymbolKind::Int => {
                    snippet.add_tabstop();
                }
                SymbolKind::Unknown => {}
            }
            CompletionItem {
                label: format!("{CONFIG_PREFIX}{}", s.name),
                kind: Some(CompletionItemKind::VARIABLE),
                detail: Some(s.kind.as_str().to_string()),
                documentation: s
                    .help
                    .as_ref()
                    .map(|h| Documentation::String(h.replace('\n', " "))),
                insert_text: Some(snippet.finish()),
                insert_text_format: Some(InsertTextFormat::SNIPPET),
                ..Default::default()
            }
        })
        .collect();

    Some(CompletionResponse::List(CompletionList {
        // A bare/partial prefix only shows visible symbols, so the list is
        // necessarily incomplete — more keystrokes narrow toward `CONFIG_`
        // and should re-query rather than filter client-side.
        is_incomplete: !show_non_visible,
        items,
    }))
}
