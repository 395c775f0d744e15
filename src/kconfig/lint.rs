#![allow(dead_code)]

//! The conf-file linter: replays every assignment in every loaded `.conf`
//! file through the symbol graph and flags the six problems a misdirected
//! assignment can have, in priority order — only the first applicable
//! check fires per entry.

use std::collections::HashMap;

use tower_lsp::lsp_types::{
    self as lsp, CodeAction, CodeActionKind, Diagnostic, DiagnosticRelatedInformation,
    DiagnosticSeverity, DiagnosticTag, TextEdit, Url, WorkspaceEdit,
};

use crate::kconfig::conf::{ConfEntry, ConfFile, InferredType};
use crate::kconfig::eval::{self, Value};
use crate::kconfig::symbols::{SymbolKind, SymbolTable};
use crate::uri::{Range, Uri};

pub struct LintedEntry {
    pub uri: Uri,
    pub diagnostic: Diagnostic,
    pub actions: Vec<CodeAction>,
}

/// Lint every entry of every conf file in `files`, in the order given —
/// `files[0]` is conventionally the board defconfig, loaded first.
pub fn lint(table: &SymbolTable, files: &[ConfFile]) -> Vec<LintedEntry> {
    let mut out = Vec::new();
    let mut first_seen: HashMap<&str, (&Uri, &ConfEntry)> = HashMap::new();

    for file in files {
        for entry in &file.entries {
            if let Some(linted) = lint_entry(table, file, entry, &first_seen, files) {
                out.push(linted);
            }
            first_seen.entry(entry.name.as_str()).or_insert((&file.uri, entry));
        }
    }
    out
}

fn lint_entry<'a>(
    table: &SymbolTable,
    file: &'a ConfFile,
    entry: &'a ConfEntry,
    first_seen: &HashMap<&str, (&'a Uri, &'a ConfEntry)>,
    all_files: &[ConfFile],
) -> Option<LintedEntry> {
    let sym = table.get(&entry.name)?;

    if sym.kind == SymbolKind::Unknown {
        return Some(simple(
            file,
            entry,
            DiagnosticSeverity::ERROR,
            format!("Undefined symbol CONFIG_{}", entry.name),
            Vec::new(),
        ));
    }

    if !entry.inferred_type.matches(sym.kind) {
        let mut actions = Vec::new();
        if matches!(entry.inferred_type, InferredType::Hex | InferredType::Int)
            && matches!(sym.kind, SymbolKind::Hex | SymbolKind::Int)
        {
            let rewritten = if sym.kind == SymbolKind::Hex {
                format!("0x{:x}", entry.value.parse::<i64>().unwrap_or(0))
            } else {
                entry.value.clone()
            };
            actions.push(quick_fix(
                "Convert to matching numeric format",
                &file.uri,
                vec![(entry.value_range, rewritten)],
            ));
        }
        return Some(simple(
            file,
            entry,
            DiagnosticSeverity::ERROR,
            format!("Invalid type. Expected {}", sym.kind.as_str()),
            actions,
        ));
    }

    if let Some(linted) = check_propagation(table, file, entry) {
        return Some(linted);
    }

    if sym.prompts.is_empty() {
        return Some(simple_with_remove(
            file,
            entry,
            DiagnosticSeverity::WARNING,
            format!("Symbol CONFIG_{} cannot be set (has no prompt)", entry.name),
        ));
    }

    if is_redundant_default(table, sym, entry) {
        let mut diagnostic = base_diagnostic(
            entry,
            DiagnosticSeverity::HINT,
            format!("Value is {} by default", entry.raw),
        );
        diagnostic.tags = Some(vec![DiagnosticTag::UNNECESSARY]);
        return Some(LintedEntry {
            uri: file.uri.clone(),
            diagnostic,
            actions: vec![remove_action("Remove redundant entry", &file.uri, entry)],
        });
    }

    if let Some((other_uri, other_entry)) = first_seen.get(entry.name.as_str()) {
        let related = DiagnosticRelatedInformation {
            location: lsp::Location::new(other_uri.to_lsp_url(), other_entry.line_range.into()),
            message: "first assignment here".to_string(),
        };
        let redundant = other_entry.value == entry.value;
        let severity = if redundant { DiagnosticSeverity::HINT } else { DiagnosticSeverity::WARNING };
        let mut diagnostic = base_diagnostic(
            entry,
            severity,
            format!(
                "{} set more than once. Old value \"{}\", new value \"{}\".",
                entry.name, other_entry.value, entry.value
            ),
        );
        diagnostic.related_information = Some(vec![related]);
        let mut actions = Vec::new();
        if redundant {
            diagnostic.tags = Some(vec![DiagnosticTag::UNNECESSARY]);
            actions.push(remove_action("Remove redundant entry", &file.uri, entry));
        }
        let _ = all_files;
        return Some(LintedEntry {
            uri: file.uri.clone(),
            diagnostic,
            actions,
        });
    }

    None
}

fn check_propagation(table: &SymbolTable, file: &ConfFile, entry: &ConfEntry) -> Option<LintedEntry> {
    let sym = table.get(&entry.name)?;
    let current = table.value_of(&entry.name);
    let current_str = current.as_string();
    let user_str = &entry.value;

    if user_str == &current_str {
        if current_str == "y" {
            return None;
        }
        if current_str == "n" {
            return Some(simple(
                file,
                entry,
                DiagnosticSeverity::HINT,
                format!("CONFIG_{} was already disabled.", entry.name),
                Vec::new(),
            ));
        }
        return None;
    }

    let severity = DiagnosticSeverity::WARNING;
    let mut message = if current_str.is_empty() {
        format!("CONFIG_{} couldn't be set.", entry.name)
    } else {
        format!(
            "CONFIG_{} was assigned the value {}, but got the value {}.",
            entry.name, entry.raw, current_str
        )
    };

    let missing_deps = missing_dependencies(table, sym.direct_dep.as_ref());
    let mut actions = Vec::new();
    if !missing_deps.is_empty() {
        let mut edits = Vec::new();
        for dep in missing_deps.iter().rev() {
            let Some(dep_sym) = table.get(dep) else { continue };
            if !dep_sym.kind.is_tristate_like() {
                continue;
            }
            if let Some(existing) = file.entry_for(dep) {
                edits.push((existing.value_range, "y".to_string()));
            } else {
                edits.push((
                    Range::new(entry.line_range.start, entry.line_range.start),
                    format!("CONFIG_{}=y\n", dep),
                ));
            }
        }
        if !edits.is_empty() {
            let title = if edits.len() == 1 {
                format!("Enable CONFIG_{} to resolve dependency", missing_deps[0])
            } else {
                "Enable dependencies to resolve".to_string()
            };
            actions.push(quick_fix(&title, &file.uri, edits));
        }
        message.push_str(" Missing dependencies:\n");
        message.push_str(&missing_deps.join(" && "));
    }
    actions.push(remove_action("Remove entry", &file.uri, entry));

    Some(LintedEntry {
        uri: file.uri.clone(),
        diagnostic: base_diagnostic(entry, severity, message),
        actions,
    })
}

/// Split `direct_dep` on `&&` and keep the operands that currently
/// evaluate to something other than `y`.
fn missing_dependencies(table: &SymbolTable, dep: Option<&crate::ast::Expr>) -> Vec<String> {
    let mut names = Vec::new();
    let Some(dep) = dep else { return names };
    collect_and_operands(dep, &mut names);
    names
        .into_iter()
        .filter(|n| {
            !matches!(
                table.get(n).map(|_| table.value_of(n).as_tristate()),
                Some(eval::Tristate::Y)
            )
        })
        .collect()
}

fn collect_and_operands(expr: &crate::ast::Expr, out: &mut Vec<String>) {
    use crate::ast::Expr;
    match expr {
        Expr::And(a, b) => {
            collect_and_operands(a, out);
            collect_and_operands(b, out);
        }
        Expr::Symbol(name, _) => out.push(name.clone()),
        _ => {}
    }
}

fn is_redundant_default(table: &SymbolTable, sym: &crate::kconfig::symbols::Symbol, entry: &ConfEntry) -> bool {
    if sym.kind.is_tristate_like() {
        let default = sym
            .defaults
            .iter()
            .find(|d| d.condition.as_ref().map_or(true, |c| eval::eval_tristate(c, table) != eval::Tristate::N))
            .map(|d| eval::eval_tristate(&d.value, table))
            .unwrap_or(eval::Tristate::N);
        Value::Tristate(default).as_string() == entry.value
    } else {
        let default = sym
            .defaults
            .iter()
            .find(|d| d.condition.as_ref().map_or(true, |c| eval::eval_tristate(c, table) != eval::Tristate::N))
            .map(|d| eval::eval_string(&d.value, table))
            .unwrap_or_default();
        default == entry.value
    }
}

fn base_diagnostic(entry: &ConfEntry, severity: DiagnosticSeverity, message: String) -> Diagnostic {
    Diagnostic {
        range: entry.line_range.into(),
        severity: Some(severity),
        source: Some("kconfig-lsp".into()),
        message,
        ..Default::default()
    }
}

fn simple(
    file: &ConfFile,
    entry: &ConfEntry,
    severity: DiagnosticSeverity,
    message: String,
    actions: Vec<CodeAction>,
) -> LintedEntry {
    LintedEntry {
        uri: file.uri.clone(),
        diagnostic: base_diagnostic(entry, severity, message),
        actions,
    }
}

fn simple_with_remove(file: &ConfFile, entry: &ConfEntry, severity: DiagnosticSeverity, message: String) -> LintedEntry {
    LintedEntry {
        uri: file.uri.clone(),
        diagnostic: base_diagnostic(entry, severity, message),
        actions: vec![remove_action("Remove entry", &file.uri, entry)],
    }
}

fn remove_action(title: &str, uri: &Uri, entry: &ConfEntry) -> CodeAction {
    quick_fix(title, uri, vec![(entry.line_range, String::new())])
}

fn quick_fix(title: &str, uri: &Uri, edits: Vec<(Range, String)>) -> CodeAction {
    let text_edits: Vec<TextEdit> = edits
        .into_iter()
        .map(|(range, new_text)| TextEdit { range: range.into(), new_text })
        .collect();
    let mut changes = HashMap::new();
    changes.insert(uri.to_lsp_url(), text_edits);
    CodeAction {
        title: title.to_string(),
        kind: Some(CodeActionKind::QUICKFIX),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf_file_with(text: &str) -> ConfFile {
        let uri = Uri::file("/tmp/test.conf");
        // Route through the document store so `ConfFile::load`'s real parsing
        // logic (not a test-only reimplementation) is what gets exercised.
        crate::document::DOCUMENTS.open(crate::document::TextDocument::with_text(
            uri.clone(),
            text,
            0,
        ));
        ConfFile::load(&uri)
    }

    #[test]
    fn entry_with_no_matching_symbol_produces_no_diagnostic() {
        let table = SymbolTable::empty();
        let file = conf_file_with("CONFIG_DOES_NOT_EXIST=y\n");
        let linted = lint(&table, std::slice::from_ref(&file));
        assert!(linted.is_empty());
    }

    #[test]
    fn missing_and_dependencies_are_split_out() {
        use crate::ast::Expr;
        let table = SymbolTable::empty();
        let dep = Expr::And(
            Box::new(Expr::Symbol("A".into(), Default::default())),
            Box::new(Expr::Symbol("B".into(), Default::default())),
        );
        let missing = missing_dependencies(&table, Some(&dep));
        assert_eq!(missing, vec!["A".to_string(), "B".to_string()]);
    }
}
