#![allow(dead_code)]

//! Bridges the grammar-level parser (`lexer`/`parser`/`ast`) to Kconfig's
//! actual file model: `source` directives are followed recursively (with
//! `$(ENV_VAR)` substitution against a build's environment). Every included
//! file is first looked up in [`DOCUMENTS`] so an unsaved editor buffer wins
//! over what's on disk; a miss falls through to a direct, uncached disk read
//! rather than populating the store, so a `source`d file the editor never
//! opened doesn't linger there and go stale across a reparse. Per-file parse
//! diagnostics are bucketed the way a config UI wants to display them.
//!
//! A directory handed in as if it were a file is a hard error: the original
//! Kconfig tooling treats that the same way, and surfacing it early avoids
//! a confusing a "found nothing in this file" diagnostic two layers down.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{DiagSeverity, KconfigFile, LineIndex};
use crate::document::DOCUMENTS;
use crate::lexer::Lexer;
use crate::parser;
use crate::uri::{Range, Uri};

static MACRO_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\(([A-Za-z_][A-Za-z0-9_]*)\)").unwrap());
static DEFINED_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(defined at.*\)\s*$").unwrap());

#[derive(Debug)]
pub struct ParsedFile {
    pub uri: Uri,
    pub text: String,
    pub file: KconfigFile,
}

/// A parse diagnostic already localized to a `Range` within its owning
/// file, as opposed to [`crate::ast::ParseDiagnostic`]'s raw byte span.
#[derive(Debug, Clone)]
pub struct FileDiagnostic {
    pub range: Range,
    pub severity: DiagSeverity,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct LoadResult {
    /// Every file that was actually read, in inclusion order (the entry
    /// point first), ready to hand to `symbols::build`.
    pub files: Vec<ParsedFile>,
    /// Parse diagnostics, bucketed by the URI string of the file they
    /// belong to.
    pub diagnostics: HashMap<String, Vec<FileDiagnostic>>,
    /// Whether at least one `config`/`menuconfig` symbol was found anywhere
    /// in the tree — an empty tree almost always means the entry file or
    /// one of its `source`s couldn't be resolved.
    pub valid: bool,
}

/// Recursively parse `entry` and every file it (transitively) `source`s,
/// substituting `$(VAR)` references in `source` paths against `env`.
pub fn load(entry: &Uri, env: &HashMap<String, String>) -> LoadResult {
    let mut result = LoadResult::default();
    let mut seen = std::collections::HashSet::new();
    let mut any_symbol = false;
    load_one(entry, env, &mut result, &mut seen, &mut any_symbol);
    result.valid = any_symbol;
    result
}

fn load_one(
    uri: &Uri,
    env: &HashMap<String, String>,
    result: &mut LoadResult,
    seen: &mut std::collections::HashSet<String>,
    any_symbol: &mut bool,
) {
    let key = uri.to_string();
    if !seen.insert(key.clone()) {
        return;
    }

    let Some(path) = uri.to_path() else {
        push_fatal(result, uri, "can only parse file:// Kconfig sources");
        return;
    };
    if path.is_dir() {
        push_fatal(result, uri, &format!("{} is a directory, not a Kconfig file", path.display()));
        return;
    }

    let text = match DOCUMENTS.get(uri, false) {
        Some(d) => d.text(),
        None => match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => {
                push_fatal(result, uri, &format!("could not read {}", path.display()));
                return;
            }
        },
    };

    let tokens = Lexer::new(&text).tokenize();
    let parsed = parser::parse(&text, tokens);

    *any_symbol = *any_symbol || has_symbol(&parsed.file);

    let index = LineIndex::new(&text);
    let diags: Vec<FileDiagnostic> = parsed
        .diagnostics
        .into_iter()
        .filter(|d| !d.message.contains("set more than once."))
        .map(|d| {
            let message = DEFINED_AT.replace(&d.message, "").into_owned();
            let (sl, sc) = index.line_col(d.span.start);
            let (el, ec) = index.line_col(d.span.end);
            FileDiagnostic {
                range: Range::new(
                    crate::uri::Position::new(sl, sc),
                    crate::uri::Position::new(el, ec),
                ),
                severity: d.severity,
                message,
            }
        })
        .collect();
    result.diagnostics.entry(key.clone()).or_default().extend(diags);

    let base_dir = path.parent().map(|p| p.to_path_buf());
    let sources = collect_sources(&parsed.file);

    result.files.push(ParsedFile {
        uri: uri.clone(),
        text,
        file: parsed.file,
    });

    for raw_path in sources {
        let expanded = expand_env(&raw_path, env);
        let Some(base_dir) = &base_dir else { continue };
        let resolved = base_dir.join(&expanded);
        let child_uri = Uri::file(&resolved);
        load_one(&child_uri, env, result, seen, any_symbol);
    }
}

fn has_symbol(file: &KconfigFile) -> bool {
    use crate::ast::Entry;
    file.entries.iter().any(|e| match e {
        Entry::Config(_) | Entry::MenuConfig(_) => true,
        Entry::Menu(m) => has_symbol(&KconfigFile { entries: m.entries.clone() }),
        Entry::Choice(c) => has_symbol(&KconfigFile { entries: c.entries.clone() }),
        Entry::If(i) => has_symbol(&KconfigFile { entries: i.entries.clone() }),
        _ => false,
    })
}

fn collect_sources(file: &KconfigFile) -> Vec<String> {
    use crate::ast::Entry;
    let mut out = Vec::new();
    for entry in &file.entries {
        match entry {
            Entry::Source(s) => out.push(s.path.clone()),
            Entry::Menu(m) => out.extend(collect_sources(&KconfigFile { entries: m.entries.clone() })),
            Entry::Choice(c) => out.extend(collect_sources(&KconfigFile { entries: c.entries.clone() })),
            Entry::If(i) => out.extend(collect_sources(&KconfigFile { entries: i.entries.clone() })),
            _ => {}
        }
    }
    out
}

/// Replace every `$(VAR)` in `path` with its value from `env`, leaving
/// unresolved references untouched (Kconfig itself treats an undefined
/// macro reference as an empty string, but surfacing the literal text is
/// more useful for diagnosing a missing build variable).
fn expand_env(path: &str, env: &HashMap<String, String>) -> String {
    MACRO_REF
        .replace_all(path, |caps: &regex::Captures| {
            let name = &caps[1];
            env.get(name).cloned().unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// A fatal diagnostic has no real source position to point at — the file
/// itself couldn't be opened or parsed — so it's pinned to the first line.
fn push_fatal(result: &mut LoadResult, uri: &Uri, message: &str) {
    let diag = FileDiagnostic {
        range: Range::whole_line(0),
        severity: DiagSeverity::Error,
        message: message.to_string(),
    };
    result.diagnostics.entry(uri.to_string()).or_default().push(diag);
}

/// Strip the `path:line: error:`/`error:` prefix clang-like tools leave on
/// a message, for callers that want to surface just the human-readable
/// part in a tooltip or quick status line.
pub fn strip_error_prefix(message: &str) -> &str {
    static PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[^:]+:\d+:\s*)?error:\s*").unwrap());
    match PREFIX.find(message) {
        Some(m) => &message[m.end()..],
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_nested_source_with_env_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Kconfig");
        let child_dir = dir.path().join("sub");
        std::fs::create_dir(&child_dir).unwrap();
        let child = child_dir.join("Kconfig.sub");

        std::fs::write(&child, "config CHILD\n\tbool \"child\"\n").unwrap();
        let mut f = std::fs::File::create(&root).unwrap();
        writeln!(f, "config ROOT\n\tbool \"root\"\n\nsource \"$(MY_DIR)/Kconfig.sub\"").unwrap();

        let mut env = HashMap::new();
        env.insert("MY_DIR".to_string(), "sub".to_string());

        let entry = Uri::file(&root);
        let result = load(&entry, &env);
        assert!(result.valid);
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.files[1].uri.basename(), "Kconfig.sub");
    }

    #[test]
    fn directory_given_as_entry_is_a_fatal_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Uri::file(dir.path());
        let result = load(&entry, &HashMap::new());
        assert!(!result.valid);
        assert!(!result.diagnostics.is_empty());
    }

    #[test]
    fn error_prefix_is_stripped() {
        assert_eq!(strip_error_prefix("Kconfig:12: error: bad syntax"), "bad syntax");
        assert_eq!(strip_error_prefix("error: bad syntax"), "bad syntax");
    }
}
