#![allow(dead_code)]

//! The `.conf` file model: flat `CONFIG_<NAME>=<VALUE>` assignment lists,
//! as used by board defconfigs and user-supplied overlay conf files.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::DiagSeverity;
use crate::document::DOCUMENTS;
use crate::kconfig::adapter::FileDiagnostic;
use crate::kconfig::symbols::SymbolKind;
use crate::uri::{Position, Range, Uri};

static ENTRY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*(CONFIG_(\w+))\s*=("[^"]*"|\w+)"#).unwrap());

/// Type guessed purely from an entry's right-hand-side text, independent of
/// whatever the symbol graph says the symbol's declared type actually is —
/// the linter's type-mismatch check is the thing that compares the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredType {
    Bool,
    Hex,
    Int,
    String,
    Unknown,
}

impl InferredType {
    pub fn matches(self, kind: SymbolKind) -> bool {
        match (self, kind) {
            (InferredType::Bool, SymbolKind::Bool | SymbolKind::Tristate) => true,
            (InferredType::Hex, SymbolKind::Hex) => true,
            (InferredType::Int, SymbolKind::Int) => true,
            (InferredType::String, SymbolKind::String) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfEntry {
    /// Symbol name, without the `CONFIG_` prefix.
    pub name: String,
    /// Range covering just the name (including the `CONFIG_` prefix).
    pub name_range: Range,
    /// Range covering the right-hand-side value text.
    pub value_range: Range,
    /// Raw RHS text, unquoted/undecoded.
    pub raw: String,
    /// Decoded value: quotes stripped for strings, otherwise identical to `raw`.
    pub value: String,
    pub inferred_type: InferredType,
    /// The full line, start to end, for quick-fixes that replace or remove
    /// the entire assignment.
    pub line_range: Range,
    pub line: u32,
}

impl ConfEntry {
    fn from_line(line_no: u32, text: &str) -> Option<Self> {
        let caps = ENTRY_LINE.captures(text)?;
        let whole_name = caps.get(1).unwrap();
        let name = caps.get(2).unwrap().as_str().to_string();
        let raw_match = caps.get(3).unwrap();
        let raw = raw_match.as_str().to_string();

        let inferred_type = infer_type(&raw);
        let value = if raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2 {
            raw[1..raw.len() - 1].to_string()
        } else {
            raw.clone()
        };

        Some(ConfEntry {
            name,
            name_range: Range::new(
                Position::new(line_no, whole_name.start() as u32),
                Position::new(line_no, whole_name.end() as u32),
            ),
            value_range: Range::new(
                Position::new(line_no, raw_match.start() as u32),
                Position::new(line_no, raw_match.end() as u32),
            ),
            raw,
            value,
            inferred_type,
            line_range: Range::new(Position::new(line_no, 0), Position::new(line_no + 1, 0)),
            line: line_no,
        })
    }

    /// A `WorkspaceEdit`-shaped deletion of this entry's whole line, used by
    /// several linter quick-fixes ("Remove entry").
    pub fn remove(&self) -> Range {
        self.line_range
    }
}

fn infer_type(raw: &str) -> InferredType {
    if raw.starts_with('"') {
        InferredType::String
    } else if raw == "y" || raw == "n" {
        InferredType::Bool
    } else if raw.starts_with("0x") || raw.starts_with("0X") {
        InferredType::Hex
    } else if raw.parse::<i64>().is_ok() {
        InferredType::Int
    } else {
        InferredType::Unknown
    }
}

#[derive(Debug, Clone)]
pub struct ConfFile {
    pub uri: Uri,
    pub entries: Vec<ConfEntry>,
    pub diagnostics: Vec<FileDiagnostic>,
}

impl ConfFile {
    /// Read `uri` through the document store (so unsaved buffers win) and
    /// extract every line that matches the assignment grammar. A blank line
    /// or a `#`-comment is ignored silently; anything else that doesn't
    /// match produces an `ignoring malformed line '<text>'` warning.
    pub fn load(uri: &Uri) -> Self {
        let text = DOCUMENTS
            .get(uri, true)
            .map(|d| d.text())
            .unwrap_or_default();
        let mut entries = Vec::new();
        let mut diagnostics = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line_no = i as u32;
            if let Some(entry) = ConfEntry::from_line(line_no, line) {
                entries.push(entry);
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            diagnostics.push(FileDiagnostic {
                range: Range::new(Position::new(line_no, 0), Position::new(line_no + 1, 0)),
                severity: DiagSeverity::Warning,
                message: format!("ignoring malformed line '{trimmed}'"),
            });
        }
        ConfFile {
            uri: uri.clone(),
            entries,
            diagnostics,
        }
    }

    pub fn entry_for(&self, name: &str) -> Option<&ConfEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// `(name, arch, dir)` resolving to exactly one implicit conf file at
/// `<dir>/<name>_defconfig`, loaded with replace- rather than
/// merge-semantics before any user conf file.
#[derive(Debug, Clone)]
pub struct BoardConf {
    pub name: String,
    pub arch: String,
    pub dir: std::path::PathBuf,
}

impl BoardConf {
    pub fn new(name: impl Into<String>, arch: impl Into<String>, dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            name: name.into(),
            arch: arch.into(),
            dir: dir.into(),
        }
    }

    pub fn defconfig_uri(&self) -> Uri {
        Uri::file(self.dir.join(format!("{}_defconfig", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bool_hex_int_and_string_entries() {
        let text = "CONFIG_FOO=y\nCONFIG_BAR=0x10\nCONFIG_BAZ=42\nCONFIG_NAME=\"hello\"\nnot an entry\n";
        let entries: Vec<ConfEntry> = text
            .lines()
            .enumerate()
            .filter_map(|(i, l)| ConfEntry::from_line(i as u32, l))
            .collect();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].inferred_type, InferredType::Bool);
        assert_eq!(entries[1].inferred_type, InferredType::Hex);
        assert_eq!(entries[2].inferred_type, InferredType::Int);
        assert_eq!(entries[3].inferred_type, InferredType::String);
        assert_eq!(entries[3].value, "hello");
    }

    #[test]
    fn board_defconfig_uri_follows_naming_convention() {
        let board = BoardConf::new("nrf52dk_nrf52832", "arm", "/zephyr/boards/arm/nrf52dk_nrf52832");
        assert_eq!(
            board.defconfig_uri().to_path().unwrap(),
            std::path::PathBuf::from("/zephyr/boards/arm/nrf52dk_nrf52832/nrf52dk_nrf52832_defconfig")
        );
    }
}
