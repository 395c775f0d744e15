#![allow(dead_code)]

//! In-memory text documents and the process-global store that unifies
//! editor-owned buffers with on-disk files.
//!
//! The Kconfig parser adapter and the `.conf` readers both go through
//! [`DOCUMENTS`] rather than touching the filesystem directly, so that an
//! unsaved editor buffer is always what gets parsed, and so that tests can
//! populate virtual files without touching disk.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::uri::{Position, Range, Uri};

pub const UNKNOWN_VERSION: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

#[derive(Debug, Clone)]
pub struct TextDocument {
    uri: Uri,
    lines: Vec<String>,
    version: i32,
    modified: bool,
    loaded: bool,
    is_virtual: bool,
    mode: Option<OpenMode>,
    scanpos: usize,
}

impl TextDocument {
    /// A fresh, unloaded document. `version` follows the reference
    /// implementation's quirk: omitting it (passing `UNKNOWN_VERSION`) marks
    /// the document modified, since only an explicit version of `0` means
    /// "freshly read from disk, unmodified".
    pub fn new(uri: Uri, version: i32) -> Self {
        let is_virtual = uri.scheme != "file";
        Self {
            uri,
            lines: Vec::new(),
            version,
            modified: version != 0,
            loaded: false,
            is_virtual,
            mode: None,
            scanpos: 0,
        }
    }

    pub fn with_text(uri: Uri, text: &str, version: i32) -> Self {
        let mut doc = Self::new(uri, version);
        doc.set_text(text);
        doc
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(|s| s.as_str())
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The full text, lines joined with `\n` plus a trailing newline — the
    /// canonical form a disk-backed document always has.
    pub fn text(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut s = self.lines.join("\n");
        s.push('\n');
        s
    }

    fn set_text(&mut self, text: &str) {
        self.lines = split_lines(text);
        self.loaded = true;
    }

    pub fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    /// Byte offset of `pos` into `self.text()`.
    pub fn offset(&self, pos: Position) -> usize {
        let line = pos.line as usize;
        if line >= self.lines.len() {
            return self.text().len();
        }
        let mut offset = 0usize;
        for l in &self.lines[..line] {
            offset += l.len() + 1;
        }
        let col = (self.lines[line].len() + 1).min(pos.character as usize);
        offset + col
    }

    /// Inverse of [`Self::offset`].
    pub fn pos(&self, offset: usize) -> Position {
        let text = self.text();
        let clamped = offset.min(text.len());
        let head = &text[..clamped];
        let lines = split_lines(head);
        if lines.is_empty() {
            return Position::start();
        }
        let line = (lines.len() - 1) as u32;
        let character = lines.last().unwrap().len() as u32;
        Position::new(line, character)
    }

    /// Slice of the document text; `None` means the whole document.
    /// Mirrors the trailing-newline trim the reference implementation
    /// applies whenever the slice doesn't itself end on an exact line
    /// boundary.
    pub fn get(&self, range: Option<Range>) -> String {
        let Some(range) = range else {
            return self.text();
        };
        let text = self.text();
        let start = self.offset(range.start).min(text.len());
        let end = self.offset(range.end).min(text.len());
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let mut slice = text[start..end].to_string();
        if slice.ends_with('\n')
            && range.end.character != 0
            && (range.end.line as usize) < self.lines.len()
        {
            slice.pop();
        }
        slice
    }

    pub fn word_at(&self, pos: Position) -> String {
        let Some(line) = self.line(pos.line as usize) else {
            return String::new();
        };
        let col = (pos.character as usize).min(line.len());
        let before = &line[..col];
        let after = &line[col..];
        let head: String = before
            .chars()
            .rev()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        let tail: String = after
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        format!("{head}{tail}")
    }

    /// Replace the whole document (`range == None`) or a sub-range.
    /// An empty document ignores `range` entirely and just sets the text,
    /// matching the reference server's "ignore range if the file is empty"
    /// rule (relevant for the very first `didChange` after an empty
    /// `didOpen`).
    pub fn replace(&mut self, text: &str, range: Option<Range>) {
        match range {
            Some(range) if !self.lines.is_empty() => {
                let mut full = self.text();
                let start = self.offset(range.start).min(full.len());
                let end = self.offset(range.end).min(full.len());
                let (start, end) = if start <= end { (start, end) } else { (end, start) };
                full.replace_range(start..end, text);
                self.set_text(&full);
            }
            _ => self.set_text(text),
        }
        self.modified = true;
    }

    // -- stream-like facade, used by parser adapters that want a uniform
    // read/write surface regardless of whether a file lives on disk or only
    // in an editor buffer -------------------------------------------------

    pub fn open(&mut self, mode: OpenMode) {
        if mode == OpenMode::Write {
            self.set_text("");
            self.modified = true;
            self.version = UNKNOWN_VERSION;
        } else if !self.loaded {
            self.loaded = true;
        }
        self.mode = Some(mode);
        self.scanpos = 0;
    }

    /// Closing a document opened for writing or appending flushes it to
    /// disk first if it's dirty; a read-only or already-clean document just
    /// drops its mode.
    pub fn close(&mut self) {
        if matches!(self.mode, Some(OpenMode::Write) | Some(OpenMode::Append)) && self.modified {
            self.write_to_disk();
        }
        self.mode = None;
    }

    fn write_to_disk(&mut self) {
        let Some(path) = self.uri.to_path() else { return };
        if std::fs::write(&path, self.text()).is_ok() {
            self.modified = false;
        }
    }

    pub fn write(&mut self, text: &str) {
        let mut t = self.text();
        t.push_str(text);
        self.set_text(&t);
        if self.mode == Some(OpenMode::Append) {
            self.scanpos = self.text().len();
        }
        self.modified = true;
        self.version = UNKNOWN_VERSION;
    }

    pub fn read(&mut self, length: Option<usize>) -> String {
        let text = self.text();
        if self.scanpos >= text.len() {
            return String::new();
        }
        let remaining = &text[self.scanpos..];
        let out = match length {
            Some(n) => remaining.chars().take(n).collect::<String>(),
            None => remaining.to_string(),
        };
        self.scanpos += out.len();
        out
    }

    pub fn readline(&mut self, size: Option<usize>) -> String {
        let text = self.text();
        if self.scanpos >= text.len() {
            return String::new();
        }
        let remaining = &text[self.scanpos..];
        let line_end = remaining.find('\n').map(|i| i + 1).unwrap_or(remaining.len());
        let full_line = &remaining[..line_end];
        let out = match size {
            Some(n) if n < full_line.len() => full_line[..n].to_string(),
            _ => full_line.to_string(),
        };
        self.scanpos += out.len();
        out
    }

    pub fn readlines(&mut self) -> Vec<String> {
        let text = self.text();
        let remaining = text[self.scanpos..].to_string();
        self.scanpos = text.len();
        split_lines(&remaining)
    }

    pub fn seek(&mut self, offset: usize) {
        self.scanpos = offset;
    }

    pub fn tell(&self) -> usize {
        self.scanpos
    }
}

fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.lines().map(|l| l.to_string()).collect()
}

impl fmt::Display for TextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// A source of read-only documents keyed by URI scheme, for non-`file://`
/// resources (e.g. an in-memory "generated Kconfig" provider). No concrete
/// provider ships with this server today, but the registration surface is
/// kept, matching the extensibility point of the reference store.
pub trait DocProvider: Send + Sync {
    fn scheme(&self) -> &str;
    fn get(&self, uri: &Uri) -> Option<TextDocument>;
}

pub struct DocumentStore {
    docs: DashMap<String, TextDocument>,
    providers: DashMap<String, Arc<dyn DocProvider>>,
}

impl DocumentStore {
    fn new() -> Self {
        Self {
            docs: DashMap::new(),
            providers: DashMap::new(),
        }
    }

    /// Register (or replace) an open, editor-owned document.
    pub fn open(&self, doc: TextDocument) {
        self.docs.insert(doc.uri().to_string(), doc);
    }

    /// No-op: closing an editor buffer doesn't evict it from the store,
    /// since a stale-but-present document is more useful than forcing a
    /// disk re-read on the next request.
    pub fn close(&self, _uri: &Uri) {}

    pub fn register_provider(&self, provider: Arc<dyn DocProvider>) {
        self.providers.insert(provider.scheme().to_string(), provider);
    }

    pub fn reset(&self) {
        self.docs.clear();
        self.providers.clear();
    }

    /// Resolve a document: provider (if one is registered for this scheme),
    /// else an already-open buffer, else (if `create`) a disk read.
    pub fn get(&self, uri: &Uri, create: bool) -> Option<TextDocument> {
        if let Some(provider) = self.providers.get(&uri.scheme) {
            return provider.get(uri);
        }
        if let Some(doc) = self.docs.get(&uri.to_string()) {
            return Some(doc.clone());
        }
        if create {
            return self.load_from_disk(uri);
        }
        None
    }

    /// Apply a didChange-style edit to whichever document is already open
    /// for `uri`, inserting it fresh off disk first if necessary.
    pub fn replace(&self, uri: &Uri, text: &str, range: Option<Range>) -> Option<TextDocument> {
        let key = uri.to_string();
        if !self.docs.contains_key(&key) {
            let seed = self
                .load_from_disk(uri)
                .unwrap_or_else(|| TextDocument::new(uri.clone(), UNKNOWN_VERSION));
            self.docs.insert(key.clone(), seed);
        }
        let mut entry = self.docs.get_mut(&key)?;
        entry.replace(text, range);
        Some(entry.clone())
    }

    fn load_from_disk(&self, uri: &Uri) -> Option<TextDocument> {
        let path = uri.to_path()?;
        let text = std::fs::read_to_string(&path).ok()?;
        let doc = TextDocument::with_text(uri.clone(), &text, 0);
        self.docs.insert(uri.to_string(), doc.clone());
        Some(doc)
    }
}

pub static DOCUMENTS: Lazy<DocumentStore> = Lazy::new(DocumentStore::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_doc_without_version_is_modified() {
        let doc = TextDocument::new(Uri::file("/tmp/x"), UNKNOWN_VERSION);
        assert!(doc.is_modified());
        let doc = TextDocument::new(Uri::file("/tmp/x"), 0);
        assert!(!doc.is_modified());
    }

    #[test]
    fn offset_and_pos_roundtrip() {
        let doc = TextDocument::with_text(Uri::file("/tmp/x"), "abc\ndef\n", 0);
        let pos = Position::new(1, 2);
        let off = doc.offset(pos);
        assert_eq!(off, 6);
        assert_eq!(doc.pos(off), pos);
    }

    #[test]
    fn replace_on_empty_doc_ignores_range() {
        let mut doc = TextDocument::new(Uri::file("/tmp/x"), 0);
        let bogus_range = Range::new(Position::new(5, 0), Position::new(9, 0));
        doc.replace("CONFIG_FOO=y\n", Some(bogus_range));
        assert_eq!(doc.text(), "CONFIG_FOO=y\n");
    }

    #[test]
    fn word_at_spans_cursor() {
        let doc = TextDocument::with_text(Uri::file("/tmp/x"), "CONFIG_FOO=y\n", 0);
        assert_eq!(doc.word_at(Position::new(0, 3)), "CONFIG_FOO");
    }

    #[test]
    fn store_get_falls_back_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Kconfig");
        std::fs::write(&path, "config FOO\n\tbool \"Foo\"\n").unwrap();
        let store = DocumentStore::new();
        let uri = Uri::file(&path);
        let doc = store.get(&uri, true).unwrap();
        assert!(doc.text().contains("FOO"));
    }
}
