#![allow(dead_code)]

//! URI implementation per RFC 3986, used throughout the server as the
//! canonical key for documents, contexts and locations.
//!
//! `tower_lsp::lsp_types::Url` (backed by the `url` crate) is used at the
//! wire boundary, but its percent-escaping and path-normalization rules
//! don't match what the rest of this server expects internally (in
//! particular, the escaped-character set and the Windows drive-letter
//! handling), so URIs are re-parsed into this type as soon as they cross
//! into server-owned code.

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::Url;

#[derive(Debug, Clone, Default)]
pub struct Uri {
    pub scheme: String,
    pub authority: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

static DRIVE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/(\w:/)").unwrap());
static WINDOWS_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w:\\").unwrap());
static URI_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?):(?://([^?\s/#]*))?(/[^?\s]*)?(?:\?([^#]+))?(?:#(.+))?$").unwrap());
static PERCENT_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%([\da-fA-F]{2})").unwrap());

impl Uri {
    pub fn new(
        scheme: impl Into<String>,
        authority: impl Into<String>,
        path: impl Into<String>,
        query: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        let path = path.into();
        // `/C:/foo` -> `C:/foo`: drop the leading slash kept around a drive letter.
        let path = DRIVE_PREFIX.replace(&path, "$1").into_owned();
        Self {
            scheme: scheme.into(),
            authority: authority.into(),
            path,
            query: query.into(),
            fragment: fragment.into(),
        }
    }

    /// Build a `file://` URI from a filesystem path.
    pub fn file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().replace('\\', "/");
        Self::new("file", "", path, "", "")
    }

    /// Parse a URI from its string form, following the same forgiving rules
    /// as the reference implementation: percent-decode first, rewrite
    /// Windows paths (`C:\foo`) into `file:///C:/foo`, then split on the
    /// generic RFC 3986 grammar.
    pub fn parse(raw: &str) -> Option<Self> {
        let sanitized = percent_decode(raw);
        let sanitized = if WINDOWS_PATH.is_match(&sanitized) {
            format!("file:///{}", sanitized.replace('\\', "/"))
        } else {
            sanitized
        };

        let caps = URI_PATTERN.captures(&sanitized)?;
        let scheme = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let authority = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let path = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let query = caps.get(4).map(|m| m.as_str()).unwrap_or("");
        let fragment = caps.get(5).map(|m| m.as_str()).unwrap_or("");
        Some(Self::new(scheme, authority, path, query, fragment))
    }

    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Convert a `file://` URI back to a filesystem path.
    pub fn to_path(&self) -> Option<PathBuf> {
        if self.scheme != "file" {
            return None;
        }
        Some(PathBuf::from(&self.path))
    }

    pub fn to_lsp_url(&self) -> Url {
        Url::parse(&self.to_string()).unwrap_or_else(|_| Url::parse("file:///invalid").unwrap())
    }

    pub fn from_lsp_url(url: &Url) -> Self {
        Self::parse(url.as_str()).unwrap_or_default()
    }

    fn escape(part: &str) -> String {
        part.chars()
            .map(|c| {
                if "!#$&'()*+,\\:;=?@[]".contains(c) {
                    format!("%{:02X}", c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect()
    }
}

fn percent_decode(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    PERCENT_ESCAPE
        .replace_all(s, |caps: &regex::Captures| {
            let byte = u8::from_str_radix(&caps[1], 16).unwrap_or(b'?');
            (byte as char).to_string()
        })
        .into_owned()
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut path = self.path.clone();
        if !path.starts_with('/') {
            path = format!("/{path}");
        }
        write!(
            f,
            "{}://{}{}",
            Self::escape(&self.scheme),
            Self::escape(&self.authority),
            Self::escape(&path)
        )?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

// Equality and hashing follow the canonical string form, matching the `Uri.__eq__`
// semantics in the reference implementation rather than a field-by-field
// comparison; two URIs that escape to the same string are the same resource.
impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
impl Eq for Uri {}

impl std::hash::Hash for Uri {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    pub fn start() -> Self {
        Self::new(0, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// An empty range at the given line, spanning the whole line (matches the
    /// reference implementation's `Position(line, 0).range`-then-extend idiom
    /// used whenever a diagnostic only knows a line number).
    pub fn whole_line(line: u32) -> Self {
        Self::new(Position::new(line, 0), Position::new(line, 99999))
    }

    pub fn single(pos: Position) -> Self {
        Self::new(pos, pos)
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos >= self.start && pos <= self.end
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub uri: Uri,
    pub range: Range,
}

impl Location {
    pub fn new(uri: Uri, range: Range) -> Self {
        Self { uri, range }
    }
}

impl From<Position> for tower_lsp::lsp_types::Position {
    fn from(p: Position) -> Self {
        tower_lsp::lsp_types::Position::new(p.line, p.character)
    }
}
impl From<tower_lsp::lsp_types::Position> for Position {
    fn from(p: tower_lsp::lsp_types::Position) -> Self {
        Position::new(p.line, p.character)
    }
}
impl From<Range> for tower_lsp::lsp_types::Range {
    fn from(r: Range) -> Self {
        tower_lsp::lsp_types::Range::new(r.start.into(), r.end.into())
    }
}
impl From<tower_lsp::lsp_types::Range> for Range {
    fn from(r: tower_lsp::lsp_types::Range) -> Self {
        Range::new(r.start.into(), r.end.into())
    }
}
impl From<Location> for tower_lsp::lsp_types::Location {
    fn from(l: Location) -> Self {
        tower_lsp::lsp_types::Location::new(l.uri.to_lsp_url(), l.range.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_uri_roundtrips() {
        let uri = Uri::file("/home/user/Kconfig");
        let text = uri.to_string();
        let parsed = Uri::parse(&text).unwrap();
        assert_eq!(uri, parsed);
        assert_eq!(parsed.path, "/home/user/Kconfig");
    }

    #[test]
    fn windows_drive_letter_is_normalized() {
        let uri = Uri::parse("file:///C:/foo/Kconfig").unwrap();
        assert_eq!(uri.path, "C:/foo/Kconfig");
    }

    #[test]
    fn equality_is_canonical_string_based() {
        let a = Uri::new("file", "", "/a/b", "", "");
        let b = Uri::parse(&a.to_string()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn basename_is_last_path_segment() {
        let uri = Uri::file("/a/b/prj.conf");
        assert_eq!(uri.basename(), "prj.conf");
    }

    #[test]
    fn range_overlap_and_contains() {
        let r = Range::new(Position::new(0, 0), Position::new(2, 0));
        assert!(r.contains(Position::new(1, 5)));
        assert!(!r.contains(Position::new(3, 0)));
        let other = Range::new(Position::new(1, 0), Position::new(5, 0));
        assert!(r.overlaps(&other));
    }
}
