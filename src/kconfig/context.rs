#![allow(dead_code)]

//! One Kconfig build directory's live state: its environment, root file,
//! board/user conf files, the parsed symbol/menu graph, and the
//! diagnostics that graph produces. A server typically owns several of
//! these concurrently, one per `kconfig/addBuild` call.

use std::collections::HashMap;

use tower_lsp::lsp_types::Diagnostic as LspDiagnostic;
use tower_lsp::lsp_types::{CodeAction, DiagnosticSeverity};

use crate::ast::DiagSeverity;
use crate::kconfig::adapter;
use crate::kconfig::conf::{BoardConf, ConfFile};
use crate::kconfig::eval::Value;
use crate::kconfig::lint;
use crate::kconfig::symbols::{self, MenuNode, MenuNodeKind, SymbolTable};
use crate::uri::{Location, Position, Range, Uri};

pub const COMMAND_LINE: &str = "command-line";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Fresh,
    Parsing,
    Parsed,
    ParseFailed,
    Loading,
    Loaded,
    LoadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    MainMenu,
    Menu,
    Sym,
    Choice,
    Comment,
    Unknown,
}

impl NodeKind {
    fn as_str(self) -> &'static str {
        match self {
            NodeKind::MainMenu => "MAINMENU",
            NodeKind::Menu => "MENU",
            NodeKind::Sym => "SYM",
            NodeKind::Choice => "CHOICE",
            NodeKind::Comment => "COMMENT",
            NodeKind::Unknown => "UNKNOWN",
        }
    }
}

/// A menu-tree node flattened for O(1) id lookup, independent of the
/// recursive [`MenuNode`] shape `symbols::build` hands back.
pub struct FlatNode {
    pub id: String,
    pub kind: NodeKind,
    pub symbol: Option<String>,
    pub choice: Option<usize>,
    pub prompt: Option<String>,
    pub dep: Option<crate::ast::Expr>,
    pub location: Location,
    pub children: Vec<usize>,
    pub depth: u32,
    pub is_menuconfig: bool,
}

pub struct MenuItem {
    pub id: String,
    pub visible: bool,
    pub loc: Location,
    pub is_menu: bool,
    pub has_children: bool,
    pub depth: u32,
    pub prompt: Option<String>,
    pub help: Option<String>,
    pub kind: &'static str,
    pub symbol_type: Option<&'static str>,
    pub value: Option<String>,
    pub user_value: Option<String>,
    pub name: Option<String>,
    pub options: Option<Vec<String>>,
}

pub struct MenuSnapshot {
    pub name: Option<String>,
    pub id: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum SetError {
    #[error("no symbol by that name is defined in this context")]
    UnknownNode,
}

pub struct KconfigContext {
    pub build_uri: Uri,
    pub root_kconfig_path: Uri,
    pub env: HashMap<String, String>,
    pub board: Option<BoardConf>,
    pub user_conf_files: Vec<Uri>,
    pub version: u64,
    pub state: State,
    pub last_access: u64,
    pub modified: Vec<String>,

    table: Option<SymbolTable>,
    nodes: Vec<FlatNode>,
    by_id: HashMap<String, usize>,
    root_id: Option<String>,
    conf_files: Vec<ConfFile>,
    diagnostics_by_file: HashMap<String, Vec<LspDiagnostic>>,
    actions_by_file: HashMap<String, Vec<(Range, CodeAction)>>,
}

impl KconfigContext {
    pub fn new(
        build_uri: Uri,
        root_kconfig_path: Uri,
        env: HashMap<String, String>,
        board: Option<BoardConf>,
        user_conf_files: Vec<Uri>,
    ) -> Self {
        Self {
            build_uri,
            root_kconfig_path,
            env,
            board,
            user_conf_files,
            version: 0,
            state: State::Fresh,
            last_access: 0,
            modified: Vec::new(),
            table: None,
            nodes: Vec::new(),
            by_id: HashMap::new(),
            root_id: None,
            conf_files: Vec::new(),
            diagnostics_by_file: HashMap::new(),
            actions_by_file: HashMap::new(),
        }
    }

    pub fn invalidate(&mut self) {
        self.state = State::Fresh;
    }

    pub fn touch(&mut self, counter: u64) {
        self.last_access = counter;
    }

    /// Apply `env` to the process environment (the parser reads `environ`
    /// directly) then parse `root_kconfig_path` and everything it sources.
    /// Always increments `version`, win or lose.
    pub fn parse(&mut self) {
        self.state = State::Parsing;
        for (k, v) in &self.env {
            std::env::set_var(k, v);
        }

        self.version += 1;
        self.diagnostics_by_file.clear();
        self.actions_by_file.clear();
        self.nodes.clear();
        self.by_id.clear();

        let result = adapter::load(&self.root_kconfig_path, &self.env);
        for (uri_str, diags) in &result.diagnostics {
            let converted = diags.iter().map(to_lsp_diagnostic).collect::<Vec<_>>();
            self.diagnostics_by_file.entry(uri_str.clone()).or_default().extend(converted);
        }

        if !result.valid {
            self.state = State::ParseFailed;
            self.table = None;
            return;
        }

        let files: Vec<(Uri, String, crate::ast::KconfigFile)> = result
            .files
            .into_iter()
            .map(|f| (f.uri, f.text, f.file))
            .collect();
        let (table, root) = symbols::build(&self.root_kconfig_path, &files);
        self.table = Some(table);
        self.flatten(&root);
        self.state = State::Parsed;
    }

    fn flatten(&mut self, root: &MenuNode) {
        let mut counters = FlattenCounters::default();
        let id = self.flatten_node(root, &mut counters);
        self.root_id = Some(id);
    }

    fn flatten_node(&mut self, node: &MenuNode, counters: &mut FlattenCounters) -> String {
        let (kind, symbol, choice) = match &node.kind {
            MenuNodeKind::MainMenu => (NodeKind::MainMenu, None, None),
            MenuNodeKind::Menu => (NodeKind::Menu, None, None),
            MenuNodeKind::Symbol(name) => (NodeKind::Sym, Some(name.clone()), None),
            MenuNodeKind::Choice(idx) => (NodeKind::Choice, None, Some(*idx)),
            MenuNodeKind::Comment => (NodeKind::Comment, None, None),
        };

        let disambiguator = match kind {
            NodeKind::MainMenu => "0".to_string(),
            NodeKind::Menu => {
                let i = counters.menu;
                counters.menu += 1;
                i.to_string()
            }
            NodeKind::Sym => {
                let name = symbol.clone().unwrap();
                let i = *counters.sym_occurrence.entry(name.clone()).and_modify(|n| *n += 1).or_insert(0);
                format!("{name}@{i}")
            }
            NodeKind::Choice => {
                let idx = choice.unwrap();
                let i = *counters.choice_occurrence.entry(idx).and_modify(|n| *n += 1).or_insert(0);
                format!("{idx}@{i}")
            }
            NodeKind::Comment => {
                let i = counters.comment;
                counters.comment += 1;
                i.to_string()
            }
            NodeKind::Unknown => format!("{}@{}", node.location.uri.basename(), node.location.range.start.line),
        };

        let id = format!("{}@{}@{}", self.version, kind.as_str(), disambiguator);

        let mut is_menuconfig = false;
        if let (Some(name), Some(table)) = (&symbol, &self.table) {
            is_menuconfig = table.get(name).map(|s| s.is_menuconfig).unwrap_or(false);
        }

        let child_ids: Vec<usize> = node
            .children
            .iter()
            .map(|c| {
                let child_id = self.flatten_node(c, counters);
                *self.by_id.get(&child_id).unwrap()
            })
            .collect();

        let flat = FlatNode {
            id: id.clone(),
            kind,
            symbol,
            choice,
            prompt: node.prompt.clone(),
            dep: node.dep.clone(),
            location: node.location.clone(),
            children: child_ids,
            depth: node.depth,
            is_menuconfig,
        };
        let idx = self.nodes.len();
        self.nodes.push(flat);
        self.by_id.insert(id.clone(), idx);
        id
    }

    /// Load the board defconfig (replace-semantics, i.e. it seeds the
    /// table fresh) then every user conf file (merge-semantics, applied on
    /// top without clearing prior assignments), then lints the result.
    pub fn load_config(&mut self) {
        self.state = State::Loading;
        let Some(table) = &self.table else {
            self.state = State::LoadFailed;
            return;
        };

        let mut conf_files = Vec::new();
        if let Some(board) = &self.board {
            conf_files.push(ConfFile::load(&board.defconfig_uri()));
        }
        for uri in &self.user_conf_files {
            conf_files.push(ConfFile::load(uri));
        }

        for file in &conf_files {
            for entry in &file.entries {
                if table.get(&entry.name).is_some() {
                    let value = if table.get(&entry.name).unwrap().kind.is_tristate_like() {
                        crate::kconfig::eval::Tristate::from_str(&entry.value)
                            .map(Value::Tristate)
                            .unwrap_or_else(|| Value::Str(entry.value.clone()))
                    } else {
                        Value::Str(entry.value.clone())
                    };
                    table.set(&entry.name, value);
                }
            }
            let key = file.uri.to_string();
            for diag in &file.diagnostics {
                self.diagnostics_by_file.entry(key.clone()).or_default().push(to_lsp_diagnostic(diag));
            }
        }

        let linted = lint::lint(table, &conf_files);
        for item in linted {
            let key = item.uri.to_string();
            self.diagnostics_by_file.entry(key.clone()).or_default().push(item.diagnostic.clone());
            self.actions_by_file
                .entry(key)
                .or_default()
                .extend(item.actions.into_iter().map(|a| (item.diagnostic.range.into(), a)));
        }

        self.conf_files = conf_files;
        self.state = State::Loaded;
    }

    pub fn diagnostics_for(&self, uri_str: &str) -> Vec<LspDiagnostic> {
        self.diagnostics_by_file.get(uri_str).cloned().unwrap_or_default()
    }

    pub fn all_diagnostic_uris(&self) -> Vec<String> {
        self.diagnostics_by_file.keys().cloned().collect()
    }

    pub fn conf_files(&self) -> &[ConfFile] {
        &self.conf_files
    }

    pub fn references_conf(&self, uri: &Uri) -> bool {
        self.user_conf_files.contains(uri)
            || self.board.as_ref().map(|b| b.defconfig_uri() == *uri).unwrap_or(false)
    }

    pub fn code_actions_overlapping(&self, uri: &Uri, range: Range) -> Vec<CodeAction> {
        let Some(entries) = self.actions_by_file.get(&uri.to_string()) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|(r, _)| r.overlaps(&range))
            .map(|(_, a)| a.clone())
            .collect()
    }

    pub fn table(&self) -> Option<&SymbolTable> {
        self.table.as_ref()
    }

    pub fn get_menu(&self, id: Option<&str>, show_all: bool) -> Option<MenuSnapshot> {
        let root_id = id.map(|s| s.to_string()).or_else(|| self.root_id.clone())?;
        let (version_str, _, _) = split_id(&root_id)?;
        if version_str != self.version.to_string() {
            return None;
        }
        let idx = *self.by_id.get(&root_id)?;
        let node = &self.nodes[idx];

        let items = node
            .children
            .iter()
            .filter_map(|&child_idx| self.render_item(child_idx, show_all))
            .collect();

        Some(MenuSnapshot {
            name: node.prompt.clone(),
            id: node.id.clone(),
            items,
        })
    }

    fn render_item(&self, idx: usize, show_all: bool) -> Option<MenuItem> {
        let node = &self.nodes[idx];
        let table = self.table.as_ref();
        let visible = table.map(|t| self.node_visible(node, t)).unwrap_or(false);
        if !show_all && !visible && node.prompt.is_some() {
            return None;
        }

        let (kind, symbol_type, value, user_value, name, options) = match node.kind {
            NodeKind::Sym => {
                let name = node.symbol.clone().unwrap();
                let sym = table.and_then(|t| t.get(&name));
                let ty = sym.map(|s| s.kind.as_str());
                let val = table.map(|t| t.value_of(&name).as_string());
                let user = table.and_then(|t| t.user_value(&name)).map(|v| v.as_string());
                ("symbol", ty, val, user, Some(name), None)
            }
            NodeKind::Choice => {
                let opts = node.children.iter().filter_map(|&c| self.nodes[c].symbol.clone()).collect();
                ("choice", None, None, None, None, Some(opts))
            }
            NodeKind::Menu | NodeKind::MainMenu => ("menu", None, None, None, None, None),
            NodeKind::Comment => ("comment", None, None, None, None, None),
            NodeKind::Unknown => ("unknown", None, None, None, None, None),
        };

        Some(MenuItem {
            id: node.id.clone(),
            visible,
            loc: node.location.clone(),
            is_menu: matches!(node.kind, NodeKind::Menu | NodeKind::MainMenu),
            has_children: !node.children.is_empty(),
            depth: node.depth,
            prompt: node.prompt.clone(),
            help: node.symbol.as_ref().and_then(|n| table.and_then(|t| t.get(n)).and_then(|s| s.help.clone())),
            kind,
            symbol_type,
            value,
            user_value,
            name,
            options,
        })
    }

    fn node_visible(&self, node: &FlatNode, table: &SymbolTable) -> bool {
        if node.prompt.is_none() {
            return false;
        }
        match &node.dep {
            Some(e) => crate::kconfig::eval::eval_tristate(e, table) != crate::kconfig::eval::Tristate::N,
            None => true,
        }
    }

    pub fn symbols(&self, filter: &str) -> Vec<String> {
        let filter = filter.strip_prefix("CONFIG_").unwrap_or(filter);
        let Some(table) = &self.table else { return Vec::new() };
        table
            .symbols
            .values()
            .filter(|s| s.is_defined() && s.name.starts_with(filter))
            .map(|s| s.name.clone())
            .collect()
    }

    /// Every defined symbol matching `query`, in the shape `kconfig/search`
    /// hands back to a client: name, declared type, a representative
    /// prompt, current visibility, and help text.
    pub fn symbol_search(&self, query: &str) -> Vec<SymbolSearchResult> {
        let query = query.strip_prefix("CONFIG_").unwrap_or(query);
        let Some(table) = &self.table else { return Vec::new() };
        table
            .symbols
            .values()
            .filter(|s| s.is_defined() && s.name.contains(query))
            .map(|s| {
                let prompt = s
                    .prompts
                    .iter()
                    .find(|p| p.condition.as_ref().map_or(true, |c| crate::kconfig::eval::eval_tristate(c, table) != crate::kconfig::eval::Tristate::N))
                    .or_else(|| s.prompts.first())
                    .map(|p| p.text.clone());
                SymbolSearchResult {
                    name: s.name.clone(),
                    kind: s.kind.as_str(),
                    prompt,
                    visible: table.visible(&s.name),
                    help: s.help.clone(),
                }
            })
            .collect()
    }

    /// Resolve the word under `pos` in `uri` to a defined symbol name.
    /// A `Kconfig*` file's bare identifiers reference symbols directly; a
    /// `.conf` file's `CONFIG_`-prefixed words need the prefix stripped.
    pub fn symbol_at(&self, uri: &Uri, pos: Position) -> Option<String> {
        let doc = crate::document::DOCUMENTS.get(uri, true)?;
        let word = doc.word_at(pos);
        if word.is_empty() {
            return None;
        }
        let name = word.strip_prefix("CONFIG_").unwrap_or(&word);
        let table = self.table.as_ref()?;
        table.get(name).map(|_| name.to_string())
    }

    /// Assign `value` to `name`, recording it in `modified` the first time
    /// it's touched this session. Fails if `name` isn't a known symbol.
    pub fn set(&mut self, name: &str, value: crate::kconfig::eval::Value) -> Result<(), SetError> {
        let name = name.strip_prefix("CONFIG_").unwrap_or(name).to_string();
        let table = self.table.as_ref().ok_or(SetError::UnknownNode)?;
        if table.get(&name).is_none() {
            return Err(SetError::UnknownNode);
        }
        table.set(&name, value);
        if !self.modified.contains(&name) {
            self.modified.push(name);
        }
        Ok(())
    }

    /// Clear any user-assigned value for `name`, falling back to its
    /// computed default.
    pub fn unset(&mut self, name: &str) -> Result<(), SetError> {
        let name = name.strip_prefix("CONFIG_").unwrap_or(name).to_string();
        let table = self.table.as_ref().ok_or(SetError::UnknownNode)?;
        if table.get(&name).is_none() {
            return Err(SetError::UnknownNode);
        }
        table.unset(&name);
        if !self.modified.contains(&name) {
            self.modified.push(name);
        }
        Ok(())
    }
}

pub struct SymbolSearchResult {
    pub name: String,
    pub kind: &'static str,
    pub prompt: Option<String>,
    pub visible: bool,
    pub help: Option<String>,
}

#[derive(Default)]
struct FlattenCounters {
    menu: u32,
    comment: u32,
    sym_occurrence: HashMap<String, u32>,
    choice_occurrence: HashMap<usize, u32>,
}

fn split_id(id: &str) -> Option<(String, String, String)> {
    let mut parts = id.splitn(3, '@');
    let version = parts.next()?.to_string();
    let kind = parts.next()?.to_string();
    let rest = parts.next().unwrap_or("").to_string();
    Some((version, kind, rest))
}

fn to_lsp_diagnostic(d: &adapter::FileDiagnostic) -> LspDiagnostic {
    LspDiagnostic {
        range: d.range.into(),
        severity: Some(match d.severity {
            DiagSeverity::Error => DiagnosticSeverity::ERROR,
            DiagSeverity::Warning => DiagnosticSeverity::WARNING,
        }),
        source: Some("kconfig-lsp".into()),
        message: d.message.clone(),
        ..Default::default()
    }
}
