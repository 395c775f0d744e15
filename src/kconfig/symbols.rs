#![allow(dead_code)]

//! Flattens a parsed Kconfig tree (plus any `source`d sub-trees) into:
//!
//! - a symbol table keyed by name, aggregating every definition site of a
//!   symbol into one set of type/prompt/default/select/imply/range facts,
//!   and knowing how to compute each symbol's current value, and
//! - a menu-node tree mirroring the visual structure a config UI would show
//!   (menus, choices, comments and config entries nested as written).
//!
//! `if` blocks are spliced away during flattening: their condition is ANDed
//! into every attribute and every child node's own dependency rather than
//! surviving as a node of its own, matching how kconfiglib presents the
//! tree to its callers.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::ast::{Entry, Expr, KconfigFile, Span, TypeKind};
use crate::kconfig::eval::{self, Tristate, Value};
use crate::uri::{Location, Uri};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Bool,
    Tristate,
    String,
    Hex,
    Int,
    Unknown,
}

impl SymbolKind {
    pub fn from_type(k: TypeKind) -> Self {
        match k {
            TypeKind::Bool => SymbolKind::Bool,
            TypeKind::Tristate => SymbolKind::Tristate,
            TypeKind::String => SymbolKind::String,
            TypeKind::Hex => SymbolKind::Hex,
            TypeKind::Int => SymbolKind::Int,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Bool => "bool",
            SymbolKind::Tristate => "tristate",
            SymbolKind::String => "string",
            SymbolKind::Hex => "hex",
            SymbolKind::Int => "int",
            SymbolKind::Unknown => "unknown",
        }
    }

    pub fn is_tristate_like(self) -> bool {
        matches!(self, SymbolKind::Bool | SymbolKind::Tristate)
    }
}

#[derive(Debug, Clone)]
pub struct PromptDef {
    pub text: String,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct DefaultDef {
    pub value: Expr,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct SelectDef {
    pub target: String,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct RangeDef {
    pub low: Expr,
    pub high: Expr,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub is_menuconfig: bool,
    pub prompts: Vec<PromptDef>,
    pub defaults: Vec<DefaultDef>,
    pub selects: Vec<SelectDef>,
    pub implies: Vec<SelectDef>,
    pub ranges: Vec<RangeDef>,
    /// ANDed across every definition site's own `depends on` plus the
    /// enclosing `if`/`menu`/`choice` conditions at that site.
    pub direct_dep: Option<Expr>,
    pub locations: Vec<Location>,
    pub help: Option<String>,
}

impl Symbol {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: SymbolKind::Unknown,
            is_menuconfig: false,
            prompts: Vec::new(),
            defaults: Vec::new(),
            selects: Vec::new(),
            implies: Vec::new(),
            ranges: Vec::new(),
            direct_dep: None,
            locations: Vec::new(),
            help: None,
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.locations.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub id: usize,
    pub members: Vec<String>,
    pub prompts: Vec<PromptDef>,
    pub is_tristate: bool,
    pub condition: Option<Expr>,
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone)]
pub enum MenuNodeKind {
    Symbol(String),
    Choice(usize),
    Menu,
    Comment,
    MainMenu,
}

#[derive(Debug, Clone)]
pub struct MenuNode {
    pub kind: MenuNodeKind,
    pub prompt: Option<String>,
    /// Combined dependency for visibility purposes: `depends on` (or
    /// `visible if` for menus) ANDed with every enclosing `if` condition.
    pub dep: Option<Expr>,
    pub location: Location,
    pub children: Vec<MenuNode>,
    pub depth: u32,
}

pub struct SymbolTable {
    pub symbols: HashMap<String, Symbol>,
    pub choices: Vec<Choice>,
    /// Reverse index: target name -> selectors that name it.
    selected_by: HashMap<String, Vec<(String, Option<Expr>)>>,
    user_values: RefCell<HashMap<String, Value>>,
    resolving: RefCell<std::collections::HashSet<String>>,
}

impl SymbolTable {
    pub fn empty() -> Self {
        Self {
            symbols: HashMap::new(),
            choices: Vec::new(),
            selected_by: HashMap::new(),
            user_values: RefCell::new(HashMap::new()),
            resolving: RefCell::new(std::collections::HashSet::new()),
        }
    }

    pub fn set(&self, name: &str, value: Value) {
        self.user_values.borrow_mut().insert(name.to_string(), value);
    }

    pub fn unset(&self, name: &str) {
        self.user_values.borrow_mut().remove(name);
    }

    pub fn user_value(&self, name: &str) -> Option<Value> {
        self.user_values.borrow().get(name).cloned()
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Whether `name` currently has a prompt that is reachable (its
    /// enclosing dependency chain and its own prompt condition are both
    /// non-`n`).
    pub fn visible(&self, name: &str) -> bool {
        let Some(sym) = self.symbols.get(name) else {
            return false;
        };
        if sym.prompts.is_empty() {
            return false;
        }
        let dep = self.direct_dep_tristate(sym);
        if dep == Tristate::N {
            return false;
        }
        sym.prompts.iter().any(|p| match &p.condition {
            Some(c) => eval::eval_tristate(c, self) != Tristate::N,
            None => true,
        })
    }

    pub fn assignable(&self, name: &str) -> bool {
        self.symbols.contains_key(name) && self.visible(name)
    }

    fn direct_dep_tristate(&self, sym: &Symbol) -> Tristate {
        match &sym.direct_dep {
            Some(e) => eval::eval_tristate(e, self),
            None => Tristate::Y,
        }
    }

    fn default_tristate(&self, sym: &Symbol) -> Tristate {
        for d in &sym.defaults {
            let cond_ok = match &d.condition {
                Some(c) => eval::eval_tristate(c, self) != Tristate::N,
                None => true,
            };
            if cond_ok {
                return eval::eval_tristate(&d.value, self);
            }
        }
        // A symbol with no matching default but at least one `implies` still
        // gets a weak (overridable) suggested value; approximated here by
        // treating the first satisfied imply as a default of last resort.
        for i in &sym.implies {
            let cond_ok = match &i.condition {
                Some(c) => eval::eval_tristate(c, self) != Tristate::N,
                None => true,
            };
            if cond_ok {
                return Tristate::M;
            }
        }
        Tristate::N
    }

    fn default_string(&self, sym: &Symbol) -> String {
        for d in &sym.defaults {
            let cond_ok = match &d.condition {
                Some(c) => eval::eval_tristate(c, self) != Tristate::N,
                None => true,
            };
            if cond_ok {
                return eval::eval_string(&d.value, self);
            }
        }
        String::new()
    }

    fn select_force(&self, name: &str) -> Tristate {
        let Some(selectors) = self.selected_by.get(name) else {
            return Tristate::N;
        };
        let mut best = Tristate::N;
        for (selector, condition) in selectors {
            let cond_ok = match condition {
                Some(c) => eval::eval_tristate(c, self) != Tristate::N,
                None => true,
            };
            if !cond_ok {
                continue;
            }
            let selector_value = self.value_of(selector).as_tristate();
            best = best.max(selector_value);
        }
        best
    }

    /// Compute `name`'s current value, honoring user assignments (when
    /// visible), selects (which bypass the target's own dependency, a
    /// long-standing and intentional Kconfig quirk), and defaults.
    pub fn value_of(&self, name: &str) -> Value {
        if !self.resolving.borrow_mut().insert(name.to_string()) {
            // Dependency cycle: break it by reporting the symbol as unset.
            return Value::Tristate(Tristate::N);
        }
        let result = self.compute_value(name);
        self.resolving.borrow_mut().remove(name);
        result
    }

    fn compute_value(&self, name: &str) -> Value {
        let Some(sym) = self.symbols.get(name) else {
            return Value::Tristate(Tristate::N);
        };
        match sym.kind {
            SymbolKind::Bool | SymbolKind::Tristate => {
                let dep = self.direct_dep_tristate(sym);
                let base = match self.user_value(name) {
                    Some(v) if self.visible(name) => v.as_tristate().min(dep),
                    _ => self.default_tristate(sym).min(dep),
                };
                let forced = self.select_force(name);
                let mut v = base.max(forced);
                if sym.kind == SymbolKind::Bool && v == Tristate::M {
                    v = Tristate::Y;
                }
                Value::Tristate(v)
            }
            SymbolKind::String | SymbolKind::Hex | SymbolKind::Int => {
                match self.user_value(name) {
                    Some(v) if self.visible(name) => v,
                    _ => Value::Str(self.default_string(sym)),
                }
            }
            SymbolKind::Unknown => Value::Tristate(Tristate::N),
        }
    }
}

/// Build a symbol table and menu tree from a flat list of `(file_uri,
/// source_text, entries)` triples in `source` inclusion order — the caller
/// (the parser adapter) is responsible for resolving `source` directives
/// and handing back the fully expanded sequence. `source_text` is needed
/// only to translate each file's byte-offset spans into line/column
/// `Location`s.
pub fn build(root_uri: &Uri, files: &[(Uri, String, KconfigFile)]) -> (SymbolTable, MenuNode) {
    let mut table = SymbolTable::empty();
    let mut choices = Vec::new();
    let mut root_children = Vec::new();

    for (uri, source, file) in files {
        let index = crate::ast::LineIndex::new(source);
        let mut ctx = BuildCtx {
            table: &mut table,
            choices: &mut choices,
            uri,
            index: &index,
        };
        let nodes = ctx.flatten(&file.entries, None, 1);
        root_children.extend(nodes);
    }

    table.choices = choices;
    index_selects(&mut table);

    let root = MenuNode {
        kind: MenuNodeKind::MainMenu,
        prompt: Some("Main menu".to_string()),
        dep: None,
        location: Location::new(root_uri.clone(), crate::uri::Range::default()),
        children: root_children,
        depth: 0,
    };
    (table, root)
}

fn index_selects(table: &mut SymbolTable) {
    let mut map: HashMap<String, Vec<(String, Option<Expr>)>> = HashMap::new();
    for sym in table.symbols.values() {
        for s in &sym.selects {
            map.entry(s.target.clone())
                .or_default()
                .push((sym.name.clone(), s.condition.clone()));
        }
    }
    table.selected_by = map;
}

struct BuildCtx<'a> {
    table: &'a mut SymbolTable,
    choices: &'a mut Vec<Choice>,
    uri: &'a Uri,
    index: &'a crate::ast::LineIndex,
}

fn and_opt(a: Option<Expr>, b: Option<Expr>) -> Option<Expr> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Expr::And(Box::new(a), Box::new(b))),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

impl<'a> BuildCtx<'a> {
    fn loc(&self, span: Span) -> Location {
        let (start_line, start_col) = self.index.line_col(span.start);
        let (end_line, end_col) = self.index.line_col(span.end);
        let range = crate::uri::Range::new(
            crate::uri::Position::new(start_line, start_col),
            crate::uri::Position::new(end_line, end_col),
        );
        Location::new(self.uri.clone(), range)
    }

    fn flatten(&mut self, entries: &[Entry], enclosing: Option<Expr>, depth: u32) -> Vec<MenuNode> {
        let mut out = Vec::new();
        for entry in entries {
            match entry {
                Entry::If(if_entry) => {
                    let cond = and_opt(enclosing.clone(), Some(if_entry.condition.clone()));
                    out.extend(self.flatten(&if_entry.entries, cond, depth));
                }
                Entry::Config(cfg) | Entry::MenuConfig(cfg) => {
                    let is_menuconfig = matches!(entry, Entry::MenuConfig(_));
                    let node = self.config_entry(cfg, enclosing.clone(), is_menuconfig, depth);
                    out.push(node);
                }
                Entry::Choice(choice) => {
                    out.push(self.choice_entry(choice, enclosing.clone(), depth));
                }
                Entry::Comment(c) => {
                    let dep = and_opt(
                        enclosing.clone(),
                        c.attributes.iter().find_map(depends_expr),
                    );
                    out.push(MenuNode {
                        kind: MenuNodeKind::Comment,
                        prompt: Some(c.prompt.clone()),
                        dep,
                        location: self.loc(c.span),
                        children: Vec::new(),
                        depth,
                    });
                }
                Entry::Menu(menu) => {
                    let own_dep = menu
                        .attributes
                        .iter()
                        .find_map(depends_expr)
                        .or_else(|| menu.attributes.iter().find_map(visible_expr));
                    let dep = and_opt(enclosing.clone(), own_dep);
                    let children = self.flatten(&menu.entries, enclosing.clone(), depth + 1);
                    out.push(MenuNode {
                        kind: MenuNodeKind::Menu,
                        prompt: Some(menu.prompt.clone()),
                        dep,
                        location: self.loc(menu.span),
                        children,
                        depth,
                    });
                }
                Entry::MainMenu(mm) => {
                    out.push(MenuNode {
                        kind: MenuNodeKind::MainMenu,
                        prompt: Some(mm.prompt.clone()),
                        dep: enclosing.clone(),
                        location: self.loc(mm.span),
                        children: Vec::new(),
                        depth,
                    });
                }
                Entry::Source(_) => {
                    // Resolved and spliced in by the parser adapter before
                    // `build` ever sees the entry list.
                }
            }
        }
        out
    }

    fn config_entry(
        &mut self,
        cfg: &crate::ast::ConfigEntry,
        enclosing: Option<Expr>,
        is_menuconfig: bool,
        depth: u32,
    ) -> MenuNode {
        let loc = self.loc(cfg.span);
        let sym = self
            .table
            .symbols
            .entry(cfg.name.clone())
            .or_insert_with(|| Symbol::new(&cfg.name));
        sym.is_menuconfig |= is_menuconfig;
        sym.locations.push(loc);

        let mut own_dep: Option<Expr> = None;
        let mut prompt_text = None;

        for attr in &cfg.attributes {
            match attr {
                crate::ast::Attribute::Type(t) => {
                    sym.kind = SymbolKind::from_type(t.kind);
                    if let Some(p) = &t.prompt {
                        prompt_text = Some(p.text.clone());
                        sym.prompts.push(PromptDef {
                            text: p.text.clone(),
                            condition: p.condition.clone(),
                        });
                    }
                }
                crate::ast::Attribute::Prompt(p) => {
                    prompt_text = Some(p.text.clone());
                    sym.prompts.push(PromptDef {
                        text: p.text.clone(),
                        condition: p.condition.clone(),
                    });
                }
                crate::ast::Attribute::Default(d) => sym.defaults.push(DefaultDef {
                    value: d.value.clone(),
                    condition: d.condition.clone(),
                }),
                crate::ast::Attribute::DefType(d) => {
                    sym.kind = SymbolKind::from_type(d.kind);
                    sym.defaults.push(DefaultDef {
                        value: d.value.clone(),
                        condition: d.condition.clone(),
                    });
                }
                crate::ast::Attribute::DependsOn(d) => {
                    own_dep = Some(match own_dep {
                        Some(prev) => Expr::And(Box::new(prev), Box::new(d.expr.clone())),
                        None => d.expr.clone(),
                    });
                }
                crate::ast::Attribute::Select(s) => sym.selects.push(SelectDef {
                    target: s.symbol.clone(),
                    condition: s.condition.clone(),
                }),
                crate::ast::Attribute::Imply(s) => sym.implies.push(SelectDef {
                    target: s.symbol.clone(),
                    condition: s.condition.clone(),
                }),
                crate::ast::Attribute::Range(r) => sym.ranges.push(RangeDef {
                    low: r.low.clone(),
                    high: r.high.clone(),
                    condition: r.condition.clone(),
                }),
                crate::ast::Attribute::Help(h) => sym.help = Some(h.text.clone()),
                _ => {}
            }
        }

        sym.direct_dep = and_opt(sym.direct_dep.clone(), and_opt(enclosing.clone(), own_dep.clone()));

        let full_dep = and_opt(enclosing, own_dep);
        MenuNode {
            kind: MenuNodeKind::Symbol(cfg.name.clone()),
            prompt: prompt_text,
            dep: full_dep,
            location: self.loc(cfg.span),
            children: Vec::new(),
            depth,
        }
    }

    fn choice_entry(
        &mut self,
        choice: &crate::ast::ChoiceEntry,
        enclosing: Option<Expr>,
        depth: u32,
    ) -> MenuNode {
        let id = self.choices.len();
        let mut prompts = Vec::new();
        let mut is_tristate = false;
        let mut own_dep = None;
        for attr in &choice.attributes {
            match attr {
                crate::ast::Attribute::Prompt(p) => prompts.push(PromptDef {
                    text: p.text.clone(),
                    condition: p.condition.clone(),
                }),
                crate::ast::Attribute::Type(t) => {
                    is_tristate = t.kind == TypeKind::Tristate;
                    if let Some(p) = &t.prompt {
                        prompts.push(PromptDef {
                            text: p.text.clone(),
                            condition: p.condition.clone(),
                        });
                    }
                }
                crate::ast::Attribute::DependsOn(d) => {
                    own_dep = Some(match own_dep {
                        Some(prev) => Expr::And(Box::new(prev), Box::new(d.expr.clone())),
                        None => d.expr.clone(),
                    });
                }
                _ => {}
            }
        }
        let full_dep = and_opt(enclosing.clone(), own_dep);

        let mut members = Vec::new();
        let mut children = Vec::new();
        for entry in &choice.entries {
            if let Entry::Config(cfg) = entry {
                members.push(cfg.name.clone());
            }
            children.extend(self.flatten(std::slice::from_ref(entry), full_dep.clone(), depth + 1));
        }

        self.choices.push(Choice {
            id,
            members,
            prompts: prompts.clone(),
            is_tristate,
            condition: full_dep.clone(),
            locations: vec![self.loc(choice.span)],
        });

        MenuNode {
            kind: MenuNodeKind::Choice(id),
            prompt: prompts.first().map(|p| p.text.clone()),
            dep: full_dep,
            location: self.loc(choice.span),
            children,
            depth,
        }
    }
}

fn depends_expr(attr: &crate::ast::Attribute) -> Option<Expr> {
    match attr {
        crate::ast::Attribute::DependsOn(d) => Some(d.expr.clone()),
        _ => None,
    }
}

fn visible_expr(attr: &crate::ast::Attribute) -> Option<Expr> {
    match attr {
        crate::ast::Attribute::VisibleIf(v) => Some(v.expr.clone()),
        _ => None,
    }
}
