//! The `Backend` implementation: LSP lifecycle, notification routing, and
//! the custom `kconfig/*` methods, all operating on a registry of
//! [`KconfigContext`]s rather than a single global index.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tower_lsp::jsonrpc::{Error as RpcError, ErrorCode, Result as RpcResult};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::document::{TextDocument, DOCUMENTS};
use crate::handlers;
use crate::kconfig::conf::BoardConf;
use crate::kconfig::context::{self, KconfigContext, SetError};
use crate::kconfig::eval::{Tristate, Value};
use crate::uri::{Range as KRange, Uri};

pub struct Backend {
    client: Client,
    contexts: DashMap<String, Mutex<KconfigContext>>,
    main_uri: Mutex<Option<String>>,
    access_counter: AtomicU64,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            contexts: DashMap::new(),
            main_uri: Mutex::new(None),
            access_counter: AtomicU64::new(0),
        }
    }

    fn next_access(&self) -> u64 {
        self.access_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn is_conf_uri(uri: &Uri) -> bool {
        let name = uri.basename();
        name.ends_with(".conf") || name.ends_with("_defconfig")
    }

    fn touch(&self, key: &str) {
        if let Some(entry) = self.contexts.get(key) {
            entry.lock().unwrap().touch(self.next_access());
        }
    }

    /// §4.5 `best_ctx`: the main context, unless `uri` is a `.conf` file it
    /// doesn't reference, in which case fall back to whichever context
    /// does — or, failing that, the most recently accessed context.
    fn best_ctx(&self, uri: &Uri) -> Option<String> {
        let main = self.main_uri.lock().unwrap().clone();
        if let Some(main_key) = &main {
            if let Some(entry) = self.contexts.get(main_key) {
                let ctx = entry.lock().unwrap();
                if !Self::is_conf_uri(uri) || ctx.references_conf(uri) {
                    drop(ctx);
                    self.touch(main_key);
                    return Some(main_key.clone());
                }
            }
        }

        let mut best: Option<(String, u64)> = None;
        for entry in self.contexts.iter() {
            let ctx = entry.value().lock().unwrap();
            let eligible = !Self::is_conf_uri(uri) || ctx.references_conf(uri);
            if eligible && best.as_ref().map_or(true, |(_, t)| ctx.last_access > *t) {
                best = Some((entry.key().clone(), ctx.last_access));
            }
        }
        let key = best.map(|(k, _)| k)?;
        self.touch(&key);
        Some(key)
    }

    /// §4.5 `get_ctx`: explicit id, else main, else most-recently-accessed.
    fn get_ctx(&self, id: Option<&str>) -> Option<String> {
        if let Some(id) = id {
            if self.contexts.contains_key(id) {
                self.touch(id);
                return Some(id.to_string());
            }
        }
        if let Some(main) = self.main_uri.lock().unwrap().clone() {
            if self.contexts.contains_key(&main) {
                self.touch(&main);
                return Some(main);
            }
        }
        let key = self.most_recent_ctx()?;
        self.touch(&key);
        Some(key)
    }

    fn most_recent_ctx(&self) -> Option<String> {
        let mut best: Option<(String, u64)> = None;
        for entry in self.contexts.iter() {
            let last = entry.value().lock().unwrap().last_access;
            if best.as_ref().map_or(true, |(_, t)| last > *t) {
                best = Some((entry.key().clone(), last));
            }
        }
        best.map(|(k, _)| k)
    }

    /// Reparse and reload `key` if it hasn't been parsed since the last
    /// invalidation, then publish whatever diagnostics that produced.
    async fn ensure_ready(&self, key: &str) {
        let stale = self
            .contexts
            .get(key)
            .map(|e| matches!(e.lock().unwrap().state, context::State::Fresh))
            .unwrap_or(false);
        if stale {
            self.refresh(key).await;
        }
    }

    async fn refresh(&self, key: &str) {
        {
            let Some(entry) = self.contexts.get(key) else { return };
            let mut ctx = entry.lock().unwrap();
            ctx.parse();
            if matches!(ctx.state, context::State::Parsed) {
                ctx.load_config();
            }
        }
        self.publish_diagnostics(key).await;
    }

    /// §4.5 publish-diagnostics contract: every conf file (board defconfig
    /// included), the synthetic `command-line` bucket, and every
    /// Kconfig-source file that accumulated a warning.
    async fn publish_diagnostics(&self, key: &str) {
        let Some(entry) = self.contexts.get(key) else { return };
        let uris = entry.lock().unwrap().all_diagnostic_uris();
        let batches: Vec<(String, Vec<Diagnostic>)> = uris
            .into_iter()
            .map(|u| {
                let diags = entry.lock().unwrap().diagnostics_for(&u);
                (u, diags)
            })
            .collect();
        drop(entry);

        for (uri_str, diags) in batches {
            if uri_str == context::COMMAND_LINE {
                // No addressable document exists for this bucket; nothing to
                // publish it against over `textDocument/publishDiagnostics`.
                continue;
            }
            if let Some(uri) = Uri::parse(&uri_str) {
                self.client.publish_diagnostics(uri.to_lsp_url(), diags, None).await;
            }
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _params: InitializeParams) -> RpcResult<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::INCREMENTAL)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec!["_".into()]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        log::info!("kconfig-lsp initialized");

        let watch = |glob: &str| FileSystemWatcher {
            glob_pattern: GlobPattern::String(glob.to_string()),
            kind: Some(WatchKind::Create | WatchKind::Change | WatchKind::Delete),
        };
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: vec![watch("**/Kconfig*"), watch("**/edt.pickle")],
        };
        let registration = Registration {
            id: "kconfig-lsp-watch".into(),
            method: "workspace/didChangeWatchedFiles".into(),
            register_options: serde_json::to_value(options).ok(),
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            log::warn!("failed to register file watchers: {e}");
        }
    }

    async fn shutdown(&self) -> RpcResult<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = Uri::from_lsp_url(&params.text_document.uri);
        let doc = TextDocument::with_text(uri, &params.text_document.text, params.text_document.version);
        DOCUMENTS.open(doc);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = Uri::from_lsp_url(&params.text_document.uri);
        for change in params.content_changes {
            DOCUMENTS.replace(&uri, &change.text, change.range.map(KRange::from));
        }
        // A Kconfig edit needs a reparse, a `.conf` edit needs a relint —
        // either way the most-recently-touched context is the one whose
        // view of the world this edit is most likely to affect.
        if let Some(key) = self.most_recent_ctx() {
            self.refresh(&key).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = Uri::from_lsp_url(&params.text_document.uri);
        DOCUMENTS.close(&uri);
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for change in params.changes {
            let uri = Uri::from_lsp_url(&change.uri);
            let basename = uri.basename();
            if basename.starts_with("Kconfig") {
                for entry in self.contexts.iter() {
                    entry.value().lock().unwrap().invalidate();
                }
            } else if basename == "edt.pickle" {
                if let Some(build) = uri.to_string().strip_suffix("/zephyr/edt.pickle") {
                    if let Some(entry) = self.contexts.get(build) {
                        entry.lock().unwrap().invalidate();
                    }
                }
            }
        }
        if let Some(key) = self.main_uri.lock().unwrap().clone() {
            self.refresh(&key).await;
        }
    }

    async fn hover(&self, params: HoverParams) -> RpcResult<Option<Hover>> {
        let uri = Uri::from_lsp_url(&params.text_document_position_params.text_document.uri);
        let pos = params.text_document_position_params.position.into();
        let Some(key) = self.best_ctx(&uri) else { return Ok(None) };
        self.ensure_ready(&key).await;
        let Some(entry) = self.contexts.get(&key) else { return Ok(None) };
        let ctx = entry.lock().unwrap();
        Ok(handlers::hover::hover(&ctx, &uri, pos))
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> RpcResult<Option<GotoDefinitionResponse>> {
        let uri = Uri::from_lsp_url(&params.text_document_position_params.text_document.uri);
        let pos = params.text_document_position_params.position.into();
        let Some(key) = self.best_ctx(&uri) else { return Ok(None) };
        self.ensure_ready(&key).await;
        let Some(entry) = self.contexts.get(&key) else { return Ok(None) };
        let ctx = entry.lock().unwrap();
        Ok(handlers::definition::definition(&ctx, &uri, pos))
    }

    async fn completion(&self, params: CompletionParams) -> RpcResult<Option<CompletionResponse>> {
        let uri = Uri::from_lsp_url(&params.text_document_position.text_document.uri);
        let pos = params.text_document_position.position.into();
        let Some(key) = self.best_ctx(&uri) else { return Ok(None) };
        self.ensure_ready(&key).await;
        let Some(entry) = self.contexts.get(&key) else { return Ok(None) };
        let ctx = entry.lock().unwrap();
        Ok(handlers::completion::complete(&ctx, &uri, pos))
    }

    async fn document_symbol(&self, params: DocumentSymbolParams) -> RpcResult<Option<DocumentSymbolResponse>> {
        let uri = Uri::from_lsp_url(&params.text_document.uri);
        let Some(key) = self.best_ctx(&uri) else { return Ok(None) };
        self.ensure_ready(&key).await;
        let Some(entry) = self.contexts.get(&key) else { return Ok(None) };
        let ctx = entry.lock().unwrap();
        Ok(handlers::document_symbol::document_symbols(&ctx, &uri))
    }

    async fn symbol(&self, params: WorkspaceSymbolParams) -> RpcResult<Option<Vec<SymbolInformation>>> {
        let Some(key) = self.get_ctx(None) else { return Ok(None) };
        self.ensure_ready(&key).await;
        let Some(entry) = self.contexts.get(&key) else { return Ok(None) };
        let ctx = entry.lock().unwrap();
        Ok(Some(handlers::workspace_symbol::workspace_symbols(&ctx, &params.query)))
    }

    async fn code_action(&self, params: CodeActionParams) -> RpcResult<Option<CodeActionResponse>> {
        let uri = Uri::from_lsp_url(&params.text_document.uri);
        let range = KRange::from(params.range);
        let Some(key) = self.best_ctx(&uri) else { return Ok(None) };
        self.ensure_ready(&key).await;
        let Some(entry) = self.contexts.get(&key) else { return Ok(None) };
        let ctx = entry.lock().unwrap();
        Ok(Some(handlers::code_action::code_actions(&ctx, &uri, range)))
    }
}

// -- custom `kconfig/*` methods ------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBuildParams {
    uri: String,
    root: String,
    #[serde(default)]
    conf: Vec<String>,
    #[serde(default)]
    env: std::collections::HashMap<String, String>,
}

#[derive(Serialize)]
pub struct IdResult {
    id: String,
}

#[derive(Deserialize)]
pub struct UriParams {
    uri: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetMenuOptions {
    #[serde(default)]
    show_all: bool,
}

#[derive(Deserialize)]
pub struct GetMenuParams {
    #[serde(default)]
    ctx: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    options: Option<GetMenuOptions>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemJson {
    id: String,
    visible: bool,
    loc: Location,
    is_menu: bool,
    has_children: bool,
    depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<String>,
    kind: &'static str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    symbol_type: Option<&'static str>,
    #[serde(rename = "val", skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
}

impl From<context::MenuItem> for MenuItemJson {
    fn from(item: context::MenuItem) -> Self {
        MenuItemJson {
            id: item.id,
            visible: item.visible,
            loc: item.loc.into(),
            is_menu: item.is_menu,
            has_children: item.has_children,
            depth: item.depth,
            prompt: item.prompt,
            help: item.help,
            kind: item.kind,
            symbol_type: item.symbol_type,
            value: item.value,
            user_value: item.user_value,
            name: item.name,
            options: item.options,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSnapshotJson {
    name: Option<String>,
    id: String,
    items: Vec<MenuItemJson>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    ctx: Option<String>,
    query: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolSearchResultJson {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<String>,
}

impl From<context::SymbolSearchResult> for SymbolSearchResultJson {
    fn from(r: context::SymbolSearchResult) -> Self {
        SymbolSearchResultJson {
            name: r.name,
            kind: r.kind,
            prompt: r.prompt,
            visible: r.visible,
            help: r.help,
        }
    }
}

#[derive(Serialize)]
pub struct SearchResult {
    ctx: String,
    query: String,
    symbols: Vec<SymbolSearchResultJson>,
}

#[derive(Deserialize)]
pub struct SetValParams {
    #[serde(default)]
    ctx: Option<String>,
    name: String,
    #[serde(default)]
    val: Option<String>,
}

fn unknown_ctx_error() -> RpcError {
    RpcError {
        code: ErrorCode::ServerError(2),
        message: "no matching kconfig context".into(),
        data: None,
    }
}

fn unknown_node_error() -> RpcError {
    RpcError {
        code: ErrorCode::ServerError(1),
        message: "no such symbol".into(),
        data: None,
    }
}

impl Backend {
    pub async fn add_build(&self, params: AddBuildParams) -> RpcResult<IdResult> {
        let build_uri = Uri::parse(&params.uri).ok_or_else(unknown_ctx_error)?;
        let root = Uri::parse(&params.root).ok_or_else(unknown_ctx_error)?;
        let conf_files: Vec<Uri> = params.conf.iter().filter_map(|s| Uri::parse(s)).collect();

        let board = match (params.env.get("BOARD"), params.env.get("ARCH"), params.env.get("BOARD_DIR")) {
            (Some(board), Some(arch), Some(dir)) => Some(BoardConf::new(board.clone(), arch.clone(), dir.clone())),
            _ => None,
        };

        let id = build_uri.to_string();
        let ctx = KconfigContext::new(build_uri, root, params.env, board, conf_files);
        self.contexts.insert(id.clone(), Mutex::new(ctx));

        let is_main = self.main_uri.lock().unwrap().as_deref() == Some(id.as_str());
        if is_main {
            self.refresh(&id).await;
        }

        Ok(IdResult { id })
    }

    pub async fn set_main_build(&self, params: UriParams) -> RpcResult<()> {
        let build_uri = Uri::parse(&params.uri).ok_or_else(unknown_ctx_error)?;
        let id = build_uri.to_string();
        *self.main_uri.lock().unwrap() = Some(id.clone());
        if self.contexts.contains_key(&id) {
            self.refresh(&id).await;
        }
        Ok(())
    }

    pub async fn remove_build(&self, params: UriParams) -> RpcResult<()> {
        let build_uri = Uri::parse(&params.uri).ok_or_else(unknown_ctx_error)?;
        let id = build_uri.to_string();
        self.contexts.remove(&id);
        let mut main = self.main_uri.lock().unwrap();
        if main.as_deref() == Some(id.as_str()) {
            *main = None;
        }
        Ok(())
    }

    pub async fn get_menu(&self, params: GetMenuParams) -> RpcResult<Option<MenuSnapshotJson>> {
        let Some(key) = self.get_ctx(params.ctx.as_deref()) else { return Ok(None) };
        self.ensure_ready(&key).await;
        let Some(entry) = self.contexts.get(&key) else { return Ok(None) };
        let ctx = entry.lock().unwrap();
        let show_all = params.options.map(|o| o.show_all).unwrap_or(false);
        let snapshot = ctx.get_menu(params.id.as_deref(), show_all);
        Ok(snapshot.map(|s| MenuSnapshotJson {
            name: s.name,
            id: s.id,
            items: s.items.into_iter().map(Into::into).collect(),
        }))
    }

    pub async fn search(&self, params: SearchParams) -> RpcResult<SearchResult> {
        let Some(key) = self.get_ctx(params.ctx.as_deref()) else {
            return Err(unknown_ctx_error());
        };
        self.ensure_ready(&key).await;
        let entry = self.contexts.get(&key).ok_or_else(unknown_ctx_error)?;
        let ctx = entry.lock().unwrap();
        let symbols = ctx.symbol_search(&params.query).into_iter().map(Into::into).collect();
        Ok(SearchResult { ctx: key, query: params.query, symbols })
    }

    pub async fn set_val(&self, params: SetValParams) -> RpcResult<()> {
        let Some(key) = self.get_ctx(params.ctx.as_deref()) else {
            return Err(unknown_ctx_error());
        };
        self.ensure_ready(&key).await;
        let entry = self.contexts.get(&key).ok_or_else(unknown_ctx_error)?;
        let mut ctx = entry.lock().unwrap();

        let result = match params.val {
            Some(val) => {
                let value = Tristate::from_str(&val).map(Value::Tristate).unwrap_or(Value::Str(val));
                ctx.set(&params.name, value)
            }
            None => ctx.unset(&params.name),
        };
        drop(ctx);
        drop(entry);

        match result {
            Ok(()) => {
                self.publish_diagnostics(&key).await;
                Ok(())
            }
            Err(SetError::UnknownNode) => Err(unknown_node_error()),
        }
    }
}
