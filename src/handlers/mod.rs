//! One module per `textDocument/*`/`workspace/*` request the server answers,
//! each a thin, synchronous translation from a [`crate::kconfig::context::KconfigContext`]
//! query into the `lsp_types` shape the client expects. `Backend` in
//! `server.rs` is the only caller; these free functions exist to keep that
//! file to request dispatch and context bookkeeping.

pub mod code_action;
pub mod completion;
pub mod definition;
pub mod document_symbol;
pub mod hover;
pub mod workspace_symbol;
