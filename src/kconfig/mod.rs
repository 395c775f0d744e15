//! Everything that understands Kconfig semantics: turning a parsed tree into
//! a symbol/menu graph, evaluating tristate expressions, tracking one build
//! directory's live configuration, and linting it.

pub mod adapter;
pub mod conf;
pub mod context;
pub mod eval;
pub mod lint;
pub mod symbols;

pub use context::KconfigContext;
