//! Kconfig/`.conf` language server library for the Zephyr RTOS build
//! system. `src/main.rs` is a thin binary wrapper around [`server::Backend`];
//! everything else lives here so integration tests can exercise the parser,
//! the symbol/menu graph, and the linter directly.

pub mod ast;
pub mod document;
pub mod handlers;
pub mod kconfig;
pub mod lexer;
pub mod parser;
pub mod server;
pub mod snippet;
pub mod uri;
