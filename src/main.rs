use std::io::Write;
use std::net::TcpListener;

use clap::Parser;
use tower_lsp::{LspService, Server};

use kconfig_lsp::server;

/// Kconfig/`.conf` language server for the Zephyr RTOS build system.
#[derive(Parser, Debug)]
#[command(name = "kconfig-lsp", version, about)]
struct Cli {
    /// Block until a debugger attaches on 127.0.0.1:5678 before starting.
    #[arg(long)]
    debug: bool,

    /// Write debug/info log lines to `lsp.log` in the working directory
    /// instead of stderr.
    #[arg(long)]
    log: bool,
}

const DEBUG_PORT: u16 = 5678;

fn wait_for_debugger() {
    let addr = ("127.0.0.1", DEBUG_PORT);
    match TcpListener::bind(addr) {
        Ok(listener) => {
            eprintln!("kconfig-lsp: waiting for debugger attach on 127.0.0.1:{DEBUG_PORT}");
            if let Ok((_stream, peer)) = listener.accept() {
                eprintln!("kconfig-lsp: debugger attached from {peer}");
            }
        }
        Err(e) => {
            eprintln!("kconfig-lsp: could not bind debug port {DEBUG_PORT}: {e}");
        }
    }
}

fn init_logging(log_to_file: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if log_to_file {
        if let Ok(file) = std::fs::File::create("lsp.log") {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
    }
    builder.init();
    let _ = std::io::stderr().flush();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log);

    if cli.debug {
        wait_for_debugger();
    }

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(server::Backend::new)
        .custom_method("kconfig/addBuild", server::Backend::add_build)
        .custom_method("kconfig/setMainBuild", server::Backend::set_main_build)
        .custom_method("kconfig/removeBuild", server::Backend::remove_build)
        .custom_method("kconfig/getMenu", server::Backend::get_menu)
        .custom_method("kconfig/search", server::Backend::search)
        .custom_method("kconfig/setVal", server::Backend::set_val)
        .finish();

    Server::new(stdin, stdout, socket).serve(service).await;
}
