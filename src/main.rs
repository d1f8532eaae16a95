use clap::Parser;
use tower_lsp::{LspService, Server};
use tracing::info;

use pike_language_server::config::CliOverrides;
use pike_language_server::logging::init_logger;
use pike_language_server::lsp::PikeBackend;

/// Language server for Pike, backed by an out-of-process Pike interpreter.
#[derive(Debug, Parser)]
#[command(name = "pike-language-server", version, about)]
struct Cli {
    /// Log level for stderr (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Disable ANSI colors in stderr output
    #[arg(long)]
    no_color: bool,

    /// Do not write a session log to the cache directory
    #[arg(long)]
    no_file_logging: bool,

    /// Pike interpreter executable
    #[arg(long, value_name = "PATH")]
    pike: Option<String>,

    /// Argument passed to the interpreter (repeatable, replaces the defaults)
    #[arg(long = "pike-arg", value_name = "ARG")]
    pike_args: Vec<String>,

    /// Per-call interpreter timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Minimum confidence for embedded markup regions, within [0, 1]
    #[arg(long)]
    confidence_floor: Option<f64>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            program: self.pike.clone(),
            args: (!self.pike_args.is_empty()).then(|| self.pike_args.clone()),
            timeout_ms: self.timeout_ms,
            confidence_floor: self.confidence_floor,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logger(cli.no_color, cli.log_level.as_deref(), !cli.no_file_logging)?;
    info!("Starting {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let overrides = cli.overrides();
    let (service, socket) = LspService::new(|client| PikeBackend::new(client, overrides));

    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;

    info!("Server stopped");
    Ok(())
}
