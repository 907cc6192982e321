//! transcc CLI — stream Python-to-C++ translations and check them against
//! the original.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "transcc",
    version,
    about = "Translate Python to optimized C++ with a hosted model, then build, run and compare"
)]
struct Cli {
    /// Path to transcc.yaml (defaults apply when absent)
    #[arg(short, long, global = true, default_value = "transcc.yaml")]
    config: PathBuf,

    /// Debug logging on stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: transcc::cli::Commands,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("transcc=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = transcc::cli::dispatch(cli.command, &cli.config).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
