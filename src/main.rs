use anyhow::Result;
use bankbook::cli::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.run().await
}

/// `RUST_LOG` wins; otherwise only warnings, or debug output with `--verbose`.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "bankbook=debug" } else { "bankbook=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
