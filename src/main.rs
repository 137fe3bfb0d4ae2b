//! `pk` binary entry point: parse args, wire up logging, run the CLI.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pancake::cli::args::Cli;

fn init_logging(debug: bool) {
    let default_directive = if debug || std::env::var("PANCAKE_DEBUG").as_deref() == Ok("1") {
        "pancake=debug"
    } else {
        "pancake=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    match pancake::cli::run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::ExitCode::FAILURE
        }
    }
}
