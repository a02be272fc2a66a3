//! Command-line entry point

mod cmd;

use clap::Parser;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cmd::Cli::parse();
    cli.run();
}
