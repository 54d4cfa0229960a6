mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vit_burn=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    Cli::parse().run()
}
