use clap::Parser;
use strest::cli::{run_cli, Cli};
use strest::logging::{init_logging, LogConfig};

fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env())?;
    run_cli(Cli::parse())
}
