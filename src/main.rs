use anyhow::Result;
use clap::Parser;

use sortition::cli::{run_cli, Args};

fn main() -> Result<()> {
    let args = Args::parse();
    run_cli(args)
}
