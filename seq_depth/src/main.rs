mod accumulator;
mod cli;
mod config;
mod input;
mod output;
mod process;
mod record;
mod region;
mod report;
mod sink;
mod worker;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    let cfg = cli::handle_cli()
        .with_context(|| "Error processing command line arguments (use --help for usage)")?;
    process::process_samples(&cfg)
}
