//! Factory Plan CLI
//!
//! Usage:
//!   factory-plan normalize -i raw.xlsx -o history.csv
//!   factory-plan forecast  -i history.csv -o forecast.csv -c 3 -m exponential
//!   factory-plan allocate  -i forecast.csv -o plan.csv --params params.json

mod assembler;
mod cli;
mod commands;
mod logging;
mod normalize;
mod table;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Normalize(args) => commands::normalize(args),
        Commands::Forecast(args) => commands::forecast(args),
        Commands::Allocate(args) => commands::allocate(args),
    }
}
