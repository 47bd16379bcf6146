//! Command-line interface for brawlsim
//!
//! Runs headless combat scenarios from JSON files.

use clap::Parser;
use std::path::PathBuf;

/// Deterministic brawler combat simulator
#[derive(Parser, Debug)]
#[command(name = "brawlsim")]
#[command(about = "Deterministic brawler combat simulator")]
#[command(version)]
pub struct Args {
    /// Scenario JSON file to run
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Output path for the match report
    #[arg(long, value_name = "OUTPUT_PATH")]
    pub output: Option<PathBuf>,

    /// Override the scenario's random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the scenario's maximum tick count
    #[arg(long)]
    pub max_ticks: Option<u64>,
}

pub fn parse_args() -> Args {
    Args::parse()
}
