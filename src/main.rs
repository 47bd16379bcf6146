//! brawlsim - Deterministic Top-Down Brawler Combat Simulation
//!
//! Runs a headless combat scenario and prints the match report.

use brawlsim::cli;
use brawlsim::headless::{run_headless_match, HeadlessScenarioConfig};

fn main() {
    let args = cli::parse_args();

    let mut config = match HeadlessScenarioConfig::load_from_file(&args.scenario) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Failed to load scenario: {}", error);
            std::process::exit(1);
        }
    };

    if let Some(seed) = args.seed {
        config.random_seed = Some(seed);
    }
    if let Some(max_ticks) = args.max_ticks {
        config.max_ticks = max_ticks;
    }
    if let Some(output) = &args.output {
        config.output_path = Some(output.display().to_string());
    }

    match run_headless_match(&config) {
        Ok(report) => {
            match report.winner {
                Some(team) => println!(
                    "Team {} wins after {:.1}s ({} ticks)",
                    team, report.match_time, report.ticks
                ),
                None => println!(
                    "Draw after {:.1}s ({} ticks)",
                    report.match_time, report.ticks
                ),
            }
            for (index, combatant) in report.combatants.iter().enumerate() {
                println!(
                    "  #{} team {}: {} ({:.0} hp, {} abilities used)",
                    index,
                    combatant.team,
                    if combatant.survived { "alive" } else { "down" },
                    combatant.final_health,
                    combatant.abilities_used
                );
            }
        }
        Err(error) => {
            eprintln!("Match failed: {}", error);
            std::process::exit(1);
        }
    }
}
