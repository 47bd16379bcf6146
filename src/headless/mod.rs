//! Headless match execution
//!
//! Runs combat scenarios without any presentation layer, suitable for
//! automated testing, balance sweeps, and replay verification.
//!
//! ## Usage
//!
//! ```bash
//! # Run a headless scenario
//! cargo run --release -- scenario.json --seed 42
//! ```
//!
//! ## JSON Configuration
//!
//! ```json
//! {
//!   "combatants": [
//!     { "team": 1, "position": [0.0, 0.0],
//!       "abilities": [{ "input": 1, "ability": "jab" }] },
//!     { "team": 2, "position": [0.0, 4.0],
//!       "abilities": [{ "input": 1, "ability": "jab" }] }
//!   ],
//!   "max_ticks": 9000,
//!   "random_seed": 42
//! }
//! ```

pub mod config;
pub mod runner;

pub use config::HeadlessScenarioConfig;
pub use runner::{run_headless_match, MatchReport};
