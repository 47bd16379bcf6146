//! JSON configuration parsing for headless mode
//!
//! Parses JSON scenario files and validates them before a match runs.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// One ability bound to an input slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityBinding {
    /// Input slot (1 = basic attack, 6 = ultimate)
    pub input: u8,
    /// Ability name as defined in the ability catalog
    pub ability: String,
}

/// One combatant in the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantConfig {
    /// Team identifier (combatants with the same team never target each other)
    pub team: u8,
    /// Starting position on the ground plane (x, z)
    pub position: [f32; 2],
    /// Bot-controlled combatants pick their own targets and abilities
    #[serde(default = "default_is_bot")]
    pub is_bot: bool,
    /// Equipped abilities, by input slot
    pub abilities: Vec<AbilityBinding>,
    /// Maximum health (default 100)
    #[serde(default = "default_max_health")]
    pub max_health: f32,
    /// Maximum energy for utility abilities (default 100)
    #[serde(default = "default_max_energy")]
    pub max_energy: f32,
    /// Cooldown reduction stat
    #[serde(default)]
    pub cdr: f32,
    /// Attack power stat
    #[serde(default)]
    pub attack_power: f32,
    /// Ability power stat
    #[serde(default)]
    pub ability_power: f32,
}

fn default_is_bot() -> bool {
    true
}

fn default_max_health() -> f32 {
    100.0
}

fn default_max_energy() -> f32 {
    100.0
}

/// Headless scenario configuration loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlessScenarioConfig {
    /// All combatants in the scenario
    pub combatants: Vec<CombatantConfig>,
    /// Maximum simulation ticks before declaring a draw (default 9000 = 5 min)
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Random seed for deterministic match reproduction.
    /// If provided, the same seed always produces the same report.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Custom output path for the match report (optional)
    #[serde(default)]
    pub output_path: Option<String>,
}

fn default_max_ticks() -> u64 {
    9000
}

impl HeadlessScenarioConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: HeadlessScenarioConfig = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.combatants.is_empty() {
            return Err("scenario needs at least one combatant".to_string());
        }

        for (index, combatant) in self.combatants.iter().enumerate() {
            if combatant.abilities.is_empty() {
                return Err(format!("combatant {} has no abilities equipped", index));
            }
            let mut inputs: Vec<u8> = combatant.abilities.iter().map(|b| b.input).collect();
            inputs.sort_unstable();
            inputs.dedup();
            if inputs.len() != combatant.abilities.len() {
                return Err(format!(
                    "combatant {} binds the same input slot twice",
                    index
                ));
            }
            if combatant.max_health <= 0.0 {
                return Err(format!("combatant {} has non-positive health", index));
            }
        }

        if self.max_ticks == 0 {
            return Err("max_ticks must be positive".to_string());
        }

        Ok(())
    }
}
