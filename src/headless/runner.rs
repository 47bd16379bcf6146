//! Headless match execution
//!
//! Builds the simulation app, spawns the scenario's combatants, steps the
//! fixed-tick schedule to completion, and produces a match report.

use bevy::prelude::*;
use serde::Serialize;

use crate::combat::log::CombatLog;
use crate::combat::CombatPlugin;
use crate::sim::ability_config::{load_ability_catalog, AbilityCatalog};
use crate::sim::components::{
    AbilityInventory, Bot, BrushUser, Controller, EffectHandler, Energy, GameRng, Health,
    ItemInventory, MatchInfo, Mount, Playable, PlayerStats, Profile, SimClock, Stealth, Team,
};
use crate::sim::lifecycle::equip_abilities;
use crate::sim::SimPlugin;

use super::config::HeadlessScenarioConfig;

/// Result of a completed headless match.
///
/// Serializable so scenario sweeps and replay checks can diff reports.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    /// Ticks actually simulated
    pub ticks: u64,
    /// Simulated seconds at match end
    pub match_time: f32,
    /// Winning team, or None for a draw/timeout
    pub winner: Option<u8>,
    /// Random seed used (if deterministic mode)
    pub random_seed: Option<u64>,
    /// Per-combatant results, in spawn order
    pub combatants: Vec<CombatantReport>,
}

/// Statistics for a single combatant after the match
#[derive(Debug, Clone, Serialize)]
pub struct CombatantReport {
    pub team: u8,
    pub survived: bool,
    pub final_health: f32,
    pub abilities_used: u32,
}

/// Run a headless match to completion.
pub fn run_headless_match(config: &HeadlessScenarioConfig) -> Result<MatchReport, String> {
    config.validate()?;

    let catalog = load_ability_catalog()?;
    run_headless_match_with_catalog(config, catalog)
}

/// Run a headless match with an explicit catalog (tests inject fixtures
/// here instead of reading assets from disk).
pub fn run_headless_match_with_catalog(
    config: &HeadlessScenarioConfig,
    catalog: AbilityCatalog,
) -> Result<MatchReport, String> {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins((SimPlugin, CombatPlugin));

    let game_rng = match config.random_seed {
        Some(seed) => {
            info!("Using deterministic RNG with seed: {}", seed);
            GameRng::from_seed(seed)
        }
        None => {
            info!("Using non-deterministic RNG (no seed provided)");
            GameRng::from_entropy()
        }
    };
    app.insert_resource(game_rng);
    app.insert_resource(catalog);

    let spawned = spawn_combatants(app.world_mut(), config)?;

    // Bots lock the nearest enemy as their target for the whole match.
    assign_bot_targets(app.world_mut(), &spawned);

    let mut ticks = 0;
    let mut winner = None;
    for _ in 0..config.max_ticks {
        app.update();
        ticks += 1;

        if let Some(result) = check_match_end(app.world_mut(), &spawned) {
            winner = result;
            break;
        }
    }

    let world = app.world_mut();
    let match_time = world.resource::<SimClock>().time;

    let combatants = spawned
        .iter()
        .map(|(entity, team)| {
            let health = world.get::<Health>(*entity);
            CombatantReport {
                team: *team,
                survived: health.map(|h| h.is_alive()).unwrap_or(false),
                final_health: health.map(|h| h.current).unwrap_or(0.0),
                abilities_used: world
                    .get::<PlayerStats>(*entity)
                    .map(|s| s.abilities_used)
                    .unwrap_or(0),
            }
        })
        .collect();

    let report = MatchReport {
        ticks,
        match_time,
        winner,
        random_seed: config.random_seed,
        combatants,
    };

    if let Some(path) = &config.output_path {
        write_report(world, &report, path)?;
    }

    Ok(report)
}

fn spawn_combatants(
    world: &mut World,
    config: &HeadlessScenarioConfig,
) -> Result<Vec<(Entity, u8)>, String> {
    let mut spawned = Vec::new();

    for combatant in &config.combatants {
        let entity = world
            .spawn((
                Transform::from_xyz(combatant.position[0], 0.0, combatant.position[1]),
                Controller::default(),
                Health::new(combatant.max_health),
                Energy::new(combatant.max_energy),
                Team {
                    team: combatant.team,
                },
                Profile {
                    cdr: combatant.cdr,
                    attack_power: combatant.attack_power,
                    ability_power: combatant.ability_power,
                    ..Default::default()
                },
                Playable {
                    is_bot: combatant.is_bot,
                    ..Default::default()
                },
                AbilityInventory::default(),
                PlayerStats::default(),
                ItemInventory::default(),
                EffectHandler::default(),
                Stealth::default(),
                BrushUser::default(),
                Mount::default(),
            ))
            .id();

        if combatant.is_bot {
            world.entity_mut(entity).insert(Bot::default());
        }

        let bindings: Vec<(u8, crate::sim::abilities::AbilityId)> = {
            let catalog = world.resource::<AbilityCatalog>();
            combatant
                .abilities
                .iter()
                .map(|binding| {
                    catalog
                        .id_of(&binding.ability)
                        .map(|id| (binding.input, id))
                        .ok_or_else(|| format!("unknown ability '{}'", binding.ability))
                })
                .collect::<Result<_, _>>()?
        };
        equip_abilities(world, entity, &bindings);

        spawned.push((entity, combatant.team));
    }

    let participants: Vec<Entity> = spawned.iter().map(|(entity, _)| *entity).collect();
    world.resource_mut::<MatchInfo>().participants = participants;

    info!("Headless match setup complete: {} combatants", spawned.len());
    Ok(spawned)
}

fn assign_bot_targets(world: &mut World, spawned: &[(Entity, u8)]) {
    for (entity, team) in spawned {
        if world.get::<Bot>(*entity).is_none() {
            continue;
        }
        let my_pos = world
            .get::<Transform>(*entity)
            .map(|t| t.translation)
            .unwrap_or_default();

        let target = spawned
            .iter()
            .filter(|(other, other_team)| other != entity && other_team != team)
            .min_by(|(a, _), (b, _)| {
                let da = world
                    .get::<Transform>(*a)
                    .map(|t| t.translation.distance(my_pos))
                    .unwrap_or(f32::MAX);
                let db = world
                    .get::<Transform>(*b)
                    .map(|t| t.translation.distance(my_pos))
                    .unwrap_or(f32::MAX);
                da.partial_cmp(&db).unwrap()
            })
            .map(|(other, _)| *other);

        if let Some(mut bot) = world.get_mut::<Bot>(*entity) {
            bot.target = target;
        }
    }
}

/// A match ends when at most one team still has a living member.
/// Returns None while the match is still running.
fn check_match_end(world: &mut World, spawned: &[(Entity, u8)]) -> Option<Option<u8>> {
    let mut alive_teams: Vec<u8> = spawned
        .iter()
        .filter(|(entity, _)| {
            world
                .get::<Health>(*entity)
                .map(|h| h.is_alive())
                .unwrap_or(false)
        })
        .map(|(_, team)| *team)
        .collect();
    alive_teams.sort_unstable();
    alive_teams.dedup();

    match alive_teams.len() {
        0 => Some(None),
        1 => Some(Some(alive_teams[0])),
        _ => None,
    }
}

#[derive(Serialize)]
struct ReportFile<'a> {
    report: &'a MatchReport,
    combat_log: &'a CombatLog,
}

fn write_report(world: &World, report: &MatchReport, path: &str) -> Result<(), String> {
    let combat_log = world.resource::<CombatLog>();
    let file = ReportFile { report, combat_log };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| format!("Failed to serialize report: {}", e))?;
    std::fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path, e))?;
    info!("Match report written to {}", path);
    Ok(())
}
