//! Combat Simulation Core
//!
//! The ability execution engine and the tick-synchronous simulation hosting
//! it. Everything here is deterministic: a fixed-step clock, a seeded RNG
//! drawn in fixed order, and a single exclusive driver pass per tick that
//! applies all lifecycle mutations in entity order.
//!
//! Module layout:
//! - `abilities` / `ability_config`: config vocabulary and the RON catalog
//! - `components`: ECS components and resources
//! - `cooldown`: effective-cooldown arithmetic
//! - `targeting`: auto-aim, prediction, threat evaluation
//! - `lifecycle`: Start / Update / End / CleanUp and the termination marks
//! - `sequencing`: outcome-driven ability chaining
//! - `zones`: damage-zone / motion / projectile materialization and ticking
//! - `scheduler`: the driving pass calling into all of the above
//! - `bot`: per-ability AI hooks and the minimal press loop
//! - `variants`: concrete ability kinds (projectile, teleport)

use bevy::prelude::*;

pub mod abilities;
pub mod ability_config;
pub mod bot;
pub mod components;
pub mod cooldown;
pub mod lifecycle;
pub mod scheduler;
pub mod sequencing;
pub mod targeting;
pub mod utils;
pub mod variants;
pub mod zones;

/// Simulation ticks per second.
pub const TICK_RATE: f32 = 30.0;

/// How far away an entity can be and still count as on screen for
/// targeting purposes.
pub const ONSCREEN_DIST: f32 = 12.0;

/// Seconds after spawning during which no ability can start.
pub const SPAWN_GRACE: f32 = 0.2;

/// How long a buffered attack-combo continuation stays pressable after the
/// combo drops.
pub const BUFFERED_ATTACK_WINDOW: f32 = 1.0;

/// How recently a combat interaction must have happened to count as
/// "in combat".
pub const COMBAT_RECENCY_WINDOW: f32 = 5.0;

/// Brush-stealth re-entry lockout after using an ability inside a brush.
pub const BRUSH_BREAK_LOCKOUT: f32 = 2.0;

/// Minimum run time before clicking a cooling slot cuts the running
/// ability short.
pub const CLICK_INTERRUPT_GRACE: f32 = 0.33;

/// Plugin wiring the simulation systems in their deterministic tick order.
///
/// `GameRng` and `AbilityCatalog` are environment-specific and inserted by
/// the runner (headless or test harness) before the first tick.
pub struct SimPlugin;

impl Plugin for SimPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<components::SimClock>()
            .init_resource::<components::MatchInfo>()
            .add_systems(
                Update,
                (
                    scheduler::advance_clock,
                    scheduler::update_brush_stealth,
                    scheduler::drive_bot_attacks,
                    scheduler::drive_abilities,
                    scheduler::apply_movement,
                    zones::integrate_motions,
                    zones::move_projectiles,
                    zones::tick_damage_zones,
                )
                    .chain(),
            );
    }
}
