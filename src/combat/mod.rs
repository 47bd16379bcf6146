//! Combat notification layer
//!
//! Events emitted by the ability engine plus the combat log that records
//! them. The engine only writes here; presentation and analytics read.

use bevy::prelude::*;

pub mod events;
pub mod log;

use events::{AbilityNotification, AbilityPhase, DamageEvent};
use log::{CombatLog, CombatLogEventType};

use crate::sim::components::SimClock;

/// Plugin for the combat notification layer
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<AbilityNotification>()
            .add_event::<DamageEvent>()
            .init_resource::<CombatLog>()
            .add_systems(PostUpdate, record_combat_log);
    }
}

/// Drain combat events into the combat log.
fn record_combat_log(
    clock: Res<SimClock>,
    mut combat_log: ResMut<CombatLog>,
    mut ability_events: EventReader<AbilityNotification>,
    mut damage_events: EventReader<DamageEvent>,
) {
    combat_log.match_time = clock.time;

    for event in ability_events.read() {
        let (event_type, verb) = match event.phase {
            AbilityPhase::Start => (CombatLogEventType::AbilityStarted, "starts"),
            AbilityPhase::End => (CombatLogEventType::AbilityEnded, "ends"),
        };
        let message = format!(
            "{:?} {} ability {} (slot {})",
            event.owner, verb, event.ability, event.input
        );
        combat_log.log(event_type, message);
    }

    for event in damage_events.read() {
        let message = format!(
            "{:?} hits {:?} with {} for {:.0}",
            event.source, event.target, event.ability, event.amount
        );
        combat_log.log(CombatLogEventType::Damage, message);
    }
}
