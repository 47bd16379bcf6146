//! Bot Behavior Hooks
//!
//! Per-tick hooks the engine runs for bot-controlled owners while an ability
//! is active, plus the minimal ability-press loop the headless scenarios
//! drive. Goal selection lives outside the engine; everything here only
//! consumes the AI's already-locked target.

use bevy::prelude::*;

use super::abilities::{BotBehavior, ButtonType};
use super::ability_config::{AbilityCatalog, AbilityConfig};
use super::components::{
    AbilityInstance, AbilityInventory, AbilitySlot, Bot, Controller, GameRng, Health, Playable,
    SimClock, VariantState,
};
use super::targeting::{self, is_entity_stealth_to};
use super::utils::{flat, flat_distance};

/// Whether `position_to_check` lies behind the given facing from `position`.
pub fn is_facing_away(position: Vec3, direction: Vec3, position_to_check: Vec3) -> bool {
    let dir = flat(position_to_check - position);
    dir.dot(flat(direction)) < 0.0
}

/// Run the per-tick AI hooks configured on this ability.
pub fn handle_unique_bot_behavior(
    world: &mut World,
    config: &AbilityConfig,
    instance: &mut AbilityInstance,
) {
    let owner = instance.owner;

    if config.button == ButtonType::Charged {
        handle_bot_charged_ability(world, config, owner);
    }

    if config.bot_behaviors.has(BotBehavior::KeepFacingTarget) {
        if let Some((target_pos, owner_pos)) = target_and_owner_positions(world, owner) {
            let dt = world.resource::<SimClock>().dt();
            let facing = world
                .get::<Controller>(owner)
                .map(|c| c.state.direction)
                .unwrap_or(Vec3::Z);
            let desired = flat(target_pos - owner_pos).normalize_or_zero();
            if desired != Vec3::ZERO {
                let blended = facing.lerp(desired, (dt * 3.0).min(1.0)).normalize_or_zero();
                targeting::rotate_owner(world, owner, blended);
            }
        }
    }

    if config.bot_behaviors.has(BotBehavior::KeepMovingTowardTarget) {
        if let Some((target_pos, owner_pos)) = target_and_owner_positions(world, owner) {
            if flat_distance(owner_pos, target_pos) > 1.5 {
                let direction = flat(target_pos - owner_pos).normalize_or_zero();
                if let Some(mut playable) = world.get_mut::<Playable>(owner) {
                    playable.bot_input.movement_direction = direction;
                }
            }
        }
    }

    if config
        .bot_behaviors
        .has(BotBehavior::ControllableProjectile)
    {
        handle_bot_controllable_projectile(world, owner, instance);
    }
}

fn target_and_owner_positions(world: &World, owner: Entity) -> Option<(Vec3, Vec3)> {
    let target = world.get::<Bot>(owner)?.target?;
    let target_pos = world.get::<Transform>(target)?.translation;
    let owner_pos = world.get::<Transform>(owner)?.translation;
    Some((target_pos, owner_pos))
}

/// Charged abilities: hold the button until either the bot got clipped (a
/// coin flip releases early) or the target is walking out of reach.
fn handle_bot_charged_ability(world: &mut World, config: &AbilityConfig, owner: Entity) {
    let now = world.resource::<SimClock>().time;
    let mut hold_it = true;

    let recently_hit = world
        .get::<Health>(owner)
        .map(|h| now < h.last_direct_hit_time + 0.05)
        .unwrap_or(false);
    if recently_hit {
        let mut rng = world.resource_mut::<GameRng>();
        if rng.random_f32() <= 0.50 {
            hold_it = false;
        }
    }

    if hold_it {
        if let Some(target) = world.get::<Bot>(owner).and_then(|b| b.target) {
            if let (Some(owner_pos), Some(target_pos), Some(target_facing)) = (
                world.get::<Transform>(owner).map(|t| t.translation),
                world.get::<Transform>(target).map(|t| t.translation),
                world.get::<Controller>(target).map(|c| c.state.direction),
            ) {
                let target_leaving = is_facing_away(owner_pos, target_facing, target_pos);
                if target_leaving && flat_distance(target_pos, owner_pos) > config.max_reach * 0.85
                {
                    hold_it = false;
                }
            }
        }
    }

    if let Some(mut playable) = world.get_mut::<Playable>(owner) {
        playable.bot_input.ability_button_down = hold_it;
        playable.bot_input.ability_input = config.input;
    }
}

/// Steer a live controllable projectile toward the target's best-guess
/// position by synthesizing movement input.
fn handle_bot_controllable_projectile(
    world: &mut World,
    owner: Entity,
    instance: &AbilityInstance,
) {
    let Some(target) = world.get::<Bot>(owner).and_then(|b| b.target) else {
        return;
    };
    if is_entity_stealth_to(world, owner, target) {
        return;
    }
    let Some(target_transform) = world.get::<Transform>(target).copied() else {
        return;
    };

    // Lead the target slightly by its current velocity.
    let target_pos = match world.get::<Controller>(target) {
        Some(controller) => targeting::best_guess_position(controller, &target_transform, 0.25),
        None => target_transform.translation,
    };

    let steer_from = match instance.variant_state {
        VariantState::Projectile {
            spawned: Some(projectile),
        } => world
            .get::<Transform>(projectile)
            .map(|t| t.translation)
            .or_else(|| world.get::<Transform>(owner).map(|t| t.translation)),
        _ => world.get::<Transform>(owner).map(|t| t.translation),
    };

    if let (Some(from), Some(mut playable)) = (steer_from, world.get_mut::<Playable>(owner)) {
        playable.bot_input.movement_direction = flat(target_pos - from).normalize_or_zero();
    }
}

/// Press the best equipped ability against a target: the first slot (in
/// input order) that is off cooldown, usable, and an actual threat.
/// Steers aim as a side effect of the threat check. Returns whether a press
/// was queued.
pub fn activate_best_ability_option(
    world: &mut World,
    catalog: &AbilityCatalog,
    owner: Entity,
    target: Entity,
) -> bool {
    let Some(inventory) = world.get::<AbilityInventory>(owner) else {
        return false;
    };
    let mut slots: Vec<Entity> = inventory.slots.clone();
    slots.sort_unstable_by_key(|slot_entity| {
        world
            .get::<AbilitySlot>(*slot_entity)
            .map(|s| s.input)
            .unwrap_or(u8::MAX)
    });

    for slot_entity in slots {
        let Some(slot) = world.get::<AbilitySlot>(slot_entity).cloned() else {
            continue;
        };
        let Some(instance) = world.get::<AbilityInstance>(slot_entity).cloned() else {
            continue;
        };
        if !instance.has_ended || instance.cooldown_timer > 0.0 {
            continue;
        }
        let Some(config) = catalog.get(slot.ability).cloned() else {
            continue;
        };
        if !super::lifecycle::can_use(world, &config, owner) {
            continue;
        }
        if !targeting::is_a_threat_to(world, &config, owner, target, true) {
            continue;
        }

        if let Some(mut playable) = world.get_mut::<Playable>(owner) {
            playable.bot_input.pressed = Some(slot.input);
            playable.bot_input.ability_input = slot.input;
        }
        return true;
    }

    false
}
