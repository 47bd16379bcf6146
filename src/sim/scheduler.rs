//! Driving Scheduler
//!
//! One logical pass per simulation tick over every owner, in entity order:
//! tick cooldowns and buffered-combo windows, advance active instances,
//! resolve termination marks into End + CleanUp, chain sequenced follow-ups,
//! and turn pressed input into activations. The whole pass runs as one
//! exclusive system so every mutation lands in the same deterministic order.

use bevy::prelude::*;

use super::abilities::ActivationKind;
use super::ability_config::{AbilityCatalog, AbilityConfig};
use super::bot;
use super::components::{
    AbilityInstance, AbilityInventory, AbilitySlot, Bot, BrushUser, Controller, Health, Playable,
    Profile, SimClock, Stealth,
};
use super::lifecycle;
use super::utils::flat;

/// Advance the simulation clock. Runs first every tick.
pub fn advance_clock(mut clock: ResMut<SimClock>) {
    clock.advance();
}

/// Re-engage brush stealth once inside a brush past the lockout; drop it on
/// leaving the brush.
pub fn update_brush_stealth(clock: Res<SimClock>, mut query: Query<(&BrushUser, &mut Stealth)>) {
    for (brush, mut stealth) in query.iter_mut() {
        if brush.in_brush {
            if clock.time >= stealth.brush_lockout && !stealth.brush_stealth {
                stealth.brush_stealth = true;
            }
        } else if stealth.brush_stealth {
            stealth.brush_stealth = false;
        }
    }
}

/// The per-tick ability pass.
pub fn drive_abilities(world: &mut World) {
    world.resource_scope::<AbilityCatalog, _>(|world, catalog: Mut<AbilityCatalog>| {
        let dt = world.resource::<SimClock>().dt();

        let mut owners: Vec<Entity> = Vec::new();
        {
            let mut query = world.query::<(Entity, &AbilityInventory)>();
            for (entity, _) in query.iter(world) {
                owners.push(entity);
            }
        }
        owners.sort_unstable();

        for owner in owners {
            tick_buffered_attack(world, owner, dt);

            let slots = world
                .get::<AbilityInventory>(owner)
                .map(|inv| inv.slots.clone())
                .unwrap_or_default();

            for slot_entity in &slots {
                advance_slot(world, &catalog, owner, *slot_entity, dt);
            }

            consume_sequenced_ability(world, &catalog, owner, &slots);

            // Pressed input resolves last, after this tick's terminations.
            let pressed = world
                .get::<Playable>(owner)
                .and_then(|p| p.input().pressed);
            if let Some(input) = pressed {
                if let Some(mut playable) = world.get_mut::<Playable>(owner) {
                    playable.input_mut().pressed = None;
                }
                try_activate(world, &catalog, owner, input);
            }
        }
    });
}

fn tick_buffered_attack(world: &mut World, owner: Entity, dt: f32) {
    if let Some(mut inventory) = world.get_mut::<AbilityInventory>(owner) {
        if inventory.last_attack_timer > 0.0 {
            inventory.last_attack_timer -= dt;
            if inventory.last_attack_timer <= 0.0 {
                inventory.last_attack_timer = 0.0;
                inventory.last_attack = None;
            }
        }
    }
}

/// Tick one slot: cooldown, then the active instance's lifecycle. Marks set
/// on a previous pass resolve here, before any further update runs.
fn advance_slot(
    world: &mut World,
    catalog: &AbilityCatalog,
    owner: Entity,
    slot_entity: Entity,
    dt: f32,
) {
    let Some(mut instance) = world.get::<AbilityInstance>(slot_entity).cloned() else {
        return;
    };

    // Cooldown ticks even on ended instances.
    if instance.cooldown_timer > 0.0 {
        instance.cooldown_timer = (instance.cooldown_timer - dt).max(0.0);
    }

    if !instance.has_ended {
        if let Some(config) = catalog.get(instance.ability).cloned() {
            if instance.marks.any() {
                lifecycle::end_ability(world, catalog, &config, &mut instance);
                lifecycle::clean_up(world, &config, owner, &mut instance);
            } else {
                instance.time_elapsed += dt;
                instance.in_ability_timer -= dt;

                lifecycle::update_ability(world, catalog, &config, &mut instance);

                if instance.in_ability_timer <= 0.0 && !instance.has_ended {
                    lifecycle::end_ability(world, catalog, &config, &mut instance);
                    lifecycle::clean_up(world, &config, owner, &mut instance);
                }
                // Marks set during this update resolve on the next pass.
            }
        }
    }

    if let Some(mut stored) = world.get_mut::<AbilityInstance>(slot_entity) {
        *stored = instance;
    }
}

/// Start the follow-up ability the sequencing sub-machine queued, once the
/// chained-out instance has fully ended. Chains skip the cooldown gate but
/// not the usability gate.
fn consume_sequenced_ability(
    world: &mut World,
    catalog: &AbilityCatalog,
    owner: Entity,
    slots: &[Entity],
) {
    let Some(sequenced) = world
        .get::<AbilityInventory>(owner)
        .and_then(|inv| inv.sequenced_ability)
    else {
        return;
    };

    let Some(slot_entity) = find_slot_by_input(world, slots, sequenced.input) else {
        return;
    };
    let prior_ended = world
        .get::<AbilityInstance>(slot_entity)
        .map(|i| i.has_ended)
        .unwrap_or(false);
    if !prior_ended {
        return;
    }

    if let Some(mut inventory) = world.get_mut::<AbilityInventory>(owner) {
        inventory.sequenced_ability = None;
    }

    if let Some(config) = catalog.get(sequenced.ability).cloned() {
        if lifecycle::can_use(world, &config, owner) {
            activate_on_slot(world, catalog, &config, owner, slot_entity, sequenced.input);
        }
    }
}

fn find_slot_by_input(world: &World, slots: &[Entity], input: u8) -> Option<Entity> {
    slots
        .iter()
        .copied()
        .find(|slot_entity| {
            world
                .get::<AbilitySlot>(*slot_entity)
                .map(|slot| slot.input == input)
                .unwrap_or(false)
        })
}

fn activate_on_slot(
    world: &mut World,
    catalog: &AbilityCatalog,
    config: &AbilityConfig,
    owner: Entity,
    slot_entity: Entity,
    input: u8,
) {
    let Some(mut instance) = world.get::<AbilityInstance>(slot_entity).cloned() else {
        return;
    };
    instance.rearm(config.id, input);
    lifecycle::start_ability(world, config, owner, &mut instance);
    if let Some(mut stored) = world.get_mut::<AbilityInstance>(slot_entity) {
        *stored = instance;
    }
}

/// Attempt to activate the ability bound to `input` on `owner`.
///
/// Resolves the buffered attack-combo override, routes presses on cooling
/// slots through `clicked_while_on_cd`, and gates activation on `can_use`.
/// Returns whether an activation happened.
pub fn try_activate(
    world: &mut World,
    catalog: &AbilityCatalog,
    owner: Entity,
    input: u8,
) -> bool {
    let slots = world
        .get::<AbilityInventory>(owner)
        .map(|inv| inv.slots.clone())
        .unwrap_or_default();
    let Some(slot_entity) = find_slot_by_input(world, &slots, input) else {
        return false;
    };
    let Some(slot) = world.get::<AbilitySlot>(slot_entity).cloned() else {
        return false;
    };
    let Some(instance) = world.get::<AbilityInstance>(slot_entity).cloned() else {
        return false;
    };

    // A pressed attack slot inside the buffered window continues the combo
    // instead of restarting it.
    let mut ability = slot.ability;
    if let Some(inventory) = world.get::<AbilityInventory>(owner) {
        if inventory.last_attack_timer > 0.0 {
            if let Some(last_attack) = inventory.last_attack {
                let is_attack_slot = catalog
                    .get(slot.ability)
                    .map(|c| c.kind == ActivationKind::Attack)
                    .unwrap_or(false);
                if is_attack_slot {
                    ability = last_attack;
                }
            }
        }
    }

    let Some(config) = catalog.get(ability).cloned() else {
        return false;
    };

    if !instance.has_ended || instance.cooldown_timer > 0.0 {
        let mut clicked = instance;
        lifecycle::clicked_while_on_cd(&config, &mut clicked);
        if let Some(mut stored) = world.get_mut::<AbilityInstance>(slot_entity) {
            *stored = clicked;
        }
        return false;
    }

    if !lifecycle::can_use(world, &config, owner) {
        return false;
    }

    activate_on_slot(world, catalog, &config, owner, slot_entity, input);
    true
}

/// Minimal bot combat loop: a bot with a locked target presses its best
/// threatening ability, or closes distance when nothing threatens yet.
pub fn drive_bot_attacks(world: &mut World) {
    world.resource_scope::<AbilityCatalog, _>(|world, catalog: Mut<AbilityCatalog>| {
        let mut bots: Vec<(Entity, Entity)> = Vec::new();
        {
            let mut query = world.query::<(Entity, &Bot)>();
            for (entity, bot) in query.iter(world) {
                if let Some(target) = bot.target {
                    bots.push((entity, target));
                }
            }
        }
        bots.sort_unstable_by_key(|(entity, _)| *entity);

        for (owner, target) in bots {
            let owner_alive = world
                .get::<Health>(owner)
                .map(|h| h.is_alive())
                .unwrap_or(false);
            let target_alive = world
                .get::<Health>(target)
                .map(|h| h.is_alive())
                .unwrap_or(false);
            if !owner_alive || !target_alive {
                continue;
            }

            let can_act = world
                .get::<Controller>(owner)
                .map(|c| c.can_use_ability(true) || c.can_attack(true))
                .unwrap_or(false);

            let pressed =
                can_act && bot::activate_best_ability_option(world, &catalog, owner, target);

            // Nothing to press: close distance toward the target.
            if !pressed {
                let (Some(owner_pos), Some(target_pos)) = (
                    world.get::<Transform>(owner).map(|t| t.translation),
                    world.get::<Transform>(target).map(|t| t.translation),
                ) else {
                    continue;
                };
                let stop_dist = world
                    .get::<Controller>(owner)
                    .map(|c| c.attack_range)
                    .unwrap_or(2.0);
                let direction = if flat(target_pos - owner_pos).length() > stop_dist {
                    flat(target_pos - owner_pos).normalize_or_zero()
                } else {
                    Vec3::ZERO
                };
                if let Some(mut playable) = world.get_mut::<Playable>(owner) {
                    playable.bot_input.movement_direction = direction;
                }
            } else if let Some(mut playable) = world.get_mut::<Playable>(owner) {
                playable.bot_input.movement_direction = Vec3::ZERO;
            }
        }
    });
}

/// Integrate player/bot movement input, gated by the permission ledger.
/// Keeps controller velocity current for the prediction queries.
pub fn apply_movement(
    clock: Res<SimClock>,
    mut query: Query<(
        &Playable,
        &mut Controller,
        &mut Transform,
        Option<&Health>,
        Option<&Profile>,
    )>,
) {
    let dt = clock.dt();

    for (playable, mut controller, mut transform, health, profile) in query.iter_mut() {
        if controller.knockback_timer > 0.0 {
            controller.knockback_timer = (controller.knockback_timer - dt).max(0.0);
        }

        if let Some(health) = health {
            if !health.is_alive() {
                controller.velocity = Vec3::ZERO;
                continue;
            }
        }

        let input_dir = flat(playable.input().movement_direction);
        if controller.can_move() && input_dir != Vec3::ZERO {
            let direction = input_dir.normalize_or_zero();
            let speed = profile.map(|p| p.move_speed).unwrap_or(5.0);

            transform.translation += direction * speed * dt;
            controller.velocity = direction * speed;
            if controller.can_rotate() {
                let mut t = *transform;
                controller.rotate_controller(&mut t, direction);
                *transform = t;
            }
        } else if controller.parameters.ability_motion == Vec3::ZERO {
            // Residual velocity (knockback tails, motion residue) bleeds off.
            controller.velocity *= 0.8;
            if controller.velocity.length_squared() < 0.0025 {
                controller.velocity = Vec3::ZERO;
            } else {
                transform.translation += controller.velocity * dt;
            }
        }
    }
}
