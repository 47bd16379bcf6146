//! Concrete Ability Variants
//!
//! The closed set of concrete ability kinds. Shared lifecycle logic lives in
//! `lifecycle` and calls into these hooks; each variant keeps its private
//! working state in the instance's typed `VariantState` payload.

use bevy::prelude::*;

use super::ability_config::{AbilityConfig, AbilityVariant};
use super::components::{
    AbilityInstance, CarriedFlag, Controller, ProjectileEntity, Team, VariantState,
};
use super::utils::rotate_by_facing;

/// Variant start hook, invoked at the end of `start_ability` once aim has
/// been resolved.
pub fn on_start(world: &mut World, config: &AbilityConfig, owner: Entity, instance: &mut AbilityInstance) {
    match &config.variant {
        AbilityVariant::Standard => {}

        AbilityVariant::Projectile { .. } => {
            instance.variant_state = VariantState::Projectile { spawned: None };
        }

        AbilityVariant::Teleport {
            location_offset,
            speed,
            range_bonus,
            ..
        } => {
            let Some(position) = world.get::<Transform>(owner).map(|t| t.translation) else {
                return;
            };
            let facing = world
                .get::<Controller>(owner)
                .map(|c| c.state.direction)
                .unwrap_or(Vec3::Z);

            // The aim drag stretches the blink up to the bonus range.
            let mut offset = Vec2::new(location_offset[0], location_offset[1]);
            if *range_bonus != 0.0 {
                offset.y += range_bonus * instance.ability_direction.length();
            }

            let mut world_offset = rotate_by_facing(offset, facing);

            // Flag carriers blink half as far.
            if world.get::<CarriedFlag>(owner).is_some() {
                world_offset *= 0.5;
            }

            instance.ability_speed = *speed;
            instance.variant_state = VariantState::Teleport {
                destination: position + world_offset,
            };

            // Airborne during the blink wind-up; gravity restored at cleanup.
            if let Some(mut controller) = world.get_mut::<Controller>(owner) {
                controller.parameters.gravity_active = false;
            }
            instance.gravity_was_disabled = true;
        }
    }
}

/// Variant per-tick hook, invoked at the end of `update_ability`. One-shot
/// delayed effects latch through `last_time_delay_used`.
pub fn on_update(world: &mut World, config: &AbilityConfig, instance: &mut AbilityInstance) {
    match &config.variant {
        AbilityVariant::Standard => {}

        AbilityVariant::Projectile {
            speed,
            lifespan,
            delay,
            offset,
            damage_index,
        } => {
            if instance.time_elapsed > *delay && instance.last_time_delay_used <= *delay {
                instance.last_time_delay_used = instance.time_elapsed;
                spawn_projectile(
                    world,
                    config,
                    instance,
                    *speed,
                    *lifespan,
                    Vec2::new(offset[0], offset[1]),
                    *damage_index,
                );
            }
        }

        AbilityVariant::Teleport { delay, .. } => {
            if instance.time_elapsed > *delay && instance.last_time_delay_used <= *delay {
                instance.last_time_delay_used = instance.time_elapsed;
                if let VariantState::Teleport { destination } = instance.variant_state {
                    if let Some(mut transform) = world.get_mut::<Transform>(instance.owner) {
                        transform.translation = destination;
                    }
                }
            }
        }
    }
}

fn spawn_projectile(
    world: &mut World,
    config: &AbilityConfig,
    instance: &mut AbilityInstance,
    speed: f32,
    lifespan: f32,
    offset: Vec2,
    damage_index: usize,
) {
    let owner = instance.owner;
    let Some(position) = world.get::<Transform>(owner).map(|t| t.translation) else {
        return;
    };
    let facing = world
        .get::<Controller>(owner)
        .map(|c| c.state.direction)
        .unwrap_or(Vec3::Z);
    let team = world.get::<Team>(owner).map(|t| t.team).unwrap_or(0);

    let spawn_pos = position + rotate_by_facing(offset, facing);

    let entity = world
        .spawn((
            ProjectileEntity {
                owner,
                team,
                source_ability: config.id,
                damage_index,
                direction: facing,
                speed,
                lifespan,
            },
            Transform::from_translation(spawn_pos),
        ))
        .id();

    instance.variant_state = VariantState::Projectile {
        spawned: Some(entity),
    };
}
