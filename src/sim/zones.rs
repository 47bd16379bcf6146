//! Damage Zone & Motion Materialization
//!
//! The ability engine decides *when* a zone or motion exists and with which
//! config fragment; these functions and systems own the spawned entities'
//! behavior: wind-up, overlap, hit history, forced movement, termination.

use bevy::prelude::*;

use crate::combat::events::DamageEvent;

use super::abilities::{DamageBehavior, MotionFlag};
use super::ability_config::{AbilityConfig, DamageShape, DamageSpec, MotionSpec};
use super::components::{
    AbilityInstance, AbilitySlot, Controller, DamageZone, Health, Motion, Profile,
    ProjectileEntity, SimClock, Team,
};
use super::lifecycle;
use super::utils::{flat, flat_distance, rotate_by_facing};

// ============================================================================
// Materialization
// ============================================================================

/// Spawn one damage zone for a damage entry of an ability.
///
/// The zone is placed in front of the owner along the resolved aim, with the
/// entry's direction bonus scaled by how far the aim was pushed (or by the
/// configured default when the activation carried no aim at all).
pub fn materialize_damage_zone(
    world: &mut World,
    config: &AbilityConfig,
    spec: &DamageSpec,
    damage_index: usize,
    owner: Entity,
    instance: &AbilityInstance,
) -> Option<Entity> {
    let owner_pos = world.get::<Transform>(owner)?.translation;
    let team = world.get::<Team>(owner).map(|t| t.team).unwrap_or(0);
    let facing = world
        .get::<Controller>(owner)
        .map(|c| c.state.direction)
        .unwrap_or(Vec3::Z);

    let (attack_power, ability_power) = world
        .get::<Profile>(owner)
        .map(|p| (p.attack_power, p.ability_power))
        .unwrap_or((0.0, 0.0));
    let value =
        spec.value as f32 + spec.attack_ratio * attack_power + spec.power_ratio * ability_power;

    let direction = if instance.ability_direction != Vec3::ZERO {
        flat(instance.ability_direction).normalize_or_zero()
    } else {
        facing
    };

    // Aim range pushes the footprint further out; an aimless activation uses
    // the entry's default fraction of the bonus instead.
    let aim_magnitude = instance.ability_direction.length();
    let forward_bonus = if aim_magnitude > 0.0 {
        spec.direction_bonus * aim_magnitude.min(1.0)
    } else {
        spec.direction_bonus * spec.default_direction_bonus
    };

    let offset = rotate_by_facing(
        Vec2::new(spec.center[0], spec.center[1] + forward_bonus),
        direction,
    );
    let position = owner_pos + offset;

    // Faster ability playback shortens the wind-up.
    let delay = if instance.ability_speed > 0.0 {
        spec.delay / instance.ability_speed
    } else {
        spec.delay
    };

    let zone = DamageZone {
        owner,
        team,
        source_ability: config.id,
        damage_index: damage_index as u8,
        value,
        delay,
        lifespan: spec.lifespan,
        shape: spec.shape,
        half_extents: Vec2::new(spec.extents[0], spec.extents[1]),
        direction,
        behavior: spec.behavior.clone(),
        follow_offset: offset,
        share_history_id: None,
        hit_history: Vec::new(),
        destroy_on_ability_end: spec
            .behavior
            .has(DamageBehavior::DestroyOnAbilityEnd)
            .then_some(config.id),
    };

    Some(
        world
            .spawn((zone, Transform::from_translation(position)))
            .id(),
    )
}

/// Spawn a Motion entity from a motion entry.
pub fn materialize_motion(
    world: &mut World,
    config: &AbilityConfig,
    spec: &MotionSpec,
    owner: Entity,
    instance: &AbilityInstance,
) -> Option<Entity> {
    let facing = world
        .get::<Controller>(owner)
        .map(|c| c.state.direction)
        .unwrap_or(Vec3::Z);

    let direction = if instance.ability_direction != Vec3::ZERO {
        flat(instance.ability_direction).normalize_or_zero()
    } else {
        facing
    };

    let mut force = Vec2::new(spec.force[0], spec.force[1]);
    if spec.flags.has(MotionFlag::DistanceByAbilityDirection) {
        // A short aim drag shortens the lunge; a full drag keeps it.
        let aim_magnitude = instance.ability_direction.length().min(1.0);
        force.y = 5.0 + (force.y - 5.0) * aim_magnitude;
    }

    let right = Vec3::new(direction.z, 0.0, -direction.x);
    let velocity = right * force.x + direction * force.y;

    let delay = if instance.ability_speed > 0.0 {
        spec.delay / instance.ability_speed
    } else {
        spec.delay
    };

    let motion = Motion {
        entity: owner,
        velocity,
        distance: spec.distance,
        stop_distance: spec.stop_dist_bonus,
        delay,
        residual: spec.residual,
        flags: spec.flags.clone(),
        ability_id: Some(config.id),
        interrupt_id: spec.interrupt_ability_on_end.then_some(config.id),
        crossed: 0.0,
        terminated: false,
    };

    Some(world.spawn(motion).id())
}

/// Terminate a motion. Natural termination (distance crossed) leaves
/// residual velocity on the controller and fires the motion's interrupt
/// hook; forced termination (ability cleanup, a new ability starting) does
/// neither.
pub fn terminate_motion(world: &mut World, motion_entity: Entity, natural: bool) {
    let Some(motion) = world.get::<Motion>(motion_entity).cloned() else {
        return;
    };
    if motion.terminated {
        return;
    }
    if let Some(mut stored) = world.get_mut::<Motion>(motion_entity) {
        stored.terminated = true;
    }

    if let Some(mut controller) = world.get_mut::<Controller>(motion.entity) {
        controller.parameters.ability_motion = Vec3::ZERO;
        if natural && motion.residual > 0.0 {
            controller.velocity = motion.velocity * motion.residual;
        }
    }

    if natural {
        if let Some(interrupt_id) = motion.interrupt_id {
            let slots: Vec<Entity> = {
                let mut query = world.query::<(Entity, &AbilitySlot)>();
                query
                    .iter(world)
                    .filter(|(_, slot)| slot.owner == motion.entity)
                    .map(|(entity, _)| entity)
                    .collect()
            };
            for slot_entity in slots {
                if let Some(mut instance) = world.get_mut::<AbilityInstance>(slot_entity) {
                    if !instance.has_ended && instance.ability == interrupt_id {
                        lifecycle::interrupt_ability(&mut instance, 0.0);
                    }
                }
            }
        }
    }

    world.despawn(motion_entity);
}

/// Terminate all of an owner's live, non-hammock motions.
/// `only_for_ability`: restrict to motions untagged or tagged with that id.
pub fn terminate_owner_motions(
    world: &mut World,
    owner: Entity,
    only_for_ability: Option<crate::sim::abilities::AbilityId>,
) {
    let mut to_terminate = Vec::new();
    {
        let mut query = world.query::<(Entity, &Motion)>();
        for (entity, motion) in query.iter(world) {
            if motion.entity != owner || motion.terminated {
                continue;
            }
            if motion.flags.has(MotionFlag::Hammock) {
                continue;
            }
            if let Some(ability_id) = only_for_ability {
                if motion.ability_id.is_some() && motion.ability_id != Some(ability_id) {
                    continue;
                }
            }
            to_terminate.push(entity);
        }
    }
    to_terminate.sort_unstable();
    for entity in to_terminate {
        terminate_motion(world, entity, false);
    }
}

// ============================================================================
// Overlap
// ============================================================================

/// Whether a point lies inside a zone footprint centered at `zone_pos`.
fn zone_overlaps(zone: &DamageZone, zone_pos: Vec3, point: Vec3) -> bool {
    match zone.shape {
        DamageShape::Circle => flat_distance(zone_pos, point) <= zone.half_extents.x,
        DamageShape::Box => {
            let forward = zone.direction;
            let right = Vec3::new(forward.z, 0.0, -forward.x);
            let local = flat(point - zone_pos);
            local.dot(right).abs() <= zone.half_extents.x
                && local.dot(forward).abs() <= zone.half_extents.y
        }
    }
}

// ============================================================================
// Tick Systems
// ============================================================================

/// Advance forced motions: wind-up, movement, distance accounting,
/// natural termination. Runs as an exclusive pass so natural termination can
/// fire interrupt hooks in the same tick.
pub fn integrate_motions(world: &mut World) {
    let dt = world.resource::<SimClock>().dt();

    let mut rows: Vec<(Entity, Motion)> = Vec::new();
    {
        let mut query = world.query::<(Entity, &Motion)>();
        for (entity, motion) in query.iter(world) {
            if !motion.terminated {
                rows.push((entity, motion.clone()));
            }
        }
    }
    rows.sort_unstable_by_key(|(entity, _)| *entity);

    for (motion_entity, mut motion) in rows {
        if motion.delay > 0.0 {
            motion.delay -= dt;
            if let Some(mut stored) = world.get_mut::<Motion>(motion_entity) {
                stored.delay = motion.delay;
            }
            continue;
        }

        let step = motion.velocity * dt;
        let step_len = step.length();

        if let Some(mut transform) = world.get_mut::<Transform>(motion.entity) {
            transform.translation += step;
        }
        if let Some(mut controller) = world.get_mut::<Controller>(motion.entity) {
            controller.parameters.ability_motion = motion.velocity;
            controller.velocity = motion.velocity;
            controller.parameters.distance_crossed_during_last_ability += step_len;
        }

        motion.crossed += step_len;
        if let Some(mut stored) = world.get_mut::<Motion>(motion_entity) {
            stored.crossed = motion.crossed;
        }

        if motion.crossed + motion.stop_distance >= motion.distance {
            terminate_motion(world, motion_entity, true);
        }
    }
}

/// One landed hit, queued for application after the overlap scan.
struct PendingHit {
    zone_entity: Entity,
    dealer: Entity,
    target: Entity,
    ability: crate::sim::abilities::AbilityId,
    value: f32,
}

/// Advance damage zones: follow their owner, count down wind-up and
/// lifespan, apply damage to enemies entering the footprint, then expire.
pub fn tick_damage_zones(world: &mut World) {
    let dt = world.resource::<SimClock>().dt();

    let mut zone_rows: Vec<Entity> = Vec::new();
    {
        let mut query = world.query::<(Entity, &DamageZone)>();
        for (entity, _) in query.iter(world) {
            zone_rows.push(entity);
        }
    }
    zone_rows.sort_unstable();

    let mut candidates: Vec<(Entity, Vec3, f32, Option<u8>)> = Vec::new();
    {
        let mut query = world.query::<(Entity, &Transform, &Health)>();
        for (entity, transform, health) in query.iter(world) {
            candidates.push((entity, transform.translation, health.current, None));
        }
    }
    candidates.sort_unstable_by_key(|(entity, _, _, _)| *entity);
    for row in candidates.iter_mut() {
        row.3 = world.get::<Team>(row.0).map(|t| t.team);
    }

    let mut hits: Vec<PendingHit> = Vec::new();
    let mut expired: Vec<Entity> = Vec::new();

    for zone_entity in zone_rows {
        let Some(mut zone) = world.get::<DamageZone>(zone_entity).cloned() else {
            continue;
        };

        // Zones that follow their owner track its position.
        if zone.behavior.has(DamageBehavior::FollowOwnerMovement) {
            if let Some(owner_pos) = world.get::<Transform>(zone.owner).map(|t| t.translation) {
                if let Some(mut transform) = world.get_mut::<Transform>(zone_entity) {
                    transform.translation = owner_pos + zone.follow_offset;
                }
            }
        }

        if zone.delay > 0.0 {
            zone.delay -= dt;
            if let Some(mut stored) = world.get_mut::<DamageZone>(zone_entity) {
                stored.delay = zone.delay;
            }
            if zone.delay > 0.0 {
                continue;
            }
        }

        let zone_pos = world
            .get::<Transform>(zone_entity)
            .map(|t| t.translation)
            .unwrap_or_default();

        // Hit history, unioned across zones sharing this zone's history id.
        let mut already_hit: Vec<Entity> = zone.hit_history.clone();
        if let Some(share_id) = zone.share_history_id {
            let mut query = world.query::<&DamageZone>();
            for other in query.iter(world) {
                if other.owner == zone.owner && other.share_history_id == Some(share_id) {
                    already_hit.extend(other.hit_history.iter().copied());
                }
            }
        }

        for (entity, position, current_health, team) in &candidates {
            if *entity == zone.owner || *current_health <= 0.0 {
                continue;
            }
            if *team == Some(zone.team) {
                continue;
            }
            if already_hit.contains(entity) {
                continue;
            }
            if zone_overlaps(&zone, zone_pos, *position) {
                hits.push(PendingHit {
                    zone_entity,
                    dealer: zone.owner,
                    target: *entity,
                    ability: zone.source_ability,
                    value: zone.value,
                });
                zone.hit_history.push(*entity);
                already_hit.push(*entity);
            }
        }

        if let Some(mut stored) = world.get_mut::<DamageZone>(zone_entity) {
            stored.hit_history = zone.hit_history.clone();
            stored.lifespan = zone.lifespan - dt;
        }
        if zone.lifespan - dt <= 0.0 {
            expired.push(zone_entity);
        }
    }

    apply_hits(world, &hits);

    for zone_entity in expired {
        world.despawn(zone_entity);
    }
}

/// Apply queued hits: health, combat recency, notifications, and the
/// outcome flags the sequencing sub-machine feeds on.
fn apply_hits(world: &mut World, hits: &[PendingHit]) {
    let now = world.resource::<SimClock>().time;

    for hit in hits {
        if let Some(mut health) = world.get_mut::<Health>(hit.target) {
            if !health.is_alive() {
                continue;
            }
            health.current = (health.current - hit.value).max(0.0);
            health.last_direct_hit_time = now;
        } else {
            continue;
        }

        for combatant in [hit.dealer, hit.target] {
            if let Some(mut controller) = world.get_mut::<Controller>(combatant) {
                controller.last_combat_time = now;
            }
        }

        world.send_event(DamageEvent {
            source: hit.dealer,
            target: hit.target,
            ability: hit.ability,
            amount: hit.value,
        });

        mark_damage_outcome(world, hit.dealer, hit.target, hit.ability, hit.zone_entity);
    }
}

/// Route a hit through the engine's outcome callbacks on both sides.
fn mark_damage_outcome(
    world: &mut World,
    dealer: Entity,
    target: Entity,
    ability: crate::sim::abilities::AbilityId,
    zone_entity: Entity,
) {
    let terminates = world
        .get::<DamageZone>(zone_entity)
        .map(|z| z.behavior.has(DamageBehavior::TerminatesAbility))
        .unwrap_or(false);

    lifecycle::on_dealt_ability_damage(world, dealer, ability, terminates);
    lifecycle::on_received_ability_damage(world, target);
}

/// Move live projectiles, expire them, and land hits on the first enemy
/// crossed.
pub fn move_projectiles(world: &mut World) {
    let dt = world.resource::<SimClock>().dt();

    let mut rows: Vec<(Entity, ProjectileEntity)> = Vec::new();
    {
        let mut query = world.query::<(Entity, &ProjectileEntity)>();
        for (entity, projectile) in query.iter(world) {
            rows.push((entity, projectile.clone()));
        }
    }
    rows.sort_unstable_by_key(|(entity, _)| *entity);

    const PROJECTILE_HIT_RADIUS: f32 = 0.5;

    for (projectile_entity, mut projectile) in rows {
        let Some(position) = world
            .get::<Transform>(projectile_entity)
            .map(|t| t.translation)
        else {
            continue;
        };
        let new_position = position + projectile.direction * projectile.speed * dt;
        if let Some(mut transform) = world.get_mut::<Transform>(projectile_entity) {
            transform.translation = new_position;
        }

        projectile.lifespan -= dt;
        if let Some(mut stored) = world.get_mut::<ProjectileEntity>(projectile_entity) {
            stored.lifespan = projectile.lifespan;
        }

        // First enemy within the hit radius takes the hit.
        let mut candidates: Vec<(Entity, Vec3, f32, Option<u8>)> = Vec::new();
        {
            let mut query = world.query::<(Entity, &Transform, &Health)>();
            for (entity, transform, health) in query.iter(world) {
                candidates.push((entity, transform.translation, health.current, None));
            }
        }
        candidates.sort_unstable_by_key(|(entity, _, _, _)| *entity);
        for row in candidates.iter_mut() {
            row.3 = world.get::<Team>(row.0).map(|t| t.team);
        }

        let mut hit_target = None;
        for (entity, target_pos, current_health, team) in candidates {
            if entity == projectile.owner || current_health <= 0.0 {
                continue;
            }
            if team == Some(projectile.team) {
                continue;
            }
            if flat_distance(new_position, target_pos) <= PROJECTILE_HIT_RADIUS {
                hit_target = Some(entity);
                break;
            }
        }

        if let Some(target) = hit_target {
            land_projectile_hit(world, &projectile, target);
            world.despawn(projectile_entity);
        } else if projectile.lifespan <= 0.0 {
            world.despawn(projectile_entity);
        }
    }
}

fn land_projectile_hit(world: &mut World, projectile: &ProjectileEntity, target: Entity) {
    let now = world.resource::<SimClock>().time;

    let value = {
        let catalog = world.resource::<super::ability_config::AbilityCatalog>();
        let Some(config) = catalog.get(projectile.source_ability) else {
            return;
        };
        let Some(spec) = config.damage.get(projectile.damage_index) else {
            return;
        };
        let (attack_power, ability_power) = world
            .get::<Profile>(projectile.owner)
            .map(|p| (p.attack_power, p.ability_power))
            .unwrap_or((0.0, 0.0));
        spec.value as f32 + spec.attack_ratio * attack_power + spec.power_ratio * ability_power
    };

    if let Some(mut health) = world.get_mut::<Health>(target) {
        if !health.is_alive() {
            return;
        }
        health.current = (health.current - value).max(0.0);
        health.last_direct_hit_time = now;
    } else {
        return;
    }

    for combatant in [projectile.owner, target] {
        if let Some(mut controller) = world.get_mut::<Controller>(combatant) {
            controller.last_combat_time = now;
        }
    }

    world.send_event(DamageEvent {
        source: projectile.owner,
        target,
        ability: projectile.source_ability,
        amount: value,
    });

    // Projectile hits feed the same outcome callbacks as zone hits.
    lifecycle::on_dealt_ability_damage(world, projectile.owner, projectile.source_ability, false);
    lifecycle::on_received_ability_damage(world, target);
}
