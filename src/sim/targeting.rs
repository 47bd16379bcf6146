//! Targeting & Prediction
//!
//! Stateless queries over the entity set that pick a target, compute an aim
//! vector, and predict future positions. Shared by activation-time auto-aim,
//! per-tick AI aiming, and AI threat evaluation. Results are ephemeral and
//! recomputed every call; only `face_intended_position` caches anything, and
//! only into the instance and controller aim fields.

use bevy::prelude::*;

use super::abilities::{BotBehavior, ButtonType, SpecialBehavior, INPUT_BASIC_ATTACK};
use super::ability_config::AbilityConfig;
use super::components::{
    AbilityInstance, Bot, Controller, GameRng, Health, Obstacle, Playable, Stealth, Team,
};
use super::utils::{angle_between_degrees, flat, flat_distance, invert_direction,
    segment_hits_circle};
use super::{ONSCREEN_DIST, TICK_RATE};

/// Result of an auto-aim query.
#[derive(Clone, Copy, Debug)]
pub struct AimResult {
    pub found: bool,
    /// Unit aim direction when found; the caller's aim otherwise.
    pub direction: Vec3,
    /// Normalized range in [0, 1].
    pub range: f32,
    pub target: Option<Entity>,
}

impl AimResult {
    fn miss(current_aim: Vec3) -> Self {
        Self {
            found: false,
            direction: current_aim,
            range: 0.0,
            target: None,
        }
    }
}

/// Snapshot row of one potential target.
struct Candidate {
    entity: Entity,
    position: Vec3,
    alive: bool,
    team: Option<u8>,
    has_controller: bool,
    stealthed: bool,
}

/// Collect every entity with position + health, sorted by entity id so ties
/// resolve identically on every run.
fn collect_candidates(world: &mut World) -> Vec<Candidate> {
    let mut rows: Vec<(Entity, Vec3, f32)> = Vec::new();
    let mut query = world.query::<(Entity, &Transform, &Health)>();
    for (entity, transform, health) in query.iter(world) {
        rows.push((entity, transform.translation, health.current));
    }
    rows.sort_unstable_by_key(|(entity, _, _)| *entity);

    rows.into_iter()
        .map(|(entity, position, current_health)| Candidate {
            entity,
            position,
            alive: current_health > 0.0,
            team: world.get::<Team>(entity).map(|t| t.team),
            has_controller: world.get::<Controller>(entity).is_some(),
            stealthed: world
                .get::<Stealth>(entity)
                .map(|s| s.is_stealth())
                .unwrap_or(false),
        })
        .collect()
}

/// Whether `entity` is concealed from `owner`. Teammates always see each
/// other; stealth only hides from the opposing team.
pub fn is_entity_stealth_to(world: &World, owner: Entity, entity: Entity) -> bool {
    let Some(stealth) = world.get::<Stealth>(entity) else {
        return false;
    };
    if !stealth.is_stealth() {
        return false;
    }
    let our_team = world.get::<Team>(owner).map(|t| t.team);
    let their_team = world.get::<Team>(entity).map(|t| t.team);
    our_team.is_none() || our_team != their_team
}

/// Whether the straight line from `owner` to `target` crosses a vision
/// blocker.
pub fn view_to_target_is_obstructed(world: &mut World, owner: Entity, target: Entity) -> bool {
    let Some(from) = world.get::<Transform>(owner).map(|t| t.translation) else {
        return false;
    };
    let Some(to) = world.get::<Transform>(target).map(|t| t.translation) else {
        return false;
    };

    let mut blockers: Vec<(Vec3, f32)> = Vec::new();
    let mut query = world.query::<(&Transform, &Obstacle)>();
    for (transform, obstacle) in query.iter(world) {
        blockers.push((transform.translation, obstacle.radius));
    }

    blockers
        .iter()
        .any(|(center, radius)| segment_hits_circle(from, to, *center, *radius))
}

/// Auto-aim: pick the nearest visible enemy inside a 90-degree forward cone
/// and aim at where it will be, not where it is.
///
/// Basic attacks additionally require the target within attack range and may
/// fall back to an out-of-cone character when nothing is in the cone. Used at
/// activation for both bots and players; a player's manual aim overrides this
/// at the `face_intended_position` level.
pub fn auto_aim(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    current_aim: Vec3,
) -> AimResult {
    let Some(our_team) = world.get::<Team>(owner).map(|t| t.team) else {
        return AimResult::miss(current_aim);
    };
    let Some(owner_pos) = world.get::<Transform>(owner).map(|t| t.translation) else {
        return AimResult::miss(current_aim);
    };
    let (facing, attack_range) = match world.get::<Controller>(owner) {
        Some(controller) => (controller.state.direction, controller.attack_range),
        None => (Vec3::Z, 0.0),
    };

    let max_range = config.auto_aim_max_range();

    let mut target: Option<(Entity, Vec3)> = None;
    let mut fallback: Option<(Entity, Vec3)> = None;
    let mut best_distance = 9999.0;

    for candidate in collect_candidates(world) {
        if !candidate.alive {
            continue;
        }
        if candidate.team == Some(our_team) {
            continue;
        }

        let dist = flat_distance(candidate.position, owner_pos);
        if dist > ONSCREEN_DIST + 2.0 {
            continue;
        }

        if dist < best_distance {
            // Basic attacks only consider targets within swing range.
            if config.input == INPUT_BASIC_ATTACK && dist > attack_range + 2.0 {
                continue;
            }

            if angle_between_degrees(candidate.position - owner_pos, facing) > 90.0 {
                // Out-of-cone redirect only works on characters, not props.
                if config.input == INPUT_BASIC_ATTACK && candidate.has_controller {
                    fallback = Some((candidate.entity, candidate.position));
                }
                continue;
            }

            if candidate.stealthed {
                continue;
            }

            target = Some((candidate.entity, candidate.position));
            best_distance = dist;
        }
    }

    if target.is_none() {
        target = fallback;
    }

    if let Some((entity, position)) = target {
        let predicted = predicted_target_position(world, config, owner, entity, position, best_distance);
        let aim = predicted - owner_pos;

        let aim_range = if max_range > 0.0 {
            (best_distance / max_range).clamp(0.10, 1.0)
        } else {
            0.0
        };

        return AimResult {
            found: true,
            direction: flat(aim).normalize_or_zero(),
            range: aim_range,
            target: Some(entity),
        };
    }

    AimResult::miss(current_aim)
}

/// Lead prediction for bot owners: estimate how long the attack takes to
/// connect, add synthetic inaccuracy, and ask the target's controller where
/// it will be that many ticks from now. Human owners aim at the current
/// position.
fn predicted_target_position(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    target: Entity,
    target_pos: Vec3,
    dist: f32,
) -> Vec3 {
    if world.get::<Bot>(owner).is_none() {
        return target_pos;
    }
    let Some(target_controller) = world.get::<Controller>(target).cloned() else {
        return target_pos;
    };

    let mut attack_delay = config.estimated_attack_delay(dist);

    // Bots are not perfect: most draws smear the delay estimate by up to a
    // quarter second either way.
    {
        let mut rng = world.resource_mut::<GameRng>();
        if rng.random_f32() > 0.33 {
            attack_delay += rng.random_range(-0.25, 0.25);
        }
    }

    if attack_delay > 0.0 {
        if let Some(target_transform) = world.get::<Transform>(target) {
            let ticks = (attack_delay * TICK_RATE).ceil() as i32;
            return target_controller.predicted_position(target_transform, ticks);
        }
    }

    target_pos
}

/// Reduced aiming query: target selection only, against a supplied aim
/// direction with a narrow 25-degree cone. No fallback, no prediction.
/// Used to find a homing target when the player aimed manually.
pub fn ideal_target(world: &mut World, owner: Entity, current_aim: Vec3) -> Option<Entity> {
    let our_team = world.get::<Team>(owner).map(|t| t.team)?;
    let owner_pos = world.get::<Transform>(owner).map(|t| t.translation)?;

    let mut target = None;
    let mut best_distance = 9999.0;

    for candidate in collect_candidates(world) {
        if !candidate.alive {
            continue;
        }
        if candidate.team == Some(our_team) {
            continue;
        }
        let dist = flat_distance(candidate.position, owner_pos);
        if dist > ONSCREEN_DIST + 2.0 {
            continue;
        }

        if dist < best_distance {
            if angle_between_degrees(candidate.position - owner_pos, current_aim) > 25.0 {
                continue;
            }
            if candidate.stealthed {
                continue;
            }

            target = Some(candidate.entity);
            best_distance = dist;
        }
    }

    target
}

/// Rotate the owner's controller and transform toward `direction`.
pub(crate) fn rotate_owner(world: &mut World, owner: Entity, direction: Vec3) {
    let Some(mut transform) = world.get::<Transform>(owner).copied() else {
        return;
    };
    if let Some(mut controller) = world.get_mut::<Controller>(owner) {
        controller.rotate_controller(&mut transform, direction);
    }
    if let Some(mut stored) = world.get_mut::<Transform>(owner) {
        *stored = transform;
    }
}

/// Resolve where the ability should face and aim, writing the result into
/// the instance and the controller's transient aim state.
///
/// Called once at activation; continuously-steered abilities call it again
/// per tick with `is_per_frame_call = true`, which skips target caching and
/// input consumption.
pub fn face_intended_position(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &mut AbilityInstance,
    is_per_frame_call: bool,
) {
    if world.get::<Controller>(owner).is_none() || world.get::<Playable>(owner).is_none() {
        return;
    }

    if config.behaviors.has(SpecialBehavior::InvertFacingOnStart) {
        let facing = world
            .get::<Controller>(owner)
            .map(|c| c.state.direction)
            .unwrap_or(Vec3::Z);
        rotate_owner(world, owner, invert_direction(facing));
    }

    let (mut input_dir, mut range, movement_dir) = {
        let playable = world.get::<Playable>(owner).unwrap();
        let input = playable.input();
        (
            input.ability_direction,
            input.ability_range as f32 / 100.0,
            input.movement_direction,
        )
    };
    let is_bot = world.get::<Bot>(owner).is_some();

    if config.sets_ability_target {
        if let Some(mut controller) = world.get_mut::<Controller>(owner) {
            controller.state.ability_target = None;
        }
    }

    let mut already_aimed = false;
    if !is_per_frame_call {
        if input_dir == Vec3::ZERO || is_bot {
            // Basic attacks face the held movement direction first, so a
            // swing with no aim still goes where the player is heading.
            if config.input == INPUT_BASIC_ATTACK
                && config.button == ButtonType::Standard
                && movement_dir != Vec3::ZERO
            {
                rotate_owner(world, owner, movement_dir);
            }

            if !config.behaviors.has(SpecialBehavior::NoAutoAim) {
                let aim = auto_aim(world, config, owner, input_dir);
                already_aimed = true;

                if config.sets_ability_target {
                    if let Some(mut controller) = world.get_mut::<Controller>(owner) {
                        controller.state.ability_target = aim.target;
                    }
                }
                if aim.found {
                    input_dir = aim.direction;
                    range = aim.range;
                }
            }
        } else if config.sets_ability_target && config.input != INPUT_BASIC_ATTACK {
            // Manual aim stands, but still find a valid target for
            // motion homing.
            let target = ideal_target(world, owner, input_dir);
            if let Some(mut controller) = world.get_mut::<Controller>(owner) {
                controller.state.ability_target = target;
            }
        }
    }

    instance.ability_direction = if input_dir != Vec3::ZERO {
        input_dir * range
    } else {
        world
            .get::<Controller>(owner)
            .map(|c| c.state.direction)
            .unwrap_or(Vec3::Z)
    };
    if let Some(mut controller) = world.get_mut::<Controller>(owner) {
        controller.state.ability_direction = instance.ability_direction;
    }

    if instance.ability_direction != Vec3::ZERO {
        rotate_owner(world, owner, instance.ability_direction);
    }

    // Fallback aim pass for cases the main branch never aimed.
    if !already_aimed
        && !is_per_frame_call
        && config.sets_ability_target
        && (config.input == INPUT_BASIC_ATTACK || input_dir == Vec3::ZERO || is_bot)
    {
        let aim = auto_aim(world, config, owner, input_dir);
        if let Some(mut controller) = world.get_mut::<Controller>(owner) {
            controller.state.ability_target = aim.target;
        }
    }

    if !is_per_frame_call {
        if let Some(mut playable) = world.get_mut::<Playable>(owner) {
            playable.input_mut().ability_direction = Vec3::ZERO;
        }
    }

    // The instance carries the resolved target alongside the controller.
    instance.ability_target = world
        .get::<Controller>(owner)
        .and_then(|c| c.state.ability_target);
}

/// Where the target will be after `delay` seconds at its current velocity.
pub fn best_guess_position(controller: &Controller, transform: &Transform, delay: f32) -> Vec3 {
    transform.translation + controller.velocity * delay
}

/// Returns whether an ability poses a threat to the given target.
///
/// Consulted by the AI when weighing which ability to press. Optionally, as
/// a side effect, steers the bot's per-frame aim input toward the target and
/// scales the 0-250 charge-range byte by how far the predicted distance
/// exceeds the innermost damage-bound center.
pub fn is_a_threat_to(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    target: Entity,
    update_aiming: bool,
) -> bool {
    if config.behaviors.has(SpecialBehavior::IsAlwaysAThreat) {
        return true;
    }
    let Some(target_transform) = world.get::<Transform>(target).copied() else {
        return false;
    };
    let Some(owner_transform) = world.get::<Transform>(owner).copied() else {
        return false;
    };

    let (attack_delay, damage_reach, controllable_range, damage_center) = config.threat_params();

    // Reach window. An unset minimum opens the window below zero so
    // point-blank targets stay inside it.
    let min = if config.min_reach == 0.0 {
        -1.0
    } else {
        config.min_reach
    };
    let mut max = if config.max_reach <= min {
        min + 0.25
    } else {
        config.max_reach
    };

    // Bots shrink reach to the raw damage footprint when they cannot see
    // the target.
    if world.get::<Bot>(owner).is_some()
        && !config.bot_behaviors.has(BotBehavior::DoesntRequireVision)
        && view_to_target_is_obstructed(world, owner, target)
    {
        if max > damage_reach {
            max = damage_reach;
        }
        if max <= 0.0 {
            return false;
        }
    }

    let mut target_pos_after_delay = target_transform.translation;
    if let Some(target_controller) = world.get::<Controller>(target) {
        target_pos_after_delay =
            best_guess_position(target_controller, &target_transform, attack_delay);
    }
    let predicted_distance =
        flat_distance(owner_transform.translation, target_pos_after_delay);

    if update_aiming {
        if let Some(mut playable) = world.get_mut::<Playable>(owner) {
            playable.bot_input.ability_direction = flat(
                target_transform.translation - owner_transform.translation,
            )
            .normalize_or_zero();

            if controllable_range > 0.0 {
                let over = (predicted_distance - damage_center).clamp(0.0, controllable_range);
                let range = (over / controllable_range) * 100.0;
                if range > 0.0 && range <= 250.0 {
                    playable.bot_input.ability_range = range.round() as u8;
                }
            }
        }
    }

    if config.dont_predict_reach {
        let dist = flat_distance(owner_transform.translation, target_transform.translation);
        return dist <= max && dist >= min;
    }

    predicted_distance <= max && predicted_distance >= min
}
