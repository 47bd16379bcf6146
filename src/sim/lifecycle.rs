//! Ability Lifecycle State Machine
//!
//! Orchestrates Start -> per-tick Update -> End -> CleanUp for ability
//! instances, gated by the permission ledger and the cooldown calculator,
//! aimed by the targeting module, and chained by the sequencing sub-machine.
//!
//! Termination is cooperative: `interrupt_ability` and
//! `fast_forward_ability` only set marks; the driving scheduler observes the
//! marks and performs the actual End + CleanUp transition on its next pass.
//! Every entry point is a silent no-op on an already-ended instance.

use bevy::prelude::*;

use crate::combat::events::{AbilityNotification, AbilityPhase};

use super::abilities::{
    AbilityCallbackKind, ActivationKind, ButtonType, DamageBehavior, SequenceDecider,
    SpecialBehavior, UserStateRestriction,
};
use super::ability_config::{AbilityCatalog, AbilityConfig};
use super::components::{
    AbilityInstance, AbilityInventory, AbilitySlot, BrushUser, CarriedFlag, Controller,
    DamageZone, EffectExitCategory, EffectHandler, Energy, Health, ItemInventory, MatchInfo,
    Mount, Playable, PlayerStats, Profile, SimClock, Stealth,
};
use super::{cooldown, sequencing, targeting, variants, zones};
use super::{BRUSH_BREAK_LOCKOUT, CLICK_INTERRUPT_GRACE, SPAWN_GRACE};

// ============================================================================
// Usage Checks
// ============================================================================

/// Determines if the owner currently meets every criterion to activate the
/// ability. Pure predicate: no state changes, returns false on any missing
/// component.
pub fn can_use(world: &World, config: &AbilityConfig, owner: Entity) -> bool {
    let now = world.resource::<SimClock>().time;

    let Some(controller) = world.get::<Controller>(owner) else {
        // Without a controller we generally can't use an ability.
        return false;
    };

    // Spawn protection: no instant casts off the spawn pad.
    if now - controller.spawn_time < SPAWN_GRACE {
        return false;
    }

    if !has_sufficient_energy(world, config, owner) {
        return false;
    }
    if !check_contextual_restrictions(world, config, owner, controller, now) {
        return false;
    }
    check_controller_state(world, config, owner, controller)
}

fn has_sufficient_energy(world: &World, config: &AbilityConfig, owner: Entity) -> bool {
    if config.kind != ActivationKind::Utility {
        return true;
    }
    if let Some(energy) = world.get::<Energy>(owner) {
        return energy.current >= config.cost as f32;
    }
    true
}

fn check_contextual_restrictions(
    world: &World,
    config: &AbilityConfig,
    owner: Entity,
    controller: &Controller,
    now: f32,
) -> bool {
    if config.restrictions.has(UserStateRestriction::NotCarryingFlag)
        && world.get::<CarriedFlag>(owner).is_some()
    {
        return false;
    }

    if config.restrictions.has(UserStateRestriction::NotInCombat) && controller.is_in_combat(now) {
        return false;
    }

    true
}

fn check_controller_state(
    world: &World,
    config: &AbilityConfig,
    owner: Entity,
    controller: &Controller,
) -> bool {
    if config.behaviors.has(SpecialBehavior::CannotBeUsedIfRooted)
        && controller.parameters.cannot_use_motion
    {
        return false;
    }

    let dead = world
        .get::<Health>(owner)
        .map(|h| !h.is_alive())
        .unwrap_or(false);
    if dead && !config.behaviors.has(SpecialBehavior::UsableWhileDead) {
        return false;
    }
    if config.behaviors.has(SpecialBehavior::UsableWhileDead) {
        return true;
    }

    let ignore_knockback = !config
        .behaviors
        .has(SpecialBehavior::NotUsableWhileKnockedBack);

    match config.kind {
        ActivationKind::Jump => controller.can_jump(),
        ActivationKind::Ability => controller.can_use_ability(ignore_knockback),
        ActivationKind::Attack => controller.can_attack(ignore_knockback),
        ActivationKind::Dodge => controller.can_dodge(),
        ActivationKind::Utility | ActivationKind::ConsumeItem => {
            controller.can_use_utility(ignore_knockback)
        }
    }
}

// ============================================================================
// Execution Cycle (Start, Update, End, CleanUp)
// ============================================================================

/// Initializes the ability, consumes costs, resolves aim, materializes
/// zones, applies permissions, and fires the start notification.
/// Effect order matters: later steps read state earlier steps wrote.
pub fn start_ability(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &mut AbilityInstance,
) {
    if instance.has_ended {
        return;
    }

    // Resource consumption
    if config.kind == ActivationKind::Utility {
        if let Some(mut energy) = world.get_mut::<Energy>(owner) {
            energy.change(-(config.cost as f32));
        }
    }

    interrupt_previous_abilities(world, config, owner, instance);
    initialize_instance_state(world, config, owner, instance);
    handle_owner_controller_state(world, config, owner, instance);
    handle_mount_state(world, config, owner);

    // Zones
    create_damage_zones(world, config, owner, instance);
    create_motion_zones(world, config, owner, instance);
    link_damage_zone_history(world, config, owner);

    // Notifications
    world.send_event(AbilityNotification {
        owner,
        ability: config.id,
        input: instance.input,
        phase: AbilityPhase::Start,
        speed: instance.ability_speed,
    });

    // Permissions & stealth
    change_permissions(world, config, owner, true);
    consider_breaking_brush_stealth(world, config, owner);
    register_sequence_callbacks(world, config, owner, instance);

    variants::on_start(world, config, owner, instance);
}

/// Request interruption of every other active instance on the owner.
/// A request, not a synchronous termination: the marks resolve on the
/// driver's next pass.
fn interrupt_previous_abilities(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &AbilityInstance,
) {
    if config.behaviors.has(SpecialBehavior::DontInterruptAbilities) {
        return;
    }

    let slots = world
        .get::<AbilityInventory>(owner)
        .map(|inv| inv.slots.clone())
        .unwrap_or_default();

    for slot_entity in slots {
        let Some(mut other) = world.get_mut::<AbilityInstance>(slot_entity) else {
            continue;
        };
        if other.has_ended || other.input == instance.input {
            continue;
        }
        interrupt_ability(&mut other, 0.0);
    }
}

fn initialize_instance_state(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &mut AbilityInstance,
) {
    instance.is_bot = world
        .get::<Playable>(owner)
        .map(|p| p.is_bot)
        .unwrap_or(false);

    // Speed & timing
    instance.ability_speed = 1.0;
    if config.kind == ActivationKind::Attack
        && !config.behaviors.has(SpecialBehavior::IgnoreAttackSpeed)
    {
        if let Some(profile) = world.get::<Profile>(owner) {
            instance.ability_speed = profile.attack_speed;
        }
    }

    instance.cooldown_timer = cooldown::cooldown(config, world.get::<Profile>(owner));

    let reduce_duration = config.behaviors.has(SpecialBehavior::ReduceDurationWithFlag)
        && world.get::<CarriedFlag>(owner).is_some();
    instance.in_ability_timer = if reduce_duration {
        config.duration / 2.5
    } else {
        config.duration
    };

    instance.last_time_delay_used = 0.0;
    instance.time_elapsed = 0.0;
    instance.ability = config.id;
    instance.marks.clear();
    instance.owner = owner;
}

fn handle_owner_controller_state(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &mut AbilityInstance,
) {
    if world.get::<Controller>(owner).is_none() {
        return;
    }

    {
        let mut controller = world.get_mut::<Controller>(owner).unwrap();
        controller.parameters.distance_crossed_during_last_ability = 0.0;
        if config
            .behaviors
            .has(SpecialBehavior::DisabledCharacterCollision)
        {
            controller.permissions.no_character_collision += 1;
        }
    }

    targeting::face_intended_position(world, config, owner, instance, false);

    // Lock turning AFTER facing the intended position
    if config.behaviors.has(SpecialBehavior::CannotTurnDuring) {
        if let Some(mut controller) = world.get_mut::<Controller>(owner) {
            controller.state.cannot_turn = true;
        }
    }
}

fn handle_mount_state(world: &mut World, config: &AbilityConfig, owner: Entity) {
    if !config.dismounts {
        return;
    }
    if let Some(mut mount) = world.get_mut::<Mount>(owner) {
        mount.mounted = false;
    }
}

fn create_damage_zones(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &AbilityInstance,
) {
    // Projectile abilities carry their damage entries on the projectile
    // itself; only end-deferred entries materialize as zones.
    if matches!(
        config.variant,
        super::ability_config::AbilityVariant::Projectile { .. }
    ) {
        return;
    }

    for (index, spec) in config.damage.iter().enumerate() {
        if spec.behavior.has(DamageBehavior::SpawnsOnAbilityEnd)
            || spec
                .behavior
                .has(DamageBehavior::SpawnOnAbilityEndIfDealtDamage)
        {
            continue;
        }
        zones::materialize_damage_zone(world, config, spec, index, owner, instance);
    }
}

fn create_motion_zones(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &AbilityInstance,
) {
    if config.motion.is_empty() {
        return;
    }

    // A fresh ability motion replaces whatever motion still runs.
    zones::terminate_owner_motions(world, owner, None);

    let rooted = world
        .get::<Controller>(owner)
        .map(|c| c.parameters.cannot_use_motion)
        .unwrap_or(false);
    if rooted {
        return;
    }

    for spec in &config.motion {
        zones::materialize_motion(world, config, spec, owner, instance);
    }
}

fn link_damage_zone_history(world: &mut World, config: &AbilityConfig, owner: Entity) {
    if !config.damage_zones_share_history {
        return;
    }

    // Tag this ability's zones with the shared history id.
    let mut tagged: Vec<Entity> = Vec::new();
    {
        let mut query = world.query::<(Entity, &DamageZone)>();
        for (entity, zone) in query.iter(world) {
            if zone.owner == owner && zone.source_ability == config.id {
                tagged.push(entity);
            }
        }
    }
    tagged.sort_unstable();
    for entity in &tagged {
        if let Some(mut zone) = world.get_mut::<DamageZone>(*entity) {
            zone.share_history_id = Some(config.id);
        }
    }

    // Seed empty histories from peers that already recorded hits.
    let mut merged: Vec<Entity> = Vec::new();
    {
        let mut query = world.query::<&DamageZone>();
        for zone in query.iter(world) {
            if zone.owner == owner && zone.share_history_id == Some(config.id) {
                merged.extend(zone.hit_history.iter().copied());
            }
        }
    }
    merged.sort_unstable();
    merged.dedup();
    for entity in &tagged {
        if let Some(mut zone) = world.get_mut::<DamageZone>(*entity) {
            if zone.hit_history.is_empty() {
                zone.hit_history = merged.clone();
            }
        }
    }
}

/// Apply (or revoke) the permission ledger changes for this ability: every
/// capability the config does not grant is locked by one count, and the
/// global in-ability counters move with it.
pub fn change_permissions(world: &mut World, config: &AbilityConfig, owner: Entity, add: bool) {
    let modifier: i32 = if add { 1 } else { -1 };

    if let Some(mut controller) = world.get_mut::<Controller>(owner) {
        let grant = &config.permissions;
        let permissions = &mut controller.permissions;
        if !grant.movement {
            permissions.movement += modifier;
        }
        if !grant.ability {
            permissions.ability += modifier;
        }
        if !grant.utility {
            permissions.utility += modifier;
        }
        if !grant.attack {
            permissions.attack += modifier;
        }
        if grant.no_rotate {
            permissions.no_rotate += modifier;
        }
        if grant.no_character_collision {
            permissions.no_character_collision += modifier;
        }
        permissions.debug_validate();

        controller.in_ability_count += modifier;
    }

    if let Some(mut inventory) = world.get_mut::<AbilityInventory>(owner) {
        inventory.in_ability_count += modifier;
    }
}

/// Using an ability while hidden in a brush usually reveals the user, with a
/// short lockout before the brush hides them again.
fn consider_breaking_brush_stealth(world: &mut World, config: &AbilityConfig, owner: Entity) {
    if config
        .behaviors
        .has(SpecialBehavior::DoesntBreakBrushStealth)
    {
        return;
    }

    if let Some(brush_user) = world.get::<BrushUser>(owner) {
        if !brush_user.in_brush {
            return;
        }
    }

    let now = world.resource::<SimClock>().time;
    if let Some(mut stealth) = world.get_mut::<Stealth>(owner) {
        stealth.brush_lockout = now + BRUSH_BREAK_LOCKOUT;
        if stealth.brush_stealth {
            stealth.brush_stealth = false;
        }
    }
}

/// Subscribe the instance (and the owner's inventory aggregate) to the
/// outcome callbacks its sequence entries need.
fn register_sequence_callbacks(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &mut AbilityInstance,
) {
    for step in &config.sequence {
        match step.decider {
            SequenceDecider::DealtDamage => {
                instance.callbacks.subscribe(AbilityCallbackKind::DealtDamage)
            }
            SequenceDecider::ReceivedDamage => {
                instance.callbacks.subscribe(AbilityCallbackKind::ReceivedDamage)
            }
            _ => {}
        }
    }

    if let Some(mut inventory) = world.get_mut::<AbilityInventory>(owner) {
        let callbacks = instance.callbacks;
        inventory.callbacks.merge(callbacks);
    }
}

/// Per-tick ability logic: bot behavior hooks or player hold-aiming, then
/// sequencing, then the variant's own update.
pub fn update_ability(
    world: &mut World,
    catalog: &AbilityCatalog,
    config: &AbilityConfig,
    instance: &mut AbilityInstance,
) {
    if instance.has_ended {
        return;
    }

    if instance.is_bot {
        super::bot::handle_unique_bot_behavior(world, config, instance);
    } else if config.button == ButtonType::Hold {
        // Hold abilities keep tracking the held aim direction.
        let owner = instance.owner;
        let aim = world
            .get::<Playable>(owner)
            .map(|p| p.input().ability_direction)
            .unwrap_or(Vec3::ZERO);
        let can_rotate = world
            .get::<Controller>(owner)
            .map(|c| c.can_rotate())
            .unwrap_or(false);
        if can_rotate && aim != Vec3::ZERO {
            targeting::rotate_owner(world, owner, aim);
            if let Some(mut controller) = world.get_mut::<Controller>(owner) {
                controller.state.ability_direction = aim;
            }
        }
    }

    sequencing::sequence_if_needed(world, catalog, config, instance, false);
    variants::on_update(world, config, instance);
}

/// Terminates the ability: end notification, then the end-time sequencing
/// pass. Cleanup is separate and always follows.
pub fn end_ability(
    world: &mut World,
    catalog: &AbilityCatalog,
    config: &AbilityConfig,
    instance: &mut AbilityInstance,
) {
    if instance.has_ended {
        return;
    }

    world.send_event(AbilityNotification {
        owner: instance.owner,
        ability: config.id,
        input: instance.input,
        phase: AbilityPhase::End,
        speed: instance.ability_speed,
    });

    sequencing::sequence_if_needed(world, catalog, config, instance, true);
}

/// Final cleanup. Sets the terminal flag first, making double cleanup a
/// no-op, then unwinds everything `start_ability` set up, in reverse
/// dependency order.
pub fn clean_up(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &mut AbilityInstance,
) {
    if instance.has_ended {
        return;
    }
    instance.has_ended = true;

    // Reset bot aim input
    if let Some(mut playable) = world.get_mut::<Playable>(owner) {
        if playable.is_bot {
            playable.bot_input.ability_direction = Vec3::ZERO;
        }
    }

    record_usage_stats(world, owner);
    change_permissions(world, config, owner, false);
    create_damage_zones_at_end(world, config, owner, instance);

    // Unwind controller state
    if world.get::<Controller>(owner).is_some() {
        let crossed = {
            let mut controller = world.get_mut::<Controller>(owner).unwrap();
            if config
                .behaviors
                .has(SpecialBehavior::DisabledCharacterCollision)
            {
                controller.permissions.no_character_collision -= 1;
            }
            if config.behaviors.has(SpecialBehavior::CannotTurnDuring) {
                controller.state.cannot_turn = false;
            }
            if !config.motion.is_empty() {
                controller.parameters.ability_motion = Vec3::ZERO;
            }
            if instance.gravity_was_disabled {
                controller.parameters.gravity_active = true;
            }
            controller.permissions.debug_validate();
            controller.parameters.distance_crossed_during_last_ability
        };

        if crossed > 0.0 {
            if let Some(mut profile) = world.get_mut::<Profile>(owner) {
                profile.ability_distance_crossed += crossed;
            }
            if let Some(mut items) = world.get_mut::<ItemInventory>(owner) {
                items.ability_distance_crossed += crossed;
            }
        }
    }

    cleanup_entities_and_effects(world, config, owner);
}

fn record_usage_stats(world: &mut World, owner: Entity) {
    let tracked = world
        .resource::<MatchInfo>()
        .participants
        .contains(&owner);
    if tracked {
        if let Some(mut stats) = world.get_mut::<PlayerStats>(owner) {
            stats.abilities_used += 1;
        }
    }
}

fn create_damage_zones_at_end(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
    instance: &AbilityInstance,
) {
    let mut created = false;
    for (index, spec) in config.damage.iter().enumerate() {
        let deferred = spec.behavior.has(DamageBehavior::SpawnsOnAbilityEnd)
            || (instance.dealt_damage
                && spec
                    .behavior
                    .has(DamageBehavior::SpawnOnAbilityEndIfDealtDamage));
        if deferred {
            created = true;
            zones::materialize_damage_zone(world, config, spec, index, owner, instance);
        }
    }

    if created {
        link_damage_zone_history(world, config, owner);
    }
}

fn cleanup_entities_and_effects(world: &mut World, config: &AbilityConfig, owner: Entity) {
    // Destroy zones bound to this ability's end
    let mut doomed: Vec<Entity> = Vec::new();
    {
        let mut query = world.query::<(Entity, &DamageZone)>();
        for (entity, zone) in query.iter(world) {
            if zone.owner == owner && zone.destroy_on_ability_end == Some(config.id) {
                doomed.push(entity);
            }
        }
    }
    doomed.sort_unstable();
    for entity in doomed {
        world.despawn(entity);
    }

    // Remove ability-bound effects
    if let Some(mut handler) = world.get_mut::<EffectHandler>(owner) {
        let category = match config.kind {
            ActivationKind::Ability => EffectExitCategory::ExitAbility,
            ActivationKind::Attack => EffectExitCategory::ExitAttack,
            ActivationKind::ConsumeItem => EffectExitCategory::ExitConsumeItem,
            // Jump, Dodge, Utility share the utility bucket.
            _ => EffectExitCategory::ExitUtility,
        };
        handler.remove_by_exit_category(category);
    }

    // Terminate motion still attached to this ability
    if !config.motion.is_empty() {
        zones::terminate_owner_motions(world, owner, Some(config.id));
    }
}

// ============================================================================
// Outcome Callbacks
// ============================================================================

/// The owner has dealt ability damage. Flags the live instance that created
/// the damage; entries flagged to terminate on damage fast-forward it.
pub fn on_dealt_ability_damage(
    world: &mut World,
    owner: Entity,
    ability: super::abilities::AbilityId,
    terminates: bool,
) {
    for slot_entity in owner_slots(world, owner) {
        let Some(mut instance) = world.get_mut::<AbilityInstance>(slot_entity) else {
            continue;
        };
        if instance.has_ended || instance.ability != ability {
            continue;
        }
        instance.dealt_damage = true;
        if terminates {
            fast_forward_ability(&mut instance);
        }
    }
}

/// The owner has received ability damage. Every live instance on the owner
/// learns about it.
pub fn on_received_ability_damage(world: &mut World, owner: Entity) {
    for slot_entity in owner_slots(world, owner) {
        let Some(mut instance) = world.get_mut::<AbilityInstance>(slot_entity) else {
            continue;
        };
        if !instance.has_ended {
            instance.received_damage = true;
        }
    }
}

fn owner_slots(world: &mut World, owner: Entity) -> Vec<Entity> {
    let mut slots: Vec<Entity> = Vec::new();
    {
        let mut query = world.query::<(Entity, &AbilitySlot)>();
        for (entity, slot) in query.iter(world) {
            if slot.owner == owner {
                slots.push(entity);
            }
        }
    }
    slots.sort_unstable();
    slots
}

// ============================================================================
// Marks
// ============================================================================

/// Request interruption of an active ability. A deferred mark, not a
/// synchronous termination. A supplied lockout can raise the remaining
/// cooldown but never lower it.
pub fn interrupt_ability(instance: &mut AbilityInstance, lockout: f32) {
    instance.marks.interruption = true;
    if lockout > 0.0 && instance.cooldown_timer < lockout {
        instance.cooldown_timer = lockout;
    }
}

/// Request that the ability skip its remaining duration and complete its
/// lifecycle on the driver's next pass. Not an interrupt.
pub fn fast_forward_ability(instance: &mut AbilityInstance) {
    instance.marks.fast_forward = true;
}

/// Handle a press on a slot that is still cooling down: flagged abilities
/// cut their running instance short, after a short grace period (hold
/// buttons skip the grace check).
pub fn clicked_while_on_cd(config: &AbilityConfig, instance: &mut AbilityInstance) {
    if !config
        .behaviors
        .has(SpecialBehavior::ClickingOnCdInterrupts)
    {
        return;
    }
    if instance.time_elapsed < CLICK_INTERRUPT_GRACE && config.button != ButtonType::Hold {
        return;
    }
    fast_forward_ability(instance);
}

// ============================================================================
// Slot helpers
// ============================================================================

/// Equip a set of abilities on an owner, spawning one slot entity per input.
/// Slots start idle and off cooldown.
pub fn equip_abilities(
    world: &mut World,
    owner: Entity,
    abilities: &[(u8, super::abilities::AbilityId)],
) -> Vec<Entity> {
    let mut slots = Vec::new();
    for (input, ability) in abilities {
        let slot = world
            .spawn((
                AbilitySlot {
                    owner,
                    input: *input,
                    ability: *ability,
                },
                AbilityInstance::idle(owner, *ability, *input),
            ))
            .id();
        slots.push(slot);
    }

    if let Some(mut inventory) = world.get_mut::<AbilityInventory>(owner) {
        inventory.slots = slots.clone();
    }
    slots
}
