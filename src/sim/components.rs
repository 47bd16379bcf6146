//! Component Definitions for the Combat Simulation
//!
//! This module contains all ECS components, resources, and data structures
//! used by the ability engine and its supporting systems.

use bevy::prelude::*;
use rand::prelude::*;
use rand::rngs::StdRng;
use smallvec::SmallVec;

use super::abilities::{AbilityCallbackKind, AbilityId, DamageBehavior, FlagSet, MotionFlag};
use super::ability_config::DamageShape;
use super::{COMBAT_RECENCY_WINDOW, TICK_RATE};

// ============================================================================
// Resources
// ============================================================================

/// Seeded random number generator for deterministic match simulation.
///
/// When a seed is provided (e.g., via headless config), the same seed will
/// always produce the same match outcome. Without a seed, uses system entropy.
/// The stream is shared by every consumer and must be drawn from in a fixed
/// order each tick.
#[derive(Resource)]
pub struct GameRng {
    rng: StdRng,
    /// The seed used to initialize this RNG (if deterministic)
    pub seed: Option<u64>,
}

impl GameRng {
    /// Create a new GameRng with a specific seed for deterministic behavior
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// Create a new GameRng with random entropy (non-deterministic)
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            seed: None,
        }
    }

    /// Generate a random f32 in the range [0.0, 1.0)
    pub fn random_f32(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Generate a random f32 in the given range
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.random_f32() * (max - min)
    }

    /// Generate a random integer in the inclusive range [min, max]
    pub fn random_inclusive(&mut self, min: i32, max: i32) -> i32 {
        self.rng.gen_range(min..=max)
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Fixed-step simulation clock. One logical pass of every system per tick.
#[derive(Resource, Default, Clone, Copy)]
pub struct SimClock {
    pub tick: u64,
    /// Seconds of simulated time since the match started.
    pub time: f32,
}

impl SimClock {
    /// Fixed delta applied every tick.
    pub fn dt(&self) -> f32 {
        1.0 / TICK_RATE
    }

    pub fn advance(&mut self) {
        self.tick += 1;
        self.time += self.dt();
    }
}

/// Tracked match participants; only these accrue usage statistics.
#[derive(Resource, Default)]
pub struct MatchInfo {
    pub participants: Vec<Entity>,
}

// ============================================================================
// Character Components
// ============================================================================

/// Team identifier.
#[derive(Component, Clone, Copy, PartialEq, Eq, Debug)]
pub struct Team {
    pub team: u8,
}

/// Health pool. An entity with current <= 0 is dead but may linger
/// (revives, death-recap cameras) until something despawns it.
#[derive(Component, Clone, Debug)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    /// Simulation time of the last direct ability hit taken.
    pub last_direct_hit_time: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            last_direct_hit_time: f32::NEG_INFINITY,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }
}

/// Energy pool consumed by utility abilities.
#[derive(Component, Clone, Debug)]
pub struct Energy {
    pub current: f32,
    pub max: f32,
}

impl Energy {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn change(&mut self, delta: f32) {
        self.current = (self.current + delta).clamp(0.0, self.max);
    }
}

/// Character stat sheet. Stats are snapshots the engine reads; progression
/// systems own the writes.
#[derive(Component, Clone, Debug)]
pub struct Profile {
    /// General cooldown reduction, as a fraction of base cooldown.
    pub cdr: f32,
    /// Extra cooldown reduction applied only to the ultimate slot.
    pub ultimate_cdr: f32,
    /// Attack-speed multiplier applied to attack-kind abilities.
    pub attack_speed: f32,
    pub move_speed: f32,
    pub attack_power: f32,
    pub ability_power: f32,
    /// Companion-pet quality tier, 0-8. Scales flagged cooldowns.
    pub pet_quality: i32,
    /// Total distance crossed under ability motions, for progression tracking.
    pub ability_distance_crossed: f32,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            cdr: 0.0,
            ultimate_cdr: 0.0,
            attack_speed: 1.0,
            move_speed: 5.0,
            attack_power: 0.0,
            ability_power: 0.0,
            pet_quality: 0,
            ability_distance_crossed: 0.0,
        }
    }
}

/// Marker: the entity is currently carrying a flag objective.
#[derive(Component, Default)]
pub struct CarriedFlag;

/// Rideable mount state.
#[derive(Component, Clone, Copy, Default)]
pub struct Mount {
    pub mounted: bool,
}

/// Concealment state. Brush stealth comes from standing in tall grass;
/// ability stealth from stealth-granting abilities.
#[derive(Component, Clone, Debug, Default)]
pub struct Stealth {
    pub brush_stealth: bool,
    pub ability_stealth: bool,
    /// Brush stealth cannot re-engage until this simulation time.
    pub brush_lockout: f32,
}

impl Stealth {
    pub fn is_stealth(&self) -> bool {
        self.brush_stealth || self.ability_stealth
    }
}

/// Tracks whether the entity currently stands inside a brush patch.
#[derive(Component, Clone, Copy, Default)]
pub struct BrushUser {
    pub in_brush: bool,
}

/// Static vision blocker used by line-of-sight checks.
#[derive(Component, Clone, Copy)]
pub struct Obstacle {
    pub radius: f32,
}

/// Per-match statistics for a tracked participant.
#[derive(Component, Clone, Copy, Default)]
pub struct PlayerStats {
    pub abilities_used: u32,
}

/// Item progression hooks fed by the ability engine.
#[derive(Component, Clone, Copy, Default)]
pub struct ItemInventory {
    /// Distance crossed under ability motions, accumulated for item triggers.
    pub ability_distance_crossed: f32,
}

/// AI memory for bot-controlled entities. Goal selection lives outside the
/// engine; the engine only reads the locked target.
#[derive(Component, Clone, Copy, Default)]
pub struct Bot {
    pub target: Option<Entity>,
}

// ============================================================================
// Input
// ============================================================================

/// One frame of intent, either from a player or synthesized by the AI.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    pub movement_direction: Vec3,
    /// Manual aim for the pending/active ability. Zero = no manual aim.
    pub ability_direction: Vec3,
    /// Aim range, 0-250, scaled down to [0, 2.5] at resolution time.
    pub ability_range: u8,
    /// Whether the ability button is currently held.
    pub ability_button_down: bool,
    /// Which input slot the held button maps to.
    pub ability_input: u8,
    /// Slot pressed this tick, if any. Consumed by the driver.
    pub pressed: Option<u8>,
}

/// Whoever is driving this character: a player or a bot. Bots write into
/// `bot_input`, which then flows through the same pipeline as player input.
#[derive(Component, Clone, Debug, Default)]
pub struct Playable {
    pub is_bot: bool,
    pub player_input: InputState,
    pub bot_input: InputState,
}

impl Playable {
    pub fn input(&self) -> &InputState {
        if self.is_bot {
            &self.bot_input
        } else {
            &self.player_input
        }
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        if self.is_bot {
            &mut self.bot_input
        } else {
            &mut self.player_input
        }
    }
}

// ============================================================================
// Controller & Permission Ledger
// ============================================================================

/// Signed lock counters gating character capabilities. A capability is
/// available while its counter is zero. Counters must never go negative;
/// a negative counter means a Start/CleanUp pairing bug.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CharacterPermissions {
    pub movement: i32,
    pub ability: i32,
    pub attack: i32,
    pub utility: i32,
    pub no_rotate: i32,
    pub no_character_collision: i32,
}

impl CharacterPermissions {
    pub fn debug_validate(&self) {
        debug_assert!(
            self.movement >= 0
                && self.ability >= 0
                && self.attack >= 0
                && self.utility >= 0
                && self.no_rotate >= 0
                && self.no_character_collision >= 0,
            "Permission ledger counter went negative: {:?}",
            self
        );
    }
}

/// Volatile controller state toggled by abilities.
#[derive(Clone, Debug)]
pub struct ControllerState {
    /// Current facing, unit vector on the ground plane.
    pub direction: Vec3,
    /// Resolved aim of the last activated ability (direction x range).
    pub ability_direction: Vec3,
    /// Homing target cached by aim resolution.
    pub ability_target: Option<Entity>,
    pub cannot_turn: bool,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            direction: Vec3::Z,
            ability_direction: Vec3::ZERO,
            ability_target: None,
            cannot_turn: false,
        }
    }
}

/// Controller scratch parameters abilities read and reset.
#[derive(Clone, Debug, Default)]
pub struct ControllerParams {
    pub distance_crossed_during_last_ability: f32,
    /// Velocity contribution of the active ability motion.
    pub ability_motion: Vec3,
    /// Rooted: forced motions cannot engage.
    pub cannot_use_motion: bool,
    pub gravity_active: bool,
}

/// Character controller: permission ledger, facing, movement state.
#[derive(Component, Clone, Debug)]
pub struct Controller {
    pub permissions: CharacterPermissions,
    pub state: ControllerState,
    pub parameters: ControllerParams,
    /// Number of abilities currently holding this controller.
    pub in_ability_count: i32,
    /// Basic-attack reach, used by auto-aim's close-range gate.
    pub attack_range: f32,
    /// Current velocity, units/sec. Feeds position prediction.
    pub velocity: Vec3,
    /// Remaining knockback time; most abilities are unusable during it.
    pub knockback_timer: f32,
    /// Simulation time this character spawned.
    pub spawn_time: f32,
    /// Simulation time of the last combat interaction.
    pub last_combat_time: f32,
}

impl Default for Controller {
    fn default() -> Self {
        Self {
            permissions: CharacterPermissions::default(),
            state: ControllerState::default(),
            parameters: ControllerParams {
                gravity_active: true,
                ..Default::default()
            },
            in_ability_count: 0,
            attack_range: 2.0,
            velocity: Vec3::ZERO,
            knockback_timer: 0.0,
            spawn_time: 0.0,
            last_combat_time: f32::NEG_INFINITY,
        }
    }
}

impl Controller {
    pub fn can_move(&self) -> bool {
        self.permissions.movement == 0
    }

    pub fn can_jump(&self) -> bool {
        self.permissions.movement == 0
    }

    pub fn can_dodge(&self) -> bool {
        self.permissions.movement == 0 && self.knockback_timer <= 0.0
    }

    pub fn can_use_ability(&self, ignore_knockback: bool) -> bool {
        self.permissions.ability == 0 && (ignore_knockback || self.knockback_timer <= 0.0)
    }

    pub fn can_attack(&self, ignore_knockback: bool) -> bool {
        self.permissions.attack == 0 && (ignore_knockback || self.knockback_timer <= 0.0)
    }

    pub fn can_use_utility(&self, ignore_knockback: bool) -> bool {
        self.permissions.utility == 0 && (ignore_knockback || self.knockback_timer <= 0.0)
    }

    pub fn can_rotate(&self) -> bool {
        !self.state.cannot_turn && self.permissions.no_rotate == 0
    }

    pub fn is_in_combat(&self, now: f32) -> bool {
        now - self.last_combat_time < COMBAT_RECENCY_WINDOW
    }

    /// Point the controller (and its transform) along `direction`.
    pub fn rotate_controller(&mut self, transform: &mut Transform, direction: Vec3) {
        let flat = Vec3::new(direction.x, 0.0, direction.z);
        if let Some(unit) = flat.try_normalize() {
            self.state.direction = unit;
            transform.rotation = Quat::from_rotation_y(unit.x.atan2(unit.z));
        }
    }

    /// Where this character will be after `ticks` simulation ticks, assuming
    /// it keeps its current velocity.
    pub fn predicted_position(&self, transform: &Transform, ticks: i32) -> Vec3 {
        transform.translation + self.velocity * (ticks as f32 / TICK_RATE)
    }
}

// ============================================================================
// Ability Instances & Inventory
// ============================================================================

/// Deferred termination requests. Set now, honored by the driver on its next
/// pass; setting a mark twice is harmless.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AbilityMarks {
    pub interruption: bool,
    pub fast_forward: bool,
}

impl AbilityMarks {
    pub fn any(&self) -> bool {
        self.interruption || self.fast_forward
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Which outcome callbacks an instance subscribed to at start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AbilityCallbacks {
    pub dealt_damage: bool,
    pub received_damage: bool,
}

impl AbilityCallbacks {
    pub fn subscribe(&mut self, kind: AbilityCallbackKind) {
        match kind {
            AbilityCallbackKind::DealtDamage => self.dealt_damage = true,
            AbilityCallbackKind::ReceivedDamage => self.received_damage = true,
        }
    }

    pub fn merge(&mut self, other: AbilityCallbacks) {
        self.dealt_damage |= other.dealt_damage;
        self.received_damage |= other.received_damage;
    }
}

/// Variant-private working state. Each concrete ability kind keeps its own
/// typed payload here instead of sharing scratch fields.
#[derive(Clone, Copy, Debug, Default)]
pub enum VariantState {
    #[default]
    None,
    Teleport {
        destination: Vec3,
    },
    Projectile {
        spawned: Option<Entity>,
    },
}

/// One live (or cooling-down) activation of an ability on one owner.
///
/// Lives on a slot entity and is recycled across activations: activation
/// resets the volatile fields, cleanup sets `has_ended`, and the cooldown
/// timer keeps counting down on the ended instance.
#[derive(Component, Clone, Debug)]
pub struct AbilityInstance {
    pub owner: Entity,
    pub ability: AbilityId,
    pub input: u8,
    pub is_bot: bool,
    pub time_elapsed: f32,
    /// Latch for delayed one-shot variant effects (projectile spawn,
    /// teleport application).
    pub last_time_delay_used: f32,
    /// Remaining active duration.
    pub in_ability_timer: f32,
    /// Remaining cooldown. Ticks down even after the instance ends.
    pub cooldown_timer: f32,
    pub ability_speed: f32,
    /// Resolved aim: unit direction scaled by normalized range.
    pub ability_direction: Vec3,
    pub ability_target: Option<Entity>,
    pub dealt_damage: bool,
    pub received_damage: bool,
    /// Terminal flag: once set, no lifecycle call mutates this instance.
    pub has_ended: bool,
    pub marks: AbilityMarks,
    pub callbacks: AbilityCallbacks,
    pub gravity_was_disabled: bool,
    pub variant_state: VariantState,
}

impl AbilityInstance {
    /// An idle slot instance: ended, off cooldown, owned but inert.
    pub fn idle(owner: Entity, ability: AbilityId, input: u8) -> Self {
        Self {
            owner,
            ability,
            input,
            is_bot: false,
            time_elapsed: 0.0,
            last_time_delay_used: 0.0,
            in_ability_timer: 0.0,
            cooldown_timer: 0.0,
            ability_speed: 1.0,
            ability_direction: Vec3::ZERO,
            ability_target: None,
            dealt_damage: false,
            received_damage: false,
            has_ended: true,
            marks: AbilityMarks::default(),
            callbacks: AbilityCallbacks::default(),
            gravity_was_disabled: false,
            variant_state: VariantState::None,
        }
    }

    /// Rearm the slot instance for a fresh activation.
    pub fn rearm(&mut self, ability: AbilityId, input: u8) {
        self.ability = ability;
        self.input = input;
        self.is_bot = false;
        self.time_elapsed = 0.0;
        self.last_time_delay_used = 0.0;
        self.in_ability_timer = 0.0;
        self.cooldown_timer = 0.0;
        self.ability_speed = 1.0;
        self.ability_direction = Vec3::ZERO;
        self.ability_target = None;
        self.dealt_damage = false;
        self.received_damage = false;
        self.has_ended = false;
        self.marks.clear();
        self.callbacks = AbilityCallbacks::default();
        self.gravity_was_disabled = false;
        self.variant_state = VariantState::None;
    }
}

/// One equipped input slot. The slot entity also carries the recycled
/// `AbilityInstance`.
#[derive(Component, Clone, Debug)]
pub struct AbilitySlot {
    pub owner: Entity,
    pub input: u8,
    /// The ability this slot is bound to.
    pub ability: AbilityId,
}

/// Pending follow-up decided by the sequencing sub-machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequencedAbility {
    pub input: u8,
    pub ability: AbilityId,
}

/// The owner-side aggregate over all equipped slots.
#[derive(Component, Clone, Debug, Default)]
pub struct AbilityInventory {
    /// Slot entities, in input order.
    pub slots: Vec<Entity>,
    /// Follow-up the driver should chain into on its next pass.
    pub sequenced_ability: Option<SequencedAbility>,
    /// Buffered attack-combo continuation and its remaining window.
    pub last_attack: Option<AbilityId>,
    pub last_attack_timer: f32,
    /// Number of this owner's abilities currently in progress.
    pub in_ability_count: i32,
    /// Union of all active instances' callback subscriptions; lets damage
    /// systems skip owners with nothing subscribed.
    pub callbacks: AbilityCallbacks,
}

// ============================================================================
// Effects
// ============================================================================

/// When an owner-bound effect is force-removed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EffectExitCategory {
    ExitAbility,
    ExitAttack,
    ExitConsumeItem,
    ExitUtility,
}

/// A timed or ability-bound effect on a character.
#[derive(Clone, Debug)]
pub struct ActiveEffect {
    pub id: u32,
    pub remove_on: Option<EffectExitCategory>,
}

/// Effects attached to a character. Typical counts are tiny, so the list
/// lives inline.
#[derive(Component, Clone, Debug, Default)]
pub struct EffectHandler {
    pub effects: SmallVec<[ActiveEffect; 8]>,
}

impl EffectHandler {
    pub fn remove_by_exit_category(&mut self, category: EffectExitCategory) {
        self.effects.retain(|e| e.remove_on != Some(category));
    }
}

// ============================================================================
// Engine-Spawned Entities
// ============================================================================

/// A timed damage area materialized by an ability. Position lives in the
/// entity's `Transform`.
#[derive(Component, Clone, Debug)]
pub struct DamageZone {
    pub owner: Entity,
    pub team: u8,
    pub source_ability: AbilityId,
    pub damage_index: u8,
    /// Resolved damage (base + stat ratios), computed at materialization.
    pub value: f32,
    /// Remaining wind-up before the zone goes live.
    pub delay: f32,
    /// Remaining live time once active.
    pub lifespan: f32,
    pub shape: DamageShape,
    pub half_extents: Vec2,
    /// Forward orientation of the footprint.
    pub direction: Vec3,
    pub behavior: FlagSet<DamageBehavior>,
    /// Offset from the owner, for zones that follow owner movement.
    pub follow_offset: Vec3,
    /// Zones sharing this id also share one hit history.
    pub share_history_id: Option<AbilityId>,
    /// Entities already hit; a zone never hits the same entity twice.
    pub hit_history: Vec<Entity>,
    /// Destroyed when the named ability cleans up.
    pub destroy_on_ability_end: Option<AbilityId>,
}

/// A forced motion applied to a character (dash, lunge, knockback).
#[derive(Component, Clone, Debug)]
pub struct Motion {
    /// The character being moved.
    pub entity: Entity,
    /// World-space velocity, resolved from the ability aim at materialization.
    pub velocity: Vec3,
    pub distance: f32,
    pub stop_distance: f32,
    /// Remaining wind-up before the motion engages.
    pub delay: f32,
    /// Fraction of force left as residual velocity on natural termination.
    pub residual: f32,
    pub flags: FlagSet<MotionFlag>,
    /// The ability that created this motion; None for external knockbacks.
    pub ability_id: Option<AbilityId>,
    /// Interrupt this ability when the motion terminates naturally.
    pub interrupt_id: Option<AbilityId>,
    pub crossed: f32,
    pub terminated: bool,
}

/// A live projectile fired by a Projectile-variant ability.
#[derive(Component, Clone, Debug)]
pub struct ProjectileEntity {
    pub owner: Entity,
    pub team: u8,
    pub source_ability: AbilityId,
    pub damage_index: usize,
    pub direction: Vec3,
    pub speed: f32,
    pub lifespan: f32,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let seed = 42;
        let mut rng1 = GameRng::from_seed(seed);
        let mut rng2 = GameRng::from_seed(seed);

        for _ in 0..100 {
            assert_eq!(rng1.random_f32(), rng2.random_f32());
            assert_eq!(
                rng1.random_inclusive(0, 100),
                rng2.random_inclusive(0, 100)
            );
        }
    }

    #[test]
    fn test_different_seeds_produce_different_results() {
        let mut rng1 = GameRng::from_seed(1);
        let mut rng2 = GameRng::from_seed(2);
        assert_ne!(rng1.random_f32(), rng2.random_f32());
    }

    #[test]
    fn test_random_inclusive_bounds() {
        let mut rng = GameRng::from_seed(123);
        for _ in 0..200 {
            let value = rng.random_inclusive(0, 100);
            assert!((0..=100).contains(&value));
        }
    }

    #[test]
    fn test_clock_advances_fixed_step() {
        let mut clock = SimClock::default();
        for _ in 0..30 {
            clock.advance();
        }
        assert_eq!(clock.tick, 30);
        assert!((clock.time - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_instance_rearm_clears_volatile_state() {
        let owner = Entity::from_raw(1);
        let mut instance = AbilityInstance::idle(owner, AbilityId(3), 1);
        instance.dealt_damage = true;
        instance.marks.fast_forward = true;
        instance.cooldown_timer = 4.0;

        instance.rearm(AbilityId(5), 2);

        assert!(!instance.has_ended);
        assert!(!instance.dealt_damage);
        assert!(!instance.marks.any());
        assert_eq!(instance.cooldown_timer, 0.0);
        assert_eq!(instance.ability, AbilityId(5));
        assert_eq!(instance.owner, owner);
    }

    #[test]
    fn test_effect_handler_removes_by_category() {
        let mut handler = EffectHandler::default();
        handler.effects.push(ActiveEffect {
            id: 1,
            remove_on: Some(EffectExitCategory::ExitAttack),
        });
        handler.effects.push(ActiveEffect {
            id: 2,
            remove_on: Some(EffectExitCategory::ExitUtility),
        });
        handler.effects.push(ActiveEffect {
            id: 3,
            remove_on: None,
        });

        handler.remove_by_exit_category(EffectExitCategory::ExitAttack);

        let remaining: Vec<u32> = handler.effects.iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec![2, 3]);
    }

    #[test]
    fn test_controller_rotation_gate() {
        let mut controller = Controller::default();
        assert!(controller.can_rotate());
        controller.state.cannot_turn = true;
        assert!(!controller.can_rotate());
        controller.state.cannot_turn = false;
        controller.permissions.no_rotate = 1;
        assert!(!controller.can_rotate());
    }
}
