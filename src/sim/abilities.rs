//! Ability System - Types and Enums
//!
//! This module contains ability-related types, enums, and flag sets.
//! Actual ability definitions are loaded from `assets/config/abilities.ron`
//! via the `ability_config` module.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Stable numeric identity of an ability definition.
///
/// Used for catalog lookups, sequencing references, and tagging spawned
/// damage zones / motions back to the ability that created them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityId(pub u32);

impl std::fmt::Display for AbilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which activation family an ability belongs to.
///
/// The family decides the resource check (Utility abilities cost energy),
/// the controller readiness predicate consulted by `can_use`, and which
/// effect-removal bucket applies at cleanup.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ActivationKind {
    Jump,
    Ability,
    Attack,
    Dodge,
    Utility,
    ConsumeItem,
}

/// How the ability's input button is driven.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum ButtonType {
    #[default]
    Standard,
    /// Player drags to aim before releasing.
    Aimable,
    /// Held to charge, released to fire.
    Charged,
    /// Held continuously; the ability re-aims toward the held direction every tick.
    Hold,
}

/// Special behaviors toggled per ability definition.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SpecialBehavior {
    /// Starting this ability does not interrupt the owner's previous ability.
    DontInterruptAbilities,
    /// Attack-kind abilities normally run at the owner's attack-speed stat; this opts out.
    IgnoreAttackSpeed,
    /// Flip the owner's facing 180 degrees before aim resolution.
    InvertFacingOnStart,
    /// Threat evaluation always reports true regardless of range.
    IsAlwaysAThreat,
    /// Owner cannot turn while the ability is active (applied after facing resolution).
    CannotTurnDuring,
    /// Duration is divided by 2.5 while the owner carries a flag.
    ReduceDurationWithFlag,
    UsableWhileDead,
    NotUsableWhileKnockedBack,
    /// Clicking the slot while it cools down fast-forwards the running instance.
    ClickingOnCdInterrupts,
    /// Owner ignores character-vs-character collision while active.
    DisabledCharacterCollision,
    CannotBeUsedIfRooted,
    /// Effective cooldown is scaled by the owner's pet quality tier.
    CdScalesWithPetQuality,
    DoesntBreakBrushStealth,
    NoAutoAim,
}

/// Owner-state restrictions checked by `can_use`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum UserStateRestriction {
    NotCarryingFlag,
    NotInCombat,
}

/// Per-ability hooks the AI runs while the ability is active.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum BotBehavior {
    /// Lerp facing toward the AI target every tick.
    KeepFacingTarget,
    /// Keep closing distance to the AI target while active.
    KeepMovingTowardTarget,
    /// Steer a live projectile entity toward the AI target.
    ControllableProjectile,
    /// Threat evaluation skips the line-of-sight reach shrink.
    DoesntRequireVision,
}

/// Behaviors of an individual damage entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum DamageBehavior {
    /// The zone tracks the owner's position instead of staying where spawned.
    FollowOwnerMovement,
    /// The zone is destroyed when the creating ability cleans up.
    DestroyOnAbilityEnd,
    /// Dealing damage with this entry fast-forwards the ability.
    TerminatesAbility,
    /// Deferred: materialized at cleanup instead of start.
    SpawnsOnAbilityEnd,
    /// Deferred, and only if the ability dealt damage at some point.
    SpawnOnAbilityEndIfDealtDamage,
}

/// Behaviors of a forced-motion entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum MotionFlag {
    /// Scale travel force by the magnitude of the resolved aim direction.
    DistanceByAbilityDirection,
    /// Passive idle motion; never terminated by ability start/cleanup sweeps.
    Hammock,
}

/// Deciders for sequencing entries (see `sequencing`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum SequenceDecider {
    /// True only when evaluated at ability end.
    #[default]
    AlwaysPlay,
    /// True only at end, with the configured odds out of 100.
    DiceRoll,
    /// True once elapsed time passes the threshold while the same button is held.
    BufferedInput,
    DealtDamage,
    ReceivedDamage,
    /// True only at end, when the ability never dealt damage.
    DidntDealDamage,
}

/// Outcome callbacks an ability instance can subscribe to at start.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AbilityCallbackKind {
    DealtDamage,
    ReceivedDamage,
}

/// A small ordered set of config flags.
///
/// Flag sets are tiny (almost always <= 4 entries) so they live inline in a
/// `SmallVec`. Serialized as a plain list in RON: `behaviors: [NoAutoAim]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagSet<T: PartialEq>(SmallVec<[T; 4]>);

impl<T: PartialEq> Default for FlagSet<T> {
    fn default() -> Self {
        Self(SmallVec::new())
    }
}

impl<T: PartialEq + Copy> FlagSet<T> {
    pub fn of(flags: &[T]) -> Self {
        Self(SmallVec::from_slice(flags))
    }

    /// Named predicate over the set; the hot path of every behavior check.
    pub fn has(&self, flag: T) -> bool {
        self.0.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which capabilities an ability leaves available to its owner while active.
///
/// For each of the four base capabilities NOT granted here, the permission
/// ledger counter is incremented at start and decremented at cleanup.
/// `no_rotate` and `no_character_collision` work the other way around: they
/// are opt-in locks, counted only when set.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct PermissionGrant {
    #[serde(default)]
    pub movement: bool,
    #[serde(default)]
    pub ability: bool,
    #[serde(default)]
    pub attack: bool,
    #[serde(default)]
    pub utility: bool,
    #[serde(default)]
    pub no_rotate: bool,
    #[serde(default)]
    pub no_character_collision: bool,
}

/// Input slot reserved for the basic attack. Basic attacks get the
/// close-range auto-aim rules and the out-of-cone redirect fallback.
pub const INPUT_BASIC_ATTACK: u8 = 1;

/// Input slot reserved for the ultimate; benefits from the ultimate CDR stat.
pub const INPUT_ULTIMATE: u8 = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_set_has() {
        let flags = FlagSet::of(&[SpecialBehavior::NoAutoAim, SpecialBehavior::CannotTurnDuring]);
        assert!(flags.has(SpecialBehavior::NoAutoAim));
        assert!(flags.has(SpecialBehavior::CannotTurnDuring));
        assert!(!flags.has(SpecialBehavior::UsableWhileDead));
    }

    #[test]
    fn test_empty_flag_set() {
        let flags: FlagSet<SpecialBehavior> = FlagSet::default();
        assert!(flags.is_empty());
        assert!(!flags.has(SpecialBehavior::NoAutoAim));
    }

    #[test]
    fn test_flag_set_ron_round_trip() {
        let flags = FlagSet::of(&[DamageBehavior::TerminatesAbility]);
        let text = ron::to_string(&flags).unwrap();
        let back: FlagSet<DamageBehavior> = ron::from_str(&text).unwrap();
        assert!(back.has(DamageBehavior::TerminatesAbility));
    }
}
