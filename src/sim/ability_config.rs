//! Data-Driven Ability Configuration
//!
//! Ability definitions are loaded from `assets/config/abilities.ron` instead
//! of being hardcoded. The catalog validates identity uniqueness and
//! sequencing references at startup, so a dangling follow-up reference is a
//! load error rather than a silent no-op mid-match.
//!
//! ## Usage
//! ```ignore
//! fn my_system(catalog: Res<AbilityCatalog>) {
//!     let config = catalog.get_unchecked(AbilityId(10));
//!     println!("{} cooldown: {}", config.name, config.cooldown);
//! }
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::abilities::{
    AbilityId, ActivationKind, BotBehavior, ButtonType, DamageBehavior, FlagSet, MotionFlag,
    PermissionGrant, SequenceDecider, SpecialBehavior, UserStateRestriction,
};

/// Shape of a damage zone's footprint on the ground plane.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum DamageShape {
    #[default]
    Box,
    Circle,
}

/// One damage entry of an ability. An ability may carry several (multi-hit
/// combos, trailing explosions, deferred end-of-ability zones).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DamageSpec {
    /// Flat base damage.
    pub value: i32,
    /// Damage added per point of the owner's attack power.
    #[serde(default)]
    pub attack_ratio: f32,
    /// Damage added per point of the owner's ability power.
    #[serde(default)]
    pub power_ratio: f32,
    /// Seconds into the ability before the zone becomes live.
    #[serde(default)]
    pub delay: f32,
    /// How long the zone stays live once active.
    #[serde(default = "default_zone_lifespan")]
    pub lifespan: f32,
    #[serde(default)]
    pub behavior: FlagSet<DamageBehavior>,
    #[serde(default)]
    pub shape: DamageShape,
    /// Footprint center, in owner-local space: (sideways, forward).
    #[serde(default)]
    pub center: [f32; 2],
    /// Footprint half-size: (half width, half length) or (radius, radius).
    #[serde(default = "default_zone_extents")]
    pub extents: [f32; 2],
    /// Extra forward reach granted by the player's aim range input.
    /// Doubles as the controllable span for charge-range steering.
    #[serde(default)]
    pub direction_bonus: f32,
    /// Aim range assumed when the player supplied no aim at all.
    #[serde(default = "default_direction_bonus")]
    pub default_direction_bonus: f32,
}

fn default_zone_lifespan() -> f32 {
    0.25
}

fn default_zone_extents() -> [f32; 2] {
    [0.5, 0.5]
}

fn default_direction_bonus() -> f32 {
    0.5
}

impl DamageSpec {
    /// Effective reach of this entry, measured from the owner.
    pub fn reach(&self) -> f32 {
        (self.extents[1] + self.center[1]) / 2.0
    }
}

/// One forced-motion entry of an ability (dashes, lunges, knock-backs on self).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotionSpec {
    /// Motion force, in owner-local space: (sideways, forward), units/sec.
    pub force: [f32; 2],
    /// Fraction of the force that lingers as velocity after natural termination.
    #[serde(default)]
    pub residual: f32,
    /// Total distance to cross before the motion terminates.
    pub distance: f32,
    /// Seconds into the ability before the motion engages.
    #[serde(default)]
    pub delay: f32,
    #[serde(default)]
    pub flags: FlagSet<MotionFlag>,
    /// Extra slack added to the stop distance check.
    #[serde(default)]
    pub stop_dist_bonus: f32,
    /// Interrupt the creating ability when this motion terminates naturally.
    #[serde(default)]
    pub interrupt_ability_on_end: bool,
}

/// One entry of an ability's sequencing list.
///
/// Entries are evaluated in declared order; the first satisfied entry with an
/// explicit follow-up wins. Follow-ups are referenced by ability name and
/// validated at catalog load.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SequenceStep {
    pub decider: SequenceDecider,
    /// Name of the follow-up ability, if this entry chains explicitly.
    #[serde(default)]
    pub next: Option<String>,
    /// Once elapsed time passes this, movement input cancels the ability
    /// (and gates the BufferedInput decider).
    #[serde(default)]
    pub skippable_after: f32,
    /// Odds out of 100 for the DiceRoll decider.
    #[serde(default)]
    pub dice_odds: u8,
}

/// Closed set of concrete ability kinds. Each variant holds only its own
/// extra configuration; shared lifecycle logic lives in `lifecycle` and
/// dispatches over this.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum AbilityVariant {
    /// No extra behavior beyond the shared lifecycle.
    #[default]
    Standard,
    /// Fires a projectile entity partway into the ability.
    Projectile {
        speed: f32,
        lifespan: f32,
        /// Seconds into the ability before the projectile spawns.
        #[serde(default)]
        delay: f32,
        /// Spawn offset in owner-local space, rotated by facing.
        #[serde(default)]
        offset: [f32; 2],
        /// Which damage entry the projectile applies on hit.
        #[serde(default)]
        damage_index: usize,
    },
    /// Relocates the owner partway into the ability.
    Teleport {
        /// Seconds into the ability before the owner actually moves.
        #[serde(default)]
        delay: f32,
        /// Destination offset in owner-local space, rotated by facing.
        #[serde(default)]
        location_offset: [f32; 2],
        /// Overrides ability speed.
        #[serde(default = "default_teleport_speed")]
        speed: f32,
        /// Minimum teleport distance added on top of the player's aim.
        #[serde(default)]
        range_bonus: f32,
    },
}

fn default_teleport_speed() -> f32 {
    1.0
}

/// Complete ability configuration loaded from RON.
///
/// Immutable and shared: the engine only ever reads these.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AbilityConfig {
    pub id: AbilityId,
    /// Display name; also the key sequencing references use.
    pub name: String,
    /// Input slot this ability binds to (1 = basic attack, 6 = ultimate).
    #[serde(default)]
    pub input: u8,
    pub kind: ActivationKind,
    #[serde(default)]
    pub button: ButtonType,
    /// Energy cost; only consumed by Utility-kind abilities.
    #[serde(default)]
    pub cost: i32,
    /// Base cooldown in seconds, before stat reduction.
    #[serde(default)]
    pub cooldown: f32,
    /// Active duration in seconds.
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub permissions: PermissionGrant,
    #[serde(default)]
    pub restrictions: FlagSet<UserStateRestriction>,
    #[serde(default)]
    pub behaviors: FlagSet<SpecialBehavior>,
    /// Whether aim resolution records a homing target on the controller.
    #[serde(default = "default_true")]
    pub sets_ability_target: bool,
    #[serde(default)]
    pub dismounts: bool,
    #[serde(default)]
    pub damage: Vec<DamageSpec>,
    /// Zones from this ability share one hit-history list.
    #[serde(default)]
    pub damage_zones_share_history: bool,
    #[serde(default)]
    pub motion: Vec<MotionSpec>,
    /// How far the ability can reach; used by AI threat evaluation.
    #[serde(default)]
    pub max_reach: f32,
    /// Minimum range before the AI considers this ability a threat.
    #[serde(default)]
    pub min_reach: f32,
    /// Threat check uses the target's current position, not the predicted one.
    #[serde(default)]
    pub dont_predict_reach: bool,
    #[serde(default)]
    pub bot_behaviors: FlagSet<BotBehavior>,
    #[serde(default)]
    pub sequence: Vec<SequenceStep>,
    #[serde(default)]
    pub variant: AbilityVariant,
}

fn default_true() -> bool {
    true
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self {
            id: AbilityId(0),
            name: String::new(),
            input: 0,
            kind: ActivationKind::Ability,
            button: ButtonType::Standard,
            cost: 0,
            cooldown: 0.0,
            duration: 0.0,
            permissions: PermissionGrant::default(),
            restrictions: FlagSet::default(),
            behaviors: FlagSet::default(),
            sets_ability_target: true,
            dismounts: false,
            damage: Vec::new(),
            damage_zones_share_history: false,
            motion: Vec::new(),
            max_reach: 0.0,
            min_reach: 0.0,
            dont_predict_reach: false,
            bot_behaviors: FlagSet::default(),
            sequence: Vec::new(),
            variant: AbilityVariant::Standard,
        }
    }
}

impl AbilityConfig {
    /// Max range used to normalize the auto-aim range output.
    /// Taken from the first damage entry, the same one players see as the
    /// ability's primary footprint.
    pub fn auto_aim_max_range(&self) -> f32 {
        if let Some(first) = self.damage.first() {
            first.center[1] + first.direction_bonus
        } else {
            1.0
        }
    }

    /// Estimated seconds between activation and the ability actually
    /// connecting at the given distance. Drives lead prediction.
    pub fn estimated_attack_delay(&self, dist: f32) -> f32 {
        if let AbilityVariant::Projectile { speed, delay, .. } = &self.variant {
            let mut attack_delay = *delay;
            if *speed > 0.0 {
                attack_delay += dist / speed;
            }
            return attack_delay;
        }

        if let Some(first) = self.damage.first() {
            let mut attack_delay = first.delay;
            for entry in &self.damage[1..] {
                if entry.delay < attack_delay {
                    attack_delay = entry.delay;
                }
            }
            attack_delay
        } else {
            0.5
        }
    }

    /// Aggregate damage-entry geometry used by threat evaluation:
    /// (attack delay, damage reach, controllable range, damage center).
    pub fn threat_params(&self) -> (f32, f32, f32, f32) {
        let mut attack_delay = 0.5;
        let mut damage_reach = 0.0;
        let mut controllable_range = 0.0;
        let mut damage_center = 0.0;

        if let Some(first) = self.damage.first() {
            attack_delay = first.delay;
            for entry in &self.damage {
                if entry.direction_bonus > controllable_range {
                    controllable_range = entry.direction_bonus;
                }
                if entry.center[1] > damage_center {
                    damage_center = entry.center[1];
                }
                let reach = entry.reach();
                if reach > damage_reach {
                    damage_reach = reach;
                }
                if entry.delay < attack_delay {
                    attack_delay = entry.delay;
                }
            }
        }

        (attack_delay, damage_reach, controllable_range, damage_center)
    }
}

/// Root structure for the abilities.ron file.
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub abilities: Vec<AbilityConfig>,
}

/// Resource containing all ability definitions, indexed by id and by name.
#[derive(Resource)]
pub struct AbilityCatalog {
    definitions: HashMap<AbilityId, AbilityConfig>,
    by_name: HashMap<String, AbilityId>,
}

impl AbilityCatalog {
    /// Build a catalog from loose configs, validating identity uniqueness
    /// and that every sequencing follow-up reference resolves.
    pub fn new(configs: Vec<AbilityConfig>) -> Result<Self, String> {
        let mut definitions = HashMap::new();
        let mut by_name = HashMap::new();

        for config in configs {
            if by_name.insert(config.name.clone(), config.id).is_some() {
                return Err(format!("Duplicate ability name: {}", config.name));
            }
            let id = config.id;
            if definitions.insert(id, config).is_some() {
                return Err(format!("Duplicate ability id: {}", id));
            }
        }

        let catalog = Self {
            definitions,
            by_name,
        };
        catalog.validate_sequences()?;
        Ok(catalog)
    }

    fn validate_sequences(&self) -> Result<(), String> {
        for config in self.definitions.values() {
            for step in &config.sequence {
                if let Some(next) = &step.next {
                    if !self.by_name.contains_key(next) {
                        return Err(format!(
                            "Ability {} sequences into unknown ability '{}'",
                            config.name, next
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: AbilityId) -> Option<&AbilityConfig> {
        self.definitions.get(&id)
    }

    /// Get a configuration, panicking if not found. Use when the id was
    /// validated at startup (equipped slots, sequencing references).
    pub fn get_unchecked(&self, id: AbilityId) -> &AbilityConfig {
        self.definitions
            .get(&id)
            .unwrap_or_else(|| panic!("Ability {} not found in catalog", id))
    }

    pub fn id_of(&self, name: &str) -> Option<AbilityId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn ability_ids(&self) -> impl Iterator<Item = AbilityId> + '_ {
        self.definitions.keys().copied()
    }
}

/// Load the ability catalog from assets/config/abilities.ron
pub fn load_ability_catalog() -> Result<AbilityCatalog, String> {
    let config_path = "assets/config/abilities.ron";

    let contents = std::fs::read_to_string(config_path)
        .map_err(|e| format!("Failed to read {}: {}", config_path, e))?;

    let config: CatalogConfig =
        ron::from_str(&contents).map_err(|e| format!("Failed to parse {}: {}", config_path, e))?;

    let catalog = AbilityCatalog::new(config.abilities)?;

    info!(
        "Loaded {} ability definitions from {}",
        catalog.len(),
        config_path
    );

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_config(id: u32, name: &str) -> AbilityConfig {
        AbilityConfig {
            id: AbilityId(id),
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_catalog_rejects_duplicate_ids() {
        let result = AbilityCatalog::new(vec![basic_config(1, "jab"), basic_config(1, "cross")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_catalog_rejects_dangling_sequence_ref() {
        let mut config = basic_config(1, "jab");
        config.sequence.push(SequenceStep {
            decider: SequenceDecider::AlwaysPlay,
            next: Some("missing".to_string()),
            ..Default::default()
        });
        let result = AbilityCatalog::new(vec![config]);
        assert!(result.is_err());
    }

    #[test]
    fn test_catalog_lookup_by_name() {
        let catalog = AbilityCatalog::new(vec![basic_config(7, "jab")]).unwrap();
        assert_eq!(catalog.id_of("jab"), Some(AbilityId(7)));
        assert_eq!(catalog.get_unchecked(AbilityId(7)).name, "jab");
    }

    #[test]
    fn test_estimated_attack_delay_uses_min_damage_delay() {
        let mut config = basic_config(1, "jab");
        config.damage = vec![
            DamageSpec {
                value: 10,
                delay: 0.4,
                ..dummy_damage()
            },
            DamageSpec {
                value: 10,
                delay: 0.1,
                ..dummy_damage()
            },
        ];
        assert!((config.estimated_attack_delay(5.0) - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_estimated_attack_delay_projectile_adds_travel_time() {
        let mut config = basic_config(1, "bolt");
        config.variant = AbilityVariant::Projectile {
            speed: 10.0,
            lifespan: 2.0,
            delay: 0.2,
            offset: [0.0, 0.0],
            damage_index: 0,
        };
        // 0.2s wind-up + 5 units at 10 units/sec
        assert!((config.estimated_attack_delay(5.0) - 0.7).abs() < 1e-5);
    }

    fn dummy_damage() -> DamageSpec {
        DamageSpec {
            value: 0,
            attack_ratio: 0.0,
            power_ratio: 0.0,
            delay: 0.0,
            lifespan: 0.25,
            behavior: FlagSet::default(),
            shape: DamageShape::Box,
            center: [0.0, 1.0],
            extents: [0.5, 0.5],
            direction_bonus: 0.0,
            default_direction_bonus: 0.5,
        }
    }
}
