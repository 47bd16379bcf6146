//! Sequencing Sub-Machine
//!
//! Evaluates an ability's configured follow-up list against runtime
//! outcomes. Runs every tick (`is_called_on_end = false`) and once more at
//! ability end (`is_called_on_end = true`). The first satisfied entry with
//! an explicit follow-up wins; movement cancellation is evaluated
//! independently of explicit chaining.

use bevy::prelude::*;

use super::abilities::{ActivationKind, SequenceDecider};
use super::ability_config::{AbilityCatalog, AbilityConfig, SequenceStep};
use super::components::{
    AbilityInstance, AbilityInventory, GameRng, Playable, SequencedAbility,
};
use super::lifecycle;
use super::BUFFERED_ATTACK_WINDOW;

/// Hand the owner's inventory over to the follow-up ability and fast-forward
/// the current instance out of the way.
pub fn sequence_into_ability(
    world: &mut World,
    catalog: &AbilityCatalog,
    config: &AbilityConfig,
    instance: &mut AbilityInstance,
    next_name: &str,
) {
    let Some(next_id) = catalog.id_of(next_name) else {
        return;
    };

    lifecycle::fast_forward_ability(instance);

    if let Some(mut inventory) = world.get_mut::<AbilityInventory>(instance.owner) {
        inventory.sequenced_ability = Some(SequencedAbility {
            input: instance.input,
            ability: next_id,
        });

        // Attack combos whose first stage chains on buffered input keep the
        // follow-up pressable for a short window after the combo drops.
        if config.kind == ActivationKind::Attack
            && config
                .sequence
                .first()
                .map(|step| step.decider == SequenceDecider::BufferedInput)
                .unwrap_or(false)
        {
            inventory.last_attack = Some(next_id);
            inventory.last_attack_timer = BUFFERED_ATTACK_WINDOW;
        }
    }
}

/// Returns whether this entry allows transitioning into its follow-up.
pub fn sequence_conditions_met(
    world: &mut World,
    config: &AbilityConfig,
    step: &SequenceStep,
    instance: &AbilityInstance,
    is_called_on_end: bool,
) -> bool {
    match step.decider {
        SequenceDecider::AlwaysPlay => is_called_on_end,

        SequenceDecider::DiceRoll => {
            if !is_called_on_end {
                return false;
            }
            // Rolling 1..=100 keeps odds 0 a guaranteed miss and odds 100 a
            // guaranteed hit.
            let mut rng = world.resource_mut::<GameRng>();
            rng.random_inclusive(1, 100) <= step.dice_odds as i32
        }

        SequenceDecider::BufferedInput => {
            if instance.time_elapsed > step.skippable_after {
                if let Some(playable) = world.get::<Playable>(instance.owner) {
                    let input = playable.input();
                    return input.ability_button_down && input.ability_input == config.input;
                }
            }
            false
        }

        SequenceDecider::DealtDamage => instance.dealt_damage,

        SequenceDecider::ReceivedDamage => instance.received_damage,

        SequenceDecider::DidntDealDamage => is_called_on_end && !instance.dealt_damage,
    }
}

/// Evaluate the sequence list: explicit chaining first, then movement
/// cancellation for entries past their skippable threshold.
pub fn sequence_if_needed(
    world: &mut World,
    catalog: &AbilityCatalog,
    config: &AbilityConfig,
    instance: &mut AbilityInstance,
    is_called_on_end: bool,
) {
    if config.sequence.is_empty() {
        return;
    }

    for step in &config.sequence {
        // Explicit sequencing
        if let Some(next) = &step.next {
            if sequence_conditions_met(world, config, step, instance, is_called_on_end) {
                sequence_into_ability(world, catalog, config, instance, next);
                return;
            }
        }

        // Movement interruption (animation canceling via move)
        if step.skippable_after > 0.0
            && instance.time_elapsed > step.skippable_after
            && step.decider != SequenceDecider::DealtDamage
            && step.decider != SequenceDecider::ReceivedDamage
        {
            if let Some(playable) = world.get::<Playable>(instance.owner) {
                if playable.input().movement_direction != Vec3::ZERO {
                    lifecycle::interrupt_ability(instance, 0.0);
                }
            }
        }
    }
}
