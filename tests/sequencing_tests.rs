//! Integration tests for the sequencing sub-machine
//!
//! These tests verify that:
//! - Entries are evaluated in declared order, first satisfied winner
//! - End-only deciders stay quiet during per-tick evaluation
//! - Buffered input and outcome flags chain mid-flight
//! - Movement input cancels skippable recoveries

use bevy::prelude::*;

use brawlsim::combat::events::{AbilityNotification, DamageEvent};
use brawlsim::sim::abilities::{AbilityId, ActivationKind, SequenceDecider};
use brawlsim::sim::ability_config::{AbilityCatalog, AbilityConfig, SequenceStep};
use brawlsim::sim::components::{
    AbilityInstance, AbilityInventory, BrushUser, Controller, EffectHandler, Energy, GameRng,
    Health, ItemInventory, MatchInfo, Mount, Playable, PlayerStats, Profile, SimClock, Stealth,
    Team,
};
use brawlsim::sim::sequencing::{sequence_conditions_met, sequence_if_needed};

fn test_world() -> World {
    let mut world = World::new();
    world.insert_resource(SimClock {
        tick: 300,
        time: 10.0,
    });
    world.insert_resource(GameRng::from_seed(7));
    world.insert_resource(MatchInfo::default());
    world.init_resource::<Events<AbilityNotification>>();
    world.init_resource::<Events<DamageEvent>>();
    world
}

fn spawn_fighter(world: &mut World) -> Entity {
    world
        .spawn((
            Transform::default(),
            Controller::default(),
            Health::new(100.0),
            Energy::new(100.0),
            Team { team: 1 },
            Profile::default(),
            Playable::default(),
            AbilityInventory::default(),
            PlayerStats::default(),
            ItemInventory::default(),
            EffectHandler::default(),
            Stealth::default(),
            BrushUser::default(),
            Mount::default(),
        ))
        .id()
}

fn follow_up(id: u32, name: &str) -> AbilityConfig {
    AbilityConfig {
        id: AbilityId(id),
        name: name.to_string(),
        input: 2,
        ..Default::default()
    }
}

fn live_instance(owner: Entity, id: u32, input: u8) -> AbilityInstance {
    let mut instance = AbilityInstance::idle(owner, AbilityId(id), input);
    instance.rearm(AbilityId(id), input);
    instance
}

#[test]
fn test_first_satisfied_entry_wins() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world);

    let mut config = follow_up(1, "combo");
    config.sequence = vec![
        SequenceStep {
            decider: SequenceDecider::DiceRoll,
            next: Some("left".to_string()),
            dice_odds: 0,
            ..Default::default()
        },
        SequenceStep {
            decider: SequenceDecider::AlwaysPlay,
            next: Some("right".to_string()),
            ..Default::default()
        },
    ];
    let catalog = AbilityCatalog::new(vec![
        config.clone(),
        follow_up(10, "left"),
        follow_up(11, "right"),
    ])
    .unwrap();

    let mut instance = live_instance(owner, 1, 2);
    sequence_if_needed(&mut world, &catalog, &config, &mut instance, true);

    // Dice odds zero practically never pass; AlwaysPlay takes the chain.
    let inventory = world.get::<AbilityInventory>(owner).unwrap();
    let sequenced = inventory.sequenced_ability.expect("should have chained");
    assert_eq!(sequenced.ability, AbilityId(11));
    assert_eq!(sequenced.input, 2);
    assert!(instance.marks.fast_forward);
}

#[test]
fn test_always_play_is_end_only() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world);

    let mut config = follow_up(1, "combo");
    config.sequence = vec![SequenceStep {
        decider: SequenceDecider::AlwaysPlay,
        next: Some("next".to_string()),
        ..Default::default()
    }];
    let catalog = AbilityCatalog::new(vec![config.clone(), follow_up(10, "next")]).unwrap();

    let mut instance = live_instance(owner, 1, 2);
    sequence_if_needed(&mut world, &catalog, &config, &mut instance, false);

    assert!(world
        .get::<AbilityInventory>(owner)
        .unwrap()
        .sequenced_ability
        .is_none());
    assert!(!instance.marks.fast_forward);
}

#[test]
fn test_dice_roll_certain_odds() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world);

    let config = follow_up(1, "combo");
    let step = SequenceStep {
        decider: SequenceDecider::DiceRoll,
        next: Some("next".to_string()),
        dice_odds: 100,
        ..Default::default()
    };

    let instance = live_instance(owner, 1, 2);
    // At 100 odds the roll always passes at end, never during update.
    assert!(sequence_conditions_met(
        &mut world, &config, &step, &instance, true
    ));
    assert!(!sequence_conditions_met(
        &mut world, &config, &step, &instance, false
    ));
}

#[test]
fn test_buffered_input_chains_mid_flight() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world);

    let mut config = follow_up(1, "jab");
    config.kind = ActivationKind::Attack;
    config.input = 1;
    config.sequence = vec![SequenceStep {
        decider: SequenceDecider::BufferedInput,
        next: Some("cross".to_string()),
        skippable_after: 0.2,
        ..Default::default()
    }];
    let catalog = AbilityCatalog::new(vec![config.clone(), follow_up(10, "cross")]).unwrap();

    let mut instance = live_instance(owner, 1, 1);
    instance.time_elapsed = 0.3;

    // Button not held: nothing happens.
    sequence_if_needed(&mut world, &catalog, &config, &mut instance, false);
    assert!(world
        .get::<AbilityInventory>(owner)
        .unwrap()
        .sequenced_ability
        .is_none());

    // Hold the same slot's button: the combo chains during update.
    {
        let mut playable = world.get_mut::<Playable>(owner).unwrap();
        playable.player_input.ability_button_down = true;
        playable.player_input.ability_input = 1;
    }
    sequence_if_needed(&mut world, &catalog, &config, &mut instance, false);

    let inventory = world.get::<AbilityInventory>(owner).unwrap();
    assert_eq!(
        inventory.sequenced_ability.map(|s| s.ability),
        Some(AbilityId(10))
    );
    // Attack combos with a buffered first stage also arm the re-press window.
    assert_eq!(inventory.last_attack, Some(AbilityId(10)));
    assert!(inventory.last_attack_timer > 0.0);
}

#[test]
fn test_buffered_input_requires_matching_slot() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world);

    let mut config = follow_up(1, "jab");
    config.input = 1;
    let step = SequenceStep {
        decider: SequenceDecider::BufferedInput,
        next: Some("cross".to_string()),
        skippable_after: 0.2,
        ..Default::default()
    };

    let mut instance = live_instance(owner, 1, 1);
    instance.time_elapsed = 0.3;

    let mut playable = world.get_mut::<Playable>(owner).unwrap();
    playable.player_input.ability_button_down = true;
    playable.player_input.ability_input = 4; // different slot held
    drop(playable);

    assert!(!sequence_conditions_met(
        &mut world, &config, &step, &instance, false
    ));
}

#[test]
fn test_dealt_damage_chains_once_flag_is_set() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world);

    let mut config = follow_up(1, "lunge");
    config.sequence = vec![SequenceStep {
        decider: SequenceDecider::DealtDamage,
        next: Some("uppercut".to_string()),
        ..Default::default()
    }];
    let catalog = AbilityCatalog::new(vec![config.clone(), follow_up(10, "uppercut")]).unwrap();

    let mut instance = live_instance(owner, 1, 2);

    sequence_if_needed(&mut world, &catalog, &config, &mut instance, false);
    assert!(world
        .get::<AbilityInventory>(owner)
        .unwrap()
        .sequenced_ability
        .is_none());

    instance.dealt_damage = true;
    sequence_if_needed(&mut world, &catalog, &config, &mut instance, false);
    assert_eq!(
        world
            .get::<AbilityInventory>(owner)
            .unwrap()
            .sequenced_ability
            .map(|s| s.ability),
        Some(AbilityId(10))
    );
}

#[test]
fn test_didnt_deal_damage_is_end_only_and_negated() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world);

    let config = follow_up(1, "swing");
    let step = SequenceStep {
        decider: SequenceDecider::DidntDealDamage,
        next: Some("recover".to_string()),
        ..Default::default()
    };

    let mut instance = live_instance(owner, 1, 2);
    assert!(!sequence_conditions_met(
        &mut world, &config, &step, &instance, false
    ));
    assert!(sequence_conditions_met(
        &mut world, &config, &step, &instance, true
    ));

    instance.dealt_damage = true;
    assert!(!sequence_conditions_met(
        &mut world, &config, &step, &instance, true
    ));
}

#[test]
fn test_movement_cancels_skippable_recovery() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world);

    let mut config = follow_up(1, "swing");
    config.sequence = vec![SequenceStep {
        decider: SequenceDecider::AlwaysPlay,
        skippable_after: 0.3,
        ..Default::default()
    }];
    let catalog = AbilityCatalog::new(vec![config.clone()]).unwrap();

    let mut instance = live_instance(owner, 1, 2);
    instance.time_elapsed = 0.4;

    // No movement input: the recovery keeps playing.
    sequence_if_needed(&mut world, &catalog, &config, &mut instance, false);
    assert!(!instance.marks.interruption);

    world
        .get_mut::<Playable>(owner)
        .unwrap()
        .player_input
        .movement_direction = Vec3::X;
    sequence_if_needed(&mut world, &catalog, &config, &mut instance, false);
    assert!(instance.marks.interruption);
}

#[test]
fn test_damage_deciders_never_movement_cancel() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world);

    let mut config = follow_up(1, "lunge");
    config.sequence = vec![SequenceStep {
        decider: SequenceDecider::DealtDamage,
        skippable_after: 0.1,
        ..Default::default()
    }];
    let catalog = AbilityCatalog::new(vec![config.clone()]).unwrap();

    let mut instance = live_instance(owner, 1, 2);
    instance.time_elapsed = 0.4;
    world
        .get_mut::<Playable>(owner)
        .unwrap()
        .player_input
        .movement_direction = Vec3::X;

    sequence_if_needed(&mut world, &catalog, &config, &mut instance, false);
    assert!(
        !instance.marks.interruption,
        "damage deciders are exempt from movement canceling"
    );
}
