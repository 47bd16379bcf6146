//! Integration tests for the ability lifecycle
//!
//! These tests verify that:
//! - The permission ledger balances across Start/CleanUp
//! - Termination is idempotent and cooperative (mark-based)
//! - Activation gating honors resources, restrictions, and controller state
//! - Start-time side effects land in the right order

use bevy::prelude::*;

use brawlsim::combat::events::{AbilityNotification, AbilityPhase, DamageEvent};
use brawlsim::sim::abilities::{
    AbilityId, ActivationKind, ButtonType, FlagSet, SpecialBehavior, UserStateRestriction,
};
use brawlsim::sim::ability_config::{AbilityCatalog, AbilityConfig};
use brawlsim::sim::components::{
    AbilityInstance, AbilityInventory, BrushUser, CarriedFlag, Controller, EffectHandler, Energy,
    GameRng, Health, ItemInventory, MatchInfo, Mount, Playable, PlayerStats, Profile, SimClock,
    Stealth, Team,
};
use brawlsim::sim::lifecycle::{
    can_use, clean_up, clicked_while_on_cd, end_ability, equip_abilities, fast_forward_ability,
    interrupt_ability, start_ability,
};

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

fn spawn_fighter(world: &mut World, team: u8, position: Vec3) -> Entity {
    world
        .spawn((
            Transform::from_translation(position),
            Controller::default(),
            Health::new(100.0),
            Energy::new(100.0),
            Team { team },
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

fn basic_config(id: u32, name: &str) -> AbilityConfig {
    AbilityConfig {
        id: AbilityId(id),
        name: name.to_string(),
        input: 2,
        duration: 1.0,
        ..Default::default()
    }
}

/// Equip, rearm, and start one ability; returns the live instance and slot.
fn start_on_fresh_slot(
    world: &mut World,
    config: &AbilityConfig,
    owner: Entity,
) -> (AbilityInstance, Entity) {
    let slots = equip_abilities(world, owner, &[(config.input, config.id)]);
    let slot = slots[0];
    let mut instance = world.get::<AbilityInstance>(slot).cloned().unwrap();
    instance.rearm(config.id, config.input);
    start_ability(world, config, owner, &mut instance);
    *world.get_mut::<AbilityInstance>(slot).unwrap() = instance.clone();
    (instance, slot)
}

#[test]
fn test_ledger_balances_across_start_and_cleanup() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    let config = basic_config(1, "slam");

    let before = world.get::<Controller>(owner).unwrap().permissions;
    let (mut instance, _) = start_on_fresh_slot(&mut world, &config, owner);

    let during = world.get::<Controller>(owner).unwrap().permissions;
    assert_eq!(during.movement, before.movement + 1);
    assert_eq!(during.ability, before.ability + 1);
    assert_eq!(during.attack, before.attack + 1);
    assert_eq!(during.utility, before.utility + 1);
    assert_eq!(during.no_rotate, before.no_rotate);
    assert_eq!(world.get::<Controller>(owner).unwrap().in_ability_count, 1);
    assert_eq!(
        world.get::<AbilityInventory>(owner).unwrap().in_ability_count,
        1
    );

    clean_up(&mut world, &config, owner, &mut instance);

    let after = world.get::<Controller>(owner).unwrap().permissions;
    assert_eq!(after, before);
    assert_eq!(world.get::<Controller>(owner).unwrap().in_ability_count, 0);
    assert_eq!(
        world.get::<AbilityInventory>(owner).unwrap().in_ability_count,
        0
    );
}

#[test]
fn test_granted_capabilities_stay_unlocked() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    let mut config = basic_config(1, "sprint");
    config.permissions.movement = true;
    config.permissions.no_rotate = true;

    let (mut instance, _) = start_on_fresh_slot(&mut world, &config, owner);

    let controller = world.get::<Controller>(owner).unwrap();
    assert!(controller.can_move(), "granted movement must stay unlocked");
    assert_eq!(controller.permissions.no_rotate, 1);
    assert!(!controller.can_rotate());

    clean_up(&mut world, &config, owner, &mut instance);
    let controller = world.get::<Controller>(owner).unwrap();
    assert!(controller.can_rotate());
}

#[test]
fn test_termination_is_idempotent() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    let config = basic_config(1, "slam");
    let catalog = AbilityCatalog::new(vec![config.clone()]).unwrap();

    let (mut instance, _) = start_on_fresh_slot(&mut world, &config, owner);

    end_ability(&mut world, &catalog, &config, &mut instance);
    clean_up(&mut world, &config, owner, &mut instance);
    assert!(instance.has_ended);

    let drained: Vec<AbilityPhase> = world
        .resource_mut::<Events<AbilityNotification>>()
        .drain()
        .map(|e| e.phase)
        .collect();
    let end_count = drained
        .iter()
        .filter(|p| **p == AbilityPhase::End)
        .count();
    assert_eq!(end_count, 1);

    // Repeat calls are no-ops: no duplicate events, no double unwinding.
    end_ability(&mut world, &catalog, &config, &mut instance);
    clean_up(&mut world, &config, owner, &mut instance);
    assert!(instance.has_ended);
    assert!(world
        .resource_mut::<Events<AbilityNotification>>()
        .drain()
        .next()
        .is_none());
    assert_eq!(world.get::<Controller>(owner).unwrap().in_ability_count, 0);
}

#[test]
fn test_dont_interrupt_flag_leaves_prior_instance_untouched() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);

    let first = basic_config(1, "slam");
    let mut second = AbilityConfig {
        input: 3,
        ..basic_config(2, "guard")
    };
    second.behaviors = FlagSet::of(&[SpecialBehavior::DontInterruptAbilities]);

    let slots = equip_abilities(
        &mut world,
        owner,
        &[(first.input, first.id), (second.input, second.id)],
    );
    let mut first_instance = world.get::<AbilityInstance>(slots[0]).cloned().unwrap();
    first_instance.rearm(first.id, first.input);
    start_ability(&mut world, &first, owner, &mut first_instance);
    *world.get_mut::<AbilityInstance>(slots[0]).unwrap() = first_instance;

    let mut second_instance = world.get::<AbilityInstance>(slots[1]).cloned().unwrap();
    second_instance.rearm(second.id, second.input);
    start_ability(&mut world, &second, owner, &mut second_instance);

    let prior = world.get::<AbilityInstance>(slots[0]).unwrap();
    assert!(!prior.has_ended);
    assert!(!prior.marks.interruption);
    assert!(!prior.marks.fast_forward);
}

#[test]
fn test_starting_normally_marks_prior_instance_for_interruption() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);

    let first = basic_config(1, "slam");
    let second = AbilityConfig {
        input: 3,
        ..basic_config(2, "kick")
    };

    let slots = equip_abilities(&mut world, owner, &[(first.input, first.id), (second.input, second.id)]);
    let mut first_instance = world.get::<AbilityInstance>(slots[0]).cloned().unwrap();
    first_instance.rearm(first.id, first.input);
    start_ability(&mut world, &first, owner, &mut first_instance);
    *world.get_mut::<AbilityInstance>(slots[0]).unwrap() = first_instance;

    let mut second_instance = world.get::<AbilityInstance>(slots[1]).cloned().unwrap();
    second_instance.rearm(second.id, second.input);
    start_ability(&mut world, &second, owner, &mut second_instance);

    let prior = world.get::<AbilityInstance>(slots[0]).unwrap();
    assert!(prior.marks.interruption, "prior ability should be asked to stop");
    assert!(!prior.has_ended, "interruption is a request, not a termination");
}

#[test]
fn test_utility_abilities_consume_energy() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    let mut config = basic_config(1, "blink");
    config.kind = ActivationKind::Utility;
    config.cost = 30;

    assert!(can_use(&world, &config, owner));
    let (_, _) = start_on_fresh_slot(&mut world, &config, owner);
    let energy = world.get::<Energy>(owner).unwrap();
    assert!((energy.current - 70.0).abs() < 1e-4);
}

#[test]
fn test_can_use_rejects_insufficient_energy() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    world.get_mut::<Energy>(owner).unwrap().current = 20.0;

    let mut config = basic_config(1, "blink");
    config.kind = ActivationKind::Utility;
    config.cost = 30;

    assert!(!can_use(&world, &config, owner));
    // Non-utility abilities ignore the energy pool entirely.
    let free = basic_config(2, "slam");
    assert!(can_use(&world, &free, owner));
}

#[test]
fn test_can_use_spawn_grace() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    world.get_mut::<Controller>(owner).unwrap().spawn_time = 9.9;

    let config = basic_config(1, "slam");
    assert!(!can_use(&world, &config, owner));

    world.get_mut::<Controller>(owner).unwrap().spawn_time = 0.0;
    assert!(can_use(&world, &config, owner));
}

#[test]
fn test_can_use_rooted_restriction() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    world
        .get_mut::<Controller>(owner)
        .unwrap()
        .parameters
        .cannot_use_motion = true;

    let mut config = basic_config(1, "lunge");
    config.behaviors = FlagSet::of(&[SpecialBehavior::CannotBeUsedIfRooted]);
    assert!(!can_use(&world, &config, owner));

    let unrestricted = basic_config(2, "slam");
    assert!(can_use(&world, &unrestricted, owner));
}

#[test]
fn test_can_use_while_dead() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    world.get_mut::<Health>(owner).unwrap().current = 0.0;

    let config = basic_config(1, "slam");
    assert!(!can_use(&world, &config, owner));

    let mut ghost = basic_config(2, "haunt");
    ghost.behaviors = FlagSet::of(&[SpecialBehavior::UsableWhileDead]);
    assert!(can_use(&world, &ghost, owner));
}

#[test]
fn test_can_use_contextual_restrictions() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);

    let mut config = basic_config(1, "recall");
    config.restrictions = FlagSet::of(&[UserStateRestriction::NotInCombat]);
    assert!(can_use(&world, &config, owner));

    world.get_mut::<Controller>(owner).unwrap().last_combat_time = 8.0;
    assert!(!can_use(&world, &config, owner));

    let mut flagless = basic_config(2, "sprint");
    flagless.restrictions = FlagSet::of(&[UserStateRestriction::NotCarryingFlag]);
    assert!(can_use(&world, &flagless, owner));
    world.entity_mut(owner).insert(CarriedFlag);
    assert!(!can_use(&world, &flagless, owner));
}

#[test]
fn test_flag_carrier_duration_reduction() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    world.entity_mut(owner).insert(CarriedFlag);

    let mut config = basic_config(1, "quake");
    config.duration = 2.5;
    config.behaviors = FlagSet::of(&[SpecialBehavior::ReduceDurationWithFlag]);

    let (instance, _) = start_on_fresh_slot(&mut world, &config, owner);
    assert!((instance.in_ability_timer - 1.0).abs() < 1e-5);
}

#[test]
fn test_brush_stealth_breaks_with_lockout() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    world.entity_mut(owner).insert(BrushUser { in_brush: true });
    world.get_mut::<Stealth>(owner).unwrap().brush_stealth = true;

    let config = basic_config(1, "slam");
    let (_, _) = start_on_fresh_slot(&mut world, &config, owner);

    let stealth = world.get::<Stealth>(owner).unwrap();
    assert!(!stealth.brush_stealth);
    assert!((stealth.brush_lockout - 12.0).abs() < 1e-5);
}

#[test]
fn test_sneaky_abilities_keep_brush_stealth() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    world.entity_mut(owner).insert(BrushUser { in_brush: true });
    world.get_mut::<Stealth>(owner).unwrap().brush_stealth = true;

    let mut config = basic_config(1, "sneak");
    config.behaviors = FlagSet::of(&[SpecialBehavior::DoesntBreakBrushStealth]);
    let (_, _) = start_on_fresh_slot(&mut world, &config, owner);

    assert!(world.get::<Stealth>(owner).unwrap().brush_stealth);
}

#[test]
fn test_interrupt_lockout_raises_cooldown() {
    let owner = Entity::from_raw(1);
    let mut instance = AbilityInstance::idle(owner, AbilityId(1), 1);
    instance.has_ended = false;
    instance.cooldown_timer = 1.0;

    interrupt_ability(&mut instance, 3.0);
    assert!(instance.marks.interruption);
    assert!((instance.cooldown_timer - 3.0).abs() < 1e-6);

    // A shorter lockout never lowers the timer; repeat marks are harmless.
    interrupt_ability(&mut instance, 2.0);
    assert!((instance.cooldown_timer - 3.0).abs() < 1e-6);

    fast_forward_ability(&mut instance);
    fast_forward_ability(&mut instance);
    assert!(instance.marks.fast_forward);
}

#[test]
fn test_clicked_while_on_cd_grace_period() {
    let owner = Entity::from_raw(1);

    let mut config = AbilityConfig {
        id: AbilityId(1),
        name: "quake".to_string(),
        ..Default::default()
    };
    config.behaviors = FlagSet::of(&[SpecialBehavior::ClickingOnCdInterrupts]);

    let mut instance = AbilityInstance::idle(owner, AbilityId(1), 1);
    instance.has_ended = false;
    instance.time_elapsed = 0.1;

    clicked_while_on_cd(&config, &mut instance);
    assert!(!instance.marks.fast_forward, "too early to cut short");

    instance.time_elapsed = 0.5;
    clicked_while_on_cd(&config, &mut instance);
    assert!(instance.marks.fast_forward);

    // Hold buttons skip the grace check entirely.
    let mut hold_config = config.clone();
    hold_config.button = ButtonType::Hold;
    let mut hold_instance = AbilityInstance::idle(owner, AbilityId(1), 1);
    hold_instance.has_ended = false;
    hold_instance.time_elapsed = 0.05;
    clicked_while_on_cd(&hold_config, &mut hold_instance);
    assert!(hold_instance.marks.fast_forward);
}

#[test]
fn test_unflagged_click_on_cd_does_nothing() {
    let owner = Entity::from_raw(1);
    let config = AbilityConfig {
        id: AbilityId(1),
        name: "jab".to_string(),
        ..Default::default()
    };
    let mut instance = AbilityInstance::idle(owner, AbilityId(1), 1);
    instance.has_ended = false;
    instance.time_elapsed = 5.0;
    clicked_while_on_cd(&config, &mut instance);
    assert!(!instance.marks.fast_forward);
}

#[test]
fn test_usage_stats_recorded_for_participants() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);
    world.resource_mut::<MatchInfo>().participants.push(owner);

    let config = basic_config(1, "slam");
    let (mut instance, _) = start_on_fresh_slot(&mut world, &config, owner);
    clean_up(&mut world, &config, owner, &mut instance);

    assert_eq!(world.get::<PlayerStats>(owner).unwrap().abilities_used, 1);
}

#[test]
fn test_untracked_owner_records_no_stats() {
    let mut world = test_world();
    let owner = spawn_fighter(&mut world, 1, Vec3::ZERO);

    let config = basic_config(1, "slam");
    let (mut instance, _) = start_on_fresh_slot(&mut world, &config, owner);
    clean_up(&mut world, &config, owner, &mut instance);

    assert_eq!(world.get::<PlayerStats>(owner).unwrap().abilities_used, 0);
}
