//! Combat events
//!
//! Fire-and-forget notifications emitted by the ability engine and the
//! damage systems. Presentation and analytics consume these; the engine
//! never reads a response.

use bevy::prelude::*;

use crate::sim::abilities::AbilityId;

/// Lifecycle phase carried by an ability notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityPhase {
    Start,
    End,
}

/// Event fired when an ability starts or ends.
#[derive(Event, Debug, Clone)]
pub struct AbilityNotification {
    pub owner: Entity,
    pub ability: AbilityId,
    pub input: u8,
    pub phase: AbilityPhase,
    pub speed: f32,
}

/// Event fired when ability damage lands.
#[derive(Event, Debug, Clone)]
pub struct DamageEvent {
    /// Entity dealing the damage
    pub source: Entity,
    /// Entity receiving the damage
    pub target: Entity,
    /// Ability that created the damage zone or projectile
    pub ability: AbilityId,
    /// Damage applied to health
    pub amount: f32,
}
