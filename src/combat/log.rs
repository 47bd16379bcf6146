//! Combat logging
//!
//! Records all combat events for post-match analysis and the headless
//! match report.

use bevy::prelude::*;
use serde::Serialize;

/// A single entry in the combat log
#[derive(Debug, Clone, Serialize)]
pub struct CombatLogEntry {
    /// Timestamp in match time (seconds since match start)
    pub timestamp: f32,
    /// The type of event
    pub event_type: CombatLogEventType,
    /// Human-readable description of the event
    pub message: String,
}

/// Types of combat log events for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CombatLogEventType {
    /// Damage dealt
    Damage,
    /// Ability started
    AbilityStarted,
    /// Ability ended
    AbilityEnded,
    /// An entity died
    Death,
    /// Match event (start, end, etc.)
    MatchEvent,
}

/// The combat log resource storing all events
#[derive(Resource, Default, Serialize)]
pub struct CombatLog {
    /// All log entries in chronological order
    pub entries: Vec<CombatLogEntry>,
    /// Current match time
    pub match_time: f32,
}

impl CombatLog {
    /// Clear the log for a new match
    pub fn clear(&mut self) {
        self.entries.clear();
        self.match_time = 0.0;
    }

    /// Add a new entry to the log
    pub fn log(&mut self, event_type: CombatLogEventType, message: String) {
        self.entries.push(CombatLogEntry {
            timestamp: self.match_time,
            event_type,
            message,
        });
    }

    /// Get entries filtered by event type
    pub fn filter_by_type(&self, event_type: CombatLogEventType) -> Vec<&CombatLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Get the last N entries
    pub fn recent(&self, count: usize) -> Vec<&CombatLogEntry> {
        self.entries.iter().rev().take(count).rev().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_records_timestamp() {
        let mut log = CombatLog::default();
        log.match_time = 3.5;
        log.log(CombatLogEventType::Damage, "hit".to_string());
        assert_eq!(log.entries.len(), 1);
        assert!((log.entries[0].timestamp - 3.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_filter_by_type() {
        let mut log = CombatLog::default();
        log.log(CombatLogEventType::Damage, "hit".to_string());
        log.log(CombatLogEventType::AbilityStarted, "cast".to_string());
        log.log(CombatLogEventType::Damage, "hit again".to_string());
        assert_eq!(log.filter_by_type(CombatLogEventType::Damage).len(), 2);
    }
}
