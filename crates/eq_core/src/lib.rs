//! `eq_core` — deterministic equilibrium-duel core.
//!
//! No IO, no network, no wall clock. All randomness via the passed-in Rng;
//! all time via the match's simulated millisecond clock.

pub mod abilities;
pub mod difficulty;
pub mod economy;
mod engine;
pub mod equilibrium;
pub mod game;
pub mod intervention;
pub mod reaction;
pub mod scoring;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use abilities::{AbilityBook, AbilityEffect, AbilityKind};
pub use difficulty::{DifficultyProfile, DifficultyTier};
pub use economy::{ActionEconomy, ActionKey, CooldownEntry};
pub use engine::tick;
pub use game::{MatchConfig, MatchState, Phase, Snapshot};
pub use intervention::Intervention;
pub use reaction::ReactionState;
pub use scoring::{MatchResult, ScoreBoard};
pub use types::*;

pub(crate) fn emit(counters: &mut Counters, at_ms: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, at_ms, event }
}

#[cfg(test)]
mod tests;
