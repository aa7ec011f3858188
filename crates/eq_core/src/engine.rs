use rand::Rng;

use crate::game::MatchState;
use crate::{Command, CommandEnvelope, EventEnvelope};

/// Advance the match by one step of `dt_ms` simulated milliseconds.
///
/// Order of operations:
/// 1. Apply commands from both actors, in the order given.
/// 2. Re-arm the opponent decision tick if it was due.
/// 3. Advance the clock, firing round and settle deadlines.
///
/// Returns all events produced this step.
pub fn tick<R: Rng + ?Sized>(
    state: &mut MatchState,
    commands: &[CommandEnvelope],
    rng: &mut R,
    dt_ms: u64,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();

    apply_commands(state, commands, rng, &mut events);
    if state.decision_due() {
        state.consume_decision_tick();
    }
    state.advance(dt_ms, &mut events);

    events
}

fn apply_commands<R: Rng + ?Sized>(
    state: &mut MatchState,
    commands: &[CommandEnvelope],
    rng: &mut R,
    events: &mut Vec<EventEnvelope>,
) {
    for envelope in commands {
        match &envelope.command {
            Command::Intervene { intervention } => {
                // Rejections are reported as events; nothing else to do here.
                let _ = state.submit(envelope.issued_by, intervention, rng, events);
            }
            Command::Pause => {
                state.pause(events);
            }
            Command::Resume => {
                state.resume(events);
            }
            Command::EndRound => state.end_round(events),
        }
    }
}
