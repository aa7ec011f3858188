use super::*;
use crate::test_fixtures::{gas_reaction, make_rng, simple_reaction, started_match};

mod engine;
mod pause;

// --- Shared test helpers ------------------------------------------------

fn add(species: &str) -> Intervention {
    Intervention::Act(ActionKey::AddSpecies(SpeciesId::from(species)))
}

fn count<F: Fn(&Event) -> bool>(events: &[EventEnvelope], pred: F) -> usize {
    events.iter().filter(|e| pred(&e.event)).count()
}

fn command(issued_by: Actor, command: Command) -> CommandEnvelope {
    CommandEnvelope {
        id: CommandId("cmd_000001".to_string()),
        issued_by,
        issued_ms: 0,
        command,
    }
}
