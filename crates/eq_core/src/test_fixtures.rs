//! Shared test fixtures for `eq_core` and downstream crates.
//!
//! `simple_reaction()` is the A + B ⇌ C scenario with no temperature
//! dependence. `gas_reaction()` is a Haber-like all-gas equilibrium that
//! exercises stoichiometric coefficients and pressure coupling.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    Constants, DifficultyTier, EventEnvelope, Goal, MatchConfig, MatchState, ReactionDef,
    ReactionId, SpeciesId,
};

/// A + B ⇌ C, K₀ = 100 at 298 K, ΔH = 0.
pub fn simple_reaction() -> ReactionDef {
    ReactionDef {
        id: ReactionId::from("test_abc"),
        name: "Test A+B".to_string(),
        equation: "A + B ⇌ C".to_string(),
        reactants: vec![SpeciesId::from("A"), SpeciesId::from("B")],
        products: vec![SpeciesId::from("C")],
        coefficients: BTreeMap::new(),
        initial_concentrations: BTreeMap::new(),
        equilibrium_constant: 100.0,
        reference_temperature_k: Some(298.0),
        delta_h_kj_per_mol: 0.0,
        temperature_sensitivity: 1.0,
        has_gas: false,
        gas_species: vec![],
        initial_temperature_k: 298.0,
        initial_pressure_kpa: 101.325,
    }
}

/// N₂ + 3H₂ ⇌ 2NH₃ at 723 K and 200 kPa, all species gaseous.
pub fn gas_reaction() -> ReactionDef {
    let n2 = SpeciesId::from("N2");
    let h2 = SpeciesId::from("H2");
    let nh3 = SpeciesId::from("NH3");
    ReactionDef {
        id: ReactionId::from("test_haber"),
        name: "Test Haber".to_string(),
        equation: "N2 + 3H2 ⇌ 2NH3".to_string(),
        reactants: vec![n2.clone(), h2.clone()],
        products: vec![nh3.clone()],
        coefficients: BTreeMap::from([(n2.clone(), 1), (h2.clone(), 3), (nh3.clone(), 2)]),
        initial_concentrations: BTreeMap::new(),
        equilibrium_constant: 0.5,
        reference_temperature_k: None,
        delta_h_kj_per_mol: -92.0,
        temperature_sensitivity: 1.0,
        has_gas: true,
        gas_species: vec![n2, h2, nh3],
        initial_temperature_k: 723.0,
        initial_pressure_kpa: 200.0,
    }
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

pub fn config(difficulty: Option<DifficultyTier>) -> MatchConfig {
    MatchConfig {
        max_rounds: 3,
        round_ms: 30_000,
        difficulty,
    }
}

/// A match already in its first round, player goal fixed.
pub fn started_match(
    def: ReactionDef,
    difficulty: Option<DifficultyTier>,
    player_goal: Goal,
) -> (MatchState, Vec<EventEnvelope>) {
    let mut state = MatchState::new(def, Constants::default(), config(difficulty));
    let mut events = Vec::new();
    state.start_with_goal(player_goal, &mut events);
    (state, events)
}
