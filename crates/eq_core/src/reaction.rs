use serde::{Deserialize, Serialize};

use crate::equilibrium::{
    balanced_concentrations, equilibrium_constant, reaction_quotient, shift, CONCENTRATION_EPSILON,
};
use crate::{Concentrations, Constants, ReactionDef, ReactionReport, SpeciesId};

/// Mutable physical state of one reaction for one round.
///
/// `k`, `q` and `shift` are caches; every mutation path in the crate ends
/// with [`ReactionState::recompute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionState {
    pub temperature_k: f64,
    pub pressure_kpa: f64,
    pub concentrations: Concentrations,
    /// Round-start concentrations. Dose sizes are fractions of these.
    pub base_concentrations: Concentrations,
    pub k: f64,
    pub q: f64,
    pub shift: f64,
}

impl ReactionState {
    /// Round-start state: authored temperature and pressure, concentrations
    /// chosen so that Q equals K.
    pub fn at_equilibrium(def: &ReactionDef, constants: &Constants) -> Self {
        let temperature_k = def
            .initial_temperature_k
            .clamp(constants.temperature_min_k, constants.temperature_max_k);
        let pressure_kpa = def
            .initial_pressure_kpa
            .clamp(constants.pressure_min_kpa, constants.pressure_max_kpa);
        let concentrations = balanced_concentrations(def, temperature_k);
        let mut state = Self {
            temperature_k,
            pressure_kpa,
            base_concentrations: concentrations.clone(),
            concentrations,
            k: 1.0,
            q: 1.0,
            shift: 0.0,
        };
        state.recompute(def);
        state
    }

    pub fn recompute(&mut self, def: &ReactionDef) {
        self.k = equilibrium_constant(def, self.temperature_k);
        self.q = reaction_quotient(def, &self.concentrations);
        self.shift = shift(self.k, self.q);
    }

    pub fn concentration(&self, species: &SpeciesId) -> f64 {
        self.concentrations.get(species).copied().unwrap_or(0.0)
    }

    pub fn base_concentration(&self, species: &SpeciesId) -> f64 {
        self.base_concentrations
            .get(species)
            .copied()
            .unwrap_or_else(|| self.concentration(species))
    }

    pub fn report(&self) -> ReactionReport {
        ReactionReport {
            k: self.k,
            q: self.q,
            shift: self.shift,
            temperature_k: self.temperature_k,
            pressure_kpa: self.pressure_kpa,
        }
    }

    /// Stores an intervention result. Only non-positive values are floored;
    /// large-K reactions start far outside any fixed range and a dose must
    /// never move a concentration against its sign.
    pub(crate) fn set_concentration(&mut self, species: &SpeciesId, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.concentrations
            .insert(species.clone(), value.max(CONCENTRATION_EPSILON));
    }

    pub(crate) fn add_to_concentration(&mut self, species: &SpeciesId, delta: f64) {
        let current = self.concentration(species);
        self.set_concentration(species, current + delta);
    }

    pub(crate) fn scale_concentration(&mut self, species: &SpeciesId, factor: f64) {
        let current = self.concentration(species);
        self.set_concentration(species, current * factor);
    }

    pub(crate) fn adjust_temperature(&mut self, delta_k: f64, constants: &Constants) {
        self.temperature_k = (self.temperature_k + delta_k)
            .clamp(constants.temperature_min_k, constants.temperature_max_k);
    }

    /// Changes pressure and rescales every gas species by new/old pressure.
    /// No-op for reactions without gas-phase species.
    pub(crate) fn adjust_pressure(&mut self, def: &ReactionDef, delta_kpa: f64, constants: &Constants) {
        if !def.is_gas_phase() {
            return;
        }
        let old = self.pressure_kpa;
        let new = (old + delta_kpa).clamp(constants.pressure_min_kpa, constants.pressure_max_kpa);
        self.pressure_kpa = new;
        if old <= 0.0 {
            return;
        }
        let ratio = new / old;
        for species in &def.gas_species {
            if self.concentrations.contains_key(species) {
                self.scale_concentration(species, ratio);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{gas_reaction, simple_reaction};

    #[test]
    fn round_start_is_balanced() {
        let def = simple_reaction();
        let state = ReactionState::at_equilibrium(&def, &Constants::default());
        assert!(state.shift.abs() < 1e-9);
        assert!((state.k - 100.0).abs() < 1e-9);
        assert_eq!(state.concentrations, state.base_concentrations);
    }

    #[test]
    fn pressure_rescales_gas_species_only() {
        let mut def = gas_reaction();
        def.gas_species = vec![SpeciesId::from("N2"), SpeciesId::from("H2")];
        let constants = Constants::default();
        let mut state = ReactionState::at_equilibrium(&def, &constants);
        let before_n2 = state.concentration(&SpeciesId::from("N2"));
        let before_nh3 = state.concentration(&SpeciesId::from("NH3"));
        let old_p = state.pressure_kpa;

        state.adjust_pressure(&def, 50.0, &constants);
        let ratio = state.pressure_kpa / old_p;

        let after_n2 = state.concentration(&SpeciesId::from("N2"));
        assert!((after_n2 - before_n2 * ratio).abs() < 1e-12);
        assert!((state.concentration(&SpeciesId::from("NH3")) - before_nh3).abs() < f64::EPSILON);
    }

    #[test]
    fn pressure_ignored_without_gas_phase() {
        let def = simple_reaction();
        let constants = Constants::default();
        let mut state = ReactionState::at_equilibrium(&def, &constants);
        let before = state.clone();
        state.adjust_pressure(&def, 50.0, &constants);
        assert_eq!(state, before);
    }

    #[test]
    fn temperature_is_clamped() {
        let def = simple_reaction();
        let constants = Constants::default();
        let mut state = ReactionState::at_equilibrium(&def, &constants);
        state.adjust_temperature(1e6, &constants);
        assert!((state.temperature_k - constants.temperature_max_k).abs() < f64::EPSILON);
        state.adjust_temperature(-1e6, &constants);
        assert!((state.temperature_k - constants.temperature_min_k).abs() < f64::EPSILON);
    }

    #[test]
    fn concentrations_stay_positive() {
        let def = simple_reaction();
        let constants = Constants::default();
        let mut state = ReactionState::at_equilibrium(&def, &constants);
        let a = SpeciesId::from("A");
        state.add_to_concentration(&a, -1e6);
        assert!(state.concentration(&a) > 0.0);
    }

    #[test]
    fn doses_outside_the_usual_range_keep_their_sign() {
        let def = simple_reaction();
        let constants = Constants::default();
        let mut state = ReactionState::at_equilibrium(&def, &constants);
        let a = SpeciesId::from("A");
        let b = SpeciesId::from("B");
        state.concentrations.insert(a.clone(), 2e9);
        state.concentrations.insert(b.clone(), 5e-10);

        state.add_to_concentration(&a, 1e8);
        assert!((state.concentration(&a) - 2.1e9).abs() < 1.0);
        state.scale_concentration(&b, 1.05);
        assert!((state.concentration(&b) - 5.25e-10).abs() < 1e-20);
        state.scale_concentration(&b, 0.5);
        assert!(state.concentration(&b) < 5.25e-10);

        state.add_to_concentration(&a, f64::INFINITY);
        assert!((state.concentration(&a) - 2.1e9).abs() < 1.0);
    }
}
