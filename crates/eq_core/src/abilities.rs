//! One-shot modifiers with round-counted recharge, tracked per actor.

use std::collections::BTreeMap;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::equilibrium::temperature_effect;
use crate::reaction::ReactionState;
use crate::{Actor, Constants, Goal, ReactionDef, Rejection, SpeciesId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    /// Nudges concentrations toward the equilibrium ratio.
    Catalyst,
    /// Dampens the other actor's interventions for a few rounds.
    Buffer,
    /// Large temperature jump in the user's favour.
    HeatExchange,
    /// Random temperature, concentration and pressure jump.
    Quantum,
}

impl AbilityKind {
    pub const ALL: [AbilityKind; 4] = [
        AbilityKind::Catalyst,
        AbilityKind::Buffer,
        AbilityKind::HeatExchange,
        AbilityKind::Quantum,
    ];

    pub fn recharge_rounds(self) -> u32 {
        match self {
            AbilityKind::Catalyst | AbilityKind::HeatExchange => 3,
            AbilityKind::Buffer => 4,
            AbilityKind::Quantum => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AbilityKind::Catalyst => "catalyst",
            AbilityKind::Buffer => "buffer",
            AbilityKind::HeatExchange => "heat_exchange",
            AbilityKind::Quantum => "quantum",
        }
    }
}

impl std::fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AbilityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown ability '{s}'"))
    }
}

/// What an ability actually did, for events and replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbilityEffect {
    Catalyst {
        factor: f64,
        toward: Option<Goal>,
    },
    Buffer {
        target: Actor,
        multiplier: f64,
        rounds: u32,
    },
    HeatExchange {
        delta_k: f64,
    },
    Quantum {
        delta_k: f64,
        species: Option<SpeciesId>,
        delta_concentration: f64,
        delta_kpa: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dampening {
    pub multiplier: f64,
    pub rounds_left: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilitySlots {
    /// Rounds until each used ability is available again.
    pub recharge: BTreeMap<AbilityKind, u32>,
    /// Modifiers applied to this actor's interventions.
    pub dampening: Vec<Dampening>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityBook {
    pub player: AbilitySlots,
    pub opponent: AbilitySlots,
}

impl AbilityBook {
    pub fn slots(&self, actor: Actor) -> &AbilitySlots {
        match actor {
            Actor::Player => &self.player,
            Actor::Opponent => &self.opponent,
        }
    }

    fn slots_mut(&mut self, actor: Actor) -> &mut AbilitySlots {
        match actor {
            Actor::Player => &mut self.player,
            Actor::Opponent => &mut self.opponent,
        }
    }

    pub fn rounds_left(&self, kind: AbilityKind, actor: Actor) -> u32 {
        self.slots(actor).recharge.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_available(&self, kind: AbilityKind, actor: Actor) -> bool {
        self.rounds_left(kind, actor) == 0
    }

    pub fn available(&self, actor: Actor) -> impl Iterator<Item = AbilityKind> + '_ {
        AbilityKind::ALL
            .into_iter()
            .filter(move |kind| self.is_available(*kind, actor))
    }

    pub fn consume(&mut self, kind: AbilityKind, actor: Actor) -> Result<(), Rejection> {
        let rounds_left = self.rounds_left(kind, actor);
        if rounds_left > 0 {
            return Err(Rejection::AbilityRecharging { rounds_left });
        }
        self.slots_mut(actor)
            .recharge
            .insert(kind, kind.recharge_rounds());
        Ok(())
    }

    pub fn dampen(&mut self, target: Actor, multiplier: f64, rounds: u32) {
        if rounds == 0 {
            return;
        }
        self.slots_mut(target).dampening.push(Dampening {
            multiplier,
            rounds_left: rounds,
        });
    }

    /// Scale applied to `actor`'s interventions: the product of active dampening.
    pub fn magnitude_for(&self, actor: Actor) -> f64 {
        self.slots(actor)
            .dampening
            .iter()
            .map(|d| d.multiplier)
            .product()
    }

    /// Called once per round boundary.
    pub fn tick_cooldowns(&mut self) {
        for actor in Actor::BOTH {
            let slots = self.slots_mut(actor);
            slots.recharge.retain(|_, left| {
                *left = left.saturating_sub(1);
                *left > 0
            });
            slots.dampening.retain_mut(|d| {
                d.rounds_left = d.rounds_left.saturating_sub(1);
                d.rounds_left > 0
            });
        }
    }
}

/// Consumes `kind` for `actor` and applies its effect to `state`.
///
/// `goal` is the user's goal; it decides the heat-exchange direction.
#[allow(clippy::too_many_arguments)]
pub fn use_ability<R: Rng + ?Sized>(
    book: &mut AbilityBook,
    kind: AbilityKind,
    actor: Actor,
    goal: Goal,
    def: &ReactionDef,
    state: &mut ReactionState,
    constants: &Constants,
    rng: &mut R,
) -> Result<AbilityEffect, Rejection> {
    book.consume(kind, actor)?;
    let magnitude = book.magnitude_for(actor);
    let effect = apply_ability(kind, actor, goal, def, state, magnitude, constants, rng);
    if let AbilityEffect::Buffer {
        target,
        multiplier,
        rounds,
    } = &effect
    {
        book.dampen(*target, *multiplier, *rounds);
    }
    Ok(effect)
}

/// Applies an ability's physical effect without touching recharge state.
#[allow(clippy::too_many_arguments)]
pub fn apply_ability<R: Rng + ?Sized>(
    kind: AbilityKind,
    actor: Actor,
    goal: Goal,
    def: &ReactionDef,
    state: &mut ReactionState,
    magnitude: f64,
    constants: &Constants,
    rng: &mut R,
) -> AbilityEffect {
    let effect = match kind {
        AbilityKind::Catalyst => {
            let factor = constants.catalyst_factor * magnitude;
            let toward = Goal::of_shift(state.shift);
            if let Some(direction) = toward {
                let (shrink, grow) = match direction {
                    Goal::Forward => (&def.reactants, &def.products),
                    Goal::Reverse => (&def.products, &def.reactants),
                };
                for species in shrink {
                    state.scale_concentration(species, 1.0 - factor);
                }
                for species in grow {
                    state.scale_concentration(species, 1.0 + factor);
                }
            }
            AbilityEffect::Catalyst { factor, toward }
        }
        AbilityKind::Buffer => AbilityEffect::Buffer {
            target: actor.other(),
            multiplier: constants.buffer_multiplier,
            rounds: constants.buffer_rounds,
        },
        AbilityKind::HeatExchange => {
            let direction = match temperature_effect(def).favours_on_increase {
                Some(favoured) if favoured == goal => 1.0,
                Some(_) => -1.0,
                None => goal.sign(),
            };
            let delta_k = direction * constants.heat_exchange_k * magnitude;
            state.adjust_temperature(delta_k, constants);
            AbilityEffect::HeatExchange { delta_k }
        }
        AbilityKind::Quantum => quantum_jump(def, state, magnitude, constants, rng),
    };
    state.recompute(def);
    effect
}

fn quantum_jump<R: Rng + ?Sized>(
    def: &ReactionDef,
    state: &mut ReactionState,
    magnitude: f64,
    constants: &Constants,
    rng: &mut R,
) -> AbilityEffect {
    let t_span = constants.quantum_temperature_k;
    let delta_k = rng.gen_range(-t_span..=t_span) * magnitude;
    state.adjust_temperature(delta_k, constants);

    let species: Vec<&SpeciesId> = def.species().collect();
    let c_span = constants.quantum_concentration;
    let delta_concentration = rng.gen_range(-c_span..=c_span) * magnitude;
    let target = if species.is_empty() {
        None
    } else {
        let picked = species[rng.gen_range(0..species.len())].clone();
        state.add_to_concentration(&picked, delta_concentration);
        Some(picked)
    };

    let delta_kpa = if def.is_gas_phase() {
        let p_span = constants.quantum_pressure_kpa;
        let delta = rng.gen_range(-p_span..=p_span) * magnitude;
        state.adjust_pressure(def, delta, constants);
        Some(delta)
    } else {
        None
    };

    AbilityEffect::Quantum {
        delta_k,
        species: target,
        delta_concentration,
        delta_kpa,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{make_rng, simple_reaction};

    #[test]
    fn recharge_counts_rounds() {
        let mut book = AbilityBook::default();
        book.consume(AbilityKind::Catalyst, Actor::Player).unwrap();
        assert_eq!(
            book.consume(AbilityKind::Catalyst, Actor::Player),
            Err(Rejection::AbilityRecharging { rounds_left: 3 })
        );
        assert!(book.is_available(AbilityKind::Catalyst, Actor::Opponent));

        book.tick_cooldowns();
        book.tick_cooldowns();
        assert!(!book.is_available(AbilityKind::Catalyst, Actor::Player));
        book.tick_cooldowns();
        assert!(book.is_available(AbilityKind::Catalyst, Actor::Player));
    }

    #[test]
    fn buffer_dampens_the_other_actor_then_expires() {
        let constants = Constants::default();
        let def = simple_reaction();
        let mut state = ReactionState::at_equilibrium(&def, &constants);
        let mut book = AbilityBook::default();
        let mut rng = make_rng();

        let effect = use_ability(
            &mut book,
            AbilityKind::Buffer,
            Actor::Player,
            Goal::Forward,
            &def,
            &mut state,
            &constants,
            &mut rng,
        )
        .unwrap();
        assert!(matches!(effect, AbilityEffect::Buffer { target: Actor::Opponent, .. }));
        assert!((book.magnitude_for(Actor::Opponent) - 0.5).abs() < 1e-12);
        assert!((book.magnitude_for(Actor::Player) - 1.0).abs() < 1e-12);

        book.tick_cooldowns();
        assert!((book.magnitude_for(Actor::Opponent) - 0.5).abs() < 1e-12);
        book.tick_cooldowns();
        assert!((book.magnitude_for(Actor::Opponent) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn catalyst_moves_toward_equilibrium() {
        let constants = Constants::default();
        let def = simple_reaction();
        let mut state = ReactionState::at_equilibrium(&def, &constants);
        state.scale_concentration(&SpeciesId::from("A"), 2.0);
        state.recompute(&def);
        let before = state.shift;
        assert!(before > 0.0);

        let mut rng = make_rng();
        apply_ability(
            AbilityKind::Catalyst,
            Actor::Opponent,
            Goal::Reverse,
            &def,
            &mut state,
            1.0,
            &constants,
            &mut rng,
        );
        assert!(state.shift < before);
    }

    #[test]
    fn heat_exchange_follows_goal_and_enthalpy() {
        let constants = Constants::default();
        let mut def = simple_reaction();
        def.delta_h_kj_per_mol = -50.0;
        let mut rng = make_rng();

        let mut state = ReactionState::at_equilibrium(&def, &constants);
        let t0 = state.temperature_k;
        apply_ability(
            AbilityKind::HeatExchange,
            Actor::Player,
            Goal::Forward,
            &def,
            &mut state,
            1.0,
            &constants,
            &mut rng,
        );
        // Exothermic: cooling favours products.
        assert!(state.temperature_k < t0);
        assert!(state.shift > 0.0);
    }

    #[test]
    fn quantum_stays_inside_clamps() {
        let constants = Constants::default();
        let def = simple_reaction();
        let mut rng = make_rng();
        let mut state = ReactionState::at_equilibrium(&def, &constants);
        for _ in 0..50 {
            apply_ability(
                AbilityKind::Quantum,
                Actor::Player,
                Goal::Forward,
                &def,
                &mut state,
                1.0,
                &constants,
                &mut rng,
            );
            assert!(state.temperature_k >= constants.temperature_min_k);
            assert!(state.temperature_k <= constants.temperature_max_k);
            assert!(state.concentrations.values().all(|c| *c > 0.0));
            assert!(state.shift.is_finite());
        }
    }

    #[test]
    fn ability_names_parse() {
        for kind in AbilityKind::ALL {
            assert_eq!(kind.as_str().parse::<AbilityKind>(), Ok(kind));
        }
        assert!("teleport".parse::<AbilityKind>().is_err());
    }
}
