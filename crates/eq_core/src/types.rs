//! Type definitions for `eq_core`.
//!
//! All public data-model types: ID newtypes, actors and goals, reaction
//! definitions, tuning constants, commands and events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityEffect;
use crate::intervention::Intervention;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(SpeciesId);
string_id!(ReactionId);
string_id!(CommandId);
string_id!(EventId);

pub type Concentrations = BTreeMap<SpeciesId, f64>;

// ---------------------------------------------------------------------------
// Actors and goals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Player,
    Opponent,
}

impl Actor {
    pub const BOTH: [Actor; 2] = [Actor::Player, Actor::Opponent];

    pub fn other(self) -> Actor {
        match self {
            Actor::Player => Actor::Opponent,
            Actor::Opponent => Actor::Player,
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Actor::Player => "player",
            Actor::Opponent => "opponent",
        })
    }
}

/// Direction an actor wants the equilibrium pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Toward products.
    Forward,
    /// Toward reactants.
    Reverse,
}

impl Goal {
    pub fn opposite(self) -> Goal {
        match self {
            Goal::Forward => Goal::Reverse,
            Goal::Reverse => Goal::Forward,
        }
    }

    /// Direction a non-zero shift points in; `None` at exact equilibrium.
    pub fn of_shift(shift: f64) -> Option<Goal> {
        if shift > 0.0 {
            Some(Goal::Forward)
        } else if shift < 0.0 {
            Some(Goal::Reverse)
        } else {
            None
        }
    }

    /// +1 for forward, -1 for reverse.
    pub fn sign(self) -> f64 {
        match self {
            Goal::Forward => 1.0,
            Goal::Reverse => -1.0,
        }
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Goal::Forward => "forward",
            Goal::Reverse => "reverse",
        })
    }
}

/// Goal assignment for one match. The two actors always hold opposite goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goals {
    pub player: Goal,
}

impl Goals {
    pub fn new(player: Goal) -> Self {
        Self { player }
    }

    pub fn of(&self, actor: Actor) -> Goal {
        match actor {
            Actor::Player => self.player,
            Actor::Opponent => self.player.opposite(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reaction definitions
// ---------------------------------------------------------------------------

/// Immutable description of one reversible reaction, as supplied by the catalog.
///
/// Use [`ReactionDef::normalized`] before simulating: authoring mistakes are
/// repaired rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionDef {
    pub id: ReactionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub equation: String,
    pub reactants: Vec<SpeciesId>,
    pub products: Vec<SpeciesId>,
    /// Missing entries default to 1.
    #[serde(default)]
    pub coefficients: BTreeMap<SpeciesId, u32>,
    #[serde(default)]
    pub initial_concentrations: Concentrations,
    /// K₀, the equilibrium constant at the reference temperature.
    #[serde(default = "default_equilibrium_constant")]
    pub equilibrium_constant: f64,
    /// T₀. Falls back to the initial temperature when absent.
    #[serde(default)]
    pub reference_temperature_k: Option<f64>,
    /// ΔH in kJ/mol. Positive is endothermic.
    #[serde(default)]
    pub delta_h_kj_per_mol: f64,
    #[serde(default = "default_sensitivity")]
    pub temperature_sensitivity: f64,
    #[serde(default)]
    pub has_gas: bool,
    #[serde(default)]
    pub gas_species: Vec<SpeciesId>,
    #[serde(default = "default_temperature")]
    pub initial_temperature_k: f64,
    #[serde(default = "default_pressure")]
    pub initial_pressure_kpa: f64,
}

fn default_equilibrium_constant() -> f64 {
    1.0
}

fn default_sensitivity() -> f64 {
    1.0
}

pub(crate) fn default_temperature() -> f64 {
    298.0
}

pub(crate) fn default_pressure() -> f64 {
    101.325
}

impl ReactionDef {
    /// Stoichiometric coefficient; absent or zero entries count as 1.
    pub fn coefficient(&self, species: &SpeciesId) -> f64 {
        match self.coefficients.get(species) {
            Some(&c) if c > 0 => f64::from(c),
            _ => 1.0,
        }
    }

    pub fn reference_temperature(&self) -> f64 {
        self.reference_temperature_k
            .unwrap_or(self.initial_temperature_k)
    }

    pub fn is_reactant(&self, species: &SpeciesId) -> bool {
        self.reactants.contains(species)
    }

    pub fn is_product(&self, species: &SpeciesId) -> bool {
        self.products.contains(species)
    }

    pub fn contains(&self, species: &SpeciesId) -> bool {
        self.is_reactant(species) || self.is_product(species)
    }

    /// Pressure only couples into concentrations when gas species are listed.
    pub fn is_gas_phase(&self) -> bool {
        self.has_gas && !self.gas_species.is_empty()
    }

    /// Reactants followed by products.
    pub fn species(&self) -> impl Iterator<Item = &SpeciesId> {
        self.reactants.iter().chain(self.products.iter())
    }

    /// Species whose addition pushes the equilibrium toward `goal`.
    pub fn favoured_species(&self, goal: Goal) -> &[SpeciesId] {
        match goal {
            Goal::Forward => &self.reactants,
            Goal::Reverse => &self.products,
        }
    }
}

/// A repair applied to an authored definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fix", rename_all = "snake_case")]
pub enum DefinitionFix {
    EquilibriumConstantDefaulted { was: f64 },
    SensitivityDefaulted,
    TemperatureDefaulted { was: f64 },
    PressureDefaulted { was: f64 },
    DuplicateSpeciesDropped { species: SpeciesId },
    SpeciesOnBothSides { species: SpeciesId },
    UnknownCoefficientDropped { species: SpeciesId },
    UnknownGasSpeciesDropped { species: SpeciesId },
    ConcentrationDefaulted { species: SpeciesId },
}

impl std::fmt::Display for DefinitionFix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefinitionFix::EquilibriumConstantDefaulted { was } => {
                write!(f, "equilibrium constant {was} replaced with 1")
            }
            DefinitionFix::SensitivityDefaulted => f.write_str("temperature sensitivity reset to 1"),
            DefinitionFix::TemperatureDefaulted { was } => {
                write!(f, "temperature {was} K replaced with default")
            }
            DefinitionFix::PressureDefaulted { was } => {
                write!(f, "pressure {was} kPa replaced with default")
            }
            DefinitionFix::DuplicateSpeciesDropped { species } => {
                write!(f, "duplicate species '{species}' dropped")
            }
            DefinitionFix::SpeciesOnBothSides { species } => {
                write!(f, "'{species}' listed on both sides; kept as reactant")
            }
            DefinitionFix::UnknownCoefficientDropped { species } => {
                write!(f, "coefficient for unknown species '{species}' dropped")
            }
            DefinitionFix::UnknownGasSpeciesDropped { species } => {
                write!(f, "gas flag for unknown species '{species}' dropped")
            }
            DefinitionFix::ConcentrationDefaulted { species } => {
                write!(f, "initial concentration of '{species}' replaced with 1")
            }
        }
    }
}

impl ReactionDef {
    /// Repairs authoring mistakes instead of rejecting the definition.
    ///
    /// A broken catalog entry must still be playable, so every problem is
    /// replaced by a default and reported.
    pub fn normalized(mut self) -> (Self, Vec<DefinitionFix>) {
        let mut fixes = Vec::new();

        if !(self.equilibrium_constant.is_finite() && self.equilibrium_constant > 0.0) {
            fixes.push(DefinitionFix::EquilibriumConstantDefaulted {
                was: self.equilibrium_constant,
            });
            self.equilibrium_constant = 1.0;
        }
        if !self.temperature_sensitivity.is_finite() {
            fixes.push(DefinitionFix::SensitivityDefaulted);
            self.temperature_sensitivity = 1.0;
        }
        if !(self.initial_temperature_k.is_finite() && self.initial_temperature_k > 0.0) {
            fixes.push(DefinitionFix::TemperatureDefaulted {
                was: self.initial_temperature_k,
            });
            self.initial_temperature_k = default_temperature();
        }
        if let Some(t0) = self.reference_temperature_k {
            if !(t0.is_finite() && t0 > 0.0) {
                fixes.push(DefinitionFix::TemperatureDefaulted { was: t0 });
                self.reference_temperature_k = None;
            }
        }
        if !(self.initial_pressure_kpa.is_finite() && self.initial_pressure_kpa > 0.0) {
            fixes.push(DefinitionFix::PressureDefaulted {
                was: self.initial_pressure_kpa,
            });
            self.initial_pressure_kpa = default_pressure();
        }

        dedup_species(&mut self.reactants, &mut fixes);
        dedup_species(&mut self.products, &mut fixes);
        let reactants = self.reactants.clone();
        self.products.retain(|species| {
            let both = reactants.contains(species);
            if both {
                fixes.push(DefinitionFix::SpeciesOnBothSides {
                    species: species.clone(),
                });
            }
            !both
        });

        let known: Vec<SpeciesId> = self.species().cloned().collect();
        self.coefficients.retain(|species, _| {
            let keep = known.contains(species);
            if !keep {
                fixes.push(DefinitionFix::UnknownCoefficientDropped {
                    species: species.clone(),
                });
            }
            keep
        });
        self.gas_species.retain(|species| {
            let keep = known.contains(species);
            if !keep {
                fixes.push(DefinitionFix::UnknownGasSpeciesDropped {
                    species: species.clone(),
                });
            }
            keep
        });
        for (species, c) in &mut self.initial_concentrations {
            if !(c.is_finite() && *c > 0.0) {
                fixes.push(DefinitionFix::ConcentrationDefaulted {
                    species: species.clone(),
                });
                *c = 1.0;
            }
        }

        (self, fixes)
    }
}

fn dedup_species(list: &mut Vec<SpeciesId>, fixes: &mut Vec<DefinitionFix>) {
    let mut seen: Vec<SpeciesId> = Vec::with_capacity(list.len());
    list.retain(|species| {
        if seen.contains(species) {
            fixes.push(DefinitionFix::DuplicateSpeciesDropped {
                species: species.clone(),
            });
            false
        } else {
            seen.push(species.clone());
            true
        }
    });
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
}

// ---------------------------------------------------------------------------
// Tuning constants
// ---------------------------------------------------------------------------

/// Tuning knobs for the action economy, intervention magnitudes and clamps.
///
/// `Default` carries the canonical values; a content file may override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    pub add_species_cooldown_ms: u64,
    pub temperature_cooldown_ms: u64,
    pub pressure_cooldown_ms: u64,
    /// Lower bound on any scaled opponent cooldown.
    pub opponent_cooldown_floor_ms: u64,
    /// Fraction of the species' round-start concentration added per dose.
    pub add_species_fraction: f64,
    pub temperature_step_k: f64,
    pub pressure_step_kpa: f64,
    pub temperature_min_k: f64,
    pub temperature_max_k: f64,
    pub pressure_min_kpa: f64,
    pub pressure_max_kpa: f64,
    /// Pause between a round's settlement and the next round's start.
    pub round_settle_ms: u64,
    pub catalyst_factor: f64,
    pub heat_exchange_k: f64,
    pub buffer_multiplier: f64,
    pub buffer_rounds: u32,
    pub quantum_temperature_k: f64,
    pub quantum_concentration: f64,
    pub quantum_pressure_kpa: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            add_species_cooldown_ms: 3_000,
            temperature_cooldown_ms: 5_000,
            pressure_cooldown_ms: 5_000,
            opponent_cooldown_floor_ms: 250,
            add_species_fraction: 0.05,
            temperature_step_k: 20.0,
            pressure_step_kpa: 50.0,
            temperature_min_k: 200.0,
            temperature_max_k: 1_500.0,
            pressure_min_kpa: 10.0,
            pressure_max_kpa: 500.0,
            round_settle_ms: 2_000,
            catalyst_factor: 0.03,
            heat_exchange_k: 100.0,
            buffer_multiplier: 0.5,
            buffer_rounds: 2,
            quantum_temperature_k: 80.0,
            quantum_concentration: 0.3,
            quantum_pressure_kpa: 50.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why an intervention was refused. Rejections never mutate state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    CoolingDown { remaining_ms: u64 },
    AbilityRecharging { rounds_left: u32 },
    NotGasPhase,
    UnknownSpecies { species: SpeciesId },
    RoundNotActive,
    Paused,
    OpponentDisabled,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::CoolingDown { remaining_ms } => {
                write!(f, "still cooling down ({remaining_ms} ms left)")
            }
            Rejection::AbilityRecharging { rounds_left } => {
                write!(f, "ability recharging ({rounds_left} rounds left)")
            }
            Rejection::NotGasPhase => f.write_str("reaction has no gas-phase species"),
            Rejection::UnknownSpecies { species } => {
                write!(f, "species '{species}' is not part of this reaction")
            }
            Rejection::RoundNotActive => f.write_str("no round is active"),
            Rejection::Paused => f.write_str("match is paused"),
            Rejection::OpponentDisabled => f.write_str("opponent is disabled for this match"),
        }
    }
}

impl std::error::Error for Rejection {}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_by: Actor,
    pub issued_ms: u64,
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Intervene { intervention: Intervention },
    Pause,
    Resume,
    EndRound,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Derived quantities after a mutation, for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionReport {
    pub k: f64,
    pub q: f64,
    pub shift: f64,
    pub temperature_k: f64,
    pub pressure_kpa: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub at_ms: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    MatchStarted {
        reaction_id: ReactionId,
        player_goal: Goal,
        opponent_goal: Goal,
        max_rounds: u32,
        difficulty: Option<u8>,
    },
    RoundStarted {
        round: u32,
        report: ReactionReport,
    },
    ActionAccepted {
        actor: Actor,
        intervention: Intervention,
        report: ReactionReport,
    },
    ActionRejected {
        actor: Actor,
        intervention: Intervention,
        rejection: Rejection,
    },
    AbilityUsed {
        actor: Actor,
        effect: AbilityEffect,
        report: ReactionReport,
    },
    RoundSettled {
        round: u32,
        shift: f64,
        player_score: f64,
        opponent_score: f64,
        player_total: f64,
        opponent_total: f64,
    },
    MatchEnded {
        winner: Actor,
        stars: u8,
        player_total: f64,
        opponent_total: f64,
        achievement_pct: f64,
    },
    Paused,
    Resumed,
}
