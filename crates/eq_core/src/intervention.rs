use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::abilities::AbilityKind;
use crate::economy::ActionKey;
use crate::reaction::ReactionState;
use crate::{Constants, ReactionDef, Rejection};

/// Anything an actor can ask for: a physical action or an ability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Intervention {
    Act(ActionKey),
    UseAbility(AbilityKind),
}

impl From<ActionKey> for Intervention {
    fn from(key: ActionKey) -> Self {
        Intervention::Act(key)
    }
}

impl From<AbilityKind> for Intervention {
    fn from(kind: AbilityKind) -> Self {
        Intervention::UseAbility(kind)
    }
}

impl std::fmt::Display for Intervention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intervention::Act(key) => write!(f, "{key}"),
            Intervention::UseAbility(kind) => write!(f, "ability:{kind}"),
        }
    }
}

impl FromStr for Intervention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("ability:") {
            Some(name) => name.parse().map(Intervention::UseAbility),
            None => s
                .parse()
                .map(Intervention::Act)
                .map_err(|err: crate::economy::ParseActionKeyError| err.to_string()),
        }
    }
}

impl Serialize for Intervention {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Intervention {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Checks that `key` makes sense for `def`, independent of cooldowns.
pub fn validate_action(def: &ReactionDef, key: &ActionKey) -> Result<(), Rejection> {
    match key {
        ActionKey::AddSpecies(species) if !def.contains(species) => {
            Err(Rejection::UnknownSpecies {
                species: species.clone(),
            })
        }
        ActionKey::Pressurize | ActionKey::Depressurize if !def.is_gas_phase() => {
            Err(Rejection::NotGasPhase)
        }
        _ => Ok(()),
    }
}

/// Applies one physical action and recomputes K, Q and shift.
///
/// `magnitude` scales the step (dampening from an opposing buffer).
pub fn apply_action(
    key: &ActionKey,
    def: &ReactionDef,
    state: &mut ReactionState,
    magnitude: f64,
    constants: &Constants,
) {
    match key {
        ActionKey::AddSpecies(species) => {
            let dose = state.base_concentration(species) * constants.add_species_fraction * magnitude;
            state.add_to_concentration(species, dose);
        }
        ActionKey::Heat => state.adjust_temperature(constants.temperature_step_k * magnitude, constants),
        ActionKey::Cool => state.adjust_temperature(-constants.temperature_step_k * magnitude, constants),
        ActionKey::Pressurize => {
            state.adjust_pressure(def, constants.pressure_step_kpa * magnitude, constants);
        }
        ActionKey::Depressurize => {
            state.adjust_pressure(def, -constants.pressure_step_kpa * magnitude, constants);
        }
    }
    state.recompute(def);
}

/// Result of applying `key` to a copy of `state`. The live state is untouched.
pub fn preview(
    key: &ActionKey,
    def: &ReactionDef,
    state: &ReactionState,
    magnitude: f64,
    constants: &Constants,
) -> ReactionState {
    let mut copy = state.clone();
    apply_action(key, def, &mut copy, magnitude, constants);
    copy
}
