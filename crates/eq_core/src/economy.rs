//! Per-actor cooldown windows gating every physical intervention.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Actor, Constants, ReactionDef, Rejection, SpeciesId};

/// Identity of a physical intervention. Each identity cools down independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKey {
    AddSpecies(SpeciesId),
    Heat,
    Cool,
    Pressurize,
    Depressurize,
}

impl ActionKey {
    pub fn base_cooldown_ms(&self, constants: &Constants) -> u64 {
        match self {
            ActionKey::AddSpecies(_) => constants.add_species_cooldown_ms,
            ActionKey::Heat | ActionKey::Cool => constants.temperature_cooldown_ms,
            ActionKey::Pressurize | ActionKey::Depressurize => constants.pressure_cooldown_ms,
        }
    }

    /// Every identity that exists for `def`, in a stable order.
    pub fn all_for(def: &ReactionDef) -> Vec<ActionKey> {
        let mut keys: Vec<ActionKey> = def
            .species()
            .map(|species| ActionKey::AddSpecies(species.clone()))
            .collect();
        keys.extend([ActionKey::Heat, ActionKey::Cool]);
        if def.is_gas_phase() {
            keys.extend([ActionKey::Pressurize, ActionKey::Depressurize]);
        }
        keys
    }

    /// Whether this identity can exist for `def` at all.
    pub fn applies_to(&self, def: &ReactionDef) -> bool {
        match self {
            ActionKey::AddSpecies(species) => def.contains(species),
            ActionKey::Heat | ActionKey::Cool => true,
            ActionKey::Pressurize | ActionKey::Depressurize => def.is_gas_phase(),
        }
    }
}

impl std::fmt::Display for ActionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKey::AddSpecies(species) => write!(f, "addSpecies:{species}"),
            ActionKey::Heat => f.write_str("heat"),
            ActionKey::Cool => f.write_str("cool"),
            ActionKey::Pressurize => f.write_str("pressurize"),
            ActionKey::Depressurize => f.write_str("depressurize"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseActionKeyError(pub String);

impl std::fmt::Display for ParseActionKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown action identity '{}'", self.0)
    }
}

impl std::error::Error for ParseActionKeyError {}

impl FromStr for ActionKey {
    type Err = ParseActionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(species) = s.strip_prefix("addSpecies:") {
            if species.is_empty() {
                return Err(ParseActionKeyError(s.to_string()));
            }
            return Ok(ActionKey::AddSpecies(SpeciesId::from(species)));
        }
        match s {
            "heat" => Ok(ActionKey::Heat),
            "cool" => Ok(ActionKey::Cool),
            "pressurize" => Ok(ActionKey::Pressurize),
            "depressurize" => Ok(ActionKey::Depressurize),
            _ => Err(ParseActionKeyError(s.to_string())),
        }
    }
}

// Serialized as the display string so it can key JSON maps.
impl Serialize for ActionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub started_ms: u64,
    pub duration_ms: u64,
}

impl CooldownEntry {
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.started_ms);
        self.duration_ms.saturating_sub(elapsed)
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.started_ms) >= self.duration_ms
    }
}

/// Cooldown tables for both actors.
///
/// The opponent's durations are scaled by a difficulty multiplier and floored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEconomy {
    pub player: BTreeMap<ActionKey, CooldownEntry>,
    pub opponent: BTreeMap<ActionKey, CooldownEntry>,
    pub opponent_multiplier: f64,
}

impl ActionEconomy {
    pub fn new(opponent_multiplier: f64) -> Self {
        Self {
            player: BTreeMap::new(),
            opponent: BTreeMap::new(),
            opponent_multiplier,
        }
    }

    fn table(&self, actor: Actor) -> &BTreeMap<ActionKey, CooldownEntry> {
        match actor {
            Actor::Player => &self.player,
            Actor::Opponent => &self.opponent,
        }
    }

    fn table_mut(&mut self, actor: Actor) -> &mut BTreeMap<ActionKey, CooldownEntry> {
        match actor {
            Actor::Player => &mut self.player,
            Actor::Opponent => &mut self.opponent,
        }
    }

    /// Cooldown an accepted request would start.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn duration_ms(&self, actor: Actor, key: &ActionKey, constants: &Constants) -> u64 {
        let base = key.base_cooldown_ms(constants);
        match actor {
            Actor::Player => base,
            Actor::Opponent => {
                let scaled = (base as f64 * self.opponent_multiplier).round().max(0.0) as u64;
                scaled.max(constants.opponent_cooldown_floor_ms)
            }
        }
    }

    pub fn is_available(&self, actor: Actor, key: &ActionKey, now_ms: u64) -> bool {
        self.table(actor)
            .get(key)
            .map_or(true, |entry| entry.is_expired(now_ms))
    }

    pub fn remaining_ms(&self, actor: Actor, key: &ActionKey, now_ms: u64) -> u64 {
        self.table(actor)
            .get(key)
            .map_or(0, |entry| entry.remaining_ms(now_ms))
    }

    /// Accepts the request and starts a cooldown, or rejects it untouched.
    pub fn request(
        &mut self,
        actor: Actor,
        key: &ActionKey,
        now_ms: u64,
        constants: &Constants,
    ) -> Result<CooldownEntry, Rejection> {
        let remaining_ms = self.remaining_ms(actor, key, now_ms);
        if remaining_ms > 0 {
            return Err(Rejection::CoolingDown { remaining_ms });
        }
        let entry = CooldownEntry {
            started_ms: now_ms,
            duration_ms: self.duration_ms(actor, key, constants),
        };
        self.table_mut(actor).insert(key.clone(), entry);
        Ok(entry)
    }

    pub fn reset_all(&mut self, actor: Actor) {
        self.table_mut(actor).clear();
    }

    /// Economy for the next round. The player starts clean; opponent entries
    /// carry over only for identities that exist in `def`.
    pub fn next_round(&self, def: &ReactionDef) -> ActionEconomy {
        let opponent = self
            .opponent
            .iter()
            .filter(|(key, _)| key.applies_to(def))
            .map(|(key, entry)| (key.clone(), *entry))
            .collect();
        ActionEconomy {
            player: BTreeMap::new(),
            opponent,
            opponent_multiplier: self.opponent_multiplier,
        }
    }
}
