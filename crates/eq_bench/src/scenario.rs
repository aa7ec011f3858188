use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub reaction_id: String,
    pub seeds: SeedSpec,
    /// Opponent tiers to sweep.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<u8>,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "default_round_seconds")]
    pub round_seconds: u64,
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    /// Tier of the automatic player; absent means the player never acts.
    #[serde(default)]
    pub player_tier: Option<u8>,
    #[serde(default = "default_content_dir")]
    pub content_dir: String,
    /// Constants overrides, keyed by `Constants` field name.
    #[serde(default)]
    pub overrides: HashMap<String, serde_json::Value>,
}

fn default_tiers() -> Vec<u8> {
    vec![1, 2, 3, 4]
}

fn default_max_rounds() -> u32 {
    10
}

fn default_round_seconds() -> u64 {
    30
}

fn default_step_ms() -> u64 {
    250
}

fn default_content_dir() -> String {
    "./content".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedSpec {
    List(Vec<u64>),
    Range { range: [u64; 2] },
}

impl SeedSpec {
    pub fn expand(&self) -> Vec<u64> {
        match self {
            SeedSpec::List(seeds) => seeds.clone(),
            SeedSpec::Range { range } => (range[0]..=range[1]).collect(),
        }
    }
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario file: {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&json)
        .with_context(|| format!("parsing scenario file: {}", path.display()))?;
    validate(&scenario)?;
    Ok(scenario)
}

fn validate(scenario: &Scenario) -> Result<()> {
    if scenario.name.is_empty() {
        bail!("scenario 'name' must not be empty");
    }
    if scenario.reaction_id.is_empty() {
        bail!("scenario 'reaction_id' must not be empty");
    }
    if scenario.seeds.expand().is_empty() {
        bail!("scenario 'seeds' must produce at least one seed");
    }
    if scenario.tiers.is_empty() {
        bail!("scenario 'tiers' must list at least one tier");
    }
    if let Some(bad) = scenario
        .tiers
        .iter()
        .chain(scenario.player_tier.iter())
        .find(|t| !(1..=4).contains(*t))
    {
        bail!("tier {bad} out of range 1-4");
    }
    if scenario.max_rounds == 0 {
        bail!("scenario 'max_rounds' must be > 0");
    }
    if scenario.round_seconds == 0 {
        bail!("scenario 'round_seconds' must be > 0");
    }
    if scenario.step_ms == 0 {
        bail!("scenario 'step_ms' must be > 0");
    }
    Ok(())
}
