//! Reaction catalog and settings loading shared between eq_cli, eq_daemon and eq_bench.

use anyhow::{bail, Context, Result};
use eq_core::{
    Constants, DefinitionFix, DifficultyTier, EventEnvelope, MatchConfig, MatchState, ReactionDef,
    ReactionId,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Deserialize)]
struct ReactionsFile {
    content_version: String,
    reactions: Vec<ReactionDef>,
}

/// Player-facing match settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub round_seconds: u64,
    pub max_rounds: u32,
    /// Opponent tier 1-4; `null` disables the opponent.
    pub difficulty: Option<u8>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            round_seconds: 30,
            max_rounds: 10,
            difficulty: Some(2),
        }
    }
}

impl Settings {
    pub fn to_match_config(&self) -> MatchConfig {
        MatchConfig {
            max_rounds: self.max_rounds,
            round_ms: self.round_seconds * 1_000,
            difficulty: self.difficulty.map(DifficultyTier::new),
        }
    }
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.round_seconds == 0 {
        bail!("round_seconds must be at least 1");
    }
    if settings.max_rounds == 0 {
        bail!("max_rounds must be at least 1");
    }
    if let Some(level) = settings.difficulty {
        if !(1..=4).contains(&level) {
            bail!("difficulty must be between 1 and 4, got {level}");
        }
    }
    Ok(())
}

/// Everything loaded from a content directory.
#[derive(Debug, Clone)]
pub struct Content {
    pub content_version: String,
    /// Normalized definitions, in file order.
    pub reactions: Vec<ReactionDef>,
    pub settings: Settings,
    pub constants: Constants,
    /// Repairs applied while normalizing the catalog.
    pub fixes: Vec<(ReactionId, DefinitionFix)>,
}

impl Content {
    pub fn reaction(&self, id: &str) -> Option<&ReactionDef> {
        self.reactions.iter().find(|r| r.id.0 == id)
    }
}

/// Rejects catalogs that no amount of normalization can make playable.
///
/// Duplicate IDs and reactions missing a side are errors; every other
/// authoring mistake is repaired by [`ReactionDef::normalized`].
pub fn validate_catalog(reactions: &[ReactionDef]) -> Result<()> {
    if reactions.is_empty() {
        bail!("reaction catalog is empty");
    }
    let mut seen: HashSet<&str> = HashSet::new();
    for reaction in reactions {
        let id = reaction.id.0.as_str();
        if id.is_empty() {
            bail!("reaction with empty id");
        }
        if !seen.insert(id) {
            bail!("duplicate reaction id '{id}'");
        }
        if reaction.reactants.is_empty() || reaction.products.is_empty() {
            bail!("reaction '{id}' needs at least one reactant and one product");
        }
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let name = path.display();
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {name}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {name}"))
}

/// Reads an optional file, falling back to `T::default()` when it is absent.
fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

pub fn load_content(content_dir: &str) -> Result<Content> {
    let dir = Path::new(content_dir);
    let file: ReactionsFile = read_json(&dir.join("reactions.json"))?;
    let settings: Settings = read_json_or_default(&dir.join("settings.json"))?;
    let constants: Constants = read_json_or_default(&dir.join("constants.json"))?;
    validate_settings(&settings).context("validating settings.json")?;

    let mut fixes = Vec::new();
    let reactions: Vec<ReactionDef> = file
        .reactions
        .into_iter()
        .map(|raw| {
            let (def, repaired) = raw.normalized();
            fixes.extend(repaired.into_iter().map(|fix| (def.id.clone(), fix)));
            def
        })
        .collect();
    validate_catalog(&reactions).context("validating reactions.json")?;

    Ok(Content {
        content_version: file.content_version,
        reactions,
        settings,
        constants,
        fixes,
    })
}

/// Builds a match for `reaction_id` without starting it.
pub fn build_match(content: &Content, reaction_id: &str, config: MatchConfig) -> Result<MatchState> {
    let Some(def) = content.reaction(reaction_id) else {
        bail!("unknown reaction id '{reaction_id}'");
    };
    Ok(MatchState::new(def.clone(), content.constants.clone(), config))
}

/// Builds and starts a match with randomly assigned goals.
pub fn start_match(
    content: &Content,
    reaction_id: &str,
    config: MatchConfig,
    rng: &mut impl Rng,
) -> Result<(MatchState, Vec<EventEnvelope>)> {
    let mut state = build_match(content, reaction_id, config)?;
    let mut events = Vec::new();
    state.start(rng, &mut events);
    Ok((state, events))
}

pub fn generate_run_id(seed: u64) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    format!("{timestamp}_seed{seed}")
}

pub fn write_run_info(
    dir: &Path,
    run_id: &str,
    seed: u64,
    reaction_id: &str,
    config: &MatchConfig,
    content_version: &str,
    runner: &str,
) -> Result<()> {
    let info = serde_json::json!({
        "run_id": run_id,
        "seed": seed,
        "start_time": chrono::Utc::now().to_rfc3339(),
        "content_version": content_version,
        "runner": runner,
        "reaction_id": reaction_id,
        "config": config,
    });
    let path = dir.join("run_info.json");
    let file =
        std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &info)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eq_core::test_fixtures::{gas_reaction, simple_reaction};
    use eq_core::SpeciesId;

    #[test]
    fn valid_catalog_passes() {
        validate_catalog(&[simple_reaction(), gas_reaction()]).unwrap();
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = validate_catalog(&[simple_reaction(), simple_reaction()]).unwrap_err();
        assert!(err.to_string().contains("duplicate reaction id"));
    }

    #[test]
    fn one_sided_reaction_rejected() {
        let mut def = simple_reaction();
        def.products.clear();
        let err = validate_catalog(&[def]).unwrap_err();
        assert!(err.to_string().contains("at least one reactant"));
    }

    #[test]
    fn settings_bounds() {
        validate_settings(&Settings::default()).unwrap();
        let zero_rounds = Settings {
            max_rounds: 0,
            ..Settings::default()
        };
        assert!(validate_settings(&zero_rounds).is_err());
        let bad_tier = Settings {
            difficulty: Some(5),
            ..Settings::default()
        };
        assert!(validate_settings(&bad_tier).is_err());
        let disabled = Settings {
            difficulty: None,
            ..Settings::default()
        };
        validate_settings(&disabled).unwrap();
    }

    #[test]
    fn settings_convert_to_config() {
        let config = Settings::default().to_match_config();
        assert_eq!(config.round_ms, 30_000);
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.difficulty, Some(DifficultyTier::MEDIUM));
    }

    #[test]
    fn partial_settings_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"max_rounds": 3}"#).unwrap();
        assert_eq!(settings.max_rounds, 3);
        assert_eq!(settings.round_seconds, 30);
        let disabled: Settings = serde_json::from_str(r#"{"difficulty": null}"#).unwrap();
        assert_eq!(disabled.difficulty, None);
    }

    #[test]
    fn load_content_normalizes_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut broken = simple_reaction();
        broken.equilibrium_constant = -1.0;
        broken.gas_species.push(SpeciesId::from("Xe"));
        let catalog = serde_json::json!({
            "content_version": "test-1",
            "reactions": [broken, gas_reaction()],
        });
        std::fs::write(
            dir.path().join("reactions.json"),
            serde_json::to_string(&catalog).unwrap(),
        )
        .unwrap();

        let content = load_content(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(content.content_version, "test-1");
        assert_eq!(content.reactions.len(), 2);
        assert_eq!(content.settings, Settings::default());
        assert_eq!(content.constants, Constants::default());
        assert_eq!(content.fixes.len(), 2);
        let fixed = content.reaction("test_abc").unwrap();
        assert!((fixed.equilibrium_constant - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_content(dir.path().to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("reactions.json"));
    }

    #[test]
    fn run_info_written() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = generate_run_id(9);
        assert!(run_id.ends_with("_seed9"));
        write_run_info(
            dir.path(),
            &run_id,
            9,
            "test_abc",
            &MatchConfig::default(),
            "test",
            "eq_cli",
        )
        .unwrap();
        let raw = std::fs::read_to_string(dir.path().join("run_info.json")).unwrap();
        let info: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(info["reaction_id"], "test_abc");
        assert_eq!(info["config"]["max_rounds"], 10);
    }
}
