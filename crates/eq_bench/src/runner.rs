use crate::scenario::Scenario;
use anyhow::{bail, Context, Result};
use eq_control::{InterventionSource, OpponentController};
use eq_core::{tick, Actor, DifficultyTier, Event, MatchConfig, Phase};
use eq_world::{start_match, Content};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// One CSV row: a full match at one tier and seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRow {
    pub tier: u8,
    pub seed: u64,
    pub winner: String,
    pub stars: u8,
    pub player_total: f64,
    pub opponent_total: f64,
    pub achievement_pct: f64,
    pub player_actions: u32,
    pub opponent_actions: u32,
    pub opponent_abilities: u32,
    pub rejections: u32,
    pub clock_ms: u64,
    pub wall_time_ms: u64,
}

pub fn match_config(scenario: &Scenario, tier: DifficultyTier) -> MatchConfig {
    MatchConfig {
        max_rounds: scenario.max_rounds,
        round_ms: scenario.round_seconds * 1_000,
        difficulty: Some(tier),
    }
}

pub fn run_match(content: &Content, scenario: &Scenario, tier: u8, seed: u64) -> Result<RunRow> {
    let start = Instant::now();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let config = match_config(scenario, DifficultyTier::new(tier));
    let (mut state, _) = start_match(content, &scenario.reaction_id, config, &mut rng)?;

    let mut opponent = OpponentController::for_opponent();
    let mut player = scenario
        .player_tier
        .map(|t| OpponentController::for_player(DifficultyTier::new(t)));
    let mut next_command_id = 0u64;
    let mut row = RunRow {
        tier,
        seed,
        winner: String::new(),
        stars: 0,
        player_total: 0.0,
        opponent_total: 0.0,
        achievement_pct: 0.0,
        player_actions: 0,
        opponent_actions: 0,
        opponent_abilities: 0,
        rejections: 0,
        clock_ms: 0,
        wall_time_ms: 0,
    };

    while state.phase != Phase::MatchEnded {
        let mut commands = opponent.generate_commands(&state, &mut rng, &mut next_command_id);
        if let Some(controller) = player.as_mut() {
            commands.extend(controller.generate_commands(&state, &mut rng, &mut next_command_id));
        }
        for envelope in tick(&mut state, &commands, &mut rng, scenario.step_ms) {
            match envelope.event {
                Event::ActionAccepted { actor: Actor::Player, .. }
                | Event::AbilityUsed { actor: Actor::Player, .. } => row.player_actions += 1,
                Event::ActionAccepted { actor: Actor::Opponent, .. } => row.opponent_actions += 1,
                Event::AbilityUsed { actor: Actor::Opponent, .. } => {
                    row.opponent_actions += 1;
                    row.opponent_abilities += 1;
                }
                Event::ActionRejected { .. } => row.rejections += 1,
                _ => {}
            }
        }
    }

    let Some(result) = state.result.as_ref() else {
        bail!("match for seed {seed} ended without a result");
    };
    row.winner = result.winner.to_string();
    row.stars = result.stars;
    row.player_total = result.player_total;
    row.opponent_total = result.opponent_total;
    row.achievement_pct = result.achievement_pct;
    row.clock_ms = state.clock_ms;
    #[allow(clippy::cast_possible_truncation)]
    let wall_time_ms = start.elapsed().as_millis() as u64;
    row.wall_time_ms = wall_time_ms;
    Ok(row)
}

pub fn write_rows(path: &Path, rows: &[RunRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer.serialize(row).context("writing results row")?;
    }
    writer.flush().context("flushing results")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::SeedSpec;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn scenario(player_tier: Option<u8>) -> Scenario {
        Scenario {
            name: "test".to_string(),
            reaction_id: "haber".to_string(),
            seeds: SeedSpec::List(vec![42]),
            tiers: vec![1, 4],
            max_rounds: 3,
            round_seconds: 10,
            step_ms: 250,
            player_tier,
            content_dir: "../../content".to_string(),
            overrides: HashMap::new(),
        }
    }

    #[test]
    fn test_run_match_completes() {
        let content = eq_world::load_content("../../content").unwrap();
        let row = run_match(&content, &scenario(None), 4, 42).unwrap();
        assert_eq!(row.tier, 4);
        assert_eq!(row.player_actions, 0);
        assert!(row.opponent_actions > 0);
        assert!(!row.winner.is_empty());
        // Three 10 s rounds and two 2 s settle pauses.
        assert_eq!(row.clock_ms, 34_000);
    }

    #[test]
    fn test_run_match_determinism() {
        let content = eq_world::load_content("../../content").unwrap();
        let scenario = scenario(Some(3));
        let a = run_match(&content, &scenario, 2, 7).unwrap();
        let b = run_match(&content, &scenario, 2, 7).unwrap();
        assert_eq!(a.winner, b.winner);
        assert_eq!(a.player_actions, b.player_actions);
        assert_eq!(a.opponent_actions, b.opponent_actions);
        assert!((a.opponent_total - b.opponent_total).abs() < 1e-12);
    }

    #[test]
    fn test_write_rows_produces_csv() {
        let content = eq_world::load_content("../../content").unwrap();
        let row = run_match(&content, &scenario(None), 1, 1).unwrap();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        write_rows(&path, &[row.clone(), row]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "tier");
        let rows: Vec<RunRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tier, 1);
    }
}
