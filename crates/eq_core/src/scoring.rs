use serde::{Deserialize, Serialize};

use crate::{Actor, Goal};

/// Baseline awarded to both actors when a round ends exactly at equilibrium.
pub const EQUILIBRIUM_SCORE: f64 = 5.0;
/// Most a single round can award.
pub const MAX_ROUND_SCORE: f64 = 30.0;

/// Score for an actor with `goal` given the round's final shift.
///
/// Winning direction: 10 + min(|s|·10, 20). Losing direction: max(0, 5 − |s|·5).
pub fn round_score(shift: f64, goal: Goal) -> f64 {
    match Goal::of_shift(shift) {
        None => EQUILIBRIUM_SCORE,
        Some(direction) if direction == goal => 10.0 + (shift.abs() * 10.0).min(20.0),
        Some(_) => (5.0 - shift.abs() * 5.0).max(0.0),
    }
}

/// Ties go to the player.
pub fn match_winner(player_total: f64, opponent_total: f64) -> Actor {
    if player_total >= opponent_total {
        Actor::Player
    } else {
        Actor::Opponent
    }
}

/// 0 stars on a loss; otherwise 1, 2 at a lead of 10, 3 at a lead of 30.
pub fn star_rating(player_total: f64, opponent_total: f64) -> u8 {
    if match_winner(player_total, opponent_total) != Actor::Player {
        return 0;
    }
    let lead = player_total - opponent_total;
    if lead >= 30.0 {
        3
    } else if lead >= 10.0 {
        2
    } else {
        1
    }
}

/// Winner's share of the best possible total, in percent.
pub fn achievement_pct(winner_total: f64, max_rounds: u32) -> f64 {
    if max_rounds == 0 {
        return 0.0;
    }
    (winner_total / (f64::from(max_rounds) * MAX_ROUND_SCORE) * 100.0).clamp(0.0, 100.0)
}

/// Running match totals plus per-round history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBoard {
    pub player_total: f64,
    pub opponent_total: f64,
    pub rounds: Vec<RoundResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    pub shift: f64,
    pub player_score: f64,
    pub opponent_score: f64,
}

impl ScoreBoard {
    pub fn total(&self, actor: Actor) -> f64 {
        match actor {
            Actor::Player => self.player_total,
            Actor::Opponent => self.opponent_total,
        }
    }

    /// Accumulates one settled round.
    pub fn record(&mut self, round: u32, shift: f64, player_goal: Goal) -> RoundResult {
        let result = RoundResult {
            round,
            shift,
            player_score: round_score(shift, player_goal),
            opponent_score: round_score(shift, player_goal.opposite()),
        };
        self.player_total += result.player_score;
        self.opponent_total += result.opponent_score;
        self.rounds.push(result.clone());
        result
    }

    pub fn is_winning(&self, actor: Actor) -> bool {
        match_winner(self.player_total, self.opponent_total) == actor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: Actor,
    pub stars: u8,
    pub player_total: f64,
    pub opponent_total: f64,
    pub achievement_pct: f64,
}

impl MatchResult {
    pub fn from_board(board: &ScoreBoard, max_rounds: u32) -> Self {
        let winner = match_winner(board.player_total, board.opponent_total);
        Self {
            winner,
            stars: star_rating(board.player_total, board.opponent_total),
            player_total: board.player_total,
            opponent_total: board.opponent_total,
            achievement_pct: achievement_pct(board.total(winner), max_rounds),
        }
    }
}
