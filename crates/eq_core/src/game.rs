//! Round and match controller.
//!
//! `MatchState` owns everything mutable about one match: the current round's
//! reaction state, both actors' cooldown tables, ability books, timers and
//! scores. Time is a simulated millisecond clock advanced by the caller.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::abilities::{use_ability, AbilityBook, AbilityEffect, AbilityKind};
use crate::difficulty::DifficultyTier;
use crate::economy::{ActionEconomy, ActionKey};
use crate::equilibrium::goal_progress;
use crate::intervention::{apply_action, validate_action, Intervention};
use crate::reaction::ReactionState;
use crate::scoring::{MatchResult, ScoreBoard};
use crate::{
    emit, Actor, Concentrations, Constants, Counters, Event, EventEnvelope, Goal, Goals,
    ReactionDef, ReactionReport, Rejection,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub max_rounds: u32,
    pub round_ms: u64,
    /// `None` disables the opponent entirely.
    pub difficulty: Option<DifficultyTier>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            round_ms: 30_000,
            difficulty: Some(DifficultyTier::MEDIUM),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    RoundActive,
    RoundSettling,
    MatchEnded,
}

/// Armed deadlines on the match clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timers {
    pub round_deadline_ms: Option<u64>,
    pub settle_deadline_ms: Option<u64>,
    pub next_decision_ms: Option<u64>,
}

impl Timers {
    fn remaining_from(&self, now_ms: u64) -> Timers {
        let left = |deadline: Option<u64>| deadline.map(|d| d.saturating_sub(now_ms));
        Timers {
            round_deadline_ms: left(self.round_deadline_ms),
            settle_deadline_ms: left(self.settle_deadline_ms),
            next_decision_ms: left(self.next_decision_ms),
        }
    }

    fn rearmed_at(&self, now_ms: u64) -> Timers {
        let at = |left: Option<u64>| left.map(|l| now_ms + l);
        Timers {
            round_deadline_ms: at(self.round_deadline_ms),
            settle_deadline_ms: at(self.settle_deadline_ms),
            next_decision_ms: at(self.next_decision_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub def: ReactionDef,
    pub constants: Constants,
    pub config: MatchConfig,
    pub phase: Phase,
    pub clock_ms: u64,
    pub round: u32,
    pub goals: Goals,
    pub reaction: ReactionState,
    pub economy: ActionEconomy,
    pub abilities: AbilityBook,
    pub scores: ScoreBoard,
    pub result: Option<MatchResult>,
    pub timers: Timers,
    /// Remaining durations of timers cancelled by a pause.
    pub paused: Option<Timers>,
    pub counters: Counters,
}

impl MatchState {
    pub fn new(def: ReactionDef, constants: Constants, config: MatchConfig) -> Self {
        let reaction = ReactionState::at_equilibrium(&def, &constants);
        let multiplier = config
            .difficulty
            .map_or(1.0, DifficultyTier::opponent_cooldown_multiplier);
        Self {
            def,
            constants,
            config,
            phase: Phase::Idle,
            clock_ms: 0,
            round: 0,
            goals: Goals::new(Goal::Forward),
            reaction,
            economy: ActionEconomy::new(multiplier),
            abilities: AbilityBook::default(),
            scores: ScoreBoard::default(),
            result: None,
            timers: Timers::default(),
            paused: None,
            counters: Counters::default(),
        }
    }

    /// Starts the match with randomly assigned, opposite goals.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R, events: &mut Vec<EventEnvelope>) {
        let player_goal = if rng.gen_bool(0.5) {
            Goal::Forward
        } else {
            Goal::Reverse
        };
        self.start_with_goal(player_goal, events);
    }

    pub fn start_with_goal(&mut self, player_goal: Goal, events: &mut Vec<EventEnvelope>) {
        self.goals = Goals::new(player_goal);
        self.round = 0;
        self.scores = ScoreBoard::default();
        self.abilities = AbilityBook::default();
        self.economy = ActionEconomy::new(self.economy.opponent_multiplier);
        self.result = None;
        self.paused = None;
        self.timers = Timers::default();
        events.push(emit(
            &mut self.counters,
            self.clock_ms,
            Event::MatchStarted {
                reaction_id: self.def.id.clone(),
                player_goal,
                opponent_goal: player_goal.opposite(),
                max_rounds: self.config.max_rounds,
                difficulty: self.config.difficulty.map(DifficultyTier::level),
            },
        ));
        self.begin_round(events);
    }

    fn begin_round(&mut self, events: &mut Vec<EventEnvelope>) {
        if self.round > 0 {
            self.abilities.tick_cooldowns();
        }
        self.round += 1;
        self.reaction = ReactionState::at_equilibrium(&self.def, &self.constants);
        self.economy = self.economy.next_round(&self.def);
        self.timers = Timers {
            round_deadline_ms: Some(self.clock_ms + self.config.round_ms),
            settle_deadline_ms: None,
            next_decision_ms: self
                .config
                .difficulty
                .map(|tier| self.clock_ms + tier.decision_interval_ms()),
        };
        self.phase = Phase::RoundActive;
        events.push(emit(
            &mut self.counters,
            self.clock_ms,
            Event::RoundStarted {
                round: self.round,
                report: self.reaction.report(),
            },
        ));
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    pub fn goal_of(&self, actor: Actor) -> Goal {
        self.goals.of(actor)
    }

    fn check_can_act(&self, actor: Actor) -> Result<(), Rejection> {
        if self.is_paused() {
            return Err(Rejection::Paused);
        }
        if self.phase != Phase::RoundActive {
            return Err(Rejection::RoundNotActive);
        }
        if actor == Actor::Opponent && self.config.difficulty.is_none() {
            return Err(Rejection::OpponentDisabled);
        }
        Ok(())
    }

    /// Pure availability query for one intervention.
    pub fn is_available(&self, actor: Actor, intervention: &Intervention) -> bool {
        match intervention {
            Intervention::Act(key) => {
                validate_action(&self.def, key).is_ok()
                    && self.economy.is_available(actor, key, self.clock_ms)
            }
            Intervention::UseAbility(kind) => self.abilities.is_available(*kind, actor),
        }
    }

    /// Milliseconds until `key` is usable again by `actor`.
    pub fn cooldown_remaining_ms(&self, actor: Actor, key: &ActionKey) -> u64 {
        self.economy.remaining_ms(actor, key, self.clock_ms)
    }

    /// Gates `key` through the cooldown table and applies it on acceptance.
    pub fn request_action(
        &mut self,
        actor: Actor,
        key: &ActionKey,
    ) -> Result<ReactionReport, Rejection> {
        self.check_can_act(actor)?;
        validate_action(&self.def, key)?;
        self.economy
            .request(actor, key, self.clock_ms, &self.constants)?;
        let magnitude = self.abilities.magnitude_for(actor);
        apply_action(key, &self.def, &mut self.reaction, magnitude, &self.constants);
        Ok(self.reaction.report())
    }

    pub fn use_ability<R: Rng + ?Sized>(
        &mut self,
        kind: AbilityKind,
        actor: Actor,
        rng: &mut R,
    ) -> Result<AbilityEffect, Rejection> {
        self.check_can_act(actor)?;
        use_ability(
            &mut self.abilities,
            kind,
            actor,
            self.goals.of(actor),
            &self.def,
            &mut self.reaction,
            &self.constants,
            rng,
        )
    }

    /// Single entry point for both actors. Emits an accepted or rejected event.
    pub fn submit<R: Rng + ?Sized>(
        &mut self,
        actor: Actor,
        intervention: &Intervention,
        rng: &mut R,
        events: &mut Vec<EventEnvelope>,
    ) -> Result<(), Rejection> {
        let outcome = match intervention {
            Intervention::Act(key) => {
                self.request_action(actor, key)
                    .map(|report| Event::ActionAccepted {
                        actor,
                        intervention: intervention.clone(),
                        report,
                    })
            }
            Intervention::UseAbility(kind) => {
                self.use_ability(*kind, actor, rng)
                    .map(|effect| Event::AbilityUsed {
                        actor,
                        effect,
                        report: self.reaction.report(),
                    })
            }
        };
        match outcome {
            Ok(event) => {
                events.push(emit(&mut self.counters, self.clock_ms, event));
                Ok(())
            }
            Err(rejection) => {
                events.push(emit(
                    &mut self.counters,
                    self.clock_ms,
                    Event::ActionRejected {
                        actor,
                        intervention: intervention.clone(),
                        rejection: rejection.clone(),
                    },
                ));
                Err(rejection)
            }
        }
    }

    /// Whether the opponent's decision tick has come due.
    pub fn decision_due(&self) -> bool {
        self.phase == Phase::RoundActive
            && !self.is_paused()
            && self
                .timers
                .next_decision_ms
                .is_some_and(|at| at <= self.clock_ms)
    }

    /// Re-arms the decision tick one interval from now.
    pub fn consume_decision_tick(&mut self) {
        if let (Some(tier), Some(_)) = (self.config.difficulty, self.timers.next_decision_ms) {
            self.timers.next_decision_ms = Some(self.clock_ms + tier.decision_interval_ms());
        }
    }

    /// Advances the clock by `dt_ms`, firing round and settle deadlines in order.
    pub fn advance(&mut self, dt_ms: u64, events: &mut Vec<EventEnvelope>) {
        if self.is_paused() || matches!(self.phase, Phase::Idle | Phase::MatchEnded) {
            return;
        }
        let target = self.clock_ms + dt_ms;
        loop {
            let next = [self.timers.round_deadline_ms, self.timers.settle_deadline_ms]
                .into_iter()
                .flatten()
                .min();
            match next {
                Some(deadline) if deadline <= target => {
                    self.clock_ms = self.clock_ms.max(deadline);
                    self.fire_deadline(events);
                }
                _ => break,
            }
            if self.phase == Phase::MatchEnded {
                return;
            }
        }
        self.clock_ms = target;
    }

    fn fire_deadline(&mut self, events: &mut Vec<EventEnvelope>) {
        if self
            .timers
            .round_deadline_ms
            .is_some_and(|d| d <= self.clock_ms)
        {
            self.timers.round_deadline_ms = None;
            self.end_round(events);
        } else if self
            .timers
            .settle_deadline_ms
            .is_some_and(|d| d <= self.clock_ms)
        {
            self.timers.settle_deadline_ms = None;
            self.begin_round(events);
        }
    }

    /// Settles the active round. Ignored outside `RoundActive`.
    pub fn end_round(&mut self, events: &mut Vec<EventEnvelope>) {
        if self.phase != Phase::RoundActive {
            return;
        }
        self.timers.round_deadline_ms = None;
        self.timers.next_decision_ms = None;
        self.reaction.recompute(&self.def);
        let result = self
            .scores
            .record(self.round, self.reaction.shift, self.goals.player);
        events.push(emit(
            &mut self.counters,
            self.clock_ms,
            Event::RoundSettled {
                round: result.round,
                shift: result.shift,
                player_score: result.player_score,
                opponent_score: result.opponent_score,
                player_total: self.scores.player_total,
                opponent_total: self.scores.opponent_total,
            },
        ));
        if self.round >= self.config.max_rounds {
            self.finish(events);
        } else {
            self.phase = Phase::RoundSettling;
            self.timers.settle_deadline_ms = Some(self.clock_ms + self.constants.round_settle_ms);
        }
    }

    fn finish(&mut self, events: &mut Vec<EventEnvelope>) {
        let result = MatchResult::from_board(&self.scores, self.config.max_rounds);
        self.timers = Timers::default();
        self.phase = Phase::MatchEnded;
        events.push(emit(
            &mut self.counters,
            self.clock_ms,
            Event::MatchEnded {
                winner: result.winner,
                stars: result.stars,
                player_total: result.player_total,
                opponent_total: result.opponent_total,
                achievement_pct: result.achievement_pct,
            },
        ));
        self.result = Some(result);
    }

    /// Cancels every armed timer, remembering how much was left on each.
    pub fn pause(&mut self, events: &mut Vec<EventEnvelope>) -> bool {
        if self.is_paused() || !matches!(self.phase, Phase::RoundActive | Phase::RoundSettling) {
            return false;
        }
        self.paused = Some(self.timers.remaining_from(self.clock_ms));
        self.timers = Timers::default();
        events.push(emit(&mut self.counters, self.clock_ms, Event::Paused));
        true
    }

    /// Arms fresh timers from the durations saved at pause.
    pub fn resume(&mut self, events: &mut Vec<EventEnvelope>) -> bool {
        let Some(left) = self.paused.take() else {
            return false;
        };
        self.timers = left.rearmed_at(self.clock_ms);
        events.push(emit(&mut self.counters, self.clock_ms, Event::Resumed));
        true
    }

    pub fn round_remaining_ms(&self) -> Option<u64> {
        match &self.paused {
            Some(left) => left.round_deadline_ms,
            None => self
                .timers
                .round_deadline_ms
                .map(|d| d.saturating_sub(self.clock_ms)),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let player_cooldowns = ActionKey::all_for(&self.def)
            .into_iter()
            .map(|key| {
                let left = self.cooldown_remaining_ms(Actor::Player, &key);
                (key, left)
            })
            .collect();
        let player_abilities = AbilityKind::ALL
            .into_iter()
            .map(|kind| (kind, self.abilities.rounds_left(kind, Actor::Player)))
            .collect();
        let shift = self.reaction.shift;
        Snapshot {
            reaction_id: self.def.id.to_string(),
            reaction_name: self.def.name.clone(),
            equation: self.def.equation.clone(),
            phase: self.phase,
            paused: self.is_paused(),
            round: self.round,
            max_rounds: self.config.max_rounds,
            clock_ms: self.clock_ms,
            round_remaining_ms: self.round_remaining_ms(),
            difficulty: self.config.difficulty.map(DifficultyTier::level),
            temperature_k: self.reaction.temperature_k,
            pressure_kpa: self.reaction.pressure_kpa,
            concentrations: self.reaction.concentrations.clone(),
            k: self.reaction.k,
            q: self.reaction.q,
            shift,
            player_goal: self.goals.of(Actor::Player),
            opponent_goal: self.goals.of(Actor::Opponent),
            player_progress_pct: goal_progress(shift, self.goals.of(Actor::Player)),
            opponent_progress_pct: goal_progress(shift, self.goals.of(Actor::Opponent)),
            player_total: self.scores.player_total,
            opponent_total: self.scores.opponent_total,
            player_cooldowns,
            player_abilities,
            result: self.result.clone(),
        }
    }
}

/// Read-only view for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub reaction_id: String,
    pub reaction_name: String,
    pub equation: String,
    pub phase: Phase,
    pub paused: bool,
    pub round: u32,
    pub max_rounds: u32,
    pub clock_ms: u64,
    pub round_remaining_ms: Option<u64>,
    pub difficulty: Option<u8>,
    pub temperature_k: f64,
    pub pressure_kpa: f64,
    pub concentrations: Concentrations,
    pub k: f64,
    pub q: f64,
    pub shift: f64,
    pub player_goal: Goal,
    pub opponent_goal: Goal,
    pub player_progress_pct: f64,
    pub opponent_progress_pct: f64,
    pub player_total: f64,
    pub opponent_total: f64,
    /// Remaining cooldown per action identity, 0 when ready.
    pub player_cooldowns: BTreeMap<ActionKey, u64>,
    /// Rounds until each ability recharges, 0 when ready.
    pub player_abilities: BTreeMap<AbilityKind, u32>,
    pub result: Option<MatchResult>,
}
