use eq_core::equilibrium::{goal_progress, temperature_effect};
use eq_core::intervention::preview;
use eq_core::scoring::round_score;
use eq_core::{
    AbilityKind, ActionKey, Actor, Command, CommandEnvelope, CommandId, DifficultyTier, Goal,
    Intervention, MatchState, Phase,
};
use rand::{Rng, RngCore};
use serde::Serialize;

pub trait InterventionSource {
    fn generate_commands(
        &mut self,
        state: &MatchState,
        rng: &mut dyn RngCore,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope>;
}

/// A scored, not-yet-committed intervention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub intervention: Intervention,
    /// Round score the actor would get if the round ended after this action.
    pub score: f64,
    /// |shift| after the action; 0 for abilities.
    pub tie_break: f64,
}

/// Heuristic decision engine for one seat.
///
/// In the opponent seat it follows the match's own decision tick and tier.
/// In the player seat it keeps a private schedule so unattended runs can
/// pit two heuristics against each other.
pub struct OpponentController {
    seat: Actor,
    tier: Option<DifficultyTier>,
    next_decision_ms: u64,
}

impl OpponentController {
    pub fn for_opponent() -> Self {
        Self {
            seat: Actor::Opponent,
            tier: None,
            next_decision_ms: 0,
        }
    }

    pub fn for_player(tier: DifficultyTier) -> Self {
        Self {
            seat: Actor::Player,
            tier: Some(tier),
            next_decision_ms: 0,
        }
    }

    pub fn seat(&self) -> Actor {
        self.seat
    }

    fn tier_for(&self, state: &MatchState) -> Option<DifficultyTier> {
        match self.seat {
            Actor::Opponent => state.config.difficulty,
            Actor::Player => self.tier,
        }
    }

    fn decision_due(&mut self, state: &MatchState, tier: DifficultyTier) -> bool {
        match self.seat {
            Actor::Opponent => state.decision_due(),
            Actor::Player => {
                if state.phase != Phase::RoundActive || state.is_paused() {
                    return false;
                }
                if state.clock_ms < self.next_decision_ms {
                    return false;
                }
                self.next_decision_ms = state.clock_ms + tier.decision_interval_ms();
                true
            }
        }
    }
}

impl InterventionSource for OpponentController {
    fn generate_commands(
        &mut self,
        state: &MatchState,
        rng: &mut dyn RngCore,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        let Some(tier) = self.tier_for(state) else {
            return Vec::new();
        };
        if !self.decision_due(state, tier) {
            return Vec::new();
        }
        select_intervention(state, self.seat, tier, rng)
            .map(|intervention| {
                make_cmd(
                    self.seat,
                    state.clock_ms,
                    next_command_id,
                    Command::Intervene { intervention },
                )
            })
            .into_iter()
            .collect()
    }
}

/// Allocates a command ID and builds a `CommandEnvelope`.
pub fn make_cmd(actor: Actor, now_ms: u64, next_id: &mut u64, command: Command) -> CommandEnvelope {
    let cmd_id = CommandId(format!("cmd_{:06}", *next_id));
    *next_id += 1;
    CommandEnvelope {
        id: cmd_id,
        issued_by: actor,
        issued_ms: now_ms,
        command,
    }
}

// ---------------------------------------------------------------------------
// Decision engine
// ---------------------------------------------------------------------------

/// One decision tick: gate on act chance, rank, then pick from the top K.
pub fn select_intervention<R: Rng + ?Sized>(
    state: &MatchState,
    actor: Actor,
    tier: DifficultyTier,
    rng: &mut R,
) -> Option<Intervention> {
    let profile = tier.profile();
    if rng.gen::<f64>() >= profile.act_chance {
        return None;
    }
    let ranked = rank_candidates(state, actor, tier);
    if ranked.is_empty() {
        return None;
    }
    let top_k = profile.top_k.clamp(1, ranked.len());
    let pick = if profile.randomness > 0.0 && rng.gen_bool(profile.randomness.min(1.0)) {
        rng.gen_range(0..top_k)
    } else {
        0
    };
    Some(ranked[pick].intervention.clone())
}

/// Every available candidate for `actor`, best first.
pub fn rank_candidates(state: &MatchState, actor: Actor, tier: DifficultyTier) -> Vec<Candidate> {
    let goal = state.goal_of(actor);
    let mut scored: Vec<Candidate> = build_candidates(state, actor, tier)
        .into_iter()
        .filter(|intervention| state.is_available(actor, intervention))
        .map(|intervention| score_candidate(state, actor, goal, intervention))
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.tie_break.total_cmp(&a.tie_break))
    });
    scored
}

fn build_candidates(state: &MatchState, actor: Actor, tier: DifficultyTier) -> Vec<Intervention> {
    let profile = tier.profile();
    let def = &state.def;
    let goal = state.goal_of(actor);
    let mut candidates = Vec::new();

    if profile.allow_concentration {
        candidates.extend(
            def.favoured_species(goal)
                .iter()
                .map(|species| Intervention::Act(ActionKey::AddSpecies(species.clone()))),
        );
    }
    if profile.allow_temperature {
        candidates.push(Intervention::Act(ActionKey::Heat));
        candidates.push(Intervention::Act(ActionKey::Cool));
    }
    if profile.allow_pressure && def.is_gas_phase() {
        candidates.push(Intervention::Act(ActionKey::Pressurize));
        candidates.push(Intervention::Act(ActionKey::Depressurize));
    }
    if tier.allows_abilities() {
        candidates.extend(
            state
                .abilities
                .available(actor)
                .map(Intervention::UseAbility),
        );
    }
    candidates
}

fn score_candidate(state: &MatchState, actor: Actor, goal: Goal, intervention: Intervention) -> Candidate {
    match &intervention {
        Intervention::Act(key) => {
            let magnitude = state.abilities.magnitude_for(actor);
            let after = preview(key, &state.def, &state.reaction, magnitude, &state.constants);
            Candidate {
                score: round_score(after.shift, goal),
                tie_break: after.shift.abs(),
                intervention,
            }
        }
        Intervention::UseAbility(kind) => Candidate {
            score: ability_benefit(*kind, state, goal),
            tie_break: 0.0,
            intervention,
        },
    }
}

/// Fixed per-ability desirability for an actor holding `goal`.
pub fn ability_benefit(kind: AbilityKind, state: &MatchState, goal: Goal) -> f64 {
    let shift = state.reaction.shift;
    let distance = match goal {
        Goal::Forward => 1.0 - shift,
        Goal::Reverse => 1.0 + shift,
    };
    let winning = Goal::of_shift(shift) == Some(goal);
    match kind {
        AbilityKind::Catalyst => distance * 0.8,
        AbilityKind::Buffer => {
            if winning {
                0.6
            } else {
                0.1
            }
        }
        AbilityKind::HeatExchange => {
            if temperature_effect(&state.def).magnitude > 0.3 {
                0.7
            } else {
                0.2
            }
        }
        AbilityKind::Quantum => {
            if !winning && distance > 0.7 {
                0.9
            } else {
                0.05
            }
        }
    }
}

/// Short textual hint of the best move for `actor`, for presentation layers.
pub fn hint(state: &MatchState, actor: Actor) -> Option<String> {
    let best = rank_candidates(state, actor, DifficultyTier::EXPERT)
        .into_iter()
        .next()?;
    let progress = goal_progress(state.reaction.shift, state.goal_of(actor));
    Some(format!(
        "{} (projected score {:.1}, progress {progress:.0}%)",
        best.intervention, best.score
    ))
}
