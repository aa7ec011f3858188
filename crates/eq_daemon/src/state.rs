use anyhow::Result;
use eq_control::{InterventionSource, OpponentController};
use eq_core::{tick, Actor, EventEnvelope, Intervention, MatchConfig, MatchState, Rejection};
use eq_world::{start_match, Content};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The live match plus everything needed to drive it.
pub struct MatchHost {
    pub content: Content,
    pub game: MatchState,
    pub seed: u64,
    pub rng: ChaCha8Rng,
    pub opponent: OpponentController,
    pub next_command_id: u64,
}

impl MatchHost {
    pub fn start(
        content: Content,
        reaction_id: &str,
        config: MatchConfig,
        seed: u64,
    ) -> Result<(Self, Vec<EventEnvelope>)> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (game, events) = start_match(&content, reaction_id, config, &mut rng)?;
        let host = Self {
            content,
            game,
            seed,
            rng,
            opponent: OpponentController::for_opponent(),
            next_command_id: 0,
        };
        Ok((host, events))
    }

    /// Replaces the current match. The old one is dropped, timers and all.
    pub fn restart(
        &mut self,
        reaction_id: &str,
        config: MatchConfig,
        seed: u64,
    ) -> Result<Vec<EventEnvelope>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (game, events) = start_match(&self.content, reaction_id, config, &mut rng)?;
        self.game = game;
        self.seed = seed;
        self.rng = rng;
        self.opponent = OpponentController::for_opponent();
        Ok(events)
    }

    /// One scheduler step: the opponent decides, then the clock advances.
    pub fn step(&mut self, dt_ms: u64) -> Vec<EventEnvelope> {
        let commands =
            self.opponent
                .generate_commands(&self.game, &mut self.rng, &mut self.next_command_id);
        tick(&mut self.game, &commands, &mut self.rng, dt_ms)
    }

    /// Applies a player request immediately, between scheduler steps.
    pub fn submit_player(
        &mut self,
        intervention: &Intervention,
    ) -> (Result<(), Rejection>, Vec<EventEnvelope>) {
        let mut events = Vec::new();
        let outcome = self
            .game
            .submit(Actor::Player, intervention, &mut self.rng, &mut events);
        (outcome, events)
    }
}

pub type SharedHost = Arc<Mutex<MatchHost>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;

#[derive(Clone)]
pub struct AppState {
    pub host: SharedHost,
    pub event_tx: EventTx,
    pub tick_ms: u64,
}
