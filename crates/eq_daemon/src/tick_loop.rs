use crate::state::{EventTx, SharedHost};
use eq_core::Event;
use std::time::Duration;

/// Drives the shared match at `tick_ms` of wall-clock time per step.
///
/// Runs until `max_steps` is reached, or forever when it is `None`; a new
/// match started over HTTP is picked up on the next step.
pub async fn run_tick_loop(host: SharedHost, event_tx: EventTx, tick_ms: u64, max_steps: Option<u64>) {
    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut steps = 0u64;

    loop {
        interval.tick().await;
        let events = host.lock().step(tick_ms);
        for envelope in &events {
            match &envelope.event {
                Event::RoundSettled {
                    round,
                    player_score,
                    opponent_score,
                    ..
                } => tracing::info!(round, player_score, opponent_score, "round settled"),
                Event::MatchEnded { winner, stars, .. } => {
                    tracing::info!(%winner, stars, "match ended");
                }
                _ => {}
            }
        }
        if !events.is_empty() {
            let _ = event_tx.send(events);
        }

        steps += 1;
        if max_steps.is_some_and(|max| steps >= max) {
            break;
        }
    }
}
