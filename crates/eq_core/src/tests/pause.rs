use super::*;

#[test]
fn pause_cancels_timers_and_freezes_clock() {
    let (mut state, _) = started_match(simple_reaction(), Some(DifficultyTier::HARD), Goal::Forward);
    let mut events = Vec::new();
    state.advance(10_000, &mut events);

    assert!(state.pause(&mut events));
    assert_eq!(state.timers, game::Timers::default());
    assert!(!state.decision_due());

    state.advance(60_000, &mut events);
    assert_eq!(state.clock_ms, 10_000);
    assert_eq!(state.phase, Phase::RoundActive);
    assert_eq!(state.round_remaining_ms(), Some(20_000));
}

#[test]
fn paused_match_rejects_interventions() {
    let (mut state, _) = started_match(simple_reaction(), None, Goal::Forward);
    let mut events = Vec::new();
    state.pause(&mut events);
    assert_eq!(
        state.request_action(Actor::Player, &ActionKey::Heat),
        Err(Rejection::Paused)
    );
}

#[test]
fn resume_rearms_remaining_time() {
    let (mut state, _) = started_match(simple_reaction(), None, Goal::Forward);
    let mut events = Vec::new();
    state.advance(10_000, &mut events);
    state.pause(&mut events);
    assert!(state.resume(&mut events));
    assert_eq!(state.timers.round_deadline_ms, Some(30_000));

    state.advance(19_999, &mut events);
    assert_eq!(state.phase, Phase::RoundActive);
    state.advance(1, &mut events);
    assert_eq!(state.phase, Phase::RoundSettling);
}

#[test]
fn double_pause_and_stray_resume_are_ignored() {
    let (mut state, _) = started_match(simple_reaction(), None, Goal::Forward);
    let mut events = Vec::new();
    assert!(!state.resume(&mut events));
    assert!(state.pause(&mut events));
    assert!(!state.pause(&mut events));
    assert_eq!(count(&events, |e| matches!(e, Event::Paused)), 1);
}

#[test]
fn pause_during_settle_keeps_settle_pending() {
    let (mut state, _) = started_match(simple_reaction(), None, Goal::Forward);
    let mut events = Vec::new();
    state.advance(31_000, &mut events);
    assert_eq!(state.phase, Phase::RoundSettling);
    state.pause(&mut events);
    state.advance(10_000, &mut events);
    assert_eq!(state.round, 1);
    state.resume(&mut events);
    state.advance(1_000, &mut events);
    assert_eq!(state.round, 2);
}
