use super::*;

#[test]
fn tick_applies_commands_before_advancing() {
    let (mut state, _) = started_match(simple_reaction(), None, Goal::Forward);
    let mut rng = make_rng();
    let commands = vec![command(
        Actor::Player,
        Command::Intervene {
            intervention: add("A"),
        },
    )];
    let events = tick(&mut state, &commands, &mut rng, 100);

    assert_eq!(state.clock_ms, 100);
    assert_eq!(count(&events, |e| matches!(e, Event::ActionAccepted { .. })), 1);
    match &events[0].event {
        Event::ActionAccepted { report, .. } => assert!(report.shift > 0.0),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn rejected_command_surfaces_as_event() {
    let (mut state, _) = started_match(simple_reaction(), None, Goal::Forward);
    let mut rng = make_rng();
    let heat = command(
        Actor::Player,
        Command::Intervene {
            intervention: Intervention::Act(ActionKey::Heat),
        },
    );
    tick(&mut state, std::slice::from_ref(&heat), &mut rng, 100);
    let events = tick(&mut state, &[heat], &mut rng, 100);
    let rejection = events.iter().find_map(|e| match &e.event {
        Event::ActionRejected { rejection, .. } => Some(rejection.clone()),
        _ => None,
    });
    assert_eq!(
        rejection,
        Some(Rejection::CoolingDown { remaining_ms: 4_900 })
    );
}

#[test]
fn decision_tick_rearms_after_it_fires() {
    let (mut state, _) = started_match(simple_reaction(), Some(DifficultyTier::EXPERT), Goal::Forward);
    let mut rng = make_rng();
    let interval = DifficultyTier::EXPERT.decision_interval_ms();

    tick(&mut state, &[], &mut rng, interval);
    assert!(state.decision_due());
    tick(&mut state, &[], &mut rng, 10);
    assert!(!state.decision_due());
    assert_eq!(state.timers.next_decision_ms, Some(2 * interval));
}

#[test]
fn end_round_and_pause_commands() {
    let (mut state, _) = started_match(simple_reaction(), None, Goal::Forward);
    let mut rng = make_rng();
    let events = tick(
        &mut state,
        &[command(Actor::Player, Command::EndRound)],
        &mut rng,
        0,
    );
    assert_eq!(count(&events, |e| matches!(e, Event::RoundSettled { .. })), 1);

    tick(&mut state, &[command(Actor::Player, Command::Pause)], &mut rng, 5_000);
    assert!(state.is_paused());
    assert_eq!(state.phase, Phase::RoundSettling);
    tick(&mut state, &[command(Actor::Player, Command::Resume)], &mut rng, 2_000);
    assert_eq!(state.round, 2);
}

#[test]
fn events_serialize_with_type_tags() {
    let (_, events) = started_match(gas_reaction(), Some(DifficultyTier::HARD), Goal::Reverse);
    let json = serde_json::to_value(&events[0]).unwrap();
    assert_eq!(json["event"]["type"], "match_started");
    assert_eq!(json["event"]["player_goal"], "reverse");
    assert_eq!(json["event"]["difficulty"], 3);
}
