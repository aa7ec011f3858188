//! Candidate generation and ranking for the opponent decision engine.

use eq_control::{
    ability_benefit, hint, make_cmd, rank_candidates, select_intervention, InterventionSource,
    OpponentController,
};
use eq_core::test_fixtures::{gas_reaction, make_rng, simple_reaction, started_match};
use eq_core::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn physical(candidates: &[eq_control::Candidate]) -> Vec<ActionKey> {
    candidates
        .iter()
        .filter_map(|c| match &c.intervention {
            Intervention::Act(key) => Some(key.clone()),
            Intervention::UseAbility(_) => None,
        })
        .collect()
}

#[test]
fn easy_tier_only_considers_favoured_species() {
    // Player forward, so the opponent wants reverse and favours the product C.
    let (state, _) = started_match(simple_reaction(), Some(DifficultyTier::EASY), Goal::Forward);
    let ranked = rank_candidates(&state, Actor::Opponent, DifficultyTier::EASY);
    assert_eq!(
        physical(&ranked),
        vec![ActionKey::AddSpecies(SpeciesId::from("C"))]
    );
    assert!(ranked
        .iter()
        .all(|c| matches!(c.intervention, Intervention::Act(_))));
}

#[test]
fn pressure_candidates_need_gas_phase_and_tier() {
    let (liquid, _) = started_match(simple_reaction(), Some(DifficultyTier::EXPERT), Goal::Forward);
    let keys = physical(&rank_candidates(&liquid, Actor::Opponent, DifficultyTier::EXPERT));
    assert!(!keys.contains(&ActionKey::Pressurize));

    let (gas, _) = started_match(gas_reaction(), Some(DifficultyTier::MEDIUM), Goal::Forward);
    let keys = physical(&rank_candidates(&gas, Actor::Opponent, DifficultyTier::MEDIUM));
    assert!(keys.contains(&ActionKey::Heat));
    assert!(!keys.contains(&ActionKey::Pressurize));

    let keys = physical(&rank_candidates(&gas, Actor::Opponent, DifficultyTier::HARD));
    assert!(keys.contains(&ActionKey::Pressurize));
    assert!(keys.contains(&ActionKey::Depressurize));
}

#[test]
fn best_candidate_pushes_toward_goal() {
    // Haber, opponent wants reverse: depressurizing favours N2 + H2.
    let (state, _) = started_match(gas_reaction(), Some(DifficultyTier::EXPERT), Goal::Forward);
    let ranked = rank_candidates(&state, Actor::Opponent, DifficultyTier::EXPERT);
    let best = &ranked[0];
    assert!(best.score > 10.0, "best {best:?}");
    for pair in ranked.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn on_cooldown_candidates_are_discarded() {
    let (mut state, _) = started_match(simple_reaction(), Some(DifficultyTier::EXPERT), Goal::Forward);
    state
        .request_action(Actor::Opponent, &ActionKey::AddSpecies(SpeciesId::from("C")))
        .unwrap();
    let keys = physical(&rank_candidates(&state, Actor::Opponent, DifficultyTier::EXPERT));
    assert!(!keys.contains(&ActionKey::AddSpecies(SpeciesId::from("C"))));
    assert!(keys.contains(&ActionKey::Heat));
}

#[test]
fn dampening_lowers_simulated_scores() {
    let (mut state, _) = started_match(simple_reaction(), Some(DifficultyTier::EXPERT), Goal::Forward);
    let add_c = Intervention::Act(ActionKey::AddSpecies(SpeciesId::from("C")));
    let score_of = |state: &MatchState| {
        rank_candidates(state, Actor::Opponent, DifficultyTier::EXPERT)
            .into_iter()
            .find(|c| c.intervention == add_c)
            .map(|c| c.score)
            .unwrap()
    };
    let full = score_of(&state);
    let mut rng = make_rng();
    state
        .use_ability(AbilityKind::Buffer, Actor::Player, &mut rng)
        .unwrap();
    let dampened = score_of(&state);
    assert!(dampened < full);
    assert!(dampened > 10.0);
}

#[test]
fn ability_heuristics_follow_position() {
    let (mut state, _) = started_match(gas_reaction(), Some(DifficultyTier::MEDIUM), Goal::Forward);
    // At equilibrium: distance 1, not winning.
    assert!((ability_benefit(AbilityKind::Catalyst, &state, Goal::Forward) - 0.8).abs() < 1e-9);
    assert!((ability_benefit(AbilityKind::Buffer, &state, Goal::Forward) - 0.1).abs() < 1e-9);
    assert!((ability_benefit(AbilityKind::Quantum, &state, Goal::Forward) - 0.9).abs() < 1e-9);
    // |ΔH| = 92 kJ/mol: 0.92 > 0.3.
    assert!((ability_benefit(AbilityKind::HeatExchange, &state, Goal::Forward) - 0.7).abs() < 1e-9);

    state.request_action(Actor::Player, &ActionKey::Pressurize).unwrap();
    assert!((ability_benefit(AbilityKind::Buffer, &state, Goal::Forward) - 0.6).abs() < 1e-9);
    assert!((ability_benefit(AbilityKind::Quantum, &state, Goal::Forward) - 0.05).abs() < 1e-9);
}

#[test]
fn easy_tier_acts_about_a_fifth_of_the_time() {
    let (state, _) = started_match(simple_reaction(), Some(DifficultyTier::EASY), Goal::Forward);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let acted = (0..2_000)
        .filter(|_| select_intervention(&state, Actor::Opponent, DifficultyTier::EASY, &mut rng).is_some())
        .count();
    assert!((300..=500).contains(&acted), "acted {acted} times");
}

#[test]
fn controller_waits_for_decision_tick() {
    let (mut state, _) = started_match(simple_reaction(), Some(DifficultyTier::EXPERT), Goal::Forward);
    let mut controller = OpponentController::for_opponent();
    let mut rng = make_rng();
    let mut next_id = 0;

    assert!(controller
        .generate_commands(&state, &mut rng, &mut next_id)
        .is_empty());

    let mut events = Vec::new();
    state.advance(DifficultyTier::EXPERT.decision_interval_ms(), &mut events);
    let commands = controller.generate_commands(&state, &mut rng, &mut next_id);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].issued_by, Actor::Opponent);
    assert_eq!(commands[0].id, CommandId("cmd_000000".to_string()));
    assert_eq!(next_id, 1);
}

#[test]
fn controller_silent_when_opponent_disabled() {
    let (mut state, _) = started_match(simple_reaction(), None, Goal::Forward);
    let mut controller = OpponentController::for_opponent();
    let mut rng = make_rng();
    let mut next_id = 0;
    let mut events = Vec::new();
    for _ in 0..50 {
        state.advance(500, &mut events);
        assert!(controller
            .generate_commands(&state, &mut rng, &mut next_id)
            .is_empty());
    }
}

#[test]
fn player_seat_keeps_its_own_schedule() {
    let (mut state, _) = started_match(simple_reaction(), None, Goal::Forward);
    let mut controller = OpponentController::for_player(DifficultyTier::EXPERT);
    let mut rng = make_rng();
    let mut next_id = 0;
    let mut events = Vec::new();

    let first = controller.generate_commands(&state, &mut rng, &mut next_id);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].issued_by, Actor::Player);
    assert!(controller
        .generate_commands(&state, &mut rng, &mut next_id)
        .is_empty());
    state.advance(DifficultyTier::EXPERT.decision_interval_ms(), &mut events);
    assert_eq!(
        controller
            .generate_commands(&state, &mut rng, &mut next_id)
            .len(),
        1
    );
}

#[test]
fn make_cmd_numbers_commands() {
    let mut next_id = 7;
    let cmd = make_cmd(Actor::Player, 1_500, &mut next_id, Command::Pause);
    assert_eq!(cmd.id, CommandId("cmd_000007".to_string()));
    assert_eq!(cmd.issued_ms, 1_500);
    assert_eq!(next_id, 8);
}

#[test]
fn hint_names_an_intervention() {
    let (state, _) = started_match(gas_reaction(), None, Goal::Forward);
    let text = hint(&state, Actor::Player).unwrap();
    assert!(text.contains("projected score"));
}
