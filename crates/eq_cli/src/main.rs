use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use eq_control::{InterventionSource, OpponentController};
use eq_core::equilibrium::{pressure_effect, temperature_effect};
use eq_core::{tick, AbilityEffect, DifficultyTier, Event, EventEnvelope, MatchState, Phase};
use eq_world::{generate_run_id, load_content, start_match, write_run_info, Content};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io::Write;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "eq_cli", about = "Equilibrium duel CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the reaction catalog.
    List {
        #[arg(long, default_value = "./content")]
        content_dir: String,
    },
    /// Play one unattended match against the opponent.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Reaction id. Defaults to the first catalog entry.
    #[arg(long)]
    reaction: Option<String>,
    /// Opponent tier 1-4, or 0 to disable the opponent. Overrides settings.json.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
    difficulty: Option<u8>,
    #[arg(long)]
    rounds: Option<u32>,
    #[arg(long)]
    round_seconds: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Who occupies the player seat.
    #[arg(long, value_enum, default_value_t = PlayerMode::Auto)]
    player: PlayerMode,
    /// Tier used by the automatic player.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=4))]
    player_tier: u8,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(1..))]
    step_ms: u64,
    #[arg(long, default_value = "./content")]
    content_dir: String,
    /// Print every accepted action, not just round results.
    #[arg(long)]
    verbose: bool,
    /// Skip writing run_info.json and events.jsonl under runs/.
    #[arg(long)]
    no_run_info: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlayerMode {
    /// The player never acts.
    Idle,
    /// A heuristic controller plays the player seat.
    Auto,
}

// ---------------------------------------------------------------------------
// Catalog listing
// ---------------------------------------------------------------------------

fn list(content_dir: &str) -> Result<()> {
    let content = load_content(content_dir)?;
    println!(
        "{:<24} {:<32} {:>10} {:>8} {:>8} {:>8}",
        "id", "equation", "K0", "dH", "heat", "press"
    );
    println!("{}", "-".repeat(96));
    for def in &content.reactions {
        let heat = temperature_effect(def)
            .favours_on_increase
            .map_or("-".to_string(), |goal| goal.to_string());
        let press = if def.is_gas_phase() {
            pressure_effect(def)
                .favours_on_increase
                .map_or("-".to_string(), |goal| goal.to_string())
        } else {
            "n/a".to_string()
        };
        println!(
            "{:<24} {:<32} {:>10.3e} {:>8.1} {:>8} {:>8}",
            def.id.0, def.equation, def.equilibrium_constant, def.delta_h_kj_per_mol, heat, press
        );
    }
    for (id, fix) in &content.fixes {
        println!("note: {id}: {fix}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn create_run_dir(run_id: &str) -> Result<std::path::PathBuf> {
    let dir = std::path::PathBuf::from("runs").join(run_id);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

fn resolve_config(content: &Content, args: &RunArgs) -> eq_core::MatchConfig {
    let mut config = content.settings.to_match_config();
    if let Some(level) = args.difficulty {
        config.difficulty = (level > 0).then(|| DifficultyTier::new(level));
    }
    if let Some(rounds) = args.rounds {
        config.max_rounds = rounds.max(1);
    }
    if let Some(seconds) = args.round_seconds {
        config.round_ms = seconds.max(1) * 1_000;
    }
    config
}

fn run(args: &RunArgs) -> Result<()> {
    let content = load_content(&args.content_dir)?;
    let reaction_id = match &args.reaction {
        Some(id) => id.clone(),
        None => match content.reactions.first() {
            Some(def) => def.id.0.clone(),
            None => bail!("reaction catalog is empty"),
        },
    };
    let config = resolve_config(&content, args);
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (mut state, start_events) = start_match(&content, &reaction_id, config.clone(), &mut rng)?;

    let mut event_log: Option<std::io::BufWriter<std::fs::File>> = None;
    if !args.no_run_info {
        let run_id = generate_run_id(seed);
        let run_dir = create_run_dir(&run_id)?;
        write_run_info(
            &run_dir,
            &run_id,
            seed,
            &reaction_id,
            &config,
            &content.content_version,
            "eq_cli",
        )?;
        let path = run_dir.join("events.jsonl");
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        event_log = Some(std::io::BufWriter::new(file));
        println!("Run directory: {}", run_dir.display());
    }

    let mut opponent = OpponentController::for_opponent();
    let mut player = match args.player {
        PlayerMode::Auto => Some(OpponentController::for_player(DifficultyTier::new(
            args.player_tier,
        ))),
        PlayerMode::Idle => None,
    };
    let mut next_command_id = 0u64;

    println!(
        "Starting match: reaction={reaction_id} seed={seed} rounds={} opponent={} content_version={}",
        config.max_rounds,
        config
            .difficulty
            .map_or("disabled".to_string(), |tier| tier.to_string()),
        content.content_version,
    );
    println!("{}", "-".repeat(80));
    report_events(&start_events, args.verbose, event_log.as_mut())?;

    while state.phase != Phase::MatchEnded {
        let mut commands = opponent.generate_commands(&state, &mut rng, &mut next_command_id);
        if let Some(controller) = player.as_mut() {
            commands.extend(controller.generate_commands(&state, &mut rng, &mut next_command_id));
        }
        let events = tick(&mut state, &commands, &mut rng, args.step_ms);
        report_events(&events, args.verbose, event_log.as_mut())?;
    }

    println!("{}", "-".repeat(80));
    print_status(&state);
    if let Some(mut log) = event_log {
        log.flush().context("flushing events.jsonl")?;
    }
    Ok(())
}

fn report_events(
    events: &[EventEnvelope],
    verbose: bool,
    mut log: Option<&mut std::io::BufWriter<std::fs::File>>,
) -> Result<()> {
    for envelope in events {
        if let Some(writer) = log.as_mut() {
            serde_json::to_writer(&mut **writer, envelope).context("writing event")?;
            writeln!(writer).context("writing event")?;
        }
        let at = envelope.at_ms;
        match &envelope.event {
            Event::MatchStarted {
                player_goal,
                opponent_goal,
                ..
            } => println!("[t={at:>7}] goals: player={player_goal} opponent={opponent_goal}"),
            Event::RoundSettled {
                round,
                shift,
                player_score,
                opponent_score,
                player_total,
                opponent_total,
            } => println!(
                "[t={at:>7}] round {round:2} settled  shift={shift:+.3}  \
                 player={player_score:5.1} ({player_total:6.1})  \
                 opponent={opponent_score:5.1} ({opponent_total:6.1})"
            ),
            Event::MatchEnded {
                winner,
                stars,
                achievement_pct,
                ..
            } => println!(
                "*** MATCH ENDED: winner={winner} stars={stars} achievement={achievement_pct:.0}% ***"
            ),
            Event::ActionAccepted {
                actor,
                intervention,
                report,
            } if verbose => println!(
                "[t={at:>7}] {actor:<8} {intervention:<20} shift={:+.3}",
                report.shift
            ),
            Event::AbilityUsed { actor, effect, report } if verbose => println!(
                "[t={at:>7}] {actor:<8} {:<20} shift={:+.3}",
                effect_label(effect),
                report.shift
            ),
            _ => {}
        }
    }
    Ok(())
}

fn effect_label(effect: &AbilityEffect) -> &'static str {
    match effect {
        AbilityEffect::Catalyst { .. } => "ability:catalyst",
        AbilityEffect::Buffer { .. } => "ability:buffer",
        AbilityEffect::HeatExchange { .. } => "ability:heat_exchange",
        AbilityEffect::Quantum { .. } => "ability:quantum",
    }
}

fn print_status(state: &MatchState) {
    let snap = state.snapshot();
    println!(
        "[round={}/{}  t={}ms]  T={:.1}K  P={:.1}kPa  K={:.3e}  Q={:.3e}  shift={:+.3}",
        snap.round,
        snap.max_rounds,
        snap.clock_ms,
        snap.temperature_k,
        snap.pressure_kpa,
        snap.k,
        snap.q,
        snap.shift,
    );
    println!(
        "player({})={:.1}  opponent({})={:.1}",
        snap.player_goal, snap.player_total, snap.opponent_goal, snap.opponent_total
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::List { content_dir } => list(&content_dir)?,
        Commands::Run(args) => run(&args)?,
    }
    Ok(())
}
