mod routes;
mod state;
mod tick_loop;

use anyhow::{bail, Context, Result};
use axum::http::HeaderValue;
use clap::{Args, Parser, Subcommand};
use eq_core::DifficultyTier;
use eq_world::load_content;
use state::{AppState, MatchHost};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eq_daemon", about = "Equilibrium duel HTTP daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one live match over HTTP and SSE.
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = "./content")]
    content_dir: String,
    /// Reaction for the initial match. Defaults to the first catalog entry.
    #[arg(long)]
    reaction: Option<String>,
    /// Opponent tier 1-4, or 0 to disable. Overrides settings.json.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
    difficulty: Option<u8>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 3001)]
    port: u16,
    /// Wall-clock milliseconds per scheduler step.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
}

async fn serve(args: ServeArgs) -> Result<()> {
    let content = load_content(&args.content_dir)?;
    for (id, fix) in &content.fixes {
        tracing::warn!(reaction = %id, %fix, "reaction definition repaired");
    }
    let reaction_id = match args.reaction {
        Some(id) => id,
        None => match content.reactions.first() {
            Some(def) => def.id.0.clone(),
            None => bail!("reaction catalog is empty"),
        },
    };
    let mut config = content.settings.to_match_config();
    if let Some(level) = args.difficulty {
        config.difficulty = (level > 0).then(|| DifficultyTier::new(level));
    }
    let seed = args.seed.unwrap_or_else(rand::random);
    let cors_origin: HeaderValue = args
        .cors_origin
        .parse()
        .with_context(|| format!("parsing --cors-origin {}", args.cors_origin))?;

    let (host, _) = MatchHost::start(content, &reaction_id, config, seed)?;
    let host = Arc::new(parking_lot::Mutex::new(host));
    let (event_tx, _) = tokio::sync::broadcast::channel(256);
    let app_state = AppState {
        host: host.clone(),
        event_tx: event_tx.clone(),
        tick_ms: args.tick_ms,
    };

    tokio::spawn(tick_loop::run_tick_loop(host, event_tx, args.tick_ms, None));

    let app = routes::make_router_with_cors(app_state, cors_origin);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, %reaction_id, seed, "eq_daemon listening");
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => serve(args).await?,
    }
    Ok(())
}
