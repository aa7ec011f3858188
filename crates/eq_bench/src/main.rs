use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

mod overrides;
mod runner;
mod scenario;
mod summary;

#[derive(Parser)]
#[command(
    name = "eq_bench",
    about = "Sweeps opponent tiers and seeds over one reaction"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file across every (tier, seed) pair.
    Run {
        /// Path to the scenario JSON file.
        #[arg(long)]
        scenario: String,
        /// Output directory (default: runs/).
        #[arg(long, default_value = "runs")]
        output_dir: String,
    },
}

fn run(scenario_path: &str, output_dir: &str) -> Result<()> {
    let scenario = scenario::load_scenario(Path::new(scenario_path))?;
    let seeds = scenario.seeds.expand();

    let mut content = eq_world::load_content(&scenario.content_dir)?;
    overrides::apply_overrides(&mut content.constants, &scenario.overrides)?;
    if content.reaction(&scenario.reaction_id).is_none() {
        bail!("scenario reaction '{}' is not in the catalog", scenario.reaction_id);
    }

    let jobs: Vec<(u8, u64)> = scenario
        .tiers
        .iter()
        .flat_map(|&tier| seeds.iter().map(move |&seed| (tier, seed)))
        .collect();
    println!(
        "Loading scenario '{}': reaction={} tiers={:?} × {} seeds = {} matches",
        scenario.name,
        scenario.reaction_id,
        scenario.tiers,
        seeds.len(),
        jobs.len()
    );

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let run_dir = PathBuf::from(output_dir).join(format!("{}_{}", scenario.name, timestamp));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating output directory: {}", run_dir.display()))?;
    std::fs::copy(scenario_path, run_dir.join("scenario.json")).context("copying scenario file")?;
    println!("Output: {}", run_dir.display());

    let results: Vec<Result<runner::RunRow>> = jobs
        .par_iter()
        .map(|&(tier, seed)| runner::run_match(&content, &scenario, tier, seed))
        .collect();

    let mut rows = Vec::new();
    for result in results {
        match result {
            Ok(row) => rows.push(row),
            Err(err) => eprintln!("Match failed: {err:#}"),
        }
    }
    if rows.is_empty() {
        bail!("all matches failed");
    }

    let results_path = run_dir.join("results.csv");
    runner::write_rows(&results_path, &rows)?;

    let tiers = summary::compute_summary(&rows);
    summary::print_summary(&scenario.name, &tiers);

    let batch = serde_json::json!({
        "batch_schema_version": 1,
        "batch_id": Uuid::new_v4().to_string(),
        "scenario_name": scenario.name,
        "reaction_id": scenario.reaction_id,
        "content_version": content.content_version,
        "match_count": rows.len(),
        "monotonic": summary::is_monotonic(&tiers),
        "tiers": tiers,
    });
    let summary_path = run_dir.join("summary.json");
    let summary_tmp = summary_path.with_extension("json.tmp");
    let summary_json = serde_json::to_string_pretty(&batch).context("serializing summary")?;
    let mut file = std::fs::File::create(&summary_tmp)
        .with_context(|| format!("creating {}", summary_tmp.display()))?;
    file.write_all(summary_json.as_bytes())
        .context("writing summary")?;
    file.sync_all()?;
    std::fs::rename(&summary_tmp, &summary_path).context("renaming summary")?;

    println!("Results written to {}", results_path.display());
    println!("Summary written to {}", summary_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            scenario,
            output_dir,
        } => run(&scenario, &output_dir)?,
    }
    Ok(())
}
