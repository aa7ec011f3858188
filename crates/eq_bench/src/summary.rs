use crate::runner::RunRow;
use serde::Serialize;
use std::collections::BTreeMap;

type Extractor = (&'static str, fn(&RunRow) -> f64);

const EXTRACTORS: &[Extractor] = &[
    ("opponent_total", |r| r.opponent_total),
    ("player_total", |r| r.player_total),
    ("achievement_pct", |r| r.achievement_pct),
    ("stars", |r| f64::from(r.stars)),
    ("opponent_actions", |r| f64::from(r.opponent_actions)),
    ("opponent_abilities", |r| f64::from(r.opponent_abilities)),
    ("player_actions", |r| f64::from(r.player_actions)),
    ("rejections", |r| f64::from(r.rejections)),
];

#[derive(Debug, Serialize)]
pub struct TierSummary {
    pub tier: u8,
    pub runs: usize,
    pub opponent_wins: usize,
    pub metrics: Vec<MetricSummary>,
}

impl TierSummary {
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

/// Groups rows by tier, ascending.
pub fn compute_summary(rows: &[RunRow]) -> Vec<TierSummary> {
    let mut by_tier: BTreeMap<u8, Vec<&RunRow>> = BTreeMap::new();
    for row in rows {
        by_tier.entry(row.tier).or_default().push(row);
    }
    by_tier
        .into_iter()
        .map(|(tier, rows)| {
            let metrics = EXTRACTORS
                .iter()
                .map(|(name, extract)| {
                    let values: Vec<f64> = rows.iter().map(|r| extract(r)).collect();
                    compute_metric_summary(name, &values)
                })
                .collect();
            TierSummary {
                tier,
                runs: rows.len(),
                opponent_wins: rows.iter().filter(|r| r.winner == "opponent").count(),
                metrics,
            }
        })
        .collect()
}

fn compute_metric_summary(name: &str, values: &[f64]) -> MetricSummary {
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    let stddev = variance.sqrt();

    MetricSummary {
        name: name.to_string(),
        mean,
        min,
        max,
        stddev,
    }
}

/// Whether mean opponent score never drops as the tier rises.
pub fn is_monotonic(tiers: &[TierSummary]) -> bool {
    let means: Vec<f64> = tiers
        .iter()
        .filter_map(|t| t.metric("opponent_total").map(|m| m.mean))
        .collect();
    means.windows(2).all(|w| w[1] >= w[0])
}

pub fn print_summary(scenario_name: &str, tiers: &[TierSummary]) {
    println!();
    println!("=== {scenario_name} ===");
    println!(
        "{:<6} {:>5} {:>9} {:>14} {:>14} {:>10}",
        "tier", "runs", "opp_wins", "opp_total", "player_total", "opp_acts"
    );
    for summary in tiers {
        let mean = |name: &str| summary.metric(name).map_or(0.0, |m| m.mean);
        println!(
            "{:<6} {:>5} {:>9} {:>14.1} {:>14.1} {:>10.1}",
            summary.tier,
            summary.runs,
            summary.opponent_wins,
            mean("opponent_total"),
            mean("player_total"),
            mean("opponent_actions"),
        );
    }
    if !is_monotonic(tiers) {
        println!("warning: opponent score is not monotonic in tier");
    }
}
