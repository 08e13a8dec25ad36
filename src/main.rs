use std::sync::Arc;

use clap::Parser;
use colored::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use region_tuner::{
    cli::Args,
    profile::{InMemoryProfiler, RecordingSink},
    Configuration, Controller, ParamValue, Phase, StrategyKind, TunerConfig,
};

// ---------------------------------------------------------------------------
// Synthetic workload
//
// Two recurring regions with different sweet spots: "alpha" is fastest on 4
// worker threads, "beta" on 8. The cost model also rewards static
// scheduling and mid-sized chunks, so every tunable dimension matters.
// ---------------------------------------------------------------------------

struct SyntheticRegion {
    name: &'static str,
    optimal_threads: i64,
}

const WORKLOAD: &[SyntheticRegion] = &[
    SyntheticRegion { name: "alpha", optimal_threads: 4 },
    SyntheticRegion { name: "beta", optimal_threads: 8 },
];

/// Simulated mean seconds per invocation under `config`.
fn simulate_cost(region: &SyntheticRegion, config: &Configuration, rng: &mut StdRng) -> f64 {
    let threads = config
        .get("worker_threads")
        .and_then(|v| v.as_int())
        .unwrap_or(region.optimal_threads);
    let mut cost = 0.001 + (threads - region.optimal_threads).abs() as f64 * 0.002;

    if let Some(ParamValue::Str(s)) = config.get("schedule") {
        cost += match s.as_str() {
            "dynamic" => 0.0006,
            "guided" => 0.0003,
            _ => 0.0,
        };
    }
    if let Some(chunk) = config.get("chunk_size").and_then(|v| v.as_int()) {
        cost += ((chunk as f64 / 64.0).log2().abs()) * 0.0002;
    }

    // Measurement noise, well under one search step of signal.
    cost * (1.0 + rng.gen_range(-0.02..0.02))
}

// ---------------------------------------------------------------------------
// JSON summary
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RegionSummary {
    region: String,
    converged: bool,
    pinned: bool,
    steps: u64,
    exits: u64,
    final_config: Configuration,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    schema_version: u8,
    strategy: String,
    window: u32,
    passes: u32,
    regions: Vec<RegionSummary>,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let strategy = match args.strategy.parse::<StrategyKind>() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!(
                "{} {e}; falling back to {}",
                "warning:".bright_yellow(),
                StrategyKind::default()
            );
            StrategyKind::default()
        }
    };

    let cfg = TunerConfig {
        strategy,
        window: args.window.max(1),
        verbose: args.verbose,
        history_file: args.history.as_ref().map(Into::into),
        ..TunerConfig::default()
    };

    let profiles = Arc::new(InMemoryProfiler::new());
    let sink = Arc::new(RecordingSink::new());
    let tuner = Controller::new(cfg, profiles.clone(), sink.clone());

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..args.passes {
        for region in WORKLOAD {
            tuner.on_event(region.name, Phase::Enter);
            let applied = sink
                .last(region.name)
                .unwrap_or_else(|| tuner.config().template.build_space()
                    .map(|s| s.current())
                    .unwrap_or_default());
            profiles.record(region.name, simulate_cost(region, &applied, &mut rng));
            tuner.on_event(region.name, Phase::Exit);
        }
    }

    let summaries = collect_summaries(&tuner);

    if args.json {
        let summary = RunSummary {
            schema_version: 1,
            strategy: strategy.to_string(),
            window: args.window,
            passes: args.passes,
            regions: summaries,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("failed to serialize summary: {e}"),
        }
    } else {
        print_report(&summaries, strategy, args.passes);
    }

    if let Err(e) = tuner.save_history() {
        eprintln!("{} {e}", "warning:".bright_yellow());
    }
}

fn collect_summaries(tuner: &Controller) -> Vec<RegionSummary> {
    let mut out = Vec::new();
    tuner.registry().for_each_session(|session| {
        out.push(RegionSummary {
            region: session.region().to_string(),
            converged: session.is_converged(),
            pinned: session.is_pinned(),
            steps: session.steps_taken(),
            exits: session.exits_seen(),
            final_config: session.current(),
        });
    });
    out
}

fn print_report(summaries: &[RegionSummary], strategy: StrategyKind, passes: u32) {
    println!();
    println!("{}", "REGION TUNER".bright_cyan().bold());
    println!("{}", "=".repeat(50).bright_blue());
    println!("{}: {strategy}", "Strategy".bright_yellow());
    println!("{}: {passes}", "Passes".bright_yellow());
    println!();

    for s in summaries {
        let verdict = if s.converged {
            "converged".bright_green().to_string()
        } else {
            "still searching".bright_red().to_string()
        };
        let pinned = if s.pinned { " (pinned from history)" } else { "" };
        println!(
            "  {} -- {verdict}{pinned} after {} steps / {} exits",
            s.region.bright_cyan().bold(),
            s.steps,
            s.exits
        );
        println!("    {}", s.final_config);
    }
    println!("{}", "=".repeat(50).bright_blue());
}
