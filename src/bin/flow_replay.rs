use sprinkler_leak::engine::{replay, SyntheticRun};
use sprinkler_leak::StationConfig;
use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

/// Replay a station run through the flow monitor offline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON array of ticks/minute samples; a synthetic run is generated if omitted
    #[arg(short, long)]
    samples: Option<PathBuf>,

    /// Station name used in event messages
    #[arg(long, default_value = "replay")]
    station: String,

    /// Expected average ticks/minute (omit to disable the mean check)
    #[arg(long)]
    baseline: Option<f64>,

    #[arg(long, default_value = "6")]
    inrush: usize,

    #[arg(long, default_value = "6.0")]
    max_flow: f64,

    #[arg(long, default_value = "0.75")]
    allowed_deviation: f64,

    #[arg(long, default_value = "10")]
    window: usize,

    /// Synthetic run: leak offset added halfway through
    #[arg(long, default_value = "0.0")]
    leak_offset: f64,

    /// Synthetic run: RNG seed
    #[arg(long, default_value = "1")]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    anyhow::ensure!(args.window > 0, "--window must be at least 1");

    let samples: Vec<f64> = match &args.samples {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a JSON array of numbers", path.display()))?
        }
        None => {
            let run = SyntheticRun {
                steady_level: args.baseline.unwrap_or(1.8),
                leak_offset: args.leak_offset,
                ..SyntheticRun::default()
            };
            println!("Generating synthetic run: {:?}", run);
            run.generate(&mut StdRng::seed_from_u64(args.seed))
        }
    };

    let config = StationConfig {
        inrush_measurement_count: args.inrush,
        max_allowed_flow: args.max_flow,
        allowed_mean_deviation: args.allowed_deviation,
        mean_window_size: args.window,
    };

    println!("Station: {}", args.station);
    println!("Samples: {}", samples.len());
    println!("Profile: {:?}", config);
    println!("Baseline: {:?}", args.baseline);
    println!();

    let outcome = replay(&args.station, config, args.baseline, &samples);

    println!("Submitted: {}", outcome.submitted);
    println!("Stored: {}", outcome.stored);
    println!("Final phase: {:?}", outcome.final_phase);

    match (&outcome.event, outcome.trigger_index) {
        (Some(event), Some(index)) => println!("ANOMALY at sample {}: {}", index, event),
        _ => println!("No anomaly"),
    }

    Ok(())
}
