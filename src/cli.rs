use clap::Parser;

#[derive(Parser)]
#[command(name = "region-tuner")]
#[command(version = "0.3.0")]
#[command(about = "Feedback-directed tuning of a synthetic parallel workload")]
pub struct Args {
    /// Search strategy: exhaustive, random, simplex, rank-order
    #[arg(long, default_value = "simplex")]
    pub strategy: String,

    /// Calls to batch before each evaluation (tuning window)
    #[arg(long, default_value = "1")]
    pub window: u32,

    /// Passes over the synthetic workload
    #[arg(long, default_value = "300")]
    pub passes: u32,

    /// History file: loaded at start (pinning known regions), saved at end
    #[arg(long)]
    pub history: Option<String>,

    /// Emit a JSON summary instead of the colored report
    #[arg(long)]
    pub json: bool,

    /// Raise diagnostic verbosity to debug
    #[arg(long, short)]
    pub verbose: bool,
}
