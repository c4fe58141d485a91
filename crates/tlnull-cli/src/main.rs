//! CLI for tlnull: Taylor's Law against the feasible set.

mod commands;

use clap::{Parser, Subcommand};
use tlnull_core::AnalysisMode;

#[derive(Parser)]
#[command(name = "tlnull")]
#[command(about = "tlnull: compare Taylor's Law fits with random partitions and compositions")]
#[command(version = tlnull_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw null variances for every study and append them to the output files
    Sample {
        /// Tab-delimited study file: study, Q, N, mean, var
        #[arg(long)]
        input: String,

        /// Feasible set: partition (default) or composition
        #[arg(long)]
        mode: Option<AnalysisMode>,

        /// Variances to draw per Q-N combo (default 1000)
        #[arg(long)]
        sample_size: Option<usize>,

        /// Per-combo time budget in seconds (default 7200)
        #[arg(long)]
        time_limit: Option<u64>,

        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Draws requested per loop iteration (composition batches are deduplicated)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Output directory (default: current directory)
        #[arg(long)]
        output: Option<String>,

        /// JSON run configuration; flags override its values
        #[arg(long)]
        config: Option<String>,

        /// Drop combos with N <= 2 before sampling
        #[arg(long)]
        regression_only: bool,

        /// Only sample studies that pass the inclusion criteria
        #[arg(long)]
        filter: bool,
    },

    /// Compare each study's empirical TL with the TL of its null replicates
    Compare {
        /// Full variance file written by `sample`
        #[arg(long)]
        input: String,

        /// Write results as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// List studies that pass the inclusion criteria
    Filter {
        /// Tab-delimited study file: study, Q, N, mean, var
        #[arg(long)]
        input: String,

        /// Also require a significant empirical TL (alpha = 0.05)
        #[arg(long)]
        sig: bool,

        /// JSON run configuration providing the thresholds
        #[arg(long)]
        config: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sample {
            input,
            mode,
            sample_size,
            time_limit,
            seed,
            batch_size,
            output,
            config,
            regression_only,
            filter,
        } => commands::sample::run(commands::sample::SampleCommandConfig {
            input: &input,
            mode,
            sample_size,
            time_limit,
            seed,
            batch_size,
            output_dir: output.as_deref(),
            config_path: config.as_deref(),
            regression_only,
            filter,
        }),
        Commands::Compare { input, output } => {
            commands::compare::run(&input, output.as_deref())
        }
        Commands::Filter { input, sig, config } => {
            commands::filter::run(&input, sig, config.as_deref())
        }
    }
}
