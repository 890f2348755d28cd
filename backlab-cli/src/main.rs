//! BackLab CLI — run backtests and generate sample data.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config file
//! - `sample-data` — write deterministic synthetic CSV bars

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use backlab_runner::config::RunConfig;
use backlab_runner::sample_data::{generate_bars, write_csv, SampleDataConfig};
use backlab_runner::Runner;

#[derive(Parser)]
#[command(name = "backlab", about = "Event-driven backtesting engine", version)]
struct Cli {
    /// Log filter (overridden by BACKLAB_LOG).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a backtest from a TOML config file.
    Run {
        /// Path to the run configuration.
        config: PathBuf,

        /// Write the full result record as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Generate deterministic synthetic bar data.
    SampleData {
        /// Output directory (one CSV per symbol).
        #[arg(long, default_value = "data")]
        directory: PathBuf,

        /// Symbols to generate.
        #[arg(long, required = true, num_args = 1..)]
        symbols: Vec<String>,

        /// Bars per symbol.
        #[arg(long, default_value_t = 252)]
        bars: usize,

        /// RNG seed; same seed, same data.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = std::env::var("BACKLAB_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { config, output } => {
            let run_config = RunConfig::from_file(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            let result = Runner::new().run(&run_config)?;

            println!("{}", result.summary());

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&result)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("\nresult written to {}", path.display());
            }
        }
        Command::SampleData { directory, symbols, bars, seed } => {
            std::fs::create_dir_all(&directory)
                .with_context(|| format!("creating {}", directory.display()))?;
            let config = SampleDataConfig::default();
            for (i, symbol) in symbols.iter().enumerate() {
                // Offset the seed per symbol so series differ but stay
                // reproducible.
                let data = generate_bars(symbol, bars, seed + i as u64, &config);
                write_csv(&directory, symbol, &data)
                    .with_context(|| format!("writing {symbol}.csv"))?;
                println!("wrote {} bars to {}/{symbol}.csv", data.len(), directory.display());
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(&cli.log_level) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
