//! labor-market: run a labor-market session from the command line
//!
//! Loads a JSON config, plays the session from a recorded action script
//! (or seeded random agents) and prints the report as JSON.

use clap::{Parser, Subcommand};
use labor_market_core::orchestrator::{RandomActions, Recorder, ScriptedActions, SessionReport};
use labor_market_core::{EventLog, MarketConfig, Session, SimulationError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "labor-market")]
#[command(about = "Deterministic labor-market session runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a session to the end and print the report
    Run {
        /// Session config (JSON); omitted fields take their defaults
        #[arg(short, long)]
        config: PathBuf,

        /// Recorded actions to replay; unlisted actions time out
        #[arg(short, long, conflicts_with = "random_seed")]
        script: Option<PathBuf>,

        /// Drive every participant with seeded random agents
        #[arg(long)]
        random_seed: Option<u64>,

        /// Probability that a random agent times out
        #[arg(long, default_value = "0.0")]
        timeout_rate: f64,

        /// Write the actions that were played as a replayable script
        #[arg(long)]
        record: Option<PathBuf>,

        /// Include the full event log in the output
        #[arg(long)]
        events: bool,
    },

    /// Check a config file and print the normalized config
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print revenue per skill level and effort
    SkillTable {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct RunOutput<'a> {
    report: SessionReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<&'a EventLog>,
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(path: &Path) -> Result<MarketConfig, CliError> {
    MarketConfig::from_json(&read(path)?).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: Cli) -> Result<String, CliError> {
    match cli.command {
        Commands::Run {
            config,
            script,
            random_seed,
            timeout_rate,
            record,
            events,
        } => {
            let mut session = Session::new(load_config(&config)?)?;

            let (report, played) = match random_seed {
                Some(seed) => {
                    let mut recorder = Recorder::new(RandomActions::new(seed, timeout_rate));
                    let report = session.run(&mut recorder)?;
                    (report, recorder.into_script())
                }
                None => {
                    let mut actions = match script {
                        Some(path) => ScriptedActions::from_json(&read(&path)?)?,
                        None => ScriptedActions::new(),
                    };
                    let report = session.run(&mut actions)?;
                    (report, actions)
                }
            };

            if let Some(path) = record {
                let json = serde_json::to_string_pretty(&played.entries())?;
                fs::write(&path, json).map_err(|source| CliError::Io { path, source })?;
            }

            let output = RunOutput {
                report,
                events: events.then(|| session.event_log()),
            };
            Ok(serde_json::to_string_pretty(&output)?)
        }
        Commands::Validate { config } => {
            let config = load_config(&config)?;
            config.validate().map_err(SimulationError::from)?;
            Ok(serde_json::to_string_pretty(&config)?)
        }
        Commands::SkillTable { config } => {
            let session = Session::new(load_config(&config)?)?;
            Ok(serde_json::to_string_pretty(&session.skill_table())?)
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::FAILURE
        }
    }
}
