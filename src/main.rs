use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use maze_rl::env::{Environment, ProcessEnv};
use maze_rl::metrics::ScorePlot;
use maze_rl::modes::{DqnMode, TrainMode};
use maze_rl::rl::{DqnConfig, FileModelStore, PPOConfig, TrainingBackend, default_device};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maze_rl")]
#[command(version, about = "Train PPO or DQN agents on a maze-chase game")]
struct Cli {
    /// Learning algorithm
    #[arg(long, default_value = "ppo")]
    mode: Mode,

    /// Game program speaking the JSON-lines protocol on stdin/stdout
    #[arg(long)]
    env_cmd: String,

    /// Argument passed to the game program (repeatable)
    #[arg(long = "env-arg")]
    env_args: Vec<String>,

    /// JSON file with hyperparameters for the selected mode
    #[arg(long)]
    config: Option<PathBuf>,

    /// PPO timestep budget
    #[arg(long, default_value = "100000")]
    total_timesteps: usize,

    /// Number of DQN games to play
    #[arg(long, default_value = "1000")]
    games: usize,

    /// Directory for model snapshots
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Resume from the snapshots in the model directory
    #[arg(long)]
    load_model: bool,

    /// Seed for action sampling and exploration
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Proximal Policy Optimization
    Ppo,
    /// Deep Q-learning with replay memory
    Dqn,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let store = FileModelStore::new(&cli.model_dir);
    let device = default_device();

    match cli.mode {
        Mode::Ppo => {
            let mut config: PPOConfig = read_config(cli.config.as_deref())?;
            config.load_model |= cli.load_model;
            if let Some(seed) = cli.seed {
                config.seed = seed;
            }
            config.validate()?;

            let env = spawn_game(&cli)?;
            let mut mode = TrainMode::<TrainingBackend, _, _, _>::new(config, env, ScorePlot::new(), store, device)
                .context("Failed to set up PPO training")?;
            let summary = mode.run(cli.total_timesteps).context("PPO training failed")?;
            info!(
                timesteps = summary.timesteps,
                iterations = summary.iterations,
                episodes = summary.episodes,
                model_dir = ?cli.model_dir,
                "done"
            );
        }
        Mode::Dqn => {
            let mut config: DqnConfig = read_config(cli.config.as_deref())?;
            config.load_model |= cli.load_model;
            if let Some(seed) = cli.seed {
                config.seed = seed;
            }
            config.validate()?;

            let env = spawn_game(&cli)?;
            let mut mode = DqnMode::<TrainingBackend, _, _, _>::new(config, env, ScorePlot::new(), store, device)
                .context("Failed to set up DQN training")?;
            let summary = mode.run(cli.games).context("DQN training failed")?;
            info!(
                games = summary.games,
                steps = summary.steps,
                record = ?summary.record,
                model_dir = ?cli.model_dir,
                "done"
            );
        }
    }

    Ok(())
}

/// Hyperparameters from `path`, or the defaults when no file is given
fn read_config<C: DeserializeOwned + Default>(path: Option<&Path>) -> Result<C> {
    let Some(path) = path else {
        return Ok(C::default());
    };
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {path:?}"))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse config file {path:?}"))
}

fn spawn_game(cli: &Cli) -> Result<ProcessEnv> {
    let env = ProcessEnv::spawn(&cli.env_cmd, &cli.env_args)
        .with_context(|| format!("Failed to start game process {:?}", cli.env_cmd))?;
    info!(
        observations = env.observations(),
        actions = env.actions(),
        "connected to game"
    );
    Ok(env)
}
