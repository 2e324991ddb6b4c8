//! CLI flags (clap derive, defaults baked in per-field) plus an optional
//! `--config` TOML file that overrides those defaults before the CLI flags
//! are applied on top.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Self-play trainer for Psychometric Duel", long_about = None)]
pub struct Args {
    #[arg(long, default_value_t = 20)]
    pub iterations: u32,

    #[arg(long = "episodes-per-iter", default_value_t = 8)]
    pub episodes_per_iter: usize,

    #[arg(long, default_value_t = 100)]
    pub simulations: u32,

    #[arg(long = "learning-rate", default_value_t = 1e-3)]
    pub learning_rate: f64,

    #[arg(long = "replay-size", default_value_t = 20000)]
    pub replay_size: usize,

    #[arg(long = "batch-size", default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 2)]
    pub epochs: u32,

    #[arg(long = "checkpoint-frequency", default_value_t = 1)]
    pub checkpoint_frequency: u32,

    #[arg(long = "evaluation-games", default_value_t = 20)]
    pub evaluation_games: usize,

    #[arg(long = "gating-threshold", default_value_t = 0.55)]
    pub gating_threshold: f64,

    #[arg(long, default_value_t = 1.25)]
    pub cpuct: f64,

    #[arg(long = "temp-opening-moves", default_value_t = 12)]
    pub temp_opening_moves: usize,

    #[arg(long, default_value_t = 1.0)]
    pub temperature: f64,

    #[arg(long = "dirichlet-alpha", default_value_t = 0.3)]
    pub dirichlet_alpha: f64,

    #[arg(long = "dirichlet-eps", default_value_t = 0.25)]
    pub dirichlet_eps: f64,

    #[arg(long = "max-game-moves", default_value_t = 300)]
    pub max_game_moves: usize,

    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    #[arg(long = "hidden-dim", default_value_t = 256)]
    pub hidden_dim: usize,

    #[arg(long = "output-dir", default_value = "checkpoints")]
    pub output_dir: PathBuf,

    /// Accepted and logged, not otherwise consulted -- the hand-rolled
    /// evaluator has no device abstraction to dispatch on.
    #[arg(long, default_value = "cpu")]
    pub device: String,

    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Optional TOML file whose `[defaults]` table overrides the
    /// hardcoded defaults above before CLI flags are applied on top.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct TomlOverrides {
    #[serde(default)]
    defaults: TomlDefaults,
}

#[derive(Deserialize, Default)]
struct TomlDefaults {
    iterations: Option<u32>,
    episodes_per_iter: Option<usize>,
    simulations: Option<u32>,
    learning_rate: Option<f64>,
    replay_size: Option<usize>,
    batch_size: Option<usize>,
    epochs: Option<u32>,
    checkpoint_frequency: Option<u32>,
    evaluation_games: Option<usize>,
    gating_threshold: Option<f64>,
    cpuct: Option<f64>,
    temp_opening_moves: Option<usize>,
    temperature: Option<f64>,
    dirichlet_alpha: Option<f64>,
    dirichlet_eps: Option<f64>,
    max_game_moves: Option<usize>,
    seed: Option<u64>,
    hidden_dim: Option<usize>,
}

impl Args {
    /// Applies `self.config`'s TOML overrides (if present) for any field
    /// still at its clap default, then returns the merged config. CLI
    /// flags explicitly passed by the user always win.
    pub fn with_toml_overrides(mut self) -> anyhow::Result<Args> {
        let Some(path) = self.config.clone() else { return Ok(self) };
        let text = fs::read_to_string(&path).with_context(|| format!("reading config file {}", path.display()))?;
        let overrides: TomlOverrides = toml::from_str(&text).context("parsing config file")?;
        let d = overrides.defaults;

        macro_rules! apply {
            ($field:ident) => {
                if let Some(v) = d.$field {
                    self.$field = v;
                }
            };
        }
        apply!(iterations);
        apply!(episodes_per_iter);
        apply!(simulations);
        apply!(learning_rate);
        apply!(replay_size);
        apply!(batch_size);
        apply!(epochs);
        apply!(checkpoint_frequency);
        apply!(evaluation_games);
        apply!(gating_threshold);
        apply!(cpuct);
        apply!(temp_opening_moves);
        apply!(temperature);
        apply!(dirichlet_alpha);
        apply!(dirichlet_eps);
        apply!(max_game_moves);
        apply!(seed);
        apply!(hidden_dim);

        Ok(self)
    }
}
