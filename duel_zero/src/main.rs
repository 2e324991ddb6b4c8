use std::fs;
use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::Context;
use arc_swap::ArcSwap;
use clap::Parser;
use duel_engine::ActionSpace;
use duel_zero::checkpoint::{save_checkpoint, write_metadata, HistoryRecord, Metadata};
use duel_zero::config::Args;
use duel_zero::evaluator::{Adam, AlphaZeroNet};
use duel_zero::mcts::SearchConfig;
use duel_zero::replay::ReplayBuffer;
use duel_zero::train::{evaluate_candidate, run_self_play_batch, train_epoch};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, LevelFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};

fn init_logging(verbose: u8, output_dir: &std::path::Path) -> anyhow::Result<()> {
    let term_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let log_path = output_dir.join("duel_zero.log");

    CombinedLogger::init(vec![
        TermLogger::new(term_level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(
            LevelFilter::Info,
            config,
            OpenOptions::new().append(true).create(true).open(&log_path)?,
        ),
    ])
    .context("initializing logger")
}

/// Deterministically derives a per-iteration sub-seed from the top-level
/// seed, so the whole run is reproducible from one `--seed` flag.
fn iteration_seed(top_seed: u64, iteration: u32) -> u64 {
    top_seed.wrapping_mul(6364136223846793005).wrapping_add(iteration as u64).wrapping_add(1)
}

fn now_unix_seconds() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse().with_toml_overrides()?;
    fs::create_dir_all(&args.output_dir).context("creating output directory")?;
    init_logging(args.verbose, &args.output_dir)?;

    info!("starting training run: seed={} iterations={} device={}", args.seed, args.iterations, args.device);

    let space = ActionSpace::new();
    let feature_len = duel_engine::encoder::FEATURE_LEN;

    // The evaluator snapshot search threads read from: writes only ever
    // happen between iterations, right after gating decides to promote, so
    // a self-play fan-out never observes a partially updated network.
    let initial_net = AlphaZeroNet::new(feature_len, args.hidden_dim, space.size(), args.seed);
    let mut optimizer = Adam::new(&initial_net, args.learning_rate);
    let best: ArcSwap<AlphaZeroNet> = ArcSwap::from_pointee(initial_net);
    let mut replay = ReplayBuffer::new(args.replay_size);

    let mut history = Vec::new();

    let pb = ProgressBar::new(args.iterations as u64);
    if let Ok(style) = ProgressStyle::with_template("iteration {pos}/{len} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }

    for iteration in 0..args.iterations {
        let mut rng = StdRng::seed_from_u64(iteration_seed(args.seed, iteration));
        let best_snapshot: Arc<AlphaZeroNet> = best.load_full();

        let search_config =
            SearchConfig { simulations: args.simulations, cpuct: args.cpuct, dirichlet_alpha: args.dirichlet_alpha, dirichlet_eps: args.dirichlet_eps };

        let winners = run_self_play_batch(
            &best_snapshot,
            &space,
            &search_config,
            args.temp_opening_moves,
            args.temperature,
            args.max_game_moves,
            args.episodes_per_iter,
            &mut replay,
            &mut rng,
        );

        let mut candidate = (*best_snapshot).clone();
        let mut epoch_stats = None;
        for _ in 0..args.epochs {
            epoch_stats = Some(train_epoch(&mut candidate, &mut optimizer, &replay, args.batch_size, &mut rng));
        }
        let epoch_stats = epoch_stats.expect("epochs is always >= 1 in a normal run");

        let gating_config = SearchConfig { simulations: args.simulations, cpuct: args.cpuct, dirichlet_alpha: args.dirichlet_alpha, dirichlet_eps: 0.0 };
        let gating = evaluate_candidate(
            &candidate,
            &best_snapshot,
            &space,
            &gating_config,
            args.max_game_moves,
            args.evaluation_games,
            args.gating_threshold,
            &mut rng,
        );
        if gating.promoted {
            best.store(Arc::new(candidate.clone()));
        }

        info!(
            "iteration {iteration}: replay_size={} policy_loss={:.4} value_loss={:.4} gating_win_rate={:.3} promoted={}",
            replay.len(),
            epoch_stats.policy_loss,
            epoch_stats.value_loss,
            gating.win_rate,
            gating.promoted
        );

        history.push(HistoryRecord {
            iteration,
            self_play_winners: winners,
            replay_size: replay.len(),
            policy_loss: epoch_stats.policy_loss,
            value_loss: epoch_stats.value_loss,
            gating_win_rate: gating.win_rate,
            promoted: gating.promoted,
        });

        if (iteration + 1) % args.checkpoint_frequency == 0 || iteration + 1 == args.iterations {
            let latest_path = args.output_dir.join("latest.ckpt");
            save_checkpoint(&latest_path, &candidate, &optimizer).context("writing latest checkpoint")?;
            if gating.promoted {
                let best_path = args.output_dir.join("best.ckpt");
                save_checkpoint(&best_path, &best.load(), &optimizer).context("writing best checkpoint")?;
            }

            let metadata = Metadata {
                created_at: now_unix_seconds().to_string(),
                seed: args.seed,
                hyperparameters: serde_json::json!({
                    "iterations": args.iterations,
                    "episodes_per_iter": args.episodes_per_iter,
                    "simulations": args.simulations,
                    "learning_rate": args.learning_rate,
                    "replay_size": args.replay_size,
                    "batch_size": args.batch_size,
                    "epochs": args.epochs,
                    "evaluation_games": args.evaluation_games,
                    "gating_threshold": args.gating_threshold,
                    "cpuct": args.cpuct,
                    "temp_opening_moves": args.temp_opening_moves,
                    "temperature": args.temperature,
                    "dirichlet_alpha": args.dirichlet_alpha,
                    "dirichlet_eps": args.dirichlet_eps,
                    "max_game_moves": args.max_game_moves,
                    "hidden_dim": args.hidden_dim,
                }),
                history: history.clone(),
                expectations: serde_json::json!({}),
            };
            write_metadata(&args.output_dir.join("metadata.json"), &metadata).context("writing metadata")?;
        }

        pb.set_message(format!("gating_win_rate={:.3}", gating.win_rate));
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!("training run complete");
    Ok(())
}
