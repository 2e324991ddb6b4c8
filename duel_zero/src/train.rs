//! One training epoch over the replay buffer, and gating: matches between
//! a freshly trained candidate and the current best, promoting the
//! candidate when its win rate clears `gatingThreshold`.

use duel_engine::ActionSpace;
use itertools::Itertools;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::evaluator::{train_on_batch, Adam, AlphaZeroNet};
use crate::mcts::SearchConfig;
use crate::replay::ReplayBuffer;
use crate::selfplay::play_episode;

pub struct EpochStats {
    pub policy_loss: f64,
    pub value_loss: f64,
}

/// Shuffles `replay`'s contents and runs one pass of batched gradient
/// steps, averaging the two loss terms across all batches.
pub fn train_epoch(
    net: &mut AlphaZeroNet,
    optimizer: &mut Adam,
    replay: &ReplayBuffer,
    batch_size: usize,
    rng: &mut impl Rng,
) -> EpochStats {
    let shuffled = replay.as_slice_shuffled(rng);
    if shuffled.is_empty() {
        return EpochStats { policy_loss: 0.0, value_loss: 0.0 };
    }

    let mut policy_loss_sum = 0.0;
    let mut value_loss_sum = 0.0;
    let mut num_batches = 0usize;

    for chunk in shuffled.chunks(batch_size) {
        let (policy_loss, value_loss) = train_on_batch(net, optimizer, chunk);
        policy_loss_sum += policy_loss;
        value_loss_sum += value_loss;
        num_batches += 1;
    }

    EpochStats { policy_loss: policy_loss_sum / num_batches as f64, value_loss: value_loss_sum / num_batches as f64 }
}

/// Plays one match between `candidate` and `best`, alternating which side
/// goes first by `game_index` parity, and reports whether the candidate
/// won.
#[allow(clippy::too_many_arguments)]
fn play_match(
    game_index: usize,
    candidate: &AlphaZeroNet,
    best: &AlphaZeroNet,
    space: &ActionSpace,
    search_config: &SearchConfig,
    max_game_moves: usize,
    rng: &mut impl Rng,
) -> bool {
    let candidate_is_player_one = game_index % 2 == 0;

    // `play_episode` fixes a single evaluator for the whole game; a gating
    // match needs to swap evaluators by whose turn it is, so this plays
    // one ply at a time instead of going through that helper.
    let mut state = duel_engine::initial_state();
    let mut move_count = 0usize;
    while !duel_engine::is_terminal(&state) && move_count < max_game_moves {
        let to_play = state.current_player;
        let player_one_turn = to_play == 1;
        let use_candidate = player_one_turn == candidate_is_player_one;
        let evaluator: &AlphaZeroNet = if use_candidate { candidate } else { best };

        let search_policy = crate::mcts::run(&state, space, evaluator, search_config, false, rng);
        let (action_id, _) = crate::policy::choose_action(&search_policy, 0.0, rng);
        let action = *space.from_id(action_id).expect("search only ever selects a registered id");
        state = duel_engine::next_state(&state, action);
        move_count += 1;
    }

    let winner = if duel_engine::is_terminal(&state) {
        state.winner.expect("a finished game always records a winner")
    } else if state.player(1).lp >= state.player(2).lp {
        1
    } else {
        2
    };

    (winner == 1) == candidate_is_player_one
}

pub struct GatingResult {
    pub win_rate: f64,
    pub promoted: bool,
}

/// Plays `games` matches between `candidate` and `best` and reports
/// whether the candidate's win rate clears `gating_threshold`. Does not
/// itself mutate `best` -- the caller owns the evaluator's live parameter
/// set (behind an `ArcSwap`, per the double-buffering contract between
/// search and training) and performs the swap on promotion.
pub fn evaluate_candidate(
    candidate: &AlphaZeroNet,
    best: &AlphaZeroNet,
    space: &ActionSpace,
    search_config: &SearchConfig,
    max_game_moves: usize,
    games: usize,
    gating_threshold: f64,
    rng: &mut impl Rng,
) -> GatingResult {
    let seeds: Vec<u64> = (0..games).map(|_| rng.gen()).collect();
    let wins: usize = seeds
        .into_par_iter()
        .enumerate()
        .map(|(game_index, seed)| {
            let mut local_rng = StdRng::seed_from_u64(seed);
            play_match(game_index, candidate, best, space, search_config, max_game_moves, &mut local_rng)
        })
        .filter(|&won| won)
        .count();
    let win_rate = if games == 0 { 0.0 } else { wins as f64 / games as f64 };
    let promoted = win_rate >= gating_threshold;
    if promoted {
        info!("candidate promoted: win_rate={win_rate:.3} >= threshold={gating_threshold:.3}");
    } else {
        info!("candidate rejected: win_rate={win_rate:.3} < threshold={gating_threshold:.3}");
    }
    GatingResult { win_rate, promoted }
}

/// Runs one full self-play batch (`episodes` episodes against `best`),
/// appending every sample to `replay`, and returns the winners recorded
/// per episode in order (for the history sidecar).
pub fn run_self_play_batch(
    best: &AlphaZeroNet,
    space: &ActionSpace,
    search_config: &SearchConfig,
    temp_opening_moves: usize,
    temperature: f64,
    max_game_moves: usize,
    episodes: usize,
    replay: &mut ReplayBuffer,
    rng: &mut impl Rng,
) -> Vec<u8> {
    let seeds: Vec<u64> = (0..episodes).map(|_| rng.gen()).collect();
    let outcomes: Vec<_> = seeds
        .into_par_iter()
        .map(|seed| {
            let mut local_rng = StdRng::seed_from_u64(seed);
            play_episode(space, best, search_config, temp_opening_moves, temperature, max_game_moves, true, &mut local_rng)
        })
        .collect();

    let mut winners = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        winners.push(outcome.winner);
        replay.extend(outcome.samples);
    }
    debug!("self-play batch winners: {}", winners.iter().join(", "));
    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Sample;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn train_epoch_on_empty_replay_reports_zero_loss() {
        let mut net = AlphaZeroNet::new(4, 8, 3, 1);
        let mut optimizer = Adam::new(&net, 1e-3);
        let replay = ReplayBuffer::new(10);
        let mut rng = StdRng::seed_from_u64(1);

        let stats = train_epoch(&mut net, &mut optimizer, &replay, 4, &mut rng);
        assert_eq!(stats.policy_loss, 0.0);
        assert_eq!(stats.value_loss, 0.0);
    }

    #[test]
    fn train_epoch_processes_all_batches() {
        let mut net = AlphaZeroNet::new(4, 8, 3, 1);
        let mut optimizer = Adam::new(&net, 1e-2);
        let mut replay = ReplayBuffer::new(10);
        for i in 0..7 {
            replay.push(Sample {
                features: vec![i as f64 * 0.1, 0.2, 0.3, 0.4],
                target_policy: vec![1.0, 0.0, 0.0],
                target_value: if i % 2 == 0 { 1.0 } else { -1.0 },
            });
        }
        let mut rng = StdRng::seed_from_u64(2);
        let stats = train_epoch(&mut net, &mut optimizer, &replay, 3, &mut rng);
        assert!(stats.policy_loss.is_finite());
        assert!(stats.value_loss.is_finite());
    }

    #[test]
    fn gating_promotes_candidate_against_itself_at_a_permissive_threshold() {
        let space = ActionSpace::new();
        let candidate = AlphaZeroNet::new(69, 8, space.size(), 7);
        let best = candidate.clone();
        let cfg = SearchConfig { simulations: 2, cpuct: 1.25, dirichlet_alpha: 0.3, dirichlet_eps: 0.0 };
        let mut rng = StdRng::seed_from_u64(4);

        let result = evaluate_candidate(&candidate, &best, &space, &cfg, 10, 4, 0.0, &mut rng);
        assert!(result.promoted);
        assert!(result.win_rate >= 0.0);
    }
}
