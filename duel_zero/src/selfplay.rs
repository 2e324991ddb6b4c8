//! One self-play episode: search, temperature-sampled move, record,
//! repeat until terminal or the `maxGameMoves` safety bound, then label
//! every recorded sample with the eventual outcome.

use duel_engine::{encoder, initial_state, is_terminal, next_state, ActionSpace};
use log::debug;
use rand::Rng;

use crate::evaluator::{Evaluator, Sample};
use crate::mcts::{self, SearchConfig};
use crate::policy::{choose_action, effective_temperature};

pub struct EpisodeOutcome {
    pub samples: Vec<Sample>,
    pub winner: u8,
    pub moves_played: usize,
}

/// `add_root_noise` distinguishes training self-play (always `true`) from
/// a deterministic gating match (always `false`, with `search_config`'s
/// `dirichlet_eps` meaningless either way since the noise branch is
/// skipped entirely).
#[allow(clippy::too_many_arguments)]
pub fn play_episode(
    space: &ActionSpace,
    evaluator: &dyn Evaluator,
    search_config: &SearchConfig,
    temp_opening_moves: usize,
    temperature: f64,
    max_game_moves: usize,
    add_root_noise: bool,
    rng: &mut impl Rng,
) -> EpisodeOutcome {
    let mut state = initial_state();
    let mut move_count = 0usize;
    let mut recorded: Vec<(Vec<f64>, Vec<f64>, u8)> = Vec::new();

    while !is_terminal(&state) && move_count < max_game_moves {
        let to_play = state.current_player;
        let features = encoder::encode(&state, to_play);

        let search_policy = mcts::run(&state, space, evaluator, search_config, add_root_noise, rng);

        let tau = if add_root_noise {
            effective_temperature(move_count, temp_opening_moves, temperature)
        } else {
            0.0
        };
        let (action_id, stored_policy) = choose_action(&search_policy, tau, rng);

        recorded.push((features, stored_policy, to_play));

        let action = *space.from_id(action_id).expect("search only ever selects a registered id");
        state = next_state(&state, action);
        move_count += 1;
    }

    let winner = if is_terminal(&state) {
        state.winner.expect("a finished game always records a winner")
    } else if state.player(1).lp >= state.player(2).lp {
        1
    } else {
        2
    };

    debug!("episode finished after {move_count} moves, winner={winner}");

    let samples = recorded
        .into_iter()
        .map(|(features, target_policy, to_play)| {
            let target_value = if to_play == winner { 1.0 } else { -1.0 };
            Sample { features, target_policy, target_value }
        })
        .collect();

    EpisodeOutcome { samples, winner, moves_played: move_count }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::UniformEvaluator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn episode_terminates_and_labels_every_sample_plus_or_minus_one() {
        let space = ActionSpace::new();
        let evaluator = UniformEvaluator { num_actions: space.size() };
        let cfg = SearchConfig { simulations: 4, cpuct: 1.25, dirichlet_alpha: 0.3, dirichlet_eps: 0.25 };
        let mut rng = StdRng::seed_from_u64(13);

        let outcome = play_episode(&space, &evaluator, &cfg, 12, 1.0, 30, true, &mut rng);

        assert!(outcome.moves_played <= 30);
        assert!(outcome.winner == 1 || outcome.winner == 2);
        for sample in &outcome.samples {
            assert!(sample.target_value == 1.0 || sample.target_value == -1.0);
            let sum: f64 = sample.target_policy.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn deterministic_gating_style_episode_has_no_root_noise_randomness() {
        let space = ActionSpace::new();
        let evaluator = UniformEvaluator { num_actions: space.size() };
        let cfg = SearchConfig { simulations: 4, cpuct: 1.25, dirichlet_alpha: 0.3, dirichlet_eps: 0.0 };

        let mut rng_a = StdRng::seed_from_u64(99);
        let outcome_a = play_episode(&space, &evaluator, &cfg, 12, 1.0, 20, false, &mut rng_a);
        let mut rng_b = StdRng::seed_from_u64(99);
        let outcome_b = play_episode(&space, &evaluator, &cfg, 12, 1.0, 20, false, &mut rng_b);

        assert_eq!(outcome_a.winner, outcome_b.winner);
        assert_eq!(outcome_a.moves_played, outcome_b.moves_played);
    }
}
