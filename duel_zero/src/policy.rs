//! Converts a search policy into a sampled move: temperature annealing,
//! defensive renormalization, and argmax for near-zero temperature.

use rand::Rng;

const ARGMAX_TEMPERATURE_FLOOR: f64 = 1e-6;
const LATE_GAME_TEMPERATURE: f64 = 0.1;

/// `m` is the move index within the current episode (0-based).
pub fn effective_temperature(m: usize, temp_opening_moves: usize, temperature: f64) -> f64 {
    if m < temp_opening_moves {
        temperature
    } else {
        LATE_GAME_TEMPERATURE
    }
}

fn renormalize_defensively(policy: &[f64]) -> Vec<f64> {
    let sum: f64 = policy.iter().sum();
    if sum <= 0.0 {
        let n = policy.len() as f64;
        return vec![1.0 / n; policy.len()];
    }
    policy.iter().map(|p| p / sum).collect()
}

/// Samples an action id from `search_policy`, and returns `(action_id,
/// stored_policy)` where `stored_policy` is the distribution recorded as
/// the training target -- the tempered distribution, or a one-hot at
/// argmax when `tau` collapses to a deterministic choice.
pub fn choose_action(search_policy: &[f64], tau: f64, rng: &mut impl Rng) -> (usize, Vec<f64>) {
    let policy = renormalize_defensively(search_policy);

    if tau <= ARGMAX_TEMPERATURE_FLOOR {
        let best = policy
            .iter()
            .enumerate()
            .fold((0usize, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc })
            .0;
        let mut one_hot = vec![0.0; policy.len()];
        one_hot[best] = 1.0;
        return (best, one_hot);
    }

    let exponent = 1.0 / tau;
    let raised: Vec<f64> = policy.iter().map(|p| (p + 1e-12).powf(exponent)).collect();
    let sum: f64 = raised.iter().sum();
    let tempered: Vec<f64> = raised.iter().map(|p| p / sum).collect();

    let mut roll: f64 = rng.gen();
    let mut chosen = tempered.len() - 1;
    for (i, &p) in tempered.iter().enumerate() {
        if roll < p {
            chosen = i;
            break;
        }
        roll -= p;
    }
    (chosen, tempered)
}
