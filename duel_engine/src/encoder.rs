//! Fixed-length feature encoder: `(state, perspective) -> [f64; FEATURE_LEN]`.
//! The layout is frozen; any change would silently invalidate checkpoints
//! trained against the old length.

use crate::rules::{MAX_HAND_SIZE, STARTING_LP};
use crate::state::{GameState, Monster, PlayerZone};

const CONSTRUCT_SLOTS: usize = 3;
const MONSTER_SLOTS: usize = 3;
const CONSTRUCT_FEATURES: usize = 2;
const MONSTER_FEATURES: usize = 8;
const PER_SIDE_LEN: usize = CONSTRUCT_SLOTS * CONSTRUCT_FEATURES + MONSTER_SLOTS * MONSTER_FEATURES;
const GLOBAL_LEN: usize = 9;

pub const FEATURE_LEN: usize = GLOBAL_LEN + 2 * PER_SIDE_LEN;

// The real starting deck is 56 cards (see `rules::SPELL_COUNTS` +
// `ITEM_CARDS_PER_CONSTRUCT`); the feature layout normalizes by 80 anyway,
// so `deck.len()/STARTING_DECK_SIZE` never actually reaches 1.0.
const STARTING_DECK_SIZE: f64 = 80.0;
const EXPERIENCE_NORM: f64 = 10.0;
const ATK_NORM: f64 = 10000.0;
const N_NORM: f64 = 500.0;

fn f(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn push_monster(out: &mut Vec<f64>, slot: &Option<Monster>) {
    match slot {
        None => out.extend([0.0; MONSTER_FEATURES]),
        Some(m) => out.extend([
            1.0,
            m.atk as f64 / ATK_NORM,
            m.base_n as f64 / N_NORM,
            m.power,
            f(m.summoning_sick),
            f(m.has_job_relevance),
            f(m.item_leakage_applied),
            f(m.correction_applied),
        ]),
    }
}

fn push_side(out: &mut Vec<f64>, side: &PlayerZone) {
    for c in &side.constructs {
        match c {
            None => out.extend([0.0, 0.0]),
            Some(stack) => out.extend([1.0, stack.cards.len() as f64 / 3.0]),
        }
    }
    for m in &side.monsters {
        push_monster(out, m);
    }
}

/// Encodes `state` from `perspective`'s point of view (1 or 2).
pub fn encode(state: &GameState, perspective: u8) -> Vec<f64> {
    let opponent = GameState::opponent_of(perspective);
    let me = state.player(perspective);
    let opp = state.player(opponent);

    let mut out = Vec::with_capacity(FEATURE_LEN);
    out.push(me.lp as f64 / STARTING_LP as f64);
    out.push(opp.lp as f64 / STARTING_LP as f64);
    out.push(me.hand.len() as f64 / MAX_HAND_SIZE as f64);
    out.push(opp.hand.len() as f64 / MAX_HAND_SIZE as f64);
    out.push(me.deck.len() as f64 / STARTING_DECK_SIZE);
    out.push(opp.deck.len() as f64 / STARTING_DECK_SIZE);
    out.push(me.experience_tokens as f64 / EXPERIENCE_NORM);
    out.push(opp.experience_tokens as f64 / EXPERIENCE_NORM);
    out.push(f(state.current_player == perspective));

    push_side(&mut out, me);
    push_side(&mut out, opp);

    debug_assert_eq!(out.len(), FEATURE_LEN);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::initial_state;

    #[test]
    fn feature_len_is_sixty_nine() {
        assert_eq!(FEATURE_LEN, 69);
    }

    #[test]
    fn encoding_has_fixed_length_for_both_perspectives() {
        let s = initial_state();
        assert_eq!(encode(&s, 1).len(), FEATURE_LEN);
        assert_eq!(encode(&s, 2).len(), FEATURE_LEN);
    }

    #[test]
    fn current_player_flag_flips_with_perspective() {
        let s = initial_state();
        let mine = encode(&s, 1);
        let theirs = encode(&s, 2);
        assert_eq!(mine[8], 1.0);
        assert_eq!(theirs[8], 0.0);
    }

    #[test]
    fn starting_lp_ratio_is_one() {
        let s = initial_state();
        let v = encode(&s, 1);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[1], 1.0);
    }
}
