pub mod action;
pub mod action_space;
pub mod card;
pub mod encoder;
pub mod engine;
pub mod rules;
pub mod state;

pub use action::{Action, AttackTarget, Owner, TargetType};
pub use action_space::ActionSpace;
pub use card::{Card, ConstructStack};
pub use engine::{initial_state, is_terminal, legal_actions, next_state, terminal_value};
pub use state::{GameState, Monster, PlayerZone, Status};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// `legal_actions` must return the same sequence every time it is asked
    /// about an identical state, across many random playouts.
    #[test]
    fn legal_actions_are_deterministic_across_random_playouts() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut s = initial_state();
            for _ in 0..40 {
                if is_terminal(&s) {
                    break;
                }
                let moves = legal_actions(&s);
                assert!(!moves.is_empty());
                let again = legal_actions(&s);
                assert_eq!(moves, again);
                let pick = rng.gen_range(0..moves.len());
                s = next_state(&s, moves[pick]);
            }
        }
    }

    #[test]
    fn every_legal_action_has_a_registered_id() {
        let space = ActionSpace::new();
        let mut rng = StdRng::seed_from_u64(11);
        let mut s = initial_state();
        for _ in 0..30 {
            if is_terminal(&s) {
                break;
            }
            let moves = legal_actions(&s);
            for m in &moves {
                assert!(space.to_id(m).is_some(), "unregistered action: {m:?}");
            }
            let pick = rng.gen_range(0..moves.len());
            s = next_state(&s, moves[pick]);
        }
    }
}
