//! Static bijection between [`Action`]s and dense `usize` ids, registered
//! once in a fixed order so ids are stable and reproducible across runs.

use rustc_hash::FxHashMap;

use crate::action::{Action, AttackTarget, Owner, TargetType};
use crate::rules::MAX_HAND_SIZE;

pub struct ActionSpace {
    actions: Vec<Action>,
    ids: FxHashMap<String, usize>,
}

impl ActionSpace {
    pub fn new() -> ActionSpace {
        let mut space = ActionSpace { actions: Vec::new(), ids: FxHashMap::default() };
        space.build();
        space
    }

    fn register(&mut self, action: Action) {
        let key = action.canonical_key();
        self.ids.entry(key).or_insert_with(|| {
            self.actions.push(action);
            self.actions.len() - 1
        });
    }

    fn build(&mut self) {
        self.register(Action::EndTurn);
        self.register(Action::Meta);
        self.register(Action::ExperienceDraw);

        for h in 0..MAX_HAND_SIZE {
            self.register(Action::Discard { hand_index: h });
            for slot in 0..3 {
                self.register(Action::Place { hand_index: h, slot });
            }
            for owner in [Owner::Me, Owner::Opp] {
                for target_slot in 0..3 {
                    self.register(Action::PlaySpell { hand_index: h, owner, ttype: TargetType::Monster, target_slot });
                    self.register(Action::PlaySpell { hand_index: h, owner, ttype: TargetType::Construct, target_slot });
                }
            }
        }

        for pred_slot in 0..3 {
            for out_slot in 0..3 {
                self.register(Action::Summon { pred_slot, out_slot, replace: None });
                for rep in 0..3 {
                    self.register(Action::Summon { pred_slot, out_slot, replace: Some(rep) });
                }
            }
        }

        for attacker_slot in 0..3 {
            self.register(Action::Attack { attacker_slot, target: AttackTarget::Lp });
            for target_slot in 0..3 {
                self.register(Action::Attack { attacker_slot, target: AttackTarget::Monster(target_slot) });
            }
        }
    }

    pub fn size(&self) -> usize {
        self.actions.len()
    }

    pub fn to_id(&self, action: &Action) -> Option<usize> {
        self.ids.get(&action.canonical_key()).copied()
    }

    pub fn from_id(&self, id: usize) -> Option<&Action> {
        self.actions.get(id)
    }

    /// The dense ids of every action in `legal`, silently dropping any action
    /// this space has no registration for (the caller never treats this as
    /// an error — an unregistered move is simply unreachable via the net).
    pub fn legal_ids(&self, legal: &[Action]) -> Vec<usize> {
        legal.iter().filter_map(|a| self.to_id(a)).collect()
    }
}

impl Default for ActionSpace {
    fn default() -> ActionSpace {
        ActionSpace::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_matches_closed_form() {
        let space = ActionSpace::new();
        let expected = 3 + 12 * (1 + 3 + 2 * 3 * 2) + 9 * 4 + 3 * 4;
        assert_eq!(space.size(), expected);
        assert_eq!(space.size(), 243);
    }

    #[test]
    fn ids_are_dense_and_roundtrip() {
        let space = ActionSpace::new();
        for id in 0..space.size() {
            let action = space.from_id(id).expect("dense id");
            assert_eq!(space.to_id(action), Some(id));
        }
    }

    #[test]
    fn registration_order_starts_with_end_turn_meta_experience_draw() {
        let space = ActionSpace::new();
        assert_eq!(space.to_id(&Action::EndTurn), Some(0));
        assert_eq!(space.to_id(&Action::Meta), Some(1));
        assert_eq!(space.to_id(&Action::ExperienceDraw), Some(2));
    }

    #[test]
    fn legal_ids_skips_unregistered_actions_silently() {
        let space = ActionSpace::new();
        let legal = vec![Action::EndTurn, Action::Discard { hand_index: MAX_HAND_SIZE + 1 }];
        let ids = space.legal_ids(&legal);
        assert_eq!(ids, vec![0]);
    }
}
