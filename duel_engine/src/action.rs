use std::fmt::Display;

use serde_json::json;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    Me,
    Opp,
}

impl Owner {
    fn as_str(self) -> &'static str {
        match self {
            Owner::Me => "me",
            Owner::Opp => "opp",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetType {
    Monster,
    Construct,
}

impl TargetType {
    fn as_str(self) -> &'static str {
        match self {
            TargetType::Monster => "monster",
            TargetType::Construct => "construct",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackTarget {
    Lp,
    Monster(usize),
}

/// A single move. Variants mirror the action descriptor shapes in the
/// external interface exactly; [`Action::to_json`] is the canonical,
/// sorted-key encoding used for hashing and for action-space lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    EndTurn,
    Meta,
    ExperienceDraw,
    Discard { hand_index: usize },
    Place { hand_index: usize, slot: usize },
    PlaySpell { hand_index: usize, owner: Owner, ttype: TargetType, target_slot: usize },
    Summon { pred_slot: usize, out_slot: usize, replace: Option<usize> },
    Attack { attacker_slot: usize, target: AttackTarget },
}

impl Action {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Action::EndTurn => json!({"type": "end_turn"}),
            Action::Meta => json!({"type": "meta"}),
            Action::ExperienceDraw => json!({"type": "experience_draw"}),
            Action::Discard { hand_index } => json!({"type": "discard_card", "hand_index": hand_index}),
            Action::Place { hand_index, slot } => {
                json!({"type": "place_card", "hand_index": hand_index, "slot": slot})
            }
            Action::PlaySpell { hand_index, owner, ttype, target_slot } => json!({
                "type": "play_spell",
                "hand_index": hand_index,
                "target_owner": owner.as_str(),
                "target_type": ttype.as_str(),
                "target_slot": target_slot,
            }),
            Action::Summon { pred_slot, out_slot, replace } => {
                let mut value = json!({"type": "summon", "pred_slot": pred_slot, "out_slot": out_slot});
                if let Some(r) = replace {
                    value["replace_monster_slot"] = json!(r);
                }
                value
            }
            Action::Attack { attacker_slot, target } => match target {
                AttackTarget::Lp => json!({
                    "type": "attack",
                    "attacker_slot": attacker_slot,
                    "target_type": "lp",
                    "target_slot": serde_json::Value::Null,
                }),
                AttackTarget::Monster(slot) => json!({
                    "type": "attack",
                    "attacker_slot": attacker_slot,
                    "target_type": "monster",
                    "target_slot": slot,
                }),
            },
        }
    }

    pub fn canonical_key(&self) -> String {
        serde_json::to_string(&self.to_json()).expect("Value always serializes")
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_key())
    }
}
