use serde::{Deserialize, Serialize};

use crate::card::{Card, ConstructStack};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Monster {
    pub pred_id: String,
    pub out_id: String,
    pub pred_alpha: f64,
    pub out_alpha: f64,
    pub r_true: f64,
    pub base_n: i64,
    pub n: i64,
    pub r_obs: f64,
    pub base_atk: i64,
    pub atk: i64,
    pub power: f64,
    pub attacks_made: u32,
    pub max_attacks: u32,
    pub summoning_sick: bool,
    pub adverse_impact: f64,
    pub adverse_stars: u8,
    pub requires_job_relevance: bool,
    pub has_job_relevance: bool,
    pub has_imputation: bool,
    pub has_p_hacking: bool,
    pub has_practice_effect: bool,
    pub item_leakage_applied: bool,
    pub correction_applied: bool,
    pub range_restriction_stacks: u32,
    pub validity_multiplier: f64,
    pub is_meta: bool,
}

impl Monster {
    pub fn can_attack(&self) -> bool {
        if self.summoning_sick || self.attacks_made >= self.max_attacks {
            return false;
        }
        !self.requires_job_relevance || self.has_job_relevance
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerZone {
    pub lp: i64,
    pub deck: Vec<Card>,
    pub hand: Vec<Card>,
    pub constructs: [Option<ConstructStack>; 3],
    pub monsters: [Option<Monster>; 3],
    pub summoned: bool,
    pub experience_tokens: u32,
    pub pending_discard: u32,
}

impl PlayerZone {
    pub fn empty() -> PlayerZone {
        PlayerZone {
            lp: crate::rules::STARTING_LP,
            deck: Vec::new(),
            hand: Vec::new(),
            constructs: [None, None, None],
            monsters: [None, None, None],
            summoned: false,
            experience_tokens: 0,
            pending_discard: 0,
        }
    }

    pub fn first_empty_monster_slot(&self) -> Option<usize> {
        self.monsters.iter().position(|m| m.is_none())
    }

    pub fn has_monsters(&self) -> bool {
        self.monsters.iter().any(|m| m.is_some())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Active,
    Finished,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    pub status: Status,
    pub current_player: u8,
    pub winner: Option<u8>,
    pub players: [PlayerZone; 2],
}

impl GameState {
    /// 1-indexed accessor (players are numbered 1 and 2).
    pub fn player(&self, n: u8) -> &PlayerZone {
        &self.players[(n - 1) as usize]
    }

    pub fn player_mut(&mut self, n: u8) -> &mut PlayerZone {
        &mut self.players[(n - 1) as usize]
    }

    pub fn opponent_of(n: u8) -> u8 {
        if n == 1 {
            2
        } else {
            1
        }
    }

    /// Canonical sorted-key, compact-separator JSON form used for replay identity.
    ///
    /// Round-tripping through `serde_json::Value` (backed by a `BTreeMap` when the
    /// `preserve_order` feature is off) is what gives us alphabetically sorted keys;
    /// serializing the struct directly would emit fields in declaration order.
    pub fn canonical_key(&self) -> String {
        let value = serde_json::to_value(self).expect("GameState always serializes");
        serde_json::to_string(&value).expect("Value always serializes")
    }
}
