use serde::{Deserialize, Serialize};

use crate::rules::{self, Category};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Card {
    Item {
        construct_id: String,
        category: Category,
        short: String,
        avg_r: f64,
    },
    Spell {
        id: String,
    },
}

impl Card {
    pub fn item(construct_id: &str) -> Card {
        let info = rules::construct(construct_id)
            .unwrap_or_else(|| panic!("unknown construct id: {construct_id}"));
        Card::Item {
            construct_id: info.id.to_string(),
            category: info.category,
            short: info.short.to_string(),
            avg_r: info.avg_r,
        }
    }

    pub fn spell(id: &str) -> Card {
        Card::Spell { id: id.to_string() }
    }

    pub fn is_item(&self) -> bool {
        matches!(self, Card::Item { .. })
    }

    pub fn construct_id(&self) -> Option<&str> {
        match self {
            Card::Item { construct_id, .. } => Some(construct_id),
            Card::Spell { .. } => None,
        }
    }

    pub fn spell_id(&self) -> Option<&str> {
        match self {
            Card::Spell { id } => Some(id),
            Card::Item { .. } => None,
        }
    }
}

/// An ordered, nonempty run of item cards sharing a construct id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstructStack {
    pub construct_id: String,
    pub category: Category,
    pub cards: Vec<Card>,
}

impl ConstructStack {
    pub fn from_card(card: &Card) -> ConstructStack {
        let (construct_id, category) = match card {
            Card::Item { construct_id, category, .. } => (construct_id.clone(), *category),
            Card::Spell { .. } => panic!("cannot stack a spell card"),
        };
        ConstructStack { construct_id, category, cards: vec![card.clone()] }
    }

    /// Spearman-Brown corrected reliability of this stack.
    pub fn alpha(&self) -> f64 {
        match self.cards.first() {
            Some(Card::Item { avg_r, .. }) => crate::engine::spearman_brown(self.cards.len() as f64, *avg_r),
            _ => 0.0,
        }
    }
}
