//! Static rule tables: constructs, validity/adverse-impact matrices, deck
//! composition, and spell targeting classes. Nothing here ever changes at
//! runtime.

pub const MAX_HAND_SIZE: usize = 12;
pub const STARTING_HAND_SIZE: usize = 12;
pub const EXPERIENCE_MISS_THRESHOLD: u32 = 4;
pub const EXPERIENCE_DRAW_COUNT: usize = 3;
pub const STARTING_LP: i64 = 8000;

/// Sentinel construct id used by meta monsters; never present in [`CONSTRUCTS`].
pub const META: &str = "META";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Category {
    Predictor,
    Outcome,
}

pub struct ConstructInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub short: &'static str,
    pub avg_r: f64,
}

pub const CONSTRUCTS: &[ConstructInfo] = &[
    ConstructInfo { id: "cog_ability", name: "Cognitive Ability", category: Category::Predictor, short: "COG", avg_r: 0.65 },
    ConstructInfo { id: "conscient", name: "Conscientiousness", category: Category::Predictor, short: "CON", avg_r: 0.45 },
    ConstructInfo { id: "struct_int", name: "Struct. Interview", category: Category::Predictor, short: "INT", avg_r: 0.55 },
    ConstructInfo { id: "work_sample", name: "Work Sample", category: Category::Predictor, short: "WST", avg_r: 0.50 },
    ConstructInfo { id: "job_perf", name: "Job Performance", category: Category::Outcome, short: "PERF", avg_r: 0.52 },
    ConstructInfo { id: "turnover", name: "Turnover", category: Category::Outcome, short: "TURN", avg_r: 0.40 },
    ConstructInfo { id: "job_sat", name: "Job Satisfaction", category: Category::Outcome, short: "SAT", avg_r: 0.48 },
    ConstructInfo { id: "ocb", name: "OCB", category: Category::Outcome, short: "OCB", avg_r: 0.44 },
];

pub fn construct(id: &str) -> Option<&'static ConstructInfo> {
    CONSTRUCTS.iter().find(|c| c.id == id)
}

const TRUE_VALIDITY: &[(&str, &str, f64)] = &[
    ("cog_ability", "job_perf", 0.51), ("cog_ability", "turnover", 0.20), ("cog_ability", "job_sat", 0.15), ("cog_ability", "ocb", 0.12),
    ("conscient", "job_perf", 0.31), ("conscient", "turnover", 0.26), ("conscient", "job_sat", 0.25), ("conscient", "ocb", 0.30),
    ("struct_int", "job_perf", 0.51), ("struct_int", "turnover", 0.22), ("struct_int", "job_sat", 0.18), ("struct_int", "ocb", 0.15),
    ("work_sample", "job_perf", 0.54), ("work_sample", "turnover", 0.15), ("work_sample", "job_sat", 0.12), ("work_sample", "ocb", 0.10),
];

const ADVERSE_IMPACT_BWD: &[(&str, &str, f64)] = &[
    ("cog_ability", "job_perf", 0.95), ("cog_ability", "turnover", 0.60), ("cog_ability", "job_sat", 0.58), ("cog_ability", "ocb", 0.55),
    ("conscient", "job_perf", 0.20), ("conscient", "turnover", 0.05), ("conscient", "job_sat", 0.05), ("conscient", "ocb", 0.05),
    ("struct_int", "job_perf", 0.35), ("struct_int", "turnover", 0.22), ("struct_int", "job_sat", 0.22), ("struct_int", "ocb", 0.22),
    ("work_sample", "job_perf", 0.55), ("work_sample", "turnover", 0.40), ("work_sample", "job_sat", 0.40), ("work_sample", "ocb", 0.40),
];

pub fn true_validity(pred_id: &str, out_id: &str) -> f64 {
    TRUE_VALIDITY
        .iter()
        .find(|(p, o, _)| *p == pred_id && *o == out_id)
        .map(|(_, _, v)| *v)
        .unwrap_or(0.10)
}

pub fn adverse_impact_bwd(pred_id: &str, out_id: &str) -> f64 {
    ADVERSE_IMPACT_BWD
        .iter()
        .find(|(p, o, _)| *p == pred_id && *o == out_id)
        .map(|(_, _, v)| *v)
        .unwrap_or(0.30)
}

/// Spell ids and the count of each contributed to the deck, in table order.
pub const SPELL_COUNTS: &[(&str, u32)] = &[
    ("sample_size", 3),
    ("job_relevance", 4),
    ("imputation", 1),
    ("missing_data", 1),
    ("range_restrict", 2),
    ("item_leakage", 2),
    ("correction", 2),
    ("p_hacking", 1),
    ("practice_effect", 2),
    ("bootstrapping", 2),
    ("item_analysis", 2),
    ("construct_drift", 1),
    ("criterion_contam", 1),
];

/// Item cards contributed per construct; fixed at 4 for every construct.
pub const ITEM_CARDS_PER_CONSTRUCT: u32 = 4;

pub const TARGETING_MONSTER_SPELLS: &[&str] = &[
    "sample_size", "job_relevance", "imputation", "p_hacking", "practice_effect",
    "range_restrict", "item_leakage", "correction", "bootstrapping", "criterion_contam",
];

pub const TARGETING_CONSTRUCT_SPELLS: &[&str] = &["missing_data", "construct_drift", "item_analysis"];

pub fn is_monster_targeting(spell_id: &str) -> bool {
    TARGETING_MONSTER_SPELLS.contains(&spell_id)
}

pub fn is_construct_targeting(spell_id: &str) -> bool {
    TARGETING_CONSTRUCT_SPELLS.contains(&spell_id)
}
