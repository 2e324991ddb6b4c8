//! The deterministic transition relation: legal-action enumeration, the
//! per-action transition function, and the derived-statistics refresh rule.
//! Every public function here is a pure function of its inputs.

use log::trace;

use crate::action::{Action, AttackTarget, Owner, TargetType};
use crate::card::{Card, ConstructStack};
use crate::rules::{self, Category};
use crate::state::{GameState, Monster, PlayerZone, Status};

pub fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// Matches Python's `round()`: round-half-to-even, not half-away-from-zero.
/// Several of the fixture traces in the test suite only hold under this rule.
pub fn round_half_even(x: f64) -> i64 {
    let floor = x.floor();
    let diff = x - floor;
    let floor_i = floor as i64;
    if diff < 0.5 {
        floor_i
    } else if diff > 0.5 {
        floor_i + 1
    } else if floor_i % 2 == 0 {
        floor_i
    } else {
        floor_i + 1
    }
}

pub fn spearman_brown(k: f64, avg_r: f64) -> f64 {
    (k * avg_r) / (1.0 + (k - 1.0) * avg_r)
}

pub fn adverse_stars(raw_bwd: f64) -> u8 {
    let d = raw_bwd.abs();
    if d <= 0.10 {
        5
    } else if d <= 0.25 {
        4
    } else if d <= 0.45 {
        3
    } else if d <= 0.65 {
        2
    } else {
        1
    }
}

/// Validity a monster observes from its source stacks' reliabilities, before
/// any modifier multiplier is applied. Used by [`refresh_monster`] at
/// summon time and on every later recompute.
pub fn observed_validity(rho: f64, alpha_pred: f64, alpha_out: f64) -> f64 {
    rho * (alpha_pred.max(0.05) * alpha_out.max(0.05)).sqrt()
}

pub fn approx_power(r_obs: f64, n: i64) -> f64 {
    let r = clamp(r_obs.abs(), 0.0, 0.999999);
    let n = n.max(4) as f64;
    clamp(0.05 + 0.94 * r * ((n - 3.0) / n), 0.05, 0.99)
}

/// Recomputes a monster's derived fields in place. Meta monsters only have
/// their power re-clamped; everything else is immutable after construction.
pub fn refresh_monster(m: &mut Monster) {
    if m.is_meta {
        m.power = clamp(m.power, 0.7, 0.99);
        return;
    }
    let effective_mult = if m.item_leakage_applied { 0.0 } else { m.validity_multiplier.max(0.0) };
    m.r_obs = observed_validity(m.r_true, m.pred_alpha, m.out_alpha) * effective_mult;
    m.base_atk = round_half_even(m.r_obs.abs() * 10000.0);
    let correction_base = round_half_even(m.r_true.abs() * effective_mult * 10000.0);
    let mut atk = if m.correction_applied { correction_base } else { m.base_atk };
    for _ in 0..m.range_restriction_stacks {
        atk = round_half_even(atk as f64 / 2.0);
    }
    m.atk = atk;
    m.power = approx_power(m.atk.abs() as f64 / 10000.0, m.n);
}

pub fn build_monster(pred: &ConstructStack, out: &ConstructStack) -> Monster {
    let rho = rules::true_validity(&pred.construct_id, &out.construct_id);
    let bwd = rules::adverse_impact_bwd(&pred.construct_id, &out.construct_id);
    let stars = adverse_stars(bwd);
    let mut m = Monster {
        pred_id: pred.construct_id.clone(),
        out_id: out.construct_id.clone(),
        pred_alpha: pred.alpha(),
        out_alpha: out.alpha(),
        r_true: rho,
        base_n: 50,
        n: 50,
        r_obs: 0.0,
        base_atk: 0,
        atk: 0,
        power: 0.1,
        attacks_made: 0,
        max_attacks: 1,
        summoning_sick: true,
        adverse_impact: bwd,
        adverse_stars: stars,
        requires_job_relevance: stars <= 3,
        has_job_relevance: false,
        has_imputation: false,
        has_p_hacking: false,
        has_practice_effect: false,
        item_leakage_applied: false,
        correction_applied: false,
        range_restriction_stacks: 0,
        validity_multiplier: 1.0,
        is_meta: false,
    };
    refresh_monster(&mut m);
    m
}

pub fn build_meta_monster(monsters: &[&Monster]) -> Monster {
    let mean_r = monsters.iter().map(|m| m.r_obs.abs()).sum::<f64>() / monsters.len() as f64;
    let r_true = clamp(mean_r * 1.35, 0.35, 0.95);
    let combined_n: i64 = monsters.iter().map(|m| m.base_n).sum();
    let base_atk = round_half_even(r_true.abs() * 10000.0);
    Monster {
        pred_id: rules::META.to_string(),
        out_id: rules::META.to_string(),
        pred_alpha: 0.99,
        out_alpha: 0.99,
        r_true,
        base_n: combined_n,
        n: combined_n,
        r_obs: r_true,
        base_atk,
        atk: base_atk,
        power: clamp(0.9 + combined_n as f64 / 1000.0, 0.9, 0.99),
        attacks_made: 0,
        max_attacks: 1,
        summoning_sick: false,
        adverse_impact: 0.0,
        adverse_stars: 5,
        requires_job_relevance: false,
        has_job_relevance: false,
        has_imputation: false,
        has_p_hacking: false,
        has_practice_effect: false,
        item_leakage_applied: false,
        correction_applied: false,
        range_restriction_stacks: 0,
        validity_multiplier: 1.0,
        is_meta: true,
    }
}

fn can_meta(player: &PlayerZone) -> bool {
    let m = &player.monsters;
    if m[0].is_none() || m[1].is_none() || m[2].is_none() {
        return false;
    }
    let m0 = m[0].as_ref().unwrap();
    let same_pred = m0.pred_id != rules::META && m.iter().all(|x| x.as_ref().unwrap().pred_id == m0.pred_id);
    let same_out = m0.out_id != rules::META && m.iter().all(|x| x.as_ref().unwrap().out_id == m0.out_id);
    same_pred || same_out
}

fn build_starting_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(56);
    for info in rules::CONSTRUCTS {
        for _ in 0..rules::ITEM_CARDS_PER_CONSTRUCT {
            deck.push(Card::item(info.id));
        }
    }
    for (id, count) in rules::SPELL_COUNTS {
        for _ in 0..*count {
            deck.push(Card::spell(id));
        }
    }
    deck
}

fn draw_cards(player: &mut PlayerZone, n: usize, allow_overflow: bool) {
    for _ in 0..n {
        if !allow_overflow && player.hand.len() >= rules::MAX_HAND_SIZE {
            break;
        }
        match player.deck.pop() {
            Some(card) => player.hand.push(card),
            None => break,
        }
    }
}

fn enforce_hand_limit(player: &mut PlayerZone) {
    player.pending_discard = player.hand.len().saturating_sub(rules::MAX_HAND_SIZE) as u32;
}

pub fn initial_state() -> GameState {
    let mut p1 = PlayerZone::empty();
    let mut p2 = PlayerZone::empty();
    p1.deck = build_starting_deck();
    p2.deck = build_starting_deck();
    draw_cards(&mut p1, rules::STARTING_HAND_SIZE, false);
    draw_cards(&mut p2, rules::STARTING_HAND_SIZE, false);
    GameState { status: Status::Active, current_player: 1, winner: None, players: [p1, p2] }
}

/// Deterministic, ordered enumeration of every legal action from `state`.
pub fn legal_actions(state: &GameState) -> Vec<Action> {
    if state.status == Status::Finished {
        return Vec::new();
    }
    let pid = state.current_player;
    let oid = GameState::opponent_of(pid);
    let p = state.player(pid);
    let mut moves = Vec::new();

    if p.pending_discard > 0 {
        for i in 0..p.hand.len() {
            moves.push(Action::Discard { hand_index: i });
        }
        return moves;
    }

    for (h, card) in p.hand.iter().enumerate() {
        match card {
            Card::Item { construct_id, .. } => {
                for slot in 0..3 {
                    match &p.constructs[slot] {
                        Some(stack) if stack.construct_id != *construct_id || stack.cards.len() >= 3 => continue,
                        _ => moves.push(Action::Place { hand_index: h, slot }),
                    }
                }
            }
            Card::Spell { id } => {
                if rules::is_monster_targeting(id) {
                    for (owner, arr) in [(Owner::Me, &state.player(pid).monsters), (Owner::Opp, &state.player(oid).monsters)] {
                        for (ts, m) in arr.iter().enumerate() {
                            if m.is_some() {
                                moves.push(Action::PlaySpell { hand_index: h, owner, ttype: TargetType::Monster, target_slot: ts });
                            }
                        }
                    }
                }
                if rules::is_construct_targeting(id) {
                    for (owner, arr) in [(Owner::Me, &state.player(pid).constructs), (Owner::Opp, &state.player(oid).constructs)] {
                        for (ts, c) in arr.iter().enumerate() {
                            if c.is_some() {
                                moves.push(Action::PlaySpell { hand_index: h, owner, ttype: TargetType::Construct, target_slot: ts });
                            }
                        }
                    }
                }
            }
        }
    }

    if p.experience_tokens >= rules::EXPERIENCE_MISS_THRESHOLD && !p.deck.is_empty() {
        moves.push(Action::ExperienceDraw);
    }

    if !p.summoned {
        let open = p.first_empty_monster_slot();
        for pred_slot in 0..3 {
            for out_slot in 0..3 {
                if open.is_some() {
                    moves.push(Action::Summon { pred_slot, out_slot, replace: None });
                } else {
                    for r in 0..3 {
                        if p.monsters[r].is_some() {
                            moves.push(Action::Summon { pred_slot, out_slot, replace: Some(r) });
                        }
                    }
                }
            }
        }
    }

    if can_meta(p) {
        moves.push(Action::Meta);
    }

    let opponent_has_monsters = state.player(oid).has_monsters();
    for (a, m) in p.monsters.iter().enumerate() {
        let Some(m) = m else { continue };
        if !m.can_attack() {
            continue;
        }
        if !opponent_has_monsters {
            moves.push(Action::Attack { attacker_slot: a, target: AttackTarget::Lp });
        }
        for (t, d) in state.player(oid).monsters.iter().enumerate() {
            if d.is_some() {
                moves.push(Action::Attack { attacker_slot: a, target: AttackTarget::Monster(t) });
            }
        }
    }

    moves.push(Action::EndTurn);
    moves
}

fn mark_game_over(state: &mut GameState) {
    let p1_lp = state.player(1).lp;
    let p2_lp = state.player(2).lp;
    if p1_lp <= 0 || p2_lp <= 0 {
        state.status = Status::Finished;
        state.winner = Some(if p1_lp > 0 { 1 } else { 2 });
        trace!("game finished, winner player {}", state.winner.unwrap());
    }
}

/// Applies `action` to a clone of `state`, returning the resulting state.
/// If `state` is already finished, returns an identical clone unchanged.
pub fn next_state(state: &GameState, action: Action) -> GameState {
    let mut s = state.clone();
    if s.status == Status::Finished {
        return s;
    }

    let pid = s.current_player;
    let oid = GameState::opponent_of(pid);

    match action {
        Action::Place { hand_index, slot } => {
            if hand_index >= s.player(pid).hand.len() || !s.player(pid).hand[hand_index].is_item() {
                return s;
            }
            let placed = s.player_mut(pid).hand.remove(hand_index);
            let me = s.player_mut(pid);
            match &mut me.constructs[slot] {
                None => me.constructs[slot] = Some(ConstructStack::from_card(&placed)),
                Some(stack) => stack.cards.push(placed),
            }
        }

        Action::Discard { hand_index } => {
            let me = s.player_mut(pid);
            if hand_index < me.hand.len() {
                me.hand.remove(hand_index);
                me.pending_discard = me.pending_discard.saturating_sub(1);
            }
        }

        Action::ExperienceDraw => {
            let me = s.player_mut(pid);
            me.experience_tokens = me.experience_tokens.saturating_sub(rules::EXPERIENCE_MISS_THRESHOLD);
            draw_cards(me, rules::EXPERIENCE_DRAW_COUNT, true);
            enforce_hand_limit(me);
        }

        Action::Summon { pred_slot, out_slot, replace } => {
            let me = s.player_mut(pid);
            let valid = pred_slot != out_slot
                && matches!(&me.constructs[pred_slot], Some(st) if st.category == Category::Predictor)
                && matches!(&me.constructs[out_slot], Some(st) if st.category == Category::Outcome);
            if valid {
                let pred = me.constructs[pred_slot].clone().unwrap();
                let out = me.constructs[out_slot].clone().unwrap();
                let monster = build_monster(&pred, &out);
                me.constructs[pred_slot] = None;
                me.constructs[out_slot] = None;
                let mslot = me.first_empty_monster_slot().unwrap_or_else(|| replace.unwrap_or(0));
                me.monsters[mslot] = Some(monster);
                me.summoned = true;
            }
        }

        Action::PlaySpell { hand_index, owner, ttype, target_slot } => {
            apply_spell(&mut s, pid, oid, hand_index, owner, ttype, target_slot);
        }

        Action::Attack { attacker_slot, target } => {
            apply_attack(&mut s, pid, oid, attacker_slot, target);
        }

        Action::Meta => {
            let me = s.player_mut(pid);
            if can_meta(me) {
                let mats: Vec<Monster> = me.monsters.iter_mut().map(|m| m.take().unwrap()).collect();
                let refs: Vec<&Monster> = mats.iter().collect();
                let meta = build_meta_monster(&refs);
                me.monsters[0] = Some(meta);
            }
        }

        Action::EndTurn => apply_end_turn(&mut s, pid, oid),
    }

    mark_game_over(&mut s);
    s
}

fn apply_spell(s: &mut GameState, pid: u8, oid: u8, hand_index: usize, owner: Owner, ttype: TargetType, target_slot: usize) {
    let me_hand_len = s.player(pid).hand.len();
    if hand_index >= me_hand_len {
        return;
    }
    let card = s.player_mut(pid).hand.remove(hand_index);
    let Card::Spell { id: spell_id } = card else { return };

    let owner_pid = match owner {
        Owner::Me => pid,
        Owner::Opp => oid,
    };
    let is_me = matches!(owner, Owner::Me);

    match ttype {
        TargetType::Monster => {
            if target_slot >= 3 || s.player(owner_pid).monsters[target_slot].is_none() {
                return;
            }
            match spell_id.as_str() {
                "sample_size" => {
                    let m = s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap();
                    m.n = clamp(m.n as f64 + 150.0, 50.0, 420.0) as i64;
                    refresh_monster(m);
                }
                "job_relevance" if is_me => {
                    s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap().has_job_relevance = true;
                }
                "imputation" if is_me => {
                    s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap().has_imputation = true;
                }
                "p_hacking" if is_me => {
                    s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap().has_p_hacking = true;
                }
                "practice_effect" => {
                    s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap().has_practice_effect = true;
                }
                "missing_data" => {
                    let m = s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap();
                    if m.has_imputation {
                        m.has_imputation = false;
                    } else {
                        s.player_mut(owner_pid).monsters[target_slot] = None;
                    }
                }
                "range_restrict" if !is_me => {
                    let m = s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap();
                    m.range_restriction_stacks += 1;
                    refresh_monster(m);
                }
                "item_leakage" if !is_me => {
                    let m = s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap();
                    m.item_leakage_applied = true;
                    refresh_monster(m);
                }
                "correction" if is_me => {
                    let m = s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap();
                    m.correction_applied = true;
                    m.range_restriction_stacks = 0;
                    refresh_monster(m);
                }
                "bootstrapping" if is_me => {
                    let m = s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap();
                    m.base_n += 50;
                    m.n += 50;
                    refresh_monster(m);
                }
                "criterion_contam" if !is_me => {
                    let m = s.player_mut(owner_pid).monsters[target_slot].as_mut().unwrap();
                    m.n = (m.n / 2).max(1);
                    m.base_n = (m.base_n / 2).max(1);
                    refresh_monster(m);
                }
                _ => {}
            }
        }
        TargetType::Construct => {
            if target_slot >= 3 || s.player(owner_pid).constructs[target_slot].is_none() {
                return;
            }
            match spell_id.as_str() {
                "missing_data" => {
                    let stack = s.player_mut(owner_pid).constructs[target_slot].as_mut().unwrap();
                    if stack.cards.len() > 1 {
                        stack.cards.pop();
                    } else {
                        s.player_mut(owner_pid).constructs[target_slot] = None;
                    }
                }
                "item_analysis" if is_me => {
                    let stack = s.player_mut(owner_pid).constructs[target_slot].as_mut().unwrap();
                    if stack.cards.len() < 3 {
                        let last = stack.cards.last().unwrap().clone();
                        stack.cards.push(last);
                    }
                }
                "construct_drift" if !is_me => {
                    let stack = s.player_mut(owner_pid).constructs[target_slot].as_mut().unwrap();
                    if stack.cards.len() > 1 {
                        stack.cards.pop();
                    } else {
                        s.player_mut(owner_pid).constructs[target_slot] = None;
                    }
                }
                _ => {}
            }
        }
    }
}

fn apply_attack(s: &mut GameState, pid: u8, oid: u8, attacker_slot: usize, target: AttackTarget) {
    if s.player(pid).monsters[attacker_slot].is_none() {
        return;
    }
    s.player_mut(pid).monsters[attacker_slot].as_mut().unwrap().attacks_made += 1;
    let atk = s.player(pid).monsters[attacker_slot].as_ref().unwrap().atk;

    match target {
        AttackTarget::Lp => {
            let opp = s.player_mut(oid);
            opp.lp = (opp.lp - atk).max(0);
        }
        AttackTarget::Monster(target_slot) => {
            if let Some(defender) = s.player(oid).monsters[target_slot].clone() {
                if atk > defender.atk {
                    let diff = atk - defender.atk;
                    let opp = s.player_mut(oid);
                    opp.lp = (opp.lp - diff).max(0);
                    opp.monsters[target_slot] = None;
                } else if atk < defender.atk {
                    let diff = defender.atk - atk;
                    let me = s.player_mut(pid);
                    me.lp = (me.lp - diff).max(0);
                    me.monsters[attacker_slot] = None;
                } else {
                    s.player_mut(pid).monsters[attacker_slot] = None;
                    s.player_mut(oid).monsters[target_slot] = None;
                }
            }
        }
    }

    if let Some(attacker) = s.player(pid).monsters[attacker_slot].as_ref() {
        if attacker.has_p_hacking {
            s.player_mut(pid).monsters[attacker_slot] = None;
        }
    }
}

fn apply_end_turn(s: &mut GameState, pid: u8, oid: u8) {
    trace!("player {pid} ends turn, passing to player {oid}");
    for m in s.player_mut(pid).monsters.iter_mut().flatten() {
        m.correction_applied = false;
        m.item_leakage_applied = false;
        refresh_monster(m);
    }
    s.current_player = oid;
    let np = s.player_mut(oid);
    np.summoned = false;
    draw_cards(np, 1, true);
    enforce_hand_limit(np);
    for m in s.player_mut(oid).monsters.iter_mut().flatten() {
        m.summoning_sick = false;
        m.attacks_made = 0;
        m.max_attacks = 1;
        refresh_monster(m);
    }
}

pub fn is_terminal(state: &GameState) -> bool {
    state.status == Status::Finished
}

pub fn terminal_value(state: &GameState, player: u8) -> i32 {
    if !is_terminal(state) {
        return 0;
    }
    match state.winner {
        Some(w) if w == player => 1,
        Some(_) => -1,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hand_of(cards: Vec<Card>) -> Vec<Card> {
        cards
    }

    #[test]
    fn end_turn_is_always_legal_and_toggles_player() {
        let s = initial_state();
        let acts = legal_actions(&s);
        assert!(acts.contains(&Action::EndTurn));
        let s2 = next_state(&s, Action::EndTurn);
        assert_eq!(s2.current_player, 2);
    }

    #[test]
    fn terminal_state_is_a_fixed_point() {
        let mut s = initial_state();
        s.status = Status::Finished;
        s.winner = Some(1);
        let s2 = next_state(&s, Action::EndTurn);
        assert_eq!(s2.current_player, s.current_player);
        assert_eq!(s2.status, Status::Finished);
    }

    #[test]
    fn spearman_brown_is_monotonic_in_k() {
        let r = 0.5;
        let a1 = spearman_brown(1.0, r);
        let a2 = spearman_brown(2.0, r);
        let a3 = spearman_brown(3.0, r);
        assert!(a1 < a2);
        assert!(a2 < a3);
    }

    #[test]
    fn round_half_even_matches_python_round() {
        assert_eq!(round_half_even(0.5), 0);
        assert_eq!(round_half_even(1.5), 2);
        assert_eq!(round_half_even(2.5), 2);
        assert_eq!(round_half_even(2.5000001), 3);
        assert_eq!(round_half_even(5000.0), 5000);
    }

    /// Scenario 1: summon trace.
    #[test]
    fn summon_trace_matches_fixture() {
        let mut s = initial_state();
        s.player_mut(1).hand = hand_of(vec![Card::item("cog_ability"), Card::item("job_perf"), Card::spell("job_relevance")]);
        s.player_mut(2).hand = Vec::new();

        let s = next_state(&s, Action::Place { hand_index: 0, slot: 0 });
        let s = next_state(&s, Action::Place { hand_index: 0, slot: 1 });
        let s = next_state(&s, Action::Summon { pred_slot: 0, out_slot: 1, replace: None });

        let m = s.player(1).monsters[0].as_ref().expect("monster summoned");
        assert_eq!(m.pred_id, "cog_ability");
        assert_eq!(m.out_id, "job_perf");
        assert!(m.summoning_sick);

        let alpha = spearman_brown(1.0, 0.65);
        let expected_atk = round_half_even(0.51 * (alpha * alpha).sqrt() * 10000.0);
        assert_eq!(m.atk, expected_atk);
    }

    /// Scenario 2: sickness clears after the owner's next turn starts.
    #[test]
    fn sickness_clears_after_two_end_turns() {
        let mut s = initial_state();
        s.player_mut(1).hand = hand_of(vec![Card::item("cog_ability"), Card::item("job_perf")]);
        let s = next_state(&s, Action::Place { hand_index: 0, slot: 0 });
        let s = next_state(&s, Action::Place { hand_index: 0, slot: 1 });
        let s = next_state(&s, Action::Summon { pred_slot: 0, out_slot: 1, replace: None });
        let s = next_state(&s, Action::EndTurn);
        let s = next_state(&s, Action::EndTurn);
        assert!(!s.player(1).monsters[0].as_ref().unwrap().summoning_sick);
    }

    /// Scenario 3: lethal direct attack ends the game.
    #[test]
    fn lethal_direct_attack_ends_game() {
        let mut s = initial_state();
        s.player_mut(1).hand = hand_of(vec![Card::item("cog_ability"), Card::item("job_perf")]);
        let s = next_state(&s, Action::Place { hand_index: 0, slot: 0 });
        let s = next_state(&s, Action::Place { hand_index: 0, slot: 1 });
        let s = next_state(&s, Action::Summon { pred_slot: 0, out_slot: 1, replace: None });
        let s = next_state(&s, Action::EndTurn);
        let mut s = next_state(&s, Action::EndTurn);
        s.player_mut(2).monsters = [None, None, None];
        s.player_mut(2).lp = 100;

        let s = next_state(&s, Action::Attack { attacker_slot: 0, target: AttackTarget::Lp });
        assert!(is_terminal(&s));
        assert_eq!(s.winner, Some(1));
        assert_eq!(terminal_value(&s, 1), 1);
        assert_eq!(terminal_value(&s, 2), -1);
    }

    /// Scenario 4: item leakage zeros atk, clears on end_turn.
    #[test]
    fn item_leakage_zeros_atk_then_clears_on_end_turn() {
        let mut s = initial_state();
        s.player_mut(1).hand = hand_of(vec![Card::item("cog_ability"), Card::item("job_perf")]);
        let s = next_state(&s, Action::Place { hand_index: 0, slot: 0 });
        let s = next_state(&s, Action::Place { hand_index: 0, slot: 1 });
        let mut s = next_state(&s, Action::Summon { pred_slot: 0, out_slot: 1, replace: None });
        let pre_leakage_atk = s.player(1).monsters[0].as_ref().unwrap().atk;

        s.player_mut(2).hand = hand_of(vec![Card::spell("item_leakage")]);
        let s = next_state(
            &s,
            Action::PlaySpell { hand_index: 0, owner: Owner::Opp, ttype: TargetType::Monster, target_slot: 0 },
        );
        let m = s.player(1).monsters[0].as_ref().unwrap();
        assert_relative_eq!(m.r_obs, 0.0);
        assert_eq!(m.atk, 0);

        // End turns around to flip back to player 1's next turn and clear the flag.
        let s = next_state(&s, Action::EndTurn);
        let s = next_state(&s, Action::EndTurn);
        let m = s.player(1).monsters[0].as_ref().unwrap();
        assert!(!m.item_leakage_applied);
        assert_eq!(m.atk, pre_leakage_atk);
    }

    /// Scenario 5: three range-restrictions halve atk each time, banker's rounding.
    #[test]
    fn range_restriction_halves_with_bankers_rounding() {
        let mut m = build_monster(&ConstructStack::from_card(&Card::item("cog_ability")), &ConstructStack::from_card(&Card::item("job_perf")));
        m.atk = 10000;
        m.base_atk = 10000;
        m.r_true = 1.0;
        m.pred_alpha = 1.0;
        m.out_alpha = 1.0;
        m.validity_multiplier = 1.0;

        let expected = [5000, 2500, 1250];
        for exp in expected {
            m.range_restriction_stacks += 1;
            refresh_monster(&mut m);
            assert_eq!(m.atk, exp);
        }
    }

    /// Scenario 6: meta construction from three aligned monsters.
    #[test]
    fn meta_construction_matches_fixture() {
        let mut s = initial_state();
        for (slot, (r_obs, base_n)) in [(0.3, 50), (0.4, 100), (0.5, 150)].into_iter().enumerate() {
            let mut m = build_monster(&ConstructStack::from_card(&Card::item("cog_ability")), &ConstructStack::from_card(&Card::item("job_perf")));
            m.r_obs = r_obs;
            m.base_n = base_n;
            m.n = base_n;
            s.player_mut(1).monsters[slot] = Some(m);
        }
        s.player_mut(1).summoned = true;

        let s = next_state(&s, Action::Meta);
        let m = s.player(1).monsters[0].as_ref().expect("meta monster built");
        assert!(m.is_meta);
        assert_relative_eq!(m.r_true, 0.54, epsilon = 1e-9);
        assert_eq!(m.atk, 5400);
        assert_eq!(m.n, 300);
        assert_relative_eq!(m.power, 0.99, epsilon = 1e-9);
    }

    #[test]
    fn summon_consumes_slots_and_sets_summoned_flag() {
        let mut s = initial_state();
        s.player_mut(1).hand = hand_of(vec![Card::item("cog_ability"), Card::item("job_perf")]);
        let s = next_state(&s, Action::Place { hand_index: 0, slot: 0 });
        let s = next_state(&s, Action::Place { hand_index: 0, slot: 1 });
        let s = next_state(&s, Action::Summon { pred_slot: 0, out_slot: 1, replace: None });
        assert!(s.player(1).constructs[0].is_none());
        assert!(s.player(1).constructs[1].is_none());
        assert!(s.player(1).summoned);
        assert!(!legal_actions(&s).iter().any(|a| matches!(a, Action::Summon { .. })));
    }

    #[test]
    fn hand_cap_holds_after_non_experience_actions() {
        let s = initial_state();
        let s = next_state(&s, Action::EndTurn);
        assert!(s.player(2).hand.len() <= rules::MAX_HAND_SIZE);
    }
}
