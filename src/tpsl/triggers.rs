use chrono::{DateTime, Utc};

use crate::types::position::Position;
use crate::types::strategy::Strategy;
use crate::types::trigger::TriggerKind;

/// Result of one evaluation tick. `fired` carries the winning trigger, the
/// percent of the remaining size to sell, and (for DCA) the rung index to
/// record in `exit_levels_hit`. Trailing's peak/stop can move even when
/// nothing fires, so those are returned independently for the caller to
/// persist via `Store::update_trailing`.
pub struct Evaluation {
    pub fired: Option<(TriggerKind, f64, usize)>,
    pub new_peak_price: Option<f64>,
    pub new_trailing_stop_price: Option<f64>,
}

/// Runs SL, TP (or the next unused DCA rung), TRAIL, then MAXHOLD in
/// priority order and returns the first that fires — spec.md §4.4 "when
/// multiple conditions fire in the same tick, the highest-priority one
/// wins and the others are suppressed for this position".
pub fn evaluate(position: &Position, strategy: &Strategy, current_price: f64, now: DateTime<Utc>) -> Evaluation {
    let (new_peak_price, new_trailing_stop_price, trail_fired) = evaluate_trailing(position, strategy, current_price);

    if let Some(sl_price) = position.sl_price {
        if current_price <= sl_price {
            return Evaluation {
                fired: Some((TriggerKind::Sl, 100.0, 0)),
                new_peak_price,
                new_trailing_stop_price,
            };
        }
    }

    if let Some((rung, sell_percent)) = next_tp_rung(position, strategy, current_price) {
        return Evaluation {
            fired: Some((TriggerKind::Tp, sell_percent, rung)),
            new_peak_price,
            new_trailing_stop_price,
        };
    }

    if trail_fired {
        return Evaluation {
            fired: Some((TriggerKind::Trail, 100.0, 0)),
            new_peak_price,
            new_trailing_stop_price,
        };
    }

    let held_s = (now - position.opened_at).num_seconds();
    if held_s >= strategy.max_hold_s {
        return Evaluation {
            fired: Some((TriggerKind::Maxhold, 100.0, 0)),
            new_peak_price,
            new_trailing_stop_price,
        };
    }

    Evaluation {
        fired: None,
        new_peak_price,
        new_trailing_stop_price,
    }
}

/// For a laddered strategy, the next rung whose `price_multiple` (relative
/// to entry) the current price has reached and that hasn't already been
/// recorded as hit. Without DCA rungs, falls back to the plain `tp_price`
/// column for a single full-size exit.
fn next_tp_rung(position: &Position, strategy: &Strategy, current_price: f64) -> Option<(usize, f64)> {
    match strategy.dca_rungs() {
        Some(rungs) if !rungs.is_empty() => {
            let hit = position.exit_levels_hit();
            rungs
                .iter()
                .enumerate()
                .find(|(i, rung)| !hit.contains(i) && current_price >= position.entry_price * rung.price_multiple)
                .map(|(i, rung)| (i, rung.sell_percent))
        }
        _ => {
            let tp_price = position.tp_price?;
            (current_price >= tp_price).then_some((0, 100.0))
        }
    }
}

/// Trailing activates once price exceeds `trailing_activation_bps` above
/// entry; from then on `peak_price` only moves up and
/// `trailing_stop_price = peak_price * (1 - trailing_distance_bps)`. Fires
/// when price falls back to or through the stop.
fn evaluate_trailing(position: &Position, strategy: &Strategy, current_price: f64) -> (Option<f64>, Option<f64>, bool) {
    let activation_price = position.entry_price * (1.0 + strategy.trailing_activation_bps as f64 / 10_000.0);
    let already_active = position.peak_price.is_some();
    if !already_active && current_price < activation_price {
        return (None, None, false);
    }

    let peak = position.peak_price.unwrap_or(current_price).max(current_price);
    let stop = peak * (1.0 - strategy.trailing_distance_bps as f64 / 10_000.0);
    let fired = current_price <= stop;
    (Some(peak), Some(stop), fired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::Chain;
    use uuid::Uuid;

    fn position(entry_price: f64, tp_price: Option<f64>, sl_price: Option<f64>) -> Position {
        Position {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            strategy_id: Uuid::new_v4(),
            chain: Chain::Solana.to_string(),
            token_mint: "mint".into(),
            bonding_curve: None,
            entry_tx: "sig".into(),
            entry_price,
            entry_cost_sol: 1.0,
            size_tokens: 1_000.0,
            token_decimals: 6,
            lifecycle_state: "POST_GRADUATION".into(),
            trigger_state: "MONITORING".into(),
            tp_price,
            sl_price,
            peak_price: None,
            trailing_stop_price: None,
            partial_exit_taken: false,
            exit_levels_hit: serde_json::json!([]),
            moon_bag_amount: None,
            realized_pnl_sol: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    fn strategy() -> Strategy {
        Strategy {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            chain: Chain::Solana.to_string(),
            enabled: true,
            auto_execute: true,
            min_score: 0,
            allowed_sources: serde_json::json!([]),
            token_denylist: serde_json::json!([]),
            deployer_denylist: serde_json::json!([]),
            min_liquidity_sol: 0.0,
            max_per_trade_sol: 1.0,
            slippage_bps: 100,
            priority_fee_lamports: 0,
            tp_bps: 5_000,
            sl_bps: 2_000,
            max_hold_s: 3_600,
            trailing_activation_bps: 1_000,
            trailing_distance_bps: 500,
            moon_bag_bps: 0,
            snipe_mode: "speed".into(),
            dca_rungs: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sl_outranks_tp_when_both_would_fire() {
        // Pathological but possible if tp_price < sl_price due to manual edits;
        // SL must still win since it is evaluated first.
        let pos = position(1.0, Some(0.5), Some(1.5));
        let strat = strategy();
        let eval = evaluate(&pos, &strat, 1.6, Utc::now());
        assert_eq!(eval.fired.unwrap().0, TriggerKind::Sl);
    }

    #[test]
    fn tp_fires_at_full_size_without_dca() {
        let pos = position(1.0, Some(1.5), Some(0.8));
        let strat = strategy();
        let eval = evaluate(&pos, &strat, 1.5, Utc::now());
        assert_eq!(eval.fired, Some((TriggerKind::Tp, 100.0, 0)));
    }

    #[test]
    fn maxhold_fires_after_horizon_with_no_other_trigger() {
        let mut pos = position(1.0, Some(10.0), Some(0.1));
        pos.opened_at = Utc::now() - chrono::Duration::seconds(4_000);
        let strat = strategy();
        let eval = evaluate(&pos, &strat, 1.05, Utc::now());
        assert_eq!(eval.fired.unwrap().0, TriggerKind::Maxhold);
    }

    #[test]
    fn trailing_stop_fires_after_pullback_from_peak() {
        let mut pos = position(1.0, Some(10.0), Some(0.1));
        pos.peak_price = Some(2.0);
        pos.trailing_stop_price = Some(1.9);
        let strat = strategy();
        let eval = evaluate(&pos, &strat, 1.85, Utc::now());
        assert_eq!(eval.fired.unwrap().0, TriggerKind::Trail);
    }

    #[test]
    fn tp_wins_over_maxhold_when_both_conditions_are_met() {
        let mut pos = position(1.0, Some(1.5), Some(0.5));
        pos.opened_at = Utc::now() - chrono::Duration::seconds(3_595);
        let strat = strategy();
        let eval = evaluate(&pos, &strat, 1.500_001, Utc::now());
        assert_eq!(eval.fired.unwrap().0, TriggerKind::Tp);
    }

    proptest::proptest! {
        /// Whatever combination of SL/TP/TRAIL/MAXHOLD conditions are
        /// simultaneously true for a tick, `evaluate` fires at most one
        /// trigger and it is always the highest-priority one among those
        /// that actually hold — never a lower-priority trigger "winning"
        /// by evaluation order alone.
        #[test]
        fn exactly_one_highest_priority_trigger_fires(
            current_price in 0.01f64..5.0,
            held_s in 0i64..8_000,
            peak_offset in 0.0f64..2.0,
        ) {
            let mut pos = position(1.0, Some(1.5), Some(0.8));
            pos.opened_at = Utc::now() - chrono::Duration::seconds(held_s);
            let already_active = peak_offset > 0.0;
            if already_active {
                pos.peak_price = Some(1.0 + peak_offset);
            }
            let strat = strategy();

            // Mirrors `evaluate_trailing`'s own rule exactly: a position that
            // wasn't already active never fires on the tick it first crosses
            // the activation price, it only arms itself for the next one.
            let trail_holds = if already_active {
                let peak = (1.0 + peak_offset).max(current_price);
                let stop = peak * (1.0 - strat.trailing_distance_bps as f64 / 10_000.0);
                current_price <= stop
            } else {
                false
            };

            let sl_holds = pos.sl_price.is_some_and(|p| current_price <= p);
            let tp_holds = pos.tp_price.is_some_and(|p| current_price >= p);
            let maxhold_holds = held_s >= strat.max_hold_s;

            let expected = if sl_holds {
                Some(TriggerKind::Sl)
            } else if tp_holds {
                Some(TriggerKind::Tp)
            } else if trail_holds {
                Some(TriggerKind::Trail)
            } else if maxhold_holds {
                Some(TriggerKind::Maxhold)
            } else {
                None
            };

            let eval = evaluate(&pos, &strat, current_price, Utc::now());
            proptest::prop_assert_eq!(eval.fired.map(|(k, _, _)| k), expected);
        }
    }
}
