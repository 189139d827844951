use crate::config::cache::TokenMetadata;
use crate::monitors::events::LaunchEvent;
use crate::types::opportunity::ScoreReason;

/// Everything a scoring rule can read. Metadata is `None` when the fetch
/// timed out or the strategy's snipe mode budgeted zero time for it
/// (spec.md §4.2 step 4) — rules that need it just fail closed.
pub struct ScoringInput<'a> {
    pub event: &'a LaunchEvent,
    pub metadata: Option<&'a TokenMetadata>,
    pub initial_liquidity_sol: Option<f64>,
}

struct Rule {
    name: &'static str,
    weight: i32,
    is_hard_stop: bool,
    check: fn(&ScoringInput) -> bool,
}

/// Ordered, deterministic rule set (spec.md §4.2 step 5). Order matters
/// only for tie-breaking reasons in the persisted list, never for the
/// score itself — the score is a plain sum of passing weights.
const RULES: &[Rule] = &[
    Rule {
        name: "has_name_and_symbol",
        weight: 10,
        is_hard_stop: false,
        check: |i| !i.event.name.is_empty() && !i.event.symbol.is_empty(),
    },
    Rule {
        name: "has_metadata_uri",
        weight: 5,
        is_hard_stop: false,
        check: |i| !i.event.uri.is_empty(),
    },
    Rule {
        name: "metadata_fetched",
        weight: 15,
        is_hard_stop: false,
        check: |i| i.metadata.is_some(),
    },
    Rule {
        name: "has_bonding_curve",
        weight: 10,
        is_hard_stop: false,
        check: |i| i.event.bonding_curve.is_some(),
    },
    Rule {
        name: "nonzero_initial_liquidity",
        weight: 20,
        is_hard_stop: false,
        check: |i| i.initial_liquidity_sol.unwrap_or(0.0) > 0.0,
    },
    Rule {
        name: "name_not_blocklisted_pattern",
        weight: 0,
        is_hard_stop: true,
        check: |i| !looks_like_scam_name(&i.event.name) && !looks_like_scam_name(&i.event.symbol),
    },
];

fn looks_like_scam_name(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.contains("test") || lower.is_empty()
}

/// Runs every rule in declared order. A failing hard-stop rule rejects the
/// opportunity regardless of score; otherwise the score is the sum of
/// passing rules' weights (spec.md §4.2 step 5).
pub fn score(input: &ScoringInput) -> (i32, bool, Vec<ScoreReason>) {
    let mut total = 0;
    let mut hard_stopped = false;
    let mut reasons = Vec::with_capacity(RULES.len());

    for rule in RULES {
        let passed = (rule.check)(input);
        if passed {
            total += rule.weight;
        } else if rule.is_hard_stop {
            hard_stopped = true;
        }
        reasons.push(ScoreReason {
            rule: rule.name.to_string(),
            passed,
            weight: rule.weight,
            is_hard_stop: rule.is_hard_stop,
        });
    }

    (total, hard_stopped, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn sample_event() -> LaunchEvent {
        LaunchEvent {
            source: "pumpfun".to_string(),
            signature: "sig".to_string(),
            mint: Pubkey::new_unique(),
            bonding_curve: Some(Pubkey::new_unique()),
            creator: Pubkey::new_unique(),
            name: "Good Coin".to_string(),
            symbol: "GOOD".to_string(),
            uri: "https://example.com/meta.json".to_string(),
        }
    }

    #[test]
    fn hard_stop_rejects_regardless_of_other_passing_rules() {
        let mut event = sample_event();
        event.name = "test".to_string();
        let input = ScoringInput {
            event: &event,
            metadata: None,
            initial_liquidity_sol: Some(5.0),
        };
        let (_score, hard_stopped, _) = score(&input);
        assert!(hard_stopped);
    }

    #[test]
    fn passing_rules_sum_weights() {
        let event = sample_event();
        let metadata = TokenMetadata {
            name: Some("Good Coin".to_string()),
            symbol: Some("GOOD".to_string()),
            decimals: 6,
        };
        let input = ScoringInput {
            event: &event,
            metadata: Some(&metadata),
            initial_liquidity_sol: Some(5.0),
        };
        let (total, hard_stopped, reasons) = score(&input);
        assert!(!hard_stopped);
        assert_eq!(total, 10 + 5 + 15 + 10 + 20);
        assert_eq!(reasons.len(), RULES.len());
    }
}
