use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Exit trigger kinds, ordered by priority for §4.4's "highest-priority
/// trigger wins" rule. `Ord` is derived from declaration order, so
/// `Emergency < Sl < Tp < Trail < Maxhold` sorts lowest-first; callers use
/// `priority()` rather than relying on derive order directly so the
/// intent reads at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize)]
pub enum TriggerKind {
    #[strum(serialize = "EMERGENCY")]
    Emergency,
    #[strum(serialize = "SL")]
    Sl,
    #[strum(serialize = "TP")]
    Tp,
    #[strum(serialize = "TRAIL")]
    Trail,
    #[strum(serialize = "MAXHOLD")]
    Maxhold,
}

impl TriggerKind {
    /// Lower is higher priority: Emergency and SL protect capital first,
    /// Maxhold is the fallback of last resort.
    pub fn priority(self) -> u8 {
        match self {
            TriggerKind::Emergency => 0,
            TriggerKind::Sl => 1,
            TriggerKind::Tp => 2,
            TriggerKind::Trail => 3,
            TriggerKind::Maxhold => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sl_outranks_tp_and_trail_and_maxhold() {
        assert!(TriggerKind::Sl.priority() < TriggerKind::Tp.priority());
        assert!(TriggerKind::Tp.priority() < TriggerKind::Trail.priority());
        assert!(TriggerKind::Trail.priority() < TriggerKind::Maxhold.priority());
    }
}
