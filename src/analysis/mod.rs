pub mod aggregate;
pub mod alliance;
#[cfg(test)]
pub(crate) mod fake_store;
pub mod history;
pub mod pipeline;
pub mod ranking;
pub mod rollup;
pub mod swing;

use crate::models::{AllianceKey, UnitId};
use ranking::{AllianceTally, Standing};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-alliance result of one counting unit (a ward or a polling booth).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitAggregate {
    pub unit_id: UnitId,
    pub unit_label: String,
    pub votes: BTreeMap<AllianceKey, u64>,
    pub total: u64,
    pub ranking: Vec<AllianceTally>,
    pub winner: Option<AllianceKey>,
    pub margin: Option<u64>,
}

impl UnitAggregate {
    pub fn new(unit_id: UnitId, unit_label: impl Into<String>, votes: BTreeMap<AllianceKey, u64>) -> Self {
        let total = votes.values().sum();
        let ranking = ranking::rank(&votes);
        let standing = Standing::from_ranking(&ranking);

        Self {
            unit_id,
            unit_label: unit_label.into(),
            votes,
            total,
            winner: standing.winner.map(|tally| tally.alliance),
            margin: standing.margin,
            ranking,
        }
    }

    pub fn votes_for(&self, alliance: &AllianceKey) -> Option<u64> {
        self.votes.get(alliance).copied()
    }

    pub fn winner_votes(&self) -> Option<u64> {
        self.ranking.first().map(|tally| tally.votes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_aggregate_derives_winner_and_margin() {
        let votes = BTreeMap::from([
            (AllianceKey::Named("LDF".into()), 500),
            (AllianceKey::Named("UDF".into()), 450),
            (AllianceKey::Other, 20),
        ]);
        let unit = UnitAggregate::new(7, "7 - Market", votes);

        assert_eq!(unit.total, 970);
        assert_eq!(unit.winner, Some(AllianceKey::Named("LDF".into())));
        assert_eq!(unit.margin, Some(50));
        assert_eq!(unit.winner_votes(), Some(500));
        assert_eq!(unit.votes_for(&AllianceKey::Named("NDA".into())), None);
    }

    #[test]
    fn empty_unit_has_no_winner() {
        let unit = UnitAggregate::new(1, "1 - Empty", BTreeMap::new());
        assert_eq!(unit.total, 0);
        assert_eq!(unit.winner, None);
        assert_eq!(unit.margin, None);
        assert!(unit.ranking.is_empty());
    }
}
