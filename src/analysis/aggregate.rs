use crate::analysis::UnitAggregate;
use crate::models::{AllianceKey, UnitId, VoteRow};
use std::collections::BTreeMap;

/// Per-unit, per-alliance vote sums.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub units: BTreeMap<UnitId, BTreeMap<AllianceKey, u64>>,
    // Rows whose unit or candidate could not be resolved
    pub skipped_rows: usize,
}

impl Aggregation {
    /// Adds an empty entry for every unit that received no rows, so
    /// uncounted wards still show up in unit counts.
    pub fn seed_units(mut self, unit_ids: impl IntoIterator<Item = UnitId>) -> Self {
        for unit_id in unit_ids {
            self.units.entry(unit_id).or_default();
        }
        self
    }

    pub fn into_units<L>(self, label_of: L) -> Vec<UnitAggregate>
    where
        L: Fn(UnitId) -> String,
    {
        self.units
            .into_iter()
            .map(|(unit_id, votes)| UnitAggregate::new(unit_id, label_of(unit_id), votes))
            .collect()
    }

    /// Sums `rows` per unit and alliance on top of what is already counted.
    ///
    /// `unit_of` maps a row to the unit it is counted under and returns `None`
    /// when the row belongs to a unit outside the requested scope. `alliance_of`
    /// returns `None` for candidates that cannot be resolved. Either case skips
    /// the row and bumps `skipped_rows`. Rows with zero votes still register the
    /// alliance in their unit.
    ///
    /// `rows` is consumed lazily. Feeding rows in several batches gives the
    /// same result as one pass over all of them.
    pub fn absorb<I, U, A>(self, rows: I, unit_of: U, alliance_of: A) -> Self
    where
        I: IntoIterator<Item = VoteRow>,
        U: Fn(&VoteRow) -> Option<UnitId>,
        A: Fn(&VoteRow) -> Option<AllianceKey>,
    {
        rows.into_iter().fold(self, |mut acc, row| {
            match (unit_of(&row), alliance_of(&row)) {
                (Some(unit_id), Some(alliance)) => {
                    *acc.units
                        .entry(unit_id)
                        .or_default()
                        .entry(alliance)
                        .or_insert(0) += row.votes;
                }
                _ => acc.skipped_rows += 1,
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn row(unit_id: UnitId, candidate_id: i64, votes: u64) -> VoteRow {
        VoteRow { unit_id, candidate_id, votes }
    }

    fn unit_total(agg: &Aggregation, unit_id: UnitId) -> u64 {
        agg.units.get(&unit_id).map(|votes| votes.values().sum()).unwrap_or(0)
    }

    fn alliances() -> HashMap<i64, AllianceKey> {
        HashMap::from([
            (1, AllianceKey::Named("LDF".into())),
            (2, AllianceKey::Named("UDF".into())),
            (3, AllianceKey::Named("LDF".into())),
            (4, AllianceKey::Other),
        ])
    }

    #[test]
    fn sums_candidates_of_the_same_alliance() {
        let lookup = alliances();
        let rows = vec![row(10, 1, 200), row(10, 3, 50), row(10, 2, 240), row(11, 4, 0)];
        let agg = Aggregation::default().absorb(rows, |r| Some(r.unit_id), |r| lookup.get(&r.candidate_id).cloned());

        assert_eq!(agg.skipped_rows, 0);
        assert_eq!(agg.units[&10][&AllianceKey::Named("LDF".into())], 250);
        assert_eq!(unit_total(&agg, 10), 490);
        // zero-vote candidates still register presence
        assert_eq!(agg.units[&11][&AllianceKey::Other], 0);
    }

    #[test]
    fn unresolvable_rows_are_counted_not_summed() {
        let lookup = alliances();
        let in_scope = [10];
        let rows = vec![row(10, 1, 100), row(99, 1, 500), row(10, 42, 70)];
        let agg = Aggregation::default().absorb(
            rows,
            |r| in_scope.contains(&r.unit_id).then_some(r.unit_id),
            |r| lookup.get(&r.candidate_id).cloned(),
        );

        assert_eq!(agg.skipped_rows, 2);
        assert_eq!(unit_total(&agg, 10), 100);
        assert!(!agg.units.contains_key(&99));
    }

    #[test]
    fn seeded_units_without_rows_are_kept() {
        let agg = Aggregation::default().absorb(Vec::<VoteRow>::new(), |r| Some(r.unit_id), |_| Some(AllianceKey::Other))
            .seed_units([5, 6]);
        let units = agg.into_units(|id| format!("Ward {}", id));
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.total == 0 && u.winner.is_none()));
        assert_eq!(units[0].unit_label, "Ward 5");
    }

    #[test]
    fn accepts_a_lazy_row_source() {
        let lookup = alliances();
        let rows = (0..1000).map(|i| row(i % 3, 1 + (i % 2), 1));
        let agg = Aggregation::default().absorb(rows, |r| Some(r.unit_id), |r| lookup.get(&r.candidate_id).cloned());
        assert_eq!(agg.units.len(), 3);
        assert_eq!((0..3).map(|u| unit_total(&agg, u)).sum::<u64>(), 1000);
    }

    proptest! {
        #[test]
        fn unit_totals_match_raw_rows(raw in prop::collection::vec((0i64..5, 1i64..5, 0u64..10_000), 0..200)) {
            let lookup = alliances();
            let rows: Vec<VoteRow> = raw.iter().map(|&(u, c, v)| row(u, c, v)).collect();
            let agg = Aggregation::default().absorb(rows.clone(), |r| Some(r.unit_id), |r| lookup.get(&r.candidate_id).cloned());

            for (&unit_id, votes) in &agg.units {
                let expected: u64 = rows.iter().filter(|r| r.unit_id == unit_id).map(|r| r.votes).sum();
                prop_assert_eq!(votes.values().sum::<u64>(), expected);
            }
        }

        #[test]
        fn row_order_does_not_change_sums(raw in prop::collection::vec((0i64..5, 1i64..5, 0u64..10_000), 0..100)) {
            let lookup = alliances();
            let rows: Vec<VoteRow> = raw.iter().map(|&(u, c, v)| row(u, c, v)).collect();
            let mut reversed = rows.clone();
            reversed.reverse();

            let forward = Aggregation::default().absorb(rows, |r| Some(r.unit_id), |r| lookup.get(&r.candidate_id).cloned());
            let backward = Aggregation::default().absorb(reversed, |r| Some(r.unit_id), |r| lookup.get(&r.candidate_id).cloned());
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn chunked_folding_matches_a_single_pass(
            raw in prop::collection::vec((0i64..5, 1i64..6, 0u64..10_000), 0..200),
            chunk in 1usize..17,
        ) {
            let lookup = alliances();
            let rows: Vec<VoteRow> = raw.iter().map(|&(u, c, v)| row(u, c, v)).collect();
            let alliance_of = |r: &VoteRow| lookup.get(&r.candidate_id).cloned();

            let single = Aggregation::default().absorb(rows.clone(), |r| Some(r.unit_id), alliance_of);
            let chunked = rows
                .chunks(chunk)
                .fold(Aggregation::default(), |acc, part| {
                    acc.absorb(part.to_vec(), |r| Some(r.unit_id), alliance_of)
                });
            prop_assert_eq!(single, chunked);
        }
    }
}
