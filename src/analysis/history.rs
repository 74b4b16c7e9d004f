use crate::analysis::pipeline::{self, AnalysisResult};
use crate::db::ElectionStore;
use crate::error::AnalysisError;
use crate::models::{ElectionRegistry, Scope};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entity whose results are compared across elections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "code", rename_all = "snake_case")]
pub enum HistoryTarget {
    Localbody(i64),
    Assembly(i64),
}

impl From<HistoryTarget> for Scope {
    fn from(target: HistoryTarget) -> Self {
        match target {
            HistoryTarget::Localbody(code) => Scope::Localbody(code),
            HistoryTarget::Assembly(code) => Scope::Assembly(code),
        }
    }
}

/// Runs the matching pipeline for every requested election year.
///
/// An empty `requested_years` means every year in `registry`; years the
/// registry does not know are dropped. Localbody years are counted per ward,
/// the rest per booth. A year without data still gets an entry. A missing
/// target fails before any year is computed.
pub async fn compose_history<S>(
    store: &S,
    registry: &ElectionRegistry,
    target: HistoryTarget,
    requested_years: &[i32],
) -> Result<BTreeMap<i32, AnalysisResult>, AnalysisError>
where
    S: ElectionStore + ?Sized,
{
    let scope = Scope::from(target);
    let name = pipeline::ensure_scope(store, scope).await?;

    let elections = registry.select(requested_years);
    info!("Composing history of {} over {} elections", scope, elections.len());

    let mut history = BTreeMap::new();
    for election in elections {
        let result = pipeline::report_named(store, election, scope, name.clone()).await?;
        history.insert(election.year, result);
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fake_store::FakeStore;
    use crate::analysis::pipeline::UnitKind;
    use crate::models::{AllianceKey, Election, ElectionType};

    fn registry() -> ElectionRegistry {
        ElectionRegistry::new(vec![
            Election::new(2024, ElectionType::Loksabha),
            Election::new(2020, ElectionType::Localbody),
            Election::new(2021, ElectionType::Assembly),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn every_registered_year_by_default() {
        let store = FakeStore::kerala();
        let history = compose_history(&store, &registry(), HistoryTarget::Localbody(10), &[])
            .await
            .unwrap();

        assert_eq!(history.keys().copied().collect::<Vec<_>>(), vec![2020, 2021, 2024]);

        let localbody = &history[&2020];
        assert_eq!(localbody.unit_kind, UnitKind::Ward);
        assert_eq!(localbody.summary.unit_count, 3);

        let assembly = &history[&2021];
        assert_eq!(assembly.unit_kind, UnitKind::Booth);
        assert_eq!(assembly.summary.unit_count, 1);
        assert_eq!(assembly.summary.totals[&AllianceKey::Named("LDF".into())], 400);

        // no 2024 votes, but the year is still reported
        let loksabha = &history[&2024];
        assert_eq!(loksabha.label, "2024 Loksabha Election");
        assert_eq!(loksabha.summary.total_votes, 0);
        assert!(loksabha.summary.ranking.is_empty());
    }

    #[tokio::test]
    async fn requested_years_are_filtered_and_sorted() {
        let store = FakeStore::kerala();
        let history = compose_history(&store, &registry(), HistoryTarget::Assembly(120), &[2024, 1999, 2020, 2024])
            .await
            .unwrap();
        assert_eq!(history.keys().copied().collect::<Vec<_>>(), vec![2020, 2024]);
        assert_eq!(history[&2020].summary.name.as_deref(), Some("Chavara"));
        // wards 1-3 are mapped to constituency 120
        assert_eq!(history[&2020].summary.unit_count, 3);
    }

    #[tokio::test]
    async fn unknown_target_fails_before_any_year() {
        let store = FakeStore::kerala();
        let err = compose_history(&store, &registry(), HistoryTarget::Localbody(404), &[2020])
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound { entity: "localbody", code: 404 }));
    }

    #[tokio::test]
    async fn empty_registry_yields_empty_history() {
        let store = FakeStore::kerala();
        let history = compose_history(&store, &ElectionRegistry::default(), HistoryTarget::Localbody(10), &[])
            .await
            .unwrap();
        assert!(history.is_empty());
    }
}
