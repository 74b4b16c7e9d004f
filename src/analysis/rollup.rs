use crate::analysis::ranking::{self, AllianceTally, Standing, VoteShare};
use crate::analysis::UnitAggregate;
use crate::models::{AllianceKey, Scope};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of units an alliance finished first, second and third in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceCount {
    pub first: u32,
    pub second: u32,
    pub third: u32,
}

impl PerformanceCount {
    fn record(&mut self, position: usize) {
        match position {
            0 => self.first += 1,
            1 => self.second += 1,
            2 => self.third += 1,
            _ => {}
        }
    }

    fn merge(&mut self, other: &PerformanceCount) {
        self.first += other.first;
        self.second += other.second;
        self.third += other.third;
    }
}

/// Aggregated result for one administrative scope.
///
/// First-level summaries carry their unit rows; parent summaries built with
/// [`rollup_scopes`] list their child scopes instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeSummary {
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub unit_count: usize,
    pub totals: BTreeMap<AllianceKey, u64>,
    pub total_votes: u64,
    pub ranking: Vec<AllianceTally>,
    pub standing: Standing,
    pub vote_share: Vec<VoteShare>,
    pub performance: BTreeMap<AllianceKey, PerformanceCount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Scope>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<UnitAggregate>,
}

impl ScopeSummary {
    pub fn empty(scope: Scope) -> Self {
        Self {
            scope,
            name: None,
            unit_count: 0,
            totals: BTreeMap::new(),
            total_votes: 0,
            ranking: Vec::new(),
            standing: Standing::default(),
            vote_share: Vec::new(),
            performance: BTreeMap::new(),
            children: Vec::new(),
            units: Vec::new(),
        }
    }

    /// Summary of exactly these units under `scope`; an empty input yields an
    /// empty summary rather than nothing.
    pub fn from_units(scope: Scope, units: impl IntoIterator<Item = UnitAggregate>) -> Self {
        units
            .into_iter()
            .fold(ScopeSummary::empty(scope), |mut summary, unit| {
                summary.push_unit(unit);
                summary
            })
            .finish()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn push_unit(&mut self, unit: UnitAggregate) {
        self.unit_count += 1;
        for (alliance, &votes) in &unit.votes {
            *self.totals.entry(alliance.clone()).or_insert(0) += votes;
        }
        // an all-zero unit places nobody
        let placed = if unit.total == 0 { 0 } else { 3 };
        for (position, tally) in unit.ranking.iter().take(placed).enumerate() {
            self.performance
                .entry(tally.alliance.clone())
                .or_default()
                .record(position);
        }
        self.units.push(unit);
    }

    fn absorb(&mut self, child: ScopeSummary) {
        self.unit_count += child.unit_count;
        for (alliance, votes) in child.totals {
            *self.totals.entry(alliance).or_insert(0) += votes;
        }
        for (alliance, count) in &child.performance {
            self.performance.entry(alliance.clone()).or_default().merge(count);
        }
        self.children.push(child.scope);
    }

    // Recomputes the derived ranking fields from `totals`.
    fn finish(mut self) -> Self {
        self.total_votes = self.totals.values().sum();
        self.ranking = ranking::rank(&self.totals);
        self.standing = Standing::from_ranking(&self.ranking);
        self.vote_share = ranking::vote_share(&self.ranking, self.total_votes);
        self
    }
}

/// Groups unit results into scope summaries.
///
/// Units for which `group_by` returns `None` (for instance wards with no
/// assembly mapping when grouping by assembly) are left out.
pub fn rollup<I, G>(units: I, group_by: G) -> BTreeMap<Scope, ScopeSummary>
where
    I: IntoIterator<Item = UnitAggregate>,
    G: Fn(&UnitAggregate) -> Option<Scope>,
{
    units
        .into_iter()
        .filter_map(|unit| group_by(&unit).map(|scope| (scope, unit)))
        .fold(BTreeMap::new(), |mut acc: BTreeMap<Scope, ScopeSummary>, (scope, unit)| {
            acc.entry(scope)
                .or_insert_with(|| ScopeSummary::empty(scope))
                .push_unit(unit);
            acc
        })
        .into_iter()
        .map(|(scope, summary)| (scope, summary.finish()))
        .collect()
}

/// Merges child summaries into parent scopes (localbody -> district,
/// district -> state, ...). Totals, unit counts and performance counts add
/// up; ranking and vote share are recomputed at the parent level.
pub fn rollup_scopes<I, G>(children: I, group_by: G) -> BTreeMap<Scope, ScopeSummary>
where
    I: IntoIterator<Item = ScopeSummary>,
    G: Fn(&ScopeSummary) -> Option<Scope>,
{
    children
        .into_iter()
        .filter_map(|child| group_by(&child).map(|scope| (scope, child)))
        .fold(BTreeMap::new(), |mut acc: BTreeMap<Scope, ScopeSummary>, (scope, child)| {
            acc.entry(scope)
                .or_insert_with(|| ScopeSummary::empty(scope))
                .absorb(child);
            acc
        })
        .into_iter()
        .map(|(scope, summary)| (scope, summary.finish()))
        .collect()
}
