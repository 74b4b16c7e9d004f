use crate::analysis::aggregate::Aggregation;
use crate::analysis::alliance::{AllianceResolver, CandidateAlliances};
use crate::analysis::rollup::{rollup, rollup_scopes, ScopeSummary};
use crate::analysis::swing::{self, LocalbodyVerdict, Verdict, WinnabilityReport};
use crate::analysis::UnitAggregate;
use crate::db::ElectionStore;
use crate::error::AnalysisError;
use crate::models::{AllianceKey, Election, PollingStation, Scope, UnitId, VoteRow, Ward};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Ward,
    Booth,
}

impl UnitKind {
    pub fn for_election(election: Election) -> Self {
        if election.is_ward_based() {
            UnitKind::Ward
        } else {
            UnitKind::Booth
        }
    }
}

/// Report for one scope in one election.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub election: Election,
    pub label: String,
    pub unit_kind: UnitKind,
    pub summary: ScopeSummary,
    pub skipped_rows: usize,
}

/// District or state report with one summary per child scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeBreakdown {
    pub election: Election,
    pub label: String,
    pub unit_kind: UnitKind,
    pub summary: ScopeSummary,
    pub children: Vec<ScopeSummary>,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalbodyWinnability {
    pub code: i64,
    pub name: String,
    #[serde(flatten)]
    pub verdict: LocalbodyVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateWinnability {
    pub election: Election,
    pub label: String,
    pub scope: Scope,
    pub target: AllianceKey,
    pub swing_percent: f64,
    pub majority: usize,
    pub possible_with_swing: usize,
    pub hard: usize,
    pub localbodies: Vec<LocalbodyWinnability>,
}

/// Aggregated units of one scope, with the administrative parents of each unit.
#[derive(Debug, Clone)]
pub struct UnitSnapshot {
    pub units: Vec<UnitAggregate>,
    pub localbody_of: HashMap<UnitId, i64>,
    pub assembly_of: HashMap<UnitId, i64>,
    pub skipped_rows: usize,
}

struct UnitInfo {
    id: UnitId,
    label: String,
    localbody: Option<i64>,
    assembly: Option<i64>,
}

impl From<Ward> for UnitInfo {
    fn from(ward: Ward) -> Self {
        Self {
            id: ward.id,
            label: ward.label(),
            localbody: Some(ward.localbody_code),
            assembly: ward.assembly_code,
        }
    }
}

impl From<PollingStation> for UnitInfo {
    fn from(station: PollingStation) -> Self {
        Self {
            id: station.id,
            label: station.label(),
            localbody: station.localbody_code,
            assembly: Some(station.assembly_code),
        }
    }
}

/// Name of the entity behind `scope`, or `NotFound`. The state has no name.
pub async fn ensure_scope<S>(store: &S, scope: Scope) -> Result<Option<String>, AnalysisError>
where
    S: ElectionStore + ?Sized,
{
    let name = match scope {
        Scope::Localbody(code) => store
            .localbody(code)
            .await?
            .map(|l| l.name)
            .ok_or(AnalysisError::NotFound { entity: "localbody", code })?,
        Scope::Assembly(code) => store
            .assembly_constituency(code)
            .await?
            .map(|a| a.name)
            .ok_or(AnalysisError::NotFound { entity: "assembly constituency", code })?,
        Scope::District(code) => store
            .district(code)
            .await?
            .map(|d| d.name)
            .ok_or(AnalysisError::NotFound { entity: "district", code })?,
        Scope::State => return Ok(None),
    };
    Ok(Some(name))
}

/// Streams the vote rows of `scope` for `election` and reduces them to unit
/// results. Localbody elections are counted per ward, the others per booth.
/// Units without any votes are still listed.
pub async fn scope_units<S>(store: &S, election: Election, scope: Scope) -> Result<UnitSnapshot, AnalysisError>
where
    S: ElectionStore + ?Sized,
{
    let resolver = AllianceResolver::for_election(election, store.party_alliance_mappings(election).await?);
    let candidates = CandidateAlliances::build(&resolver, store.candidate_parties(election, scope).await?);

    let infos: Vec<UnitInfo> = if election.is_ward_based() {
        store.wards_in(scope).await?.into_iter().map(UnitInfo::from).collect()
    } else {
        store.polling_stations_in(scope).await?.into_iter().map(UnitInfo::from).collect()
    };
    let known: HashMap<UnitId, UnitInfo> = infos.into_iter().map(|info| (info.id, info)).collect();

    let unit_of = |row: &VoteRow| known.contains_key(&row.unit_id).then_some(row.unit_id);
    let alliance_of = |row: &VoteRow| candidates.get(row.candidate_id);
    let mut aggregation = Aggregation::default();
    let mut row_count = 0usize;
    store
        .stream_votes(election, scope, &mut |chunk: Vec<VoteRow>| {
            row_count += chunk.len();
            aggregation = std::mem::take(&mut aggregation).absorb(chunk, unit_of, alliance_of);
        })
        .await?;
    let aggregation = aggregation.seed_units(known.keys().copied());

    debug!(
        "{} in {}: {} units, {} vote rows, {} candidates",
        election.label(),
        scope,
        known.len(),
        row_count,
        candidates.len()
    );
    if candidates.is_empty() && row_count > 0 {
        warn!("No candidates resolved for the {} in {}", election.label(), scope);
    }

    let skipped_rows = aggregation.skipped_rows;
    if skipped_rows > 0 {
        warn!(
            "Skipped {} vote rows in {} for the {}: unknown unit or candidate",
            skipped_rows,
            scope,
            election.label()
        );
    }

    let units = aggregation.into_units(|id| known.get(&id).map(|info| info.label.clone()).unwrap_or_default());
    let localbody_of = known
        .values()
        .filter_map(|info| info.localbody.map(|code| (info.id, code)))
        .collect();
    let assembly_of = known
        .values()
        .filter_map(|info| info.assembly.map(|code| (info.id, code)))
        .collect();

    Ok(UnitSnapshot {
        units,
        localbody_of,
        assembly_of,
        skipped_rows,
    })
}

pub(crate) async fn report_named<S>(
    store: &S,
    election: Election,
    scope: Scope,
    name: Option<String>,
) -> Result<AnalysisResult, AnalysisError>
where
    S: ElectionStore + ?Sized,
{
    let snapshot = scope_units(store, election, scope).await?;
    let mut summary = ScopeSummary::from_units(scope, snapshot.units);
    summary.name = name;

    Ok(AnalysisResult {
        election,
        label: election.label(),
        unit_kind: UnitKind::for_election(election),
        summary,
        skipped_rows: snapshot.skipped_rows,
    })
}

/// Unit level report for a localbody or assembly constituency.
pub async fn scope_report<S>(store: &S, election: Election, scope: Scope) -> Result<AnalysisResult, AnalysisError>
where
    S: ElectionStore + ?Sized,
{
    let name = ensure_scope(store, scope).await?;
    report_named(store, election, scope, name).await
}

/// District report broken down by localbody (ward elections) or assembly
/// constituency (booth elections); state report broken down by district.
pub async fn breakdown<S>(store: &S, election: Election, scope: Scope) -> Result<ScopeBreakdown, AnalysisError>
where
    S: ElectionStore + ?Sized,
{
    let name = ensure_scope(store, scope).await?;
    let snapshot = scope_units(store, election, scope).await?;
    let UnitSnapshot {
        units,
        localbody_of,
        assembly_of,
        skipped_rows,
    } = snapshot;

    // First level: localbodies or assemblies, with their parent district
    let (first_level, names, district_of) = if election.is_ward_based() {
        let localbodies = store.localbodies_in(scope).await?;
        let summaries = rollup(units, |u| localbody_of.get(&u.unit_id).map(|&code| Scope::Localbody(code)));
        let names: HashMap<Scope, String> = localbodies
            .iter()
            .map(|l| (Scope::Localbody(l.code), l.name.clone()))
            .collect();
        let district_of: HashMap<Scope, i64> = localbodies
            .iter()
            .map(|l| (Scope::Localbody(l.code), l.district_code))
            .collect();
        (summaries, names, district_of)
    } else {
        let assemblies = store.assemblies_in(scope).await?;
        let summaries = rollup(units, |u| assembly_of.get(&u.unit_id).map(|&code| Scope::Assembly(code)));
        let names: HashMap<Scope, String> = assemblies
            .iter()
            .map(|a| (Scope::Assembly(a.code), a.name.clone()))
            .collect();
        let district_of: HashMap<Scope, i64> = assemblies
            .iter()
            .map(|a| (Scope::Assembly(a.code), a.district_code))
            .collect();
        (summaries, names, district_of)
    };
    let first_level: Vec<ScopeSummary> = first_level
        .into_values()
        .map(|summary| match names.get(&summary.scope) {
            Some(name) => summary.with_name(name.clone()),
            None => summary,
        })
        .collect();

    let children = match scope {
        Scope::State => {
            let district_names: HashMap<i64, String> = store
                .districts()
                .await?
                .into_iter()
                .map(|d| (d.code, d.name))
                .collect();
            rollup_scopes(first_level, |child| {
                district_of.get(&child.scope).map(|&code| Scope::District(code))
            })
            .into_values()
            .map(|mut district| {
                if let Scope::District(code) = district.scope {
                    district.name = district_names.get(&code).cloned();
                }
                district
            })
            .collect()
        }
        _ => first_level,
    };

    let mut summary = rollup_scopes(children.iter().cloned(), |_| Some(scope))
        .remove(&scope)
        .unwrap_or_else(|| ScopeSummary::empty(scope));
    summary.name = name;

    Ok(ScopeBreakdown {
        election,
        label: election.label(),
        unit_kind: UnitKind::for_election(election),
        summary,
        children,
        skipped_rows,
    })
}

/// Ward-by-ward (or booth-by-booth) winnability of one localbody.
pub async fn winnability_report<S>(
    store: &S,
    election: Election,
    localbody_code: i64,
    target: &AllianceKey,
    swing_percent: f64,
) -> Result<WinnabilityReport, AnalysisError>
where
    S: ElectionStore + ?Sized,
{
    let scope = Scope::Localbody(localbody_code);
    ensure_scope(store, scope).await?;
    let snapshot = scope_units(store, election, scope).await?;
    Ok(swing::assess(&snapshot.units, target, swing_percent))
}

/// Verdict for every localbody in a district, or the whole state.
///
/// Booths without a localbody are ignored, as are localbodies with no units
/// in this election.
pub async fn state_winnability<S>(
    store: &S,
    election: Election,
    district: Option<i64>,
    target: &AllianceKey,
    swing_percent: f64,
) -> Result<StateWinnability, AnalysisError>
where
    S: ElectionStore + ?Sized,
{
    let scope = district.map(Scope::District).unwrap_or(Scope::State);
    ensure_scope(store, scope).await?;

    let localbodies = store.localbodies_in(scope).await?;
    let snapshot = scope_units(store, election, scope).await?;

    let mut by_localbody: HashMap<i64, Vec<UnitAggregate>> = HashMap::new();
    for unit in snapshot.units {
        if let Some(&code) = snapshot.localbody_of.get(&unit.unit_id) {
            by_localbody.entry(code).or_default().push(unit);
        }
    }

    let mut result = StateWinnability {
        election,
        label: election.label(),
        scope,
        target: target.clone(),
        swing_percent,
        majority: 0,
        possible_with_swing: 0,
        hard: 0,
        localbodies: Vec::new(),
    };

    for localbody in localbodies {
        let Some(units) = by_localbody.remove(&localbody.code) else {
            debug!("{} has no units in the {}", localbody.name, election.label());
            continue;
        };
        let verdict = swing::assess(&units, target, swing_percent).verdict;
        match verdict.verdict {
            Verdict::Majority => result.majority += 1,
            Verdict::PossibleWithSwing => result.possible_with_swing += 1,
            Verdict::Hard => result.hard += 1,
        }
        result.localbodies.push(LocalbodyWinnability {
            code: localbody.code,
            name: localbody.name,
            verdict,
        });
    }

    Ok(result)
}
