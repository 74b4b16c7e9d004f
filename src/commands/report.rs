use crate::analysis::history::{self, HistoryTarget};
use crate::analysis::pipeline::{self, AnalysisResult, ScopeBreakdown, StateWinnability};
use crate::analysis::swing::WinnabilityReport;
use crate::db::ElectionStore;
use crate::error::AnalysisError;
use crate::models::{AllianceKey, ElectionRegistry, Scope};
use std::collections::BTreeMap;

/// Report requests, resolved against an election registry.
///
/// Each request names an election by year; the registry decides whether it
/// is counted per ward or per booth.
pub struct Reports<'a, S: ElectionStore + ?Sized> {
    store: &'a S,
    registry: &'a ElectionRegistry,
}

impl<'a, S: ElectionStore + ?Sized> Reports<'a, S> {
    pub fn new(store: &'a S, registry: &'a ElectionRegistry) -> Self {
        Self { store, registry }
    }

    pub async fn localbody(&self, code: i64, year: i32) -> Result<AnalysisResult, AnalysisError> {
        let election = self.registry.require(year)?;
        pipeline::scope_report(self.store, election, Scope::Localbody(code)).await
    }

    pub async fn assembly(&self, code: i64, year: i32) -> Result<AnalysisResult, AnalysisError> {
        let election = self.registry.require(year)?;
        pipeline::scope_report(self.store, election, Scope::Assembly(code)).await
    }

    pub async fn district(&self, code: i64, year: i32) -> Result<ScopeBreakdown, AnalysisError> {
        let election = self.registry.require(year)?;
        pipeline::breakdown(self.store, election, Scope::District(code)).await
    }

    pub async fn state(&self, year: i32) -> Result<ScopeBreakdown, AnalysisError> {
        let election = self.registry.require(year)?;
        pipeline::breakdown(self.store, election, Scope::State).await
    }

    pub async fn winnable(
        &self,
        localbody: i64,
        year: i32,
        alliance: &str,
        swing_percent: f64,
    ) -> Result<WinnabilityReport, AnalysisError> {
        let election = self.registry.require(year)?;
        let target = AllianceKey::from_name(alliance);
        pipeline::winnability_report(self.store, election, localbody, &target, swing_percent).await
    }

    pub async fn winnable_state(
        &self,
        year: i32,
        district: Option<i64>,
        alliance: &str,
        swing_percent: f64,
    ) -> Result<StateWinnability, AnalysisError> {
        let election = self.registry.require(year)?;
        let target = AllianceKey::from_name(alliance);
        pipeline::state_winnability(self.store, election, district, &target, swing_percent).await
    }

    pub async fn history(
        &self,
        target: HistoryTarget,
        years: &[i32],
    ) -> Result<BTreeMap<i32, AnalysisResult>, AnalysisError> {
        history::compose_history(self.store, self.registry, target, years).await
    }
}
