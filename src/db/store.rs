use crate::error::StoreError;
use crate::models::{
    AssemblyConstituency, District, Election, Localbody, Party, PartyAllianceMapping, PollingStation, Scope,
    VoteRow, Ward,
};
use async_trait::async_trait;

/// Upper bound on the vote rows held in memory while streaming.
pub const VOTE_CHUNK: usize = 1024;

/// Read-only queries the analysis pipelines run against stored election data.
///
/// Every call returns an owned snapshot; nothing in the analysis layer writes
/// through this trait.
#[async_trait]
pub trait ElectionStore: Send + Sync {
    /// Registered elections, used when no registry file is configured.
    async fn elections(&self) -> Result<Vec<Election>, StoreError>;

    async fn district(&self, code: i64) -> Result<Option<District>, StoreError>;

    async fn localbody(&self, code: i64) -> Result<Option<Localbody>, StoreError>;

    async fn assembly_constituency(&self, code: i64) -> Result<Option<AssemblyConstituency>, StoreError>;

    async fn districts(&self) -> Result<Vec<District>, StoreError>;

    /// Localbodies inside `scope`. For an assembly scope these are the
    /// localbodies with at least one ward mapped to that assembly.
    async fn localbodies_in(&self, scope: Scope) -> Result<Vec<Localbody>, StoreError>;

    /// Assembly constituencies inside `scope`. For a localbody scope these are
    /// the constituencies its polling stations belong to.
    async fn assemblies_in(&self, scope: Scope) -> Result<Vec<AssemblyConstituency>, StoreError>;

    /// Wards inside `scope`; an assembly scope only matches mapped wards.
    async fn wards_in(&self, scope: Scope) -> Result<Vec<Ward>, StoreError>;

    async fn polling_stations_in(&self, scope: Scope) -> Result<Vec<PollingStation>, StoreError>;

    /// Streams the vote rows of `election` inside `scope` into `sink`, in
    /// chunks of at most [`VOTE_CHUNK`] rows. Localbody elections yield ward
    /// results keyed by ward id, the others booth votes keyed by polling
    /// station id.
    async fn stream_votes(
        &self,
        election: Election,
        scope: Scope,
        sink: &mut (dyn FnMut(Vec<VoteRow>) + Send),
    ) -> Result<(), StoreError>;

    /// Candidates of `election` with at least one vote row inside `scope`,
    /// with their party if any.
    async fn candidate_parties(&self, election: Election, scope: Scope)
        -> Result<Vec<(i64, Option<Party>)>, StoreError>;

    async fn party_alliance_mappings(&self, election: Election) -> Result<Vec<PartyAllianceMapping>, StoreError>;
}

/// Drains [`ElectionStore::stream_votes`] into one list.
#[cfg(test)]
pub(crate) async fn collect_votes<S>(store: &S, election: Election, scope: Scope) -> Result<Vec<VoteRow>, StoreError>
where
    S: ElectionStore + ?Sized,
{
    let mut rows = Vec::new();
    store.stream_votes(election, scope, &mut |chunk| rows.extend(chunk)).await?;
    Ok(rows)
}
