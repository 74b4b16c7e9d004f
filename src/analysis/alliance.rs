use crate::models::{AllianceKey, Election, Party, PartyAllianceMapping};
use std::collections::HashMap;

/// Resolves parties to the alliance they contested under in one election.
///
/// Holds a read-only snapshot of the party-alliance mappings for that
/// election's year and type.
#[derive(Debug, Clone)]
pub struct AllianceResolver {
    election: Election,
    mapped: HashMap<i64, AllianceKey>,
}

impl AllianceResolver {
    /// Mappings for any other year or election type are ignored.
    pub fn for_election(election: Election, mappings: impl IntoIterator<Item = PartyAllianceMapping>) -> Self {
        let mapped = mappings
            .into_iter()
            .filter(|m| m.election_year == election.year && m.election_type == election.kind)
            .map(|m| (m.party_id, AllianceKey::from_name(&m.alliance)))
            .collect();
        Self { election, mapped }
    }

    /// Election-specific mapping first, then the party's default alliance,
    /// then `Other`. Independents (no party) are always `Other`.
    pub fn resolve(&self, party: Option<&Party>) -> AllianceKey {
        let Some(party) = party else {
            return AllianceKey::Other;
        };
        if let Some(alliance) = self.mapped.get(&party.id) {
            return alliance.clone();
        }
        party
            .alliance
            .as_deref()
            .map(AllianceKey::from_name)
            .unwrap_or(AllianceKey::Other)
    }
}

/// Candidate id -> alliance for one election.
#[derive(Debug, Clone, Default)]
pub struct CandidateAlliances {
    by_candidate: HashMap<i64, AllianceKey>,
}

impl CandidateAlliances {
    pub fn build(resolver: &AllianceResolver, candidates: impl IntoIterator<Item = (i64, Option<Party>)>) -> Self {
        let by_candidate = candidates
            .into_iter()
            .map(|(candidate_id, party)| (candidate_id, resolver.resolve(party.as_ref())))
            .collect();
        Self { by_candidate }
    }

    pub fn get(&self, candidate_id: i64) -> Option<AllianceKey> {
        self.by_candidate.get(&candidate_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_candidate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_candidate.is_empty()
    }
}
