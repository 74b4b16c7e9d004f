//! In-memory `ElectionStore` for pipeline tests.

use crate::db::ElectionStore;
use crate::error::StoreError;
use crate::models::{
    AssemblyConstituency, District, Election, ElectionType, Localbody, Party, PartyAllianceMapping,
    PollingStation, Scope, VoteRow, Ward,
};
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct FakeStore {
    pub elections: Vec<Election>,
    pub districts: Vec<District>,
    pub localbodies: Vec<Localbody>,
    pub assemblies: Vec<AssemblyConstituency>,
    pub wards: Vec<Ward>,
    pub stations: Vec<PollingStation>,
    pub ward_results: Vec<(i32, VoteRow)>,
    pub booth_votes: Vec<(i32, VoteRow)>,
    // (year, ward based, candidate id, party)
    pub candidates: Vec<(i32, bool, i64, Option<Party>)>,
    pub mappings: Vec<PartyAllianceMapping>,
}

fn party(id: i64, short_name: &str, alliance: Option<&str>) -> Party {
    Party {
        id,
        name: format!("{} party", short_name),
        short_name: short_name.to_string(),
        alliance: alliance.map(str::to_string),
    }
}

fn ward(id: i64, localbody_code: i64, ward_num: i32, name: &str) -> Ward {
    Ward {
        id,
        localbody_code,
        ward_num,
        ward_name: name.to_string(),
        delimitation_year: Some(2015),
        assembly_code: Some(120),
        details_id: None,
    }
}

// Small enough that every fixture election arrives in several chunks
const CHUNK: usize = 2;

fn vote(unit_id: i64, candidate_id: i64, votes: u64) -> VoteRow {
    VoteRow { unit_id, candidate_id, votes }
}

impl FakeStore {
    /// Two districts, two localbodies and one assembly constituency.
    ///
    /// 2020 localbody election: Alpha (district 1) has the three wards
    /// A (LDF 500, UDF 450), B (LDF 300, UDF 500) and C (LDF 600, OTH 100),
    /// plus one row for an unknown candidate. Beta (district 2) has one ward
    /// (UDF 80, LDF 20).
    ///
    /// 2021 assembly election: constituency 120 has booth 1 in Alpha
    /// (LDF 400, UDF 300) and booth 2 with no localbody (LDF 100, UDF 250).
    pub fn kerala() -> Self {
        let cpm = party(1, "CPM", Some("LDF"));
        let inc = party(2, "INC", Some("UDF"));

        Self {
            elections: vec![
                Election::new(2020, ElectionType::Localbody),
                Election::new(2021, ElectionType::Assembly),
                Election::new(2024, ElectionType::Loksabha),
            ],
            districts: vec![
                District { code: 1, name: "Kollam".into() },
                District { code: 2, name: "Idukki".into() },
            ],
            localbodies: vec![
                Localbody { code: 10, name: "Alpha".into(), district_code: 1 },
                Localbody { code: 20, name: "Beta".into(), district_code: 2 },
            ],
            assemblies: vec![AssemblyConstituency {
                code: 120,
                name: "Chavara".into(),
                district_code: 1,
                loksabha_code: None,
            }],
            wards: vec![
                ward(1, 10, 1, "A"),
                ward(2, 10, 2, "B"),
                ward(3, 10, 3, "C"),
                Ward { assembly_code: None, ..ward(4, 20, 1, "Hill") },
            ],
            stations: vec![
                PollingStation { id: 1, assembly_code: 120, number: 1, name: "School".into(), localbody_code: Some(10) },
                PollingStation { id: 2, assembly_code: 120, number: 2, name: "Library".into(), localbody_code: None },
            ],
            ward_results: vec![
                (2020, vote(1, 11, 500)),
                (2020, vote(1, 12, 450)),
                (2020, vote(1, 999, 5)),
                (2020, vote(2, 13, 300)),
                (2020, vote(2, 14, 500)),
                (2020, vote(3, 15, 600)),
                (2020, vote(3, 16, 100)),
                (2020, vote(4, 17, 80)),
                (2020, vote(4, 18, 20)),
            ],
            booth_votes: vec![
                (2021, vote(1, 101, 400)),
                (2021, vote(1, 102, 300)),
                (2021, vote(2, 101, 100)),
                (2021, vote(2, 102, 250)),
            ],
            candidates: vec![
                (2020, true, 11, Some(cpm.clone())),
                (2020, true, 12, Some(inc.clone())),
                (2020, true, 13, Some(cpm.clone())),
                (2020, true, 14, Some(inc.clone())),
                (2020, true, 15, Some(cpm.clone())),
                (2020, true, 16, None),
                (2020, true, 17, Some(inc.clone())),
                (2020, true, 18, Some(cpm.clone())),
                (2021, false, 101, Some(cpm)),
                (2021, false, 102, Some(inc)),
            ],
            mappings: Vec::new(),
        }
    }

    fn district_of_localbody(&self, code: i64) -> Option<i64> {
        self.localbodies.iter().find(|l| l.code == code).map(|l| l.district_code)
    }

    fn district_of_assembly(&self, code: i64) -> Option<i64> {
        self.assemblies.iter().find(|a| a.code == code).map(|a| a.district_code)
    }

    fn ward_in(&self, ward: &Ward, scope: Scope) -> bool {
        match scope {
            Scope::Localbody(code) => ward.localbody_code == code,
            Scope::Assembly(code) => ward.assembly_code == Some(code),
            Scope::District(code) => self.district_of_localbody(ward.localbody_code) == Some(code),
            Scope::State => true,
        }
    }

    fn station_in(&self, station: &PollingStation, scope: Scope) -> bool {
        match scope {
            Scope::Localbody(code) => station.localbody_code == Some(code),
            Scope::Assembly(code) => station.assembly_code == code,
            Scope::District(code) => self.district_of_assembly(station.assembly_code) == Some(code),
            Scope::State => true,
        }
    }

    fn votes_in(&self, election: Election, scope: Scope) -> Vec<VoteRow> {
        if election.is_ward_based() {
            self.ward_results
                .iter()
                .filter(|(year, row)| {
                    *year == election.year && self.wards.iter().any(|w| w.id == row.unit_id && self.ward_in(w, scope))
                })
                .map(|(_, row)| *row)
                .collect()
        } else {
            self.booth_votes
                .iter()
                .filter(|(year, row)| {
                    *year == election.year
                        && self.stations.iter().any(|p| p.id == row.unit_id && self.station_in(p, scope))
                })
                .map(|(_, row)| *row)
                .collect()
        }
    }
}

#[async_trait]
impl ElectionStore for FakeStore {
    async fn elections(&self) -> Result<Vec<Election>, StoreError> {
        Ok(self.elections.clone())
    }

    async fn district(&self, code: i64) -> Result<Option<District>, StoreError> {
        Ok(self.districts.iter().find(|d| d.code == code).cloned())
    }

    async fn localbody(&self, code: i64) -> Result<Option<Localbody>, StoreError> {
        Ok(self.localbodies.iter().find(|l| l.code == code).cloned())
    }

    async fn assembly_constituency(&self, code: i64) -> Result<Option<AssemblyConstituency>, StoreError> {
        Ok(self.assemblies.iter().find(|a| a.code == code).cloned())
    }

    async fn districts(&self) -> Result<Vec<District>, StoreError> {
        Ok(self.districts.clone())
    }

    async fn localbodies_in(&self, scope: Scope) -> Result<Vec<Localbody>, StoreError> {
        Ok(self
            .localbodies
            .iter()
            .filter(|l| match scope {
                Scope::Localbody(code) => l.code == code,
                Scope::Assembly(code) => self
                    .wards
                    .iter()
                    .any(|w| w.localbody_code == l.code && w.assembly_code == Some(code)),
                Scope::District(code) => l.district_code == code,
                Scope::State => true,
            })
            .cloned()
            .collect())
    }

    async fn assemblies_in(&self, scope: Scope) -> Result<Vec<AssemblyConstituency>, StoreError> {
        Ok(self
            .assemblies
            .iter()
            .filter(|a| match scope {
                Scope::Localbody(code) => self
                    .stations
                    .iter()
                    .any(|p| p.assembly_code == a.code && p.localbody_code == Some(code)),
                Scope::Assembly(code) => a.code == code,
                Scope::District(code) => a.district_code == code,
                Scope::State => true,
            })
            .cloned()
            .collect())
    }

    async fn wards_in(&self, scope: Scope) -> Result<Vec<Ward>, StoreError> {
        Ok(self.wards.iter().filter(|w| self.ward_in(w, scope)).cloned().collect())
    }

    async fn polling_stations_in(&self, scope: Scope) -> Result<Vec<PollingStation>, StoreError> {
        Ok(self.stations.iter().filter(|p| self.station_in(p, scope)).cloned().collect())
    }

    async fn stream_votes(
        &self,
        election: Election,
        scope: Scope,
        sink: &mut (dyn FnMut(Vec<VoteRow>) + Send),
    ) -> Result<(), StoreError> {
        for chunk in self.votes_in(election, scope).chunks(CHUNK) {
            sink(chunk.to_vec());
        }
        Ok(())
    }

    async fn candidate_parties(
        &self,
        election: Election,
        scope: Scope,
    ) -> Result<Vec<(i64, Option<Party>)>, StoreError> {
        let voted = self.votes_in(election, scope);
        Ok(self
            .candidates
            .iter()
            .filter(|(year, ward_based, id, _)| {
                *year == election.year
                    && *ward_based == election.is_ward_based()
                    && voted.iter().any(|row| row.candidate_id == *id)
            })
            .map(|(_, _, id, party)| (*id, party.clone()))
            .collect())
    }

    async fn party_alliance_mappings(&self, election: Election) -> Result<Vec<PartyAllianceMapping>, StoreError> {
        Ok(self
            .mappings
            .iter()
            .filter(|m| m.election_year == election.year && m.election_type == election.kind)
            .cloned()
            .collect())
    }
}
