use crate::error::AnalysisError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Wire label for votes that belong to no known alliance.
pub const OTHER_LABEL: &str = "OTH";

/// Ward id for localbody elections, polling station id otherwise.
pub type UnitId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElectionType {
    Loksabha,
    Assembly,
    Localbody,
}

impl ElectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElectionType::Loksabha => "LOKSABHA",
            ElectionType::Assembly => "ASSEMBLY",
            ElectionType::Localbody => "LOCALBODY",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ElectionType::Loksabha => "Loksabha",
            ElectionType::Assembly => "Assembly",
            ElectionType::Localbody => "Localbody",
        }
    }
}

impl fmt::Display for ElectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOKSABHA" => Ok(ElectionType::Loksabha),
            "ASSEMBLY" => Ok(ElectionType::Assembly),
            "LOCALBODY" => Ok(ElectionType::Localbody),
            other => Err(format!("Unknown election type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Election {
    pub year: i32,
    #[serde(rename = "type")]
    pub kind: ElectionType,
}

impl Election {
    pub fn new(year: i32, kind: ElectionType) -> Self {
        Self { year, kind }
    }

    /// e.g. "2015 Localbody Election"
    pub fn label(&self) -> String {
        format!("{} {} Election", self.year, self.kind.title())
    }

    /// Localbody elections are counted per ward, everything else per polling booth.
    pub fn is_ward_based(&self) -> bool {
        self.kind == ElectionType::Localbody
    }
}

/// Immutable year -> election type table.
///
/// Built once from configuration or the `elections` table and handed to the
/// history composer; every year maps to exactly one type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionRegistry {
    years: BTreeMap<i32, ElectionType>,
}

impl ElectionRegistry {
    pub fn new(elections: impl IntoIterator<Item = Election>) -> Result<Self, AnalysisError> {
        let mut years = BTreeMap::new();
        for election in elections {
            match years.get(&election.year) {
                Some(&first) if first != election.kind => {
                    return Err(AnalysisError::ConflictingElection {
                        year: election.year,
                        first,
                        second: election.kind,
                    });
                }
                _ => {
                    years.insert(election.year, election.kind);
                }
            }
        }
        Ok(Self { years })
    }

    pub fn get(&self, year: i32) -> Option<Election> {
        self.years.get(&year).map(|&kind| Election::new(year, kind))
    }

    pub fn require(&self, year: i32) -> Result<Election, AnalysisError> {
        self.get(year).ok_or(AnalysisError::UnknownElection(year))
    }

    /// Ascending, de-duplicated elections for the requested years.
    ///
    /// An empty request selects every registered year; years missing from the
    /// registry are dropped.
    pub fn select(&self, requested: &[i32]) -> Vec<Election> {
        self.years
            .iter()
            .filter(|(year, _)| requested.is_empty() || requested.contains(year))
            .map(|(&year, &kind)| Election::new(year, kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Administrative level a summary is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "level", content = "code", rename_all = "snake_case")]
pub enum Scope {
    Localbody(i64),
    Assembly(i64),
    District(i64),
    State,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Localbody(code) => write!(f, "localbody {}", code),
            Scope::Assembly(code) => write!(f, "assembly constituency {}", code),
            Scope::District(code) => write!(f, "district {}", code),
            Scope::State => f.write_str("state"),
        }
    }
}

/// Alliance a vote is credited to.
///
/// `Other` covers independents, parties without a mapping and unknown
/// alliances. It is written as "OTH" only when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AllianceKey {
    Named(String),
    Other,
}

impl AllianceKey {
    /// Trims and upper-cases `raw`; blank names and "OTH" collapse to `Other`.
    pub fn from_name(raw: &str) -> Self {
        let name = raw.trim().to_uppercase();
        if name.is_empty() || name == OTHER_LABEL {
            AllianceKey::Other
        } else {
            AllianceKey::Named(name)
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AllianceKey::Named(name) => name,
            AllianceKey::Other => OTHER_LABEL,
        }
    }

    pub fn is_other(&self) -> bool {
        matches!(self, AllianceKey::Other)
    }
}

// Alphabetical on the wire label; this is the tie-break order used by ranking.
impl Ord for AllianceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.label()
            .cmp(other.label())
            .then_with(|| self.is_other().cmp(&other.is_other()))
    }
}

impl PartialOrd for AllianceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AllianceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for AllianceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for AllianceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AllianceKey::from_name(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alliance {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    // Name of the party's default alliance, if any
    pub alliance: Option<String>,
}

/// Alliance a party contested under in one particular election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyAllianceMapping {
    pub party_id: i64,
    pub alliance: String,
    pub election_year: i32,
    pub election_type: ElectionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub party_id: Option<i64>,
    pub constituency_code: i64,
    pub election_year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbCandidate {
    pub id: i64,
    pub name: String,
    pub party_id: Option<i64>,
    pub localbody_code: i64,
    pub election_year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    pub code: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoksabhaConstituency {
    pub code: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyConstituency {
    pub code: i64,
    pub name: String,
    pub district_code: i64,
    pub loksabha_code: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localbody {
    pub code: i64,
    pub name: String,
    pub district_code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    pub id: i64,
    pub localbody_code: i64,
    pub ward_num: i32,
    pub ward_name: String,
    pub delimitation_year: Option<i32>,
    pub assembly_code: Option<i64>,
    // Stable identifier carried over from the legacy store
    pub details_id: Option<String>,
}

impl Ward {
    pub fn label(&self) -> String {
        format!("{} - {}", self.ward_num, self.ward_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingStation {
    pub id: i64,
    pub assembly_code: i64,
    pub number: i32,
    pub name: String,
    pub localbody_code: Option<i64>,
}

impl PollingStation {
    pub fn label(&self) -> String {
        format!("{} - {}", self.number, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothVotes {
    pub polling_station_id: i64,
    pub candidate_id: i64,
    pub votes: u64,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbWardResult {
    pub ward_id: i64,
    pub candidate_id: i64,
    pub votes: u64,
    pub election_year: i32,
}

/// One candidate's votes in one counting unit, as fed to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRow {
    pub unit_id: UnitId,
    pub candidate_id: i64,
    pub votes: u64,
}
