use crate::db::{BatchWriter, Database};
use crate::error::ImportError;
use crate::models::{
    AssemblyConstituency, BoothVotes, District, Election, ElectionType, LbWardResult, Localbody,
    LoksabhaConstituency,
};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct AllianceRecord {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartyRecord {
    pub name: String,
    pub short_name: String,
    // Default alliance; created if it does not exist yet
    pub alliance: Option<String>,
}

/// Alliance a party contested under in one election.
#[derive(Debug, Clone, Deserialize)]
pub struct PartyAllianceRecord {
    pub party: String,
    pub alliance: String,
    pub year: i32,
    #[serde(rename = "type")]
    pub kind: ElectionType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WardRecord {
    pub localbody: i64,
    pub ward_num: i32,
    pub name: String,
    pub delimitation_year: Option<i32>,
    pub assembly: Option<i64>,
    pub details_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingStationRecord {
    pub assembly: i64,
    pub number: i32,
    pub name: String,
    pub localbody: Option<i64>,
}

/// Votes of one candidate in one ward. The candidate is identified by name
/// within the localbody and year; `party` is a short or full party name.
#[derive(Debug, Clone, Deserialize)]
pub struct WardResultRecord {
    pub localbody: i64,
    pub ward_num: i32,
    pub candidate: String,
    pub party: Option<String>,
    pub votes: u64,
    pub year: i32,
}

/// Votes of one candidate in one polling booth. `constituency` is the
/// constituency the candidate stood in and defaults to the booth's assembly
/// constituency.
#[derive(Debug, Clone, Deserialize)]
pub struct BoothResultRecord {
    pub assembly: i64,
    pub station: i32,
    pub constituency: Option<i64>,
    pub candidate: String,
    pub party: Option<String>,
    pub votes: u64,
    pub year: i32,
}

/// One import file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImportBatch {
    pub elections: Vec<Election>,
    pub districts: Vec<District>,
    pub loksabha_constituencies: Vec<LoksabhaConstituency>,
    pub assembly_constituencies: Vec<AssemblyConstituency>,
    pub localbodies: Vec<Localbody>,
    pub alliances: Vec<AllianceRecord>,
    pub parties: Vec<PartyRecord>,
    pub party_alliances: Vec<PartyAllianceRecord>,
    pub wards: Vec<WardRecord>,
    pub polling_stations: Vec<PollingStationRecord>,
    pub ward_results: Vec<WardResultRecord>,
    pub booth_results: Vec<BoothResultRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub source: String,
    pub rows_written: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub fn load_batch(path: &Path) -> Result<ImportBatch, ImportError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Writes `batch` in one transaction and logs the run. Any failure rolls the
/// whole batch back.
pub async fn import_batch(database: &Database, batch: &ImportBatch, source: &str) -> Result<ImportSummary, ImportError> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!("Import {} from {} started", run_id, source);

    let mut writer = database.begin_batch().await?;
    write_batch(&mut writer, batch).await?;

    let finished_at = Utc::now();
    writer.record_import_run(run_id, source, started_at, finished_at).await?;
    let rows_written = writer.commit().await?;
    info!("Import {} finished: {} rows written", run_id, rows_written);

    Ok(ImportSummary {
        run_id,
        source: source.to_string(),
        rows_written,
        started_at,
        finished_at,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// `None` when no party is named, an error when the named party is unknown.
async fn resolve_party(writer: &mut BatchWriter<'_>, party: Option<&str>) -> Result<Option<i64>, ImportError> {
    let Some(reference) = non_blank(party) else {
        return Ok(None);
    };
    match writer.party_id(reference).await? {
        Some(id) => Ok(Some(id)),
        None => Err(ImportError::Unresolved {
            entity: "party",
            reference: reference.to_string(),
        }),
    }
}

async fn write_batch(writer: &mut BatchWriter<'_>, batch: &ImportBatch) -> Result<(), ImportError> {
    for election in &batch.elections {
        writer.upsert_election(election).await?;
    }
    for district in &batch.districts {
        writer.upsert_district(district).await?;
    }
    for constituency in &batch.loksabha_constituencies {
        writer.upsert_loksabha(constituency).await?;
    }
    for constituency in &batch.assembly_constituencies {
        writer.upsert_assembly(constituency).await?;
    }
    for localbody in &batch.localbodies {
        writer.upsert_localbody(localbody).await?;
    }

    for alliance in &batch.alliances {
        writer.upsert_alliance(&alliance.name, non_blank(alliance.color.as_deref())).await?;
    }
    for party in &batch.parties {
        let alliance_id = match non_blank(party.alliance.as_deref()) {
            Some(name) => Some(writer.upsert_alliance(name, None).await?.id),
            None => None,
        };
        writer.upsert_party(&party.name, &party.short_name, alliance_id).await?;
    }
    for mapping in &batch.party_alliances {
        let party_id = resolve_party(writer, Some(mapping.party.as_str()))
            .await?
            .ok_or_else(|| ImportError::Unresolved {
                entity: "party",
                reference: mapping.party.clone(),
            })?;
        let alliance = writer.upsert_alliance(&mapping.alliance, None).await?;
        writer
            .map_party_alliance(party_id, alliance.id, Election::new(mapping.year, mapping.kind))
            .await?;
    }

    for ward in &batch.wards {
        writer
            .upsert_ward(
                ward.localbody,
                ward.ward_num,
                ward.name.trim(),
                ward.delimitation_year,
                ward.assembly,
                non_blank(ward.details_id.as_deref()),
            )
            .await?;
    }
    for station in &batch.polling_stations {
        writer
            .upsert_polling_station(station.assembly, station.number, station.name.trim(), station.localbody)
            .await?;
    }
    debug!("Import wrote {} rows before vote facts", writer.rows_written());

    for record in &batch.ward_results {
        let ward_id = writer
            .ward_id(record.localbody, record.ward_num)
            .await?
            .ok_or_else(|| ImportError::Unresolved {
                entity: "ward",
                reference: format!("{}/{}", record.localbody, record.ward_num),
            })?;
        let party_id = resolve_party(writer, record.party.as_deref()).await?;
        let candidate = writer
            .upsert_lb_candidate(&record.candidate, party_id, record.localbody, record.year)
            .await?;
        writer
            .upsert_ward_result(&LbWardResult {
                ward_id,
                candidate_id: candidate.id,
                votes: record.votes,
                election_year: record.year,
            })
            .await?;
    }

    for record in &batch.booth_results {
        let polling_station_id = writer
            .polling_station_id(record.assembly, record.station)
            .await?
            .ok_or_else(|| ImportError::Unresolved {
                entity: "polling station",
                reference: format!("{}/{}", record.assembly, record.station),
            })?;
        let party_id = resolve_party(writer, record.party.as_deref()).await?;
        let constituency = record.constituency.unwrap_or(record.assembly);
        let candidate = writer
            .upsert_candidate(&record.candidate, party_id, constituency, record.year)
            .await?;
        writer
            .upsert_booth_votes(&BoothVotes {
                polling_station_id,
                candidate_id: candidate.id,
                votes: record.votes,
                year: record.year,
            })
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pipeline;
    use crate::db::{collect_votes, ElectionStore};
    use crate::models::{AllianceKey, Scope};

    const BATCH: &str = r##"{
        "elections": [{"year": 2020, "type": "LOCALBODY"}, {"year": 2021, "type": "ASSEMBLY"}],
        "districts": [{"code": 1, "name": "Kollam"}],
        "assembly_constituencies": [{"code": 120, "name": "Chavara", "district_code": 1, "loksabha_code": null}],
        "localbodies": [{"code": 10, "name": "Alpha", "district_code": 1}],
        "alliances": [{"name": "LDF", "color": "#d00"}, {"name": "UDF"}],
        "parties": [
            {"name": "Communist Party", "short_name": "CPM", "alliance": "LDF"},
            {"name": "Congress", "short_name": "INC", "alliance": "UDF"},
            {"name": "Kerala Congress", "short_name": "KC"}
        ],
        "party_alliances": [{"party": "KC", "alliance": "udf", "year": 2020, "type": "LOCALBODY"}],
        "wards": [
            {"localbody": 10, "ward_num": 1, "name": "A", "assembly": 120},
            {"localbody": 10, "ward_num": 2, "name": "B", "assembly": 120},
            {"localbody": 10, "ward_num": 3, "name": "C"}
        ],
        "polling_stations": [{"assembly": 120, "number": 1, "name": "School", "localbody": 10}],
        "ward_results": [
            {"localbody": 10, "ward_num": 1, "candidate": "Asha", "party": "CPM", "votes": 500, "year": 2020},
            {"localbody": 10, "ward_num": 1, "candidate": "Babu", "party": "INC", "votes": 450, "year": 2020},
            {"localbody": 10, "ward_num": 2, "candidate": "Chitra", "party": "cpm", "votes": 300, "year": 2020},
            {"localbody": 10, "ward_num": 2, "candidate": "Dev", "party": "KC", "votes": 500, "year": 2020},
            {"localbody": 10, "ward_num": 3, "candidate": "Elsa", "party": "Communist Party", "votes": 600, "year": 2020},
            {"localbody": 10, "ward_num": 3, "candidate": "Faisal", "votes": 100, "year": 2020}
        ],
        "booth_results": [
            {"assembly": 120, "station": 1, "candidate": "Gopi", "party": "CPM", "votes": 400, "year": 2021},
            {"assembly": 120, "station": 1, "candidate": "Hari", "party": "INC", "votes": 300, "year": 2021}
        ]
    }"##;

    async fn memory_db() -> Database {
        Database::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn named(name: &str) -> AllianceKey {
        AllianceKey::Named(name.to_string())
    }

    #[tokio::test]
    async fn imported_batch_feeds_the_ward_pipeline() {
        let db = memory_db().await;
        let batch: ImportBatch = serde_json::from_str(BATCH).unwrap();
        let summary = import_batch(&db, &batch, "batch.json").await.unwrap();
        assert!(summary.rows_written > 0);
        assert_eq!(summary.source, "batch.json");

        let election = Election::new(2020, ElectionType::Localbody);
        let report = pipeline::scope_report(&db, election, Scope::Localbody(10)).await.unwrap();
        assert_eq!(report.summary.unit_count, 3);
        assert_eq!(report.summary.totals[&named("LDF")], 1400);
        // KC has no default alliance, only its 2020 mapping
        assert_eq!(report.summary.totals[&named("UDF")], 950);
        assert_eq!(report.summary.totals[&AllianceKey::Other], 100);
        assert_eq!(report.skipped_rows, 0);

        let color: Option<String> = sqlx::query_scalar("SELECT color FROM alliances WHERE name = 'LDF'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(color.as_deref(), Some("#d00"));

        let booths = pipeline::scope_report(&db, Election::new(2021, ElectionType::Assembly), Scope::Assembly(120))
            .await
            .unwrap();
        assert_eq!(booths.summary.total_votes, 700);
    }

    #[tokio::test]
    async fn reimporting_merges_instead_of_duplicating() {
        let db = memory_db().await;
        let batch: ImportBatch = serde_json::from_str(BATCH).unwrap();
        import_batch(&db, &batch, "first.json").await.unwrap();
        import_batch(&db, &batch, "second.json").await.unwrap();

        let election = Election::new(2020, ElectionType::Localbody);
        assert_eq!(db.candidate_parties(election, Scope::State).await.unwrap().len(), 6);
        let rows = collect_votes(&db, election, Scope::State).await.unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows.iter().map(|r| r.votes).sum::<u64>(), 2450);

        let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM import_runs")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(runs, 2);
    }

    #[tokio::test]
    async fn unresolved_reference_rolls_back_the_batch() {
        let db = memory_db().await;
        let mut batch: ImportBatch = serde_json::from_str(BATCH).unwrap();
        batch.ward_results[0].party = Some("XYZ".into());

        let err = import_batch(&db, &batch, "bad.json").await.unwrap_err();
        assert!(matches!(err, ImportError::Unresolved { entity: "party", .. }));
        assert!(db.localbodies_in(Scope::State).await.unwrap().is_empty());
        assert!(db.elections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_for_unknown_wards_are_rejected() {
        let db = memory_db().await;
        let mut batch: ImportBatch = serde_json::from_str(BATCH).unwrap();
        batch.ward_results[0].ward_num = 42;

        let err = import_batch(&db, &batch, "bad.json").await.unwrap_err();
        match err {
            ImportError::Unresolved { entity, reference } => {
                assert_eq!(entity, "ward");
                assert_eq!(reference, "10/42");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn empty_document_is_an_empty_batch() {
        let batch: ImportBatch = serde_json::from_str("{}").unwrap();
        assert!(batch.elections.is_empty());
        assert!(batch.ward_results.is_empty());
    }

    #[test]
    fn negative_votes_fail_to_parse() {
        let raw = r#"{"ward_results": [{"localbody": 1, "ward_num": 1, "candidate": "X", "votes": -5, "year": 2020}]}"#;
        assert!(serde_json::from_str::<ImportBatch>(raw).is_err());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = load_batch(Path::new("/nonexistent/batch.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/batch.json"));
    }
}
