use crate::error::StoreError;
use crate::models::{
    Alliance, AssemblyConstituency, BoothVotes, Candidate, District, Election, LbCandidate, LbWardResult, Localbody,
    LoksabhaConstituency,
};
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

/// Writes one import batch inside a single transaction.
///
/// Every write is an upsert, so importing the same batch twice leaves the
/// database unchanged. Nothing is visible to readers until [`commit`].
///
/// [`commit`]: BatchWriter::commit
pub struct BatchWriter<'c> {
    tx: Transaction<'c, Sqlite>,
    rows_written: u64,
}

fn stored_votes(votes: u64, table: &'static str) -> Result<i64, StoreError> {
    i64::try_from(votes).map_err(|_| StoreError::Corrupt {
        table,
        detail: format!("vote count {} does not fit in a column", votes),
    })
}

impl<'c> BatchWriter<'c> {
    pub(crate) fn new(tx: Transaction<'c, Sqlite>) -> Self {
        Self { tx, rows_written: 0 }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub async fn upsert_election(&mut self, election: &Election) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO elections (year, election_type) VALUES (?, ?)
            ON CONFLICT (year) DO UPDATE SET election_type = excluded.election_type
            "#,
        )
        .bind(election.year)
        .bind(election.kind.as_str())
        .execute(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(())
    }

    pub async fn upsert_district(&mut self, district: &District) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO districts (code, name) VALUES (?, ?) ON CONFLICT (code) DO UPDATE SET name = excluded.name",
        )
        .bind(district.code)
        .bind(&district.name)
        .execute(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(())
    }

    pub async fn upsert_loksabha(&mut self, constituency: &LoksabhaConstituency) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO loksabha_constituencies (code, name) VALUES (?, ?)
            ON CONFLICT (code) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(constituency.code)
        .bind(&constituency.name)
        .execute(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(())
    }

    pub async fn upsert_assembly(&mut self, constituency: &AssemblyConstituency) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO assembly_constituencies (code, name, district_code, loksabha_code) VALUES (?, ?, ?, ?)
            ON CONFLICT (code) DO UPDATE SET
                name = excluded.name,
                district_code = excluded.district_code,
                loksabha_code = excluded.loksabha_code
            "#,
        )
        .bind(constituency.code)
        .bind(&constituency.name)
        .bind(constituency.district_code)
        .bind(constituency.loksabha_code)
        .execute(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(())
    }

    pub async fn upsert_localbody(&mut self, localbody: &Localbody) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO localbodies (code, name, district_code) VALUES (?, ?, ?)
            ON CONFLICT (code) DO UPDATE SET name = excluded.name, district_code = excluded.district_code
            "#,
        )
        .bind(localbody.code)
        .bind(&localbody.name)
        .bind(localbody.district_code)
        .execute(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(())
    }

    /// Names are stored normalized (trimmed, upper case).
    pub async fn upsert_alliance(&mut self, name: &str, color: Option<&str>) -> Result<Alliance, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO alliances (name, color) VALUES (?, ?)
            ON CONFLICT (name) DO UPDATE SET color = COALESCE(excluded.color, alliances.color)
            RETURNING id, name, color
            "#,
        )
        .bind(name.trim().to_uppercase())
        .bind(color)
        .fetch_one(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(Alliance {
            id: row.get("id"),
            name: row.get("name"),
            color: row.get("color"),
        })
    }

    pub async fn upsert_party(
        &mut self,
        name: &str,
        short_name: &str,
        alliance_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO parties (name, short_name, alliance_id) VALUES (?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                short_name = excluded.short_name,
                alliance_id = COALESCE(excluded.alliance_id, parties.alliance_id)
            RETURNING id
            "#,
        )
        .bind(name.trim())
        .bind(short_name.trim())
        .bind(alliance_id)
        .fetch_one(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(row.get("id"))
    }

    /// Looks a party up by short name first, then by full name, ignoring case.
    pub async fn party_id(&mut self, reference: &str) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id FROM parties
            WHERE short_name = ?1 COLLATE NOCASE OR name = ?1 COLLATE NOCASE
            ORDER BY (short_name = ?1 COLLATE NOCASE) DESC, id
            LIMIT 1
            "#,
        )
        .bind(reference.trim())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|row| row.get("id")))
    }

    pub async fn map_party_alliance(
        &mut self,
        party_id: i64,
        alliance_id: i64,
        election: Election,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO party_alliances (party_id, alliance_id, election_year, election_type) VALUES (?, ?, ?, ?)
            ON CONFLICT (party_id, election_year, election_type) DO UPDATE SET alliance_id = excluded.alliance_id
            "#,
        )
        .bind(party_id)
        .bind(alliance_id)
        .bind(election.year)
        .bind(election.kind.as_str())
        .execute(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(())
    }

    pub async fn upsert_ward(
        &mut self,
        localbody_code: i64,
        ward_num: i32,
        ward_name: &str,
        delimitation_year: Option<i32>,
        assembly_code: Option<i64>,
        details_id: Option<&str>,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO wards (localbody_code, ward_num, ward_name, delimitation_year, assembly_code, details_id)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (localbody_code, ward_num) DO UPDATE SET
                ward_name = excluded.ward_name,
                delimitation_year = COALESCE(excluded.delimitation_year, wards.delimitation_year),
                assembly_code = COALESCE(excluded.assembly_code, wards.assembly_code),
                details_id = COALESCE(excluded.details_id, wards.details_id)
            RETURNING id
            "#,
        )
        .bind(localbody_code)
        .bind(ward_num)
        .bind(ward_name)
        .bind(delimitation_year)
        .bind(assembly_code)
        .bind(details_id)
        .fetch_one(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(row.get("id"))
    }

    pub async fn ward_id(&mut self, localbody_code: i64, ward_num: i32) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query("SELECT id FROM wards WHERE localbody_code = ? AND ward_num = ?")
            .bind(localbody_code)
            .bind(ward_num)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|row| row.get("id")))
    }

    pub async fn upsert_polling_station(
        &mut self,
        assembly_code: i64,
        number: i32,
        name: &str,
        localbody_code: Option<i64>,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO polling_stations (assembly_code, number, name, localbody_code) VALUES (?, ?, ?, ?)
            ON CONFLICT (assembly_code, number) DO UPDATE SET
                name = excluded.name,
                localbody_code = COALESCE(excluded.localbody_code, polling_stations.localbody_code)
            RETURNING id
            "#,
        )
        .bind(assembly_code)
        .bind(number)
        .bind(name)
        .bind(localbody_code)
        .fetch_one(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(row.get("id"))
    }

    pub async fn polling_station_id(&mut self, assembly_code: i64, number: i32) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query("SELECT id FROM polling_stations WHERE assembly_code = ? AND number = ?")
            .bind(assembly_code)
            .bind(number)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|row| row.get("id")))
    }

    /// Merges on (name, localbody, year). A merge keeps the stored party
    /// when `party_id` is `None`.
    pub async fn upsert_lb_candidate(
        &mut self,
        name: &str,
        party_id: Option<i64>,
        localbody_code: i64,
        year: i32,
    ) -> Result<LbCandidate, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO lb_candidates (name, party_id, localbody_code, election_year) VALUES (?, ?, ?, ?)
            ON CONFLICT (name, localbody_code, election_year) DO UPDATE SET
                party_id = COALESCE(excluded.party_id, lb_candidates.party_id)
            RETURNING id, name, party_id, localbody_code, election_year
            "#,
        )
        .bind(name.trim())
        .bind(party_id)
        .bind(localbody_code)
        .bind(year)
        .fetch_one(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(LbCandidate {
            id: row.get("id"),
            name: row.get("name"),
            party_id: row.get("party_id"),
            localbody_code: row.get("localbody_code"),
            election_year: row.get("election_year"),
        })
    }

    /// Merges on (name, constituency, year).
    pub async fn upsert_candidate(
        &mut self,
        name: &str,
        party_id: Option<i64>,
        constituency_code: i64,
        year: i32,
    ) -> Result<Candidate, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO candidates (name, party_id, constituency_code, election_year) VALUES (?, ?, ?, ?)
            ON CONFLICT (name, constituency_code, election_year) DO UPDATE SET
                party_id = COALESCE(excluded.party_id, candidates.party_id)
            RETURNING id, name, party_id, constituency_code, election_year
            "#,
        )
        .bind(name.trim())
        .bind(party_id)
        .bind(constituency_code)
        .bind(year)
        .fetch_one(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(Candidate {
            id: row.get("id"),
            name: row.get("name"),
            party_id: row.get("party_id"),
            constituency_code: row.get("constituency_code"),
            election_year: row.get("election_year"),
        })
    }

    /// Replaces the vote count of an existing (ward, candidate, year) fact.
    pub async fn upsert_ward_result(&mut self, result: &LbWardResult) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO lb_ward_results (ward_id, candidate_id, votes, election_year) VALUES (?, ?, ?, ?)
            ON CONFLICT (ward_id, candidate_id, election_year) DO UPDATE SET votes = excluded.votes
            "#,
        )
        .bind(result.ward_id)
        .bind(result.candidate_id)
        .bind(stored_votes(result.votes, "lb_ward_results")?)
        .bind(result.election_year)
        .execute(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(())
    }

    pub async fn upsert_booth_votes(&mut self, votes: &BoothVotes) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO booth_votes (polling_station_id, candidate_id, votes, year) VALUES (?, ?, ?, ?)
            ON CONFLICT (polling_station_id, candidate_id, year) DO UPDATE SET votes = excluded.votes
            "#,
        )
        .bind(votes.polling_station_id)
        .bind(votes.candidate_id)
        .bind(stored_votes(votes.votes, "booth_votes")?)
        .bind(votes.year)
        .execute(&mut *self.tx)
        .await?;
        self.rows_written += 1;
        Ok(())
    }

    pub async fn record_import_run(
        &mut self,
        id: Uuid,
        source: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO import_runs (id, source, started_at, finished_at, rows_written)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(source)
        .bind(started_at.to_rfc3339())
        .bind(finished_at.to_rfc3339())
        .bind(self.rows_written as i64)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn commit(self) -> Result<u64, StoreError> {
        self.tx.commit().await?;
        Ok(self.rows_written)
    }
}
