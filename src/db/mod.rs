mod store;
mod writer;

pub use store::ElectionStore;
#[cfg(test)]
pub(crate) use store::collect_votes;
pub use writer::BatchWriter;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{
    AssemblyConstituency, District, Election, ElectionType, Localbody, Party, PartyAllianceMapping,
    PollingStation, Scope, VoteRow, Ward,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use log::{debug, info};
use store::VOTE_CHUNK;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS elections (
        year INTEGER PRIMARY KEY,
        election_type TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS districts (
        code INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS loksabha_constituencies (
        code INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assembly_constituencies (
        code INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        district_code INTEGER NOT NULL,
        loksabha_code INTEGER,
        FOREIGN KEY (district_code) REFERENCES districts(code),
        FOREIGN KEY (loksabha_code) REFERENCES loksabha_constituencies(code)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS localbodies (
        code INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        district_code INTEGER NOT NULL,
        FOREIGN KEY (district_code) REFERENCES districts(code)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alliances (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        color TEXT
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS parties (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        short_name TEXT NOT NULL,
        alliance_id INTEGER,
        FOREIGN KEY (alliance_id) REFERENCES alliances(id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS party_alliances (
        party_id INTEGER NOT NULL,
        alliance_id INTEGER NOT NULL,
        election_year INTEGER NOT NULL,
        election_type TEXT NOT NULL,
        UNIQUE (party_id, election_year, election_type),
        FOREIGN KEY (party_id) REFERENCES parties(id) ON DELETE CASCADE,
        FOREIGN KEY (alliance_id) REFERENCES alliances(id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS wards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        localbody_code INTEGER NOT NULL,
        ward_num INTEGER NOT NULL,
        ward_name TEXT NOT NULL,
        delimitation_year INTEGER,
        assembly_code INTEGER,
        details_id TEXT UNIQUE,
        UNIQUE (localbody_code, ward_num),
        FOREIGN KEY (localbody_code) REFERENCES localbodies(code),
        FOREIGN KEY (assembly_code) REFERENCES assembly_constituencies(code)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS polling_stations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        assembly_code INTEGER NOT NULL,
        number INTEGER NOT NULL,
        name TEXT NOT NULL,
        localbody_code INTEGER,
        UNIQUE (assembly_code, number),
        FOREIGN KEY (assembly_code) REFERENCES assembly_constituencies(code),
        FOREIGN KEY (localbody_code) REFERENCES localbodies(code)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS candidates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        party_id INTEGER,
        constituency_code INTEGER NOT NULL,
        election_year INTEGER NOT NULL,
        UNIQUE (name, constituency_code, election_year),
        FOREIGN KEY (party_id) REFERENCES parties(id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lb_candidates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        party_id INTEGER,
        localbody_code INTEGER NOT NULL,
        election_year INTEGER NOT NULL,
        UNIQUE (name, localbody_code, election_year),
        FOREIGN KEY (party_id) REFERENCES parties(id),
        FOREIGN KEY (localbody_code) REFERENCES localbodies(code)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS booth_votes (
        polling_station_id INTEGER NOT NULL,
        candidate_id INTEGER NOT NULL,
        votes INTEGER NOT NULL CHECK (votes >= 0),
        year INTEGER NOT NULL,
        PRIMARY KEY (polling_station_id, candidate_id, year),
        FOREIGN KEY (polling_station_id) REFERENCES polling_stations(id) ON DELETE CASCADE,
        FOREIGN KEY (candidate_id) REFERENCES candidates(id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lb_ward_results (
        ward_id INTEGER NOT NULL,
        candidate_id INTEGER NOT NULL,
        votes INTEGER NOT NULL CHECK (votes >= 0),
        election_year INTEGER NOT NULL,
        PRIMARY KEY (ward_id, candidate_id, election_year),
        FOREIGN KEY (ward_id) REFERENCES wards(id) ON DELETE CASCADE,
        FOREIGN KEY (candidate_id) REFERENCES lb_candidates(id) ON DELETE CASCADE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS import_runs (
        id TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT NOT NULL,
        rows_written INTEGER NOT NULL
    );
    "#,
];

// Join and condition restricting a query to one scope. Conditions carry at
// most one `?` placeholder, bound to `code`.
struct ScopeFilter {
    join: &'static str,
    condition: &'static str,
    code: Option<i64>,
}

impl ScopeFilter {
    fn where_clause(&self) -> String {
        if self.condition.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.condition)
        }
    }

    fn and_clause(&self) -> String {
        if self.condition.is_empty() {
            String::new()
        } else {
            format!("AND {}", self.condition)
        }
    }

    fn wards(scope: Scope) -> Self {
        match scope {
            Scope::Localbody(code) => Self { join: "", condition: "w.localbody_code = ?", code: Some(code) },
            Scope::Assembly(code) => Self { join: "", condition: "w.assembly_code = ?", code: Some(code) },
            Scope::District(code) => Self {
                join: "JOIN localbodies l ON l.code = w.localbody_code",
                condition: "l.district_code = ?",
                code: Some(code),
            },
            Scope::State => Self { join: "", condition: "", code: None },
        }
    }

    fn polling_stations(scope: Scope) -> Self {
        match scope {
            Scope::Localbody(code) => Self { join: "", condition: "p.localbody_code = ?", code: Some(code) },
            Scope::Assembly(code) => Self { join: "", condition: "p.assembly_code = ?", code: Some(code) },
            Scope::District(code) => Self {
                join: "JOIN assembly_constituencies a ON a.code = p.assembly_code",
                condition: "a.district_code = ?",
                code: Some(code),
            },
            Scope::State => Self { join: "", condition: "", code: None },
        }
    }

    fn localbodies(scope: Scope) -> Self {
        match scope {
            Scope::Localbody(code) => Self { join: "", condition: "code = ?", code: Some(code) },
            Scope::Assembly(code) => Self {
                join: "",
                condition: "code IN (SELECT localbody_code FROM wards WHERE assembly_code = ?)",
                code: Some(code),
            },
            Scope::District(code) => Self { join: "", condition: "district_code = ?", code: Some(code) },
            Scope::State => Self { join: "", condition: "", code: None },
        }
    }

    fn assemblies(scope: Scope) -> Self {
        match scope {
            Scope::Localbody(code) => Self {
                join: "",
                condition: "code IN (SELECT assembly_code FROM polling_stations WHERE localbody_code = ?)",
                code: Some(code),
            },
            Scope::Assembly(code) => Self { join: "", condition: "code = ?", code: Some(code) },
            Scope::District(code) => Self { join: "", condition: "district_code = ?", code: Some(code) },
            Scope::State => Self { join: "", condition: "", code: None },
        }
    }
}

// Vote rows of one election inside one scope. `tail` is the FROM/WHERE part
// and binds the election year, then the scope code if any.
struct VoteSource {
    table: &'static str,
    unit_column: &'static str,
    candidate_table: &'static str,
    tail: String,
    code: Option<i64>,
}

impl VoteSource {
    fn new(election: Election, scope: Scope) -> Self {
        if election.is_ward_based() {
            let filter = ScopeFilter::wards(scope);
            Self {
                table: "lb_ward_results",
                unit_column: "v.ward_id",
                candidate_table: "lb_candidates",
                tail: format!(
                    "FROM lb_ward_results v JOIN wards w ON w.id = v.ward_id {} WHERE v.election_year = ? {}",
                    filter.join,
                    filter.and_clause()
                ),
                code: filter.code,
            }
        } else {
            let filter = ScopeFilter::polling_stations(scope);
            Self {
                table: "booth_votes",
                unit_column: "v.polling_station_id",
                candidate_table: "candidates",
                tail: format!(
                    "FROM booth_votes v JOIN polling_stations p ON p.id = v.polling_station_id {} WHERE v.year = ? {}",
                    filter.join,
                    filter.and_clause()
                ),
                code: filter.code,
            }
        }
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(config: &Config) -> Result<Self, StoreError> {
        Self::connect(&config.database_url, config.max_connections).await
    }

    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        // Create database if it doesn't exist
        let in_memory = db_url.contains(":memory:");
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let mut options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            // An in-memory database lives only as long as its connection
            options = options.min_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(db_url).await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        debug!("Schema initialized ({} tables)", SCHEMA.len());
        Ok(())
    }

    /// Starts a transaction for a batch import.
    pub async fn begin_batch(&self) -> Result<BatchWriter<'static>, StoreError> {
        Ok(BatchWriter::new(self.pool.begin().await?))
    }

    async fn fetch_scoped(&self, sql: &str, filter: &ScopeFilter) -> Result<Vec<SqliteRow>, StoreError> {
        let mut query = sqlx::query(sql);
        if let Some(code) = filter.code {
            query = query.bind(code);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

fn ward_from_row(row: &SqliteRow) -> Ward {
    Ward {
        id: row.get("id"),
        localbody_code: row.get("localbody_code"),
        ward_num: row.get("ward_num"),
        ward_name: row.get("ward_name"),
        delimitation_year: row.get("delimitation_year"),
        assembly_code: row.get("assembly_code"),
        details_id: row.get("details_id"),
    }
}

fn polling_station_from_row(row: &SqliteRow) -> PollingStation {
    PollingStation {
        id: row.get("id"),
        assembly_code: row.get("assembly_code"),
        number: row.get("number"),
        name: row.get("name"),
        localbody_code: row.get("localbody_code"),
    }
}

fn localbody_from_row(row: &SqliteRow) -> Localbody {
    Localbody {
        code: row.get("code"),
        name: row.get("name"),
        district_code: row.get("district_code"),
    }
}

fn assembly_from_row(row: &SqliteRow) -> AssemblyConstituency {
    AssemblyConstituency {
        code: row.get("code"),
        name: row.get("name"),
        district_code: row.get("district_code"),
        loksabha_code: row.get("loksabha_code"),
    }
}

fn vote_row_from_row(row: &SqliteRow, table: &'static str) -> Result<VoteRow, StoreError> {
    let votes = row.get::<i64, _>("votes");
    Ok(VoteRow {
        unit_id: row.get("unit_id"),
        candidate_id: row.get("candidate_id"),
        votes: u64::try_from(votes).map_err(|_| StoreError::Corrupt {
            table,
            detail: format!("negative vote count {}", votes),
        })?,
    })
}

fn election_type_from_str(raw: &str, table: &'static str) -> Result<ElectionType, StoreError> {
    raw.parse::<ElectionType>()
        .map_err(|detail| StoreError::Corrupt { table, detail })
}

#[async_trait]
impl ElectionStore for Database {
    async fn elections(&self) -> Result<Vec<Election>, StoreError> {
        sqlx::query("SELECT year, election_type FROM elections ORDER BY year")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| {
                let kind = election_type_from_str(&row.get::<String, _>("election_type"), "elections")?;
                Ok(Election::new(row.get("year"), kind))
            })
            .collect()
    }

    async fn district(&self, code: i64) -> Result<Option<District>, StoreError> {
        let row = sqlx::query("SELECT code, name FROM districts WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| District {
            code: row.get("code"),
            name: row.get("name"),
        }))
    }

    async fn localbody(&self, code: i64) -> Result<Option<Localbody>, StoreError> {
        let row = sqlx::query("SELECT code, name, district_code FROM localbodies WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(localbody_from_row))
    }

    async fn assembly_constituency(&self, code: i64) -> Result<Option<AssemblyConstituency>, StoreError> {
        let row = sqlx::query(
            "SELECT code, name, district_code, loksabha_code FROM assembly_constituencies WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(assembly_from_row))
    }

    async fn districts(&self) -> Result<Vec<District>, StoreError> {
        let districts = sqlx::query("SELECT code, name FROM districts ORDER BY code")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| District {
                code: row.get("code"),
                name: row.get("name"),
            })
            .collect();
        Ok(districts)
    }

    async fn localbodies_in(&self, scope: Scope) -> Result<Vec<Localbody>, StoreError> {
        let filter = ScopeFilter::localbodies(scope);
        let sql = format!(
            "SELECT code, name, district_code FROM localbodies {} ORDER BY code",
            filter.where_clause()
        );
        let rows = self.fetch_scoped(&sql, &filter).await?;
        Ok(rows.iter().map(localbody_from_row).collect())
    }

    async fn assemblies_in(&self, scope: Scope) -> Result<Vec<AssemblyConstituency>, StoreError> {
        let filter = ScopeFilter::assemblies(scope);
        let sql = format!(
            "SELECT code, name, district_code, loksabha_code FROM assembly_constituencies {} ORDER BY code",
            filter.where_clause()
        );
        let rows = self.fetch_scoped(&sql, &filter).await?;
        Ok(rows.iter().map(assembly_from_row).collect())
    }

    async fn wards_in(&self, scope: Scope) -> Result<Vec<Ward>, StoreError> {
        let filter = ScopeFilter::wards(scope);
        let sql = format!(
            r#"
            SELECT w.id, w.localbody_code, w.ward_num, w.ward_name, w.delimitation_year, w.assembly_code, w.details_id
            FROM wards w
            {}
            {}
            ORDER BY w.localbody_code, w.ward_num
            "#,
            filter.join,
            filter.where_clause()
        );
        let rows = self.fetch_scoped(&sql, &filter).await?;
        Ok(rows.iter().map(ward_from_row).collect())
    }

    async fn polling_stations_in(&self, scope: Scope) -> Result<Vec<PollingStation>, StoreError> {
        let filter = ScopeFilter::polling_stations(scope);
        let sql = format!(
            r#"
            SELECT p.id, p.assembly_code, p.number, p.name, p.localbody_code
            FROM polling_stations p
            {}
            {}
            ORDER BY p.assembly_code, p.number
            "#,
            filter.join,
            filter.where_clause()
        );
        let rows = self.fetch_scoped(&sql, &filter).await?;
        Ok(rows.iter().map(polling_station_from_row).collect())
    }

    async fn stream_votes(
        &self,
        election: Election,
        scope: Scope,
        sink: &mut (dyn FnMut(Vec<VoteRow>) + Send),
    ) -> Result<(), StoreError> {
        let source = VoteSource::new(election, scope);
        let sql = format!(
            "SELECT {} AS unit_id, v.candidate_id, v.votes {}",
            source.unit_column, source.tail
        );
        let mut query = sqlx::query(&sql).bind(election.year);
        if let Some(code) = source.code {
            query = query.bind(code);
        }

        let mut rows = query.fetch(&self.pool);
        let mut chunk = Vec::with_capacity(VOTE_CHUNK);
        while let Some(row) = rows.try_next().await? {
            chunk.push(vote_row_from_row(&row, source.table)?);
            if chunk.len() == VOTE_CHUNK {
                sink(std::mem::replace(&mut chunk, Vec::with_capacity(VOTE_CHUNK)));
            }
        }
        if !chunk.is_empty() {
            sink(chunk);
        }
        Ok(())
    }

    async fn candidate_parties(
        &self,
        election: Election,
        scope: Scope,
    ) -> Result<Vec<(i64, Option<Party>)>, StoreError> {
        let source = VoteSource::new(election, scope);
        let sql = format!(
            r#"
            SELECT c.id AS candidate_id, p.id AS party_id, p.name AS party_name, p.short_name, a.name AS alliance_name
            FROM {} c
            LEFT JOIN parties p ON p.id = c.party_id
            LEFT JOIN alliances a ON a.id = p.alliance_id
            WHERE c.id IN (SELECT v.candidate_id {})
            "#,
            source.candidate_table, source.tail
        );
        let mut query = sqlx::query(&sql).bind(election.year);
        if let Some(code) = source.code {
            query = query.bind(code);
        }
        let candidates = query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| {
                let party = row.get::<Option<i64>, _>("party_id").map(|id| Party {
                    id,
                    name: row.get::<Option<String>, _>("party_name").unwrap_or_default(),
                    short_name: row.get::<Option<String>, _>("short_name").unwrap_or_default(),
                    alliance: row.get("alliance_name"),
                });
                (row.get::<i64, _>("candidate_id"), party)
            })
            .collect();
        Ok(candidates)
    }

    async fn party_alliance_mappings(&self, election: Election) -> Result<Vec<PartyAllianceMapping>, StoreError> {
        sqlx::query(
            r#"
            SELECT m.party_id, a.name AS alliance, m.election_year, m.election_type
            FROM party_alliances m
            JOIN alliances a ON a.id = m.alliance_id
            WHERE m.election_year = ? AND m.election_type = ?
            "#,
        )
        .bind(election.year)
        .bind(election.kind.as_str())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(PartyAllianceMapping {
                party_id: row.get("party_id"),
                alliance: row.get("alliance"),
                election_year: row.get("election_year"),
                election_type: election_type_from_str(&row.get::<String, _>("election_type"), "party_alliances")?,
            })
        })
        .collect()
    }
}
