use crate::models::ElectionType;

/// Failures raised by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be decoded into its model type.
    #[error("corrupt value in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

/// Failures raised while assembling an analysis.
///
/// Missing alliance mappings, empty inputs and zero vote totals are not
/// errors; they resolve to `OTH`, empty results and 0.0 respectively.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{entity} not found: {code}")]
    NotFound { entity: &'static str, code: i64 },

    #[error("no election registered for year {0}")]
    UnknownElection(i32),

    #[error("year {year} registered as both {first} and {second}")]
    ConflictingElection {
        year: i32,
        first: ElectionType,
        second: ElectionType,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse import batch: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unresolved {entity} reference: {reference}")]
    Unresolved {
        entity: &'static str,
        reference: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("failed to read election registry {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse election registry {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registry(#[from] AnalysisError),
}
