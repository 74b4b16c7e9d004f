use crate::db::ElectionStore;
use crate::error::{AnalysisError, ConfigError};
use crate::models::{Election, ElectionRegistry};
use log::info;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_DATABASE_URL: &str = "sqlite:election_pulse.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    // JSON list of elections overriding the `elections` table
    pub registry_path: Option<PathBuf>,
}

impl Config {
    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and `ELECTION_REGISTRY`.
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "DATABASE_MAX_CONNECTIONS",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let registry_path = lookup("ELECTION_REGISTRY")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            max_connections,
            registry_path,
        })
    }

    /// The registry file when one is configured, otherwise the `elections` table.
    pub async fn load_registry<S>(&self, store: &S) -> Result<ElectionRegistry, ConfigError>
    where
        S: ElectionStore + ?Sized,
    {
        let elections = match &self.registry_path {
            Some(path) => {
                info!("Loading election registry from {}", path.display());
                read_registry_file(path)?
            }
            None => store.elections().await.map_err(AnalysisError::from)?,
        };
        Ok(ElectionRegistry::new(elections)?)
    }
}

fn read_registry_file(path: &Path) -> Result<Vec<Election>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
