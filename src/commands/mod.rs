pub mod import;
pub mod report;

use crate::analysis::history::HistoryTarget;
use crate::config::Config;
use crate::db::Database;
use clap::{ArgGroup, Parser, Subcommand};
use log::{info, warn};
use report::Reports;
use std::path::PathBuf;

/// Election result aggregation and alliance projections.
#[derive(Debug, Parser)]
#[command(name = "election-pulse", version, about = "Election result aggregation and alliance projections")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a JSON batch of election data
    Import {
        /// Path to the batch file
        file: PathBuf,
    },

    #[command(flatten)]
    Report(ReportCommand),
}

/// Commands that read stored results for a registered election year.
#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Ward or booth results of one localbody
    Localbody {
        code: i64,
        #[arg(long)]
        year: i32,
    },

    /// Ward or booth results of one assembly constituency
    Assembly {
        code: i64,
        #[arg(long)]
        year: i32,
    },

    /// District totals broken down by localbody or assembly constituency
    District {
        code: i64,
        #[arg(long)]
        year: i32,
    },

    /// State totals broken down by district
    State {
        #[arg(long)]
        year: i32,
    },

    /// Wards of a localbody an alliance holds or could win with a vote swing
    Winnable {
        /// Localbody code
        localbody: i64,
        #[arg(long)]
        year: i32,
        /// Target alliance, e.g. LDF
        #[arg(long)]
        alliance: String,
        /// Swing in percent of the winner's votes
        #[arg(long, default_value_t = 10.0, value_parser = parse_swing)]
        swing: f64,
    },

    /// Majority verdict for every localbody in the state or one district
    WinnableState {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        alliance: String,
        #[arg(long, default_value_t = 10.0, value_parser = parse_swing)]
        swing: f64,
        /// Restrict to one district
        #[arg(long)]
        district: Option<i64>,
    },

    /// One localbody or assembly constituency across elections
    #[command(group(ArgGroup::new("target").required(true).args(["localbody", "assembly"])))]
    History {
        #[arg(long)]
        localbody: Option<i64>,
        #[arg(long)]
        assembly: Option<i64>,
        /// Comma separated years; every registered year when omitted
        #[arg(long, value_delimiter = ',')]
        years: Vec<i32>,
    },
}

fn parse_swing(raw: &str) -> Result<f64, String> {
    let swing: f64 = raw.parse().map_err(|_| format!("not a number: {}", raw))?;
    if swing.is_finite() && swing >= 0.0 {
        Ok(swing)
    } else {
        Err(format!("swing must be a non-negative percentage, got {}", raw))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Runs one command and returns its JSON output.
pub async fn handle_command(
    database: &Database,
    config: &Config,
    command: Command,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    match command {
        Command::Import { file } => {
            let batch = import::load_batch(&file)?;
            let summary = import::import_batch(database, &batch, &file.display().to_string()).await?;
            Ok(to_json(&summary)?)
        }
        Command::Report(report) => {
            let registry = config.load_registry(database).await?;
            if registry.is_empty() {
                warn!("No elections registered; import a batch with elections first");
            }
            info!("Election registry loaded ({} elections)", registry.len());
            handle_report(&Reports::new(database, &registry), report).await
        }
    }
}

async fn handle_report(
    reports: &Reports<'_, Database>,
    command: ReportCommand,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let output = match command {
        ReportCommand::Localbody { code, year } => to_json(&reports.localbody(code, year).await?)?,
        ReportCommand::Assembly { code, year } => to_json(&reports.assembly(code, year).await?)?,
        ReportCommand::District { code, year } => to_json(&reports.district(code, year).await?)?,
        ReportCommand::State { year } => to_json(&reports.state(year).await?)?,
        ReportCommand::Winnable {
            localbody,
            year,
            alliance,
            swing,
        } => to_json(&reports.winnable(localbody, year, &alliance, swing).await?)?,
        ReportCommand::WinnableState {
            year,
            alliance,
            swing,
            district,
        } => to_json(&reports.winnable_state(year, district, &alliance, swing).await?)?,
        ReportCommand::History {
            localbody,
            assembly,
            years,
        } => {
            let target = match (localbody, assembly) {
                (Some(code), _) => HistoryTarget::Localbody(code),
                (None, Some(code)) => HistoryTarget::Assembly(code),
                (None, None) => return Err("history needs --localbody or --assembly".into()),
            };
            to_json(&reports.history(target, &years).await?)?
        }
    };
    Ok(output)
}
