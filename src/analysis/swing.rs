use crate::analysis::ranking;
use crate::analysis::UnitAggregate;
use crate::models::{AllianceKey, UnitId};
use serde::Serialize;

/// How one unit looks for a target alliance under a given swing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub won: bool,
    pub winnable: bool,
    // Won units: lead over the runner-up as a share of the winner's votes.
    // Lost units: deficit to the winner as a share of the winner's votes.
    pub gap_percent: Option<f64>,
    pub margin_votes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Majority,
    PossibleWithSwing,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalbodyVerdict {
    pub total_units: usize,
    pub majority_needed: usize,
    pub won_units: usize,
    pub winnable_units: usize,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitProjection {
    pub unit_id: UnitId,
    pub unit_label: String,
    pub winner: Option<AllianceKey>,
    pub winner_votes: Option<u64>,
    pub target_votes: Option<u64>,
    pub projection: Projection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinnabilityReport {
    pub target: AllianceKey,
    pub swing_percent: f64,
    pub units: Vec<UnitProjection>,
    pub verdict: LocalbodyVerdict,
}

/// Classifies `unit` as won, winnable within `swing_percent`, or neither.
///
/// A unit where `target` fielded no candidate is never winnable and has no
/// gap. Neither is a unit where nobody polled a vote.
pub fn project(unit: &UnitAggregate, target: &AllianceKey, swing_percent: f64) -> Projection {
    if unit.total == 0 {
        return Projection {
            won: false,
            winnable: false,
            gap_percent: None,
            margin_votes: None,
        };
    }
    let winner_votes = unit.winner_votes().unwrap_or(0);

    if unit.winner.as_ref() == Some(target) {
        return Projection {
            won: true,
            winnable: false,
            gap_percent: unit.margin.map(|lead| ranking::percentage(lead, winner_votes)),
            margin_votes: unit.margin,
        };
    }

    match unit.votes_for(target) {
        Some(target_votes) => {
            let gap = winner_votes.saturating_sub(target_votes);
            let gap_percent = ranking::percentage(gap, winner_votes);
            Projection {
                won: false,
                winnable: gap_percent <= swing_percent,
                gap_percent: Some(gap_percent),
                margin_votes: Some(gap),
            }
        }
        None => Projection {
            won: false,
            winnable: false,
            gap_percent: None,
            margin_votes: None,
        },
    }
}

/// Seats needed for a majority: `total / 2 + 1` with integer division.
pub fn majority_needed(total_units: usize) -> usize {
    total_units / 2 + 1
}

/// Every projection counts towards the total, including units the target
/// did not contest.
pub fn verdict<'a>(projections: impl IntoIterator<Item = &'a Projection>) -> LocalbodyVerdict {
    let (total_units, won_units, winnable_units) =
        projections
            .into_iter()
            .fold((0, 0, 0), |(total, won, winnable), p| {
                (total + 1, won + p.won as usize, winnable + p.winnable as usize)
            });
    let needed = majority_needed(total_units);

    let verdict = if won_units >= needed {
        Verdict::Majority
    } else if won_units + winnable_units >= needed {
        Verdict::PossibleWithSwing
    } else {
        Verdict::Hard
    };

    LocalbodyVerdict {
        total_units,
        majority_needed: needed,
        won_units,
        winnable_units,
        verdict,
    }
}

pub fn assess(units: &[UnitAggregate], target: &AllianceKey, swing_percent: f64) -> WinnabilityReport {
    let rows: Vec<UnitProjection> = units
        .iter()
        .map(|unit| UnitProjection {
            unit_id: unit.unit_id,
            unit_label: unit.unit_label.clone(),
            winner: unit.winner.clone(),
            winner_votes: unit.winner_votes(),
            target_votes: unit.votes_for(target),
            projection: project(unit, target, swing_percent),
        })
        .collect();
    let verdict = verdict(rows.iter().map(|row| &row.projection));

    WinnabilityReport {
        target: target.clone(),
        swing_percent,
        units: rows,
        verdict,
    }
}
