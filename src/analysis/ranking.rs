use crate::models::AllianceKey;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllianceTally {
    pub alliance: AllianceKey,
    pub votes: u64,
}

/// Winner, runner-up and the vote margin between them.
///
/// Nobody wins a contest where every alliance polled zero votes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub winner: Option<AllianceTally>,
    pub runner_up: Option<AllianceTally>,
    pub margin: Option<u64>,
}

impl Standing {
    pub fn from_ranking(ranking: &[AllianceTally]) -> Self {
        if ranking.first().is_none_or(|leader| leader.votes == 0) {
            return Self::default();
        }
        let winner = ranking.first().cloned();
        let runner_up = ranking.get(1).cloned();
        let margin = match (&winner, &runner_up) {
            (Some(w), Some(r)) => Some(w.votes - r.votes),
            _ => None,
        };
        Self { winner, runner_up, margin }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteShare {
    pub alliance: AllianceKey,
    pub votes: u64,
    pub percent: f64,
}

/// Orders alliances by votes, highest first.
///
/// Equal vote counts fall back to the alliance label in ascending order
/// ("LDF" before "OTH" before "UDF"), so the result depends only on the
/// contents of `votes`.
pub fn rank(votes: &BTreeMap<AllianceKey, u64>) -> Vec<AllianceTally> {
    let mut ranked: Vec<AllianceTally> = votes
        .iter()
        .map(|(alliance, &votes)| AllianceTally {
            alliance: alliance.clone(),
            votes,
        })
        .collect();
    ranked.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.alliance.cmp(&b.alliance)));
    ranked
}

/// `votes` as a percentage of `total`; 0.0 when nothing was polled.
pub fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        votes as f64 * 100.0 / total as f64
    }
}

pub fn vote_share(ranking: &[AllianceTally], total: u64) -> Vec<VoteShare> {
    ranking
        .iter()
        .map(|tally| VoteShare {
            alliance: tally.alliance.clone(),
            votes: tally.votes,
            percent: percentage(tally.votes, total),
        })
        .collect()
}
