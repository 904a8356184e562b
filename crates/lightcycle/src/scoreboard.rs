//! Scoreboard and win-ratio chart for spectators.
//!
//! Both are recomputed from every known session after each match. Score
//! history outside the two-hour window does not count.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use lightcycle_session::{count, SessionRegistry};
use serde::Serialize;

/// Players listed on the scoreboard.
pub const SCOREBOARD_SIZE: usize = 10;

/// Points per player on the chart.
pub const CHART_POINTS: usize = 20;

/// One scoreboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardEntry {
    pub username: String,
    pub win_ratio: f64,
    pub wins: usize,
    pub loses: usize,
    pub elo: f64,
}

/// One x-position of the chart: each listed player's win ratio there.
///
/// Ratios are keyed by username under their own object, so no username can
/// collide with `name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: usize,
    pub ratios: BTreeMap<String, f64>,
}

/// Scoreboard and chart computed together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standings {
    pub scoreboard: Vec<ScoreboardEntry>,
    pub chart_data: Vec<ChartPoint>,
}

impl Standings {
    /// Ranks every session as of `now_ms` (milliseconds since the epoch).
    pub fn compute(registry: &mut SessionRegistry, now_ms: u64) -> Self {
        let mut rows: Vec<ScoreboardEntry> = registry
            .iter_mut()
            .map(|session| {
                let stats = count(session.score_history_at(now_ms));
                ScoreboardEntry {
                    username: session.username().to_string(),
                    win_ratio: stats.win_ratio(),
                    wins: stats.wins,
                    loses: stats.loses,
                    elo: session.rating(),
                }
            })
            .collect();
        rows.sort_by(rank);
        rows.truncate(SCOREBOARD_SIZE);

        let chart_data = chart(registry, &rows, now_ms);
        Self {
            scoreboard: rows,
            chart_data,
        }
    }
}

/// Win ratio desc, then wins desc, then loses asc.
fn rank(a: &ScoreboardEntry, b: &ScoreboardEntry) -> Ordering {
    b.win_ratio
        .total_cmp(&a.win_ratio)
        .then(b.wins.cmp(&a.wins))
        .then(a.loses.cmp(&b.loses))
}

/// Point `i` is the win ratio over the history without its last
/// `CHART_POINTS - 1 - i` entries, so the final point is the current ratio.
fn chart(
    registry: &mut SessionRegistry,
    rows: &[ScoreboardEntry],
    now_ms: u64,
) -> Vec<ChartPoint> {
    let histories: Vec<(String, Vec<_>)> = rows
        .iter()
        .filter_map(|row| {
            let session = registry.get_mut(&row.username)?;
            Some((row.username.clone(), session.score_history_at(now_ms).to_vec()))
        })
        .collect();

    (0..CHART_POINTS)
        .map(|i| {
            let dropped = CHART_POINTS - 1 - i;
            let ratios = histories
                .iter()
                .map(|(username, history)| {
                    let end = history.len().saturating_sub(dropped);
                    (username.clone(), count(&history[..end]).win_ratio())
                })
                .collect();
            ChartPoint { name: i, ratios }
        })
        .collect()
}
