//! Multiplayer Elo.
//!
//! Generalizes two-player Elo to a ranked finish of `n` players. Each
//! player's expected score is its summed pairwise win probability, and
//! its actual score comes from a linear split of one point across the
//! finishing places. Both are normalized to sum to 1 over all players, so
//! a match never creates or destroys rating points.
//!
//! ```text
//! E_i = Σ_{j≠i} 1 / (1 + 10^((R_j − R_i) / D))  /  (n(n−1)/2)
//! S_i = mean over i's tied positions p of (n − p) / (n(n−1)/2)
//! R_i' = R_i + K (n − 1) (S_i − E_i)
//! ```

use serde::{Deserialize, Serialize};

/// Elo constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Maximum swing per opponent.
    pub k: f64,
    /// Rating difference at which the stronger player is 10× as likely
    /// to win.
    pub d: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self { k: 32.0, d: 400.0 }
    }
}

/// New ratings after a match.
///
/// `places[i]` is the 1-based finishing place of the player with
/// `ratings[i]`; equal places are ties. With fewer than two players the
/// ratings come back unchanged.
pub fn multi_elo(ratings: &[f64], places: &[u32], config: RatingConfig) -> Vec<f64> {
    let n = ratings.len();
    if n < 2 || places.len() != n {
        return ratings.to_vec();
    }
    let pairs = (n * (n - 1)) as f64 / 2.0;

    ratings
        .iter()
        .enumerate()
        .map(|(i, &r_i)| {
            let expected = ratings
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &r_j)| 1.0 / (1.0 + 10f64.powf((r_j - r_i) / config.d)))
                .sum::<f64>()
                / pairs;
            let actual = actual_score(places, places[i], n) / pairs;
            r_i + config.k * (n - 1) as f64 * (actual - expected)
        })
        .collect()
}

/// Mean of `n − p` over the positions a group tied at `place` occupies.
fn actual_score(places: &[u32], place: u32, n: usize) -> f64 {
    let tied = places.iter().filter(|&&p| p == place).count().max(1);
    let first = place as usize;
    let total: usize = (first..first + tied).map(|p| n.saturating_sub(p)).sum();
    total as f64 / tied as f64
}

/// Competition ranking ("1224"): larger keys finish better, equal keys
/// share a place, and the place after a tie skips accordingly.
pub fn competition_places<K: Ord>(keys: &[K]) -> Vec<u32> {
    keys.iter()
        .map(|key| 1 + keys.iter().filter(|other| *other > key).count() as u32)
        .collect()
}
