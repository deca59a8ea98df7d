//! The seven election voting strategies (spec §4.5). Each operates on
//! already-scored ballots and returns a winner plus a `votes` map with
//! exactly one entry per candidate, suitable for the thinking trace.

use std::collections::HashMap;

/// A scored candidate, as input to a voting strategy.
#[derive(Debug, Clone, Copy)]
pub struct Ballot<'a> {
    pub source: &'a str,
    pub score: f64,
}

/// Result of running one voting strategy.
#[derive(Debug, Clone)]
pub struct ElectionOutcome {
    pub winner: String,
    pub votes: HashMap<String, f64>,
}

/// Argmax of score.
pub fn majority(ballots: &[Ballot]) -> ElectionOutcome {
    let votes = ballots.iter().map(|b| (b.source.to_string(), b.score)).collect();
    let winner = argmax(ballots, |b| b.score);
    ElectionOutcome { winner, votes }
}

/// Argmax of `score * (0.5 + 0.5 * reliability_score)`.
pub fn weighted_majority(ballots: &[Ballot], reliability: impl Fn(&str) -> f64) -> ElectionOutcome {
    let adjusted: Vec<(String, f64)> = ballots
        .iter()
        .map(|b| (b.source.to_string(), b.score * (0.5 + 0.5 * reliability(b.source))))
        .collect();
    let winner = adjusted
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(s, _)| s.clone())
        .unwrap_or_default();
    let votes = adjusted.into_iter().collect();
    ElectionOutcome { winner, votes }
}

/// Rank by score descending; i-th (0-indexed) place gets `n - i` points.
pub fn borda_count(ballots: &[Ballot]) -> ElectionOutcome {
    let n = ballots.len();
    let mut ranked: Vec<&Ballot> = ballots.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    let votes: HashMap<String, f64> = ranked
        .iter()
        .enumerate()
        .map(|(i, b)| (b.source.to_string(), (n - i) as f64))
        .collect();
    let winner = ranked.first().map(|b| b.source.to_string()).unwrap_or_default();
    ElectionOutcome { winner, votes }
}

/// Pairwise comparisons by score; ties award neither side a win. Winner
/// is the candidate with the most pairwise wins.
pub fn condorcet(ballots: &[Ballot]) -> ElectionOutcome {
    let mut wins: HashMap<String, f64> = ballots.iter().map(|b| (b.source.to_string(), 0.0)).collect();
    for i in 0..ballots.len() {
        for j in 0..ballots.len() {
            if i == j {
                continue;
            }
            if ballots[i].score > ballots[j].score {
                *wins.get_mut(ballots[i].source).unwrap() += 1.0;
            }
        }
    }
    let winner = wins
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(s, _)| s.clone())
        .unwrap_or_default();
    ElectionOutcome { winner, votes: wins }
}

/// Repeatedly eliminate the lowest scorer; the elimination round is
/// recorded as a negative vote, the survivor keeps its score as a
/// positive vote.
pub fn instant_runoff(ballots: &[Ballot]) -> ElectionOutcome {
    let mut remaining: Vec<&Ballot> = ballots.iter().collect();
    let mut votes = HashMap::new();
    let mut round = 1i64;

    while remaining.len() > 1 {
        let lowest_idx = remaining
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.score.total_cmp(&b.score))
            .map(|(i, _)| i)
            .unwrap();
        let eliminated = remaining.remove(lowest_idx);
        votes.insert(eliminated.source.to_string(), -(round as f64));
        round += 1;
    }

    let winner = remaining.first().map(|b| b.source.to_string()).unwrap_or_default();
    if let Some(w) = remaining.first() {
        votes.insert(w.source.to_string(), w.score);
    }
    ElectionOutcome { winner, votes }
}

/// Approve every candidate at or above `threshold`; if none qualify,
/// approve only the single highest scorer. Winner is the highest-scoring
/// approved candidate.
pub fn approval_voting(ballots: &[Ballot], threshold: f64) -> ElectionOutcome {
    let mut approved: Vec<&Ballot> = ballots.iter().filter(|b| b.score >= threshold).collect();
    if approved.is_empty() {
        if let Some(best) = ballots.iter().max_by(|a, b| a.score.total_cmp(&b.score)) {
            approved.push(best);
        }
    }
    let votes: HashMap<String, f64> = ballots
        .iter()
        .map(|b| {
            let is_approved = approved.iter().any(|a| a.source == b.source);
            (b.source.to_string(), if is_approved { 1.0 } else { 0.0 })
        })
        .collect();
    let winner = approved
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|b| b.source.to_string())
        .unwrap_or_default();
    ElectionOutcome { winner, votes }
}

fn argmax(ballots: &[Ballot], key: impl Fn(&Ballot) -> f64) -> String {
    ballots
        .iter()
        .max_by(|a, b| key(a).total_cmp(&key(b)))
        .map(|b| b.source.to_string())
        .unwrap_or_default()
}
