//! Election Engine: candidate scoring, seven voting strategies, master
//! blending, and performance-driven optimization suggestions (spec §4.5,
//! §3's `ModelPerformance`).

pub mod metrics;
pub mod strategies;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::EvaluationCriteria;
use crate::events::{ElectionEvent, EventBus, ThoughtEvent};
use crate::types::ThinkingResponse;
use strategies::Ballot;

const PERFORMANCE_EMA_ALPHA: f64 = 0.1;

/// One worker's answer, pending or already scored, for a single ensemble
/// round.
#[derive(Debug, Clone)]
pub struct ResponseCandidate {
    pub source: String,
    pub value: ThinkingResponse,
    pub latency: Duration,
    pub score: f64,
    pub metrics: HashMap<String, f64>,
    pub valid: bool,
}

impl ResponseCandidate {
    pub fn new(source: impl Into<String>, value: ThinkingResponse, latency: Duration) -> Self {
        let valid = !value.content.is_empty();
        Self {
            source: source.into(),
            value,
            latency,
            score: 0.0,
            metrics: HashMap::new(),
            valid,
        }
    }

    /// Returns a copy with the score replaced (candidates are otherwise
    /// immutable, per spec §3).
    pub fn with_score(&self, score: f64) -> Self {
        Self { score, ..self.clone() }
    }

    /// Returns a copy with the metrics map replaced.
    pub fn with_metrics(&self, metrics: HashMap<String, f64>) -> Self {
        Self { metrics, ..self.clone() }
    }
}

/// Rolling per-source stats the election engine accumulates over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub total_elections: u64,
    pub wins: u64,
    pub avg_score: f64,
    #[serde(with = "duration_secs")]
    pub avg_latency: Duration,
    pub avg_cost: f64,
    #[serde(skip, default)]
    pub last_used: Option<Instant>,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

impl Default for ModelPerformance {
    fn default() -> Self {
        Self {
            total_elections: 0,
            wins: 0,
            avg_score: 0.0,
            avg_latency: Duration::ZERO,
            avg_cost: 0.0,
            last_used: None,
        }
    }
}

impl ModelPerformance {
    pub fn win_rate(&self) -> f64 {
        if self.total_elections == 0 {
            0.0
        } else {
            self.wins as f64 / self.total_elections as f64
        }
    }

    /// `0.6 * win_rate + 0.4 * (1 - min(1, avg_latency_s / 30))`.
    pub fn reliability_score(&self) -> f64 {
        let latency_penalty = (self.avg_latency.as_secs_f64() / 30.0).min(1.0);
        0.6 * self.win_rate() + 0.4 * (1.0 - latency_penalty)
    }

    fn record(&mut self, won: bool, score: f64, latency: Duration) {
        self.total_elections += 1;
        if won {
            self.wins += 1;
        }
        self.last_used = Some(Instant::now());
        if self.total_elections == 1 {
            self.avg_score = score;
            self.avg_latency = latency;
        } else {
            self.avg_score =
                PERFORMANCE_EMA_ALPHA * score + (1.0 - PERFORMANCE_EMA_ALPHA) * self.avg_score;
            let prev = self.avg_latency.as_secs_f64();
            let next = PERFORMANCE_EMA_ALPHA * latency.as_secs_f64() + (1.0 - PERFORMANCE_EMA_ALPHA) * prev;
            self.avg_latency = Duration::from_secs_f64(next.max(0.0));
        }
    }
}

/// The seven voting algorithms from spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ElectionStrategy {
    Majority,
    WeightedMajority,
    BordaCount,
    Condorcet,
    InstantRunoff,
    ApprovalVoting,
    MasterDecision,
}

impl std::fmt::Display for ElectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Outcome of a completed election: winning content plus a human-readable
/// trace and the per-source votes (spec §4.5's "thinking" field).
pub struct ElectionResult {
    pub response: ThinkingResponse,
    pub winner: String,
}

/// Owns cross-request performance history and runs elections.
pub struct ElectionEngine {
    performance: Mutex<HashMap<String, ModelPerformance>>,
}

impl Default for ElectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ElectionEngine {
    pub fn new() -> Self {
        Self { performance: Mutex::new(HashMap::new()) }
    }

    fn avg_cost_for(&self, source: &str) -> Option<f64> {
        self.performance
            .lock()
            .unwrap()
            .get(source)
            .filter(|p| p.total_elections > 0)
            .map(|p| p.avg_cost)
    }

    fn reliability_for(&self, source: &str) -> f64 {
        self.performance
            .lock()
            .unwrap()
            .get(source)
            .map(|p| p.reliability_score())
            .unwrap_or(0.0)
    }

    /// Score every candidate against the five metrics (spec §4.5's
    /// scoring phase), using this engine's performance history for the
    /// cost metric.
    pub fn score_candidates(
        &self,
        candidates: Vec<ResponseCandidate>,
        prompt: &str,
        criteria: &EvaluationCriteria,
    ) -> Vec<ResponseCandidate> {
        candidates
            .into_iter()
            .map(|c| {
                let relevance = metrics::relevance(prompt, &c.value.content);
                let coherence = metrics::coherence(&c.value.content);
                let completeness = metrics::completeness(prompt, &c.value.content);
                let latency = metrics::latency(c.latency);
                let cost = metrics::cost(self.avg_cost_for(&c.source));

                let score = criteria.relevance_weight * relevance
                    + criteria.coherence_weight * coherence
                    + criteria.completeness_weight * completeness
                    + criteria.latency_weight * latency
                    + criteria.cost_weight * cost;

                let metrics_map = HashMap::from([
                    ("relevance".to_string(), relevance),
                    ("coherence".to_string(), coherence),
                    ("completeness".to_string(), completeness),
                    ("latency".to_string(), latency),
                    ("cost".to_string(), cost),
                ]);

                c.with_metrics(metrics_map).with_score(score)
            })
            .collect()
    }

    /// Blend heuristic scores with a master's evaluation:
    /// `0.4 * heuristic + 0.6 * master`. On parse failure of `master_scores`
    /// the heuristic scores are returned untouched and the caller should
    /// emit `MasterEvaluationFailed`.
    pub fn blend_master_scores(
        &self,
        candidates: Vec<ResponseCandidate>,
        master_scores: &[f64],
    ) -> Vec<ResponseCandidate> {
        if master_scores.len() != candidates.len() {
            return candidates;
        }
        candidates
            .into_iter()
            .zip(master_scores)
            .map(|(c, &m)| {
                let blended = 0.4 * c.score + 0.6 * m;
                c.with_score(blended)
            })
            .collect()
    }

    /// Run the chosen strategy over scored candidates, update performance
    /// history, and emit an election event. `master_decision_index` is
    /// the 1-based index parsed from a MasterDecision prompt, if any.
    pub fn decide(
        &self,
        strategy: ElectionStrategy,
        candidates: &[ResponseCandidate],
        approval_threshold: f64,
        master_decision_index: Option<usize>,
        events: &EventBus,
    ) -> ElectionResult {
        let ballots: Vec<Ballot> = candidates
            .iter()
            .map(|c| Ballot { source: &c.source, score: c.score })
            .collect();

        let (winner, votes, effective_strategy) = match strategy {
            ElectionStrategy::Majority => {
                let o = strategies::majority(&ballots);
                (o.winner, o.votes, strategy)
            }
            ElectionStrategy::WeightedMajority => {
                let o = strategies::weighted_majority(&ballots, |s| self.reliability_for(s));
                (o.winner, o.votes, strategy)
            }
            ElectionStrategy::BordaCount => {
                let o = strategies::borda_count(&ballots);
                (o.winner, o.votes, strategy)
            }
            ElectionStrategy::Condorcet => {
                let o = strategies::condorcet(&ballots);
                (o.winner, o.votes, strategy)
            }
            ElectionStrategy::InstantRunoff => {
                let o = strategies::instant_runoff(&ballots);
                (o.winner, o.votes, strategy)
            }
            ElectionStrategy::ApprovalVoting => {
                let o = strategies::approval_voting(&ballots, approval_threshold);
                (o.winner, o.votes, strategy)
            }
            ElectionStrategy::MasterDecision => match master_decision_index {
                Some(idx) if idx >= 1 && idx <= candidates.len() => {
                    let winner = candidates[idx - 1].source.clone();
                    let votes = ballots.iter().map(|b| (b.source.to_string(), b.score)).collect();
                    (winner, votes, strategy)
                }
                _ => {
                    events.publish_thought(ThoughtEvent::ElectionFallback {
                        from: "MasterDecision".to_string(),
                        to: "WeightedMajority".to_string(),
                        reason: "master response did not parse to a valid candidate index".to_string(),
                    });
                    let o = strategies::weighted_majority(&ballots, |s| self.reliability_for(s));
                    (o.winner, o.votes, ElectionStrategy::WeightedMajority)
                }
            },
        };

        self.update_history(candidates, &winner);

        events.publish_election(ElectionEvent {
            strategy: effective_strategy.to_string(),
            winner: winner.clone(),
            candidate_count: candidates.len(),
        });

        let winning_candidate = candidates.iter().find(|c| c.source == winner);
        let content = winning_candidate.map(|c| c.value.content.clone()).unwrap_or_default();
        let thinking = build_trace(effective_strategy, &votes, &winner);

        ElectionResult {
            response: ThinkingResponse::with_thinking(thinking, content),
            winner,
        }
    }

    fn update_history(&self, candidates: &[ResponseCandidate], winner: &str) {
        let mut perf = self.performance.lock().unwrap();
        for c in candidates {
            let entry = perf.entry(c.source.clone()).or_default();
            entry.record(c.source == winner, c.score, c.latency);
        }
    }

    /// Snapshot of performance history, for `get_optimization_suggestions`.
    pub fn performance_snapshot(&self) -> HashMap<String, ModelPerformance> {
        self.performance.lock().unwrap().clone()
    }
}

fn build_trace(strategy: ElectionStrategy, votes: &HashMap<String, f64>, winner: &str) -> String {
    let mut sorted: Vec<(&String, &f64)> = votes.iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(a.1));

    let mut trace = format!("Election strategy: {strategy}\nVotes (descending):\n");
    for (source, vote) in &sorted {
        let marker = if source.as_str() == winner { " <- winner" } else { "" };
        trace.push_str(&format!("  {source}: {vote:.3}{marker}\n"));
    }
    trace
}
