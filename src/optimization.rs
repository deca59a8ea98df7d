//! Performance-driven optimization suggestions and the human-readable
//! consciousness snapshot (spec §6).

use std::fmt::Write as _;

use tracing::debug;

use crate::election::ModelPerformance;
use crate::pathway::PathwaySnapshot;

/// Relative urgency of a suggestion; lower numbers are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High = 1,
    Medium = 2,
    Low = 3,
}

/// The action an optimization suggestion recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    ConsiderRemoving,
    ReduceUsage,
    IncreasePriority,
}

#[derive(Debug, Clone)]
pub struct OptimizationSuggestion {
    pub source: String,
    pub recommendation: Recommendation,
    pub priority: Priority,
    pub reason: String,
}

const MIN_ELECTIONS_FOR_REMOVAL: u64 = 5;
const MIN_ELECTIONS_FOR_PROMOTION: u64 = 10;
const LOW_WIN_RATE: f64 = 0.20;
const MODERATE_WIN_RATE: f64 = 0.50;
const HIGH_WIN_RATE: f64 = 0.70;
const HIGH_LATENCY_SECS: f64 = 10.0;

/// Build prioritized suggestions from election performance history (spec
/// §6): removal candidates, usage-reduction candidates, and promotion
/// candidates, sorted by urgency.
pub fn get_optimization_suggestions(
    performance: &std::collections::HashMap<String, ModelPerformance>,
) -> Vec<OptimizationSuggestion> {
    let mut suggestions = Vec::new();

    for (source, perf) in performance {
        let win_rate = perf.win_rate();
        let latency_secs = perf.avg_latency.as_secs_f64();

        if perf.total_elections > MIN_ELECTIONS_FOR_REMOVAL && win_rate < LOW_WIN_RATE {
            suggestions.push(OptimizationSuggestion {
                source: source.clone(),
                recommendation: Recommendation::ConsiderRemoving,
                priority: Priority::Medium,
                reason: format!(
                    "win rate {:.1}% over {} elections",
                    win_rate * 100.0,
                    perf.total_elections
                ),
            });
        }

        if latency_secs > HIGH_LATENCY_SECS && win_rate < MODERATE_WIN_RATE {
            suggestions.push(OptimizationSuggestion {
                source: source.clone(),
                recommendation: Recommendation::ReduceUsage,
                priority: Priority::High,
                reason: format!("avg latency {:.1}s with win rate {:.1}%", latency_secs, win_rate * 100.0),
            });
        }

        if perf.total_elections > MIN_ELECTIONS_FOR_PROMOTION && win_rate > HIGH_WIN_RATE {
            suggestions.push(OptimizationSuggestion {
                source: source.clone(),
                recommendation: Recommendation::IncreasePriority,
                priority: Priority::Low,
                reason: format!(
                    "win rate {:.1}% over {} elections",
                    win_rate * 100.0,
                    perf.total_elections
                ),
            });
        }
    }

    suggestions.sort_by_key(|s| s.priority);
    suggestions
}

/// Human-readable snapshot of the pool: size plus each pathway's weight,
/// activation rate, and breaker state (spec §6).
pub fn get_consciousness_status(pathways: &[PathwaySnapshot]) -> String {
    debug!(pathway_count = pathways.len(), "consciousness status requested");
    let mut out = String::new();
    let _ = writeln!(out, "Collective Mind: {} pathway(s)", pathways.len());
    for p in pathways {
        let master_tag = if p.is_master { " [master]" } else { "" };
        let _ = writeln!(
            out,
            "  {}{}: tier={} weight={:.2} activation_rate={:.2} breaker={:?} healthy={}",
            p.name, master_tag, p.tier, p.weight, p.activation_rate, p.breaker_phase, p.is_healthy
        );
    }
    out
}
