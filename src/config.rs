//! Tunable configuration for a [`crate::Mind`]: evaluation weights, sub-goal
//! routing defaults, decomposition thresholds.
//!
//! Every struct here is a plain `serde`-deserializable value with
//! `#[serde(default = "...")]` fields, following the free-function default
//! pattern used throughout the rest of this codebase's settings layer. The
//! core never reads these from disk or environment itself — an embedder
//! constructs or deserializes a `MindConfig` and hands it to the `Mind`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::decomposition::Complexity;
use crate::types::{Specialization, Tier};

/// Relative weights for the five election scoring metrics (spec §4.5).
///
/// Weights need not sum to 1.0 exactly but the defaults do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCriteria {
    #[serde(default = "default_relevance_weight")]
    pub relevance_weight: f64,
    #[serde(default = "default_coherence_weight")]
    pub coherence_weight: f64,
    #[serde(default = "default_completeness_weight")]
    pub completeness_weight: f64,
    #[serde(default = "default_latency_weight")]
    pub latency_weight: f64,
    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,
}

fn default_relevance_weight() -> f64 {
    0.30
}
fn default_coherence_weight() -> f64 {
    0.25
}
fn default_completeness_weight() -> f64 {
    0.20
}
fn default_latency_weight() -> f64 {
    0.15
}
fn default_cost_weight() -> f64 {
    0.10
}

impl Default for EvaluationCriteria {
    fn default() -> Self {
        Self {
            relevance_weight: default_relevance_weight(),
            coherence_weight: default_coherence_weight(),
            completeness_weight: default_completeness_weight(),
            latency_weight: default_latency_weight(),
            cost_weight: default_cost_weight(),
        }
    }
}

impl EvaluationCriteria {
    /// Prioritizes relevance and coherence over latency/cost.
    pub fn quality_focused() -> Self {
        Self {
            relevance_weight: 0.40,
            coherence_weight: 0.30,
            completeness_weight: 0.20,
            latency_weight: 0.05,
            cost_weight: 0.05,
        }
    }

    /// Prioritizes latency above all else.
    pub fn speed_focused() -> Self {
        Self {
            relevance_weight: 0.20,
            coherence_weight: 0.15,
            completeness_weight: 0.15,
            latency_weight: 0.40,
            cost_weight: 0.10,
        }
    }

    /// Prioritizes cost above all else.
    pub fn cost_focused() -> Self {
        Self {
            relevance_weight: 0.20,
            coherence_weight: 0.15,
            completeness_weight: 0.15,
            latency_weight: 0.10,
            cost_weight: 0.40,
        }
    }
}

/// Maps sub-goal [`Specialization`] to the preferred pathway [`Tier`]
/// (decomposition step 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRouting {
    pub routes: HashMap<Specialization, Tier>,
}

impl Default for TypeRouting {
    fn default() -> Self {
        use Specialization::*;
        use Tier::*;
        let routes = HashMap::from([
            (Retrieval, Local),
            (Transform, Local),
            (Reasoning, CloudLight),
            (Creative, CloudPremium),
            (Coding, Specialized),
            (Math, Specialized),
            (Synthesis, CloudPremium),
        ]);
        Self { routes }
    }
}

impl TypeRouting {
    /// Routes every specialization to `Local` except `Synthesis`, which
    /// goes to `CloudLight`.
    pub fn local_first() -> Self {
        let mut routing = Self::all_to(Tier::Local);
        routing.routes.insert(Specialization::Synthesis, Tier::CloudLight);
        routing
    }

    /// Routes every specialization to `CloudPremium`.
    pub fn quality_first() -> Self {
        Self::all_to(Tier::CloudPremium)
    }

    fn all_to(tier: Tier) -> Self {
        use Specialization::*;
        let routes = HashMap::from([
            (Retrieval, tier),
            (Transform, tier),
            (Reasoning, tier),
            (Creative, tier),
            (Coding, tier),
            (Math, tier),
            (Synthesis, tier),
        ]);
        Self { routes }
    }

    /// Look up the preferred tier for a specialization, defaulting to
    /// `CloudLight` if unmapped.
    pub fn tier_for(&self, spec: Specialization) -> Tier {
        self.routes.get(&spec).copied().unwrap_or(Tier::CloudLight)
    }
}

fn default_decomposition_threshold() -> Complexity {
    Complexity::Moderate
}

fn default_max_sub_goals() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Tunables for the decomposition engine (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionConfig {
    #[serde(default)]
    pub type_routing: TypeRouting,

    /// Plans with <= 1 sub-goal and complexity at or below this threshold
    /// skip decomposition entirely and fall back to Sequential.
    #[serde(default = "default_decomposition_threshold")]
    pub decomposition_threshold: Complexity,

    /// Sub-goals beyond this count (after parsing) are dropped.
    #[serde(default = "default_max_sub_goals")]
    pub max_sub_goals: usize,

    /// Override a non-Local preferred tier to Local when complexity is
    /// Trivial or Simple.
    #[serde(default = "default_true")]
    pub prefer_local_for_simple: bool,

    /// Prefer a healthy CloudPremium pathway over the decomposer itself
    /// for the final synthesis step.
    #[serde(default = "default_true")]
    pub premium_for_synthesis: bool,

    /// Execute same-wave sub-goals concurrently when the wave has more
    /// than one member.
    #[serde(default = "default_true")]
    pub parallel_waves: bool,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            type_routing: TypeRouting::default(),
            decomposition_threshold: default_decomposition_threshold(),
            max_sub_goals: default_max_sub_goals(),
            prefer_local_for_simple: default_true(),
            premium_for_synthesis: default_true(),
            parallel_waves: default_true(),
        }
    }
}

fn default_ensemble_worker_cap() -> usize {
    5
}

fn default_approval_threshold() -> f64 {
    0.6
}

/// Top-level configuration bag held by a [`crate::Mind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MindConfig {
    #[serde(default)]
    pub evaluation_criteria: EvaluationCriteria,
    #[serde(default)]
    pub decomposition: DecompositionConfig,
    #[serde(default = "default_ensemble_worker_cap")]
    pub ensemble_worker_cap: usize,
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: f64,
}

impl Default for MindConfig {
    fn default() -> Self {
        Self {
            evaluation_criteria: EvaluationCriteria::default(),
            decomposition: DecompositionConfig::default(),
            ensemble_worker_cap: default_ensemble_worker_cap(),
            approval_threshold: default_approval_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_evaluation_criteria_matches_spec_weights() {
        let c = EvaluationCriteria::default();
        assert_eq!(c.relevance_weight, 0.30);
        assert_eq!(c.coherence_weight, 0.25);
        assert_eq!(c.completeness_weight, 0.20);
        assert_eq!(c.latency_weight, 0.15);
        assert_eq!(c.cost_weight, 0.10);
    }

    #[test]
    fn default_type_routing_matches_spec_table() {
        let r = TypeRouting::default();
        assert_eq!(r.tier_for(Specialization::Retrieval), Tier::Local);
        assert_eq!(r.tier_for(Specialization::Transform), Tier::Local);
        assert_eq!(r.tier_for(Specialization::Reasoning), Tier::CloudLight);
        assert_eq!(r.tier_for(Specialization::Creative), Tier::CloudPremium);
        assert_eq!(r.tier_for(Specialization::Coding), Tier::Specialized);
        assert_eq!(r.tier_for(Specialization::Math), Tier::Specialized);
        assert_eq!(r.tier_for(Specialization::Synthesis), Tier::CloudPremium);
    }

    #[test]
    fn local_first_routes_everything_local_except_synthesis() {
        let r = TypeRouting::local_first();
        assert_eq!(r.tier_for(Specialization::Coding), Tier::Local);
        assert_eq!(r.tier_for(Specialization::Synthesis), Tier::CloudLight);
    }

    #[test]
    fn quality_first_routes_everything_premium() {
        let r = TypeRouting::quality_first();
        assert_eq!(r.tier_for(Specialization::Retrieval), Tier::CloudPremium);
        assert_eq!(r.tier_for(Specialization::Synthesis), Tier::CloudPremium);
    }

    #[test]
    fn decomposition_config_default_threshold_is_moderate() {
        let c = DecompositionConfig::default();
        assert_eq!(c.decomposition_threshold, Complexity::Moderate);
        assert_eq!(c.max_sub_goals, 10);
    }
}
