//! Decomposer selection, goal-plan parsing, and the heuristic
//! complexity/type classifiers used when parsing fails (spec §4.6 steps
//! 1-3).

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DecompositionConfig;
use crate::pathway::{Pathway, PathwayRegistry};
use crate::types::{Specialization, Tier};

use super::{dependency_ids_are_resolved, extract_bracket_block, Complexity, SubGoal};

const DECOMPOSE_INSTRUCTION: &str = "Break the following request into an ordered JSON array of \
sub-goals. Each element must be an object with fields `id` (short string), `description`, \
`complexity` (one of trivial/simple/moderate/complex/expert), `type` (one of retrieval/\
transform/reasoning/creative/coding/math/synthesis), and `dependencies` (array of sibling \
`id`s, possibly empty). Respond with only the JSON array.\n\nRequest:\n";

/// Select the pathway that will perform decomposition: the master if set,
/// else the healthy pathway maximizing a CloudPremium bonus then
/// `weight * activation_rate` (spec §4.6 step 1).
pub fn select_decomposer(registry: &PathwayRegistry) -> Option<Arc<Pathway>> {
    if let Some(master) = registry.master() {
        return Some(master);
    }
    registry
        .healthy_pathways()
        .into_iter()
        .max_by(|a, b| tier_biased_score(a).total_cmp(&tier_biased_score(b)))
}

fn tier_biased_score(p: &Pathway) -> f64 {
    let bonus = if p.tier() == Tier::CloudPremium { 10.0 } else { 0.0 };
    bonus + p.selection_score()
}

/// Result of the decomposition step: either a parsed multi-goal plan or a
/// single synthetic goal covering the original prompt.
pub struct DecomposePlan {
    pub goals: Vec<SubGoal>,
}

#[derive(Debug, Deserialize)]
struct RawSubGoal {
    id: String,
    description: String,
    #[serde(default)]
    complexity: Option<String>,
    #[serde(rename = "type", default)]
    goal_type: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Issue the decomposition instruction prompt to `decomposer` and parse
/// its response into a sub-goal plan. On network or parse failure (or a
/// plan with dangling dependency ids), falls back to a single synthetic
/// sub-goal covering the original prompt, classified heuristically.
pub async fn decompose(
    decomposer: &Arc<Pathway>,
    prompt: &str,
    cancel: CancellationToken,
    config: &DecompositionConfig,
) -> DecomposePlan {
    if decomposer.allow_request() {
        let start = Instant::now();
        let instruction = format!("{DECOMPOSE_INSTRUCTION}{prompt}");
        match decomposer.client.generate(&instruction, cancel).await {
            Ok(response) => {
                if let Some(goals) = parse_plan(&response.content, config) {
                    decomposer.record_activation(start.elapsed());
                    return DecomposePlan { goals };
                }
                warn!("decomposition response did not parse to a valid plan, falling back");
                decomposer.record_inhibition(start.elapsed());
            }
            Err(err) => {
                warn!(error = %err, "decomposition request failed, falling back");
                decomposer.record_inhibition(start.elapsed());
            }
        }
    }

    DecomposePlan { goals: vec![fallback_goal(prompt, config)] }
}

fn parse_plan(text: &str, config: &DecompositionConfig) -> Option<Vec<SubGoal>> {
    let block = extract_bracket_block(text)?;
    let raw: Vec<RawSubGoal> = serde_json::from_str(block).ok()?;
    if raw.is_empty() {
        return None;
    }

    let goals: Vec<SubGoal> = raw
        .into_iter()
        .map(|r| {
            let complexity = r
                .complexity
                .as_deref()
                .and_then(parse_complexity)
                .unwrap_or_else(|| heuristic_complexity(&r.description));
            let goal_type = r
                .goal_type
                .as_deref()
                .and_then(parse_specialization)
                .unwrap_or_else(|| heuristic_type(&r.description));
            let preferred_tier = preferred_tier(goal_type, complexity, config);
            SubGoal {
                id: r.id,
                description: r.description,
                complexity,
                goal_type,
                dependencies: r.dependencies,
                preferred_tier,
            }
        })
        .collect();

    if !dependency_ids_are_resolved(&goals) {
        debug!("parsed plan has dangling dependency ids, rejecting");
        return None;
    }

    Some(goals)
}

fn parse_complexity(s: &str) -> Option<Complexity> {
    match s.to_lowercase().as_str() {
        "trivial" => Some(Complexity::Trivial),
        "simple" => Some(Complexity::Simple),
        "moderate" => Some(Complexity::Moderate),
        "complex" => Some(Complexity::Complex),
        "expert" => Some(Complexity::Expert),
        _ => None,
    }
}

fn parse_specialization(s: &str) -> Option<Specialization> {
    match s.to_lowercase().as_str() {
        "retrieval" => Some(Specialization::Retrieval),
        "transform" => Some(Specialization::Transform),
        "reasoning" => Some(Specialization::Reasoning),
        "creative" => Some(Specialization::Creative),
        "coding" => Some(Specialization::Coding),
        "math" => Some(Specialization::Math),
        "synthesis" => Some(Specialization::Synthesis),
        _ => None,
    }
}

const MULTI_STEP_CUES: [&str; 6] = ["then", "next", "after", "finally", "also", "and then"];

/// Heuristic complexity classifier from description length and multi-step
/// cue words (spec §4.6 step 2).
pub fn heuristic_complexity(description: &str) -> Complexity {
    let len = description.len();
    let lower = description.to_lowercase();
    let has_cue = MULTI_STEP_CUES.iter().any(|c| lower.contains(c));

    if len < 50 {
        Complexity::Simple
    } else if len < 200 && !has_cue {
        Complexity::Moderate
    } else if len < 500 {
        Complexity::Complex
    } else {
        Complexity::Expert
    }
}

const TYPE_KEYWORDS: [(Specialization, &[&str]); 6] = [
    (Specialization::Coding, &["code", "function", "implement", "bug", "refactor", "program"]),
    (Specialization::Math, &["calculate", "equation", "math", "proof", "formula"]),
    (Specialization::Creative, &["write a story", "poem", "creative", "imagine", "brainstorm"]),
    (Specialization::Reasoning, &["analyze", "reason", "explain why", "compare", "evaluate"]),
    (Specialization::Transform, &["convert", "translate", "transform", "reformat", "rewrite"]),
    (Specialization::Retrieval, &["find", "search", "look up", "retrieve", "what is"]),
];

/// Heuristic type classifier: first regex-equivalent keyword match in the
/// fixed order `{coding, math, creative, reasoning, transform, retrieval}`,
/// defaulting to `Reasoning` (spec §4.6 step 2).
pub fn heuristic_type(description: &str) -> Specialization {
    let lower = description.to_lowercase();
    for (spec, keywords) in TYPE_KEYWORDS.iter() {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *spec;
        }
    }
    Specialization::Reasoning
}

/// Look up the preferred tier for a sub-goal, applying the
/// `prefer_local_for_simple` override (spec §4.6 step 3).
pub fn preferred_tier(goal_type: Specialization, complexity: Complexity, config: &DecompositionConfig) -> Tier {
    let tier = config.type_routing.tier_for(goal_type);
    if tier != Tier::Local && config.prefer_local_for_simple && complexity <= Complexity::Simple {
        Tier::Local
    } else {
        tier
    }
}

fn fallback_goal(prompt: &str, config: &DecompositionConfig) -> SubGoal {
    let complexity = heuristic_complexity(prompt);
    let goal_type = heuristic_type(prompt);
    SubGoal {
        id: "goal-1".to_string(),
        description: prompt.to_string(),
        complexity,
        goal_type,
        dependencies: Vec::new(),
        preferred_tier: preferred_tier(goal_type, complexity, config),
    }
}
