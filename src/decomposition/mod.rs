//! Decomposition Engine: goal parsing, classification, tier routing,
//! dependency-wave execution, synthesis (spec §4.6).

mod executor;
mod router;
mod synthesis;

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DecompositionConfig;
use crate::error::{MindError, MindResult};
use crate::events::EventBus;
use crate::pathway::PathwayRegistry;
use crate::types::{Specialization, ThinkingResponse, Tier};

/// Sub-goal complexity, ordered from least to most involved (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
    Expert,
}

/// One decomposition unit, immutable once created (spec §3).
#[derive(Debug, Clone)]
pub struct SubGoal {
    pub id: String,
    pub description: String,
    pub complexity: Complexity,
    pub goal_type: Specialization,
    pub dependencies: Vec<String>,
    pub preferred_tier: Tier,
}

/// Execution record for one sub-goal (spec §3).
#[derive(Debug, Clone)]
pub struct SubGoalResult {
    pub goal_id: String,
    pub pathway_used: Option<String>,
    pub response: ThinkingResponse,
    pub duration: Duration,
    pub success: bool,
    pub error: Option<String>,
}

/// Lexically scan `text` for the first balanced `[...]` block, tolerating
/// leading/trailing prose and ignoring brackets inside string literals.
/// Used both for goal-plan parsing and for master-evaluation score arrays.
pub(crate) fn extract_bracket_block(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('[')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Run the full decomposition pipeline: select a decomposer, parse (or
/// heuristically fall back to) a plan, execute it wave by wave, and
/// synthesize a final response (spec §4.6 steps 1-5).
pub async fn run(
    registry: &PathwayRegistry,
    config: &DecompositionConfig,
    prompt: &str,
    cancel: CancellationToken,
    events: &EventBus,
) -> MindResult<ThinkingResponse> {
    let decomposer = router::select_decomposer(registry).ok_or(MindError::NoPathwayForDecomposition)?;

    let plan = router::decompose(&decomposer, prompt, cancel.clone(), config).await;
    let mut goals = plan.goals;
    if goals.len() > config.max_sub_goals {
        debug!(
            dropped = goals.len() - config.max_sub_goals,
            "truncating sub-goal plan to max_sub_goals"
        );
        goals.truncate(config.max_sub_goals);
    }

    if goals.len() <= 1 {
        let trivial = goals.first().map(|g| g.complexity <= config.decomposition_threshold).unwrap_or(true);
        if trivial {
            debug!("decomposition plan too small, falling back to sequential on original prompt");
            let response = crate::modes::sequential::run(registry, prompt, cancel).await?;
            return Ok(response);
        }
    }

    let results = executor::execute_waves(registry, &goals, config, cancel.clone(), events).await;

    let synthesized = synthesis::synthesize(
        registry,
        &decomposer,
        config,
        prompt,
        &goals,
        &results,
        cancel,
    )
    .await;

    Ok(synthesized)
}

pub(crate) fn dependency_ids_are_resolved(goals: &[SubGoal]) -> bool {
    let ids: HashSet<&str> = goals.iter().map(|g| g.id.as_str()).collect();
    goals
        .iter()
        .all(|g| g.dependencies.iter().all(|d| ids.contains(d.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bracket_block_finds_first_balanced_array() {
        let text = r#"Sure, here you go:
[
  {"id": "a", "description": "do a thing [with brackets]"},
  {"id": "b"}
]
Hope that helps!"#;
        let block = extract_bracket_block(text).unwrap();
        assert!(block.starts_with('['));
        assert!(block.trim_end().ends_with(']'));
        assert!(block.contains("with brackets"));
    }

    #[test]
    fn extract_bracket_block_none_when_absent() {
        assert!(extract_bracket_block("no arrays here").is_none());
    }

    #[test]
    fn dangling_dependency_detection() {
        let goals = vec![
            SubGoal {
                id: "a".into(),
                description: "x".into(),
                complexity: Complexity::Simple,
                goal_type: Specialization::Reasoning,
                dependencies: vec!["missing".into()],
                preferred_tier: Tier::CloudLight,
            },
        ];
        assert!(!dependency_ids_are_resolved(&goals));
    }

    #[test]
    fn resolved_dependencies_pass() {
        let goals = vec![
            SubGoal {
                id: "a".into(),
                description: "x".into(),
                complexity: Complexity::Simple,
                goal_type: Specialization::Reasoning,
                dependencies: vec![],
                preferred_tier: Tier::CloudLight,
            },
            SubGoal {
                id: "b".into(),
                description: "y".into(),
                complexity: Complexity::Simple,
                goal_type: Specialization::Reasoning,
                dependencies: vec!["a".into()],
                preferred_tier: Tier::CloudLight,
            },
        ];
        assert!(dependency_ids_are_resolved(&goals));
    }
}
