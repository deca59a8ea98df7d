//! Dependency-wave executor (spec §4.6 step 4).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::DecompositionConfig;
use crate::events::{EventBus, SubGoalEvent};
use crate::pathway::{Pathway, PathwayRegistry};
use crate::types::ThinkingResponse;

use super::{SubGoal, SubGoalResult};

const DEP_CONTEXT_TRUNCATE: usize = 500;

/// Execute `goals` wave by wave: each wave contains every remaining goal
/// whose dependencies are already in `completed`. Detects circular
/// dependencies by recording a `CircularDependency` failure and stopping
/// once a wave comes up empty with goals still outstanding (spec §4.6
/// step 4, property §8.6).
pub async fn execute_waves(
    registry: &PathwayRegistry,
    goals: &[SubGoal],
    config: &DecompositionConfig,
    cancel: CancellationToken,
    events: &EventBus,
) -> Vec<SubGoalResult> {
    let mut completed: HashMap<String, SubGoalResult> = HashMap::new();
    let mut remaining: Vec<&SubGoal> = goals.iter().collect();

    while !remaining.is_empty() {
        let done_ids: HashSet<&str> = completed.keys().map(String::as_str).collect();
        let (ready, blocked): (Vec<&SubGoal>, Vec<&SubGoal>) = remaining
            .into_iter()
            .partition(|g| g.dependencies.iter().all(|d| done_ids.contains(d.as_str())));

        if ready.is_empty() {
            warn!(blocked = blocked.len(), "circular dependency detected, stopping wave execution");
            for goal in blocked {
                completed.insert(
                    goal.id.clone(),
                    SubGoalResult {
                        goal_id: goal.id.clone(),
                        pathway_used: None,
                        response: ThinkingResponse::default(),
                        duration: std::time::Duration::ZERO,
                        success: false,
                        error: Some("circular dependency".to_string()),
                    },
                );
            }
            break;
        }

        if config.parallel_waves && ready.len() > 1 {
            let futures = ready.iter().map(|goal| {
                run_goal(registry, goal, &completed, cancel.clone(), events)
            });
            for result in join_all(futures).await {
                completed.insert(result.goal_id.clone(), result);
            }
        } else {
            for goal in &ready {
                let result = run_goal(registry, goal, &completed, cancel.clone(), events).await;
                completed.insert(result.goal_id.clone(), result);
            }
        }

        remaining = blocked;
    }

    goals.iter().filter_map(|g| completed.remove(&g.id)).collect()
}

async fn run_goal(
    registry: &PathwayRegistry,
    goal: &SubGoal,
    completed: &HashMap<String, SubGoalResult>,
    cancel: CancellationToken,
    events: &EventBus,
) -> SubGoalResult {
    let start = Instant::now();
    let Some(pathway) = select_pathway(registry, goal) else {
        let result = SubGoalResult {
            goal_id: goal.id.clone(),
            pathway_used: None,
            response: ThinkingResponse::default(),
            duration: start.elapsed(),
            success: false,
            error: Some("no pathway available for this sub-goal".to_string()),
        };
        publish(events, &result);
        return result;
    };

    let prompt = assemble_context(goal, completed);

    if !pathway.allow_request() {
        let result = SubGoalResult {
            goal_id: goal.id.clone(),
            pathway_used: Some(pathway.name.clone()),
            response: ThinkingResponse::default(),
            duration: start.elapsed(),
            success: false,
            error: Some("circuit open".to_string()),
        };
        publish(events, &result);
        return result;
    }

    let result = match pathway.client.generate(&prompt, cancel).await {
        Ok(response) => {
            pathway.record_activation(start.elapsed());
            SubGoalResult {
                goal_id: goal.id.clone(),
                pathway_used: Some(pathway.name.clone()),
                response,
                duration: start.elapsed(),
                success: true,
                error: None,
            }
        }
        Err(err) => {
            pathway.record_inhibition(start.elapsed());
            SubGoalResult {
                goal_id: goal.id.clone(),
                pathway_used: Some(pathway.name.clone()),
                response: ThinkingResponse::default(),
                duration: start.elapsed(),
                success: false,
                error: Some(err.to_string()),
            }
        }
    };
    publish(events, &result);
    result
}

fn publish(events: &EventBus, result: &SubGoalResult) {
    events.publish_sub_goal(SubGoalEvent {
        goal_id: result.goal_id.clone(),
        pathway_used: result.pathway_used.clone(),
        success: result.success,
        duration: result.duration,
    });
}

/// Select a pathway for `goal`: a specialized match first, then a tier
/// match, then the healthy pathway whose tier is numerically closest to
/// preferred (spec §4.6 step 4.1).
fn select_pathway(registry: &PathwayRegistry, goal: &SubGoal) -> Option<Arc<Pathway>> {
    let healthy = registry.healthy_pathways();

    if let Some(specialized) = healthy
        .iter()
        .filter(|p| p.specializations().contains(&goal.goal_type))
        .max_by(|a, b| a.weight().total_cmp(&b.weight()))
    {
        return Some(Arc::clone(specialized));
    }

    if let Some(tier_match) = healthy
        .iter()
        .filter(|p| p.tier() == goal.preferred_tier)
        .max_by(|a, b| a.selection_score().total_cmp(&b.selection_score()))
    {
        return Some(Arc::clone(tier_match));
    }

    healthy
        .iter()
        .min_by_key(|p| (p.tier().rank() as i16 - goal.preferred_tier.rank() as i16).abs())
        .cloned()
}

/// Prefix satisfied dependencies' (truncated) content as context, then
/// append the task description (spec §4.6 step 4.2).
fn assemble_context(goal: &SubGoal, completed: &HashMap<String, SubGoalResult>) -> String {
    if goal.dependencies.is_empty() {
        return goal.description.clone();
    }

    let mut context = String::from("Context from previous steps:\n");
    for dep_id in &goal.dependencies {
        if let Some(dep) = completed.get(dep_id) {
            let truncated: String = dep.response.content.chars().take(DEP_CONTEXT_TRUNCATE).collect();
            context.push_str(&format!("[{dep_id}]: {truncated}\n"));
        }
    }
    context.push_str(&goal.description);
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockPathwayClient;
    use crate::types::{Specialization, Tier};

    fn goal(id: &str, deps: &[&str], tier: Tier) -> SubGoal {
        SubGoal {
            id: id.to_string(),
            description: format!("do {id}"),
            complexity: crate::decomposition::Complexity::Simple,
            goal_type: Specialization::Reasoning,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            preferred_tier: tier,
        }
    }

    #[tokio::test]
    async fn s4_wave_execution_respects_dependencies() {
        let registry = PathwayRegistry::new();
        registry.add_pathway("p1", "cloud", None, Some(Tier::Local), Arc::new(MockPathwayClient::ok("A output")));
        registry.add_pathway("p2", "cloud", None, Some(Tier::CloudLight), Arc::new(MockPathwayClient::ok("B output")));

        let goals = vec![
            goal("A", &[], Tier::Local),
            goal("C", &[], Tier::Local),
            goal("B", &["A"], Tier::CloudLight),
        ];
        let config = DecompositionConfig::default();
        let events = EventBus::new();
        let results = execute_waves(&registry, &goals, &config, CancellationToken::new(), &events).await;

        assert_eq!(results.len(), 3);
        let b = results.iter().find(|r| r.goal_id == "B").unwrap();
        assert!(b.success);
    }

    #[tokio::test]
    async fn context_assembly_includes_dependency_prefix() {
        let mut completed = HashMap::new();
        completed.insert(
            "A".to_string(),
            SubGoalResult {
                goal_id: "A".to_string(),
                pathway_used: Some("p1".to_string()),
                response: ThinkingResponse::content_only("the answer is 42"),
                duration: std::time::Duration::ZERO,
                success: true,
                error: None,
            },
        );
        let g = goal("B", &["A"], Tier::CloudLight);
        let ctx = assemble_context(&g, &completed);
        assert!(ctx.starts_with("Context from previous steps:\n"));
        assert!(ctx.contains("[A]: the answer is 42"));
        assert!(ctx.ends_with("do B"));
    }

    #[tokio::test]
    async fn circular_dependency_terminates_without_hanging() {
        let registry = PathwayRegistry::new();
        registry.add_pathway("p1", "cloud", None, Some(Tier::Local), Arc::new(MockPathwayClient::ok("ok")));

        let goals = vec![goal("A", &["B"], Tier::Local), goal("B", &["A"], Tier::Local)];
        let config = DecompositionConfig::default();
        let events = EventBus::new();
        let results = execute_waves(&registry, &goals, &config, CancellationToken::new(), &events).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn no_pathway_available_records_failed_result() {
        let registry = PathwayRegistry::new();
        let goals = vec![goal("A", &[], Tier::Local)];
        let config = DecompositionConfig::default();
        let events = EventBus::new();
        let results = execute_waves(&registry, &goals, &config, CancellationToken::new(), &events).await;
        assert!(!results[0].success);
        assert!(results[0].pathway_used.is_none());
    }
}
