//! Final synthesis step: integrate sub-goal results into one response
//! (spec §4.6 step 5).

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::DecompositionConfig;
use crate::pathway::{Pathway, PathwayRegistry};
use crate::types::{ThinkingResponse, Tier};

use super::{SubGoal, SubGoalResult};

const OUTCOME_TRUNCATE: usize = 300;

/// Build the synthesis prompt, invoke the chosen synthesizer, and produce
/// the final `ThinkingResponse` whose `thinking` field traces goal
/// assignment and duration. Falls back to concatenating successful
/// sub-goal outputs if the synthesizer itself fails.
pub async fn synthesize(
    registry: &PathwayRegistry,
    decomposer: &Arc<Pathway>,
    config: &DecompositionConfig,
    original_prompt: &str,
    goals: &[SubGoal],
    results: &[SubGoalResult],
    cancel: CancellationToken,
) -> ThinkingResponse {
    let synthesizer = choose_synthesizer(registry, decomposer, config);
    let prompt = build_synthesis_prompt(original_prompt, results);

    let content = if synthesizer.allow_request() {
        let start = Instant::now();
        match synthesizer.client.generate(&prompt, cancel).await {
            Ok(response) => {
                synthesizer.record_activation(start.elapsed());
                Some(response.content)
            }
            Err(err) => {
                warn!(error = %err, "synthesis request failed, degrading to concatenation");
                synthesizer.record_inhibition(start.elapsed());
                None
            }
        }
    } else {
        None
    };

    let content = content.unwrap_or_else(|| degrade(results));
    let thinking = build_trace(goals, results);
    ThinkingResponse::with_thinking(thinking, content)
}

fn choose_synthesizer(registry: &PathwayRegistry, decomposer: &Arc<Pathway>, config: &DecompositionConfig) -> Arc<Pathway> {
    if config.premium_for_synthesis {
        if let Some(premium) = registry
            .healthy_pathways()
            .into_iter()
            .find(|p| p.tier() == Tier::CloudPremium)
        {
            return premium;
        }
    }
    Arc::clone(decomposer)
}

fn build_synthesis_prompt(original_prompt: &str, results: &[SubGoalResult]) -> String {
    let mut prompt = format!(
        "Original request:\n{original_prompt}\n\nSub-goal outcomes:\n"
    );
    for (i, r) in results.iter().enumerate() {
        let marker = if r.success { '\u{2713}' } else { '\u{2717}' };
        let truncated: String = r.response.content.chars().take(OUTCOME_TRUNCATE).collect();
        prompt.push_str(&format!("{}. [{}] {}: {}\n", i + 1, marker, r.goal_id, truncated));
    }
    prompt.push_str("\nIntegrate these outcomes into one coherent final answer.");
    prompt
}

/// Degraded synthesis: concatenate successful sub-goal contents separated
/// by blank lines (spec §4.6 step 5, §7).
fn degrade(results: &[SubGoalResult]) -> String {
    results
        .iter()
        .filter(|r| r.success)
        .map(|r| r.response.content.clone())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_trace(goals: &[SubGoal], results: &[SubGoalResult]) -> String {
    let mut trace = String::from("Decomposition trace:\n");
    for goal in goals {
        if let Some(result) = results.iter().find(|r| r.goal_id == goal.id) {
            let pathway = result.pathway_used.as_deref().unwrap_or("none");
            let status = if result.success { "ok" } else { "failed" };
            trace.push_str(&format!(
                "  {} ({}): pathway={} status={} duration={:.3}s\n",
                goal.id,
                goal.goal_type,
                pathway,
                status,
                result.duration.as_secs_f64()
            ));
        }
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockPathwayClient;
    use crate::types::Specialization;
    use std::time::Duration;

    fn result(id: &str, success: bool, content: &str) -> SubGoalResult {
        SubGoalResult {
            goal_id: id.to_string(),
            pathway_used: Some("p1".to_string()),
            response: ThinkingResponse::content_only(content),
            duration: Duration::from_millis(5),
            success,
            error: None,
        }
    }

    #[tokio::test]
    async fn synthesis_uses_premium_pathway_when_preferred() {
        let registry = PathwayRegistry::new();
        let decomposer = registry.add_pathway(
            "decomposer",
            "cloud",
            None,
            Some(Tier::CloudLight),
            Arc::new(MockPathwayClient::ok("decomposer says no")),
        );
        registry.add_pathway(
            "premium",
            "cloud",
            None,
            Some(Tier::CloudPremium),
            Arc::new(MockPathwayClient::ok("synthesized by premium")),
        );
        let config = DecompositionConfig::default();
        let goals = vec![SubGoal {
            id: "A".into(),
            description: "x".into(),
            complexity: crate::decomposition::Complexity::Simple,
            goal_type: Specialization::Reasoning,
            dependencies: vec![],
            preferred_tier: Tier::Local,
        }];
        let results = vec![result("A", true, "sub answer")];
        let response = synthesize(&registry, &decomposer, &config, "original", &goals, &results, CancellationToken::new()).await;
        assert_eq!(response.content, "synthesized by premium");
        assert!(response.thinking.unwrap().contains("A (Reasoning)"));
    }

    #[tokio::test]
    async fn degraded_synthesis_on_failure_concatenates_successes() {
        let registry = PathwayRegistry::new();
        let decomposer = registry.add_pathway(
            "decomposer",
            "cloud",
            None,
            Some(Tier::CloudLight),
            Arc::new(MockPathwayClient::failing(100)),
        );
        let config = DecompositionConfig { premium_for_synthesis: false, ..DecompositionConfig::default() };
        let goals = vec![];
        let results = vec![result("A", true, "first"), result("B", false, ""), result("C", true, "third")];
        let response = synthesize(&registry, &decomposer, &config, "original", &goals, &results, CancellationToken::new()).await;
        assert_eq!(response.content, "first\n\nthird");
    }
}
