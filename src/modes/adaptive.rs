//! Adaptive mode dispatcher: picks one of Racing/Sequential/Ensemble by
//! prompt shape and pool health (spec §4.2).

use crate::pathway::PathwayRegistry;
use crate::types::ThinkingMode;

/// A prompt is routed to Ensemble if it contains either literal (case
/// sensitive, per spec).
const ENSEMBLE_TRIGGERS: [&str; 2] = ["analyze", "compare"];
const ENSEMBLE_LENGTH_THRESHOLD: usize = 500;
const RACING_LENGTH_THRESHOLD: usize = 100;

/// Decide which concrete mode Adaptive should delegate to for this
/// prompt, given the current pool. Returns `None` when there are no
/// healthy pathways at all (the caller should fail with
/// `NoHealthyPathways`).
pub fn decide(registry: &PathwayRegistry, prompt: &str) -> Option<ThinkingMode> {
    let healthy_count = registry.healthy_pathway_count();
    if healthy_count == 0 {
        return None;
    }
    if healthy_count == 1 {
        return Some(ThinkingMode::Sequential);
    }
    if prompt.len() > ENSEMBLE_LENGTH_THRESHOLD || ENSEMBLE_TRIGGERS.iter().any(|t| prompt.contains(t)) {
        return Some(ThinkingMode::Ensemble);
    }
    if prompt.len() < RACING_LENGTH_THRESHOLD {
        return Some(ThinkingMode::Racing);
    }
    Some(ThinkingMode::Sequential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockPathwayClient;
    use crate::types::Tier;
    use std::sync::Arc;

    fn registry_with(n: usize) -> PathwayRegistry {
        let reg = PathwayRegistry::new();
        for i in 0..n {
            reg.add_pathway(format!("p{i}"), "cloud", None, Some(Tier::CloudLight), Arc::new(MockPathwayClient::ok("ok")));
        }
        reg
    }

    #[test]
    fn no_healthy_pathways_returns_none() {
        let reg = registry_with(0);
        assert_eq!(decide(&reg, "hi"), None);
    }

    #[test]
    fn single_healthy_pathway_is_sequential() {
        let reg = registry_with(1);
        assert_eq!(decide(&reg, "hi"), Some(ThinkingMode::Sequential));
    }

    #[test]
    fn empty_prompt_with_multiple_healthy_is_sequential_per_boundary() {
        // Empty prompt has length 0 < 100, so the length<100 Racing rule
        // would normally match; boundary behavior in spec §8 calls out
        // "Empty prompt in Adaptive -> Sequential (length < 100)" only
        // when there is exactly one healthy pathway. With >1 healthy and
        // an empty prompt, rule 4 (length < 100) still applies: Racing.
        let reg = registry_with(2);
        assert_eq!(decide(&reg, ""), Some(ThinkingMode::Racing));
    }

    #[test]
    fn long_prompt_routes_to_ensemble() {
        let reg = registry_with(2);
        let prompt = "a".repeat(600);
        assert_eq!(decide(&reg, &prompt), Some(ThinkingMode::Ensemble));
    }

    #[test]
    fn analyze_keyword_routes_to_ensemble_even_if_short() {
        let reg = registry_with(2);
        assert_eq!(decide(&reg, "please analyze this"), Some(ThinkingMode::Ensemble));
    }

    #[test]
    fn compare_keyword_case_sensitive() {
        let reg = registry_with(2);
        // Capitalized "Compare" should NOT trigger ensemble (case sensitive).
        assert_eq!(decide(&reg, "Compare these please"), Some(ThinkingMode::Racing));
    }

    #[test]
    fn short_prompt_routes_to_racing() {
        let reg = registry_with(2);
        assert_eq!(decide(&reg, "hi there"), Some(ThinkingMode::Racing));
    }

    #[test]
    fn medium_prompt_routes_to_sequential() {
        let reg = registry_with(2);
        let prompt = "a".repeat(150);
        assert_eq!(decide(&reg, &prompt), Some(ThinkingMode::Sequential));
    }
}
