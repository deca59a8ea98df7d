//! Ensemble driver: fan out to worker pathways, then hand completed
//! candidates to the Election Engine (spec §4.5).

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::EvaluationCriteria;
use crate::election::{ElectionEngine, ElectionStrategy, ResponseCandidate};
use crate::error::{MindError, MindResult};
use crate::events::{EventBus, ThoughtEvent};
use crate::pathway::{Pathway, PathwayRegistry};
use crate::types::ThinkingResponse;

/// Query up to `worker_cap` healthy non-master pathways concurrently, then
/// elect a winner from the valid responses (spec §4.5).
#[allow(clippy::too_many_arguments)]
pub async fn run(
    registry: &PathwayRegistry,
    election: &ElectionEngine,
    criteria: &EvaluationCriteria,
    strategy: ElectionStrategy,
    approval_threshold: f64,
    worker_cap: usize,
    prompt: &str,
    cancel: CancellationToken,
    events: &EventBus,
) -> MindResult<ThinkingResponse> {
    let mut workers = registry.healthy_non_master_pathways();
    workers.truncate(worker_cap);

    let futures = workers.iter().map(|p| query_worker(Arc::clone(p), prompt.to_string(), cancel.clone()));
    let candidates: Vec<ResponseCandidate> = join_all(futures).await.into_iter().flatten().collect();

    if candidates.is_empty() {
        return Err(MindError::NoValidResponses);
    }
    if candidates.len() == 1 {
        return Ok(candidates.into_iter().next().unwrap().value);
    }

    let mut scored = election.score_candidates(candidates, prompt, criteria);

    if let Some(master) = registry.master() {
        if master.is_healthy() {
            scored = blend_with_master(&master, prompt, scored, cancel.clone(), events, election).await;
        }
    }

    let master_decision_index = if strategy == ElectionStrategy::MasterDecision {
        match registry.master() {
            Some(master) if master.is_healthy() => {
                query_master_decision(&master, prompt, &scored, cancel).await
            }
            _ => None,
        }
    } else {
        None
    };

    let result = election.decide(strategy, &scored, approval_threshold, master_decision_index, events);
    Ok(result.response)
}

async fn query_worker(pathway: Arc<Pathway>, prompt: String, cancel: CancellationToken) -> Option<ResponseCandidate> {
    if !pathway.allow_request() {
        return None;
    }
    let start = Instant::now();
    match pathway.client.generate(&prompt, cancel).await {
        Ok(response) if !response.content.is_empty() => {
            pathway.record_activation(start.elapsed());
            Some(ResponseCandidate::new(pathway.name.clone(), response, start.elapsed()))
        }
        Ok(_empty) => {
            pathway.record_inhibition(start.elapsed());
            None
        }
        Err(_) => {
            pathway.record_inhibition(start.elapsed());
            None
        }
    }
}

fn build_candidate_listing(prompt: &str, candidates: &[ResponseCandidate], directive: &str) -> String {
    let mut text = format!("Original request:\n{prompt}\n\n{directive}\n\n");
    for (i, c) in candidates.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, c.value.content));
    }
    text
}

async fn blend_with_master(
    master: &Arc<Pathway>,
    prompt: &str,
    candidates: Vec<ResponseCandidate>,
    cancel: CancellationToken,
    events: &EventBus,
    election: &ElectionEngine,
) -> Vec<ResponseCandidate> {
    if !master.allow_request() {
        return candidates;
    }
    let eval_prompt = build_candidate_listing(
        prompt,
        &candidates,
        "Rate each candidate response's quality from 0 to 1. Respond with only a JSON array of numbers, in order.",
    );
    let start = Instant::now();
    let scores = match master.client.generate(&eval_prompt, cancel).await {
        Ok(response) => {
            master.record_activation(start.elapsed());
            parse_score_array(&response.content)
        }
        Err(_) => {
            master.record_inhibition(start.elapsed());
            None
        }
    };

    match scores {
        Some(scores) if scores.len() == candidates.len() => {
            let engine_scores: Vec<f64> = scores
                .into_iter()
                .map(|s| s.clamp(0.0, 1.0))
                .collect();
            election.blend_master_scores(candidates, &engine_scores)
        }
        _ => {
            events.publish_thought(ThoughtEvent::MasterEvaluationFailed {
                reason: "master did not return a score per candidate".to_string(),
            });
            candidates
        }
    }
}

async fn query_master_decision(
    master: &Arc<Pathway>,
    prompt: &str,
    candidates: &[ResponseCandidate],
    cancel: CancellationToken,
) -> Option<usize> {
    if !master.allow_request() {
        return None;
    }
    let owned: Vec<ResponseCandidate> = candidates.to_vec();
    let decision_prompt = build_candidate_listing(
        prompt,
        &owned,
        "Choose the single best candidate response. Respond with only the number of your choice.",
    );
    let start = Instant::now();
    match master.client.generate(&decision_prompt, cancel).await {
        Ok(response) => {
            master.record_activation(start.elapsed());
            parse_first_index(&response.content, candidates.len())
        }
        Err(_) => {
            master.record_inhibition(start.elapsed());
            None
        }
    }
}

fn parse_score_array(text: &str) -> Option<Vec<f64>> {
    let block = crate::decomposition::extract_bracket_block(text)?;
    serde_json::from_str(block).ok()
}

/// Scan for the first run of ASCII digits and parse it as a 1-based
/// candidate index, bounded to `[1, len]`.
fn parse_first_index(text: &str, len: usize) -> Option<usize> {
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !digits.is_empty() {
            break;
        }
    }
    let idx: usize = digits.parse().ok()?;
    (1..=len).contains(&idx).then_some(idx)
}
