//! Sequential driver: weighted round-robin with failover (spec §4.4).

use std::collections::HashSet;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{MindError, MindResult};
use crate::pathway::PathwayRegistry;
use crate::types::ThinkingResponse;

/// The sentinel substring a client-level degraded response embeds in its
/// content. Preserved as-is per spec §9's open question.
const FALLBACK_SENTINEL: &str = "-fallback:";

/// Try pathways one at a time (via `next_pathway`) until one returns an
/// accepted response, or the whole pool has been tried.
pub async fn run(
    registry: &PathwayRegistry,
    prompt: &str,
    cancel: CancellationToken,
) -> MindResult<ThinkingResponse> {
    let mut tried: HashSet<String> = HashSet::new();

    while let Some(pathway) = registry.next_pathway(&tried) {
        tried.insert(pathway.name.clone());

        if !pathway.allow_request() {
            // Open circuit: skip silently, no health update.
            continue;
        }

        let start = Instant::now();
        match pathway.client.generate(prompt, cancel.clone()).await {
            Ok(response)
                if !response.content.is_empty() && !response.content.contains(FALLBACK_SENTINEL) =>
            {
                pathway.record_activation(start.elapsed());
                return Ok(response);
            }
            Ok(_rejected) => {
                pathway.record_inhibition(start.elapsed());
            }
            Err(_) => {
                pathway.record_inhibition(start.elapsed());
            }
        }
    }

    Err(MindError::AllPathwaysExhausted)
}
