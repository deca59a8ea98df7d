//! Racing driver: fan out to every healthy pathway, first non-empty
//! response wins (spec §4.3).

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{MindError, MindResult};
use crate::pathway::Pathway;
use crate::types::ThinkingResponse;

/// Race all of `pathways` concurrently and return the first response with
/// non-empty content. Losing tasks are not aborted: they are detached and
/// left to complete in the background, recording their own true outcome
/// (spec §5: "cancellation... does not undo recorded health updates" —
/// here there is nothing to undo because losers simply keep running).
pub async fn run(
    pathways: &[Arc<Pathway>],
    prompt: &str,
    cancel: CancellationToken,
) -> MindResult<ThinkingResponse> {
    if pathways.is_empty() {
        return Err(MindError::AllPathwaysFailed);
    }

    let race_token = cancel.child_token();
    let mut tasks = Vec::with_capacity(pathways.len());
    for pathway in pathways {
        let pathway = Arc::clone(pathway);
        let prompt = prompt.to_string();
        let token = race_token.clone();
        tasks.push(tokio::spawn(async move { call_one(pathway, prompt, token).await }));
    }

    let mut pending = tasks;
    let mut winner = None;
    while !pending.is_empty() {
        let (result, _index, remaining) = futures::future::select_all(pending).await;
        pending = remaining;
        if let Ok(Some(response)) = result {
            winner = Some(response);
            race_token.cancel();
            break;
        }
    }

    winner.ok_or(MindError::AllPathwaysFailed)
}

async fn call_one(
    pathway: Arc<Pathway>,
    prompt: String,
    cancel: CancellationToken,
) -> Option<ThinkingResponse> {
    if !pathway.allow_request() {
        return None;
    }
    let start = Instant::now();
    match pathway.client.generate(&prompt, cancel).await {
        Ok(response) if !response.content.is_empty() => {
            pathway.record_activation(start.elapsed());
            Some(response)
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
