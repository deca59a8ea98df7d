//! A minimal default [`CostTracker`] implementation (spec §4.8).
//!
//! This is not a vendor price table — per-model cost-rate catalogs stay an
//! external collaborator concern (spec §1 Non-goals). `InMemoryCostTracker`
//! just counts requests and tokens so an embedder has something to pass to
//! a [`crate::Mind`] without writing their own tracker for a quick start;
//! `estimated_cost` stays zero since no price source is wired in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::client::{CostTracker, SessionMetrics};

/// Counts requests and token usage in memory for the lifetime of the
/// tracker. Thread-safe; cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryCostTracker {
    next_request_id: AtomicU64,
    totals: Mutex<SessionMetrics>,
}

impl InMemoryCostTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CostTracker for InMemoryCostTracker {
    fn start_request(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn end_request(&self, _request_id: u64, input_tokens: u32, output_tokens: u32) {
        let mut totals = self.totals.lock().unwrap();
        totals.requests += 1;
        totals.input_tokens += input_tokens as u64;
        totals.output_tokens += output_tokens as u64;
    }

    fn session_metrics(&self) -> SessionMetrics {
        self.totals.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn tracks_requests_and_tokens() {
        let tracker = InMemoryCostTracker::new();
        let id = tracker.start_request();
        tracker.end_request(id, 100, 50);
        let metrics = tracker.session_metrics();
        assert_eq!(metrics.requests, 1);
        assert_eq!(metrics.input_tokens, 100);
        assert_eq!(metrics.output_tokens, 50);
        assert_eq!(metrics.estimated_cost, Decimal::ZERO);
    }

    #[test]
    fn request_ids_increment() {
        let tracker = InMemoryCostTracker::new();
        assert_eq!(tracker.start_request(), 0);
        assert_eq!(tracker.start_request(), 1);
    }
}
