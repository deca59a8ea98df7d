//! External collaborator contracts (spec §4.8).
//!
//! The core never speaks a vendor wire protocol directly; it reaches every
//! remote provider through these narrow capabilities, supplied by the
//! embedding application.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::ThinkingResponse;

/// A single chunk produced while streaming: whether it belongs to the
/// reasoning trace, and its text.
pub type StreamChunk = (bool, String);

/// One logical connection to a remote language-model provider.
///
/// Created once per pathway at `add_pathway` time and held for the
/// pathway's lifetime.
#[async_trait]
pub trait PathwayClient: Send + Sync {
    /// Issue a request and await the full response. Must respect `cancel`:
    /// if the token is cancelled before completion, the call should return
    /// promptly (the exact error is collapsed by the calling driver, which
    /// observes cancellation separately from this method's `Result`).
    async fn generate(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> anyhow::Result<ThinkingResponse>;

    /// Issue a request and stream back `(is_thinking, chunk)` pairs. Not
    /// every pathway needs to support this; the default returns `None` so
    /// the streaming layer can fall back to chunking a non-streaming
    /// `generate` call itself if it chooses to.
    async fn stream(
        &self,
        _prompt: &str,
        _cancel: CancellationToken,
    ) -> anyhow::Result<Option<tokio::sync::mpsc::Receiver<StreamChunk>>> {
        Ok(None)
    }

    /// Release any held resources (connections, handles). Best-effort;
    /// called once during `Mind` disposal. Default is a no-op for clients
    /// with nothing to release.
    async fn close(&self) {}
}

/// Per-request cost accounting, owned one-per-pathway plus a Mind-level
/// aggregate (spec §4.8).
pub trait CostTracker: Send + Sync {
    /// Mark the start of a request; returns an opaque request id the
    /// tracker can use to correlate `end_request`.
    fn start_request(&self) -> u64;

    /// Record token usage once a request completes.
    fn end_request(&self, request_id: u64, input_tokens: u32, output_tokens: u32);

    /// A cheap snapshot of the tracker's running totals for this session.
    fn session_metrics(&self) -> SessionMetrics;
}

/// Aggregate metrics returned by a [`CostTracker`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetrics {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost: rust_decimal::Decimal,
}

/// Builds a [`PathwayClient`] from the resolved inputs to `add_pathway`.
///
/// This is the seam through which an embedder supplies endpoint/key
/// resolution and the concrete vendor HTTP client; the core holds no
/// process-wide configuration state of its own (spec §9).
pub trait PathwayFactory: Send + Sync {
    fn build(
        &self,
        endpoint_type: &str,
        model: Option<&str>,
        endpoint: Option<&str>,
        api_key: Option<&str>,
        settings: Option<&serde_json::Value>,
    ) -> std::sync::Arc<dyn PathwayClient>;
}

/// Supplies endpoint and API key for an endpoint-type name, honoring
/// per-call overrides (spec §4.8's "configuration resolver"). A
/// `PathwayFactory` implementation typically consults a `Resolver`
/// internally before constructing its vendor client; the core itself
/// never reads environment variables or files to do this.
pub trait Resolver: Send + Sync {
    fn resolve(
        &self,
        endpoint_type: &str,
        endpoint_override: Option<&str>,
        api_key_override: Option<&str>,
    ) -> (Option<String>, Option<String>);
}

/// A `Resolver` backed by a fixed in-memory table, for tests and quick
/// starts. Not wired to any environment or file source.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: std::collections::HashMap<String, (String, String)>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(
        mut self,
        endpoint_type: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.entries.insert(endpoint_type.into(), (endpoint.into(), api_key.into()));
        self
    }
}

impl Resolver for StaticResolver {
    fn resolve(
        &self,
        endpoint_type: &str,
        endpoint_override: Option<&str>,
        api_key_override: Option<&str>,
    ) -> (Option<String>, Option<String>) {
        let looked_up = self.entries.get(endpoint_type);
        let endpoint = endpoint_override
            .map(str::to_string)
            .or_else(|| looked_up.map(|(e, _)| e.clone()));
        let api_key = api_key_override
            .map(str::to_string)
            .or_else(|| looked_up.map(|(_, k)| k.clone()));
        (endpoint, api_key)
    }
}

#[cfg(test)]
mod resolver_tests {
    use super::*;

    #[test]
    fn override_wins_over_table_entry() {
        let resolver = StaticResolver::new().with_entry("cloud", "https://table.example", "table-key");
        let (endpoint, key) = resolver.resolve("cloud", Some("https://override.example"), None);
        assert_eq!(endpoint.as_deref(), Some("https://override.example"));
        assert_eq!(key.as_deref(), Some("table-key"));
    }

    #[test]
    fn unknown_endpoint_type_with_no_override_resolves_to_none() {
        let resolver = StaticResolver::new();
        assert_eq!(resolver.resolve("unknown", None, None), (None, None));
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// A scriptable [`PathwayClient`] for driver tests: returns a fixed
    /// response after an optional delay, or fails for the first N calls.
    pub struct MockPathwayClient {
        response: String,
        delay: Duration,
        fail_times: u32,
        calls: AtomicU32,
        never_returns: bool,
    }

    impl MockPathwayClient {
        pub fn ok(response: impl Into<String>) -> Self {
            Self {
                response: response.into(),
                delay: Duration::ZERO,
                fail_times: 0,
                calls: AtomicU32::new(0),
                never_returns: false,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn failing(fail_times: u32) -> Self {
            Self {
                response: String::new(),
                delay: Duration::ZERO,
                fail_times,
                calls: AtomicU32::new(0),
                never_returns: false,
            }
        }

        pub fn never_returns() -> Self {
            Self {
                response: String::new(),
                delay: Duration::ZERO,
                fail_times: 0,
                calls: AtomicU32::new(0),
                never_returns: true,
            }
        }

        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PathwayClient for MockPathwayClient {
        async fn generate(
            &self,
            _prompt: &str,
            cancel: CancellationToken,
        ) -> anyhow::Result<ThinkingResponse> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.never_returns {
                cancel.cancelled().await;
                anyhow::bail!("cancelled");
            }
            if !self.delay.is_zero() {
                // Simulates a request already in flight: runs to completion
                // regardless of a sibling racer finishing first, exactly as a
                // real HTTP client that doesn't poll for cancellation
                // mid-request would behave.
                tokio::time::sleep(self.delay).await;
            }
            if attempt < self.fail_times {
                anyhow::bail!("mock failure {attempt}");
            }
            Ok(ThinkingResponse::content_only(self.response.clone()))
        }
    }
}
