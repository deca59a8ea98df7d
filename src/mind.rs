//! `Mind`: the aggregate root owning the pathway pool, election engine,
//! and event streams, and presenting the public chat-completion interface
//! (spec §3 "Ownership & lifecycle", §6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::broadcast;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{CostTracker, PathwayFactory, StreamChunk};
use crate::config::{DecompositionConfig, MindConfig};
use crate::decomposition;
use crate::election::ElectionEngine;
use crate::error::{MindError, MindResult};
use crate::events::{ElectionEvent, EventBus, SubGoalEvent, ThoughtEvent};
use crate::modes;
use crate::optimization::{self, OptimizationSuggestion};
use crate::pathway::{PathwayRegistry, PathwaySnapshot};
use crate::streaming;
use crate::types::{Specialization, ThinkingMode, ThinkingResponse, Tier};
pub use crate::election::ElectionStrategy;

/// A resilient, concurrent router presenting a single chat-completion
/// interface over a pool of heterogeneous pathways (spec §2).
///
/// Exclusively owns its pathway list and election engine; pathways own
/// their own circuit breaker and client handle. Observers of the event
/// streams do not extend the `Mind`'s lifetime (spec §3).
pub struct Mind {
    registry: PathwayRegistry,
    events: EventBus,
    election: ElectionEngine,
    config: RwLock<MindConfig>,
    thinking_mode: Mutex<ThinkingMode>,
    election_strategy: Mutex<ElectionStrategy>,
    factory: Arc<dyn PathwayFactory>,
    cost_tracker: Mutex<Option<Arc<dyn CostTracker>>>,
    disposed: AtomicBool,
}

impl Mind {
    /// Construct an empty `Mind` using `factory` to build a
    /// [`crate::client::PathwayClient`] for each `add_pathway` call (spec
    /// §9's "global `ChatConfig` singleton ... collapses to a pure
    /// Resolver passed to the pathway factory").
    pub fn new(factory: Arc<dyn PathwayFactory>) -> Self {
        Self::with_config(factory, MindConfig::default())
    }

    pub fn with_config(factory: Arc<dyn PathwayFactory>, config: MindConfig) -> Self {
        let events = EventBus::new();
        Self {
            registry: PathwayRegistry::with_events(events.clone()),
            events,
            election: ElectionEngine::new(),
            config: RwLock::new(config),
            thinking_mode: Mutex::new(ThinkingMode::default()),
            election_strategy: Mutex::new(ElectionStrategy::WeightedMajority),
            factory,
            cost_tracker: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Attach a Mind-level aggregate cost tracker, updated after every
    /// `generate` call from the response's token counts (spec §4.8).
    pub fn set_cost_tracker(&self, tracker: Arc<dyn CostTracker>) -> &Self {
        *self.cost_tracker.lock().unwrap() = Some(tracker);
        self
    }

    /// Add a pathway, building its client via the configured factory and
    /// inferring tier/specializations when not given (spec §6).
    pub fn add_pathway(
        &self,
        name: impl Into<String>,
        endpoint_type: impl Into<String>,
        model: Option<&str>,
        endpoint: Option<&str>,
        api_key: Option<&str>,
        settings: Option<serde_json::Value>,
    ) -> &Self {
        let endpoint_type = endpoint_type.into();
        let client = self.factory.build(&endpoint_type, model, endpoint, api_key, settings.as_ref());
        self.registry.add_pathway(name, endpoint_type, model, None, client);
        self
    }

    pub fn configure_pathway(&self, name: &str, tier: Tier, specializations: Vec<Specialization>) -> &Self {
        self.registry.configure(name, tier, specializations);
        self
    }

    pub fn set_master(&self, name: &str) -> &Self {
        self.registry.set_master(name);
        self
    }

    pub fn set_first_as_master(&self) -> &Self {
        self.registry.set_first_as_master();
        self
    }

    pub fn thinking_mode(&self) -> ThinkingMode {
        *self.thinking_mode.lock().unwrap()
    }

    pub fn set_thinking_mode(&self, mode: ThinkingMode) -> &Self {
        *self.thinking_mode.lock().unwrap() = mode;
        self
    }

    pub fn election_strategy(&self) -> ElectionStrategy {
        *self.election_strategy.lock().unwrap()
    }

    pub fn set_election_strategy(&self, strategy: ElectionStrategy) -> &Self {
        *self.election_strategy.lock().unwrap() = strategy;
        self
    }

    pub fn decomposition_config(&self) -> DecompositionConfig {
        self.config.read().unwrap().decomposition.clone()
    }

    pub fn set_decomposition_config(&self, decomposition: DecompositionConfig) -> &Self {
        self.config.write().unwrap().decomposition = decomposition;
        self
    }

    pub fn pathways(&self) -> Vec<PathwaySnapshot> {
        self.registry.pathways()
    }

    pub fn healthy_pathway_count(&self) -> usize {
        self.registry.healthy_pathway_count()
    }

    pub fn thought_stream(&self) -> broadcast::Receiver<ThoughtEvent> {
        self.events.thought_stream()
    }

    pub fn sub_goal_stream(&self) -> broadcast::Receiver<SubGoalEvent> {
        self.events.sub_goal_stream()
    }

    pub fn election_events(&self) -> broadcast::Receiver<ElectionEvent> {
        self.events.election_events()
    }

    /// Satisfy a chat-completion request using the current thinking mode
    /// (spec §2's mode dispatcher).
    pub async fn generate(&self, prompt: &str, cancel: CancellationToken) -> MindResult<ThinkingResponse> {
        let mode = self.thinking_mode();
        let response = self.run_mode(mode, prompt, cancel).await?;
        self.record_cost(&response);
        Ok(response)
    }

    /// Stream a response; not fanned out, not electable (spec §4.7).
    pub async fn stream(&self, prompt: &str, cancel: CancellationToken) -> MindResult<ReceiverStream<StreamChunk>> {
        streaming::stream(&self.registry, prompt, cancel).await
    }

    async fn run_mode(&self, mode: ThinkingMode, prompt: &str, cancel: CancellationToken) -> MindResult<ThinkingResponse> {
        if mode == ThinkingMode::Decomposed {
            let decomposition_config = self.config.read().unwrap().decomposition.clone();
            return decomposition::run(&self.registry, &decomposition_config, prompt, cancel, &self.events).await;
        }

        let concrete = if mode == ThinkingMode::Adaptive {
            modes::adaptive::decide(&self.registry, prompt).ok_or(MindError::NoHealthyPathways)?
        } else {
            mode
        };

        self.dispatch_concrete(concrete, prompt, cancel).await
    }

    async fn dispatch_concrete(&self, mode: ThinkingMode, prompt: &str, cancel: CancellationToken) -> MindResult<ThinkingResponse> {
        match mode {
            ThinkingMode::Racing => {
                let healthy = self.registry.healthy_pathways();
                modes::racing::run(&healthy, prompt, cancel).await
            }
            ThinkingMode::Sequential => modes::sequential::run(&self.registry, prompt, cancel).await,
            ThinkingMode::Ensemble => {
                let (criteria, strategy, approval_threshold, worker_cap) = {
                    let config = self.config.read().unwrap();
                    (
                        config.evaluation_criteria.clone(),
                        self.election_strategy(),
                        config.approval_threshold,
                        config.ensemble_worker_cap,
                    )
                };
                modes::ensemble::run(
                    &self.registry,
                    &self.election,
                    &criteria,
                    strategy,
                    approval_threshold,
                    worker_cap,
                    prompt,
                    cancel,
                    &self.events,
                )
                .await
            }
            ThinkingMode::Adaptive | ThinkingMode::Decomposed => {
                unreachable!("adaptive resolves only to racing/sequential/ensemble before dispatch")
            }
        }
    }

    fn record_cost(&self, response: &ThinkingResponse) {
        let tracker = self.cost_tracker.lock().unwrap().clone();
        if let Some(tracker) = tracker {
            let id = tracker.start_request();
            tracker.end_request(id, response.thinking_tokens.unwrap_or(0), response.content_tokens.unwrap_or(0));
        }
    }

    /// Prioritized (1-3) optimization suggestions from election history
    /// (spec §6).
    pub fn get_optimization_suggestions(&self) -> Vec<OptimizationSuggestion> {
        optimization::get_optimization_suggestions(&self.election.performance_snapshot())
    }

    /// Human-readable snapshot of the pool (spec §6).
    pub fn get_consciousness_status(&self) -> String {
        optimization::get_consciousness_status(&self.pathways())
    }

    /// Release every pathway's client handle. Best-effort and idempotent
    /// (spec §5 "Resource release"); the event streams complete naturally
    /// when the `Mind` (and its `EventBus`) is dropped.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for pathway in self.registry.all() {
            pathway.client.close().await;
        }
        debug!("mind disposed");
    }
}

impl Drop for Mind {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::SeqCst) {
            debug!("Mind dropped without calling dispose(); client handles released via Drop only");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PathwayClient;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct EchoClient {
        reply: String,
    }

    #[async_trait]
    impl PathwayClient for EchoClient {
        async fn generate(&self, _prompt: &str, _cancel: CancellationToken) -> anyhow::Result<ThinkingResponse> {
            Ok(ThinkingResponse::content_only(self.reply.clone()))
        }
    }

    struct EchoFactory;

    impl PathwayFactory for EchoFactory {
        fn build(
            &self,
            _endpoint_type: &str,
            model: Option<&str>,
            _endpoint: Option<&str>,
            _api_key: Option<&str>,
            _settings: Option<&serde_json::Value>,
        ) -> Arc<dyn PathwayClient> {
            Arc::new(EchoClient { reply: model.unwrap_or("default").to_string() })
        }
    }

    #[tokio::test]
    async fn add_pathway_and_generate_round_trip() {
        let mind = Mind::new(Arc::new(EchoFactory));
        mind.add_pathway("p1", "cloud", Some("echo-reply"), None, None, None);
        mind.set_thinking_mode(ThinkingMode::Sequential);

        let response = mind.generate("hi", CancellationToken::new()).await.unwrap();
        assert_eq!(response.content, "echo-reply");
    }

    #[tokio::test]
    async fn no_healthy_pathways_on_empty_pool() {
        let mind = Mind::new(Arc::new(EchoFactory));
        mind.set_thinking_mode(ThinkingMode::Sequential);
        let err = mind.generate("hi", CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, MindError::AllPathwaysExhausted));
    }

    #[tokio::test]
    async fn added_pathway_is_not_master_until_chosen() {
        let mind = Mind::new(Arc::new(EchoFactory));
        mind.add_pathway("p1", "cloud", None, None, None, None);
        assert!(!mind.pathways()[0].is_master);
        mind.set_first_as_master();
        assert!(mind.pathways()[0].is_master);
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let mind = Mind::new(Arc::new(EchoFactory));
        mind.add_pathway("p1", "cloud", None, None, None, None);
        mind.dispose().await;
        mind.dispose().await;
    }

    #[tokio::test]
    async fn cost_tracker_records_after_generate() {
        struct CountingTracker {
            calls: AtomicUsize,
        }
        impl CostTracker for CountingTracker {
            fn start_request(&self) -> u64 {
                self.calls.fetch_add(1, Ordering::SeqCst) as u64
            }
            fn end_request(&self, _id: u64, _input: u32, _output: u32) {}
            fn session_metrics(&self) -> crate::client::SessionMetrics {
                crate::client::SessionMetrics::default()
            }
        }
        let tracker = Arc::new(CountingTracker { calls: AtomicUsize::new(0) });
        let mind = Mind::new(Arc::new(EchoFactory));
        mind.set_cost_tracker(tracker.clone());
        mind.add_pathway("p1", "cloud", None, None, None, None);
        mind.set_thinking_mode(ThinkingMode::Sequential);
        mind.generate("hi", CancellationToken::new()).await.unwrap();
        assert_eq!(tracker.calls.load(Ordering::SeqCst), 1);
    }
}
