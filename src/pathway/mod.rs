//! Pathway lifecycle, health tracking, weighted selection, and per-pathway
//! circuit breakers (spec §3, §4.1).

mod breaker;

pub use breaker::{BreakerPhase, CircuitBreaker};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::client::PathwayClient;
use crate::events::{EventBus, ThoughtEvent};
use crate::types::{Specialization, Tier};

const WEIGHT_MIN: f64 = 0.1;
const WEIGHT_MAX: f64 = 2.0;
const WEIGHT_SUCCESS_FACTOR: f64 = 1.05;
const WEIGHT_FAILURE_FACTOR: f64 = 0.7;
const LATENCY_EMA_ALPHA: f64 = 0.2;

/// Dynamic, mutable health state for one pathway. Guarded by a single
/// mutex alongside the circuit breaker so readers never observe a
/// negative counter or an out-of-range weight (spec §5).
#[derive(Debug, Clone)]
struct PathwayHealth {
    synapses: u64,
    activations: u64,
    inhibitions: u64,
    last_activation_time: Option<Instant>,
    avg_latency: Duration,
    weight: f64,
    breaker: CircuitBreaker,
}

impl Default for PathwayHealth {
    fn default() -> Self {
        Self {
            synapses: 0,
            activations: 0,
            inhibitions: 0,
            last_activation_time: None,
            avg_latency: Duration::ZERO,
            weight: 1.0,
            breaker: CircuitBreaker::default(),
        }
    }
}

impl PathwayHealth {
    fn record_activation(&mut self, latency: Duration) {
        self.synapses += 1;
        self.activations += 1;
        self.last_activation_time = Some(Instant::now());
        self.weight = (self.weight * WEIGHT_SUCCESS_FACTOR).min(WEIGHT_MAX);
        self.update_latency(latency);
        self.breaker.record_success();
    }

    fn record_inhibition(&mut self, latency: Duration) {
        self.synapses += 1;
        self.inhibitions += 1;
        self.weight = (self.weight * WEIGHT_FAILURE_FACTOR).max(WEIGHT_MIN);
        self.update_latency(latency);
        self.breaker.record_failure();
    }

    fn update_latency(&mut self, sample: Duration) {
        if self.synapses <= 1 {
            self.avg_latency = sample;
            return;
        }
        let prev = self.avg_latency.as_secs_f64();
        let next = LATENCY_EMA_ALPHA * sample.as_secs_f64() + (1.0 - LATENCY_EMA_ALPHA) * prev;
        self.avg_latency = Duration::from_secs_f64(next.max(0.0));
    }

    fn activation_rate(&self) -> f64 {
        self.activations as f64 / self.synapses.max(1) as f64
    }
}

/// A point-in-time, read-only view of one pathway's health, returned by
/// the `pathways` property.
#[derive(Debug, Clone)]
pub struct PathwaySnapshot {
    pub name: String,
    pub endpoint_type: String,
    pub tier: Tier,
    pub specializations: Vec<Specialization>,
    pub is_master: bool,
    pub synapses: u64,
    pub activations: u64,
    pub inhibitions: u64,
    pub weight: f64,
    pub activation_rate: f64,
    pub avg_latency: Duration,
    pub is_healthy: bool,
    pub breaker_phase: BreakerPhase,
}

/// Static configuration, mutable via `configure_pathway` under the
/// registry's synchronization.
#[derive(Debug, Clone)]
struct PathwayConfig {
    tier: Tier,
    specializations: HashSet<Specialization>,
}

/// One logical provider connection: identity, static config, a capability
/// handle, and guarded dynamic health (spec §3).
pub struct Pathway {
    pub name: String,
    pub endpoint_type: String,
    pub client: Arc<dyn PathwayClient>,
    config: Mutex<PathwayConfig>,
    health: Mutex<PathwayHealth>,
    events: EventBus,
}

impl Pathway {
    fn new(
        name: String,
        endpoint_type: String,
        tier: Tier,
        specializations: HashSet<Specialization>,
        client: Arc<dyn PathwayClient>,
        events: EventBus,
    ) -> Self {
        Self {
            name,
            endpoint_type,
            client,
            config: Mutex::new(PathwayConfig { tier, specializations }),
            health: Mutex::new(PathwayHealth::default()),
            events,
        }
    }

    pub fn tier(&self) -> Tier {
        self.config.lock().unwrap().tier
    }

    pub fn specializations(&self) -> HashSet<Specialization> {
        self.config.lock().unwrap().specializations.clone()
    }

    fn set_config(&self, tier: Tier, specializations: Vec<Specialization>) {
        let mut cfg = self.config.lock().unwrap();
        cfg.tier = tier;
        cfg.specializations.extend(specializations);
    }

    /// Whether the circuit breaker currently allows calls through. Also
    /// advances Open -> HalfOpen once the cooldown has elapsed.
    pub fn allow_request(&self) -> bool {
        let mut h = self.health.lock().unwrap();
        let before = h.breaker.phase();
        let allowed = h.breaker.allow_request();
        let after = h.breaker.phase();
        drop(h);
        self.publish_transition(before, after);
        allowed
    }

    /// Breaker health without mutating probe state (used for candidate
    /// filtering, where we must not consume the single HalfOpen probe
    /// slot just by *considering* a pathway).
    pub fn is_healthy(&self) -> bool {
        self.health.lock().unwrap().breaker.is_healthy()
    }

    pub fn breaker_phase(&self) -> BreakerPhase {
        self.health.lock().unwrap().breaker.phase()
    }

    pub fn weight(&self) -> f64 {
        self.health.lock().unwrap().weight
    }

    pub fn activation_rate(&self) -> f64 {
        self.health.lock().unwrap().activation_rate()
    }

    pub fn avg_latency(&self) -> Duration {
        self.health.lock().unwrap().avg_latency
    }

    /// Score used by `next_pathway` and decomposition pathway selection:
    /// `weight * activation_rate`.
    pub fn selection_score(&self) -> f64 {
        let h = self.health.lock().unwrap();
        h.weight * h.activation_rate()
    }

    pub fn record_activation(&self, latency: Duration) {
        let mut h = self.health.lock().unwrap();
        let before = h.breaker.phase();
        h.record_activation(latency);
        let after = h.breaker.phase();
        let weight = h.weight;
        drop(h);
        self.publish_transition(before, after);
        debug!(pathway = %self.name, weight, "pathway activation recorded");
    }

    pub fn record_inhibition(&self, latency: Duration) {
        let mut h = self.health.lock().unwrap();
        let before = h.breaker.phase();
        h.record_inhibition(latency);
        let after = h.breaker.phase();
        let weight = h.weight;
        drop(h);
        self.publish_transition(before, after);
        debug!(pathway = %self.name, weight, "pathway inhibition recorded");
    }

    /// Emits a `BreakerTransition` on the thought stream whenever the
    /// breaker's phase actually changed (spec §4.1: "Transitions emit
    /// events on the thought stream").
    fn publish_transition(&self, before: BreakerPhase, after: BreakerPhase) {
        if before != after {
            debug!(pathway = %self.name, ?before, ?after, "circuit breaker transitioned");
            self.events.publish_thought(ThoughtEvent::BreakerTransition {
                pathway: self.name.clone(),
                phase: after,
            });
        }
    }

    pub fn snapshot(&self, is_master: bool) -> PathwaySnapshot {
        let h = self.health.lock().unwrap();
        let cfg = self.config.lock().unwrap();
        PathwaySnapshot {
            name: self.name.clone(),
            endpoint_type: self.endpoint_type.clone(),
            tier: cfg.tier,
            specializations: cfg.specializations.iter().copied().collect(),
            is_master,
            synapses: h.synapses,
            activations: h.activations,
            inhibitions: h.inhibitions,
            weight: h.weight,
            activation_rate: h.activation_rate(),
            avg_latency: h.avg_latency,
            is_healthy: h.breaker.is_healthy(),
            breaker_phase: h.breaker.phase(),
        }
    }
}

/// Infer a pathway's tier from its model name when not given explicitly
/// (spec §4.1).
pub fn infer_tier(endpoint_type: &str, model: Option<&str>) -> Tier {
    if endpoint_type.eq_ignore_ascii_case("local") {
        return Tier::Local;
    }
    let Some(model) = model else {
        return Tier::CloudLight;
    };
    let lower = model.to_lowercase();
    const PREMIUM: [&str; 6] = [
        "opus",
        "gpt-4o",
        "claude-3-5",
        "claude-sonnet-4",
        "gemini-1.5-pro",
        "gemini-2.0",
    ];
    const SPECIALIZED: [&str; 4] = ["codex", "deepseek-coder", "codellama", "starcoder"];
    const LIGHT: [&str; 5] = ["mini", "haiku", "flash", "instant", "turbo"];

    if PREMIUM.iter().any(|s| lower.contains(s)) {
        Tier::CloudPremium
    } else if SPECIALIZED.iter().any(|s| lower.contains(s)) {
        Tier::Specialized
    } else if LIGHT.iter().any(|s| lower.contains(s)) {
        Tier::CloudLight
    } else {
        Tier::CloudLight
    }
}

/// Infer specializations from a model name (spec §4.1).
pub fn infer_specializations(model: Option<&str>) -> HashSet<Specialization> {
    let mut out = HashSet::new();
    let Some(model) = model else { return out };
    let lower = model.to_lowercase();
    if lower.contains("code") || lower.contains("coder") {
        out.insert(Specialization::Coding);
    }
    if lower.contains("math") || lower.contains("wizard") {
        out.insert(Specialization::Math);
    }
    if lower.contains("creative") || lower.contains("writer") {
        out.insert(Specialization::Creative);
    }
    out
}

/// Pool of pathways plus the master pointer and selection cursor.
///
/// Reads during request dispatch take a snapshot under a single mutex
/// (spec §5); mutation happens via `add_pathway`/`configure`/`set_master`.
pub struct PathwayRegistry {
    pathways: Mutex<Vec<Arc<Pathway>>>,
    master: Mutex<Option<String>>,
    cursor: AtomicUsize,
    last_candidate_names: Mutex<Vec<String>>,
    events: EventBus,
}

impl Default for PathwayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PathwayRegistry {
    pub fn new() -> Self {
        Self::with_events(EventBus::new())
    }

    /// Construct a registry whose pathways publish breaker transitions onto
    /// `events` (typically the same bus the owning `Mind` hands out via
    /// `thought_stream()`).
    pub fn with_events(events: EventBus) -> Self {
        Self {
            pathways: Mutex::new(Vec::new()),
            master: Mutex::new(None),
            cursor: AtomicUsize::new(0),
            last_candidate_names: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Add a new pathway, inferring tier/specializations when not given.
    pub fn add_pathway(
        &self,
        name: impl Into<String>,
        endpoint_type: impl Into<String>,
        model: Option<&str>,
        tier: Option<Tier>,
        client: Arc<dyn PathwayClient>,
    ) -> Arc<Pathway> {
        let name = name.into();
        let endpoint_type = endpoint_type.into();
        let tier = tier.unwrap_or_else(|| infer_tier(&endpoint_type, model));
        let specializations = infer_specializations(model);
        let pathway = Arc::new(Pathway::new(
            name,
            endpoint_type,
            tier,
            specializations,
            client,
            self.events.clone(),
        ));
        let mut guard = self.pathways.lock().unwrap();
        guard.push(Arc::clone(&pathway));
        pathway
    }

    /// Update tier and add specializations for an existing pathway by name.
    pub fn configure(&self, name: &str, tier: Tier, specializations: Vec<Specialization>) -> bool {
        let guard = self.pathways.lock().unwrap();
        let Some(pathway) = guard.iter().find(|p| p.name == name) else {
            return false;
        };
        pathway.set_config(tier, specializations);
        true
    }

    pub fn set_master(&self, name: &str) -> bool {
        let guard = self.pathways.lock().unwrap();
        if guard.iter().any(|p| p.name == name) {
            *self.master.lock().unwrap() = Some(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn set_first_as_master(&self) {
        let guard = self.pathways.lock().unwrap();
        if let Some(first) = guard.first() {
            *self.master.lock().unwrap() = Some(first.name.clone());
        }
    }

    pub fn master_name(&self) -> Option<String> {
        self.master.lock().unwrap().clone()
    }

    pub fn master(&self) -> Option<Arc<Pathway>> {
        let name = self.master_name()?;
        self.pathways
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    pub fn all(&self) -> Vec<Arc<Pathway>> {
        self.pathways.lock().unwrap().clone()
    }

    /// Read-only snapshot of every pathway's current state (the `pathways`
    /// property from spec §6).
    pub fn pathways(&self) -> Vec<PathwaySnapshot> {
        let master = self.master_name();
        self.all()
            .iter()
            .map(|p| p.snapshot(Some(&p.name) == master.as_ref()))
            .collect()
    }

    pub fn healthy_pathways(&self) -> Vec<Arc<Pathway>> {
        self.pathways
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_healthy())
            .cloned()
            .collect()
    }

    pub fn healthy_pathway_count(&self) -> usize {
        self.healthy_pathways().len()
    }

    /// Workers for Ensemble: healthy pathways excluding the master.
    pub fn healthy_non_master_pathways(&self) -> Vec<Arc<Pathway>> {
        let master = self.master_name();
        self.healthy_pathways()
            .into_iter()
            .filter(|p| Some(&p.name) != master.as_ref())
            .collect()
    }

    /// Select the candidate maximizing `weight * activation_rate` among
    /// healthy, non-excluded pathways; ties broken by a round-robin cursor
    /// that resets whenever the candidate set changes. Falls back to any
    /// not-yet-tried pathway (regardless of health) if no healthy
    /// candidate exists (spec §4.1).
    pub fn next_pathway(&self, exclude: &HashSet<String>) -> Option<Arc<Pathway>> {
        let all = self.all();
        let healthy: Vec<Arc<Pathway>> = all
            .iter()
            .filter(|p| p.is_healthy() && !exclude.contains(&p.name))
            .cloned()
            .collect();

        if !healthy.is_empty() {
            return Some(self.pick_with_cursor(healthy));
        }

        all.into_iter().find(|p| !exclude.contains(&p.name))
    }

    fn pick_with_cursor(&self, candidates: Vec<Arc<Pathway>>) -> Arc<Pathway> {
        let mut names: Vec<String> = candidates.iter().map(|p| p.name.clone()).collect();
        names.sort();
        let mut last = self.last_candidate_names.lock().unwrap();
        if *last != names {
            self.cursor.store(0, Ordering::SeqCst);
            *last = names;
        }
        drop(last);

        let best_score = candidates
            .iter()
            .map(|p| p.selection_score())
            .fold(f64::MIN, f64::max);

        let epsilon = 1e-9;
        let top: Vec<&Arc<Pathway>> = candidates
            .iter()
            .filter(|p| (p.selection_score() - best_score).abs() < epsilon)
            .collect();

        if top.len() == 1 {
            return Arc::clone(top[0]);
        }

        let cursor = self.cursor.fetch_add(1, Ordering::SeqCst) % top.len();
        Arc::clone(top[cursor])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockPathwayClient;

    fn registry_with(n: usize) -> PathwayRegistry {
        let reg = PathwayRegistry::new();
        for i in 0..n {
            reg.add_pathway(
                format!("p{i}"),
                "cloud",
                None,
                Some(Tier::CloudLight),
                Arc::new(MockPathwayClient::ok("ok")),
            );
        }
        reg
    }

    #[test]
    fn infer_tier_local_endpoint() {
        assert_eq!(infer_tier("local", Some("llama3")), Tier::Local);
    }

    #[test]
    fn infer_tier_premium_substring() {
        assert_eq!(infer_tier("cloud", Some("claude-opus-4.6")), Tier::CloudPremium);
        assert_eq!(infer_tier("cloud", Some("gpt-4o")), Tier::CloudPremium);
    }

    #[test]
    fn infer_tier_specialized_substring() {
        assert_eq!(infer_tier("cloud", Some("gpt-5.3-codex")), Tier::Specialized);
    }

    #[test]
    fn infer_tier_light_substring() {
        assert_eq!(infer_tier("cloud", Some("claude-haiku-4.5")), Tier::CloudLight);
    }

    #[test]
    fn infer_tier_defaults_to_cloud_light() {
        assert_eq!(infer_tier("cloud", Some("some-unknown-model")), Tier::CloudLight);
        assert_eq!(infer_tier("cloud", None), Tier::CloudLight);
    }

    #[test]
    fn infer_specializations_coding() {
        let s = infer_specializations(Some("deepseek-coder-v2"));
        assert!(s.contains(&Specialization::Coding));
    }

    #[test]
    fn master_stays_unset_until_explicitly_chosen() {
        let reg = registry_with(2);
        assert_eq!(reg.master_name(), None);
        assert_eq!(reg.healthy_non_master_pathways().len(), 2);
    }

    #[test]
    fn set_first_as_master_picks_the_first_added() {
        let reg = registry_with(2);
        reg.set_first_as_master();
        assert_eq!(reg.master_name(), Some("p0".to_string()));
    }

    #[test]
    fn activation_increases_weight_bounded() {
        let reg = registry_with(1);
        let p = reg.all().remove(0);
        let before = p.weight();
        p.record_activation(Duration::from_millis(10));
        assert!(p.weight() > before);
        assert!(p.weight() <= 2.0);
    }

    #[test]
    fn inhibition_decreases_weight_bounded() {
        let reg = registry_with(1);
        let p = reg.all().remove(0);
        p.record_inhibition(Duration::from_millis(10));
        assert!(p.weight() >= 0.1);
        assert!(p.weight() < 1.0);
    }

    #[test]
    fn weight_never_exceeds_bounds_under_many_activations() {
        let reg = registry_with(1);
        let p = reg.all().remove(0);
        for _ in 0..200 {
            p.record_activation(Duration::from_millis(5));
        }
        assert!(p.weight() <= 2.0);
    }

    #[test]
    fn weight_never_drops_below_bounds_under_many_failures() {
        let reg = registry_with(1);
        let p = reg.all().remove(0);
        for _ in 0..200 {
            p.record_inhibition(Duration::from_millis(5));
        }
        assert!(p.weight() >= 0.1);
    }

    #[test]
    fn synapses_equals_activations_plus_inhibitions() {
        let reg = registry_with(1);
        let p = reg.all().remove(0);
        p.record_activation(Duration::from_millis(1));
        p.record_inhibition(Duration::from_millis(1));
        p.record_activation(Duration::from_millis(1));
        let snap = p.snapshot(false);
        assert_eq!(snap.synapses, snap.activations + snap.inhibitions);
        assert_eq!(snap.synapses, 3);
    }

    #[test]
    fn breaker_open_publishes_transition_event() {
        let events = EventBus::new();
        let mut rx = events.thought_stream();
        let reg = PathwayRegistry::with_events(events);
        reg.add_pathway("p0", "cloud", None, Some(Tier::CloudLight), Arc::new(MockPathwayClient::ok("ok")));
        let p = reg.all().remove(0);
        for _ in 0..3 {
            p.record_inhibition(Duration::from_millis(1));
        }
        let mut saw_open = false;
        while let Ok(event) = rx.try_recv() {
            if let ThoughtEvent::BreakerTransition { pathway, phase } = event {
                assert_eq!(pathway, "p0");
                if phase == BreakerPhase::Open {
                    saw_open = true;
                }
            }
        }
        assert!(saw_open, "expected a BreakerTransition to Open");
    }

    #[test]
    fn healthy_breaker_publishes_no_transition_on_success() {
        let events = EventBus::new();
        let mut rx = events.thought_stream();
        let reg = PathwayRegistry::with_events(events);
        reg.add_pathway("p0", "cloud", None, Some(Tier::CloudLight), Arc::new(MockPathwayClient::ok("ok")));
        let p = reg.all().remove(0);
        p.record_activation(Duration::from_millis(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn breaker_open_marks_pathway_unhealthy() {
        let reg = registry_with(1);
        let p = reg.all().remove(0);
        for _ in 0..3 {
            p.record_inhibition(Duration::from_millis(1));
        }
        assert!(!p.is_healthy());
        assert_eq!(reg.healthy_pathway_count(), 0);
    }

    #[test]
    fn next_pathway_excludes_tried() {
        let reg = registry_with(2);
        let mut tried = HashSet::new();
        let first = reg.next_pathway(&tried).unwrap();
        tried.insert(first.name.clone());
        let second = reg.next_pathway(&tried).unwrap();
        assert_ne!(first.name, second.name);
    }

    #[test]
    fn next_pathway_falls_back_to_unhealthy_if_all_unhealthy() {
        let reg = registry_with(1);
        let p = reg.all().remove(0);
        for _ in 0..3 {
            p.record_inhibition(Duration::from_millis(1));
        }
        let tried = HashSet::new();
        let picked = reg.next_pathway(&tried);
        assert!(picked.is_some());
    }

    #[test]
    fn next_pathway_round_robins_equal_weight_candidates() {
        let reg = registry_with(2);
        let tried = HashSet::new();
        let first = reg.next_pathway(&tried).unwrap().name;
        let second = reg.next_pathway(&tried).unwrap().name;
        assert_ne!(first, second);
    }
}
