//! Reactive event streams: thought stream, sub-goal stream, election events
//! (spec §4.7, §9).
//!
//! Each is a `tokio::sync::broadcast` channel with a single producer (the
//! `Mind`) and any number of subscribers. Publication never blocks: a
//! lagging or absent subscriber cannot stall request dispatch.

use tokio::sync::broadcast;

use crate::pathway::BreakerPhase;

/// Emitted for circuit breaker transitions and other pool-health events.
#[derive(Debug, Clone)]
pub enum ThoughtEvent {
    BreakerTransition {
        pathway: String,
        phase: BreakerPhase,
    },
    MasterEvaluationFailed {
        reason: String,
    },
    ElectionFallback {
        from: String,
        to: String,
        reason: String,
    },
}

/// Emitted as each sub-goal in a decomposition plan completes.
#[derive(Debug, Clone)]
pub struct SubGoalEvent {
    pub goal_id: String,
    pub pathway_used: Option<String>,
    pub success: bool,
    pub duration: std::time::Duration,
}

/// Emitted once an election concludes.
#[derive(Debug, Clone)]
pub struct ElectionEvent {
    pub strategy: String,
    pub winner: String,
    pub candidate_count: usize,
}

const CHANNEL_CAPACITY: usize = 256;

/// Owns the three broadcast senders and hands out subscriptions.
///
/// Cheap to clone: a clone shares the same underlying channels, so a
/// `Pathway` can hold its own handle to publish breaker transitions without
/// the `Mind`'s own subscribers missing anything.
#[derive(Clone)]
pub struct EventBus {
    thought: broadcast::Sender<ThoughtEvent>,
    sub_goal: broadcast::Sender<SubGoalEvent>,
    election: broadcast::Sender<ElectionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            thought: broadcast::channel(CHANNEL_CAPACITY).0,
            sub_goal: broadcast::channel(CHANNEL_CAPACITY).0,
            election: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn publish_thought(&self, event: ThoughtEvent) {
        // A `SendError` here just means there are no subscribers right now.
        let _ = self.thought.send(event);
    }

    pub fn publish_sub_goal(&self, event: SubGoalEvent) {
        let _ = self.sub_goal.send(event);
    }

    pub fn publish_election(&self, event: ElectionEvent) {
        let _ = self.election.send(event);
    }

    pub fn thought_stream(&self) -> broadcast::Receiver<ThoughtEvent> {
        self.thought.subscribe()
    }

    pub fn sub_goal_stream(&self) -> broadcast::Receiver<SubGoalEvent> {
        self.sub_goal.subscribe()
    }

    pub fn election_events(&self) -> broadcast::Receiver<ElectionEvent> {
        self.election.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish_thought(ThoughtEvent::MasterEvaluationFailed {
            reason: "timeout".into(),
        });
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.election_events();
        bus.publish_election(ElectionEvent {
            strategy: "Majority".into(),
            winner: "p1".into(),
            candidate_count: 3,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.winner, "p1");
    }
}
