//! A resilient, concurrent router presenting a single chat-completion
//! interface over a pool of heterogeneous remote language-model providers.
//!
//! The entry point is [`Mind`]: add pathways, pick a [`ThinkingMode`], and
//! call [`Mind::generate`] or [`Mind::stream`]. The embedding application
//! supplies connectivity via [`client::PathwayFactory`]; this crate owns no
//! vendor wire protocol and no process-wide configuration state.

pub mod client;
pub mod config;
pub mod cost;
pub mod decomposition;
pub mod election;
pub mod error;
pub mod events;
mod mind;
pub mod modes;
pub mod optimization;
pub mod pathway;
pub mod streaming;
pub mod types;

pub use client::{CostTracker, PathwayClient, PathwayFactory, Resolver, SessionMetrics, StaticResolver, StreamChunk};
pub use config::{DecompositionConfig, EvaluationCriteria, MindConfig, TypeRouting};
pub use cost::InMemoryCostTracker;
pub use election::ElectionStrategy;
pub use error::{MindError, MindResult};
pub use events::{ElectionEvent, SubGoalEvent, ThoughtEvent};
pub use mind::Mind;
pub use optimization::{OptimizationSuggestion, Priority, Recommendation};
pub use pathway::{BreakerPhase, PathwaySnapshot};
pub use types::{Specialization, ThinkingMode, ThinkingResponse, Tier};
