//! Cross-cutting value types shared by the pathway registry, the mode
//! drivers, and the decomposition/election engines.

use serde::{Deserialize, Serialize};

/// Coarse capability class of a pathway.
///
/// Ordered for "numerically closest tier" fallback selection
/// (decomposition step 4.1): `Local` < `CloudLight` < `CloudPremium` <
/// `Specialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Local,
    CloudLight,
    CloudPremium,
    Specialized,
}

impl Tier {
    /// Enum order used for "numerically closest" tier comparisons.
    pub fn rank(self) -> u8 {
        match self {
            Tier::Local => 0,
            Tier::CloudLight => 1,
            Tier::CloudPremium => 2,
            Tier::Specialized => 3,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Local => write!(f, "LOCAL"),
            Tier::CloudLight => write!(f, "CLOUD_LIGHT"),
            Tier::CloudPremium => write!(f, "CLOUD_PREMIUM"),
            Tier::Specialized => write!(f, "SPECIALIZED"),
        }
    }
}

/// A capability area a pathway may be specialized in, or a sub-goal may
/// require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Specialization {
    Retrieval,
    Transform,
    Reasoning,
    Creative,
    Coding,
    Math,
    Synthesis,
}

impl std::fmt::Display for Specialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The top-level strategy a [`crate::Mind`] uses to satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    Racing,
    Sequential,
    Ensemble,
    #[default]
    Adaptive,
    Decomposed,
}

/// The result of a chat-completion dispatch: optional reasoning trace plus
/// the final content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinkingResponse {
    pub thinking: Option<String>,
    pub content: String,
    pub thinking_tokens: Option<u32>,
    pub content_tokens: Option<u32>,
}

impl ThinkingResponse {
    /// Construct a response with content only, no reasoning trace.
    pub fn content_only(content: impl Into<String>) -> Self {
        Self {
            thinking: None,
            content: content.into(),
            thinking_tokens: None,
            content_tokens: None,
        }
    }

    /// Construct a response carrying both a reasoning trace and content.
    pub fn with_thinking(thinking: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            thinking: Some(thinking.into()),
            content: content.into(),
            thinking_tokens: None,
            content_tokens: None,
        }
    }

    /// Whether this response carries a non-empty reasoning trace.
    pub fn has_thinking(&self) -> bool {
        self.thinking.as_deref().is_some_and(|t| !t.is_empty())
    }
}
