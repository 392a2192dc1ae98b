//! Goal detection from free text.
//!
//! Priority for a turn:
//! 1. Explicit goal hint (handled by the orchestrator through `GoalCatalog::resolve_hint`)
//! 2. Matcher proposals over the user's query
//!
//! Proposals that are not catalog ids are discarded by [`resolve`].

use async_trait::async_trait;
use std::sync::Arc;

use super::{GoalCatalog, GoalDefinition, GoalId};
use crate::clients::{SynthesisOracle, invoke_with_timeout};
use crate::prompts;

#[async_trait]
pub trait GoalMatcher: Send + Sync {
    /// Propose goal ids for the input. May return ids unknown to the catalog.
    async fn propose(&self, catalog: &GoalCatalog, input: &str) -> Vec<GoalId>;
}

/// Case-insensitive substring matching against each goal's keywords.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    /// Keywords of `goal` that occur in the lowercased input
    pub fn keyword_hits(goal: &GoalDefinition, input_lower: &str) -> Vec<String> {
        goal.keywords
            .iter()
            .filter(|kw| !kw.trim().is_empty() && input_lower.contains(&kw.to_lowercase()))
            .cloned()
            .collect()
    }

    pub fn matches(&self, catalog: &GoalCatalog, input: &str) -> Vec<GoalId> {
        let lower = input.to_lowercase();
        catalog
            .iter()
            .filter_map(|goal| {
                let hits = Self::keyword_hits(goal, &lower);
                if hits.is_empty() {
                    None
                } else {
                    tracing::debug!(goal = %goal.id, ?hits, "keyword match");
                    Some(goal.id.clone())
                }
            })
            .collect()
    }
}

#[async_trait]
impl GoalMatcher for KeywordMatcher {
    async fn propose(&self, catalog: &GoalCatalog, input: &str) -> Vec<GoalId> {
        self.matches(catalog, input)
    }
}

/// Semantic matching through the synthesis oracle; falls back to keywords
/// when the oracle is unreachable or answers with nothing usable.
pub struct OracleMatcher {
    oracle: Arc<dyn SynthesisOracle>,
    timeout_ms: u64,
    fallback: KeywordMatcher,
}

impl OracleMatcher {
    pub fn new(oracle: Arc<dyn SynthesisOracle>, timeout_ms: u64) -> Self {
        Self {
            oracle,
            timeout_ms,
            fallback: KeywordMatcher,
        }
    }

    fn parse_reply(reply: &str) -> Vec<GoalId> {
        reply
            .split(|c: char| c == ',' || c == '\n')
            .map(|s| s.trim().trim_matches(|c: char| c == '"' || c == '`' || c == '.'))
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
            .map(GoalId::from)
            .collect()
    }
}

#[async_trait]
impl GoalMatcher for OracleMatcher {
    async fn propose(&self, catalog: &GoalCatalog, input: &str) -> Vec<GoalId> {
        let listing = catalog
            .iter()
            .map(|g| format!("- {}: {} ({})", g.id, g.name, g.description))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = prompts::GOAL_DETECTION.render(&[("goals", listing.as_str()), ("input", input)]);

        match invoke_with_timeout(self.oracle.as_ref(), &prompt, self.timeout_ms).await {
            Ok(reply) => {
                let proposed = Self::parse_reply(&reply);
                if proposed.iter().any(|id| catalog.contains(id)) {
                    proposed
                } else {
                    self.fallback.matches(catalog, input)
                }
            }
            Err(e) => {
                tracing::warn!("semantic goal matching failed, using keywords: {}", e);
                self.fallback.matches(catalog, input)
            }
        }
    }
}

/// Run the matcher and keep only catalog ids, first occurrence wins
pub async fn resolve(matcher: &dyn GoalMatcher, catalog: &GoalCatalog, input: &str) -> Vec<GoalId> {
    let mut out: Vec<GoalId> = Vec::new();
    for id in matcher.propose(catalog, input).await {
        if !catalog.contains(&id) {
            tracing::debug!("discarding unknown goal proposal {}", id);
            continue;
        }
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
