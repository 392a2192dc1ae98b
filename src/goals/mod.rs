//! Goal catalog: the fixed set of research objectives the orchestrator serves.
//!
//! Definitions are immutable after load. Each goal names the keywords that
//! detect it, the context fields that must be present before it may run and
//! the ordered producers that build its findings.

pub mod matcher;
pub mod queue;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::producers::ProducerId;

pub use matcher::{GoalMatcher, KeywordMatcher, OracleMatcher, resolve};
pub use queue::GoalQueue;

/// Minimum Jaro-Winkler similarity for a fuzzy goal-hint match
const HINT_SIMILARITY_FLOOR: f64 = 0.85;

/// Stable goal identifier, e.g. `GOAL_1_LAUNCH`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalId(String);

impl GoalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GoalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalDefinition {
    pub id: GoalId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Detection keywords, matched case-insensitively
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Context fields that gate producer execution
    #[serde(default)]
    pub required_context: Vec<String>,
    /// Producers in execution order; later ones may read earlier results
    pub producers: Vec<ProducerId>,
}

/// Process-wide, read-only registry of goal definitions in catalog order
#[derive(Debug, Clone)]
pub struct GoalCatalog {
    goals: Vec<Arc<GoalDefinition>>,
}

impl GoalCatalog {
    /// Build a catalog; later duplicates of an id are dropped
    pub fn new(definitions: Vec<GoalDefinition>) -> Self {
        let mut goals: Vec<Arc<GoalDefinition>> = Vec::with_capacity(definitions.len());
        for def in definitions {
            if goals.iter().any(|g| g.id == def.id) {
                tracing::warn!("duplicate goal id {} ignored", def.id);
                continue;
            }
            goals.push(Arc::new(def));
        }
        Self { goals }
    }

    pub fn get(&self, id: &str) -> Option<Arc<GoalDefinition>> {
        self.goals.iter().find(|g| g.id.as_str() == id).cloned()
    }

    pub fn contains(&self, id: &GoalId) -> bool {
        self.goals.iter().any(|g| &g.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<GoalDefinition>> {
        self.goals.iter()
    }

    pub fn ids(&self) -> Vec<GoalId> {
        self.goals.iter().map(|g| g.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    /// Resolve an explicit goal hint as sent by a presentation layer.
    ///
    /// Priority:
    /// 1. Exact id (case-insensitive)
    /// 2. Exact display name (case-insensitive)
    /// 3. Leading ordinal, e.g. "1. Launch New Product" -> first goal
    /// 4. Fuzzy display-name similarity above a floor
    ///
    /// Unresolvable hints return None and are ignored by the caller.
    pub fn resolve_hint(&self, hint: &str) -> Option<GoalId> {
        let hint = hint.trim();
        if hint.is_empty() {
            return None;
        }
        let lower = hint.to_lowercase();

        if let Some(g) = self
            .goals
            .iter()
            .find(|g| g.id.as_str().eq_ignore_ascii_case(hint) || g.name.to_lowercase() == lower)
        {
            return Some(g.id.clone());
        }

        let ordinal: String = hint.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(n) = ordinal.parse::<usize>()
            && n >= 1
            && let Some(g) = self.goals.get(n - 1)
        {
            return Some(g.id.clone());
        }

        self.goals
            .iter()
            .map(|g| (g, strsim::jaro_winkler(&g.name.to_lowercase(), &lower)))
            .filter(|(_, score)| *score >= HINT_SIMILARITY_FLOOR)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(g, _)| g.id.clone())
    }

    /// The seven research goals shipped with the assistant
    pub fn builtin() -> Self {
        use ProducerId::*;
        Self::new(vec![
            goal(
                "GOAL_1_LAUNCH",
                "New B2C Product Launch Research",
                "Assess market viability, demand, and launch strategy for a new product.",
                &["launch", "market", "entry", "go to market", "viability", "idea", "new product"],
                &["product_concept", "target_audience_hypothesis", "price_range_idea"],
                &[
                    EstimateTamSamSom,
                    AnalyzeTrendsAndTiming,
                    ScoreProblemMarketFit,
                    AnalyzeSubstitutes,
                    IdentifyEarlyAdopters,
                    MapCompetitiveLandscape,
                    DefineMvpScope,
                    EstimateWillingnessToPay,
                    RecommendLaunchChannels,
                    StressTestAssumptions,
                ],
            ),
            goal(
                "GOAL_2_PERFORMANCE",
                "Product Performance Diagnosis",
                "Diagnose why metrics are changing (e.g., drop in sales, low retention).",
                &["metrics", "kpi", "drop", "why is x down", "health", "performance"],
                &["current_kpis", "time_period", "recent_changes"],
                &[
                    ValidateNorthStar,
                    ScanKpiHealth,
                    BenchmarkAgainstIndustry,
                    MapFunnelDropoffs,
                    RankBottlenecks,
                ],
            ),
            goal(
                "GOAL_3_UX_JOURNEY",
                "UX & User Journey Research",
                "Identify friction points, onboarding issues, and journey breaks.",
                &["friction", "onboarding", "flow", "user experience", "ux", "confusing"],
                &["user_journey_steps", "platform_type", "feedback_data"],
                &[
                    DecomposeUserJourney,
                    ScoreEffortAndFriction,
                    AnalyzeTimeToValue,
                    AuditHeuristicViolations,
                    MapEmotionalCurve,
                ],
            ),
            goal(
                "GOAL_4_RETENTION",
                "Retention & Loyalty Analysis",
                "Analyze churn drivers, cohort health, and loyalty levers.",
                &["churn", "retention", "loyalty", "ltv", "leaving", "repeat"],
                &["retention_data", "business_model", "usage_frequency"],
                &[
                    AnalyzeRetentionDecay,
                    IdentifyChurnTriggers,
                    ScoreHabitStrength,
                    CalculateSwitchingCosts,
                    EvaluateLoyaltyProgram,
                ],
            ),
            goal(
                "GOAL_5_HYPOTHESIS",
                "Hypothesis Testing & Validation",
                "Structure, validate, or reject specific business assumptions.",
                &["validate", "test", "experiment", "hypothesis", "assumption", "if we do x"],
                &["hypothesis_statement", "metric_to_move"],
                &[
                    ValidateHypothesisStructure,
                    ScoreAssumptionFragility,
                    SelectEvidenceStrategy,
                    DesignTestBlueprint,
                    InterpretTestResults,
                ],
            ),
            goal(
                "GOAL_6_PRIORITIZATION",
                "Roadmap & Prioritization",
                "Rank initiatives based on impact, effort, and strategy.",
                &["roadmap", "priority", "rank", "what first", "trade-off", "backlog"],
                &["list_of_initiatives", "strategic_goals", "time_horizon", "team_constraints"],
                &[
                    CheckStrategyAlignment,
                    EstimateImpactVsEffort,
                    RankRiceScore,
                    DetectStrategyDrift,
                    SimulateRoadmapScenarios,
                ],
            ),
            goal(
                "GOAL_7_SYNTHESIS",
                "Executive Synthesis & Decision Briefing",
                "Synthesize findings into decision-ready executive artifacts.",
                &["summary", "brief", "presentation", "executive", "deck", "report"],
                &["audience_type", "decision_stakes", "format_preference"],
                &[
                    DistillKeySignals,
                    GenerateExecutiveRecommendation,
                    AnticipateObjections,
                    FormatDecisionBrief,
                ],
            ),
        ])
    }
}

fn goal(
    id: &str,
    name: &str,
    description: &str,
    keywords: &[&str],
    required_context: &[&str],
    producers: &[ProducerId],
) -> GoalDefinition {
    GoalDefinition {
        id: GoalId::new(id),
        name: name.to_string(),
        description: description.to_string(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        required_context: required_context.iter().map(|s| s.to_string()).collect(),
        producers: producers.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_shape() {
        let catalog = GoalCatalog::builtin();
        assert_eq!(catalog.len(), 7);
        let launch = catalog.get("GOAL_1_LAUNCH").unwrap();
        assert_eq!(launch.producers.len(), 10);
        assert_eq!(launch.producers.last(), Some(&ProducerId::StressTestAssumptions));
        assert!(launch.required_context.contains(&"product_concept".to_string()));
    }

    #[test]
    fn test_resolve_hint_by_id_name_and_ordinal() {
        let catalog = GoalCatalog::builtin();
        assert_eq!(
            catalog.resolve_hint("goal_4_retention"),
            Some(GoalId::new("GOAL_4_RETENTION"))
        );
        assert_eq!(
            catalog.resolve_hint("Roadmap & Prioritization"),
            Some(GoalId::new("GOAL_6_PRIORITIZATION"))
        );
        assert_eq!(
            catalog.resolve_hint("1. Launch New Product"),
            Some(GoalId::new("GOAL_1_LAUNCH"))
        );
    }

    #[test]
    fn test_resolve_hint_fuzzy_and_unknown() {
        let catalog = GoalCatalog::builtin();
        assert_eq!(
            catalog.resolve_hint("Retention and Loyalty Analysis"),
            Some(GoalId::new("GOAL_4_RETENTION"))
        );
        assert_eq!(catalog.resolve_hint("quantum gardening"), None);
        assert_eq!(catalog.resolve_hint("9. Nothing"), None);
        assert_eq!(catalog.resolve_hint("   "), None);
    }

    #[test]
    fn test_duplicate_ids_dropped() {
        let a = goal("G", "A", "", &[], &[], &[ProducerId::ValidateNorthStar]);
        let b = goal("G", "B", "", &[], &[], &[ProducerId::ScanKpiHealth]);
        let catalog = GoalCatalog::new(vec![a, b]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("G").unwrap().name, "A");
    }
}
