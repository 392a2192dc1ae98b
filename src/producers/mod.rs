//! Signal producers: named analysis steps that turn uploaded data, context
//! and retrieved evidence into findings.
//!
//! Every producer id has a static [`ProducerSpec`] describing its kind and
//! declared inputs. The [`ProducerRegistry`] maps ids to implementations;
//! the built-in registry covers all ids with [`builtin::BuiltinProducer`].

pub mod builtin;
pub mod findings;
pub mod router;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::context::Context;
use crate::evidence::EvidenceStore;
use crate::goals::GoalId;
use crate::ingest::DataTable;

pub use builtin::BuiltinProducer;
pub use findings::{Findings, ProducerOutcome, ResultMap, describe_value};
pub use router::{GoalRun, ProducerRouter, TraceEntry, TraceStatus};

macro_rules! producer_ids {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Identifier of one analysis step
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ProducerId {
            $($variant),+
        }

        impl ProducerId {
            pub const ALL: &'static [ProducerId] = &[$(ProducerId::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(ProducerId::$variant => $name),+
                }
            }
        }

        impl FromStr for ProducerId {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(ProducerId::$variant),)+
                    other => Err(format!("unknown producer '{}'", other)),
                }
            }
        }
    };
}

producer_ids! {
    EstimateTamSamSom => "estimate_tam_sam_som",
    AnalyzeTrendsAndTiming => "analyze_trends_and_timing",
    ScoreProblemMarketFit => "score_problem_market_fit",
    AnalyzeSubstitutes => "analyze_substitutes",
    IdentifyEarlyAdopters => "identify_early_adopters",
    MapCompetitiveLandscape => "map_competitive_landscape",
    DefineMvpScope => "define_mvp_scope",
    EstimateWillingnessToPay => "estimate_willingness_to_pay",
    RecommendLaunchChannels => "recommend_launch_channels",
    StressTestAssumptions => "stress_test_assumptions",
    ValidateNorthStar => "validate_north_star",
    ScanKpiHealth => "scan_kpi_health",
    BenchmarkAgainstIndustry => "benchmark_against_industry",
    MapFunnelDropoffs => "map_funnel_dropoffs",
    RankBottlenecks => "rank_bottlenecks",
    DecomposeUserJourney => "decompose_user_journey",
    ScoreEffortAndFriction => "score_effort_and_friction",
    AnalyzeTimeToValue => "analyze_time_to_value",
    AuditHeuristicViolations => "audit_heuristic_violations",
    MapEmotionalCurve => "map_emotional_curve",
    AnalyzeRetentionDecay => "analyze_retention_decay",
    IdentifyChurnTriggers => "identify_churn_triggers",
    ScoreHabitStrength => "score_habit_strength",
    CalculateSwitchingCosts => "calculate_switching_costs",
    EvaluateLoyaltyProgram => "evaluate_loyalty_program",
    ValidateHypothesisStructure => "validate_hypothesis_structure",
    ScoreAssumptionFragility => "score_assumption_fragility",
    SelectEvidenceStrategy => "select_evidence_strategy",
    DesignTestBlueprint => "design_test_blueprint",
    InterpretTestResults => "interpret_test_results",
    CheckStrategyAlignment => "check_strategy_alignment",
    EstimateImpactVsEffort => "estimate_impact_vs_effort",
    RankRiceScore => "rank_rice_score",
    DetectStrategyDrift => "detect_strategy_drift",
    SimulateRoadmapScenarios => "simulate_roadmap_scenarios",
    DistillKeySignals => "distill_key_signals",
    GenerateExecutiveRecommendation => "generate_executive_recommendation",
    AnticipateObjections => "anticipate_objections",
    FormatDecisionBrief => "format_decision_brief",
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProducerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProducerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerKind {
    /// Column statistics over the uploaded dataset
    Quantitative,
    /// Retrieved quotes from the evidence store
    Qualitative,
    /// Roll-up over earlier producers of the same goal
    Synthesis,
}

/// Where a producer reads one of its inputs from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Column(&'static str),
    Context(&'static str),
    /// Free-text retrieval query against the evidence store
    Evidence(&'static str),
    /// Result of an earlier producer in the same run
    Prior(ProducerId),
}

#[derive(Debug, Clone, Copy)]
pub struct ProducerSpec {
    pub id: ProducerId,
    pub kind: ProducerKind,
    pub label: &'static str,
    pub inputs: &'static [InputSource],
}

impl ProducerId {
    pub fn spec(self) -> ProducerSpec {
        use InputSource::*;
        use ProducerId::*;
        use ProducerKind::*;

        let (kind, label, inputs): (ProducerKind, &'static str, &'static [InputSource]) = match self {
            EstimateTamSamSom => (
                Quantitative,
                "Market size (TAM/SAM/SOM)",
                &[
                    Column("segment"),
                    Column("city_tier"),
                    Column("purchase_frequency"),
                    Context("target_audience_hypothesis"),
                ],
            ),
            AnalyzeTrendsAndTiming => (
                Quantitative,
                "Trends and timing",
                &[Column("purchase_frequency"), Column("age_group")],
            ),
            ScoreProblemMarketFit => (
                Qualitative,
                "Problem-market fit",
                &[
                    Column("satisfaction_score"),
                    Evidence("problem pain frustrating workaround"),
                    Context("product_concept"),
                ],
            ),
            AnalyzeSubstitutes => (
                Qualitative,
                "Substitutes in use",
                &[Column("current_brand"), Evidence("alternative brand switched instead")],
            ),
            IdentifyEarlyAdopters => (
                Quantitative,
                "Early adopter profile",
                &[Column("age_group"), Column("segment"), Column("login_frequency")],
            ),
            MapCompetitiveLandscape => (
                Quantitative,
                "Competitive landscape",
                &[Column("current_brand"), Column("satisfaction_score")],
            ),
            DefineMvpScope => (
                Qualitative,
                "MVP scope",
                &[Column("feature_name"), Evidence("feature missing need want")],
            ),
            EstimateWillingnessToPay => (
                Quantitative,
                "Willingness to pay",
                &[Column("willingness_to_pay_inr"), Context("price_range_idea")],
            ),
            RecommendLaunchChannels => (
                Qualitative,
                "Launch channels",
                &[Column("city_tier"), Evidence("heard about found through channel")],
            ),
            StressTestAssumptions => (
                Synthesis,
                "Assumption stress test",
                &[
                    Prior(EstimateTamSamSom),
                    Prior(ScoreProblemMarketFit),
                    Prior(MapCompetitiveLandscape),
                    Prior(EstimateWillingnessToPay),
                ],
            ),
            ValidateNorthStar => (
                Quantitative,
                "North-star metric check",
                &[
                    Column("retention_d30"),
                    Column("purchase_frequency"),
                    Context("current_kpis"),
                ],
            ),
            ScanKpiHealth => (
                Quantitative,
                "KPI health scan",
                &[
                    Column("retention_d30"),
                    Column("acquisition_cost"),
                    Column("satisfaction_score"),
                ],
            ),
            BenchmarkAgainstIndustry => (
                Quantitative,
                "Industry benchmark",
                &[
                    Column("acquisition_cost"),
                    Column("retention_d30"),
                    Context("time_period"),
                ],
            ),
            MapFunnelDropoffs => (
                Quantitative,
                "Funnel drop-offs",
                &[Column("funnel_stage"), Column("effort_score")],
            ),
            RankBottlenecks => (
                Synthesis,
                "Bottleneck ranking",
                &[
                    Prior(MapFunnelDropoffs),
                    Prior(ScanKpiHealth),
                    Context("recent_changes"),
                ],
            ),
            DecomposeUserJourney => (
                Quantitative,
                "Journey decomposition",
                &[Column("funnel_stage"), Context("user_journey_steps")],
            ),
            ScoreEffortAndFriction => (
                Quantitative,
                "Effort and friction",
                &[Column("effort_score"), Column("friction_type")],
            ),
            AnalyzeTimeToValue => (
                Quantitative,
                "Time to value",
                &[Column("time_to_value_seconds"), Column("funnel_stage")],
            ),
            AuditHeuristicViolations => (
                Qualitative,
                "Usability heuristic audit",
                &[Column("friction_type"), Evidence("confusing unclear error stuck")],
            ),
            MapEmotionalCurve => (
                Qualitative,
                "Emotional curve",
                &[Column("satisfaction_score"), Evidence("love hate frustrated happy annoyed")],
            ),
            AnalyzeRetentionDecay => (
                Quantitative,
                "Retention decay",
                &[
                    Column("retention_d30"),
                    Column("login_frequency"),
                    Context("retention_data"),
                ],
            ),
            IdentifyChurnTriggers => (
                Qualitative,
                "Churn triggers",
                &[Column("churn_reason"), Evidence("cancel leave stopped quit churn")],
            ),
            ScoreHabitStrength => (
                Quantitative,
                "Habit strength",
                &[
                    Column("login_frequency"),
                    Column("purchase_frequency"),
                    Context("usage_frequency"),
                ],
            ),
            CalculateSwitchingCosts => (
                Quantitative,
                "Switching costs",
                &[Column("current_brand"), Column("satisfaction_score")],
            ),
            EvaluateLoyaltyProgram => (
                Qualitative,
                "Loyalty program",
                &[
                    Column("purchase_frequency"),
                    Evidence("reward points loyalty discount"),
                ],
            ),
            ValidateHypothesisStructure => (
                Quantitative,
                "Hypothesis structure",
                &[Context("hypothesis_statement"), Context("metric_to_move")],
            ),
            ScoreAssumptionFragility => (
                Quantitative,
                "Assumption fragility",
                &[Column("confidence_score"), Column("impact_score")],
            ),
            SelectEvidenceStrategy => (
                Qualitative,
                "Evidence strategy",
                &[Context("hypothesis_statement"), Evidence("evidence proof test data")],
            ),
            DesignTestBlueprint => (
                Quantitative,
                "Test blueprint",
                &[Column("p_value"), Context("metric_to_move")],
            ),
            InterpretTestResults => (
                Synthesis,
                "Test result interpretation",
                &[
                    Prior(DesignTestBlueprint),
                    Prior(ScoreAssumptionFragility),
                    Column("p_value"),
                ],
            ),
            CheckStrategyAlignment => (
                Qualitative,
                "Strategy alignment",
                &[
                    Context("strategic_goals"),
                    Context("list_of_initiatives"),
                    Evidence("strategy vision priority goal"),
                ],
            ),
            EstimateImpactVsEffort => (
                Quantitative,
                "Impact vs effort",
                &[
                    Column("impact_score"),
                    Column("effort_score"),
                    Column("confidence_score"),
                ],
            ),
            RankRiceScore => (
                Quantitative,
                "RICE ranking",
                &[
                    Column("feature_name"),
                    Column("impact_score"),
                    Column("confidence_score"),
                    Context("list_of_initiatives"),
                ],
            ),
            DetectStrategyDrift => (
                Synthesis,
                "Strategy drift",
                &[Prior(CheckStrategyAlignment), Prior(RankRiceScore)],
            ),
            SimulateRoadmapScenarios => (
                Synthesis,
                "Roadmap scenarios",
                &[
                    Prior(EstimateImpactVsEffort),
                    Prior(RankRiceScore),
                    Context("time_horizon"),
                    Context("team_constraints"),
                ],
            ),
            DistillKeySignals => (
                Qualitative,
                "Key signals",
                &[Evidence("key insight important signal"), Context("audience_type")],
            ),
            GenerateExecutiveRecommendation => (
                Synthesis,
                "Executive direction",
                &[Prior(DistillKeySignals), Context("decision_stakes")],
            ),
            AnticipateObjections => (
                Qualitative,
                "Anticipated objections",
                &[
                    Prior(GenerateExecutiveRecommendation),
                    Evidence("concern risk worry objection"),
                ],
            ),
            FormatDecisionBrief => (
                Synthesis,
                "Decision brief",
                &[
                    Prior(DistillKeySignals),
                    Prior(GenerateExecutiveRecommendation),
                    Prior(AnticipateObjections),
                    Context("format_preference"),
                ],
            ),
        };

        ProducerSpec {
            id: self,
            kind,
            label,
            inputs,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("no usable input (missing: {})", .0.join(", "))]
    MissingInputs(Vec<String>),
    #[error("evidence lookup failed: {0}")]
    Evidence(String),
    #[error("{0}")]
    Failed(String),
}

/// Normalized, read-only view of everything a producer may consult
#[derive(Clone)]
pub struct ProducerInput {
    pub goal: GoalId,
    pub query: String,
    pub context: Context,
    pub table: Option<Arc<DataTable>>,
    pub evidence: Arc<dyn EvidenceStore>,
    pub evidence_top_k: usize,
}

impl ProducerInput {
    /// Segment filter for evidence retrieval, taken from the `segment` context field
    pub fn segment(&self) -> Option<String> {
        self.context.get_str("segment")
    }
}

#[async_trait]
pub trait SignalProducer: Send + Sync {
    fn id(&self) -> ProducerId;

    /// Build this producer's result. `prior` holds outcomes of the producers
    /// that ran earlier for the same goal, in order.
    async fn produce(&self, input: &ProducerInput, prior: &Findings) -> Result<ResultMap, ProducerError>;
}

/// Id -> implementation lookup used by the router
#[derive(Clone, Default)]
pub struct ProducerRegistry {
    producers: HashMap<ProducerId, Arc<dyn SignalProducer>>,
}

impl ProducerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in implementation for every producer id
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for id in ProducerId::ALL {
            registry.register(Arc::new(BuiltinProducer::new(*id)));
        }
        registry
    }

    /// Register or replace the implementation for `producer.id()`
    pub fn register(&mut self, producer: Arc<dyn SignalProducer>) {
        self.producers.insert(producer.id(), producer);
    }

    pub fn get(&self, id: ProducerId) -> Option<Arc<dyn SignalProducer>> {
        self.producers.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_for_all_ids() {
        assert_eq!(ProducerId::ALL.len(), 39);
        for id in ProducerId::ALL {
            assert_eq!(id.as_str().parse::<ProducerId>().unwrap(), *id);
        }
        assert!("not_a_producer".parse::<ProducerId>().is_err());
    }

    #[test]
    fn test_prior_inputs_point_backwards_in_builtin_goals() {
        let catalog = crate::goals::GoalCatalog::builtin();
        for goal in catalog.iter() {
            for (pos, id) in goal.producers.iter().enumerate() {
                for input in id.spec().inputs {
                    if let InputSource::Prior(p) = input {
                        let earlier = &goal.producers[..pos];
                        assert!(earlier.contains(p), "{} reads {} before it runs", id, p);
                    }
                }
            }
        }
    }

    #[test]
    fn test_builtin_registry_covers_all_ids() {
        let registry = ProducerRegistry::builtin();
        assert_eq!(registry.len(), ProducerId::ALL.len());
        assert!(registry.get(ProducerId::StressTestAssumptions).is_some());
    }
}
