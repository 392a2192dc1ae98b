mod common;

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use clarity_mind::config::LimitsConfig;
use clarity_mind::disclosure::{
    DisclosureLayer, DisclosureRenderer, FAIL_CLOSED_MESSAGE, INABILITY_MESSAGE, extract_fenced_json,
};
use clarity_mind::goals::{GoalCatalog, GoalId};
use clarity_mind::producers::{Findings, GoalRun, ProducerId, ProducerOutcome, ResultMap};

use common::{CLEAR_VERDICT, DownOracle, ScriptedOracle};

fn retention_run() -> GoalRun {
    let mut decay = ResultMap::new();
    decay.insert(
        "retention_d30".into(),
        json!({"type": "numeric", "count": 120, "mean": 0.42, "min": 0.1, "max": 0.8}),
    );
    decay.insert("retention_data".into(), json!("monthly cohorts"));
    let mut triggers = ResultMap::new();
    triggers.insert("quote_count".into(), json!(1));
    triggers.insert("quotes".into(), json!([{"text": "too expensive for me", "id": "e1"}]));

    let mut findings = Findings::new();
    findings.insert(ProducerId::AnalyzeRetentionDecay, ProducerOutcome::Available(decay));
    findings.insert(ProducerId::IdentifyChurnTriggers, ProducerOutcome::Available(triggers));
    findings.insert(ProducerId::ScoreHabitStrength, ProducerOutcome::unavailable("timed out after 100ms"));

    GoalRun {
        goal: GoalId::new("GOAL_4_RETENTION"),
        findings,
        trace: Vec::new(),
        started_at: Utc::now(),
    }
}

fn renderer(oracle: Arc<ScriptedOracle>) -> DisclosureRenderer {
    DisclosureRenderer::new(oracle, 2_000, LimitsConfig::default())
}

#[tokio::test]
async fn test_handover_withholds_full_dump() {
    let run = retention_run();
    let leaky = format!(
        "Analysis complete. Here is everything:\n{}\nWould you like me to start with the Executive Summary?",
        run.findings.to_pretty_string()
    );
    let oracle = Arc::new(ScriptedOracle::new(CLEAR_VERDICT, &leaky));
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_4_RETENTION").unwrap();

    let out = renderer(oracle).render(DisclosureLayer::Handover, &goal, &run).await;
    assert!(!out.contains(&run.findings.to_pretty_string()));
    assert!(out.contains("Analysis complete"));
}

#[tokio::test]
async fn test_deep_research_is_the_findings_verbatim() {
    let run = retention_run();
    let oracle = Arc::new(ScriptedOracle::new(CLEAR_VERDICT, "unused"));
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_4_RETENTION").unwrap();

    let out = renderer(oracle).render(DisclosureLayer::DeepResearch, &goal, &run).await;
    assert_eq!(extract_fenced_json(&out), Some(run.findings.to_json()));
    assert!(out.contains("\"status\": \"unavailable\""));
}

#[tokio::test]
async fn test_evidence_lists_sources_and_unavailable_steps() {
    let run = retention_run();
    let oracle = Arc::new(ScriptedOracle::new(
        CLEAR_VERDICT,
        "First I checked retention_d30, which averages 0.42.",
    ));
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_4_RETENTION").unwrap();

    let out = renderer(oracle).render(DisclosureLayer::Evidence, &goal, &run).await;
    assert!(out.contains("### Sources"));
    assert!(out.contains("analyze_retention_decay"));
    assert!(out.contains("Unavailable steps:"));
    assert!(out.contains("score_habit_strength: unavailable"));
}

#[tokio::test]
async fn test_summary_directives_are_scrubbed() {
    let run = retention_run();
    let oracle = Arc::new(ScriptedOracle::new(
        CLEAR_VERDICT,
        "Retention is weak. You should cut prices. I recommend a loyalty pilot.",
    ));
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_4_RETENTION").unwrap();

    let out = renderer(oracle).render(DisclosureLayer::Summary, &goal, &run).await;
    let lower = out.to_lowercase();
    assert!(!lower.contains("you should"));
    assert!(!lower.contains("i recommend"));
    assert!(out.contains("The data suggests"));
}

#[tokio::test]
async fn test_safety_outage_fails_closed() {
    let run = retention_run();
    let oracle = Arc::new(ScriptedOracle::new(CLEAR_VERDICT, "Retention is weak."));
    oracle.take_safety_down();
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_4_RETENTION").unwrap();

    let out = renderer(oracle).render(DisclosureLayer::Summary, &goal, &run).await;
    assert_eq!(out, FAIL_CLOSED_MESSAGE);
}

#[tokio::test]
async fn test_unreachable_oracle_yields_inability() {
    let run = retention_run();
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_4_RETENTION").unwrap();
    let renderer = DisclosureRenderer::new(Arc::new(DownOracle), 1_000, LimitsConfig::default());

    let out = renderer.render(DisclosureLayer::Handover, &goal, &run).await;
    assert_eq!(out, INABILITY_MESSAGE);
}
