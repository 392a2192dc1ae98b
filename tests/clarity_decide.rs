mod common;

use std::sync::Arc;

use clarity_mind::clarity::{ClarityAssessment, ClarityValidator, EscalationKind, MissingInfo, decide};
use clarity_mind::goals::GoalCatalog;
use clarity_mind::producers::Findings;

use common::{DownOracle, ScriptedOracle};

const KINDS: [MissingInfo; 4] = [
    MissingInfo::None,
    MissingInfo::TypeA,
    MissingInfo::TypeB,
    MissingInfo::TypeC,
];

fn assessment(mask: u8, missing_info: MissingInfo) -> ClarityAssessment {
    ClarityAssessment {
        question_coverage: mask & 1 != 0,
        risk_visibility: mask & 2 != 0,
        structural_understanding: mask & 4 != 0,
        diminishing_returns: mask & 8 != 0,
        missing_info,
        rationale: String::new(),
    }
}

#[test]
fn test_decision_table_over_all_signal_combinations() {
    for mask in 0u8..16 {
        for kind in KINDS {
            let decision = decide(&assessment(mask, kind));
            let all_true = mask == 0b1111;
            assert_eq!(decision.is_clear, all_true, "mask {:04b} {:?}", mask, kind);

            let expected = match (all_true, kind) {
                (true, _) => EscalationKind::None,
                (false, MissingInfo::TypeA) => EscalationKind::Prioritization,
                (false, MissingInfo::TypeB) => EscalationKind::Summary,
                (false, _) => EscalationKind::None,
            };
            assert_eq!(decision.kind, expected, "mask {:04b} {:?}", mask, kind);
            assert_eq!(decision.escalation_needed, expected != EscalationKind::None);
        }
    }
}

#[test]
fn test_clear_findings_never_escalate() {
    for kind in KINDS {
        let decision = decide(&assessment(0b1111, kind));
        assert!(decision.is_clear);
        assert!(!decision.escalation_needed);
    }
}

#[tokio::test]
async fn test_unreachable_judge_is_conservative() {
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_1_LAUNCH").unwrap();
    let validator = ClarityValidator::new(Arc::new(DownOracle), 1_000, 2_000);

    let a = validator.check(&goal, &Findings::new(), "is this viable?").await;
    assert!(!a.question_coverage && !a.risk_visibility);
    assert!(!a.structural_understanding && !a.diminishing_returns);
    assert_eq!(a.missing_info, MissingInfo::None);
    assert!(a.rationale.contains("unreachable"));

    let d = decide(&a);
    assert!(!d.is_clear);
    assert!(!d.escalation_needed);
}

#[tokio::test]
async fn test_malformed_judge_reply_is_conservative() {
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_4_RETENTION").unwrap();
    let oracle = Arc::new(ScriptedOracle::new("looks good to me!", "unused"));
    let validator = ClarityValidator::new(oracle, 1_000, 2_000);

    let a = validator.check(&goal, &Findings::new(), "why are people leaving").await;
    assert!(!decide(&a).is_clear);
    assert!(a.rationale.contains("malformed"));
}

#[tokio::test]
async fn test_fenced_judge_reply_is_read() {
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_6_PRIORITIZATION").unwrap();
    let reply = format!("```json\n{}\n```", common::PRIORITIZE_VERDICT);
    let validator = ClarityValidator::new(Arc::new(ScriptedOracle::new(&reply, "unused")), 1_000, 2_000);

    let a = validator.check(&goal, &Findings::new(), "what first").await;
    assert_eq!(a.missing_info, MissingInfo::TypeA);
    assert_eq!(decide(&a).kind, EscalationKind::Prioritization);
}
