//! Four-signal clarity check over a goal's findings, and the pure escalation
//! decision derived from it.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::clients::{OracleError, SynthesisOracle, invoke_with_timeout};
use crate::goals::GoalDefinition;
use crate::producers::Findings;
use crate::prompts::{self, CLARITY_JUDGE};

/// What kind of information is missing when findings are not yet clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum MissingInfo {
    #[default]
    None,
    /// The user needs to prioritize among open areas
    TypeA,
    /// A summary would resolve it
    TypeB,
    /// The data does not cover it
    TypeC,
}

impl MissingInfo {
    /// Lenient parse: "Type A", "TypeA", "A", "priority" ... Unknown -> None.
    pub fn parse_lenient(raw: &str) -> Self {
        let norm: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match norm.as_str() {
            n if n.starts_with("typea") => Self::TypeA,
            n if n.starts_with("typeb") => Self::TypeB,
            n if n.starts_with("typec") => Self::TypeC,
            "a" | "priority" | "prioritization" | "prioritisation" => Self::TypeA,
            "b" | "summary" => Self::TypeB,
            "c" | "datagap" | "gap" => Self::TypeC,
            "" | "none" | "null" => Self::None,
            other => {
                tracing::debug!("unknown missing-info classification '{}', treating as none", other);
                Self::None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClarityAssessment {
    pub question_coverage: bool,
    pub risk_visibility: bool,
    pub structural_understanding: bool,
    pub diminishing_returns: bool,
    pub missing_info: MissingInfo,
    pub rationale: String,
}

impl ClarityAssessment {
    /// All signals false, no classification
    pub fn conservative(rationale: impl Into<String>) -> Self {
        Self {
            question_coverage: false,
            risk_visibility: false,
            structural_understanding: false,
            diminishing_returns: false,
            missing_info: MissingInfo::None,
            rationale: rationale.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EscalationKind {
    Prioritization,
    Summary,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EscalationDecision {
    pub is_clear: bool,
    pub escalation_needed: bool,
    pub kind: EscalationKind,
}

#[derive(Debug, Error)]
pub enum AssessError {
    #[error("clarity judge unreachable: {0}")]
    Unreachable(#[from] OracleError),
    #[error("clarity judge reply malformed: {0}")]
    Malformed(String),
}

/// Pure mapping from an assessment to an escalation decision
pub fn decide(assessment: &ClarityAssessment) -> EscalationDecision {
    let is_clear = assessment.question_coverage
        && assessment.risk_visibility
        && assessment.structural_understanding
        && assessment.diminishing_returns;

    let kind = if is_clear {
        EscalationKind::None
    } else {
        match assessment.missing_info {
            MissingInfo::TypeA => EscalationKind::Prioritization,
            MissingInfo::TypeB => EscalationKind::Summary,
            MissingInfo::TypeC | MissingInfo::None => EscalationKind::None,
        }
    };

    EscalationDecision {
        is_clear,
        escalation_needed: kind != EscalationKind::None,
        kind,
    }
}

/// One judge call and parse. Separates "could not ask" from "could not read".
pub async fn assess(
    oracle: &dyn SynthesisOracle,
    prompt: &str,
    timeout_ms: u64,
) -> Result<ClarityAssessment, AssessError> {
    let reply = invoke_with_timeout(oracle, prompt, timeout_ms).await?;
    parse_assessment(&reply)
}

/// Parse the judge reply. Code fences and prose around the JSON object are ignored.
pub fn parse_assessment(reply: &str) -> Result<ClarityAssessment, AssessError> {
    let body = extract_json_object(reply)
        .ok_or_else(|| AssessError::Malformed("no JSON object in reply".into()))?;
    let v: Value =
        serde_json::from_str(body).map_err(|e| AssessError::Malformed(e.to_string()))?;
    let obj = v
        .as_object()
        .ok_or_else(|| AssessError::Malformed("reply is not an object".into()))?;

    const SIGNALS: [&str; 4] = [
        "question_coverage",
        "risk_visibility",
        "structural_understanding",
        "diminishing_returns",
    ];
    if !SIGNALS.iter().any(|k| obj.contains_key(*k)) {
        return Err(AssessError::Malformed("no clarity signals present".into()));
    }

    let flag = |key: &str| match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        _ => false,
    };
    let missing_info = obj
        .get("missing_info_type")
        .and_then(Value::as_str)
        .map(MissingInfo::parse_lenient)
        .unwrap_or_default();
    let rationale = obj
        .get("reasoning")
        .or_else(|| obj.get("rationale"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Ok(ClarityAssessment {
        question_coverage: flag(SIGNALS[0]),
        risk_visibility: flag(SIGNALS[1]),
        structural_understanding: flag(SIGNALS[2]),
        diminishing_returns: flag(SIGNALS[3]),
        missing_info,
        rationale,
    })
}

/// Slice from the first `{` to the last `}` after stripping code fences
fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```");
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

pub struct ClarityValidator {
    oracle: Arc<dyn SynthesisOracle>,
    timeout_ms: u64,
    findings_budget: usize,
}

impl ClarityValidator {
    pub fn new(oracle: Arc<dyn SynthesisOracle>, timeout_ms: u64, findings_budget: usize) -> Self {
        Self {
            oracle,
            timeout_ms,
            findings_budget,
        }
    }

    pub fn prompt(&self, goal: &GoalDefinition, findings: &Findings, user_input: &str) -> String {
        let findings_json = prompts::clip(&findings.to_compact_string(), self.findings_budget);
        CLARITY_JUDGE.render(&[
            ("goal", goal.name.as_str()),
            ("input", user_input),
            ("findings", findings_json.as_str()),
        ])
    }

    /// Never fails: an unreachable or unreadable judge yields the conservative assessment
    pub async fn check(
        &self,
        goal: &GoalDefinition,
        findings: &Findings,
        user_input: &str,
    ) -> ClarityAssessment {
        tracing::info!(goal = %goal.id, "validating clarity");
        let prompt = self.prompt(goal, findings, user_input);
        match assess(self.oracle.as_ref(), &prompt, self.timeout_ms).await {
            Ok(a) => {
                tracing::debug!(goal = %goal.id, ?a, "clarity assessment");
                a
            }
            Err(AssessError::Unreachable(e)) => {
                tracing::warn!(goal = %goal.id, "clarity judge unreachable: {}", e);
                ClarityAssessment::conservative("validation unavailable: judge unreachable")
            }
            Err(AssessError::Malformed(e)) => {
                tracing::warn!(goal = %goal.id, "clarity judge reply malformed: {}", e);
                ClarityAssessment::conservative("validation unavailable: judge reply malformed")
            }
        }
    }
}
