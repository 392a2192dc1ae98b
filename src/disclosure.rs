//! Progressive disclosure: four output layers over one goal run, each
//! released through a safety pass before it reaches the user.
//!
//! - Handover: completion notice with two or three signals, report withheld
//! - Summary: verdict first, one highlighted risk
//! - Evidence: values used plus the producer sequence, with a sources section
//! - DeepResearch: the findings as indented JSON, no oracle draft

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::clients::{OracleError, SynthesisOracle, invoke_with_timeout};
use crate::config::LimitsConfig;
use crate::goals::GoalDefinition;
use crate::producers::{Findings, GoalRun, ProducerOutcome, describe_value};
use crate::prompts::{self, EVIDENCE, HANDOVER, SAFETY_CHECK, SUMMARY};

/// Returned when a draft could not be produced
pub const INABILITY_MESSAGE: &str =
    "I'm not able to put this together reliably right now. Please try again in a moment.";

/// Returned when the safety rewrite is unavailable; unchecked drafts never ship
pub const FAIL_CLOSED_MESSAGE: &str =
    "I can't share a checked response right now. Please try again in a moment.";

const DEEP_VIEW_HEADER: &str = "### Deep data view";
const WITHHELD_MARKER: &str = "[full results available on request]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureLayer {
    Handover,
    Summary,
    Evidence,
    DeepResearch,
}

impl DisclosureLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handover => "handover",
            Self::Summary => "summary",
            Self::Evidence => "evidence",
            Self::DeepResearch => "deep_research",
        }
    }
}

impl fmt::Display for DisclosureLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisclosureLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "handover" => Ok(Self::Handover),
            "summary" | "executive_summary" => Ok(Self::Summary),
            "evidence" | "trace" => Ok(Self::Evidence),
            "deep" | "deep_research" | "raw" | "data" => Ok(Self::DeepResearch),
            other => Err(format!("unknown disclosure layer '{}'", other)),
        }
    }
}

// Modal directives followed by a verb
static MODAL_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:you|we)\s+(?:should|must|need\s+to|ought\s+to)\b|\bmy\s+(?:advice|recommendation)\s+(?:is|would\s+be)\s+to\b|\bi\s+advise\s+you\s+to\b",
    )
    .expect("static regex")
});

// Recommendation phrasing followed by a noun phrase or clause
static RECOMMEND_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:i|we)\s+(?:would\s+)?(?:strongly\s+)?recommend(?:\s+that)?\b|\bmy\s+(?:advice|recommendation)(?:\s+(?:is|would\s+be)(?:\s+that)?)?\b|\bi\s+advise(?:\s+that)?\b",
    )
    .expect("static regex")
});

fn matched_case(caps: &Captures, replacement: &str) -> String {
    let starts_upper = caps[0].chars().next().is_some_and(char::is_uppercase);
    if starts_upper {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}

/// Deterministic removal of directive phrasing. Idempotent.
pub fn scrub_directives(text: &str) -> String {
    let pass = MODAL_DIRECTIVE.replace_all(text, |caps: &Captures| {
        matched_case(caps, "the data suggests one option is to")
    });
    RECOMMEND_DIRECTIVE
        .replace_all(&pass, |caps: &Captures| matched_case(caps, "the data suggests"))
        .into_owned()
}

/// Backtick run opening a fence on this line, if any
fn fence_opening(line: &str) -> Option<usize> {
    let ticks = line.trim_start().chars().take_while(|c| *c == '`').count();
    (ticks >= 3).then_some(ticks)
}

/// A line made only of at least `open` backticks closes the fence
fn closes_fence(line: &str, open: usize) -> bool {
    let t = line.trim();
    t.len() >= open && t.chars().all(|c| c == '`')
}

/// Scrub prose but leave fenced blocks untouched
fn scrub_outside_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prose = String::new();
    let mut open: Option<usize> = None;

    for line in text.split_inclusive('\n') {
        match open {
            Some(n) => {
                out.push_str(line);
                if closes_fence(line, n) {
                    open = None;
                }
            }
            None => match fence_opening(line) {
                Some(n) => {
                    out.push_str(&scrub_directives(&prose));
                    prose.clear();
                    out.push_str(line);
                    open = Some(n);
                }
                None => prose.push_str(line),
            },
        }
    }
    out.push_str(&scrub_directives(&prose));
    out
}

/// First fenced JSON block, parsed
pub fn extract_fenced_json(text: &str) -> Option<Value> {
    let mut lines = text.lines();
    let open = loop {
        let line = lines.next()?;
        if let Some(n) = fence_opening(line)
            && line.trim_start()[n..].trim().eq_ignore_ascii_case("json")
        {
            break n;
        }
    };
    let body: Vec<&str> = lines.take_while(|l| !closes_fence(l, open)).collect();
    serde_json::from_str(body.join("\n").trim()).ok()
}

/// Indented findings inside a fenced JSON block. The fence is longer than
/// any backtick run inside the dump.
pub fn deep_view(findings: &Findings) -> String {
    let dump = findings.to_pretty_string();
    let mut longest = 0;
    let mut run = 0;
    for c in dump.chars() {
        run = if c == '`' { run + 1 } else { 0 };
        longest = longest.max(run);
    }
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{}\n\n{}json\n{}\n{}", DEEP_VIEW_HEADER, fence, dump, fence)
}

/// Oracle rewrite followed by the deterministic scrub. Fails closed.
pub struct SafetyPass {
    oracle: Arc<dyn SynthesisOracle>,
    timeout_ms: u64,
}

impl SafetyPass {
    pub fn new(oracle: Arc<dyn SynthesisOracle>, timeout_ms: u64) -> Self {
        Self { oracle, timeout_ms }
    }

    pub async fn release(&self, draft: &str, layer: DisclosureLayer) -> String {
        let prompt = SAFETY_CHECK.render(&[("draft", draft)]);
        let rewritten = match invoke_with_timeout(self.oracle.as_ref(), &prompt, self.timeout_ms).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(layer = %layer, "safety rewrite failed, withholding draft: {}", e);
                return FAIL_CLOSED_MESSAGE.to_string();
            }
        };

        if layer == DisclosureLayer::DeepResearch {
            let original = extract_fenced_json(draft);
            if original.is_some() && extract_fenced_json(&rewritten) == original {
                return scrub_outside_fences(&rewritten);
            }
            tracing::warn!("safety rewrite altered the deep data view, releasing the original dump");
            return scrub_outside_fences(draft);
        }

        scrub_directives(&rewritten)
    }

    /// Release free-form prose that belongs to no disclosure layer
    pub async fn release_prose(&self, draft: &str) -> String {
        self.release(draft, DisclosureLayer::Summary).await
    }
}

pub struct DisclosureRenderer {
    oracle: Arc<dyn SynthesisOracle>,
    timeout_ms: u64,
    limits: LimitsConfig,
    safety: SafetyPass,
}

impl DisclosureRenderer {
    pub fn new(oracle: Arc<dyn SynthesisOracle>, timeout_ms: u64, limits: LimitsConfig) -> Self {
        let safety = SafetyPass::new(Arc::clone(&oracle), timeout_ms);
        Self {
            oracle,
            timeout_ms,
            limits,
            safety,
        }
    }

    /// Unchecked draft for `layer`
    pub async fn draft(
        &self,
        layer: DisclosureLayer,
        goal: &GoalDefinition,
        run: &GoalRun,
    ) -> Result<String, OracleError> {
        let compact = run.findings.to_compact_string();
        let trace = run.trace_line();

        match layer {
            DisclosureLayer::Handover => {
                let preview = prompts::clip(&compact, self.limits.handover_preview_chars);
                let prompt = HANDOVER.render(&[
                    ("goal", goal.name.as_str()),
                    ("trace", trace.as_str()),
                    ("preview", preview.as_str()),
                ]);
                let text = self.ask(&prompt).await?;
                Ok(withhold_full_dump(&text, &run.findings))
            }
            DisclosureLayer::Summary => {
                let findings = prompts::clip(&compact, self.limits.summary_findings_chars);
                let prompt = SUMMARY.render(&[
                    ("goal", goal.name.as_str()),
                    ("findings", findings.as_str()),
                ]);
                self.ask(&prompt).await
            }
            DisclosureLayer::Evidence => {
                let findings = prompts::clip(&compact, self.limits.evidence_findings_chars);
                let unavailable = run
                    .findings
                    .unavailable()
                    .iter()
                    .map(|(id, reason)| format!("{} ({})", id, reason))
                    .collect::<Vec<_>>()
                    .join(", ");
                let unavailable = if unavailable.is_empty() {
                    "none".to_string()
                } else {
                    unavailable
                };
                let prompt = EVIDENCE.render(&[
                    ("goal", goal.name.as_str()),
                    ("findings", findings.as_str()),
                    ("trace", trace.as_str()),
                    ("unavailable", unavailable.as_str()),
                ]);
                let narrative = self.ask(&prompt).await?;
                Ok(format!("{}\n\n{}", narrative.trim_end(), sources_section(run)))
            }
            DisclosureLayer::DeepResearch => Ok(deep_view(&run.findings)),
        }
    }

    /// Release a draft through the safety pass
    pub async fn release(&self, draft: &str, layer: DisclosureLayer) -> String {
        self.safety.release(draft, layer).await
    }

    pub fn safety(&self) -> &SafetyPass {
        &self.safety
    }

    /// Draft and release; a failed draft yields the generic inability message
    pub async fn render(&self, layer: DisclosureLayer, goal: &GoalDefinition, run: &GoalRun) -> String {
        match self.draft(layer, goal, run).await {
            Ok(draft) => self.release(&draft, layer).await,
            Err(e) => {
                tracing::warn!(layer = %layer, goal = %goal.id, "draft failed: {}", e);
                INABILITY_MESSAGE.to_string()
            }
        }
    }

    async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        invoke_with_timeout(self.oracle.as_ref(), prompt, self.timeout_ms).await
    }
}

/// Handover never carries the complete findings serialization
fn withhold_full_dump(text: &str, findings: &Findings) -> String {
    let mut out = text.to_string();
    for dump in [findings.to_pretty_string(), findings.to_compact_string()] {
        if dump.len() > 2 && out.contains(&dump) {
            out = out.replace(&dump, WITHHELD_MARKER);
        }
    }
    out
}

/// Deterministic list of the values behind an evidence-layer answer
fn sources_section(run: &GoalRun) -> String {
    let mut lines = vec!["### Sources".to_string()];
    for (id, outcome) in run.findings.iter() {
        if let ProducerOutcome::Available(map) = outcome {
            let values: Vec<String> = map
                .iter()
                .filter(|(k, _)| k.as_str() != "missing_inputs")
                .filter_map(|(k, v)| describe_value(v).map(|d| format!("{}: {}", k, d)))
                .collect();
            lines.push(format!("- {} ({}): {}", id, id.spec().label, values.join("; ")));
        }
    }
    let unavailable = run.findings.unavailable();
    if !unavailable.is_empty() {
        lines.push("Unavailable steps:".to_string());
        for (id, reason) in unavailable {
            lines.push(format!("- {}: unavailable ({})", id, reason));
        }
    }
    lines.join("\n")
}
