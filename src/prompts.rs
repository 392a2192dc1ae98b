//! Prompt templates sent to the synthesis oracle.
//!
//! Templates use `{name}` placeholders filled by [`PromptTemplate::render`]
//! in a single pass, so substituted text is never re-expanded. Each template
//! carries a stable id and a content checksum that is logged with every call.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("static regex"));

#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    /// Stable identifier (format: category-name-v1)
    pub id: &'static str,
    pub template: &'static str,
}

impl PromptTemplate {
    /// Substitute `{name}` placeholders; unknown placeholders are left as-is
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        tracing::trace!(prompt = self.id, checksum = %self.checksum(), "rendering prompt");
        PLACEHOLDER
            .replace_all(self.template, |caps: &Captures| {
                let name = &caps[1];
                vars.iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Short BLAKE3 checksum of the template text
    pub fn checksum(&self) -> String {
        blake3::hash(self.template.as_bytes()).to_hex()[..12].to_string()
    }
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

pub const SYSTEM_PERSONA: &str = "You are a research-first decision support assistant.
Your mandate is to provide clarity, structured research and explicit risk visibility.

Hard constraints:
1. No decision authority. Never tell the user what to do.
   Bad: \"You should launch now.\"
   Good: \"The data suggests a high probability of success, though retention risks remain.\"
2. No prescriptions. Avoid \"must\", \"should\", \"recommend\" and \"advice\".
   Use \"suggests\", \"indicates\", \"implies\", \"highlights\".
3. No hype. Keep a neutral, analytical, calm tone.
4. Progressive disclosure. Start with a summary; show deep metrics only when asked.

Core behavior:
- Think in goals: map every request to one of the supported research goals.
- Prefer being clear about what is unknown over guessing.
- State confidence and known unknowns.

Formatting:
- Use clear headers (##) and bullet points.
- If data is missing, state: \"Data gap identified:\"";

pub static GOAL_DETECTION: PromptTemplate = PromptTemplate {
    id: "routing-goal-detection-v1",
    template: "Map the user's request onto the research goals below.

GOALS:
{goals}

USER REQUEST:
\"{input}\"

Answer with the matching goal ids separated by commas, most relevant first.
Answer NONE if no goal applies. Output ids only.",
};

pub static CLARITY_JUDGE: PromptTemplate = PromptTemplate {
    id: "validation-clarity-judge-v1",
    template: "You are the quality assurance judge. Determine whether the user has sufficient clarity.

CONTEXT:
User goal: {goal}
User query: \"{input}\"
Current findings: {findings}

INSTRUCTIONS:
1. Check question coverage: are the core questions of the goal answered?
2. Check risk visibility (critical): are key risks and trade-offs surfaced?
3. Check structure: are the insights organized?
4. Check diminishing returns: would more analysis only add minor detail?

Respond with a single JSON object and nothing else:
{\"question_coverage\": bool, \"risk_visibility\": bool, \"structural_understanding\": bool, \"diminishing_returns\": bool, \"missing_info_type\": \"None\" | \"Type A\" | \"Type B\" | \"Type C\", \"reasoning\": string}

Type A means the user must prioritize among open areas, Type B means a summary would resolve it, Type C means the data does not cover it.",
};

pub static HANDOVER: PromptTemplate = PromptTemplate {
    id: "disclosure-handover-v1",
    template: "You are a research assistant who has just finished processing a dataset.

CONTEXT:
- Goal: {goal}
- Steps run: {trace}
- Key data points found: {preview}

TASK:
Write a brief, professional handover message.
1. Confirm the analysis is complete.
2. Mention two or three interesting areas you detected.
3. Do not give the full report yet.
4. End by asking: \"Would you like me to start with the Executive Summary, or do you have a specific question?\"",
};

pub static SUMMARY: PromptTemplate = PromptTemplate {
    id: "disclosure-summary-v1",
    template: "Draft a clarity summary (executive brief).

GOAL: {goal}
DATA: {findings}

RULES:
1. Start with the direct answer or verdict.
2. Highlight the single most important risk clearly.
3. Use neutral language (\"The data suggests...\").",
};

pub static EVIDENCE: PromptTemplate = PromptTemplate {
    id: "disclosure-evidence-v1",
    template: "You are explaining research findings in detail.

GOAL: {goal}
DATA FINDINGS: {findings}
RESEARCH STEPS TAKEN: {trace}
UNAVAILABLE STEPS: {unavailable}

INSTRUCTIONS:
1. Answer with a detailed, data-backed explanation.
2. Show your work: name the numbers you used and narrate the sequence (\"First I checked X, which led me to analyze Y...\").
3. Refer to specific inputs or file columns where possible.
4. Say plainly which steps produced no data. Do not fill those gaps.",
};

pub static SAFETY_CHECK: PromptTemplate = PromptTemplate {
    id: "safety-rewrite-v1",
    template: "Review the following draft response for strict adherence to safety protocols.

DRAFT:
{draft}

CHECKLIST:
1. Did the draft say \"You should\" or \"I recommend\"? Change it to \"The data suggests\".
2. Did the draft invent data not traceable to the findings? Remove it.
3. Is the tone hype-y? Make it neutral.
4. Keep any fenced JSON block and any \"Sources\" section exactly as written.

Return the refined response only.",
};

pub static OPEN_CONVERSATION: PromptTemplate = PromptTemplate {
    id: "conversation-open-v1",
    template: "{persona}

No research goal is active. Answer the user briefly. If the request sounds like research, name the goal areas you can help with: {goals}.

USER: {input}",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_single_pass() {
        let out = SUMMARY.render(&[("goal", "Launch {findings}"), ("findings", "{}")]);
        assert!(out.contains("GOAL: Launch {findings}"));
        assert!(out.contains("DATA: {}"));
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("abc", 10), "abc");
        assert_eq!(clip("", 0), "");
    }

    #[test]
    fn test_judge_template_keeps_json_braces() {
        let out = CLARITY_JUDGE.render(&[("goal", "g"), ("input", "i"), ("findings", "f")]);
        assert!(out.contains("{\"question_coverage\": bool"));
    }
}
