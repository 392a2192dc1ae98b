//! One user turn as handed to the orchestrator.
//!
//! Presentation layers may send a metadata block ahead of the question:
//!
//! ```text
//! [SYSTEM_METADATA]
//! ACTIVE_GOAL: 1. Launch New Product
//! UPLOADED_FILE: data/survey.csv
//! USER_NOTES: interviews mention price twice
//! LAYER: summary
//! CONTEXT: product_concept=meal kits; price_range_idea=400-600
//! [/SYSTEM_METADATA]
//! USER_QUERY: is this viable?
//! ```
//!
//! Slash commands in the question: `/reset`, `/next`, `/handover`,
//! `/summary`, `/evidence`, `/deep` and `/context key=value; ...`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;

use crate::context::parse_assignments;
use crate::disclosure::DisclosureLayer;

static METADATA_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[SYSTEM_METADATA\](.*?)(?:\[/SYSTEM_METADATA\]|$)").expect("static regex")
});
static METADATA_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(ACTIVE_GOAL|UPLOADED_FILE|USER_NOTES|LAYER|CONTEXT)[ \t]*:[ \t]*(.*?)[ \t\r]*$")
        .expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnCommand {
    /// Clear context, queue, dataset and evidence
    Reset,
    /// Complete the active goal and move to the next one
    NextGoal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnRequest {
    pub query: String,
    pub file: Option<PathBuf>,
    pub goal_hint: Option<String>,
    pub layer: Option<DisclosureLayer>,
    pub context_updates: Vec<(String, Value)>,
    pub notes: Option<String>,
    pub command: Option<TurnCommand>,
}

impl TurnRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_goal_hint(mut self, hint: impl Into<String>) -> Self {
        self.goal_hint = Some(hint.into());
        self
    }

    pub fn with_layer(mut self, layer: DisclosureLayer) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context_updates.push((key.into(), value.into()));
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Parse raw text carrying an optional metadata block and slash commands
    pub fn parse(raw: &str) -> Self {
        let mut req = Self::default();
        let mut query = raw.trim().to_string();

        if let Some(caps) = METADATA_BLOCK.captures(raw) {
            let block = caps.get(1).map_or("", |m| m.as_str());
            for line in METADATA_LINE.captures_iter(block) {
                let value = line[2].trim();
                if value.is_empty() || value.eq_ignore_ascii_case("none") {
                    continue;
                }
                match &line[1] {
                    "ACTIVE_GOAL" => req.goal_hint = Some(value.to_string()),
                    "UPLOADED_FILE" => req.file = Some(PathBuf::from(value)),
                    "USER_NOTES" => req.notes = Some(value.to_string()),
                    "LAYER" => match value.parse() {
                        Ok(layer) => req.layer = Some(layer),
                        Err(e) => tracing::debug!("ignoring metadata layer: {}", e),
                    },
                    "CONTEXT" => req.context_updates.extend(parse_assignments(value)),
                    _ => {}
                }
            }

            let after_block = caps.get(0).map_or(raw.len(), |m| m.end());
            query = match raw.find("USER_QUERY:") {
                Some(pos) => raw[pos + "USER_QUERY:".len()..].trim().to_string(),
                None => raw[after_block..].trim().to_string(),
            };
        }

        if !req.apply_command(&query) {
            req.query = query;
        }
        req
    }

    /// Returns false when `query` is not a recognised command
    fn apply_command(&mut self, query: &str) -> bool {
        let Some(rest) = query.strip_prefix('/') else {
            return false;
        };
        let (cmd, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        match cmd.to_lowercase().as_str() {
            "reset" => self.command = Some(TurnCommand::Reset),
            "next" | "done" => self.command = Some(TurnCommand::NextGoal),
            "context" => {
                self.context_updates.extend(parse_assignments(args));
                return true;
            }
            other => match other.parse::<DisclosureLayer>() {
                Ok(layer) => self.layer = Some(layer),
                Err(_) => {
                    tracing::debug!("unknown command /{}", other);
                    return false;
                }
            },
        }
        self.query = args.trim().to_string();
        true
    }
}
