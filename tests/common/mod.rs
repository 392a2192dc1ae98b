//! Shared fixtures: a scripted oracle that answers by prompt shape
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use clarity_mind::clients::{OracleError, SynthesisOracle};
use clarity_mind::evidence::InMemoryEvidenceStore;
use clarity_mind::{Config, Orchestrator};

pub const CLEAR_VERDICT: &str = r#"{"question_coverage": true, "risk_visibility": true, "structural_understanding": true, "diminishing_returns": true, "missing_info_type": "None", "reasoning": "covered"}"#;

pub const PRIORITIZE_VERDICT: &str = r#"{"question_coverage": true, "risk_visibility": false, "structural_understanding": true, "diminishing_returns": false, "missing_info_type": "Type A", "reasoning": "too many open areas"}"#;

pub const SUMMARY_VERDICT: &str = r#"{"question_coverage": true, "risk_visibility": true, "structural_understanding": false, "diminishing_returns": true, "missing_info_type": "Type B", "reasoning": "needs structure"}"#;

/// Judge prompts get `verdict`, safety prompts echo the draft back
/// unchanged, everything else gets `reply`.
pub struct ScriptedOracle {
    pub verdict: Mutex<String>,
    pub reply: Mutex<String>,
    /// When set, safety prompts fail
    pub safety_down: Mutex<bool>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(verdict: &str, reply: &str) -> Self {
        Self {
            verdict: Mutex::new(verdict.to_string()),
            reply: Mutex::new(reply.to_string()),
            safety_down: Mutex::new(false),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_verdict(&self, verdict: &str) {
        *self.verdict.lock().unwrap() = verdict.to_string();
    }

    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = reply.to_string();
    }

    pub fn take_safety_down(&self) {
        *self.safety_down.lock().unwrap() = true;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts_containing(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

#[async_trait]
impl SynthesisOracle for ScriptedOracle {
    async fn invoke(&self, prompt: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.contains("quality assurance judge") {
            return Ok(self.verdict.lock().unwrap().clone());
        }
        if prompt.starts_with("Review the following draft") {
            if *self.safety_down.lock().unwrap() {
                return Err(OracleError::Transport("connection refused".into()));
            }
            let draft = prompt
                .split_once("DRAFT:\n")
                .and_then(|(_, rest)| rest.rsplit_once("\n\nCHECKLIST:"))
                .map(|(draft, _)| draft.to_string())
                .unwrap_or_default();
            return Ok(draft);
        }
        Ok(self.reply.lock().unwrap().clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Oracle that is never reachable
pub struct DownOracle;

#[async_trait]
impl SynthesisOracle for DownOracle {
    async fn invoke(&self, _prompt: &str) -> Result<String, OracleError> {
        Err(OracleError::Transport("connection refused".into()))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.oracle.timeout_ms = 2_000;
    config.limits.producer_timeout_ms = 2_000;
    config
}

pub fn orchestrator(oracle: Arc<ScriptedOracle>) -> (Orchestrator, Arc<InMemoryEvidenceStore>) {
    orchestrator_with(test_config(), oracle)
}

pub fn orchestrator_with(
    config: Config,
    oracle: Arc<ScriptedOracle>,
) -> (Orchestrator, Arc<InMemoryEvidenceStore>) {
    let evidence = Arc::new(InMemoryEvidenceStore::new());
    let orch = Orchestrator::new(config, oracle, evidence.clone());
    (orch, evidence)
}

pub const LAUNCH_CONTEXT: &[(&str, &str)] = &[
    ("product_concept", "ready-to-cook meal kits"),
    ("target_audience_hypothesis", "young professionals in metro cities"),
    ("price_range_idea", "400-600 INR per kit"),
];
