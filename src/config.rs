use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ClarityMindError, Result};
use crate::goals::{GoalCatalog, GoalDefinition};

fn invalid(message: impl Into<String>) -> ClarityMindError {
    ClarityMindError::Config {
        message: message.into(),
    }
}

/// Main configuration structure loaded from clarity_mind.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    pub oracle: OracleConfig,
    pub limits: LimitsConfig,
    pub evidence: EvidenceConfig,
    /// Optional catalog override; the built-in seven goals are used when empty
    pub goals: Vec<GoalDefinition>,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Synthesis oracle endpoint and call policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the oracle to map free text onto goals instead of keyword matching
    pub semantic_goal_matching: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-turbo".to_string(),
            timeout_ms: 30_000,
            temperature: 0.0,
            max_tokens: 800,
            semantic_goal_matching: false,
        }
    }
}

/// Character budgets for prompts built from findings, plus producer timeout
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub clarity_findings_chars: usize,
    pub handover_preview_chars: usize,
    pub summary_findings_chars: usize,
    pub evidence_findings_chars: usize,
    pub producer_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            clarity_findings_chars: 2000,
            handover_preview_chars: 500,
            summary_findings_chars: 1500,
            evidence_findings_chars: 3000,
            producer_timeout_ms: 10_000,
        }
    }
}

/// Evidence retrieval and free-text column detection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EvidenceConfig {
    pub top_k: usize,
    pub text_columns: Vec<String>,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            text_columns: [
                "verbatim",
                "feedback",
                "feedback_text",
                "comment",
                "review",
                "notes",
                "churn_reason",
            ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub openai_api_key: Option<String>,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            log_level: "clarity_mind=info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "clarity_mind=info".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses CLARITY_MIND_CONFIG environment variable or defaults to "clarity_mind.toml"
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// Same as [`Config::load`], with an explicit config path taking precedence
    pub fn load_from(path: Option<&str>) -> anyhow::Result<Self> {
        // Load environment variables with fallbacks:
        // 1) CLARITY_ENV_FILE if set
        // 2) ./.env
        // 3) ../.env (repo root when running from a subdirectory)
        if let Ok(env_path) = std::env::var("CLARITY_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
            if std::env::var("OPENAI_API_KEY").is_err() {
                let _ = dotenvy::from_path("../.env");
            }
        }

        let config_path = match path {
            Some(p) => p.to_string(),
            None => std::env::var("CLARITY_MIND_CONFIG")
                .unwrap_or_else(|_| "clarity_mind.toml".to_string()),
        };

        let mut config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            Self::from_toml_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CLARITY_ORACLE_BASE_URL") {
            self.oracle.base_url = url;
            tracing::debug!("CLARITY_ORACLE_BASE_URL env override applied");
        }
        if let Ok(model) = std::env::var("CLARITY_ORACLE_MODEL") {
            self.oracle.model = model;
            tracing::debug!("CLARITY_ORACLE_MODEL env override applied");
        }
        if let Some(ms) = std::env::var("CLARITY_ORACLE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.oracle.timeout_ms = ms;
        }
        if let Some(ms) = std::env::var("CLARITY_PRODUCER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.limits.producer_timeout_ms = ms;
        }
        if let Some(k) = std::env::var("CLARITY_EVIDENCE_TOP_K")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.evidence.top_k = k;
        }
    }

    /// Validate and clamp; duplicate goal ids are a hard error
    pub fn validate(&mut self) -> Result<()> {
        if self.oracle.timeout_ms < 1000 {
            tracing::warn!(
                "oracle.timeout_ms {} below 1000, clamping to 1000",
                self.oracle.timeout_ms
            );
            self.oracle.timeout_ms = 1000;
        }
        if self.limits.producer_timeout_ms < 1000 {
            self.limits.producer_timeout_ms = 1000;
        }
        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(invalid("oracle.temperature must be between 0.0 and 2.0"));
        }
        for budget in [
            &mut self.limits.clarity_findings_chars,
            &mut self.limits.handover_preview_chars,
            &mut self.limits.summary_findings_chars,
            &mut self.limits.evidence_findings_chars,
        ] {
            if *budget < 100 {
                *budget = 100;
            }
        }
        self.evidence.top_k = self.evidence.top_k.clamp(1, 20);

        let mut seen = HashSet::new();
        for goal in &self.goals {
            if !seen.insert(goal.id.as_str().to_string()) {
                return Err(invalid(format!(
                    "duplicate goal id '{}' in configuration",
                    goal.id
                )));
            }
            if goal.producers.is_empty() {
                return Err(invalid(format!("goal '{}' lists no producers", goal.id)));
            }
        }
        Ok(())
    }

    /// Goal catalog: configured goals when present, otherwise the built-in table
    pub fn catalog(&self) -> GoalCatalog {
        if self.goals.is_empty() {
            GoalCatalog::builtin()
        } else {
            GoalCatalog::new(self.goals.clone())
        }
    }
}
