use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

use crate::clients::traits::{OracleError, SynthesisOracle};
use crate::config::OracleConfig;

/// OpenAI-compatible chat-completions client used as the synthesis oracle.
#[derive(Clone, Debug)]
pub struct OpenAiOracle {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

impl OpenAiOracle {
    pub fn new(cfg: &OracleConfig, api_key: Option<String>) -> Self {
        // Ensure endpoint has the correct path if not provided
        let endpoint = if cfg.base_url.ends_with("/chat/completions") {
            cfg.base_url.clone()
        } else {
            format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'))
        };

        // The caller applies its own per-call timeout; this one only guards
        // against a connection that never resolves.
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms.saturating_mul(2)))
            .build()
            .unwrap_or_default();

        Self {
            endpoint,
            model: cfg.model.clone(),
            api_key,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            client,
        }
    }

    fn extract_content(response_json: &Value) -> Result<String, OracleError> {
        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| OracleError::ParseError("missing choices[0].message.content".into()))
    }
}

#[async_trait]
impl SynthesisOracle for OpenAiOracle {
    async fn invoke(&self, prompt: &str) -> Result<String, OracleError> {
        // Local OpenAI-compatible servers run keyless; the hosted API never does
        if self.api_key.is_none() && self.endpoint.contains("api.openai.com") {
            return Err(OracleError::NotConfigured(
                "OPENAI_API_KEY is required for api.openai.com".into(),
            ));
        }

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            req = req.bearer_auth(key);
        }

        let res = req
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(OracleError::Status { status, body: text });
        }

        let response_json: Value = res
            .json()
            .await
            .map_err(|e| OracleError::ParseError(e.to_string()))?;

        Self::extract_content(&response_json)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
