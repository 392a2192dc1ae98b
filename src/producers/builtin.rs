//! Table-driven producer used for every built-in id.
//!
//! Each declared input is resolved in order:
//! - `Column`: numeric or categorical summary of the uploaded table
//! - `Context`: the session value, copied as-is
//! - `Evidence`: top quotes for the query (segment-filtered when set)
//! - `Prior`: counted toward evidence strength, signals lifted for roll-ups
//!
//! A producer with none of its inputs available fails, which the router
//! turns into an `unavailable` placeholder.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::findings::describe_value;
use super::{
    Findings, InputSource, ProducerError, ProducerId, ProducerInput, ProducerKind, ProducerSpec,
    ResultMap, SignalProducer,
};

/// Roll-ups lift at most this many signals from prior results
const MAX_SIGNALS: usize = 6;

pub struct BuiltinProducer {
    spec: ProducerSpec,
}

impl BuiltinProducer {
    pub fn new(id: ProducerId) -> Self {
        Self { spec: id.spec() }
    }
}

#[async_trait]
impl SignalProducer for BuiltinProducer {
    fn id(&self) -> ProducerId {
        self.spec.id
    }

    async fn produce(&self, input: &ProducerInput, prior: &Findings) -> Result<ResultMap, ProducerError> {
        let mut result = ResultMap::new();
        let mut missing: Vec<String> = Vec::new();
        let mut quotes: Vec<Value> = Vec::new();
        let mut priors_declared = 0usize;
        let mut priors_available: Vec<ProducerId> = Vec::new();
        let mut resolved = 0usize;

        for source in self.spec.inputs {
            match *source {
                InputSource::Column(name) => {
                    match input.table.as_ref().and_then(|t| t.summarize(name)) {
                        Some(summary) => {
                            result.insert(name.to_string(), summary);
                            resolved += 1;
                        }
                        None => missing.push(format!("column:{}", name)),
                    }
                }
                InputSource::Context(field) => {
                    if input.context.is_present(field)
                        && let Some(v) = input.context.get(field)
                    {
                        result.insert(field.to_string(), v.clone());
                        resolved += 1;
                    } else {
                        missing.push(format!("context:{}", field));
                    }
                }
                InputSource::Evidence(query) => {
                    let segment = input.segment();
                    let hits = input
                        .evidence
                        .query(query, input.evidence_top_k, segment.as_deref())
                        .await
                        .map_err(|e| ProducerError::Evidence(e.to_string()))?;
                    if hits.is_empty() {
                        missing.push("evidence".to_string());
                    } else {
                        resolved += 1;
                        quotes.extend(hits.into_iter().map(|h| {
                            let mut q = json!({"text": h.text, "id": h.id});
                            if let Some(seg) = h.metadata.get("segment") {
                                q["segment"] = json!(seg);
                            }
                            q
                        }));
                    }
                }
                InputSource::Prior(id) => {
                    priors_declared += 1;
                    if prior.available(id).is_some() {
                        priors_available.push(id);
                        resolved += 1;
                    } else {
                        missing.push(format!("prior:{}", id));
                    }
                }
            }
        }

        if resolved == 0 {
            return Err(ProducerError::MissingInputs(missing));
        }

        if !quotes.is_empty() {
            result.insert("quote_count".into(), json!(quotes.len()));
            result.insert("quotes".into(), Value::Array(quotes));
        }

        if self.spec.kind == ProducerKind::Synthesis {
            let declared = if priors_declared == 0 {
                self.spec.inputs.len()
            } else {
                priors_declared
            };
            let available = if priors_declared == 0 {
                resolved
            } else {
                priors_available.len()
            };
            let strength = available as f64 / declared as f64;
            result.insert("evidence_strength".into(), json!((strength * 100.0).round() / 100.0));
            result.insert("verdict".into(), json!(verdict(strength)));
            result.insert(
                "signals".into(),
                Value::Array(lift_signals(prior, &priors_available)),
            );
        }

        if !missing.is_empty() {
            result.insert("missing_inputs".into(), json!(missing));
        }
        Ok(result)
    }
}

fn verdict(strength: f64) -> &'static str {
    if strength >= 0.8 {
        "evidence_sufficient"
    } else if strength >= 0.5 {
        "validate_further"
    } else {
        "insufficient_evidence"
    }
}

/// Short `producer.field: value` strings from prior results, in run order
fn lift_signals(prior: &Findings, ids: &[ProducerId]) -> Vec<Value> {
    let mut signals = Vec::new();
    for id in ids {
        let Some(map) = prior.available(*id) else {
            continue;
        };
        for (key, value) in map {
            if signals.len() >= MAX_SIGNALS {
                return signals;
            }
            if matches!(value, Value::Array(_)) {
                continue;
            }
            let Some(rendered) = describe_value(value) else {
                continue;
            };
            signals.push(json!(format!("{}.{}: {}", id, key, rendered)));
        }
    }
    signals
}
