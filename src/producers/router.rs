use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Findings, ProducerId, ProducerInput, ProducerOutcome, ProducerRegistry};
use crate::goals::{GoalDefinition, GoalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Ok,
    Failed,
    TimedOut,
    Panicked,
    NotRegistered,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub producer: ProducerId,
    pub status: TraceStatus,
    pub elapsed_ms: u64,
}

/// Findings and execution trace of one goal's producer run
#[derive(Debug, Clone)]
pub struct GoalRun {
    pub goal: GoalId,
    pub findings: Findings,
    pub trace: Vec<TraceEntry>,
    pub started_at: DateTime<Utc>,
}

impl GoalRun {
    /// "a (ok) -> b (timed_out)" narrative of the run
    pub fn trace_line(&self) -> String {
        self.trace
            .iter()
            .map(|t| {
                let status = serde_json::to_value(t.status)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                format!("{} ({})", t.producer, status)
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Runs a goal's producers in order; a failing producer never aborts the run
#[derive(Clone)]
pub struct ProducerRouter {
    registry: Arc<ProducerRegistry>,
    timeout_ms: u64,
}

impl ProducerRouter {
    pub fn new(registry: Arc<ProducerRegistry>, timeout_ms: u64) -> Self {
        Self {
            registry,
            timeout_ms,
        }
    }

    pub async fn run(&self, goal: &GoalDefinition, input: Arc<ProducerInput>) -> GoalRun {
        let started_at = Utc::now();
        let mut findings = Findings::new();
        let mut trace = Vec::with_capacity(goal.producers.len());

        for &id in &goal.producers {
            let t0 = Instant::now();
            let (outcome, status) = self.run_one(id, &input, &findings).await;
            let elapsed_ms = t0.elapsed().as_millis() as u64;

            match &outcome {
                ProducerOutcome::Available(_) => {
                    tracing::debug!(goal = %goal.id, producer = %id, elapsed_ms, "producer ok");
                }
                ProducerOutcome::Unavailable { reason } => {
                    tracing::warn!(goal = %goal.id, producer = %id, elapsed_ms, "producer unavailable: {}", reason);
                }
            }

            findings.insert(id, outcome);
            trace.push(TraceEntry {
                producer: id,
                status,
                elapsed_ms,
            });
        }

        tracing::info!(
            goal = %goal.id,
            available = findings.available_ids().len(),
            total = findings.len(),
            "producer run finished"
        );

        GoalRun {
            goal: goal.id.clone(),
            findings,
            trace,
            started_at,
        }
    }

    async fn run_one(
        &self,
        id: ProducerId,
        input: &Arc<ProducerInput>,
        prior: &Findings,
    ) -> (ProducerOutcome, TraceStatus) {
        let Some(producer) = self.registry.get(id) else {
            return (
                ProducerOutcome::unavailable("no producer registered"),
                TraceStatus::NotRegistered,
            );
        };

        let input = Arc::clone(input);
        let prior = prior.clone();
        // Own task so a panic inside a producer is contained to this step
        let handle = tokio::spawn(async move { producer.produce(&input, &prior).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(Duration::from_millis(self.timeout_ms), handle).await {
            Ok(Ok(Ok(map))) => (ProducerOutcome::Available(map), TraceStatus::Ok),
            Ok(Ok(Err(e))) => (ProducerOutcome::unavailable(e.to_string()), TraceStatus::Failed),
            Ok(Err(join_err)) => {
                tracing::error!(producer = %id, "producer task failed: {}", join_err);
                (
                    ProducerOutcome::unavailable("producer crashed"),
                    TraceStatus::Panicked,
                )
            }
            Err(_) => {
                abort.abort();
                (
                    ProducerOutcome::unavailable(format!("timed out after {}ms", self.timeout_ms)),
                    TraceStatus::TimedOut,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::evidence::InMemoryEvidenceStore;
    use crate::producers::{ProducerError, ResultMap, SignalProducer};
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed(ProducerId);

    #[async_trait]
    impl SignalProducer for Fixed {
        fn id(&self) -> ProducerId {
            self.0
        }
        async fn produce(&self, _: &ProducerInput, prior: &Findings) -> Result<ResultMap, ProducerError> {
            let mut m = ResultMap::new();
            m.insert("seen_before".into(), json!(prior.len()));
            Ok(m)
        }
    }

    struct Boom(ProducerId);

    #[async_trait]
    impl SignalProducer for Boom {
        fn id(&self) -> ProducerId {
            self.0
        }
        async fn produce(&self, _: &ProducerInput, _: &Findings) -> Result<ResultMap, ProducerError> {
            panic!("producer exploded");
        }
    }

    struct Sleepy(ProducerId);

    #[async_trait]
    impl SignalProducer for Sleepy {
        fn id(&self) -> ProducerId {
            self.0
        }
        async fn produce(&self, _: &ProducerInput, _: &Findings) -> Result<ResultMap, ProducerError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ResultMap::new())
        }
    }

    fn goal(producers: Vec<ProducerId>) -> GoalDefinition {
        GoalDefinition {
            id: GoalId::new("G"),
            name: "G".into(),
            description: String::new(),
            keywords: vec![],
            required_context: vec![],
            producers,
        }
    }

    fn input() -> Arc<ProducerInput> {
        Arc::new(ProducerInput {
            goal: GoalId::new("G"),
            query: String::new(),
            context: Context::new(),
            table: None,
            evidence: Arc::new(InMemoryEvidenceStore::new()),
            evidence_top_k: 3,
        })
    }

    #[tokio::test]
    async fn test_failures_become_placeholders_and_run_continues() {
        use ProducerId::*;
        let mut registry = ProducerRegistry::empty();
        registry.register(Arc::new(Fixed(ValidateNorthStar)));
        registry.register(Arc::new(Boom(ScanKpiHealth)));
        registry.register(Arc::new(Sleepy(BenchmarkAgainstIndustry)));
        registry.register(Arc::new(Fixed(RankBottlenecks)));

        let router = ProducerRouter::new(Arc::new(registry), 50);
        let run = router
            .run(
                &goal(vec![
                    ValidateNorthStar,
                    ScanKpiHealth,
                    BenchmarkAgainstIndustry,
                    MapFunnelDropoffs,
                    RankBottlenecks,
                ]),
                input(),
            )
            .await;

        assert_eq!(run.findings.len(), 5);
        assert_eq!(run.findings.available_ids(), vec![ValidateNorthStar, RankBottlenecks]);
        let statuses: Vec<TraceStatus> = run.trace.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![
                TraceStatus::Ok,
                TraceStatus::Panicked,
                TraceStatus::TimedOut,
                TraceStatus::NotRegistered,
                TraceStatus::Ok,
            ]
        );
        // The last producer saw all four earlier outcomes
        assert_eq!(
            run.findings.available(RankBottlenecks).unwrap()["seen_before"],
            4
        );
        assert!(run.trace_line().starts_with("validate_north_star (ok) -> scan_kpi_health (panicked)"));
    }
}
