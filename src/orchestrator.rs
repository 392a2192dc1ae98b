//! Turn orchestration: raw input -> goal resolution -> context gate ->
//! producer run -> clarity check -> disclosure -> safety pass -> output.
//!
//! [`Orchestrator::process`] is the only entry point a presentation layer
//! needs. It never returns an error; degraded paths produce calm fixed text
//! and the underlying cause is logged.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::clarity::{ClarityAssessment, ClarityValidator, EscalationDecision, EscalationKind, MissingInfo, decide};
use crate::clients::{SynthesisOracle, invoke_with_timeout};
use crate::config::Config;
use crate::context::missing_fields;
use crate::disclosure::{DisclosureLayer, DisclosureRenderer, INABILITY_MESSAGE};
use crate::error::{ClarityMindError, Result};
use crate::evidence::EvidenceStore;
use crate::goals::{GoalCatalog, GoalDefinition, GoalId, GoalMatcher, KeywordMatcher, OracleMatcher, resolve};
use crate::ingest::{DataTable, IngestError, utils};
use crate::producers::{GoalRun, ProducerInput, ProducerRegistry, ProducerRouter};
use crate::prompts::{OPEN_CONVERSATION, SYSTEM_PERSONA};
use crate::session::{Session, SessionState};
use crate::turn::{TurnCommand, TurnRequest};

pub const RESET_MESSAGE: &str =
    "Session reset. Context, research goals, uploaded data and evidence were cleared.";
pub const INGEST_FAILED_MESSAGE: &str =
    "I couldn't read that file. Please upload a CSV with a header row and try again.";
pub const IDLE_MESSAGE: &str =
    "No research goal is open right now. Tell me what you would like to look into.";

/// What a turn ended up doing
#[derive(Debug, Clone, PartialEq)]
pub enum TurnKind {
    Reset,
    IngestFailed,
    /// Required context is missing; nothing ran
    DataGap { goal: GoalId, missing: Vec<String> },
    Rendered { goal: GoalId, layer: DisclosureLayer },
    Conversation,
    Idle,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub kind: TurnKind,
    pub assessment: Option<ClarityAssessment>,
    pub decision: Option<EscalationDecision>,
}

impl TurnOutcome {
    fn plain(text: impl Into<String>, kind: TurnKind) -> Self {
        Self {
            text: text.into(),
            kind,
            assessment: None,
            decision: None,
        }
    }
}

pub struct Orchestrator {
    config: Config,
    catalog: Arc<GoalCatalog>,
    matcher: Arc<dyn GoalMatcher>,
    router: ProducerRouter,
    validator: ClarityValidator,
    renderer: DisclosureRenderer,
    evidence: Arc<dyn EvidenceStore>,
    oracle: Arc<dyn SynthesisOracle>,
}

impl Orchestrator {
    pub fn new(config: Config, oracle: Arc<dyn SynthesisOracle>, evidence: Arc<dyn EvidenceStore>) -> Self {
        let catalog = Arc::new(config.catalog());
        let matcher: Arc<dyn GoalMatcher> = if config.oracle.semantic_goal_matching {
            Arc::new(OracleMatcher::new(Arc::clone(&oracle), config.oracle.timeout_ms))
        } else {
            Arc::new(KeywordMatcher)
        };
        let router = ProducerRouter::new(
            Arc::new(ProducerRegistry::builtin()),
            config.limits.producer_timeout_ms,
        );
        let validator = ClarityValidator::new(
            Arc::clone(&oracle),
            config.oracle.timeout_ms,
            config.limits.clarity_findings_chars,
        );
        let renderer = DisclosureRenderer::new(
            Arc::clone(&oracle),
            config.oracle.timeout_ms,
            config.limits.clone(),
        );

        tracing::info!(
            goals = catalog.len(),
            oracle = oracle.name(),
            semantic_matching = config.oracle.semantic_goal_matching,
            "orchestrator ready"
        );

        Self {
            config,
            catalog,
            matcher,
            router,
            validator,
            renderer,
            evidence,
            oracle,
        }
    }

    /// Replace the producer implementations
    pub fn with_registry(mut self, registry: ProducerRegistry) -> Self {
        self.router = ProducerRouter::new(Arc::new(registry), self.config.limits.producer_timeout_ms);
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn GoalMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn catalog(&self) -> &GoalCatalog {
        &self.catalog
    }

    /// Handle one turn and return the text to show the user
    pub async fn process(&self, session: &Session, request: TurnRequest) -> String {
        self.process_turn(session, request).await.text
    }

    /// Same as [`Orchestrator::process`], with what the turn did
    pub async fn process_turn(&self, session: &Session, request: TurnRequest) -> TurnOutcome {
        let mut state = session.lock().await;
        tracing::info!(session = %state.id, active = ?state.queue.active(), "turn started");

        if request.command == Some(TurnCommand::Reset) {
            state.reset();
            if let Err(e) = self.evidence.delete_all().await {
                tracing::warn!("evidence store reset failed: {}", e);
            }
            return TurnOutcome::plain(RESET_MESSAGE, TurnKind::Reset);
        }

        // Presentation layers resend context, notes and uploads every turn;
        // only new content discards the stored run.
        if state.context.extend(request.context_updates.iter().cloned()) {
            tracing::debug!(fields = request.context_updates.len(), "context updated");
            state.invalidate_run();
        }

        if let Some(notes) = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            let id = utils::note_id(notes);
            if !state.note_ids.contains(&id) {
                let stored = self.ingest_notes(notes, &id, &state).await;
                match stored {
                    Ok(_) => {
                        state.note_ids.insert(id);
                        state.invalidate_run();
                    }
                    Err(e) => tracing::warn!("failed to store user notes: {}", e),
                }
            }
        }

        if let Some(path) = request.file.as_deref() {
            let known = state
                .dataset
                .as_ref()
                .and_then(|d| d.checksum().map(str::to_string));
            match self.ingest_file(path, known).await {
                Ok(Some(table)) => {
                    state.dataset = Some(Arc::new(table));
                    state.invalidate_run();
                }
                Ok(None) => tracing::debug!(path = %path.display(), "upload unchanged"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "upload rejected: {}", e);
                    return TurnOutcome::plain(INGEST_FAILED_MESSAGE, TurnKind::IngestFailed);
                }
            }
        }

        let mut completed = None;
        if request.command == Some(TurnCommand::NextGoal) || (state.settled && request.layer.is_none()) {
            completed = state.queue.complete_active();
            state.invalidate_run();
        }

        let before = state.queue.active().cloned();
        let mut proposals = self.resolve_goals(&request).await;
        // A goal closed this turn is not reopened by a resent hint
        proposals.retain(|id| Some(id) != completed.as_ref());
        if !proposals.is_empty() {
            state.queue.enqueue(proposals);
        }
        if state.queue.active() != before.as_ref() {
            state.invalidate_run();
        }

        let Some(active) = state.queue.active().cloned() else {
            return self.converse(&request).await;
        };
        let Some(goal) = self.catalog.get(active.as_str()) else {
            tracing::debug!(goal = %active, "active goal missing from catalog, dropping it");
            state.queue.complete_active();
            return self.converse(&request).await;
        };

        let missing = missing_fields(&goal, &state.context);
        if !missing.is_empty() {
            tracing::info!(goal = %goal.id, ?missing, "blocked on context");
            return TurnOutcome::plain(
                data_gap_notice(&goal, &missing),
                TurnKind::DataGap {
                    goal: active,
                    missing,
                },
            );
        }

        if let Some(layer) = request.layer
            && let Some(run) = state.last_run.as_ref().filter(|r| r.goal == active)
        {
            let text = self.renderer.render(layer, &goal, run).await;
            return TurnOutcome::plain(text, TurnKind::Rendered { goal: active, layer });
        }

        let input = Arc::new(ProducerInput {
            goal: active.clone(),
            query: request.query.clone(),
            context: state.context.clone(),
            table: state.dataset.clone(),
            evidence: Arc::clone(&self.evidence),
            evidence_top_k: self.config.evidence.top_k,
        });
        let run = self.router.run(&goal, input).await;

        let assessment = self.validator.check(&goal, &run.findings, &request.query).await;
        let decision = decide(&assessment);
        tracing::info!(
            goal = %goal.id,
            is_clear = decision.is_clear,
            escalation = ?decision.kind,
            "clarity decided"
        );

        let layer = request.layer.unwrap_or(DisclosureLayer::Handover);

        let text = match self.renderer.draft(layer, &goal, &run).await {
            Ok(draft) => {
                let draft = match escalation_note(&goal, &run, &assessment, &decision, layer) {
                    Some(note) => format!("{}\n\n{}", draft.trim_end(), note),
                    None => draft,
                };
                self.renderer.release(&draft, layer).await
            }
            Err(e) => {
                tracing::warn!(goal = %goal.id, layer = %layer, "draft failed: {}", e);
                INABILITY_MESSAGE.to_string()
            }
        };

        state.settled = decision.is_clear;
        state.last_run = Some(run);

        TurnOutcome {
            text,
            kind: TurnKind::Rendered { goal: active, layer },
            assessment: Some(assessment),
            decision: Some(decision),
        }
    }

    async fn resolve_goals(&self, request: &TurnRequest) -> Vec<GoalId> {
        let mut proposals = Vec::new();
        if let Some(hint) = request.goal_hint.as_deref() {
            match self.catalog.resolve_hint(hint) {
                Some(id) => proposals.push(id),
                None => tracing::debug!("ignoring unresolvable goal hint '{}'", hint),
            }
        }
        if !request.query.trim().is_empty() {
            proposals.extend(resolve(self.matcher.as_ref(), &self.catalog, &request.query).await);
        }
        proposals
    }

    /// Persona-guided reply when no goal is active
    async fn converse(&self, request: &TurnRequest) -> TurnOutcome {
        if request.query.trim().is_empty() {
            return TurnOutcome::plain(IDLE_MESSAGE, TurnKind::Idle);
        }
        let goals = self
            .catalog
            .iter()
            .map(|g| g.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = OPEN_CONVERSATION.render(&[
            ("persona", SYSTEM_PERSONA),
            ("goals", goals.as_str()),
            ("input", request.query.as_str()),
        ]);
        let text = match invoke_with_timeout(self.oracle.as_ref(), &prompt, self.config.oracle.timeout_ms).await {
            Ok(reply) => self.renderer.safety().release_prose(&reply).await,
            Err(e) => {
                tracing::warn!("open conversation failed: {}", e);
                INABILITY_MESSAGE.to_string()
            }
        };
        TurnOutcome::plain(text, TurnKind::Conversation)
    }

    async fn ingest_notes(&self, notes: &str, id: &str, state: &SessionState) -> Result<usize> {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), "manual_input".to_string());
        metadata.insert("ingested_at".to_string(), utils::current_timestamp());
        if let Some(segment) = state.context.get_str("segment") {
            metadata.insert("segment".to_string(), segment);
        }
        self.evidence
            .add(vec![notes.to_string()], vec![metadata], vec![id.to_string()])
            .await
    }

    /// Load an upload unless its content matches `known`; `Ok(None)` when unchanged
    async fn ingest_file(&self, path: &Path, known: Option<String>) -> Result<Option<DataTable>> {
        let owned = path.to_path_buf();
        let loaded = tokio::task::spawn_blocking(move || -> std::result::Result<_, IngestError> {
            let checksum = DataTable::file_checksum(&owned)?;
            if known.as_deref() == Some(checksum.as_str()) {
                return Ok(None);
            }
            DataTable::from_csv_path(&owned).map(Some)
        })
        .await
        .map_err(|e| ClarityMindError::Internal {
            message: format!("ingest task failed: {}", e),
        })?;
        let Some(table) = loaded? else {
            return Ok(None);
        };

        let profile = table.profile();
        tracing::info!(
            rows = profile.row_count,
            columns = profile.columns.len(),
            numeric = profile.numeric_columns.len(),
            has_segment = profile.has_segment,
            has_time = profile.has_time_dimension,
            "dataset loaded"
        );

        let docs = table.text_documents(&self.config.evidence.text_columns);
        if !docs.is_empty() {
            let (mut texts, mut metas, mut ids) = (Vec::new(), Vec::new(), Vec::new());
            for doc in docs {
                texts.push(doc.text);
                metas.push(doc.metadata);
                ids.push(doc.id);
            }
            let stored = self.evidence.add(texts, metas, ids).await?;
            tracing::info!(stored, "free-text cells indexed as evidence");
        }
        Ok(Some(table))
    }
}

/// Fixed notice naming every missing field; no oracle involved
pub fn data_gap_notice(goal: &GoalDefinition, missing: &[String]) -> String {
    format!(
        "Data gap identified: {} can't start until these details are known: {}.\n\
         Share them with /context field=value; field=value and I'll pick it up from there.",
        goal.name,
        missing.join(", ")
    )
}

/// Note appended to the rendered draft when the clarity check asks for it
fn escalation_note(
    goal: &GoalDefinition,
    run: &GoalRun,
    assessment: &ClarityAssessment,
    decision: &EscalationDecision,
    layer: DisclosureLayer,
) -> Option<String> {
    match decision.kind {
        EscalationKind::Prioritization => {
            let mut lines =
                vec!["Several areas are still open. Which one matters most right now?".to_string()];
            for (n, id) in goal.producers.iter().enumerate() {
                let suffix = if run.findings.available(*id).is_some() {
                    ""
                } else {
                    " (no data yet)"
                };
                lines.push(format!("{}. {}{}", n + 1, id.spec().label, suffix));
            }
            lines.push("Reply with a number or a name and I'll focus there.".to_string());
            Some(lines.join("\n"))
        }
        EscalationKind::Summary if layer == DisclosureLayer::Summary => None,
        EscalationKind::Summary => Some(
            "These findings would read more clearly as a short executive brief. \
             Ask for /summary when you want it."
                .to_string(),
        ),
        EscalationKind::None if !decision.is_clear && assessment.missing_info == MissingInfo::TypeC => {
            let gaps: Vec<&str> = run
                .findings
                .unavailable()
                .iter()
                .map(|(id, _)| id.spec().label)
                .collect();
            let scope = if gaps.is_empty() {
                "parts of this question".to_string()
            } else {
                gaps.join(", ")
            };
            Some(format!(
                "Data gap identified: the current data does not cover {}. \
                 Conclusions here are limited to what the data shows.",
                scope
            ))
        }
        EscalationKind::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producers::{Findings, ProducerId, ProducerOutcome, ResultMap};

    fn run_with(findings: Findings) -> GoalRun {
        GoalRun {
            goal: GoalId::new("GOAL_5_HYPOTHESIS"),
            findings,
            trace: Vec::new(),
            started_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_data_gap_notice_names_every_field() {
        let catalog = GoalCatalog::builtin();
        let goal = catalog.get("GOAL_6_PRIORITIZATION").unwrap();
        let text = data_gap_notice(&goal, &goal.required_context);
        assert!(text.starts_with("Data gap identified: Roadmap & Prioritization"));
        for field in &goal.required_context {
            assert!(text.contains(field.as_str()));
        }
    }

    #[test]
    fn test_type_c_note_names_uncovered_steps() {
        let catalog = GoalCatalog::builtin();
        let goal = catalog.get("GOAL_5_HYPOTHESIS").unwrap();
        let mut findings = Findings::new();
        findings.insert(ProducerId::ValidateHypothesisStructure, ProducerOutcome::Available(ResultMap::new()));
        findings.insert(ProducerId::InterpretTestResults, ProducerOutcome::unavailable("no data"));
        let run = run_with(findings);

        let mut assessment = ClarityAssessment::conservative("gaps");
        assessment.missing_info = MissingInfo::TypeC;
        let note = escalation_note(&goal, &run, &assessment, &decide(&assessment), DisclosureLayer::Handover).unwrap();
        assert!(note.starts_with("Data gap identified"));
        assert!(note.contains(ProducerId::InterpretTestResults.spec().label));

        let clear = ClarityAssessment {
            question_coverage: true,
            risk_visibility: true,
            structural_understanding: true,
            diminishing_returns: true,
            missing_info: MissingInfo::TypeC,
            rationale: String::new(),
        };
        assert!(escalation_note(&goal, &run, &clear, &decide(&clear), DisclosureLayer::Handover).is_none());
    }

    #[test]
    fn test_summary_escalation_offers_the_brief() {
        let catalog = GoalCatalog::builtin();
        let goal = catalog.get("GOAL_7_SYNTHESIS").unwrap();
        let run = run_with(Findings::new());
        let mut assessment = ClarityAssessment::conservative("unstructured");
        assessment.missing_info = MissingInfo::TypeB;
        let decision = decide(&assessment);

        let note = escalation_note(&goal, &run, &assessment, &decision, DisclosureLayer::Handover).unwrap();
        assert!(note.contains("/summary"));
        assert!(escalation_note(&goal, &run, &assessment, &decision, DisclosureLayer::Summary).is_none());
    }
}
