//! The escalation controller: runs one task from instruction to artifact.
//!
//! Attempts are strictly sequential. After each attempt the reply is judged
//! and the controller either returns, retries with a reinforced instruction,
//! escalates to a more capable tier, or gives up. Transient provider failures
//! are retried on the same tier with backoff and do not use up attempts.

use chrono::Utc;
use docforge_config::PipelineConfig;
use docforge_core::{
    Attempt, AttemptSummary, Completeness, Directive, EventBus, GenerationError,
    GenerationErrorKind, GenerationResult, GenerationTask, ModelTier, NoopSink, PipelineEvent,
    ProviderClient, ProviderError, ProviderRequest, TelemetrySink, UsageRecord, ValidationOutcome,
    units,
};
use docforge_telemetry::{AttemptCost, CostEstimator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accumulator::{Accumulation, StreamAccumulator};
use crate::assess::{AssessContext, Assessor};
use crate::directives::RequestBuilder;
use crate::merge::{MergeStrategy, strategy_for};
use crate::retry::Backoff;
use crate::tier_selector::{TierSelector, TierStep};

const NON_ARTIFACT_MESSAGE: &str =
    "The assistant answered with a message instead of a document. Try rephrasing the request.";
const TRUNCATED_MESSAGE: &str = "The document is too large to produce in one response. \
     Try splitting the request into smaller changes.";
const UNAVAILABLE_MESSAGE: &str =
    "The generation service is temporarily unavailable. Please try again shortly.";

/// Running totals for one task.
#[derive(Default)]
struct Ledger {
    attempts_made: u32,
    total_cost: f64,
    summaries: Vec<AttemptSummary>,
    history: Vec<TierStep>,
    last_outcome: Option<ValidationOutcome>,
}

/// Orchestrates attempts across tiers for one task at a time.
///
/// One controller can serve many tasks concurrently; all per-task state
/// lives on the stack of [`generate`](Self::generate).
pub struct EscalationController {
    provider: Arc<dyn ProviderClient>,
    selector: TierSelector,
    assessor: Assessor,
    requests: RequestBuilder,
    accumulator: StreamAccumulator,
    backoff: Backoff,
    merge: Box<dyn MergeStrategy>,
    sink: Arc<dyn TelemetrySink>,
    events: Option<Arc<EventBus>>,
    max_attempts: u32,
    reinforce: bool,
}

impl EscalationController {
    pub fn new(provider: Arc<dyn ProviderClient>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            selector: TierSelector::new(config.ladder(), config.escalation.preescalate_prior_units),
            assessor: Assessor::from_config(config),
            requests: RequestBuilder::new(config.directives.clone(), config.merge),
            accumulator: StreamAccumulator::new(config.stream.idle_timeout()),
            backoff: Backoff::from_config(&config.retry),
            merge: strategy_for(config.merge),
            sink: Arc::new(NoopSink),
            events: None,
            max_attempts: config.escalation.max_attempts.max(1),
            reinforce: config.escalation.reinforce_on_retry,
        }
    }

    /// Send per-attempt usage records to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Publish controller transitions on `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Replace the merge strategy picked from configuration.
    pub fn with_merge_strategy(mut self, merge: Box<dyn MergeStrategy>) -> Self {
        self.merge = merge;
        self
    }

    pub fn assessor(&self) -> &Assessor {
        &self.assessor
    }

    /// Run a task to completion.
    pub async fn generate(
        &self,
        task: &GenerationTask,
    ) -> Result<GenerationResult, GenerationError> {
        self.generate_with_cancel(task, &CancellationToken::new())
            .await
    }

    /// Run a task until it finishes or `cancel` fires.
    ///
    /// On cancellation the open stream is closed, partial text is dropped and
    /// the error kind is `Cancelled`.
    pub async fn generate_with_cancel(
        &self,
        task: &GenerationTask,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError> {
        info!(
            task_id = %task.id,
            mode = ?task.mode,
            prior_units = task.prior_units(),
            max_attempts = self.max_attempts,
            "Starting generation"
        );

        let result = self.run(task, cancel).await;
        match &result {
            Ok(done) => {
                info!(
                    task_id = %task.id,
                    tier = %done.tier_used,
                    attempts = done.attempts_made,
                    completeness = %done.completeness,
                    cost_usd = done.total_cost_estimate,
                    "Generation succeeded"
                );
                self.emit(PipelineEvent::Succeeded {
                    task_id: task.id.to_string(),
                    tier: done.tier_used.clone(),
                    attempts: done.attempts_made,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                if e.is_cancelled() {
                    info!(task_id = %task.id, attempts = e.attempts_made, "Generation cancelled");
                } else {
                    warn!(
                        task_id = %task.id,
                        kind = %e.kind,
                        attempts = e.attempts_made,
                        "Generation failed"
                    );
                }
                self.emit(PipelineEvent::Failed {
                    task_id: task.id.to_string(),
                    kind: e.kind.to_string(),
                    message: e.message.clone(),
                    timestamp: Utc::now(),
                });
            }
        }
        result
    }

    async fn run(
        &self,
        task: &GenerationTask,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError> {
        let mut ledger = Ledger::default();
        let mut directives: Vec<Directive> = Vec::new();
        let mut reinforced_once = false;

        loop {
            if cancel.is_cancelled() {
                return Err(GenerationError::cancelled(ledger.attempts_made));
            }

            let rank = self.selector.select(task, &ledger.history);
            let tier = self.selector.tier(rank).ok_or_else(|| {
                GenerationError::new(
                    GenerationErrorKind::ProviderUnavailable,
                    "No model tier is configured.",
                )
            })?;

            if let Some(previous) = ledger.history.last().filter(|p| rank > p.rank) {
                let from = self
                    .selector
                    .tier(previous.rank)
                    .map(|t| t.id.clone())
                    .unwrap_or_default();
                info!(task_id = %task.id, from_tier = %from, to_tier = %tier.id, "Escalating tier");
                self.emit(PipelineEvent::Escalated {
                    task_id: task.id.to_string(),
                    from_tier: from,
                    to_tier: tier.id.clone(),
                    timestamp: Utc::now(),
                });
            }

            ledger.attempts_made += 1;
            let number = ledger.attempts_made;
            let request = self.requests.build(task, tier, &directives);
            debug!(
                task_id = %task.id,
                attempt = number,
                tier = %tier.id,
                directives = request.directives.len(),
                "Submitting attempt"
            );
            self.emit(PipelineEvent::AttemptStarted {
                task_id: task.id.to_string(),
                attempt: number,
                tier: tier.id.clone(),
                timestamp: Utc::now(),
            });

            let (attempt, cost) = match self
                .attempt(task, number, tier, request, cancel, &mut ledger)
                .await
            {
                Ok(done) => done,
                Err(e) => {
                    return Err(e
                        .with_attempts(ledger.attempts_made)
                        .with_outcome(ledger.last_outcome.take()));
                }
            };

            let outcome = self.assessor.assess(
                &attempt.accumulated_text,
                AssessContext {
                    mode: task.mode,
                    prior_artifact: task.prior_artifact.as_deref(),
                    finish_reason: attempt.finish_reason,
                },
                self.merge.as_ref(),
            );

            info!(
                task_id = %task.id,
                attempt = number,
                tier = %tier.id,
                finish_reason = %attempt.finish_reason,
                classification = %outcome.classification,
                completeness = %outcome.completeness,
                units = units(&attempt.accumulated_text),
                "Attempt judged"
            );
            self.emit(PipelineEvent::AttemptFinished {
                task_id: task.id.to_string(),
                attempt: number,
                tier: tier.id.clone(),
                finish_reason: attempt.finish_reason,
                classification: outcome.classification,
                completeness: outcome.completeness,
                timestamp: Utc::now(),
            });
            ledger.summaries.push(AttemptSummary {
                number,
                tier: tier.id.clone(),
                finish_reason: attempt.finish_reason,
                classification: outcome.classification,
                completeness: outcome.completeness,
                output_units: units(&attempt.accumulated_text),
                input_tokens: cost.input_tokens,
                output_tokens: cost.output_tokens,
                estimated_cost: cost.cost_usd,
                elapsed_ms: attempt.elapsed.as_millis() as u64,
            });
            ledger.history.push(TierStep {
                rank,
                completeness: outcome.completeness,
            });

            if outcome.completeness.is_acceptable() {
                return Ok(self.succeed(tier, outcome, ledger));
            }

            let exhausted = ledger.attempts_made >= self.max_attempts;
            let next = match outcome.completeness {
                Completeness::Truncated if !exhausted && self.selector.can_escalate(rank) => {
                    Some(Directive::CompleteArtifact)
                }
                Completeness::TooShort if !exhausted && !reinforced_once => {
                    reinforced_once = true;
                    Some(Directive::ArtifactOnly)
                }
                _ => None,
            };

            let Some(directive) = next else {
                let mut outcome = outcome;
                let can_escalate = self.selector.can_escalate(rank);
                let kind = match outcome.completeness {
                    Completeness::Truncated => {
                        outcome.issues.push(if can_escalate {
                            format!("attempt cap reached on tier {} before escalating", tier.id)
                        } else {
                            format!("no tier above {} to escalate to", tier.id)
                        });
                        GenerationErrorKind::TruncatedAfterEscalation
                    }
                    _ => GenerationErrorKind::NonArtifactResponse,
                };
                let message = match kind {
                    GenerationErrorKind::TruncatedAfterEscalation => TRUNCATED_MESSAGE,
                    _ => NON_ARTIFACT_MESSAGE,
                };
                debug!(
                    task_id = %task.id,
                    tier = %tier.id,
                    can_escalate,
                    exhausted,
                    issues = ?outcome.issues,
                    "Giving up"
                );
                return Err(GenerationError::new(kind, message)
                    .with_attempts(ledger.attempts_made)
                    .with_outcome(Some(outcome)));
            };

            directives.clear();
            if self.reinforce {
                directives.push(directive);
            }
            ledger.last_outcome = Some(outcome);
        }
    }

    /// Make one attempt on `tier`, retrying transient failures with backoff.
    async fn attempt(
        &self,
        task: &GenerationTask,
        number: u32,
        tier: &ModelTier,
        request: ProviderRequest,
        cancel: &CancellationToken,
        ledger: &mut Ledger,
    ) -> Result<(Attempt, AttemptCost), GenerationError> {
        let request_chars = request.payload_chars();
        let mut retry = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(GenerationError::cancelled(ledger.attempts_made));
            }

            let submitted = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(GenerationError::cancelled(ledger.attempts_made));
                }
                submitted = self.provider.submit(tier, request.clone()) => submitted,
            };

            let failure = match submitted {
                Ok(stream) => match self.accumulator.consume(number, tier, stream, cancel).await {
                    Accumulation::Cancelled { discarded_units } => {
                        debug!(task_id = %task.id, discarded_units, "Partial output discarded");
                        return Err(GenerationError::cancelled(ledger.attempts_made));
                    }
                    Accumulation::Ended(attempt) => {
                        let cost = self.charge(task, &attempt, request_chars, ledger);
                        match &attempt.stream_error {
                            // Rate limits end the task and transport failures retry
                            // the tier, however much text came before them
                            Some(e @ ProviderError::RateLimited { .. }) => e.clone(),
                            Some(e) if e.is_transient() => {
                                debug!(
                                    task_id = %task.id,
                                    discarded_units = units(&attempt.accumulated_text),
                                    "Partial output dropped after transport failure"
                                );
                                e.clone()
                            }
                            // Nothing arrived, so there is nothing to judge
                            Some(e) if attempt.is_empty() => e.clone(),
                            _ => return Ok((attempt, cost)),
                        }
                    }
                },
                Err(e) => e,
            };

            if let ProviderError::RateLimited { retry_after_secs } = failure {
                warn!(task_id = %task.id, tier = %tier.id, ?retry_after_secs, "Rate limited");
                return Err(GenerationError::rate_limited(
                    retry_after_secs,
                    ledger.attempts_made,
                ));
            }
            if !failure.is_transient() {
                warn!(task_id = %task.id, tier = %tier.id, error = %failure, "Provider error");
                return Err(GenerationError::new(
                    GenerationErrorKind::ProviderUnavailable,
                    UNAVAILABLE_MESSAGE,
                ));
            }

            retry += 1;
            let Some(delay) = self.backoff.delay(retry) else {
                warn!(
                    task_id = %task.id,
                    tier = %tier.id,
                    retries = retry - 1,
                    error = %failure,
                    "Transient failures exhausted retry budget"
                );
                return Err(GenerationError::new(
                    GenerationErrorKind::ProviderUnavailable,
                    UNAVAILABLE_MESSAGE,
                ));
            };

            warn!(
                task_id = %task.id,
                tier = %tier.id,
                retry,
                max_retries = self.backoff.max_retries(),
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Transient error, retrying"
            );
            self.emit(PipelineEvent::TransientRetry {
                task_id: task.id.to_string(),
                tier: tier.id.clone(),
                retry,
                delay_ms: delay.as_millis() as u64,
                error_message: failure.to_string(),
                timestamp: Utc::now(),
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(GenerationError::cancelled(ledger.attempts_made));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Estimate the cost of a finished stream and hand it to the sink.
    fn charge(
        &self,
        task: &GenerationTask,
        attempt: &Attempt,
        request_chars: usize,
        ledger: &mut Ledger,
    ) -> AttemptCost {
        let cost = CostEstimator::attempt(
            &attempt.tier,
            request_chars,
            &attempt.accumulated_text,
            attempt.usage,
        );
        ledger.total_cost += cost.cost_usd;

        self.sink.record(UsageRecord {
            task_id: task.id.to_string(),
            tier: attempt.tier.id.clone(),
            attempt: attempt.number,
            input_tokens: cost.input_tokens,
            output_tokens: cost.output_tokens,
            estimated_cost: cost.cost_usd,
            recorded_at: Utc::now(),
        });
        cost
    }

    fn succeed(
        &self,
        tier: &ModelTier,
        outcome: ValidationOutcome,
        ledger: Ledger,
    ) -> GenerationResult {
        let ValidationOutcome {
            completeness,
            extracted_artifact,
            issues,
            ..
        } = outcome;

        GenerationResult {
            artifact: extracted_artifact.unwrap_or_default(),
            tier_used: tier.id.clone(),
            attempts_made: ledger.attempts_made,
            total_cost_estimate: ledger.total_cost,
            completeness,
            warnings: issues,
            attempts: ledger.summaries,
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_core::{FinishReason, StreamChunk, StreamReceiver};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Answers each submit with the next canned reply.
    struct Canned {
        replies: Mutex<Vec<Result<Vec<StreamChunk>, ProviderError>>>,
        tiers: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(mut replies: Vec<Result<Vec<StreamChunk>, ProviderError>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                tiers: Mutex::new(Vec::new()),
            })
        }

        fn tiers(&self) -> Vec<String> {
            self.tiers.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ProviderClient for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn submit(
            &self,
            tier: &ModelTier,
            _request: ProviderRequest,
        ) -> Result<StreamReceiver, ProviderError> {
            self.tiers.lock().unwrap().push(tier.id.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .expect("no canned reply left")?;
            let (tx, rx) = mpsc::channel(reply.len().max(1));
            for chunk in reply {
                tx.try_send(Ok(chunk)).unwrap();
            }
            Ok(rx)
        }
    }

    fn reply(text: &str, reason: FinishReason) -> Result<Vec<StreamChunk>, ProviderError> {
        Ok(vec![
            StreamChunk::delta(text),
            StreamChunk::finished(reason, None),
        ])
    }

    fn page(fill: usize) -> String {
        format!("<html><body>{}</body></html>", "x".repeat(fill))
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        config
    }

    #[tokio::test]
    async fn first_complete_reply_wins() {
        let provider = Canned::new(vec![reply(&page(200), FinishReason::NaturalStop)]);
        let controller = EscalationController::new(provider.clone(), &config());

        let result = controller
            .generate(&GenerationTask::generate("page"))
            .await
            .unwrap();
        assert_eq!(result.attempts_made, 1);
        assert_eq!(result.tier_used, "fast");
        assert_eq!(result.completeness, Completeness::Complete);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(
            result.attempts[0].classification,
            docforge_core::Classification::Artifact
        );
        assert!(result.total_cost_estimate > 0.0);
        assert_eq!(provider.tiers(), vec!["fast"]);
    }

    #[tokio::test]
    async fn truncation_escalates_then_succeeds() {
        let provider = Canned::new(vec![
            reply(
                &format!("<html><body>{}", "x".repeat(200)),
                FinishReason::LengthLimited,
            ),
            reply(&page(300), FinishReason::NaturalStop),
        ]);
        let bus = Arc::new(EventBus::new(32));
        let mut events = bus.subscribe();
        let controller =
            EscalationController::new(provider.clone(), &config()).with_event_bus(bus);

        let result = controller
            .generate(&GenerationTask::generate("page"))
            .await
            .unwrap();
        assert_eq!(result.tier_used, "capable");
        assert_eq!(result.attempts_made, 2);
        assert_eq!(provider.tiers(), vec!["fast", "capable"]);

        let mut escalated = false;
        while let Ok(event) = events.try_recv() {
            if matches!(*event, PipelineEvent::Escalated { .. }) {
                escalated = true;
            }
        }
        assert!(escalated);
    }

    #[tokio::test]
    async fn conversational_twice_is_non_artifact() {
        let provider = Canned::new(vec![
            reply("Could you clarify what you want?", FinishReason::NaturalStop),
            reply("I'm sorry, could you clarify?", FinishReason::NaturalStop),
        ]);
        let controller = EscalationController::new(provider.clone(), &config());

        let err = controller
            .generate(&GenerationTask::generate("page"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::NonArtifactResponse);
        assert_eq!(err.attempts_made, 2);
        assert!(err.last_outcome.is_some());
        assert_eq!(provider.tiers(), vec!["fast", "fast"]);
    }

    #[tokio::test]
    async fn non_transient_error_is_unavailable() {
        let provider = Canned::new(vec![Err(ProviderError::ApiError {
            status_code: 400,
            message: "bad request".into(),
        })]);
        let controller = EscalationController::new(provider, &config());

        let err = controller
            .generate(&GenerationTask::generate("page"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::ProviderUnavailable);
        assert_eq!(err.attempts_made, 1);
    }

    #[tokio::test]
    async fn transient_errors_retry_on_same_tier() {
        let provider = Canned::new(vec![
            Err(ProviderError::Overloaded("busy".into())),
            Err(ProviderError::Network("reset".into())),
            reply(&page(200), FinishReason::NaturalStop),
        ]);
        let controller = EscalationController::new(provider.clone(), &config());

        let result = controller
            .generate(&GenerationTask::generate("page"))
            .await
            .unwrap();
        assert_eq!(result.attempts_made, 1);
        assert_eq!(provider.tiers(), vec!["fast", "fast", "fast"]);
    }

    #[tokio::test]
    async fn pre_cancelled_task_never_submits() {
        let provider = Canned::new(vec![]);
        let controller = EscalationController::new(provider.clone(), &config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = controller
            .generate_with_cancel(&GenerationTask::generate("page"), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(provider.tiers().is_empty());
    }
}
