//! Stream accumulation: turns a provider stream into one finished [`Attempt`].

use chrono::Utc;
use docforge_core::{Attempt, FinishReason, ModelTier, ProviderError, StreamReceiver, units};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a stream ended from the accumulator's point of view.
#[derive(Debug)]
pub enum Accumulation {
    /// The stream terminated (normally or not) and the attempt is sealed
    Ended(Attempt),
    /// The caller cancelled; whatever arrived so far was thrown away
    Cancelled { discarded_units: usize },
}

/// Single consumer of one provider stream.
///
/// Deltas are appended strictly in arrival order. Waiting longer than the
/// idle timeout for the next item ends the stream with a timeout error.
#[derive(Debug, Clone)]
pub struct StreamAccumulator {
    idle_timeout: Duration,
}

impl StreamAccumulator {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }

    /// Drain `stream` into an attempt numbered `number` on `tier`.
    ///
    /// Dropping the receiver on cancellation closes the provider stream.
    pub async fn consume(
        &self,
        number: u32,
        tier: &ModelTier,
        mut stream: StreamReceiver,
        cancel: &CancellationToken,
    ) -> Accumulation {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut text = String::new();
        let mut usage = None;
        let mut stream_error = None;

        let finish_reason = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(attempt = number, tier = %tier.id, "Stream cancelled, discarding partial text");
                    return Accumulation::Cancelled { discarded_units: units(&text) };
                }
                next = tokio::time::timeout(self.idle_timeout, stream.recv()) => next,
            };

            match next {
                Err(_) => {
                    warn!(
                        attempt = number,
                        tier = %tier.id,
                        idle_secs = self.idle_timeout.as_secs(),
                        "Stream idle timeout"
                    );
                    stream_error = Some(ProviderError::Timeout(format!(
                        "no data for {}s",
                        self.idle_timeout.as_secs()
                    )));
                    break FinishReason::Error;
                }
                Ok(None) => {
                    stream_error = Some(ProviderError::StreamInterrupted(
                        "stream closed before a finish signal".into(),
                    ));
                    break FinishReason::Error;
                }
                Ok(Some(Err(e))) => {
                    warn!(attempt = number, tier = %tier.id, error = %e, "Stream failed");
                    stream_error = Some(e);
                    break FinishReason::Error;
                }
                Ok(Some(Ok(chunk))) => {
                    if let Some(delta) = chunk.content {
                        text.push_str(&delta);
                    }
                    if chunk.usage.is_some() {
                        usage = chunk.usage;
                    }
                    if chunk.done {
                        break chunk.finish_reason.unwrap_or(FinishReason::NaturalStop);
                    }
                }
            }
        };
        drop(stream);

        debug!(
            attempt = number,
            tier = %tier.id,
            finish_reason = %finish_reason,
            units = units(&text),
            "Stream ended"
        );

        Accumulation::Ended(Attempt {
            number,
            tier: tier.clone(),
            accumulated_text: text,
            finish_reason,
            started_at,
            elapsed: clock.elapsed(),
            usage,
            stream_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_core::{StreamChunk, Usage};
    use tokio::sync::mpsc;

    fn tier() -> ModelTier {
        ModelTier::new("fast", "m", 100)
    }

    fn ended(acc: Accumulation) -> Attempt {
        match acc {
            Accumulation::Ended(attempt) => attempt,
            Accumulation::Cancelled { .. } => panic!("unexpected cancellation"),
        }
    }

    #[tokio::test]
    async fn concatenates_in_arrival_order() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok(StreamChunk::delta("<doc>"))).await.unwrap();
        tx.send(Ok(StreamChunk::delta("<body>ok</body>"))).await.unwrap();
        tx.send(Ok(StreamChunk::delta("</doc>"))).await.unwrap();
        let usage = Usage {
            prompt_tokens: 3,
            completion_tokens: 7,
            total_tokens: 10,
        };
        tx.send(Ok(StreamChunk::finished(FinishReason::NaturalStop, Some(usage))))
            .await
            .unwrap();

        let acc = StreamAccumulator::new(Duration::from_secs(5));
        let attempt = ended(acc.consume(1, &tier(), rx, &CancellationToken::new()).await);

        assert_eq!(attempt.accumulated_text, "<doc><body>ok</body></doc>");
        assert_eq!(attempt.finish_reason, FinishReason::NaturalStop);
        assert_eq!(attempt.usage, Some(usage));
        assert!(attempt.stream_error.is_none());
    }

    #[tokio::test]
    async fn length_limit_sets_truncation_hint() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok(StreamChunk::delta("<html><body>"))).await.unwrap();
        tx.send(Ok(StreamChunk::finished(FinishReason::LengthLimited, None)))
            .await
            .unwrap();

        let acc = StreamAccumulator::new(Duration::from_secs(5));
        let attempt = ended(acc.consume(1, &tier(), rx, &CancellationToken::new()).await);
        assert!(attempt.truncation_hint());
    }

    #[tokio::test]
    async fn failure_before_any_delta_is_empty() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Err(ProviderError::Overloaded("busy".into())))
            .await
            .unwrap();

        let acc = StreamAccumulator::new(Duration::from_secs(5));
        let attempt = ended(acc.consume(1, &tier(), rx, &CancellationToken::new()).await);
        assert!(attempt.is_empty());
        assert_eq!(attempt.finish_reason, FinishReason::Error);
        assert!(matches!(attempt.stream_error, Some(ProviderError::Overloaded(_))));
    }

    #[tokio::test]
    async fn closed_without_finish_is_interrupted() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok(StreamChunk::delta("<html>"))).await.unwrap();
        drop(tx);

        let acc = StreamAccumulator::new(Duration::from_secs(5));
        let attempt = ended(acc.consume(2, &tier(), rx, &CancellationToken::new()).await);
        assert_eq!(attempt.number, 2);
        assert_eq!(attempt.accumulated_text, "<html>");
        assert!(matches!(
            attempt.stream_error,
            Some(ProviderError::StreamInterrupted(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_stream_times_out() {
        let (tx, rx) = mpsc::channel::<Result<StreamChunk, ProviderError>>(8);
        tx.send(Ok(StreamChunk::delta("<html>"))).await.unwrap();

        let acc = StreamAccumulator::new(Duration::from_secs(30));
        let attempt = ended(acc.consume(1, &tier(), rx, &CancellationToken::new()).await);
        assert!(matches!(attempt.stream_error, Some(ProviderError::Timeout(_))));
        assert_eq!(attempt.accumulated_text, "<html>");
        drop(tx);
    }

    #[tokio::test]
    async fn cancellation_discards_and_closes_stream() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok(StreamChunk::delta("<html>partial"))).await.unwrap();

        let cancel = CancellationToken::new();
        let acc = StreamAccumulator::new(Duration::from_secs(60));
        let task = {
            let cancel = cancel.clone();
            let tier = tier();
            tokio::spawn(async move { acc.consume(1, &tier, rx, &cancel).await })
        };

        tokio::task::yield_now().await;
        cancel.cancel();
        let acc = task.await.unwrap();

        assert!(matches!(acc, Accumulation::Cancelled { .. }));
        assert!(tx.is_closed());
    }
}
