//! Scripted provider: plays back pre-arranged streams in call order.
//!
//! Each `submit` pops the next script (tier-specific scripts first, then the
//! shared queue) and feeds it through a channel from a spawned task, so the
//! consumer sees real asynchronous streaming, including pauses, mid-stream
//! failures, and streams that never end.

use async_trait::async_trait;
use docforge_core::{
    FinishReason, ModelTier, ProviderClient, ProviderError, ProviderRequest, StreamChunk,
    StreamReceiver, Usage,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// One step of a scripted stream.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit a text delta
    Delta(String),
    /// Wait before the next step
    Pause(Duration),
    /// Emit the terminal chunk
    Finish(FinishReason, Option<Usage>),
    /// Break the stream with an error
    Fail(ProviderError),
    /// Never send anything again, until the consumer hangs up
    Hang,
}

/// What one `submit` call does.
#[derive(Debug, Clone)]
pub enum Script {
    /// `submit` itself fails
    Reject(ProviderError),
    /// `submit` succeeds and the steps play through the channel
    Stream(Vec<ScriptStep>),
}

impl Script {
    /// Stream the given deltas in order, then stop naturally.
    pub fn deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::deltas_then(deltas, FinishReason::NaturalStop)
    }

    /// Stream the given deltas in order, then finish with `reason`.
    pub fn deltas_then<I, S>(deltas: I, reason: FinishReason) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut steps: Vec<ScriptStep> = deltas
            .into_iter()
            .map(|d| ScriptStep::Delta(d.into()))
            .collect();
        steps.push(ScriptStep::Finish(reason, None));
        Self::Stream(steps)
    }

    /// Stream a whole text as one delta, then stop naturally.
    pub fn text(text: impl Into<String>) -> Self {
        Self::deltas([text.into()])
    }
}

/// A submitted request as the provider saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub tier: String,
    pub request: ProviderRequest,
}

#[derive(Default)]
struct ScriptQueues {
    shared: VecDeque<Script>,
    by_tier: HashMap<String, VecDeque<Script>>,
}

/// A provider that answers from scripts.
#[derive(Default)]
pub struct ScriptedProvider {
    name: String,
    queues: Mutex<ScriptQueues>,
    calls: Mutex<Vec<RecordedCall>>,
    closed_early: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedProvider {
    /// Create a provider whose shared queue holds `scripts`, answered in order.
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            name: "scripted".into(),
            queues: Mutex::new(ScriptQueues {
                shared: scripts.into(),
                by_tier: HashMap::new(),
            }),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Queue a script answered only for requests on `tier`.
    pub fn with_tier_script(self, tier: impl Into<String>, script: Script) -> Self {
        self.push_tier_script(tier, script);
        self
    }

    pub fn push_tier_script(&self, tier: impl Into<String>, script: Script) {
        lock(&self.queues)
            .by_tier
            .entry(tier.into())
            .or_default()
            .push_back(script);
    }

    pub fn push_script(&self, script: Script) {
        lock(&self.queues).shared.push_back(script);
    }

    /// Every request submitted so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Streams whose consumer hung up before the script finished.
    pub fn closed_early(&self) -> usize {
        self.closed_early.load(Ordering::SeqCst)
    }

    fn next_script(&self, tier: &str) -> Option<Script> {
        let mut queues = lock(&self.queues);
        if let Some(script) = queues.by_tier.get_mut(tier).and_then(VecDeque::pop_front) {
            return Some(script);
        }
        queues.shared.pop_front()
    }
}

/// Feed `steps` into `tx`, counting streams the consumer abandoned.
pub(crate) async fn play(
    steps: Vec<ScriptStep>,
    tx: mpsc::Sender<Result<StreamChunk, ProviderError>>,
    closed_early: Arc<AtomicUsize>,
) {
    for step in steps {
        let sent = match step {
            ScriptStep::Delta(text) => tx.send(Ok(StreamChunk::delta(text))).await,
            ScriptStep::Finish(reason, usage) => {
                let _ = tx.send(Ok(StreamChunk::finished(reason, usage))).await;
                return;
            }
            ScriptStep::Fail(error) => {
                let _ = tx.send(Err(error)).await;
                return;
            }
            ScriptStep::Pause(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(()),
                    _ = tx.closed() => {
                        closed_early.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                }
            }
            ScriptStep::Hang => {
                tx.closed().await;
                closed_early.fetch_add(1, Ordering::SeqCst);
                return;
            }
        };
        if sent.is_err() {
            closed_early.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(
        &self,
        tier: &ModelTier,
        request: ProviderRequest,
    ) -> Result<StreamReceiver, ProviderError> {
        lock(&self.calls).push(RecordedCall {
            tier: tier.id.clone(),
            request,
        });

        let script = self.next_script(&tier.id).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "provider '{}' has no script left for tier '{}'",
                self.name, tier.id
            ))
        })?;

        match script {
            Script::Reject(error) => Err(error),
            Script::Stream(steps) => {
                let (tx, rx) = mpsc::channel(16);
                tokio::spawn(play(steps, tx, Arc::clone(&self.closed_early)));
                Ok(rx)
            }
        }
    }
}
