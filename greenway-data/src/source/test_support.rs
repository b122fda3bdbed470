//! Stub [`FeatureSource`] used by unit and behaviour tests.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{FeatureSource, SourceError, SourceSnapshot};

type Outcome = Result<SourceSnapshot, SourceError>;

/// Stub source replaying canned outcomes.
///
/// Outcomes are returned in order; the last one repeats once the queue is
/// down to a single entry. A gated stub waits for [`Notify::notify_one`]
/// before answering each request.
#[derive(Debug, Clone, Default)]
pub struct StubFeatureSource {
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    gate: Option<Arc<Notify>>,
    calls: Arc<AtomicUsize>,
}

impl StubFeatureSource {
    /// Stub that always returns `snapshot`.
    pub fn with_snapshot(snapshot: SourceSnapshot) -> Self {
        Self::with_outcomes([Ok(snapshot)])
    }

    /// Stub returning each snapshot in turn.
    pub fn with_snapshots<I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = SourceSnapshot>,
    {
        Self::with_outcomes(snapshots.into_iter().map(Ok))
    }

    /// Stub that always fails with `error`.
    pub fn with_error(error: SourceError) -> Self {
        Self::with_outcomes([Err(error)])
    }

    /// Stub returning each outcome in turn.
    pub fn with_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = Outcome>,
    {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Hold every request until the gate is notified.
    #[must_use]
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Number of requests answered.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Outcome {
        let mut outcomes = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let next = if outcomes.len() > 1 {
            outcomes.pop_front()
        } else {
            outcomes.front().cloned()
        };
        next.unwrap_or_else(|| Ok(SourceSnapshot::default()))
    }
}

#[async_trait]
impl FeatureSource for StubFeatureSource {
    fn location(&self) -> &str {
        "stub://features"
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, SourceError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next_outcome()
    }
}
