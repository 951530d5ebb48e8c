use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::EvaluationContext;

/// Lifecycle state of a [`ConfidenceProvider`](crate::ConfidenceProvider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
    /// Created, `initialize` not called yet.
    Uninitialized,
    /// `initialize` is running its warm-up.
    Initializing,
    /// Serving values.
    Ready,
    /// `shutdown` is in progress.
    ShuttingDown,
    /// Shut down. Serves defaults until initialized again.
    Shutdown,
    /// Warm-up failed. Terminal.
    FailedInit,
}

#[derive(Debug, Clone)]
struct Snapshot {
    state: ProviderState,
    context: Arc<EvaluationContext>,
}

/// `ProviderStateStore` holds the lifecycle state together with the provider-wide evaluation
/// context. Writes happen only on lifecycle transitions; resolves take a snapshot.
pub(crate) struct ProviderStateStore {
    snapshot: RwLock<Snapshot>,
}

impl ProviderStateStore {
    pub(crate) fn new() -> Self {
        Self {
            snapshot: RwLock::new(Snapshot {
                state: ProviderState::Uninitialized,
                context: Arc::new(EvaluationContext::default()),
            }),
        }
    }

    pub(crate) fn state(&self) -> ProviderState {
        // The lock is poisoned only if a writer panicked while holding it. A half-finished
        // transition cannot serve resolves.
        self.snapshot
            .read()
            .map(|snapshot| snapshot.state)
            .unwrap_or(ProviderState::FailedInit)
    }

    /// Provider-wide context, if the provider is ready to serve.
    pub(crate) fn ready_context(&self) -> Option<Arc<EvaluationContext>> {
        let snapshot = self.snapshot.read().ok()?;
        (snapshot.state == ProviderState::Ready).then(|| snapshot.context.clone())
    }

    pub(crate) fn context(&self) -> Arc<EvaluationContext> {
        self.snapshot
            .read()
            .map(|snapshot| snapshot.context.clone())
            .unwrap_or_default()
    }

    /// Record a new provider-wide context and enter `state`.
    pub(crate) fn begin(&self, state: ProviderState, context: EvaluationContext) {
        // Constructing new value before requesting the lock to minimize lock span.
        let context = Arc::new(context);
        if let Ok(mut snapshot) = self.snapshot.write() {
            *snapshot = Snapshot { state, context };
        }
    }

    /// Enter `next` only if the current state is `expected`. Returns whether the transition
    /// happened.
    pub(crate) fn transition_from(&self, expected: ProviderState, next: ProviderState) -> bool {
        match self.snapshot.write() {
            Ok(mut snapshot) if snapshot.state == expected => {
                snapshot.state = next;
                true
            }
            _ => false,
        }
    }

    /// Enter `state`, returning the previous one.
    pub(crate) fn transition(&self, state: ProviderState) -> ProviderState {
        match self.snapshot.write() {
            Ok(mut snapshot) => std::mem::replace(&mut snapshot.state, state),
            Err(_) => ProviderState::FailedInit,
        }
    }
}
