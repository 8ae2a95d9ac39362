//! Transition observers.
//!
//! An observer is told about every transition a provider applies: which
//! operation, which transition, the resulting slice and when it happened.
//! Observers are advisory. They cannot change state and their output is not
//! part of any contract; wire them to whatever logging or tracing the host
//! application uses.
//!
//! ```ignore
//! let config = ProviderConfig::default().with_observer(|t: &Transition<'_, CrudOp, Todo>| {
//!     println!("{} {} loading={}", t.op, t.kind, t.slice.loading);
//! });
//! ```

use crud_context_core::{DateTime, OperationState, TransitionKind, Utc};
use std::fmt::Debug;

/// One applied transition
#[derive(Debug)]
pub struct Transition<'a, K, T> {
    /// Operation key
    pub op: &'a K,
    /// Transition that was applied
    pub kind: TransitionKind,
    /// The operation's slice after the transition
    pub slice: &'a OperationState<T>,
    /// When the transition was applied
    pub at: DateTime<Utc>,
}

/// Hook invoked after every applied transition
pub trait TransitionObserver<K, T>: Send + Sync {
    /// Observe one transition
    fn on_transition(&self, transition: &Transition<'_, K, T>);
}

impl<K, T, F> TransitionObserver<K, T> for F
where
    F: Fn(&Transition<'_, K, T>) + Send + Sync,
{
    fn on_transition(&self, transition: &Transition<'_, K, T>) {
        self(transition);
    }
}

/// Observer that logs each transition with `tracing`
///
/// Failures are logged at `warn`, everything else at `debug`. Payload values
/// are not logged, only whether one is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl<K: Debug, T> TransitionObserver<K, T> for TracingObserver {
    fn on_transition(&self, transition: &Transition<'_, K, T>) {
        let slice = transition.slice;
        match (&transition.kind, &slice.error) {
            (TransitionKind::Failure, Some(error)) => tracing::warn!(
                op = ?transition.op,
                transition = %transition.kind,
                loading = slice.loading,
                has_data = slice.data.is_some(),
                error = %error,
                error_kind = %error.kind(),
                "Operation transition"
            ),
            _ => tracing::debug!(
                op = ?transition.op,
                transition = %transition.kind,
                loading = slice.loading,
                has_data = slice.data.is_some(),
                "Operation transition"
            ),
        }
    }
}

/// Observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<K, T> TransitionObserver<K, T> for NoopObserver {
    fn on_transition(&self, _transition: &Transition<'_, K, T>) {}
}
