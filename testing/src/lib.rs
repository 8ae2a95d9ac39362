//! # Crud Context Testing
//!
//! Testing utilities and helpers for Crud Context.
//!
//! This crate provides:
//! - Mock implementations of environment traits (`FixedClock`)
//! - Scripted operations (`resolve_after`, `reject_with`, `panic_with`, `Gate`)
//! - A recording transition observer
//! - Given-When-Then reducer tests and state map assertions
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use crud_context_testing::{Gate, RecordingObserver, test_clock};
//! use crud_context_runtime::{OperationSet, Provider, ProviderConfig};
//!
//! #[tokio::test]
//! async fn test_list_flow() {
//!     let gate = Gate::new();
//!     let observer = RecordingObserver::new();
//!     let operations = OperationSet::new().with("list", gate.wrap(|()| Ok(vec![1, 2, 3])));
//!     let provider = Provider::with_config(
//!         operations,
//!         ProviderConfig::default().with_observer(observer.clone()).with_clock(test_clock()),
//!     );
//!
//!     let call = provider.actions().get(&"list").map(|list| list.spawn(()));
//!     gate.release(1);
//!     call.unwrap().await.unwrap();
//!
//!     assert_eq!(observer.kinds(), ["start", "success"]);
//! }
//! ```

use chrono::{DateTime, Utc};
use crud_context_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of environment traits and operations
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use crud_context_core::{OperationError, OperationKey, OperationState, TransitionKind};
    use crud_context_runtime::{OperationFuture, Transition, TransitionObserver};
    use futures::FutureExt;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use crud_context_testing::mocks::FixedClock;
    /// use crud_context_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// An owned copy of one observed transition
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedTransition<K, T> {
        /// Operation key
        pub op: K,
        /// Transition that was applied
        pub kind: TransitionKind,
        /// The slice after the transition
        pub slice: OperationState<T>,
        /// Clock reading at the transition
        pub at: DateTime<Utc>,
    }

    /// Observer that records every transition it sees
    ///
    /// Clones share the same log, so keep one clone for assertions and hand
    /// the other to `ProviderConfig::with_observer`.
    #[derive(Debug)]
    pub struct RecordingObserver<K, T> {
        log: Arc<Mutex<Vec<RecordedTransition<K, T>>>>,
    }

    impl<K: Clone, T: Clone> RecordingObserver<K, T> {
        /// Create an observer with an empty log
        #[must_use]
        pub fn new() -> Self {
            Self {
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Every transition recorded so far, oldest first
        #[must_use]
        pub fn transitions(&self) -> Vec<RecordedTransition<K, T>> {
            self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        /// The recorded transition kinds as strings, oldest first
        #[must_use]
        pub fn kinds(&self) -> Vec<&'static str> {
            self.log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|t| t.kind.as_str())
                .collect()
        }

        /// Forget everything recorded so far
        pub fn clear(&self) {
            self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    impl<K: Clone, T: Clone> Default for RecordingObserver<K, T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<K, T> Clone for RecordingObserver<K, T> {
        fn clone(&self) -> Self {
            Self {
                log: Arc::clone(&self.log),
            }
        }
    }

    impl<K, T> TransitionObserver<K, T> for RecordingObserver<K, T>
    where
        K: OperationKey,
        T: Clone + Send,
    {
        fn on_transition(&self, transition: &Transition<'_, K, T>) {
            let recorded = RecordedTransition {
                op: transition.op.clone(),
                kind: transition.kind,
                slice: transition.slice.clone(),
                at: transition.at,
            };
            self.log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(recorded);
        }
    }

    /// Operation that resolves with `value` after `delay`
    pub fn resolve_after<Req, T>(
        delay: Duration,
        value: T,
    ) -> impl Fn(Req) -> OperationFuture<T> + Send + Sync + 'static
    where
        Req: 'static,
        T: Clone + Send + Sync + 'static,
    {
        move |_request: Req| {
            let value = value.clone();
            async move {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            .boxed()
        }
    }

    /// Operation that fails immediately with `message`
    pub fn reject_with<Req, T>(
        message: impl Into<String>,
    ) -> impl Fn(Req) -> OperationFuture<T> + Send + Sync + 'static
    where
        Req: 'static,
        T: Send + 'static,
    {
        let error = OperationError::failed(message);
        move |_request: Req| {
            let error = error.clone();
            async move { Err(error) }.boxed()
        }
    }

    /// Operation whose future panics with `message` when polled
    pub fn panic_with<Req, T>(
        message: &'static str,
    ) -> impl Fn(Req) -> OperationFuture<T> + Send + Sync + 'static
    where
        Req: 'static,
        T: Send + 'static,
    {
        move |_request: Req| explode(message).boxed()
    }

    #[allow(clippy::panic)] // Panicking is the point of this mock
    async fn explode<T>(message: &'static str) -> Result<T, OperationError> {
        panic!("{message}")
    }

    /// Holds operations until the test lets them settle
    ///
    /// Each call of a wrapped operation waits for one permit. Permits are
    /// handed out with [`release`](Self::release); [`close`](Self::close)
    /// fails every waiting and future call.
    #[derive(Debug, Clone)]
    pub struct Gate {
        permits: Arc<Semaphore>,
    }

    impl Gate {
        /// Create a gate with no permits
        #[must_use]
        pub fn new() -> Self {
            Self {
                permits: Arc::new(Semaphore::new(0)),
            }
        }

        /// Wrap a synchronous result function as a gated operation
        pub fn wrap<Req, T, F>(&self, settle: F) -> impl Fn(Req) -> OperationFuture<T> + Send + Sync + 'static
        where
            Req: Send + 'static,
            T: Send + 'static,
            F: Fn(Req) -> Result<T, OperationError> + Send + Sync + 'static,
        {
            let permits = Arc::clone(&self.permits);
            let settle = Arc::new(settle);
            move |request: Req| {
                let permits = Arc::clone(&permits);
                let settle = Arc::clone(&settle);
                async move {
                    match permits.acquire().await {
                        Ok(permit) => permit.forget(),
                        Err(_) => return Err(OperationError::failed("gate closed")),
                    }
                    settle(request)
                }
                .boxed()
            }
        }

        /// Let `n` calls settle, in the order they started waiting
        pub fn release(&self, n: usize) {
            self.permits.add_permits(n);
        }

        /// Fail every waiting and future call with "gate closed"
        pub fn close(&self) {
            self.permits.close();
        }
    }

    impl Default for Gate {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Install a tracing subscriber that writes through the test harness
    ///
    /// Honors `RUST_LOG`, defaulting to `debug`. Safe to call from every
    /// test; only the first call installs anything.
    pub fn init_test_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use crud_context_core::{OperationError, StatusAction};
    use proptest::prelude::*;

    /// Any status action for one of `keys` (or an unknown key), carrying `i32` payloads
    pub fn status_action(
        keys: &'static [&'static str],
    ) -> impl Strategy<Value = StatusAction<&'static str, i32>> {
        let key = prop_oneof![
            4 => proptest::sample::select(keys),
            1 => Just("unknown"),
        ];

        (key, 0..3u8, any::<i32>(), "[a-z ]{1,12}").prop_map(|(op, kind, payload, message)| {
            match kind {
                0 => StatusAction::Start { op },
                1 => StatusAction::Success { op, payload },
                _ => StatusAction::Failure {
                    op,
                    error: OperationError::failed(message),
                },
            }
        })
    }
}

// Re-export commonly used items
pub use mocks::{
    FixedClock, Gate, RecordedTransition, RecordingObserver, panic_with, reject_with, resolve_after,
    test_clock,
};
