//! Providers, contexts and wrapped actions.
//!
//! A [`Provider`] owns the state of one operation set. Consumers get at that
//! state through explicit handles instead of an ambient registry:
//!
//! - [`Provider::context`] returns a [`Context`] (`state` snapshot plus
//!   `actions`) and cannot fail while you hold the provider.
//! - [`Accessor`] is a weak handle that can be passed down a call graph
//!   without keeping the provider alive. [`Accessor::context`] fails with
//!   [`ScopeError::ProviderGone`] once the provider has been torn down.
//!
//! Wrapped operations never return errors. Every call applies `Start` as soon
//! as it is made, awaits the underlying operation, then dispatches `Success`
//! or `Failure`; the outcome is read back from state.

use crate::error::{ContextError, ScopeError};
use crate::metrics::names;
use crate::observer::Transition;
use crate::operation::{OperationFn, OperationSet};
use crate::{Dispatch, ProviderConfig, Store};
use crud_context_core::{OperationError, OperationKey, StateMap, StatusAction, StatusReducer};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// State and operations shared by a provider and every handle it gives out
struct Shared<K: OperationKey, Req, T: Clone> {
    store: Store<StatusReducer<K, T>>,
    operations: OperationSet<K, Req, T>,
    config: ProviderConfig<K, T>,
    /// Serializes apply-then-observe so observers see transitions in applied order
    transitions: Mutex<()>,
}

impl<K, Req, T> Shared<K, Req, T>
where
    K: OperationKey,
    Req: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Apply one transition and notify the observer
    ///
    /// Transitions arriving after teardown are dropped. Observers run while
    /// transitions are serialized and must not dispatch.
    fn dispatch(&self, action: StatusAction<K, T>) {
        let op = action.op().clone();
        let kind = action.kind();

        let _serialized = self.transitions.lock().unwrap_or_else(PoisonError::into_inner);
        match self.store.send(action) {
            Ok(Dispatch::Applied(state)) => {
                if let Some(slice) = state.get(&op) {
                    self.config.observer.on_transition(&Transition {
                        op: &op,
                        kind,
                        slice,
                        at: self.config.clock.now(),
                    });
                }
            },
            Ok(Dispatch::Ignored) => {
                tracing::trace!(op = %op, transition = %kind, "Transition ignored");
            },
            Err(error) => {
                tracing::debug!(
                    op = %op,
                    transition = %kind,
                    error = %error,
                    "Provider torn down, dropping transition"
                );
            },
        }
    }

    fn context(self: &Arc<Self>) -> Context<K, Req, T> {
        Context {
            state: self.store.snapshot(),
            actions: Actions {
                shared: Arc::clone(self),
            },
        }
    }
}

/// Build a provider and an accessor bound to it
///
/// Each call yields an independent state map and action set.
#[must_use]
pub fn build<K, Req, T>(operations: OperationSet<K, Req, T>) -> (Provider<K, Req, T>, Accessor<K, Req, T>)
where
    K: OperationKey,
    Req: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    let provider = Provider::new(operations);
    let accessor = provider.accessor();
    (provider, accessor)
}

/// Owner of one operation set's state
///
/// Dropping the provider (or calling [`teardown`](Self::teardown)) ends its
/// scope: accessors stop resolving and transitions from calls still in flight
/// are ignored.
pub struct Provider<K: OperationKey, Req, T: Clone> {
    shared: Arc<Shared<K, Req, T>>,
}

impl<K, Req, T> Provider<K, Req, T>
where
    K: OperationKey,
    Req: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create a provider with the default configuration
    #[must_use]
    pub fn new(operations: OperationSet<K, Req, T>) -> Self {
        Self::with_config(operations, ProviderConfig::default())
    }

    /// Create a provider with a custom configuration
    #[must_use]
    pub fn with_config(operations: OperationSet<K, Req, T>, config: ProviderConfig<K, T>) -> Self {
        let store = Store::with_broadcast_capacity(
            operations.initial_state(),
            StatusReducer::new(),
            config.broadcast_capacity,
        );

        tracing::debug!(operations = operations.len(), "Provider created");

        Self {
            shared: Arc::new(Shared {
                store,
                operations,
                config,
                transitions: Mutex::new(()),
            }),
        }
    }

    /// Current state and the wrapped actions
    #[must_use]
    pub fn context(&self) -> Context<K, Req, T> {
        self.shared.context()
    }

    /// The wrapped actions
    #[must_use]
    pub fn actions(&self) -> Actions<K, Req, T> {
        Actions {
            shared: Arc::clone(&self.shared),
        }
    }

    /// A weak handle resolving to this provider's context
    #[must_use]
    pub fn accessor(&self) -> Accessor<K, Req, T> {
        Accessor {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> StateMap<K, T> {
        self.shared.store.snapshot()
    }

    /// Subscribe to state snapshots, for re-rendering on change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StateMap<K, T>> {
        self.shared.store.subscribe()
    }

    /// Subscribe to every applied transition
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<StatusAction<K, T>> {
        self.shared.store.subscribe_actions()
    }

    /// End this provider's scope
    pub fn teardown(self) {
        drop(self);
    }
}

impl<K: OperationKey, Req, T: Clone> Drop for Provider<K, Req, T> {
    fn drop(&mut self) {
        self.shared.store.shutdown();
        tracing::debug!("Provider torn down");
    }
}

/// Weak handle to a provider's context
pub struct Accessor<K: OperationKey, Req, T: Clone> {
    shared: Weak<Shared<K, Req, T>>,
}

impl<K, Req, T> Accessor<K, Req, T>
where
    K: OperationKey,
    Req: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Current state and the wrapped actions
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::ProviderGone`] if the provider has been torn down.
    pub fn context(&self) -> Result<Context<K, Req, T>, ScopeError> {
        let shared = self
            .shared
            .upgrade()
            .filter(|shared| !shared.store.is_shut_down())
            .ok_or(ScopeError::ProviderGone)?;

        Ok(shared.context())
    }

    /// Whether the provider is still in scope
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| !shared.store.is_shut_down())
    }
}

impl<K: OperationKey, Req, T: Clone> Clone for Accessor<K, Req, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

/// What consumers see: a state snapshot and the wrapped actions
///
/// `state` is captured when the context is created. Call
/// [`Actions::state`] or subscribe through the provider for later values.
pub struct Context<K: OperationKey, Req, T: Clone> {
    /// State at the time the context was created
    pub state: StateMap<K, T>,
    /// Wrapped operations
    pub actions: Actions<K, Req, T>,
}

impl<K: OperationKey, Req, T: Clone> Clone for Context<K, Req, T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            actions: self.actions.clone(),
        }
    }
}

/// The wrapped operations of one provider
pub struct Actions<K: OperationKey, Req, T: Clone> {
    shared: Arc<Shared<K, Req, T>>,
}

impl<K, Req, T> Actions<K, Req, T>
where
    K: OperationKey,
    Req: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Operation keys, identical to the operation set's keys
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.shared.operations.keys()
    }

    /// Whether the key has a wrapped operation
    #[must_use]
    pub fn contains(&self, op: &K) -> bool {
        self.shared.operations.contains_key(op)
    }

    /// The wrapped operation for one key
    #[must_use]
    pub fn get(&self, op: &K) -> Option<WrappedOperation<K, Req, T>> {
        let operation = self.shared.operations.get(op)?;

        Some(WrappedOperation {
            op: op.clone(),
            label: op.to_string(),
            operation: Arc::clone(operation),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Invoke the wrapped operation for `op`
    ///
    /// `Start` is applied before this returns, so the slice reads `loading`
    /// right away. The returned future resolves once the operation has
    /// settled and its terminal transition was dispatched. The operation's
    /// own outcome is never returned; read it from state.
    ///
    /// # Errors
    ///
    /// The future yields [`ContextError::UnknownOperation`] if `op` is not
    /// part of the operation set. Nothing is dispatched in that case.
    pub fn call(
        &self,
        op: &K,
        request: Req,
    ) -> impl Future<Output = Result<(), ContextError>> + Send + 'static {
        let started = self
            .get(op)
            .map(|wrapped| wrapped.call(request))
            .ok_or_else(|| ContextError::UnknownOperation(op.to_string()));

        async move {
            started?.await;
            Ok(())
        }
    }

    /// Latest state snapshot
    #[must_use]
    pub fn state(&self) -> StateMap<K, T> {
        self.shared.store.snapshot()
    }
}

impl<K: OperationKey, Req, T: Clone> Clone for Actions<K, Req, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// One operation wrapped with status dispatching
pub struct WrappedOperation<K: OperationKey, Req, T: Clone> {
    op: K,
    label: String,
    operation: OperationFn<Req, T>,
    shared: Arc<Shared<K, Req, T>>,
}

impl<K, Req, T> WrappedOperation<K, Req, T>
where
    K: OperationKey,
    Req: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// The key this operation is bound to
    #[must_use]
    pub const fn op(&self) -> &K {
        &self.op
    }

    /// Run one full `Start` → `Success | Failure` cycle
    ///
    /// `Start` is applied before this returns; the returned future invokes
    /// the operation and dispatches the terminal transition once it settles.
    /// Concurrent calls for the same key are not fenced: whichever settles
    /// last determines the final slice.
    pub fn call(&self, request: Req) -> impl Future<Output = ()> + Send + 'static + use<K, Req, T> {
        let span = tracing::debug_span!("wrapped_operation", op = %self.label);

        span.in_scope(|| {
            metrics::counter!(names::OPERATIONS_STARTED, "op" => self.label.clone()).increment(1);
            self.shared.dispatch(StatusAction::Start {
                op: self.op.clone(),
            });
        });

        let wrapped = self.clone();
        async move { wrapped.settle(request).await }.instrument(span)
    }

    /// Run [`call`](Self::call) on a new task
    ///
    /// `Start` is applied before the task is spawned. For fire-and-forget
    /// call sites; the handle only reports task panics, which cannot happen
    /// while panics are caught.
    pub fn spawn(&self, request: Req) -> JoinHandle<()> {
        tokio::spawn(self.call(request))
    }

    /// Invoke the operation and dispatch its terminal transition
    async fn settle(&self, request: Req) {
        let started = Instant::now();
        let outcome = self.invoke(request).await;
        metrics::histogram!(names::OPERATION_DURATION, "op" => self.label.clone())
            .record(started.elapsed().as_secs_f64());

        let action = match outcome {
            Ok(payload) => {
                metrics::counter!(names::OPERATIONS_SUCCEEDED, "op" => self.label.clone())
                    .increment(1);
                StatusAction::Success {
                    op: self.op.clone(),
                    payload,
                }
            },
            Err(error) => {
                metrics::counter!(
                    names::OPERATIONS_FAILED,
                    "op" => self.label.clone(),
                    "kind" => error.kind().as_str()
                )
                .increment(1);
                StatusAction::Failure {
                    op: self.op.clone(),
                    error,
                }
            },
        };

        self.shared.dispatch(action);
    }

    /// Invoke the underlying operation, folding panics into failures
    async fn invoke(&self, request: Req) -> Result<T, OperationError> {
        if !self.shared.config.catch_panics {
            return (self.operation)(request).await;
        }

        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.operation)(request))) {
            Ok(future) => future,
            Err(payload) => return Err(OperationError::from_panic(&*payload)),
        };

        AssertUnwindSafe(future)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(OperationError::from_panic(&*payload)))
    }
}

impl<K: OperationKey, Req, T: Clone> Clone for WrappedOperation<K, Req, T> {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
            label: self.label.clone(),
            operation: Arc::clone(&self.operation),
            shared: Arc::clone(&self.shared),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use crud_context_core::{FailureKind, OperationState};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    type Ops = OperationSet<&'static str, (), Vec<i32>>;

    fn provider(operations: Ops) -> Provider<&'static str, (), Vec<i32>> {
        Provider::with_config(operations, ProviderConfig::default().with_observer(NoopObserver))
    }

    #[tokio::test]
    async fn test_list_goes_through_loading_to_data() {
        let gate = Arc::new(Semaphore::new(0));
        let operations = Ops::new().with("list", {
            let gate = Arc::clone(&gate);
            move |()| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.acquire().await.map(|permit| permit.forget()).map_err(|e| e.to_string())?;
                    Ok::<_, String>(vec![1, 2, 3])
                }
            }
        });
        let provider = provider(operations);
        let mut rx = provider.subscribe();

        assert_eq!(provider.state().get(&"list"), Some(&OperationState::idle()));

        let call = provider.actions().get(&"list").map(|wrapped| wrapped.spawn(()));

        let loading = rx.wait_for(StateMap::any_loading).await.map(|s| s.clone());
        assert_eq!(
            loading.ok().and_then(|s| s.get(&"list").cloned()),
            Some(OperationState {
                loading: true,
                data: None,
                error: None,
            })
        );

        gate.add_permits(1);
        if let Some(call) = call {
            assert!(call.await.is_ok());
        }

        assert_eq!(
            provider.state().get(&"list"),
            Some(&OperationState {
                loading: false,
                data: Some(vec![1, 2, 3]),
                error: None,
            })
        );
    }

    #[tokio::test]
    async fn test_rejection_becomes_state() {
        let operations = Ops::new().with("remove", |()| async { Err::<Vec<i32>, _>("not found") });
        let provider = provider(operations);

        let result = provider.actions().call(&"remove", ()).await;

        assert!(result.is_ok());
        assert_eq!(
            provider.state().get(&"remove"),
            Some(&OperationState {
                loading: false,
                data: None,
                error: Some(OperationError::failed("not found")),
            })
        );
    }

    #[tokio::test]
    #[allow(clippy::panic)] // Intentional panic for testing error handling
    async fn test_panic_becomes_failure() {
        let operations = Ops::new().with("explode", |()| async {
            if true {
                panic!("operation exploded");
            }
            Ok::<_, String>(Vec::new())
        });
        let provider = provider(operations);

        let _ = provider.actions().call(&"explode", ()).await;

        let error = provider.state().get(&"explode").and_then(|s| s.error.clone());
        assert_eq!(error.as_ref().map(OperationError::kind), Some(FailureKind::Panicked));
        assert_eq!(error.as_ref().map(OperationError::message), Some("operation exploded"));
    }

    #[tokio::test]
    async fn test_unknown_operation_dispatches_nothing() {
        let provider = provider(Ops::new().with("list", |()| async { Ok::<_, String>(vec![]) }));
        let before = provider.state();

        let result = provider.actions().call(&"missing", ()).await;

        assert_eq!(result, Err(ContextError::UnknownOperation("missing".to_string())));
        assert_eq!(provider.state(), before);
    }

    #[tokio::test]
    async fn test_each_call_runs_operation_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let operations = Ops::new().with("list", {
            let calls = Arc::clone(&calls);
            move |()| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, String>(vec![]) }
            }
        });
        let provider = provider(operations);
        let mut rx = provider.subscribe_actions();

        let actions = provider.actions();
        let _ = actions.call(&"list", ()).await;
        let _ = actions.call(&"list", ()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let mut kinds = Vec::new();
        while let Ok(action) = rx.try_recv() {
            kinds.push(action.kind().as_str());
        }
        assert_eq!(kinds, vec!["start", "success", "start", "success"]);
    }

    #[tokio::test]
    async fn test_actions_keys_match_operation_keys() {
        let operations = Ops::new()
            .with("list", |()| async { Ok::<_, String>(vec![]) })
            .with("remove", |()| async { Ok::<_, String>(vec![]) });
        let provider = provider(operations);

        let context = provider.context();
        assert_eq!(context.actions.keys().copied().collect::<Vec<_>>(), vec!["list", "remove"]);
        assert_eq!(context.state.keys().copied().collect::<Vec<_>>(), vec!["list", "remove"]);
    }

    #[tokio::test]
    async fn test_accessor_fails_after_teardown() {
        let (provider, accessor) = build(Ops::new().with("list", |()| async { Ok::<_, String>(vec![]) }));

        assert!(accessor.is_active());
        assert!(accessor.context().is_ok());

        provider.teardown();

        assert!(!accessor.is_active());
        assert!(matches!(accessor.context(), Err(ScopeError::ProviderGone)));
    }

    #[tokio::test]
    async fn test_accessor_fails_after_teardown_even_with_live_actions() {
        let (provider, accessor) = build(Ops::new().with("list", |()| async { Ok::<_, String>(vec![]) }));
        let actions = provider.actions();

        drop(provider);

        assert!(matches!(accessor.context(), Err(ScopeError::ProviderGone)));

        // Calls after teardown still run but leave state untouched
        let _ = actions.call(&"list", ()).await;
        assert!(actions.state().get(&"list").is_some_and(OperationState::is_idle));
    }

    #[tokio::test]
    async fn test_settling_after_teardown_is_ignored() {
        let gate = Arc::new(Semaphore::new(0));
        let operations = Ops::new().with("list", {
            let gate = Arc::clone(&gate);
            move |()| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.acquire().await.map(|permit| permit.forget()).map_err(|e| e.to_string())?;
                    Ok::<_, String>(vec![9])
                }
            }
        });
        let provider = provider(operations);
        let actions = provider.actions();
        let mut rx = provider.subscribe();

        let call = actions.get(&"list").map(|wrapped| wrapped.spawn(()));
        let _ = rx.wait_for(StateMap::any_loading).await;

        provider.teardown();
        gate.add_permits(1);
        if let Some(call) = call {
            assert!(call.await.is_ok());
        }

        let slice = actions.state().get(&"list").cloned();
        assert_eq!(slice.map(|s| (s.loading, s.data)), Some((true, None)));
    }

    #[tokio::test]
    async fn test_providers_are_isolated() {
        let make = || Ops::new().with("list", |()| async { Ok::<_, String>(vec![1]) });
        let first = provider(make());
        let second = provider(make());

        let _ = first.actions().call(&"list", ()).await;

        assert!(first.state().get(&"list").is_some_and(|s| s.data.is_some()));
        assert!(second.state().get(&"list").is_some_and(OperationState::is_idle));
    }

    #[tokio::test]
    async fn test_observer_sees_each_transition() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer = {
            let seen = Arc::clone(&seen);
            move |t: &Transition<'_, &'static str, Vec<i32>>| {
                if let Ok(mut seen) = seen.lock() {
                    seen.push((t.kind.as_str(), t.slice.loading, t.slice.error.is_some()));
                }
            }
        };
        let operations = Ops::new().with("remove", |()| async { Err::<Vec<i32>, _>("not found") });
        let provider = Provider::with_config(operations, ProviderConfig::default().with_observer(observer));

        let _ = provider.actions().call(&"remove", ()).await;

        let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(seen, vec![("start", true, false), ("failure", false, true)]);
    }

    #[tokio::test]
    async fn test_start_is_applied_when_call_is_made() {
        let gate = Arc::new(Semaphore::new(0));
        let operations = Ops::new().with("list", {
            let gate = Arc::clone(&gate);
            move |()| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.acquire().await.map(|permit| permit.forget()).map_err(|e| e.to_string())?;
                    Ok::<_, String>(vec![1])
                }
            }
        });
        let provider = provider(operations);
        let actions = provider.actions();

        let spawned = actions.get(&"list").map(|wrapped| wrapped.spawn(()));
        assert!(provider.state().get(&"list").is_some_and(|s| s.loading));

        let pending = actions.call(&"list", ());
        assert!(provider.state().get(&"list").is_some_and(|s| s.loading));

        gate.add_permits(2);
        assert_eq!(pending.await, Ok(()));
        if let Some(spawned) = spawned {
            assert!(spawned.await.is_ok());
        }
        assert_eq!(provider.state().get(&"list").and_then(|s| s.data.clone()), Some(vec![1]));
    }

    #[tokio::test]
    async fn test_zero_broadcast_capacity_still_builds() {
        let provider = Provider::with_config(
            Ops::new().with("list", |()| async { Ok::<_, String>(vec![1]) }),
            ProviderConfig::default()
                .with_observer(NoopObserver)
                .with_broadcast_capacity(0),
        );
        let mut rx = provider.subscribe_actions();

        assert_eq!(provider.actions().call(&"list", ()).await, Ok(()));

        assert_eq!(rx.try_recv().ok().map(|a| a.kind().as_str()), Some("start"));
        assert!(provider.state().get(&"list").is_some_and(|s| s.data.is_some()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_observer_order_matches_broadcast_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer = {
            let seen = Arc::clone(&seen);
            move |t: &Transition<'_, u32, u32>| {
                if let Ok(mut seen) = seen.lock() {
                    seen.push((t.kind.as_str(), t.slice.data));
                }
            }
        };
        let operations = OperationSet::<u32, u32, u32>::new().with(0, |n: u32| async move {
            tokio::task::yield_now().await;
            Ok::<_, String>(n)
        });
        let provider = Provider::with_config(
            operations,
            ProviderConfig::default()
                .with_observer(observer)
                .with_broadcast_capacity(256),
        );
        let mut rx = provider.subscribe_actions();

        let wrapped = provider.actions().get(&0);
        let handles: Vec<_> = (0..32)
            .filter_map(|n| wrapped.as_ref().map(|w| w.spawn(n)))
            .collect();
        for handle in handles {
            assert!(handle.await.is_ok());
        }

        let mut broadcast = Vec::new();
        let mut data = None;
        while let Ok(action) = rx.try_recv() {
            if let StatusAction::Success { payload, .. } = &action {
                data = Some(*payload);
            }
            broadcast.push((action.kind().as_str(), data));
        }

        let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(seen.len(), 64);
        assert_eq!(seen, broadcast);
    }
}
