//! Operation sets.
//!
//! An [`OperationSet`] maps operation keys to asynchronous functions. All
//! operations in one set take the same request type `Req` and resolve to the
//! same payload type `T`; use `()` for operations without arguments and enums
//! for heterogeneous ones. Errors returned by an operation are normalized into
//! [`OperationError`] when it is inserted, so the rest of the runtime only ever
//! sees one failure type.

use crud_context_core::{BoxError, OperationError, OperationKey, StateMap};
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a stored operation
pub type OperationFuture<T> = BoxFuture<'static, Result<T, OperationError>>;

/// A stored, type-erased operation
pub(crate) type OperationFn<Req, T> = Arc<dyn Fn(Req) -> OperationFuture<T> + Send + Sync>;

/// Named asynchronous operations
///
/// # Example
///
/// ```ignore
/// let operations = OperationSet::new()
///     .with("list", |()| async { Ok::<_, String>(vec![1, 2, 3]) })
///     .with("remove", |()| async { Err::<Vec<i32>, _>("not found") });
///
/// let state = operations.initial_state();
/// assert_eq!(state.len(), 2);
/// ```
pub struct OperationSet<K, Req, T> {
    operations: BTreeMap<K, OperationFn<Req, T>>,
}

impl<K, Req, T> OperationSet<K, Req, T>
where
    K: OperationKey,
    Req: Send + 'static,
    T: Send + 'static,
{
    /// Create an empty operation set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            operations: BTreeMap::new(),
        }
    }

    /// Add an operation, replacing any previous one with the same key
    #[must_use]
    pub fn with<F, Fut, E>(mut self, op: K, operation: F) -> Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.insert(op, operation);
        self
    }

    /// Add an operation in place, replacing any previous one with the same key
    pub fn insert<F, Fut, E>(&mut self, op: K, operation: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let erased: OperationFn<Req, T> = Arc::new(move |request: Req| {
            operation(request)
                .map(|result| result.map_err(OperationError::normalize))
                .boxed()
        });
        self.operations.insert(op, erased);
    }

    /// The all-idle state map for this set's keys
    #[must_use]
    pub fn initial_state(&self) -> StateMap<K, T> {
        StateMap::from_keys(self.operations.keys().cloned())
    }

    /// Operation keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.operations.keys()
    }

    /// Whether the key is part of the set
    #[must_use]
    pub fn contains_key(&self, op: &K) -> bool {
        self.operations.contains_key(op)
    }

    /// Number of operations
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the set has no operations
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub(crate) fn get(&self, op: &K) -> Option<&OperationFn<Req, T>> {
        self.operations.get(op)
    }
}

impl<K, Req, T> Default for OperationSet<K, Req, T>
where
    K: OperationKey,
    Req: Send + 'static,
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, Req, T> From<&OperationSet<K, Req, T>> for StateMap<K, T>
where
    K: OperationKey,
    Req: Send + 'static,
    T: Send + 'static,
{
    fn from(operations: &OperationSet<K, Req, T>) -> Self {
        operations.initial_state()
    }
}

impl<K: Clone + Ord, Req, T> Clone for OperationSet<K, Req, T> {
    fn clone(&self) -> Self {
        Self {
            operations: self.operations.clone(),
        }
    }
}

impl<K: std::fmt::Debug, Req, T> std::fmt::Debug for OperationSet<K, Req, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSet")
            .field("keys", &self.operations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
