//! Per-operation status slices and the map that holds them.
//!
//! A [`StateMap`] has one [`OperationState`] slice per operation key. The key
//! set is fixed when the map is built and never changes afterwards. Slices are
//! reference counted: cloning a map is cheap, and a transition replaces only
//! the slice it targets, so every other slice stays pointer-identical between
//! the old and the new map. UI layers can use [`StateMap::slice_unchanged`] to
//! skip re-rendering untouched operations.

use crate::action::StatusAction;
use crate::error::OperationError;
use crate::reducer::Reducer;
use crate::status::StatusReducer;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// Bound satisfied by every type usable as an operation key
///
/// Enum keys are the intended use; `&'static str` also works. The `Display`
/// form names the operation in metric labels and lookup errors.
pub trait OperationKey: Clone + Ord + Debug + Display + Send + Sync + 'static {}

impl<K> OperationKey for K where K: Clone + Ord + Debug + Display + Send + Sync + 'static {}

/// Status of one operation
///
/// `data` survives a `start` (stale-while-revalidating) and a `failure`;
/// only a `success` replaces it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OperationState<T> {
    /// Whether a call is in flight
    pub loading: bool,

    /// Payload of the most recent success
    pub data: Option<T>,

    /// Failure of the most recent call, cleared on `start` and `success`
    pub error: Option<OperationError>,
}

impl<T> OperationState<T> {
    /// The initial slice: not loading, no data, no error
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            loading: false,
            data: None,
            error: None,
        }
    }

    /// Whether the slice has never left its initial value
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        !self.loading && self.data.is_none() && self.error.is_none()
    }

    /// Whether the most recent settled call failed
    #[must_use]
    pub const fn has_failed(&self) -> bool {
        !self.loading && self.error.is_some()
    }
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

/// Map from operation key to its status slice
#[derive(Debug, PartialEq)]
pub struct StateMap<K: Ord, T> {
    pub(crate) slices: BTreeMap<K, Arc<OperationState<T>>>,
}

impl<K: OperationKey, T> StateMap<K, T> {
    /// Build the all-idle map for the given keys
    ///
    /// Duplicate keys collapse into a single slice. An empty key set yields an
    /// empty map.
    #[must_use]
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        let slices = keys
            .into_iter()
            .map(|key| (key, Arc::new(OperationState::idle())))
            .collect();
        Self { slices }
    }

    /// Status of one operation, `None` if the key is not part of the map
    #[must_use]
    pub fn get(&self, op: &K) -> Option<&OperationState<T>> {
        self.slices.get(op).map(AsRef::as_ref)
    }

    /// Shared handle to one operation's slice
    #[must_use]
    pub fn slice(&self, op: &K) -> Option<&Arc<OperationState<T>>> {
        self.slices.get(op)
    }

    /// Whether `op`'s slice is the same allocation in both maps
    ///
    /// Returns `false` if either map lacks the key.
    #[must_use]
    pub fn slice_unchanged(&self, other: &Self, op: &K) -> bool {
        match (self.slices.get(op), other.slices.get(op)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether the key is part of the map
    #[must_use]
    pub fn contains_key(&self, op: &K) -> bool {
        self.slices.contains_key(op)
    }

    /// Operation keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.slices.keys()
    }

    /// Slices in key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &OperationState<T>)> {
        self.slices.iter().map(|(key, slice)| (key, slice.as_ref()))
    }

    /// Number of operations
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Whether the map has no operations
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Whether any operation is currently in flight
    #[must_use]
    pub fn any_loading(&self) -> bool {
        self.slices.values().any(|slice| slice.loading)
    }

    /// Pure form of the reducer: returns the map after `action`
    ///
    /// `self` is left untouched. Slices other than the action's target are
    /// shared with `self`.
    #[must_use]
    pub fn apply(&self, action: StatusAction<K, T>) -> Self
    where
        T: Clone,
    {
        let mut next = self.clone();
        StatusReducer::new().reduce(&mut next, action);
        next
    }
}

impl<K: Ord + Clone, T> Clone for StateMap<K, T> {
    fn clone(&self) -> Self {
        Self {
            slices: self.slices.clone(),
        }
    }
}

impl<K, T> Serialize for StateMap<K, T>
where
    K: Ord + Serialize,
    T: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slices.len()))?;
        for (key, slice) in &self.slices {
            map.serialize_entry(key, slice.as_ref())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_keys_is_all_idle() {
        let state: StateMap<&str, i32> = StateMap::from_keys(["list", "remove"]);

        assert_eq!(state.len(), 2);
        assert!(state.iter().all(|(_, slice)| slice.is_idle()));
        assert!(!state.any_loading());
    }

    #[test]
    fn test_from_keys_collapses_duplicates() {
        let state: StateMap<&str, i32> = StateMap::from_keys(["list", "list"]);
        assert_eq!(state.keys().copied().collect::<Vec<_>>(), vec!["list"]);
    }

    #[test]
    fn test_empty_key_set() {
        let state: StateMap<&str, i32> = StateMap::from_keys(Vec::new());
        assert!(state.is_empty());
        assert!(state.get(&"anything").is_none());
    }

    #[test]
    fn test_clone_shares_slices() {
        let state: StateMap<&str, i32> = StateMap::from_keys(["list"]);
        let copy = state.clone();
        assert!(state.slice_unchanged(&copy, &"list"));
        assert!(!state.slice_unchanged(&copy, &"missing"));
    }

    #[test]
    fn test_serialized_shape() {
        let state: StateMap<&str, Vec<i32>> = StateMap::from_keys(["list"]);
        let state = state.apply(StatusAction::Success {
            op: "list",
            payload: vec![1, 2, 3],
        });

        let json = serde_json::to_value(&state).unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!({
                "list": { "loading": false, "data": [1, 2, 3], "error": null }
            })
        );
    }

    #[test]
    fn test_serialized_error_shape() {
        let state: StateMap<&str, i32> = StateMap::from_keys(["remove"]);
        let state = state.apply(StatusAction::Failure {
            op: "remove",
            error: OperationError::failed("not found"),
        });

        let json = serde_json::to_value(&state).unwrap_or_default();
        assert_eq!(
            json["remove"]["error"],
            serde_json::json!({ "kind": "failed", "message": "not found" })
        );
    }
}
