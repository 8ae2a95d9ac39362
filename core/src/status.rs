//! The status reducer.
//!
//! Three transitions, each touching only the slice of the action's key:
//!
//! | Action | `loading` | `data` | `error` |
//! |---|---|---|---|
//! | `Start` | `true` | kept | cleared |
//! | `Success(v)` | `false` | `v` | cleared |
//! | `Failure(e)` | `false` | kept | `e` |
//!
//! Actions for keys outside the map are ignored.

use crate::action::StatusAction;
use crate::reducer::{Reducer, Reduction};
use crate::state::{OperationKey, OperationState, StateMap};
use std::marker::PhantomData;
use std::sync::Arc;

/// Reducer driving every slice of a [`StateMap`]
#[derive(Debug, Clone, Copy)]
pub struct StatusReducer<K, T> {
    _phantom: PhantomData<fn() -> (K, T)>,
}

impl<K, T> StatusReducer<K, T> {
    /// Create a new status reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<K, T> Default for StatusReducer<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: OperationKey, T: Clone> Reducer for StatusReducer<K, T> {
    type State = StateMap<K, T>;
    type Action = StatusAction<K, T>;

    fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Reduction {
        let Some(slot) = state.slices.get_mut(action.op()) else {
            return Reduction::Ignored;
        };

        match action {
            StatusAction::Start { .. } => {
                // Copy-on-write: a slice still shared with an older snapshot is
                // cloned, an exclusively owned one is updated in place.
                let slice = Arc::make_mut(slot);
                slice.loading = true;
                slice.error = None;
            },
            StatusAction::Success { payload, .. } => {
                *slot = Arc::new(OperationState {
                    loading: false,
                    data: Some(payload),
                    error: None,
                });
            },
            StatusAction::Failure { error, .. } => {
                let slice = Arc::make_mut(slot);
                slice.loading = false;
                slice.error = Some(error);
            },
        }

        Reduction::Applied
    }
}
