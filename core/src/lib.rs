//! # Crud Context Core
//!
//! Core traits and types for tracking the status of asynchronous operations.
//!
//! Given a fixed set of named operations (typically CRUD calls: fetch-all,
//! fetch-one, create, update, delete), this crate models the
//! loading/data/error status of each one and the pure reducer that moves a
//! status through its three transitions.
//!
//! ## Core Concepts
//!
//! - **`OperationState`**: `{loading, data, error}` for one operation (a *slice*)
//! - **`StateMap`**: one slice per operation key, with a closed key set
//! - **`StatusAction`**: `Start`, `Success` or `Failure`, scoped to one key
//! - **`StatusReducer`**: pure function `(StateMap, StatusAction) → StateMap`
//! - **`OperationError`**: the single normalized failure representation
//!
//! The runtime crate wraps operations so that every call drives the reducer
//! through `Start` and then `Success` or `Failure`.
//!
//! ## Example
//!
//! ```
//! use crud_context_core::{StateMap, StatusAction};
//!
//! let state: StateMap<&str, Vec<u32>> = StateMap::from_keys(["list"]);
//!
//! let state = state.apply(StatusAction::Start { op: "list" });
//! assert!(state.any_loading());
//!
//! let state = state.apply(StatusAction::Success { op: "list", payload: vec![1, 2, 3] });
//! let slice = state.get(&"list");
//! assert_eq!(slice.and_then(|s| s.data.clone()), Some(vec![1, 2, 3]));
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Status actions
pub mod action;

/// CRUD operation keys, requests and payloads
pub mod crud;

/// Normalized operation failures
pub mod error;

/// Operation slices and the state map
pub mod state;

/// The status reducer
pub mod status;

pub use action::{StatusAction, TransitionKind};
pub use crud::{CrudOp, CrudPayload, CrudRequest};
pub use error::{BoxError, FailureKind, OperationError};
pub use state::{OperationKey, OperationState, StateMap};
pub use status::StatusReducer;

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action) → State`. They perform no
/// I/O and never suspend, so a runtime can apply them under a lock without
/// holding it across an `.await`.
pub mod reducer {
    /// Whether a reducer changed the state
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Reduction {
        /// The action was applied
        Applied,

        /// The action did not apply to this state and was dropped
        Ignored,
    }

    impl Reduction {
        /// Check if the action was applied
        #[must_use]
        pub const fn is_applied(self) -> bool {
            matches!(self, Self::Applied)
        }
    }

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for StatusReducer<K, T> {
    ///     type State = StateMap<K, T>;
    ///     type Action = StatusAction<K, T>;
    ///
    ///     fn reduce(&self, state: &mut StateMap<K, T>, action: StatusAction<K, T>) -> Reduction {
    ///         // Update exactly one slice
    ///         Reduction::Applied
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Apply an action to the state in place
        ///
        /// Must be deterministic and side-effect free. Actions that do not
        /// apply return [`Reduction::Ignored`] and leave the state untouched.
        fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Reduction;
    }
}

pub use reducer::{Reducer, Reduction};

/// Environment module - Dependency injection traits
///
/// External dependencies of the runtime are abstracted behind traits so tests
/// can substitute deterministic implementations.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
