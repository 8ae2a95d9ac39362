//! Status actions - the three transitions an operation slice goes through.

use crate::error::OperationError;
use serde::Serialize;

/// Which of the three transitions an action performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// The operation was invoked and is in flight
    Start,
    /// The operation resolved with a payload
    Success,
    /// The operation failed
    Failure,
}

impl TransitionKind {
    /// Stable lowercase name, used for logs and metric labels
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions processed by the status reducer
///
/// Every action is scoped to exactly one operation key. `K` is the key type
/// and `T` the payload type carried by [`StatusAction::Success`].
#[derive(Debug, Clone, PartialEq)]
pub enum StatusAction<K, T> {
    /// Mark the operation as in flight and clear its previous error
    Start {
        /// Operation key
        op: K,
    },

    /// Store the resolved payload, discarding any previous error
    Success {
        /// Operation key
        op: K,
        /// Value the operation resolved with
        payload: T,
    },

    /// Store the failure, keeping any previous payload
    Failure {
        /// Operation key
        op: K,
        /// Normalized failure
        error: OperationError,
    },
}

impl<K, T> StatusAction<K, T> {
    /// The operation key this action is scoped to
    #[must_use]
    pub const fn op(&self) -> &K {
        match self {
            Self::Start { op } | Self::Success { op, .. } | Self::Failure { op, .. } => op,
        }
    }

    /// The transition this action performs
    #[must_use]
    pub const fn kind(&self) -> TransitionKind {
        match self {
            Self::Start { .. } => TransitionKind::Start,
            Self::Success { .. } => TransitionKind::Success,
            Self::Failure { .. } => TransitionKind::Failure,
        }
    }
}
