//! Normalized failure values.
//!
//! Every way an operation can fail (a returned error of any type, a plain
//! string, a panic, or a request sent to the wrong operation) is folded into a
//! single [`OperationError`] before it reaches the state map. Consumers can
//! therefore render failures without inspecting the original error type.
//!
//! # Example
//!
//! ```
//! use crud_context_core::error::{FailureKind, OperationError};
//!
//! let error = OperationError::normalize("not found");
//! assert_eq!(error.kind(), FailureKind::Failed);
//! assert_eq!(error.message(), "not found");
//! ```

use serde::Serialize;
use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error accepted from operation implementations.
///
/// Anything convertible into this type can be returned from an operation:
/// typed errors, `anyhow::Error`, `String` and `&str`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Message used when a panic payload is not a string.
const OPAQUE_PANIC_MESSAGE: &str = "operation panicked";

/// How an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The operation returned an error
    Failed,

    /// The operation panicked while running
    Panicked,

    /// The operation received a request it cannot handle
    InvalidRequest,
}

impl FailureKind {
    /// Stable lowercase name, used for logs and metric labels
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Panicked => "panicked",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The uniform failure stored in an operation's `error` slot.
///
/// Equality compares [`kind`](Self::kind) and [`message`](Self::message) only;
/// the original error (if any) is kept for downcasting but never compared or
/// serialized.
#[derive(Error, Debug, Clone, Serialize)]
#[error("{message}")]
pub struct OperationError {
    kind: FailureKind,
    message: String,
    #[serde(skip)]
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl OperationError {
    /// Create a failure with the given message and no underlying error
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Failed,
            message: message.into(),
            source: None,
        }
    }

    /// Create a failure for a request the operation cannot handle
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InvalidRequest,
            message: message.into(),
            source: None,
        }
    }

    /// Normalize any error value into an `OperationError`
    ///
    /// An `OperationError` passed through this function is returned as-is,
    /// so normalizing twice never nests.
    #[must_use]
    pub fn normalize<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        let boxed: BoxError = error.into();
        match boxed.downcast::<Self>() {
            Ok(already) => *already,
            Err(other) => Self {
                kind: FailureKind::Failed,
                message: other.to_string(),
                source: Some(Arc::from(other)),
            },
        }
    }

    /// Build a failure from a caught panic payload
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| OPAQUE_PANIC_MESSAGE.to_string());

        Self {
            kind: FailureKind::Panicked,
            message,
            source: None,
        }
    }

    /// How the operation failed
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Human-readable failure message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure came from a caught panic
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self.kind, FailureKind::Panicked)
    }

    /// Borrow the original error as a concrete type, if it was one
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.source.as_deref()?.downcast_ref::<E>()
    }
}

impl PartialEq for OperationError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for OperationError {}
