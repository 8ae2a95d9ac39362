//! Domain types for the todo demo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a todo item
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TodoId(u64);

impl TodoId {
    /// Creates a `TodoId` from its numeric value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TodoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single todo item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Unique identifier
    pub id: TodoId,
    /// Title/description of the todo
    pub title: String,
    /// Whether the todo is completed
    pub completed: bool,
    /// When the todo was created
    pub created_at: DateTime<Utc>,
    /// When the todo was completed (if completed)
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating a todo
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    /// Title of the todo
    pub title: String,
}

impl NewTodo {
    /// Creates the input for a todo titled `title`
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

/// Partial update of a todo; `None` fields are left as they are
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoUpdate {
    /// New title
    pub title: Option<String>,
    /// New completion flag
    pub completed: Option<bool>,
}

impl TodoUpdate {
    /// Update that marks a todo as completed
    #[must_use]
    pub fn complete() -> Self {
        Self {
            title: None,
            completed: Some(true),
        }
    }

    /// Update that renames a todo
    #[must_use]
    pub fn rename(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            completed: None,
        }
    }
}

/// Errors from the todo service
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TodoError {
    /// No todo has this id
    #[error("todo {0} not found")]
    NotFound(TodoId),

    /// A todo needs a non-empty title
    #[error("todo title cannot be empty")]
    EmptyTitle,
}
