//! Todo demo: an in-memory CRUD service whose calls are tracked by a provider.
//!
//! [`TodoService`] implements `CrudService`, so `crud_operations` binds its five
//! operations (`GET_ALL`, `GET`, `POST`, `PUT`, `DELETE`) and a provider tracks
//! the loading/data/error status of each.
//!
//! # Quick Start
//!
//! ```no_run
//! use crud_context_core::environment::SystemClock;
//! use crud_context_core::{CrudOp, CrudRequest};
//! use std::sync::Arc;
//! use todo_demo::{NewTodo, TodoService, todo_provider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = todo_provider(Arc::new(TodoService::new(Arc::new(SystemClock))));
//! let actions = provider.actions();
//!
//! actions.call(&CrudOp::Post, CrudRequest::Post(NewTodo::new("Buy milk"))).await?;
//! actions.call(&CrudOp::GetAll, CrudRequest::GetAll).await?;
//!
//! let state = provider.state();
//! println!("{}", serde_json::to_string_pretty(&state)?);
//! # Ok(())
//! # }
//! ```

pub mod service;
pub mod types;

use crud_context_core::{CrudOp, CrudPayload, CrudRequest};
use crud_context_runtime::{Provider, crud_operations};
use std::sync::Arc;

// Re-export commonly used types
pub use service::TodoService;
pub use types::{NewTodo, TodoError, TodoId, TodoItem, TodoUpdate};

/// Request type of the todo operations
pub type TodoRequest = CrudRequest<TodoId, NewTodo, TodoUpdate>;

/// Payload type of the todo operations
pub type TodoPayload = CrudPayload<TodoItem>;

/// Provider tracking the five todo operations
pub type TodoProvider = Provider<CrudOp, TodoRequest, TodoPayload>;

/// Build a provider over `service` with the default configuration
#[must_use]
pub fn todo_provider(service: Arc<TodoService>) -> TodoProvider {
    Provider::new(crud_operations(service))
}
