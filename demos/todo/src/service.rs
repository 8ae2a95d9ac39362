//! In-memory todo service.

use crate::types::{NewTodo, TodoError, TodoId, TodoItem, TodoUpdate};
use crud_context_core::environment::Clock;
use crud_context_runtime::{CrudService, ServiceFuture};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    todos: BTreeMap<TodoId, TodoItem>,
    next_id: u64,
}

/// Todo list held in memory, stamped by an injected clock
pub struct TodoService {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl TodoService {
    /// Creates an empty service
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                todos: BTreeMap::new(),
                next_id: 1,
            }),
            clock,
        }
    }

    /// Number of stored todos
    pub async fn count(&self) -> usize {
        self.inner.lock().await.todos.len()
    }
}

impl CrudService for TodoService {
    type Entity = TodoItem;
    type Id = TodoId;
    type Create = NewTodo;
    type Update = TodoUpdate;
    type Error = TodoError;

    fn get_all(&self) -> ServiceFuture<'_, Vec<TodoItem>, TodoError> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(inner.todos.values().cloned().collect())
        })
    }

    fn get(&self, id: TodoId) -> ServiceFuture<'_, Option<TodoItem>, TodoError> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(inner.todos.get(&id).cloned())
        })
    }

    fn post(&self, input: NewTodo) -> ServiceFuture<'_, TodoItem, TodoError> {
        Box::pin(async move {
            let title = input.title.trim();
            if title.is_empty() {
                return Err(TodoError::EmptyTitle);
            }

            let mut inner = self.inner.lock().await;
            let id = TodoId::new(inner.next_id);
            inner.next_id += 1;

            let todo = TodoItem {
                id,
                title: title.to_string(),
                completed: false,
                created_at: self.clock.now(),
                completed_at: None,
            };
            inner.todos.insert(id, todo.clone());

            tracing::debug!(id = %id, "Todo created");
            Ok(todo)
        })
    }

    fn put(&self, id: TodoId, input: TodoUpdate) -> ServiceFuture<'_, Option<TodoItem>, TodoError> {
        Box::pin(async move {
            if input.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
                return Err(TodoError::EmptyTitle);
            }

            let mut inner = self.inner.lock().await;
            let Some(todo) = inner.todos.get_mut(&id) else {
                return Ok(None);
            };

            if let Some(title) = input.title {
                todo.title = title.trim().to_string();
            }
            match input.completed {
                Some(true) if !todo.completed => {
                    todo.completed = true;
                    todo.completed_at = Some(self.clock.now());
                },
                Some(false) => {
                    todo.completed = false;
                    todo.completed_at = None;
                },
                _ => {},
            }

            tracing::debug!(id = %id, "Todo updated");
            Ok(Some(todo.clone()))
        })
    }

    fn delete(&self, id: TodoId) -> ServiceFuture<'_, (), TodoError> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            if inner.todos.remove(&id).is_none() {
                return Err(TodoError::NotFound(id));
            }

            tracing::debug!(id = %id, "Todo deleted");
            Ok(())
        })
    }
}
