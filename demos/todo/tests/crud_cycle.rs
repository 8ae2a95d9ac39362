//! Full CRUD cycle through a provider

#![allow(clippy::unwrap_used)] // Tests can unwrap

use crud_context_core::{CrudOp, CrudPayload, CrudRequest, FailureKind};
use crud_context_testing::{assertions, test_clock};
use std::sync::Arc;
use todo_demo::{NewTodo, TodoId, TodoItem, TodoService, TodoUpdate, todo_provider};

fn item(id: u64, title: &str, completed: bool) -> TodoItem {
    TodoItem {
        id: TodoId::new(id),
        title: title.to_string(),
        completed,
        created_at: test_clock_now(),
        completed_at: completed.then(test_clock_now),
    }
}

fn test_clock_now() -> chrono::DateTime<chrono::Utc> {
    use crud_context_core::environment::Clock;
    test_clock().now()
}

#[tokio::test]
async fn test_create_list_update_delete() {
    let service = Arc::new(TodoService::new(Arc::new(test_clock())));
    let provider = todo_provider(Arc::clone(&service));
    let actions = provider.actions();

    actions.call(&CrudOp::Post, CrudRequest::Post(NewTodo::new("Buy milk"))).await.unwrap();
    actions.call(&CrudOp::Post, CrudRequest::Post(NewTodo::new("Walk dog"))).await.unwrap();
    assertions::assert_succeeded_with(
        &provider.state(),
        &CrudOp::Post,
        &CrudPayload::Created(item(2, "Walk dog", false)),
    );

    actions.call(&CrudOp::Put, CrudRequest::Put(TodoId::new(1), TodoUpdate::complete())).await.unwrap();
    assertions::assert_succeeded_with(
        &provider.state(),
        &CrudOp::Put,
        &CrudPayload::Updated(Some(item(1, "Buy milk", true))),
    );

    actions.call(&CrudOp::Delete, CrudRequest::Delete(TodoId::new(2))).await.unwrap();
    assertions::assert_succeeded_with(&provider.state(), &CrudOp::Delete, &CrudPayload::Deleted);

    actions.call(&CrudOp::GetAll, CrudRequest::GetAll).await.unwrap();
    assertions::assert_succeeded_with(
        &provider.state(),
        &CrudOp::GetAll,
        &CrudPayload::Many(vec![item(1, "Buy milk", true)]),
    );

    assertions::assert_idle(&provider.state(), &CrudOp::Get);
    assert_eq!(service.count().await, 1);
}

#[tokio::test]
async fn test_failures_become_state() {
    let service = Arc::new(TodoService::new(Arc::new(test_clock())));
    let provider = todo_provider(service);
    let actions = provider.actions();

    actions.call(&CrudOp::Delete, CrudRequest::Delete(TodoId::new(42))).await.unwrap();
    assertions::assert_failed_with(
        &provider.state(),
        &CrudOp::Delete,
        FailureKind::Failed,
        "todo 42 not found",
    );

    actions.call(&CrudOp::Post, CrudRequest::Post(NewTodo::new(""))).await.unwrap();
    assertions::assert_failed_with(
        &provider.state(),
        &CrudOp::Post,
        FailureKind::Failed,
        "todo title cannot be empty",
    );

    actions.call(&CrudOp::Get, CrudRequest::GetAll).await.unwrap();
    assertions::assert_failed_with(
        &provider.state(),
        &CrudOp::Get,
        FailureKind::InvalidRequest,
        "GET_ALL request sent to GET",
    );
}

#[tokio::test]
async fn test_get_keeps_previous_entity_on_failure() {
    let service = Arc::new(TodoService::new(Arc::new(test_clock())));
    let provider = todo_provider(service);
    let actions = provider.actions();

    actions.call(&CrudOp::Post, CrudRequest::Post(NewTodo::new("Buy milk"))).await.unwrap();
    actions.call(&CrudOp::Get, CrudRequest::Get(TodoId::new(1))).await.unwrap();
    actions.call(&CrudOp::Get, CrudRequest::Delete(TodoId::new(1))).await.unwrap();

    let slice = provider.state().get(&CrudOp::Get).cloned().unwrap();
    assert_eq!(slice.data, Some(CrudPayload::One(Some(item(1, "Buy milk", false)))));
    assert_eq!(slice.error.map(|e| e.kind()), Some(FailureKind::InvalidRequest));
}
