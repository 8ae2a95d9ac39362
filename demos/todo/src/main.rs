//! Todo demo binary
//!
//! Drives the five CRUD operations of an in-memory todo service through a
//! provider and prints the tracked state after each call.

use anyhow::Context as _;
use crud_context_core::environment::SystemClock;
use crud_context_core::{CrudOp, CrudRequest};
use crud_context_runtime::metrics::MetricsServer;
use std::sync::Arc;
use todo_demo::{NewTodo, TodoId, TodoProvider, TodoRequest, TodoService, TodoUpdate, todo_provider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_demo=debug,crud_context_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut metrics = MetricsServer::new();
    metrics.start().context("installing metrics recorder")?;

    println!("=== Todo Demo: Crud Context ===\n");

    let service = Arc::new(TodoService::new(Arc::new(SystemClock)));
    let provider = todo_provider(Arc::clone(&service));
    let accessor = provider.accessor();

    run(&provider, CrudOp::Post, CrudRequest::Post(NewTodo::new("Buy milk"))).await?;
    run(&provider, CrudOp::Post, CrudRequest::Post(NewTodo::new("Walk the dog"))).await?;
    run(&provider, CrudOp::GetAll, CrudRequest::GetAll).await?;
    run(&provider, CrudOp::Put, CrudRequest::Put(TodoId::new(1), TodoUpdate::complete())).await?;
    run(&provider, CrudOp::Delete, CrudRequest::Delete(TodoId::new(2))).await?;

    // Failures are recorded as state, not returned
    run(&provider, CrudOp::Delete, CrudRequest::Delete(TodoId::new(42))).await?;
    run(&provider, CrudOp::Post, CrudRequest::Post(NewTodo::new(" "))).await?;

    // A request sent to the wrong key fails that key with an invalid request
    run(&provider, CrudOp::Get, CrudRequest::GetAll).await?;

    println!("\n>>> Todos left in the service: {}", service.count().await);

    provider.teardown();
    match accessor.context() {
        Ok(_) => println!("\n>>> Accessor still resolves after teardown"),
        Err(e) => println!("\n>>> Accessor after teardown: {e}"),
    }

    if let Some(rendered) = metrics.render() {
        println!("\n=== Metrics ===\n{rendered}");
    }

    println!("=== Demo Complete ===");
    Ok(())
}

async fn run(provider: &TodoProvider, op: CrudOp, request: TodoRequest) -> anyhow::Result<()> {
    println!("\n>>> Calling: {op}");
    provider.actions().call(&op, request).await?;

    let state = provider.state();
    let slice = state
        .get(&op)
        .with_context(|| format!("no slice for {op}"))?;
    println!("{}", serde_json::to_string_pretty(slice)?);
    Ok(())
}
