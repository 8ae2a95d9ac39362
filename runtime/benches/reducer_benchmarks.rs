//! Reducer and store benchmarks
//!
//! - Reducer execution across state map sizes (one slice replaced per action)
//! - Store throughput (actions/sec) with snapshot publication
//! - Full wrapped-operation cycle through a provider
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use crud_context_core::reducer::Reducer;
use crud_context_core::{OperationError, StateMap, StatusAction, StatusReducer};
use crud_context_runtime::{NoopObserver, OperationSet, Provider, ProviderConfig, Store};

fn state_with(keys: u32) -> StateMap<u32, Vec<u8>> {
    StateMap::from_keys(0..keys)
}

/// Benchmark reducer execution in isolation (no Store overhead)
fn benchmark_reducer_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    group.throughput(Throughput::Elements(1));

    let reducer = StatusReducer::<u32, Vec<u8>>::new();

    for keys in [5, 50, 500] {
        group.bench_with_input(BenchmarkId::new("start", keys), &keys, |b, &keys| {
            let mut state = state_with(keys);
            b.iter(|| {
                reducer.reduce(&mut state, black_box(StatusAction::Start { op: keys / 2 }))
            });
        });

        group.bench_with_input(BenchmarkId::new("success", keys), &keys, |b, &keys| {
            let mut state = state_with(keys);
            b.iter(|| {
                reducer.reduce(
                    &mut state,
                    black_box(StatusAction::Success {
                        op: keys / 2,
                        payload: vec![0; 1024],
                    }),
                )
            });
        });

        // apply() clones the map first, so this includes structural sharing cost
        group.bench_with_input(BenchmarkId::new("apply_failure", keys), &keys, |b, &keys| {
            let state = state_with(keys);
            b.iter(|| {
                state.apply(black_box(StatusAction::Failure {
                    op: keys / 2,
                    error: OperationError::failed("bench"),
                }))
            });
        });
    }

    group.finish();
}

/// Benchmark Store throughput (actions/sec)
fn benchmark_store_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_throughput");
    group.throughput(Throughput::Elements(1));

    group.bench_function("send_action", |b| {
        let store = Store::new(state_with(50), StatusReducer::new());

        b.iter(|| {
            let _ = store.send(black_box(StatusAction::Start { op: 25 }));
        });
    });

    group.bench_function("send_and_read_state", |b| {
        let store = Store::new(state_with(50), StatusReducer::new());

        b.iter(|| {
            let _ = store.send(black_box(StatusAction::Start { op: 25 }));
            black_box(store.state(StateMap::any_loading))
        });
    });

    group.finish();
}

/// Benchmark one full Start → Success cycle through a provider
fn benchmark_wrapped_operation(c: &mut Criterion) {
    let mut group = c.benchmark_group("wrapped_operation");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("call", |b| {
        let operations = OperationSet::<&str, u32, u32>::new()
            .with("double", |n: u32| async move { Ok::<_, OperationError>(n * 2) });
        let provider = Provider::with_config(
            operations,
            ProviderConfig::default().with_observer(NoopObserver),
        );
        let double = provider.actions().get(&"double").expect("operation is bound");

        b.to_async(&runtime).iter(|| async {
            double.call(black_box(21)).await;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reducer_execution,
    benchmark_store_throughput,
    benchmark_wrapped_operation
);
criterion_main!(benches);
