use criterion::*;
use vm_host::{
    AsyncCall, AsyncContext, BlockchainHook, CallType, GasBudget, InMemoryStorage, ReturnCode,
};

struct Chain;

impl BlockchainHook for Chain {
    fn has_code(&self, _address: &[u8]) -> bool { true }

    fn is_builtin_function(&self, name: &str) -> bool { name == "transfer" }

    /// Addresses starting with an odd byte live in the other shard.
    fn in_same_shard(&self, left: &[u8], right: &[u8]) -> bool {
        left.first().map(|b| b % 2) == right.first().map(|b| b % 2)
    }
}

/// A context with `n` remote calls spread over a few groups.
fn populated(n: usize) -> AsyncContext {
    let mut context = AsyncContext::new(vec![0; 32], [0; 32], vec![2; 32], None, CallType::DirectCall);
    let mut budget = GasBudget::new(u64::MAX);
    for i in 0..n {
        let call = AsyncCall::new(vec![1; 32], b"f@0102".to_vec(), vec![0; 32], 1000)
            .with_callbacks("onOk", "onErr");
        let group = format!("group{}", i % 4);
        context.register_async_call(&mut budget, &Chain, &group, call).expect("Gas is unlimited.");
    }
    context
}

fn register(c: &mut Criterion) {
    let _ = env_logger::try_init();
    let mut group = c.benchmark_group("register");
    for n in [10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| b.iter(|| populated(n)));
    }
    group.finish();
}

fn resolve(c: &mut Criterion) {
    let context = populated(100);
    let ids: Vec<_> = context.groups().iter().flat_map(|g| g.calls.iter().map(|c| c.call_id)).collect();
    c.bench_function("resolve 100 calls", |b| {
        b.iter_batched(
            || context.clone(),
            |mut context| {
                for id in ids.iter() {
                    context.resolve_by_call_id(id, ReturnCode::Ok).expect("Call is pending.");
                }
                context.close_completed_calls();
                context
            },
            BatchSize::SmallInput,
        )
    });
}

fn persist(c: &mut Criterion) {
    let context = populated(100);
    let bytes = context.to_bytes().expect("Encoding succeeds.");
    c.bench_function("encode context", |b| b.iter(|| context.to_bytes()));
    c.bench_function("decode context", |b| b.iter(|| AsyncContext::from_bytes(black_box(&bytes))));
    c.bench_function("save and load context", |b| {
        b.iter_batched(
            InMemoryStorage::default,
            |mut storage| {
                context.save(&mut storage).expect("Saving succeeds.");
                AsyncContext::load_from_storage(&storage, context.address(), context.call_id())
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, register, resolve, persist);
criterion_main!(benches);
