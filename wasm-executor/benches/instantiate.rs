use criterion::*;
use wasm_executor::{
    opcodes::OpcodeCosts, pool::WarmInstancePool, CompilationOptions, Executor, HookResult,
    HostContext, HostFunctions, Instance, VmConfiguration, WasmerExecutor, WasmerInstance,
};

/// A module with some state to reset and a host call on the hot path.
const MODULE: &str = r#"
(module
  (import "env" "charge" (func $charge (param i64)))
  (memory (export "memory") 2)
  (global $counter (mut i32) (i32.const 0))
  (func (export "run")
    (local $i i32)
    (loop $l
      (i32.store (local.get $i) (global.get $counter))
      (global.set $counter (i32.add (global.get $counter) (i32.const 1)))
      (local.set $i (i32.add (local.get $i) (i32.const 4)))
      (br_if $l (i32.lt_u (local.get $i) (i32.const 4000))))
    (call $charge (i64.const 100))))
"#;

fn charge(ctx: &mut HostContext<'_, ()>, (amount,): (i64,)) -> HookResult<()> {
    ctx.use_gas(amount as u64)
}

fn executor() -> WasmerExecutor<()> {
    let mut functions = HostFunctions::new();
    functions.register("charge", charge).expect("Single registration.");
    WasmerExecutor::new(VmConfiguration::new(functions).with_opcode_costs(OpcodeCosts::uniform(1)))
}

fn instantiate(c: &mut Criterion) {
    let _ = env_logger::try_init();
    let executor = executor();
    let bytecode = wat::parse_str(MODULE).expect("Valid module.");
    let options = CompilationOptions::default();
    c.bench_function("compile and instantiate", |b| {
        b.iter(|| {
            executor
                .new_instance_with_options(&bytecode, &options, ())
                .expect("Instantiation succeeds.")
        })
    });
    let compiled = executor
        .new_instance_with_options(&bytecode, &options, ())
        .and_then(|instance| instance.cache())
        .expect("Caching succeeds.");
    c.bench_function("instantiate from compiled code", |b| {
        b.iter(|| {
            executor
                .new_instance_from_compiled_code_with_options(&compiled, &options, ())
                .expect("Restoring succeeds.")
        })
    });
}

fn warm_call(c: &mut Criterion) {
    let executor = executor();
    let bytecode = wat::parse_str(MODULE).expect("Valid module.");
    let options = CompilationOptions::default();
    let mut pool = WarmInstancePool::<WasmerInstance<()>, ()>::default();
    let hash = [1u8; 32];
    pool.save(
        hash,
        executor.new_instance_with_options(&bytecode, &options, ()).expect("Instantiation succeeds."),
    );
    c.bench_function("reset and call warm instance", |b| {
        b.iter(|| {
            pool.with_warm_instance(&hash, |instance| instance.call_function("run"))
                .expect("Instance is pooled.")
                .expect("Call succeeds.")
        })
    });
}

criterion_group!(benches, instantiate, warm_call);

criterion_main!(benches);
