//! Tests of the wasmer backend through the executor interface.
use crate::{
    config::{CompilationOptions, VmConfiguration},
    constants::{PAGE_SIZE, WASM_HEADER},
    executor::{BreakpointValue, Executor, ExecutorError, Instance},
    host::{HookError, HookResult, HostContext, HostFunctions},
    memory::MemoryError,
    opcodes::{Opcode, OpcodeCosts},
    wasmer_backend::{WasmerExecutor, WasmerInstance},
    wrapper::WrapperExecutor,
    ExecResult,
};

#[derive(Default, Debug)]
struct TestHost {
    recorded: Vec<i32>,
}

fn record(ctx: &mut HostContext<'_, TestHost>, (value,): (i32,)) -> HookResult<()> {
    ctx.data_mut().recorded.push(value);
    Ok(())
}

fn signal(ctx: &mut HostContext<'_, TestHost>, _: ()) -> HookResult<()> {
    ctx.set_breakpoint_value(BreakpointValue::SignalError);
    Ok(())
}

fn write_at(ctx: &mut HostContext<'_, TestHost>, (offset,): (i32,)) -> HookResult<()> {
    ctx.mem_store(offset, b"hello")
}

fn explode(_ctx: &mut HostContext<'_, TestHost>, _: ()) -> HookResult<()> {
    panic!("host function exploded")
}

fn charge(ctx: &mut HostContext<'_, TestHost>, (amount,): (i64,)) -> HookResult<()> {
    ctx.use_gas(amount as u64)
}

fn gas_left(ctx: &mut HostContext<'_, TestHost>, _: ()) -> HookResult<i64> {
    Ok(ctx.gas_left() as i64)
}

/// Succeeds only the first time it runs for the same host data.
fn set_up(ctx: &mut HostContext<'_, TestHost>, _: ()) -> HookResult<()> {
    if ctx.data().recorded.contains(&SET_UP_MARK) {
        return Err(anyhow::anyhow!("Already set up.").into());
    }
    ctx.data_mut().recorded.push(SET_UP_MARK);
    Ok(())
}

const SET_UP_MARK: i32 = -7;

fn host_functions() -> ExecResult<HostFunctions<TestHost>> {
    let mut functions = HostFunctions::new();
    functions
        .register("record", record)?
        .register("signal", signal)?
        .register("writeAt", write_at)?
        .register("explode", explode)?
        .register("charge", charge)?
        .register("gasLeft", gas_left)?
        .register("setUp", set_up)?;
    Ok(functions)
}

fn executor(costs: Option<OpcodeCosts>) -> ExecResult<WasmerExecutor<TestHost>> {
    let mut config = VmConfiguration::new(host_functions()?);
    if let Some(costs) = costs {
        config = config.with_opcode_costs(costs);
    }
    Ok(WasmerExecutor::new(config))
}

fn unmetered() -> CompilationOptions {
    CompilationOptions {
        metering: false,
        ..CompilationOptions::default()
    }
}

fn instance(source: &str, options: &CompilationOptions) -> ExecResult<WasmerInstance<TestHost>> {
    let executor = executor(Some(OpcodeCosts::uniform(1)))?;
    let bytecode = wat::parse_str(source)?;
    Ok(executor.new_instance_with_options(&bytecode, options, TestHost::default())?)
}

fn recorded(instance: &WasmerInstance<TestHost>) -> Vec<i32> {
    instance.host_data().expect("Instance is live.").recorded.clone()
}

const CALLS_HOST: &str = r#"
(module
  (import "env" "record" (func $record (param i32)))
  (import "env" "signal" (func $signal))
  (import "env" "writeAt" (func $write_at (param i32)))
  (import "env" "explode" (func $explode))
  (import "env" "charge" (func $charge (param i64)))
  (memory (export "memory") 1)
  (global $counter (mut i32) (i32.const 0))
  (func (export "main") (call $record (i32.const 7)))
  (func (export "bump")
    (global.set $counter (i32.add (global.get $counter) (i32.const 1)))
    (i32.store (i32.const 0) (global.get $counter))
    (call $record (global.get $counter)))
  (func (export "stop") (call $signal) (call $record (i32.const 1)))
  (func (export "write") (call $write_at (i32.const 16)))
  (func (export "writeNegative") (call $write_at (i32.const -1)))
  (func (export "writePastEnd") (call $write_at (i32.const 65536)))
  (func (export "boom") (call $explode))
  (func (export "crash") unreachable)
  (func (export "expensive") (call $charge (i64.const 1000000))))
"#;

#[test]
fn invalid_bytecode() -> ExecResult<()> {
    let executor = executor(Some(OpcodeCosts::uniform(1)))?;
    let options = CompilationOptions::default();
    for bytecode in [&b""[..], &b"not wasm at all"[..]] {
        assert!(matches!(
            executor.new_instance_with_options(bytecode, &options, TestHost::default()),
            Err(ExecutorError::InvalidBytecode)
        ));
    }
    let mut truncated = WASM_HEADER.to_vec();
    truncated.push(0xff);
    assert!(matches!(
        executor.new_instance_with_options(&truncated, &options, TestHost::default()),
        Err(ExecutorError::FailedInstantiation(_))
    ));
    assert!(matches!(
        executor.new_instance_from_compiled_code_with_options(&[], &options, TestHost::default()),
        Err(ExecutorError::InvalidBytecode)
    ));
    Ok(())
}

#[test]
fn unknown_import_fails_to_link() -> ExecResult<()> {
    let result = instance(
        r#"(module (import "env" "unknown" (func)) (func (export "f")))"#,
        &CompilationOptions::default(),
    );
    assert!(matches!(
        result.map_err(|e| e.downcast::<ExecutorError>()),
        Err(Ok(ExecutorError::FailedInstantiation(_)))
    ));
    Ok(())
}

#[test]
fn metering_requires_costs() -> ExecResult<()> {
    let executor = executor(None)?;
    let bytecode = wat::parse_str("(module)")?;
    assert!(matches!(
        executor.new_instance_with_options(
            &bytecode,
            &CompilationOptions::default(),
            TestHost::default()
        ),
        Err(ExecutorError::MissingOpcodeCosts)
    ));
    assert!(executor.new_instance_with_options(&bytecode, &unmetered(), TestHost::default()).is_ok());
    Ok(())
}

#[test]
fn configuration_is_frozen_after_first_instance() -> ExecResult<()> {
    let mut executor = executor(None)?;
    executor.set_opcode_costs(OpcodeCosts::uniform(2))?;
    let bytecode = wat::parse_str("(module)")?;
    executor.new_instance_with_options(
        &bytecode,
        &CompilationOptions::default(),
        TestHost::default(),
    )?;
    assert!(matches!(
        executor.set_opcode_costs(OpcodeCosts::uniform(3)),
        Err(ExecutorError::ConfigurationFrozen)
    ));
    assert_eq!(executor.function_names().len(), 7);
    assert!(executor.function_names().contains("gasLeft"));
    Ok(())
}

#[test]
fn void_functions() -> ExecResult<()> {
    let instance = instance(
        r#"(module
             (func (export "good"))
             (func (export "takes") (param i32))
             (func (export "gives") (result i32) (i32.const 0)))"#,
        &CompilationOptions::default(),
    )?;
    instance.validate_void_function("good")?;
    assert!(matches!(
        instance.validate_void_function("takes"),
        Err(ExecutorError::NonvoidSignature(_))
    ));
    assert!(matches!(
        instance.validate_void_function("gives"),
        Err(ExecutorError::NonvoidSignature(_))
    ));
    assert!(matches!(
        instance.validate_void_function("missing"),
        Err(ExecutorError::FuncNotFound(_))
    ));
    assert!(matches!(instance.validate_exports(), Err(ExecutorError::NonvoidSignature(_))));
    assert!(instance.has_function("takes"));
    assert!(!instance.has_memory());
    Ok(())
}

#[test]
fn host_functions_reach_host_data_and_memory() -> ExecResult<()> {
    let mut instance = instance(CALLS_HOST, &CompilationOptions::default())?;
    instance.validate_exports()?;
    assert!(instance.is_function_imported("record"));
    assert!(!instance.is_function_imported("gasLeft"));
    instance.call_function("main")?;
    assert_eq!(recorded(&instance), vec![7]);
    instance.call_function("write")?;
    let memory = instance.get_memory().expect("Module exports memory.");
    assert_eq!(memory.len(), PAGE_SIZE as usize);
    assert_eq!(&memory[16..21], b"hello");
    assert!(matches!(
        instance.call_function("nothing"),
        Err(ExecutorError::FuncNotFound(_))
    ));
    Ok(())
}

#[test]
fn host_failures_stop_execution() -> ExecResult<()> {
    let mut instance = instance(CALLS_HOST, &CompilationOptions::default())?;
    assert!(matches!(
        instance.call_function("writeNegative"),
        Err(ExecutorError::HostFunction(HookError::Memory(MemoryError::OutOfBoundsLower)))
    ));
    let mut without_memory = self::instance(
        r#"(module
             (import "env" "writeAt" (func $write_at (param i32)))
             (func (export "write") (call $write_at (i32.const 0))))"#,
        &CompilationOptions::default(),
    )?;
    assert!(matches!(
        without_memory.call_function("write"),
        Err(ExecutorError::HostFunction(HookError::MemoryDeclarationMissing))
    ));
    Ok(())
}

#[test]
fn host_growth_respects_limits() -> ExecResult<()> {
    let mut instance = instance(CALLS_HOST, &CompilationOptions::default())?;
    instance.call_function("writePastEnd")?;
    let memory = instance.get_memory().expect("Module exports memory.");
    assert_eq!(memory.len(), 2 * PAGE_SIZE as usize);
    assert_eq!(&memory[PAGE_SIZE as usize..PAGE_SIZE as usize + 5], b"hello");

    let limited = CompilationOptions {
        max_memory_grow: 0,
        ..CompilationOptions::default()
    };
    let mut instance = self::instance(CALLS_HOST, &limited)?;
    assert!(matches!(
        instance.call_function("writePastEnd"),
        Err(ExecutorError::Breakpoint(BreakpointValue::MemoryLimit))
    ));
    assert_eq!(instance.get_memory().map(|m| m.len()), Some(PAGE_SIZE as usize));
    Ok(())
}

const GROWS: &str = r#"
(module
  (import "env" "record" (func $record (param i32)))
  (memory (export "memory") 1)
  (func (export "grow")
    (call $record (memory.grow (i32.const 500)))
    (call $record (memory.grow (i32.const 2)))
    (call $record (memory.grow (i32.const 1)))
    (call $record (memory.size))))
"#;

#[test]
fn sandbox_growth_respects_limits() -> ExecResult<()> {
    let limited = CompilationOptions {
        max_memory_grow: 2,
        ..CompilationOptions::default()
    };
    let mut instance = instance(GROWS, &limited)?;
    instance.call_function("grow")?;
    assert_eq!(recorded(&instance), vec![-1, 1, -1, 3]);
    assert_eq!(instance.get_memory().map(|m| m.len()), Some(3 * PAGE_SIZE as usize));

    // The limit survives a reset and a round trip through compiled code.
    assert!(instance.reset());
    instance.call_function("grow")?;
    assert_eq!(recorded(&instance), vec![-1, 1, -1, 3, -1, 1, -1, 3]);
    let executor = executor(Some(OpcodeCosts::uniform(1)))?;
    let mut restored = executor.new_instance_from_compiled_code_with_options(
        &instance.cache()?,
        &limited,
        TestHost::default(),
    )?;
    restored.call_function("grow")?;
    assert_eq!(recorded(&restored), vec![-1, 1, -1, 3]);
    Ok(())
}

#[test]
fn breakpoints_stop_execution() -> ExecResult<()> {
    let mut instance = instance(CALLS_HOST, &CompilationOptions::default())?;
    assert!(matches!(
        instance.call_function("stop"),
        Err(ExecutorError::Breakpoint(BreakpointValue::SignalError))
    ));
    assert_eq!(instance.get_breakpoint_value(), BreakpointValue::SignalError);
    assert!(recorded(&instance).is_empty());

    let without_breakpoints = CompilationOptions {
        runtime_breakpoints: false,
        ..CompilationOptions::default()
    };
    let mut instance = self::instance(CALLS_HOST, &without_breakpoints)?;
    instance.call_function("stop")?;
    assert_eq!(instance.get_breakpoint_value(), BreakpointValue::SignalError);
    assert_eq!(recorded(&instance), vec![1]);
    Ok(())
}

#[test]
fn out_of_gas_in_a_loop() -> ExecResult<()> {
    let options = CompilationOptions::default().with_gas_limit(1000);
    let mut instance = instance(r#"(module (func (export "spin") (loop $l (br $l))))"#, &options)?;
    assert!(matches!(
        instance.call_function("spin"),
        Err(ExecutorError::Breakpoint(BreakpointValue::OutOfGas))
    ));
    assert_eq!(instance.get_points_used(), 1000);
    assert_eq!(instance.get_breakpoint_value(), BreakpointValue::OutOfGas);
    Ok(())
}

#[test]
fn host_charges_count_as_used_gas() -> ExecResult<()> {
    let mut instance = instance(CALLS_HOST, &unmetered().with_gas_limit(10_000_000))?;
    instance.call_function("expensive")?;
    assert_eq!(instance.get_points_used(), 1_000_000);

    let mut instance = self::instance(CALLS_HOST, &CompilationOptions::default().with_gas_limit(5000))?;
    assert!(matches!(
        instance.call_function("expensive"),
        Err(ExecutorError::Breakpoint(BreakpointValue::OutOfGas))
    ));
    assert_eq!(instance.get_points_used(), 5000);
    Ok(())
}

#[test]
fn gas_accounting() -> ExecResult<()> {
    let mut instance = instance(CALLS_HOST, &CompilationOptions::default().with_gas_limit(10_000))?;
    assert_eq!(instance.get_points_used(), 0);
    instance.call_function("main")?;
    let used = instance.get_points_used();
    assert!(used > 0 && used < 10_000);
    instance.set_points_used(0);
    assert_eq!(instance.get_points_used(), 0);
    instance.set_points_used(20);
    instance.set_gas_limit(50);
    assert_eq!(instance.get_points_used(), 20);
    Ok(())
}

#[test]
fn locals_are_charged_at_instantiation() -> ExecResult<()> {
    let mut costs = OpcodeCosts::uniform(0);
    costs.set_cost(Opcode::LocalAllocate, 5);
    let executor = executor(Some(costs))?;
    let bytecode = wat::parse_str(r#"(module (func (export "f") (local i32 i32 i32)))"#)?;
    let options = CompilationOptions {
        unmetered_locals: 1,
        ..CompilationOptions::default()
    };
    let mut instance = executor.new_instance_with_options(&bytecode, &options, TestHost::default())?;
    assert_eq!(instance.get_points_used(), 10);
    Ok(())
}

#[test]
fn panics_and_traps_are_contained() -> ExecResult<()> {
    let mut instance = instance(CALLS_HOST, &CompilationOptions::default())?;
    match instance.call_function("boom") {
        Err(ExecutorError::ExecutionPanicked(message)) => assert!(message.contains("exploded")),
        other => panic!("Unexpected outcome {:?}", other),
    }
    assert!(matches!(
        instance.call_function("crash"),
        Err(ExecutorError::ExecutionPanicked(_))
    ));
    assert!(instance.clean());
    assert!(!instance.clean());
    assert!(!instance.reset());
    assert!(!instance.has_memory());
    assert!(instance.host_data().is_none());
    assert!(matches!(instance.call_function("main"), Err(ExecutorError::InstanceCleaned)));
    assert!(matches!(instance.cache(), Err(ExecutorError::InstanceCleaned)));
    Ok(())
}

#[test]
fn reset_restores_initial_state() -> ExecResult<()> {
    let mut instance = instance(CALLS_HOST, &CompilationOptions::default())?;
    let id = instance.id();
    instance.call_function("bump")?;
    instance.call_function("bump")?;
    assert_eq!(instance.get_memory().expect("Memory.")[0], 2);
    assert!(instance.reset());
    assert_eq!(instance.id(), id);
    assert_eq!(instance.get_memory().expect("Memory.")[0], 0);
    instance.call_function("bump")?;
    assert_eq!(recorded(&instance), vec![1, 2, 1]);
    Ok(())
}

#[test]
fn failed_reset_keeps_state() -> ExecResult<()> {
    // The start function only succeeds on the first instantiation.
    let mut instance = instance(
        r#"(module
             (import "env" "setUp" (func $set_up))
             (import "env" "record" (func $record (param i32)))
             (memory (export "memory") 1)
             (start $set_up)
             (func (export "main")
               (i32.store (i32.const 0) (i32.const 5))
               (call $record (i32.const 1))))"#,
        &unmetered(),
    )?;
    instance.call_function("main")?;
    assert!(!instance.reset());
    assert_eq!(recorded(&instance), vec![SET_UP_MARK, 1]);
    assert_eq!(instance.get_memory().expect("Memory.")[0], 5);
    instance.call_function("main")?;
    assert_eq!(recorded(&instance), vec![SET_UP_MARK, 1, 1]);
    assert!(instance.clean());
    assert!(!instance.reset());
    assert!(instance.host_data().is_none());
    Ok(())
}

#[test]
fn set_memory_requires_equal_length() -> ExecResult<()> {
    let mut instance = instance(CALLS_HOST, &CompilationOptions::default())?;
    let mut memory = instance.get_memory().expect("Memory.");
    memory[100] = 9;
    assert!(instance.set_memory(&memory));
    assert_eq!(instance.get_memory().expect("Memory.")[100], 9);
    assert!(!instance.set_memory(&memory[1..]));
    Ok(())
}

#[test]
fn cached_code_behaves_the_same() -> ExecResult<()> {
    let executor = executor(Some(OpcodeCosts::uniform(1)))?;
    let bytecode = wat::parse_str(CALLS_HOST)?;
    let options = CompilationOptions::default().with_gas_limit(100_000);
    let mut original = executor.new_instance_with_options(&bytecode, &options, TestHost::default())?;
    let blob = original.cache()?;
    let mut restored =
        executor.new_instance_from_compiled_code_with_options(&blob, &options, TestHost::default())?;
    assert_ne!(original.id(), restored.id());
    original.call_function("bump")?;
    restored.call_function("bump")?;
    assert_eq!(recorded(&original), recorded(&restored));
    assert_eq!(original.get_points_used(), restored.get_points_used());
    assert_eq!(original.get_memory(), restored.get_memory());

    assert!(matches!(
        executor.new_instance_from_compiled_code_with_options(
            &blob,
            &unmetered(),
            TestHost::default()
        ),
        Err(ExecutorError::CachingFailed(_))
    ));
    assert!(matches!(
        executor.new_instance_from_compiled_code_with_options(
            &blob[..8],
            &options,
            TestHost::default()
        ),
        Err(ExecutorError::CachingFailed(_))
    ));
    Ok(())
}

#[test]
fn wrapper_forwards() -> ExecResult<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let executor = WrapperExecutor::new(executor(Some(OpcodeCosts::uniform(1)))?);
    let bytecode = wat::parse_str(CALLS_HOST)?;
    let mut instance = executor.new_instance_with_options(
        &bytecode,
        &CompilationOptions::default(),
        TestHost::default(),
    )?;
    instance.call_function("main")?;
    assert_eq!(instance.host_data().map(|h| h.recorded.clone()), Some(vec![7]));
    assert!(instance.clean());
    Ok(())
}
