use super::{encode_cache_header, CacheHeader};
use crate::{
    config::CompilationOptions,
    executor::{BreakpointValue, ExecutorError, ExecutorResult, Instance, InstanceHandle},
    host::{
        ExecutionContext, HookError, HostContext, HostFunction, HostFunctions, RawValue,
        Signature, ValueKind,
    },
    memory::{Memory, MemoryError},
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use wasmer::{
    AsStoreMut, Extern, Function, FunctionEnv, FunctionEnvMut, FunctionType, Imports, Module,
    Pages, RuntimeError, Store, StoreMut, Type, Value,
};
use wasmer_middlewares::metering::{get_remaining_points, set_remaining_points, MeteringPoints};

/// State of an instance that host functions can reach.
struct EnvState {
    handle:                InstanceHandle,
    memory:                Option<wasmer::Memory>,
    instance:              Option<wasmer::Instance>,
    metered:               bool,
    gas_limit:             u64,
    /// Gas accounting for instances without metering, where only host
    /// functions charge.
    unmetered_points_used: u64,
    breakpoint:            BreakpointValue,
    max_memory_grow:       u32,
    max_memory_grow_delta: u32,
    /// Pages added by host functions so far.
    pages_grown:           u32,
}

struct Env<H> {
    state: EnvState,
    data:  Option<H>,
}

fn points_used_in(
    store: &mut impl AsStoreMut,
    instance: &wasmer::Instance,
    gas_limit: u64,
) -> u64 {
    match get_remaining_points(store, instance) {
        MeteringPoints::Remaining(remaining) => gas_limit.saturating_sub(remaining),
        MeteringPoints::Exhausted => gas_limit,
    }
}

/// The view of an instance handed to host functions while it runs.
struct WasmerContext<'a> {
    state: &'a mut EnvState,
    store: StoreMut<'a>,
}

impl Memory for WasmerContext<'_> {
    fn length(&self) -> u32 {
        match &self.state.memory {
            Some(memory) => u32::try_from(memory.view(&self.store).data_size()).unwrap_or(u32::MAX),
            None => 0,
        }
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        let memory = self.state.memory.as_ref().ok_or(MemoryError::OutOfBounds)?;
        memory.view(&self.store).read(u64::from(offset), buf).map_err(|_| MemoryError::OutOfBounds)
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), MemoryError> {
        let memory = self.state.memory.as_ref().ok_or(MemoryError::OutOfBounds)?;
        memory.view(&self.store).write(u64::from(offset), data).map_err(|_| MemoryError::OutOfBounds)
    }

    fn grow(&mut self, pages: u32) -> Result<(), MemoryError> {
        if pages > self.state.max_memory_grow_delta
            || self.state.pages_grown.saturating_add(pages) > self.state.max_memory_grow
        {
            self.state.breakpoint = BreakpointValue::MemoryLimit;
            return Err(MemoryError::LimitExceeded {
                requested: pages,
            });
        }
        let memory = self.state.memory.as_ref().ok_or(MemoryError::GrowFailed)?;
        memory.grow(&mut self.store, Pages(pages)).map_err(|_| MemoryError::GrowFailed)?;
        self.state.pages_grown += pages;
        Ok(())
    }
}

impl ExecutionContext for WasmerContext<'_> {
    fn memory(&mut self) -> Option<&mut dyn Memory> {
        if self.state.memory.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn gas_limit(&self) -> u64 { self.state.gas_limit }

    fn points_used(&mut self) -> u64 {
        match (&self.state.instance, self.state.metered) {
            (Some(instance), true) => points_used_in(&mut self.store, instance, self.state.gas_limit),
            _ => self.state.unmetered_points_used,
        }
    }

    fn set_points_used(&mut self, points: u64) {
        match (&self.state.instance, self.state.metered) {
            (Some(instance), true) => set_remaining_points(
                &mut self.store,
                instance,
                self.state.gas_limit.saturating_sub(points),
            ),
            _ => self.state.unmetered_points_used = points,
        }
    }

    fn breakpoint_value(&self) -> BreakpointValue { self.state.breakpoint }

    fn set_breakpoint_value(&mut self, value: BreakpointValue) { self.state.breakpoint = value }
}

fn hook_trap(error: HookError) -> RuntimeError { RuntimeError::user(Box::new(error)) }

fn function_type(signature: &Signature) -> FunctionType {
    let to_type = |kind: &ValueKind| match kind {
        ValueKind::I32 => Type::I32,
        ValueKind::I64 => Type::I64,
    };
    FunctionType::new(
        signature.params.iter().map(to_type).collect::<Vec<_>>(),
        signature.result.iter().map(to_type).collect::<Vec<_>>(),
    )
}

/// Run a host function on behalf of sandboxed code.
fn call_host<H: Send + 'static>(
    caller: &mut FunctionEnvMut<Env<H>>,
    function: &HostFunction<H>,
    args: &[Value],
    runtime_breakpoints: bool,
) -> Result<Vec<Value>, RuntimeError> {
    let raw = args
        .iter()
        .map(|value| match value {
            Value::I32(v) => Some(RawValue::I32(*v)),
            Value::I64(v) => Some(RawValue::I64(*v)),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            hook_trap(HookError::ArgumentMismatch {
                name: function.name().to_string(),
            })
        })?;
    let (env, store) = caller.data_and_store_mut();
    let Env {
        state,
        data,
    } = env;
    let data = data.as_mut().ok_or_else(|| hook_trap(HookError::HostDataUnavailable))?;
    let handle = state.handle;
    let mut context = WasmerContext {
        state,
        store,
    };
    let outcome = function.invoke(&mut HostContext::new(handle, &mut context, data), &raw);
    let breakpoint = context.state.breakpoint;
    match outcome {
        Ok(result) => {
            if runtime_breakpoints && breakpoint != BreakpointValue::None {
                return Err(hook_trap(HookError::Breakpoint(breakpoint)));
            }
            Ok(result
                .map(|r| match r {
                    RawValue::I32(v) => Value::I32(v),
                    RawValue::I64(v) => Value::I64(v),
                })
                .into_iter()
                .collect())
        }
        Err(error) => {
            log::debug!(
                target: "executor/wasmer",
                "Host function {} failed in instance {}: {}",
                function.name(),
                handle,
                error
            );
            Err(hook_trap(error))
        }
    }
}

fn import_object<H: Send + 'static>(
    store: &mut Store,
    env: &FunctionEnv<Env<H>>,
    functions: &HostFunctions<H>,
    runtime_breakpoints: bool,
) -> Imports {
    let mut imports = Imports::new();
    for function in functions.iter() {
        let host_function = function.clone();
        let wasm_function = Function::new_with_env(
            store,
            env,
            function_type(function.signature()),
            move |mut caller: FunctionEnvMut<Env<H>>, args: &[Value]| {
                call_host(&mut caller, &host_function, args, runtime_breakpoints)
            },
        );
        imports.define(function.namespace(), function.name(), wasm_function);
    }
    imports
}

/// Everything that is released by [Instance::clean].
struct Live<H> {
    store:    Store,
    instance: wasmer::Instance,
    env:      FunctionEnv<Env<H>>,
}

impl<H: Send + 'static> Live<H> {
    /// Instantiate `module` in `store`. On failure the host data is handed
    /// back together with the error.
    fn new(
        mut store: Store,
        module: &Module,
        functions: &HostFunctions<H>,
        options: &CompilationOptions,
        handle: InstanceHandle,
        locals_cost: u64,
        data: Option<H>,
    ) -> Result<Self, (ExecutorError, Option<H>)> {
        let env = FunctionEnv::new(&mut store, Env {
            state: EnvState {
                handle,
                memory: None,
                instance: None,
                metered: options.metering,
                gas_limit: options.gas_limit,
                unmetered_points_used: 0,
                breakpoint: BreakpointValue::None,
                max_memory_grow: options.max_memory_grow,
                max_memory_grow_delta: options.max_memory_grow_delta,
                pages_grown: 0,
            },
            data,
        });
        let imports = import_object(&mut store, &env, functions, options.runtime_breakpoints);
        let instance = match wasmer::Instance::new(&mut store, module, &imports) {
            Ok(instance) => instance,
            Err(error) => {
                let data = env.as_mut(&mut store).data.take();
                return Err((ExecutorError::FailedInstantiation(error.to_string()), data));
            }
        };
        let memory = instance.exports.iter().find_map(|(_, export)| match export {
            Extern::Memory(memory) => Some(memory.clone()),
            _ => None,
        });
        let state = &mut env.as_mut(&mut store).state;
        state.memory = memory;
        state.instance = Some(instance.clone());
        let mut live = Self {
            store,
            instance,
            env,
        };
        // Allocating locals is paid for up front.
        live.set_points_used(locals_cost);
        Ok(live)
    }

    fn state(&self) -> &EnvState { &self.env.as_ref(&self.store).state }

    fn state_mut(&mut self) -> &mut EnvState { &mut self.env.as_mut(&mut self.store).state }

    fn points_used(&mut self) -> u64 {
        let state = self.state();
        let (metered, gas_limit, unmetered) =
            (state.metered, state.gas_limit, state.unmetered_points_used);
        if metered {
            points_used_in(&mut self.store, &self.instance, gas_limit)
        } else {
            unmetered
        }
    }

    fn set_points_used(&mut self, points: u64) {
        let state = self.state();
        let (metered, gas_limit) = (state.metered, state.gas_limit);
        if metered {
            set_remaining_points(&mut self.store, &self.instance, gas_limit.saturating_sub(points));
        } else {
            self.state_mut().unmetered_points_used = points;
        }
    }

    fn exhausted(&mut self) -> bool {
        self.state().metered
            && matches!(
                get_remaining_points(&mut self.store, &self.instance),
                MeteringPoints::Exhausted
            )
    }

    /// Turn a trap that ended execution into an error. Running out of gas
    /// takes precedence over breakpoints, which take precedence over host
    /// function failures.
    fn failure(&mut self, trap: RuntimeError) -> ExecutorError {
        if self.exhausted() {
            self.state_mut().breakpoint = BreakpointValue::OutOfGas;
            return ExecutorError::Breakpoint(BreakpointValue::OutOfGas);
        }
        let breakpoint = self.state().breakpoint;
        if breakpoint != BreakpointValue::None {
            return ExecutorError::Breakpoint(breakpoint);
        }
        match trap.downcast::<HookError>() {
            Ok(HookError::Breakpoint(value)) => ExecutorError::Breakpoint(value),
            Ok(error) => ExecutorError::HostFunction(error),
            Err(trap) => {
                self.state_mut().breakpoint = BreakpointValue::ExecutionFailed;
                ExecutorError::ExecutionPanicked(trap.message())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic.".to_string()
    }
}

/// An instance of a module compiled by
/// [WasmerExecutor](super::WasmerExecutor).
pub struct WasmerInstance<H> {
    id:             InstanceHandle,
    module:         Module,
    host_functions: Arc<HostFunctions<H>>,
    options:        CompilationOptions,
    locals_cost:    u64,
    live:           Option<Live<H>>,
}

impl<H: Send + 'static> WasmerInstance<H> {
    pub(super) fn instantiate(
        store: Store,
        module: Module,
        host_functions: Arc<HostFunctions<H>>,
        options: CompilationOptions,
        locals_cost: u64,
        host_data: H,
    ) -> ExecutorResult<Self> {
        let id = InstanceHandle::fresh();
        let live =
            Live::new(store, &module, &host_functions, &options, id, locals_cost, Some(host_data))
                .map_err(|(error, _)| error)?;
        log::debug!(target: "executor/wasmer", "Created instance {}.", id);
        Ok(Self {
            id,
            module,
            host_functions,
            options,
            locals_cost,
            live: Some(live),
        })
    }

    pub fn options(&self) -> &CompilationOptions { &self.options }
}

impl<H: Send + 'static> Instance<H> for WasmerInstance<H> {
    fn id(&self) -> InstanceHandle { self.id }

    fn has_memory(&self) -> bool {
        self.live.as_ref().map_or(false, |live| live.state().memory.is_some())
    }

    fn get_memory(&self) -> Option<Vec<u8>> {
        let live = self.live.as_ref()?;
        let memory = live.state().memory.as_ref()?;
        let view = memory.view(&live.store);
        let mut out = vec![0u8; usize::try_from(view.data_size()).ok()?];
        view.read(0, &mut out).ok()?;
        Some(out)
    }

    fn set_memory(&mut self, data: &[u8]) -> bool {
        let Some(live) = self.live.as_ref() else {
            return false;
        };
        let Some(memory) = live.state().memory.as_ref() else {
            return false;
        };
        let view = memory.view(&live.store);
        view.data_size() == data.len() as u64 && view.write(0, data).is_ok()
    }

    fn call_function(&mut self, name: &str) -> ExecutorResult<()> {
        let id = self.id;
        let live = self.live.as_mut().ok_or(ExecutorError::InstanceCleaned)?;
        let function = live
            .instance
            .exports
            .get_function(name)
            .map_err(|_| ExecutorError::FuncNotFound(name.to_string()))?
            .clone();
        live.state_mut().breakpoint = BreakpointValue::None;
        log::trace!(target: "executor/wasmer", "Instance {} calls {}.", id, name);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| function.call(&mut live.store, &[])));
        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(trap)) => Err(live.failure(trap)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::warn!(
                    target: "executor/wasmer",
                    "Instance {} panicked in {}: {}",
                    id,
                    name,
                    message
                );
                live.state_mut().breakpoint = BreakpointValue::ExecutionFailed;
                Err(ExecutorError::ExecutionPanicked(message))
            }
        }
    }

    fn has_function(&self, name: &str) -> bool {
        self.module.exports().functions().any(|export| export.name() == name)
    }

    fn get_function_names(&self) -> Vec<String> {
        self.module.exports().functions().map(|export| export.name().to_string()).collect()
    }

    fn validate_void_function(&self, name: &str) -> ExecutorResult<()> {
        let export = self
            .module
            .exports()
            .functions()
            .find(|export| export.name() == name)
            .ok_or_else(|| ExecutorError::FuncNotFound(name.to_string()))?;
        let ty = export.ty();
        if ty.params().is_empty() && ty.results().is_empty() {
            Ok(())
        } else {
            Err(ExecutorError::NonvoidSignature(name.to_string()))
        }
    }

    fn get_points_used(&mut self) -> u64 { self.live.as_mut().map_or(0, Live::points_used) }

    fn set_points_used(&mut self, points: u64) {
        if let Some(live) = self.live.as_mut() {
            live.set_points_used(points);
        }
    }

    fn set_gas_limit(&mut self, limit: u64) {
        self.options.gas_limit = limit;
        if let Some(live) = self.live.as_mut() {
            let used = live.points_used();
            live.state_mut().gas_limit = limit;
            live.set_points_used(used);
        }
    }

    fn get_breakpoint_value(&self) -> BreakpointValue {
        self.live.as_ref().map_or(BreakpointValue::None, |live| live.state().breakpoint)
    }

    fn set_breakpoint_value(&mut self, value: BreakpointValue) {
        if let Some(live) = self.live.as_mut() {
            live.state_mut().breakpoint = value;
        }
    }

    fn cache(&self) -> ExecutorResult<Vec<u8>> {
        if self.live.is_none() {
            return Err(ExecutorError::InstanceCleaned);
        }
        let bytes =
            self.module.serialize().map_err(|e| ExecutorError::CachingFailed(e.to_string()))?;
        Ok(encode_cache_header(
            CacheHeader {
                metered:     self.options.metering,
                locals_cost: self.locals_cost,
            },
            &bytes,
        ))
    }

    /// Instantiates the module again in a fresh store and moves the host data
    /// over. The current store is only dropped once that succeeded.
    fn reset(&mut self) -> bool {
        let Some(live) = self.live.as_mut() else {
            return false;
        };
        let data = live.env.as_mut(&mut live.store).data.take();
        let store = Store::new(live.store.engine().clone());
        match Live::new(
            store,
            &self.module,
            &self.host_functions,
            &self.options,
            self.id,
            self.locals_cost,
            data,
        ) {
            Ok(fresh) => {
                self.live = Some(fresh);
                log::trace!(target: "executor/wasmer", "Reset instance {}.", self.id);
                true
            }
            Err((error, data)) => {
                live.env.as_mut(&mut live.store).data = data;
                log::warn!(
                    target: "executor/wasmer",
                    "Reset of instance {} failed, keeping its current state: {}",
                    self.id,
                    error
                );
                false
            }
        }
    }

    fn clean(&mut self) -> bool {
        match self.live.take() {
            Some(_) => {
                log::debug!(target: "executor/wasmer", "Cleaned instance {}.", self.id);
                true
            }
            None => false,
        }
    }

    fn is_function_imported(&self, name: &str) -> bool {
        self.module.imports().functions().any(|import| import.name() == name)
    }

    fn host_data(&self) -> Option<&H> {
        let live = self.live.as_ref()?;
        live.env.as_ref(&live.store).data.as_ref()
    }

    fn host_data_mut(&mut self) -> Option<&mut H> {
        let live = self.live.as_mut()?;
        live.env.as_mut(&mut live.store).data.as_mut()
    }
}
