//! An executor that logs every operation before forwarding it.
use crate::{
    config::CompilationOptions,
    executor::{BreakpointValue, Executor, ExecutorResult, Instance, InstanceHandle},
    opcodes::OpcodeCosts,
};
use std::{collections::BTreeSet, fmt::Debug, marker::PhantomData};

const TARGET: &str = "executor/wrapper";

fn traced<A: Debug>(operation: &str, id: InstanceHandle, args: impl Debug, result: A) -> A {
    log::trace!(target: TARGET, "{} {}{:?} -> {:?}", id, operation, args, result);
    result
}

pub struct WrapperExecutor<E, H> {
    inner:   E,
    phantom: PhantomData<fn(H)>,
}

impl<E: Executor<H>, H> WrapperExecutor<E, H> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }

    pub fn inner(&self) -> &E { &self.inner }
}

impl<E: Executor<H>, H> Executor<H> for WrapperExecutor<E, H> {
    type Instance = WrapperInstance<E::Instance, H>;

    fn set_opcode_costs(&mut self, costs: OpcodeCosts) -> ExecutorResult<()> {
        let result = self.inner.set_opcode_costs(costs);
        log::trace!(target: TARGET, "set_opcode_costs -> {:?}", result);
        result
    }

    fn function_names(&self) -> BTreeSet<String> {
        let names = self.inner.function_names();
        log::trace!(target: TARGET, "function_names -> {} names", names.len());
        names
    }

    fn new_instance_with_options(
        &self,
        bytecode: &[u8],
        options: &CompilationOptions,
        host_data: H,
    ) -> ExecutorResult<Self::Instance> {
        let result = self.inner.new_instance_with_options(bytecode, options, host_data);
        match &result {
            Ok(instance) => log::trace!(
                target: TARGET,
                "new_instance_with_options({} bytes, {:?}) -> {}",
                bytecode.len(),
                options,
                instance.id()
            ),
            Err(e) => log::trace!(
                target: TARGET,
                "new_instance_with_options({} bytes, {:?}) -> {}",
                bytecode.len(),
                options,
                e
            ),
        }
        result.map(WrapperInstance::new)
    }

    fn new_instance_from_compiled_code_with_options(
        &self,
        compiled: &[u8],
        options: &CompilationOptions,
        host_data: H,
    ) -> ExecutorResult<Self::Instance> {
        let result =
            self.inner.new_instance_from_compiled_code_with_options(compiled, options, host_data);
        match &result {
            Ok(instance) => log::trace!(
                target: TARGET,
                "new_instance_from_compiled_code_with_options({} bytes, {:?}) -> {}",
                compiled.len(),
                options,
                instance.id()
            ),
            Err(e) => log::trace!(
                target: TARGET,
                "new_instance_from_compiled_code_with_options({} bytes, {:?}) -> {}",
                compiled.len(),
                options,
                e
            ),
        }
        result.map(WrapperInstance::new)
    }
}

pub struct WrapperInstance<I, H> {
    inner:   I,
    phantom: PhantomData<fn(H)>,
}

impl<I: Instance<H>, H> WrapperInstance<I, H> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }

    pub fn into_inner(self) -> I { self.inner }
}

impl<I: Instance<H>, H> Instance<H> for WrapperInstance<I, H> {
    fn id(&self) -> InstanceHandle { self.inner.id() }

    fn has_memory(&self) -> bool { traced("has_memory", self.id(), (), self.inner.has_memory()) }

    fn get_memory(&self) -> Option<Vec<u8>> {
        let memory = self.inner.get_memory();
        log::trace!(
            target: TARGET,
            "{} get_memory() -> {:?} bytes",
            self.id(),
            memory.as_ref().map(Vec::len)
        );
        memory
    }

    fn set_memory(&mut self, data: &[u8]) -> bool {
        let id = self.id();
        traced("set_memory", id, (data.len(),), self.inner.set_memory(data))
    }

    fn call_function(&mut self, name: &str) -> ExecutorResult<()> {
        let id = self.id();
        traced("call_function", id, (name,), self.inner.call_function(name))
    }

    fn has_function(&self, name: &str) -> bool {
        traced("has_function", self.id(), (name,), self.inner.has_function(name))
    }

    fn get_function_names(&self) -> Vec<String> {
        traced("get_function_names", self.id(), (), self.inner.get_function_names())
    }

    fn validate_void_function(&self, name: &str) -> ExecutorResult<()> {
        traced("validate_void_function", self.id(), (name,), self.inner.validate_void_function(name))
    }

    fn validate_exports(&self) -> ExecutorResult<()> {
        traced("validate_exports", self.id(), (), self.inner.validate_exports())
    }

    fn get_points_used(&mut self) -> u64 {
        let id = self.id();
        traced("get_points_used", id, (), self.inner.get_points_used())
    }

    fn set_points_used(&mut self, points: u64) {
        let id = self.id();
        traced("set_points_used", id, (points,), self.inner.set_points_used(points))
    }

    fn set_gas_limit(&mut self, limit: u64) {
        let id = self.id();
        traced("set_gas_limit", id, (limit,), self.inner.set_gas_limit(limit))
    }

    fn get_breakpoint_value(&self) -> BreakpointValue {
        traced("get_breakpoint_value", self.id(), (), self.inner.get_breakpoint_value())
    }

    fn set_breakpoint_value(&mut self, value: BreakpointValue) {
        let id = self.id();
        traced("set_breakpoint_value", id, (value,), self.inner.set_breakpoint_value(value))
    }

    fn cache(&self) -> ExecutorResult<Vec<u8>> {
        let result = self.inner.cache();
        log::trace!(
            target: TARGET,
            "{} cache() -> {:?}",
            self.id(),
            result.as_ref().map(Vec::len)
        );
        result
    }

    fn reset(&mut self) -> bool {
        let id = self.id();
        traced("reset", id, (), self.inner.reset())
    }

    fn clean(&mut self) -> bool {
        let id = self.id();
        traced("clean", id, (), self.inner.clean())
    }

    fn is_function_imported(&self, name: &str) -> bool {
        traced("is_function_imported", self.id(), (name,), self.inner.is_function_imported(name))
    }

    fn host_data(&self) -> Option<&H> { self.inner.host_data() }

    fn host_data_mut(&mut self) -> Option<&mut H> { self.inner.host_data_mut() }
}
