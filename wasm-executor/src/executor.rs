//! The contract between the execution substrate and a Wasm backend.
use crate::{
    config::CompilationOptions,
    host::{HookError, RegistrationError},
    opcodes::{InvalidOpcodeCosts, OpcodeCosts},
};
use derive_more::{Display, From, Into};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicU64, Ordering},
};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into, Display)]
/// Identifies an instance for as long as the process runs.
pub struct InstanceHandle(u64);

static NEXT_INSTANCE_HANDLE: AtomicU64 = AtomicU64::new(1);

impl InstanceHandle {
    pub(crate) fn fresh() -> Self { Self(NEXT_INSTANCE_HANDLE.fetch_add(1, Ordering::Relaxed)) }
}

#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
/// Sentinel set by host code to stop execution in an orderly way.
pub enum BreakpointValue {
    None            = 0,
    ExecutionFailed = 1,
    AsyncCall       = 2,
    SignalError     = 3,
    OutOfGas        = 4,
    MemoryLimit     = 5,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid bytecode.")]
    InvalidBytecode,
    #[error("Failed instantiation: {0}")]
    FailedInstantiation(String),
    #[error("Caching failed: {0}")]
    CachingFailed(String),
    #[error("Metering is enabled but no opcode costs are configured.")]
    MissingOpcodeCosts,
    #[error("{0}")]
    InvalidOpcodeCosts(#[from] InvalidOpcodeCosts),
    #[error("The VM configuration cannot change after the first instance was created.")]
    ConfigurationFrozen,
    #[error("{0}")]
    Registration(#[from] RegistrationError),
    #[error("Function not found: {0}")]
    FuncNotFound(String),
    #[error("Function {0} does not have signature () -> ().")]
    NonvoidSignature(String),
    #[error("The instance has been cleaned.")]
    InstanceCleaned,
    #[error("Execution stopped at breakpoint {0:?}.")]
    Breakpoint(BreakpointValue),
    #[error("Host function failed: {0}")]
    HostFunction(HookError),
    #[error("VM execution panicked: {0}")]
    ExecutionPanicked(String),
}

pub type ExecutorResult<A> = Result<A, ExecutorError>;

/// A factory of instances. Holds the configuration that is shared by all
/// instances it creates.
pub trait Executor<H> {
    type Instance: Instance<H>;

    /// Replace the opcode cost table. Fails once an instance was created.
    fn set_opcode_costs(&mut self, costs: OpcodeCosts) -> ExecutorResult<()>;

    /// Names of the host functions available to instances.
    fn function_names(&self) -> BTreeSet<String>;

    /// Compile and instantiate the given Wasm module.
    fn new_instance_with_options(
        &self,
        bytecode: &[u8],
        options: &CompilationOptions,
        host_data: H,
    ) -> ExecutorResult<Self::Instance>;

    /// Instantiate code previously produced by [Instance::cache].
    fn new_instance_from_compiled_code_with_options(
        &self,
        compiled: &[u8],
        options: &CompilationOptions,
        host_data: H,
    ) -> ExecutorResult<Self::Instance>;
}

/// A running module.
pub trait Instance<H> {
    fn id(&self) -> InstanceHandle;

    fn has_memory(&self) -> bool;

    /// A copy of the whole memory, if the instance has one.
    fn get_memory(&self) -> Option<Vec<u8>>;

    /// Overwrite the whole memory. Returns `false` if the instance has no
    /// memory or the lengths differ.
    fn set_memory(&mut self, data: &[u8]) -> bool;

    /// Call an exported function with signature `() -> ()`.
    fn call_function(&mut self, name: &str) -> ExecutorResult<()>;

    fn has_function(&self, name: &str) -> bool;

    fn get_function_names(&self) -> Vec<String>;

    fn validate_void_function(&self, name: &str) -> ExecutorResult<()>;

    /// Check that every exported function has signature `() -> ()`.
    fn validate_exports(&self) -> ExecutorResult<()> {
        for name in self.get_function_names() {
            self.validate_void_function(&name)?;
        }
        Ok(())
    }

    fn get_points_used(&mut self) -> u64;

    fn set_points_used(&mut self, points: u64);

    fn set_gas_limit(&mut self, limit: u64);

    fn get_breakpoint_value(&self) -> BreakpointValue;

    fn set_breakpoint_value(&mut self, value: BreakpointValue);

    /// Serialize the compiled code so it can be instantiated again without
    /// compilation.
    fn cache(&self) -> ExecutorResult<Vec<u8>>;

    /// Bring globals and memory back to their initial state, keeping the host
    /// data. Returns `false` if that is not possible, in particular after
    /// [Instance::clean]. A failed reset leaves the instance, including its
    /// host data, in the state it was in before the call.
    fn reset(&mut self) -> bool;

    /// Release the resources held by the instance. Returns `true` only the
    /// first time.
    fn clean(&mut self) -> bool;

    fn is_function_imported(&self, name: &str) -> bool;

    fn host_data(&self) -> Option<&H>;

    fn host_data_mut(&mut self) -> Option<&mut H>;
}
