//! Sandboxed execution of Wasm smart contract code.
//!
//! An [Executor](executor::Executor) compiles modules into
//! [Instance](executor::Instance)s, charging gas for every executed
//! instruction according to an [OpcodeCosts](opcodes::OpcodeCosts) table.
//! Contract code reaches the host only through the functions registered in a
//! [HostFunctions](host::HostFunctions) table, and host functions reach
//! contract memory only through the bounds-checked primitives of [memory].
pub mod config;
pub mod constants;
pub mod executor;
pub mod host;
pub mod memory;
pub mod opcodes;
pub mod pool;
pub mod wasmer_backend;
pub mod wrapper;

#[cfg(test)]
mod tests;

pub use config::{CompilationOptions, SerializationFormat, VmConfiguration};
pub use executor::{
    BreakpointValue, Executor, ExecutorError, ExecutorResult, Instance, InstanceHandle,
};
pub use host::{Gas, HookError, HookResult, HostContext, HostFunctions, OutOfGas};
pub use wasmer_backend::{WasmerExecutor, WasmerInstance};

pub type ExecResult<A> = anyhow::Result<A>;
