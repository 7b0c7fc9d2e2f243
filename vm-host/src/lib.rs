//! Contract-facing layer on top of the Wasm executor: the host functions
//! contracts can call, and the orchestration of the asynchronous calls they
//! make to other contracts, possibly in other shards.
pub mod async_call;
pub mod async_call_group;
pub mod async_context;
pub mod blockchain;
pub mod call_data;
pub mod constants;
pub mod errors;
pub mod hooks;
pub mod persistence;
pub mod runtime;


pub use async_call::{AsyncCall, AsyncCallStatus, CallId, ExecutionMode, ReturnCode};
pub use async_call_group::{AsyncCallGroup, GroupCompletion};
pub use async_context::{
    AsyncCallDispatcher, AsyncContext, CallType, ContextCallback, GasBudget, GasMeter, Resolution,
};
pub use blockchain::{BlockchainHook, InMemoryStorage, StorageHook};
pub use errors::{AsyncError, LoadError, RuntimeError};
pub use hooks::{host_functions, RuntimeData, SharedBlockchain, SharedStorage};
pub use runtime::{run_contract_call, ContractCallInput, VmOutput};

pub type ExecResult<A> = anyhow::Result<A>;
