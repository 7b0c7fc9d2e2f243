//! Running one contract call from instantiation to its async calls.
use crate::{
    async_call::{CallId, ReturnCode},
    async_context::{AsyncCallDispatcher, AsyncContext, CallType, GasBudget},
    constants::{CALLBACK_FUNCTION_NAME, INIT_FUNCTION_NAME, UPGRADE_FUNCTION_NAME},
    errors::RuntimeError,
    hooks::{RuntimeData, SharedBlockchain, SharedStorage},
};
use std::sync::Arc;
use wasm_executor::{
    BreakpointValue, CompilationOptions, Executor, ExecutorError, ExecutorResult, Instance,
};

const TARGET: &str = "vm/runtime";

#[derive(Debug, Clone)]
pub struct ContractCallInput {
    pub caller:         Vec<u8>,
    pub recipient:      Vec<u8>,
    pub function:       String,
    pub arguments:      Vec<Vec<u8>>,
    pub gas_provided:   u64,
    pub call_type:      CallType,
    pub call_id:        CallId,
    pub caller_call_id: Option<CallId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmOutput {
    pub return_code:         ReturnCode,
    pub return_message:      String,
    pub return_data:         Vec<Vec<u8>>,
    pub gas_remaining:       u64,
    /// Whether the async context had unresolved calls and was persisted.
    pub async_context_saved: bool,
}

impl VmOutput {
    /// Output of a failed call. All gas is consumed.
    fn failed(return_code: ReturnCode, return_message: impl Into<String>) -> Self {
        Self {
            return_code,
            return_message: return_message.into(),
            return_data: Vec::new(),
            gas_remaining: 0,
            async_context_saved: false,
        }
    }
}

/// Entrypoints that may not be called directly: `init` and `upgrade`, and the
/// legacy callback outside of a callback.
pub fn verify_allowed_function_call(function: &str, call_type: CallType) -> Result<(), RuntimeError> {
    if function == INIT_FUNCTION_NAME || function == UPGRADE_FUNCTION_NAME {
        return Err(RuntimeError::InitFuncCalledInRun);
    }
    if function == CALLBACK_FUNCTION_NAME && call_type != CallType::AsynchronousCallBack {
        return Err(RuntimeError::CallBackFuncCalledInRun);
    }
    Ok(())
}

/// The return code reported for the outcome of an entrypoint.
pub fn return_code_for(result: &ExecutorResult<()>) -> ReturnCode {
    match result {
        Ok(()) => ReturnCode::Ok,
        Err(ExecutorError::FuncNotFound(_)) => ReturnCode::FunctionNotFound,
        Err(ExecutorError::NonvoidSignature(_)) => ReturnCode::FunctionWrongSignature,
        Err(ExecutorError::Breakpoint(BreakpointValue::OutOfGas)) => ReturnCode::OutOfGas,
        Err(ExecutorError::Breakpoint(BreakpointValue::SignalError)) => ReturnCode::UserError,
        Err(ExecutorError::Breakpoint(BreakpointValue::AsyncCall)) => ReturnCode::Ok,
        Err(_) => ReturnCode::ExecutionFailed,
    }
}

/// Instantiate the code and run the entrypoint named in the input. When it
/// succeeds, its async calls are executed and the async context is saved if
/// calls remain unresolved.
pub fn run_contract_call<E, D>(
    executor: &E,
    code: &[u8],
    options: &CompilationOptions,
    input: ContractCallInput,
    storage: SharedStorage,
    blockchain: SharedBlockchain,
    dispatcher: &mut D,
) -> VmOutput
where
    E: Executor<RuntimeData>,
    D: AsyncCallDispatcher + ?Sized, {
    if let Err(e) = verify_allowed_function_call(&input.function, input.call_type) {
        log::debug!(target: TARGET, "Refusing to call {}: {}", input.function, e);
        return VmOutput::failed(ReturnCode::UserError, e.to_string());
    }
    let context = AsyncContext::new(
        input.recipient,
        input.call_id,
        input.caller,
        input.caller_call_id,
        input.call_type,
    )
    .with_function(input.function.as_str());
    let data = RuntimeData::new(context, input.arguments, Arc::clone(&storage), blockchain);
    let options = options.clone().with_gas_limit(input.gas_provided);
    let mut instance = match executor.new_instance_with_options(code, &options, data) {
        Ok(instance) => instance,
        Err(e) => {
            log::debug!(target: TARGET, "Cannot instantiate contract: {}", e);
            return VmOutput::failed(ReturnCode::ContractInvalid, e.to_string());
        }
    };
    let output = run_entrypoint(&mut instance, &input.function, input.gas_provided, storage, dispatcher);
    instance.clean();
    output
}

fn run_entrypoint<I, D>(
    instance: &mut I,
    function: &str,
    gas_provided: u64,
    storage: SharedStorage,
    dispatcher: &mut D,
) -> VmOutput
where
    I: Instance<RuntimeData>,
    D: AsyncCallDispatcher + ?Sized, {
    let has_callback = instance.has_function(CALLBACK_FUNCTION_NAME);
    if let Some(data) = instance.host_data_mut() {
        data.has_callback = has_callback;
    }
    let result = instance.validate_void_function(function).and_then(|()| instance.call_function(function));
    let return_code = return_code_for(&result);
    let gas_remaining = gas_provided.saturating_sub(instance.get_points_used());
    let Some(data) = instance.host_data_mut() else {
        return VmOutput::failed(ReturnCode::ExecutionFailed, "Host data is not available.");
    };
    if !return_code.is_ok() {
        let message = match (&result, data.error_message.take()) {
            (_, Some(message)) => message,
            (Err(e), None) => e.to_string(),
            (Ok(()), None) => String::new(),
        };
        log::debug!(target: TARGET, "Call of {} failed with {}: {}", function, return_code, message);
        return VmOutput::failed(return_code, message);
    }

    let mut budget = GasBudget::new(gas_remaining);
    if let Err(e) = data.async_context.execute(&mut budget, dispatcher) {
        log::warn!(target: TARGET, "Executing async calls of {} failed: {}", function, e);
        return VmOutput::failed(ReturnCode::ExecutionFailed, e.to_string());
    }
    let async_context_saved = !data.async_context.is_complete();
    if async_context_saved {
        let saved = match storage.lock() {
            Ok(mut guard) => data.async_context.save(&mut *guard).map_err(|e| e.to_string()),
            Err(_) => Err("Contract storage is poisoned.".to_string()),
        };
        if let Err(message) = saved {
            log::warn!(target: TARGET, "Cannot save async context: {}", message);
            return VmOutput::failed(ReturnCode::ExecutionFailed, message);
        }
    }
    VmOutput {
        return_code,
        return_message: String::new(),
        return_data: std::mem::take(&mut data.return_data),
        gas_remaining: budget.remaining(),
        async_context_saved,
    }
}
