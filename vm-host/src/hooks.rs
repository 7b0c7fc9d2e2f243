//! Host functions available to contracts. All of them live in the default
//! `env` namespace and charge gas before doing anything visible.
use crate::{
    async_call::AsyncCall,
    async_context::AsyncContext,
    blockchain::{BlockchainHook, StorageHook},
    constants::*,
    errors::AsyncError,
};
use anyhow::anyhow;
use num_enum::IntoPrimitive;
use sha2::Digest;
use std::sync::{Arc, Mutex, MutexGuard};
use wasm_executor::{
    host::RegistrationError,
    memory::{MemLength, MemPtr, MemoryError},
    BreakpointValue, HookError, HookResult, HostContext, HostFunctions,
};

/// Storage shared between the host and the caller of the VM.
pub type SharedStorage = Arc<Mutex<dyn StorageHook + Send>>;

pub type SharedBlockchain = Arc<dyn BlockchainHook + Send + Sync>;

/// Host data of an instance running a contract call.
pub struct RuntimeData {
    pub arguments:     Vec<Vec<u8>>,
    pub return_data:   Vec<Vec<u8>>,
    /// Message passed to `signalError`.
    pub error_message: Option<String>,
    /// Whether the contract exports the legacy callback entrypoint.
    pub has_callback:  bool,
    pub async_context: AsyncContext,
    pub storage:       SharedStorage,
    pub blockchain:    SharedBlockchain,
}

impl RuntimeData {
    pub fn new(
        async_context: AsyncContext,
        arguments: Vec<Vec<u8>>,
        storage: SharedStorage,
        blockchain: SharedBlockchain,
    ) -> Self {
        Self {
            arguments,
            return_data: Vec::new(),
            error_message: None,
            has_callback: false,
            async_context,
            storage,
            blockchain,
        }
    }

    fn storage(&self) -> HookResult<MutexGuard<'_, dyn StorageHook + Send + 'static>> {
        self.storage.lock().map_err(|_| anyhow!("Contract storage is poisoned.").into())
    }
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive)]
/// Effect of a `storageStore` call, as returned to the contract.
pub enum StorageStatus {
    Unchanged = 0,
    Modified  = 1,
    Added     = 2,
    Deleted   = 3,
}

type Ctx<'a, 'b> = &'a mut HostContext<'b, RuntimeData>;

fn length(len: MemLength) -> HookResult<u32> {
    u32::try_from(len).map_err(|_| MemoryError::NegativeLength.into())
}

fn async_failure(error: AsyncError) -> HookError { HookError::Other(error.into()) }

fn load_name(ctx: Ctx, offset: MemPtr, len: MemLength) -> HookResult<String> {
    let bytes = ctx.mem_load(offset, len)?;
    String::from_utf8(bytes).map_err(|_| anyhow!("Function name is not valid UTF-8.").into())
}

fn load_storage_key(ctx: Ctx, offset: MemPtr, len: MemLength) -> HookResult<Vec<u8>> {
    let key = ctx.mem_load(offset, len)?;
    if key.starts_with(ASYNC_DATA_PREFIX) {
        return Err(anyhow!("Storage key {} is reserved.", hex::encode(&key)).into());
    }
    Ok(key)
}

fn argument(data: &RuntimeData, id: i32) -> HookResult<&[u8]> {
    usize::try_from(id)
        .ok()
        .and_then(|i| data.arguments.get(i))
        .map(Vec::as_slice)
        .ok_or_else(|| anyhow!("Argument index {} is out of range.", id).into())
}

pub fn get_gas_left(ctx: Ctx, _: ()) -> HookResult<i64> {
    ctx.use_gas(GET_GAS_LEFT_COST)?;
    Ok(i64::try_from(ctx.gas_left()).unwrap_or(i64::MAX))
}

pub fn signal_error(ctx: Ctx, (offset, len): (MemPtr, MemLength)) -> HookResult<()> {
    ctx.use_gas(signal_error_cost(length(len)?))?;
    let message = ctx.mem_load(offset, len)?;
    ctx.data_mut().error_message = Some(String::from_utf8_lossy(&message).into_owned());
    ctx.set_breakpoint_value(BreakpointValue::SignalError);
    Ok(())
}

pub fn finish(ctx: Ctx, (offset, len): (MemPtr, MemLength)) -> HookResult<()> {
    ctx.use_gas(finish_cost(length(len)?))?;
    let data = ctx.mem_load(offset, len)?;
    ctx.data_mut().return_data.push(data);
    Ok(())
}

pub fn get_num_arguments(ctx: Ctx, _: ()) -> HookResult<i32> {
    ctx.use_gas(GET_ARGUMENT_COST)?;
    Ok(ctx.data().arguments.len() as i32)
}

pub fn get_argument_length(ctx: Ctx, (id,): (i32,)) -> HookResult<i32> {
    ctx.use_gas(GET_ARGUMENT_COST)?;
    Ok(argument(ctx.data(), id)?.len() as i32)
}

/// Write the argument to memory and return its length.
pub fn get_argument(ctx: Ctx, (id, offset): (i32, MemPtr)) -> HookResult<i32> {
    let arg = argument(ctx.data(), id)?.to_vec();
    ctx.use_gas(GET_ARGUMENT_COST + copy_from_host_cost(arg.len() as u32))?;
    ctx.mem_store(offset, &arg)?;
    Ok(arg.len() as i32)
}

pub fn get_caller(ctx: Ctx, (offset,): (MemPtr,)) -> HookResult<()> {
    ctx.use_gas(GET_CALLER_COST)?;
    let caller = ctx.data().async_context.caller_address().to_vec();
    ctx.mem_store(offset, &caller)
}

/// Write an entry of the contract's storage. An empty value deletes the
/// entry.
pub fn storage_store(
    ctx: Ctx,
    (key_offset, key_len, data_offset, data_len): (MemPtr, MemLength, MemPtr, MemLength),
) -> HookResult<i32> {
    ctx.use_gas(storage_store_cost(length(key_len)?, length(data_len)?))?;
    let key = load_storage_key(ctx, key_offset, key_len)?;
    let value = ctx.mem_load(data_offset, data_len)?;
    let data = ctx.data();
    let address = data.async_context.address();
    let mut storage = data.storage()?;
    let old = storage.get_protected(address, &key);
    let status = match old {
        None if value.is_empty() => StorageStatus::Unchanged,
        Some(_) if value.is_empty() => {
            storage.delete_protected(address, &key);
            StorageStatus::Deleted
        }
        Some(old) if old == value => StorageStatus::Unchanged,
        Some(_) => {
            storage.set_protected(address, &key, value);
            StorageStatus::Modified
        }
        None => {
            storage.set_protected(address, &key, value);
            StorageStatus::Added
        }
    };
    Ok(status.into())
}

pub fn storage_load_length(ctx: Ctx, (key_offset, key_len): (MemPtr, MemLength)) -> HookResult<i32> {
    ctx.use_gas(storage_load_cost(length(key_len)?))?;
    let key = load_storage_key(ctx, key_offset, key_len)?;
    let data = ctx.data();
    let len = data.storage()?.get_protected(data.async_context.address(), &key).map_or(0, |v| v.len());
    Ok(len as i32)
}

/// Write the value of a storage entry to memory and return its length. A
/// missing entry reads as empty.
pub fn storage_load(
    ctx: Ctx,
    (key_offset, key_len, data_offset): (MemPtr, MemLength, MemPtr),
) -> HookResult<i32> {
    ctx.use_gas(storage_load_cost(length(key_len)?))?;
    let key = load_storage_key(ctx, key_offset, key_len)?;
    let value = {
        let data = ctx.data();
        let value = data.storage()?.get_protected(data.async_context.address(), &key);
        value.unwrap_or_default()
    };
    ctx.use_gas(copy_from_host_cost(value.len() as u32))?;
    ctx.mem_store(data_offset, &value)?;
    Ok(value.len() as i32)
}

pub fn sha256(ctx: Ctx, (offset, len, result_offset): (MemPtr, MemLength, MemPtr)) -> HookResult<i32> {
    ctx.use_gas(hash_sha2_256_cost(length(len)?))?;
    let data = ctx.mem_load(offset, len)?;
    let hash = sha2::Sha256::digest(&data);
    ctx.mem_store(result_offset, &hash)?;
    Ok(0)
}

pub fn keccak256(ctx: Ctx, (offset, len, result_offset): (MemPtr, MemLength, MemPtr)) -> HookResult<i32> {
    ctx.use_gas(hash_keccak_256_cost(length(len)?))?;
    let data = ctx.mem_load(offset, len)?;
    let hash = sha3::Keccak256::digest(&data);
    ctx.mem_store(result_offset, &hash)?;
    Ok(0)
}

type CreateAsyncCallArgs = (
    MemPtr,
    MemPtr,
    MemPtr,
    MemLength,
    MemPtr,
    MemLength,
    MemPtr,
    MemLength,
    i64,
    i64,
);

/// Register an async call in the default group. The gas for the call and for
/// its callback are taken from the caller.
pub fn create_async_call(
    ctx: Ctx,
    (
        destination_offset,
        value_offset,
        data_offset,
        data_len,
        success_offset,
        success_len,
        error_offset,
        error_len,
        gas,
        extra_gas_for_callback,
    ): CreateAsyncCallArgs,
) -> HookResult<i32> {
    let copied = ADDRESS_LENGTH as u32
        + VALUE_LENGTH as u32
        + length(data_len)?
        + length(success_len)?
        + length(error_len)?;
    ctx.use_gas(copy_to_host_cost(copied))?;
    let destination = ctx.mem_load(destination_offset, ADDRESS_LENGTH as MemLength)?;
    let value = ctx.mem_load(value_offset, VALUE_LENGTH as MemLength)?;
    let call_data = ctx.mem_load(data_offset, data_len)?;
    let success = load_name(ctx, success_offset, success_len)?;
    let error = load_name(ctx, error_offset, error_len)?;
    let gas = u64::try_from(gas).map_err(|_| anyhow!("Negative gas limit for async call."))?;
    let extra_gas = u64::try_from(extra_gas_for_callback)
        .map_err(|_| anyhow!("Negative gas for async callback."))?;
    let mut call = AsyncCall::new(destination, call_data, value, gas).with_callbacks(success, error);
    call.gas_locked = extra_gas;
    let (data, mut meter) = ctx.data_and_gas();
    data.async_context
        .register_async_call(&mut meter, &*data.blockchain, DEFAULT_ASYNC_GROUP_ID, call)
        .map_err(async_failure)?;
    Ok(0)
}

pub fn set_async_context_callback(
    ctx: Ctx,
    (name_offset, name_len, data_offset, data_len, gas): (MemPtr, MemLength, MemPtr, MemLength, i64),
) -> HookResult<i32> {
    ctx.use_gas(copy_to_host_cost(length(name_len)? + length(data_len)?))?;
    let name = load_name(ctx, name_offset, name_len)?;
    let callback_data = ctx.mem_load(data_offset, data_len)?;
    let callback_gas = u64::try_from(gas).map_err(|_| anyhow!("Negative gas for callback."))?;
    let (data, mut meter) = ctx.data_and_gas();
    data.async_context
        .set_context_callback(&mut meter, &name, callback_data, callback_gas)
        .map_err(async_failure)?;
    Ok(0)
}

/// Register the single call of the legacy group and stop execution. The call
/// gets all remaining gas.
pub fn async_call(
    ctx: Ctx,
    (destination_offset, value_offset, data_offset, data_len): (MemPtr, MemPtr, MemPtr, MemLength),
) -> HookResult<()> {
    let copied = ADDRESS_LENGTH as u32 + VALUE_LENGTH as u32 + length(data_len)?;
    ctx.use_gas(copy_to_host_cost(copied))?;
    let destination = ctx.mem_load(destination_offset, ADDRESS_LENGTH as MemLength)?;
    let value = ctx.mem_load(value_offset, VALUE_LENGTH as MemLength)?;
    let call_data = ctx.mem_load(data_offset, data_len)?;
    {
        let (data, mut meter) = ctx.data_and_gas();
        let has_callback = data.has_callback;
        data.async_context
            .register_legacy_async_call(
                &mut meter,
                &*data.blockchain,
                destination,
                call_data,
                value,
                has_callback,
            )
            .map_err(async_failure)?;
    }
    ctx.set_breakpoint_value(BreakpointValue::AsyncCall);
    Ok(())
}

/// The table of all hooks.
pub fn host_functions() -> Result<HostFunctions<RuntimeData>, RegistrationError> {
    let mut functions = HostFunctions::new();
    functions
        .register("getGasLeft", get_gas_left)?
        .register("signalError", signal_error)?
        .register("finish", finish)?
        .register("getNumArguments", get_num_arguments)?
        .register("getArgumentLength", get_argument_length)?
        .register("getArgument", get_argument)?
        .register("getCaller", get_caller)?
        .register("storageStore", storage_store)?
        .register("storageLoadLength", storage_load_length)?
        .register("storageLoad", storage_load)?
        .register("sha256", sha256)?
        .register("keccak256", keccak256)?
        .register("createAsyncCall", create_async_call)?
        .register("setAsyncContextCallback", set_async_context_callback)?
        .register("asyncCall", async_call)?;
    Ok(functions)
}
