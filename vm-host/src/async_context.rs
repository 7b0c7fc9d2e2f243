//! The record of async calls made by one contract execution.
//!
//! Calls are registered into named groups while the contract runs. When the
//! contract returns, [AsyncContext::execute] runs every call that can complete
//! in this shard, resolves it and runs its callbacks, and forwards the rest to
//! other shards. A context with unresolved calls is persisted (see
//! [persistence](crate::persistence)) and picked up again when the outcome of
//! a remote call comes back.
use crate::{
    async_call::{AsyncCall, AsyncCallStatus, CallId, ExecutionMode, ReturnCode},
    async_call_group::{AsyncCallGroup, GroupCompletion},
    blockchain::BlockchainHook,
    call_data::CallData,
    constants::*,
    errors::AsyncError,
    ExecResult,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use sha2::{Digest, Sha256};
use wasm_executor::Gas;

const TARGET: &str = "vm/async";

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
/// How the running entrypoint was invoked.
pub enum CallType {
    #[default]
    DirectCall           = 0,
    AsynchronousCall     = 1,
    AsynchronousCallBack = 2,
}

/// Gas accounting of the caller registering async calls.
pub trait GasMeter {
    fn gas_left(&mut self) -> u64;

    /// Charge the amount if it is available. Otherwise nothing is charged.
    fn use_gas_bounded(&mut self, amount: u64) -> Result<(), AsyncError>;
}

impl GasMeter for Gas<'_> {
    fn gas_left(&mut self) -> u64 { Gas::gas_left(self) }

    fn use_gas_bounded(&mut self, amount: u64) -> Result<(), AsyncError> {
        if amount > Gas::gas_left(self) {
            return Err(AsyncError::NotEnoughGas);
        }
        self.use_gas(amount).map_err(|_| AsyncError::NotEnoughGas)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A fixed amount of gas, for work done after the contract returned.
pub struct GasBudget {
    limit: u64,
    used:  u64,
}

impl GasBudget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
        }
    }

    pub fn used(&self) -> u64 { self.used }

    pub fn remaining(&self) -> u64 { self.limit - self.used }
}

impl GasMeter for GasBudget {
    fn gas_left(&mut self) -> u64 { self.remaining() }

    fn use_gas_bounded(&mut self, amount: u64) -> Result<(), AsyncError> {
        if amount > self.remaining() {
            return Err(AsyncError::NotEnoughGas);
        }
        self.used += amount;
        Ok(())
    }
}

/// Runs async calls on behalf of [AsyncContext::execute].
pub trait AsyncCallDispatcher {
    /// Run a call that completes in this shard and report its outcome.
    fn execute_sync_call(&mut self, call: &AsyncCall) -> ExecResult<ReturnCode>;

    /// Run the part of a cross-shard builtin call that happens in this shard.
    fn execute_builtin_sync_half(&mut self, call: &AsyncCall) -> ExecResult<ReturnCode>;

    /// Hand the call over to the shard of its destination.
    fn send_cross_shard(&mut self, call: &AsyncCall) -> ExecResult<()>;

    /// Run a callback of the calling contract. The data is the closure of an
    /// async call, or the data of a group or context callback.
    fn run_callback(&mut self, name: &str, data: &[u8], return_code: ReturnCode) -> ExecResult<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// What resolving a call triggers.
pub struct Resolution {
    pub call_id:          CallId,
    pub return_code:      ReturnCode,
    /// Callback of the call for its outcome. Empty if there is none.
    pub callback:         String,
    pub closure:          Vec<u8>,
    /// Set if this was the last pending call of its group.
    pub group_completion: Option<GroupCompletion>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextCallback {
    pub name: String,
    pub data: Vec<u8>,
}

/// Checks applied to names of callbacks supplied by contracts.
pub fn validate_callback_name(name: &str) -> Result<(), AsyncError> {
    if name.is_empty() || RESERVED_FUNCTION_NAMES.contains(&name) {
        return Err(AsyncError::InvalidCallbackName(name.to_string()));
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AsyncContext {
    pub(crate) address:             Vec<u8>,
    pub(crate) call_id:             CallId,
    pub(crate) caller_address:      Vec<u8>,
    pub(crate) caller_call_id:      Option<CallId>,
    pub(crate) call_type:           CallType,
    pub(crate) return_data:         Vec<u8>,
    pub(crate) callback:            String,
    pub(crate) callback_data:       Vec<u8>,
    pub(crate) gas_accumulated:     u64,
    /// Calls registered and not yet resolved.
    pub(crate) calls_counter:       u64,
    /// All calls ever registered. Used to derive fresh call ids.
    pub(crate) total_calls_counter: u64,
    pub(crate) groups:              Vec<AsyncCallGroup>,
    /// The running entrypoint. Not persisted.
    pub(crate) function:            String,
}

impl AsyncContext {
    pub fn new(
        address: Vec<u8>,
        call_id: CallId,
        caller_address: Vec<u8>,
        caller_call_id: Option<CallId>,
        call_type: CallType,
    ) -> Self {
        Self {
            address,
            call_id,
            caller_address,
            caller_call_id,
            call_type,
            ..Self::default()
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    pub fn address(&self) -> &[u8] { &self.address }

    pub fn call_id(&self) -> &CallId { &self.call_id }

    pub fn caller_address(&self) -> &[u8] { &self.caller_address }

    pub fn caller_call_id(&self) -> Option<&CallId> { self.caller_call_id.as_ref() }

    pub fn call_type(&self) -> CallType { self.call_type }

    pub fn function(&self) -> &str { &self.function }

    pub fn return_data(&self) -> &[u8] { &self.return_data }

    pub fn set_return_data(&mut self, data: Vec<u8>) { self.return_data = data; }

    pub fn callback(&self) -> &str { &self.callback }

    pub fn callback_data(&self) -> &[u8] { &self.callback_data }

    pub fn gas_accumulated(&self) -> u64 { self.gas_accumulated }

    pub fn calls_counter(&self) -> u64 { self.calls_counter }

    pub fn total_calls_counter(&self) -> u64 { self.total_calls_counter }

    pub fn groups(&self) -> &[AsyncCallGroup] { &self.groups }

    pub fn get_call_group(&self, group_id: &str) -> Option<&AsyncCallGroup> {
        self.groups.iter().find(|g| g.identifier == group_id)
    }

    fn get_call_group_mut(&mut self, group_id: &str) -> Option<&mut AsyncCallGroup> {
        self.groups.iter_mut().find(|g| g.identifier == group_id)
    }

    pub fn has_pending_call_groups(&self) -> bool { !self.groups.is_empty() }

    /// No calls are outstanding and no groups are left.
    pub fn is_complete(&self) -> bool { self.calls_counter == 0 && self.groups.is_empty() }

    /// Whether any call of the group is still pending.
    pub fn has_waiting_calls(&self, group_id: &str) -> bool {
        self.get_call_group(group_id).map_or(false, AsyncCallGroup::has_pending_calls)
    }

    pub fn add_call_group(&mut self, group: AsyncCallGroup) -> Result<(), AsyncError> {
        if self.get_call_group(&group.identifier).is_some() {
            return Err(AsyncError::AsyncCallGroupExistsAlready);
        }
        self.groups.push(group);
        Ok(())
    }

    pub fn delete_call_group(&mut self, group_id: &str) -> Option<AsyncCallGroup> {
        let index = self.groups.iter().position(|g| g.identifier == group_id)?;
        let group = self.groups.remove(index);
        self.calls_counter = self.calls_counter.saturating_sub(group.pending_count() as u64);
        Some(group)
    }

    fn ensure_async_allowed(&self) -> Result<(), AsyncError> {
        if self.function == INIT_FUNCTION_NAME || self.function == UPGRADE_FUNCTION_NAME {
            return Err(AsyncError::AsyncNotAllowed);
        }
        Ok(())
    }

    /// A call id derived from this context's id and the number of calls
    /// registered so far.
    pub fn generate_new_call_id(&mut self) -> CallId {
        self.calls_counter += 1;
        self.total_calls_counter += 1;
        let mut hasher = Sha256::new();
        hasher.update(self.call_id);
        hasher.update(self.total_calls_counter.to_be_bytes());
        let mut id = [0u8; CALL_ID_LENGTH];
        id.copy_from_slice(&hasher.finalize());
        id
    }

    pub fn determine_execution_mode<B: BlockchainHook + ?Sized>(
        &self,
        blockchain: &B,
        destination: &[u8],
        data: &[u8],
    ) -> ExecutionMode {
        let Ok(parsed) = CallData::parse(data) else {
            return ExecutionMode::AsyncUnknown;
        };
        let same_shard = blockchain.in_same_shard(&self.address, destination);
        if blockchain.is_builtin_function(&parsed.function) {
            return if same_shard {
                ExecutionMode::AsyncBuiltinFuncIntraShard
            } else {
                ExecutionMode::AsyncBuiltinFuncCrossShard
            };
        }
        if same_shard && blockchain.has_code(destination) {
            ExecutionMode::SyncCall
        } else {
            ExecutionMode::AsyncUnknown
        }
    }

    /// Validate the callbacks of the call, lock gas for them, and add the
    /// call to the group.
    pub fn register_async_call<G: GasMeter + ?Sized, B: BlockchainHook + ?Sized>(
        &mut self,
        gas: &mut G,
        blockchain: &B,
        group_id: &str,
        mut call: AsyncCall,
    ) -> Result<CallId, AsyncError> {
        self.ensure_async_allowed()?;
        for name in [&call.success_callback, &call.error_callback] {
            if !name.is_empty() {
                validate_callback_name(name)?;
            }
        }
        if call.has_callback() {
            call.gas_locked = call.gas_locked.saturating_add(ASYNC_CALLBACK_GAS_LOCK);
        }
        gas.use_gas_bounded(ASYNC_CALL_STEP_COST)?;
        self.add_call(gas, blockchain, group_id, call)
    }

    /// Register the single call of the legacy group. All remaining gas that is
    /// not locked for the callback goes to the call.
    pub fn register_legacy_async_call<G: GasMeter + ?Sized, B: BlockchainHook + ?Sized>(
        &mut self,
        gas: &mut G,
        blockchain: &B,
        destination: Vec<u8>,
        data: Vec<u8>,
        value_bytes: Vec<u8>,
        has_callback: bool,
    ) -> Result<CallId, AsyncError> {
        if self.get_call_group(LEGACY_ASYNC_GROUP_ID).is_some() {
            return Err(AsyncError::OnlyOneLegacyAsyncCallAllowed);
        }
        if self.has_pending_call_groups() || self.call_type == CallType::AsynchronousCallBack {
            return Err(AsyncError::LegacyAsyncCallInvalid);
        }
        self.ensure_async_allowed()?;
        gas.use_gas_bounded(ASYNC_CALL_STEP_COST)?;
        let (callback, gas_locked) = if has_callback {
            (CALLBACK_FUNCTION_NAME, ASYNC_CALLBACK_GAS_LOCK)
        } else {
            ("", 0)
        };
        let gas_limit = gas.gas_left().saturating_sub(gas_locked);
        let mut call =
            AsyncCall::new(destination, data, value_bytes, gas_limit).with_callbacks(callback, callback);
        call.gas_locked = gas_locked;
        self.add_call(gas, blockchain, LEGACY_ASYNC_GROUP_ID, call)
    }

    /// Add the call to the group, creating the group if needed. The gas limit
    /// and locked gas of the call are taken from the caller.
    pub fn add_call<G: GasMeter + ?Sized, B: BlockchainHook + ?Sized>(
        &mut self,
        gas: &mut G,
        blockchain: &B,
        group_id: &str,
        mut call: AsyncCall,
    ) -> Result<CallId, AsyncError> {
        self.ensure_async_allowed()?;
        let required = call.gas_locked.checked_add(call.gas_limit).ok_or(AsyncError::NotEnoughGas)?;
        if required > gas.gas_left() {
            return Err(AsyncError::NotEnoughGas);
        }
        gas.use_gas_bounded(call.gas_locked)?;
        gas.use_gas_bounded(call.gas_limit)?;
        call.execution_mode = self.determine_execution_mode(blockchain, &call.destination, &call.data);
        call.status = AsyncCallStatus::Pending;
        call.call_id = self.generate_new_call_id();
        let call_id = call.call_id;
        log::trace!(
            target: TARGET,
            "Added async call to group {:?}: mode {}, gas limit {}, gas locked {}.",
            group_id,
            call.execution_mode,
            call.gas_limit,
            call.gas_locked
        );
        match self.get_call_group_mut(group_id) {
            Some(group) => group.add_call(call),
            None => {
                let mut group = AsyncCallGroup::new(group_id);
                group.add_call(call);
                self.groups.push(group);
            }
        }
        Ok(call_id)
    }

    /// Record the outcome of a call of the given group.
    pub fn resolve(
        &mut self,
        group_id: &str,
        call_id: &CallId,
        return_code: ReturnCode,
    ) -> Result<Resolution, AsyncError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.identifier == group_id)
            .ok_or(AsyncError::AsyncCallGroupDoesNotExist)?;
        let call = group.find_mut(call_id).ok_or(AsyncError::AsyncCallNotFound)?;
        if !call.is_pending() {
            return Err(AsyncError::AsyncCallAlreadyResolved);
        }
        call.update_status(return_code);
        let callback = call.callback_name().to_string();
        let closure = call.callback_closure.clone();
        let group_completion = group.complete_once();
        self.calls_counter = self.calls_counter.saturating_sub(1);
        log::trace!(target: TARGET, "Resolved async call of group {:?} with {}.", group_id, return_code);
        if let Some(completion) = &group_completion {
            log::debug!(target: TARGET, "Async call group {:?} completed.", completion.identifier);
        }
        Ok(Resolution {
            call_id: *call_id,
            return_code,
            callback,
            closure,
            group_completion,
        })
    }

    /// Record the outcome of a call reported back by another shard.
    pub fn resolve_by_call_id(
        &mut self,
        call_id: &CallId,
        return_code: ReturnCode,
    ) -> Result<Resolution, AsyncError> {
        let group_id = self
            .groups
            .iter()
            .find(|g| g.find(call_id).is_some())
            .map(|g| g.identifier.clone())
            .ok_or(AsyncError::CallBackFuncNotExpected)?;
        self.resolve(&group_id, call_id, return_code)
    }

    pub fn get_async_call_by_call_id(&self, call_id: &CallId) -> Result<&AsyncCall, AsyncError> {
        self.groups.iter().find_map(|g| g.find(call_id)).ok_or(AsyncError::AsyncCallNotFound)
    }

    /// Remove the call, and its group if no calls are left in it.
    pub fn delete_async_call_and_clean_group(
        &mut self,
        call_id: &CallId,
    ) -> Result<AsyncCall, AsyncError> {
        let index = self
            .groups
            .iter()
            .position(|g| g.find(call_id).is_some())
            .ok_or(AsyncError::AsyncCallNotFound)?;
        let group = &mut self.groups[index];
        let call = group.delete_call(call_id).ok_or(AsyncError::AsyncCallNotFound)?;
        let group_complete = group.is_complete();
        if call.is_pending() {
            self.calls_counter = self.calls_counter.saturating_sub(1);
        }
        if group_complete {
            self.groups.remove(index);
        }
        Ok(call)
    }

    /// Drop calls that are no longer pending and the groups left empty.
    pub fn close_completed_calls(&mut self) {
        for group in self.groups.iter_mut() {
            group.delete_completed_calls();
        }
        self.groups.retain(|g| {
            if g.is_complete() {
                log::trace!(target: TARGET, "Deleted async call group {:?}.", g.identifier);
            }
            !g.is_complete()
        });
    }

    /// Set the callback run once every group of the context has completed.
    pub fn set_context_callback<G: GasMeter + ?Sized>(
        &mut self,
        gas: &mut G,
        name: &str,
        data: Vec<u8>,
        callback_gas: u64,
    ) -> Result<(), AsyncError> {
        validate_callback_name(name)?;
        let gas_to_lock = ASYNC_CALLBACK_GAS_LOCK.saturating_add(callback_gas);
        gas.use_gas_bounded(gas_to_lock)?;
        self.gas_accumulated = gas_to_lock;
        self.callback = name.to_string();
        self.callback_data = data;
        Ok(())
    }

    /// Set the callback run once all calls of the group are resolved.
    pub fn set_group_callback<G: GasMeter + ?Sized>(
        &mut self,
        gas: &mut G,
        group_id: &str,
        name: &str,
        data: Vec<u8>,
        callback_gas: u64,
    ) -> Result<(), AsyncError> {
        let group = self.get_call_group(group_id).ok_or(AsyncError::AsyncCallGroupDoesNotExist)?;
        if !group.has_pending_calls() {
            return Err(AsyncError::AsyncCallGroupAlreadyComplete);
        }
        validate_callback_name(name)?;
        let gas_to_lock = ASYNC_CALLBACK_GAS_LOCK.saturating_add(callback_gas);
        gas.use_gas_bounded(gas_to_lock)?;
        if let Some(group) = self.get_call_group_mut(group_id) {
            group.callback = name.to_string();
            group.callback_data = data;
            group.gas_locked = gas_to_lock;
        }
        Ok(())
    }

    /// The context callback, once no groups are left. Returned only once.
    pub fn take_context_callback(&mut self) -> Option<ContextCallback> {
        if self.has_pending_call_groups() || self.callback.is_empty() {
            return None;
        }
        Some(ContextCallback {
            name: std::mem::take(&mut self.callback),
            data: std::mem::take(&mut self.callback_data),
        })
    }

    /// Pending calls matching the filter, with the identifier of their group.
    fn pending_calls(&self, filter: impl Fn(&AsyncCall) -> bool) -> Vec<(String, AsyncCall)> {
        let mut out = Vec::new();
        for group in self.groups.iter() {
            for call in group.calls.iter().filter(|c| c.is_pending()) {
                if filter(call) {
                    out.push((group.identifier.clone(), call.clone()));
                }
            }
        }
        out
    }

    fn finish_call<D: AsyncCallDispatcher + ?Sized>(
        &mut self,
        dispatcher: &mut D,
        group_id: &str,
        call_id: &CallId,
        return_code: ReturnCode,
    ) -> ExecResult<()> {
        let resolution = self.resolve(group_id, call_id, return_code)?;
        if !resolution.callback.is_empty() {
            dispatcher.run_callback(&resolution.callback, &resolution.closure, return_code)?;
        }
        if let Some(completion) = resolution.group_completion {
            if !completion.callback.is_empty() {
                dispatcher.run_callback(
                    &completion.callback,
                    &completion.callback_data,
                    ReturnCode::Ok,
                )?;
            }
        }
        Ok(())
    }

    /// Run the registered calls after the contract has returned. Local calls
    /// are executed and resolved together with their callbacks, cross-shard
    /// builtins run their local half, and all remaining pending calls are sent
    /// to other shards.
    pub fn execute<G: GasMeter + ?Sized, D: AsyncCallDispatcher + ?Sized>(
        &mut self,
        gas: &mut G,
        dispatcher: &mut D,
    ) -> ExecResult<()> {
        if !self.has_pending_call_groups() {
            log::trace!(target: TARGET, "No async calls.");
            return Ok(());
        }
        self.gas_accumulated = self.gas_accumulated.saturating_add(gas.gas_left());
        log::trace!(target: TARGET, "Executing async calls, gas accumulated {}.", self.gas_accumulated);

        for (group_id, call) in self.pending_calls(|c| c.execution_mode.is_local()) {
            let return_code = dispatcher.execute_sync_call(&call)?;
            self.finish_call(dispatcher, &group_id, &call.call_id, return_code)?;
        }

        for (group_id, call) in self.pending_calls(|_| true) {
            if call.execution_mode == ExecutionMode::AsyncBuiltinFuncCrossShard {
                let return_code = dispatcher.execute_builtin_sync_half(&call)?;
                if !return_code.is_ok() {
                    self.finish_call(dispatcher, &group_id, &call.call_id, return_code)?;
                    continue;
                }
            }
            dispatcher.send_cross_shard(&call)?;
        }

        self.delete_call_group(LEGACY_ASYNC_GROUP_ID);
        self.close_completed_calls();
        if let Some(callback) = self.take_context_callback() {
            dispatcher.run_callback(&callback.name, &callback.data, ReturnCode::Ok)?;
        }
        Ok(())
    }
}
