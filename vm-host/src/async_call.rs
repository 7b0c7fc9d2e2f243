//! Outstanding calls from one contract to another.
use derive_more::Display;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Identifies a call across transactions and shards.
pub type CallId = [u8; 32];

#[repr(u64)]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
/// Outcome of executing a contract call, as reported to callers and
/// callbacks.
pub enum ReturnCode {
    Ok                     = 0,
    FunctionNotFound       = 1,
    FunctionWrongSignature = 2,
    ContractNotFound       = 3,
    UserError              = 4,
    OutOfGas               = 5,
    AccountCollision       = 6,
    OutOfFunds             = 7,
    CallStackOverFlow      = 8,
    ContractInvalid        = 9,
    ExecutionFailed        = 10,
    UpgradeFailed          = 11,
    SimulateFailed         = 12,
}

impl ReturnCode {
    pub fn is_ok(self) -> bool { self == ReturnCode::Ok }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
pub enum AsyncCallStatus {
    Pending  = 0,
    Resolved = 1,
    Rejected = 2,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
/// Where and how an async call gets executed.
pub enum ExecutionMode {
    /// The destination is a contract in the same shard; the call runs to
    /// completion locally.
    SyncCall                   = 0,
    /// A builtin function whose destination is in the same shard.
    AsyncBuiltinFuncIntraShard = 1,
    /// A builtin function with a destination in another shard. Runs in two
    /// halves, the first one locally.
    AsyncBuiltinFuncCrossShard = 2,
    /// Anything else. Sent to the destination's shard.
    AsyncUnknown               = 3,
}

impl ExecutionMode {
    /// Whether calls in this mode complete within the current transaction.
    pub fn is_local(self) -> bool {
        matches!(self, ExecutionMode::SyncCall | ExecutionMode::AsyncBuiltinFuncIntraShard)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsyncCall {
    /// Assigned when the call is registered.
    pub call_id:          CallId,
    pub status:           AsyncCallStatus,
    pub execution_mode:   ExecutionMode,
    pub destination:      Vec<u8>,
    pub data:             Vec<u8>,
    pub gas_limit:        u64,
    /// Gas kept aside for running the callback.
    pub gas_locked:       u64,
    pub value_bytes:      Vec<u8>,
    pub success_callback: String,
    pub error_callback:   String,
    /// Opaque data handed to the callback.
    pub callback_closure: Vec<u8>,
}

impl AsyncCall {
    /// A pending call without callbacks.
    pub fn new(destination: Vec<u8>, data: Vec<u8>, value_bytes: Vec<u8>, gas_limit: u64) -> Self {
        Self {
            call_id: [0u8; 32],
            status: AsyncCallStatus::Pending,
            execution_mode: ExecutionMode::AsyncUnknown,
            destination,
            data,
            gas_limit,
            gas_locked: 0,
            value_bytes,
            success_callback: String::new(),
            error_callback: String::new(),
            callback_closure: Vec::new(),
        }
    }

    pub fn with_callbacks(mut self, success: impl Into<String>, error: impl Into<String>) -> Self {
        self.success_callback = success.into();
        self.error_callback = error.into();
        self
    }

    pub fn with_callback_closure(mut self, closure: Vec<u8>) -> Self {
        self.callback_closure = closure;
        self
    }

    pub fn is_pending(&self) -> bool { self.status == AsyncCallStatus::Pending }

    pub fn has_callback(&self) -> bool {
        !self.success_callback.is_empty() || !self.error_callback.is_empty()
    }

    pub fn update_status(&mut self, return_code: ReturnCode) {
        self.status = if return_code.is_ok() {
            AsyncCallStatus::Resolved
        } else {
            AsyncCallStatus::Rejected
        };
    }

    /// The callback to run for the current status. Empty if there is none or
    /// the call is still pending.
    pub fn callback_name(&self) -> &str {
        match self.status {
            AsyncCallStatus::Pending => "",
            AsyncCallStatus::Resolved => &self.success_callback,
            AsyncCallStatus::Rejected => &self.error_callback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_selects_callback() {
        let mut call = AsyncCall::new(vec![1], b"f".to_vec(), Vec::new(), 10)
            .with_callbacks("onSuccess", "onError");
        assert!(call.is_pending());
        assert_eq!(call.callback_name(), "");
        call.update_status(ReturnCode::Ok);
        assert_eq!(call.status, AsyncCallStatus::Resolved);
        assert_eq!(call.callback_name(), "onSuccess");
        call.update_status(ReturnCode::UserError);
        assert_eq!(call.status, AsyncCallStatus::Rejected);
        assert_eq!(call.callback_name(), "onError");
    }

    #[test]
    fn tags_are_stable() {
        assert_eq!(u64::from(ReturnCode::OutOfGas), 5);
        assert_eq!(ReturnCode::try_from(10u64).ok(), Some(ReturnCode::ExecutionFailed));
        assert!(ReturnCode::try_from(13u64).is_err());
        assert_eq!(u8::from(ExecutionMode::AsyncUnknown), 3);
        assert!(AsyncCallStatus::try_from(3u8).is_err());
    }
}
