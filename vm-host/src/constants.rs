/// Storage key prefix under which unfinished async contexts are kept. Keys
/// starting with it cannot be written by contracts.
pub const ASYNC_DATA_PREFIX: &[u8] = b"asyncCalls";

/// Entrypoint run when a contract is deployed.
pub const INIT_FUNCTION_NAME: &str = "init";

/// Entrypoint run when the code of a contract is replaced.
pub const UPGRADE_FUNCTION_NAME: &str = "upgrade";

/// Entrypoint receiving the outcome of legacy async calls.
pub const CALLBACK_FUNCTION_NAME: &str = "callBack";

/// Names that cannot be used as callbacks.
pub const RESERVED_FUNCTION_NAMES: [&str; 3] =
    [INIT_FUNCTION_NAME, UPGRADE_FUNCTION_NAME, CALLBACK_FUNCTION_NAME];

/// Group receiving the single call registered by the `asyncCall` hook.
pub const LEGACY_ASYNC_GROUP_ID: &str = "LegacyAsync";

/// Group receiving calls registered by `createAsyncCall`.
pub const DEFAULT_ASYNC_GROUP_ID: &str = "";

/// Length of contract and account addresses.
pub const ADDRESS_LENGTH: usize = 32;

/// Length of the big-endian encoding of transferred values.
pub const VALUE_LENGTH: usize = 32;

/// Length of call identifiers.
pub const CALL_ID_LENGTH: usize = 32;

/// Gas put aside for running the callback of an async call.
pub const ASYNC_CALLBACK_GAS_LOCK: u64 = 100_000;

/// Cost of registering an async call.
pub const ASYNC_CALL_STEP_COST: u64 = 100_000;

pub const GET_GAS_LEFT_COST: u64 = 100;

pub const GET_ARGUMENT_COST: u64 = 100;

pub const GET_CALLER_COST: u64 = 100;

/// Cost of copying the given amount of bytes from the host to the Wasm memory.
/// The 10 accounts for copying empty buffers.
#[inline(always)]
pub fn copy_from_host_cost(x: u32) -> u64 { 10 + u64::from(x) }

/// Cost of copying the given amount of bytes from the Wasm memory to the host.
#[inline(always)]
pub fn copy_to_host_cost(x: u32) -> u64 { 10 + u64::from(x) }

/// Cost of stopping execution with an error message of the given length.
#[inline(always)]
pub fn signal_error_cost(x: u32) -> u64 { 1000 + u64::from(x) }

/// Cost of appending return data of the given length.
#[inline(always)]
pub fn finish_cost(x: u32) -> u64 { 100 + u64::from(x) }

/// Cost of looking up a storage entry with a key of the given length.
#[inline(always)]
pub fn storage_load_cost(key_len: u32) -> u64 { 500 + u64::from(key_len) }

/// Cost of writing a storage entry. Stored data is charged per byte since it
/// is kept beyond the transaction.
#[inline(always)]
pub fn storage_store_cost(key_len: u32, data_len: u32) -> u64 {
    1000 + u64::from(key_len) + 10 * u64::from(data_len)
}

/// Cost of computing a SHA2-256 digest of the message of the given length.
pub fn hash_sha2_256_cost(data_len: u32) -> u64 { 500 + 7 * u64::from(data_len) }

/// Cost of computing a Keccak-256 digest of the message of the given length.
pub fn hash_keccak_256_cost(data_len: u32) -> u64 { 500 + 5 * u64::from(data_len) }
