use thiserror::Error;
use wasm_executor::ExecutorError;

#[derive(Debug, Error)]
/// An error that may occur when encoding an async context.
pub enum WriteError {
    #[error("{0}")]
    IOError(#[from] std::io::Error),
}

/// Result of encoding an async context.
pub type StoreResult<A> = Result<A, WriteError>;

#[derive(Debug, Error)]
/// An error that may occur when decoding a persisted async context.
pub enum LoadError {
    #[error("{0}")]
    IOError(#[from] std::io::Error),
    #[error("Incorrect tag")]
    IncorrectTag {
        // The tag that was provided.
        tag: u8,
    },
    #[error("Unexpected data after the end of the async context.")]
    TrailingBytes,
    #[error("Invalid UTF-8 in a function name.")]
    InvalidUtf8,
}

/// Result of loading a persisted async context.
pub type LoadResult<A> = Result<A, LoadError>;

#[derive(Debug, Error)]
/// Violations of the async call protocol.
pub enum AsyncError {
    #[error("Async call group already exists.")]
    AsyncCallGroupExistsAlready,
    #[error("Async call group does not exist.")]
    AsyncCallGroupDoesNotExist,
    #[error("Async call group has no pending calls.")]
    AsyncCallGroupAlreadyComplete,
    #[error("Async call not found.")]
    AsyncCallNotFound,
    #[error("Async call is already resolved.")]
    AsyncCallAlreadyResolved,
    #[error("Callback function was not expected.")]
    CallBackFuncNotExpected,
    #[error("Async calls are not allowed in init and upgrade.")]
    AsyncNotAllowed,
    #[error("Invalid callback name {0:?}.")]
    InvalidCallbackName(String),
    #[error("Legacy async calls are only allowed as the single async call of a direct call.")]
    LegacyAsyncCallInvalid,
    #[error("Only one legacy async call is allowed.")]
    OnlyOneLegacyAsyncCallAllowed,
    #[error("No stored async context found.")]
    NoStoredAsyncContextFound,
    #[error("Not enough gas.")]
    NotEnoughGas,
    #[error("Cannot load async context: {0}")]
    Load(#[from] LoadError),
    #[error("Cannot store async context: {0}")]
    Store(#[from] WriteError),
}

#[derive(Debug, Error)]
/// Reasons a contract call cannot run.
pub enum RuntimeError {
    #[error("Callback function called directly.")]
    CallBackFuncCalledInRun,
    #[error("Init and upgrade cannot be called in a run.")]
    InitFuncCalledInRun,
    #[error("{0}")]
    Executor(#[from] ExecutorError),
}
