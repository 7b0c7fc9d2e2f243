//! Async contexts with unresolved calls are kept in the storage of the
//! calling contract, under [ASYNC_DATA_PREFIX] followed by the id of the
//! context, until the last remote call reports back.
//!
//! The encoding is big endian. Byte strings and names are prefixed by their
//! length as a `u32`, optional call ids by a `0`/`1` tag. A context is
//!
//! ```text
//! version (u8) | address | call id (32) | caller address | caller call id?
//! | call type (u8) | return data | callback | callback data
//! | gas accumulated (u64) | calls counter (u64) | total calls counter (u64)
//! | number of groups (u32) | groups
//! ```
//!
//! a group is
//!
//! ```text
//! identifier | callback | callback data | gas locked (u64) | fired (u8)
//! | number of calls (u32) | calls
//! ```
//!
//! and a call is
//!
//! ```text
//! call id (32) | status (u8) | execution mode (u8) | destination | data
//! | gas limit (u64) | gas locked (u64) | value | success callback
//! | error callback | callback closure
//! ```
use crate::{
    async_call::{AsyncCall, CallId, ReturnCode},
    async_call_group::AsyncCallGroup,
    async_context::{AsyncContext, ContextCallback, Resolution},
    blockchain::StorageHook,
    constants::{ASYNC_DATA_PREFIX, CALL_ID_LENGTH},
    errors::{AsyncError, LoadError, LoadResult, StoreResult},
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

const TARGET: &str = "vm/async";

/// Version of the encoding.
const CONTEXT_VERSION: u8 = 1;

/// Key of the context with the given id.
pub fn storage_key(call_id: &CallId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ASYNC_DATA_PREFIX.len() + CALL_ID_LENGTH);
    key.extend_from_slice(ASYNC_DATA_PREFIX);
    key.extend_from_slice(call_id);
    key
}

fn store_bytes(sink: &mut impl Write, bytes: &[u8]) -> StoreResult<()> {
    sink.write_u32::<BigEndian>(bytes.len() as u32)?;
    sink.write_all(bytes)?;
    Ok(())
}

fn store_flag(sink: &mut impl Write, flag: bool) -> StoreResult<()> {
    sink.write_u8(u8::from(flag))?;
    Ok(())
}

fn load_bytes(source: &mut impl Read) -> LoadResult<Vec<u8>> {
    let len = source.read_u32::<BigEndian>()?;
    let mut out = Vec::new();
    source.by_ref().take(u64::from(len)).read_to_end(&mut out)?;
    if out.len() != len as usize {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(out)
}

fn load_string(source: &mut impl Read) -> LoadResult<String> {
    String::from_utf8(load_bytes(source)?).map_err(|_| LoadError::InvalidUtf8)
}

fn load_call_id(source: &mut impl Read) -> LoadResult<CallId> {
    let mut id = [0u8; CALL_ID_LENGTH];
    source.read_exact(&mut id)?;
    Ok(id)
}

fn load_flag(source: &mut impl Read) -> LoadResult<bool> {
    match source.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        tag => Err(LoadError::IncorrectTag {
            tag,
        }),
    }
}

fn load_tag<T: TryFrom<u8>>(source: &mut impl Read) -> LoadResult<T> {
    let tag = source.read_u8()?;
    T::try_from(tag).map_err(|_| LoadError::IncorrectTag {
        tag,
    })
}

impl AsyncCall {
    pub fn store(&self, sink: &mut impl Write) -> StoreResult<()> {
        sink.write_all(&self.call_id)?;
        sink.write_u8(self.status.into())?;
        sink.write_u8(self.execution_mode.into())?;
        store_bytes(sink, &self.destination)?;
        store_bytes(sink, &self.data)?;
        sink.write_u64::<BigEndian>(self.gas_limit)?;
        sink.write_u64::<BigEndian>(self.gas_locked)?;
        store_bytes(sink, &self.value_bytes)?;
        store_bytes(sink, self.success_callback.as_bytes())?;
        store_bytes(sink, self.error_callback.as_bytes())?;
        store_bytes(sink, &self.callback_closure)
    }

    pub fn load(source: &mut impl Read) -> LoadResult<Self> {
        Ok(Self {
            call_id:          load_call_id(source)?,
            status:           load_tag(source)?,
            execution_mode:   load_tag(source)?,
            destination:      load_bytes(source)?,
            data:             load_bytes(source)?,
            gas_limit:        source.read_u64::<BigEndian>()?,
            gas_locked:       source.read_u64::<BigEndian>()?,
            value_bytes:      load_bytes(source)?,
            success_callback: load_string(source)?,
            error_callback:   load_string(source)?,
            callback_closure: load_bytes(source)?,
        })
    }
}

impl AsyncCallGroup {
    pub fn store(&self, sink: &mut impl Write) -> StoreResult<()> {
        store_bytes(sink, self.identifier.as_bytes())?;
        store_bytes(sink, self.callback.as_bytes())?;
        store_bytes(sink, &self.callback_data)?;
        sink.write_u64::<BigEndian>(self.gas_locked)?;
        store_flag(sink, self.callback_fired())?;
        sink.write_u32::<BigEndian>(self.calls.len() as u32)?;
        for call in self.calls.iter() {
            call.store(sink)?;
        }
        Ok(())
    }

    pub fn load(source: &mut impl Read) -> LoadResult<Self> {
        let identifier = load_string(source)?;
        let callback = load_string(source)?;
        let callback_data = load_bytes(source)?;
        let gas_locked = source.read_u64::<BigEndian>()?;
        let callback_fired = load_flag(source)?;
        let num_calls = source.read_u32::<BigEndian>()?;
        let mut calls = Vec::new();
        for _ in 0..num_calls {
            calls.push(AsyncCall::load(source)?);
        }
        Ok(Self::from_parts(identifier, callback, callback_data, gas_locked, callback_fired, calls))
    }
}

impl AsyncContext {
    pub fn store(&self, sink: &mut impl Write) -> StoreResult<()> {
        sink.write_u8(CONTEXT_VERSION)?;
        store_bytes(sink, &self.address)?;
        sink.write_all(&self.call_id)?;
        store_bytes(sink, &self.caller_address)?;
        match &self.caller_call_id {
            Some(id) => {
                store_flag(sink, true)?;
                sink.write_all(id)?;
            }
            None => store_flag(sink, false)?,
        }
        sink.write_u8(self.call_type.into())?;
        store_bytes(sink, &self.return_data)?;
        store_bytes(sink, self.callback.as_bytes())?;
        store_bytes(sink, &self.callback_data)?;
        sink.write_u64::<BigEndian>(self.gas_accumulated)?;
        sink.write_u64::<BigEndian>(self.calls_counter)?;
        sink.write_u64::<BigEndian>(self.total_calls_counter)?;
        sink.write_u32::<BigEndian>(self.groups.len() as u32)?;
        for group in self.groups.iter() {
            group.store(sink)?;
        }
        Ok(())
    }

    pub fn load(source: &mut impl Read) -> LoadResult<Self> {
        let version = source.read_u8()?;
        if version != CONTEXT_VERSION {
            return Err(LoadError::IncorrectTag {
                tag: version,
            });
        }
        let address = load_bytes(source)?;
        let call_id = load_call_id(source)?;
        let caller_address = load_bytes(source)?;
        let caller_call_id = if load_flag(source)? {
            Some(load_call_id(source)?)
        } else {
            None
        };
        let call_type = load_tag(source)?;
        let return_data = load_bytes(source)?;
        let callback = load_string(source)?;
        let callback_data = load_bytes(source)?;
        let gas_accumulated = source.read_u64::<BigEndian>()?;
        let calls_counter = source.read_u64::<BigEndian>()?;
        let total_calls_counter = source.read_u64::<BigEndian>()?;
        let num_groups = source.read_u32::<BigEndian>()?;
        let mut groups = Vec::new();
        for _ in 0..num_groups {
            groups.push(AsyncCallGroup::load(source)?);
        }
        Ok(Self {
            address,
            call_id,
            caller_address,
            caller_call_id,
            call_type,
            return_data,
            callback,
            callback_data,
            gas_accumulated,
            calls_counter,
            total_calls_counter,
            groups,
            function: String::new(),
        })
    }

    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        let mut out = Vec::new();
        self.store(&mut out)?;
        Ok(out)
    }

    /// Decode a complete encoding. Fails if anything is left over.
    pub fn from_bytes(bytes: &[u8]) -> LoadResult<Self> {
        let mut source = Cursor::new(bytes);
        let context = Self::load(&mut source)?;
        if source.position() != bytes.len() as u64 {
            return Err(LoadError::TrailingBytes);
        }
        Ok(context)
    }

    /// Write the context to the storage of its contract.
    pub fn save<S: StorageHook + ?Sized>(&self, storage: &mut S) -> Result<(), AsyncError> {
        let data = self.to_bytes()?;
        log::debug!(
            target: TARGET,
            "Saving async context with {} groups ({} bytes).",
            self.groups.len(),
            data.len()
        );
        storage.set_protected(&self.address, &storage_key(&self.call_id), data);
        Ok(())
    }

    /// Read the context with the given id from the storage of the contract.
    pub fn load_from_storage<S: StorageHook + ?Sized>(
        storage: &S,
        address: &[u8],
        call_id: &CallId,
    ) -> Result<Self, AsyncError> {
        let data = storage
            .get_protected(address, &storage_key(call_id))
            .filter(|data| !data.is_empty())
            .ok_or(AsyncError::NoStoredAsyncContextFound)?;
        Ok(Self::from_bytes(&data)?)
    }

    pub fn delete<S: StorageHook + ?Sized>(&self, storage: &mut S) -> bool {
        delete_from_call_id(storage, &self.address, &self.call_id)
    }
}

/// Remove a persisted context. Returns whether there was one.
pub fn delete_from_call_id<S: StorageHook + ?Sized>(
    storage: &mut S,
    address: &[u8],
    call_id: &CallId,
) -> bool {
    log::debug!(target: TARGET, "Deleting async context.");
    storage.delete_protected(address, &storage_key(call_id))
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// What an outcome reported by another shard triggered.
pub struct CallbackNotification {
    pub resolution:       Resolution,
    /// Set if the context has no groups left and a context callback.
    pub context_callback: Option<ContextCallback>,
    /// Whether the persisted context was deleted.
    pub complete:         bool,
}

/// Apply the outcome of a remote call to the persisted context of the
/// contract that made it. The context is saved again, or deleted once
/// complete.
pub fn process_callback_notification<S: StorageHook + ?Sized>(
    storage: &mut S,
    address: &[u8],
    context_call_id: &CallId,
    call_id: &CallId,
    return_code: ReturnCode,
) -> Result<CallbackNotification, AsyncError> {
    let mut context = AsyncContext::load_from_storage(storage, address, context_call_id)?;
    let resolution = context.resolve_by_call_id(call_id, return_code)?;
    context.close_completed_calls();
    let context_callback = context.take_context_callback();
    let complete = context.is_complete();
    if complete {
        context.delete(storage);
    } else {
        context.save(storage)?;
    }
    Ok(CallbackNotification {
        resolution,
        context_callback,
        complete,
    })
}
