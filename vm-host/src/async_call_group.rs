use crate::async_call::{AsyncCall, CallId};

/// Async calls sharing one completion callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsyncCallGroup {
    pub identifier:    String,
    pub callback:      String,
    pub callback_data: Vec<u8>,
    pub gas_locked:    u64,
    callback_fired:    bool,
    pub calls:         Vec<AsyncCall>,
}

/// A group whose last pending call was just resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupCompletion {
    pub identifier:    String,
    pub callback:      String,
    pub callback_data: Vec<u8>,
    pub gas_locked:    u64,
}

impl AsyncCallGroup {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier:     identifier.into(),
            callback:       String::new(),
            callback_data:  Vec::new(),
            gas_locked:     0,
            callback_fired: false,
            calls:          Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        identifier: String,
        callback: String,
        callback_data: Vec<u8>,
        gas_locked: u64,
        callback_fired: bool,
        calls: Vec<AsyncCall>,
    ) -> Self {
        Self {
            identifier,
            callback,
            callback_data,
            gas_locked,
            callback_fired,
            calls,
        }
    }

    pub fn with_callback(mut self, callback: impl Into<String>, data: Vec<u8>) -> Self {
        self.callback = callback.into();
        self.callback_data = data;
        self
    }

    pub fn add_call(&mut self, call: AsyncCall) { self.calls.push(call); }

    pub fn callback_fired(&self) -> bool { self.callback_fired }

    pub fn pending_count(&self) -> usize { self.calls.iter().filter(|c| c.is_pending()).count() }

    pub fn has_pending_calls(&self) -> bool { self.calls.iter().any(AsyncCall::is_pending) }

    /// A group is complete once all its calls have been removed.
    pub fn is_complete(&self) -> bool { self.calls.is_empty() }

    pub fn find(&self, call_id: &CallId) -> Option<&AsyncCall> {
        self.calls.iter().find(|c| &c.call_id == call_id)
    }

    pub fn find_mut(&mut self, call_id: &CallId) -> Option<&mut AsyncCall> {
        self.calls.iter_mut().find(|c| &c.call_id == call_id)
    }

    pub fn delete_call(&mut self, call_id: &CallId) -> Option<AsyncCall> {
        let index = self.calls.iter().position(|c| &c.call_id == call_id)?;
        Some(self.calls.remove(index))
    }

    /// Remove all calls that are no longer pending.
    pub fn delete_completed_calls(&mut self) { self.calls.retain(AsyncCall::is_pending) }

    /// Mark the group callback as fired if no calls are pending anymore.
    /// Returns the completion the first time only.
    pub(crate) fn complete_once(&mut self) -> Option<GroupCompletion> {
        if self.callback_fired || self.has_pending_calls() {
            return None;
        }
        self.callback_fired = true;
        Some(GroupCompletion {
            identifier:    self.identifier.clone(),
            callback:      self.callback.clone(),
            callback_data: self.callback_data.clone(),
            gas_locked:    self.gas_locked,
        })
    }
}
