//! The boundary between sandboxed code and host functions.
//!
//! Host functions are registered in a [HostFunctions] table with a signature
//! that is derived from their Rust type, so a function taking `(i32, i64)` and
//! returning `i32` can only ever be imported with exactly that type. When
//! sandboxed code calls an import, the backend decodes the raw arguments,
//! calls the function with a [HostContext] and converts the result back.
use crate::{
    constants::DEFAULT_HOST_NAMESPACE,
    executor::{BreakpointValue, InstanceHandle},
    memory::{mem_load, mem_load_multiple, mem_store, MemLength, MemPtr, Memory, MemoryError},
};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Kinds of values that can cross the boundary.
pub enum ValueKind {
    I32,
    I64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawValue {
    I32(i32),
    I64(i64),
}

impl RawValue {
    pub fn kind(self) -> ValueKind {
        match self {
            RawValue::I32(_) => ValueKind::I32,
            RawValue::I64(_) => ValueKind::I64,
        }
    }
}

/// A primitive that can be passed to or returned from a host function.
pub trait HostValue: Copy + Send + 'static {
    const KIND: ValueKind;

    fn from_raw(raw: RawValue) -> Option<Self>;

    fn into_raw(self) -> RawValue;
}

impl HostValue for i32 {
    const KIND: ValueKind = ValueKind::I32;

    fn from_raw(raw: RawValue) -> Option<Self> {
        match raw {
            RawValue::I32(v) => Some(v),
            RawValue::I64(_) => None,
        }
    }

    fn into_raw(self) -> RawValue { RawValue::I32(self) }
}

impl HostValue for i64 {
    const KIND: ValueKind = ValueKind::I64;

    fn from_raw(raw: RawValue) -> Option<Self> {
        match raw {
            RawValue::I64(v) => Some(v),
            RawValue::I32(_) => None,
        }
    }

    fn into_raw(self) -> RawValue { RawValue::I64(self) }
}

/// Parameter lists of host functions. Implemented for tuples of
/// [HostValue]s.
pub trait HostParams: Sized {
    fn kinds() -> Vec<ValueKind>;

    /// Decode the arguments. Returns `None` if their number or kinds do not
    /// match.
    fn from_raw(args: &[RawValue]) -> Option<Self>;
}

macro_rules! impl_host_params {
    ($($t:ident),*) => {
        impl<$($t: HostValue),*> HostParams for ($($t,)*) {
            fn kinds() -> Vec<ValueKind> { vec![$($t::KIND),*] }

            #[allow(unused_mut, unused_variables)]
            fn from_raw(args: &[RawValue]) -> Option<Self> {
                let mut iter = args.iter();
                let out = ($($t::from_raw(*iter.next()?)?,)*);
                if iter.next().is_some() {
                    return None;
                }
                Some(out)
            }
        }
    };
}

impl_host_params!();
impl_host_params!(A);
impl_host_params!(A, B);
impl_host_params!(A, B, C);
impl_host_params!(A, B, C, D);
impl_host_params!(A, B, C, D, E);
impl_host_params!(A, B, C, D, E, F);
impl_host_params!(A, B, C, D, E, F, G);
impl_host_params!(A, B, C, D, E, F, G, I);
impl_host_params!(A, B, C, D, E, F, G, I, J);
impl_host_params!(A, B, C, D, E, F, G, I, J, K);
impl_host_params!(A, B, C, D, E, F, G, I, J, K, L);
impl_host_params!(A, B, C, D, E, F, G, I, J, K, L, M);

/// Results of host functions: nothing, or a single [HostValue].
pub trait HostResult {
    fn kind() -> Option<ValueKind>;

    fn into_raw(self) -> Option<RawValue>;
}

impl HostResult for () {
    fn kind() -> Option<ValueKind> { None }

    fn into_raw(self) -> Option<RawValue> { None }
}

impl HostResult for i32 {
    fn kind() -> Option<ValueKind> { Some(ValueKind::I32) }

    fn into_raw(self) -> Option<RawValue> { Some(RawValue::I32(self)) }
}

impl HostResult for i64 {
    fn kind() -> Option<ValueKind> { Some(ValueKind::I64) }

    fn into_raw(self) -> Option<RawValue> { Some(RawValue::I64(self)) }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Type of a host function as seen by sandboxed code.
pub struct Signature {
    pub params: Vec<ValueKind>,
    pub result: Option<ValueKind>,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Out of gas.")]
/// Marker for running out of gas inside a host function.
pub struct OutOfGas;

#[derive(Debug, Error)]
/// Failures of host functions. Any of these stops the sandboxed code.
pub enum HookError {
    #[error("{0}")]
    Memory(#[from] MemoryError),
    #[error("The instance does not declare a memory.")]
    MemoryDeclarationMissing,
    #[error("{0}")]
    OutOfGas(#[from] OutOfGas),
    #[error("Execution stopped at breakpoint {0:?}.")]
    Breakpoint(BreakpointValue),
    #[error("Arguments do not match the signature of host function {name}.")]
    ArgumentMismatch {
        name: String,
    },
    #[error("Host data is not available.")]
    HostDataUnavailable,
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type HookResult<A> = Result<A, HookError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Host function {0} is already registered.")]
    DuplicateName(String),
    #[error("Host functions must have a non-empty name.")]
    EmptyName,
}

/// Per-call state of the running instance that host functions may inspect
/// and change. Implemented by backends.
pub trait ExecutionContext {
    /// The memory of the instance, if it declares one.
    fn memory(&mut self) -> Option<&mut dyn Memory>;

    fn gas_limit(&self) -> u64;

    fn points_used(&mut self) -> u64;

    fn set_points_used(&mut self, points: u64);

    fn breakpoint_value(&self) -> BreakpointValue;

    fn set_breakpoint_value(&mut self, value: BreakpointValue);
}

/// What a host function gets to work with.
pub struct HostContext<'a, H> {
    handle:    InstanceHandle,
    execution: &'a mut dyn ExecutionContext,
    data:      &'a mut H,
}

impl<'a, H> HostContext<'a, H> {
    pub fn new(
        handle: InstanceHandle,
        execution: &'a mut dyn ExecutionContext,
        data: &'a mut H,
    ) -> Self {
        Self {
            handle,
            execution,
            data,
        }
    }

    pub fn handle(&self) -> InstanceHandle { self.handle }

    pub fn data(&self) -> &H { &*self.data }

    pub fn data_mut(&mut self) -> &mut H { &mut *self.data }

    pub fn memory(&mut self) -> HookResult<&mut dyn Memory> {
        self.execution.memory().ok_or(HookError::MemoryDeclarationMissing)
    }

    pub fn mem_load(&mut self, offset: MemPtr, length: MemLength) -> HookResult<Vec<u8>> {
        let memory = self.memory()?;
        Ok(mem_load(&*memory, offset, length)?)
    }

    pub fn mem_load_multiple(
        &mut self,
        offset: MemPtr,
        lengths: &[MemLength],
    ) -> HookResult<Vec<Vec<u8>>> {
        let memory = self.memory()?;
        Ok(mem_load_multiple(&*memory, offset, lengths)?)
    }

    pub fn mem_store(&mut self, offset: MemPtr, data: &[u8]) -> HookResult<()> {
        let memory = self.memory()?;
        Ok(mem_store(memory, offset, data)?)
    }

    /// Host data together with the gas counter, for host code that updates its
    /// data and charges gas in the same step.
    pub fn data_and_gas(&mut self) -> (&mut H, Gas<'_>) {
        (&mut *self.data, Gas {
            execution: &mut *self.execution,
        })
    }

    pub fn gas(&mut self) -> Gas<'_> {
        Gas {
            execution: &mut *self.execution,
        }
    }

    pub fn gas_limit(&self) -> u64 { self.execution.gas_limit() }

    pub fn gas_left(&mut self) -> u64 { self.gas().gas_left() }

    #[cfg_attr(not(feature = "fuzz-coverage"), inline)]
    pub fn use_gas(&mut self, amount: u64) -> HookResult<()> { self.gas().use_gas(amount) }

    pub fn points_used(&mut self) -> u64 { self.execution.points_used() }

    pub fn set_points_used(&mut self, points: u64) { self.execution.set_points_used(points) }

    pub fn breakpoint_value(&self) -> BreakpointValue { self.execution.breakpoint_value() }

    pub fn set_breakpoint_value(&mut self, value: BreakpointValue) {
        self.execution.set_breakpoint_value(value)
    }
}

/// The gas counter of the running instance.
pub struct Gas<'a> {
    execution: &'a mut dyn ExecutionContext,
}

impl<'a> Gas<'a> {
    pub fn gas_left(&mut self) -> u64 {
        self.execution.gas_limit().saturating_sub(self.execution.points_used())
    }

    /// Charge the given amount. If it is not available all remaining gas is
    /// consumed and the OutOfGas breakpoint is set.
    #[cfg_attr(not(feature = "fuzz-coverage"), inline)]
    pub fn use_gas(&mut self, amount: u64) -> HookResult<()> {
        let limit = self.execution.gas_limit();
        let used = self.execution.points_used().saturating_add(amount);
        if used > limit {
            self.execution.set_points_used(limit);
            self.execution.set_breakpoint_value(BreakpointValue::OutOfGas);
            return Err(OutOfGas.into());
        }
        self.execution.set_points_used(used);
        Ok(())
    }
}

type HostFn<H> =
    dyn Fn(&mut HostContext<'_, H>, &[RawValue]) -> HookResult<Option<RawValue>> + Send + Sync;

/// A registered host function.
pub struct HostFunction<H> {
    namespace: String,
    name:      String,
    signature: Signature,
    func:      Arc<HostFn<H>>,
}

impl<H> Clone for HostFunction<H> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name:      self.name.clone(),
            signature: self.signature.clone(),
            func:      Arc::clone(&self.func),
        }
    }
}

impl<H> HostFunction<H> {
    pub fn namespace(&self) -> &str { &self.namespace }

    pub fn name(&self) -> &str { &self.name }

    pub fn signature(&self) -> &Signature { &self.signature }

    pub fn invoke(
        &self,
        context: &mut HostContext<'_, H>,
        args: &[RawValue],
    ) -> HookResult<Option<RawValue>> {
        (self.func)(context, args)
    }
}

/// The table of host functions available to instances. Names are unique
/// across namespaces.
pub struct HostFunctions<H> {
    functions: Vec<HostFunction<H>>,
    by_name:   BTreeMap<String, usize>,
}

impl<H> Default for HostFunctions<H> {
    fn default() -> Self {
        Self {
            functions: Vec::new(),
            by_name:   BTreeMap::new(),
        }
    }
}

impl<H: 'static> HostFunctions<H> {
    pub fn new() -> Self { Self::default() }

    /// Register a function in the default namespace.
    pub fn register<P: HostParams + 'static, R: HostResult + 'static>(
        &mut self,
        name: &str,
        func: fn(&mut HostContext<'_, H>, P) -> HookResult<R>,
    ) -> Result<&mut Self, RegistrationError> {
        self.register_in(DEFAULT_HOST_NAMESPACE, name, func)
    }

    pub fn register_in<P: HostParams + 'static, R: HostResult + 'static>(
        &mut self,
        namespace: &str,
        name: &str,
        func: fn(&mut HostContext<'_, H>, P) -> HookResult<R>,
    ) -> Result<&mut Self, RegistrationError> {
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if self.by_name.contains_key(name) {
            return Err(RegistrationError::DuplicateName(name.to_string()));
        }
        let owned_name = name.to_string();
        let wrapped = move |context: &mut HostContext<'_, H>,
                            args: &[RawValue]|
              -> HookResult<Option<RawValue>> {
            let params = P::from_raw(args).ok_or_else(|| HookError::ArgumentMismatch {
                name: owned_name.clone(),
            })?;
            Ok(func(context, params)?.into_raw())
        };
        let func: Arc<HostFn<H>> = Arc::new(wrapped);
        self.by_name.insert(name.to_string(), self.functions.len());
        self.functions.push(HostFunction {
            namespace: namespace.to_string(),
            name: name.to_string(),
            signature: Signature {
                params: P::kinds(),
                result: R::kind(),
            },
            func,
        });
        Ok(self)
    }
}

impl<H> HostFunctions<H> {
    pub fn get(&self, name: &str) -> Option<&HostFunction<H>> {
        self.by_name.get(name).and_then(|&i| self.functions.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostFunction<H>> { self.functions.iter() }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.by_name.keys().map(String::as_str) }

    pub fn len(&self) -> usize { self.functions.len() }

    pub fn is_empty(&self) -> bool { self.functions.is_empty() }
}
