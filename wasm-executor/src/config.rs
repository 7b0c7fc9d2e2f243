//! Configuration of executors and of the instances they create.
use crate::{
    constants::{DEFAULT_MAX_MEMORY_GROW, DEFAULT_MAX_MEMORY_GROW_DELTA, DEFAULT_UNMETERED_LOCALS},
    host::HostFunctions,
    opcodes::OpcodeCosts,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Options fixed at instance creation.
pub struct CompilationOptions {
    /// Gas available to the instance.
    pub gas_limit:             u64,
    /// Number of locals per function that are not charged for.
    pub unmetered_locals:      u32,
    /// Maximum number of pages memory may grow beyond its initial size. This
    /// bounds growth by sandboxed code as well as by host code. `memory.grow`
    /// past it returns `-1`; host growth past it hits the `MemoryLimit`
    /// breakpoint.
    pub max_memory_grow:       u32,
    /// Maximum number of pages host code may add in a single growth.
    pub max_memory_grow_delta: u32,
    /// Log every compiled operator together with its price.
    pub opcode_trace:          bool,
    /// Charge for executed instructions using the opcode cost table.
    pub metering:              bool,
    /// Stop execution as soon as a host function sets a breakpoint.
    pub runtime_breakpoints:   bool,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self {
            gas_limit:             u64::MAX,
            unmetered_locals:      DEFAULT_UNMETERED_LOCALS,
            max_memory_grow:       DEFAULT_MAX_MEMORY_GROW,
            max_memory_grow_delta: DEFAULT_MAX_MEMORY_GROW_DELTA,
            opcode_trace:          false,
            metering:              true,
            runtime_breakpoints:   true,
        }
    }
}

impl CompilationOptions {
    pub fn with_gas_limit(self, gas_limit: u64) -> Self {
        Self {
            gas_limit,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
/// Format requested for serialized compiled code.
pub enum SerializationFormat {
    Standard,
    Rkyv,
}

/// Process-wide configuration of an executor. It is handed to the executor on
/// construction and cannot be changed once the executor has created its first
/// instance.
pub struct VmConfiguration<H> {
    opcode_costs:         Option<Arc<OpcodeCosts>>,
    host_functions:       Arc<HostFunctions<H>>,
    serialization_format: SerializationFormat,
    signal_passthrough:   bool,
}

impl<H> Clone for VmConfiguration<H> {
    fn clone(&self) -> Self {
        Self {
            opcode_costs:         self.opcode_costs.clone(),
            host_functions:       Arc::clone(&self.host_functions),
            serialization_format: self.serialization_format,
            signal_passthrough:   self.signal_passthrough,
        }
    }
}

impl<H> VmConfiguration<H> {
    pub fn new(host_functions: HostFunctions<H>) -> Self {
        Self {
            opcode_costs:         None,
            host_functions:       Arc::new(host_functions),
            serialization_format: SerializationFormat::Standard,
            signal_passthrough:   false,
        }
    }

    pub fn with_opcode_costs(mut self, costs: OpcodeCosts) -> Self {
        self.opcode_costs = Some(Arc::new(costs));
        self
    }

    /// Record the requested format of compiled code. It is only reported back
    /// by [serialization_format](Self::serialization_format); the backend
    /// always produces its own format.
    pub fn with_serialization_format(mut self, format: SerializationFormat) -> Self {
        self.serialization_format = format;
        self
    }

    /// Record whether native signals raised inside compiled code should reach
    /// the process handlers. The flag is only reported back by
    /// [signal_passthrough](Self::signal_passthrough). The backend turns such
    /// signals into traps regardless.
    pub fn with_signal_passthrough(mut self, passthrough: bool) -> Self {
        self.signal_passthrough = passthrough;
        self
    }

    pub fn opcode_costs(&self) -> Option<&Arc<OpcodeCosts>> { self.opcode_costs.as_ref() }

    pub(crate) fn set_opcode_costs(&mut self, costs: OpcodeCosts) {
        self.opcode_costs = Some(Arc::new(costs));
    }

    pub fn host_functions(&self) -> &Arc<HostFunctions<H>> { &self.host_functions }

    pub fn serialization_format(&self) -> SerializationFormat { self.serialization_format }

    pub fn signal_passthrough(&self) -> bool { self.signal_passthrough }
}
