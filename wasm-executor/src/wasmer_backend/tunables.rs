//! Memory limits enforced by wasmer itself. Sandboxed code growing its memory
//! with `memory.grow` gets `-1` once the limit is reached.
use crate::config::CompilationOptions;
use std::ptr::NonNull;
use wasmer::{
    sys::{BaseTunables, NativeEngineExt, VMConfig},
    vm::{
        MemoryError, MemoryStyle, TableStyle, VMMemory, VMMemoryDefinition, VMTable,
        VMTableDefinition,
    },
    Engine, MemoryType, Pages, TableType, Tunables, WASM_MAX_PAGES,
};
use wasmer_compiler_cranelift::Cranelift;

/// Tunables capping the maximum of every memory at its initial size plus
/// `max_grow` pages.
pub(super) struct LimitingTunables<T> {
    base:     T,
    max_grow: u32,
}

impl<T: Tunables> LimitingTunables<T> {
    pub(super) fn new(base: T, max_grow: u32) -> Self {
        Self {
            base,
            max_grow,
        }
    }

    /// The memory type actually created for a declared one. A declared maximum
    /// below the cap is kept.
    fn limit(&self, declared: &MemoryType) -> MemoryType {
        let cap = declared.minimum.0.saturating_add(self.max_grow).min(WASM_MAX_PAGES);
        let maximum = declared.maximum.map_or(cap, |maximum| maximum.0.min(cap));
        MemoryType {
            maximum: Some(Pages(maximum)),
            ..*declared
        }
    }
}

impl<T: Tunables> Tunables for LimitingTunables<T> {
    fn memory_style(&self, memory: &MemoryType) -> MemoryStyle {
        self.base.memory_style(&self.limit(memory))
    }

    fn table_style(&self, table: &TableType) -> TableStyle { self.base.table_style(table) }

    fn create_host_memory(
        &self,
        ty: &MemoryType,
        style: &MemoryStyle,
    ) -> Result<VMMemory, MemoryError> {
        self.base.create_host_memory(&self.limit(ty), style)
    }

    unsafe fn create_vm_memory(
        &self,
        ty: &MemoryType,
        style: &MemoryStyle,
        vm_definition_location: NonNull<VMMemoryDefinition>,
    ) -> Result<VMMemory, MemoryError> {
        self.base.create_vm_memory(&self.limit(ty), style, vm_definition_location)
    }

    fn create_host_table(&self, ty: &TableType, style: &TableStyle) -> Result<VMTable, String> {
        self.base.create_host_table(ty, style)
    }

    unsafe fn create_vm_table(
        &self,
        ty: &TableType,
        style: &TableStyle,
        vm_definition_location: NonNull<VMTableDefinition>,
    ) -> Result<VMTable, String> {
        self.base.create_vm_table(ty, style, vm_definition_location)
    }

    fn vmconfig(&self) -> &VMConfig { self.base.vmconfig() }
}

/// An engine compiling with `compiler` whose memories obey the growth limit of
/// `options`. Engines are cheap to clone and share their tunables, so an
/// instance recreated from a clone keeps the same limit.
pub(super) fn limited_engine(compiler: Cranelift, options: &CompilationOptions) -> Engine {
    let mut engine: Engine = compiler.into();
    let base = BaseTunables::for_target(engine.target());
    engine.set_tunables(LimitingTunables::new(base, options.max_memory_grow));
    engine
}
