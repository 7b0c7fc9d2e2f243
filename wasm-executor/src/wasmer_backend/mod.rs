//! An [Executor] backed by wasmer with the Cranelift compiler. Instructions
//! are metered by the wasmer metering middleware using the configured opcode
//! cost table.
mod instance;
mod operators;
mod tunables;

pub use instance::WasmerInstance;

use crate::{
    config::{CompilationOptions, VmConfiguration},
    constants::{CACHE_MAGIC, CACHE_VERSION, WASM_HEADER},
    executor::{Executor, ExecutorError, ExecutorResult},
    opcodes::OpcodeCosts,
};
use byteorder::{BigEndian, ReadBytesExt};
use std::{
    collections::BTreeSet,
    io::Read,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use wasmer::{wasmparser::Operator, CompilerConfig, Module, Store};
use wasmer_compiler_cranelift::Cranelift;
use wasmer_middlewares::Metering;

/// Length of the header that [WasmerInstance::cache](crate::executor::Instance::cache)
/// puts in front of the serialized module.
const CACHE_HEADER_LEN: usize = CACHE_MAGIC.len() + 1 + 1 + 8;

pub struct WasmerExecutor<H> {
    config: VmConfiguration<H>,
    frozen: AtomicBool,
}

impl<H: Send + 'static> WasmerExecutor<H> {
    pub fn new(config: VmConfiguration<H>) -> Self {
        Self {
            config,
            frozen: AtomicBool::new(false),
        }
    }

    pub fn configuration(&self) -> &VmConfiguration<H> { &self.config }

    fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::SeqCst) {
            log::debug!(
                target: "executor/wasmer",
                "Configuration frozen with {} host functions.",
                self.config.host_functions().len()
            );
        }
    }

    fn costs(&self) -> ExecutorResult<Arc<OpcodeCosts>> {
        self.config.opcode_costs().cloned().ok_or(ExecutorError::MissingOpcodeCosts)
    }

    /// A store whose compiler injects metering if the options ask for it and
    /// whose memories obey the growth limit of the options. Every module gets
    /// its own store since the metering middleware can only be used for a
    /// single module.
    fn compiling_store(&self, options: &CompilationOptions) -> ExecutorResult<Store> {
        let mut compiler = Cranelift::default();
        if options.metering {
            let costs = self.costs()?;
            let trace = options.opcode_trace;
            let cost_function = move |operator: &Operator| -> u64 {
                let cost = operators::operator_cost(&costs, operator);
                if trace {
                    log::trace!(target: "executor/opcodes", "{:?} costs {}", operator, cost);
                }
                u64::from(cost)
            };
            compiler.push_middleware(Arc::new(Metering::new(options.gas_limit, cost_function)));
        }
        Ok(Store::new(tunables::limited_engine(compiler, options)))
    }
}

impl<H: Send + 'static> Executor<H> for WasmerExecutor<H> {
    type Instance = WasmerInstance<H>;

    fn set_opcode_costs(&mut self, costs: OpcodeCosts) -> ExecutorResult<()> {
        if *self.frozen.get_mut() {
            return Err(ExecutorError::ConfigurationFrozen);
        }
        self.config.set_opcode_costs(costs);
        Ok(())
    }

    fn function_names(&self) -> BTreeSet<String> {
        self.config.host_functions().names().map(String::from).collect()
    }

    fn new_instance_with_options(
        &self,
        bytecode: &[u8],
        options: &CompilationOptions,
        host_data: H,
    ) -> ExecutorResult<WasmerInstance<H>> {
        if !bytecode.starts_with(&WASM_HEADER) {
            return Err(ExecutorError::InvalidBytecode);
        }
        self.freeze();
        let store = self.compiling_store(options)?;
        let module = Module::new(&store, bytecode)
            .map_err(|e| ExecutorError::FailedInstantiation(e.to_string()))?;
        let locals_cost = if options.metering {
            operators::locals_cost(bytecode, options.unmetered_locals, &*self.costs()?)
                .map_err(|e| ExecutorError::FailedInstantiation(e.to_string()))?
        } else {
            0
        };
        log::debug!(
            target: "executor/wasmer",
            "Compiled module of {} bytes, locals cost {}.",
            bytecode.len(),
            locals_cost
        );
        WasmerInstance::instantiate(
            store,
            module,
            Arc::clone(self.config.host_functions()),
            options.clone(),
            locals_cost,
            host_data,
        )
    }

    fn new_instance_from_compiled_code_with_options(
        &self,
        compiled: &[u8],
        options: &CompilationOptions,
        host_data: H,
    ) -> ExecutorResult<WasmerInstance<H>> {
        if compiled.is_empty() {
            return Err(ExecutorError::InvalidBytecode);
        }
        let (header, module_bytes) = decode_cache_header(compiled)?;
        if header.metered != options.metering {
            return Err(ExecutorError::CachingFailed(format!(
                "Compiled code has metering {}, but metering {} was requested.",
                header.metered, options.metering
            )));
        }
        self.freeze();
        let store = Store::new(tunables::limited_engine(Cranelift::default(), options));
        // Compiled code is only ever produced by `cache` of this backend.
        let module = unsafe { Module::deserialize(&store, module_bytes.to_vec()) }
            .map_err(|e| ExecutorError::CachingFailed(e.to_string()))?;
        WasmerInstance::instantiate(
            store,
            module,
            Arc::clone(self.config.host_functions()),
            options.clone(),
            header.locals_cost,
            host_data,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheHeader {
    metered:     bool,
    locals_cost: u64,
}

fn encode_cache_header(header: CacheHeader, module_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CACHE_HEADER_LEN + module_bytes.len());
    out.extend_from_slice(&CACHE_MAGIC);
    out.push(CACHE_VERSION);
    out.push(u8::from(header.metered));
    out.extend_from_slice(&header.locals_cost.to_be_bytes());
    out.extend_from_slice(module_bytes);
    out
}

fn decode_cache_header(compiled: &[u8]) -> ExecutorResult<(CacheHeader, &[u8])> {
    let fail = |msg: &str| ExecutorError::CachingFailed(msg.to_string());
    let mut source = compiled;
    let mut magic = [0u8; 4];
    source.read_exact(&mut magic).map_err(|_| fail("Truncated header."))?;
    if magic != CACHE_MAGIC {
        return Err(fail("Not compiled code."));
    }
    let version = source.read_u8().map_err(|_| fail("Truncated header."))?;
    if version != CACHE_VERSION {
        return Err(ExecutorError::CachingFailed(format!(
            "Unsupported version {}.",
            version
        )));
    }
    let metered = match source.read_u8().map_err(|_| fail("Truncated header."))? {
        0 => false,
        1 => true,
        _ => return Err(fail("Invalid metering flag.")),
    };
    let locals_cost = source.read_u64::<BigEndian>().map_err(|_| fail("Truncated header."))?;
    Ok((
        CacheHeader {
            metered,
            locals_cost,
        },
        source,
    ))
}
