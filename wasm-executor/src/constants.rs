/// Size of a Wasm memory page in bytes.
pub const PAGE_SIZE: u32 = 65536;

/// Wasm binary magic followed by the only supported version.
pub const WASM_HEADER: [u8; 8] = [0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

/// Namespace under which host functions are imported unless another one is
/// given at registration.
pub const DEFAULT_HOST_NAMESPACE: &str = "env";

/// Magic prefix of serialized compiled code produced by `Instance::cache`.
pub const CACHE_MAGIC: [u8; 4] = *b"WXC\0";

/// Version of the cached code header. Bumped whenever the header layout
/// changes.
pub const CACHE_VERSION: u8 = 1;

/// Default number of function locals that are not charged for.
pub const DEFAULT_UNMETERED_LOCALS: u32 = 100;

/// Default maximum number of pages memory may reach through host growth.
pub const DEFAULT_MAX_MEMORY_GROW: u32 = 10;

/// Default maximum number of pages that may be added by a single host growth.
pub const DEFAULT_MAX_MEMORY_GROW_DELTA: u32 = 10;

/// Default capacity of the warm instance pool.
pub const WARM_POOL_CAPACITY: usize = 100;
