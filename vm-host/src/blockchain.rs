//! What the host needs to know about the chain it runs on.
use std::{collections::BTreeMap, sync::Arc};

pub trait BlockchainHook {
    /// Whether a contract with code is deployed at the address.
    fn has_code(&self, address: &[u8]) -> bool;

    fn is_builtin_function(&self, name: &str) -> bool;

    fn in_same_shard(&self, left: &[u8], right: &[u8]) -> bool;
}

impl<B: BlockchainHook + ?Sized> BlockchainHook for Arc<B> {
    fn has_code(&self, address: &[u8]) -> bool { (**self).has_code(address) }

    fn is_builtin_function(&self, name: &str) -> bool { (**self).is_builtin_function(name) }

    fn in_same_shard(&self, left: &[u8], right: &[u8]) -> bool {
        (**self).in_same_shard(left, right)
    }
}

/// Contract storage. The `protected` operations bypass the checks applied
/// to writes coming from contract code, so they are only used by the host.
pub trait StorageHook {
    fn get_protected(&self, address: &[u8], key: &[u8]) -> Option<Vec<u8>>;

    fn set_protected(&mut self, address: &[u8], key: &[u8], value: Vec<u8>);

    fn delete_protected(&mut self, address: &[u8], key: &[u8]) -> bool;
}

#[derive(Default, Debug, Clone)]
/// Storage of all contracts, kept in memory.
pub struct InMemoryStorage {
    entries: BTreeMap<(Vec<u8>, Vec<u8>), Vec<u8>>,
}

impl InMemoryStorage {
    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl StorageHook for InMemoryStorage {
    fn get_protected(&self, address: &[u8], key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(&(address.to_vec(), key.to_vec())).cloned()
    }

    fn set_protected(&mut self, address: &[u8], key: &[u8], value: Vec<u8>) {
        self.entries.insert((address.to_vec(), key.to_vec()), value);
    }

    fn delete_protected(&mut self, address: &[u8], key: &[u8]) -> bool {
        self.entries.remove(&(address.to_vec(), key.to_vec())).is_some()
    }
}
