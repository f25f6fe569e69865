use std::collections::HashMap;

use crate::protocol::PrivateKey;

/// Lookup of an accessory's private key by accessory id.
pub trait KeyStore: Send + Sync {
    /// The private key of `accessory_id`, or `None` if it isn't known.
    fn private_key(&self, accessory_id: &str) -> Option<PrivateKey>;
}

/// A [`KeyStore`] that keeps keys in memory for the lifetime of the process.
#[derive(Default, Clone)]
pub struct MemoryKeyStore {
    keys: HashMap<String, PrivateKey>,
}

impl MemoryKeyStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the key of `accessory_id`, replacing any earlier one.
    pub fn insert(&mut self, accessory_id: impl Into<String>, private_key: PrivateKey) {
        self.keys.insert(accessory_id.into(), private_key);
    }

    /// Forget the key of `accessory_id`.
    pub fn remove(&mut self, accessory_id: &str) -> Option<PrivateKey> {
        self.keys.remove(accessory_id)
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are held.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyStore for MemoryKeyStore {
    fn private_key(&self, accessory_id: &str) -> Option<PrivateKey> {
        self.keys.get(accessory_id).cloned()
    }
}
