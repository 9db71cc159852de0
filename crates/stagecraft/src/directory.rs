//! Sharded actor directory
//!
//! Maps addresses to live actor handles across a fixed number of buckets,
//! bounding the cost of any single map. A secondary type-name index locates
//! root actors and named supervisors; it is last-writer-wins, which is
//! harmless because supervisor and root type names are unique by convention.

use crate::actor::ActorHandle;
use crate::address::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Directory shard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Number of buckets entries are sharded across
    pub bucket_count: usize,
    /// Initial capacity hint per bucket
    pub bucket_capacity: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            bucket_count: 32,
            bucket_capacity: 64,
        }
    }
}

/// Sharded `Address -> ActorHandle` map with a type-name index
pub struct Directory {
    buckets: Vec<RwLock<HashMap<String, ActorHandle>>>,
    type_index: RwLock<HashMap<String, ActorHandle>>,
}

impl Directory {
    /// Build an empty directory with the given shard configuration
    pub fn new(config: DirectoryConfig) -> Self {
        let bucket_count = config.bucket_count.max(1);
        let buckets = (0..bucket_count)
            .map(|_| RwLock::new(HashMap::with_capacity(config.bucket_capacity)))
            .collect();
        Self {
            buckets,
            type_index: RwLock::new(HashMap::new()),
        }
    }

    fn bucket_for(&self, address: &Address) -> &RwLock<HashMap<String, ActorHandle>> {
        let mut hasher = DefaultHasher::new();
        address.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.buckets.len();
        &self.buckets[index]
    }

    /// Register a live actor; also indexes its type name
    pub fn set(&self, handle: ActorHandle) {
        let address = handle.address();
        let type_name = handle.type_name();

        self.bucket_for(&address)
            .write()
            .insert(address.key(), handle.clone());
        self.type_index.write().insert(type_name.clone(), handle);

        debug!(address = %address, type_name = %type_name, "Actor registered");
    }

    /// Handle for `address`, if the actor is live
    pub fn get(&self, address: &Address) -> Option<ActorHandle> {
        self.bucket_for(address).read().get(&address.key()).cloned()
    }

    /// Remove the actor for `address`; clears its type-index entry when it
    /// is still the indexed one
    pub fn remove(&self, address: &Address) -> Option<ActorHandle> {
        let removed = self.bucket_for(address).write().remove(&address.key());

        if let Some(handle) = &removed {
            let type_name = handle.type_name();
            let mut index = self.type_index.write();
            let still_indexed = index
                .get(&type_name)
                .is_some_and(|indexed| indexed.address() == *address);
            if still_indexed {
                index.remove(&type_name);
            }
            debug!(address = %address, type_name = %type_name, "Actor removed");
        }

        removed
    }

    /// Handle registered under `type_name`, if any
    ///
    /// Used only by supervision routing and root discovery.
    pub fn find_by_type(&self, type_name: &str) -> Option<ActorHandle> {
        self.type_index.read().get(type_name).cloned()
    }

    /// Number of live actors; O(buckets)
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.read().len()).sum()
    }

    /// Whether no actors are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all live handles, in no particular order
    pub fn all(&self) -> Vec<ActorHandle> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.read().values().cloned().collect::<Vec<_>>())
            .collect()
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("buckets", &self.buckets.len())
            .field("len", &self.len())
            .finish()
    }
}
