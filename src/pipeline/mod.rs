use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Pipeline data map for passing data between nodes
pub struct PipeMap {
    data: HashMap<String, Box<dyn Send + Sync + Any>>,
}

impl PipeMap {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn insert<T: Send + Sync + Any>(&mut self, key: &str, value: T) {
        self.data.insert(key.to_string(), Box::new(value));
    }

    pub fn get<T: Send + Sync + Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key)?.downcast_ref::<T>()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    // Get all keys for debugging
    pub fn keys(&self) -> Vec<&String> {
        self.data.keys().collect()
    }
}

impl Default for PipeMap {
    fn default() -> Self {
        Self::new()
    }
}

// Values are type-erased, so only the keys can be rendered
impl fmt::Debug for PipeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.data.keys().collect();
        keys.sort();
        f.debug_tuple("PipeMap").field(&keys).finish()
    }
}

pub mod core;

pub mod nodes;

pub mod registry;

pub use core::{PipeNode, Pipeline};
pub use registry::StageRegistry;
