//! Process-wide store of compiled type descriptors
//!
//! Descriptors are write-once: the first descriptor published under a name
//! stays, later publications of the same name get the stored one back.

use super::templates::TypeDescriptor;
use crate::namespaces::QName;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

static GLOBAL: Lazy<Arc<TypeCache>> = Lazy::new(|| Arc::new(TypeCache::new()));

/// Thread-safe cache of compiled types keyed by qualified name
#[derive(Debug, Default)]
pub struct TypeCache {
    types: RwLock<HashMap<QName, Arc<TypeDescriptor>>>,
}

impl TypeCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every compiler that is not given its own
    pub fn global() -> Arc<TypeCache> {
        Arc::clone(&GLOBAL)
    }

    /// Get a compiled type
    pub fn get(&self, name: &QName) -> Option<Arc<TypeDescriptor>> {
        let types = self.types.read().unwrap_or_else(|e| e.into_inner());
        types.get(name).cloned()
    }

    /// Publish a compiled type unless the name is taken, returning the
    /// descriptor stored under the name
    pub fn publish(&self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());
        types
            .entry(descriptor.name.clone())
            .or_insert_with(|| Arc::new(descriptor))
            .clone()
    }

    /// Check if a type is compiled
    pub fn contains(&self, name: &QName) -> bool {
        let types = self.types.read().unwrap_or_else(|e| e.into_inner());
        types.contains_key(name)
    }

    /// Number of compiled types
    pub fn len(&self) -> usize {
        let types = self.types.read().unwrap_or_else(|e| e.into_inner());
        types.len()
    }

    /// Check if nothing is compiled yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(local: &str, enumeration: bool) -> TypeDescriptor {
        TypeDescriptor {
            name: QName::namespaced("urn:t", local),
            namespace: Some("urn:t".to_string()),
            fields: Vec::new(),
            base_chain: Vec::new(),
            simple: None,
            enumeration,
            strategy: None,
        }
    }

    #[test]
    fn test_publish_is_write_once() {
        let cache = TypeCache::new();
        let first = cache.publish(descriptor("A", false));
        let second = cache.publish(descriptor("A", true));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.enumeration);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_and_contains() {
        let cache = TypeCache::new();
        let name = QName::namespaced("urn:t", "B");
        assert!(cache.get(&name).is_none());
        cache.publish(descriptor("B", false));
        assert!(cache.contains(&name));
        assert!(cache.get(&name).is_some());
    }

    #[test]
    fn test_concurrent_publish_converges() {
        let cache = Arc::new(TypeCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.publish(descriptor("C", false)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
