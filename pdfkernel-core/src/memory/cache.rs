//! Object cache for resolved PDF objects
//!
//! Resolved objects are shared as `Arc<PdfObject>`, so resolving the same
//! id twice hands out the same allocation until the object is released.
//! Nothing is evicted behind the caller's back.

use crate::parser::{ObjectId, PdfObject};
use std::collections::HashMap;
use std::sync::Arc;

/// Arena of resolved objects keyed by object id
#[derive(Debug, Default)]
pub struct ObjectCache {
    objects: HashMap<ObjectId, Arc<PdfObject>>,
    hits: usize,
    misses: usize,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an object from the cache, counting the hit or miss
    pub fn get(&mut self, id: ObjectId) -> Option<Arc<PdfObject>> {
        match self.objects.get(&id) {
            Some(obj) => {
                self.hits += 1;
                Some(Arc::clone(obj))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Look without touching the statistics
    pub fn peek(&self, id: ObjectId) -> Option<&Arc<PdfObject>> {
        self.objects.get(&id)
    }

    /// Store an object in the cache
    pub fn put(&mut self, id: ObjectId, object: Arc<PdfObject>) {
        self.objects.insert(id, object);
    }

    /// Drop one object; returns it if it was cached
    pub fn remove(&mut self, id: ObjectId) -> Option<Arc<PdfObject>> {
        self.objects.remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.objects.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of cached objects
    pub size: usize,
    pub hits: usize,
    pub misses: usize,
}
