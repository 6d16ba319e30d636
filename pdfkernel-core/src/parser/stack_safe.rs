//! Stack-safe parsing and resolution bookkeeping
//!
//! Deeply nested arrays/dictionaries and reference loops are the two ways a
//! malicious file can drive a recursive parser into unbounded recursion.
//! [`StackSafeContext`] bounds the first and detects the second.

use super::objects::ObjectId;
use super::{ParseError, ParseResult};
use std::collections::HashSet;

/// Default maximum nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 500;

/// Tracks nesting depth and the set of objects currently being resolved
#[derive(Debug)]
pub struct StackSafeContext {
    depth: usize,
    max_depth: usize,
    resolving: HashSet<ObjectId>,
}

impl Default for StackSafeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl StackSafeContext {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
            resolving: HashSet::new(),
        }
    }

    /// Enter one level of nesting
    pub fn enter(&mut self, position: u64) -> ParseResult<()> {
        if self.depth >= self.max_depth {
            return Err(ParseError::syntax(
                position,
                format!("Maximum nesting depth {} exceeded", self.max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Leave one level of nesting
    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Mark `id` as being resolved. Fails if it already is, which means the
    /// reference graph loops back on itself.
    pub fn begin_resolution(&mut self, id: ObjectId) -> ParseResult<()> {
        if !self.resolving.insert(id) {
            return Err(ParseError::CircularReference(id));
        }
        Ok(())
    }

    pub fn end_resolution(&mut self, id: ObjectId) {
        self.resolving.remove(&id);
    }

    pub fn is_resolving(&self, id: ObjectId) -> bool {
        self.resolving.contains(&id)
    }

    pub fn resolving(&self) -> &HashSet<ObjectId> {
        &self.resolving
    }
}
