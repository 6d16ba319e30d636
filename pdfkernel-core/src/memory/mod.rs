//! Memory accounting for stream decoding
//!
//! Decompression filters can expand a few kilobytes into gigabytes. Every
//! reader owns a [`MemoryLimitsHandler`] that hands each filter stage a
//! [`BoundedBuffer`] sized to what is left of the per-stream and
//! per-document budgets, so an oversized stream fails as soon as it crosses
//! the limit instead of after the allocation.
//!
//! # Example
//!
//! ```rust
//! use pdfkernel::memory::{MemoryLimits, MemoryLimitsHandler};
//!
//! let limits = MemoryLimits::default()
//!     .with_max_stream_size(1024 * 1024)
//!     .with_max_document_size(16 * 1024 * 1024);
//! let mut handler = MemoryLimitsHandler::new(limits);
//!
//! let mut out = handler.output_buffer();
//! out.extend_from_slice(b"decoded bytes").unwrap();
//! handler.record(out.len()).unwrap();
//! assert_eq!(handler.used(), 13);
//! ```

use crate::parser::{ParseError, ParseResult};
use std::fmt;

pub mod cache;

pub use cache::{CacheStats, ObjectCache};

/// Which budget a [`ParseError::MemoryLimitExceeded`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Stream,
    Document,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::Stream => f.write_str("stream"),
            LimitKind::Document => f.write_str("document"),
        }
    }
}

/// Configuration of decoded-size limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    /// Largest decoded size of a single stream (and of each filter stage)
    pub max_stream_size: usize,
    /// Largest total of decoded bytes over the life of a reader
    pub max_document_size: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_stream_size: 256 * 1024 * 1024,    // 256MB
            max_document_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

impl MemoryLimits {
    /// No limits at all
    pub fn unlimited() -> Self {
        Self {
            max_stream_size: usize::MAX,
            max_document_size: usize::MAX,
        }
    }

    pub fn with_max_stream_size(mut self, bytes: usize) -> Self {
        self.max_stream_size = bytes;
        self
    }

    pub fn with_max_document_size(mut self, bytes: usize) -> Self {
        self.max_document_size = bytes;
        self
    }
}

/// Memory usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Decoded bytes charged so far
    pub decoded_bytes: usize,
    /// Number of streams charged
    pub streams_decoded: usize,
    /// Largest single decoded stream
    pub largest_stream: usize,
}

/// Per-reader memory accounting
#[derive(Debug, Clone)]
pub struct MemoryLimitsHandler {
    limits: MemoryLimits,
    stats: MemoryStats,
}

impl Default for MemoryLimitsHandler {
    fn default() -> Self {
        Self::new(MemoryLimits::default())
    }
}

impl MemoryLimitsHandler {
    pub fn new(limits: MemoryLimits) -> Self {
        Self {
            limits,
            stats: MemoryStats::default(),
        }
    }

    pub fn limits(&self) -> &MemoryLimits {
        &self.limits
    }

    /// Bytes a single filter stage may still produce, and the budget that
    /// bounds it
    pub fn budget(&self) -> (usize, LimitKind) {
        let document_left = self
            .limits
            .max_document_size
            .saturating_sub(self.stats.decoded_bytes);
        if document_left < self.limits.max_stream_size {
            (document_left, LimitKind::Document)
        } else {
            (self.limits.max_stream_size, LimitKind::Stream)
        }
    }

    /// Fresh output buffer bounded by the current budget
    pub fn output_buffer(&self) -> BoundedBuffer {
        let (limit, kind) = self.budget();
        BoundedBuffer::new(limit, kind)
    }

    /// Charge a fully decoded stream to the document total
    pub fn record(&mut self, bytes: usize) -> ParseResult<()> {
        let total = self.stats.decoded_bytes.saturating_add(bytes);
        if total > self.limits.max_document_size {
            return Err(ParseError::MemoryLimitExceeded {
                kind: LimitKind::Document,
                limit: self.limits.max_document_size,
            });
        }
        self.stats.decoded_bytes = total;
        self.stats.streams_decoded += 1;
        self.stats.largest_stream = self.stats.largest_stream.max(bytes);
        Ok(())
    }

    /// Decoded bytes charged so far
    pub fn used(&self) -> usize {
        self.stats.decoded_bytes
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats.clone()
    }

    pub fn reset(&mut self) {
        self.stats = MemoryStats::default();
    }
}

/// Output sink that refuses to grow past a limit
#[derive(Debug)]
pub struct BoundedBuffer {
    data: Vec<u8>,
    limit: usize,
    kind: LimitKind,
}

impl BoundedBuffer {
    pub fn new(limit: usize, kind: LimitKind) -> Self {
        Self {
            data: Vec::new(),
            limit,
            kind,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(usize::MAX, LimitKind::Stream)
    }

    /// Empty buffer limited to what this one may still accept
    pub fn sibling(&self) -> Self {
        Self::new(self.limit.saturating_sub(self.data.len()), self.kind)
    }

    /// Fail unless `additional` more bytes fit
    pub fn ensure(&self, additional: usize) -> ParseResult<()> {
        if self.data.len().saturating_add(additional) > self.limit {
            return Err(ParseError::MemoryLimitExceeded {
                kind: self.kind,
                limit: self.limit,
            });
        }
        Ok(())
    }

    pub fn push(&mut self, byte: u8) -> ParseResult<()> {
        self.ensure(1)?;
        self.data.push(byte);
        Ok(())
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> ParseResult<()> {
        self.ensure(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Append `count` copies of `byte`
    pub fn extend_repeat(&mut self, byte: u8, count: usize) -> ParseResult<()> {
        self.ensure(count)?;
        self.data.resize(self.data.len() + count, byte);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Move the contents out, leaving the buffer empty with the same limit
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
