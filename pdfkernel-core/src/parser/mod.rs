//! PDF Parser Module
//!
//! This module implements the low-level PDF reading core: the byte source
//! abstraction, the tokenizer, the object parser, cross-reference handling,
//! the indirect object resolver and the stream filter pipeline, following
//! ISO 32000-1 (PDF 1.7) Section 7.

pub mod filter_impls;
pub mod filters;
pub mod header;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod reader;
pub mod source;
pub mod stack_safe;
pub mod trailer;
pub mod xref;
pub mod xref_stream;

#[cfg(test)]
pub(crate) mod test_helpers;

use crate::memory::{LimitKind, MemoryLimits};

pub use self::filters::{Filter, FilterChain};
pub use self::header::{PdfHeader, PdfVersion};
pub use self::lexer::{Keyword, Lexer, Token};
pub use self::objects::{
    ObjectId, PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString, TextEncoding,
};
pub use self::reader::PdfReader;
pub use self::source::{ByteSource, MemorySource, SeekableSource};
pub use self::trailer::PdfTrailer;
pub use self::xref::{XRefEntry, XRefState, XRefTable};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty file")]
    EmptyFile,

    #[error("Invalid PDF header")]
    InvalidHeader,

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: u64, message: String },

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Invalid object header at offset {offset}: {message}")]
    InvalidObjectHeader { offset: u64, message: String },

    #[error("Invalid object reference: {0} {1} R")]
    InvalidReference(u32, u16),

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Invalid xref table: {0}")]
    InvalidXRef(String),

    #[error("Invalid trailer: {0}")]
    InvalidTrailer(String),

    #[error("Circular reference detected: {0}")]
    CircularReference(ObjectId),

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),

    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Memory limit exceeded: {kind} limit of {limit} bytes")]
    MemoryLimitExceeded { kind: LimitKind, limit: usize },
}

/// Coarse classification of [`ParseError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Lex,
    Structural,
    CyclicReference,
    Decode,
    MemoryLimit,
}

impl ParseError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::Io(_) => ErrorKind::Io,
            ParseError::SyntaxError { .. } | ParseError::UnexpectedToken { .. } => ErrorKind::Lex,
            ParseError::EmptyFile
            | ParseError::InvalidHeader
            | ParseError::InvalidObjectHeader { .. }
            | ParseError::InvalidReference(..)
            | ParseError::MissingKey(_)
            | ParseError::InvalidXRef(_)
            | ParseError::InvalidTrailer(_) => ErrorKind::Structural,
            ParseError::CircularReference(_) => ErrorKind::CyclicReference,
            ParseError::StreamDecodeError(_) | ParseError::UnsupportedFilter(_) => {
                ErrorKind::Decode
            }
            ParseError::MemoryLimitExceeded { .. } => ErrorKind::MemoryLimit,
        }
    }

    pub(crate) fn syntax(position: u64, message: impl Into<String>) -> Self {
        ParseError::SyntaxError {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        ParseError::StreamDecodeError(message.into())
    }
}

/// Options controlling how tolerant the parser is of malformed files
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Accept recoverable syntax problems (missing header, missing `endobj`)
    pub lenient_syntax: bool,
    /// Rebuild the cross-reference table by scanning when it is unusable
    pub xref_recovery: bool,
    /// Maximum nesting of arrays and dictionaries
    pub max_depth: usize,
    /// Treat NUL (0x00) as whitespace
    pub nul_is_whitespace: bool,
    /// Decoded-size limits
    pub memory_limits: MemoryLimits,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParseOptions {
    /// Tolerate everything that can be recovered from
    pub fn lenient() -> Self {
        Self {
            lenient_syntax: true,
            xref_recovery: true,
            max_depth: 500,
            nul_is_whitespace: true,
            memory_limits: MemoryLimits::default(),
        }
    }

    /// Fail on structural problems instead of repairing them
    pub fn strict() -> Self {
        Self {
            lenient_syntax: false,
            xref_recovery: false,
            ..Self::lenient()
        }
    }

    pub fn with_memory_limits(mut self, limits: MemoryLimits) -> Self {
        self.memory_limits = limits;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_xref_recovery(mut self, enabled: bool) -> Self {
        self.xref_recovery = enabled;
        self
    }

    pub fn with_nul_whitespace(mut self, enabled: bool) -> Self {
        self.nul_is_whitespace = enabled;
        self
    }
}
