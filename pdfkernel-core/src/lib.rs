//! # pdfkernel
//!
//! The reading core of a PDF library: a tokenizer for PDF syntax, a lazy
//! resolver for indirect objects built on the cross-reference table, and
//! the stream filter pipeline, with zero external PDF dependencies.
//!
//! ## Features
//!
//! - **Tokenizer and object parser**: byte-exact PDF lexing, recursive
//!   object parsing with bounded nesting, stream payloads checked against
//!   their declared `/Length`
//! - **Cross-reference handling**: classic tables, xref streams, hybrid
//!   files, incremental updates and object streams
//! - **Recovery**: files with a broken or missing cross-reference table are
//!   rebuilt by scanning for object headers
//! - **Filters**: FlateDecode (with the `compression` feature), LZWDecode,
//!   ASCIIHexDecode, ASCII85Decode, RunLengthDecode, CCITTFaxDecode and
//!   Crypt pass-through, with PNG and TIFF predictors
//! - **Bounded memory**: every decoded byte counts against per-stream and
//!   per-document limits owned by the reader
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfkernel::parser::PdfReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = PdfReader::open("document.pdf")?;
//! println!("PDF {}", reader.version());
//!
//! let catalog = reader.catalog()?;
//! if let Some(pages) = catalog.get("Pages").and_then(|p| p.as_reference()) {
//!     let pages = reader.resolve(pages)?;
//!     println!("Page tree: {:?}", pages.as_dict().and_then(|d| d.get("Count")));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`parser`] - Tokenizer, object parser, cross-reference table, resolver
//!   and filters
//!   - [`parser::PdfReader`] - Indirect object resolution
//!   - [`parser::Lexer`] - PDF tokenizer
//!   - [`parser::filters`] - Stream filter pipeline
//! - [`memory`] - Decoded-size limits and the object cache
//! - [`recovery`] - Cross-reference rebuild by scanning

pub mod memory;
pub mod parser;
pub mod recovery;

// Re-export parsing types
pub use parser::{
    ErrorKind, ObjectId, ParseError, ParseOptions, ParseResult, PdfArray, PdfDictionary, PdfName,
    PdfObject, PdfReader, PdfStream, PdfString,
};

pub use memory::{MemoryLimits, MemoryLimitsHandler};

/// Current version of pdfkernel
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
