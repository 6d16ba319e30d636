//! Recovery of damaged cross-reference data
//!
//! When a file's `startxref` is missing or wrong, a section does not parse,
//! or the trailer has no `/Root`, the reader rebuilds its cross-reference
//! table by scanning the whole file (see [`XRefRecovery`]). Recovery is on
//! by default and turned off by [`ParseOptions::strict`](crate::parser::ParseOptions::strict).
//!
//! # Example
//!
//! ```rust
//! use pdfkernel::parser::PdfReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // No xref table and no trailer at all
//! let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n".to_vec();
//! let mut reader = PdfReader::from_bytes(data)?;
//!
//! assert!(reader.xref().is_rebuilt());
//! assert_eq!(reader.catalog()?.get_type(), Some("Catalog"));
//! # Ok(())
//! # }
//! ```

pub mod xref_recovery;

pub use xref_recovery::{RecoveryStats, XRefRecovery};
