//! PDF Header Parser
//!
//! Parses PDF header and version according to ISO 32000-1 Section 7.5.2

use super::source::ByteSource;
use super::{ParseError, ParseResult};
use tracing::warn;

/// How far into the file the `%PDF-` marker may appear
const HEADER_SEARCH_LEN: usize = 1024;

const HEADER_MARKER: &[u8] = b"%PDF-";

/// PDF Version information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    /// Create a new PDF version
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Check if this version is one the format defines (1.0 through 2.0)
    pub fn is_known(&self) -> bool {
        matches!((self.major, self.minor), (1, 0..=7) | (2, 0))
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self::new(1, 4)
    }
}

impl std::fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// PDF Header information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    pub version: PdfVersion,
    /// Offset of `%PDF-`; junk in front of it shifts every xref offset
    pub offset: u64,
    pub has_binary_marker: bool,
}

impl PdfHeader {
    /// Find and parse the header within the first kilobyte of `source`.
    ///
    /// With `lenient` a missing or garbled header yields PDF 1.4 at offset 0
    /// and a warning instead of [`ParseError::InvalidHeader`].
    pub fn parse<S: ByteSource + ?Sized>(source: &mut S, lenient: bool) -> ParseResult<Self> {
        if source.is_empty() {
            return Err(ParseError::EmptyFile);
        }

        source.seek(0)?;
        let mut buf = vec![0u8; HEADER_SEARCH_LEN];
        let n = source.read_into(&mut buf)?;
        buf.truncate(n);

        match Self::parse_bytes(&buf) {
            Some(header) => {
                if !header.version.is_known() {
                    warn!("Unknown PDF version {}", header.version);
                }
                Ok(header)
            }
            None if lenient => {
                warn!("No valid PDF header in the first {n} bytes, assuming 1.4");
                Ok(Self {
                    version: PdfVersion::default(),
                    offset: 0,
                    has_binary_marker: false,
                })
            }
            None => Err(ParseError::InvalidHeader),
        }
    }

    fn parse_bytes(buf: &[u8]) -> Option<Self> {
        let offset = buf
            .windows(HEADER_MARKER.len())
            .position(|w| w == HEADER_MARKER)?;
        let rest = &buf[offset + HEADER_MARKER.len()..];

        let (major, rest) = read_digits(rest)?;
        let rest = rest.strip_prefix(b".")?;
        let (minor, rest) = read_digits(rest)?;

        Some(Self {
            version: PdfVersion::new(major, minor),
            offset: offset as u64,
            has_binary_marker: has_binary_marker(rest),
        })
    }
}

fn read_digits(bytes: &[u8]) -> Option<(u8, &[u8])> {
    let len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let value = std::str::from_utf8(&bytes[..len]).ok()?.parse().ok()?;
    Some((value, &bytes[len..]))
}

/// A comment line right after the header with at least four bytes >= 128
fn has_binary_marker(after_version: &[u8]) -> bool {
    let eol = after_version
        .iter()
        .position(|&b| b == b'\r' || b == b'\n');
    let Some(eol) = eol else {
        return false;
    };
    let line = after_version[eol..]
        .iter()
        .skip_while(|&&b| b == b'\r' || b == b'\n');
    let mut line = line.take_while(|&&b| b != b'\r' && b != b'\n');
    if line.next() != Some(&b'%') {
        return false;
    }
    line.filter(|&&b| b >= 128).count() >= 4
}
