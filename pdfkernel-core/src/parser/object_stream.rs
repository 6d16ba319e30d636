//! PDF Object Stream Parser
//!
//! Handles compressed objects stored in object streams (PDF 1.5+,
//! ISO 32000-1 Section 7.5.7). The stream holds `N` pairs of object number
//! and offset, followed at `/First` by the objects themselves.

use super::lexer::{Lexer, Token};
use super::objects::{DirectLengths, ObjectParser, PdfDictionary, PdfObject};
use super::source::{ByteSource, MemorySource};
use super::{ParseError, ParseOptions, ParseResult};
use tracing::warn;

/// Represents a decoded PDF object stream
#[derive(Debug, Clone)]
pub struct ObjectStream {
    /// Decoded stream data
    source: MemorySource,
    /// Offset of first object
    first: u64,
    /// Object number and offset relative to `first`, in stream order
    entries: Vec<(u32, u64)>,
}

impl ObjectStream {
    /// Read the header of a decoded object stream.
    ///
    /// Objects are parsed on demand by [`get_object`](Self::get_object).
    pub fn new(dict: &PdfDictionary, data: Vec<u8>) -> ParseResult<Self> {
        let n = dict
            .get_integer("N")
            .ok_or_else(|| ParseError::MissingKey("N".to_string()))?;
        let first = dict
            .get_integer("First")
            .ok_or_else(|| ParseError::MissingKey("First".to_string()))?;

        let first = u64::try_from(first)
            .ok()
            .filter(|&f| f <= data.len() as u64)
            .ok_or_else(|| {
                ParseError::syntax(0, format!("Object stream /First {first} out of range"))
            })?;
        let n = usize::try_from(n)
            .map_err(|_| ParseError::syntax(0, format!("Invalid object stream /N {n}")))?;

        let mut source = MemorySource::new(data);
        let entries = Self::read_header(&mut source, n, first)?;
        Ok(ObjectStream {
            source,
            first,
            entries,
        })
    }

    fn read_header(source: &mut MemorySource, n: usize, first: u64) -> ParseResult<Vec<(u32, u64)>> {
        let mut lexer = Lexer::new(source);
        let mut entries = Vec::new();

        for _ in 0..n {
            lexer.skip_whitespace()?;
            if lexer.position() >= first {
                warn!(
                    "Object stream header ends after {} of {n} entries",
                    entries.len()
                );
                break;
            }
            let number = match lexer.next_token()? {
                Token::Integer(v) => u32::try_from(v).ok(),
                _ => None,
            };
            let offset = match lexer.next_token()? {
                Token::Integer(v) => u64::try_from(v).ok(),
                _ => None,
            };
            match (number, offset) {
                (Some(number), Some(offset)) => entries.push((number, offset)),
                _ => {
                    return Err(ParseError::syntax(
                        lexer.position(),
                        "Expected object number and offset in object stream",
                    ))
                }
            }
        }

        Ok(entries)
    }

    /// Number of objects the header lists
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Object numbers with their index, in stream order
    pub fn object_numbers(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, &(number, _))| (index, number))
    }

    pub fn index_of(&self, number: u32) -> Option<usize> {
        self.entries.iter().position(|&(n, _)| n == number)
    }

    /// Parse the object at `index`, returning its object number with it
    pub fn get_object(
        &mut self,
        index: usize,
        options: &ParseOptions,
    ) -> ParseResult<(u32, PdfObject)> {
        let &(number, offset) = self.entries.get(index).ok_or_else(|| {
            ParseError::syntax(
                0,
                format!(
                    "Index {index} out of range for object stream with {} objects",
                    self.entries.len()
                ),
            )
        })?;

        let start = self.first.saturating_add(offset);
        if start >= self.source.len() {
            return Err(ParseError::syntax(
                start,
                format!("Object {number} lies beyond the object stream data"),
            ));
        }

        let mut lexer = Lexer::new(&mut self.source);
        lexer.seek(start)?;
        let mut lengths = DirectLengths;
        let object = ObjectParser::with_options(&mut lexer, &mut lengths, options).parse_object()?;
        Ok((number, object))
    }

    /// Find an object by number
    pub fn find_object(
        &mut self,
        number: u32,
        options: &ParseOptions,
    ) -> ParseResult<Option<PdfObject>> {
        match self.index_of(number) {
            Some(index) => Ok(Some(self.get_object(index, options)?.1)),
            None => Ok(None),
        }
    }
}
