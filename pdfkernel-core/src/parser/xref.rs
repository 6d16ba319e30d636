//! PDF Cross-Reference Table Parser
//!
//! Parses xref tables according to ISO 32000-1 Section 7.5.4, follows the
//! `/Prev` chain of incremental updates and the `/XRefStm` sections of hybrid
//! files, and falls back to a rebuild by scanning when the table is unusable.

use super::filters::{self, FilterChain};
use super::lexer::{Keyword, Lexer, Token};
use super::objects::{DirectLengths, ObjectParser, PdfObject};
use super::source::ByteSource;
use super::trailer::{PdfTrailer, TrailerChain};
use super::xref_stream::XRefStream;
use super::{ParseError, ParseOptions, ParseResult};
use crate::memory::MemoryLimitsHandler;
use crate::recovery::{RecoveryStats, XRefRecovery};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

/// How far from the end of the file `startxref` is searched for
const STARTXREF_SEARCH_LEN: u64 = 1024;

const STARTXREF: &[u8] = b"startxref";

/// Cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object entry
    Free { next: u32, generation: u16 },
    /// Object stored at a byte offset
    InUse { offset: u64, generation: u16 },
    /// Object stored inside an object stream (PDF 1.5+)
    Compressed { stream: u32, index: u32 },
}

impl XRefEntry {
    /// Generation of the object; compressed objects always have generation 0
    pub fn generation(&self) -> u16 {
        match self {
            XRefEntry::Free { generation, .. } | XRefEntry::InUse { generation, .. } => *generation,
            XRefEntry::Compressed { .. } => 0,
        }
    }

    pub fn is_in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free { .. })
    }
}

/// Stages of building the cross-reference table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefState {
    Unbuilt,
    ParsingXRefTable,
    ParsingXRefStream,
    TrailerFound,
    RebuildScanning,
    Ready,
}

/// Cross-reference table
///
/// Built once when a reader opens its source and read-only afterwards,
/// except for a rebuild which replaces its contents wholesale.
#[derive(Debug, Clone)]
pub struct XRefTable {
    /// Map of object number to xref entry
    entries: HashMap<u32, XRefEntry>,
    /// Trailers of every section read, newest first
    trailers: TrailerChain,
    /// Effective trailer
    trailer: Option<PdfTrailer>,
    history: Vec<XRefState>,
    recovery: Option<RecoveryStats>,
}

impl Default for XRefTable {
    fn default() -> Self {
        Self::new()
    }
}

impl XRefTable {
    /// Create a new empty xref table
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            trailers: TrailerChain::new(),
            trailer: None,
            history: vec![XRefState::Unbuilt],
            recovery: None,
        }
    }

    /// Build the table for the source behind `lexer`.
    ///
    /// `header_offset` is the position of `%PDF-`; when it is not zero,
    /// sections are also looked for at offsets shifted by it. Unless
    /// `options.xref_recovery` is off, a missing or broken table, or one
    /// whose trailer has no `/Root`, is rebuilt by scanning the source.
    pub fn load<S: ByteSource>(
        lexer: &mut Lexer<S>,
        options: &ParseOptions,
        memory: &mut MemoryLimitsHandler,
        header_offset: u64,
    ) -> ParseResult<Self> {
        let mut table = Self::new();

        let outcome = table
            .load_chain(lexer, options, memory, header_offset)
            .and_then(|()| match &table.trailer {
                Some(trailer) if trailer.has_root() => Ok(()),
                Some(_) => Err(ParseError::InvalidTrailer("missing /Root".to_string())),
                None => Err(ParseError::InvalidTrailer("no trailer found".to_string())),
            });

        match outcome {
            Ok(()) => {
                table.transition(XRefState::Ready);
                Ok(table)
            }
            Err(e) if options.xref_recovery => {
                warn!("Cross-reference table unusable ({e}), rebuilding by scan");
                XRefRecovery::new().rebuild(lexer, options, memory, &mut table)?;
                Ok(table)
            }
            Err(e) => Err(e),
        }
    }

    fn load_chain<S: ByteSource>(
        &mut self,
        lexer: &mut Lexer<S>,
        options: &ParseOptions,
        memory: &mut MemoryLimitsHandler,
        header_offset: u64,
    ) -> ParseResult<()> {
        let start = find_startxref(lexer)?;
        let mut visited = HashSet::new();
        let mut next = Some(start);

        while let Some(offset) = next {
            if !visited.insert(offset) {
                warn!("Xref chain loops back to offset {offset}, stopping");
                break;
            }

            let mut section = HashMap::new();
            let trailer =
                self.load_shifted(lexer, offset, header_offset, options, memory, &mut section)?;

            if let Some(stm) = trailer.xref_stm {
                if visited.insert(stm) {
                    let mut hybrid = HashMap::new();
                    self.load_shifted(lexer, stm, header_offset, options, memory, &mut hybrid)?;
                    for (number, entry) in hybrid {
                        // The stream refines the table of the same update
                        match section.get(&number) {
                            None | Some(XRefEntry::Free { .. }) => {
                                section.insert(number, entry);
                            }
                            Some(_) => {}
                        }
                    }
                }
            }

            // Newer sections were loaded first and win
            for (number, entry) in section {
                self.entries.entry(number).or_insert(entry);
            }

            next = trailer.prev;
            self.trailers.add_previous(trailer);
        }

        self.trailer = self.trailers.merged();
        Ok(())
    }

    /// Load the section at `offset`, retrying at `offset + header_offset`
    fn load_shifted<S: ByteSource>(
        &mut self,
        lexer: &mut Lexer<S>,
        offset: u64,
        header_offset: u64,
        options: &ParseOptions,
        memory: &mut MemoryLimitsHandler,
        section: &mut HashMap<u32, XRefEntry>,
    ) -> ParseResult<PdfTrailer> {
        match self.load_section(lexer, offset, options, memory, section) {
            Err(e) if header_offset > 0 => {
                debug!("No xref section at {offset} ({e}), trying {header_offset} bytes later");
                section.clear();
                self.load_section(lexer, offset + header_offset, options, memory, section)
            }
            result => result,
        }
    }

    fn load_section<S: ByteSource>(
        &mut self,
        lexer: &mut Lexer<S>,
        offset: u64,
        options: &ParseOptions,
        memory: &mut MemoryLimitsHandler,
        section: &mut HashMap<u32, XRefEntry>,
    ) -> ParseResult<PdfTrailer> {
        if offset >= lexer.len() {
            return Err(ParseError::InvalidXRef(format!(
                "offset {offset} beyond end of file"
            )));
        }
        lexer.seek(offset)?;

        let trailer = match lexer.peek_token()? {
            Token::Keyword(Keyword::XRef) => {
                lexer.next_token()?;
                self.transition(XRefState::ParsingXRefTable);
                parse_table_section(lexer, offset, options, section)?
            }
            Token::Integer(_) => {
                self.transition(XRefState::ParsingXRefStream);
                parse_stream_section(lexer, offset, options, memory, section)?
            }
            other => {
                return Err(ParseError::InvalidXRef(format!(
                    "expected xref at offset {offset}, found {other:?}"
                )))
            }
        };

        self.transition(XRefState::TrailerFound);
        Ok(trailer)
    }

    pub(crate) fn transition(&mut self, next: XRefState) {
        trace!("xref state {:?} -> {next:?}", self.state());
        self.history.push(next);
    }

    /// Forget everything read so far and enter the rebuild state
    pub(crate) fn begin_rebuild(&mut self) {
        self.entries.clear();
        self.trailers = TrailerChain::new();
        self.trailer = None;
        self.transition(XRefState::RebuildScanning);
    }

    /// Current state
    pub fn state(&self) -> XRefState {
        self.history
            .last()
            .copied()
            .unwrap_or(XRefState::Unbuilt)
    }

    /// Every state the table went through, oldest first
    pub fn history(&self) -> &[XRefState] {
        &self.history
    }

    /// Whether the table came from scanning rather than from the file's xref
    pub fn is_rebuilt(&self) -> bool {
        self.history.contains(&XRefState::RebuildScanning)
    }

    /// What the last rebuild found, if there was one
    pub fn recovery_stats(&self) -> Option<&RecoveryStats> {
        self.recovery.as_ref()
    }

    pub(crate) fn set_recovery_stats(&mut self, stats: RecoveryStats) {
        self.recovery = Some(stats);
    }

    /// Get an xref entry by object number
    pub fn get_entry(&self, number: u32) -> Option<&XRefEntry> {
        self.entries.get(&number)
    }

    pub(crate) fn set_entry(&mut self, number: u32, entry: XRefEntry) {
        self.entries.insert(number, entry);
    }

    /// The effective trailer
    pub fn trailer(&self) -> Option<&PdfTrailer> {
        self.trailer.as_ref()
    }

    pub(crate) fn set_trailer(&mut self, trailer: PdfTrailer) {
        self.trailer = Some(trailer);
    }

    /// Trailers of the sections read, newest first
    pub fn trailer_chain(&self) -> &TrailerChain {
        &self.trailers
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (&u32, &XRefEntry)> {
        self.entries.iter()
    }

    pub fn max_object_number(&self) -> Option<u32> {
        self.entries.keys().copied().max()
    }
}

/// Find the offset named by the last `startxref` in the file
pub fn find_startxref<S: ByteSource>(lexer: &mut Lexer<S>) -> ParseResult<u64> {
    let len = lexer.len();
    let tail_start = len.saturating_sub(STARTXREF_SEARCH_LEN);
    lexer.seek(tail_start)?;
    let tail = lexer.read_bytes((len - tail_start) as usize)?;

    let found = tail
        .windows(STARTXREF.len())
        .rposition(|w| w == STARTXREF)
        .ok_or_else(|| ParseError::InvalidXRef("startxref not found".to_string()))?;

    lexer.seek(tail_start + (found + STARTXREF.len()) as u64)?;
    match lexer.next_token()? {
        Token::Integer(offset) if offset >= 0 => Ok(offset as u64),
        other => Err(ParseError::InvalidXRef(format!(
            "startxref followed by {other:?}"
        ))),
    }
}

/// Parse the subsections of a classic table and its trailer. The `xref`
/// keyword has been consumed.
fn parse_table_section<S: ByteSource>(
    lexer: &mut Lexer<S>,
    offset: u64,
    options: &ParseOptions,
    section: &mut HashMap<u32, XRefEntry>,
) -> ParseResult<PdfTrailer> {
    loop {
        match lexer.next_token()? {
            Token::Integer(first) => {
                let count = match lexer.next_token()? {
                    Token::Integer(count) => count,
                    other => {
                        return Err(ParseError::InvalidXRef(format!(
                            "expected subsection count, found {other:?}"
                        )))
                    }
                };
                let (first, count) = match (u32::try_from(first), u32::try_from(count)) {
                    (Ok(first), Ok(count)) => (first, count),
                    _ => {
                        return Err(ParseError::InvalidXRef(format!(
                            "invalid subsection header {first} {count}"
                        )))
                    }
                };
                for i in 0..count {
                    let entry = read_table_entry(lexer)?;
                    let number = first.checked_add(i).ok_or_else(|| {
                        ParseError::InvalidXRef("object number overflow".to_string())
                    })?;
                    section.insert(number, entry);
                }
            }
            Token::Keyword(Keyword::Trailer) => break,
            Token::Comment(_) => continue,
            other => {
                return Err(ParseError::InvalidXRef(format!(
                    "unexpected {other:?} in xref table"
                )))
            }
        }
    }

    let mut lengths = DirectLengths;
    match ObjectParser::with_options(lexer, &mut lengths, options).parse_object()? {
        PdfObject::Dictionary(dict) => Ok(PdfTrailer::from_dict(dict, Some(offset))),
        other => Err(ParseError::InvalidTrailer(format!(
            "expected dictionary, found {}",
            other.type_name()
        ))),
    }
}

/// One `nnnnnnnnnn ggggg n` line
fn read_table_entry<S: ByteSource>(lexer: &mut Lexer<S>) -> ParseResult<XRefEntry> {
    let bad = |what: &str, token: Token| {
        ParseError::InvalidXRef(format!("invalid xref entry {what}: {token:?}"))
    };

    let offset = match lexer.next_token()? {
        Token::Integer(v) if v >= 0 => v as u64,
        other => return Err(bad("offset", other)),
    };
    let generation = match lexer.next_token()? {
        Token::Integer(g) if g >= 0 => u16::try_from(g).unwrap_or(u16::MAX),
        other => return Err(bad("generation", other)),
    };
    match lexer.next_token()? {
        Token::Keyword(Keyword::Other(flag)) if flag == "n" => {
            Ok(XRefEntry::InUse { offset, generation })
        }
        Token::Keyword(Keyword::Other(flag)) if flag == "f" => Ok(XRefEntry::Free {
            next: u32::try_from(offset).unwrap_or(0),
            generation,
        }),
        other => Err(bad("flag", other)),
    }
}

/// Parse a `/Type /XRef` stream object; its dictionary is the trailer
fn parse_stream_section<S: ByteSource>(
    lexer: &mut Lexer<S>,
    offset: u64,
    options: &ParseOptions,
    memory: &mut MemoryLimitsHandler,
    section: &mut HashMap<u32, XRefEntry>,
) -> ParseResult<PdfTrailer> {
    let mut lengths = DirectLengths;
    let (id, object) =
        ObjectParser::with_options(lexer, &mut lengths, options).parse_indirect_object()?;

    let stream = match object {
        PdfObject::Stream(stream) => stream,
        other => {
            return Err(ParseError::InvalidXRef(format!(
                "object {id} at {offset} is a {}, not an xref stream",
                other.type_name()
            )))
        }
    };
    match stream.dict.get_type() {
        Some("XRef") => {}
        Some(other) => {
            return Err(ParseError::InvalidXRef(format!(
                "object {id} has /Type /{other}, not /XRef"
            )))
        }
        None => warn!("Xref stream {id} has no /Type"),
    }

    let chain = FilterChain::from_dict(&stream.dict)?;
    let data = filters::decode(&stream.data, &chain, &stream.dict, memory)?;
    let xref_stream = XRefStream::new(stream.dict, data)?;
    for (number, entry) in xref_stream.to_xref_entries()? {
        section.insert(number, entry);
    }

    Ok(PdfTrailer::from_dict(xref_stream.dict, Some(offset)))
}
