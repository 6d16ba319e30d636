//! XRef recovery for corrupted PDF files
//!
//! Rebuilds the cross-reference table when it is missing or unusable by
//! scanning the whole file for `N G obj` headers and `trailer` dictionaries.

use crate::memory::MemoryLimitsHandler;
use crate::parser::filters::{self, FilterChain};
use crate::parser::lexer::{is_delimiter, is_whitespace, Lexer};
use crate::parser::object_stream::ObjectStream;
use crate::parser::objects::{
    DirectLengths, ObjectId, ObjectParser, PdfDictionary, PdfObject, PdfStream,
};
use crate::parser::source::ByteSource;
use crate::parser::trailer::PdfTrailer;
use crate::parser::xref::{XRefEntry, XRefState, XRefTable};
use crate::parser::{ParseError, ParseOptions, ParseResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Bytes scanned per read
const SCAN_CHUNK: usize = 1024 * 1024;
/// Extra bytes read past each chunk so keywords on the boundary are seen
const SCAN_OVERLAP: usize = 64;

const OBJ: &[u8] = b"obj";
const TRAILER: &[u8] = b"trailer";

/// Recovery statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Number of object headers found
    pub objects_found: usize,
    /// Number of objects indexed from object streams
    pub objects_in_streams: usize,
    /// Whether a trailer (or xref stream dictionary) with /Root was found
    pub trailer_found: bool,
    /// Whether /Root had to be taken from a Catalog object
    pub root_synthesized: bool,
}

/// XRef recovery engine
#[derive(Debug, Default)]
pub struct XRefRecovery {
    /// Object headers found during the scan, by offset
    headers: BTreeMap<u64, ObjectId>,
    /// Offsets just past each `trailer` keyword
    trailers: BTreeSet<u64>,
    stats: RecoveryStats,
}

/// What scanning learned about one object
struct ScannedObject {
    offset: u64,
    id: ObjectId,
}

impl XRefRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `table` with what a scan of the source finds.
    ///
    /// Later definitions of an object number win. The last trailer that has
    /// a `/Root` becomes the trailer; without one, a trailer is synthesized
    /// from the last `/Type /Catalog` object.
    pub fn rebuild<S: ByteSource>(
        mut self,
        lexer: &mut Lexer<S>,
        options: &ParseOptions,
        memory: &mut MemoryLimitsHandler,
        table: &mut XRefTable,
    ) -> ParseResult<RecoveryStats> {
        table.begin_rebuild();
        self.scan(lexer)?;

        // Offset order, so later headers overwrite earlier ones
        let mut winners: BTreeMap<u32, ScannedObject> = BTreeMap::new();
        for (&offset, &id) in &self.headers {
            winners.insert(id.number, ScannedObject { offset, id });
        }
        self.stats.objects_found = winners.len();

        if winners.is_empty() && self.trailers.is_empty() {
            return Err(ParseError::InvalidXRef(
                "no objects found while rebuilding".to_string(),
            ));
        }

        for object in winners.values() {
            table.set_entry(
                object.id.number,
                XRefEntry::InUse {
                    offset: object.offset,
                    generation: object.id.generation,
                },
            );
        }

        let mut by_offset: Vec<&ScannedObject> = winners.values().collect();
        by_offset.sort_by_key(|object| object.offset);

        let mut trailer_candidates: Vec<(u64, PdfDictionary)> = Vec::new();
        let mut catalog = None;
        let mut object_streams = Vec::new();

        for object in by_offset {
            lexer.seek(object.offset)?;
            let mut lengths = DirectLengths;
            let parsed =
                ObjectParser::with_options(lexer, &mut lengths, options).parse_indirect_object();
            let parsed = match parsed {
                Ok((_, parsed)) => parsed,
                Err(e) => {
                    debug!("Object {} at {} does not parse: {e}", object.id, object.offset);
                    continue;
                }
            };
            match parsed.as_dict().and_then(PdfDictionary::get_type) {
                Some("XRef") => {
                    if let Some(dict) = parsed.as_dict() {
                        trailer_candidates.push((object.offset, dict.clone()));
                    }
                }
                Some("Catalog") => catalog = Some(object.id),
                Some("ObjStm") => {
                    if let PdfObject::Stream(stream) = parsed {
                        object_streams.push((object.id.number, stream));
                    }
                }
                _ => {}
            }
        }

        for &offset in &self.trailers {
            lexer.seek(offset)?;
            let mut lengths = DirectLengths;
            match ObjectParser::with_options(lexer, &mut lengths, options).parse_object() {
                Ok(PdfObject::Dictionary(dict)) => trailer_candidates.push((offset, dict)),
                Ok(other) => debug!("trailer at {offset} followed by {}", other.type_name()),
                Err(e) => debug!("Unreadable trailer at {offset}: {e}"),
            }
        }
        trailer_candidates.sort_by_key(|(offset, _)| *offset);

        for (stream_number, stream) in object_streams {
            match Self::index_object_stream(stream_number, &stream, memory, table) {
                Ok(count) => self.stats.objects_in_streams += count,
                Err(e) => warn!("Skipping object stream {stream_number}: {e}"),
            }
        }

        let trailer = self.choose_trailer(trailer_candidates, catalog, table);
        table.set_trailer(trailer);
        table.set_recovery_stats(self.stats.clone());
        table.transition(XRefState::Ready);

        info!(
            "Rebuilt cross-reference table: {} objects, {} in object streams",
            self.stats.objects_found, self.stats.objects_in_streams
        );
        Ok(self.stats)
    }

    fn choose_trailer(
        &mut self,
        candidates: Vec<(u64, PdfDictionary)>,
        catalog: Option<ObjectId>,
        table: &XRefTable,
    ) -> PdfTrailer {
        let with_root = candidates
            .iter()
            .rposition(|(_, dict)| dict.get("Root").and_then(PdfObject::as_reference).is_some());

        let mut dict = match with_root {
            Some(index) => {
                self.stats.trailer_found = true;
                candidates[index].1.clone()
            }
            None => {
                let mut dict = candidates
                    .into_iter()
                    .last()
                    .map(|(_, dict)| dict)
                    .unwrap_or_default();
                match catalog {
                    Some(root) => {
                        warn!("No trailer with /Root, using catalog {root}");
                        dict.insert("Root", PdfObject::Reference(root));
                        self.stats.root_synthesized = true;
                    }
                    None => warn!("No trailer with /Root and no catalog object found"),
                }
                dict
            }
        };

        let scanned_size = table.max_object_number().map_or(0, |max| i64::from(max) + 1);
        let size = dict.get_integer("Size").unwrap_or(0).max(scanned_size);
        dict.insert("Size", PdfObject::Integer(size));
        // The chain that /Prev would lead to is what just failed
        dict.remove("Prev");
        dict.remove("XRefStm");

        PdfTrailer::from_dict(dict, None)
    }

    /// Add `Compressed` entries for objects of one object stream that have
    /// no direct definition
    fn index_object_stream(
        stream_number: u32,
        stream: &PdfStream,
        memory: &mut MemoryLimitsHandler,
        table: &mut XRefTable,
    ) -> ParseResult<usize> {
        let chain = FilterChain::from_dict(&stream.dict)?;
        let data = filters::decode(&stream.data, &chain, &stream.dict, memory)?;
        let stream = ObjectStream::new(&stream.dict, data)?;

        let mut added = 0;
        for (index, number) in stream.object_numbers() {
            if table.get_entry(number).is_none() {
                table.set_entry(
                    number,
                    XRefEntry::Compressed {
                        stream: stream_number,
                        index: index as u32,
                    },
                );
                added += 1;
            }
        }
        Ok(added)
    }

    /// Scan the whole source in overlapping chunks
    fn scan<S: ByteSource>(&mut self, lexer: &mut Lexer<S>) -> ParseResult<()> {
        let len = lexer.len();
        let mut chunk_start = 0u64;

        while chunk_start < len {
            lexer.seek(chunk_start)?;
            let buffer = lexer.read_bytes(SCAN_CHUNK + SCAN_OVERLAP)?;
            if buffer.is_empty() {
                break;
            }
            self.scan_buffer(&buffer, chunk_start);
            chunk_start += SCAN_CHUNK as u64;
        }

        Ok(())
    }

    fn scan_buffer(&mut self, buffer: &[u8], base_offset: u64) {
        for pos in find_keyword(buffer, OBJ) {
            if let Some((id, start)) = parse_header_before(buffer, pos) {
                self.headers.insert(base_offset + start as u64, id);
            }
        }
        for pos in find_keyword(buffer, TRAILER) {
            self.trailers.insert(base_offset + (pos + TRAILER.len()) as u64);
        }
    }
}

/// Positions of `keyword` standing as a token of its own
fn find_keyword<'a>(buffer: &'a [u8], keyword: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    buffer
        .windows(keyword.len())
        .enumerate()
        .filter(move |&(pos, window)| {
            window == keyword
                && (pos == 0 || is_whitespace(buffer[pos - 1]) || is_delimiter(buffer[pos - 1]))
                && buffer
                    .get(pos + keyword.len())
                    .map_or(true, |&b| is_whitespace(b) || is_delimiter(b))
        })
        .map(|(pos, _)| pos)
}

/// Read `N G` backwards from the `obj` keyword at `obj_pos`
fn parse_header_before(buffer: &[u8], obj_pos: usize) -> Option<(ObjectId, usize)> {
    let skip_space = |mut i: usize| {
        while i > 0 && is_whitespace(buffer[i - 1]) {
            i -= 1;
        }
        i
    };
    let skip_digits = |mut i: usize, max: usize| {
        let end = i;
        while i > 0 && buffer[i - 1].is_ascii_digit() && end - i < max {
            i -= 1;
        }
        i
    };

    let gen_end = skip_space(obj_pos);
    if gen_end == obj_pos {
        return None;
    }
    let gen_start = skip_digits(gen_end, 5);
    if gen_start == gen_end {
        return None;
    }

    let num_end = skip_space(gen_start);
    if num_end == gen_start {
        return None;
    }
    let num_start = skip_digits(num_end, 10);
    if num_start == num_end {
        return None;
    }
    if num_start > 0 {
        let before = buffer[num_start - 1];
        if !(is_whitespace(before) || is_delimiter(before)) {
            return None;
        }
    }

    let number = std::str::from_utf8(&buffer[num_start..num_end])
        .ok()?
        .parse()
        .ok()?;
    let generation = std::str::from_utf8(&buffer[gen_start..gen_end])
        .ok()?
        .parse()
        .ok()?;
    Some((ObjectId::new(number, generation), num_start))
}
