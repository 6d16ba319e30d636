//! Indirect object resolution
//!
//! [`PdfReader`] owns a byte source together with everything built from it:
//! the cross-reference table, the cache of resolved objects, decoded object
//! streams and the memory accounting for stream decoding. Objects are parsed
//! lazily the first time they are resolved.
//!
//! A reader is used from one thread at a time; every operation that may
//! touch the source takes `&mut self`. `PdfReader<S>` is `Send` whenever `S`
//! is, so independent readers can run on separate threads.

use super::filters::{self, FilterChain};
use super::header::{PdfHeader, PdfVersion};
use super::lexer::Lexer;
use super::object_stream::ObjectStream;
use super::objects::{
    DirectLengths, LengthResolver, ObjectId, ObjectParser, PdfArray, PdfDictionary, PdfObject,
    PdfStream,
};
use super::source::{ByteSource, MemorySource, SeekableSource};
use super::stack_safe::StackSafeContext;
use super::trailer::PdfTrailer;
use super::xref::{XRefEntry, XRefTable};
use super::{ParseError, ParseOptions, ParseResult};
use crate::memory::{CacheStats, MemoryLimitsHandler, MemoryStats, ObjectCache};
use crate::recovery::XRefRecovery;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Stream dictionary entries that may be indirect and are needed to decode
const FILTER_KEYS: [&str; 2] = ["Filter", "DecodeParms"];

/// Lazy reader of the objects in one PDF source
pub struct PdfReader<S> {
    lexer: Lexer<S>,
    options: ParseOptions,
    header: PdfHeader,
    xref: XRefTable,
    trailer: PdfTrailer,
    /// Resolved objects, shared until released
    cache: ObjectCache,
    /// Decoded object streams by object number
    object_streams: HashMap<u32, ObjectStream>,
    /// Reference chain depth and the ids currently being resolved
    context: StackSafeContext,
    memory: MemoryLimitsHandler,
}

impl PdfReader<SeekableSource<File>> {
    /// Open a PDF file with lenient options
    pub fn open<P: AsRef<Path>>(path: P) -> ParseResult<Self> {
        Self::open_with_options(path, ParseOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ParseOptions) -> ParseResult<Self> {
        let file = File::open(path)?;
        Self::with_options(SeekableSource::new(file)?, options)
    }
}

impl PdfReader<MemorySource> {
    /// Read a PDF held in memory
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> ParseResult<Self> {
        Self::with_options(MemorySource::new(data), ParseOptions::default())
    }
}

impl<S: ByteSource> PdfReader<S> {
    /// Create a reader with lenient options
    pub fn new(source: S) -> ParseResult<Self> {
        Self::with_options(source, ParseOptions::default())
    }

    /// Create a reader: parse the header and build the cross-reference
    /// table. No object is parsed until it is resolved.
    pub fn with_options(source: S, options: ParseOptions) -> ParseResult<Self> {
        let mut lexer = Lexer::new(source);
        lexer.set_nul_is_whitespace(options.nul_is_whitespace);

        let header = PdfHeader::parse(lexer.source_mut(), options.lenient_syntax)?;
        let mut memory = MemoryLimitsHandler::new(options.memory_limits);
        let xref = XRefTable::load(&mut lexer, &options, &mut memory, header.offset)?;

        let trailer = xref
            .trailer()
            .cloned()
            .ok_or_else(|| ParseError::InvalidTrailer("no trailer found".to_string()))?;
        if trailer.is_encrypted() {
            warn!("Document is encrypted; strings and streams are returned as stored");
        }

        debug!(
            "Opened PDF {} with {} cross-reference entries{}",
            header.version,
            xref.len(),
            if xref.is_rebuilt() { " (rebuilt)" } else { "" }
        );

        Ok(Self {
            lexer,
            context: StackSafeContext::with_max_depth(options.max_depth),
            options,
            header,
            xref,
            trailer,
            cache: ObjectCache::new(),
            object_streams: HashMap::new(),
            memory,
        })
    }

    pub fn version(&self) -> PdfVersion {
        self.header.version
    }

    pub fn header(&self) -> &PdfHeader {
        &self.header
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn trailer(&self) -> &PdfTrailer {
        &self.trailer
    }

    pub fn xref(&self) -> &XRefTable {
        &self.xref
    }

    pub fn cross_reference_entry(&self, number: u32) -> Option<XRefEntry> {
        self.xref.get_entry(number).copied()
    }

    /// The document catalog (`/Root` of the trailer)
    pub fn catalog(&mut self) -> ParseResult<PdfDictionary> {
        let root = self.trailer.root()?;
        let object = self.resolve(root)?;
        object.as_dict().cloned().ok_or_else(|| {
            ParseError::InvalidTrailer(format!(
                "/Root {root} is a {}, not a dictionary",
                object.type_name()
            ))
        })
    }

    /// Resolve an indirect object.
    ///
    /// Objects that do not exist (no entry, a free entry or another
    /// generation) resolve to `Null`, as does a reference back into an
    /// object that is still being resolved. The returned `Arc` is shared
    /// with the cache until [`release_object`](Self::release_object).
    pub fn resolve(&mut self, id: ObjectId) -> ParseResult<Arc<PdfObject>> {
        if let Some(object) = self.cache.get(id) {
            return Ok(object);
        }

        if let Err(e) = self.context.begin_resolution(id) {
            warn!("{e}, resolving {id} to null");
            return Ok(Arc::new(PdfObject::Null));
        }
        let result = self.load_object(id).and_then(|object| match object {
            PdfObject::Reference(target) => self.follow(id, target),
            other => Ok(Arc::new(other)),
        });
        self.context.end_resolution(id);

        let object = result?;
        self.cache.put(id, Arc::clone(&object));
        Ok(object)
    }

    /// `id` holds nothing but a reference to `target`
    fn follow(&mut self, id: ObjectId, target: ObjectId) -> ParseResult<Arc<PdfObject>> {
        trace!("Object {id} refers on to {target}");
        self.context.enter(self.lexer.position())?;
        let result = self.resolve(target);
        self.context.exit();
        result
    }

    /// Dereference `object` if it is a reference, otherwise share a copy
    pub fn resolve_object(&mut self, object: &PdfObject) -> ParseResult<Arc<PdfObject>> {
        match object {
            PdfObject::Reference(id) => self.resolve(*id),
            other => Ok(Arc::new(other.clone())),
        }
    }

    /// Drop a resolved object, and the decoded object stream with that
    /// number if there is one. The next resolution parses it again.
    pub fn release_object(&mut self, id: ObjectId) -> bool {
        let released = self.cache.remove(id).is_some();
        let stream_released = self.object_streams.remove(&id.number).is_some();
        if stream_released {
            trace!("Released object stream {}", id.number);
        }
        released || stream_released
    }

    fn load_object(&mut self, id: ObjectId) -> ParseResult<PdfObject> {
        match self.xref.get_entry(id.number).copied() {
            None => {
                debug!("Object {id} has no cross-reference entry, resolving to null");
                Ok(PdfObject::Null)
            }
            Some(XRefEntry::Free { .. }) => {
                debug!("Object {id} is free, resolving to null");
                Ok(PdfObject::Null)
            }
            Some(entry) if entry.generation() != id.generation => {
                debug!(
                    "Object {id} requested but generation {} is current, resolving to null",
                    entry.generation()
                );
                Ok(PdfObject::Null)
            }
            Some(XRefEntry::InUse { offset, .. }) => self.load_in_use(id, offset),
            Some(XRefEntry::Compressed { stream, index }) => {
                self.load_compressed(id, stream, index)
            }
        }
    }

    fn load_in_use(&mut self, id: ObjectId, offset: u64) -> ParseResult<PdfObject> {
        match self.parse_expected(id, offset) {
            Err(e @ ParseError::InvalidObjectHeader { .. }) if self.can_rebuild() => {
                warn!("Object {id} not found at offset {offset} ({e}), rebuilding cross-reference table");
                self.rebuild_xref()?;
                self.load_object(id)
            }
            result => result,
        }
    }

    /// Parse the object at `offset` and check it is `id`. Sections written
    /// relative to a shifted header are tried at the shifted offset too.
    fn parse_expected(&mut self, id: ObjectId, offset: u64) -> ParseResult<PdfObject> {
        let result = self.parse_checked(id, offset);
        let shift = self.header.offset;
        if shift > 0 && matches!(result, Err(ParseError::InvalidObjectHeader { .. })) {
            trace!("Trying object {id} at {offset} + {shift}");
            return self
                .parse_checked(id, offset.saturating_add(shift))
                .or(result);
        }
        result
    }

    fn parse_checked(&mut self, id: ObjectId, offset: u64) -> ParseResult<PdfObject> {
        let (found, object) = self.parse_object_at(offset)?;
        if found != id {
            return Err(ParseError::InvalidObjectHeader {
                offset,
                message: format!("expected object {id}, found {found}"),
            });
        }
        Ok(object)
    }

    /// Parse the indirect object whose `N G obj` header starts at `offset`.
    ///
    /// The result is not cached.
    pub fn parse_object_at(&mut self, offset: u64) -> ParseResult<(ObjectId, PdfObject)> {
        if offset >= self.lexer.len() {
            return Err(ParseError::InvalidObjectHeader {
                offset,
                message: format!("offset beyond end of data ({} bytes)", self.lexer.len()),
            });
        }
        self.lexer.seek(offset)?;
        let mut lengths = IndirectLengths {
            xref: &self.xref,
            cache: &self.cache,
            header_offset: self.header.offset,
        };
        ObjectParser::with_options(&mut self.lexer, &mut lengths, &self.options)
            .parse_indirect_object()
    }

    fn load_compressed(&mut self, id: ObjectId, stream: u32, index: u32) -> ParseResult<PdfObject> {
        if !self.object_streams.contains_key(&stream) {
            let loaded = self.load_object_stream(stream)?;
            self.object_streams.insert(stream, loaded);
        }
        let object_stream = self
            .object_streams
            .get_mut(&stream)
            .ok_or_else(|| ParseError::InvalidXRef(format!("object stream {stream} not loaded")))?;

        let index = usize::try_from(index).unwrap_or(usize::MAX);
        match object_stream.get_object(index, &self.options) {
            Ok((number, object)) if number == id.number => Ok(object),
            outcome => {
                if let Ok((number, _)) = outcome {
                    debug!("Object stream {stream} holds {number} at index {index}, not {id}");
                }
                match object_stream.find_object(id.number, &self.options)? {
                    Some(object) => Ok(object),
                    None => {
                        debug!("Object {id} missing from object stream {stream}, resolving to null");
                        Ok(PdfObject::Null)
                    }
                }
            }
        }
    }

    fn load_object_stream(&mut self, number: u32) -> ParseResult<ObjectStream> {
        let container = self.resolve(ObjectId::new(number, 0))?;
        let stream = container.as_stream().ok_or_else(|| {
            ParseError::InvalidXRef(format!(
                "object stream {number} is a {}",
                container.type_name()
            ))
        })?;
        let data = self.decode_stream(stream)?;
        let object_stream = ObjectStream::new(&stream.dict, data)?;
        trace!("Loaded object stream {number} with {} objects", object_stream.len());
        Ok(object_stream)
    }

    fn can_rebuild(&self) -> bool {
        self.options.xref_recovery && !self.xref.is_rebuilt()
    }

    fn rebuild_xref(&mut self) -> ParseResult<()> {
        XRefRecovery::new().rebuild(&mut self.lexer, &self.options, &mut self.memory, &mut self.xref)?;
        if let Some(trailer) = self.xref.trailer() {
            self.trailer = trailer.clone();
        }
        Ok(())
    }

    /// Decode a stream's payload through its filter chain.
    ///
    /// Indirect `/Filter` and `/DecodeParms` values are resolved first. The
    /// decoded size counts against this reader's memory limits.
    pub fn decode_stream(&mut self, stream: &PdfStream) -> ParseResult<Vec<u8>> {
        let dict = self.with_direct_filters(&stream.dict)?;
        let chain = FilterChain::from_dict(&dict)?;
        if let Some(origin) = stream.origin {
            trace!("Decoding stream {origin} through {} filters", chain.len());
        }
        filters::decode(&stream.data, &chain, &dict, &mut self.memory)
    }

    /// Resolve `id` and decode it as a stream
    pub fn stream_data(&mut self, id: ObjectId) -> ParseResult<Vec<u8>> {
        let object = self.resolve(id)?;
        match object.as_stream() {
            Some(stream) => self.decode_stream(stream),
            None => Err(ParseError::UnexpectedToken {
                expected: format!("stream for {id}"),
                found: object.type_name().to_string(),
            }),
        }
    }

    fn with_direct_filters<'d>(
        &mut self,
        dict: &'d PdfDictionary,
    ) -> ParseResult<Cow<'d, PdfDictionary>> {
        let indirect = FILTER_KEYS
            .iter()
            .any(|key| dict.get(key).is_some_and(holds_reference));
        if !indirect {
            return Ok(Cow::Borrowed(dict));
        }

        let mut direct = dict.clone();
        for key in FILTER_KEYS {
            if let Some(value) = dict.get(key) {
                let value = self.direct_value(value)?;
                direct.insert(key, value);
            }
        }
        Ok(Cow::Owned(direct))
    }

    /// Resolve a value and, if it is an array, its elements
    fn direct_value(&mut self, value: &PdfObject) -> ParseResult<PdfObject> {
        let value = match value {
            PdfObject::Reference(id) => (*self.resolve(*id)?).clone(),
            other => other.clone(),
        };
        match value {
            PdfObject::Array(items) => {
                let mut direct = PdfArray::new();
                for item in items.0 {
                    match item {
                        PdfObject::Reference(id) => {
                            let resolved = self.resolve(id)?;
                            direct.push((*resolved).clone());
                        }
                        other => direct.push(other),
                    }
                }
                Ok(PdfObject::Array(direct))
            }
            other => Ok(other),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Decoded stream bytes charged so far
    pub fn memory_used(&self) -> usize {
        self.memory.used()
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    pub fn into_source(self) -> S {
        self.lexer.into_inner()
    }
}

fn holds_reference(value: &PdfObject) -> bool {
    match value {
        PdfObject::Reference(_) => true,
        PdfObject::Array(items) => items.iter().any(|item| item.as_reference().is_some()),
        _ => false,
    }
}

/// Reads indirect `/Length` values through the cross-reference table while
/// a stream is being parsed.
///
/// Lengths stored inside object streams are not read; those streams fall
/// back to scanning for `endstream`.
struct IndirectLengths<'a> {
    xref: &'a XRefTable,
    cache: &'a ObjectCache,
    header_offset: u64,
}

impl<S: ByteSource> LengthResolver<S> for IndirectLengths<'_> {
    fn resolve_length(&mut self, lexer: &mut Lexer<S>, id: ObjectId) -> Option<u64> {
        let value = match self.cache.peek(id) {
            Some(object) => object.as_integer(),
            None => self.read_length(lexer, id),
        };
        value.and_then(|v| u64::try_from(v).ok())
    }
}

impl IndirectLengths<'_> {
    fn read_length<S: ByteSource>(&self, lexer: &mut Lexer<S>, id: ObjectId) -> Option<i64> {
        let offset = match self.xref.get_entry(id.number)? {
            XRefEntry::InUse { offset, generation } if *generation == id.generation => *offset,
            entry => {
                trace!("/Length {id} has entry {entry:?}, not read");
                return None;
            }
        };

        let saved = lexer.position();
        let mut value = Self::integer_at(lexer, offset, id);
        if value.is_none() && self.header_offset > 0 {
            value = Self::integer_at(lexer, offset.saturating_add(self.header_offset), id);
        }
        lexer.seek(saved).ok()?;
        value
    }

    fn integer_at<S: ByteSource>(lexer: &mut Lexer<S>, offset: u64, id: ObjectId) -> Option<i64> {
        if offset >= lexer.len() {
            return None;
        }
        lexer.seek(offset).ok()?;
        let mut direct = DirectLengths;
        match ObjectParser::new(lexer, &mut direct).parse_indirect_object() {
            Ok((found, PdfObject::Integer(n))) if found == id => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLimits;
    use crate::parser::test_helpers::{create_minimal_pdf, PdfBuilder};
    use crate::parser::{ErrorKind, XRefState};
    use pretty_assertions::assert_eq;

    fn replace(data: &mut Vec<u8>, from: &[u8], to: &[u8]) {
        let at = data
            .windows(from.len())
            .position(|w| w == from)
            .expect("pattern present");
        data.splice(at..at + from.len(), to.iter().copied());
    }

    #[test]
    fn test_reader_construction() {
        let reader = PdfReader::from_bytes(create_minimal_pdf()).unwrap();
        assert_eq!(reader.version(), PdfVersion::new(1, 4));
        assert!(!reader.xref().is_rebuilt());
        assert_eq!(reader.xref().state(), XRefState::Ready);
        assert_eq!(reader.trailer().root().unwrap(), ObjectId::new(1, 0));
    }

    #[test]
    fn test_reader_versions() {
        for (text, version) in [
            ("1.0", PdfVersion::new(1, 0)),
            ("1.7", PdfVersion::new(1, 7)),
            ("2.0", PdfVersion::new(2, 0)),
        ] {
            let mut builder = PdfBuilder::with_version(text);
            builder.object(1, b"<< /Type /Catalog >>");
            let reader = PdfReader::from_bytes(builder.finish(1)).unwrap();
            assert_eq!(reader.version(), version);
        }
    }

    #[test]
    fn test_reader_catalog() {
        let mut reader = PdfReader::from_bytes(create_minimal_pdf()).unwrap();
        let catalog = reader.catalog().unwrap();
        assert_eq!(catalog.get_type(), Some("Catalog"));
        assert_eq!(
            catalog.get("Pages").and_then(PdfObject::as_reference),
            Some(ObjectId::new(2, 0))
        );
    }

    #[test]
    fn test_resolve_returns_same_instance() {
        let mut reader = PdfReader::from_bytes(create_minimal_pdf()).unwrap();
        let id = ObjectId::new(2, 0);
        let first = reader.resolve(id).unwrap();
        let second = reader.resolve(id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = reader.cache_stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_release_reparses() {
        let mut reader = PdfReader::from_bytes(create_minimal_pdf()).unwrap();
        let id = ObjectId::new(2, 0);
        let first = reader.resolve(id).unwrap();

        assert!(reader.release_object(id));
        assert!(!reader.release_object(id));

        let again = reader.resolve(id).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(*first, *again);
    }

    #[test]
    fn test_reference_cycle_resolves_to_null() {
        let mut builder = PdfBuilder::new();
        builder.object(1, b"<< /Type /Catalog >>");
        builder.object(5, b"7 0 R");
        builder.object(7, b"5 0 R");
        let mut reader = PdfReader::from_bytes(builder.finish(1)).unwrap();

        assert!(reader.resolve(ObjectId::new(5, 0)).unwrap().is_null());
        assert!(reader.resolve(ObjectId::new(7, 0)).unwrap().is_null());
    }

    #[test]
    fn test_reference_chain_is_followed() {
        let mut builder = PdfBuilder::new();
        builder.object(1, b"<< /Type /Catalog >>");
        builder.object(2, b"3 0 R");
        builder.object(3, b"(end of chain)");
        let mut reader = PdfReader::from_bytes(builder.finish(1)).unwrap();

        let object = reader.resolve(ObjectId::new(2, 0)).unwrap();
        assert_eq!(object.as_string().unwrap().as_bytes(), b"end of chain");
    }

    #[test]
    fn test_missing_free_and_wrong_generation_are_null() {
        let mut reader = PdfReader::from_bytes(create_minimal_pdf()).unwrap();
        assert!(reader.resolve(ObjectId::new(40, 0)).unwrap().is_null());
        assert!(reader.resolve(ObjectId::new(0, 65535)).unwrap().is_null());
        assert!(reader.resolve(ObjectId::new(2, 3)).unwrap().is_null());
    }

    #[test]
    fn test_resolve_object_passes_direct_values_through() {
        let mut reader = PdfReader::from_bytes(create_minimal_pdf()).unwrap();
        let direct = reader.resolve_object(&PdfObject::Integer(3)).unwrap();
        assert_eq!(*direct, PdfObject::Integer(3));

        let pages = reader
            .resolve_object(&PdfObject::Reference(ObjectId::new(2, 0)))
            .unwrap();
        assert_eq!(pages.as_dict().unwrap().get_type(), Some("Pages"));
    }

    #[test]
    fn test_parse_object_at() {
        let mut builder = PdfBuilder::new();
        builder.object(1, b"<< /Type /Catalog >>");
        builder.object(2, b"[1 2 3]");
        let offset = builder.offset_of(2);
        let mut reader = PdfReader::from_bytes(builder.finish(1)).unwrap();

        let (id, object) = reader.parse_object_at(offset).unwrap();
        assert_eq!(id, ObjectId::new(2, 0));
        assert_eq!(object.as_array().unwrap().len(), 3);
        assert_eq!(reader.cache_stats().size, 0);

        let err = reader.parse_object_at(1 << 40).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_indirect_length() {
        let mut builder = PdfBuilder::new();
        builder.object(1, b"<< /Type /Catalog >>");
        builder.object(4, b"<< /Length 5 0 R >>\nstream\nhello endstream world\nendstream");
        builder.object(5, b"21");
        let mut reader = PdfReader::from_bytes(builder.finish(1)).unwrap();

        // Scanning alone would stop at the first "endstream"
        let data = reader.stream_data(ObjectId::new(4, 0)).unwrap();
        assert_eq!(data, b"hello endstream world");
    }

    #[test]
    fn test_stream_origin_and_indirect_filter() {
        let mut builder = PdfBuilder::new();
        builder.object(1, b"<< /Type /Catalog >>");
        builder.object(3, b"/ASCIIHexDecode");
        builder.stream_object(4, "/Filter 3 0 R", b"48656C6C6F>");
        let mut reader = PdfReader::from_bytes(builder.finish(1)).unwrap();

        let object = reader.resolve(ObjectId::new(4, 0)).unwrap();
        let stream = object.as_stream().unwrap();
        assert_eq!(stream.origin, Some(ObjectId::new(4, 0)));
        assert_eq!(reader.decode_stream(stream).unwrap(), b"Hello");
        assert_eq!(reader.memory_used(), 5);
    }

    #[test]
    fn test_stream_data_of_non_stream() {
        let mut reader = PdfReader::from_bytes(create_minimal_pdf()).unwrap();
        assert!(reader.stream_data(ObjectId::new(2, 0)).is_err());
    }

    #[test]
    fn test_memory_limit_per_reader() {
        let mut builder = PdfBuilder::new();
        builder.object(1, b"<< /Type /Catalog >>");
        builder.stream_object(2, "", b"0123456789");
        let data = builder.finish(1);

        let options =
            ParseOptions::default().with_memory_limits(MemoryLimits::default().with_max_stream_size(4));
        let mut small = PdfReader::with_options(MemorySource::new(data.clone()), options).unwrap();
        let err = small.stream_data(ObjectId::new(2, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MemoryLimit);

        let mut large = PdfReader::from_bytes(data).unwrap();
        assert_eq!(large.stream_data(ObjectId::new(2, 0)).unwrap(), b"0123456789");
    }

    #[test]
    fn test_bad_offset_triggers_rebuild() {
        let mut builder = PdfBuilder::new();
        builder.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");
        builder.object(2, b"<< /Type /Pages /Count 0 >>");
        let offset = builder.offset_of(2);
        let mut data = builder.finish(1);
        replace(
            &mut data,
            format!("{offset:010} 00000 n").as_bytes(),
            format!("{:010} 00000 n", offset + 3).as_bytes(),
        );

        let mut reader = PdfReader::from_bytes(data.clone()).unwrap();
        assert!(!reader.xref().is_rebuilt());
        let pages = reader.resolve(ObjectId::new(2, 0)).unwrap();
        assert_eq!(pages.as_dict().unwrap().get_type(), Some("Pages"));
        assert!(reader.xref().is_rebuilt());

        let mut strict = PdfReader::with_options(MemorySource::new(data), ParseOptions::strict()).unwrap();
        let err = strict.resolve(ObjectId::new(2, 0)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidObjectHeader { .. }));
    }

    #[test]
    fn test_encrypted_trailer_still_opens() {
        let mut builder = PdfBuilder::new();
        builder.object(1, b"<< /Type /Catalog >>");
        builder.object(2, b"<< /Filter /Standard /V 1 >>");
        let data = builder.finish_with_trailer(b"<< /Size 3 /Root 1 0 R /Encrypt 2 0 R >>");
        let reader = PdfReader::from_bytes(data).unwrap();
        assert!(reader.trailer().is_encrypted());
    }

    #[test]
    fn test_empty_source() {
        let err = PdfReader::from_bytes(Vec::new()).err().unwrap();
        assert!(matches!(err, ParseError::EmptyFile));
    }

    #[test]
    fn test_reader_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<PdfReader<MemorySource>>();
        assert_send::<PdfReader<SeekableSource<File>>>();
    }
}
