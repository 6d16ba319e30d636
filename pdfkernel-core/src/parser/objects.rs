//! PDF Object Parser
//!
//! Parses PDF objects from tokens according to ISO 32000-1 Section 7.3

use super::lexer::{Keyword, Lexer, Token};
use super::source::{find_forward, ByteSource};
use super::stack_safe::StackSafeContext;
use super::{ParseError, ParseOptions, ParseResult};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Identifies an indirect object: object number plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// PDF Name object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfName(pub String);

impl Borrow<str> for PdfName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Encoding of a text string, as announced by its byte-order mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    PdfDoc,
    Utf16Be,
    Utf8,
}

/// PDF String object
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString {
    bytes: Vec<u8>,
    hex: bool,
}

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

/// PDF Dictionary object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub HashMap<PdfName, PdfObject>);

/// PDF Stream object
///
/// `origin` names the indirect object the stream was read from. It is a key
/// into the owning reader, not a handle to it.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
    pub origin: Option<ObjectId>,
}

impl PdfStream {
    pub fn new(dict: PdfDictionary, data: Vec<u8>) -> Self {
        Self {
            dict,
            data,
            origin: None,
        }
    }

    /// Decode the stream data with default memory limits.
    ///
    /// Only direct `/Filter` and `/DecodeParms` values are honored; use
    /// [`PdfReader::decode_stream`](super::PdfReader::decode_stream) when they
    /// may be indirect.
    pub fn decode(&self) -> ParseResult<Vec<u8>> {
        super::filters::decode_stream(&self.data, &self.dict)
    }

    /// Get the raw (possibly compressed) stream data
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
}

/// PDF Object types
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(ObjectId),
}

impl PdfObject {
    /// Parse a direct PDF object from a lexer. Indirect stream lengths are
    /// not resolved; the stream boundary is found by scanning instead.
    pub fn parse<S: ByteSource>(lexer: &mut Lexer<S>) -> ParseResult<Self> {
        let mut lengths = DirectLengths;
        ObjectParser::new(lexer, &mut lengths).parse_object()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PdfObject::Null => "null",
            PdfObject::Boolean(_) => "boolean",
            PdfObject::Integer(_) => "integer",
            PdfObject::Real(_) => "real",
            PdfObject::String(_) => "string",
            PdfObject::Name(_) => "name",
            PdfObject::Array(_) => "array",
            PdfObject::Dictionary(_) => "dictionary",
            PdfObject::Stream(_) => "stream",
            PdfObject::Reference(_) => "reference",
        }
    }

    /// Check if this is a null object
    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, integers widened to f64
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(r) => Some(*r),
            PdfObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionary view; streams expose their dictionary
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            PdfObject::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

impl PdfDictionary {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PdfObject) {
        self.0.insert(PdfName(key.into()), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PdfName, &PdfObject)> {
        self.0.iter()
    }

    /// Value of the /Type entry
    pub fn get_type(&self) -> Option<&str> {
        self.get_name("Type")
    }

    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|obj| obj.as_name()).map(|n| n.as_str())
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|obj| obj.as_integer())
    }

    /// First present key among `keys`, for entries with abbreviated forms
    pub fn get_any(&self, keys: &[&str]) -> Option<&PdfObject> {
        keys.iter().find_map(|key| self.get(key))
    }
}

impl PdfArray {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    pub fn push(&mut self, obj: PdfObject) {
        self.0.push(obj);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PdfObject> {
        self.0.iter()
    }
}

/// Characters of PDFDocEncoding that differ from Latin-1
const PDF_DOC_LOW: [char; 8] = [
    '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}', '\u{02DC}',
];
const PDF_DOC_HIGH: [char; 33] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}', '\u{2044}',
    '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}', '\u{201D}', '\u{2018}',
    '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}', '\u{0141}', '\u{0152}', '\u{0160}',
    '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}', '\u{0153}', '\u{0161}', '\u{017E}', '\u{FFFD}',
    '\u{20AC}',
];

impl PdfString {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, hex: false }
    }

    pub fn new_hex(bytes: Vec<u8>) -> Self {
        Self { bytes, hex: true }
    }

    /// Whether the string was written as `<...>`
    pub fn is_hex(&self) -> bool {
        self.hex
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    /// Encoding hint derived from the byte-order mark
    pub fn encoding(&self) -> TextEncoding {
        if self.bytes.starts_with(&[0xFE, 0xFF]) {
            TextEncoding::Utf16Be
        } else if self.bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            TextEncoding::Utf8
        } else {
            TextEncoding::PdfDoc
        }
    }

    /// Decode as a PDF text string
    pub fn to_text(&self) -> String {
        match self.encoding() {
            TextEncoding::Utf16Be => {
                let units = self.bytes[2..]
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
                char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            }
            TextEncoding::Utf8 => String::from_utf8_lossy(&self.bytes[3..]).into_owned(),
            TextEncoding::PdfDoc => self
                .bytes
                .iter()
                .map(|&b| match b {
                    0x18..=0x1F => PDF_DOC_LOW[usize::from(b - 0x18)],
                    0x80..=0xA0 => PDF_DOC_HIGH[usize::from(b - 0x80)],
                    _ => char::from(b),
                })
                .collect(),
        }
    }
}

impl PdfName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolves an indirect `/Length` while a stream is being parsed.
///
/// The resolver shares the parser's lexer. Implementations must leave the
/// lexer position where they found it.
pub trait LengthResolver<S> {
    fn resolve_length(&mut self, lexer: &mut Lexer<S>, id: ObjectId) -> Option<u64>;
}

/// Resolver for contexts without a cross-reference table
pub struct DirectLengths;

impl<S> LengthResolver<S> for DirectLengths {
    fn resolve_length(&mut self, _lexer: &mut Lexer<S>, _id: ObjectId) -> Option<u64> {
        None
    }
}

const ENDSTREAM: &[u8] = b"endstream";

/// Recursive-descent parser for PDF objects
pub struct ObjectParser<'a, S> {
    lexer: &'a mut Lexer<S>,
    lengths: &'a mut dyn LengthResolver<S>,
    context: StackSafeContext,
    lenient: bool,
}

impl<'a, S: ByteSource> ObjectParser<'a, S> {
    pub fn new(lexer: &'a mut Lexer<S>, lengths: &'a mut dyn LengthResolver<S>) -> Self {
        Self {
            lexer,
            lengths,
            context: StackSafeContext::new(),
            lenient: true,
        }
    }

    pub fn with_options(
        lexer: &'a mut Lexer<S>,
        lengths: &'a mut dyn LengthResolver<S>,
        options: &ParseOptions,
    ) -> Self {
        Self {
            lexer,
            lengths,
            context: StackSafeContext::with_max_depth(options.max_depth),
            lenient: options.lenient_syntax,
        }
    }

    /// Parse the next object
    pub fn parse_object(&mut self) -> ParseResult<PdfObject> {
        let token = self.lexer.next_valid_token()?;
        self.parse_from_token(token)
    }

    /// Parse `N G obj <object> endobj` at the current position.
    ///
    /// A stream read this way carries the id as its `origin`. A missing
    /// `endobj` is only an error in strict mode.
    pub fn parse_indirect_object(&mut self) -> ParseResult<(ObjectId, PdfObject)> {
        let offset = self.lexer.position();
        let header_error = |message: String| ParseError::InvalidObjectHeader { offset, message };

        let mut header_token = || {
            self.lexer
                .next_token()
                .map_err(|e| header_error(e.to_string()))
        };
        let number = match header_token()? {
            Token::Integer(n) => u32::try_from(n)
                .map_err(|_| header_error(format!("object number {n} out of range")))?,
            other => return Err(header_error(format!("expected object number, found {other:?}"))),
        };
        let generation = match header_token()? {
            Token::Integer(g) => u16::try_from(g)
                .map_err(|_| header_error(format!("generation {g} out of range")))?,
            other => return Err(header_error(format!("expected generation, found {other:?}"))),
        };
        match header_token()? {
            Token::Keyword(Keyword::Obj) => {}
            other => return Err(header_error(format!("expected 'obj', found {other:?}"))),
        }

        let id = ObjectId::new(number, generation);
        let mut object = match self.lexer.peek_token()? {
            // "N G obj endobj" holds null
            Token::Keyword(Keyword::EndObj) => PdfObject::Null,
            _ => self.parse_object()?,
        };
        if let PdfObject::Stream(stream) = &mut object {
            stream.origin = Some(id);
        }

        match self.lexer.next_valid_token()? {
            Token::Keyword(Keyword::EndObj) => {}
            other if self.lenient => debug!("Object {id} not closed by endobj: {other:?}"),
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "endobj".to_string(),
                    found: format!("{other:?}"),
                })
            }
        }

        Ok((id, object))
    }

    /// Parse an object whose first token has already been read
    pub fn parse_from_token(&mut self, token: Token) -> ParseResult<PdfObject> {
        match token {
            Token::Integer(i) => Ok(PdfObject::Integer(i)),
            Token::Real(r) => Ok(PdfObject::Real(r)),
            Token::String { bytes, hex } => Ok(PdfObject::String(PdfString { bytes, hex })),
            Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
            Token::Reference(id) => Ok(PdfObject::Reference(id)),
            Token::Keyword(Keyword::True) => Ok(PdfObject::Boolean(true)),
            Token::Keyword(Keyword::False) => Ok(PdfObject::Boolean(false)),
            Token::Keyword(Keyword::Null) => Ok(PdfObject::Null),
            Token::ArrayStart => self.parse_array(),
            Token::DictStart => self.parse_dictionary_or_stream(),
            Token::Comment(_) => self.parse_object(),
            Token::Eof => Err(ParseError::syntax(
                self.lexer.position(),
                "Unexpected end of file",
            )),
            other => Err(ParseError::UnexpectedToken {
                expected: "PDF object".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    fn parse_array(&mut self) -> ParseResult<PdfObject> {
        self.context.enter(self.lexer.position())?;
        let elements = self.parse_array_elements();
        self.context.exit();
        Ok(PdfObject::Array(PdfArray(elements?)))
    }

    /// Next token of a container body. In lenient mode malformed tokens are
    /// skipped with a warning.
    fn next_body_token(&mut self, container: &str) -> ParseResult<Option<Token>> {
        match self.lexer.next_valid_token() {
            Ok(token) => Ok(Some(token)),
            Err(e) if self.lenient && e.kind() == super::ErrorKind::Lex => {
                warn!("Skipping malformed token in {container}: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn parse_array_elements(&mut self) -> ParseResult<Vec<PdfObject>> {
        let mut elements = Vec::new();

        loop {
            let Some(token) = self.next_body_token("array")? else {
                continue;
            };

            match token {
                Token::ArrayEnd => break,
                Token::Eof => {
                    return Err(ParseError::syntax(
                        self.lexer.position(),
                        "Unterminated array",
                    ))
                }
                Token::Keyword(Keyword::EndObj) if self.lenient => {
                    warn!("Array closed by endobj");
                    break;
                }
                token => elements.push(self.parse_from_token(token)?),
            }
        }

        Ok(elements)
    }

    fn parse_dictionary_or_stream(&mut self) -> ParseResult<PdfObject> {
        self.context.enter(self.lexer.position())?;
        let entries = self.parse_dictionary_entries();
        self.context.exit();
        let dict = PdfDictionary(entries?);

        if matches!(
            self.lexer.peek_token(),
            Ok(Token::Keyword(Keyword::Stream))
        ) {
            self.lexer.next_token()?;
            let data = self.parse_stream_data(&dict)?;
            return Ok(PdfObject::Stream(PdfStream::new(dict, data)));
        }

        Ok(PdfObject::Dictionary(dict))
    }

    fn parse_dictionary_entries(&mut self) -> ParseResult<HashMap<PdfName, PdfObject>> {
        let mut dict = HashMap::new();

        loop {
            let Some(token) = self.next_body_token("dictionary")? else {
                continue;
            };
            let key = match token {
                Token::DictEnd => break,
                Token::Name(name) => PdfName(name),
                Token::Eof => {
                    return Err(ParseError::syntax(
                        self.lexer.position(),
                        "Unterminated dictionary",
                    ))
                }
                Token::Keyword(Keyword::EndObj) if self.lenient => {
                    warn!("Dictionary closed by endobj");
                    break;
                }
                other if self.lenient => {
                    warn!("Skipping non-name dictionary key {other:?}");
                    continue;
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "dictionary key".to_string(),
                        found: format!("{other:?}"),
                    })
                }
            };

            // A malformed value drops its key
            let Some(value_token) = self.next_body_token("dictionary")? else {
                continue;
            };
            // "/Key >>" is read as /Key null
            if value_token == Token::DictEnd {
                dict.insert(key, PdfObject::Null);
                break;
            }
            let value = self.parse_from_token(value_token)?;
            dict.insert(key, value);
        }

        Ok(dict)
    }

    /// Read stream payload; the `stream` keyword has been consumed.
    ///
    /// The declared /Length is used when `endstream` sits right after it.
    /// Otherwise the payload runs to the first `endstream` found by scanning.
    fn parse_stream_data(&mut self, dict: &PdfDictionary) -> ParseResult<Vec<u8>> {
        self.lexer.skip_stream_eol()?;
        let start = self.lexer.position();
        let total = self.lexer.len();

        let declared = match dict.get("Length") {
            Some(PdfObject::Integer(n)) if *n >= 0 => Some(*n as u64),
            Some(PdfObject::Reference(id)) => {
                let resolved = self.lengths.resolve_length(self.lexer, *id);
                if resolved.is_none() {
                    debug!("Could not resolve indirect /Length {id}");
                }
                self.lexer.seek(start)?;
                resolved
            }
            _ => None,
        };

        if let Some(len) = declared {
            let end = start.saturating_add(len);
            if end <= total && self.lexer.keyword_at(end, ENDSTREAM)? {
                let data = self.read_range(start, end)?;
                self.lexer.seek(end)?;
                self.lexer.skip_whitespace()?;
                self.lexer.read_bytes(ENDSTREAM.len())?;
                return Ok(data);
            }
        }

        self.lexer.seek(start)?;
        match find_forward(self.lexer.source_mut(), ENDSTREAM)? {
            Some(found) => {
                let end = self.trim_eol(start, found)?;
                match declared {
                    Some(len) => warn!(
                        "Stream /Length {len} does not match endstream at offset {found}, using {}",
                        end - start
                    ),
                    None => debug!("Stream without usable /Length, scanned {} bytes", end - start),
                }
                let data = self.read_range(start, end)?;
                self.lexer.seek(found + ENDSTREAM.len() as u64)?;
                Ok(data)
            }
            None => match declared {
                Some(len) if start.saturating_add(len) <= total => {
                    warn!("Stream at offset {start} has no endstream, trusting /Length {len}");
                    self.read_range(start, start + len)
                }
                _ => Err(ParseError::syntax(start, "Stream without endstream")),
            },
        }
    }

    /// The EOL in front of `endstream` belongs to the keyword, not the data
    fn trim_eol(&mut self, start: u64, found: u64) -> ParseResult<u64> {
        let mut end = found;
        if end > start && self.byte_at(end - 1)? == Some(b'\n') {
            end -= 1;
        }
        if end > start && self.byte_at(end - 1)? == Some(b'\r') {
            end -= 1;
        }
        Ok(end)
    }

    fn byte_at(&mut self, pos: u64) -> ParseResult<Option<u8>> {
        self.lexer.seek(pos)?;
        self.lexer.source_mut().read_byte()
    }

    fn read_range(&mut self, start: u64, end: u64) -> ParseResult<Vec<u8>> {
        self.lexer.seek(start)?;
        let len = usize::try_from(end - start)
            .map_err(|_| ParseError::syntax(start, "Stream too large"))?;
        self.lexer.read_bytes(len)
    }
}
