//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2

use super::objects::ObjectId;
use super::source::ByteSource;
use super::{ParseError, ParseResult};
use tracing::debug;

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// String (literal or hexadecimal)
    String { bytes: Vec<u8>, hex: bool },

    /// Name object (e.g., /Type), escapes already decoded
    Name(String),

    /// Comment (usually ignored)
    Comment(String),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// Reference (e.g., 1 0 R), only produced by `next_valid_token`
    Reference(ObjectId),

    /// Any bare word
    Keyword(Keyword),

    /// End of file
    Eof,
}

/// Bare words with structural meaning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    True,
    False,
    Null,
    Obj,
    EndObj,
    Stream,
    EndStream,
    R,
    XRef,
    Trailer,
    StartXRef,
    Other(String),
}

impl Keyword {
    fn from_bytes(bytes: &[u8]) -> Self {
        match bytes {
            b"true" => Keyword::True,
            b"false" => Keyword::False,
            b"null" => Keyword::Null,
            b"obj" => Keyword::Obj,
            b"endobj" => Keyword::EndObj,
            b"stream" => Keyword::Stream,
            b"endstream" => Keyword::EndStream,
            b"R" => Keyword::R,
            b"xref" => Keyword::XRef,
            b"trailer" => Keyword::Trailer,
            b"startxref" => Keyword::StartXRef,
            other => Keyword::Other(bytes_to_string(other.to_vec())),
        }
    }
}

/// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// PDF delimiters
pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'/' | b'%')
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Names and keywords are bytes; keep them lossless when they are not UTF-8.
fn bytes_to_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| e.into_bytes().iter().map(|&b| b as char).collect())
}

/// PDF Lexer for tokenizing PDF content
pub struct Lexer<S> {
    source: S,
    nul_is_whitespace: bool,
}

impl<S: ByteSource> Lexer<S> {
    /// Create a new lexer over a byte source
    pub fn new(source: S) -> Self {
        Self {
            source,
            nul_is_whitespace: true,
        }
    }

    /// Choose whether NUL separates tokens. Some producers pad with NUL,
    /// content inside binary sections must not be split on it.
    pub fn set_nul_is_whitespace(&mut self, enabled: bool) {
        self.nul_is_whitespace = enabled;
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Current byte offset
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    pub fn seek(&mut self, pos: u64) -> ParseResult<()> {
        self.source.seek(pos)
    }

    /// Length of the underlying source
    pub fn len(&self) -> u64 {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    fn is_space(&self, b: u8) -> bool {
        if b == 0 {
            self.nul_is_whitespace
        } else {
            is_whitespace(b)
        }
    }

    fn is_regular(&self, b: u8) -> bool {
        !self.is_space(b) && !is_delimiter(b)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_whitespace()?;
        let start = self.position();

        let ch = match self.source.read_byte()? {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            b'%' => self.read_comment(),
            b'/' => self.read_name(),
            b'(' => self.read_literal_string(start),
            b'<' => {
                if self.source.peek_byte()? == Some(b'<') {
                    self.source.read_byte()?;
                    Ok(Token::DictStart)
                } else {
                    self.read_hex_string(start)
                }
            }
            b'>' => {
                if self.source.peek_byte()? == Some(b'>') {
                    self.source.read_byte()?;
                    Ok(Token::DictEnd)
                } else {
                    Err(ParseError::syntax(start, "Expected '>' after '>'"))
                }
            }
            b'[' => Ok(Token::ArrayStart),
            b']' => Ok(Token::ArrayEnd),
            b')' => Err(ParseError::syntax(start, "Unbalanced ')'")),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number(ch),
            _ => self.read_keyword(ch),
        }
    }

    /// Get the next token that carries meaning: comments are skipped and
    /// `N G R` triples are folded into a single [`Token::Reference`].
    pub fn next_valid_token(&mut self) -> ParseResult<Token> {
        loop {
            match self.next_token()? {
                Token::Comment(_) => continue,
                Token::Integer(num) if (0..=i64::from(u32::MAX)).contains(&num) => {
                    return self.try_reference(num as u32);
                }
                token => return Ok(token),
            }
        }
    }

    fn try_reference(&mut self, number: u32) -> ParseResult<Token> {
        let saved = self.position();
        let generation = match self.next_token() {
            Ok(Token::Integer(gen)) if (0..=i64::from(u16::MAX)).contains(&gen) => Some(gen as u16),
            _ => None,
        };
        if let Some(generation) = generation {
            if let Ok(Token::Keyword(Keyword::R)) = self.next_token() {
                return Ok(Token::Reference(ObjectId::new(number, generation)));
            }
        }
        self.seek(saved)?;
        Ok(Token::Integer(i64::from(number)))
    }

    /// Look at the next raw token without consuming it
    pub fn peek_token(&mut self) -> ParseResult<Token> {
        let saved = self.position();
        let token = self.next_token();
        self.seek(saved)?;
        token
    }

    /// Skip whitespace and return the number of bytes skipped
    pub fn skip_whitespace(&mut self) -> ParseResult<usize> {
        let mut count = 0;
        while let Some(ch) = self.source.read_byte()? {
            if self.is_space(ch) {
                count += 1;
            } else {
                self.source.push_back(ch);
                break;
            }
        }
        Ok(count)
    }

    /// Skip the end-of-line marker that follows the `stream` keyword.
    ///
    /// Accepts CRLF or LF, and a lone CR. Stray spaces before the EOL are
    /// tolerated.
    pub fn skip_stream_eol(&mut self) -> ParseResult<()> {
        while let Some(ch) = self.source.read_byte()? {
            match ch {
                b' ' | b'\t' => continue,
                b'\r' => {
                    if self.source.peek_byte()? == Some(b'\n') {
                        self.source.read_byte()?;
                    }
                    break;
                }
                b'\n' => break,
                other => {
                    self.source.push_back(other);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Read up to `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> ParseResult<Vec<u8>> {
        let remaining = self.len().saturating_sub(self.position());
        let len = len.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let mut buf = vec![0u8; len];
        let n = self.source.read_into(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Check whether `keyword` follows at `pos`, optionally after whitespace.
    /// The position is restored afterwards.
    pub fn keyword_at(&mut self, pos: u64, keyword: &[u8]) -> ParseResult<bool> {
        let saved = self.position();
        self.seek(pos)?;
        self.skip_whitespace()?;
        let found = self.read_bytes(keyword.len())? == keyword;
        self.seek(saved)?;
        Ok(found)
    }

    /// Read a comment (from % to end of line)
    fn read_comment(&mut self) -> ParseResult<Token> {
        let mut comment = Vec::new();
        while let Some(ch) = self.source.read_byte()? {
            if ch == b'\n' || ch == b'\r' {
                self.source.push_back(ch);
                break;
            }
            comment.push(ch);
        }
        Ok(Token::Comment(String::from_utf8_lossy(&comment).into_owned()))
    }

    /// Read a name object (e.g., /Type)
    fn read_name(&mut self) -> ParseResult<Token> {
        let mut name = Vec::new();

        while let Some(ch) = self.source.read_byte()? {
            if !self.is_regular(ch) {
                self.source.push_back(ch);
                break;
            }
            if ch != b'#' {
                name.push(ch);
                continue;
            }

            // Hex escape sequence
            let high = self.source.read_byte()?;
            match high.and_then(hex_value) {
                Some(h) => {
                    let low = self.source.read_byte()?;
                    match low.and_then(hex_value) {
                        Some(l) => name.push(h << 4 | l),
                        None => {
                            debug!("Malformed #-escape in name, kept literally");
                            name.push(b'#');
                            name.extend(high);
                            match low {
                                Some(l) if self.is_regular(l) => name.push(l),
                                Some(l) => self.source.push_back(l),
                                None => {}
                            }
                        }
                    }
                }
                None => {
                    debug!("Malformed #-escape in name, kept literally");
                    name.push(b'#');
                    if let Some(b) = high {
                        self.source.push_back(b);
                    }
                }
            }
        }

        Ok(Token::Name(bytes_to_string(name)))
    }

    /// Read a literal string (enclosed in parentheses)
    fn read_literal_string(&mut self, start: u64) -> ParseResult<Token> {
        let mut bytes = Vec::new();
        let mut depth = 1;

        loop {
            let ch = self
                .source
                .read_byte()?
                .ok_or_else(|| ParseError::syntax(start, "Unterminated literal string"))?;

            match ch {
                b'\\' => {
                    let escaped = self
                        .source
                        .read_byte()?
                        .ok_or_else(|| ParseError::syntax(start, "Unterminated literal string"))?;
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0C),
                        b'\r' => {
                            // Line continuation, CRLF counts as one EOL
                            if self.source.peek_byte()? == Some(b'\n') {
                                self.source.read_byte()?;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.source.peek_byte()? {
                                    Some(d @ b'0'..=b'7') => {
                                        self.source.read_byte()?;
                                        value = value * 8 + u32::from(d - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            bytes.push((value & 0xFF) as u8);
                        }
                        other => bytes.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    bytes.push(ch);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(ch);
                }
                b'\r' => {
                    if self.source.peek_byte()? == Some(b'\n') {
                        self.source.read_byte()?;
                    }
                    bytes.push(b'\n');
                }
                _ => bytes.push(ch),
            }
        }

        Ok(Token::String { bytes, hex: false })
    }

    /// Read a hex string; the opening '<' is already consumed
    fn read_hex_string(&mut self, start: u64) -> ParseResult<Token> {
        let mut bytes = Vec::new();
        let mut high: Option<u8> = None;

        loop {
            let ch = self
                .source
                .read_byte()?
                .ok_or_else(|| ParseError::syntax(start, "Unterminated hex string"))?;

            if ch == b'>' {
                break;
            }
            if is_whitespace(ch) {
                continue;
            }
            match hex_value(ch) {
                Some(v) => match high.take() {
                    Some(h) => bytes.push(h << 4 | v),
                    None => high = Some(v),
                },
                None => {
                    let position = self.position() - 1;
                    while let Some(b) = self.source.read_byte()? {
                        if b == b'>' {
                            break;
                        }
                    }
                    return Err(ParseError::syntax(
                        position,
                        format!("Invalid hex digit 0x{ch:02X} in hex string"),
                    ));
                }
            }
        }

        // Odd number of digits: the last one is padded with 0
        if let Some(h) = high {
            bytes.push(h << 4);
        }

        Ok(Token::String { bytes, hex: true })
    }

    /// Read a number (integer or real)
    fn read_number(&mut self, first: u8) -> ParseResult<Token> {
        let mut minus = 0usize;
        let mut digits = String::new();
        let mut has_dot = false;
        let mut current = Some(first);

        while let Some(ch) = current {
            match ch {
                b'-' => minus += 1,
                b'+' => {}
                _ => break,
            }
            current = self.source.read_byte()?;
        }

        while let Some(ch) = current {
            match ch {
                b'0'..=b'9' => digits.push(ch as char),
                b'.' if !has_dot => {
                    has_dot = true;
                    digits.push('.');
                }
                _ => {
                    self.source.push_back(ch);
                    break;
                }
            }
            current = self.source.read_byte()?;
        }

        let negative = minus > 0;

        // "--5" reads as 0, "--5.5" as -5.5
        if minus > 1 && !has_dot {
            return Ok(Token::Integer(0));
        }

        if has_dot {
            let value = digits.parse::<f64>().unwrap_or(0.0);
            return Ok(Token::Real(if negative { -value } else { value }));
        }

        if digits.is_empty() {
            return Ok(Token::Integer(0));
        }

        match digits.parse::<i64>() {
            Ok(value) => Ok(Token::Integer(if negative { -value } else { value })),
            Err(_) => {
                let value = digits.parse::<f64>().unwrap_or(0.0);
                Ok(Token::Real(if negative { -value } else { value }))
            }
        }
    }

    /// Read a keyword (a run of regular characters)
    fn read_keyword(&mut self, first: u8) -> ParseResult<Token> {
        let mut word = vec![first];
        while let Some(ch) = self.source.read_byte()? {
            if !self.is_regular(ch) {
                self.source.push_back(ch);
                break;
            }
            word.push(ch);
        }
        Ok(Token::Keyword(Keyword::from_bytes(&word)))
    }
}
