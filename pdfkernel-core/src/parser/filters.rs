//! PDF Stream Filters
//!
//! Handles decompression and decoding of PDF streams according to ISO 32000-1 Section 7.4.
//! A stream's `/Filter` and `/DecodeParms` entries become a [`FilterChain`]
//! that is applied in order, each stage writing into a memory-bounded buffer.

use super::filter_impls::{apply_predictor, decode_ccitt, LzwDecoder, PredictorParams};
use super::lexer::is_whitespace;
use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};
use crate::memory::{BoundedBuffer, MemoryLimitsHandler};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::{debug, warn};

#[cfg(feature = "compression")]
use flate2::read::{DeflateDecoder, ZlibDecoder};
#[cfg(feature = "compression")]
use std::io::{self, Read};

/// Inflate output is pulled in chunks of this size
#[cfg(feature = "compression")]
const FLATE_CHUNK: usize = 8 * 1024;

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Flate decode (zlib/deflate compression)
    FlateDecode,

    /// LZW decode
    LZWDecode,

    /// ASCII hex decode
    ASCIIHexDecode,

    /// ASCII 85 decode
    ASCII85Decode,

    /// CCITT fax decode
    CCITTFaxDecode,

    /// Run length decode
    RunLengthDecode,

    /// Crypt filter; decryption happens outside the pipeline
    Crypt,
}

lazy_static! {
    static ref FILTERS_BY_NAME: HashMap<&'static str, Filter> = {
        let mut names = HashMap::new();
        for filter in [
            Filter::FlateDecode,
            Filter::LZWDecode,
            Filter::ASCIIHexDecode,
            Filter::ASCII85Decode,
            Filter::CCITTFaxDecode,
            Filter::RunLengthDecode,
            Filter::Crypt,
        ] {
            names.insert(filter.name(), filter);
        }
        // Abbreviations used in inline images
        names.insert("Fl", Filter::FlateDecode);
        names.insert("LZW", Filter::LZWDecode);
        names.insert("AHx", Filter::ASCIIHexDecode);
        names.insert("A85", Filter::ASCII85Decode);
        names.insert("CCF", Filter::CCITTFaxDecode);
        names.insert("RL", Filter::RunLengthDecode);
        names
    };
}

impl Filter {
    /// Parse filter from name or abbreviation
    pub fn from_name(name: &str) -> Option<Self> {
        FILTERS_BY_NAME.get(name).copied()
    }

    /// Full PDF name of the filter
    pub fn name(&self) -> &'static str {
        match self {
            Filter::FlateDecode => "FlateDecode",
            Filter::LZWDecode => "LZWDecode",
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::CCITTFaxDecode => "CCITTFaxDecode",
            Filter::RunLengthDecode => "RunLengthDecode",
            Filter::Crypt => "Crypt",
        }
    }
}

/// One filter with its decode parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    pub filter: Filter,
    pub params: Option<PdfDictionary>,
}

/// Ordered filters declared by a stream
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterChain {
    stages: Vec<FilterStage>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Filter, params: Option<PdfDictionary>) {
        self.stages.push(FilterStage { filter, params });
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Build the chain from `/Filter` (or `/F`) and `/DecodeParms` (or `/DP`).
    ///
    /// `/F` is only read as a filter when it holds names; in a stream
    /// dictionary it usually names an external file.
    pub fn from_dict(dict: &PdfDictionary) -> ParseResult<Self> {
        let declared = dict.get("Filter").or_else(|| {
            dict.get("F").filter(|obj| match obj {
                PdfObject::Name(_) => true,
                PdfObject::Array(array) => array.iter().all(|o| o.as_name().is_some()),
                _ => false,
            })
        });

        let names: Vec<&str> = match declared {
            None | Some(PdfObject::Null) => return Ok(Self::new()),
            Some(PdfObject::Name(name)) => vec![name.as_str()],
            Some(PdfObject::Array(array)) => array
                .iter()
                .map(|obj| {
                    obj.as_name().map(|n| n.as_str()).ok_or_else(|| {
                        ParseError::decode(format!(
                            "Invalid filter in array: {}",
                            obj.type_name()
                        ))
                    })
                })
                .collect::<ParseResult<_>>()?,
            Some(other) => {
                return Err(ParseError::decode(format!(
                    "Invalid Filter type: {}",
                    other.type_name()
                )))
            }
        };

        let params: Vec<Option<&PdfDictionary>> = match dict.get_any(&["DecodeParms", "DP"]) {
            Some(PdfObject::Array(array)) => array.iter().map(|obj| obj.as_dict()).collect(),
            Some(obj) => vec![obj.as_dict()],
            None => Vec::new(),
        };

        let mut chain = Self::new();
        for (index, name) in names.into_iter().enumerate() {
            let filter = Filter::from_name(name)
                .ok_or_else(|| ParseError::UnsupportedFilter(name.to_string()))?;
            let stage_params = params.get(index).copied().flatten().cloned();
            chain.push(filter, stage_params);
        }
        Ok(chain)
    }
}

/// Decode stream data with the default memory limits.
///
/// Only direct `/Filter` and `/DecodeParms` entries are used.
pub fn decode_stream(data: &[u8], dict: &PdfDictionary) -> ParseResult<Vec<u8>> {
    let chain = FilterChain::from_dict(dict)?;
    decode(data, &chain, dict, &mut MemoryLimitsHandler::default())
}

/// Run `data` through every stage of `chain`.
///
/// Each stage gets a fresh buffer bounded by the handler's remaining
/// budget; the final output is charged to the document total.
pub fn decode(
    data: &[u8],
    chain: &FilterChain,
    stream_dict: &PdfDictionary,
    memory: &mut MemoryLimitsHandler,
) -> ParseResult<Vec<u8>> {
    let mut current: Option<Vec<u8>> = None;

    for stage in chain.stages() {
        let input = current.as_deref().unwrap_or(data);
        let mut out = memory.output_buffer();
        apply_stage(input, stage, stream_dict, &mut out)?;
        debug!(
            "{}: {} -> {} bytes",
            stage.filter.name(),
            input.len(),
            out.len()
        );
        current = Some(out.into_inner());
    }

    let decoded = match current {
        Some(decoded) => decoded,
        None => {
            let mut out = memory.output_buffer();
            out.extend_from_slice(data)?;
            out.into_inner()
        }
    };
    memory.record(decoded.len())?;
    Ok(decoded)
}

/// Apply a single filter stage
fn apply_stage(
    data: &[u8],
    stage: &FilterStage,
    stream_dict: &PdfDictionary,
    out: &mut BoundedBuffer,
) -> ParseResult<()> {
    let params = stage.params.as_ref();
    match stage.filter {
        Filter::FlateDecode => {
            decode_flate(data, out)?;
            apply_predictor_stage(out, params)
        }
        Filter::LZWDecode => {
            let early_change = params
                .and_then(|p| p.get_integer("EarlyChange"))
                .map_or(true, |value| value != 0);
            LzwDecoder::new(early_change).decode(data, out)?;
            apply_predictor_stage(out, params)
        }
        Filter::ASCIIHexDecode => decode_ascii_hex(data, out),
        Filter::ASCII85Decode => decode_ascii85(data, out),
        Filter::CCITTFaxDecode => decode_ccitt(data, params, stream_dict, out),
        Filter::RunLengthDecode => decode_run_length(data, out),
        Filter::Crypt => out.extend_from_slice(data),
    }
}

/// Undo a `/Predictor` in place. The result is never larger than the input.
fn apply_predictor_stage(
    out: &mut BoundedBuffer,
    params: Option<&PdfDictionary>,
) -> ParseResult<()> {
    let predictor = PredictorParams::from_dict(params);
    if !predictor.is_active() {
        return Ok(());
    }
    let raw = out.take();
    // One row of samples has to fit in the stage's budget
    out.ensure(predictor.row_bytes()?)?;
    out.extend_from_slice(&apply_predictor(&raw, &predictor)?)
}

/// Decode FlateDecode (zlib/deflate) compressed data
#[cfg(feature = "compression")]
fn decode_flate(data: &[u8], out: &mut BoundedBuffer) -> ParseResult<()> {
    match inflate(ZlibDecoder::new(data), out) {
        Ok(()) => Ok(()),
        Err(err @ ParseError::MemoryLimitExceeded { .. }) => Err(err),
        Err(err) if out.is_empty() => {
            debug!("Zlib decode failed ({err}), retrying as raw deflate");
            match inflate(DeflateDecoder::new(data), out) {
                Ok(()) if !out.is_empty() => Ok(()),
                Err(limit @ ParseError::MemoryLimitExceeded { .. }) => Err(limit),
                _ => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}

#[cfg(feature = "compression")]
fn inflate<R: Read>(mut decoder: R, out: &mut BoundedBuffer) -> ParseResult<()> {
    let mut chunk = [0u8; FLATE_CHUNK];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => out.extend_from_slice(&chunk[..n])?,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!("Truncated Flate stream, keeping {} decoded bytes", out.len());
                return Ok(());
            }
            Err(e) => return Err(ParseError::decode(format!("Flate decode error: {e}"))),
        }
    }
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8], _out: &mut BoundedBuffer) -> ParseResult<()> {
    Err(ParseError::decode(
        "FlateDecode requires 'compression' feature",
    ))
}

/// Decode ASCIIHexDecode data
fn decode_ascii_hex(data: &[u8], out: &mut BoundedBuffer) -> ParseResult<()> {
    let mut chars = data.iter().copied().filter(|&b| !is_whitespace(b));

    loop {
        let high = match chars.next() {
            Some(b'>') | None => break,
            Some(ch) => ch,
        };

        // An odd final digit is padded with 0
        let (low, done) = match chars.next() {
            Some(b'>') | None => (b'0', true),
            Some(ch) => (ch, false),
        };

        let high_val = hex_digit_value(high).ok_or_else(|| {
            ParseError::decode(format!("Invalid hex digit: {}", high as char))
        })?;
        let low_val = hex_digit_value(low).ok_or_else(|| {
            ParseError::decode(format!("Invalid hex digit: {}", low as char))
        })?;

        out.push((high_val << 4) | low_val)?;

        if done {
            break;
        }
    }

    Ok(())
}

/// Get value of hex digit
fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

/// Decode ASCII85Decode data
fn decode_ascii85(data: &[u8], out: &mut BoundedBuffer) -> ParseResult<()> {
    let digits: Vec<u8> = data.iter().copied().filter(|&b| !is_whitespace(b)).collect();
    let body = digits.strip_prefix(b"<~").unwrap_or(&digits[..]);

    let mut group = [0u8; 5];
    let mut len = 0;
    let mut chars = body.iter().copied();

    while let Some(c) = chars.next() {
        match c {
            b'~' => {
                if chars.next() == Some(b'>') {
                    break;
                }
                return Err(ParseError::decode("Invalid ASCII85 end marker"));
            }
            // Four zero bytes, only between groups
            b'z' if len == 0 => out.extend_from_slice(&[0, 0, 0, 0])?,
            b'!'..=b'u' => {
                group[len] = c - b'!';
                len += 1;
                if len == 5 {
                    out.extend_from_slice(&ascii85_group_value(&group)?.to_be_bytes())?;
                    len = 0;
                }
            }
            _ => {
                return Err(ParseError::decode(format!(
                    "Invalid ASCII85 character: {}",
                    c as char
                )))
            }
        }
    }

    match len {
        0 => Ok(()),
        1 => Err(ParseError::decode("ASCII85 data ends with a lone character")),
        _ => {
            // Pad with 'u' and keep one byte less than the digits given
            group[len..].fill(b'u' - b'!');
            let value = ascii85_group_value(&group)?;
            out.extend_from_slice(&value.to_be_bytes()[..len - 1])
        }
    }
}

fn ascii85_group_value(group: &[u8; 5]) -> ParseResult<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    u32::try_from(value).map_err(|_| ParseError::decode("ASCII85 group out of range"))
}

/// Decode RunLengthDecode data
fn decode_run_length(data: &[u8], out: &mut BoundedBuffer) -> ParseResult<()> {
    let mut pos = 0;

    while let Some(&length) = data.get(pos) {
        pos += 1;
        match length {
            0..=127 => {
                let end = pos + usize::from(length) + 1;
                if end > data.len() {
                    warn!("Truncated RunLength literal run");
                    return out.extend_from_slice(&data[pos..]);
                }
                out.extend_from_slice(&data[pos..end])?;
                pos = end;
            }
            128 => return Ok(()),
            _ => {
                let Some(&byte) = data.get(pos) else {
                    warn!("Truncated RunLength repeat run");
                    return Ok(());
                };
                out.extend_repeat(byte, 257 - usize::from(length))?;
                pos += 1;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{LimitKind, MemoryLimits};
    use crate::parser::filter_impls::lzw::tests::encode as lzw_encode;
    use crate::parser::filter_impls::predictor::tests::encode_png_up;
    use crate::parser::objects::{PdfArray, PdfName};
    use pretty_assertions::assert_eq;

    fn run(filter: Filter, data: &[u8]) -> ParseResult<Vec<u8>> {
        let mut chain = FilterChain::new();
        chain.push(filter, None);
        decode(
            data,
            &chain,
            &PdfDictionary::new(),
            &mut MemoryLimitsHandler::default(),
        )
    }

    fn name(value: &str) -> PdfObject {
        PdfObject::Name(PdfName(value.to_string()))
    }

    #[cfg(feature = "compression")]
    fn zlib(data: &[u8]) -> Vec<u8> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_ascii_hex_decode() {
        assert_eq!(run(Filter::ASCIIHexDecode, b"48656C6C6F>").unwrap(), b"Hello");
        // With spaces
        assert_eq!(
            run(Filter::ASCIIHexDecode, b"48 65 6C 6C 6F>").unwrap(),
            b"Hello"
        );
        // Odd number of digits
        assert_eq!(run(Filter::ASCIIHexDecode, b"48656C6C6>").unwrap(), b"Hell`");
        // Missing '>'
        assert_eq!(run(Filter::ASCIIHexDecode, b"48656C6C6F").unwrap(), b"Hello");
        assert!(run(Filter::ASCIIHexDecode, b">").unwrap().is_empty());
    }

    #[test]
    fn test_ascii_hex_decode_invalid() {
        assert!(matches!(
            run(Filter::ASCIIHexDecode, b"GG>"),
            Err(ParseError::StreamDecodeError(_))
        ));
    }

    #[test]
    fn test_ascii85_decode() {
        assert_eq!(
            run(Filter::ASCII85Decode, b"87cURD]j7BEbo80~>").unwrap(),
            b"Hello world!"
        );
        assert_eq!(
            run(Filter::ASCII85Decode, b"<~87cURD]j7BEbo80~>").unwrap(),
            b"Hello world!"
        );
        // Special case for zeros
        assert_eq!(run(Filter::ASCII85Decode, b"z~>").unwrap(), vec![0, 0, 0, 0]);
        assert!(run(Filter::ASCII85Decode, b"~>").unwrap().is_empty());
    }

    #[test]
    fn test_ascii85_partial_group() {
        // "Hello" = one full group plus a 2-digit group for 'o'
        assert_eq!(run(Filter::ASCII85Decode, b"87cURDZ~>").unwrap(), b"Hello");
    }

    #[test]
    fn test_ascii85_errors() {
        // 'v' and beyond are not digits
        assert!(run(Filter::ASCII85Decode, b"invalid~>").is_err());
        // Lone final character
        assert!(run(Filter::ASCII85Decode, b"87cURD~>").is_err());
        // Group value above 2^32 - 1
        assert!(run(Filter::ASCII85Decode, b"uuuuu~>").is_err());
        // '~' not followed by '>'
        assert!(run(Filter::ASCII85Decode, b"87~x").is_err());
    }

    #[test]
    fn test_run_length() {
        // Literal "abc", repeat 'x' four times, EOD, ignored trailer
        let data = [2, b'a', b'b', b'c', 253, b'x', 128, b'q'];
        assert_eq!(run(Filter::RunLengthDecode, &data).unwrap(), b"abcxxxx");
    }

    #[test]
    fn test_run_length_truncated() {
        assert_eq!(run(Filter::RunLengthDecode, &[4, b'a', b'b']).unwrap(), b"ab");
        assert_eq!(run(Filter::RunLengthDecode, &[0, b'a', 200]).unwrap(), b"a");
    }

    #[test]
    fn test_crypt_is_identity() {
        assert_eq!(run(Filter::Crypt, b"\x00\xFFdata").unwrap(), b"\x00\xFFdata");
    }

    #[test]
    fn test_lzw_with_png_predictor() {
        let rows: [&[u8]; 3] = [&[1, 2, 3, 4], &[2, 3, 4, 5], &[9, 9, 9, 9]];
        let encoded = lzw_encode(&encode_png_up(&rows));

        let mut params = PdfDictionary::new();
        params.insert("Predictor", PdfObject::Integer(12));
        params.insert("Columns", PdfObject::Integer(4));
        let mut dict = PdfDictionary::new();
        dict.insert("Filter", name("LZWDecode"));
        dict.insert("DecodeParms", PdfObject::Dictionary(params));

        assert_eq!(decode_stream(&encoded, &dict).unwrap(), rows.concat());
    }

    #[test]
    fn test_filter_from_name() {
        assert_eq!(Filter::from_name("FlateDecode"), Some(Filter::FlateDecode));
        assert_eq!(Filter::from_name("Fl"), Some(Filter::FlateDecode));
        assert_eq!(Filter::from_name("LZW"), Some(Filter::LZWDecode));
        assert_eq!(Filter::from_name("AHx"), Some(Filter::ASCIIHexDecode));
        assert_eq!(Filter::from_name("A85"), Some(Filter::ASCII85Decode));
        assert_eq!(Filter::from_name("CCF"), Some(Filter::CCITTFaxDecode));
        assert_eq!(Filter::from_name("RL"), Some(Filter::RunLengthDecode));
        assert_eq!(Filter::from_name("Crypt"), Some(Filter::Crypt));
        assert_eq!(Filter::from_name("DCTDecode"), None);
        assert_eq!(Filter::from_name("UnknownFilter"), None);
        assert_eq!(Filter::RunLengthDecode.name(), "RunLengthDecode");
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let data = b"Hello, world!";
        assert_eq!(decode_stream(data, &PdfDictionary::new()).unwrap(), data);
    }

    #[test]
    fn test_decode_stream_filter_array() {
        let mut dict = PdfDictionary::new();
        dict.insert(
            "Filter",
            PdfObject::Array(PdfArray(vec![name("AHx"), name("AHx")])),
        );
        // "Hi" hex encoded twice
        assert_eq!(decode_stream(b"3438363>", &dict).unwrap(), b"H`");
        assert_eq!(decode_stream(b"34383639>", &dict).unwrap(), b"Hi");
    }

    #[test]
    fn test_unsupported_filters() {
        for unsupported in ["DCTDecode", "JPXDecode", "JBIG2Decode", "UnknownFilter"] {
            let mut dict = PdfDictionary::new();
            dict.insert("Filter", name(unsupported));
            match decode_stream(b"data", &dict) {
                Err(ParseError::UnsupportedFilter(n)) => assert_eq!(n, unsupported),
                other => panic!("expected UnsupportedFilter, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_stream_invalid_filter_type() {
        let mut dict = PdfDictionary::new();
        dict.insert("Filter", PdfObject::Integer(42));
        assert!(matches!(
            decode_stream(b"test data", &dict),
            Err(ParseError::StreamDecodeError(_))
        ));
    }

    #[test]
    fn test_abbreviated_keys() {
        let mut params = PdfDictionary::new();
        params.insert("Columns", PdfObject::Integer(8));
        let mut dict = PdfDictionary::new();
        dict.insert("F", name("CCF"));
        dict.insert("DP", PdfObject::Dictionary(params));

        let chain = FilterChain::from_dict(&dict).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.stages()[0].filter, Filter::CCITTFaxDecode);
        assert_eq!(decode_stream(&[0x9B, 0xB7], &dict).unwrap(), vec![0xFF, 0xC3]);
    }

    #[test]
    fn test_file_specification_is_not_a_filter() {
        let mut dict = PdfDictionary::new();
        dict.insert("F", PdfObject::Dictionary(PdfDictionary::new()));
        assert!(FilterChain::from_dict(&dict).unwrap().is_empty());
    }

    #[test]
    fn test_params_array_with_null() {
        let mut params = PdfDictionary::new();
        params.insert("EarlyChange", PdfObject::Integer(0));
        let mut dict = PdfDictionary::new();
        dict.insert(
            "Filter",
            PdfObject::Array(PdfArray(vec![name("AHx"), name("LZW")])),
        );
        dict.insert(
            "DecodeParms",
            PdfObject::Array(PdfArray(vec![PdfObject::Null, PdfObject::Dictionary(params)])),
        );

        let chain = FilterChain::from_dict(&dict).unwrap();
        assert_eq!(chain.stages()[0].params, None);
        assert_eq!(
            chain.stages()[1]
                .params
                .as_ref()
                .and_then(|p| p.get_integer("EarlyChange")),
            Some(0)
        );
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_decode() {
        let original = b"Hello, compressed world!";
        assert_eq!(run(Filter::FlateDecode, &zlib(original)).unwrap(), original);
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_raw_deflate_fallback() {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        let original = b"raw deflate without a zlib header".repeat(4);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let raw = encoder.finish().unwrap();

        assert_eq!(run(Filter::FlateDecode, &raw).unwrap(), original);
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_truncated_keeps_prefix() {
        let original: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let compressed = zlib(&original);
        let truncated = &compressed[..compressed.len() / 2];

        let decoded = run(Filter::FlateDecode, truncated).unwrap();
        assert!(original.starts_with(&decoded));
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_with_png_predictor() {
        let rows: [&[u8]; 2] = [&[10, 20, 30], &[11, 22, 33]];
        let mut params = PdfDictionary::new();
        params.insert("Predictor", PdfObject::Integer(12));
        params.insert("Columns", PdfObject::Integer(3));
        let mut dict = PdfDictionary::new();
        dict.insert("Filter", name("FlateDecode"));
        dict.insert("DecodeParms", PdfObject::Dictionary(params));

        let data = zlib(&encode_png_up(&rows));
        assert_eq!(decode_stream(&data, &dict).unwrap(), rows.concat());
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_stream_limit_stops_decompression_bomb() {
        let bomb = zlib(&vec![0u8; 1024 * 1024]);
        let mut memory =
            MemoryLimitsHandler::new(MemoryLimits::default().with_max_stream_size(1000));
        let mut chain = FilterChain::new();
        chain.push(Filter::FlateDecode, None);

        let result = decode(&bomb, &chain, &PdfDictionary::new(), &mut memory);
        assert!(matches!(
            result,
            Err(ParseError::MemoryLimitExceeded {
                kind: LimitKind::Stream,
                limit: 1000
            })
        ));
        assert_eq!(memory.used(), 0);
    }

    #[cfg(feature = "compression")]
    fn flate_with_params(entries: &[(&str, i64)]) -> PdfDictionary {
        let mut params = PdfDictionary::new();
        for &(key, value) in entries {
            params.insert(key, PdfObject::Integer(value));
        }
        let mut dict = PdfDictionary::new();
        dict.insert("Filter", name("FlateDecode"));
        dict.insert("DecodeParms", PdfObject::Dictionary(params));
        dict
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_predictor_row_size_overflow_is_decode_error() {
        let dict = flate_with_params(&[("Predictor", 12), ("Colors", 4), ("Columns", i64::MAX)]);
        let result = decode_stream(&zlib(&[2, 1, 2, 3, 4]), &dict);
        assert!(matches!(result, Err(ParseError::StreamDecodeError(_))));
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_predictor_row_larger_than_budget() {
        let dict = flate_with_params(&[("Predictor", 12), ("Columns", 1 << 46)]);
        let result = decode_stream(&zlib(&[2, 1, 2, 3, 4]), &dict);
        assert!(matches!(
            result,
            Err(ParseError::MemoryLimitExceeded {
                kind: LimitKind::Stream,
                ..
            })
        ));
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_tiff_predictor_with_huge_colors() {
        let dict = flate_with_params(&[
            ("Predictor", 2),
            ("Colors", i64::MAX),
            ("BitsPerComponent", 16),
        ]);
        assert!(decode_stream(&zlib(&[1, 2, 3, 4]), &dict).is_err());
    }

    #[test]
    fn test_document_limit_across_streams() {
        let mut memory =
            MemoryLimitsHandler::new(MemoryLimits::default().with_max_document_size(1500));
        let mut chain = FilterChain::new();
        chain.push(Filter::RunLengthDecode, None);
        // 1000 bytes of 'a' in eight repeat runs of 125
        let data: Vec<u8> = std::iter::repeat([132u8, b'a']).take(8).flatten().collect();

        let first = decode(&data, &chain, &PdfDictionary::new(), &mut memory).unwrap();
        assert_eq!(first.len(), 1000);
        let second = decode(&data, &chain, &PdfDictionary::new(), &mut memory);
        assert!(matches!(
            second,
            Err(ParseError::MemoryLimitExceeded {
                kind: LimitKind::Document,
                ..
            })
        ));
        assert_eq!(memory.used(), 1000);
    }

    #[cfg(not(feature = "compression"))]
    #[test]
    fn test_flate_decode_not_supported() {
        assert!(run(Filter::FlateDecode, b"compressed data").is_err());
    }
}
