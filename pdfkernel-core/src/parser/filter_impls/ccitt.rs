//! CCITT Fax decode implementation according to ISO 32000-1 Section 7.4.6
//!
//! Decodes ITU-T T.4 (Group 3, one- and two-dimensional) and T.6 (Group 4)
//! bitstreams into packed 1-bit rows. Damaged rows are completed with white
//! and counted; data labelled as Group 3 that fails to decode cleanly is
//! retried as Group 4.

use super::BitReader;
use crate::memory::BoundedBuffer;
use crate::parser::objects::PdfDictionary;
use crate::parser::{ParseError, ParseResult};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Longest modified-Huffman run code in bits
const MAX_RUN_CODE_BITS: u8 = 13;
/// Longest two-dimensional mode code in bits
const MAX_MODE_CODE_BITS: u8 = 7;
/// Zero bits that precede the 1 of an EOL code
const EOL_ZEROS: usize = 11;

const WHITE: u8 = 0;
const BLACK: u8 = 1;

const WHITE_CODES: &[(u16, &str)] = &[
    (0, "00110101"), (1, "000111"), (2, "0111"), (3, "1000"),
    (4, "1011"), (5, "1100"), (6, "1110"), (7, "1111"),
    (8, "10011"), (9, "10100"), (10, "00111"), (11, "01000"),
    (12, "001000"), (13, "000011"), (14, "110100"), (15, "110101"),
    (16, "101010"), (17, "101011"), (18, "0100111"), (19, "0001100"),
    (20, "0001000"), (21, "0010111"), (22, "0000011"), (23, "0000100"),
    (24, "0101000"), (25, "0101011"), (26, "0010011"), (27, "0100100"),
    (28, "0011000"), (29, "00000010"), (30, "00000011"), (31, "00011010"),
    (32, "00011011"), (33, "00010010"), (34, "00010011"), (35, "00010100"),
    (36, "00010101"), (37, "00010110"), (38, "00010111"), (39, "00101000"),
    (40, "00101001"), (41, "00101010"), (42, "00101011"), (43, "00101100"),
    (44, "00101101"), (45, "00000100"), (46, "00000101"), (47, "00001010"),
    (48, "00001011"), (49, "01010010"), (50, "01010011"), (51, "01010100"),
    (52, "01010101"), (53, "00100100"), (54, "00100101"), (55, "01011000"),
    (56, "01011001"), (57, "01011010"), (58, "01011011"), (59, "01001010"),
    (60, "01001011"), (61, "00110010"), (62, "00110011"), (63, "00110100"),
    (64, "11011"), (128, "10010"), (192, "010111"), (256, "0110111"),
    (320, "00110110"), (384, "00110111"), (448, "01100100"), (512, "01100101"),
    (576, "01101000"), (640, "01100111"), (704, "011001100"), (768, "011001101"),
    (832, "011010010"), (896, "011010011"), (960, "011010100"), (1024, "011010101"),
    (1088, "011010110"), (1152, "011010111"), (1216, "011011000"), (1280, "011011001"),
    (1344, "011011010"), (1408, "011011011"), (1472, "010011000"), (1536, "010011001"),
    (1600, "010011010"), (1664, "011000"), (1728, "010011011"), (1792, "00000001000"),
    (1856, "00000001100"), (1920, "00000001101"), (1984, "000000010010"), (2048, "000000010011"),
    (2112, "000000010100"), (2176, "000000010101"), (2240, "000000010110"), (2304, "000000010111"),
    (2368, "000000011100"), (2432, "000000011101"), (2496, "000000011110"), (2560, "000000011111"),
];

const BLACK_CODES: &[(u16, &str)] = &[
    (0, "0000110111"), (1, "010"), (2, "11"), (3, "10"),
    (4, "011"), (5, "0011"), (6, "0010"), (7, "00011"),
    (8, "000101"), (9, "000100"), (10, "0000100"), (11, "0000101"),
    (12, "0000111"), (13, "00000100"), (14, "00000111"), (15, "000011000"),
    (16, "0000010111"), (17, "0000011000"), (18, "0000001000"), (19, "00001100111"),
    (20, "00001101000"), (21, "00001101100"), (22, "00000110111"), (23, "00000101000"),
    (24, "00000010111"), (25, "00000011000"), (26, "000011001010"), (27, "000011001011"),
    (28, "000011001100"), (29, "000011001101"), (30, "000001101000"), (31, "000001101001"),
    (32, "000001101010"), (33, "000001101011"), (34, "000011010010"), (35, "000011010011"),
    (36, "000011010100"), (37, "000011010101"), (38, "000011010110"), (39, "000011010111"),
    (40, "000001101100"), (41, "000001101101"), (42, "000011011010"), (43, "000011011011"),
    (44, "000001010100"), (45, "000001010101"), (46, "000001010110"), (47, "000001010111"),
    (48, "000001100100"), (49, "000001100101"), (50, "000001010010"), (51, "000001010011"),
    (52, "000000100100"), (53, "000000110111"), (54, "000000111000"), (55, "000000100111"),
    (56, "000000101000"), (57, "000001011000"), (58, "000001011001"), (59, "000000101011"),
    (60, "000000101100"), (61, "000001011010"), (62, "000001100110"), (63, "000001100111"),
    (64, "0000001111"), (128, "000011001000"), (192, "000011001001"), (256, "000001011011"),
    (320, "000000110011"), (384, "000000110100"), (448, "000000110101"), (512, "0000001101100"),
    (576, "0000001101101"), (640, "0000001001010"), (704, "0000001001011"), (768, "0000001001100"),
    (832, "0000001001101"), (896, "0000001110010"), (960, "0000001110011"), (1024, "0000001110100"),
    (1088, "0000001110101"), (1152, "0000001110110"), (1216, "0000001110111"), (1280, "0000001010010"),
    (1344, "0000001010011"), (1408, "0000001010100"), (1472, "0000001010101"), (1536, "0000001011010"),
    (1600, "0000001011011"), (1664, "0000001100100"), (1728, "0000001100101"), (1792, "00000001000"),
    (1856, "00000001100"), (1920, "00000001101"), (1984, "000000010010"), (2048, "000000010011"),
    (2112, "000000010100"), (2176, "000000010101"), (2240, "000000010110"), (2304, "000000010111"),
    (2368, "000000011100"), (2432, "000000011101"), (2496, "000000011110"), (2560, "000000011111"),
];

lazy_static! {
    static ref WHITE_RUNS: HashMap<(u8, u16), u16> = build_run_table(WHITE_CODES);
    static ref BLACK_RUNS: HashMap<(u8, u16), u16> = build_run_table(BLACK_CODES);
}

/// Key the code table by (bit length, code value)
fn build_run_table(codes: &[(u16, &str)]) -> HashMap<(u8, u16), u16> {
    codes
        .iter()
        .map(|&(run, code)| {
            let value = code
                .bytes()
                .fold(0u16, |acc, bit| (acc << 1) | u16::from(bit == b'1'));
            ((code.len() as u8, value), run)
        })
        .collect()
}

/// Coding scheme selected by `/K`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingScheme {
    /// K = 0: every row is one-dimensional (Modified Huffman)
    Group3OneD,
    /// K > 0: a tag bit before each row selects 1-D or 2-D coding
    Group3Mixed,
    /// K < 0: every row is two-dimensional, no EOLs
    Group4,
}

/// CCITTFaxDecode parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcittParams {
    pub k: i64,
    pub columns: usize,
    /// Expected rows; `None` decodes until the data ends
    pub rows: Option<usize>,
    pub encoded_byte_align: bool,
    pub end_of_block: bool,
    pub black_is_1: bool,
    pub damaged_rows_before_error: usize,
}

impl CcittParams {
    /// Read the DecodeParms entries, falling back to the image dictionary
    /// for the dimensions. A width is required.
    pub fn from_dicts(
        params: Option<&PdfDictionary>,
        stream_dict: &PdfDictionary,
    ) -> ParseResult<Self> {
        let integer = |key: &str| params.and_then(|d| d.get_integer(key));
        let flag = |key: &str, default: bool| {
            params
                .and_then(|d| d.get(key))
                .and_then(|obj| obj.as_bool())
                .unwrap_or(default)
        };
        let image_integer =
            |keys: &[&str]| stream_dict.get_any(keys).and_then(|obj| obj.as_integer());

        let columns = integer("Columns")
            .or_else(|| image_integer(&["Width", "W"]))
            .filter(|c| *c > 0)
            .ok_or_else(|| {
                ParseError::decode("CCITTFaxDecode requires /Columns or an image /Width")
            })?;
        let rows = integer("Rows")
            .or_else(|| image_integer(&["Height", "H"]))
            .filter(|r| *r > 0)
            .map(|r| r as usize);

        Ok(Self {
            k: integer("K").unwrap_or(0),
            columns: columns as usize,
            rows,
            encoded_byte_align: flag("EncodedByteAlign", false),
            end_of_block: flag("EndOfBlock", true),
            black_is_1: flag("BlackIs1", false),
            damaged_rows_before_error: integer("DamagedRowsBeforeError").unwrap_or(0).max(0)
                as usize,
        })
    }

    pub fn scheme(&self) -> CodingScheme {
        match self.k {
            k if k < 0 => CodingScheme::Group4,
            0 => CodingScheme::Group3OneD,
            _ => CodingScheme::Group3Mixed,
        }
    }

    /// Packed bytes per output row
    pub fn row_bytes(&self) -> usize {
        self.columns.div_ceil(8)
    }
}

/// Decode CCITT fax data into `out`, one packed row per scan line.
///
/// A first pass uses the scheme from `/K`. If it was not Group 4 and hit
/// damaged rows, the data is decoded again as Group 4 and the pass with fewer
/// damaged rows wins.
pub fn decode_ccitt(
    data: &[u8],
    params: Option<&PdfDictionary>,
    stream_dict: &PdfDictionary,
    out: &mut BoundedBuffer,
) -> ParseResult<()> {
    let params = CcittParams::from_dicts(params, stream_dict)?;
    // Working rows hold one byte per pixel
    out.ensure(params.columns)?;

    let scheme = params.scheme();
    let first = FaxDecoder::new(data, &params, scheme).run(out.sibling())?;
    let best = if first.faults > 0 && scheme != CodingScheme::Group4 {
        let retry = FaxDecoder::new(data, &params, CodingScheme::Group4).run(out.sibling())?;
        warn!(
            "CCITT data with K={} had {} damaged rows, Group 4 retry had {}",
            params.k, first.faults, retry.faults
        );
        if retry.rows > 0 && retry.faults < first.faults {
            retry
        } else {
            first
        }
    } else {
        first
    };

    if best.faults > params.damaged_rows_before_error {
        return Err(ParseError::decode(format!(
            "CCITTFaxDecode: {} damaged rows, DamagedRowsBeforeError is {}",
            best.faults, params.damaged_rows_before_error
        )));
    }
    if best.rows == 0 && !data.is_empty() {
        return Err(ParseError::decode("CCITTFaxDecode decoded no rows"));
    }
    out.extend_from_slice(best.output.as_slice())
}

/// Result of one decoding pass
struct Attempt {
    output: BoundedBuffer,
    rows: usize,
    faults: usize,
}

/// The current row does not decode
#[derive(Debug)]
struct Fault;

enum RowCoding {
    OneD,
    TwoD,
}

enum Mode {
    Pass,
    Horizontal,
    Vertical(isize),
}

/// If an EOL (at least 11 zero bits, then a 1) starts at the reader's
/// position, the bit position just past it
fn eol_end(reader: &BitReader<'_>) -> Option<usize> {
    let mut lookahead = reader.clone();
    let mut zeros = 0;
    loop {
        match lookahead.read_bit()? {
            0 => zeros += 1,
            _ => return (zeros >= EOL_ZEROS).then(|| lookahead.bit_position()),
        }
    }
}

/// Nothing but zero fill remains
fn only_fill_left(reader: &BitReader<'_>) -> bool {
    let mut lookahead = reader.clone();
    while !lookahead.is_at_end() {
        if lookahead.read_bit() == Some(1) {
            return false;
        }
    }
    true
}

struct FaxDecoder<'a> {
    reader: BitReader<'a>,
    params: &'a CcittParams,
    scheme: CodingScheme,
    /// Previous row, one byte per pixel
    reference: Vec<u8>,
    current: Vec<u8>,
}

impl<'a> FaxDecoder<'a> {
    fn new(data: &'a [u8], params: &'a CcittParams, scheme: CodingScheme) -> Self {
        Self {
            reader: BitReader::new(data),
            params,
            scheme,
            reference: vec![WHITE; params.columns],
            current: vec![WHITE; params.columns],
        }
    }

    fn run(mut self, mut output: BoundedBuffer) -> ParseResult<Attempt> {
        let mut rows = 0;
        let mut faults = 0;

        while self.params.rows.map_or(true, |limit| rows < limit) {
            let Some(coding) = self.begin_row() else {
                break;
            };

            self.current.fill(WHITE);
            let result = match coding {
                RowCoding::OneD => self.decode_one_d_row(),
                RowCoding::TwoD => self.decode_two_d_row(),
            };
            output.extend_from_slice(&self.pack_row())?;
            std::mem::swap(&mut self.reference, &mut self.current);
            rows += 1;

            if result.is_err() {
                faults += 1;
                debug!(
                    "CCITT {:?}: damaged row {} near bit {}",
                    self.scheme,
                    rows,
                    self.reader.bit_position()
                );
                if self.scheme == CodingScheme::Group4 || !self.resync() {
                    break;
                }
            }
        }

        Ok(Attempt {
            output,
            rows,
            faults,
        })
    }

    /// Consume what precedes a row. `None` at end of data.
    fn begin_row(&mut self) -> Option<RowCoding> {
        if self.params.encoded_byte_align {
            self.reader.align_to_byte();
        }

        match self.scheme {
            CodingScheme::Group4 => {
                // EOFB, or padding after the last row
                if only_fill_left(&self.reader) || eol_end(&self.reader).is_some() {
                    return None;
                }
                Some(RowCoding::TwoD)
            }
            CodingScheme::Group3OneD => {
                let mut eols = 0;
                while let Some(end) = eol_end(&self.reader) {
                    self.reader.set_bit_position(end);
                    eols += 1;
                }
                // RTC is a run of EOLs
                if only_fill_left(&self.reader) || (eols >= 2 && self.params.end_of_block) {
                    return None;
                }
                Some(RowCoding::OneD)
            }
            CodingScheme::Group3Mixed => {
                if let Some(end) = eol_end(&self.reader) {
                    self.reader.set_bit_position(end);
                    // RTC in mixed mode repeats EOL followed by a 1 tag bit
                    let mut lookahead = self.reader.clone();
                    if self.params.end_of_block
                        && lookahead.read_bit() == Some(1)
                        && eol_end(&lookahead).is_some()
                    {
                        return None;
                    }
                }
                if only_fill_left(&self.reader) {
                    return None;
                }
                match self.reader.read_bit()? {
                    1 => Some(RowCoding::OneD),
                    _ => Some(RowCoding::TwoD),
                }
            }
        }
    }

    /// Skip to the next EOL so the following row can be decoded
    fn resync(&mut self) -> bool {
        let mut zeros = 0;
        while let Some(bit) = self.reader.read_bit() {
            if bit == 0 {
                zeros += 1;
                continue;
            }
            if zeros >= EOL_ZEROS {
                let start = self.reader.bit_position() - EOL_ZEROS - 1;
                self.reader.set_bit_position(start);
                return true;
            }
            zeros = 0;
        }
        false
    }

    fn decode_one_d_row(&mut self) -> Result<(), Fault> {
        let columns = self.params.columns;
        let mut a0 = 0;
        let mut color = WHITE;

        while a0 < columns {
            let end = a0 + self.read_run(color)?;
            if end > columns {
                return Err(Fault);
            }
            self.current[a0..end].fill(color);
            a0 = end;
            color ^= 1;
        }
        Ok(())
    }

    fn decode_two_d_row(&mut self) -> Result<(), Fault> {
        let columns = self.params.columns;
        // -1 is the imaginary white pixel before the row
        let mut a0: isize = -1;
        let mut color = WHITE;

        while a0 < columns as isize {
            let start = a0.max(0) as usize;
            let (b1, b2) = self.changing_elements(a0, color);

            match self.read_mode()? {
                Mode::Pass => {
                    self.current[start..b2].fill(color);
                    a0 = b2 as isize;
                }
                Mode::Horizontal => {
                    let a1 = start + self.read_run(color)?;
                    let a2 = a1 + self.read_run(color ^ 1)?;
                    if a2 > columns {
                        return Err(Fault);
                    }
                    self.current[start..a1].fill(color);
                    self.current[a1..a2].fill(color ^ 1);
                    a0 = a2 as isize;
                }
                Mode::Vertical(delta) => {
                    let a1 = b1 as isize + delta;
                    if a1 < start as isize || a1 > columns as isize {
                        return Err(Fault);
                    }
                    self.current[start..a1 as usize].fill(color);
                    a0 = a1;
                    color ^= 1;
                }
            }
        }
        Ok(())
    }

    /// `b1`: first changing element on the reference row right of `a0`
    /// whose color is opposite to `color`. `b2`: the next change after it.
    fn changing_elements(&self, a0: isize, color: u8) -> (usize, usize) {
        let reference = &self.reference;
        let columns = self.params.columns;
        let start = (a0 + 1).max(0) as usize;

        let b1 = (start..columns)
            .find(|&p| {
                let before = if p == 0 { WHITE } else { reference[p - 1] };
                reference[p] != before && reference[p] != color
            })
            .unwrap_or(columns);
        let b2 = (b1 + 1..columns)
            .find(|&p| reference[p] != reference[p - 1])
            .unwrap_or(columns);
        (b1, b2)
    }

    fn read_mode(&mut self) -> Result<Mode, Fault> {
        let mut value = 0u8;
        for len in 1..=MAX_MODE_CODE_BITS {
            value = (value << 1) | self.reader.read_bit().ok_or(Fault)?;
            let mode = match (len, value) {
                (1, 0b1) => Mode::Vertical(0),
                (3, 0b011) => Mode::Vertical(1),
                (3, 0b010) => Mode::Vertical(-1),
                (3, 0b001) => Mode::Horizontal,
                (4, 0b0001) => Mode::Pass,
                (6, 0b000011) => Mode::Vertical(2),
                (6, 0b000010) => Mode::Vertical(-2),
                (7, 0b0000011) => Mode::Vertical(3),
                (7, 0b0000010) => Mode::Vertical(-3),
                _ => continue,
            };
            return Ok(mode);
        }
        Err(Fault)
    }

    /// Make-up codes followed by a terminating code
    fn read_run(&mut self, color: u8) -> Result<usize, Fault> {
        let table: &HashMap<(u8, u16), u16> = if color == WHITE {
            &WHITE_RUNS
        } else {
            &BLACK_RUNS
        };
        let mut total = 0usize;
        loop {
            let run = self.read_code(table)?;
            total += usize::from(run);
            if run < 64 {
                return Ok(total);
            }
        }
    }

    fn read_code(&mut self, table: &HashMap<(u8, u16), u16>) -> Result<u16, Fault> {
        let mut value = 0u16;
        for len in 1..=MAX_RUN_CODE_BITS {
            value = (value << 1) | u16::from(self.reader.read_bit().ok_or(Fault)?);
            if let Some(&run) = table.get(&(len, value)) {
                return Ok(run);
            }
        }
        Err(Fault)
    }

    fn pack_row(&self) -> Vec<u8> {
        let (black_bit, white_bit) = if self.params.black_is_1 {
            (1u8, 0u8)
        } else {
            (0u8, 1u8)
        };
        let mut packed = vec![0u8; self.params.row_bytes()];
        for (i, &pixel) in self.current.iter().enumerate() {
            let bit = if pixel == BLACK { black_bit } else { white_bit };
            packed[i / 8] |= bit << (7 - i % 8);
        }
        packed
    }
}
