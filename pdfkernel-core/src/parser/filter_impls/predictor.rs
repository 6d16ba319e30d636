//! Predictor functions for FlateDecode and LZWDecode (ISO 32000-1 Section 7.4.4.4)
//!
//! TIFF predictor 2 and the PNG predictors 10-15. PNG rows carry their own
//! filter-type byte, so all PNG predictor values decode the same way.

use crate::parser::objects::PdfDictionary;
use crate::parser::{ParseError, ParseResult};

/// Predictor parameters from a DecodeParms dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    pub fn from_dict(params: Option<&PdfDictionary>) -> Self {
        let defaults = Self::default();
        let Some(dict) = params else {
            return defaults;
        };
        let positive = |key: &str, default: usize| {
            dict.get_integer(key)
                .filter(|v| *v > 0)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(default)
        };
        Self {
            predictor: dict.get_integer("Predictor").unwrap_or(defaults.predictor),
            colors: positive("Colors", defaults.colors),
            bits_per_component: positive("BitsPerComponent", defaults.bits_per_component),
            columns: positive("Columns", defaults.columns),
        }
    }

    pub fn is_active(&self) -> bool {
        self.predictor > 1
    }

    fn bits_per_pixel(&self) -> ParseResult<usize> {
        self.colors
            .checked_mul(self.bits_per_component)
            .ok_or_else(|| self.overflow())
    }

    /// Bytes per complete pixel, at least one
    fn bytes_per_pixel(&self) -> ParseResult<usize> {
        Ok(self.bits_per_pixel()?.div_ceil(8).max(1))
    }

    /// Bytes in one row of samples, without the PNG tag byte
    pub fn row_bytes(&self) -> ParseResult<usize> {
        let bits = self
            .bits_per_pixel()?
            .checked_mul(self.columns)
            .ok_or_else(|| self.overflow())?;
        Ok(bits.div_ceil(8))
    }

    fn overflow(&self) -> ParseError {
        ParseError::decode(format!(
            "Predictor row size overflows: /Colors {} /BitsPerComponent {} /Columns {}",
            self.colors, self.bits_per_component, self.columns
        ))
    }
}

/// Undo the predictor. Output is never longer than the input.
pub fn apply_predictor(data: &[u8], params: &PredictorParams) -> ParseResult<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(ParseError::decode(format!("Unsupported predictor {other}"))),
    }
}

fn decode_png(data: &[u8], params: &PredictorParams) -> ParseResult<Vec<u8>> {
    let row_bytes = params.row_bytes()?;
    let bpp = params.bytes_per_pixel()?;
    let mut output = Vec::with_capacity(data.len());
    // No row is longer than the data
    let mut prev_row = vec![0u8; row_bytes.min(data.len())];

    for chunk in data.chunks(row_bytes.saturating_add(1)) {
        let filter_type = chunk[0];
        let mut row = chunk[1..].to_vec();

        match filter_type {
            0 => {}
            1 => {
                for i in bpp..row.len() {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            2 => {
                for i in 0..row.len() {
                    row[i] = row[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..row.len() {
                    let left = if i >= bpp { u16::from(row[i - bpp]) } else { 0 };
                    let up = u16::from(prev_row[i]);
                    row[i] = row[i].wrapping_add(((left + up) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row.len() {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    let up = prev_row[i];
                    let up_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    row[i] = row[i].wrapping_add(paeth(left, up, up_left));
                }
            }
            other => {
                return Err(ParseError::decode(format!(
                    "Invalid PNG predictor row type {other}"
                )))
            }
        }

        output.extend_from_slice(&row);
        prev_row[..row.len()].copy_from_slice(&row);
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn decode_tiff(data: &[u8], params: &PredictorParams) -> ParseResult<Vec<u8>> {
    let row_bytes = params.row_bytes()?;
    let mut output = data.to_vec();

    for row in output.chunks_mut(row_bytes) {
        match params.bits_per_component {
            8 => {
                for i in params.colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - params.colors]);
                }
            }
            16 => {
                let stride = params.colors.saturating_mul(2);
                let mut i = stride;
                while i < row.len().saturating_sub(1) {
                    let prev = u16::from_be_bytes([row[i - stride], row[i - stride + 1]]);
                    let cur = u16::from_be_bytes([row[i], row[i + 1]]);
                    let [hi, lo] = cur.wrapping_add(prev).to_be_bytes();
                    row[i] = hi;
                    row[i + 1] = lo;
                    i += 2;
                }
            }
            1 | 2 | 4 => decode_tiff_packed_row(row, params),
            other => {
                return Err(ParseError::decode(format!(
                    "Unsupported BitsPerComponent {other} for TIFF predictor"
                )))
            }
        }
    }

    Ok(output)
}

/// TIFF prediction over samples narrower than a byte
fn decode_tiff_packed_row(row: &mut [u8], params: &PredictorParams) {
    let bits = params.bits_per_component;
    let mask = (1u16 << bits) - 1;
    let samples = (row.len() * 8 / bits).min(params.columns.saturating_mul(params.colors));

    for index in params.colors..samples {
        let current = read_sample(row, index, bits);
        let left = read_sample(row, index - params.colors, bits);
        write_sample(row, index, bits, (current + left) & mask);
    }
}

fn read_sample(row: &[u8], index: usize, bits: usize) -> u16 {
    let bit = index * bits;
    let shift = 8 - bits - bit % 8;
    (u16::from(row[bit / 8]) >> shift) & ((1 << bits) - 1)
}

fn write_sample(row: &mut [u8], index: usize, bits: usize, value: u16) {
    let bit = index * bits;
    let shift = 8 - bits - bit % 8;
    let mask = (((1u16 << bits) - 1) << shift) as u8;
    row[bit / 8] = (row[bit / 8] & !mask) | (((value << shift) as u8) & mask);
}
