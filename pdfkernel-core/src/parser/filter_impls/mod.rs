//! PDF stream filter implementations
//!
//! This module contains the bit-level decoders used by the filter pipeline
//! according to ISO 32000-1:2008 Section 7.4

pub mod ccitt;
pub mod lzw;
pub mod predictor;

pub use ccitt::{decode_ccitt, CcittParams};
pub use lzw::LzwDecoder;
pub use predictor::{apply_predictor, PredictorParams};

/// MSB-first bit reader over a byte slice
#[derive(Debug, Clone)]
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8, // 0-7, position within current byte
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Read a single bit (0 or 1)
    pub(crate) fn read_bit(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.byte_pos)?;
        let bit = (byte >> (7 - self.bit_pos)) & 1;

        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Some(bit)
    }

    /// Read `count` bits (at most 32). Returns `None` without consuming
    /// anything if fewer bits remain.
    pub(crate) fn read_bits(&mut self, count: u8) -> Option<u32> {
        if count > 32 || self.remaining_bits() < usize::from(count) {
            return None;
        }
        let mut result = 0u32;
        for _ in 0..count {
            result = (result << 1) | u32::from(self.read_bit()?);
        }
        Some(result)
    }

    /// Align to next byte boundary
    pub(crate) fn align_to_byte(&mut self) {
        if self.bit_pos != 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    pub(crate) fn bit_position(&self) -> usize {
        self.byte_pos * 8 + usize::from(self.bit_pos)
    }

    pub(crate) fn set_bit_position(&mut self, pos: usize) {
        let pos = pos.min(self.data.len() * 8);
        self.byte_pos = pos / 8;
        self.bit_pos = (pos % 8) as u8;
    }

    pub(crate) fn remaining_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_position())
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.remaining_bits() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_msb_first() {
        let mut reader = BitReader::new(&[0b1011_0001, 0xFF]);
        assert_eq!(reader.read_bit(), Some(1));
        assert_eq!(reader.read_bits(3), Some(0b011));
        assert_eq!(reader.read_bits(9), Some(0b0001_11111));
        assert_eq!(reader.remaining_bits(), 3);
        assert_eq!(reader.read_bits(4), None);
        assert_eq!(reader.read_bits(3), Some(0b111));
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_align_to_byte() {
        let mut reader = BitReader::new(&[0xA0, 0x0F]);
        assert_eq!(reader.read_bits(3), Some(0b101));
        reader.align_to_byte();
        assert_eq!(reader.bit_position(), 8);
        reader.align_to_byte();
        assert_eq!(reader.bit_position(), 8);
        assert_eq!(reader.read_bits(8), Some(0x0F));
    }

    #[test]
    fn test_set_position_clamps() {
        let mut reader = BitReader::new(&[0x00]);
        reader.set_bit_position(100);
        assert!(reader.is_at_end());
        assert_eq!(reader.read_bit(), None);
    }
}
