//! LZW decode implementation according to ISO 32000-1 Section 7.4.4
//!
//! Variable-width codes (9 to 12 bits, MSB first) index a string table that
//! starts with the 256 single-byte strings plus the clear-table (256) and
//! end-of-data (257) markers.

use super::BitReader;
use crate::memory::BoundedBuffer;
use crate::parser::{ParseError, ParseResult};

const CLEAR_TABLE: usize = 256;
const END_OF_DATA: usize = 257;
const INITIAL_TABLE_LEN: usize = 258;
const MAX_TABLE_LEN: usize = 4096;

/// Code width the decoder uses while its table holds `table_len` entries.
///
/// With early change the width grows one code sooner, at 511/1023/2047
/// entries instead of 512/1024/2048.
pub fn code_width_for(table_len: usize, early_change: bool) -> u8 {
    let adjusted = table_len + usize::from(early_change);
    if adjusted >= 2048 {
        12
    } else if adjusted >= 1024 {
        11
    } else if adjusted >= 512 {
        10
    } else {
        9
    }
}

/// Stateful LZW decoder
#[derive(Debug, Clone)]
pub struct LzwDecoder {
    table: Vec<Vec<u8>>,
    early_change: bool,
    previous: Option<usize>,
}

impl Default for LzwDecoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LzwDecoder {
    pub fn new(early_change: bool) -> Self {
        let mut table = Vec::with_capacity(MAX_TABLE_LEN);
        table.extend((0..=255u8).map(|b| vec![b]));
        // Placeholders for the clear-table and end-of-data codes
        table.push(Vec::new());
        table.push(Vec::new());
        Self {
            table,
            early_change,
            previous: None,
        }
    }

    /// Number of entries in the string table
    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    /// Width of the next code to be read
    pub fn code_width(&self) -> u8 {
        code_width_for(self.table.len(), self.early_change)
    }

    fn reset(&mut self) {
        self.table.truncate(INITIAL_TABLE_LEN);
        self.previous = None;
    }

    /// Decode `data` into `out`.
    ///
    /// Running out of input, including a trailing partial code, counts as
    /// end of data. A code that the table cannot explain is an error.
    pub fn decode(&mut self, data: &[u8], out: &mut BoundedBuffer) -> ParseResult<()> {
        let mut reader = BitReader::new(data);

        loop {
            let code = match reader.read_bits(self.code_width()) {
                Some(code) => code as usize,
                None => break,
            };

            match code {
                CLEAR_TABLE => {
                    self.reset();
                    continue;
                }
                END_OF_DATA => break,
                _ => {}
            }

            let entry = if code < self.table.len() {
                self.table[code].clone()
            } else if code == self.table.len() {
                // KwKwK: the code being defined by this very step
                let previous = self.previous.ok_or_else(|| {
                    ParseError::decode(format!("LZW code {code} without a previous code"))
                })?;
                let mut entry = self.table[previous].clone();
                entry.push(entry[0]);
                entry
            } else {
                return Err(ParseError::decode(format!(
                    "Invalid LZW code {code} (table has {} entries)",
                    self.table.len()
                )));
            };

            out.extend_from_slice(&entry)?;

            if let Some(previous) = self.previous {
                if self.table.len() < MAX_TABLE_LEN {
                    let mut new_entry = self.table[previous].clone();
                    new_entry.push(entry[0]);
                    self.table.push(new_entry);
                }
            }
            self.previous = Some(code);
        }

        Ok(())
    }
}
