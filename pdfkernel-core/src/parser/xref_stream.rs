//! Cross-reference stream support for PDF 1.5+
//!
//! This module implements cross-reference streams according to
//! ISO 32000-1:2008 Section 7.5.8 (Cross-Reference Streams).
//!
//! Cross-reference streams are an alternative to traditional xref tables,
//! providing more compact representation and supporting compressed object streams.

use crate::parser::objects::{PdfDictionary, PdfObject};
use crate::parser::xref::XRefEntry;
use crate::parser::{ParseError, ParseResult};
use tracing::{debug, warn};

/// Widest field the format allows us to hold in a `u64`
const MAX_FIELD_WIDTH: usize = 8;

/// Decoded cross-reference stream
#[derive(Debug, Clone)]
pub struct XRefStream {
    /// Stream dictionary, which doubles as the trailer
    pub dict: PdfDictionary,
    /// Decoded stream data
    pub data: Vec<u8>,
    /// Field widths from W array
    pub widths: [usize; 3],
    /// Index array (pairs of [first_object_number, count])
    pub index: Vec<(u32, u32)>,
}

fn invalid(message: impl Into<String>) -> ParseError {
    ParseError::InvalidXRef(message.into())
}

impl XRefStream {
    /// Interpret an already decoded xref stream
    pub fn new(dict: PdfDictionary, data: Vec<u8>) -> ParseResult<Self> {
        let widths = Self::read_widths(&dict)?;
        let index = Self::read_index(&dict)?;
        Ok(XRefStream {
            dict,
            data,
            widths,
            index,
        })
    }

    fn read_widths(dict: &PdfDictionary) -> ParseResult<[usize; 3]> {
        let array = dict
            .get("W")
            .and_then(PdfObject::as_array)
            .ok_or_else(|| ParseError::MissingKey("W".to_string()))?;

        if array.len() != 3 {
            return Err(invalid(format!(
                "W array must have 3 elements, found {}",
                array.len()
            )));
        }

        let mut widths = [0usize; 3];
        for (slot, obj) in widths.iter_mut().zip(array.iter()) {
            let width = obj
                .as_integer()
                .and_then(|w| usize::try_from(w).ok())
                .ok_or_else(|| invalid("Invalid width in W array"))?;
            if width > MAX_FIELD_WIDTH {
                return Err(invalid(format!("Field width {width} too large")));
            }
            *slot = width;
        }
        Ok(widths)
    }

    fn read_index(dict: &PdfDictionary) -> ParseResult<Vec<(u32, u32)>> {
        let as_u32 = |obj: &PdfObject, what: &str| {
            obj.as_integer()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| invalid(format!("Invalid {what} in Index")))
        };

        match dict.get("Index").and_then(PdfObject::as_array) {
            Some(array) => {
                if array.len() % 2 != 0 {
                    warn!("Odd-length /Index array in xref stream, ignoring last element");
                }
                array
                    .0
                    .chunks_exact(2)
                    .map(|pair| Ok((as_u32(&pair[0], "first object")?, as_u32(&pair[1], "count")?)))
                    .collect()
            }
            None => {
                let size = dict
                    .get_integer("Size")
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| ParseError::MissingKey("Size".to_string()))?;
                Ok(vec![(0, size)])
            }
        }
    }

    /// Total bytes of one entry
    pub fn entry_size(&self) -> usize {
        self.widths.iter().sum()
    }

    /// Convert the cross-reference stream to XRefTable entries.
    ///
    /// Data shorter than the index promises yields the entries that are
    /// complete. Entries of unknown type are skipped.
    pub fn to_xref_entries(&self) -> ParseResult<Vec<(u32, XRefEntry)>> {
        let entry_size = self.entry_size();
        if entry_size == 0 {
            return Err(invalid("Entry size 0 in xref stream"));
        }

        let mut entries = Vec::new();
        let mut rows = self.data.chunks_exact(entry_size);

        'sections: for &(first, count) in &self.index {
            for i in 0..count {
                let Some(row) = rows.next() else {
                    warn!(
                        "Xref stream data truncated after {} entries",
                        entries.len()
                    );
                    break 'sections;
                };
                let Some(number) = first.checked_add(i) else {
                    break 'sections;
                };

                let (type_field, rest) = row.split_at(self.widths[0]);
                let (field2, field3) = rest.split_at(self.widths[1]);

                // A zero-width type field means type 1
                let entry_type = if self.widths[0] == 0 {
                    1
                } else {
                    read_field(type_field)
                };
                let f2 = read_field(field2);
                let f3 = read_field(field3);

                let entry = match entry_type {
                    0 => XRefEntry::Free {
                        next: f2 as u32,
                        generation: f3 as u16,
                    },
                    1 => XRefEntry::InUse {
                        offset: f2,
                        generation: f3 as u16,
                    },
                    2 => XRefEntry::Compressed {
                        stream: f2 as u32,
                        index: f3 as u32,
                    },
                    other => {
                        debug!("Skipping xref stream entry {number} of unknown type {other}");
                        continue;
                    }
                };
                entries.push((number, entry));
            }
        }

        Ok(entries)
    }
}

/// Big-endian unsigned field; empty fields read as zero
fn read_field(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::PdfArray;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i64]) -> PdfObject {
        PdfObject::Array(PdfArray(
            values.iter().map(|&v| PdfObject::Integer(v)).collect(),
        ))
    }

    fn dict(widths: &[i64], index: Option<&[i64]>, size: i64) -> PdfDictionary {
        let mut dict = PdfDictionary::new();
        dict.insert("Type", PdfObject::Name(crate::parser::PdfName::new("XRef")));
        dict.insert("W", ints(widths));
        dict.insert("Size", PdfObject::Integer(size));
        if let Some(index) = index {
            dict.insert("Index", ints(index));
        }
        dict
    }

    #[test]
    fn test_read_field() {
        assert_eq!(read_field(&[]), 0);
        assert_eq!(read_field(&[0x01, 0x02]), 0x0102);
        assert_eq!(read_field(&[0xFF; 8]), u64::MAX);
    }

    #[test]
    fn test_all_entry_types() {
        let data = vec![
            0, 0, 0, 0xFF, // free, next 0, gen 255
            1, 0x01, 0x00, 0, // in use at 256
            2, 0, 5, 3, // in stream 5 at index 3
        ];
        let stream = XRefStream::new(dict(&[1, 2, 1], None, 3), data).unwrap();
        assert_eq!(stream.entry_size(), 4);
        assert_eq!(
            stream.to_xref_entries().unwrap(),
            vec![
                (
                    0,
                    XRefEntry::Free {
                        next: 0,
                        generation: 255
                    }
                ),
                (
                    1,
                    XRefEntry::InUse {
                        offset: 256,
                        generation: 0
                    }
                ),
                (2, XRefEntry::Compressed { stream: 5, index: 3 }),
            ]
        );
    }

    #[test]
    fn test_zero_width_type_defaults_to_in_use() {
        let data = vec![0x00, 0x10, 0x00, 0x20];
        let stream = XRefStream::new(dict(&[0, 2, 0], None, 2), data).unwrap();
        let entries = stream.to_xref_entries().unwrap();
        assert_eq!(
            entries[1],
            (
                1,
                XRefEntry::InUse {
                    offset: 0x20,
                    generation: 0
                }
            )
        );
    }

    #[test]
    fn test_index_subsections() {
        let data = vec![1, 10, 1, 20, 1, 30];
        let stream = XRefStream::new(dict(&[1, 1, 0], Some(&[3, 1, 10, 2]), 12), data).unwrap();
        let numbers: Vec<u32> = stream
            .to_xref_entries()
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(numbers, vec![3, 10, 11]);
    }

    #[test]
    fn test_truncated_data_keeps_complete_entries() {
        let data = vec![1, 10, 1];
        let stream = XRefStream::new(dict(&[1, 1, 0], None, 3), data).unwrap();
        assert_eq!(stream.to_xref_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_type_skipped() {
        let data = vec![7, 1, 1, 2];
        let stream = XRefStream::new(dict(&[1, 1, 0], None, 2), data).unwrap();
        assert_eq!(
            stream.to_xref_entries().unwrap(),
            vec![(
                1,
                XRefEntry::InUse {
                    offset: 2,
                    generation: 0
                }
            )]
        );
    }

    #[test]
    fn test_invalid_w() {
        assert!(matches!(
            XRefStream::new(dict(&[1, 2], None, 1), vec![]),
            Err(ParseError::InvalidXRef(_))
        ));
        assert!(XRefStream::new(dict(&[1, 9, 1], None, 1), vec![]).is_err());
        assert!(XRefStream::new(dict(&[1, -2, 1], None, 1), vec![]).is_err());

        let mut missing = dict(&[1, 2, 1], None, 1);
        missing.remove("W");
        assert!(matches!(
            XRefStream::new(missing, vec![]),
            Err(ParseError::MissingKey(_))
        ));
    }

    #[test]
    fn test_zero_entry_size_is_error() {
        let stream = XRefStream::new(dict(&[0, 0, 0], None, 1), vec![]).unwrap();
        assert!(stream.to_xref_entries().is_err());
    }
}
