//! Shared helpers for building test PDFs
//!
//! `TestPdf` writes objects, object streams and cross-reference sections
//! (classic tables or xref streams) while keeping every offset, so tests
//! can lay out incremental updates and hybrid files byte by byte.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::Write;

/// A cross-reference entry as a test writes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Free { generation: u16 },
    InUse { offset: u64, generation: u16 },
    Compressed { stream: u32, index: u32 },
}

pub struct TestPdf {
    data: Vec<u8>,
    /// Entries written since the last cross-reference section
    pending: BTreeMap<u32, Entry>,
    max_number: u32,
    sections: usize,
}

impl TestPdf {
    pub fn new(version: &str) -> Self {
        let mut data = format!("%PDF-{version}\n").into_bytes();
        data.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            data,
            pending: BTreeMap::new(),
            max_number: 0,
            sections: 0,
        }
    }

    pub fn offset(&self) -> u64 {
        self.data.len() as u64
    }

    fn record(&mut self, number: u32, entry: Entry) {
        self.pending.insert(number, entry);
        self.max_number = self.max_number.max(number);
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Write `number 0 obj body endobj`, returning its offset
    pub fn object(&mut self, number: u32, body: &str) -> u64 {
        self.object_bytes(number, body.as_bytes())
    }

    pub fn object_bytes(&mut self, number: u32, body: &[u8]) -> u64 {
        let offset = self.offset();
        self.data
            .extend_from_slice(format!("{number} 0 obj\n").as_bytes());
        self.data.extend_from_slice(body);
        self.data.extend_from_slice(b"\nendobj\n");
        self.record(
            number,
            Entry::InUse {
                offset,
                generation: 0,
            },
        );
        offset
    }

    /// A stream object with a correct direct `/Length`
    pub fn stream(&mut self, number: u32, dict_entries: &str, payload: &[u8]) -> u64 {
        let mut body =
            format!("<< /Length {} {dict_entries} >>\nstream\n", payload.len()).into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\nendstream");
        self.object_bytes(number, &body)
    }

    /// Mark `number` free in the next section
    pub fn free(&mut self, number: u32, generation: u16) {
        self.record(number, Entry::Free { generation });
    }

    /// Write an object stream holding `objects`; they get compressed
    /// entries in the next section
    pub fn object_stream(&mut self, number: u32, objects: &[(u32, &str)], flate: bool) -> u64 {
        let mut header = String::new();
        let mut body = String::new();
        for (number, text) in objects {
            header.push_str(&format!("{number} {} ", body.len()));
            body.push_str(text);
            body.push('\n');
        }
        let payload = format!("{header}{body}").into_bytes();
        let entries = format!(
            "/Type /ObjStm /N {} /First {}{}",
            objects.len(),
            header.len(),
            if flate { " /Filter /FlateDecode" } else { "" }
        );
        let payload = if flate { deflate(&payload) } else { payload };
        let offset = self.stream(number, &entries, &payload);

        for (index, (object, _)) in objects.iter().enumerate() {
            self.record(
                *object,
                Entry::Compressed {
                    stream: number,
                    index: index as u32,
                },
            );
        }
        offset
    }

    /// Entries written since the last section, leaving none pending
    pub fn take_pending(&mut self) -> BTreeMap<u32, Entry> {
        std::mem::take(&mut self.pending)
    }

    /// `/Size` covering everything written so far and `entries`
    fn size_with(&mut self, entries: &BTreeMap<u32, Entry>) -> u32 {
        if let Some(&last) = entries.keys().next_back() {
            self.max_number = self.max_number.max(last);
        }
        self.max_number + 1
    }

    /// Classic `xref` table for the pending entries plus a trailer
    pub fn xref_table(&mut self, trailer_entries: &str) -> u64 {
        let entries = self.take_pending();
        self.xref_table_with(&entries, trailer_entries)
    }

    pub fn xref_table_with(&mut self, entries: &BTreeMap<u32, Entry>, trailer_entries: &str) -> u64 {
        let offset = self.offset();
        let mut table = String::from("xref\n");
        if self.sections == 0 {
            table.push_str("0 1\n0000000000 65535 f \n");
        }
        for (number, entry) in entries {
            let line = match entry {
                Entry::Free { generation } => format!("0000000000 {generation:05} f "),
                Entry::InUse { offset, generation } => format!("{offset:010} {generation:05} n "),
                Entry::Compressed { .. } => panic!("classic tables cannot hold compressed entries"),
            };
            table.push_str(&format!("{number} 1\n{line}\n"));
        }
        table.push_str(&format!(
            "trailer\n<< /Size {} {trailer_entries} >>\n",
            self.size_with(entries)
        ));
        self.data.extend_from_slice(table.as_bytes());
        self.sections += 1;
        offset
    }

    /// Cross-reference stream object `number` for the pending entries
    /// (itself included)
    pub fn xref_stream(&mut self, number: u32, dict_entries: &str, flate: bool) -> u64 {
        let offset = self.offset();
        self.record(
            number,
            Entry::InUse {
                offset,
                generation: 0,
            },
        );
        let entries = self.take_pending();
        self.write_xref_stream(number, &entries, dict_entries, flate)
    }

    /// Cross-reference stream object `number` for `entries` only; the
    /// stream itself stays pending for a later section
    pub fn xref_stream_with(
        &mut self,
        number: u32,
        entries: &BTreeMap<u32, Entry>,
        dict_entries: &str,
        flate: bool,
    ) -> u64 {
        let offset = self.offset();
        self.record(
            number,
            Entry::InUse {
                offset,
                generation: 0,
            },
        );
        self.write_xref_stream(number, entries, dict_entries, flate)
    }

    fn write_xref_stream(
        &mut self,
        number: u32,
        entries: &BTreeMap<u32, Entry>,
        dict_entries: &str,
        flate: bool,
    ) -> u64 {
        let mut rows: Vec<(u32, [u8; 7])> = Vec::new();
        if self.sections == 0 {
            rows.push((0, pack(0, 0, 0xFFFF)));
        }
        for (&object, entry) in entries {
            let row = match *entry {
                Entry::Free { generation } => pack(0, 0, generation),
                Entry::InUse { offset, generation } => pack(1, offset as u32, generation),
                Entry::Compressed { stream, index } => pack(2, stream, index as u16),
            };
            rows.push((object, row));
        }

        let index: Vec<String> = rows.iter().map(|(n, _)| format!("{n} 1")).collect();
        let mut payload: Vec<u8> = rows.iter().flat_map(|(_, row)| row.iter().copied()).collect();
        if flate {
            payload = deflate(&payload);
        }

        let dict = format!(
            "/Type /XRef /Size {} /W [1 4 2] /Index [{}]{} {dict_entries}",
            self.size_with(entries),
            index.join(" "),
            if flate { " /Filter /FlateDecode" } else { "" }
        );
        self.sections += 1;
        let offset = self.offset();
        let mut body = format!("<< /Length {} {dict} >>\nstream\n", payload.len()).into_bytes();
        body.extend_from_slice(&payload);
        body.extend_from_slice(b"\nendstream");
        self.data
            .extend_from_slice(format!("{number} 0 obj\n").as_bytes());
        self.data.extend_from_slice(&body);
        self.data.extend_from_slice(b"\nendobj\n");
        offset
    }

    pub fn startxref(&mut self, offset: u64) -> &mut Self {
        self.data
            .extend_from_slice(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

fn pack(kind: u8, field2: u32, field3: u16) -> [u8; 7] {
    let mut row = [0u8; 7];
    row[0] = kind;
    row[1..5].copy_from_slice(&field2.to_be_bytes());
    row[5..7].copy_from_slice(&field3.to_be_bytes());
    row
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write to Vec");
    encoder.finish().expect("finish zlib stream")
}

/// A small single-section document: catalog 1, pages 2
pub fn simple_pdf() -> Vec<u8> {
    let mut pdf = TestPdf::new("1.4");
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    pdf.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    let xref = pdf.xref_table("/Root 1 0 R");
    pdf.startxref(xref);
    pdf.into_bytes()
}

pub fn find(data: &[u8], pattern: &[u8]) -> Option<usize> {
    data.windows(pattern.len()).position(|w| w == pattern)
}

/// Replace the first occurrence of `from`
pub fn replace_first(data: &mut Vec<u8>, from: &[u8], to: &[u8]) {
    let at = find(data, from).expect("pattern present");
    data.splice(at..at + from.len(), to.iter().copied());
}
