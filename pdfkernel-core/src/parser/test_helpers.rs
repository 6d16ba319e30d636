//! Helper functions for creating valid test PDFs with correct offsets

use std::collections::{BTreeMap, HashMap};

/// Writes objects and classic xref sections, keeping track of offsets
pub struct PdfBuilder {
    data: Vec<u8>,
    /// Objects written since the last xref section
    pending: BTreeMap<u32, (u16, u64)>,
    offsets: HashMap<u32, u64>,
    max_number: u32,
    sections: usize,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::with_version("1.4")
    }

    pub fn with_version(version: &str) -> Self {
        let mut data = format!("%PDF-{version}\n").into_bytes();
        data.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            data,
            pending: BTreeMap::new(),
            offsets: HashMap::new(),
            max_number: 0,
            sections: 0,
        }
    }

    pub fn object(&mut self, number: u32, body: &[u8]) -> &mut Self {
        self.object_with_generation(number, 0, body)
    }

    pub fn object_with_generation(&mut self, number: u32, generation: u16, body: &[u8]) -> &mut Self {
        let offset = self.next_offset();
        self.data
            .extend_from_slice(format!("{number} {generation} obj\n").as_bytes());
        self.data.extend_from_slice(body);
        self.data.extend_from_slice(b"\nendobj\n");
        self.pending.insert(number, (generation, offset));
        self.offsets.insert(number, offset);
        self.max_number = self.max_number.max(number);
        self
    }

    /// A stream object whose /Length matches `payload`
    pub fn stream_object(&mut self, number: u32, extra_dict: &str, payload: &[u8]) -> &mut Self {
        let mut body = format!("<< /Length {} {extra_dict} >>\nstream\n", payload.len()).into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\nendstream");
        self.object(number, &body)
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Offset of the latest definition of `number`
    pub fn offset_of(&self, number: u32) -> u64 {
        self.offsets[&number]
    }

    pub fn next_offset(&self) -> u64 {
        self.data.len() as u64
    }

    fn write_table(&mut self) -> u64 {
        let offset = self.next_offset();
        let mut table = String::from("xref\n");
        if self.sections == 0 {
            table.push_str("0 1\n0000000000 65535 f \n");
        }
        for (number, (generation, object_offset)) in &self.pending {
            table.push_str(&format!("{number} 1\n{object_offset:010} {generation:05} n \n"));
        }
        self.data.extend_from_slice(table.as_bytes());
        self.pending.clear();
        self.sections += 1;
        offset
    }

    fn write_trailer(&mut self, dict: &[u8], xref_offset: u64) {
        self.data.extend_from_slice(b"trailer\n");
        self.data.extend_from_slice(dict);
        self.data
            .extend_from_slice(format!("\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
    }

    /// Write an xref section for the objects since the last one, with its
    /// trailer; returns the section's offset
    pub fn write_xref(&mut self, root: u32, prev: Option<u64>) -> u64 {
        let offset = self.write_table();
        let prev = prev.map(|p| format!(" /Prev {p}")).unwrap_or_default();
        let dict = format!("<< /Size {} /Root {root} 0 R{prev} >>", self.max_number + 1);
        self.write_trailer(dict.as_bytes(), offset);
        offset
    }

    pub fn finish(mut self, root: u32) -> Vec<u8> {
        self.write_xref(root, None);
        self.data
    }

    /// Finish with an incremental-update section pointing at `prev`
    pub fn finish_update(mut self, root: u32, prev: u64) -> Vec<u8> {
        self.write_xref(root, Some(prev));
        self.data
    }

    pub fn finish_with_trailer(mut self, dict: &[u8]) -> Vec<u8> {
        let offset = self.write_table();
        self.write_trailer(dict, offset);
        self.data
    }

    /// The bytes written so far, without any xref section
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Creates a minimal valid PDF with correct xref offsets
pub fn create_minimal_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    builder.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");
    builder.object(2, b"<< /Type /Pages /Kids [] /Count 0 >>");
    builder.finish(1)
}
