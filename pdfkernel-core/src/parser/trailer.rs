//! PDF Trailer Parser
//!
//! Parses PDF trailer according to ISO 32000-1 Section 7.5.5

use super::objects::{ObjectId, PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

/// PDF Trailer information
#[derive(Debug, Clone, PartialEq)]
pub struct PdfTrailer {
    /// The trailer dictionary
    pub dict: PdfDictionary,
    /// Byte offset of previous xref section (if any)
    pub prev: Option<u64>,
    /// Byte offset of the hybrid-file xref stream (if any)
    pub xref_stm: Option<u64>,
    /// Byte offset of this xref section, `None` for a synthesized trailer
    pub xref_offset: Option<u64>,
}

fn offset_of(dict: &PdfDictionary, key: &str) -> Option<u64> {
    dict.get_integer(key)
        .and_then(|i| u64::try_from(i).ok())
}

impl PdfTrailer {
    /// Wrap a trailer dictionary (or the dictionary of an xref stream)
    pub fn from_dict(dict: PdfDictionary, xref_offset: Option<u64>) -> Self {
        let prev = offset_of(&dict, "Prev");
        let xref_stm = offset_of(&dict, "XRefStm");
        PdfTrailer {
            dict,
            prev,
            xref_stm,
            xref_offset,
        }
    }

    /// Number of entries the cross-reference table claims to have
    pub fn size(&self) -> ParseResult<u32> {
        self.dict
            .get_integer("Size")
            .and_then(|i| u32::try_from(i).ok())
            .ok_or_else(|| ParseError::MissingKey("Size".to_string()))
    }

    /// The document catalog reference
    pub fn root(&self) -> ParseResult<ObjectId> {
        self.dict
            .get("Root")
            .and_then(PdfObject::as_reference)
            .ok_or_else(|| ParseError::MissingKey("Root".to_string()))
    }

    pub fn has_root(&self) -> bool {
        self.root().is_ok()
    }

    /// Get the info object reference (document information dictionary)
    pub fn info(&self) -> Option<ObjectId> {
        self.dict.get("Info").and_then(PdfObject::as_reference)
    }

    /// Get the ID array (file identifiers)
    pub fn id(&self) -> Option<&PdfObject> {
        self.dict.get("ID")
    }

    /// Check if this PDF is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.dict.contains_key("Encrypt")
    }

    /// The encryption dictionary, which this crate passes through untouched
    pub fn encrypt(&self) -> Option<&PdfObject> {
        self.dict.get("Encrypt")
    }

    /// Check the entries every usable trailer needs
    pub fn validate(&self) -> ParseResult<()> {
        self.size()?;
        self.root()?;
        Ok(())
    }

    pub fn dict(&self) -> &PdfDictionary {
        &self.dict
    }

    /// Fill in keys an older trailer has and this one lacks
    pub(crate) fn inherit_from(&mut self, older: &PdfTrailer) {
        for (key, value) in older.dict.iter() {
            if !self.dict.contains_key(key.as_str()) && !matches!(key.as_str(), "Prev" | "XRefStm") {
                self.dict.insert(key.as_str(), value.clone());
            }
        }
    }
}

/// Represents the complete trailer chain for PDFs with updates
#[derive(Debug, Clone, Default)]
pub struct TrailerChain {
    /// List of trailers from newest to oldest
    trailers: Vec<PdfTrailer>,
}

impl TrailerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next older trailer to the chain
    pub fn add_previous(&mut self, trailer: PdfTrailer) {
        self.trailers.push(trailer);
    }

    /// Get the most recent trailer
    pub fn current(&self) -> Option<&PdfTrailer> {
        self.trailers.first()
    }

    /// Get all trailers in the chain, newest first
    pub fn all(&self) -> &[PdfTrailer] {
        &self.trailers
    }

    /// Check if there are previous versions
    pub fn has_previous(&self) -> bool {
        self.trailers.len() > 1
    }

    /// The newest trailer, with keys it omits taken from older ones
    pub fn merged(&self) -> Option<PdfTrailer> {
        let (newest, older) = self.trailers.split_first()?;
        let mut merged = newest.clone();
        for trailer in older {
            merged.inherit_from(trailer);
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfArray, PdfString};

    fn trailer(entries: &[(&str, PdfObject)]) -> PdfTrailer {
        let mut dict = PdfDictionary::new();
        for (key, value) in entries {
            dict.insert(*key, value.clone());
        }
        PdfTrailer::from_dict(dict, Some(12345))
    }

    #[test]
    fn test_trailer_basic() {
        let trailer = trailer(&[
            ("Size", PdfObject::Integer(100)),
            ("Root", PdfObject::Reference(ObjectId::new(1, 0))),
        ]);

        assert_eq!(trailer.size().unwrap(), 100);
        assert_eq!(trailer.root().unwrap(), ObjectId::new(1, 0));
        assert!(trailer.info().is_none());
        assert!(!trailer.is_encrypted());
        assert!(trailer.validate().is_ok());
    }

    #[test]
    fn test_trailer_with_prev_and_xref_stm() {
        let trailer = trailer(&[
            ("Size", PdfObject::Integer(200)),
            ("Root", PdfObject::Reference(ObjectId::new(1, 0))),
            ("Prev", PdfObject::Integer(5000)),
            ("XRefStm", PdfObject::Integer(700)),
        ]);

        assert_eq!(trailer.prev, Some(5000));
        assert_eq!(trailer.xref_stm, Some(700));
        assert_eq!(trailer.xref_offset, Some(12345));
    }

    #[test]
    fn test_negative_prev_is_ignored() {
        let trailer = trailer(&[("Prev", PdfObject::Integer(-1))]);
        assert_eq!(trailer.prev, None);
    }

    #[test]
    fn test_trailer_validation() {
        let missing_size = trailer(&[("Root", PdfObject::Reference(ObjectId::new(1, 0)))]);
        assert!(matches!(
            missing_size.validate(),
            Err(ParseError::MissingKey(key)) if key == "Size"
        ));

        let missing_root = trailer(&[("Size", PdfObject::Integer(100))]);
        assert!(!missing_root.has_root());
        assert!(missing_root.validate().is_err());

        // Root must be a reference
        let direct_root = trailer(&[
            ("Size", PdfObject::Integer(1)),
            ("Root", PdfObject::Dictionary(PdfDictionary::new())),
        ]);
        assert!(!direct_root.has_root());
    }

    #[test]
    fn test_trailer_with_info_id_and_encrypt() {
        let id = PdfObject::Array(PdfArray(vec![
            PdfObject::String(PdfString::new_hex(vec![1, 2])),
            PdfObject::String(PdfString::new_hex(vec![3, 4])),
        ]));
        let trailer = trailer(&[
            ("Size", PdfObject::Integer(3)),
            ("Root", PdfObject::Reference(ObjectId::new(1, 0))),
            ("Info", PdfObject::Reference(ObjectId::new(2, 0))),
            ("ID", id.clone()),
            ("Encrypt", PdfObject::Reference(ObjectId::new(9, 0))),
        ]);

        assert_eq!(trailer.info(), Some(ObjectId::new(2, 0)));
        assert_eq!(trailer.id(), Some(&id));
        assert!(trailer.is_encrypted());
        assert_eq!(
            trailer.encrypt().and_then(PdfObject::as_reference),
            Some(ObjectId::new(9, 0))
        );
    }

    #[test]
    fn test_trailer_chain_merges_newest_first() {
        let mut chain = TrailerChain::new();
        assert!(chain.merged().is_none());

        chain.add_previous(trailer(&[
            ("Size", PdfObject::Integer(8)),
            ("Prev", PdfObject::Integer(10)),
        ]));
        chain.add_previous(trailer(&[
            ("Size", PdfObject::Integer(5)),
            ("Root", PdfObject::Reference(ObjectId::new(1, 0))),
            ("Info", PdfObject::Reference(ObjectId::new(4, 0))),
        ]));

        assert!(chain.has_previous());
        assert_eq!(chain.all().len(), 2);
        assert_eq!(chain.current().and_then(|t| t.prev), Some(10));

        let merged = chain.merged().unwrap();
        assert_eq!(merged.size().unwrap(), 8);
        assert_eq!(merged.root().unwrap(), ObjectId::new(1, 0));
        assert_eq!(merged.info(), Some(ObjectId::new(4, 0)));
        assert_eq!(merged.prev, Some(10));
    }
}
