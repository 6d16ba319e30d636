//! Random-access byte sources
//!
//! Everything above this layer reads PDF bytes through [`ByteSource`]: a
//! seekable reader with a one-byte push-back, so the tokenizer can look one
//! byte ahead and the resolver can jump between object offsets.

use super::ParseResult;
use std::io::{BufReader, Read, Seek, SeekFrom};

/// A seekable, peekable byte reader.
///
/// `push_back` must only be given the byte that was just read; sources are
/// free to implement it by stepping their position back by one.
pub trait ByteSource {
    /// Read one byte, `None` at end of data.
    fn read_byte(&mut self) -> ParseResult<Option<u8>>;

    /// Fill as much of `buf` as possible, returning the number of bytes read.
    fn read_into(&mut self, buf: &mut [u8]) -> ParseResult<usize>;

    /// Undo the last `read_byte`.
    fn push_back(&mut self, byte: u8);

    /// Move to an absolute offset. Offsets past the end are clamped.
    fn seek(&mut self, pos: u64) -> ParseResult<()>;

    /// Current absolute offset.
    fn position(&self) -> u64;

    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn peek_byte(&mut self) -> ParseResult<Option<u8>> {
        let byte = self.read_byte()?;
        if let Some(b) = byte {
            self.push_back(b);
        }
        Ok(byte)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_byte(&mut self) -> ParseResult<Option<u8>> {
        (**self).read_byte()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> ParseResult<usize> {
        (**self).read_into(buf)
    }

    fn push_back(&mut self, byte: u8) {
        (**self).push_back(byte)
    }

    fn seek(&mut self, pos: u64) -> ParseResult<()> {
        (**self).seek(pos)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

/// A byte source over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
    pos: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn read_byte(&mut self) -> ParseResult<Option<u8>> {
        let byte = self.data.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> ParseResult<usize> {
        let available = &self.data[self.pos.min(self.data.len())..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }

    fn push_back(&mut self, _byte: u8) {
        self.pos = self.pos.saturating_sub(1);
    }

    fn seek(&mut self, pos: u64) -> ParseResult<()> {
        self.pos = usize::try_from(pos)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A buffered byte source over any `Read + Seek` (typically a file).
pub struct SeekableSource<R> {
    inner: BufReader<R>,
    pos: u64,
    len: u64,
    pending: Option<u8>,
}

impl<R: Read + Seek> SeekableSource<R> {
    pub fn new(mut reader: R) -> ParseResult<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: BufReader::new(reader),
            pos: 0,
            len,
            pending: None,
        })
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read + Seek> ByteSource for SeekableSource<R> {
    fn read_byte(&mut self) -> ParseResult<Option<u8>> {
        if let Some(b) = self.pending.take() {
            self.pos += 1;
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf)? {
            0 => Ok(None),
            _ => {
                self.pos += 1;
                Ok(Some(buf[0]))
            }
        }
    }

    fn read_into(&mut self, buf: &mut [u8]) -> ParseResult<usize> {
        let mut filled = 0;
        if let (Some(b), Some(slot)) = (self.pending, buf.first_mut()) {
            *slot = b;
            self.pending = None;
            filled = 1;
        }
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    fn push_back(&mut self, byte: u8) {
        if self.pos > 0 {
            self.pending = Some(byte);
            self.pos -= 1;
        }
    }

    /// Targets inside the buffered window are reached without discarding
    /// the buffer.
    fn seek(&mut self, pos: u64) -> ParseResult<()> {
        let target = pos.min(self.len);
        // A pushed-back byte was already consumed from the reader
        let inner_pos = self.pos + u64::from(self.pending.take().is_some());
        match i64::try_from(i128::from(target) - i128::from(inner_pos)) {
            Ok(delta) => self.inner.seek_relative(delta)?,
            Err(_) => {
                self.inner.seek(SeekFrom::Start(target))?;
            }
        }
        self.pos = target;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> u64 {
        self.len
    }
}

const SCAN_CHUNK: usize = 8192;

/// Scan forward from the current position for `needle`.
///
/// Returns the absolute offset of the first match. The source is left at an
/// unspecified position; callers seek afterwards.
pub fn find_forward<S: ByteSource + ?Sized>(
    source: &mut S,
    needle: &[u8],
) -> ParseResult<Option<u64>> {
    if needle.is_empty() {
        return Ok(Some(source.position()));
    }
    let overlap = needle.len() - 1;
    let mut window: Vec<u8> = Vec::with_capacity(SCAN_CHUNK + overlap);
    let mut window_start = source.position();
    let mut chunk = vec![0u8; SCAN_CHUNK];

    loop {
        let n = source.read_into(&mut chunk)?;
        if n == 0 {
            return Ok(None);
        }
        window.extend_from_slice(&chunk[..n]);
        if let Some(i) = window.windows(needle.len()).position(|w| w == needle) {
            return Ok(Some(window_start + i as u64));
        }
        let keep = overlap.min(window.len());
        let drop = window.len() - keep;
        window.drain(..drop);
        window_start += drop as u64;
    }
}
