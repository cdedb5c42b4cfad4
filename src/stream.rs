//! A buffered, seekable view over one directory entry's byte stream. Routes
//! every read to either the main-FAT chain or the MiniFAT chain depending
//! on the declared stream size (spec.md §4.12's `Backing` tagged variant),
//! through a single `read_logical` entry point rather than two parallel
//! code paths.

use crate::chain::Chain;
use crate::constants::STREAM_BUFFER_LEN;
use crate::error::Error;
use crate::minialloc::MiniAllocator;
use crate::minichain::MiniChain;
use crate::sector::Sectors;
use crate::source::Readable;
use crate::Result;

#[derive(Debug, Clone)]
enum Backing {
    Main(Chain),
    Mini(MiniChain),
}

impl Backing {
    async fn read_logical<R: Readable>(
        &self,
        mini_stream: &Chain,
        sectors: Sectors,
        reader: &mut R,
        logical_offset: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        match self {
            Backing::Main(chain) => chain.read_at(sectors, reader, logical_offset, buf).await,
            Backing::Mini(chain) => {
                chain
                    .read_at(mini_stream, sectors, reader, logical_offset, buf)
                    .await
            }
        }
    }

    fn len(&self) -> u64 {
        match self {
            Backing::Main(chain) => chain.len(),
            Backing::Mini(chain) => chain.len(),
        }
    }
}

/// The mechanism used to whence-resolve a seek, mirroring `std::io::SeekFrom`
/// without requiring callers to depend on `std::io` directly.
#[derive(Debug, Clone, Copy)]
pub enum SeekFrom {
    Start(u64),
    End(i64),
    Current(i64),
}

/// A seekable, buffered reader over one stream's declared length. Borrows
/// the container's byte source and mini-allocator rather than owning them
/// (spec.md §5 Lifecycles: "streams are transient views ... borrow
/// references to the allocator"); only one `Stream` can be open at a time
/// per container, which is exactly the serialization spec.md §5 requires,
/// enforced here at compile time by the exclusive `&mut R` borrow.
pub struct Stream<'a, R> {
    total_len: u64,
    sectors: Sectors,
    backing: Backing,
    mini_stream: &'a Chain,
    reader: &'a mut R,
    buf: Vec<u8>,
    buf_valid: usize,
    buf_pos: usize,
    offset_from_start: u64,
}

impl<'a, R: Readable> Stream<'a, R> {
    pub(crate) fn new_main(
        chain: Chain,
        total_len: u64,
        sectors: Sectors,
        minialloc: &'a MiniAllocator,
        reader: &'a mut R,
    ) -> Self {
        debug_assert!(total_len <= chain.len());
        Stream {
            total_len,
            sectors,
            backing: Backing::Main(chain),
            mini_stream: &minialloc.mini_stream,
            reader,
            buf: vec![0u8; STREAM_BUFFER_LEN],
            buf_valid: 0,
            buf_pos: 0,
            offset_from_start: 0,
        }
    }

    pub(crate) fn new_mini(
        chain: MiniChain,
        total_len: u64,
        sectors: Sectors,
        minialloc: &'a MiniAllocator,
        reader: &'a mut R,
    ) -> Self {
        debug_assert!(total_len <= chain.len());
        Stream {
            total_len,
            sectors,
            backing: Backing::Mini(chain),
            mini_stream: &minialloc.mini_stream,
            reader,
            buf: vec![0u8; STREAM_BUFFER_LEN],
            buf_valid: 0,
            buf_pos: 0,
            offset_from_start: 0,
        }
    }

    /// Declared total length of the stream (not the physical chain length,
    /// which may be padded up to the next sector boundary).
    pub fn len(&self) -> u64 {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    fn position(&self) -> u64 {
        self.offset_from_start + self.buf_pos as u64
    }

    async fn fill_buffer(&mut self) -> Result<()> {
        let pos = self.position();
        let to_read = (STREAM_BUFFER_LEN as u64).min(self.total_len - pos) as usize;
        self.backing
            .read_logical(self.mini_stream, self.sectors, self.reader, pos, &mut self.buf[..to_read])
            .await?;
        self.offset_from_start = pos;
        self.buf_valid = to_read;
        self.buf_pos = 0;
        Ok(())
    }

    /// Fills up to `buf.len()` bytes and returns the number of bytes
    /// written; `0` signals end-of-stream. Never returns more than the
    /// declared stream length in total, even if the physical chain is
    /// longer.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.buf_pos >= self.buf_valid && self.position() < self.total_len {
            self.fill_buffer().await?;
        }
        let available = self.buf_valid - self.buf_pos;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.buf[self.buf_pos..self.buf_pos + n]);
        self.buf_pos += n;
        Ok(n)
    }

    /// Resolves a new absolute position and repositions the stream. Out of
    /// range (negative, or past the declared length) is an error; the
    /// buffer is kept if the new position still falls inside its window,
    /// otherwise invalidated. Implements spec.md §4.8's precise semantics
    /// rather than the off-by-one `SeekCurrent`/`SeekEnd` comparison noted
    /// in Design Note 5.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64> {
        let new_pos = match from {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(delta) => self.total_len as i64 + delta,
            SeekFrom::Current(delta) => self.position() as i64 + delta,
        };

        if new_pos < 0 || new_pos as u64 > self.total_len {
            return Err(Error::OutOfRange(format!(
                "seek to {} is outside the stream's 0..={} range",
                new_pos, self.total_len
            )));
        }
        let new_pos = new_pos as u64;

        if new_pos >= self.offset_from_start
            && new_pos <= self.offset_from_start + self.buf_valid as u64
        {
            self.buf_pos = (new_pos - self.offset_from_start) as usize;
        } else {
            self.buf_valid = 0;
            self.buf_pos = 0;
            self.offset_from_start = new_pos;
        }

        Ok(new_pos)
    }
}
