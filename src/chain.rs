//! A `Chain` is a plain ordered list of sector ids plus the sector length it
//! was built against (spec.md §4.11 "chains as owned vs. borrowed" redesign
//! note). It carries no reference to the allocator or the byte source;
//! every read takes both as explicit arguments, which keeps a `Chain`
//! trivially constructible from a synthetic FAT in tests.

use crate::error::Error;
use crate::sector::Sectors;
use crate::source::Readable;
use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct Chain {
    pub sector_ids: Vec<u32>,
    pub sector_len: usize,
}

impl Chain {
    pub fn new(sector_ids: Vec<u32>, sector_len: usize) -> Self {
        Chain {
            sector_ids,
            sector_len,
        }
    }

    /// Total byte length backed by this chain (`sector_len * num_sectors`).
    pub fn len(&self) -> u64 {
        self.sector_ids.len() as u64 * self.sector_len as u64
    }

    pub fn is_empty(&self) -> bool {
        self.sector_ids.is_empty()
    }

    /// Fills `buf` starting at `logical_offset`, crossing sector boundaries
    /// by consulting the next sector id in the chain for every boundary.
    /// `logical_offset + buf.len()` must not exceed `self.len()`.
    pub async fn read_at<R: Readable>(
        &self,
        sectors: Sectors,
        reader: &mut R,
        logical_offset: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        if logical_offset + buf.len() as u64 > self.len() {
            return Err(Error::OutOfRange(format!(
                "read of {} bytes at offset {} overruns a chain of length {}",
                buf.len(),
                logical_offset,
                self.len()
            )));
        }

        let sector_len = self.sector_len as u64;
        let mut sector_index = (logical_offset / sector_len) as usize;
        let mut offset_in_sector = logical_offset % sector_len;
        let mut filled = 0usize;

        while filled < buf.len() {
            let sector_id = self.sector_ids[sector_index];
            let to_read = ((sector_len - offset_in_sector) as usize).min(buf.len() - filled);
            sectors
                .read_within_sector(
                    reader,
                    sector_id,
                    offset_in_sector,
                    &mut buf[filled..filled + to_read],
                )
                .await?;
            filled += to_read;
            sector_index += 1;
            offset_in_sector = 0;
        }

        Ok(())
    }

    /// Locates the `sub_len`-sized slot numbered `index` (e.g. one 64-byte
    /// mini-sector) inside the sector this chain names at the corresponding
    /// position. Returns `(sector_id, offset_within_sector)`.
    pub fn sub_sector(&self, index: u64, sub_len: usize) -> Result<(u32, u64)> {
        let slots_per_sector = (self.sector_len / sub_len) as u64;
        let sector_index = (index / slots_per_sector) as usize;
        let offset = (index % slots_per_sector) * sub_len as u64;
        let sector_id = *self.sector_ids.get(sector_index).ok_or_else(|| {
            Error::OutOfRange(format!(
                "sub-sector index {} falls outside a chain of {} sectors",
                index,
                self.sector_ids.len()
            ))
        })?;
        Ok((sector_id, offset))
    }
}
