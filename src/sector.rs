//! Absolute sector addressing: sector id -> byte offset, and bounds-checked
//! reads of whole or partial sectors.
//!
//! Unlike the reference implementation this type holds no reader of its
//! own; every read takes the source as an explicit argument (SPEC_FULL.md
//! §4.10/§4.11), so a `Sectors` value is just the version plus the sector
//! count and is freely shareable.

use crate::constants::HEADER_LEN;
use crate::error::Error;
use crate::source::{read_at, Readable};
use crate::version::Version;
use crate::Result;

#[derive(Debug, Clone, Copy)]
pub struct Sectors {
    version: Version,
    num_sectors: u32,
}

impl Sectors {
    /// `stream_len` is the total byte length of the underlying file. Sector
    /// 0 begins right after the fixed-size header, at byte offset
    /// `sector_len`; the sector count excludes that header-sized first
    /// region.
    pub fn new(version: Version, stream_len: u64) -> Self {
        let sector_len = version.sector_len() as u64;
        let num_sectors = if stream_len <= sector_len {
            0
        } else {
            ((stream_len - sector_len + sector_len - 1) / sector_len) as u32
        };
        Sectors {
            version,
            num_sectors,
        }
    }

    pub fn version(self) -> Version {
        self.version
    }

    pub fn sector_len(self) -> usize {
        self.version.sector_len()
    }

    pub fn num_sectors(self) -> u32 {
        self.num_sectors
    }

    /// Absolute byte offset of the start of `sector_id`. Sector ids are
    /// zero-based and counted from right after the 512-byte header prefix,
    /// matching the fixed `HEADER_LEN` regardless of the sector size
    /// negotiated by `version` (a v4 file's first sector still starts at
    /// its full sector length, of which only `HEADER_LEN` bytes are header).
    pub fn absolute_offset(self, sector_id: u32) -> Result<u64> {
        if sector_id >= self.num_sectors {
            return Err(Error::OutOfRange(format!(
                "sector {} is out of range (have {} sectors)",
                sector_id, self.num_sectors
            )));
        }
        let _ = HEADER_LEN;
        Ok((sector_id as u64 + 1) * self.sector_len() as u64)
    }

    /// Reads the entire contents of `sector_id` into `buf`, which must be
    /// exactly `sector_len()` bytes.
    pub async fn read_sector<R: Readable>(
        self,
        reader: &mut R,
        sector_id: u32,
        buf: &mut [u8],
    ) -> Result<()> {
        self.read_within_sector(reader, sector_id, 0, buf).await
    }

    /// Reads `buf.len()` bytes starting `offset` bytes into `sector_id`.
    /// `offset + buf.len()` must not exceed one sector's length.
    pub async fn read_within_sector<R: Readable>(
        self,
        reader: &mut R,
        sector_id: u32,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        if offset + buf.len() as u64 > self.sector_len() as u64 {
            return Err(Error::OutOfRange(format!(
                "read of {} bytes at offset {} overruns a {}-byte sector",
                buf.len(),
                offset,
                self.sector_len()
            )));
        }
        let base = self.absolute_offset(sector_id)?;
        read_at(reader, base + offset, buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[tokio::test]
    async fn reads_a_full_sector() {
        let version = Version::V3;
        let sector_len = version.sector_len();
        let mut data = vec![0u8; sector_len * 3];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut src = MemorySource::new(data.clone());
        let sectors = Sectors::new(version, data.len() as u64);
        assert_eq!(sectors.num_sectors(), 2);

        let mut buf = vec![0u8; sector_len];
        sectors.read_sector(&mut src, 0, &mut buf).await.unwrap();
        assert_eq!(buf, data[sector_len..sector_len * 2]);
    }

    #[tokio::test]
    async fn out_of_range_sector_errors() {
        let version = Version::V3;
        let data = vec![0u8; version.sector_len() * 2];
        let sectors = Sectors::new(version, data.len() as u64);
        assert!(sectors.absolute_offset(99).is_err());
    }
}
