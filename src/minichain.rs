//! Mirrors [`crate::chain::Chain`] over mini-sector ids. A `MiniChain` is
//! just the ordered list of mini-sector ids backing one small stream;
//! resolving a mini-sector to a physical byte offset goes through the root
//! entry's own main-FAT chain, supplied by the caller as `mini_stream`.

use crate::chain::Chain;
use crate::constants::MINI_SECTOR_LEN;
use crate::error::Error;
use crate::sector::Sectors;
use crate::source::Readable;
use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct MiniChain {
    pub mini_sector_ids: Vec<u32>,
}

impl MiniChain {
    pub fn new(mini_sector_ids: Vec<u32>) -> Self {
        MiniChain { mini_sector_ids }
    }

    pub fn len(&self) -> u64 {
        self.mini_sector_ids.len() as u64 * MINI_SECTOR_LEN as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mini_sector_ids.is_empty()
    }

    /// Reads `buf.len()` bytes starting `logical_offset` mini-stream bytes
    /// in. `mini_stream` is the root entry's stream, itself a chain of
    /// regular sectors that physically backs every mini-sector.
    pub async fn read_at<R: Readable>(
        &self,
        mini_stream: &Chain,
        sectors: Sectors,
        reader: &mut R,
        logical_offset: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        if logical_offset + buf.len() as u64 > self.len() {
            return Err(Error::OutOfRange(format!(
                "read of {} bytes at offset {} overruns a mini chain of length {}",
                buf.len(),
                logical_offset,
                self.len()
            )));
        }

        let mini_len = MINI_SECTOR_LEN as u64;
        let mut chain_pos = (logical_offset / mini_len) as usize;
        let mut offset_in_mini = logical_offset % mini_len;
        let mut filled = 0usize;

        while filled < buf.len() {
            let mini_id = *self.mini_sector_ids.get(chain_pos).ok_or_else(|| {
                Error::OutOfRange(format!(
                    "mini chain position {} is out of range ({} mini-sectors)",
                    chain_pos,
                    self.mini_sector_ids.len()
                ))
            })?;
            let (physical_sector, physical_offset) =
                mini_stream.sub_sector(mini_id as u64, MINI_SECTOR_LEN)?;
            let to_read = ((mini_len - offset_in_mini) as usize).min(buf.len() - filled);
            sectors
                .read_within_sector(
                    reader,
                    physical_sector,
                    physical_offset + offset_in_mini,
                    &mut buf[filled..filled + to_read],
                )
                .await?;
            filled += to_read;
            chain_pos += 1;
            offset_in_mini = 0;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::version::Version;

    #[tokio::test]
    async fn reads_across_mini_sectors_spanning_a_physical_sector() {
        let version = Version::V3;
        let sector_len = version.sector_len();
        let mut data = vec![0u8; sector_len * 2];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut src = MemorySource::new(data.clone());
        let sectors = Sectors::new(version, data.len() as u64);

        // mini stream occupies physical sectors [0, 1]; mini-sector ids 0..N
        // map linearly into that chain.
        let mini_stream = Chain::new(vec![0, 1], sector_len);
        let slots_per_sector = (sector_len / MINI_SECTOR_LEN) as u32;
        let mini_chain = MiniChain::new(vec![slots_per_sector - 1, slots_per_sector]);

        let mut buf = vec![0u8; MINI_SECTOR_LEN * 2];
        mini_chain
            .read_at(&mini_stream, sectors, &mut src, 0, &mut buf)
            .await
            .unwrap();

        let sector0_base = sectors.absolute_offset(0).unwrap() as usize;
        let sector1_base = sectors.absolute_offset(1).unwrap() as usize;
        let mut expected = data[sector0_base + sector_len - MINI_SECTOR_LEN..sector0_base + sector_len].to_vec();
        expected.extend_from_slice(&data[sector1_base..sector1_base + MINI_SECTOR_LEN]);
        assert_eq!(buf, expected);
    }
}
