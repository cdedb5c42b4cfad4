//! Analogous to [`crate::alloc::Allocator`] but over mini-sector ids: loads
//! the MiniFAT array (itself read through the main allocator as a regular
//! chain) and the root entry's mini stream, then hands out cycle-checked
//! [`MiniChain`]s.

use std::collections::HashSet;

use crate::alloc::Allocator;
use crate::chain::Chain;
use crate::constants::END_OF_CHAIN;
use crate::direntry::DirEntry;
use crate::error::Error;
use crate::header::Header;
use crate::minichain::MiniChain;
use crate::sector::Sectors;
use crate::source::Readable;
use crate::validation::Validation;
use crate::Result;

#[derive(Debug, Clone)]
pub struct MiniAllocator {
    minifat: Vec<u32>,
    /// The root entry's stream: a chain of regular sectors physically
    /// backing every mini-sector.
    pub mini_stream: Chain,
}

impl MiniAllocator {
    pub async fn load<R: Readable>(
        reader: &mut R,
        sectors: Sectors,
        alloc: &Allocator,
        header: &Header,
        root: &DirEntry,
        validation: Validation,
    ) -> Result<Self> {
        let minifat_chain = alloc.open_chain(header.first_minifat_sector)?;
        let mut raw = vec![0u8; minifat_chain.len() as usize];
        if !raw.is_empty() {
            minifat_chain.read_at(sectors, reader, 0, &mut raw).await?;
        }
        let mut minifat: Vec<u32> = raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();

        if validation.is_strict()
            && minifat.len() as u32 != header.num_minifat_sectors * (sectors.sector_len() / 4) as u32
        {
            return Err(Error::InvalidCfb(format!(
                "MiniFAT has {} entries, header declares {} sectors",
                minifat.len(),
                header.num_minifat_sectors
            )));
        }

        let mini_stream = match root.starting_sector {
            END_OF_CHAIN => Chain::new(Vec::new(), sectors.sector_len()),
            start => alloc.open_chain(start)?,
        };

        if validation.is_permissive() {
            let mini_sector_len = crate::constants::MINI_SECTOR_LEN as u64;
            let required = (root.stream_size + mini_sector_len - 1) / mini_sector_len;
            while minifat.len() as u64 > required && minifat.last() == Some(&0) {
                minifat.pop();
            }
        }

        if minifat.len() as u64 * crate::constants::MINI_SECTOR_LEN as u64 > root.stream_size {
            return Err(Error::InvalidCfb(format!(
                "MiniFAT names {} mini-sectors ({} bytes), exceeding the root stream's {} bytes",
                minifat.len(),
                minifat.len() as u64 * crate::constants::MINI_SECTOR_LEN as u64,
                root.stream_size
            )));
        }

        let mut seen_successors = HashSet::new();
        for &successor in &minifat {
            if successor != END_OF_CHAIN
                && successor != crate::constants::FREE_SECTOR
                && !seen_successors.insert(successor)
            {
                return Err(Error::InvalidCfb(format!(
                    "mini-sector {} is the successor of more than one MiniFAT entry",
                    successor
                )));
            }
        }

        Ok(MiniAllocator {
            minifat,
            mini_stream,
        })
    }

    fn next(&self, id: u32) -> Result<u32> {
        let next_id = *self
            .minifat
            .get(id as usize)
            .ok_or_else(|| Error::OutOfRange(format!("mini-sector id {} has no MiniFAT entry", id)))?;
        Ok(next_id)
    }

    #[cfg(test)]
    pub(crate) fn test_empty(sector_len: usize) -> Self {
        MiniAllocator {
            minifat: Vec::new(),
            mini_stream: Chain::new(Vec::new(), sector_len),
        }
    }

    pub fn open_mini_chain(&self, start_id: u32) -> Result<MiniChain> {
        let mut mini_sector_ids = Vec::new();
        let mut visited = HashSet::new();
        let mut current = start_id;

        while current != END_OF_CHAIN {
            if !visited.insert(current) {
                return Err(Error::Cycle(format!(
                    "mini-sector {} appears twice in the same mini chain",
                    current
                )));
            }
            mini_sector_ids.push(current);
            current = self.next(current)?;
        }

        Ok(MiniChain::new(mini_sector_ids))
    }
}
