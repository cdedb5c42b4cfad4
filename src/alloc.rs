//! Validates the assembled FAT against spec.md §3's invariants and turns a
//! starting sector id into a cycle-free [`Chain`].

use std::collections::HashSet;

use crate::chain::Chain;
use crate::constants::{DIFAT_SECTOR, END_OF_CHAIN, FAT_SECTOR, INVALID_SECTOR, MAX_REGULAR_SECTOR};
use crate::error::Error;
use crate::validation::Validation;
use crate::Result;

/// The FAT, validated at construction time, plus the entry points to turn a
/// starting sector id into an ordered, cycle-checked list of sector ids.
#[derive(Debug, Clone)]
pub struct Allocator {
    fat: Vec<u32>,
    sector_len: usize,
}

impl Allocator {
    /// `difat_sector_ids` are the physical sectors holding DIFAT
    /// continuation blocks; their FAT entry must read `DIFAT_SECTOR`.
    /// `fat_sector_ids` are the sector ids the DIFAT names as holding FAT
    /// data; their FAT entry must read `FAT_SECTOR`. Per SPEC_FULL.md §9
    /// decision 3, both are written using the sector id itself as the FAT
    /// index, not a loop counter.
    pub fn new(
        mut fat: Vec<u32>,
        sector_len: usize,
        num_sectors: u32,
        difat_sector_ids: &[u32],
        fat_sector_ids: &[u32],
        validation: Validation,
    ) -> Result<Self> {
        if fat.len() > num_sectors as usize {
            return Err(Error::InvalidCfb(format!(
                "FAT has {} entries but the file only has {} sectors",
                fat.len(),
                num_sectors
            )));
        }

        Self::mark_self_sectors(&mut fat, difat_sector_ids, DIFAT_SECTOR, "DIFAT", validation)?;
        Self::mark_self_sectors(&mut fat, fat_sector_ids, FAT_SECTOR, "FAT", validation)?;

        let mut seen_successors = HashSet::new();
        for (entry_id, &successor) in fat.iter().enumerate() {
            if successor == INVALID_SECTOR {
                return Err(Error::InvalidCfb(format!(
                    "FAT entry {} holds the reserved/invalid sentinel",
                    entry_id
                )));
            }
            if successor <= MAX_REGULAR_SECTOR && successor as usize >= fat.len() {
                return Err(Error::InvalidCfb(format!(
                    "FAT entry {} names out-of-range successor {}",
                    entry_id, successor
                )));
            }
            if successor <= MAX_REGULAR_SECTOR && !seen_successors.insert(successor) {
                return Err(Error::InvalidCfb(format!(
                    "sector {} is the successor of more than one FAT entry",
                    successor
                )));
            }
        }

        Ok(Allocator { fat, sector_len })
    }

    fn mark_self_sectors(
        fat: &mut [u32],
        sector_ids: &[u32],
        marker: u32,
        label: &'static str,
        validation: Validation,
    ) -> Result<()> {
        for &id in sector_ids {
            let entry = fat.get_mut(id as usize).ok_or_else(|| {
                Error::OutOfRange(format!("{} sector {} is out of range of the FAT", label, id))
            })?;
            if *entry != marker {
                if validation.is_strict() {
                    return Err(Error::InvalidCfb(format!(
                        "{} sector {} has FAT entry {:#x}, expected the {} marker",
                        label, id, entry, label
                    )));
                }
                *entry = marker;
            }
        }
        Ok(())
    }

    pub fn fat(&self) -> &[u32] {
        &self.fat
    }

    /// Returns `FAT[id]` after checking that the successor is either
    /// `END_OF_CHAIN` or an in-range regular sector id.
    pub fn next(&self, id: u32) -> Result<u32> {
        let next_id = *self
            .fat
            .get(id as usize)
            .ok_or_else(|| Error::OutOfRange(format!("sector id {} has no FAT entry", id)))?;
        if next_id == END_OF_CHAIN {
            return Ok(next_id);
        }
        if next_id > MAX_REGULAR_SECTOR || next_id as usize >= self.fat.len() {
            return Err(Error::OutOfRange(format!(
                "FAT entry for sector {} names invalid successor {:#x}",
                id, next_id
            )));
        }
        Ok(next_id)
    }

    /// Accumulates `[start_id, next(start_id), ...]` stopping at
    /// `END_OF_CHAIN`. A start id of `END_OF_CHAIN` yields an empty chain.
    /// Rejects a chain that revisits a sector id.
    pub fn open_chain(&self, start_id: u32) -> Result<Chain> {
        let mut sector_ids = Vec::new();
        let mut visited = HashSet::new();
        let mut current = start_id;

        while current != END_OF_CHAIN {
            if !visited.insert(current) {
                return Err(Error::Cycle(format!(
                    "sector {} appears twice in the same chain",
                    current
                )));
            }
            sector_ids.push(current);
            current = self.next(current)?;
        }

        Ok(Chain::new(sector_ids, self.sector_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FREE_SECTOR;

    #[test]
    fn builds_a_simple_chain() {
        let fat = vec![1, 2, END_OF_CHAIN, FREE_SECTOR];
        let alloc = Allocator::new(fat, 512, 4, &[], &[], Validation::Strict).unwrap();
        let chain = alloc.open_chain(0).unwrap();
        assert_eq!(chain.sector_ids, vec![0, 1, 2]);
    }

    #[test]
    fn empty_chain_for_end_of_chain_start() {
        let fat = vec![END_OF_CHAIN];
        let alloc = Allocator::new(fat, 512, 1, &[], &[], Validation::Strict).unwrap();
        let chain = alloc.open_chain(END_OF_CHAIN).unwrap();
        assert!(chain.is_empty());
    }

    #[test]
    fn rejects_a_chain_cycle() {
        let fat = vec![1, 0];
        let alloc = Allocator::new(fat, 512, 2, &[], &[], Validation::Strict).unwrap();
        assert!(alloc.open_chain(0).is_err());
    }

    #[test]
    fn rejects_duplicate_successor_injectivity_violation() {
        let fat = vec![2, 2, END_OF_CHAIN];
        assert!(Allocator::new(fat, 512, 3, &[], &[], Validation::Strict).is_err());
    }

    #[test]
    fn rejects_invalid_sentinel_in_fat() {
        let fat = vec![INVALID_SECTOR];
        assert!(Allocator::new(fat, 512, 1, &[], &[], Validation::Strict).is_err());
    }

    #[test]
    fn difat_self_marker_strict_vs_permissive() {
        let fat = vec![0, 0];
        assert!(Allocator::new(fat.clone(), 512, 2, &[0], &[], Validation::Strict).is_err());
        let alloc = Allocator::new(fat, 512, 2, &[0], &[], Validation::Permissive).unwrap();
        assert_eq!(alloc.fat()[0], DIFAT_SECTOR);
    }
}
