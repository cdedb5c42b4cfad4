//! Walks the DIFAT chain beyond the header's inline 109 entries and
//! concatenates the full FAT from the sectors it names.

use std::collections::HashSet;

use crate::constants::{FREE_SECTOR, MAX_REGULAR_SECTOR};
use crate::error::Error;
use crate::header::Header;
use crate::sector::Sectors;
use crate::source::Readable;
use crate::validation::Validation;
use crate::Result;

pub struct DifatResult {
    /// Sector ids that hold DIFAT continuation sectors, in chain order.
    pub difat_sector_ids: Vec<u32>,
    /// The full DIFAT: header's inline entries followed by every entry
    /// read from the DIFAT chain.
    pub difat: Vec<u32>,
    /// The FAT, concatenated from the sectors the DIFAT names.
    pub fat: Vec<u32>,
}

pub async fn load<R: Readable>(
    reader: &mut R,
    sectors: Sectors,
    header: &Header,
    validation: Validation,
) -> Result<DifatResult> {
    let mut difat = header.initial_difat_entries.clone();

    let mut seen_sector_ids = HashSet::new();
    let mut difat_sector_ids = Vec::new();
    let mut current_difat_sector = header.first_difat_sector;

    let entries_per_sector = sectors.sector_len() / 4 - 1;

    while current_difat_sector != crate::constants::END_OF_CHAIN {
        if current_difat_sector > MAX_REGULAR_SECTOR
            || current_difat_sector >= sectors.num_sectors()
        {
            return Err(Error::InvalidCfb(format!(
                "invalid DIFAT chain refers to sector {}",
                current_difat_sector
            )));
        }
        if !seen_sector_ids.insert(current_difat_sector) {
            return Err(Error::Cycle(
                "DIFAT chain includes a duplicate sector".into(),
            ));
        }
        difat_sector_ids.push(current_difat_sector);

        let mut raw = vec![0u8; sectors.sector_len()];
        sectors
            .read_sector(reader, current_difat_sector, &mut raw)
            .await?;

        for i in 0..entries_per_sector {
            let start = i * 4;
            let next = u32::from_le_bytes(raw[start..start + 4].try_into().unwrap());
            if next != FREE_SECTOR && next > MAX_REGULAR_SECTOR {
                return Err(Error::InvalidCfb(format!(
                    "DIFAT refers to invalid sector index {}",
                    next
                )));
            }
            difat.push(next);
        }

        let next_start = entries_per_sector * 4;
        current_difat_sector = u32::from_le_bytes(
            raw[next_start..next_start + 4].try_into().unwrap(),
        );
    }

    if validation.is_strict() && header.num_difat_sectors != difat_sector_ids.len() as u32 {
        return Err(Error::InvalidCfb(format!(
            "incorrect DIFAT chain length (header says {}, actual is {})",
            header.num_difat_sectors,
            difat_sector_ids.len()
        )));
    }

    trim_trailing_free(&mut difat);

    if validation.is_strict() && header.num_fat_sectors != difat.len() as u32 {
        return Err(Error::InvalidCfb(format!(
            "incorrect number of FAT sectors (header says {}, DIFAT says {})",
            header.num_fat_sectors,
            difat.len()
        )));
    }

    let mut fat = Vec::new();
    let u32s_per_sector = sectors.sector_len() / 4;
    for &sector_id in &difat {
        if sector_id >= sectors.num_sectors() {
            return Err(Error::InvalidCfb(format!(
                "invalid FAT sector index {}",
                sector_id
            )));
        }
        let mut raw = vec![0u8; sectors.sector_len()];
        sectors.read_sector(reader, sector_id, &mut raw).await?;
        for i in 0..u32s_per_sector {
            let start = i * 4;
            fat.push(u32::from_le_bytes(
                raw[start..start + 4].try_into().unwrap(),
            ));
        }
    }

    if validation.is_permissive() {
        while fat.len() > sectors.num_sectors() as usize && fat.last() == Some(&0) {
            fat.pop();
        }
    }
    trim_trailing_free(&mut fat);

    Ok(DifatResult {
        difat_sector_ids,
        difat,
        fat,
    })
}

fn trim_trailing_free(entries: &mut Vec<u32>) {
    while entries.last() == Some(&FREE_SECTOR) {
        entries.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::trim_trailing_free;
    use crate::constants::FREE_SECTOR;

    #[test]
    fn trims_only_trailing_free_entries() {
        let mut v = vec![1, 2, FREE_SECTOR, FREE_SECTOR];
        trim_trailing_free(&mut v);
        assert_eq!(v, vec![1, 2]);

        let mut v = vec![FREE_SECTOR, 1, FREE_SECTOR];
        trim_trailing_free(&mut v);
        assert_eq!(v, vec![FREE_SECTOR, 1]);
    }
}
