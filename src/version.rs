//! The CFB major version fixes sector length, the stream-size mask, and the
//! number of directory entries per sector; every other component derives
//! those from a `Version` value instead of re-deriving them.

use crate::constants::DIR_ENTRY_LEN;
use crate::error::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V3,
    V4,
}

impl Version {
    pub fn from_u16(raw: u16) -> Result<Self> {
        match raw {
            3 => Ok(Version::V3),
            4 => Ok(Version::V4),
            other => Err(Error::Unsupported(format!(
                "major version {} (only 3 and 4 are supported)",
                other
            ))),
        }
    }

    /// Sector shift: 9 for v3 (512-byte sectors), 12 for v4 (4096-byte).
    pub fn sector_shift(self) -> u16 {
        match self {
            Version::V3 => 9,
            Version::V4 => 12,
        }
    }

    pub fn sector_len(self) -> usize {
        1usize << self.sector_shift()
    }

    /// Bitmask applied to the 64-bit stream size field on read; v3 truncates
    /// to 32 bits.
    pub fn sector_len_mask(self) -> u64 {
        match self {
            Version::V3 => 0xffff_ffff,
            Version::V4 => u64::MAX,
        }
    }

    pub fn dir_entries_per_sector(self) -> usize {
        self.sector_len() / DIR_ENTRY_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_has_512_byte_sectors() {
        assert_eq!(Version::V3.sector_len(), 512);
        assert_eq!(Version::V3.sector_shift(), 9);
        assert_eq!(Version::V3.dir_entries_per_sector(), 4);
    }

    #[test]
    fn v4_has_4096_byte_sectors() {
        assert_eq!(Version::V4.sector_len(), 4096);
        assert_eq!(Version::V4.sector_shift(), 12);
        assert_eq!(Version::V4.dir_entries_per_sector(), 32);
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(Version::from_u16(5).is_err());
    }

    #[test]
    fn v3_mask_truncates_to_32_bits() {
        assert_eq!(Version::V3.sector_len_mask(), 0xffff_ffff);
        assert_eq!(Version::V4.sector_len_mask(), u64::MAX);
    }
}
