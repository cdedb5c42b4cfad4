//! Fixed 512-byte CFB header: magic, version, and the first 109 DIFAT
//! entries.

use std::array::TryFromSliceError;

use derivative::Derivative;

use crate::constants::{
    self, BYTE_ORDER_MARK, CORRECT_MINOR_VERSION, FREE_SECTOR, MAX_REGULAR_SECTOR,
    MINI_SECTOR_SHIFT, NUM_DIFAT_ENTRIES_IN_HEADER,
};
use crate::error::{Error, HeaderErrorType};
use crate::source::{read_at, Readable};
use crate::version::Version;
use crate::Result;

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Header {
    pub version: Version,
    pub num_dir_sectors: u32,
    pub num_fat_sectors: u32,
    pub first_dir_sector: u32,
    pub first_minifat_sector: u32,
    pub num_minifat_sectors: u32,
    pub first_difat_sector: u32,
    pub num_difat_sectors: u32,
    #[derivative(Debug = "ignore")]
    pub initial_difat_entries: Vec<u32>,
}

fn slice_err(field: &'static str) -> impl Fn(TryFromSliceError) -> Error {
    move |err| Error::OleInvalidHeader(HeaderErrorType::Parsing(field, err.to_string()))
}

impl Header {
    pub async fn read_from<R: Readable>(reader: &mut R) -> Result<Header> {
        let mut raw = [0u8; constants::HEADER_LEN];
        read_at(reader, 0, &mut raw).await?;

        let signature: [u8; 8] = raw[0..8].try_into().map_err(slice_err("signature"))?;
        if signature != constants::MAGIC_NUMBER {
            return Err(Error::OleInvalidHeader(HeaderErrorType::WrongMagicBytes(
                signature.into(),
            )));
        }

        // raw[8..24]: reserved CLSID, not validated (real-world files are
        // commonly non-zero here despite MS-CFB saying it must be zero).

        let minor_version = u16::from_le_bytes(
            raw[24..26].try_into().map_err(slice_err("minor_version"))?,
        );
        let _ = (minor_version, CORRECT_MINOR_VERSION);

        let major_version = u16::from_le_bytes(
            raw[26..28].try_into().map_err(slice_err("major_version"))?,
        );
        let version = Version::from_u16(major_version).map_err(|_| {
            Error::OleInvalidHeader(HeaderErrorType::Parsing(
                "major_version",
                format!("incorrect major version {:#06x}", major_version),
            ))
        })?;

        let byte_order_mark = u16::from_le_bytes(
            raw[28..30]
                .try_into()
                .map_err(slice_err("byte_order_mark"))?,
        );
        if byte_order_mark != BYTE_ORDER_MARK {
            return Err(Error::OleInvalidHeader(HeaderErrorType::Parsing(
                "byte_order_mark",
                format!("incorrect byte order mark {:#06x}", byte_order_mark),
            )));
        }

        let sector_shift = u16::from_le_bytes(
            raw[30..32].try_into().map_err(slice_err("sector_shift"))?,
        );
        if sector_shift != version.sector_shift() {
            return Err(Error::OleInvalidHeader(HeaderErrorType::Parsing(
                "sector_shift",
                format!(
                    "incorrect sector shift for version {:?} (expected {}, found {})",
                    version,
                    version.sector_shift(),
                    sector_shift
                ),
            )));
        }

        let mini_sector_shift = u16::from_le_bytes(
            raw[32..34]
                .try_into()
                .map_err(slice_err("mini_sector_shift"))?,
        );
        if mini_sector_shift != MINI_SECTOR_SHIFT {
            return Err(Error::OleInvalidHeader(HeaderErrorType::Parsing(
                "mini_sector_shift",
                format!(
                    "incorrect mini sector shift (expected {}, found {})",
                    MINI_SECTOR_SHIFT, mini_sector_shift
                ),
            )));
        }

        // raw[34..40]: reserved.

        let num_dir_sectors = u32::from_le_bytes(
            raw[40..44]
                .try_into()
                .map_err(slice_err("num_dir_sectors"))?,
        );
        if version == Version::V3 && num_dir_sectors != 0 {
            return Err(Error::OleInvalidHeader(HeaderErrorType::Parsing(
                "num_dir_sectors",
                "non-zero directory sector count with major version 3".to_string(),
            )));
        }

        let num_fat_sectors = u32::from_le_bytes(
            raw[44..48]
                .try_into()
                .map_err(slice_err("num_fat_sectors"))?,
        );
        let first_dir_sector = u32::from_le_bytes(
            raw[48..52]
                .try_into()
                .map_err(slice_err("first_dir_sector"))?,
        );
        // raw[52..56]: transaction signature, unused by readers.

        let mini_stream_cutoff = u32::from_le_bytes(
            raw[56..60]
                .try_into()
                .map_err(slice_err("mini_stream_cutoff"))?,
        );
        if mini_stream_cutoff as u64 != constants::MINI_STREAM_CUTOFF {
            return Err(Error::OleInvalidHeader(HeaderErrorType::Parsing(
                "mini_stream_cutoff",
                format!(
                    "incorrect mini stream cutoff (expected {}, found {})",
                    constants::MINI_STREAM_CUTOFF,
                    mini_stream_cutoff
                ),
            )));
        }

        let first_minifat_sector = u32::from_le_bytes(
            raw[60..64]
                .try_into()
                .map_err(slice_err("first_minifat_sector"))?,
        );
        let num_minifat_sectors = u32::from_le_bytes(
            raw[64..68]
                .try_into()
                .map_err(slice_err("num_minifat_sectors"))?,
        );
        let mut first_difat_sector = u32::from_le_bytes(
            raw[68..72]
                .try_into()
                .map_err(slice_err("first_difat_sector"))?,
        );
        let num_difat_sectors = u32::from_le_bytes(
            raw[72..76]
                .try_into()
                .map_err(slice_err("num_difat_sectors"))?,
        );

        // Some CFB writers use FREE_SECTOR rather than END_OF_CHAIN to mark
        // "no DIFAT chain"; normalize here so every later consumer only ever
        // has to compare against END_OF_CHAIN.
        if first_difat_sector == FREE_SECTOR {
            first_difat_sector = constants::END_OF_CHAIN;
        }

        let mut initial_difat_entries = Vec::with_capacity(NUM_DIFAT_ENTRIES_IN_HEADER);
        for i in 0..NUM_DIFAT_ENTRIES_IN_HEADER {
            let start = 76 + i * 4;
            let next = u32::from_le_bytes(
                raw[start..start + 4]
                    .try_into()
                    .map_err(slice_err("initial_difat_entries"))?,
            );
            if next == FREE_SECTOR {
                break;
            } else if next > MAX_REGULAR_SECTOR {
                return Err(Error::OleInvalidHeader(HeaderErrorType::Parsing(
                    "initial_difat_entries",
                    format!(
                        "invalid DIFAT entry (expected value <= {}, found {})",
                        MAX_REGULAR_SECTOR, next
                    ),
                )));
            }
            initial_difat_entries.push(next);
        }

        Ok(Header {
            version,
            num_dir_sectors,
            num_fat_sectors,
            first_dir_sector,
            first_minifat_sector,
            num_minifat_sectors,
            first_difat_sector,
            num_difat_sectors,
            initial_difat_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn minimal_v3_header() -> Vec<u8> {
        let mut h = vec![0u8; 512];
        h[0..8].copy_from_slice(&constants::MAGIC_NUMBER);
        h[24..26].copy_from_slice(&CORRECT_MINOR_VERSION.to_le_bytes());
        h[26..28].copy_from_slice(&3u16.to_le_bytes());
        h[28..30].copy_from_slice(&BYTE_ORDER_MARK.to_le_bytes());
        h[30..32].copy_from_slice(&9u16.to_le_bytes());
        h[32..34].copy_from_slice(&MINI_SECTOR_SHIFT.to_le_bytes());
        h[56..60].copy_from_slice(&(constants::MINI_STREAM_CUTOFF as u32).to_le_bytes());
        h[68..72].copy_from_slice(&constants::END_OF_CHAIN.to_le_bytes());
        for i in 0..NUM_DIFAT_ENTRIES_IN_HEADER {
            let start = 76 + i * 4;
            h[start..start + 4].copy_from_slice(&FREE_SECTOR.to_le_bytes());
        }
        h
    }

    #[tokio::test]
    async fn parses_minimal_header() {
        let mut src = MemorySource::new(minimal_v3_header());
        let header = Header::read_from(&mut src).await.unwrap();
        assert_eq!(header.version, Version::V3);
        assert_eq!(header.first_difat_sector, constants::END_OF_CHAIN);
        assert!(header.initial_difat_entries.is_empty());
    }

    #[tokio::test]
    async fn rejects_bad_magic() {
        let mut bytes = minimal_v3_header();
        bytes[0] = 0x00;
        let mut src = MemorySource::new(bytes);
        assert!(Header::read_from(&mut src).await.is_err());
    }

    #[tokio::test]
    async fn difat_collection_stops_at_first_free_sector() {
        let mut bytes = minimal_v3_header();
        bytes[76..80].copy_from_slice(&7u32.to_le_bytes());
        bytes[80..84].copy_from_slice(&8u32.to_le_bytes());
        let mut src = MemorySource::new(bytes);
        let header = Header::read_from(&mut src).await.unwrap();
        assert_eq!(header.initial_difat_entries, vec![7, 8]);
    }
}
