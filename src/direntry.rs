//! Decodes one 128-byte directory entry record and applies the
//! Root/Storage/Stream field coercions spec.md §4.5 calls for.

use chrono::NaiveDateTime;
use derivative::Derivative;

use crate::constants::{
    self, COLOR_BLACK, COLOR_RED, DIR_ENTRY_LEN, MAX_REGULAR_STREAM_ID, NO_STREAM,
    OBJ_TYPE_ROOT, OBJ_TYPE_STORAGE, OBJ_TYPE_STREAM, OBJ_TYPE_UNALLOCATED, ROOT_DIR_NAME,
};
use crate::error::{DirectoryErrorType, Error};
use crate::name::{decode_utf16_name, validate_name, MAX_NAME_LEN};
use crate::validation::Validation;
use crate::version::Version;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Unallocated,
    Storage,
    Stream,
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

/// One directory entry, decoded and (except for `Unallocated` slots) coerced
/// per spec.md §4.5. `Unallocated` entries are kept in place so sibling/child
/// indices elsewhere in the array stay valid, but are never expected to be
/// reachable from the Root via the sibling tree.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct DirEntry {
    pub name: String,
    pub object_type: ObjectType,
    pub color: Color,
    pub left_sibling: Option<u32>,
    pub right_sibling: Option<u32>,
    pub child: Option<u32>,
    pub class_id: Option<String>,
    pub state_bits: u32,
    pub creation_time: Option<NaiveDateTime>,
    pub modification_time: Option<NaiveDateTime>,
    /// Raw starting sector field; `constants::END_OF_CHAIN` denotes an
    /// empty stream, `constants::NO_STREAM`/0 for storages that carry none.
    pub starting_sector: u32,
    pub stream_size: u64,
}

fn parse_stream_id(raw: &[u8], field: &'static str, index: u32) -> Result<Option<u32>> {
    let value = u32::from_le_bytes(raw.try_into().unwrap());
    if value == NO_STREAM {
        Ok(None)
    } else if value > MAX_REGULAR_STREAM_ID {
        Err(Error::OleInvalidDirectoryEntry(
            DirectoryErrorType::Malformed(
                index,
                format!("{} has out-of-range stream id {:#x}", field, value),
            ),
        ))
    } else {
        Ok(Some(value))
    }
}

impl DirEntry {
    pub fn parse(raw: &[u8], index: u32, version: Version, validation: Validation) -> Result<Self> {
        if raw.len() != DIR_ENTRY_LEN {
            return Err(Error::OleInvalidDirectoryEntry(DirectoryErrorType::Malformed(
                index,
                format!("record is {} bytes, expected {}", raw.len(), DIR_ENTRY_LEN),
            )));
        }

        let name_len = u16::from_le_bytes(raw[64..66].try_into().unwrap()) as usize;
        if name_len > 64 {
            return Err(Error::OleInvalidDirectoryEntry(DirectoryErrorType::NameTooLong(
                index,
            )));
        }
        if name_len % 2 != 0 {
            return Err(Error::OleInvalidDirectoryEntry(DirectoryErrorType::Malformed(
                index,
                "name length is odd".to_string(),
            )));
        }
        if validation.is_strict() && name_len >= 2 && raw[name_len - 2..name_len] != [0, 0] {
            return Err(Error::OleInvalidDirectoryEntry(DirectoryErrorType::Malformed(
                index,
                "name field is not NUL-terminated".to_string(),
            )));
        }
        let mut name = if name_len == 0 {
            String::new()
        } else {
            decode_utf16_name(&raw[0..name_len])?
        };

        let object_type = match raw[66] {
            OBJ_TYPE_UNALLOCATED => ObjectType::Unallocated,
            OBJ_TYPE_STORAGE => ObjectType::Storage,
            OBJ_TYPE_STREAM => ObjectType::Stream,
            OBJ_TYPE_ROOT => ObjectType::Root,
            other => {
                return Err(Error::OleInvalidDirectoryEntry(
                    DirectoryErrorType::InvalidObjectType(index, other),
                ))
            }
        };

        let color = match raw[67] {
            COLOR_RED => Color::Red,
            COLOR_BLACK => Color::Black,
            other => {
                return Err(Error::OleInvalidDirectoryEntry(DirectoryErrorType::InvalidColor(
                    index, other,
                )))
            }
        };

        if object_type != ObjectType::Unallocated {
            if name.encode_utf16().count() > MAX_NAME_LEN {
                return Err(Error::OleInvalidDirectoryEntry(DirectoryErrorType::NameTooLong(
                    index,
                )));
            }
            validate_name(&name).map_err(|_| {
                Error::OleInvalidDirectoryEntry(DirectoryErrorType::Malformed(
                    index,
                    format!("name {:?} contains a reserved character", name),
                ))
            })?;
        }

        if object_type == ObjectType::Unallocated {
            return Ok(DirEntry {
                name,
                object_type,
                color,
                left_sibling: None,
                right_sibling: None,
                child: None,
                class_id: None,
                state_bits: 0,
                creation_time: None,
                modification_time: None,
                starting_sector: constants::FREE_SECTOR,
                stream_size: 0,
            });
        }

        let left_sibling = parse_stream_id(&raw[68..72], "left_sibling_id", index)?;
        let right_sibling = parse_stream_id(&raw[72..76], "right_sibling_id", index)?;
        let child = parse_stream_id(&raw[76..80], "child_id", index)?;

        let class_id_bytes: [u8; 16] = raw[80..96].try_into().unwrap();
        let mut class_id = if class_id_bytes == [0u8; 16] {
            None
        } else {
            let a = u32::from_le_bytes(class_id_bytes[0..4].try_into().unwrap());
            let b = u16::from_le_bytes(class_id_bytes[4..6].try_into().unwrap());
            let c = u16::from_le_bytes(class_id_bytes[6..8].try_into().unwrap());
            Some(
                format!(
                    "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
                    a,
                    b,
                    c,
                    class_id_bytes[8],
                    class_id_bytes[9],
                    class_id_bytes[10],
                    class_id_bytes[11],
                    class_id_bytes[12],
                    class_id_bytes[13],
                    class_id_bytes[14],
                    class_id_bytes[15]
                )
                .to_uppercase(),
            )
        };

        let state_bits = u32::from_le_bytes(raw[96..100].try_into().unwrap());

        let creation_time = match i64::from_le_bytes(raw[100..108].try_into().unwrap()) {
            0 => None,
            ticks => epochs::windows_file(ticks),
        };
        let modification_time = match i64::from_le_bytes(raw[108..116].try_into().unwrap()) {
            0 => None,
            ticks => epochs::windows_file(ticks),
        };

        let mut starting_sector = u32::from_le_bytes(raw[116..120].try_into().unwrap());

        let mut stream_size = u64::from_le_bytes(raw[120..128].try_into().unwrap()) & version.sector_len_mask();

        match object_type {
            ObjectType::Root => {
                if name != ROOT_DIR_NAME {
                    if validation.is_strict() {
                        return Err(Error::OleInvalidDirectoryEntry(DirectoryErrorType::Malformed(
                            index,
                            format!("root entry name must be {:?}, found {:?}", ROOT_DIR_NAME, name),
                        )));
                    }
                    name = ROOT_DIR_NAME.to_string();
                }
            }
            ObjectType::Storage => {
                if starting_sector != 0 || stream_size != 0 {
                    if validation.is_strict() {
                        return Err(Error::OleInvalidDirectoryEntry(DirectoryErrorType::Malformed(
                            index,
                            "storage entry has non-zero starting sector or stream size".to_string(),
                        )));
                    }
                    starting_sector = 0;
                    stream_size = 0;
                }
            }
            ObjectType::Stream => {
                if class_id.is_some() {
                    if validation.is_strict() {
                        return Err(Error::OleInvalidDirectoryEntry(DirectoryErrorType::Malformed(
                            index,
                            "stream entry has a non-zero class id".to_string(),
                        )));
                    }
                    class_id = None;
                }
            }
            ObjectType::Unallocated => unreachable!(),
        }

        Ok(DirEntry {
            name,
            object_type,
            color,
            left_sibling,
            right_sibling,
            child,
            class_id,
            state_bits,
            creation_time,
            modification_time,
            starting_sector,
            stream_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_entry_bytes() -> Vec<u8> {
        let mut raw = vec![0u8; DIR_ENTRY_LEN];
        let name: Vec<u16> = ROOT_DIR_NAME.encode_utf16().chain(std::iter::once(0)).collect();
        for (i, unit) in name.iter().enumerate() {
            raw[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        raw[64..66].copy_from_slice(&((name.len() * 2) as u16).to_le_bytes());
        raw[66] = OBJ_TYPE_ROOT;
        raw[67] = COLOR_BLACK;
        raw[68..72].copy_from_slice(&NO_STREAM.to_le_bytes());
        raw[72..76].copy_from_slice(&NO_STREAM.to_le_bytes());
        raw[76..80].copy_from_slice(&NO_STREAM.to_le_bytes());
        raw
    }

    #[test]
    fn parses_root_entry() {
        let raw = root_entry_bytes();
        let entry = DirEntry::parse(&raw, 0, Version::V3, Validation::Strict).unwrap();
        assert_eq!(entry.object_type, ObjectType::Root);
        assert_eq!(entry.name, "Root Entry");
        assert!(entry.left_sibling.is_none());
    }

    #[test]
    fn rejects_non_root_name_in_strict_mode() {
        let mut raw = root_entry_bytes();
        raw[0..2].copy_from_slice(&(b'x' as u16).to_le_bytes());
        assert!(DirEntry::parse(&raw, 0, Version::V3, Validation::Strict).is_err());
    }

    #[test]
    fn coerces_non_root_name_in_permissive_mode() {
        let mut raw = root_entry_bytes();
        raw[0..2].copy_from_slice(&(b'x' as u16).to_le_bytes());
        let entry = DirEntry::parse(&raw, 0, Version::V3, Validation::Permissive).unwrap();
        assert_eq!(entry.name, "Root Entry");
    }

    #[test]
    fn unallocated_entry_parses_without_field_coercion() {
        let raw = vec![0u8; DIR_ENTRY_LEN];
        let entry = DirEntry::parse(&raw, 3, Version::V3, Validation::Strict).unwrap();
        assert_eq!(entry.object_type, ObjectType::Unallocated);
    }

    #[test]
    fn rejects_name_too_long() {
        let mut raw = root_entry_bytes();
        raw[64..66].copy_from_slice(&70u16.to_le_bytes());
        assert!(DirEntry::parse(&raw, 0, Version::V3, Validation::Strict).is_err());
    }
}
