//! The directory stream, decoded into a flat entry array plus a root id.
//! The on-disk red-black sibling tree is kept as index arithmetic over that
//! array (spec.md §9 "directory tree" redesign note) rather than rebuilt as
//! a pointer graph; validation is a single depth-first walk.

use std::collections::HashSet;

use crate::alloc::Allocator;
use crate::constants::{self, DIR_ENTRY_LEN, ROOT_STREAM_ID};
use crate::direntry::{DirEntry, ObjectType};
use crate::error::Error;
use crate::header::Header;
use crate::name::{compare_names, Ordering as NameOrdering};
use crate::sector::Sectors;
use crate::source::Readable;
use crate::validation::Validation;
use crate::Result;

#[derive(Debug, Clone)]
pub struct Directory {
    pub entries: Vec<DirEntry>,
}

impl Directory {
    pub async fn load<R: Readable>(
        reader: &mut R,
        sectors: Sectors,
        alloc: &Allocator,
        header: &Header,
        validation: Validation,
    ) -> Result<Self> {
        let chain = alloc.open_chain(header.first_dir_sector)?;
        let mut raw = vec![0u8; chain.len() as usize];
        if !raw.is_empty() {
            chain.read_at(sectors, reader, 0, &mut raw).await?;
        }

        let mut entries = Vec::with_capacity(raw.len() / DIR_ENTRY_LEN);
        for (index, record) in raw.chunks_exact(DIR_ENTRY_LEN).enumerate() {
            entries.push(DirEntry::parse(record, index as u32, header.version, validation)?);
        }

        Self::validate(&entries)?;

        Ok(Directory { entries })
    }

    fn validate(entries: &[DirEntry]) -> Result<()> {
        if entries.is_empty() {
            return Err(Error::InvalidCfb("directory has no entries".into()));
        }
        if entries[ROOT_STREAM_ID as usize].object_type != ObjectType::Root {
            return Err(Error::InvalidCfb(
                "directory entry 0 is not the Root entry".into(),
            ));
        }
        if entries[ROOT_STREAM_ID as usize].stream_size % constants::MINI_SECTOR_LEN as u64 != 0 {
            return Err(Error::InvalidCfb(format!(
                "root entry stream size {} is not a multiple of {}",
                entries[ROOT_STREAM_ID as usize].stream_size,
                constants::MINI_SECTOR_LEN
            )));
        }
        for (index, entry) in entries.iter().enumerate().skip(1) {
            if entry.object_type == ObjectType::Root {
                return Err(Error::InvalidCfb(format!(
                    "entry {} is a second Root entry",
                    index
                )));
            }
        }

        let mut visited = HashSet::new();
        visited.insert(ROOT_STREAM_ID);
        walk_subtree(entries, entries[ROOT_STREAM_ID as usize].child, &mut visited)
    }

    /// Resolves a name chain (as produced by [`crate::path::name_chain_from_path`])
    /// to the stream id of the entry it names. `["."]` denotes the root
    /// storage itself; an empty chain (an escaping `..` path, per
    /// SPEC_FULL.md §9 decision 2) never resolves.
    pub fn stream_id_for_name_chain(&self, names: &[String]) -> Result<u32> {
        if names.is_empty() {
            return Err(Error::NotFound("path escapes the root storage".into()));
        }
        if names.len() == 1 && names[0] == "." {
            return Ok(ROOT_STREAM_ID);
        }

        let mut storage_id = ROOT_STREAM_ID;
        for name in names {
            let storage = &self.entries[storage_id as usize];
            let mut cursor = storage.child;
            let mut found = None;
            while let Some(id) = cursor {
                let candidate = &self.entries[id as usize];
                match compare_names(name, &candidate.name) {
                    NameOrdering::Equal => {
                        found = Some(id);
                        break;
                    }
                    NameOrdering::Less => cursor = candidate.left_sibling,
                    NameOrdering::Greater => cursor = candidate.right_sibling,
                }
            }
            storage_id = found.ok_or_else(|| Error::NotFound(format!("no such entry: {:?}", name)))?;
        }
        Ok(storage_id)
    }

    pub fn root(&self) -> &DirEntry {
        &self.entries[ROOT_STREAM_ID as usize]
    }
}

fn walk_subtree(entries: &[DirEntry], id: Option<u32>, visited: &mut HashSet<u32>) -> Result<()> {
    let id = match id {
        None => return Ok(()),
        Some(id) => id,
    };
    if id as usize >= entries.len() {
        return Err(Error::OutOfRange(format!(
            "directory references out-of-range entry {}",
            id
        )));
    }
    if !visited.insert(id) {
        return Err(Error::Cycle(format!(
            "directory entry {} is reachable from more than one parent",
            id
        )));
    }

    let entry = &entries[id as usize];
    match entry.object_type {
        ObjectType::Root => {
            return Err(Error::InvalidCfb(format!(
                "entry {} (Root) is referenced as a sibling/child",
                id
            )))
        }
        ObjectType::Unallocated => {
            return Err(Error::InvalidCfb(format!(
                "entry {} (Unallocated) is reachable from the directory tree",
                id
            )))
        }
        ObjectType::Storage | ObjectType::Stream => {}
    }

    if let Some(left_id) = entry.left_sibling {
        let left = entries.get(left_id as usize).ok_or_else(|| {
            Error::OutOfRange(format!("left sibling {} of entry {} is out of range", left_id, id))
        })?;
        if compare_names(&left.name, &entry.name) != NameOrdering::Less {
            return Err(Error::InvalidCfb(format!(
                "left sibling {:?} does not sort before {:?}",
                left.name, entry.name
            )));
        }
    }
    if let Some(right_id) = entry.right_sibling {
        let right = entries.get(right_id as usize).ok_or_else(|| {
            Error::OutOfRange(format!(
                "right sibling {} of entry {} is out of range",
                right_id, id
            ))
        })?;
        if compare_names(&entry.name, &right.name) != NameOrdering::Less {
            return Err(Error::InvalidCfb(format!(
                "right sibling {:?} does not sort after {:?}",
                right.name, entry.name
            )));
        }
    }

    walk_subtree(entries, entry.left_sibling, visited)?;
    if entry.object_type == ObjectType::Storage {
        walk_subtree(entries, entry.child, visited)?;
    }
    walk_subtree(entries, entry.right_sibling, visited)?;

    Ok(())
}

/// Whether a stream's declared size routes it to the MiniFAT rather than
/// the main FAT, per spec.md's fixed 4096-byte cutoff.
pub fn uses_mini_stream(stream_size: u64) -> bool {
    stream_size < constants::MINI_STREAM_CUTOFF
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direntry::Color;

    fn entry(object_type: ObjectType, name: &str, left: Option<u32>, right: Option<u32>, child: Option<u32>) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            object_type,
            color: Color::Black,
            left_sibling: left,
            right_sibling: right,
            child,
            class_id: None,
            state_bits: 0,
            creation_time: None,
            modification_time: None,
            starting_sector: constants::END_OF_CHAIN,
            stream_size: 0,
        }
    }

    #[test]
    fn validates_a_two_child_tree() {
        let entries = vec![
            entry(ObjectType::Root, "Root Entry", None, None, Some(1)),
            entry(ObjectType::Stream, "bb", None, Some(2), None),
            entry(ObjectType::Stream, "c", None, None, None),
        ];
        Directory::validate(&entries).unwrap();
    }

    #[test]
    fn rejects_sibling_out_of_order() {
        let entries = vec![
            entry(ObjectType::Root, "Root Entry", None, None, Some(1)),
            entry(ObjectType::Stream, "c", None, Some(2), None),
            entry(ObjectType::Stream, "bb", None, None, None),
        ];
        assert!(Directory::validate(&entries).is_err());
    }

    #[test]
    fn rejects_a_cycle() {
        let entries = vec![
            entry(ObjectType::Root, "Root Entry", None, None, Some(1)),
            entry(ObjectType::Stream, "a", Some(1), None, None),
        ];
        assert!(Directory::validate(&entries).is_err());
    }

    #[test]
    fn stream_id_for_name_chain_resolves_root_alias() {
        let directory = Directory {
            entries: vec![entry(ObjectType::Root, "Root Entry", None, None, None)],
        };
        assert_eq!(
            directory
                .stream_id_for_name_chain(&[".".to_string()])
                .unwrap(),
            0
        );
    }

    #[test]
    fn stream_id_for_name_chain_not_found() {
        let directory = Directory {
            entries: vec![entry(ObjectType::Root, "Root Entry", None, None, None)],
        };
        assert!(directory
            .stream_id_for_name_chain(&["missing".to_string()])
            .is_err());
    }

    #[test]
    fn empty_name_chain_is_not_found() {
        let directory = Directory {
            entries: vec![entry(ObjectType::Root, "Root Entry", None, None, None)],
        };
        assert!(directory.stream_id_for_name_chain(&[]).is_err());
    }
}
