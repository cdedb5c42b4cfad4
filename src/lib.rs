//! Read-only parser for the Microsoft Compound File Binary format (OLE2
//! Structured Storage) used by legacy Office documents, MSI installers and
//! Outlook MSG files.
//!
//! The public entry point is [`CompoundFile::open`] (or, behind the
//! `blocking`/`async` features, [`CompoundFile::open_file_blocking`] /
//! [`CompoundFile::open_file`]), which validates the container per a chosen
//! [`Validation`] mode and returns a handle exposing [`CompoundFile::root_entry`],
//! [`CompoundFile::entries`] and [`CompoundFile::open_stream`].

mod alloc;
mod chain;
mod constants;
mod difat;
mod direntry;
mod directory;
pub mod error;
mod header;
mod minialloc;
mod minichain;
mod name;
pub mod path;
mod sector;
mod source;
mod stream;
mod validation;
mod version;

pub type Result<T> = std::result::Result<T, Error>;

pub use direntry::{Color, ObjectType};
pub use error::Error;
pub use source::{MemorySource, Readable};
pub use stream::{SeekFrom, Stream};
pub use validation::Validation;
pub use version::Version;

use chrono::NaiveDateTime;
use derivative::Derivative;

use crate::alloc::Allocator;
use crate::directory::Directory;
use crate::header::Header;
use crate::minialloc::MiniAllocator;
use crate::sector::Sectors;

/// A named entry in the storage tree: a view onto one [`direntry::DirEntry`]
/// plus its resolved path, independent of the container it came from.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Entry {
    pub name: String,
    pub path: String,
    pub object_type: ObjectType,
    pub class_id: Option<String>,
    pub state_bits: u32,
    pub creation_time: Option<NaiveDateTime>,
    pub modification_time: Option<NaiveDateTime>,
    pub stream_size: u64,
}

/// Selects how [`CompoundFile::entries`] walks a storage's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntriesMode {
    /// Only the immediate siblings of the storage named by the path.
    NonRecursive,
    /// The immediate siblings, and recursively every descendant storage's
    /// own children, in sibling order.
    Preorder,
}

fn to_entry(entry: &direntry::DirEntry, path: String) -> Entry {
    Entry {
        name: entry.name.clone(),
        path,
        object_type: entry.object_type,
        class_id: entry.class_id.clone(),
        state_bits: entry.state_bits,
        creation_time: entry.creation_time,
        modification_time: entry.modification_time,
        stream_size: entry.stream_size,
    }
}

/// Iterative in-order walk of one storage's sibling tree (a left-spine
/// stack, per SPEC_FULL.md §7's grounding in `entry.go`'s `Entries`
/// implementation), optionally descending into each storage's own children.
fn collect_entries(
    entries: &[direntry::DirEntry],
    start_child: Option<u32>,
    base_path: &str,
    mode: EntriesMode,
    out: &mut Vec<Entry>,
) {
    let mut stack = Vec::new();
    let mut current = start_child;
    loop {
        while let Some(id) = current {
            stack.push(id);
            current = entries[id as usize].left_sibling;
        }
        match stack.pop() {
            Some(id) => {
                let entry = &entries[id as usize];
                let path = format!("{}/{}", base_path, entry.name);
                if mode == EntriesMode::Preorder && entry.object_type == ObjectType::Storage {
                    out.push(to_entry(entry, path.clone()));
                    collect_entries(entries, entry.child, &path, mode, out);
                } else {
                    out.push(to_entry(entry, path));
                }
                current = entries[id as usize].right_sibling;
            }
            None => break,
        }
    }
}

/// An open MS-CFB container: header, allocator, directory, and MiniFAT
/// allocator, wired up over one byte source. Construction is all-or-nothing
/// (spec.md §4.9) — a `CompoundFile` is never published partially valid.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct CompoundFile<R> {
    version: Version,
    #[derivative(Debug = "ignore")]
    sectors: Sectors,
    #[derivative(Debug = "ignore")]
    alloc: Allocator,
    directory: Directory,
    #[derivative(Debug = "ignore")]
    minialloc: MiniAllocator,
    #[derivative(Debug = "ignore")]
    reader: R,
}

impl<R: Readable> CompoundFile<R> {
    /// Opens and validates a container from any [`Readable`] byte source.
    /// Fails fatally (no partial handle is ever returned) on any structural
    /// deviation `validation` does not permit.
    pub async fn open(mut reader: R, validation: Validation) -> Result<Self> {
        let len = source::len_of(&mut reader).await?;
        if len < constants::HEADER_LEN as u64 {
            return Err(Error::InvalidCfb(format!(
                "file is {} bytes, too small for the {}-byte header",
                len,
                constants::HEADER_LEN
            )));
        }

        let header = Header::read_from(&mut reader).await?;
        let sectors = Sectors::new(header.version, len);

        let difat_result = difat::load(&mut reader, sectors, &header, validation).await?;
        let alloc = Allocator::new(
            difat_result.fat,
            sectors.sector_len(),
            sectors.num_sectors(),
            &difat_result.difat_sector_ids,
            &difat_result.difat,
            validation,
        )?;

        let directory = Directory::load(&mut reader, sectors, &alloc, &header, validation).await?;
        let minialloc = MiniAllocator::load(
            &mut reader,
            sectors,
            &alloc,
            &header,
            directory.root(),
            validation,
        )
        .await?;

        Ok(CompoundFile {
            version: header.version,
            sectors,
            alloc,
            directory,
            minialloc,
            reader,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn root_entry(&self) -> Entry {
        to_entry(self.directory.root(), "/".to_string())
    }

    /// Lists the children of the storage named by `path` (`""` names the
    /// root storage itself; a bare `"/"` parses to an escaping path per
    /// [`path::name_chain_from_path`] and never resolves). A `path` naming
    /// a Stream yields an empty list, since streams never have children.
    pub fn entries(&self, path: &str, mode: EntriesMode) -> Result<Vec<Entry>> {
        let name_chain = path::name_chain_from_path(path);
        let storage_id = self.directory.stream_id_for_name_chain(&name_chain)?;
        let storage = &self.directory.entries[storage_id as usize];

        let base_path = if name_chain.len() == 1 && name_chain[0] == "." {
            String::new()
        } else {
            path::path_from_name_chain(&name_chain)
        };

        let mut out = Vec::new();
        collect_entries(&self.directory.entries, storage.child, &base_path, mode, &mut out);
        Ok(out)
    }

    /// Opens the stream named by `path`. Fails with `NotFound` if no such
    /// entry exists, `NotAStream` if it names a Storage or the Root.
    pub fn open_stream(&mut self, path: &str) -> Result<Stream<'_, R>> {
        let name_chain = path::name_chain_from_path(path);
        let stream_id = self.directory.stream_id_for_name_chain(&name_chain)?;

        let entry = &self.directory.entries[stream_id as usize];
        let object_type = entry.object_type;
        let stream_size = entry.stream_size;
        let starting_sector = entry.starting_sector;

        if object_type != ObjectType::Stream {
            return Err(Error::NotAStream(path.to_string()));
        }

        if directory::uses_mini_stream(stream_size) {
            let mini_chain = self.minialloc.open_mini_chain(starting_sector)?;
            Ok(Stream::new_mini(
                mini_chain,
                stream_size,
                self.sectors,
                &self.minialloc,
                &mut self.reader,
            ))
        } else {
            let chain = self.alloc.open_chain(starting_sector)?;
            Ok(Stream::new_main(
                chain,
                stream_size,
                self.sectors,
                &self.minialloc,
                &mut self.reader,
            ))
        }
    }
}

#[cfg(feature = "async")]
impl CompoundFile<tokio::fs::File> {
    /// Opens a container from a file path on a Tokio runtime.
    pub async fn open_file<P: AsRef<std::path::Path>>(
        path: P,
        validation: Validation,
    ) -> Result<Self> {
        let file = tokio::fs::File::open(path).await.map_err(Error::Io)?;
        Self::open(file, validation).await
    }
}

#[cfg(feature = "blocking")]
impl CompoundFile<tokio::fs::File> {
    /// Opens a container from a file path, driving the async open logic to
    /// completion on a dedicated Tokio runtime for callers that don't
    /// otherwise need async I/O.
    pub fn open_file_blocking<P: AsRef<std::path::Path>>(
        path: P,
        validation: Validation,
    ) -> Result<Self> {
        let rt = tokio::runtime::Runtime::new().map_err(Error::Io)?;
        let file = rt.block_on(tokio::fs::File::open(path)).map_err(Error::Io)?;
        rt.block_on(Self::open(file, validation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::source::MemorySource;

    /// Builds a minimal, self-consistent v3 CFB file in memory: header,
    /// FAT sector, directory sector (Root only, empty mini stream).
    fn minimal_cfb_bytes() -> Vec<u8> {
        let sector_len = 512usize;
        // layout: sector 0 = FAT, sector 1 = directory
        let mut fat_sector = vec![0xffu8; sector_len];
        // FAT[0] = FAT_SECTOR marker (sector 0 is itself a FAT sector)
        fat_sector[0..4].copy_from_slice(&constants::FAT_SECTOR.to_le_bytes());
        // FAT[1] = END_OF_CHAIN (directory chain is one sector)
        fat_sector[4..8].copy_from_slice(&constants::END_OF_CHAIN.to_le_bytes());

        let mut dir_sector = vec![0u8; sector_len];
        // entry 0: Root Entry, no child, empty mini stream.
        let name: Vec<u16> = "Root Entry".encode_utf16().chain(std::iter::once(0)).collect();
        for (i, unit) in name.iter().enumerate() {
            dir_sector[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        dir_sector[64..66].copy_from_slice(&((name.len() * 2) as u16).to_le_bytes());
        dir_sector[66] = constants::OBJ_TYPE_ROOT;
        dir_sector[67] = constants::COLOR_BLACK;
        dir_sector[68..72].copy_from_slice(&constants::NO_STREAM.to_le_bytes());
        dir_sector[72..76].copy_from_slice(&constants::NO_STREAM.to_le_bytes());
        dir_sector[76..80].copy_from_slice(&constants::NO_STREAM.to_le_bytes());
        dir_sector[116..120].copy_from_slice(&constants::END_OF_CHAIN.to_le_bytes());

        let mut header = vec![0u8; 512];
        header[0..8].copy_from_slice(&constants::MAGIC_NUMBER);
        header[24..26].copy_from_slice(&constants::CORRECT_MINOR_VERSION.to_le_bytes());
        header[26..28].copy_from_slice(&3u16.to_le_bytes());
        header[28..30].copy_from_slice(&constants::BYTE_ORDER_MARK.to_le_bytes());
        header[30..32].copy_from_slice(&9u16.to_le_bytes());
        header[32..34].copy_from_slice(&constants::MINI_SECTOR_SHIFT.to_le_bytes());
        header[44..48].copy_from_slice(&1u32.to_le_bytes()); // num_fat_sectors
        header[48..52].copy_from_slice(&1u32.to_le_bytes()); // first_dir_sector
        header[56..60].copy_from_slice(&(constants::MINI_STREAM_CUTOFF as u32).to_le_bytes());
        header[60..64].copy_from_slice(&constants::END_OF_CHAIN.to_le_bytes()); // first_minifat_sector
        header[68..72].copy_from_slice(&constants::END_OF_CHAIN.to_le_bytes()); // first_difat_sector
                                                                                  // initial DIFAT entry 0 = sector 0 (the only FAT sector)
        header[76..80].copy_from_slice(&0u32.to_le_bytes());
        for i in 1..constants::NUM_DIFAT_ENTRIES_IN_HEADER {
            let start = 76 + i * 4;
            header[start..start + 4].copy_from_slice(&constants::FREE_SECTOR.to_le_bytes());
        }

        let mut bytes = header;
        bytes.extend(fat_sector);
        bytes.extend(dir_sector);
        bytes
    }

    #[tokio::test]
    async fn opens_a_minimal_valid_container() {
        let src = MemorySource::new(minimal_cfb_bytes());
        let cfb = CompoundFile::open(src, Validation::Strict).await.unwrap();
        let root = cfb.root_entry();
        assert_eq!(root.object_type, ObjectType::Root);
        assert_eq!(root.name, "Root Entry");
    }

    #[tokio::test]
    async fn empty_root_has_no_entries() {
        let src = MemorySource::new(minimal_cfb_bytes());
        let cfb = CompoundFile::open(src, Validation::Strict).await.unwrap();
        let children = cfb.entries("", EntriesMode::NonRecursive).unwrap();
        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn truncated_file_is_rejected() {
        let src = MemorySource::new(vec![0u8; 100]);
        let result = CompoundFile::open(src, Validation::Strict).await;
        assert!(matches!(result, Err(Error::InvalidCfb(_))));
    }

    #[tokio::test]
    async fn opening_a_missing_stream_is_not_found() {
        let src = MemorySource::new(minimal_cfb_bytes());
        let mut cfb = CompoundFile::open(src, Validation::Strict).await.unwrap();
        assert!(matches!(
            cfb.open_stream("/NoSuchStream"),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn opening_the_root_as_a_stream_is_rejected() {
        let src = MemorySource::new(minimal_cfb_bytes());
        let mut cfb = CompoundFile::open(src, Validation::Strict).await.unwrap();
        assert!(matches!(cfb.open_stream(""), Err(Error::NotAStream(_))));
    }
}
