//! Sentinel values and fixed sizes from MS-CFB, colocated so every other
//! module derives from here rather than re-declaring magic numbers.

/// Length in bytes of the significant header prefix (the rest of sector 0
/// is padding, possibly extending to a full 4096-byte sector for v4 files).
pub const HEADER_LEN: usize = 512;
/// Length in bytes of one directory entry record.
pub const DIR_ENTRY_LEN: usize = 128;
/// Number of DIFAT entries that live inline in the header.
pub const NUM_DIFAT_ENTRIES_IN_HEADER: usize = 109;
/// Fixed mini-sector length, regardless of major version.
pub const MINI_SECTOR_LEN: usize = 64;
/// Streams smaller than this live in the mini stream instead of the FAT.
pub const MINI_STREAM_CUTOFF: u64 = 4096;

/// Identification signature every CFB file must start with.
pub const MAGIC_NUMBER: [u8; 8] = [0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];
/// Required minor version (not validated beyond being read; spec allows any
/// value here in practice, but the common one is recorded for reference).
pub const CORRECT_MINOR_VERSION: u16 = 0x003e;
/// Required byte order mark (little-endian).
pub const BYTE_ORDER_MARK: u16 = 0xfffe;
/// Required mini-sector shift (2^6 == 64 bytes).
pub const MINI_SECTOR_SHIFT: u16 = 6;

/// Name of the single Root Storage entry (strict mode requires this exact
/// string; permissive mode forces it regardless of what was on disk).
pub const ROOT_DIR_NAME: &str = "Root Entry";

// --- Sector id sentinels (also reused for mini-sector ids) -------------

/// Largest sector id that denotes an actual regular sector.
pub const MAX_REGULAR_SECTOR: u32 = 0xffff_fffa;
/// Reserved; must never appear as a FAT entry value.
pub const INVALID_SECTOR: u32 = 0xffff_fffb;
/// Marks a sector as belonging to the DIFAT.
pub const DIFAT_SECTOR: u32 = 0xffff_fffc;
/// Marks a sector as belonging to the FAT.
pub const FAT_SECTOR: u32 = 0xffff_fffd;
/// Terminates a chain.
pub const END_OF_CHAIN: u32 = 0xffff_fffe;
/// Marks a sector as unused.
pub const FREE_SECTOR: u32 = 0xffff_ffff;

// --- Directory entry field values ---------------------------------------

pub const OBJ_TYPE_UNALLOCATED: u8 = 0x00;
pub const OBJ_TYPE_STORAGE: u8 = 0x01;
pub const OBJ_TYPE_STREAM: u8 = 0x02;
pub const OBJ_TYPE_ROOT: u8 = 0x05;

pub const COLOR_RED: u8 = 0x00;
pub const COLOR_BLACK: u8 = 0x01;

/// Stream id of the root directory entry; fixed by construction.
pub const ROOT_STREAM_ID: u32 = 0;
/// Largest stream id that denotes a real directory entry.
pub const MAX_REGULAR_STREAM_ID: u32 = 0xffff_fffa;
/// Marks an absent sibling/child pointer.
pub const NO_STREAM: u32 = 0xffff_ffff;

/// Buffer size used by the buffered `Stream` reader.
pub const STREAM_BUFFER_LEN: usize = 8192;
