/// Fixed size of the story header at the bottom of dynamic memory.
pub const HEADER_SIZE: usize = 64;

/// Header offset of the version byte.
pub const H_VERSION: usize = 0x00;
/// Header offset of the release number (big-endian word).
pub const H_RELEASE: usize = 0x02;
/// Header offset of the initial program counter (big-endian word).
pub const H_INITIAL_PC: usize = 0x06;
/// Header offset of the base of static memory; everything below it is the
/// mutable dynamic region.
pub const H_STATIC_BASE: usize = 0x0E;
/// Header offset of the 6-byte serial number.
pub const H_SERIAL: usize = 0x12;
/// Header offset of the story checksum (big-endian word).
pub const H_CHECKSUM: usize = 0x1C;

/// Story file format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZVersion {
    V1,
    V2,
    V3,
    V4,
    V5,
    /// V6 code always executes inside a routine, so its evaluation stack never
    /// holds words outside a call frame.
    V6,
    V7,
    V8,
}

impl ZVersion {
    pub fn from_byte(v: u8) -> Option<Self> {
        match v {
            1 => Some(ZVersion::V1),
            2 => Some(ZVersion::V2),
            3 => Some(ZVersion::V3),
            4 => Some(ZVersion::V4),
            5 => Some(ZVersion::V5),
            6 => Some(ZVersion::V6),
            7 => Some(ZVersion::V7),
            8 => Some(ZVersion::V8),
            _ => None,
        }
    }
}

/// The header fields that identify which story a machine is running.
///
/// Saved games carry a copy of this record; a restore against a machine whose
/// record differs is refused before any state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoryIdentity {
    pub release: u16,
    pub serial: [u8; 6],
    pub checksum: u16,
}
