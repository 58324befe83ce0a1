use std::fmt;

/// Four-character chunk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    /// Outer container tag.
    pub const FORM: ChunkId = ChunkId(*b"FORM");
    /// Container format identifier immediately after the outer length.
    pub const IFZS: ChunkId = ChunkId(*b"IFZS");
    /// Story identity and program counter.
    pub const IFHD: ChunkId = ChunkId(*b"IFhd");
    /// Dynamic memory as a diff against the reference image.
    pub const CMEM: ChunkId = ChunkId(*b"CMem");
    /// Dynamic memory as a raw copy.
    pub const UMEM: ChunkId = ChunkId(*b"UMem");
    /// The call stack.
    pub const STKS: ChunkId = ChunkId(*b"Stks");
    /// Free-form annotation text; ignored on restore.
    pub const ANNO: ChunkId = ChunkId(*b"ANNO");
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}
