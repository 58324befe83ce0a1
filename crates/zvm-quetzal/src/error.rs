use std::fmt;
use std::io;

use bitflags::bitflags;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuetzalError>;

bitflags! {
    /// The chunk kinds a restore scan has accepted so far. All three are
    /// required for a restore to succeed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChunkSet: u8 {
        const HEADER = 1 << 0;
        const STACK = 1 << 1;
        const MEMORY = 1 << 2;
    }
}

impl fmt::Display for ChunkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for (flag, name) in [
            (ChunkSet::HEADER, "IFhd"),
            (ChunkSet::STACK, "Stks"),
            (ChunkSet::MEMORY, "CMem/UMem"),
        ] {
            if self.contains(flag) {
                write!(f, "{sep}{name}")?;
                sep = ", ";
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum QuetzalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot save while an interrupt routine is on the call stack")]
    SaveInInterrupt,

    #[error("not a quetzal save file")]
    NotASnapshot,

    #[error("truncated save data: {0}")]
    Truncated(&'static str),

    #[error("corrupt save header: {0}")]
    CorruptHeader(&'static str),

    #[error("save file was not created by this story")]
    WrongStory,

    #[error("call frame does not match the story file (different story version?)")]
    VersionMismatch,

    #[error("corrupt stack chunk: {0}")]
    CorruptStack(&'static str),

    #[error("corrupt memory chunk: {0}")]
    CorruptMemory(&'static str),

    #[error("restored stack would exceed the stack capacity")]
    StackOverflow,

    #[error("save file is missing required chunks: {0}")]
    MissingChunks(ChunkSet),
}
