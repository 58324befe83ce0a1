//! Quetzal save-file codec.
//!
//! Serializes the complete execution state of a [`ZMachine`] (program
//! counter, call stack, and a diff-compressed image of dynamic memory) into
//! the chunked `FORM`/`IFZS` container, and restores it in place from the same
//! bytes. The codec owns only the wire format: story loading and the
//! instruction interpreter live elsewhere, and reading or writing the save
//! buffer to storage is the caller's business.
//!
//! The format is forward compatible: unknown chunk tags are skipped by length,
//! and a restore succeeds once one of each required chunk (`IFhd`, `Stks`,
//! `CMem`/`UMem`) has been accepted.

#![forbid(unsafe_code)]

mod chunk;
mod error;
mod format;
mod io;
mod mem;
mod stack;

pub use crate::error::{ChunkSet, QuetzalError, Result};
pub use crate::format::ChunkId;

use std::io::{Cursor, Seek, SeekFrom, Write};

use tracing::{debug, warn};
use zvm_core::ZMachine;

use crate::chunk::{write_chunk, ChunkReader};
use crate::io::{ByteReader, WriteBeExt};
use crate::mem::MemLoad;

/// Options for [`save_quetzal`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Free-form text written as an `ANNO` chunk after the machine state.
    pub annotation: Option<String>,
}

/// One entry of a save file's chunk index, as reported by
/// [`inspect_quetzal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub id: ChunkId,
    /// Declared body length, excluding the pad byte.
    pub len: u32,
    /// Offset of the chunk header from the start of the buffer.
    pub offset: usize,
}

/// Serializes the machine into a Quetzal save file.
///
/// Fails only if the writer fails or if an interrupt routine is on the call
/// stack (such frames have no representation in the format).
pub fn save_quetzal<W: Write + Seek>(
    w: &mut W,
    machine: &ZMachine,
    options: SaveOptions,
) -> Result<()> {
    w.write_bytes(&ChunkId::FORM.0)?;
    let total_pos = w.stream_position()?;
    w.write_u32_be(0)?;
    w.write_bytes(&ChunkId::IFZS.0)?;

    write_chunk(w, ChunkId::IFHD, |w| {
        let identity = machine.identity();
        w.write_u16_be(identity.release)?;
        w.write_bytes(&identity.serial)?;
        w.write_u16_be(identity.checksum)?;
        let pc = machine.pc() & 0x00FF_FFFF;
        w.write_bytes(&[(pc >> 16) as u8, (pc >> 8) as u8, pc as u8])?;
        Ok(())
    })?;

    write_chunk(w, ChunkId::CMEM, |w| {
        mem::encode_cmem(w, machine.dynamic_memory(), machine.reference_image())
    })?;

    write_chunk(w, ChunkId::STKS, |w| stack::encode_stks(w, machine))?;

    if let Some(annotation) = &options.annotation {
        write_chunk(w, ChunkId::ANNO, |w| w.write_bytes(annotation.as_bytes()))?;
    }

    let end = w.stream_position()?;
    let total: u32 = (end - (total_pos + 4))
        .try_into()
        .map_err(|_| QuetzalError::CorruptHeader("save file length does not fit in 32 bits"))?;
    w.seek(SeekFrom::Start(total_pos))?;
    w.write_u32_be(total)?;
    w.seek(SeekFrom::Start(end))?;
    Ok(())
}

/// [`save_quetzal`] into a fresh buffer.
pub fn save_quetzal_bytes(machine: &ZMachine, options: SaveOptions) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    save_quetzal(&mut cursor, machine, options)?;
    Ok(cursor.into_inner())
}

/// Restores machine state from a Quetzal save file, mutating `machine` in
/// place.
///
/// Chunks are processed in file order; unknown tags are skipped. Duplicate
/// memory or stack chunks are ignored, a duplicate `IFhd` is an error, and a
/// malformed memory chunk only voids itself (a later `UMem` may still load).
/// After the scan, all three required chunk kinds must have been accepted.
///
/// On [`QuetzalError::NotASnapshot`] the machine is untouched, and when the
/// identity chunk precedes the state chunks (as every conforming writer
/// arranges) the same holds for [`QuetzalError::WrongStory`]. Any other error
/// leaves the machine partially restored; callers that need rollback should
/// clone the machine first.
pub fn restore_quetzal(machine: &mut ZMachine, bytes: &[u8]) -> Result<()> {
    let (start, end) = container_bounds(bytes)?;

    let mut progress = ChunkSet::empty();
    let mut memory_chunk_failed = false;
    let mut chunks = ChunkReader::new(bytes, start, end);
    while let Some(chunk) = chunks.next_chunk()? {
        match chunk.id {
            ChunkId::IFHD => {
                if progress.contains(ChunkSet::HEADER) {
                    return Err(QuetzalError::CorruptHeader("file contains two IFhd chunks"));
                }
                progress |= ChunkSet::HEADER;
                restore_header(machine, chunk.body)?;
            }
            ChunkId::STKS => {
                if progress.contains(ChunkSet::STACK) {
                    warn!("ignoring second Stks chunk");
                    continue;
                }
                progress |= ChunkSet::STACK;
                stack::decode_stks(machine, chunk.body)?;
            }
            ChunkId::CMEM => {
                if progress.contains(ChunkSet::MEMORY) {
                    continue;
                }
                let (memory, reference) = machine.dynamic_memory_and_reference();
                match mem::decode_cmem(memory, reference, chunk.body) {
                    MemLoad::Applied => progress |= ChunkSet::MEMORY,
                    MemLoad::Skipped => memory_chunk_failed = true,
                }
            }
            ChunkId::UMEM => {
                if progress.contains(ChunkSet::MEMORY) {
                    continue;
                }
                match mem::decode_umem(machine.dynamic_memory_mut(), chunk.body) {
                    MemLoad::Applied => progress |= ChunkSet::MEMORY,
                    MemLoad::Skipped => memory_chunk_failed = true,
                }
            }
            other => {
                debug!(chunk = %other, len = chunk.body.len(), "skipping unrecognized chunk");
            }
        }
    }

    let missing = ChunkSet::all() - progress;
    if missing.is_empty() {
        return Ok(());
    }
    if missing == ChunkSet::MEMORY && memory_chunk_failed {
        return Err(QuetzalError::CorruptMemory("no memory chunk decoded cleanly"));
    }
    Err(QuetzalError::MissingChunks(missing))
}

/// Lists the chunks of a save file without touching any machine state.
pub fn inspect_quetzal(bytes: &[u8]) -> Result<Vec<ChunkInfo>> {
    let (start, end) = container_bounds(bytes)?;
    let mut index = Vec::new();
    let mut chunks = ChunkReader::new(bytes, start, end);
    while let Some(chunk) = chunks.next_chunk()? {
        index.push(ChunkInfo {
            id: chunk.id,
            len: chunk.body.len() as u32,
            offset: chunk.offset,
        });
    }
    Ok(index)
}

/// Validates the `FORM`/`IFZS` envelope and returns the byte range holding
/// the chunks.
fn container_bounds(bytes: &[u8]) -> Result<(usize, usize)> {
    if bytes.len() < 12 || bytes[0..4] != ChunkId::FORM.0 || bytes[8..12] != ChunkId::IFZS.0 {
        return Err(QuetzalError::NotASnapshot);
    }
    let total = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if total % 2 == 1 || total < 4 {
        return Err(QuetzalError::NotASnapshot);
    }
    let body_len = total - 4;
    if body_len > bytes.len() - 12 {
        return Err(QuetzalError::Truncated(
            "file is shorter than the container length claims",
        ));
    }
    Ok((12, 12 + body_len))
}

fn restore_header(machine: &mut ZMachine, body: &[u8]) -> Result<()> {
    if body.len() < 13 {
        return Err(QuetzalError::CorruptHeader("IFhd chunk shorter than 13 bytes"));
    }
    let mut r = ByteReader::new(body);
    let release = r.read_u16_be("release number")?;
    let serial = r.read_bytes(6, "serial number")?;
    let checksum = r.read_u16_be("checksum")?;

    let identity = machine.identity();
    if release != identity.release || serial != identity.serial || checksum != identity.checksum {
        return Err(QuetzalError::WrongStory);
    }

    let pc = r.read_bytes(3, "program counter")?;
    machine.set_pc((pc[0] as u32) << 16 | (pc[1] as u32) << 8 | pc[2] as u32);
    Ok(())
}
