//! `Stks` chunk codec.
//!
//! The chunk is a flat byte stream: on machines that can push evaluation-stack
//! words outside any routine, an all-zero pseudo-frame header carrying those
//! words, then one record per call frame from the outermost call inward. Each
//! record packs the return address, call type and local count into a 32-bit
//! field, followed by the result variable, the argument bitmask, the
//! evaluation-stack depth, and the frame's `locals + depth` words in the order
//! they were pushed.

use std::io::Write;

use zvm_core::{ZMachine, ZVersion};

use crate::error::{QuetzalError, Result};
use crate::io::{ByteReader, WriteBeExt};

const PROCEDURE_FLAG: u32 = 0x10;
const FRAME_TYPE_MASK: u16 = 0xF000;
const FRAME_TYPE_FUNCTION: u16 = 0x0000;
const FRAME_TYPE_PROCEDURE: u16 = 0x1000;

pub(crate) fn encode_stks<W: Write>(w: &mut W, machine: &ZMachine) -> Result<()> {
    let stack = machine.stack();
    let cap = machine.stack_capacity();

    // Frame boundaries, innermost first: boundaries[k] is the index of the
    // word just above frame k's record, found by chasing the saved frame-link
    // words; boundaries[0] is the current stack pointer.
    let mut boundaries: Vec<usize> = Vec::with_capacity(machine.stack_depth() / 4 + 2);
    boundaries.push(machine.sp());
    let mut boundary = machine.fp() + 4;
    while boundary < cap + 4 {
        if boundaries.len() > cap / 4 + 1 {
            return Err(QuetzalError::CorruptStack("frame link chain does not terminate"));
        }
        boundaries.push(boundary);
        let link = stack
            .get(boundary - 3)
            .copied()
            .ok_or(QuetzalError::CorruptStack("frame link chain escapes the stack"))?;
        boundary = link as usize + 5;
    }

    if machine.version() != ZVersion::V6 {
        // Pseudo-frame for the words pushed outside any routine.
        let top = boundaries[boundaries.len() - 1];
        let depth = cap - top;
        w.write_bytes(&[0u8; 6])?;
        w.write_u16_be(depth as u16)?;
        for idx in (top..cap).rev() {
            w.write_u16_be(stack[idx])?;
        }
    }

    for k in (1..boundaries.len()).rev() {
        let record_top = boundaries[k];
        let below = boundaries[k - 1];
        let frame_word = stack[record_top - 4];
        let n_locals = ((frame_word >> 8) & 0x0F) as u32;
        let arg_count = (frame_word & 0x00FF) as u32;
        let depth = record_top
            .checked_sub(4 + n_locals as usize)
            .and_then(|top| top.checked_sub(below))
            .ok_or(QuetzalError::CorruptStack("frame smaller than its local count"))?;
        let return_pc = (stack[record_top - 1] as u32) << 9 | stack[record_top - 2] as u32;
        // The packed header stores the return address in 24 bits, shifted
        // past the flag byte.
        if return_pc >= 0x00FF_FFFF {
            return Err(QuetzalError::CorruptStack("frame return address out of range"));
        }

        let (packed, result_var) = match frame_word & FRAME_TYPE_MASK {
            FRAME_TYPE_FUNCTION => {
                let var = machine.byte(return_pc).ok_or(QuetzalError::CorruptStack(
                    "frame return address lies outside the story",
                ))?;
                // The live frame points at the store-variable byte; the file
                // stores the address just past it.
                ((return_pc + 1) << 8 | n_locals, var)
            }
            FRAME_TYPE_PROCEDURE => (return_pc << 8 | PROCEDURE_FLAG | n_locals, 0),
            _ => return Err(QuetzalError::SaveInInterrupt),
        };
        if arg_count > 8 {
            return Err(QuetzalError::CorruptStack("frame argument count out of range"));
        }
        let arg_mask = if arg_count == 0 {
            0
        } else {
            ((1u32 << arg_count) - 1) as u8
        };

        w.write_u32_be(packed)?;
        w.write_u8(result_var)?;
        w.write_u8(arg_mask)?;
        w.write_u16_be(depth as u16)?;
        for idx in (below..record_top - 4).rev() {
            w.write_u16_be(stack[idx])?;
        }
    }
    Ok(())
}

pub(crate) fn decode_stks(machine: &mut ZMachine, body: &[u8]) -> Result<()> {
    let cap = machine.stack_capacity();
    let mut r = ByteReader::new(body);

    machine.clear_stack();

    if machine.version() != ZVersion::V6 {
        let header = r.read_bytes(6, "pseudo-frame header")?;
        if header.iter().any(|&b| b != 0) {
            return Err(QuetzalError::CorruptStack("pseudo-frame header must be zero"));
        }
        let depth = r.read_u16_be("pseudo-frame stack depth")? as usize;
        if depth > cap {
            return Err(QuetzalError::StackOverflow);
        }
        if r.remaining() < depth * 2 {
            return Err(QuetzalError::Truncated("pseudo-frame stack words"));
        }
        for _ in 0..depth {
            let word = r.read_u16_be("pseudo-frame stack words")?;
            push(machine, word)?;
        }
    }

    let mut frame_count = 0u32;
    while !r.is_empty() {
        if r.remaining() < 8 {
            return Err(QuetzalError::Truncated("call frame header"));
        }
        if machine.sp() < 4 {
            return Err(QuetzalError::StackOverflow);
        }

        let packed = r.read_u32_be("call frame header")?;
        let result_var = r.read_u8("call frame header")?;
        let n_locals = (packed & 0x0F) as u16;

        let (return_pc, frame_type) = if packed & PROCEDURE_FLAG != 0 {
            (packed >> 8, FRAME_TYPE_PROCEDURE)
        } else {
            // The file stores the address just past the store-variable byte;
            // the live frame points at the byte itself, which must agree with
            // the story image.
            let addr = (packed >> 8)
                .checked_sub(1)
                .ok_or(QuetzalError::CorruptStack("function frame has a zero return address"))?;
            match machine.byte(addr) {
                Some(b) if b == result_var => {}
                _ => return Err(QuetzalError::VersionMismatch),
            }
            (addr, FRAME_TYPE_FUNCTION)
        };

        push(machine, (return_pc >> 9) as u16)?;
        push(machine, (return_pc & 0x1FF) as u16)?;
        let caller_link = (machine.fp() - 1) as u16;
        push(machine, caller_link)?;

        let arg_mask = r.read_u8("call frame header")?;
        let spread = arg_mask as u16 + 1;
        if !spread.is_power_of_two() {
            return Err(QuetzalError::CorruptStack(
                "argument mask is not a contiguous prefix",
            ));
        }
        let arg_count = spread.trailing_zeros() as u16;
        push(machine, frame_type | n_locals << 8 | arg_count)?;
        machine.set_fp(machine.sp());

        let depth = r.read_u16_be("call frame header")? as usize;
        let words = n_locals as usize + depth;
        if machine.sp() <= words {
            return Err(QuetzalError::StackOverflow);
        }
        if r.remaining() < words * 2 {
            return Err(QuetzalError::Truncated("call frame stack words"));
        }
        for _ in 0..words {
            let word = r.read_u16_be("call frame stack words")?;
            push(machine, word)?;
        }
        frame_count += 1;
    }
    machine.set_frame_count(frame_count);
    Ok(())
}

fn push(machine: &mut ZMachine, word: u16) -> Result<()> {
    machine.push(word).map_err(|_| QuetzalError::StackOverflow)
}
