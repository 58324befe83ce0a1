//! Dynamic-memory chunk codecs.
//!
//! `CMem` stores dynamic memory as a byte stream of XOR differences against
//! the reference image, with runs of unchanged bytes collapsed to
//! `{0x00, run_length - 1}` pairs. `UMem` stores a raw copy. Decoding never
//! fails hard: a malformed chunk is ignored (a later memory chunk may still
//! apply) and the caller treats memory as not yet loaded.

use std::io::Write;

use tracing::warn;

use crate::error::Result;
use crate::io::WriteBeExt;

/// Whether a memory chunk was applied to the live image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemLoad {
    Applied,
    Skipped,
}

/// Encodes the diff stream. A trailing run of unchanged bytes is deliberately
/// not flushed; the decoder fills the tail from the reference image.
pub(crate) fn encode_cmem<W: Write>(w: &mut W, memory: &[u8], reference: &[u8]) -> Result<()> {
    debug_assert_eq!(memory.len(), reference.len());
    let mut run = 0usize;
    for (&live, &orig) in memory.iter().zip(reference) {
        let diff = live ^ orig;
        if diff == 0 {
            run += 1;
            continue;
        }
        while run > 0x100 {
            w.write_bytes(&[0x00, 0xFF])?;
            run -= 0x100;
        }
        if run > 0 {
            w.write_bytes(&[0x00, (run - 1) as u8])?;
            run = 0;
        }
        w.write_u8(diff)?;
    }
    Ok(())
}

/// Applies a `CMem` diff stream to `memory`.
///
/// A run byte copies `seed + 1` bytes from the reference image; runs that
/// reach the end of memory are clamped silently. A literal diff byte arriving
/// past the end, or a run header with no count byte, voids the chunk. When the
/// stream ends early the rest of memory is copied from the reference image.
pub(crate) fn decode_cmem(memory: &mut [u8], reference: &[u8], body: &[u8]) -> MemLoad {
    debug_assert_eq!(memory.len(), reference.len());
    let size = memory.len();
    let mut out = 0usize;
    let mut pos = 0usize;
    while pos < body.len() {
        let diff = body[pos];
        pos += 1;
        if diff == 0 {
            let Some(&seed) = body.get(pos) else {
                warn!("memory diff chunk ends inside a run header; ignoring it");
                return MemLoad::Skipped;
            };
            pos += 1;
            let n = (seed as usize + 1).min(size - out);
            memory[out..out + n].copy_from_slice(&reference[out..out + n]);
            out += n;
        } else {
            if out >= size {
                warn!("memory diff chunk is longer than dynamic memory; ignoring the rest");
                return MemLoad::Skipped;
            }
            memory[out] = diff ^ reference[out];
            out += 1;
        }
    }
    memory[out..].copy_from_slice(&reference[out..]);
    MemLoad::Applied
}

/// Applies a raw `UMem` image, which must match dynamic memory exactly.
pub(crate) fn decode_umem(memory: &mut [u8], body: &[u8]) -> MemLoad {
    if body.len() != memory.len() {
        warn!(
            expected = memory.len(),
            found = body.len(),
            "raw memory chunk has the wrong size; ignoring it"
        );
        return MemLoad::Skipped;
    }
    memory.copy_from_slice(body);
    MemLoad::Applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(memory: &[u8], reference: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_cmem(&mut out, memory, reference).unwrap();
        out
    }

    #[test]
    fn golden_run_then_literal() {
        // Two unchanged bytes collapse to {0x00, 0x01}; 0x02 ^ 0xFF = 0xFD.
        let encoded = encode(&[0x00, 0x01, 0x02], &[0x00, 0x01, 0xFF]);
        assert_eq!(encoded, [0x00, 0x01, 0xFD]);

        let mut memory = [0u8; 3];
        let applied = decode_cmem(&mut memory, &[0x00, 0x01, 0xFF], &encoded);
        assert_eq!(applied, MemLoad::Applied);
        assert_eq!(memory, [0x00, 0x01, 0x02]);
    }

    #[test]
    fn trailing_run_is_omitted_and_refilled_on_decode() {
        let reference = [0xAA; 8];
        let mut memory = reference;
        memory[0] = 0x55;
        let encoded = encode(&memory, &reference);
        assert_eq!(encoded, [0x55 ^ 0xAA]);

        let mut restored = [0u8; 8];
        assert_eq!(
            decode_cmem(&mut restored, &reference, &encoded),
            MemLoad::Applied
        );
        assert_eq!(restored, memory);
    }

    #[test]
    fn all_equal_images_encode_to_nothing() {
        let reference = [7u8; 300];
        assert_eq!(encode(&reference, &reference), []);

        let mut restored = [0u8; 300];
        assert_eq!(decode_cmem(&mut restored, &reference, &[]), MemLoad::Applied);
        assert_eq!(restored, reference);
    }

    #[test]
    fn long_runs_split_at_256() {
        let reference = [0u8; 600];
        let mut memory = [0u8; 600];
        memory[599] = 1;
        let encoded = encode(&memory, &reference);
        // 599 unchanged bytes: two full 256-byte runs, one 87-byte run, then
        // the literal.
        assert_eq!(
            encoded,
            [0x00, 0xFF, 0x00, 0xFF, 0x00, 86, 0x01]
        );

        let mut restored = [0xEEu8; 600];
        assert_eq!(
            decode_cmem(&mut restored, &reference, &encoded),
            MemLoad::Applied
        );
        assert_eq!(restored[..], memory[..]);
    }

    #[test]
    fn run_seed_byte_counts_itself() {
        // {0x00, 0x00} is a run of exactly one byte.
        let reference = [0x11, 0x22];
        let mut memory = [0u8; 2];
        assert_eq!(
            decode_cmem(&mut memory, &reference, &[0x00, 0x00, 0x30]),
            MemLoad::Applied
        );
        assert_eq!(memory, [0x11, 0x30 ^ 0x22]);
    }

    #[test]
    fn dangling_run_header_voids_the_chunk() {
        let reference = [0u8; 4];
        let mut memory = [0u8; 4];
        assert_eq!(
            decode_cmem(&mut memory, &reference, &[0x05, 0x00]),
            MemLoad::Skipped
        );
    }

    #[test]
    fn literal_past_the_end_voids_the_chunk() {
        let reference = [0u8; 2];
        let mut memory = [0u8; 2];
        assert_eq!(
            decode_cmem(&mut memory, &reference, &[0x01, 0x02, 0x03]),
            MemLoad::Skipped
        );
    }

    #[test]
    fn run_past_the_end_is_clamped_and_tolerated() {
        let reference = [0x11, 0x22];
        let mut memory = [0u8; 2];
        assert_eq!(
            decode_cmem(&mut memory, &reference, &[0x00, 0xFF]),
            MemLoad::Applied
        );
        assert_eq!(memory, reference);
    }

    #[test]
    fn umem_requires_an_exact_size() {
        let mut memory = [0u8; 4];
        assert_eq!(decode_umem(&mut memory, &[1, 2, 3]), MemLoad::Skipped);
        assert_eq!(decode_umem(&mut memory, &[1, 2, 3, 4]), MemLoad::Applied);
        assert_eq!(memory, [1, 2, 3, 4]);
    }

    proptest! {
        #[test]
        fn diff_codec_is_an_exact_inverse(
            (memory, reference) in proptest::collection::vec(any::<u8>(), 0..2048)
                .prop_flat_map(|memory| {
                    let len = memory.len();
                    (Just(memory), proptest::collection::vec(any::<u8>(), len..=len))
                })
        ) {
            let encoded = encode(&memory, &reference);
            let mut restored = vec![0u8; reference.len()];
            prop_assert_eq!(decode_cmem(&mut restored, &reference, &encoded), MemLoad::Applied);
            prop_assert_eq!(restored, memory);
        }

        #[test]
        fn decoding_twice_is_idempotent(
            (reference, body) in (proptest::collection::vec(any::<u8>(), 0..512),
                                  proptest::collection::vec(any::<u8>(), 0..512))
        ) {
            let mut first = vec![0u8; reference.len()];
            let mut second = vec![0x5Au8; reference.len()];
            let a = decode_cmem(&mut first, &reference, &body);
            let b = decode_cmem(&mut second, &reference, &body);
            prop_assert_eq!(a, b);
            if a == MemLoad::Applied {
                prop_assert_eq!(first, second);
            }
        }
    }
}
