use std::io::{Seek, SeekFrom, Write};

use crate::error::{QuetzalError, Result};
use crate::format::ChunkId;
use crate::io::WriteBeExt;

/// Writes one tagged chunk: tag, placeholder length, the payload produced by
/// `f`, then a zero pad byte when the payload length is odd. The length field
/// is backpatched once the payload size is known and never counts the pad.
pub(crate) fn write_chunk<W: Write + Seek>(
    w: &mut W,
    id: ChunkId,
    f: impl FnOnce(&mut W) -> Result<()>,
) -> Result<()> {
    w.write_bytes(&id.0)?;
    let len_pos = w.stream_position()?;
    w.write_u32_be(0)?;

    let start = w.stream_position()?;
    f(w)?;
    let end = w.stream_position()?;
    let len: u32 = end
        .checked_sub(start)
        .and_then(|len| len.try_into().ok())
        .ok_or(QuetzalError::CorruptHeader("chunk length does not fit in 32 bits"))?;

    if len % 2 == 1 {
        w.write_u8(0)?;
    }
    let after = w.stream_position()?;
    w.seek(SeekFrom::Start(len_pos))?;
    w.write_u32_be(len)?;
    w.seek(SeekFrom::Start(after))?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk<'a> {
    pub id: ChunkId,
    pub body: &'a [u8],
    /// Offset of the chunk header from the start of the save buffer.
    pub offset: usize,
}

/// Walks the chunks of a container body in file order, validating each header
/// against the bytes that remain.
pub(crate) struct ChunkReader<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> ChunkReader<'a> {
    pub fn new(buf: &'a [u8], start: usize, end: usize) -> Self {
        Self { buf, pos: start, end }
    }

    pub fn next_chunk(&mut self) -> Result<Option<Chunk<'a>>> {
        if self.pos == self.end {
            return Ok(None);
        }
        if self.end - self.pos < 8 {
            return Err(QuetzalError::Truncated("chunk header"));
        }
        let header = &self.buf[self.pos..self.pos + 8];
        let id = ChunkId([header[0], header[1], header[2], header[3]]);
        let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let body_start = self.pos + 8;
        if len > self.end - body_start {
            return Err(QuetzalError::Truncated("chunk body runs past the end of the file"));
        }
        let next = body_start + len + len % 2;
        if next > self.end {
            return Err(QuetzalError::Truncated("chunk pad byte"));
        }

        let chunk = Chunk {
            id,
            body: &self.buf[body_start..body_start + len],
            offset: self.pos,
        };
        self.pos = next;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn odd_payloads_are_padded_and_lengths_backpatched() {
        let mut cursor = Cursor::new(Vec::new());
        write_chunk(&mut cursor, ChunkId::ANNO, |w| w.write_bytes(b"abc")).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(bytes, b"ANNO\x00\x00\x00\x03abc\x00");
        assert_eq!(bytes.len() % 2, 0);
    }

    #[test]
    fn reader_round_trips_consecutive_chunks() {
        let mut cursor = Cursor::new(Vec::new());
        write_chunk(&mut cursor, ChunkId::ANNO, |w| w.write_bytes(b"abc")).unwrap();
        write_chunk(&mut cursor, ChunkId::UMEM, |w| w.write_bytes(b"xy")).unwrap();
        let bytes = cursor.into_inner();

        let mut reader = ChunkReader::new(&bytes, 0, bytes.len());
        let first = reader.next_chunk().unwrap().unwrap();
        assert_eq!(first.id, ChunkId::ANNO);
        assert_eq!(first.body, b"abc");
        assert_eq!(first.offset, 0);
        let second = reader.next_chunk().unwrap().unwrap();
        assert_eq!(second.id, ChunkId::UMEM);
        assert_eq!(second.body, b"xy");
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn reader_rejects_headers_that_overrun() {
        let err = ChunkReader::new(b"IFhd\x00\x00", 0, 6)
            .next_chunk()
            .unwrap_err();
        assert!(matches!(err, QuetzalError::Truncated("chunk header")));

        let buf = b"IFhd\x00\x00\x00\x0dab";
        let err = ChunkReader::new(buf, 0, buf.len()).next_chunk().unwrap_err();
        assert!(matches!(err, QuetzalError::Truncated(_)));
    }
}
